//! Layout and drawing: HUD, board of holes, result modal, name entry, ranking, confetti.

use crate::app::{NameEntry, Overlay, PetFlash};
use crate::confetti::Confetti;
use crate::game::{Cell, Game, LossReason, Occupant, Phase};
use crate::input::HOLE_KEYS;
use crate::ranking::RankingRecord;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, EffectRenderer, Interpolation, fx};

const HOLE_WIDTH: u16 = 10;
const HOLE_HEIGHT: u16 = 5;
const GAP_X: u16 = 2;
const GAP_Y: u16 = 1;
const HUD_HEIGHT: u16 = 3;
const FOOTER_HEIGHT: u16 = 1;
/// Timer turns red at or below this many seconds.
const LOW_TIME_SECS: u32 = 5;

/// Duration of the pet flash fade; matches the game's acknowledgment delay.
const FLASH_MS: u32 = crate::config::PET_ACK_MS as u32;

fn chunks(area: Rect) -> (Rect, Rect, Rect) {
    let c = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HUD_HEIGHT),
            Constraint::Fill(1),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(area);
    (c[0], c[1], c[2])
}

/// Area the holes are laid out in.
pub fn board_area(area: Rect) -> Rect {
    chunks(area).1
}

/// One rect per hole: two rows, centred in `board`, clipped to it.
pub fn hole_rects(board: Rect, holes: usize) -> Vec<Rect> {
    if holes == 0 {
        return Vec::new();
    }
    let rows: u16 = if holes > 1 { 2 } else { 1 };
    let cols = holes.div_ceil(rows as usize) as u16;
    let total_w = cols * HOLE_WIDTH + (cols - 1) * GAP_X;
    let total_h = rows * HOLE_HEIGHT + (rows - 1) * GAP_Y;
    let x0 = board.x + board.width.saturating_sub(total_w) / 2;
    let y0 = board.y + board.height.saturating_sub(total_h) / 2;
    (0..holes as u16)
        .map(|i| {
            let (r, c) = (i / cols, i % cols);
            Rect {
                x: x0 + c * (HOLE_WIDTH + GAP_X),
                y: y0 + r * (HOLE_HEIGHT + GAP_Y),
                width: HOLE_WIDTH,
                height: HOLE_HEIGHT,
            }
            .intersection(board)
        })
        .collect()
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

/// Draw the whole screen. Pet flashes get their TachyonFX effect created on first draw.
pub fn draw(
    frame: &mut Frame,
    game: &Game,
    theme: &Theme,
    overlay: &Overlay,
    entry: Option<&NameEntry>,
    notice: Option<&str>,
    flashes: &mut [PetFlash],
    confetti: Option<&Confetti>,
    now: Instant,
) {
    let area = frame.area();
    let (hud, board, footer) = chunks(area);
    draw_hud(frame, game, theme, hud);
    let rects = hole_rects(board, game.holes());
    for (pos, rect) in rects.iter().enumerate() {
        let flash = flashes.iter().find(|f| f.pos == pos);
        draw_hole(frame, theme, *rect, pos, game.cell(pos), flash);
    }
    apply_pet_flashes(frame, theme, &rects, flashes, now);
    draw_footer(frame, game, theme, footer);

    if game.phase().is_terminal() {
        draw_result(frame, game, theme, entry, notice, area);
    }
    match overlay {
        Overlay::Ranking(records) => draw_ranking(frame, theme, records, area),
        Overlay::ConfirmReset => draw_confirm_reset(frame, theme, area),
        Overlay::None => {}
    }
    if let Some(c) = confetti {
        draw_confetti(frame, c, area);
    }
}

fn draw_hud(frame: &mut Frame, game: &Game, theme: &Theme, area: Rect) {
    let s = game.session();
    let label = Style::default().fg(theme.inactive_fg);
    let value = Style::default()
        .fg(theme.main_fg)
        .add_modifier(Modifier::BOLD);
    let time_style = if s.is_playing && s.time_left <= LOW_TIME_SECS {
        value.fg(theme.trap)
    } else {
        value
    };
    let mode = if game.rules().penalties_enabled {
        "classic"
    } else {
        "gentle"
    };
    let line = Line::from(vec![
        Span::styled(" Level ", label),
        Span::styled(format!("{}/{}", s.level, game.rules().max_level()), value),
        Span::styled("   Score ", label),
        Span::styled(s.score.to_string(), value),
        Span::styled("   Time ", label),
        Span::styled(format!("{:>2}", s.time_left), time_style),
        Span::styled(format!("   [{mode}] "), label),
    ]);
    let p = Paragraph::new(line).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line))
            .title(Span::styled(" nekotui ", Style::default().fg(theme.title))),
    );
    p.render(area, frame.buffer_mut());
}

fn draw_hole(
    frame: &mut Frame,
    theme: &Theme,
    rect: Rect,
    pos: usize,
    cell: Cell,
    flash: Option<&PetFlash>,
) {
    let (border, glyph, bg) = match (cell, flash) {
        (Cell::Active { occupant, glyph }, _) => {
            let color = match occupant {
                Occupant::Reward => theme.cat,
                Occupant::Penalty => theme.trap,
            };
            (color, glyph, theme.bg)
        }
        (Cell::Dormant, Some(f)) => {
            let color = match f.occupant {
                Occupant::Reward => theme.flash,
                Occupant::Penalty => theme.trap,
            };
            (color, f.glyph, color)
        }
        (Cell::Dormant, None) => (theme.hole, "", theme.bg),
    };
    let key = HOLE_KEYS.get(pos).copied().unwrap_or(' ');
    let p = Paragraph::new(vec![Line::from(""), Line::from(glyph)])
        .alignment(Alignment::Center)
        .style(Style::default().bg(bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(Span::styled(format!(" {key} "), Style::default().fg(theme.inactive_fg))),
        );
    p.render(rect, frame.buffer_mut());
}

/// Fade each petted hole back to the board colour.
fn apply_pet_flashes(
    frame: &mut Frame,
    theme: &Theme,
    rects: &[Rect],
    flashes: &mut [PetFlash],
    now: Instant,
) {
    for flash in flashes.iter_mut() {
        let Some(&rect) = rects.get(flash.pos) else {
            continue;
        };
        let delta = flash
            .last_process
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(std::time::Duration::ZERO);
        let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
        flash.last_process = Some(now);
        let bg = theme.bg;
        let effect = flash.effect.get_or_insert_with(|| {
            fx::fade_to(bg, bg, (FLASH_MS, Interpolation::Linear)).with_area(rect)
        });
        frame.render_effect(effect, rect, TfxDuration::from_millis(delta_ms));
    }
}

fn draw_footer(frame: &mut Frame, game: &Game, theme: &Theme, area: Rect) {
    let hints = match game.phase() {
        Phase::Idle => " Enter start   k ranking   r reset   q quit ",
        Phase::Playing => " 1-9 0 - = pet   click pet   c cancel   q quit ",
        _ => " Enter continue   Esc close   k ranking   r reset ",
    };
    let p = Paragraph::new(Line::from(Span::styled(
        hints,
        Style::default().fg(theme.inactive_fg),
    )))
    .alignment(Alignment::Center);
    p.render(area, frame.buffer_mut());
}

fn draw_result(
    frame: &mut Frame,
    game: &Game,
    theme: &Theme,
    entry: Option<&NameEntry>,
    notice: Option<&str>,
    area: Rect,
) {
    let (title, message) = match game.phase() {
        Phase::LevelComplete => (
            " 🎉 Level clear! 🎉 ".to_string(),
            format!("On to level {}!", game.session().level),
        ),
        Phase::GameOver(LossReason::Trap) => (
            " 😿 Game over 😿 ".to_string(),
            "You touched a trap...".to_string(),
        ),
        Phase::GameOver(LossReason::Abandoned) => (
            " 😿 Game over 😿 ".to_string(),
            "A cat got upset and ran off...".to_string(),
        ),
        Phase::Finale => (
            " 🏆 All levels cleared! 🏆 ".to_string(),
            "Congratulations, you cleared every level!".to_string(),
        ),
        Phase::Idle | Phase::Playing => return,
    };
    let (level, score) = game.reached();
    let fg = Style::default().fg(theme.main_fg);
    let title_bg = match game.phase() {
        Phase::GameOver(_) => theme.trap,
        _ => theme.cat,
    };
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            title,
            Style::default().fg(Color::Black).bg(title_bg),
        )),
        Line::from(""),
        Line::from(Span::styled(message, fg)),
        Line::from(""),
        Line::from(Span::styled(
            format!("Reached level: {level}   Score: {score}"),
            fg.add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    if let Some(entry) = entry {
        lines.push(Line::from(Span::styled("Enter your name for the ranking", fg)));
        lines.push(Line::from(Span::styled(
            format!(" {}_ ", entry.name),
            Style::default().fg(Color::Black).bg(theme.title),
        )));
        if let Some(err) = &entry.error {
            lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(theme.trap))));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Enter save    Esc skip",
            Style::default().fg(theme.inactive_fg),
        )));
    } else {
        if let Some(notice) = notice {
            lines.push(Line::from(Span::styled(
                notice.to_string(),
                Style::default().fg(theme.cat),
            )));
            lines.push(Line::from(""));
        }
        let action = match game.phase() {
            Phase::LevelComplete => "Enter next level",
            Phase::Finale => "Enter play again",
            _ if game.can_submit() => "Enter back to game",
            _ => "Enter try again",
        };
        lines.push(Line::from(Span::styled(
            format!("{action}    Esc close"),
            Style::default().fg(theme.inactive_fg),
        )));
    }
    lines.push(Line::from(""));
    let popup = centered(area, 48, lines.len() as u16 + 2);
    Clear.render(popup, frame.buffer_mut());
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_ranking(
    frame: &mut Frame,
    theme: &Theme,
    records: &Result<Vec<RankingRecord>, String>,
    area: Rect,
) {
    let fg = Style::default().fg(theme.main_fg);
    let mut lines = vec![Line::from("")];
    match records {
        Ok(records) if records.is_empty() => {
            lines.push(Line::from(Span::styled(
                "No rankings yet",
                Style::default().fg(theme.inactive_fg),
            )));
        }
        Ok(records) => {
            for (i, r) in records.iter().enumerate() {
                let rank = i + 1;
                let style = if rank <= 3 {
                    Style::default()
                        .fg(theme.title)
                        .add_modifier(Modifier::BOLD)
                } else {
                    fg
                };
                lines.push(Line::from(Span::styled(
                    format!("{rank:>2}. {:<16} Lv {:<2} {:>6} pts", r.name, r.level, r.score),
                    style,
                )));
            }
        }
        Err(err) => {
            lines.push(Line::from(Span::styled(
                format!("Could not load ranking: {err}"),
                Style::default().fg(theme.trap),
            )));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "any key to close",
        Style::default().fg(theme.inactive_fg),
    )));
    let popup = centered(area, 46, lines.len() as u16 + 2);
    Clear.render(popup, frame.buffer_mut());
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
            .title(Span::styled(" Ranking ", Style::default().fg(theme.title))),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_confirm_reset(frame: &mut Frame, theme: &Theme, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Start over from level 1?",
            Style::default().fg(theme.main_fg),
        )),
        Line::from(Span::styled(
            "Current progress will be lost.",
            Style::default().fg(theme.main_fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " y reset    any other key keeps progress ",
            Style::default().fg(theme.inactive_fg),
        )),
    ];
    let popup = centered(area, 40, 7);
    Clear.render(popup, frame.buffer_mut());
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.trap).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_confetti(frame: &mut Frame, confetti: &Confetti, area: Rect) {
    let buf = frame.buffer_mut();
    for p in confetti.visible() {
        let (x, y) = (area.x + p.x as u16, area.y + p.y as u16);
        if !area.contains(Position::new(x, y)) {
            continue;
        }
        if let Some(cell) = buf.cell_mut(Position::new(x, y)) {
            cell.set_symbol(p.glyph()).set_fg(p.color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Ruleset;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn render(game: &Game, overlay: &Overlay, entry: Option<&NameEntry>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|f| {
                draw(
                    f,
                    game,
                    &Theme::default(),
                    overlay,
                    entry,
                    None,
                    &mut [],
                    None,
                    Instant::now(),
                )
            })
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn holes_are_laid_out_in_two_rows() {
        let board = Rect::new(0, 3, 80, 20);
        let rects = hole_rects(board, 10);
        assert_eq!(rects.len(), 10);
        assert_eq!(rects[0].y, rects[4].y);
        assert!(rects[5].y > rects[0].y);
        assert_eq!(rects[0].x, rects[5].x);
        for (i, a) in rects.iter().enumerate() {
            assert!(board.contains(Position::new(a.x, a.y)));
            for b in &rects[i + 1..] {
                assert!(!a.intersects(*b));
            }
        }
    }

    #[test]
    fn single_hole_is_centred() {
        let board = Rect::new(0, 0, 40, 20);
        let rects = hole_rects(board, 1);
        assert_eq!(rects[0], Rect::new(15, 7, HOLE_WIDTH, HOLE_HEIGHT));
    }

    #[test]
    fn idle_screen_shows_hud_and_hints() {
        let game = Game::new(Ruleset::default(), Some(1));
        let text = render(&game, &Overlay::None, None);
        assert!(text.contains("Level"));
        assert!(text.contains("1/7"));
        assert!(text.contains("Enter start"));
    }

    #[test]
    fn game_over_modal_offers_retry() {
        let mut game = Game::new(Ruleset::gentle(), Some(1));
        game.start();
        game.advance(10_000);
        let text = render(&game, &Overlay::None, None);
        assert!(text.contains("Reached level: 0"));
        assert!(text.contains("try again"));
    }

    #[test]
    fn empty_ranking_says_so() {
        let game = Game::new(Ruleset::default(), Some(1));
        let text = render(&game, &Overlay::Ranking(Ok(Vec::new())), None);
        assert!(text.contains("No rankings yet"));
    }
}
