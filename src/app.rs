//! App: terminal init, main loop, event and key handling.
//!
//! Real time only enters the game here: every frame the game clock is advanced to the
//! milliseconds elapsed since launch, and the resulting events drive effects and saving.

use crate::GameConfig;
use crate::confetti::Confetti;
use crate::game::{Game, GameEvent, Occupant, Phase};
use crate::input::{Action, key_to_action};
use crate::persist::SessionStore;
use crate::ranking::{Leaderboard, LocalRanking, RankingError, RankingRecord, SharedRanking};
use crate::theme::Theme;
use anyhow::Result;
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEventKind};
use ratatui::DefaultTerminal;
use ratatui::layout::{Position, Rect};
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// Longest name accepted in the ranking.
const MAX_NAME_LEN: usize = 16;

/// Dialog drawn over the board.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    None,
    /// Top entries, or why they could not be read.
    Ranking(Result<Vec<RankingRecord>, String>),
    ConfirmReset,
}

/// Name input shown in a result modal when the run can be ranked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameEntry {
    pub name: String,
    /// Last submission problem; the typed name is kept.
    pub error: Option<String>,
}

/// Acknowledgment flash over a petted hole.
pub struct PetFlash {
    pub pos: usize,
    pub occupant: Occupant,
    pub glyph: &'static str,
    /// Created on first draw, once the hole's rect is known.
    pub effect: Option<Effect>,
    pub last_process: Option<Instant>,
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    game: Game,
    /// None when persistence is disabled.
    store: Option<SessionStore>,
    leaderboard: Box<dyn Leaderboard>,
    /// Game time zero.
    epoch: Instant,
    /// Game time held while an overlay is open.
    frozen_ms: Option<u64>,
    overlay: Overlay,
    entry: Option<NameEntry>,
    /// Shown in the result modal after a ranking submission.
    notice: Option<String>,
    flashes: Vec<PetFlash>,
    confetti: Option<Confetti>,
    last_frame: Instant,
    /// Area of the last draw, for mouse hit testing.
    area: Rect,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Result<Self> {
        let mut game = Game::new(config.rules.clone(), config.seed);
        let store = config
            .rules
            .persistence_enabled
            .then(|| SessionStore::new(&config.data_dir));
        if let Some(progress) = store.as_ref().and_then(|s| s.restore(Utc::now())) {
            game.restore(progress);
        }
        let leaderboard: Box<dyn Leaderboard> = match &config.shared_ranking {
            Some(path) => Box::new(SharedRanking::new(path.clone())),
            None => Box::new(LocalRanking::new(&config.data_dir)),
        };
        let now = Instant::now();
        Ok(Self {
            config,
            theme,
            game,
            store,
            leaderboard,
            epoch: now,
            frozen_ms: None,
            overlay: Overlay::None,
            entry: None,
            notice: None,
            flashes: Vec::new(),
            confetti: None,
            last_frame: now,
            area: Rect::default(),
        })
    }

    fn game_ms(&self) -> u64 {
        self.frozen_ms
            .unwrap_or_else(|| self.epoch.elapsed().as_millis() as u64)
    }

    /// Show a dialog. Game time stands still until it is closed.
    fn open_overlay(&mut self, overlay: Overlay) {
        if self.frozen_ms.is_none() {
            self.frozen_ms = Some(self.game_ms());
        }
        self.overlay = overlay;
    }

    fn close_overlay(&mut self) {
        self.overlay = Overlay::None;
        if let Some(ms) = self.frozen_ms.take() {
            let now = Instant::now();
            self.epoch = now.checked_sub(Duration::from_millis(ms)).unwrap_or(now);
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let mut terminal = ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        let result = self.run_loop(&mut terminal);

        // Restore
        let _ = execute!(std::io::stdout(), DisableMouseCapture);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        self.save_on_exit();
        result
    }

    fn save_on_exit(&self) {
        if self.game.session().has_progress() {
            self.save(self.game.session().progress());
        }
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.config.frame_rate);
        loop {
            let now = Instant::now();
            self.tick(now);

            terminal.draw(|f| {
                self.area = f.area();
                crate::ui::draw(
                    f,
                    &self.game,
                    &self.theme,
                    &self.overlay,
                    self.entry.as_ref(),
                    self.notice.as_deref(),
                    &mut self.flashes,
                    self.confetti.as_ref(),
                    now,
                );
            })?;
            self.flashes
                .retain(|fl| !fl.effect.as_ref().is_some_and(Effect::done));

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if !event::poll(timeout)? {
                continue;
            }
            while event::poll(Duration::ZERO)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if !self.handle_key(key) {
                            return Ok(());
                        }
                    }
                    Event::Mouse(m) if m.kind == MouseEventKind::Down(MouseButton::Left) => {
                        self.handle_click(m.column, m.row);
                    }
                    Event::Resize(w, h) => {
                        if let Some(c) = self.confetti.as_mut() {
                            c.resize(w, h);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Fire due game timers and move effects along.
    fn tick(&mut self, now: Instant) {
        let events = self.game.advance(self.game_ms());
        self.apply(events);

        let delta = now.saturating_duration_since(self.last_frame).as_millis() as u64;
        self.last_frame = now;
        if let Some(c) = self.confetti.as_mut() {
            c.step(delta);
            if c.is_done() {
                self.confetti = None;
            }
        }
    }

    fn apply(&mut self, events: Vec<GameEvent>) {
        for event in events {
            match event {
                GameEvent::Petted {
                    pos,
                    occupant,
                    glyph,
                } if !self.config.no_animation => {
                    self.flashes.retain(|f| f.pos != pos);
                    self.flashes.push(PetFlash {
                        pos,
                        occupant,
                        glyph,
                        effect: None,
                        last_process: None,
                    });
                }
                GameEvent::CellShown { pos, .. } => self.flashes.retain(|f| f.pos != pos),
                GameEvent::Checkpoint(progress) => self.save(progress),
                GameEvent::ProgressCleared => {
                    if let Some(Err(err)) = self.store.as_ref().map(SessionStore::clear) {
                        tracing::warn!(%err, "could not clear saved session");
                    }
                }
                GameEvent::LevelStarted(_) => {
                    self.entry = None;
                    self.notice = None;
                    self.confetti = None;
                }
                GameEvent::GameOver(_) => {
                    self.entry = self.game.can_submit().then(NameEntry::default);
                }
                GameEvent::Finale { .. } => {
                    self.entry = self.game.can_submit().then(NameEntry::default);
                    if !self.config.no_animation {
                        self.confetti = Some(Confetti::new(self.area.width, self.area.height));
                    }
                }
                _ => {}
            }
        }
    }

    fn save(&self, progress: crate::game::Progress) {
        if let Some(Err(err)) = self.store.as_ref().map(|s| s.save(progress, Utc::now())) {
            tracing::warn!(%err, "could not save session");
        }
    }

    /// Returns false when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.overlay {
            Overlay::ConfirmReset => {
                self.close_overlay();
                if matches!(key.code, KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y')) {
                    self.reset();
                }
                return true;
            }
            Overlay::Ranking(_) => {
                self.close_overlay();
                return true;
            }
            Overlay::None => {}
        }

        if self.entry.is_some() {
            self.handle_name_key(key);
            return true;
        }

        match key_to_action(key) {
            Action::Pet(pos) => {
                if self.game.phase() == Phase::Playing {
                    let events = self.game.advance(self.game_ms());
                    self.apply(events);
                    let events = self.game.pet(pos);
                    self.apply(events);
                }
            }
            Action::Confirm => {
                let events = match self.game.phase() {
                    Phase::Idle => self.game.start(),
                    p if p.is_terminal() => self.game.restart(),
                    _ => Vec::new(),
                };
                self.apply(events);
            }
            Action::Cancel => {
                let events = self.game.cancel();
                self.apply(events);
            }
            Action::Reset => {
                if self.game.session().has_progress() {
                    self.open_overlay(Overlay::ConfirmReset);
                } else {
                    self.reset();
                }
            }
            Action::Ranking => {
                if self.game.phase() != Phase::Playing {
                    let top = self.leaderboard.top().map_err(|e| e.to_string());
                    self.open_overlay(Overlay::Ranking(top));
                }
            }
            Action::Quit => {
                if self.game.phase().is_terminal() {
                    self.confetti = None;
                    self.notice = None;
                    let events = self.game.dismiss();
                    self.apply(events);
                } else {
                    return false;
                }
            }
            Action::None => {}
        }
        true
    }

    fn handle_name_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => return self.submit_entry(),
            KeyCode::Esc => {
                self.entry = None;
                return;
            }
            _ => {}
        }
        let Some(entry) = self.entry.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Backspace => {
                entry.name.pop();
            }
            KeyCode::Char(c) if !c.is_control() && entry.name.chars().count() < MAX_NAME_LEN => {
                entry.name.push(c);
            }
            _ => {}
        }
    }

    fn submit_entry(&mut self) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };
        let (level, score) = self.game.record_entry();
        let result = RankingRecord::new(&entry.name, level, score, Utc::now())
            .and_then(|record| self.leaderboard.submit(record));
        match result {
            Ok(()) => {
                tracing::info!(level, score, "ranking submitted");
                self.notice = Some(self.leaderboard.label().to_string());
                self.entry = None;
            }
            Err(RankingError::EmptyName) => {
                entry.error = Some(RankingError::EmptyName.to_string());
            }
            Err(err) => {
                tracing::warn!(%err, "ranking submission failed");
                entry.error = Some(format!("Could not save ({err}). Please try again."));
            }
        }
    }

    fn reset(&mut self) {
        self.confetti = None;
        self.notice = None;
        self.entry = None;
        let events = self.game.reset();
        self.apply(events);
    }

    fn handle_click(&mut self, column: u16, row: u16) {
        if self.overlay != Overlay::None || self.game.phase() != Phase::Playing {
            return;
        }
        let rects = crate::ui::hole_rects(crate::ui::board_area(self.area), self.game.holes());
        let hit = rects
            .iter()
            .position(|r| r.contains(Position::new(column, row)));
        if let Some(pos) = hit {
            let events = self.game.advance(self.game_ms());
            self.apply(events);
            let events = self.game.pet(pos);
            self.apply(events);
        }
    }
}
