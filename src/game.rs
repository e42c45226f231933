//! Game state: session, board, round clock, spawner and cell outcome resolution.
//!
//! This is a pure state machine driven by three inputs: player commands (`start`, `pet`,
//! `restart`, ...), and `advance(now_ms)` which fires every timer that has come due on the
//! virtual clock. Each input returns the [`GameEvent`]s it caused; the UI and persistence
//! layers observe those and never mutate game state themselves.
//!
//! All timers (clock tick, next spawn, per-cell expiry, sprung trap) live in one
//! [`TimerQueue`], so [`Game::stop`] cancels everything in a single call.

use crate::config::{PET_ACK_MS, Ruleset, SPAWN_RETRY_MS};
use crate::schedule::{TimerId, TimerQueue};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Points for one petted cat, multiplied by the level.
pub const SCORE_PER_LEVEL: u32 = 10;

const CLOCK_TICK_MS: u64 = 1000;

/// What sits in an active hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    /// A cat: pet it for points, let it run off and the game is lost.
    Reward,
    /// A trap: touch it and the game is lost, ignore it and it goes away.
    Penalty,
}

/// One hole, as the renderer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Dormant,
    Active {
        occupant: Occupant,
        glyph: &'static str,
    },
}

/// Live, not yet resolved occupant of a hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveCell {
    pub occupant: Occupant,
    pub glyph: &'static str,
    /// Distinguishes successive occupants of the same hole.
    activation: u64,
    expiry: TimerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossReason {
    /// A cat was not petted in time.
    Abandoned,
    /// A trap was touched.
    Trap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the player to start the current level.
    Idle,
    Playing,
    /// Round clock ran out; `session.level` already points at the next level.
    LevelComplete,
    GameOver(LossReason),
    /// Last level cleared.
    Finale,
}

impl Phase {
    /// A result modal is showing.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::LevelComplete | Self::GameOver(_) | Self::Finale)
    }
}

/// The part of a session worth keeping across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub level: u32,
    pub score: u32,
    pub last_cleared_level: u32,
    pub last_cleared_score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub level: u32,
    pub score: u32,
    pub time_left: u32,
    pub is_playing: bool,
    pub last_cleared_level: u32,
    pub last_cleared_score: u32,
}

impl Session {
    fn fresh(round_secs: u32) -> Self {
        Self {
            level: 1,
            score: 0,
            time_left: round_secs,
            is_playing: false,
            last_cleared_level: 0,
            last_cleared_score: 0,
        }
    }

    pub fn progress(&self) -> Progress {
        Progress {
            level: self.level,
            score: self.score,
            last_cleared_level: self.last_cleared_level,
            last_cleared_score: self.last_cleared_score,
        }
    }

    /// Anything that a reset would throw away.
    pub fn has_progress(&self) -> bool {
        self.level > 1 || self.score > 0
    }
}

/// State deltas, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    LevelStarted(u32),
    CellShown {
        pos: usize,
        occupant: Occupant,
        glyph: &'static str,
    },
    CellHidden {
        pos: usize,
    },
    /// The player touched an active cell.
    Petted {
        pos: usize,
        occupant: Occupant,
        glyph: &'static str,
    },
    ScoreChanged(u32),
    TimeChanged(u32),
    LevelComplete {
        cleared: u32,
        next: u32,
    },
    Finale {
        score: u32,
    },
    GameOver(LossReason),
    /// Progress changed in a way worth saving.
    Checkpoint(Progress),
    /// Progress was reset; any saved copy is stale.
    ProgressCleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    ClockTick,
    Spawn,
    Expire { pos: usize, activation: u64 },
    TrapSprung,
}

pub struct Game {
    rules: Ruleset,
    session: Session,
    phase: Phase,
    /// Position -> live occupant. A position is here iff its hole is active.
    active: BTreeMap<usize, ActiveCell>,
    timers: TimerQueue<Task>,
    rng: StdRng,
    now_ms: u64,
    next_activation: u64,
    events: Vec<GameEvent>,
}

impl Game {
    /// New game at level 1. `seed` makes spawns reproducible.
    pub fn new(rules: Ruleset, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            session: Session::fresh(rules.round_secs),
            rules,
            phase: Phase::Idle,
            active: BTreeMap::new(),
            timers: TimerQueue::new(),
            rng,
            now_ms: 0,
            next_activation: 0,
            events: Vec::new(),
        }
    }

    /// Load saved progress. Only applies while idle; the level is clamped into the table.
    pub fn restore(&mut self, progress: Progress) {
        if self.phase != Phase::Idle {
            return;
        }
        let max = self.rules.max_level();
        self.session = Session {
            level: progress.level.clamp(1, max),
            score: progress.score,
            time_left: self.rules.round_secs,
            is_playing: false,
            last_cleared_level: progress.last_cleared_level.min(max),
            last_cleared_score: progress.last_cleared_score,
        };
    }

    pub fn rules(&self) -> &Ruleset {
        &self.rules
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn holes(&self) -> usize {
        self.rules.holes
    }

    pub fn cell(&self, pos: usize) -> Cell {
        match self.active.get(&pos) {
            Some(a) => Cell::Active {
                occupant: a.occupant,
                glyph: a.glyph,
            },
            None => Cell::Dormant,
        }
    }

    #[cfg(test)]
    pub fn is_active(&self, pos: usize) -> bool {
        self.active.contains_key(&pos)
    }

    #[cfg(test)]
    pub fn active_cells(&self) -> impl Iterator<Item = (usize, &ActiveCell)> {
        self.active.iter().map(|(p, a)| (*p, a))
    }

    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Timers that have neither fired nor been cancelled.
    #[cfg(test)]
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Level and score shown in the result modal: the last level actually cleared.
    pub fn reached(&self) -> (u32, u32) {
        (
            self.session.last_cleared_level,
            self.session.last_cleared_score,
        )
    }

    /// A ranking entry may be submitted from this result.
    pub fn can_submit(&self) -> bool {
        matches!(self.phase, Phase::GameOver(_) | Phase::Finale) && self.session.last_cleared_level > 0
    }

    /// Level and score a ranking entry would record.
    pub fn record_entry(&self) -> (u32, u32) {
        if self.session.last_cleared_level > 0 {
            self.reached()
        } else {
            (self.session.level, self.session.score)
        }
    }

    // ── Commands ──

    /// Begin the current level. Partial progress from an abandoned attempt is discarded.
    pub fn start(&mut self) -> Vec<GameEvent> {
        if self.phase == Phase::Playing {
            return Vec::new();
        }
        self.phase = Phase::Playing;
        self.session.is_playing = true;
        self.session.time_left = self.rules.round_secs;
        self.session.score = self.session.last_cleared_score;
        tracing::info!(
            level = self.session.level,
            score = self.session.score,
            "level started"
        );
        self.events.push(GameEvent::LevelStarted(self.session.level));
        self.events.push(GameEvent::ScoreChanged(self.session.score));
        self.events.push(GameEvent::TimeChanged(self.session.time_left));
        self.checkpoint();
        self.timers
            .schedule_first(self.now_ms + CLOCK_TICK_MS, Task::ClockTick);
        self.spawn_next();
        self.take_events()
    }

    /// Touch the hole at `pos`. No effect unless it holds a live occupant.
    pub fn pet(&mut self, pos: usize) -> Vec<GameEvent> {
        if !self.session.is_playing {
            return Vec::new();
        }
        let Some(cell) = self.deactivate(pos) else {
            return Vec::new();
        };
        // Petted goes before CellHidden so the flash knows what was there.
        let hidden = self.events.pop();
        self.events.push(GameEvent::Petted {
            pos,
            occupant: cell.occupant,
            glyph: cell.glyph,
        });
        self.events.extend(hidden);
        match cell.occupant {
            Occupant::Reward => {
                self.session.score += SCORE_PER_LEVEL * self.session.level;
                self.events.push(GameEvent::ScoreChanged(self.session.score));
                self.checkpoint();
            }
            Occupant::Penalty => {
                self.timers.schedule(self.now_ms + PET_ACK_MS, Task::TrapSprung);
            }
        }
        self.take_events()
    }

    /// Move the virtual clock to `now_ms`, firing every timer due by then.
    pub fn advance(&mut self, now_ms: u64) -> Vec<GameEvent> {
        while let Some((_, due, task)) = self.timers.pop_due(now_ms) {
            self.now_ms = self.now_ms.max(due);
            match task {
                Task::ClockTick => self.clock_tick(due),
                Task::Spawn => self.spawn_next(),
                Task::Expire { pos, activation } => self.expire(pos, activation),
                Task::TrapSprung => {
                    if self.session.is_playing {
                        self.game_over(LossReason::Trap);
                    }
                }
            }
        }
        self.now_ms = self.now_ms.max(now_ms);
        self.take_events()
    }

    /// From a result modal: next level after a clear, same level after a loss,
    /// fresh game after the finale.
    pub fn restart(&mut self) -> Vec<GameEvent> {
        match self.phase {
            Phase::LevelComplete | Phase::GameOver(_) => self.start(),
            Phase::Finale => self.play_again(),
            Phase::Idle | Phase::Playing => Vec::new(),
        }
    }

    /// Close a result modal without starting anything.
    pub fn dismiss(&mut self) -> Vec<GameEvent> {
        match self.phase {
            Phase::LevelComplete | Phase::GameOver(_) => {
                self.phase = Phase::Idle;
                self.session.time_left = self.rules.round_secs;
                self.events.push(GameEvent::TimeChanged(self.session.time_left));
                self.take_events()
            }
            Phase::Finale => self.play_again(),
            Phase::Idle | Phase::Playing => Vec::new(),
        }
    }

    /// Abort the running level and throw all progress away.
    pub fn cancel(&mut self) -> Vec<GameEvent> {
        if self.phase != Phase::Playing {
            return Vec::new();
        }
        self.reset()
    }

    /// Back to level 1 with score 0, from any state.
    pub fn reset(&mut self) -> Vec<GameEvent> {
        self.stop();
        self.session = Session::fresh(self.rules.round_secs);
        self.phase = Phase::Idle;
        tracing::info!("progress reset");
        self.events.push(GameEvent::ProgressCleared);
        self.events.push(GameEvent::ScoreChanged(0));
        self.events.push(GameEvent::TimeChanged(self.session.time_left));
        self.take_events()
    }

    /// Start over after the finale.
    pub fn play_again(&mut self) -> Vec<GameEvent> {
        self.reset()
    }

    /// Stop the level: cancel every timer and clear the board. Returns how many timers were pending.
    pub fn stop(&mut self) -> usize {
        self.session.is_playing = false;
        let cancelled = self.timers.cancel_all();
        let positions: Vec<usize> = self.active.keys().copied().collect();
        self.active.clear();
        for pos in positions {
            self.events.push(GameEvent::CellHidden { pos });
        }
        tracing::debug!(cancelled, "level stopped");
        cancelled
    }

    // ── Timers ──

    fn clock_tick(&mut self, due: u64) {
        if !self.session.is_playing {
            return;
        }
        self.session.time_left = self.session.time_left.saturating_sub(1);
        self.events.push(GameEvent::TimeChanged(self.session.time_left));
        if self.session.time_left == 0 {
            self.level_complete();
        } else {
            // Ahead of expiries due at the same instant: a round that runs out is cleared.
            self.timers.schedule_first(due + CLOCK_TICK_MS, Task::ClockTick);
        }
    }

    fn spawn_next(&mut self) {
        if !self.session.is_playing {
            return;
        }
        let dormant: Vec<usize> = (0..self.rules.holes)
            .filter(|p| !self.active.contains_key(p))
            .collect();
        if dormant.is_empty() {
            tracing::debug!("board full, retrying spawn");
            self.timers.schedule(self.now_ms + SPAWN_RETRY_MS, Task::Spawn);
            return;
        }
        let timing = self.rules.timing(self.session.level);
        let pos = dormant[self.rng.gen_range(0..dormant.len())];
        let occupant = if self.rules.penalties_enabled && !self.rng.gen_bool(self.rules.reward_weight) {
            Occupant::Penalty
        } else {
            Occupant::Reward
        };
        let pool = match occupant {
            Occupant::Reward => self.rules.reward_glyphs(),
            Occupant::Penalty => self.rules.penalty_glyphs(),
        };
        let glyph = pool[self.rng.gen_range(0..pool.len())];

        let activation = self.next_activation;
        self.next_activation += 1;
        let expiry = self
            .timers
            .schedule(self.now_ms + timing.show_ms, Task::Expire { pos, activation });
        self.active.insert(
            pos,
            ActiveCell {
                occupant,
                glyph,
                activation,
                expiry,
            },
        );
        self.events.push(GameEvent::CellShown {
            pos,
            occupant,
            glyph,
        });
        self.timers.schedule(self.now_ms + timing.spawn_ms, Task::Spawn);
    }

    fn expire(&mut self, pos: usize, activation: u64) {
        if !self.session.is_playing {
            return;
        }
        if self.active.get(&pos).map(|a| a.activation) != Some(activation) {
            return;
        }
        let Some(cell) = self.deactivate(pos) else {
            return;
        };
        if cell.occupant == Occupant::Reward {
            self.game_over(LossReason::Abandoned);
        }
    }

    /// Remove `pos` from the active set and cancel its expiry.
    fn deactivate(&mut self, pos: usize) -> Option<ActiveCell> {
        let cell = self.active.remove(&pos)?;
        self.timers.cancel(cell.expiry);
        self.events.push(GameEvent::CellHidden { pos });
        Some(cell)
    }

    // ── Transitions ──

    fn level_complete(&mut self) {
        self.stop();
        let cleared = self.session.level;
        self.session.last_cleared_level = cleared;
        self.session.last_cleared_score = self.session.score;
        if cleared < self.rules.max_level() {
            self.session.level += 1;
            self.phase = Phase::LevelComplete;
            tracing::info!(cleared, score = self.session.score, "level complete");
            self.events.push(GameEvent::LevelComplete {
                cleared,
                next: self.session.level,
            });
        } else {
            self.phase = Phase::Finale;
            tracing::info!(score = self.session.score, "all levels cleared");
            self.events.push(GameEvent::Finale {
                score: self.session.score,
            });
        }
        self.checkpoint();
    }

    fn game_over(&mut self, reason: LossReason) {
        self.stop();
        self.session.score = self.session.last_cleared_score;
        self.phase = Phase::GameOver(reason);
        tracing::info!(
            ?reason,
            level = self.session.level,
            reached = self.session.last_cleared_level,
            "game over"
        );
        self.events.push(GameEvent::ScoreChanged(self.session.score));
        self.events.push(GameEvent::GameOver(reason));
        self.checkpoint();
    }

    fn checkpoint(&mut self) {
        self.events.push(GameEvent::Checkpoint(self.session.progress()));
    }

    fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LevelTiming;

    fn gentle() -> Game {
        Game::new(Ruleset::gentle(), Some(7))
    }

    /// Classic rules where every spawn is a trap.
    fn traps_only() -> Game {
        let rules = Ruleset {
            reward_weight: 0.0,
            ..Ruleset::default()
        };
        Game::new(rules, Some(7))
    }

    fn pet_all_cats(game: &mut Game) -> Vec<GameEvent> {
        let cats: Vec<usize> = game
            .active_cells()
            .filter(|(_, c)| c.occupant == Occupant::Reward)
            .map(|(p, _)| p)
            .collect();
        cats.into_iter().flat_map(|p| game.pet(p)).collect()
    }

    /// Step the clock, petting every cat as soon as it shows, until the level ends.
    fn play_perfectly(game: &mut Game) -> Vec<GameEvent> {
        let mut events = pet_all_cats(game);
        while game.phase() == Phase::Playing {
            let next = game.now_ms() + 10;
            events.extend(game.advance(next));
            events.extend(pet_all_cats(game));
        }
        events
    }

    fn shown(events: &[GameEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, GameEvent::CellShown { .. }))
            .count()
    }

    #[test]
    fn start_spawns_one_cell_and_starts_clock() {
        let mut game = gentle();
        let events = game.start();
        assert_eq!(game.phase(), Phase::Playing);
        assert_eq!(shown(&events), 1);
        assert_eq!(game.active_count(), 1);
        // expiry + next spawn + clock tick
        assert_eq!(game.pending_timers(), 3);
        assert!(events.contains(&GameEvent::TimeChanged(30)));
    }

    #[test]
    fn five_cats_at_level_three() {
        let mut game = gentle();
        game.restore(Progress {
            level: 3,
            score: 50,
            last_cleared_level: 2,
            last_cleared_score: 50,
        });
        game.start();
        assert_eq!(game.session().score, 50);
        for i in 0..5u64 {
            if i > 0 {
                game.advance(i * 1000);
            }
            assert!(!pet_all_cats(&mut game).is_empty());
        }
        assert_eq!(game.session().score, 200);
        assert_eq!(game.phase(), Phase::Playing);
    }

    #[test]
    fn abandoned_cat_on_level_one_rolls_back_to_zero() {
        let mut game = gentle();
        game.start();
        let events = game.advance(1800);
        assert!(events.contains(&GameEvent::GameOver(LossReason::Abandoned)));
        assert_eq!(game.phase(), Phase::GameOver(LossReason::Abandoned));
        assert_eq!(game.reached(), (0, 0));
        assert_eq!(game.session().score, 0);
        assert!(!game.can_submit());
        assert_eq!(game.active_count(), 0);
        assert_eq!(game.pending_timers(), 0);
    }

    #[test]
    fn cat_expires_exactly_at_show_time() {
        let mut game = gentle();
        game.start();
        assert!(!game.advance(1799).contains(&GameEvent::GameOver(LossReason::Abandoned)));
        assert_eq!(game.phase(), Phase::Playing);
        game.advance(1800);
        assert!(matches!(game.phase(), Phase::GameOver(_)));
    }

    #[test]
    fn petting_pays_once_per_activation() {
        let mut game = gentle();
        game.start();
        let (pos, _) = game.active_cells().next().unwrap();
        let events = game.pet(pos);
        assert!(events.contains(&GameEvent::ScoreChanged(10)));
        assert!(matches!(events[0], GameEvent::Petted { pos: p, .. } if p == pos));
        assert!(game.pet(pos).is_empty());
        // The cancelled expiry must not end the game once its time passes.
        game.advance(1500);
        pet_all_cats(&mut game);
        game.advance(1800);
        assert_eq!(game.phase(), Phase::Playing);
        assert_eq!(game.session().score, 20);
    }

    #[test]
    fn ignored_trap_vanishes_quietly() {
        let mut game = traps_only();
        game.start();
        let events = game.advance(1800);
        assert!(events.iter().any(|e| matches!(e, GameEvent::CellHidden { .. })));
        assert_eq!(game.phase(), Phase::Playing);
    }

    #[test]
    fn touched_trap_ends_game_after_acknowledgment() {
        let mut game = traps_only();
        game.start();
        let (pos, cell) = game.active_cells().next().map(|(p, c)| (p, *c)).unwrap();
        assert_eq!(cell.occupant, Occupant::Penalty);
        let events = game.pet(pos);
        assert!(events.iter().any(|e| matches!(e, GameEvent::Petted { occupant: Occupant::Penalty, .. })));
        assert!(!game.is_active(pos));
        assert_eq!(game.phase(), Phase::Playing);
        assert!(game.pet(pos).is_empty());
        let events = game.advance(PET_ACK_MS);
        assert!(events.contains(&GameEvent::GameOver(LossReason::Trap)));
    }

    #[test]
    fn level_complete_beats_pending_trap() {
        let rules = Ruleset {
            reward_weight: 0.0,
            round_secs: 1,
            ..Ruleset::default()
        };
        let mut game = Game::new(rules, Some(3));
        game.start();
        game.advance(800);
        let (pos, _) = game.active_cells().next().unwrap();
        game.pet(pos);
        let events = game.advance(5000);
        assert!(events.iter().any(|e| matches!(e, GameEvent::LevelComplete { .. })));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::GameOver(_))));
        assert_eq!(game.phase(), Phase::LevelComplete);
    }

    #[test]
    fn round_end_beats_expiry_at_same_instant() {
        let rules = Ruleset {
            round_secs: 2,
            levels: vec![LevelTiming::new(1500, 500), LevelTiming::new(1500, 500)],
            ..Ruleset::gentle()
        };
        let mut game = Game::new(rules, Some(5));
        game.start();
        pet_all_cats(&mut game);
        game.advance(500);
        // Shown at 500, runs off at 2000: the same instant the clock hits zero.
        let (kept, _) = game.active_cells().next().unwrap();
        let mut t = 500;
        while t < 1990 {
            t += 10;
            game.advance(t);
            let others: Vec<usize> = game
                .active_cells()
                .map(|(p, _)| p)
                .filter(|p| *p != kept)
                .collect();
            for p in others {
                game.pet(p);
            }
        }
        assert_eq!(game.phase(), Phase::Playing);
        assert!(game.is_active(kept));

        let events = game.advance(2000);
        assert!(events.contains(&GameEvent::LevelComplete { cleared: 1, next: 2 }));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::GameOver(_))));
        assert_eq!(game.phase(), Phase::LevelComplete);
        assert_eq!(game.pending_timers(), 0);
    }

    #[test]
    fn surviving_the_round_advances_level() {
        let mut game = gentle();
        game.start();
        let events = play_perfectly(&mut game);
        assert_eq!(game.phase(), Phase::LevelComplete);
        assert!(events.contains(&GameEvent::LevelComplete { cleared: 1, next: 2 }));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::GameOver(_))));
        let score = game.session().score;
        assert!(score > 0);
        assert_eq!(game.reached(), (1, score));
        assert_eq!(game.session().time_left, 0);

        game.restart();
        assert_eq!(game.phase(), Phase::Playing);
        assert_eq!(game.session().level, 2);
        assert_eq!(game.session().score, score);
    }

    #[test]
    fn loss_after_clear_rolls_back_and_allows_submission() {
        let mut game = gentle();
        game.start();
        play_perfectly(&mut game);
        let cleared_score = game.session().score;
        game.restart();
        let start = game.now_ms();
        pet_all_cats(&mut game);
        game.advance(start + 1000);
        let events = game.advance(start + 10_000);
        assert!(events.contains(&GameEvent::GameOver(LossReason::Abandoned)));
        assert_eq!(game.session().score, cleared_score);
        assert_eq!(game.session().level, 2);
        assert_eq!(game.reached(), (1, cleared_score));
        assert!(game.can_submit());
        assert_eq!(game.record_entry(), (1, cleared_score));

        game.restart();
        assert_eq!(game.session().level, 2);
        assert_eq!(game.session().score, cleared_score);
    }

    #[test]
    fn clock_at_last_level_triggers_finale() {
        let mut game = gentle();
        game.restore(Progress {
            level: 7,
            score: 900,
            last_cleared_level: 6,
            last_cleared_score: 900,
        });
        game.start();
        let events = play_perfectly(&mut game);
        assert_eq!(game.phase(), Phase::Finale);
        assert_eq!(game.session().level, 7);
        assert!(events.iter().any(|e| matches!(e, GameEvent::Finale { .. })));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::LevelComplete { .. })));
        assert!(game.can_submit());

        game.restart();
        assert_eq!(game.phase(), Phase::Idle);
        assert_eq!(game.session().level, 1);
        assert_eq!(game.session().score, 0);
    }

    #[test]
    fn cancel_stops_every_timer() {
        let mut game = traps_only();
        game.start();
        game.advance(1500);
        assert_eq!(game.active_count(), 2);
        // two expiries, next spawn, clock
        assert_eq!(game.pending_timers(), 4);
        let events = game.cancel();
        assert_eq!(game.pending_timers(), 0);
        assert_eq!(game.active_count(), 0);
        assert!(events.contains(&GameEvent::ProgressCleared));
        assert!(game.advance(100_000).is_empty());
        assert_eq!(game.phase(), Phase::Idle);
    }

    #[test]
    fn full_board_retries_without_consuming_interval() {
        let rules = Ruleset {
            holes: 1,
            reward_weight: 0.0,
            ..Ruleset::default()
        };
        let mut game = Game::new(rules, Some(1));
        game.start();
        assert_eq!(shown(&game.advance(1400)), 0);
        // The lone trap leaves at 1800, the retry scheduled at 1400 fires at 1900.
        assert_eq!(shown(&game.advance(1899)), 0);
        assert!(!game.is_active(0));
        assert_eq!(shown(&game.advance(1900)), 1);
        assert!(game.is_active(0));
    }

    #[test]
    fn cells_alternate_shown_and_hidden() {
        let mut game = gentle();
        let mut events = game.start();
        events.extend(play_perfectly(&mut game));
        let mut active = vec![false; game.holes()];
        for e in &events {
            match e {
                GameEvent::CellShown { pos, .. } => {
                    assert!(!active[*pos]);
                    active[*pos] = true;
                }
                GameEvent::CellHidden { pos } => {
                    assert!(active[*pos]);
                    active[*pos] = false;
                }
                _ => {}
            }
        }
        assert!(active.iter().all(|a| !a));
    }

    #[test]
    fn time_never_goes_negative() {
        let mut game = gentle();
        game.start();
        let events = play_perfectly(&mut game);
        let times: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                GameEvent::TimeChanged(t) => Some(*t),
                _ => None,
            })
            .collect();
        assert_eq!(times.last(), Some(&0));
        assert!(times.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn spawns_follow_level_interval() {
        let rules = Ruleset {
            levels: vec![LevelTiming::new(5000, 1000)],
            reward_weight: 0.0,
            ..Ruleset::default()
        };
        let mut game = Game::new(rules, Some(9));
        game.start();
        assert_eq!(shown(&game.advance(999)), 0);
        assert_eq!(shown(&game.advance(1000)), 1);
        assert_eq!(shown(&game.advance(3000)), 2);
    }

    #[test]
    fn start_discards_partial_progress() {
        let mut game = gentle();
        game.restore(Progress {
            level: 2,
            score: 180,
            last_cleared_level: 1,
            last_cleared_score: 120,
        });
        assert_eq!(game.session().score, 180);
        game.start();
        assert_eq!(game.session().score, 120);
    }

    #[test]
    fn restore_clamps_level() {
        let mut game = gentle();
        game.restore(Progress {
            level: 42,
            score: 0,
            last_cleared_level: 40,
            last_cleared_score: 0,
        });
        assert_eq!(game.session().level, 7);
        assert_eq!(game.session().last_cleared_level, 7);
    }

    #[test]
    fn pet_on_dormant_or_out_of_range_is_noop() {
        let mut game = gentle();
        assert!(game.pet(0).is_empty());
        game.start();
        let dormant = (0..game.holes()).find(|p| !game.is_active(*p)).unwrap();
        assert!(game.pet(dormant).is_empty());
        assert!(game.pet(99).is_empty());
    }
}
