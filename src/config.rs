//! Rules and level timing: built-in defaults plus an optional TOML override file.
//!
//! The file only needs the keys it changes:
//!
//! ```toml
//! [rules]
//! holes = 8
//! round_secs = 20
//!
//! [[levels]]
//! show_ms = 2000
//! spawn_ms = 1500
//! ```
//!
//! When `[[levels]]` is present it replaces the whole table.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Cats: pet them before they run off.
pub const REWARD_GLYPHS: [&str; 8] = ["😺", "😸", "😻", "🐱", "😽", "😹", "🙀", "🐾"];
/// Traps: touching one ends the game.
pub const PENALTY_GLYPHS: [&str; 2] = ["🦴", "🐶"];
/// Reward pool of the gentle mode. The trap glyphs are cosmetic here and score like cats.
pub const GENTLE_GLYPHS: [&str; 10] = [
    "😺", "😸", "😻", "🐱", "😽", "😹", "🙀", "🐾", "🦴", "🐶",
];

/// Delay before the spawner tries again when every hole is occupied.
pub const SPAWN_RETRY_MS: u64 = 500;
/// Length of the pet acknowledgment; a sprung trap ends the game after it.
pub const PET_ACK_MS: u64 = 300;
/// Upper bound on board size (keys 1-9, 0, -, =).
pub const MAX_HOLES: usize = 12;

/// How long a cell stays up and how often a new one appears, for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTiming {
    pub show_ms: u64,
    pub spawn_ms: u64,
}

impl LevelTiming {
    pub const fn new(show_ms: u64, spawn_ms: u64) -> Self {
        Self { show_ms, spawn_ms }
    }
}

/// Levels 1..=7, hardest last.
pub const DEFAULT_LEVELS: [LevelTiming; 7] = [
    LevelTiming::new(1800, 1400),
    LevelTiming::new(1600, 1200),
    LevelTiming::new(1400, 1000),
    LevelTiming::new(1200, 900),
    LevelTiming::new(1100, 800),
    LevelTiming::new(1000, 750),
    LevelTiming::new(950, 700),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid rules file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid rules: {0}")]
    Invalid(String),
}

/// Everything that makes one game variant differ from another.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruleset {
    /// Number of holes on the board.
    pub holes: usize,
    /// Length of one level in seconds.
    pub round_secs: u32,
    /// Timing per level; `levels.len()` is the last level.
    pub levels: Vec<LevelTiming>,
    /// Classic mode spawns traps; gentle mode only cats.
    pub penalties_enabled: bool,
    /// Save progress so a restart within five minutes picks up where it left off.
    pub persistence_enabled: bool,
    /// Probability that a spawn is a cat when traps are enabled.
    pub reward_weight: f64,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            holes: 10,
            round_secs: 30,
            levels: DEFAULT_LEVELS.to_vec(),
            penalties_enabled: true,
            persistence_enabled: true,
            reward_weight: 0.7,
        }
    }
}

impl Ruleset {
    /// Cats only; the trap glyphs join the cat pool.
    pub fn gentle() -> Self {
        Self {
            penalties_enabled: false,
            ..Self::default()
        }
    }

    pub fn max_level(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Timing for `level` (1-based), clamped into the table.
    pub fn timing(&self, level: u32) -> LevelTiming {
        let idx = (level.max(1) as usize - 1).min(self.levels.len().saturating_sub(1));
        self.levels.get(idx).copied().unwrap_or(DEFAULT_LEVELS[0])
    }

    pub fn reward_glyphs(&self) -> &'static [&'static str] {
        if self.penalties_enabled {
            &REWARD_GLYPHS
        } else {
            &GENTLE_GLYPHS
        }
    }

    pub fn penalty_glyphs(&self) -> &'static [&'static str] {
        &PENALTY_GLYPHS
    }

    /// Overlay a TOML rules file onto `self`. Missing file is an error; missing keys keep current values.
    pub fn with_overrides(mut self, path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let file: TomlConfig = toml::from_str(&text)?;
        if let Some(holes) = file.rules.holes {
            self.holes = holes;
        }
        if let Some(secs) = file.rules.round_secs {
            self.round_secs = secs;
        }
        if let Some(w) = file.rules.reward_weight {
            self.reward_weight = w;
        }
        if let Some(p) = file.rules.persistence {
            self.persistence_enabled = p;
        }
        if !file.levels.is_empty() {
            self.levels = file.levels;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.holes == 0 || self.holes > MAX_HOLES {
            return Err(ConfigError::Invalid(format!(
                "holes must be 1..={MAX_HOLES}, got {}",
                self.holes
            )));
        }
        if self.round_secs == 0 {
            return Err(ConfigError::Invalid("round_secs must be positive".into()));
        }
        if self.levels.is_empty() {
            return Err(ConfigError::Invalid("at least one level is required".into()));
        }
        if let Some(i) = self
            .levels
            .iter()
            .position(|l| l.show_ms == 0 || l.spawn_ms == 0)
        {
            return Err(ConfigError::Invalid(format!(
                "level {} has a zero duration",
                i + 1
            )));
        }
        if !(0.0..=1.0).contains(&self.reward_weight) {
            return Err(ConfigError::Invalid(format!(
                "reward_weight must be within 0..=1, got {}",
                self.reward_weight
            )));
        }
        if !self.is_strictly_harder() {
            tracing::warn!("level table does not get strictly faster level over level");
        }
        Ok(())
    }

    /// Both durations drop on every level.
    pub fn is_strictly_harder(&self) -> bool {
        self.levels
            .windows(2)
            .all(|w| w[1].show_ms < w[0].show_ms && w[1].spawn_ms < w[0].spawn_ms)
    }
}

// ── TOML schema ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    rules: TomlRules,
    #[serde(default)]
    levels: Vec<LevelTiming>,
}

#[derive(Deserialize, Debug, Default)]
struct TomlRules {
    holes: Option<usize>,
    round_secs: Option<u32>,
    reward_weight: Option<f64>,
    persistence: Option<bool>,
}
