//! nekotui — pet-the-cat reflex minigame in the terminal.

mod app;
mod config;
mod confetti;
mod game;
mod input;
mod persist;
mod ranking;
mod schedule;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use config::Ruleset;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Options derived from CLI that affect game behaviour (rules, storage, rendering).
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub rules: Ruleset,
    pub data_dir: PathBuf,
    pub shared_ranking: Option<PathBuf>,
    pub seed: Option<u64>,
    pub no_animation: bool,
    pub frame_rate: f64,
}

impl GameConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut rules = match args.mode {
            GameMode::Classic => Ruleset::default(),
            GameMode::Gentle => Ruleset::gentle(),
        };
        if let Some(path) = &args.levels {
            rules = rules
                .with_overrides(path)
                .with_context(|| format!("loading rules from {}", path.display()))?;
        }
        if args.no_persist {
            rules.persistence_enabled = false;
        }
        Ok(Self {
            rules,
            data_dir: args.data_dir.clone().unwrap_or_else(persist::default_dir),
            shared_ranking: args.shared_ranking.clone(),
            seed: args.seed,
            no_animation: args.no_animation,
            frame_rate: args.frame_rate.clamp(5.0, 120.0),
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig::from_args(&args)?;
    tracing::info!(mode = ?args.mode, holes = config.rules.holes, "starting");
    let mut app = App::new(config, theme)?;
    app.run()?;
    Ok(())
}

/// Log to a file; the terminal belongs to the UI. `RUST_LOG` overrides the `info` default.
fn init_logging(path: &Path) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Pet the cats before they run off; never touch a trap.
#[derive(Debug, Parser)]
#[command(
    name = "nekotui",
    version,
    about = "Pet-the-cat reflex minigame in the terminal. Pet every cat before it runs off, never touch a trap.",
    long_about = "nekotui is a whack-a-mole style reflex game.\n\n\
        Cats pop out of the holes. Pet each one (press its number key or click it) before it \
        runs off, or the game is over. In classic mode traps (🦴 🐶) appear too: leave them alone. \
        Survive 30 seconds to clear a level; there are 7 levels, each faster than the last.\n\n\
        CONTROLS:\n  1-9 0 - =   Pet hole       Enter/Space  Start / continue\n  \
        c           Cancel level   r            Reset progress\n  k / Tab     Ranking        q / Esc      Quit / close\n\n\
        Progress is saved and restored if you come back within five minutes."
)]
pub struct Args {
    /// Game mode: classic (cats and traps) or gentle (cats only).
    #[arg(short, long, default_value = "classic")]
    pub mode: GameMode,

    /// TOML file overriding board size, round length and the level table.
    #[arg(long, value_name = "FILE")]
    pub levels: Option<PathBuf>,

    /// Do not save or restore progress between runs.
    #[arg(long)]
    pub no_persist: bool,

    /// Directory for the session snapshot and local ranking. Defaults to ~/.config/nekotui.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Shared ranking file (JSON lines) several players append to, instead of the local top 10.
    #[arg(long, value_name = "FILE")]
    pub shared_ranking: Option<PathBuf>,

    /// Seed for reproducible spawns.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]="value"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Disable pet flash and confetti.
    #[arg(long)]
    pub no_animation: bool,

    /// Target render frames per second.
    #[arg(long, default_value = "30.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Write logs to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GameMode {
    /// Cats and traps.
    #[default]
    Classic,
    /// Cats only.
    Gentle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gentle_mode_disables_traps() {
        let args = Args::parse_from(["nekotui", "--mode", "gentle", "--no-persist"]);
        let config = GameConfig::from_args(&args).unwrap();
        assert!(!config.rules.penalties_enabled);
        assert!(!config.rules.persistence_enabled);
    }

    #[test]
    fn defaults_are_classic() {
        let args = Args::parse_from(["nekotui"]);
        let config = GameConfig::from_args(&args).unwrap();
        assert_eq!(config.rules, Ruleset::default());
        assert!(config.shared_ranking.is_none());
    }

    #[test]
    fn missing_rules_file_is_an_error() {
        let args = Args::parse_from(["nekotui", "--levels", "/nonexistent/rules.toml"]);
        assert!(GameConfig::from_args(&args).is_err());
    }
}
