//! Finale confetti: coloured specks drifting down the whole screen.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ratatui::style::Color;

pub const INITIAL_PARTICLES: usize = 150;
/// Chance per step of adding a particle while below the initial count.
const REFILL_CHANCE: f64 = 0.3;
/// Refill only during the first few seconds so the shower ends.
const REFILL_WINDOW_MS: u64 = 3000;

const COLORS: [Color; 12] = [
    Color::Rgb(0xff, 0x6b, 0x6b),
    Color::Rgb(0x4e, 0xcd, 0xc4),
    Color::Rgb(0x45, 0xb7, 0xd1),
    Color::Rgb(0xf9, 0xca, 0x24),
    Color::Rgb(0x6c, 0x5c, 0xe7),
    Color::Rgb(0xa2, 0x9b, 0xfe),
    Color::Rgb(0xfd, 0x79, 0xa8),
    Color::Rgb(0xfd, 0xcb, 0x6e),
    Color::Rgb(0xe1, 0x70, 0x55),
    Color::Rgb(0x74, 0xb9, 0xff),
    Color::Rgb(0x55, 0xef, 0xc4),
    Color::Rgb(0xff, 0xea, 0xa7),
];

/// Quarter blocks cycled by rotation to fake a spin.
const SPIN_GLYPHS: [&str; 4] = ["▘", "▝", "▗", "▖"];

#[derive(Debug, Clone)]
pub struct Particle {
    /// Column, in terminal cells.
    pub x: f32,
    /// Row, in terminal cells; negative while above the top edge.
    pub y: f32,
    /// Cells per second.
    speed_x: f32,
    speed_y: f32,
    /// Degrees.
    rotation: f32,
    /// Degrees per second.
    spin: f32,
    pub color: Color,
}

impl Particle {
    pub fn glyph(&self) -> &'static str {
        let quarter = (self.rotation.rem_euclid(360.0) / 90.0) as usize;
        SPIN_GLYPHS[quarter % 4]
    }
}

#[derive(Debug)]
pub struct Confetti {
    particles: Vec<Particle>,
    width: f32,
    height: f32,
    elapsed_ms: u64,
    rng: StdRng,
}

impl Confetti {
    pub fn new(width: u16, height: u16) -> Self {
        Self::with_rng(width, height, StdRng::from_entropy())
    }

    pub fn with_rng(width: u16, height: u16, rng: StdRng) -> Self {
        let mut c = Self {
            particles: Vec::with_capacity(INITIAL_PARTICLES),
            width: f32::from(width.max(1)),
            height: f32::from(height.max(1)),
            elapsed_ms: 0,
            rng,
        };
        for _ in 0..INITIAL_PARTICLES {
            c.spawn_particle();
        }
        c
    }

    fn spawn_particle(&mut self) {
        let rng = &mut self.rng;
        self.particles.push(Particle {
            x: rng.gen_range(0.0..self.width),
            // Stagger the start so the first wave does not land as one line.
            y: -rng.gen_range(1.0..self.height.max(2.0)),
            speed_x: rng.gen_range(-1.5..1.5),
            speed_y: rng.gen_range(4.0..10.0),
            rotation: rng.gen_range(0.0..360.0),
            spin: rng.gen_range(-300.0..300.0),
            color: COLORS[rng.gen_range(0..COLORS.len())],
        });
    }

    /// Follow a terminal resize.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = f32::from(width.max(1));
        self.height = f32::from(height.max(1));
    }

    /// Move every particle by `delta_ms` and drop the ones that left the bottom.
    pub fn step(&mut self, delta_ms: u64) {
        let dt = delta_ms as f32 / 1000.0;
        let height = self.height;
        self.particles.retain_mut(|p| {
            p.x += p.speed_x * dt;
            p.y += p.speed_y * dt;
            p.rotation += p.spin * dt;
            p.y < height
        });
        self.elapsed_ms += delta_ms;
        if self.elapsed_ms < REFILL_WINDOW_MS
            && self.particles.len() < INITIAL_PARTICLES
            && self.rng.gen_bool(REFILL_CHANCE)
        {
            self.spawn_particle();
        }
    }

    /// On-screen particles.
    pub fn visible(&self) -> impl Iterator<Item = &Particle> {
        self.particles
            .iter()
            .filter(|p| p.y >= 0.0 && p.x >= 0.0 && p.x < self.width)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_done(&self) -> bool {
        self.particles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confetti() -> Confetti {
        Confetti::with_rng(80, 24, StdRng::seed_from_u64(5))
    }

    #[test]
    fn starts_full_and_above_screen() {
        let c = confetti();
        assert_eq!(c.len(), INITIAL_PARTICLES);
        assert_eq!(c.visible().count(), 0);
    }

    #[test]
    fn particles_fall_into_view() {
        let mut c = confetti();
        for _ in 0..30 {
            c.step(16);
        }
        assert!(c.visible().count() > 0);
    }

    #[test]
    fn shower_ends() {
        let mut c = confetti();
        for _ in 0..200 {
            c.step(100);
        }
        assert!(c.is_done());
    }

    #[test]
    fn glyph_follows_rotation() {
        let mut c = confetti();
        let glyphs: Vec<_> = c.particles.iter().map(Particle::glyph).collect();
        assert!(glyphs.iter().all(|g| SPIN_GLYPHS.contains(g)));
        c.particles[0].rotation = -10.0;
        assert_eq!(c.particles[0].glyph(), "▖");
    }
}
