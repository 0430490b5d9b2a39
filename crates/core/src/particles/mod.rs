use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const SIZE_RANGE: std::ops::Range<f32> = 0.75..2.0;
const VEL_X_RANGE: std::ops::Range<f32> = 0.0..0.5;
const VEL_Y_RANGE: std::ops::Range<f32> = 0.5..2.0;
const ROTATION_SPEED_RANGE: std::ops::Range<f32> = 0.75..2.0;

/// Sprite scale applied per unit of particle size.
pub const STAR_SPRITE_SCALE: f32 = 0.05;

/// A single falling star.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StarParticle {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    /// Horizontal drift direction, either `-1.0` or `1.0`.
    pub dir_x: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub rotation_speed: f32,
}

impl StarParticle {
    /// Draws a fresh particle somewhere above the visible area.
    pub fn spawn<R: Rng + ?Sized>(rng: &mut R, width: f32, height: f32) -> Self {
        Self {
            x: rng.gen_range(0.0..width),
            y: rng.gen_range(-height..0.0),
            size: rng.gen_range(SIZE_RANGE),
            dir_x: if rng.gen_bool(0.5) { -1.0 } else { 1.0 },
            vel_x: rng.gen_range(VEL_X_RANGE),
            vel_y: rng.gen_range(VEL_Y_RANGE),
            rotation_speed: rng.gen_range(ROTATION_SPEED_RANGE),
        }
    }

    /// Rotation angle in radians for the given shared accumulator.
    pub fn rotation(&self, accumulator: f32) -> f32 {
        self.rotation_speed * self.dir_x * accumulator
    }

    pub fn sprite_scale(&self) -> f32 {
        STAR_SPRITE_SCALE * self.size
    }
}

/// Fixed pool of star particles drifting down a logical surface.
///
/// Motion is delta scaled: a `delta` of `1.0` is one reference frame, so the
/// perceived speed does not depend on the display refresh rate.
#[derive(Debug)]
pub struct ParticleField {
    stars: Vec<StarParticle>,
    width: f32,
    height: f32,
    rotation: f32,
    rotation_step: f32,
    rng: StdRng,
}

impl ParticleField {
    pub fn new(count: usize, width: f32, height: f32, rotation_step: f32, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let stars = (0..count)
            .map(|_| StarParticle::spawn(&mut rng, width, height))
            .collect();

        Self {
            stars,
            width,
            height,
            rotation: 0.0,
            rotation_step,
            rng,
        }
    }

    /// Moves every particle and recycles those that fell past the bottom
    /// edge. Returns how many were recycled.
    pub fn advance(&mut self, delta: f32) -> usize {
        self.rotation += self.rotation_step * delta;

        let mut recycled = 0;
        for star in &mut self.stars {
            star.x += star.dir_x * star.vel_x * delta;
            star.y += star.vel_y * delta;

            if star.y > self.height {
                *star = StarParticle::spawn(&mut self.rng, self.width, self.height);
                recycled += 1;
            }
        }

        if recycled > 0 {
            tracing::trace!(recycled, "recycled star particles");
        }
        recycled
    }

    pub fn stars(&self) -> &[StarParticle] {
        &self.stars
    }

    /// Current value of the shared rotation accumulator.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_in_ranges(star: &StarParticle, width: f32, height: f32) {
        assert!((0.0..width).contains(&star.x), "x = {}", star.x);
        assert!(star.y < 0.0 && star.y >= -height, "y = {}", star.y);
        assert!(SIZE_RANGE.contains(&star.size));
        assert!(star.dir_x == -1.0 || star.dir_x == 1.0);
        assert!(VEL_X_RANGE.contains(&star.vel_x));
        assert!(VEL_Y_RANGE.contains(&star.vel_y));
        assert!(ROTATION_SPEED_RANGE.contains(&star.rotation_speed));
    }

    #[test]
    fn initial_population_starts_above_the_surface() {
        let field = ParticleField::new(64, 1920.0, 1080.0, 0.02, Some(7));

        assert_eq!(field.len(), 64);
        for star in field.stars() {
            assert_in_ranges(star, 1920.0, 1080.0);
        }
    }

    #[test]
    fn particles_past_the_bottom_are_reinitialised() {
        let mut field = ParticleField::new(16, 1920.0, 1080.0, 0.02, Some(11));
        for star in &mut field.stars {
            star.y = 1079.9;
            star.vel_y = 1.0;
        }

        let recycled = field.advance(1.0);

        assert_eq!(recycled, 16);
        for star in field.stars() {
            assert_in_ranges(star, 1920.0, 1080.0);
        }
    }

    #[test]
    fn motion_scales_with_delta() {
        let mut single = ParticleField::new(1, 1920.0, 1080.0, 0.02, Some(3));
        let mut double = ParticleField::new(1, 1920.0, 1080.0, 0.02, Some(3));
        let start = single.stars()[0];

        single.advance(1.0);
        single.advance(1.0);
        double.advance(2.0);

        let a = single.stars()[0];
        let b = double.stars()[0];
        assert!((a.y - b.y).abs() < 1e-3);
        assert!((a.x - b.x).abs() < 1e-3);
        assert!(a.y > start.y);
        assert!((single.rotation() - 0.04).abs() < 1e-6);
        assert!((double.rotation() - 0.04).abs() < 1e-6);
    }

    #[test]
    fn rotation_follows_speed_and_direction() {
        let star = StarParticle {
            x: 0.0,
            y: 0.0,
            size: 1.0,
            dir_x: -1.0,
            vel_x: 0.0,
            vel_y: 1.0,
            rotation_speed: 1.5,
        };

        assert!((star.rotation(2.0) + 3.0).abs() < 1e-6);
        assert!((star.sprite_scale() - 0.05).abs() < 1e-6);
    }
}
