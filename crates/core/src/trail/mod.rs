use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{DashboardError, Result};

/// Hue the trail starts with and wraps back to, in degrees.
pub const HUE_WRAP: f32 = 360.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub x: f32,
    pub y: f32,
}

/// Samples `samples` at the fractional index `t` with a cubic Hermite curve
/// whose tangents are central differences (Catmull-Rom). The curve passes
/// through every sample exactly; indices outside the buffer saturate to the
/// nearest endpoint.
pub fn cubic_interpolate(samples: &[f32], t: f32, tangent_factor: f32) -> Result<f32> {
    if samples.is_empty() {
        return Err(DashboardError::EmptyHistory);
    }

    let k = t.floor();
    let f = t - k;
    let k = k as i64;

    let p0 = clip(samples, k);
    let p1 = clip(samples, k + 1);
    let m0 = tangent(samples, k, tangent_factor);
    let m1 = tangent(samples, k + 1, tangent_factor);

    let f2 = f * f;
    let f3 = f2 * f;

    Ok((2.0 * f3 - 3.0 * f2 + 1.0) * p0
        + (f3 - 2.0 * f2 + f) * m0
        + (-2.0 * f3 + 3.0 * f2) * p1
        + (f3 - f2) * m1)
}

fn clip(samples: &[f32], k: i64) -> f32 {
    let last = samples.len() as i64 - 1;
    samples[k.clamp(0, last) as usize]
}

fn tangent(samples: &[f32], k: i64, factor: f32) -> f32 {
    factor * (clip(samples, k + 1) - clip(samples, k - 1)) / 2.0
}

/// Smoothed pointer trail. Keeps the last `history_size` pointer samples,
/// most recent first, and resamples them into `rope_size` points along a
/// cubic spline every update.
#[derive(Debug, Clone)]
pub struct MouseTrailSpline {
    history_x: VecDeque<f32>,
    history_y: VecDeque<f32>,
    points: Vec<TrailPoint>,
    tangent_factor: f32,
}

impl MouseTrailSpline {
    pub fn new(history_size: usize, rope_size: usize, tangent_factor: f32) -> Result<Self> {
        if history_size == 0 || rope_size == 0 {
            return Err(DashboardError::InvalidConfig(format!(
                "trail needs a non-empty history and rope, got {history_size} and {rope_size}"
            )));
        }

        Ok(Self {
            history_x: VecDeque::from(vec![0.0; history_size]),
            history_y: VecDeque::from(vec![0.0; history_size]),
            points: vec![TrailPoint::default(); rope_size],
            tangent_factor,
        })
    }

    /// Pushes the latest pointer position and recomputes the rope.
    pub fn update(&mut self, x: f32, y: f32) -> Result<()> {
        push_front_evicting(&mut self.history_x, x);
        push_front_evicting(&mut self.history_y, y);

        let history_size = self.history_x.len() as f32;
        let rope_size = self.points.len() as f32;
        let xs = self.history_x.make_contiguous();
        let ys = self.history_y.make_contiguous();

        for (i, point) in self.points.iter_mut().enumerate() {
            let t = i as f32 / rope_size * history_size;
            point.x = cubic_interpolate(xs, t, self.tangent_factor)?;
            point.y = cubic_interpolate(ys, t, self.tangent_factor)?;
        }
        Ok(())
    }

    pub fn points(&self) -> &[TrailPoint] {
        &self.points
    }

    pub fn history_size(&self) -> usize {
        self.history_x.len()
    }

    /// Most recent sample first.
    pub fn history(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.history_x.iter().copied().zip(self.history_y.iter().copied())
    }
}

fn push_front_evicting(buffer: &mut VecDeque<f32>, value: f32) {
    buffer.pop_back();
    buffer.push_front(value);
}

/// Latest pointer position plus the hue of the trail ribbon. Moving the
/// pointer cycles the hue backwards by half the travelled distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointerTracker {
    pub x: f32,
    pub y: f32,
    pub hue: f32,
}

impl PointerTracker {
    pub fn move_to(&mut self, x: f32, y: f32) {
        let distance = (x - self.x).hypot(y - self.y);
        self.hue -= distance / 2.0;
        if self.hue < 0.0 {
            self.hue = HUE_WRAP;
        }
        self.x = x;
        self.y = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_history() -> Vec<f32> {
        let mut history = vec![0.0; 20];
        history[19] = 100.0;
        history
    }

    #[test]
    fn interpolation_is_exact_at_samples() {
        let history = step_history();

        assert_eq!(cubic_interpolate(&history, 19.0, 1.0).unwrap(), 100.0);
        assert_eq!(cubic_interpolate(&history, 18.0, 1.0).unwrap(), 0.0);

        let ramp: Vec<f32> = (0..10).map(|i| (i * i) as f32).collect();
        for (i, expected) in ramp.iter().enumerate() {
            assert_eq!(cubic_interpolate(&ramp, i as f32, 1.0).unwrap(), *expected);
        }
    }

    #[test]
    fn interpolation_between_samples_stays_between_them() {
        let history = step_history();
        let at_18 = cubic_interpolate(&history, 18.0, 1.0).unwrap();
        let at_19 = cubic_interpolate(&history, 19.0, 1.0).unwrap();
        let mid = cubic_interpolate(&history, 18.5, 1.0).unwrap();

        assert!(mid > at_18 && mid < at_19, "mid = {mid}");
        assert!((mid - 50.0).abs() < 1e-4);
    }

    #[test]
    fn out_of_range_parameters_clamp_to_endpoints() {
        let history = step_history();

        assert_eq!(cubic_interpolate(&history, -3.5, 1.0).unwrap(), 0.0);
        assert_eq!(cubic_interpolate(&history, 25.0, 1.0).unwrap(), 100.0);
        assert!((cubic_interpolate(&[7.0], 0.4, 1.0).unwrap() - 7.0).abs() < 1e-5);
    }

    #[test]
    fn empty_history_is_rejected() {
        let err = cubic_interpolate(&[], 0.0, 1.0).unwrap_err();
        assert!(matches!(err, DashboardError::EmptyHistory));
        assert!(MouseTrailSpline::new(0, 100, 1.0).is_err());
        assert!(MouseTrailSpline::new(20, 0, 1.0).is_err());
    }

    #[test]
    fn update_keeps_history_length_and_order() {
        let mut trail = MouseTrailSpline::new(4, 8, 1.0).unwrap();
        for step in 1..=6 {
            trail.update(step as f32, -(step as f32)).unwrap();
        }

        let history: Vec<(f32, f32)> = trail.history().collect();
        assert_eq!(trail.history_size(), 4);
        assert_eq!(
            history,
            vec![(6.0, -6.0), (5.0, -5.0), (4.0, -4.0), (3.0, -3.0)]
        );
    }

    #[test]
    fn rope_starts_at_the_pointer_and_samples_history() {
        let mut trail = MouseTrailSpline::new(20, 100, 1.0).unwrap();
        for _ in 0..20 {
            trail.update(300.0, 200.0).unwrap();
        }
        trail.update(400.0, 250.0).unwrap();

        let points = trail.points();
        assert_eq!(points.len(), 100);
        assert_eq!(points[0], TrailPoint { x: 400.0, y: 250.0 });
        // i = 5 maps to t = 1.0, the previous sample.
        assert_eq!(points[5], TrailPoint { x: 300.0, y: 200.0 });
        assert!((points[99].x - 300.0).abs() < 1e-3);
        assert!((points[99].y - 200.0).abs() < 1e-3);
    }

    #[test]
    fn pointer_motion_cycles_the_hue() {
        let mut pointer = PointerTracker::default();
        pointer.move_to(30.0, 40.0);
        assert_eq!(pointer.hue, HUE_WRAP);

        pointer.move_to(30.0, 140.0);
        assert!((pointer.hue - 310.0).abs() < 1e-4);
        assert_eq!((pointer.x, pointer.y), (30.0, 140.0));
    }
}
