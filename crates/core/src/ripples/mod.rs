use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Ripple radius growth in pixels per millisecond at reference scale.
const GROWTH_DIVISOR: f32 = 4.0;

/// A pointer press that spawns an expanding ring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub x: f32,
    pub y: f32,
    /// Surface size the click was recorded against.
    pub reference_width: f32,
    pub reference_height: f32,
    pub spawn_time: u64,
    pub hue_at_spawn: f32,
}

impl ClickEvent {
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.spawn_time)
    }
}

/// Visual state of one live ripple for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RippleState {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub opacity: f32,
    pub line_width: f32,
    pub hue: f32,
}

/// Linear fade from `1.0` at spawn to `0.0` at `ttl`.
pub fn ripple_opacity(elapsed: u64, ttl: u64) -> f32 {
    1.0 - elapsed as f32 / ttl as f32
}

/// Radius after `elapsed` ms, scaled by how the current surface compares to
/// the one the click was recorded against.
pub fn ripple_radius(elapsed: u64, reference_width: f32, current_width: f32) -> f32 {
    let scale = if reference_width > 0.0 {
        current_width / reference_width
    } else {
        1.0
    };
    elapsed as f32 / GROWTH_DIVISOR * scale
}

/// Click ripples, oldest first.
#[derive(Debug, Clone)]
pub struct ClickRippleManager {
    events: VecDeque<ClickEvent>,
    ttl_ms: u64,
    line_width: f32,
}

impl ClickRippleManager {
    pub fn new(ttl_ms: u64, line_width: f32) -> Self {
        Self {
            events: VecDeque::new(),
            ttl_ms: ttl_ms.max(1),
            line_width,
        }
    }

    pub fn record(
        &mut self,
        x: f32,
        y: f32,
        reference_width: f32,
        reference_height: f32,
        now: u64,
        hue: f32,
    ) {
        self.events.push_back(ClickEvent {
            x,
            y,
            reference_width,
            reference_height,
            spawn_time: now,
            hue_at_spawn: hue,
        });
    }

    /// Computes the ripples to draw at `now` and expires old ones.
    ///
    /// Every expired event found during the pass removes the oldest entry of
    /// the list. Events are appended in spawn order, so the oldest entries are
    /// exactly the expired ones.
    pub fn tick(&mut self, now: u64, surface_width: f32) -> Vec<RippleState> {
        let mut active = Vec::with_capacity(self.events.len());
        let mut expired = 0;

        for event in &self.events {
            let elapsed = event.elapsed(now);
            if elapsed > self.ttl_ms {
                expired += 1;
                continue;
            }
            active.push(RippleState {
                x: event.x,
                y: event.y,
                radius: ripple_radius(elapsed, event.reference_width, surface_width),
                opacity: ripple_opacity(elapsed, self.ttl_ms),
                line_width: self.line_width,
                hue: event.hue_at_spawn,
            });
        }

        for _ in 0..expired {
            self.events.pop_front();
        }
        if expired > 0 {
            tracing::trace!(expired, remaining = self.events.len(), "expired click ripples");
        }

        active
    }

    pub fn events(&self) -> impl Iterator<Item = &ClickEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: u64 = 4_000;

    fn manager_with_click_at(spawn: u64) -> ClickRippleManager {
        let mut ripples = ClickRippleManager::new(TTL, 4.0);
        ripples.record(100.0, 200.0, 1920.0, 1080.0, spawn, 120.0);
        ripples
    }

    #[test]
    fn opacity_fades_linearly_to_zero() {
        assert_eq!(ripple_opacity(0, TTL), 1.0);
        assert_eq!(ripple_opacity(TTL, TTL), 0.0);

        let mut last = f32::INFINITY;
        for elapsed in (0..=TTL).step_by(250) {
            let opacity = ripple_opacity(elapsed, TTL);
            assert!(opacity < last);
            last = opacity;
        }
    }

    #[test]
    fn ripple_at_ttl_is_still_drawn() {
        let mut ripples = manager_with_click_at(1_000);
        let drawn = ripples.tick(1_000 + TTL, 1920.0);

        assert_eq!(drawn.len(), 1);
        assert_eq!(drawn[0].opacity, 0.0);
        assert_eq!(drawn[0].radius, 1_000.0);
        assert_eq!(drawn[0].hue, 120.0);
    }

    #[test]
    fn expired_ripples_leave_the_active_set() {
        let mut ripples = manager_with_click_at(0);
        ripples.record(5.0, 5.0, 1920.0, 1080.0, 3_000, 0.0);

        let drawn = ripples.tick(TTL + 1, 1920.0);
        assert_eq!(drawn.len(), 1);
        assert_eq!((drawn[0].x, drawn[0].y), (5.0, 5.0));
        assert_eq!(ripples.len(), 1);

        let next = ripples.tick(TTL + 2, 1920.0);
        assert_eq!(next.len(), 1);
        assert!(ripples.events().all(|event| event.spawn_time == 3_000));
    }

    #[test]
    fn expiry_always_drops_from_the_front() {
        let mut ripples = ClickRippleManager::new(TTL, 4.0);
        // Delivered out of order: the fresh click sits in front of a stale one.
        ripples.record(1.0, 1.0, 1920.0, 1080.0, 9_000, 0.0);
        ripples.record(2.0, 2.0, 1920.0, 1080.0, 0, 0.0);

        ripples.tick(10_000, 1920.0);

        let remaining: Vec<f32> = ripples.events().map(|event| event.x).collect();
        assert_eq!(remaining, vec![2.0]);
    }

    #[test]
    fn radius_follows_the_surface_width() {
        let full = ripple_radius(2_000, 1920.0, 1920.0);
        let half = ripple_radius(2_000, 1920.0, 960.0);

        assert_eq!(full, 500.0);
        assert_eq!(half, full / 2.0);
    }

    #[test]
    fn clicks_from_the_future_start_at_zero() {
        let mut ripples = manager_with_click_at(5_000);
        let drawn = ripples.tick(4_000, 1920.0);

        assert_eq!(drawn[0].radius, 0.0);
        assert_eq!(drawn[0].opacity, 1.0);
    }
}
