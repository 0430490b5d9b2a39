use std::time::Instant;

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

use crate::config::TimingConfig;

const WEEKDAYS: [&str; 7] = [
    "日曜日", "月曜日", "火曜日", "水曜日", "木曜日", "金曜日", "土曜日",
];

/// Time input of a single tick: monotonic milliseconds for the simulation
/// and the local wall clock for anything displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTime {
    pub millis: u64,
    pub local: NaiveDateTime,
}

impl FrameTime {
    pub fn new(millis: u64, local: NaiveDateTime) -> Self {
        Self { millis, local }
    }

    /// Current time measured from `origin`.
    pub fn since(origin: Instant) -> Self {
        Self {
            millis: origin.elapsed().as_millis() as u64,
            local: Local::now().naive_local(),
        }
    }
}

/// What changed in the clock during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClockUpdate {
    /// Simulation step in reference frames.
    pub delta: f32,
    /// A full fps window elapsed and [`FrameClock::fps`] was refreshed.
    pub fps_updated: bool,
    /// The data refresh interval elapsed.
    pub fetch_due: bool,
}

/// Frame counter, fps window and refresh timer of the render loop.
///
/// The reported fps is the number of ticks in the last complete window, not a
/// smoothed average.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frame_count: u32,
    fps: u32,
    last_fps_window_start: u64,
    last_fetch_time: u64,
    now: u64,
    fps_window_ms: u64,
    fetch_interval_ms: u64,
    reference_frame_ms: f32,
    max_delta: f32,
}

impl FrameClock {
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            frame_count: 0,
            fps: 0,
            last_fps_window_start: 0,
            last_fetch_time: 0,
            now: 0,
            fps_window_ms: timing.fps_window_ms,
            fetch_interval_ms: timing.fetch_interval_ms,
            reference_frame_ms: timing.reference_frame_ms,
            // Keeps `clamp(0.0, max)` valid for negative or NaN input.
            max_delta: timing.max_delta.max(0.0),
        }
    }

    /// Resets every timer to `now`.
    pub fn start(&mut self, now: u64) {
        self.frame_count = 0;
        self.fps = 0;
        self.now = now;
        self.last_fps_window_start = now;
        self.last_fetch_time = now;
    }

    pub fn advance(&mut self, now: u64) -> ClockUpdate {
        let previous = self.now;
        self.now = now;
        let delta = (now.saturating_sub(previous) as f32 / self.reference_frame_ms)
            .clamp(0.0, self.max_delta);

        self.frame_count += 1;
        let fps_updated = now.saturating_sub(self.last_fps_window_start) >= self.fps_window_ms;
        if fps_updated {
            self.fps = self.frame_count;
            self.frame_count = 0;
            self.last_fps_window_start = now;
        }

        let fetch_due = now.saturating_sub(self.last_fetch_time) >= self.fetch_interval_ms;
        if fetch_due {
            self.last_fetch_time = now;
        }

        ClockUpdate {
            delta,
            fps_updated,
            fetch_due,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn last_fetch_time(&self) -> u64 {
        self.last_fetch_time
    }
}

/// `YYYY-MM-DD (曜日) HH:MM:SS`
pub fn format_timestamp(local: &NaiveDateTime) -> String {
    let weekday = WEEKDAYS[local.weekday().num_days_from_sunday() as usize];
    format!(
        "{}-{:02}-{:02} ({}) {:02}:{:02}:{:02}",
        local.year(),
        local.month(),
        local.day(),
        weekday,
        local.hour(),
        local.minute(),
        local.second()
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn clock() -> FrameClock {
        let mut clock = FrameClock::new(&TimingConfig::default());
        clock.start(0);
        clock
    }

    #[test]
    fn fps_counts_ticks_in_the_window() {
        let mut clock = clock();

        for i in 1..30_u64 {
            let update = clock.advance(i * 1_000 / 30);
            assert!(!update.fps_updated, "tick {i} closed the window early");
        }
        let update = clock.advance(1_000);

        assert!(update.fps_updated);
        assert_eq!(clock.fps(), 30);
        assert_eq!(clock.frame_count(), 0);
    }

    #[test]
    fn fetch_becomes_due_every_interval() {
        let mut clock = clock();

        assert!(!clock.advance(59_999).fetch_due);
        assert!(clock.advance(60_000).fetch_due);
        assert_eq!(clock.last_fetch_time(), 60_000);
        assert!(!clock.advance(61_000).fetch_due);
        assert!(clock.advance(120_000).fetch_due);
    }

    #[test]
    fn delta_is_measured_in_reference_frames() {
        let mut clock = clock();

        let update = clock.advance(50);
        assert!((update.delta - 3.0).abs() < 1e-4);

        let stalled = clock.advance(10_000);
        assert_eq!(stalled.delta, 4.0);

        let repeated = clock.advance(10_000);
        assert_eq!(repeated.delta, 0.0);
    }

    #[test]
    fn negative_max_delta_never_panics() {
        let timing = TimingConfig {
            max_delta: -1.0,
            ..TimingConfig::default()
        };
        let mut clock = FrameClock::new(&timing);
        clock.start(0);

        assert_eq!(clock.advance(16).delta, 0.0);
    }

    #[test]
    fn formats_the_stats_timestamp() {
        let local = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(9, 7, 3)
            .unwrap();

        assert_eq!(format_timestamp(&local), "2024-03-05 (火曜日) 09:07:03");
    }
}
