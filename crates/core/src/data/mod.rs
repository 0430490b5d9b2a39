//! Display data for the dashboard texts and warning icons.
//!
//! Feeds are refreshed on short-lived worker threads. Each worker parses its
//! payload completely and sends the result over a channel; the render loop
//! applies finished results when it calls [`DataProvider::poll`], so readers
//! only ever see whole snapshots.

use std::{fs, sync::Arc, thread};

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::{
    config::{DebugConfig, FeedConfig},
    Result,
};

/// Placeholder shown until a feed has delivered its first payload.
pub const LOADING: &str = "Loading...";

const MISSING_READING: &str = "--";
const CANCELLED: &str = "CANCEL";

/// Source of everything the dashboard displays besides the clock.
///
/// Accessors never fail: a feed without data yields [`LOADING`] (or an empty
/// list for warnings).
pub trait DataProvider {
    /// Starts a background refresh of every feed. Returns immediately.
    fn refresh(&mut self);
    /// Applies refreshes that completed since the last call.
    fn poll(&mut self);
    /// Local time used for lesson and deadline selection.
    fn update_date(&mut self, local: NaiveDateTime);
    fn next_lesson_text(&self) -> String;
    fn deadlines_text(&self) -> String;
    fn weather_text(&self) -> String;
    fn active_warning_icon_ids(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    Lessons,
    Deadlines,
    Weather,
    Warnings,
}

impl Feed {
    pub const ALL: [Feed; 4] = [Feed::Lessons, Feed::Deadlines, Feed::Weather, Feed::Warnings];

    pub fn name(self) -> &'static str {
        match self {
            Feed::Lessons => "lessons",
            Feed::Deadlines => "deadlines",
            Feed::Weather => "weather",
            Feed::Warnings => "warnings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub course_code: String,
    pub course_name: String,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    /// Sunday = 0.
    pub weekday: u32,
    pub hour: u32,
    pub minute: u32,
    /// Duration in minutes.
    #[serde(default)]
    pub length: u32,
    #[serde(default)]
    pub venue: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deadline {
    pub name: String,
    pub year: i32,
    /// Zero based month.
    pub month: u32,
    pub day: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readings<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for Readings<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub place: String,
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainfallReading {
    pub place: String,
    #[serde(default)]
    pub max: f64,
    pub unit: String,
}

/// Current weather report, one reading per station.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    #[serde(default)]
    pub temperature: Readings<TemperatureReading>,
    #[serde(default)]
    pub rainfall: Readings<RainfallReading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub code: String,
    #[serde(rename = "actionCode", default)]
    pub action_code: String,
}

/// A fully parsed feed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    Lessons(Vec<Course>),
    Deadlines(Vec<Deadline>),
    Weather(WeatherReport),
    Warnings(Vec<Warning>),
}

impl FeedUpdate {
    pub fn parse(feed: Feed, payload: &[u8]) -> Result<Self> {
        Ok(match feed {
            Feed::Lessons => Self::Lessons(serde_json::from_slice(payload)?),
            Feed::Deadlines => Self::Deadlines(serde_json::from_slice(payload)?),
            Feed::Weather => Self::Weather(serde_json::from_slice(payload)?),
            Feed::Warnings => {
                // The warning summary is an object keyed by warning type, in
                // display order.
                let entries: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_slice(payload)?;
                let warnings = entries
                    .into_iter()
                    .map(|(_, entry)| serde_json::from_value(entry))
                    .collect::<std::result::Result<Vec<Warning>, _>>()?;
                Self::Warnings(warnings)
            }
        })
    }
}

/// Latest successfully parsed payload of every feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    pub lessons: Option<Vec<Course>>,
    pub deadlines: Option<Vec<Deadline>>,
    pub weather: Option<WeatherReport>,
    pub warnings: Option<Vec<Warning>>,
}

impl FeedSnapshot {
    pub fn apply(&mut self, update: FeedUpdate) {
        match update {
            FeedUpdate::Lessons(lessons) => self.lessons = Some(lessons),
            FeedUpdate::Deadlines(deadlines) => self.deadlines = Some(deadlines),
            FeedUpdate::Weather(report) => self.weather = Some(report),
            FeedUpdate::Warnings(warnings) => self.warnings = Some(warnings),
        }
    }
}

/// Text for the first of today's lessons that has not started yet.
pub fn next_lesson_text(courses: &[Course], now: &NaiveDateTime, debug: &DebugConfig) -> String {
    let weekday = if debug.enabled {
        debug.weekday
    } else {
        now.weekday().num_days_from_sunday()
    };
    let upcoming = |lesson: &Lesson| {
        debug.enabled
            || now.hour() < lesson.hour
            || (now.hour() == lesson.hour && now.minute() <= lesson.minute)
    };

    let next = courses
        .iter()
        .flat_map(|course| course.lessons.iter().map(move |lesson| (course, lesson)))
        .filter(|(_, lesson)| lesson.active && lesson.weekday == weekday && upcoming(lesson))
        .min_by_key(|(_, lesson)| (lesson.hour, lesson.minute));

    match next {
        Some((course, lesson)) => format!(
            "次の授業は{}です。\n{}です。\n{}です。\n{:02}:{:02}に{}で始まります。\n",
            course.course_code,
            course.course_name,
            lesson.kind,
            lesson.hour,
            lesson.minute,
            lesson.venue
        ),
        None => "今日の授業は全部終わりました。".to_string(),
    }
}

/// Lists deadlines whose day has not ended yet, in feed order.
pub fn deadlines_text(deadlines: &[Deadline], now: &NaiveDateTime) -> String {
    let mut text = String::new();

    for deadline in deadlines {
        let month = deadline.month.saturating_add(1);
        let due = NaiveDate::from_ymd_opt(deadline.year, month, deadline.day)
            .and_then(|date| date.and_hms_opt(23, 59, 0));
        let Some(due) = due else {
            tracing::debug!(name = %deadline.name, "skipping deadline with an invalid date");
            continue;
        };
        if *now >= due {
            continue;
        }

        if text.is_empty() {
            text.push_str("締め切り：\n");
        }
        text.push_str(&format!(
            "{}-{:02}-{:02}: {}\n",
            deadline.year,
            month,
            deadline.day,
            deadline.name
        ));
    }

    if text.is_empty() {
        "締め切りはありませんよ。".to_string()
    } else {
        text
    }
}

pub fn weather_text(report: &WeatherReport, station: &str, label: &str) -> String {
    let temperature = report
        .temperature
        .data
        .iter()
        .find(|reading| reading.place == station)
        .map(|reading| format!("{}°{}", reading.value, reading.unit))
        .unwrap_or_else(|| MISSING_READING.to_string());
    let rainfall = report
        .rainfall
        .data
        .iter()
        .find(|reading| reading.place == station)
        .map(|reading| format!("{}{}", reading.max, reading.unit))
        .unwrap_or_else(|| MISSING_READING.to_string());

    format!("今{label}の気温は{temperature}です。\n降水は{rainfall}です。")
}

/// Codes of warnings in force. Debug mode puts its forced codes first.
pub fn warning_icon_ids(warnings: &[Warning], debug: &DebugConfig) -> Vec<String> {
    let mut ids = if debug.enabled {
        debug.forced_warnings.clone()
    } else {
        Vec::new()
    };
    ids.extend(
        warnings
            .iter()
            .filter(|warning| warning.action_code != CANCELLED)
            .map(|warning| warning.code.clone()),
    );
    ids
}

/// Loads the raw payload of a feed.
pub trait FeedSource: Send + Sync {
    fn load(&self, feed: Feed) -> Result<Vec<u8>>;
}

/// Reads each feed from the location configured for it: `http(s)://` URLs
/// over the network, anything else from disk.
#[derive(Debug, Clone)]
pub struct LocationFeedSource {
    config: FeedConfig,
    client: reqwest::blocking::Client,
}

impl LocationFeedSource {
    pub fn new(config: FeedConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("ambient-dashboard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, client })
    }

    fn location(&self, feed: Feed) -> &str {
        match feed {
            Feed::Lessons => &self.config.lessons,
            Feed::Deadlines => &self.config.deadlines,
            Feed::Weather => &self.config.weather,
            Feed::Warnings => &self.config.warnings,
        }
    }
}

impl FeedSource for LocationFeedSource {
    fn load(&self, feed: Feed) -> Result<Vec<u8>> {
        let location = self.location(feed);
        if location.starts_with("http://") || location.starts_with("https://") {
            let response = self.client.get(location).send()?.error_for_status()?;
            Ok(response.bytes()?.to_vec())
        } else {
            Ok(fs::read(location)?)
        }
    }
}

type FeedResult = (Feed, Result<FeedUpdate>);

/// Production [`DataProvider`] backed by a [`FeedSource`].
pub struct FeedProvider {
    source: Arc<dyn FeedSource>,
    snapshot: FeedSnapshot,
    sender: Sender<FeedResult>,
    receiver: Receiver<FeedResult>,
    in_flight: usize,
    now: NaiveDateTime,
    station: String,
    station_label: String,
    debug: DebugConfig,
}

impl FeedProvider {
    pub fn new(source: impl FeedSource + 'static, feeds: &FeedConfig, debug: DebugConfig) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            source: Arc::new(source),
            snapshot: FeedSnapshot::default(),
            sender,
            receiver,
            in_flight: 0,
            now: Local::now().naive_local(),
            station: feeds.weather_station.clone(),
            station_label: feeds.weather_station_label.clone(),
            debug,
        }
    }

    /// Refreshes started but not yet applied by [`DataProvider::poll`].
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn snapshot(&self) -> &FeedSnapshot {
        &self.snapshot
    }
}

impl DataProvider for FeedProvider {
    fn refresh(&mut self) {
        for feed in Feed::ALL {
            let source = Arc::clone(&self.source);
            let sender = self.sender.clone();
            let spawned = thread::Builder::new()
                .name(format!("feed-{}", feed.name()))
                .spawn(move || {
                    let result = source
                        .load(feed)
                        .and_then(|payload| FeedUpdate::parse(feed, &payload));
                    // The receiver only disappears together with the dashboard.
                    let _ = sender.send((feed, result));
                });

            match spawned {
                Ok(_) => self.in_flight += 1,
                Err(err) => tracing::warn!(feed = feed.name(), %err, "could not start feed refresh"),
            }
        }
        tracing::debug!(in_flight = self.in_flight, "started feed refresh");
    }

    fn poll(&mut self) {
        while let Ok((feed, result)) = self.receiver.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            match result {
                Ok(update) => {
                    tracing::debug!(feed = feed.name(), "feed refreshed");
                    self.snapshot.apply(update);
                }
                Err(err) => {
                    tracing::warn!(feed = feed.name(), %err, "feed refresh failed, keeping previous data");
                }
            }
        }
    }

    fn update_date(&mut self, local: NaiveDateTime) {
        self.now = local;
    }

    fn next_lesson_text(&self) -> String {
        match &self.snapshot.lessons {
            Some(courses) => next_lesson_text(courses, &self.now, &self.debug),
            None => LOADING.to_string(),
        }
    }

    fn deadlines_text(&self) -> String {
        match &self.snapshot.deadlines {
            Some(deadlines) => deadlines_text(deadlines, &self.now),
            None => LOADING.to_string(),
        }
    }

    fn weather_text(&self) -> String {
        match &self.snapshot.weather {
            Some(report) => weather_text(report, &self.station, &self.station_label),
            None => LOADING.to_string(),
        }
    }

    fn active_warning_icon_ids(&self) -> Vec<String> {
        match &self.snapshot.warnings {
            Some(warnings) => warning_icon_ids(warnings, &self.debug),
            None => Vec::new(),
        }
    }
}

impl std::fmt::Debug for FeedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedProvider")
            .field("in_flight", &self.in_flight)
            .field("now", &self.now)
            .field("debug", &self.debug.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use super::*;
    use crate::DashboardError;

    const LESSONS: &str = r#"[
        {
            "courseCode": "CSCI3100",
            "courseName": "Software Engineering",
            "lessons": [
                { "weekday": 2, "hour": 14, "minute": 30, "length": 90, "venue": "LSB LT1", "type": "Lecture", "active": true },
                { "weekday": 2, "hour": 9, "minute": 0, "length": 45, "venue": "ERB 404", "type": "Tutorial", "active": true },
                { "weekday": 4, "hour": 10, "minute": 30, "length": 90, "venue": "LSB LT1", "type": "Lecture", "active": true }
            ]
        },
        {
            "courseCode": "MATH1010",
            "courseName": "Calculus",
            "lessons": [
                { "weekday": 2, "hour": 11, "minute": 15, "length": 45, "venue": "MMW 703", "type": "Lecture", "active": false }
            ]
        }
    ]"#;

    const DEADLINES: &str = r#"[
        { "name": "Project report", "year": 2024, "month": 2, "day": 5 },
        { "name": "Quiz", "year": 2024, "month": 1, "day": 28 },
        { "name": "Final", "year": 2024, "month": 3, "day": 20 }
    ]"#;

    const WEATHER: &str = r#"{
        "temperature": { "data": [
            { "place": "King's Park", "value": 24, "unit": "C" },
            { "place": "Sha Tin", "value": 25.5, "unit": "C" }
        ] },
        "rainfall": { "data": [
            { "unit": "mm", "place": "Sha Tin", "max": 3, "main": "FALSE" }
        ] }
    }"#;

    const WARNINGS: &str = r#"{
        "WRAIN": { "name": "Rainstorm Warning Signal", "code": "WRAINA", "actionCode": "ISSUE" },
        "WTCSGNL": { "name": "Tropical Cyclone Warning Signal", "code": "TC3", "actionCode": "CANCEL" },
        "WTS": { "name": "Thunderstorm Warning", "code": "WTS", "actionCode": "EXTEND" }
    }"#;

    /// Tuesday 2024-03-05 at the given time.
    fn tuesday(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn parse_lessons() -> Vec<Course> {
        match FeedUpdate::parse(Feed::Lessons, LESSONS.as_bytes()).unwrap() {
            FeedUpdate::Lessons(courses) => courses,
            other => panic!("unexpected update {other:?}"),
        }
    }

    #[test]
    fn picks_the_earliest_lesson_not_yet_started() {
        let courses = parse_lessons();
        let debug = DebugConfig::default();

        let morning = next_lesson_text(&courses, &tuesday(8, 0), &debug);
        assert!(morning.starts_with("次の授業はCSCI3100です。"));
        assert!(morning.contains("Tutorial"));
        assert!(morning.contains("09:00にERB 404で始まります。"));

        let on_the_minute = next_lesson_text(&courses, &tuesday(14, 30), &debug);
        assert!(on_the_minute.contains("14:30にLSB LT1"));

        let evening = next_lesson_text(&courses, &tuesday(18, 0), &debug);
        assert_eq!(evening, "今日の授業は全部終わりました。");
    }

    #[test]
    fn debug_mode_uses_the_configured_weekday() {
        let courses = parse_lessons();
        let debug = DebugConfig {
            enabled: true,
            ..DebugConfig::default()
        };
        // Sunday evening, but debug pretends it is a Tuesday with lessons ahead.
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 3)
            .unwrap()
            .and_hms_opt(22, 0, 0)
            .unwrap();

        let text = next_lesson_text(&courses, &sunday, &debug);
        assert!(text.contains("09:00にERB 404"));
    }

    #[test]
    fn lists_pending_deadlines_only() {
        let deadlines = match FeedUpdate::parse(Feed::Deadlines, DEADLINES.as_bytes()).unwrap() {
            FeedUpdate::Deadlines(deadlines) => deadlines,
            other => panic!("unexpected update {other:?}"),
        };

        let text = deadlines_text(&deadlines, &tuesday(12, 0));
        assert_eq!(
            text,
            "締め切り：\n2024-03-05: Project report\n2024-04-20: Final\n"
        );

        let later = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(deadlines_text(&deadlines, &later), "締め切りはありませんよ。");
    }

    #[test]
    fn formats_station_weather() {
        let report = match FeedUpdate::parse(Feed::Weather, WEATHER.as_bytes()).unwrap() {
            FeedUpdate::Weather(report) => report,
            other => panic!("unexpected update {other:?}"),
        };

        assert_eq!(
            weather_text(&report, "Sha Tin", "沙田"),
            "今沙田の気温は25.5°Cです。\n降水は3mmです。"
        );
        assert_eq!(
            weather_text(&report, "Tai Po", "大埔"),
            "今大埔の気温は--です。\n降水は--です。"
        );
    }

    #[test]
    fn skips_cancelled_warnings_and_keeps_order() {
        let warnings = match FeedUpdate::parse(Feed::Warnings, WARNINGS.as_bytes()).unwrap() {
            FeedUpdate::Warnings(warnings) => warnings,
            other => panic!("unexpected update {other:?}"),
        };

        assert_eq!(
            warning_icon_ids(&warnings, &DebugConfig::default()),
            vec!["WRAINA", "WTS"]
        );

        let debug = DebugConfig {
            enabled: true,
            forced_warnings: vec!["TC10".to_string()],
            ..DebugConfig::default()
        };
        assert_eq!(warning_icon_ids(&warnings, &debug), vec!["TC10", "WRAINA", "WTS"]);
    }

    #[test]
    fn malformed_payloads_are_errors() {
        let err = FeedUpdate::parse(Feed::Lessons, b"{ not json").unwrap_err();
        assert!(matches!(err, DashboardError::Json(_)));
    }

    struct StaticSource {
        failing: Arc<AtomicBool>,
    }

    impl FeedSource for StaticSource {
        fn load(&self, feed: Feed) -> Result<Vec<u8>> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DashboardError::msg("feed offline"));
            }
            let payload = match feed {
                Feed::Lessons => LESSONS,
                Feed::Deadlines => DEADLINES,
                Feed::Weather => WEATHER,
                Feed::Warnings => WARNINGS,
            };
            Ok(payload.as_bytes().to_vec())
        }
    }

    fn settle(provider: &mut FeedProvider) {
        for _ in 0..400 {
            provider.poll();
            if provider.in_flight() == 0 {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("feed refresh did not finish");
    }

    fn provider(failing: Arc<AtomicBool>) -> FeedProvider {
        let mut provider = FeedProvider::new(
            StaticSource { failing },
            &FeedConfig::default(),
            DebugConfig::default(),
        );
        provider.update_date(tuesday(8, 0));
        provider
    }

    #[test]
    fn shows_placeholders_until_the_first_refresh_lands() {
        let provider = provider(Arc::new(AtomicBool::new(false)));

        assert_eq!(provider.next_lesson_text(), LOADING);
        assert_eq!(provider.deadlines_text(), LOADING);
        assert_eq!(provider.weather_text(), LOADING);
        assert!(provider.active_warning_icon_ids().is_empty());
    }

    #[test]
    fn refresh_results_are_applied_on_poll() {
        let mut provider = provider(Arc::new(AtomicBool::new(false)));

        provider.refresh();
        assert_eq!(provider.in_flight(), 4);
        settle(&mut provider);

        assert!(provider.next_lesson_text().contains("09:00"));
        assert!(provider.deadlines_text().starts_with("締め切り："));
        assert!(provider.weather_text().contains("25.5°C"));
        assert_eq!(provider.active_warning_icon_ids(), vec!["WRAINA", "WTS"]);
    }

    #[test]
    fn failed_refresh_keeps_previous_data() {
        let failing = Arc::new(AtomicBool::new(false));
        let mut provider = provider(failing.clone());
        provider.refresh();
        settle(&mut provider);
        let before = provider.snapshot().clone();

        failing.store(true, Ordering::SeqCst);
        provider.refresh();
        settle(&mut provider);

        assert_eq!(provider.snapshot(), &before);
        assert!(provider.weather_text().contains("25.5°C"));
    }

    #[test]
    fn location_source_reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let lessons = dir.path().join("lessons.json");
        std::fs::write(&lessons, LESSONS).unwrap();

        let source = LocationFeedSource::new(FeedConfig {
            lessons: lessons.display().to_string(),
            deadlines: dir.path().join("missing.json").display().to_string(),
            ..FeedConfig::default()
        })
        .unwrap();

        let payload = source.load(Feed::Lessons).unwrap();
        assert_eq!(payload, LESSONS.as_bytes());
        assert!(matches!(
            FeedUpdate::parse(Feed::Lessons, &payload).unwrap(),
            FeedUpdate::Lessons(courses) if courses.len() == 2
        ));

        let err = source.load(Feed::Deadlines).unwrap_err();
        assert!(matches!(err, DashboardError::Io(_)));
    }
}
