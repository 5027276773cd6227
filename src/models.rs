//! Data models for the Approva focus timer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default length of a pomodoro work interval (25 minutes).
pub const DEFAULT_WORK_SECS: u32 = 25 * 60;
/// Default length of a pomodoro break (5 minutes).
pub const DEFAULT_BREAK_SECS: u32 = 5 * 60;
/// Default countdown target (25 minutes).
pub const DEFAULT_COUNTDOWN_SECS: u32 = 25 * 60;

/// Which ticking policy drives the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    #[default]
    Pomodoro,
    Stopwatch,
    Countdown,
}

impl TimerMode {
    pub const ALL: [TimerMode; 3] = [Self::Pomodoro, Self::Stopwatch, Self::Countdown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pomodoro => "pomodoro",
            Self::Stopwatch => "stopwatch",
            Self::Countdown => "countdown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pomodoro => "Pomodoro",
            Self::Stopwatch => "Stopwatch",
            Self::Countdown => "Countdown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pomodoro" => Some(Self::Pomodoro),
            "stopwatch" => Some(Self::Stopwatch),
            "countdown" => Some(Self::Countdown),
            _ => None,
        }
    }
}

/// Pomodoro phase. Ignored outside pomodoro mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Work,
    Break,
}

/// The kind of a recorded study session. Same vocabulary as [`TimerMode`],
/// kept separate because it is part of the stored record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Pomodoro,
    Stopwatch,
    Countdown,
}

impl SessionType {
    pub fn label(&self) -> &'static str {
        TimerMode::from(*self).label()
    }
}

impl From<SessionType> for TimerMode {
    fn from(kind: SessionType) -> Self {
        match kind {
            SessionType::Pomodoro => Self::Pomodoro,
            SessionType::Stopwatch => Self::Stopwatch,
            SessionType::Countdown => Self::Countdown,
        }
    }
}

/// Durations the engine arms its counters with.
///
/// Values are clamped rather than rejected: every duration is at least one
/// second, and a goal of zero means "no goal".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub work_secs: u32,
    pub break_secs: u32,
    pub countdown_secs: u32,
    pub daily_goal_secs: u32,
}

impl TimerConfig {
    pub fn new(work_secs: u32, break_secs: u32, countdown_secs: u32, daily_goal_secs: u32) -> Self {
        Self {
            work_secs: work_secs.max(1),
            break_secs: break_secs.max(1),
            countdown_secs: countdown_secs.max(1),
            daily_goal_secs,
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WORK_SECS, DEFAULT_BREAK_SECS, DEFAULT_COUNTDOWN_SECS, 0)
    }
}

/// Snapshot of the engine's mutable core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerState {
    pub mode: TimerMode,
    pub phase: SessionPhase,
    pub remaining_work_secs: u32,
    pub remaining_break_secs: u32,
    pub elapsed_stopwatch_secs: u32,
    pub remaining_countdown_secs: u32,
    pub is_running: bool,
    pub completed_pomodoros: u32,
    pub total_study_secs_today: u32,
    pub daily_goal_secs: u32,
    pub goal_reached: bool,
}

impl TimerState {
    /// Creates the initial state for the given configuration.
    pub fn new(config: &TimerConfig) -> Self {
        Self {
            mode: TimerMode::Pomodoro,
            phase: SessionPhase::Work,
            remaining_work_secs: config.work_secs,
            remaining_break_secs: config.break_secs,
            elapsed_stopwatch_secs: 0,
            remaining_countdown_secs: config.countdown_secs,
            is_running: false,
            completed_pomodoros: 0,
            total_study_secs_today: 0,
            daily_goal_secs: config.daily_goal_secs,
            goal_reached: false,
        }
    }

    /// Returns true while on a pomodoro break.
    pub fn is_break(&self) -> bool {
        self.mode == TimerMode::Pomodoro && self.phase == SessionPhase::Break
    }

    /// The value shown for the active mode: remaining seconds for the
    /// countdowns, elapsed seconds for the stopwatch.
    pub fn display_secs(&self) -> u32 {
        match (self.mode, self.phase) {
            (TimerMode::Pomodoro, SessionPhase::Work) => self.remaining_work_secs,
            (TimerMode::Pomodoro, SessionPhase::Break) => self.remaining_break_secs,
            (TimerMode::Stopwatch, _) => self.elapsed_stopwatch_secs,
            (TimerMode::Countdown, _) => self.remaining_countdown_secs,
        }
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new(&TimerConfig::default())
    }
}

fn default_user_id() -> String {
    "local".to_string()
}

/// User-configurable settings, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Length of a pomodoro work interval in seconds.
    pub work_secs: u32,
    /// Length of a pomodoro break in seconds.
    pub break_secs: u32,
    /// Countdown target in seconds.
    pub countdown_secs: u32,
    /// Daily study goal in seconds; 0 disables the goal.
    pub daily_goal_secs: u32,
    /// Whether to play sounds on completion.
    pub sound_enabled: bool,
    /// Whether to show system notifications.
    pub notifications_enabled: bool,
    /// Name used in motivational phrases.
    pub student_name: Option<String>,
    /// Owner of recorded study sessions.
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_secs: DEFAULT_WORK_SECS,
            break_secs: DEFAULT_BREAK_SECS,
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
            daily_goal_secs: 0,
            sound_enabled: true,
            notifications_enabled: true,
            student_name: None,
            user_id: default_user_id(),
        }
    }
}

impl Settings {
    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig::new(
            self.work_secs,
            self.break_secs,
            self.countdown_secs,
            self.daily_goal_secs,
        )
    }
}

/// A completed study session as stored in the `study_sessions` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudySession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    /// Duration in seconds.
    pub duration: u32,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: SessionType,
}

/// Study totals for one user on one day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub sessions: u32,
    pub total_secs: u32,
}

impl DailyStats {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            sessions: 0,
            total_secs: 0,
        }
    }

    pub fn add(&mut self, session: &StudySession) {
        self.sessions += 1;
        self.total_secs = self.total_secs.saturating_add(session.duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_config_default() {
        let config = TimerConfig::default();
        assert_eq!(config.work_secs, 1500);
        assert_eq!(config.break_secs, 300);
        assert_eq!(config.countdown_secs, 1500);
        assert_eq!(config.daily_goal_secs, 0);
    }

    #[test]
    fn test_timer_config_clamps_zero_durations() {
        let config = TimerConfig::new(0, 0, 0, 0);
        assert_eq!(config.work_secs, 1);
        assert_eq!(config.break_secs, 1);
        assert_eq!(config.countdown_secs, 1);
        assert_eq!(config.daily_goal_secs, 0);
    }

    #[test]
    fn test_timer_state_initial() {
        let state = TimerState::default();
        assert_eq!(state.mode, TimerMode::Pomodoro);
        assert_eq!(state.phase, SessionPhase::Work);
        assert_eq!(state.remaining_work_secs, 1500);
        assert_eq!(state.remaining_break_secs, 300);
        assert_eq!(state.elapsed_stopwatch_secs, 0);
        assert!(!state.is_running);
        assert_eq!(state.completed_pomodoros, 0);
        assert_eq!(state.total_study_secs_today, 0);
        assert!(!state.goal_reached);
    }

    #[test]
    fn test_display_secs_follows_mode() {
        let mut state = TimerState::default();
        state.elapsed_stopwatch_secs = 42;
        state.remaining_countdown_secs = 900;
        assert_eq!(state.display_secs(), 1500);

        state.phase = SessionPhase::Break;
        assert_eq!(state.display_secs(), 300);
        assert!(state.is_break());

        state.mode = TimerMode::Stopwatch;
        assert_eq!(state.display_secs(), 42);
        assert!(!state.is_break());

        state.mode = TimerMode::Countdown;
        assert_eq!(state.display_secs(), 900);
    }

    #[test]
    fn test_mode_names_round_trip() {
        for mode in TimerMode::ALL {
            assert_eq!(TimerMode::from_str(mode.as_str()), Some(mode));
        }
        assert_eq!(TimerMode::from_str("free"), None);
    }

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.work_secs, 1500);
        assert_eq!(settings.break_secs, 300);
        assert_eq!(settings.daily_goal_secs, 0);
        assert!(settings.sound_enabled);
        assert!(settings.notifications_enabled);
        assert_eq!(settings.user_id, "local");
        assert_eq!(settings.timer_config(), TimerConfig::default());
    }

    #[test]
    fn test_settings_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"work_secs": 3000}"#).unwrap();
        assert_eq!(settings.work_secs, 3000);
        assert_eq!(settings.break_secs, 300);
        assert_eq!(settings.user_id, "local");
    }

    #[test]
    fn test_study_session_serializes_type_field() {
        let session = StudySession {
            id: None,
            user_id: "u1".to_string(),
            duration: 1500,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            kind: SessionType::Pomodoro,
        };
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["type"], "pomodoro");
        assert_eq!(value["date"], "2024-01-15");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_daily_stats_add() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut stats = DailyStats::new(date);
        let session = StudySession {
            id: None,
            user_id: "u1".to_string(),
            duration: 600,
            date,
            kind: SessionType::Countdown,
        };
        stats.add(&session);
        stats.add(&session);
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.total_secs, 1200);
    }
}
