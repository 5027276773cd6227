//! Menu building and updating for the tray dropdown.

use crate::app::App;
use crate::models::{DailyStats, Settings, StudySession, TimerMode, TimerState};
use crate::timer::format_time;
use muda::accelerator::Accelerator;
use muda::{CheckMenuItem, Menu, MenuId, MenuItem, PredefinedMenuItem, Submenu};
use std::collections::HashMap;
use thiserror::Error;

// Menu item IDs as constants
pub const ID_GREETING: &str = "greeting";
pub const ID_STATUS: &str = "status";
pub const ID_PROGRESS: &str = "progress";
pub const ID_STATS: &str = "stats";
pub const ID_LAST: &str = "last_session";
pub const ID_START: &str = "start";
pub const ID_PAUSE: &str = "pause";
pub const ID_RESET: &str = "reset";
pub const ID_SOUND_TOGGLE: &str = "sound_toggle";
pub const ID_NOTIF_TOGGLE: &str = "notif_toggle";
pub const ID_RESET_TODAY: &str = "reset_today";
pub const ID_QUIT: &str = "quit";

/// Prefixes of the generated IDs for modes and duration presets.
pub const PREFIX_MODE: &str = "mode_";
pub const PREFIX_WORK: &str = "work_";
pub const PREFIX_BREAK: &str = "break_";
pub const PREFIX_COUNTDOWN: &str = "countdown_";
pub const PREFIX_GOAL: &str = "goal_";

const WORK_PRESETS_MINS: [u32; 7] = [15, 20, 25, 30, 45, 50, 60];
const BREAK_PRESETS_MINS: [u32; 4] = [3, 5, 10, 15];
const COUNTDOWN_PRESETS_MINS: [u32; 7] = [10, 15, 25, 30, 45, 60, 90];
const GOAL_PRESETS_HOURS: [u32; 7] = [0, 1, 2, 3, 4, 6, 8];

#[derive(Error, Debug)]
pub enum MenuError {
    #[error("Menu error: {0}")]
    Muda(#[from] muda::Error),
}

/// Holds references to menu items that need dynamic updates.
pub struct MenuItems {
    pub greeting: MenuItem,
    pub status: MenuItem,
    pub progress: MenuItem,
    pub stats: MenuItem,
    pub last: MenuItem,
    pub start: MenuItem,
    pub pause: MenuItem,
    pub reset: MenuItem,
    pub mode_checks: HashMap<TimerMode, CheckMenuItem>,
    pub sound_toggle: CheckMenuItem,
    pub notif_toggle: CheckMenuItem,
    pub work_checks: HashMap<u32, CheckMenuItem>,
    pub break_checks: HashMap<u32, CheckMenuItem>,
    pub countdown_checks: HashMap<u32, CheckMenuItem>,
    pub goal_checks: HashMap<u32, CheckMenuItem>,
}

fn info_item(id: &str, text: String) -> MenuItem {
    MenuItem::with_id(MenuId::new(id), text, false, None::<Accelerator>)
}

/// Builds the complete menu structure.
pub fn build_menu(app: &App) -> Result<(Menu, MenuItems), MenuError> {
    let state = app.engine.state();
    let menu = Menu::new();

    let greeting = info_item(ID_GREETING, app.greeting());
    menu.append(&greeting)?;
    menu.append(&PredefinedMenuItem::separator())?;

    let status = info_item(ID_STATUS, format_status(state));
    menu.append(&status)?;
    let progress = info_item(ID_PROGRESS, format_progress(app.engine.progress()));
    menu.append(&progress)?;
    let stats = info_item(ID_STATS, format_stats(state, app.logged_today()));
    menu.append(&stats)?;
    let last = info_item(ID_LAST, format_last_session(app.last_session()));
    menu.append(&last)?;

    menu.append(&PredefinedMenuItem::separator())?;

    // Mode selection
    let mut mode_checks = HashMap::new();
    for mode in TimerMode::ALL {
        let item = CheckMenuItem::with_id(
            MenuId::new(format!("{}{}", PREFIX_MODE, mode.as_str())),
            mode.label(),
            true,
            mode == state.mode,
            None::<Accelerator>,
        );
        menu.append(&item)?;
        mode_checks.insert(mode, item);
    }

    menu.append(&PredefinedMenuItem::separator())?;

    // Control buttons
    let start = MenuItem::with_id(
        MenuId::new(ID_START),
        "▶  Start",
        !state.is_running,
        None::<Accelerator>,
    );
    let pause = MenuItem::with_id(
        MenuId::new(ID_PAUSE),
        "⏸  Pause",
        state.is_running,
        None::<Accelerator>,
    );
    let reset = MenuItem::with_id(MenuId::new(ID_RESET), "↺  Reset", true, None::<Accelerator>);
    menu.append(&start)?;
    menu.append(&pause)?;
    menu.append(&reset)?;

    menu.append(&PredefinedMenuItem::separator())?;

    let settings_menu = build_settings_submenu(&app.settings)?;
    menu.append(&settings_menu.submenu)?;

    menu.append(&PredefinedMenuItem::separator())?;

    let quit = MenuItem::with_id(MenuId::new(ID_QUIT), "Quit Approva", true, None::<Accelerator>);
    menu.append(&quit)?;

    let items = MenuItems {
        greeting,
        status,
        progress,
        stats,
        last,
        start,
        pause,
        reset,
        mode_checks,
        sound_toggle: settings_menu.sound_toggle,
        notif_toggle: settings_menu.notif_toggle,
        work_checks: settings_menu.work_checks,
        break_checks: settings_menu.break_checks,
        countdown_checks: settings_menu.countdown_checks,
        goal_checks: settings_menu.goal_checks,
    };

    Ok((menu, items))
}

struct SettingsSubmenu {
    submenu: Submenu,
    work_checks: HashMap<u32, CheckMenuItem>,
    break_checks: HashMap<u32, CheckMenuItem>,
    countdown_checks: HashMap<u32, CheckMenuItem>,
    goal_checks: HashMap<u32, CheckMenuItem>,
    sound_toggle: CheckMenuItem,
    notif_toggle: CheckMenuItem,
}

/// Appends a submenu of check items, one per preset, to `parent`.
fn preset_submenu(
    parent: &Submenu,
    title: String,
    prefix: &str,
    presets: &[u32],
    current: u32,
    label: impl Fn(u32) -> String,
) -> Result<HashMap<u32, CheckMenuItem>, MenuError> {
    let sub = Submenu::new(title, true);
    let mut checks = HashMap::new();
    for &value in presets {
        let item = CheckMenuItem::with_id(
            MenuId::new(format!("{}{}", prefix, value)),
            label(value),
            true,
            value == current,
            None::<Accelerator>,
        );
        sub.append(&item)?;
        checks.insert(value, item);
    }
    parent.append(&sub)?;
    Ok(checks)
}

fn mins_label(mins: u32) -> String {
    format!("{} min", mins)
}

fn goal_label(hours: u32) -> String {
    match hours {
        0 => "Off".to_string(),
        1 => "1 hour".to_string(),
        h => format!("{} hours", h),
    }
}

fn build_settings_submenu(settings: &Settings) -> Result<SettingsSubmenu, MenuError> {
    let submenu = Submenu::new("⚙  Settings", true);

    let work_mins = settings.work_secs / 60;
    let work_checks = preset_submenu(
        &submenu,
        format!("Focus: {} min", work_mins),
        PREFIX_WORK,
        &WORK_PRESETS_MINS,
        work_mins,
        mins_label,
    )?;

    let break_mins = settings.break_secs / 60;
    let break_checks = preset_submenu(
        &submenu,
        format!("Break: {} min", break_mins),
        PREFIX_BREAK,
        &BREAK_PRESETS_MINS,
        break_mins,
        mins_label,
    )?;

    let countdown_mins = settings.countdown_secs / 60;
    let countdown_checks = preset_submenu(
        &submenu,
        format!("Countdown: {} min", countdown_mins),
        PREFIX_COUNTDOWN,
        &COUNTDOWN_PRESETS_MINS,
        countdown_mins,
        mins_label,
    )?;

    let goal_hours = settings.daily_goal_secs / 3600;
    let goal_checks = preset_submenu(
        &submenu,
        format!("Daily Goal: {}", goal_label(goal_hours)),
        PREFIX_GOAL,
        &GOAL_PRESETS_HOURS,
        goal_hours,
        goal_label,
    )?;

    submenu.append(&PredefinedMenuItem::separator())?;

    let sound_toggle = CheckMenuItem::with_id(
        MenuId::new(ID_SOUND_TOGGLE),
        "Sound Enabled",
        true,
        settings.sound_enabled,
        None::<Accelerator>,
    );
    submenu.append(&sound_toggle)?;

    let notif_toggle = CheckMenuItem::with_id(
        MenuId::new(ID_NOTIF_TOGGLE),
        "Notifications Enabled",
        true,
        settings.notifications_enabled,
        None::<Accelerator>,
    );
    submenu.append(&notif_toggle)?;

    submenu.append(&PredefinedMenuItem::separator())?;

    let reset = MenuItem::with_id(
        MenuId::new(ID_RESET_TODAY),
        "Reset Today's Progress",
        true,
        None::<Accelerator>,
    );
    submenu.append(&reset)?;

    Ok(SettingsSubmenu {
        submenu,
        work_checks,
        break_checks,
        countdown_checks,
        goal_checks,
        sound_toggle,
        notif_toggle,
    })
}

/// Updates the menu items based on the current app state.
pub fn update_menu_items(items: &MenuItems, app: &App) {
    let state = app.engine.state();

    items.greeting.set_text(app.greeting());
    items.status.set_text(format_status(state));
    items.progress.set_text(format_progress(app.engine.progress()));
    items.stats.set_text(format_stats(state, app.logged_today()));
    items.last.set_text(format_last_session(app.last_session()));

    items.start.set_enabled(!state.is_running);
    items.pause.set_enabled(state.is_running);

    for (mode, check) in &items.mode_checks {
        check.set_checked(*mode == state.mode);
    }
}

/// Formats the status line for the menu.
pub fn format_status(state: &TimerState) -> String {
    let time = format_time(state.display_secs());
    let (icon, label) = match state.mode {
        TimerMode::Pomodoro if state.is_break() => ("☕", "Break"),
        TimerMode::Pomodoro => ("🍅", "Focus"),
        TimerMode::Stopwatch => ("⏱", "Stopwatch"),
        TimerMode::Countdown if state.remaining_countdown_secs == 0 => {
            return "⏳  Countdown finished".to_string();
        }
        TimerMode::Countdown => ("⏳", "Countdown"),
    };

    if state.is_running {
        format!("{}  {} - {}", icon, label, time)
    } else {
        format!("⏸  {} - {} (paused)", label, time)
    }
}

/// Formats the progress bar for the menu.
pub fn format_progress(progress: Option<f32>) -> String {
    match progress {
        Some(pct) => {
            let filled = ((pct * 20.0).round() as usize).min(20);
            let empty = 20 - filled;
            format!(
                "{}{}  {}%",
                "█".repeat(filled),
                "░".repeat(empty),
                (pct * 100.0).round() as u32
            )
        }
        None => "░░░░░░░░░░░░░░░░░░░░  —".to_string(),
    }
}

/// Formats today's study totals for the menu.
pub fn format_stats(state: &TimerState, logged: &DailyStats) -> String {
    let studied = format_time(state.total_study_secs_today);
    let goal = match state.daily_goal_secs {
        0 => String::new(),
        g if state.goal_reached => format!(" / {} ✓", format_time(g)),
        g => format!(" / {}", format_time(g)),
    };
    format!(
        "Today: {}{}  🍅 {}  ({} saved)",
        studied, goal, state.completed_pomodoros, logged.sessions
    )
}

/// Formats the most recently saved session for the menu.
pub fn format_last_session(session: Option<&StudySession>) -> String {
    match session {
        Some(s) => format!(
            "Last: {} {} on {}",
            s.kind.label(),
            format_time(s.duration),
            s.date.format("%b %-d")
        ),
        None => "Last: no sessions yet".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionPhase;
    use chrono::NaiveDate;

    fn logged(sessions: u32) -> DailyStats {
        DailyStats {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            sessions,
            total_secs: sessions * 1500,
        }
    }

    #[test]
    fn test_format_status_idle() {
        let state = TimerState::default();
        assert_eq!(format_status(&state), "⏸  Focus - 25:00 (paused)");
    }

    #[test]
    fn test_format_status_focus_running() {
        let state = TimerState {
            remaining_work_secs: 1432,
            is_running: true,
            ..TimerState::default()
        };
        assert_eq!(format_status(&state), "🍅  Focus - 23:52");
    }

    #[test]
    fn test_format_status_break() {
        let state = TimerState {
            phase: SessionPhase::Break,
            remaining_break_secs: 180,
            is_running: true,
            ..TimerState::default()
        };
        assert_eq!(format_status(&state), "☕  Break - 03:00");
    }

    #[test]
    fn test_format_status_stopwatch_paused() {
        let state = TimerState {
            mode: TimerMode::Stopwatch,
            elapsed_stopwatch_secs: 125,
            ..TimerState::default()
        };
        assert_eq!(format_status(&state), "⏸  Stopwatch - 02:05 (paused)");
    }

    #[test]
    fn test_format_status_countdown_finished() {
        let state = TimerState {
            mode: TimerMode::Countdown,
            remaining_countdown_secs: 0,
            ..TimerState::default()
        };
        assert_eq!(format_status(&state), "⏳  Countdown finished");
    }

    #[test]
    fn test_format_progress_none() {
        assert_eq!(format_progress(None), "░░░░░░░░░░░░░░░░░░░░  —");
    }

    #[test]
    fn test_format_progress_half() {
        assert_eq!(format_progress(Some(0.5)), "██████████░░░░░░░░░░  50%");
    }

    #[test]
    fn test_format_progress_complete() {
        assert_eq!(format_progress(Some(1.0)), "████████████████████  100%");
    }

    #[test]
    fn test_format_stats_without_goal() {
        let state = TimerState {
            total_study_secs_today: 3000,
            completed_pomodoros: 2,
            ..TimerState::default()
        };
        assert_eq!(format_stats(&state, &logged(2)), "Today: 50:00  🍅 2  (2 saved)");
    }

    #[test]
    fn test_format_stats_with_goal() {
        let mut state = TimerState {
            total_study_secs_today: 3000,
            daily_goal_secs: 3600,
            ..TimerState::default()
        };
        assert_eq!(
            format_stats(&state, &logged(0)),
            "Today: 50:00 / 1:00:00  🍅 0  (0 saved)"
        );

        state.total_study_secs_today = 3600;
        state.goal_reached = true;
        assert!(format_stats(&state, &logged(0)).contains("1:00:00 / 1:00:00 ✓"));
    }

    #[test]
    fn test_format_last_session() {
        assert_eq!(format_last_session(None), "Last: no sessions yet");

        let session = StudySession {
            id: Some("abc".to_string()),
            user_id: "local".to_string(),
            duration: 1500,
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            kind: crate::models::SessionType::Pomodoro,
        };
        assert_eq!(
            format_last_session(Some(&session)),
            "Last: Pomodoro 25:00 on Jan 5"
        );
    }

    #[test]
    fn test_goal_label() {
        assert_eq!(goal_label(0), "Off");
        assert_eq!(goal_label(1), "1 hour");
        assert_eq!(goal_label(4), "4 hours");
    }
}
