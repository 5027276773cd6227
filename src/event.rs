//! Menu event handling.

use crate::app::App;
use crate::engine::EngineEvent;
use crate::menu::{
    MenuItems, ID_NOTIF_TOGGLE, ID_PAUSE, ID_QUIT, ID_RESET, ID_RESET_TODAY, ID_SOUND_TOGGLE,
    ID_START, PREFIX_BREAK, PREFIX_COUNTDOWN, PREFIX_GOAL, PREFIX_MODE, PREFIX_WORK,
};
use crate::models::TimerMode;
use muda::MenuEvent;
use std::collections::HashMap;
use tracing::debug;

/// Result of handling a menu event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResult {
    /// Event handled, continue running.
    Continue,
    /// User requested quit.
    Quit,
    /// State changed, menu needs update.
    StateChanged,
    /// Settings changed; save them and update the menu.
    SettingsChanged,
    /// State changed and the engine emitted an event.
    StateChangedWithEvent(EngineEvent),
}

/// A command decoded from a menu item id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Reset,
    SwitchMode(TimerMode),
    SetWorkMins(u32),
    SetBreakMins(u32),
    SetCountdownMins(u32),
    SetGoalHours(u32),
    ToggleSound,
    ToggleNotifications,
    ResetToday,
    Quit,
}

impl Command {
    /// Decodes a menu item id. Informational items decode to None.
    pub fn parse(id: &str) -> Option<Self> {
        match id {
            ID_START => return Some(Self::Start),
            ID_PAUSE => return Some(Self::Pause),
            ID_RESET => return Some(Self::Reset),
            ID_SOUND_TOGGLE => return Some(Self::ToggleSound),
            ID_NOTIF_TOGGLE => return Some(Self::ToggleNotifications),
            ID_RESET_TODAY => return Some(Self::ResetToday),
            ID_QUIT => return Some(Self::Quit),
            _ => {}
        }

        if let Some(mode) = id.strip_prefix(PREFIX_MODE) {
            return TimerMode::from_str(mode).map(Self::SwitchMode);
        }

        let presets: [(&str, fn(u32) -> Self); 4] = [
            (PREFIX_WORK, Self::SetWorkMins),
            (PREFIX_BREAK, Self::SetBreakMins),
            (PREFIX_COUNTDOWN, Self::SetCountdownMins),
            (PREFIX_GOAL, Self::SetGoalHours),
        ];
        presets.iter().find_map(|(prefix, command)| {
            id.strip_prefix(prefix)
                .and_then(|n| n.parse::<u32>().ok())
                .map(command)
        })
    }
}

/// Applies a command to the app.
pub fn apply_command(app: &mut App, command: Command) -> EventResult {
    debug!(?command, "menu command");
    match command {
        Command::Start => {
            app.engine.start();
            EventResult::StateChanged
        }
        Command::Pause => {
            app.engine.pause();
            EventResult::StateChanged
        }
        Command::Reset => match app.engine.reset() {
            Some(event) => EventResult::StateChangedWithEvent(event),
            None => EventResult::StateChanged,
        },
        Command::SwitchMode(mode) => {
            app.engine.switch_mode(mode);
            EventResult::StateChanged
        }
        Command::SetWorkMins(mins) => {
            app.update_setting(|s| s.work_secs = mins * 60);
            EventResult::SettingsChanged
        }
        Command::SetBreakMins(mins) => {
            app.update_setting(|s| s.break_secs = mins * 60);
            EventResult::SettingsChanged
        }
        Command::SetCountdownMins(mins) => {
            app.update_setting(|s| s.countdown_secs = mins * 60);
            EventResult::SettingsChanged
        }
        Command::SetGoalHours(hours) => {
            app.update_setting(|s| s.daily_goal_secs = hours * 3600);
            EventResult::SettingsChanged
        }
        Command::ToggleSound => {
            app.update_setting(|s| s.sound_enabled = !s.sound_enabled);
            EventResult::SettingsChanged
        }
        Command::ToggleNotifications => {
            app.update_setting(|s| s.notifications_enabled = !s.notifications_enabled);
            EventResult::SettingsChanged
        }
        Command::ResetToday => {
            app.reset_today();
            EventResult::StateChanged
        }
        Command::Quit => EventResult::Quit,
    }
}

/// Handles a menu event and updates the app state and check marks.
pub fn handle_menu_event(app: &mut App, items: &MenuItems, event: MenuEvent) -> EventResult {
    let Some(command) = Command::parse(event.id().as_ref()) else {
        return EventResult::Continue;
    };
    let result = apply_command(app, command);
    sync_checks(items, app, command);
    result
}

/// Keeps check marks in line with the settings after a command.
fn sync_checks(items: &MenuItems, app: &App, command: Command) {
    let settings = &app.settings;
    let select = |checks: &HashMap<u32, muda::CheckMenuItem>, selected: u32| {
        for (&value, check) in checks {
            check.set_checked(value == selected);
        }
    };

    match command {
        Command::SetWorkMins(_) => select(&items.work_checks, settings.work_secs / 60),
        Command::SetBreakMins(_) => select(&items.break_checks, settings.break_secs / 60),
        Command::SetCountdownMins(_) => {
            select(&items.countdown_checks, settings.countdown_secs / 60)
        }
        Command::SetGoalHours(_) => select(&items.goal_checks, settings.daily_goal_secs / 3600),
        Command::ToggleSound => items.sound_toggle.set_checked(settings.sound_enabled),
        Command::ToggleNotifications => {
            items.notif_toggle.set_checked(settings.notifications_enabled)
        }
        _ => {}
    }
}
