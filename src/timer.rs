//! Timer tick loop driving the focus engine.

use crate::app::App;
use crate::engine::EngineEvent;
use crate::models::{SessionPhase, TimerMode, TimerState};
use chrono::Local;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

/// Message sent from the timer thread to the main thread.
#[derive(Debug, Clone)]
pub enum TimerMessage {
    /// Timer state has changed, UI needs update.
    StateChanged { title: String },
    /// The engine emitted an event; persist it and notify.
    Engine(EngineEvent),
    /// A new calendar day started; reload what was logged for it.
    DayStarted,
}

/// Runs the timer loop, ticking every second.
///
/// The app is only locked for the tick itself and this thread never touches
/// the store. Events are forwarded to the main thread, which persists them
/// without the app lock, so a slow write never delays a tick.
pub fn run_timer_loop(app: Arc<Mutex<App>>, tx: Sender<TimerMessage>) {
    loop {
        thread::sleep(Duration::from_secs(1));

        let (title, rolled, events) = {
            let Ok(mut app) = app.lock() else {
                error!("app state poisoned, stopping timer loop");
                return;
            };

            let rolled = app.roll_over(Local::now().date_naive());
            let (changed, events) = app.engine.tick();

            let title = (changed || rolled).then(|| format_tray_title(app.engine.state()));
            (title, rolled, events)
        };

        if rolled && tx.send(TimerMessage::DayStarted).is_err() {
            return;
        }

        for event in events {
            debug!(?event, "engine event");
            if tx.send(TimerMessage::Engine(event)).is_err() {
                return;
            }
        }

        if let Some(title) = title {
            if tx.send(TimerMessage::StateChanged { title }).is_err() {
                return;
            }
        }
    }
}

/// Formats the tray title based on current timer state.
pub fn format_tray_title(state: &TimerState) -> String {
    let icon = if !state.is_running {
        if state.mode == TimerMode::Pomodoro
            && state.phase == SessionPhase::Work
            && state.total_study_secs_today == 0
            && !state.goal_reached
        {
            return "🍅".to_string();
        }
        "⏸"
    } else {
        match (state.mode, state.phase) {
            (TimerMode::Pomodoro, SessionPhase::Work) => "🍅",
            (TimerMode::Pomodoro, SessionPhase::Break) => "☕",
            (TimerMode::Stopwatch, _) => "⏱",
            (TimerMode::Countdown, _) => "⏳",
        }
    };
    let goal = if state.goal_reached { " ✓" } else { "" };
    format!("{} {}{}", icon, format_time(state.display_secs()), goal)
}

/// Formats time as MM:SS, or H:MM:SS from one hour up.
pub fn format_time(secs: u32) -> String {
    if secs >= 3600 {
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else {
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}
