//! System notifications for timer events.
//!
//! Every notification is shown from a background thread so the caller never
//! waits on the notification service.

use crate::engine::CompletedSession;
use crate::models::SessionType;
use crate::timer::format_time;
use notify_rust::Notification;
use std::thread;
use tracing::warn;

fn show(summary: &'static str, body: String) {
    thread::spawn(move || {
        if let Err(e) = Notification::new()
            .summary(summary)
            .body(&body)
            .sound_name("default")
            .show()
        {
            warn!(error = %e, summary, "failed to show notification");
        }
    });
}

/// Body text for a completed session.
fn session_body(session: &CompletedSession, pomodoros_today: u32) -> String {
    let length = format_time(session.duration_secs);
    match session.kind {
        SessionType::Pomodoro if pomodoros_today == 1 => {
            "Great work! 1 pomodoro done today.\nTime for a break.".to_string()
        }
        SessionType::Pomodoro => format!(
            "Great work! {} pomodoros done today.\nTime for a break.",
            pomodoros_today
        ),
        SessionType::Stopwatch => format!("Stopwatch session of {} saved.", length),
        SessionType::Countdown => format!("Countdown of {} finished. Nice focus!", length),
    }
}

/// Summary and body for a finished session. An unsaved session gets the
/// failure notice instead of the usual one.
fn session_notice(
    session: &CompletedSession,
    pomodoros_today: u32,
    saved: bool,
) -> (&'static str, String) {
    if !saved {
        return (
            "Could not save session",
            format!(
                "Your {} session was not recorded. The timer keeps running.",
                session.kind.label().to_lowercase()
            ),
        );
    }
    let summary = match session.kind {
        SessionType::Pomodoro => "Pomodoro Complete! 🍅",
        SessionType::Stopwatch => "Session Saved ⏱",
        SessionType::Countdown => "Countdown Complete! ⏳",
    };
    (summary, session_body(session, pomodoros_today))
}

/// Shows a notification when a study session completes.
pub fn notify_session_complete(session: &CompletedSession, pomodoros_today: u32, saved: bool) {
    let (summary, body) = session_notice(session, pomodoros_today, saved);
    show(summary, body);
}

/// Shows a notification when a break ends.
pub fn notify_break_complete() {
    show("Break Over! ☕", "Ready for the next pomodoro?".to_string());
}

/// Shows a notification when the daily goal is reached.
pub fn notify_goal_reached(phrase: String) {
    show("Daily Goal Reached! 🎉", phrase);
}

#[cfg(test)]
mod tests {
    // Showing notifications talks to the system and may hang, so those tests
    // are ignored. Run with `cargo test -- --ignored` to execute them.

    use super::*;
    use chrono::NaiveDate;

    fn session(kind: SessionType, duration_secs: u32) -> CompletedSession {
        CompletedSession {
            duration_secs,
            kind,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        }
    }

    #[test]
    fn test_session_body_pomodoro_singular() {
        let body = session_body(&session(SessionType::Pomodoro, 1500), 1);
        assert_eq!(body, "Great work! 1 pomodoro done today.\nTime for a break.");
    }

    #[test]
    fn test_session_body_pomodoro_plural() {
        let body = session_body(&session(SessionType::Pomodoro, 1500), 5);
        assert!(body.contains("5 pomodoros"));
    }

    #[test]
    fn test_session_body_timed_modes() {
        let body = session_body(&session(SessionType::Stopwatch, 3725), 0);
        assert_eq!(body, "Stopwatch session of 1:02:05 saved.");
        let body = session_body(&session(SessionType::Countdown, 600), 0);
        assert!(body.contains("10:00"));
    }

    #[test]
    fn test_saved_session_notice() {
        let (summary, body) = session_notice(&session(SessionType::Stopwatch, 600), 0, true);
        assert_eq!(summary, "Session Saved ⏱");
        assert_eq!(body, "Stopwatch session of 10:00 saved.");
    }

    #[test]
    fn test_unsaved_session_notice_does_not_claim_saved() {
        let (summary, body) = session_notice(&session(SessionType::Stopwatch, 600), 0, false);
        assert_eq!(summary, "Could not save session");
        assert_eq!(
            body,
            "Your stopwatch session was not recorded. The timer keeps running."
        );
        assert!(!body.contains("saved"));
    }

    #[test]
    #[ignore = "Requires system notification interaction"]
    fn test_session_notification() {
        notify_session_complete(&session(SessionType::Pomodoro, 1500), 2, true);
    }

    #[test]
    #[ignore = "Requires system notification interaction"]
    fn test_goal_notification() {
        notify_goal_reached("Every minute counts, student. Let's go!".to_string());
    }

    #[test]
    #[ignore = "Requires system notification interaction"]
    fn test_save_failed_notification() {
        notify_session_complete(&session(SessionType::Countdown, 600), 0, false);
    }
}
