//! The focus timer state machine.
//!
//! [`FocusTimerEngine`] owns a [`TimerState`] and is advanced one second at a
//! time by [`FocusTimerEngine::tick`]. It performs no I/O: anything that has
//! to outlive the engine is handed back to the caller as an [`EngineEvent`].

use crate::models::{SessionPhase, SessionType, TimerConfig, TimerMode, TimerState};
use chrono::NaiveDate;
use tracing::debug;

/// A study session that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedSession {
    pub duration_secs: u32,
    pub kind: SessionType,
    pub date: NaiveDate,
}

/// Events emitted by the engine for the host to act upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// A countable session finished and should be persisted.
    SessionCompleted(CompletedSession),
    /// The daily goal was reached. Emitted at most once per day.
    GoalReached,
    /// A pomodoro break ended and the next work interval is armed.
    BreakFinished,
}

pub struct FocusTimerEngine {
    state: TimerState,
    config: TimerConfig,
    /// Length the current work interval was armed with.
    armed_work_secs: u32,
    /// Length the current countdown was armed with.
    armed_countdown_secs: u32,
    today: NaiveDate,
}

impl FocusTimerEngine {
    /// Creates an engine in pomodoro mode, paused, at the start of a work
    /// interval.
    pub fn new(config: TimerConfig, today: NaiveDate) -> Self {
        Self {
            state: TimerState::new(&config),
            armed_work_secs: config.work_secs,
            armed_countdown_secs: config.countdown_secs,
            config,
            today,
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    #[cfg(test)]
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn start(&mut self) {
        self.state.is_running = true;
    }

    pub fn pause(&mut self) {
        self.state.is_running = false;
    }

    /// Restores the current mode's counter and pauses.
    ///
    /// Resetting a stopwatch that has been running completes a stopwatch
    /// session; the returned event carries its length.
    pub fn reset(&mut self) -> Option<EngineEvent> {
        self.state.is_running = false;
        match self.state.mode {
            TimerMode::Pomodoro => {
                self.arm_work();
                self.state.phase = SessionPhase::Work;
                None
            }
            TimerMode::Stopwatch => {
                let elapsed = std::mem::take(&mut self.state.elapsed_stopwatch_secs);
                (elapsed > 0).then(|| self.completed(elapsed, SessionType::Stopwatch))
            }
            TimerMode::Countdown => {
                self.arm_countdown();
                None
            }
        }
    }

    /// Pauses and switches to `mode`, leaving other counters untouched.
    pub fn switch_mode(&mut self, mode: TimerMode) {
        self.state.is_running = false;
        if self.state.mode == mode {
            return;
        }
        debug!(from = self.state.mode.as_str(), to = mode.as_str(), "switching timer mode");
        self.state.mode = mode;

        // Counters that were never started pick up the latest configuration.
        match mode {
            TimerMode::Pomodoro => {
                if self.state.phase == SessionPhase::Work
                    && self.state.remaining_work_secs == self.armed_work_secs
                {
                    self.arm_work();
                }
            }
            TimerMode::Countdown => {
                let remaining = self.state.remaining_countdown_secs;
                if remaining == 0 || remaining == self.armed_countdown_secs {
                    self.arm_countdown();
                }
            }
            TimerMode::Stopwatch => {}
        }
    }

    /// Replaces the configuration. Running counters keep their current
    /// interval; the new durations apply on the next reset or mode entry.
    pub fn configure(&mut self, config: TimerConfig) {
        self.config = config;
        self.state.daily_goal_secs = config.daily_goal_secs;
    }

    /// Advances the engine by one second.
    ///
    /// Returns whether any state changed, together with the events produced
    /// by this tick.
    pub fn tick(&mut self) -> (bool, Vec<EngineEvent>) {
        let mut events = Vec::new();
        if !self.state.is_running {
            return (false, events);
        }

        match self.state.mode {
            TimerMode::Pomodoro => match self.state.phase {
                SessionPhase::Work => {
                    self.state.remaining_work_secs = self.state.remaining_work_secs.saturating_sub(1);
                    if self.state.remaining_work_secs == 0 {
                        events.push(self.completed(self.armed_work_secs, SessionType::Pomodoro));
                        self.state.completed_pomodoros += 1;
                        self.state.phase = SessionPhase::Break;
                        self.state.remaining_break_secs = self.config.break_secs;
                    }
                    self.accrue_study_second(&mut events);
                }
                SessionPhase::Break => {
                    self.state.remaining_break_secs =
                        self.state.remaining_break_secs.saturating_sub(1);
                    if self.state.remaining_break_secs == 0 {
                        self.state.phase = SessionPhase::Work;
                        self.arm_work();
                        events.push(EngineEvent::BreakFinished);
                    }
                }
            },
            TimerMode::Stopwatch => {
                self.state.elapsed_stopwatch_secs += 1;
                self.accrue_study_second(&mut events);
            }
            TimerMode::Countdown => {
                if self.state.remaining_countdown_secs > 0 {
                    self.state.remaining_countdown_secs -= 1;
                    self.accrue_study_second(&mut events);
                    if self.state.remaining_countdown_secs == 0 {
                        self.state.is_running = false;
                        events.push(
                            self.completed(self.armed_countdown_secs, SessionType::Countdown),
                        );
                    }
                } else {
                    self.state.is_running = false;
                }
            }
        }

        (true, events)
    }

    /// Starts a new calendar day if `today` differs from the engine's date.
    /// Returns true if the day changed.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.today == today {
            return false;
        }
        debug!(%today, "day rollover");
        self.today = today;
        self.reset_day();
        true
    }

    /// Clears the day-scoped counters and the goal latch.
    pub fn reset_day(&mut self) {
        self.state.total_study_secs_today = 0;
        self.state.completed_pomodoros = 0;
        self.state.goal_reached = false;
    }

    /// Fraction (0.0 to 1.0) of the active interval elapsed. The stopwatch
    /// has no interval and returns None.
    pub fn progress(&self) -> Option<f32> {
        let (remaining, total) = match (self.state.mode, self.state.phase) {
            (TimerMode::Pomodoro, SessionPhase::Work) => {
                (self.state.remaining_work_secs, self.armed_work_secs)
            }
            (TimerMode::Pomodoro, SessionPhase::Break) => {
                (self.state.remaining_break_secs, self.config.break_secs)
            }
            (TimerMode::Countdown, _) => {
                (self.state.remaining_countdown_secs, self.armed_countdown_secs)
            }
            (TimerMode::Stopwatch, _) => return None,
        };
        if total == 0 {
            return Some(1.0);
        }
        Some((1.0 - remaining as f32 / total as f32).clamp(0.0, 1.0))
    }

    fn accrue_study_second(&mut self, events: &mut Vec<EngineEvent>) {
        self.state.total_study_secs_today += 1;
        let goal = self.state.daily_goal_secs;
        if goal > 0 && !self.state.goal_reached && self.state.total_study_secs_today >= goal {
            self.state.goal_reached = true;
            events.push(EngineEvent::GoalReached);
        }
    }

    fn arm_work(&mut self) {
        self.armed_work_secs = self.config.work_secs;
        self.state.remaining_work_secs = self.config.work_secs;
    }

    fn arm_countdown(&mut self) {
        self.armed_countdown_secs = self.config.countdown_secs;
        self.state.remaining_countdown_secs = self.config.countdown_secs;
    }

    fn completed(&self, duration_secs: u32, kind: SessionType) -> EngineEvent {
        EngineEvent::SessionCompleted(CompletedSession {
            duration_secs,
            kind,
            date: self.today,
        })
    }
}
