//! Main application state and logic.

use crate::engine::{EngineEvent, FocusTimerEngine};
use crate::models::{DailyStats, Settings, StudySession};
use crate::persistence::{Database, DatabaseError, SharedStore, Storage};
use crate::phrases;
use chrono::{Datelike, Local, NaiveDate};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Main application state (without audio - audio is handled separately on main thread).
///
/// The store is reachable from here but has its own lock: nothing that holds
/// the app lock writes to it.
pub struct App {
    pub engine: FocusTimerEngine,
    pub settings: Settings,
    /// Sessions already logged today, as stored.
    logged_today: DailyStats,
    last_session: Option<StudySession>,
    store: SharedStore,
}

impl App {
    /// Creates a new application instance backed by the default database.
    pub fn new() -> Result<Self, AppError> {
        Self::with_storage(Box::new(Database::new()?), Local::now().date_naive())
    }

    /// Creates an app over any storage, starting on `today`.
    pub fn with_storage(db: Box<dyn Storage>, today: NaiveDate) -> Result<Self, AppError> {
        let store = SharedStore::new(db);
        let settings = store.load_settings()?;
        let engine = FocusTimerEngine::new(settings.timer_config(), today);
        let logged_today = load_stats(&store, &settings.user_id, today);
        let last_session = store.latest_session(&settings.user_id).unwrap_or_else(|e| {
            warn!(error = %e, "failed to load last study session");
            None
        });
        info!(
            user = %settings.user_id,
            work_secs = settings.work_secs,
            daily_goal_secs = settings.daily_goal_secs,
            "focus timer ready"
        );

        Ok(Self {
            engine,
            settings,
            logged_today,
            last_session,
            store,
        })
    }

    /// Starts a new day if the date changed. Returns true on rollover.
    ///
    /// Today's logged sessions start empty; [`reload_logged_today`] fills
    /// them from the store outside the lock.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if !self.engine.roll_over(today) {
            return false;
        }
        info!(%today, "new study day");
        self.logged_today = DailyStats::new(today);
        true
    }

    /// Clears today's progress on the timer. Logged sessions are kept.
    pub fn reset_today(&mut self) {
        self.engine.reset_day();
    }

    /// Updates a setting and hands the new durations to the engine. Saving is
    /// left to [`save_settings`].
    pub fn update_setting<F>(&mut self, updater: F)
    where
        F: FnOnce(&mut Settings),
    {
        updater(&mut self.settings);
        self.engine.configure(self.settings.timer_config());
    }

    /// The session to persist for `event`, if any.
    pub fn session_to_save(&self, event: &EngineEvent) -> Option<StudySession> {
        let EngineEvent::SessionCompleted(completed) = event else {
            return None;
        };
        Some(StudySession {
            id: None,
            user_id: self.settings.user_id.clone(),
            duration: completed.duration_secs,
            date: completed.date,
            kind: completed.kind,
        })
    }

    /// Folds a stored session into today's totals and the last session.
    pub fn note_saved(&mut self, saved: StudySession) {
        if saved.date == self.logged_today.date {
            self.logged_today.add(&saved);
        }
        self.last_session = Some(saved);
    }

    /// Sessions logged today.
    pub fn logged_today(&self) -> &DailyStats {
        &self.logged_today
    }

    /// The most recently saved session.
    pub fn last_session(&self) -> Option<&StudySession> {
        self.last_session.as_ref()
    }

    /// Handle to the store, for work done outside the app lock.
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Today's motivational phrase.
    pub fn greeting(&self) -> String {
        let seed = self.engine.today().num_days_from_ce().max(0) as u64;
        phrases::pick_phrase(seed, self.settings.student_name.as_deref())
    }
}

/// Locks the shared app. A poisoned lock still holds consistent state
/// because the engine never panics mid-tick.
pub fn lock_app(app: &Mutex<App>) -> MutexGuard<'_, App> {
    app.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Persists the durable part of an engine event.
///
/// The app lock is held only to build the session and to fold in the result;
/// the write runs without it. Failures are logged and returned for the caller
/// to surface. Returns the stored session, if one was written.
pub fn record_event(
    app: &Mutex<App>,
    event: &EngineEvent,
) -> Result<Option<StudySession>, AppError> {
    let (session, store) = {
        let app = lock_app(app);
        match app.session_to_save(event) {
            Some(session) => (session, app.store()),
            None => return Ok(None),
        }
    };

    let saved = store.save_session(&session).map_err(|e| {
        warn!(error = %e, kind = ?session.kind, duration = session.duration, "failed to save study session");
        e
    })?;
    info!(kind = ?saved.kind, duration = saved.duration, date = %saved.date, "study session saved");

    lock_app(app).note_saved(saved.clone());
    Ok(Some(saved))
}

/// Saves the current settings without holding the app lock during the write.
pub fn save_settings(app: &Mutex<App>) {
    let (settings, store) = {
        let app = lock_app(app);
        (app.settings.clone(), app.store())
    };
    if let Err(e) = store.save_settings(&settings) {
        warn!(error = %e, "failed to save settings");
    }
}

/// Reloads today's logged sessions after a day rollover.
pub fn reload_logged_today(app: &Mutex<App>) {
    let (user_id, today, store) = {
        let app = lock_app(app);
        (app.settings.user_id.clone(), app.engine.today(), app.store())
    };
    let stats = load_stats(&store, &user_id, today);

    let mut app = lock_app(app);
    // The day may have rolled again while the store was read.
    if app.engine.today() == stats.date {
        app.logged_today = stats;
    }
}

fn load_stats(store: &SharedStore, user_id: &str, date: NaiveDate) -> DailyStats {
    store.daily_stats(user_id, date).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load today's study sessions");
        DailyStats::new(date)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CompletedSession;
    use crate::models::{SessionPhase, SessionType, TimerMode};
    use crate::persistence::{Filter, OrderBy, Record, RecordStore, SettingsStore, Table};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn create_test_app() -> App {
        let db = Database::new_in_memory().unwrap();
        App::with_storage(Box::new(db), day(15)).unwrap()
    }

    fn shared(app: App) -> Arc<Mutex<App>> {
        Arc::new(Mutex::new(app))
    }

    /// Store whose record writes always fail.
    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn insert(&self, table: Table, _record: Record) -> Result<Record, DatabaseError> {
            Err(DatabaseError::NotFound {
                table: table.name(),
                id: "offline".to_string(),
            })
        }

        fn query(
            &self,
            _table: Table,
            _filter: &Filter,
            _order: Option<&OrderBy>,
        ) -> Result<Vec<Record>, DatabaseError> {
            Err(DatabaseError::NotAnObject)
        }

        fn update(&self, table: Table, id: &str, _patch: Record) -> Result<(), DatabaseError> {
            Err(DatabaseError::NotFound {
                table: table.name(),
                id: id.to_string(),
            })
        }
    }

    impl SettingsStore for BrokenStore {
        fn load_settings(&self) -> Result<Settings, DatabaseError> {
            Ok(Settings {
                work_secs: 3,
                break_secs: 2,
                ..Settings::default()
            })
        }

        fn save_settings(&self, _settings: &Settings) -> Result<(), DatabaseError> {
            Err(DatabaseError::NotAnObject)
        }
    }

    /// In-memory store whose inserts take a while.
    struct SlowStore {
        inner: Database,
        delay: Duration,
    }

    impl RecordStore for SlowStore {
        fn insert(&self, table: Table, record: Record) -> Result<Record, DatabaseError> {
            thread::sleep(self.delay);
            self.inner.insert(table, record)
        }

        fn query(
            &self,
            table: Table,
            filter: &Filter,
            order: Option<&OrderBy>,
        ) -> Result<Vec<Record>, DatabaseError> {
            self.inner.query(table, filter, order)
        }

        fn update(&self, table: Table, id: &str, patch: Record) -> Result<(), DatabaseError> {
            self.inner.update(table, id, patch)
        }
    }

    impl SettingsStore for SlowStore {
        fn load_settings(&self) -> Result<Settings, DatabaseError> {
            self.inner.load_settings()
        }

        fn save_settings(&self, settings: &Settings) -> Result<(), DatabaseError> {
            self.inner.save_settings(settings)
        }
    }

    fn completed(duration_secs: u32, kind: SessionType, date: NaiveDate) -> EngineEvent {
        EngineEvent::SessionCompleted(CompletedSession {
            duration_secs,
            kind,
            date,
        })
    }

    #[test]
    fn test_app_initial_state() {
        let app = create_test_app();
        assert_eq!(app.settings, Settings::default());
        assert!(!app.engine.is_running());
        assert_eq!(app.engine.state().mode, TimerMode::Pomodoro);
        assert_eq!(app.logged_today(), &DailyStats::new(day(15)));
        assert!(app.last_session().is_none());
    }

    #[test]
    fn test_update_setting_configures_engine() {
        let mut app = create_test_app();
        app.update_setting(|s| {
            s.work_secs = 1800;
            s.daily_goal_secs = 7200;
        });

        assert_eq!(app.engine.config().work_secs, 1800);
        assert_eq!(app.engine.state().daily_goal_secs, 7200);
        // The untouched interval picks up the new length on reset.
        assert_eq!(app.engine.state().remaining_work_secs, 1500);
        app.engine.reset();
        assert_eq!(app.engine.state().remaining_work_secs, 1800);
    }

    #[test]
    fn test_save_settings_persists() {
        let app = shared(create_test_app());
        lock_app(&app).update_setting(|s| s.work_secs = 1800);
        save_settings(&app);

        let store = lock_app(&app).store();
        assert_eq!(store.load_settings().unwrap().work_secs, 1800);
    }

    #[test]
    fn test_update_setting_clamps_zero_durations() {
        let mut app = create_test_app();
        app.update_setting(|s| s.break_secs = 0);
        assert_eq!(app.engine.config().break_secs, 1);
    }

    #[test]
    fn test_record_event_saves_completed_session() {
        let app = shared(create_test_app());
        record_event(&app, &completed(1500, SessionType::Pomodoro, day(15))).unwrap();
        let saved = record_event(&app, &completed(600, SessionType::Countdown, day(15)))
            .unwrap()
            .unwrap();
        assert!(saved.id.is_some());

        let app = lock_app(&app);
        assert_eq!(app.logged_today().sessions, 2);
        assert_eq!(app.logged_today().total_secs, 2100);
        assert_eq!(app.last_session().unwrap().kind, SessionType::Countdown);

        let rows = app
            .store()
            .lock()
            .query(Table::StudySessions, &Filter::new(), None)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["user_id"], "local");
        assert_eq!(rows[0]["type"], "pomodoro");
        assert_eq!(rows[0]["date"], "2024-01-15");
    }

    #[test]
    fn test_record_event_ignores_non_session_events() {
        let app = shared(create_test_app());
        assert!(record_event(&app, &EngineEvent::GoalReached).unwrap().is_none());
        assert!(record_event(&app, &EngineEvent::BreakFinished).unwrap().is_none());
        assert_eq!(lock_app(&app).logged_today().sessions, 0);
    }

    #[test]
    fn test_record_event_other_day_does_not_count_today() {
        let app = shared(create_test_app());
        record_event(&app, &completed(900, SessionType::Stopwatch, day(14))).unwrap();
        assert_eq!(lock_app(&app).logged_today().sessions, 0);
        assert_eq!(lock_app(&app).last_session().unwrap().duration, 900);
    }

    #[test]
    fn test_slow_save_does_not_block_tick() {
        let store = SlowStore {
            inner: Database::new_in_memory().unwrap(),
            delay: Duration::from_millis(800),
        };
        let app = shared(App::with_storage(Box::new(store), day(15)).unwrap());
        lock_app(&app).engine.start();

        let writer = Arc::clone(&app);
        let handle = thread::spawn(move || {
            record_event(&writer, &completed(1500, SessionType::Pomodoro, day(15)))
        });
        // Let the write get under way.
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        let (changed, _) = lock_app(&app).engine.tick();
        let waited = started.elapsed();
        assert!(changed);
        assert!(waited < Duration::from_millis(400), "tick waited {:?}", waited);

        handle.join().unwrap().unwrap();
        assert_eq!(lock_app(&app).logged_today().sessions, 1);
    }

    #[test]
    fn test_persistence_failure_leaves_timer_running() {
        let app = shared(App::with_storage(Box::new(BrokenStore), day(15)).unwrap());
        assert_eq!(lock_app(&app).engine.state().remaining_work_secs, 3);
        lock_app(&app).engine.start();

        let mut events = Vec::new();
        for _ in 0..3 {
            events.extend(lock_app(&app).engine.tick().1);
        }
        let before = lock_app(&app).engine.state().clone();
        assert_eq!(before.phase, SessionPhase::Break);

        for event in &events {
            if matches!(event, EngineEvent::SessionCompleted(_)) {
                assert!(record_event(&app, event).is_err());
            }
        }

        let mut app = lock_app(&app);
        assert!(app.last_session().is_none());
        assert_eq!(app.engine.state(), &before);
        app.engine.tick();
        app.engine.tick();
        assert_eq!(app.engine.state().phase, SessionPhase::Work);
        assert_eq!(app.engine.state().completed_pomodoros, 1);
    }

    #[test]
    fn test_settings_save_failure_still_configures() {
        let app = shared(App::with_storage(Box::new(BrokenStore), day(15)).unwrap());
        lock_app(&app).update_setting(|s| s.countdown_secs = 90);
        save_settings(&app);
        assert_eq!(lock_app(&app).engine.config().countdown_secs, 90);
    }

    #[test]
    fn test_roll_over_reloads_logged_sessions() {
        let app = shared(create_test_app());
        record_event(&app, &completed(1500, SessionType::Pomodoro, day(16))).unwrap();
        assert_eq!(lock_app(&app).logged_today().sessions, 0);

        assert!(!lock_app(&app).roll_over(day(15)));
        assert!(lock_app(&app).roll_over(day(16)));
        assert_eq!(lock_app(&app).logged_today(), &DailyStats::new(day(16)));

        reload_logged_today(&app);
        let app = lock_app(&app);
        assert_eq!(app.logged_today().sessions, 1);
        assert_eq!(app.logged_today().date, day(16));
    }

    #[test]
    fn test_reset_today_keeps_logged_sessions() {
        let app = shared(create_test_app());
        let event = {
            let mut app = lock_app(&app);
            app.update_setting(|s| s.daily_goal_secs = 2);
            app.engine.switch_mode(TimerMode::Stopwatch);
            app.engine.start();
            app.engine.tick();
            app.engine.tick();
            app.engine.reset().unwrap()
        };
        record_event(&app, &event).unwrap();

        let mut app = lock_app(&app);
        assert!(app.engine.state().goal_reached);
        app.reset_today();
        assert!(!app.engine.state().goal_reached);
        assert_eq!(app.engine.state().total_study_secs_today, 0);
        assert_eq!(app.logged_today().sessions, 1);
    }

    #[test]
    fn test_greeting_uses_student_name() {
        let mut app = create_test_app();
        assert!(app.greeting().contains("student"));
        app.update_setting(|s| s.student_name = Some("Ana".to_string()));
        assert!(app.greeting().contains("Ana"));
        assert_eq!(app.greeting(), app.greeting());
    }
}
