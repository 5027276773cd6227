//! Approva Focus - a menubar study timer.
//!
//! Pomodoro, stopwatch and countdown modes with a daily study goal. Completed
//! sessions are recorded locally so study history survives restarts.

use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use muda::MenuEvent;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tray_icon::{TrayIcon, TrayIconBuilder};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

mod app;
mod audio;
mod engine;
mod event;
mod menu;
mod models;
mod notifications;
mod persistence;
mod phrases;
mod timer;
mod tray;

use app::App;
use audio::{AudioPlayer, Chime};
use engine::EngineEvent;
use event::EventResult;
use menu::MenuItems;
use timer::TimerMessage;
use tray::IconKind;

/// Environment variable holding the log filter, e.g. `APPROVA_LOG=debug`.
const LOG_ENV: &str = "APPROVA_LOG";

/// Application handler for the winit event loop.
struct Approva {
    app: Arc<Mutex<App>>,
    tray: Option<TrayIcon>,
    icon: Option<IconKind>,
    menu_items: Option<MenuItems>,
    timer_rx: Receiver<TimerMessage>,
    audio: Option<AudioPlayer>,
}

impl Approva {
    fn new(app: Arc<Mutex<App>>, tray: TrayIcon, timer_rx: Receiver<TimerMessage>) -> Self {
        // Audio is created on the main thread to avoid Send issues
        let audio = AudioPlayer::new()
            .map_err(|e| warn!(error = %e, "audio unavailable"))
            .ok();

        Self {
            app,
            tray: Some(tray),
            icon: None,
            menu_items: None,
            timer_rx,
            audio,
        }
    }

    fn set_menu_items(&mut self, items: MenuItems) {
        self.menu_items = Some(items);
    }

    fn lock_app(&self) -> MutexGuard<'_, App> {
        app::lock_app(&self.app)
    }

    /// Refreshes menu, title and icon from the current state. The timer
    /// thread already formats the title, so it is passed through when known.
    fn refresh(&mut self, title: Option<String>) {
        let (title, kind) = {
            let app = self.lock_app();
            if let Some(ref items) = self.menu_items {
                menu::update_menu_items(items, &app);
            }
            let state = app.engine.state();
            let title = title.unwrap_or_else(|| timer::format_tray_title(state));
            (title, IconKind::for_state(state))
        };
        self.update_tray(&title, kind);
    }

    fn update_tray(&mut self, title: &str, kind: IconKind) {
        let Some(ref tray) = self.tray else {
            return;
        };
        tray.set_title(Some(title));

        if self.icon != Some(kind) {
            match tray::load_icon(kind) {
                Ok(icon) => {
                    if let Err(e) = tray.set_icon(Some(icon)) {
                        warn!(error = %e, "failed to set tray icon");
                    }
                    self.icon = Some(kind);
                }
                Err(e) => warn!(error = %e, "failed to build tray icon"),
            }
        }
    }

    /// Persists and announces an engine event. Runs on the main thread, off
    /// the tick path; the app lock is released while the store is written.
    fn handle_engine_event(&self, event: EngineEvent) {
        let saved = app::record_event(&self.app, &event).is_ok();

        let app = self.lock_app();
        let sound = app.settings.sound_enabled;
        let notify = app.settings.notifications_enabled;

        match event {
            EngineEvent::SessionCompleted(session) => {
                if sound {
                    self.play(Chime::SessionComplete);
                }
                if notify || !saved {
                    notifications::notify_session_complete(
                        &session,
                        app.engine.state().completed_pomodoros,
                        saved,
                    );
                }
            }
            EngineEvent::GoalReached => {
                info!(goal_secs = app.engine.state().daily_goal_secs, "daily goal reached");
                if sound {
                    self.play(Chime::GoalReached);
                }
                if notify {
                    notifications::notify_goal_reached(app.greeting());
                }
            }
            EngineEvent::BreakFinished => {
                if sound {
                    self.play(Chime::SessionComplete);
                }
                if notify {
                    notifications::notify_break_complete();
                }
            }
        }
    }

    fn play(&self, chime: Chime) {
        if let Some(ref audio) = self.audio {
            audio.play(chime);
        }
    }

    fn process_timer_messages(&mut self) {
        // Process all pending timer messages
        while let Ok(msg) = self.timer_rx.try_recv() {
            match msg {
                TimerMessage::StateChanged { title } => {
                    self.refresh(Some(title));
                }
                TimerMessage::Engine(event) => {
                    self.handle_engine_event(event);
                }
                TimerMessage::DayStarted => {
                    app::reload_logged_today(&self.app);
                    self.refresh(None);
                }
            }
        }
    }

    fn process_menu_events(&mut self, event_loop: &ActiveEventLoop) {
        let Ok(event) = MenuEvent::receiver().try_recv() else {
            return;
        };
        let result = match self.menu_items {
            Some(ref items) => {
                let mut app = self.lock_app();
                event::handle_menu_event(&mut app, items, event)
            }
            None => return,
        };

        match result {
            EventResult::Quit => {
                info!("quitting");
                event_loop.exit();
            }
            EventResult::StateChanged => {
                self.refresh(None);
            }
            EventResult::SettingsChanged => {
                app::save_settings(&self.app);
                self.refresh(None);
            }
            EventResult::StateChangedWithEvent(engine_event) => {
                self.refresh(None);
                self.handle_engine_event(engine_event);
            }
            EventResult::Continue => {}
        }
    }
}

impl ApplicationHandler for Approva {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {
        // Nothing to do on resume for a tray-only app
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        _event: WindowEvent,
    ) {
        // No window events for a tray-only app
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);

        // Process timer messages from the background thread
        self.process_timer_messages();

        // Process menu events
        self.process_menu_events(event_loop);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let app = App::new().map_err(|e| {
        error!(error = %e, "failed to start");
        e
    })?;
    let app = Arc::new(Mutex::new(app));

    // Create event loop (required for tray on macOS)
    let event_loop = EventLoop::new()?;

    let (built_menu, menu_items, title, kind) = {
        let app_lock = app.lock().map_err(|_| "app state poisoned")?;
        let (built_menu, menu_items) = menu::build_menu(&app_lock)?;
        let state = app_lock.engine.state();
        (
            built_menu,
            menu_items,
            timer::format_tray_title(state),
            IconKind::for_state(state),
        )
    };

    let tray = TrayIconBuilder::new()
        .with_menu(Box::new(built_menu))
        .with_icon(tray::load_icon(kind)?)
        .with_title(&title)
        .with_tooltip("Approva Focus")
        .build()?;

    // Create channel for timer messages
    let (tx, rx) = mpsc::channel();

    // Spawn timer tick thread
    let app_clone = Arc::clone(&app);
    thread::spawn(move || {
        timer::run_timer_loop(app_clone, tx);
    });

    let mut approva = Approva::new(Arc::clone(&app), tray, rx);
    approva.icon = Some(kind);
    approva.set_menu_items(menu_items);

    info!("approva focus running");
    event_loop.run_app(&mut approva)?;

    Ok(())
}
