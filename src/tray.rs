//! Tray icon management for the menubar.

use crate::models::{SessionPhase, TimerMode, TimerState};
use thiserror::Error;
use tray_icon::Icon;

#[derive(Error, Debug)]
pub enum TrayError {
    #[error("Failed to load icon: {0}")]
    IconLoad(#[from] tray_icon::BadIcon),
}

/// Standard macOS tray icon size.
const ICON_SIZE: u32 = 22;

/// Which icon the tray should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    Focus,
    Break,
    Stopwatch,
    Countdown,
}

impl IconKind {
    pub fn for_state(state: &TimerState) -> Self {
        match (state.mode, state.phase) {
            (TimerMode::Pomodoro, SessionPhase::Work) => Self::Focus,
            (TimerMode::Pomodoro, SessionPhase::Break) => Self::Break,
            (TimerMode::Stopwatch, _) => Self::Stopwatch,
            (TimerMode::Countdown, _) => Self::Countdown,
        }
    }

    fn color(&self) -> [u8; 3] {
        match self {
            Self::Focus => [220, 50, 47],
            Self::Break => [212, 175, 55],
            Self::Stopwatch => [38, 139, 210],
            Self::Countdown => [133, 153, 0],
        }
    }
}

/// Renders an anti-aliased disc in the colour of `kind`.
fn render(kind: IconKind) -> Vec<u8> {
    let [r, g, b] = kind.color();
    let center = ICON_SIZE as f32 / 2.0;
    let radius = center - 2.0;
    let mut rgba = Vec::with_capacity((ICON_SIZE * ICON_SIZE * 4) as usize);

    for y in 0..ICON_SIZE {
        for x in 0..ICON_SIZE {
            let dx = x as f32 + 0.5 - center;
            let dy = y as f32 + 0.5 - center;
            let distance = (dx * dx + dy * dy).sqrt();

            let alpha = if distance <= radius {
                255
            } else if distance <= radius + 1.0 {
                ((radius + 1.0 - distance) * 255.0) as u8
            } else {
                0
            };
            rgba.extend_from_slice(&[r, g, b, alpha]);
        }
    }

    rgba
}

/// Builds the tray icon for `kind`.
pub fn load_icon(kind: IconKind) -> Result<Icon, TrayError> {
    Icon::from_rgba(render(kind), ICON_SIZE, ICON_SIZE).map_err(TrayError::IconLoad)
}
