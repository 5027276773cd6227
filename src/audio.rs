//! Audio playback for timer completion sounds.

use rodio::source::{SineWave, Source, Zero};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to initialize audio output: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("Failed to play audio: {0}")]
    Play(#[from] rodio::PlayError),
}

/// Which chime to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chime {
    /// A study session or break finished.
    SessionComplete,
    /// The daily goal was reached.
    GoalReached,
}

impl Chime {
    /// Notes as (frequency in Hz, length in ms).
    fn notes(&self) -> &'static [(f32, u64)] {
        match self {
            // A5 then C6
            Self::SessionComplete => &[(880.0, 150), (1046.5, 200)],
            // C6, E6, G6, C7
            Self::GoalReached => &[(1046.5, 120), (1318.5, 120), (1568.0, 120), (2093.0, 300)],
        }
    }
}

pub struct AudioPlayer {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl AudioPlayer {
    /// Creates a new audio player.
    pub fn new() -> Result<Self, AudioError> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    /// Plays a chime in the background.
    pub fn play(&self, chime: Chime) {
        if let Err(e) = self.play_notes(chime.notes()) {
            warn!(error = %e, ?chime, "failed to play chime");
        }
    }

    fn play_notes(&self, notes: &[(f32, u64)]) -> Result<(), AudioError> {
        let sink = Sink::try_new(&self.handle)?;

        for (i, &(freq, ms)) in notes.iter().enumerate() {
            if i > 0 {
                let gap = Zero::<f32>::new(1, 44100).take_duration(Duration::from_millis(50));
                sink.append(gap);
            }
            let tone = SineWave::new(freq)
                .take_duration(Duration::from_millis(ms))
                .amplify(0.3);
            sink.append(tone);
        }
        sink.detach();

        Ok(())
    }
}
