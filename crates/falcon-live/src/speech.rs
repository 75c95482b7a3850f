//! Text-to-speech output.
//!
//! Speech goes through a [`SpeechSink`]. The production sink shells out to
//! a local TTS binary (`espeak-ng`, `espeak` or macOS `say`); when none is
//! installed there is no sink and announcements are display-only.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::config::VoiceConfig;

pub type SpeechResult<T> = Result<T, SpeechError>;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("No speech backend available")]
    Unavailable,

    #[error("Failed to start speech process: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A single spoken announcement.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub locale: String,
}

impl Utterance {
    pub fn new(text: impl Into<String>, voice: &VoiceConfig) -> Self {
        Self {
            text: text.into(),
            rate: voice.rate,
            pitch: voice.pitch,
            volume: voice.volume,
            locale: voice.locale.clone(),
        }
    }
}

/// Speech output. At most one utterance plays at a time.
pub trait SpeechSink: Send + Sync {
    /// Start speaking. Callers cancel any current utterance first.
    fn speak(&self, utterance: &Utterance) -> SpeechResult<()>;

    /// Stop whatever is playing. No-op when idle.
    fn cancel(&self);

    fn name(&self) -> &'static str;
}

/// Supported command-line TTS engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEngine {
    EspeakNg,
    Espeak,
    Say,
}

impl SpeechEngine {
    /// Lookup order when probing `PATH`.
    pub const ALL: [SpeechEngine; 3] = [SpeechEngine::EspeakNg, SpeechEngine::Espeak, SpeechEngine::Say];

    pub fn binary(&self) -> &'static str {
        match self {
            SpeechEngine::EspeakNg => "espeak-ng",
            SpeechEngine::Espeak => "espeak",
            SpeechEngine::Say => "say",
        }
    }

    /// Command-line arguments for an utterance.
    pub fn args(&self, u: &Utterance) -> Vec<String> {
        // 175 words per minute is the "normal" rate for both engines.
        let wpm = (175.0 * u.rate).round().max(1.0) as u32;
        match self {
            SpeechEngine::EspeakNg | SpeechEngine::Espeak => vec![
                "-s".to_string(),
                wpm.to_string(),
                "-p".to_string(),
                ((50.0 * u.pitch).round().clamp(0.0, 99.0) as u32).to_string(),
                "-a".to_string(),
                ((100.0 * u.volume).round().clamp(0.0, 200.0) as u32).to_string(),
                "-v".to_string(),
                u.locale.to_ascii_lowercase(),
                u.text.clone(),
            ],
            // `say` has no pitch or volume flags.
            SpeechEngine::Say => vec!["-r".to_string(), wpm.to_string(), u.text.clone()],
        }
    }
}

/// Speaks through a TTS child process, killing the previous one on cancel.
pub struct CommandSpeech {
    engine: SpeechEngine,
    program: PathBuf,
    current: Mutex<Option<Child>>,
}

impl CommandSpeech {
    pub fn new(engine: SpeechEngine, program: PathBuf) -> Self {
        Self {
            engine,
            program,
            current: Mutex::new(None),
        }
    }

    /// Find the first installed engine on `PATH`.
    pub fn detect() -> SpeechResult<Self> {
        for engine in SpeechEngine::ALL {
            if let Ok(program) = which::which(engine.binary()) {
                info!(engine = engine.binary(), path = %program.display(), "Speech backend found");
                return Ok(Self::new(engine, program));
            }
        }
        Err(SpeechError::Unavailable)
    }
}

impl SpeechSink for CommandSpeech {
    fn speak(&self, utterance: &Utterance) -> SpeechResult<()> {
        let child = Command::new(&self.program)
            .args(self.engine.args(utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(child);
        if let Some(mut previous) = previous {
            let _ = previous.start_kill();
        }
        debug!(text = %utterance.text, "Speaking");
        Ok(())
    }

    fn cancel(&self) {
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut child) = current {
            let _ = child.start_kill();
        }
    }

    fn name(&self) -> &'static str {
        self.engine.binary()
    }
}

/// Writes announcements to the log instead of a speaker.
#[derive(Debug, Default)]
pub struct LogSpeech;

impl SpeechSink for LogSpeech {
    fn speak(&self, utterance: &Utterance) -> SpeechResult<()> {
        info!(locale = %utterance.locale, "🔊 {}", utterance.text);
        Ok(())
    }

    fn cancel(&self) {}

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_espeak_args() {
        let voice = VoiceConfig {
            rate: 0.8,
            ..VoiceConfig::default()
        };
        let u = Utterance::new("Detected 1 object. Fire Alarm", &voice);
        let args = SpeechEngine::EspeakNg.args(&u);
        assert_eq!(
            args,
            vec!["-s", "140", "-p", "50", "-a", "100", "-v", "en-us", "Detected 1 object. Fire Alarm"]
        );
    }

    #[test]
    fn test_say_args() {
        let voice = VoiceConfig {
            rate: 1.0,
            ..VoiceConfig::default()
        };
        let args = SpeechEngine::Say.args(&Utterance::new("hi", &voice));
        assert_eq!(args, vec!["-r", "175", "hi"]);
    }

    #[test]
    fn test_log_speech_never_fails() {
        let sink = LogSpeech;
        assert!(sink.speak(&Utterance::new("hello", &VoiceConfig::default())).is_ok());
        sink.cancel();
        assert_eq!(sink.name(), "log");
    }
}
