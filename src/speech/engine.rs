//! Text-to-speech engines
//!
//! `CommandEngine` drives the macOS `say` tool (or any program taking
//! `-v <voice> <text>`). Dropping a `speak` future kills the child process,
//! which is how playback is stopped.

use std::collections::HashSet;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors from a speech engine
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("failed to launch speech program {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("speech program exited with {0}")]
    Failed(std::process::ExitStatus),
}

/// A speech synthesizer that plays one utterance per call
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Speak and resolve once playback finishes; dropping the future stops playback
    async fn speak(&self, text: &str, voice: Option<&str>) -> Result<(), SpeechError>;

    /// Whether a named voice is installed
    fn has_voice(&self, voice: &str) -> bool;
}

/// Speech through an external command such as `say`
pub struct CommandEngine {
    program: String,
    voices: HashSet<String>,
}

impl CommandEngine {
    /// Create an engine and discover the installed voices
    pub async fn discover(program: impl Into<String>) -> Self {
        let program = program.into();
        let voices = match list_voices(&program).await {
            Ok(voices) => voices,
            Err(e) => {
                warn!(%program, %e, "could not list voices, using the default voice only");
                HashSet::new()
            }
        };
        debug!(%program, count = voices.len(), "speech voices discovered");
        Self { program, voices }
    }
}

#[async_trait]
impl SpeechEngine for CommandEngine {
    async fn speak(&self, text: &str, voice: Option<&str>) -> Result<(), SpeechError> {
        let mut command = Command::new(&self.program);
        if let Some(voice) = voice {
            command.arg("-v").arg(voice);
        }
        command
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = command
            .status()
            .await
            .map_err(|source| SpeechError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(SpeechError::Failed(status))
        }
    }

    fn has_voice(&self, voice: &str) -> bool {
        self.voices.contains(voice)
    }
}

/// Run `<program> -v ?` and collect the voice names
async fn list_voices(program: &str) -> std::io::Result<HashSet<String>> {
    let output = Command::new(program)
        .arg("-v")
        .arg("?")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await?;

    Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `say -v ?` output: `Name   locale   # sample`
fn parse_voice_list(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .filter_map(|line| line.split("  ").next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_voice_list() {
        let listing = "\
Albert              en_US    # Hello! My name is Albert.
Anna                de_DE    # Hallo! Ich heiße Anna.
Bad News            en_US    # Hello! My name is Bad News.
Kyoko               ja_JP    # こんにちは! 私の名前はKyokoです。
";
        let voices = parse_voice_list(listing);
        assert_eq!(voices.len(), 4);
        assert!(voices.contains("Anna"));
        assert!(voices.contains("Bad News"));
        assert!(!voices.contains("de_DE"));
    }

    #[tokio::test]
    async fn test_missing_program_has_no_voices() {
        let engine = CommandEngine::discover("babylock-no-such-speech-program").await;
        assert!(!engine.has_voice("Anna"));

        let result = engine.speak("hello", None).await;
        assert!(matches!(result, Err(SpeechError::Launch { .. })));
    }
}
