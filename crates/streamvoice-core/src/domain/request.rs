//! Session requests and the validated shape handed to the engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::params::SynthesisParams;

/// Sample sentence pre-filled into a fresh draft.
pub const DEFAULT_INPUT_TEXT: &str = "这是一个测试文本，用来测试 GPT-SoVITS 的语音合成效果。";

/// A local precondition that failed before any engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("Select a reference audio file first")]
    MissingReference,

    #[error("Enter the text spoken in the reference audio")]
    MissingPromptText,
}

/// A reference voice sample with the transcript of what it says.
///
/// Only obtainable through [`SessionRequest::validate`], so `prompt_text`
/// is always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceAudio {
    path: PathBuf,
    prompt_text: String,
}

impl ReferenceAudio {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    /// File name for display and logging.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Everything needed to start one session, as submitted by the UI.
///
/// Consumed by value when a session starts, so it cannot change while the
/// session runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    /// Text to synthesize.
    pub input_text: String,

    /// Reference voice sample, if one has been picked.
    pub reference_audio_path: Option<PathBuf>,

    /// Transcript of the reference audio.
    pub prompt_text: String,

    #[serde(default)]
    pub params: SynthesisParams,
}

impl SessionRequest {
    pub fn new(
        input_text: impl Into<String>,
        reference_audio_path: Option<PathBuf>,
        prompt_text: impl Into<String>,
        params: SynthesisParams,
    ) -> Self {
        Self {
            input_text: input_text.into(),
            reference_audio_path,
            prompt_text: prompt_text.into(),
            params,
        }
    }

    /// Check local preconditions and produce the engine-facing request.
    ///
    /// The reference path is checked before the prompt text. Empty input
    /// text is left to the engine to reject.
    pub fn validate(self) -> Result<EngineRequest, PreconditionError> {
        let path = self
            .reference_audio_path
            .ok_or(PreconditionError::MissingReference)?;
        if self.prompt_text.trim().is_empty() {
            return Err(PreconditionError::MissingPromptText);
        }

        Ok(EngineRequest {
            text: self.input_text,
            reference: ReferenceAudio {
                path,
                prompt_text: self.prompt_text,
            },
            params: self.params,
        })
    }
}

impl Default for SessionRequest {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_TEXT, None, "", SynthesisParams::default())
    }
}

/// A validated synthesis request, the only shape the engine receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRequest {
    pub text: String,
    pub reference: ReferenceAudio,
    pub params: SynthesisParams,
}

impl EngineRequest {
    pub const fn streaming(&self) -> bool {
        self.params.streaming_mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: Option<&str>, prompt: &str) -> SessionRequest {
        SessionRequest::new(
            "hello",
            path.map(PathBuf::from),
            prompt,
            SynthesisParams::default(),
        )
    }

    #[test]
    fn missing_path_is_reported_first() {
        let err = request(None, "").validate().unwrap_err();
        assert_eq!(err, PreconditionError::MissingReference);
    }

    #[test]
    fn blank_prompt_text_is_rejected() {
        let err = request(Some("/tmp/ref.wav"), "   ").validate().unwrap_err();
        assert_eq!(err, PreconditionError::MissingPromptText);
    }

    #[test]
    fn valid_request_carries_reference() {
        let engine = request(Some("/voices/ref.wav"), "你好").validate().unwrap();
        assert_eq!(engine.reference.prompt_text(), "你好");
        assert_eq!(engine.reference.file_name(), "ref.wav");
        assert_eq!(engine.text, "hello");
        assert!(!engine.streaming());
    }

    #[test]
    fn default_draft_is_prefilled_but_incomplete() {
        let draft = SessionRequest::default();
        assert_eq!(draft.input_text, DEFAULT_INPUT_TEXT);
        assert_eq!(draft.validate(), Err(PreconditionError::MissingReference));
    }

    #[test]
    fn empty_input_text_is_not_a_local_precondition() {
        let req = SessionRequest::new("", Some(PathBuf::from("a.wav")), "x", SynthesisParams::default());
        assert!(req.validate().is_ok());
    }
}
