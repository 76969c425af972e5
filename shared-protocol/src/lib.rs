use serde::{Deserialize, Serialize};

pub const SAMPLE_RATE: u32 = 16000; // service-wide fixed rate, 16kHz mono PCM

/// Seconds represented by `samples` samples at the service rate.
pub fn samples_to_secs(samples: usize) -> f64 {
    samples as f64 / SAMPLE_RATE as f64
}

/// Kind of a transcript block. The integer values are part of the wire
/// contract shared with clients and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum BlockKind {
    /// Committed text, never revised afterwards.
    Final = 0,
    /// Tentative text, may be replaced by the next emission.
    InProgress = 1,
}

impl From<BlockKind> for u8 {
    fn from(kind: BlockKind) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for BlockKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BlockKind::Final),
            1 => Ok(BlockKind::InProgress),
            other => Err(format!("unknown block kind {other}")),
        }
    }
}

/// One transcript emission. Serialized as a single JSON text frame:
/// `{"type": 0|1, "text": "...", "start": s, "end": s}` with `start`/`end`
/// in seconds, absolute from session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl TranscriptBlock {
    pub fn finalized(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            kind: BlockKind::Final,
            text: text.into(),
            start,
            end,
        }
    }

    pub fn in_progress(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            kind: BlockKind::InProgress,
            text: text.into(),
            start,
            end,
        }
    }
}

/// First client message on a new connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub api_key: String,
}

/// One entry of the selection options array the server sends after
/// successful authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOption {
    pub model_key: String,
    pub display_name: String,
    pub description: String,
}

/// Client reply to the selection options array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelection {
    pub model_key: String,
}

/// Sent instead of audio processing when model selection fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionError {
    pub error: bool,
    pub msg: String,
}

impl SelectionError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: true,
            msg: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_kind_wire_values_are_fixed() {
        assert_eq!(u8::from(BlockKind::Final), 0);
        assert_eq!(u8::from(BlockKind::InProgress), 1);
        assert!(BlockKind::try_from(2).is_err());
    }

    #[test]
    fn transcript_block_serializes_type_as_bare_integer() {
        let block = TranscriptBlock::finalized("Hello world. ", 0.0, 1.25);
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"type\":0"), "got {json}");
        assert!(json.contains("\"text\":\"Hello world. \""));

        let block = TranscriptBlock::in_progress("", 1.25, 1.25);
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"type\":1"), "got {json}");
    }

    #[test]
    fn transcript_block_round_trips() {
        let block = TranscriptBlock::in_progress("still talking", 3.5, 4.75);
        let json = serde_json::to_string(&block).unwrap();
        let back: TranscriptBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn handshake_messages_parse() {
        let auth: AuthRequest = serde_json::from_str(r#"{"api_key":"secret"}"#).unwrap();
        assert_eq!(auth.api_key, "secret");

        let selection: ModelSelection =
            serde_json::from_str(r#"{"model_key":"mock"}"#).unwrap();
        assert_eq!(selection.model_key, "mock");
    }

    #[test]
    fn selection_error_shape() {
        let json = serde_json::to_string(&SelectionError::new("no such model")).unwrap();
        assert!(json.contains("\"error\":true"));
        assert!(json.contains("\"msg\":\"no such model\""));
    }

    #[test]
    fn samples_to_secs_uses_fixed_rate() {
        assert_eq!(samples_to_secs(16000), 1.0);
        assert_eq!(samples_to_secs(8000), 0.5);
        assert_eq!(samples_to_secs(0), 0.0);
    }
}
