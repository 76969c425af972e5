use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use shared_protocol::{ModelOption, SAMPLE_RATE};

use crate::error::Error;
use crate::mock::MockDurationModel;
use crate::model::TranscriptionModel;
use crate::scheduler::SegmentScheduler;
use crate::stabilizer::LocalAgreeStabilizer;
use crate::whisper::{WhisperConfig, WhisperRecognizer};

fn default_max_segment_samples() -> usize {
    30 * SAMPLE_RATE as usize
}

fn default_min_new_samples() -> usize {
    SAMPLE_RATE as usize
}

fn default_local_agree_dim() -> usize {
    2
}

/// Per-session pipeline thresholds. `max_segment_samples` bounds the audio
/// buffer; `min_new_samples` gates how often the recognizer runs;
/// `local_agree_dim` is the number of consecutive matching hypotheses
/// required before text can be committed.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PipelineParams {
    #[serde(default = "default_max_segment_samples")]
    pub max_segment_samples: usize,
    #[serde(default = "default_min_new_samples")]
    pub min_new_samples: usize,
    #[serde(default = "default_local_agree_dim")]
    pub local_agree_dim: usize,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            max_segment_samples: default_max_segment_samples(),
            min_new_samples: default_min_new_samples(),
            local_agree_dim: default_local_agree_dim(),
        }
    }
}

impl PipelineParams {
    pub fn validate(&self) -> Result<(), Error> {
        if self.min_new_samples < 1 {
            return Err(Error::BadConfiguration(
                "min_new_samples must be at least 1".into(),
            ));
        }
        if self.max_segment_samples < self.min_new_samples {
            return Err(Error::BadConfiguration(
                "max_segment_samples must be at least min_new_samples".into(),
            ));
        }
        if self.local_agree_dim < 1 {
            return Err(Error::BadConfiguration(
                "local_agree_dim must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Which transcription model implementation a registry entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationId {
    MockDuration,
    Whisper,
}

/// One entry of the model registry file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub display_name: String,
    pub description: String,
    pub implementation_id: ImplementationId,
    #[serde(default)]
    pub implementation_configuration: serde_json::Value,
}

/// Implementation configuration of a whisper entry: backend settings and
/// pipeline thresholds live in the same JSON object.
#[derive(Debug, Clone, Deserialize)]
struct WhisperEntry {
    #[serde(flatten)]
    backend: WhisperConfig,
    #[serde(flatten)]
    pipeline: PipelineParams,
}

/// The set of models this deployment offers, keyed by `model_key`. Loaded
/// from a JSON file at startup and validated before the listener binds.
pub struct ModelRegistry {
    models: BTreeMap<String, ModelConfig>,
}

impl ModelRegistry {
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let models: BTreeMap<String, ModelConfig> = serde_json::from_str(text)
            .map_err(|e| Error::BadConfiguration(format!("model registry: {e}")))?;
        if models.is_empty() {
            return Err(Error::BadConfiguration(
                "model registry must define at least one model".into(),
            ));
        }

        let registry = Self { models };
        for key in registry.models.keys() {
            registry.validate_entry(key)?;
        }
        Ok(registry)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::BadConfiguration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// The selection options array sent to clients after authentication.
    pub fn options(&self) -> Vec<ModelOption> {
        self.models
            .iter()
            .map(|(key, config)| ModelOption {
                model_key: key.clone(),
                display_name: config.display_name.clone(),
                description: config.description.clone(),
            })
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.models.contains_key(key)
    }

    /// Constructs a fresh model instance for one session.
    pub fn build(&self, key: &str) -> Result<Box<dyn TranscriptionModel>, Error> {
        let config = self
            .models
            .get(key)
            .ok_or_else(|| Error::BadConfiguration(format!("no model matching {key}")))?;

        match config.implementation_id {
            ImplementationId::MockDuration => Ok(Box::new(MockDurationModel::new())),
            ImplementationId::Whisper => {
                let entry = self.whisper_entry(key, config)?;
                let recognizer = WhisperRecognizer::new(entry.backend);
                let stabilizer = LocalAgreeStabilizer::new(entry.pipeline, recognizer);
                Ok(Box::new(SegmentScheduler::new(entry.pipeline, stabilizer)))
            }
        }
    }

    fn validate_entry(&self, key: &str) -> Result<(), Error> {
        let config = &self.models[key];
        if config.display_name.is_empty() || config.description.is_empty() {
            return Err(Error::BadConfiguration(format!(
                "model {key}: display_name and description must be non-empty"
            )));
        }
        if config.implementation_id == ImplementationId::Whisper {
            self.whisper_entry(key, config)?;
        }
        Ok(())
    }

    fn whisper_entry(&self, key: &str, config: &ModelConfig) -> Result<WhisperEntry, Error> {
        let entry: WhisperEntry =
            serde_json::from_value(config.implementation_configuration.clone())
                .map_err(|e| Error::BadConfiguration(format!("model {key}: {e}")))?;
        entry.pipeline.validate()?;
        Ok(entry)
    }
}

/// API key from an explicit key file, falling back to the `API_KEY`
/// environment variable.
pub fn resolve_api_key(key_file: Option<&str>) -> Result<String, Error> {
    let key = match key_file {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| Error::BadConfiguration(format!("cannot read {path}: {e}")))?
            .trim()
            .to_string(),
        None => std::env::var("API_KEY").map_err(|_| {
            Error::BadConfiguration("no API key: pass --api-key-file or set API_KEY".into())
        })?,
    };
    if key.is_empty() {
        return Err(Error::BadConfiguration(
            "API key must be a non-empty string".into(),
        ));
    }
    Ok(key)
}
