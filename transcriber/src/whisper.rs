use std::sync::Arc;

use serde::Deserialize;
use shared_protocol::SAMPLE_RATE;
use tracing::info;
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState,
};

use crate::error::Error;
use crate::recognizer::{Hypothesis, Recognizer, Word};

/// Backend settings of a whisper registry entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WhisperConfig {
    /// Path to a ggml model file.
    pub model_path: String,
    /// Transcription language; omit for auto-detection.
    #[serde(default)]
    pub language: Option<String>,
}

/// Recognizer backed by whisper.cpp, emitting one timed word per decoded
/// token. The context and decoding state live from `load` to `unload` and
/// are owned by exactly one session.
pub struct WhisperRecognizer {
    config: WhisperConfig,
    ctx: Option<Arc<WhisperContext>>,
    state: Option<WhisperState>,
}

impl WhisperRecognizer {
    pub fn new(config: WhisperConfig) -> Self {
        Self {
            config,
            ctx: None,
            state: None,
        }
    }
}

fn recognizer_err(e: impl std::fmt::Display) -> Error {
    Error::RecognizerFailure(e.to_string())
}

impl Recognizer for WhisperRecognizer {
    fn load(&mut self) -> Result<(), Error> {
        info!("Loading whisper model: {}", self.config.model_path);
        let mut params = WhisperContextParameters::default();
        params.flash_attn(true);
        #[cfg(feature = "vulkan")]
        params.use_gpu(true);

        let ctx = Arc::new(
            WhisperContext::new_with_params(&self.config.model_path, params)
                .map_err(recognizer_err)?,
        );
        self.state = Some(ctx.create_state().map_err(recognizer_err)?);
        self.ctx = Some(ctx);
        Ok(())
    }

    fn unload(&mut self) {
        self.state = None;
        self.ctx = None;
    }

    fn transcribe(&mut self, samples: &[f32], initial_prompt: &str) -> Result<Hypothesis, Error> {
        let (ctx, state) = match (self.ctx.as_ref(), self.state.as_mut()) {
            (Some(ctx), Some(state)) => (ctx, state),
            _ => return Err(Error::RecognizerFailure("model is not loaded".into())),
        };

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(self.config.language.as_deref()); // None = auto-detect
        params.set_suppress_nst(true);
        params.set_print_progress(false);
        params.set_print_special(false);
        params.set_print_realtime(false);
        params.set_token_timestamps(true);
        if !initial_prompt.is_empty() {
            params.set_initial_prompt(initial_prompt);
        }

        state.full(params, samples).map_err(recognizer_err)?;

        let window_len_cs = (samples.len() as i64 * 100) / SAMPLE_RATE as i64;
        let eot_id = ctx.token_eot();
        let mut words = Vec::new();

        for i in 0..state.full_n_segments() {
            let Some(segment) = state.get_segment(i) else {
                continue;
            };
            for j in 0..segment.n_tokens() {
                let Some(token) = segment.get_token(j) else {
                    continue;
                };
                if token.token_id() >= eot_id {
                    continue;
                }
                let data = token.token_data();
                // do not trust token timestamps beyond the actual audio
                if data.t0 >= window_len_cs {
                    continue;
                }
                let text = token.to_str_lossy().map_err(recognizer_err)?.to_string();
                words.push(Word::new(
                    text,
                    data.t0 as f64 / 100.0,
                    data.t1.min(window_len_cs) as f64 / 100.0,
                ));
            }
        }

        Ok(words)
    }
}
