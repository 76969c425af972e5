use shared_protocol::{TranscriptBlock, samples_to_secs};

use crate::error::Error;
use crate::model::TranscriptionModel;
use crate::wav::decode_wav;

/// Model that reports the duration of each received chunk as its
/// "transcription". Exercises the full wire protocol without acoustic
/// inference, so clients can be verified end to end.
pub struct MockDurationModel {
    elapsed: f64,
}

impl MockDurationModel {
    pub fn new() -> Self {
        Self { elapsed: 0.0 }
    }
}

impl Default for MockDurationModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptionModel for MockDurationModel {
    fn load(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn unload(&mut self) {}

    fn queue_chunk(&mut self, chunk: &[u8]) -> Result<Vec<TranscriptBlock>, Error> {
        let samples = decode_wav(chunk)?;
        let duration = samples_to_secs(samples.len());

        let start = self.elapsed;
        self.elapsed += duration;

        Ok(vec![TranscriptBlock::finalized(
            format!("Received {duration:?} seconds of audio."),
            start,
            self.elapsed,
        )])
    }
}
