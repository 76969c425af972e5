use shared_protocol::{SAMPLE_RATE, TranscriptBlock};

use crate::config::PipelineParams;
use crate::error::Error;
use crate::model::TranscriptionModel;
use crate::ring::RingBuffer;
use crate::wav::decode_wav;

/// Consumes one buffered window of audio and reports how many of its
/// leading samples are now safe to discard.
pub trait SegmentProcessor: Send {
    fn load(&mut self) -> Result<(), Error>;

    fn unload(&mut self);

    /// `window` is at most `max_segment_samples` long; `start_time` is the
    /// absolute time of `window[0]` in seconds from session start. Emitted
    /// blocks are pushed onto `out`; the return value is the purge count in
    /// samples, which must be nonzero whenever `window` is at capacity.
    fn process_segment(
        &mut self,
        window: &[f32],
        start_time: f64,
        out: &mut Vec<TranscriptBlock>,
    ) -> Result<usize, Error>;
}

/// Buffers decoded audio and decides when to hand a window to the
/// processor: whenever the buffer saturates, and otherwise once more than
/// `min_new_samples` fresh samples have accumulated since the last call.
pub struct SegmentScheduler<P> {
    min_new_samples: usize,
    ring: RingBuffer<f32>,
    num_last_processed: usize,
    num_purged: u64,
    processor: P,
}

impl<P: SegmentProcessor> SegmentScheduler<P> {
    pub fn new(params: PipelineParams, processor: P) -> Self {
        Self {
            min_new_samples: params.min_new_samples,
            ring: RingBuffer::with_capacity(params.max_segment_samples),
            num_last_processed: 0,
            num_purged: 0,
            processor,
        }
    }

    /// Total samples discarded from the front of the buffer so far. The
    /// absolute time of the current buffer start derives from this count.
    pub fn num_purged(&self) -> u64 {
        self.num_purged
    }

    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    fn invoke_processor(&mut self, out: &mut Vec<TranscriptBlock>) -> Result<usize, Error> {
        // The processor gets its own copy of the window, so the shift below
        // cannot move samples out from under a recognizer that still holds
        // a reference to them.
        let window = self.ring.view().to_vec();
        let start_time = self.num_purged as f64 / SAMPLE_RATE as f64;

        let purge = self.processor.process_segment(&window, start_time, out)?;

        self.ring.shift_left(purge);
        self.num_purged += purge as u64;
        self.num_last_processed = self.ring.len();
        Ok(purge)
    }
}

impl<P: SegmentProcessor> TranscriptionModel for SegmentScheduler<P> {
    fn load(&mut self) -> Result<(), Error> {
        self.processor.load()
    }

    fn unload(&mut self) {
        self.processor.unload()
    }

    fn queue_chunk(&mut self, chunk: &[u8]) -> Result<Vec<TranscriptBlock>, Error> {
        let samples = decode_wav(chunk)?;
        let mut out = Vec::new();

        // While the chunk does not fit, the current window is forced out.
        // The processor must purge something here or the session can never
        // make progress again.
        let mut pending = self.ring.append_sequence(&samples).to_vec();
        while !pending.is_empty() {
            let purged = self.invoke_processor(&mut out)?;
            if purged == 0 {
                return Err(Error::StabilizerMustPurgeOnSaturation);
            }
            pending = self.ring.append_sequence(&pending).to_vec();
        }

        // Strictly more than min_new_samples of fresh audio: run once more.
        if self.ring.len() - self.num_last_processed > self.min_new_samples {
            self.invoke_processor(&mut out)?;
        }

        Ok(out)
    }
}
