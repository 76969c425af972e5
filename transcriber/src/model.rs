use shared_protocol::TranscriptBlock;

use crate::error::Error;

/// Per-session transcription capability: consumes WAV chunks from the
/// transport, returns the transcript blocks to forward to the client in
/// emission order. One instance serves exactly one connection.
pub trait TranscriptionModel: Send {
    /// Called once when the session starts, before any audio.
    fn load(&mut self) -> Result<(), Error>;

    /// Called exactly once when the session ends, however it ends.
    fn unload(&mut self);

    /// Feeds one complete WAV chunk through the model.
    fn queue_chunk(&mut self, chunk: &[u8]) -> Result<Vec<TranscriptBlock>, Error>;
}
