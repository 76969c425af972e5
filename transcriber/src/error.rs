use thiserror::Error;

/// Errors that reject configuration at startup or terminate a running
/// session. Nothing here is recovered from inside the pipeline; a session
/// either completes cleanly or ends on the first error.
#[derive(Debug, Error)]
pub enum Error {
    /// The decoder rejected an inbound audio chunk.
    #[error("bad wav format: {0}")]
    BadWavFormat(String),

    /// The recognizer backend failed or was used before `load`.
    #[error("recognizer failure: {0}")]
    RecognizerFailure(String),

    /// A saturated window produced a zero purge count, which would stall the
    /// buffer forever. Indicates a stabilizer bug.
    #[error("stabilizer returned a zero purge count for a saturated window")]
    StabilizerMustPurgeOnSaturation,

    /// Parameter validation failed before any audio was accepted.
    #[error("bad configuration: {0}")]
    BadConfiguration(String),
}
