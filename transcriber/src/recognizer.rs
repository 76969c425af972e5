use crate::error::Error;

/// One recognized word. Timestamps are seconds relative to the start of the
/// sample window passed to the recognizer call that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// The ordered output of one recognizer invocation.
pub type Hypothesis = Vec<Word>;

/// Speech recognizer capability. Implementations are called serially for
/// the duration of one session and may hold large native resources between
/// `load` and `unload`.
pub trait Recognizer: Send {
    /// Called once when the session starts.
    fn load(&mut self) -> Result<(), Error>;

    /// Called once when the session ends, on every exit path. Must release
    /// whatever `load` acquired.
    fn unload(&mut self);

    /// Transcribes a window of mono 16kHz samples in [-1, 1] into timed
    /// words, optionally conditioned on previously committed text.
    fn transcribe(&mut self, samples: &[f32], initial_prompt: &str) -> Result<Hypothesis, Error>;
}
