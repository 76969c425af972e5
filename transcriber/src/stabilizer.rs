use std::collections::VecDeque;

use shared_protocol::{SAMPLE_RATE, TranscriptBlock, samples_to_secs};

use crate::config::PipelineParams;
use crate::error::Error;
use crate::recognizer::{Hypothesis, Recognizer, Word};
use crate::scheduler::SegmentProcessor;

const SENTENCE_ENDS: [char; 3] = ['.', '?', '!'];
const ELLIPSIS: &str = "...";

/// True when `text` closes a sentence: a terminal `.`, `?` or `!` counts,
/// an ellipsis does not. Trailing whitespace is ignored so recognizers that
/// attach spaces to their word tokens still hit boundaries.
fn ends_sentence(text: &str) -> bool {
    let trimmed = text.trim_end();
    trimmed.ends_with(SENTENCE_ENDS) && !trimmed.ends_with(ELLIPSIS)
}

/// Local agreement stabilization (Liu et al., 2020; Macháček et al., 2023).
///
/// A word becomes eligible for commitment once it has appeared at the same
/// position in `local_agree_dim` consecutive recognizer outputs, and the
/// agreed prefix is committed at sentence boundaries so the conditioning
/// prompt never ends mid-clause. When the window is at capacity and no
/// boundary was reached, enough leading words are finalized by force to let
/// at least `min_new_samples` of audio be purged.
pub struct LocalAgreeStabilizer<R> {
    recognizer: R,
    max_segment_samples: usize,
    min_new_samples: usize,
    local_agree_dim: usize,
    prev_text: String,
    history: VecDeque<Hypothesis>,
}

impl<R: Recognizer> LocalAgreeStabilizer<R> {
    pub fn new(params: PipelineParams, recognizer: R) -> Self {
        Self {
            recognizer,
            max_segment_samples: params.max_segment_samples,
            min_new_samples: params.min_new_samples,
            local_agree_dim: params.local_agree_dim,
            prev_text: String::new(),
            history: VecDeque::new(),
        }
    }

    /// Length of the shortest retained hypothesis; positions past it carry
    /// no agreement information.
    fn shortest_history(&self) -> Option<usize> {
        self.history.iter().map(|hypothesis| hypothesis.len()).min()
    }

    /// The word at `index` has matched in every retained hypothesis, and
    /// the history is fully populated.
    fn agrees(&self, word: &Word, index: usize) -> bool {
        if self.history.len() != self.local_agree_dim - 1 {
            return false;
        }
        self.history
            .iter()
            .all(|hypothesis| hypothesis[index].text == word.text)
    }
}

impl<R: Recognizer> SegmentProcessor for LocalAgreeStabilizer<R> {
    fn load(&mut self) -> Result<(), Error> {
        self.recognizer.load()
    }

    fn unload(&mut self) {
        self.recognizer.unload()
    }

    fn process_segment(
        &mut self,
        window: &[f32],
        start_time: f64,
        out: &mut Vec<TranscriptBlock>,
    ) -> Result<usize, Error> {
        let saturated = window.len() == self.max_segment_samples;
        let hypothesis = self.recognizer.transcribe(window, &self.prev_text)?;

        // Walk the agreed prefix, committing at sentence boundaries.
        let mut prefix = String::new();
        let mut committed = 0; // words consumed into FINAL blocks
        let mut commit_start = 0.0;
        let mut commit_end = 0.0f64;

        let bound = self
            .shortest_history()
            .unwrap_or(hypothesis.len())
            .min(hypothesis.len());
        for i in 0..bound {
            if !self.agrees(&hypothesis[i], i) {
                break;
            }
            prefix.push_str(&hypothesis[i].text);

            if ends_sentence(&prefix) {
                commit_end = commit_end.max(hypothesis[i].end);
                self.prev_text = prefix.clone();
                out.push(TranscriptBlock::finalized(
                    std::mem::take(&mut prefix),
                    start_time + commit_start,
                    start_time + commit_end,
                ));
                commit_start = commit_end;
                committed = i + 1;
            }
        }

        // At capacity: force-finalize past the committed prefix until the
        // finalized span covers the minimum purge, boundary or not. This is
        // the only way out when the audio yields no stable sentence (a long
        // pause, say).
        if saturated {
            let horizon = samples_to_secs(self.min_new_samples);
            let mut forced = String::new();
            while committed < hypothesis.len() && commit_end < horizon {
                forced.push_str(&hypothesis[committed].text);
                commit_end = commit_end.max(hypothesis[committed].end);
                committed += 1;
            }
            if !forced.is_empty() {
                self.prev_text = forced.clone();
            }
            out.push(TranscriptBlock::finalized(
                forced,
                start_time + commit_start,
                start_time + commit_end,
            ));
        }

        // Everything else is tentative. Emitted even when empty, as an
        // explicit clear signal for the client.
        let mut in_progress = String::new();
        let mut in_progress_end = commit_end;
        for word in &hypothesis[committed..] {
            in_progress.push_str(&word.text);
            in_progress_end = in_progress_end.max(word.end);
        }
        out.push(TranscriptBlock::in_progress(
            in_progress,
            start_time + commit_end,
            start_time + in_progress_end,
        ));

        self.history.push_back(hypothesis);
        if self.history.len() >= self.local_agree_dim {
            self.history.pop_front();
        }

        let mut finalized_samples = (commit_end * SAMPLE_RATE as f64) as usize;
        if saturated {
            finalized_samples = finalized_samples.max(self.min_new_samples);
        }
        Ok(finalized_samples.min(window.len()))
    }
}
