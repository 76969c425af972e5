//! Pipeline scenarios driven end to end with in-memory WAV chunks.

use hound::{SampleFormat, WavSpec, WavWriter};
use shared_protocol::{BlockKind, SAMPLE_RATE, TranscriptBlock};
use std::io::Cursor;
use transcriber::config::{ModelRegistry, PipelineParams};
use transcriber::error::Error;
use transcriber::recognizer::{Hypothesis, Recognizer, Word};
use transcriber::scheduler::SegmentScheduler;
use transcriber::stabilizer::LocalAgreeStabilizer;

fn silence_wav(num_samples: usize) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
    for _ in 0..num_samples {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
    cursor.into_inner()
}

fn one_second_wav() -> Vec<u8> {
    silence_wav(SAMPLE_RATE as usize)
}

fn mock_registry() -> ModelRegistry {
    ModelRegistry::from_json(
        r#"{
            "mock": {
                "display_name": "Chunk duration",
                "description": "Reports received audio durations",
                "implementation_id": "mock_duration"
            }
        }"#,
    )
    .unwrap()
}

/// Recognizer that hears the same filler word in every window, never
/// reaching a sentence boundary.
struct FillerRecognizer {
    loaded: bool,
}

impl Recognizer for FillerRecognizer {
    fn load(&mut self) -> Result<(), Error> {
        self.loaded = true;
        Ok(())
    }

    fn unload(&mut self) {
        self.loaded = false;
    }

    fn transcribe(&mut self, _samples: &[f32], _initial_prompt: &str) -> Result<Hypothesis, Error> {
        assert!(self.loaded);
        Ok(vec![Word::new("um", 0.0, 1.0)])
    }
}

#[test]
fn mock_model_reports_every_chunk() {
    use transcriber::model::TranscriptionModel;

    let registry = mock_registry();
    let mut model = registry.build("mock").unwrap();
    model.load().unwrap();

    let mut blocks = Vec::new();
    for _ in 0..5 {
        blocks.extend(model.queue_chunk(&one_second_wav()).unwrap());
    }
    model.unload();

    assert_eq!(blocks.len(), 5);
    for (i, block) in blocks.iter().enumerate() {
        assert_eq!(block.kind, BlockKind::Final);
        assert_eq!(block.text, "Received 1.0 seconds of audio.");
        assert_eq!(block.start, i as f64);
        assert_eq!(block.end, (i + 1) as f64);
    }
}

#[test]
fn saturation_forces_finalization_of_silence() {
    use transcriber::model::TranscriptionModel;

    let params = PipelineParams {
        max_segment_samples: 30 * SAMPLE_RATE as usize,
        min_new_samples: SAMPLE_RATE as usize,
        local_agree_dim: 2,
    };
    let stabilizer = LocalAgreeStabilizer::new(params, FillerRecognizer { loaded: false });
    let mut scheduler = SegmentScheduler::new(params, stabilizer);

    scheduler.load().unwrap();

    let mut emitted: Vec<TranscriptBlock> = Vec::new();
    for _ in 0..32 {
        emitted.extend(scheduler.queue_chunk(&one_second_wav()).unwrap());
        assert!(scheduler.buffered() <= params.max_segment_samples);
    }

    // the buffer reached capacity and a forced FINAL flushed filler text
    let finals: Vec<&TranscriptBlock> = emitted
        .iter()
        .filter(|b| b.kind == BlockKind::Final)
        .collect();
    assert!(!finals.is_empty());
    assert!(finals.iter().all(|b| b.text == "um"));
    assert!(scheduler.num_purged() >= params.min_new_samples as u64);

    // committed intervals never move backwards
    for pair in finals.windows(2) {
        assert!(pair[0].start <= pair[0].end);
        assert!(pair[0].end <= pair[1].start);
    }

    // every recognizer call was followed by a tentative (possibly empty)
    // trailing block
    assert!(
        emitted
            .iter()
            .any(|b| b.kind == BlockKind::InProgress)
    );

    scheduler.unload();
}

#[test]
fn garbage_chunk_fails_with_bad_wav_format() {
    use transcriber::model::TranscriptionModel;

    let registry = mock_registry();
    let mut model = registry.build("mock").unwrap();
    model.load().unwrap();
    assert!(matches!(
        model.queue_chunk(b"RIFFnope"),
        Err(Error::BadWavFormat(_))
    ));
    model.unload();
}

#[test]
fn wire_shape_of_emitted_blocks() {
    use transcriber::model::TranscriptionModel;

    let registry = mock_registry();
    let mut model = registry.build("mock").unwrap();
    model.load().unwrap();

    let blocks = model.queue_chunk(&one_second_wav()).unwrap();
    let json = serde_json::to_string(&blocks[0]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["type"], 0);
    assert_eq!(value["text"], "Received 1.0 seconds of audio.");
    assert_eq!(value["start"], 0.0);
    assert_eq!(value["end"], 1.0);

    model.unload();
}
