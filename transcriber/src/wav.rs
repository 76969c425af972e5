use std::io::Cursor;

use hound::{SampleFormat, WavReader};
use shared_protocol::SAMPLE_RATE;

use crate::error::Error;

/// Decodes a complete WAV byte stream into mono samples normalized to
/// [-1, 1]. Accepts only what the recognizers consume directly: 16-bit
/// integer PCM, 16kHz, one channel. No resampling, no channel mixing.
pub fn decode_wav(bytes: &[u8]) -> Result<Vec<f32>, Error> {
    let mut reader =
        WavReader::new(Cursor::new(bytes)).map_err(|e| Error::BadWavFormat(e.to_string()))?;
    let spec = reader.spec();

    if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(Error::BadWavFormat(format!(
            "expected 16-bit integer PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    if spec.sample_rate != SAMPLE_RATE {
        return Err(Error::BadWavFormat(format!(
            "expected {SAMPLE_RATE}Hz audio, got {}Hz",
            spec.sample_rate
        )));
    }
    if spec.channels != 1 {
        return Err(Error::BadWavFormat(format!(
            "expected mono audio, got {} channels",
            spec.channels
        )));
    }

    reader
        .samples::<i16>()
        .map(|sample| {
            sample
                .map(|value| value as f32 / 32768.0)
                .map_err(|e| Error::BadWavFormat(e.to_string()))
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::{silence_wav, wav_bytes};
    use super::*;

    #[test]
    fn decodes_and_normalizes() {
        let bytes = wav_bytes(&[0, 16384, -16384, i16::MAX, i16::MIN], SAMPLE_RATE, 1);
        let samples = decode_wav(&bytes).unwrap();
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[1], 0.5);
        assert_eq!(samples[2], -0.5);
        assert_eq!(samples[3], 32767.0 / 32768.0);
        assert_eq!(samples[4], -1.0);
    }

    #[test]
    fn decoding_is_deterministic() {
        let samples: Vec<i16> = (0..1600).map(|i| (i * 37 % 2048) as i16 - 1024).collect();
        let bytes = wav_bytes(&samples, SAMPLE_RATE, 1);
        assert_eq!(decode_wav(&bytes).unwrap(), decode_wav(&bytes).unwrap());
    }

    #[test]
    fn rejects_wrong_sample_rate() {
        let bytes = wav_bytes(&[0; 100], 44100, 1);
        assert!(matches!(decode_wav(&bytes), Err(Error::BadWavFormat(_))));
    }

    #[test]
    fn rejects_stereo() {
        let bytes = wav_bytes(&[0; 100], SAMPLE_RATE, 2);
        assert!(matches!(decode_wav(&bytes), Err(Error::BadWavFormat(_))));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            decode_wav(b"not a wav stream"),
            Err(Error::BadWavFormat(_))
        ));
        assert!(matches!(decode_wav(&[]), Err(Error::BadWavFormat(_))));
    }

    #[test]
    fn empty_data_chunk_is_fine() {
        let bytes = silence_wav(0);
        assert_eq!(decode_wav(&bytes).unwrap(), Vec::<f32>::new());
    }
}
