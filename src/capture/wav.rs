//! WAV encoding and decoding for segment payloads and pipe mode.

use crate::error::{OverscribeError, Result};
use std::io::{Cursor, Read};

/// Encode 16kHz mono PCM samples as an in-memory WAV file.
///
/// Used to build the multipart upload body for segment transcription.
pub fn encode(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| OverscribeError::Capture {
                message: format!("Failed to start WAV writer: {}", e),
            })?;
        for &s in samples {
            writer
                .write_sample(s)
                .map_err(|e| OverscribeError::Capture {
                    message: format!("Failed to write WAV sample: {}", e),
                })?;
        }
        writer.finalize().map_err(|e| OverscribeError::Capture {
            message: format!("Failed to finalize WAV data: {}", e),
        })?;
    }
    Ok(cursor.into_inner())
}

/// Decode WAV data from a reader into mono PCM at the target rate.
///
/// Supports arbitrary sample rates and channels, downmixing stereo and
/// resampling with linear interpolation.
pub fn decode(reader: Box<dyn Read + Send>, target_rate: u32) -> Result<Vec<i16>> {
    let mut wav_reader =
        hound::WavReader::new(reader).map_err(|e| OverscribeError::Capture {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

    let spec = wav_reader.spec();
    let source_rate = spec.sample_rate;
    let source_channels = spec.channels;

    let raw_samples: Vec<i16> = wav_reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| OverscribeError::Capture {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

    let mono_samples = if source_channels == 2 {
        raw_samples
            .chunks_exact(2)
            .map(|chunk| {
                let left = chunk[0] as i32;
                let right = chunk[1] as i32;
                ((left + right) / 2) as i16
            })
            .collect()
    } else {
        raw_samples
    };

    if source_rate != target_rate {
        Ok(resample(&mono_samples, source_rate, target_rate))
    } else {
        Ok(mono_samples)
    }
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
