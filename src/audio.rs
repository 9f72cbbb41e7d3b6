//! Audio normalization applied to every uploaded recording.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::Span;

/// Validates an uploaded recording and writes a normalized copy.
pub trait AudioProcessor: Send + Sync {
    /// Read `source`, write the normalized audio to `dest`.
    ///
    /// Returns `false` when the upload is not usable audio. `dest` may hold
    /// partial output in that case and must be discarded by the caller.
    fn process_audio(&self, source: &Path, dest: &Path) -> bool;
}

/// Rewrites any readable WAV file as 16-bit signed PCM.
///
/// Channel count and sample rate are kept. Float input is scaled and
/// clamped, integer input is shifted to 16 bits. Rejections are only
/// logged at debug level; the caller decides what a rejection means.
#[derive(Debug, Clone)]
pub struct WavNormalizer {
    span: Span,
}

impl WavNormalizer {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    fn normalize(source: &Path, dest: &Path) -> Result<u64, hound::Error> {
        let mut reader = WavReader::open(source)?;
        let input = reader.spec();
        let output = WavSpec {
            channels: input.channels,
            sample_rate: input.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut writer = WavWriter::create(dest, output)?;
        let mut written = 0u64;

        match input.sample_format {
            SampleFormat::Float => {
                for sample in reader.samples::<f32>() {
                    let s = (sample? * 32767.0).clamp(-32768.0, 32767.0) as i16;
                    writer.write_sample(s)?;
                    written += 1;
                }
            }
            SampleFormat::Int => {
                let bits = input.bits_per_sample;
                for sample in reader.samples::<i32>() {
                    writer.write_sample(rescale_to_i16(sample?, bits))?;
                    written += 1;
                }
            }
        }

        writer.finalize()?;
        Ok(written)
    }
}

impl AudioProcessor for WavNormalizer {
    fn process_audio(&self, source: &Path, dest: &Path) -> bool {
        match Self::normalize(source, dest) {
            Ok(0) => {
                tracing::debug!(parent: &self.span, "Audio upload has no samples");
                false
            }
            Ok(samples) => {
                tracing::debug!(parent: &self.span, samples, "Normalized audio upload");
                true
            }
            Err(e) => {
                tracing::debug!(parent: &self.span, "Audio upload is not readable WAV: {}", e);
                false
            }
        }
    }
}

fn rescale_to_i16(sample: i32, bits: u16) -> i16 {
    if bits > 16 {
        (sample >> (bits - 16)) as i16
    } else {
        (sample << (16 - bits)) as i16
    }
}
