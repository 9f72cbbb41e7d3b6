//! WAV fixtures for tests.

#![allow(dead_code)]

use std::f32::consts::PI;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

pub const TEST_SAMPLE_RATE: u32 = 8000;

/// Write a mono sine tone as 32-bit float WAV, the shape browsers tend to upload.
pub fn write_float_tone<P: AsRef<Path>>(path: P, frequency_hz: f32, samples: usize) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec).expect("create wav");
    for n in 0..samples {
        let t = n as f32 / TEST_SAMPLE_RATE as f32;
        writer
            .write_sample(0.5 * (2.0 * PI * frequency_hz * t).sin())
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

/// A float tone as an in-memory WAV file.
pub fn float_tone_bytes(frequency_hz: f32, samples: usize) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tone.wav");
    write_float_tone(&path, frequency_hz, samples);
    std::fs::read(path).expect("read wav")
}

/// Read back a 16-bit WAV: its spec and samples.
pub fn read_i16<P: AsRef<Path>>(path: P) -> (WavSpec, Vec<i16>) {
    let mut reader = hound::WavReader::open(path).expect("open wav");
    let spec = reader.spec();
    let samples = reader
        .samples::<i16>()
        .map(|s| s.expect("sample"))
        .collect();
    (spec, samples)
}
