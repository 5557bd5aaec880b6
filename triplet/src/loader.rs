use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::error::TripletError;

/// Reads an utterance into mono samples at a known sample rate.
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use.
pub trait AudioLoader: Send + Sync {
    /// Reads the file at `path`, returning samples in [-1, 1].
    fn read(&self, path: &Path) -> Result<Vec<f32>, TripletError>;

    /// Sample rate of the returned samples, in Hz.
    fn sample_rate(&self) -> u32;
}

/// [`AudioLoader`] for WAV files.
///
/// Integer PCM is scaled to [-1, 1], float PCM is passed through and
/// multi-channel audio is averaged to mono. Files recorded at another
/// sample rate are rejected.
#[derive(Debug, Clone)]
pub struct WavLoader {
    sample_rate: u32,
}

impl WavLoader {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl AudioLoader for WavLoader {
    fn read(&self, path: &Path) -> Result<Vec<f32>, TripletError> {
        let reader = WavReader::open(path).map_err(|e| match e {
            hound::Error::IoError(io) => TripletError::AudioUnavailable {
                path: path.to_path_buf(),
                reason: io.to_string(),
            },
            other => TripletError::Decode {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })?;

        let spec = reader.spec();
        if spec.sample_rate != self.sample_rate {
            return Err(TripletError::Decode {
                path: path.to_path_buf(),
                reason: format!("sample rate {} Hz, expected {} Hz", spec.sample_rate, self.sample_rate),
            });
        }

        let decode_err = |e: hound::Error| TripletError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>().map_err(decode_err)?,
            SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(decode_err)?
            }
        };

        let channels = spec.channels.max(1) as usize;
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        if samples.is_empty() {
            return Err(TripletError::EmptyAudio { path: path.to_path_buf() });
        }
        Ok(samples)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_i16(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut w = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            w.write_sample(s).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn reads_mono_pcm16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_i16(&path, 16000, 1, &[0, 16384, -32768]);

        let samples = WavLoader::new(16000).read(&path).unwrap();
        assert_eq!(samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.wav");
        write_i16(&path, 16000, 2, &[16384, 0, -16384, -16384]);

        let samples = WavLoader::new(16000).read(&path).unwrap();
        assert_eq!(samples, vec![0.25, -0.5]);
    }

    #[test]
    fn rejects_other_sample_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("8k.wav");
        write_i16(&path, 8000, 1, &[1, 2, 3]);

        let err = WavLoader::new(16000).read(&path).unwrap_err();
        assert!(matches!(err, TripletError::Decode { .. }));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = WavLoader::new(16000).read(&dir.path().join("missing.wav")).unwrap_err();
        assert!(matches!(err, TripletError::AudioUnavailable { .. }));
        assert!(err.is_audio_unavailable());
    }

    #[test]
    fn garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"not a wav file at all").unwrap();

        let err = WavLoader::new(16000).read(&path).unwrap_err();
        assert!(matches!(err, TripletError::Decode { .. }));
    }

    #[test]
    fn empty_wav_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_i16(&path, 16000, 1, &[]);

        let err = WavLoader::new(16000).read(&path).unwrap_err();
        assert!(matches!(err, TripletError::EmptyAudio { .. }));
    }
}
