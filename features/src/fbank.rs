use std::f64::consts::PI;

use crate::error::FeatureError;

/// Configures filter-bank energy extraction.
///
/// Defaults follow the classic speech-features pipeline used to train
/// speaker embedding networks: 25ms rectangular frames, 10ms step,
/// 512-point FFT, 64 mel filters from 0 Hz to Nyquist.
#[derive(Debug, Clone)]
pub struct FbankConfig {
    /// Input sample rate in Hz (default: 16000).
    pub sample_rate: usize,
    /// Number of mel filters (default: 64).
    pub num_filters: usize,
    /// Analysis window length in seconds (default: 0.025).
    pub window_secs: f64,
    /// Step between successive windows in seconds (default: 0.01).
    pub step_secs: f64,
    /// Minimum FFT size (default: 512). Grown to the next power of two
    /// when the window is longer.
    pub n_fft: usize,
    /// Pre-emphasis coefficient applied to the whole signal (default: 0.97).
    pub pre_emphasis: f64,
    /// Lowest band edge of the mel filters in Hz (default: 0).
    pub low_freq: f64,
    /// Highest band edge in Hz, `None` = Nyquist.
    pub high_freq: Option<f64>,
}

impl Default for FbankConfig {
    fn default() -> Self {
        Self::with_sample_rate(16000)
    }
}

impl FbankConfig {
    /// Default configuration at the given sample rate.
    pub fn with_sample_rate(sample_rate: usize) -> Self {
        Self {
            sample_rate,
            num_filters: 64,
            window_secs: 0.025,
            step_secs: 0.01,
            n_fft: 512,
            pre_emphasis: 0.97,
            low_freq: 0.0,
            high_freq: None,
        }
    }

    /// Window length in samples (25ms @ 16kHz = 400).
    pub fn frame_length(&self) -> usize {
        round_half_up(self.window_secs * self.sample_rate as f64)
    }

    /// Step length in samples (10ms @ 16kHz = 160).
    pub fn frame_step(&self) -> usize {
        round_half_up(self.step_secs * self.sample_rate as f64)
    }

    /// Number of frames produced for a signal of `num_samples` samples.
    ///
    /// The tail is zero padded, so any non-empty signal yields at least one frame.
    pub fn num_frames(&self, num_samples: usize) -> usize {
        let frame_len = self.frame_length();
        let step = self.frame_step();
        if num_samples == 0 || step == 0 {
            return 0;
        }
        if num_samples <= frame_len {
            1
        } else {
            1 + (num_samples - frame_len).div_ceil(step)
        }
    }

    fn fft_size(&self) -> usize {
        next_pow2(self.frame_length()).max(self.n_fft)
    }

    fn validate(&self) -> Result<(), FeatureError> {
        if self.sample_rate == 0 {
            return Err(FeatureError::InvalidConfig("sample rate must be positive".into()));
        }
        if self.num_filters == 0 {
            return Err(FeatureError::InvalidConfig("num_filters must be positive".into()));
        }
        if self.frame_length() == 0 || self.frame_step() == 0 {
            return Err(FeatureError::InvalidConfig(format!(
                "window {}s / step {}s too short for {} Hz",
                self.window_secs, self.step_secs, self.sample_rate
            )));
        }
        Ok(())
    }
}

/// Computes linear mel filter-bank energies.
///
/// Output: 2D vec `[num_frames][num_filters]`. Energies are not log-compressed;
/// exact zeros are replaced by `f64::EPSILON`.
pub fn compute_fbank(signal: &[f32], cfg: &FbankConfig) -> Result<Vec<Vec<f64>>, FeatureError> {
    cfg.validate()?;
    if signal.is_empty() {
        return Err(FeatureError::EmptySignal);
    }

    // Pre-emphasis over the whole signal.
    let mut samples = Vec::with_capacity(signal.len());
    samples.push(signal[0] as f64);
    for i in 1..signal.len() {
        samples.push(signal[i] as f64 - cfg.pre_emphasis * signal[i - 1] as f64);
    }

    let frame_len = cfg.frame_length();
    let step = cfg.frame_step();
    let num_frames = cfg.num_frames(samples.len());

    // Zero-pad so the last frame is complete.
    let padded_len = (num_frames - 1) * step + frame_len;
    samples.resize(padded_len.max(samples.len()), 0.0);

    let fft_size = cfg.fft_size();
    let half_fft = fft_size / 2 + 1;
    let high_freq = cfg.high_freq.unwrap_or(cfg.sample_rate as f64 / 2.0);
    let filterbank = mel_filterbank(cfg.num_filters, fft_size, cfg.sample_rate, cfg.low_freq, high_freq);

    let mut result = Vec::with_capacity(num_frames);
    let mut fft_buf = vec![(0.0f64, 0.0f64); fft_size];
    let mut power_spec = vec![0.0f64; half_fft];

    for f in 0..num_frames {
        let offset = f * step;

        // Rectangular window, zero-padded to FFT size.
        for v in &mut fft_buf {
            *v = (0.0, 0.0);
        }
        for i in 0..frame_len {
            fft_buf[i] = (samples[offset + i], 0.0);
        }

        fft(&mut fft_buf);

        for k in 0..half_fft {
            let (r, im) = fft_buf[k];
            power_spec[k] = (r * r + im * im) / fft_size as f64;
        }

        let mut frame = vec![0.0f64; cfg.num_filters];
        for (m, filter) in filterbank.iter().enumerate() {
            let energy: f64 = filter.iter().zip(power_spec.iter()).map(|(w, p)| w * p).sum();
            frame[m] = if energy == 0.0 { f64::EPSILON } else { energy };
        }
        result.push(frame);
    }

    Ok(result)
}

fn round_half_up(x: f64) -> usize {
    (x + 0.5).floor().max(0.0) as usize
}

fn next_pow2(n: usize) -> usize {
    let mut p = 1;
    while p < n {
        p <<= 1;
    }
    p
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Computes triangular mel filter weights.
/// Returns `[num_filters][fft_size / 2 + 1]` weights.
fn mel_filterbank(num_filters: usize, fft_size: usize, sample_rate: usize, low_freq: f64, high_freq: f64) -> Vec<Vec<f64>> {
    let half_fft = fft_size / 2 + 1;
    let mel_low = hz_to_mel(low_freq);
    let mel_high = hz_to_mel(high_freq);

    let bins: Vec<usize> = (0..num_filters + 2)
        .map(|i| {
            let mel = mel_low + i as f64 * (mel_high - mel_low) / (num_filters + 1) as f64;
            let bin = ((fft_size + 1) as f64 * mel_to_hz(mel) / sample_rate as f64).floor() as isize;
            bin.clamp(0, half_fft as isize - 1) as usize
        })
        .collect();

    let mut fb = Vec::with_capacity(num_filters);
    for m in 0..num_filters {
        let mut filter = vec![0.0f64; half_fft];
        let (left, center, right) = (bins[m], bins[m + 1], bins[m + 2]);

        for k in left..center {
            filter[k] = (k - left) as f64 / (center - left) as f64;
        }
        for k in center..right {
            filter[k] = (right - k) as f64 / (right - center) as f64;
        }
        fb.push(filter);
    }
    fb
}

/// In-place Cooley-Tukey FFT.
/// Input length must be a power of 2.
fn fft(x: &mut [(f64, f64)]) {
    let n = x.len();
    if n <= 1 {
        return;
    }

    // Bit-reversal permutation.
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            x.swap(i, j);
        }
    }

    let mut size = 2;
    while size <= n {
        let half = size / 2;
        let angle = -2.0 * PI / size as f64;
        let wn = (angle.cos(), angle.sin());
        for start in (0..n).step_by(size) {
            let mut w = (1.0, 0.0);
            for k in 0..half {
                let u = x[start + k];
                let v = x[start + k + half];
                let t = (w.0 * v.0 - w.1 * v.1, w.0 * v.1 + w.1 * v.0);
                x[start + k] = (u.0 + t.0, u.1 + t.1);
                x[start + k + half] = (u.0 - t.0, u.1 - t.1);
                w = (w.0 * wn.0 - w.1 * wn.1, w.0 * wn.1 + w.1 * wn.0);
            }
        }
        size <<= 1;
    }
}
