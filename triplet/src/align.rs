/// Repeats `waveform` end to end until it holds at least `min_len` samples.
///
/// A waveform already long enough is returned unchanged. Whole copies are
/// appended, so the result may exceed `min_len`; the batch-wide truncation
/// trims it afterwards. An empty waveform is returned as is.
pub fn repeat_to_length(waveform: Vec<f32>, min_len: usize) -> Vec<f32> {
    let len = waveform.len();
    if len == 0 || len >= min_len {
        return waveform;
    }
    let copies = min_len.div_ceil(len);
    let mut out = Vec::with_capacity(len.checked_mul(copies).unwrap_or(min_len));
    for _ in 0..copies {
        out.extend_from_slice(&waveform);
    }
    out
}

/// Aligns every waveform of a batch to one common length and returns it.
///
/// Each waveform is first repeated up to `target_len`, then all of them are
/// truncated to `min(target_len, shortest)`.
pub fn align_waveforms(waveforms: &mut [Vec<f32>], target_len: usize) -> usize {
    for w in waveforms.iter_mut() {
        *w = repeat_to_length(std::mem::take(w), target_len);
    }
    let shortest = waveforms.iter().map(Vec::len).min().unwrap_or(0);
    let aligned = target_len.min(shortest);
    for w in waveforms.iter_mut() {
        w.truncate(aligned);
    }
    aligned
}
