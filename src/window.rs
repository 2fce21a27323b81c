//! Time-axis slicing of a [C, T] signal.
//!
//! * [`clip`] cuts one segment around a clinical event, padded on both
//!   sides (60 s by default).
//! * [`windows`] streams contiguous, non-overlapping fixed-length segments.
//!   The last one holds the remainder and may be shorter, so concatenating
//!   all segments gives back the input exactly.
//!
//! Every [`Segment`] carries its start sample in the signal it was cut from.
use ndarray::{s, Array2, ArrayView2};
use std::iter::FusedIterator;

use crate::error::{PrepError, Result};

/// Padding applied around an event by [`clip`], in seconds.
pub const CLIP_PADDING_SEC: f64 = 60.0;

/// A contiguous slice of a signal along the time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Index of the first sample in the source signal.
    pub start: usize,
    /// [C, len]
    pub data: Array2<f64>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.ncols() == 0
    }

    /// One past the last sample, in source coordinates.
    pub fn end(&self) -> usize {
        self.start + self.len()
    }

    pub fn start_sec(&self, sample_rate: f64) -> f64 {
        self.start as f64 / sample_rate
    }
}

fn check_rate(sample_rate: f64) -> Result<()> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(PrepError::InvalidWindow(format!("sample rate must be positive, got {sample_rate}")));
    }
    Ok(())
}

/// Samples per window, never less than one.
///
/// Computed as `floor(window_sec × sample_rate)`.
pub fn window_samples(sample_rate: f64, window_sec: f64) -> Result<usize> {
    check_rate(sample_rate)?;
    if !(window_sec.is_finite() && window_sec > 0.0) {
        return Err(PrepError::InvalidWindow(format!("window length must be positive, got {window_sec} s")));
    }
    Ok(((window_sec * sample_rate) as usize).max(1))
}

/// [`clip_with_padding`] with the default 60 s padding.
pub fn clip(
    signal: &Array2<f64>,
    sample_rate: f64,
    onset_sec: f64,
    offset_sec: Option<f64>,
) -> Result<Segment> {
    clip_with_padding(signal, sample_rate, onset_sec, offset_sec, CLIP_PADDING_SEC)
}

/// Cut `[max(0, onset − pad), offset + pad)` seconds out of `signal`.
///
/// Without an offset the event is taken to end at its onset, so the clip
/// runs to `onset + pad`.  The end is clamped to the signal length.
///
/// # Errors
///
/// * [`PrepError::InsufficientSignal`] if the start sample is at or past the
///   end of the signal.
/// * [`PrepError::InvalidWindow`] for a non-positive sample rate, a
///   non-finite time, or an offset so far before the onset that the clip
///   would end before it starts.
pub fn clip_with_padding(
    signal: &Array2<f64>,
    sample_rate: f64,
    onset_sec: f64,
    offset_sec: Option<f64>,
    padding_sec: f64,
) -> Result<Segment> {
    check_rate(sample_rate)?;
    let end_event = offset_sec.unwrap_or(onset_sec);
    if !(onset_sec.is_finite() && end_event.is_finite() && padding_sec.is_finite()) {
        return Err(PrepError::InvalidWindow(format!(
            "non-finite clip bounds: onset={onset_sec} offset={offset_sec:?} padding={padding_sec}"
        )));
    }

    let n_t = signal.ncols();
    let start = ((onset_sec - padding_sec).max(0.0) * sample_rate) as usize;
    if start >= n_t {
        return Err(PrepError::InsufficientSignal { start, available: n_t });
    }

    let end = (((end_event + padding_sec).max(0.0) * sample_rate) as usize).min(n_t);
    if end <= start {
        return Err(PrepError::InvalidWindow(format!(
            "clip would end (sample {end}) before it starts (sample {start})"
        )));
    }

    log::debug!("clip: samples [{start}, {end}) of {n_t}");
    Ok(Segment { start, data: signal.slice(s![.., start..end]).to_owned() })
}

/// Stream `signal` as windows of `window_sec` seconds.
///
/// ```
/// use ieegprep::window::windows;
/// use ndarray::Array2;
///
/// let data = Array2::<f64>::zeros((4, 2500));
/// let lens: Vec<usize> = windows(&data, 1000.0, 1.0).unwrap().map(|w| w.len()).collect();
/// assert_eq!(lens, [1000, 1000, 500]);
/// ```
pub fn windows<'a>(signal: &'a Array2<f64>, sample_rate: f64, window_sec: f64) -> Result<Windows<'a>> {
    let step = window_samples(sample_rate, window_sec)?;
    Ok(Windows { signal: signal.view(), step, next: 0, base: 0 })
}

/// Iterator returned by [`windows`].
///
/// Finite: it stops once the next start reaches the end of the signal.
/// Not restartable; call [`windows`] again to re-scan from the beginning.
#[derive(Debug)]
pub struct Windows<'a> {
    signal: ArrayView2<'a, f64>,
    step: usize,
    next: usize,
    base: usize,
}

impl<'a> Windows<'a> {
    /// Report segment starts relative to a signal that began `base` samples
    /// earlier (e.g. the unclipped recording).
    pub fn starting_at(mut self, base: usize) -> Self {
        self.base = base;
        self
    }

    /// Samples per full window.
    pub fn step(&self) -> usize {
        self.step
    }
}

impl<'a> Iterator for Windows<'a> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let n_t = self.signal.ncols();
        if self.next >= n_t {
            return None;
        }
        let begin = self.next;
        let end = begin.saturating_add(self.step).min(n_t);
        self.next = end;
        Some(Segment {
            start: self.base + begin,
            data: self.signal.slice(s![.., begin..end]).to_owned(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.signal.ncols().saturating_sub(self.next);
        let n = left.div_ceil(self.step);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Windows<'_> {}
impl FusedIterator for Windows<'_> {}
