//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter of [`crate::preprocess`].
//! All fields have defaults matching the clinical workflow: bipolar montage,
//! ±60 s clip around the seizure, 60 s analysis windows.
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::annotation::Keywords;
use crate::error::Result;
use crate::montage::Montage;
use crate::window::CLIP_PADDING_SEC;

/// Configuration for the preprocessing pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use ieegprep::{Montage, PipelineConfig};
///
/// let cfg = PipelineConfig {
///     montage:    Montage::Average,
///     window_sec: 10.0,
///     ..PipelineConfig::default()
/// };
/// ```
///
/// Missing keys in a JSON config file take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reference scheme applied after bad channels are removed.
    ///
    /// Default: [`Montage::Bipolar`].
    pub montage: Montage,

    /// Clip the recording around the resolved event.
    ///
    /// Only applies when an onset marker is found.  If the clip cannot be
    /// taken (onset past the end of the signal) the unclipped signal is kept
    /// and a warning is logged.
    ///
    /// Default: `true`.
    pub clip: bool,

    /// Seconds kept before the onset and after the offset when clipping.
    ///
    /// Default: `60.0` s.
    pub clip_padding_sec: f64,

    /// Length of each streamed analysis window in seconds.
    ///
    /// The last window of a recording holds the remainder and may be
    /// shorter.
    ///
    /// Default: `60.0` s.
    pub window_sec: f64,

    /// Channels removed before the montage is applied.
    ///
    /// Matching is case-insensitive and ignores spaces (`"a 1"` matches
    /// `"A1"`).
    ///
    /// Default: `[]`.
    pub bad_channels: Vec<String>,

    /// If non-empty, only these channels are kept after the montage, in
    /// this order.  Names refer to montage output labels (`"A1-A2"` for a
    /// bipolar montage).
    ///
    /// Default: `[]` (keep everything).
    pub included_channels: Vec<String>,

    /// Annotation vocabularies used to find the event onset and offset.
    ///
    /// Default: onset `{onset, crise, cgtc, sz, absence}`,
    /// offset `{offset, fin, end}`.
    pub keywords: Keywords,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            montage: Montage::Bipolar,
            clip: true,
            clip_padding_sec: CLIP_PADDING_SEC,
            window_sec: 60.0,
            bad_channels: vec![],
            included_channels: vec![],
            keywords: Keywords::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Samples per analysis window at `sample_rate`.
    ///
    /// Computed as `floor(window_sec × sample_rate)`, at least one.
    ///
    /// # Examples
    ///
    /// ```
    /// use ieegprep::PipelineConfig;
    /// let cfg = PipelineConfig::default();
    /// assert_eq!(cfg.window_samples(512.0).unwrap(), 30_720);
    /// ```
    pub fn window_samples(&self, sample_rate: f64) -> Result<usize> {
        crate::window::window_samples(sample_rate, self.window_sec)
    }
}
