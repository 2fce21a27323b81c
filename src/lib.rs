//! # ieegprep — intracranial/scalp EEG preprocessing for seizure analysis
//!
//! `ieegprep` takes a raw multichannel recording together with its clinical
//! channel list and annotations, and prepares it for downstream seizure
//! analysis.
//!
//! ## Pipeline overview
//!
//! ```text
//! raw label tokens ("A'1-12", "B1-B8", …)
//!   │
//!   ├─ label::expand()            explicit, normalised channel names
//!   ├─ contact::ContactSet        (electrode, index) per signal row
//!   ├─ montage::drop_channels()   bad channels removed
//!   ├─ montage::apply()           monopolar | average | bipolar
//!   ├─ montage::select_channels() optional channel subset
//!   ├─ coordinates::Coordinates   contact position per derived row
//!   ├─ annotation::resolve()      seizure onset / offset from free text
//!   ├─ window::clip()             onset − 60 s … offset + 60 s
//!   └─ window::windows()          contiguous fixed-length segments
//!        │
//!        └─→ ProcessedRecording { data [C', T'], labels, events, metadata, … }
//! ```
//!
//! ## Quick start
//!
//! ```
//! use ieegprep::{preprocess, AnnotationEntry, PipelineConfig, RawRecording};
//! use ndarray::Array2;
//!
//! let rec = RawRecording {
//!     raw_labels: vec!["A1-4".into()],
//!     data: Array2::from_shape_fn((4, 2000), |(c, t)| (c + t) as f64),
//!     sample_rate: 10.0,
//!     annotations: vec![
//!         AnnotationEntry::new(100.0, "SZ onset"),
//!         AnnotationEntry::new(110.0, "end"),
//!     ],
//!     metadata: Default::default(),
//!     coordinates: Default::default(),
//! };
//!
//! let out = preprocess(&rec, &PipelineConfig::default()).unwrap();
//! assert_eq!(out.labels.len(), 3);           // A1-A2, A2-A3, A3-A4
//! assert_eq!(out.clip_start, 400);           // (100 − 60) s × 10 Hz
//! assert_eq!(out.data.ncols(), 1300);        // up to (110 + 60) s
//!
//! for seg in out.windows(60.0).unwrap() {
//!     println!("window at sample {} ({} samples)", seg.start, seg.len());
//! }
//! ```

pub mod annotation;
pub mod config;
pub mod contact;
pub mod coordinates;
pub mod error;
pub mod io;
pub mod label;
pub mod metadata;
pub mod montage;
pub mod window;

use ndarray::{Array2, Axis};
use serde::Serialize;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// annotation
pub use annotation::{parse_time_sec, resolve, resolve_with, AnnotationEntry, EventWindow, Keywords};

// config
pub use config::PipelineConfig;

// contact
pub use contact::{group_by_electrode, to_contact, Contact, ContactSet};

// coordinates
pub use coordinates::{Coordinates, Position};

// error
pub use error::{PrepError, Result};

// label
pub use label::{expand, ChannelLabel, Expansion, RejectedToken};

// metadata
pub use metadata::{age_in_years, RecordingMetadata};

// montage
pub use montage::{bipolar_pairs, BipolarPair, BipolarPlan, Derived, Montage, RowSource};

// window
pub use window::{clip, clip_with_padding, windows, Segment, Windows};

/// One recording as handed over by the loading collaborators.
#[derive(Debug, Clone)]
pub struct RawRecording {
    /// Channel tokens as written in the source metadata, possibly
    /// abbreviated (`"A'1-12"`).
    pub raw_labels: Vec<String>,
    /// [C, T].  A [T, C] matrix is accepted and transposed.
    pub data: Array2<f64>,
    /// Hz.
    pub sample_rate: f64,
    pub annotations: Vec<AnnotationEntry>,
    pub metadata: RecordingMetadata,
    /// Contact positions; empty when none were supplied.
    pub coordinates: Coordinates,
}

/// Output of [`preprocess`].
#[derive(Debug, Clone)]
pub struct ProcessedRecording {
    /// [C', T'] after montage, channel selection and clipping.
    pub data: Array2<f64>,
    /// `labels.len() == data.nrows()`
    pub labels: Vec<ChannelLabel>,
    /// Position of each row; bipolar rows sit between their two contacts.
    pub positions: Vec<Option<Position>>,
    pub sample_rate: f64,
    /// Event times in seconds from the start of the *unclipped* recording.
    pub events: EventWindow,
    /// Sample index of `data[:, 0]` in the unclipped recording.
    pub clip_start: usize,
    pub montage: Montage,
    pub metadata: RecordingMetadata,
    /// Label tokens that could not be parsed.
    pub rejected_labels: Vec<RejectedToken>,
    /// Contacts with no bipolar partner.
    pub dropped_contacts: Vec<Contact>,
    /// Configured bad/included channel names that matched nothing.
    pub missing_channels: Vec<String>,
}

/// Clinical summary of a processed recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalSummary {
    pub onset_sec: Option<f64>,
    pub offset_sec: Option<f64>,
    pub onset_ms: Option<f64>,
    pub offset_ms: Option<f64>,
    pub sample_rate: f64,
    pub montage: Montage,
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub equipment: Option<String>,
}

impl ProcessedRecording {
    /// Stream `data` as `window_sec` windows.  Segment starts are relative to
    /// the unclipped recording.
    pub fn windows(&self, window_sec: f64) -> Result<Windows<'_>> {
        Ok(window::windows(&self.data, self.sample_rate, window_sec)?.starting_at(self.clip_start))
    }

    /// Event times relative to `data[:, 0]`.
    pub fn events_in_clip(&self) -> EventWindow {
        self.events.shifted(-(self.clip_start as f64) / self.sample_rate)
    }

    pub fn clinical_summary(&self) -> ClinicalSummary {
        ClinicalSummary {
            onset_sec: self.events.onset_sec,
            offset_sec: self.events.offset_sec,
            onset_ms: self.events.onset_ms(),
            offset_ms: self.events.offset_ms(),
            sample_rate: self.sample_rate,
            montage: self.montage,
            gender: self.metadata.gender.clone(),
            age: self.metadata.age,
            equipment: self.metadata.equipment.clone(),
        }
    }
}

/// Bring `data` to [C, T] given the plausible channel counts.
fn orient(data: &Array2<f64>, channel_counts: [usize; 2]) -> Array2<f64> {
    let (rows, cols) = data.dim();
    if !channel_counts.contains(&rows) && channel_counts.contains(&cols) {
        log::warn!("signal stored as [{rows}, {cols}] samples × channels, transposing");
        return data.t().to_owned();
    }
    data.clone()
}

/// Run the **full preprocessing pipeline** on one recording.
///
/// # Pipeline steps
///
/// 1. Expand the raw label tokens; unparseable tokens are dropped.
/// 2. Align labels with signal rows.  When tokens were dropped and the
///    signal has one row per raw token, the rows of dropped tokens go too.
/// 3. Remove [`PipelineConfig::bad_channels`].
/// 4. Apply [`PipelineConfig::montage`].
/// 5. Keep [`PipelineConfig::included_channels`] if any are given.
///    Row positions are looked up in [`RawRecording::coordinates`].
/// 6. Resolve onset/offset with [`PipelineConfig::keywords`].
/// 7. If [`PipelineConfig::clip`] and an onset was found, clip to
///    ±[`PipelineConfig::clip_padding_sec`].  A clip that cannot be taken
///    falls back to the full signal with a warning.
///
/// # Errors
///
/// * [`PrepError::InvalidWindow`] for a non-positive sample rate.
/// * [`PrepError::InconsistentChannelCount`] when labels and signal rows
///   cannot be aligned.
/// * [`PrepError::DuplicateContact`] when a contact is listed twice.
pub fn preprocess(rec: &RawRecording, cfg: &PipelineConfig) -> Result<ProcessedRecording> {
    let sample_rate = rec.sample_rate;
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(PrepError::InvalidWindow(format!("sample rate must be positive, got {sample_rate}")));
    }

    // 1. Labels.
    let expansion = label::expand(&rec.raw_labels);
    let n_labels = expansion.labels.len();
    let n_tokens = rec.raw_labels.len();

    // 2. Row alignment.
    let data = orient(&rec.data, [n_labels, n_tokens]);
    let (data, labels) = if data.nrows() == n_labels {
        (data, expansion.labels.clone())
    } else if data.nrows() == n_tokens && expansion.is_one_to_one() {
        for row in (0..n_tokens).filter(|r| !expansion.origins.contains(r)) {
            log::warn!("dropping signal row {row} ({:?}): no usable label", rec.raw_labels[row]);
        }
        (data.select(Axis(0), &expansion.origins), expansion.labels.clone())
    } else {
        return Err(PrepError::InconsistentChannelCount { labels: n_labels, rows: data.nrows() });
    };

    // 3. Bad channels.
    let mut missing_channels = vec![];
    let (data, labels) = if cfg.bad_channels.is_empty() {
        (data, labels)
    } else {
        let sel = montage::drop_channels(&data, &labels, &cfg.bad_channels)?;
        missing_channels.extend(sel.missing);
        (sel.data, sel.labels)
    };

    // 4. Montage.
    let contacts = ContactSet::from_labels(&labels)?;
    let derived = montage::apply(&data, &contacts, cfg.montage)?;
    let positions: Vec<Option<Position>> =
        derived.sources.iter().map(|src| rec.coordinates.locate(src)).collect();
    if !rec.coordinates.is_empty() {
        let unplaced = contacts.iter().filter(|c| rec.coordinates.get(c).is_none()).count();
        if unplaced > 0 {
            log::warn!("{unplaced} of {} contacts have no coordinates", contacts.len());
        }
    }

    // 5. Channel subset.
    let (data, labels, positions) = if cfg.included_channels.is_empty() {
        (derived.data, derived.labels, positions)
    } else {
        let sel = montage::select_channels(&derived.data, &derived.labels, &cfg.included_channels)?;
        missing_channels.extend(sel.missing);
        let positions: Vec<Option<Position>> = sel.rows.iter().map(|&r| positions[r]).collect();
        (sel.data, sel.labels, positions)
    };

    // 6. Events.
    let events = annotation::resolve_with(&rec.annotations, &cfg.keywords);

    // 7. Clip.
    let (data, clip_start) = match (cfg.clip, events.onset_sec) {
        (true, Some(onset)) => {
            match window::clip_with_padding(&data, sample_rate, onset, events.offset_sec, cfg.clip_padding_sec) {
                Ok(seg) => (seg.data, seg.start),
                Err(e @ (PrepError::InsufficientSignal { .. } | PrepError::InvalidWindow(_))) => {
                    log::warn!("clip skipped, keeping full signal: {e}");
                    (data, 0)
                }
                Err(e) => return Err(e),
            }
        }
        _ => (data, 0),
    };

    log::info!(
        "preprocess {}: {} channels x {} samples ({} montage, clip start {})",
        rec.metadata.patient,
        data.nrows(),
        data.ncols(),
        cfg.montage,
        clip_start
    );

    Ok(ProcessedRecording {
        data,
        labels,
        positions,
        sample_rate,
        events,
        clip_start,
        montage: cfg.montage,
        metadata: rec.metadata.clone().with_derived_age(),
        rejected_labels: expansion.rejected,
        dropped_contacts: derived.dropped,
        missing_channels,
    })
}

/// Run [`preprocess`] on every recording.  A failing recording is logged
/// and reported in its slot; the rest are still processed.
pub fn preprocess_all(recs: &[RawRecording], cfg: &PipelineConfig) -> Vec<Result<ProcessedRecording>> {
    recs.iter()
        .map(|rec| {
            let out = preprocess(rec, cfg);
            if let Err(e) = &out {
                log::error!("recording {:?} skipped: {e}", rec.metadata.patient);
            }
            out
        })
        .collect()
}
