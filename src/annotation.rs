//! Seizure onset/offset from free-text clinical annotations.
//!
//! Annotation text is whatever the clinician typed into the acquisition
//! software ("SZ onset", "crise", "fin crise", "end of event", …).  An entry
//! is an onset marker if any of its words is an onset keyword, and likewise
//! for offsets.  The first match per category wins, in sequence order.
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

/// Default onset keywords (French and English clinical shorthand).
pub const ONSET_KEYWORDS: [&str; 5] = ["onset", "crise", "cgtc", "sz", "absence"];
/// Default offset keywords.
pub const OFFSET_KEYWORDS: [&str; 3] = ["offset", "fin", "end"];

/// One timestamped clinical marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEntry {
    pub time_sec: f64,
    pub description: String,
}

impl AnnotationEntry {
    pub fn new(time_sec: f64, description: impl Into<String>) -> Self {
        Self { time_sec, description: description.into() }
    }

    /// Build from a textual time (see [`parse_time_sec`]).
    pub fn parse(time: &str, description: impl Into<String>) -> Result<Self> {
        Ok(Self::new(parse_time_sec(time)?, description))
    }
}

/// Resolved event boundaries.  `None` means no marker was found, which is
/// distinct from an event at time zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EventWindow {
    pub onset_sec: Option<f64>,
    pub offset_sec: Option<f64>,
}

impl EventWindow {
    pub fn onset_ms(&self) -> Option<f64> {
        self.onset_sec.map(|s| s * 1000.0)
    }

    pub fn offset_ms(&self) -> Option<f64> {
        self.offset_sec.map(|s| s * 1000.0)
    }

    /// Onset as a sample index at `sample_rate` Hz (floored, never negative).
    pub fn onset_sample(&self, sample_rate: f64) -> Option<usize> {
        self.onset_sec.map(|s| (s * sample_rate).max(0.0) as usize)
    }

    pub fn offset_sample(&self, sample_rate: f64) -> Option<usize> {
        self.offset_sec.map(|s| (s * sample_rate).max(0.0) as usize)
    }

    /// Both times moved by `delta_sec`; absent fields stay absent.
    pub fn shifted(&self, delta_sec: f64) -> Self {
        Self {
            onset_sec: self.onset_sec.map(|s| s + delta_sec),
            offset_sec: self.offset_sec.map(|s| s + delta_sec),
        }
    }

    /// Event times from wall-clock strings, relative to the recording start.
    ///
    /// Used when seizure times come from a spreadsheet (`"E Onset"`,
    /// `"E Offset"`, `"Recording Start"`) instead of the recording itself.
    /// A clock time earlier than the start is taken to be after midnight.
    pub fn from_clock_times(
        recording_start: &str,
        onset: Option<&str>,
        offset: Option<&str>,
    ) -> Result<Self> {
        let start = parse_clock(recording_start)?;
        let since_start = |t: &str| -> Result<f64> {
            let mut secs = (parse_clock(t)? - start).num_milliseconds() as f64 / 1000.0;
            if secs < 0.0 {
                secs += 86_400.0;
            }
            Ok(secs)
        };
        Ok(Self {
            onset_sec: onset.map(since_start).transpose()?,
            offset_sec: offset.map(since_start).transpose()?,
        })
    }
}

fn parse_clock(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|e| PrepError::InvalidTime(format!("{s:?}: {e}")))
}

/// Seconds from either a plain number (`"12.5"`) or an `H:M:S(.fff)` clock
/// offset (`"01:02:03.5"` → 3723.5).  Hours may exceed 23.
pub fn parse_time_sec(s: &str) -> Result<f64> {
    let s = s.trim();
    let invalid = || PrepError::InvalidTime(s.to_string());

    let secs = if s.contains(':') {
        let parts: Vec<&str> = s.split(':').collect();
        let [h, m, sec] = parts.as_slice() else {
            return Err(invalid());
        };
        let h: u64 = h.parse().map_err(|_| invalid())?;
        let m: u64 = m.parse().map_err(|_| invalid())?;
        let sec: f64 = sec.parse().map_err(|_| invalid())?;
        let whole = h
            .checked_mul(3600)
            .and_then(|hs| m.checked_mul(60).and_then(|ms| hs.checked_add(ms)))
            .ok_or_else(invalid)?;
        whole as f64 + sec
    } else {
        s.parse::<f64>().map_err(|_| invalid())?
    };

    if !secs.is_finite() || secs < 0.0 {
        return Err(invalid());
    }
    Ok(secs)
}

/// Onset and offset vocabularies.  Matching is whole-word and
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keywords {
    pub onset: Vec<String>,
    pub offset: Vec<String>,
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            onset: ONSET_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            offset: OFFSET_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Keywords {
    fn any_in(vocab: &[String], words: &[String]) -> bool {
        words.iter().any(|w| vocab.iter().any(|k| k.eq_ignore_ascii_case(w)))
    }

    pub fn is_onset(&self, description: &str) -> bool {
        Self::any_in(&self.onset, &tokenize(description))
    }

    pub fn is_offset(&self, description: &str) -> bool {
        Self::any_in(&self.offset, &tokenize(description))
    }
}

/// Lower-cased words, split on anything that is not a letter or digit.
fn tokenize(description: &str) -> Vec<String> {
    description
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Resolve onset/offset with the default keyword sets.
pub fn resolve(entries: &[AnnotationEntry]) -> EventWindow {
    resolve_with(entries, &Keywords::default())
}

/// Scan `entries` in sequence order; the first onset match and the first
/// offset match are kept, independently of each other.  One entry may set
/// both.
pub fn resolve_with(entries: &[AnnotationEntry], keywords: &Keywords) -> EventWindow {
    let mut window = EventWindow::default();

    for entry in entries {
        let words = tokenize(&entry.description);
        if window.onset_sec.is_none() && Keywords::any_in(&keywords.onset, &words) {
            window.onset_sec = Some(entry.time_sec);
        }
        if window.offset_sec.is_none() && Keywords::any_in(&keywords.offset, &words) {
            window.offset_sec = Some(entry.time_sec);
        }
        if window.onset_sec.is_some() && window.offset_sec.is_some() {
            break;
        }
    }

    match (window.onset_sec, window.offset_sec) {
        (None, _) => log::info!("resolve: no onset marker among {} annotations", entries.len()),
        (_, None) => log::info!("resolve: no offset marker among {} annotations", entries.len()),
        _ => {}
    }
    window
}
