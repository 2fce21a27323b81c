//! Montage engine: derive analysed channels from raw recorded channels.
//!
//! * `monopolar` — identity.
//! * `average`   — `data[c, t] -= mean(data[:, t])`, like
//!   `raw.set_eeg_reference('average', projection=False)`.
//! * `bipolar`   — `data[A_i] - data[A_{i+1}]` for every contact whose
//!   numeric successor exists on the same electrode.
//!
//! Every transform returns a new matrix together with a label sequence of
//! the same length as its row count.  Column count is never changed.
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::contact::{Contact, ContactSet};
use crate::error::{PrepError, Result};
use crate::label::ChannelLabel;

/// Reference scheme applied to the raw signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Montage {
    #[serde(alias = "mono")]
    Monopolar,
    #[serde(alias = "avg")]
    Average,
    #[default]
    Bipolar,
}

impl fmt::Display for Montage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Montage::Monopolar => "monopolar",
            Montage::Average => "average",
            Montage::Bipolar => "bipolar",
        })
    }
}

impl FromStr for Montage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monopolar" | "mono" => Ok(Montage::Monopolar),
            "average" | "avg" => Ok(Montage::Average),
            "bipolar" => Ok(Montage::Bipolar),
            other => Err(format!("unknown montage {other:?} (expected monopolar, average or bipolar)")),
        }
    }
}

/// A derived signal and its row labels.
#[derive(Debug, Clone)]
pub struct Derived {
    /// [C', T]
    pub data: Array2<f64>,
    /// `labels.len() == data.nrows()`
    pub labels: Vec<ChannelLabel>,
    /// Contacts behind each output row, `sources.len() == data.nrows()`.
    pub sources: Vec<RowSource>,
    /// Contacts that produced no output row (bipolar trailing contacts).
    pub dropped: Vec<Contact>,
}

/// What a derived row was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSource {
    Contact(Contact),
    Pair { anode: Contact, cathode: Contact },
}

/// One bipolar channel: `row(anode) - row(cathode)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BipolarPair {
    pub anode: usize,
    pub cathode: usize,
    pub label: ChannelLabel,
}

/// Pairing of a contact set, before any signal is touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BipolarPlan {
    pub pairs: Vec<BipolarPair>,
    /// Contacts with no numeric successor on their electrode.
    pub dropped: Vec<Contact>,
}

/// Pair every contact with its numeric successor on the same electrode.
///
/// Contacts are walked in acquisition order; the successor may sit anywhere
/// in the set.  Output order follows the anode's acquisition order.
pub fn bipolar_pairs(contacts: &ContactSet) -> BipolarPlan {
    let mut plan = BipolarPlan::default();
    for (i, contact) in contacts.iter().enumerate() {
        let partner = contact
            .successor()
            .and_then(|next| contacts.position_of(&next).map(|j| (next, j)));
        match partner {
            Some((next, j)) => plan.pairs.push(BipolarPair {
                anode: i,
                cathode: j,
                label: ChannelLabel::new(&format!("{contact}-{next}")),
            }),
            None => plan.dropped.push(contact.clone()),
        }
    }
    plan
}

/// Apply `mode` to `raw` ([C, T]), whose rows are described by `contacts`.
///
/// # Errors
///
/// [`PrepError::InconsistentChannelCount`] when `contacts.len() != raw.nrows()`.
pub fn apply(raw: &Array2<f64>, contacts: &ContactSet, mode: Montage) -> Result<Derived> {
    if contacts.len() != raw.nrows() {
        return Err(PrepError::InconsistentChannelCount {
            labels: contacts.len(),
            rows: raw.nrows(),
        });
    }

    let derived = match mode {
        Montage::Monopolar => Derived {
            data: raw.clone(),
            labels: contacts.labels(),
            sources: contacts.iter().cloned().map(RowSource::Contact).collect(),
            dropped: vec![],
        },
        Montage::Average => Derived {
            data: average_reference(&raw.view()),
            labels: contacts.labels(),
            sources: contacts.iter().cloned().map(RowSource::Contact).collect(),
            dropped: vec![],
        },
        Montage::Bipolar => {
            let plan = bipolar_pairs(contacts);
            for c in &plan.dropped {
                log::warn!("bipolar: contact {c} has no successor on its electrode, dropping it");
            }
            let sources = plan
                .pairs
                .iter()
                .filter_map(|p| {
                    Some(RowSource::Pair {
                        anode: contacts.get(p.anode)?.clone(),
                        cathode: contacts.get(p.cathode)?.clone(),
                    })
                })
                .collect();
            Derived {
                data: bipolar_reference(&raw.view(), &plan.pairs),
                labels: plan.pairs.into_iter().map(|p| p.label).collect(),
                sources,
                dropped: plan.dropped,
            }
        }
    };

    log::debug!(
        "montage {mode}: {} -> {} channels x {} samples",
        raw.nrows(),
        derived.data.nrows(),
        derived.data.ncols()
    );
    Ok(derived)
}

/// Subtract the per-timepoint channel mean.  Zero-channel input is returned
/// unchanged.
pub fn average_reference(data: &ArrayView2<f64>) -> Array2<f64> {
    let mut out = data.to_owned();
    if let Some(means) = data.mean_axis(Axis(0)) {
        for mut row in out.rows_mut() {
            row -= &means;
        }
    }
    out
}

/// One output row per pair: `data[anode] - data[cathode]`.
pub fn bipolar_reference(data: &ArrayView2<f64>, pairs: &[BipolarPair]) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((pairs.len(), data.ncols()));
    for (mut row, pair) in out.rows_mut().into_iter().zip(pairs) {
        row.assign(&(&data.row(pair.anode) - &data.row(pair.cathode)));
    }
    out
}

/// Rows kept by a channel selection.
#[derive(Debug, Clone)]
pub struct Selection {
    pub data: Array2<f64>,
    pub labels: Vec<ChannelLabel>,
    /// Input row index of each kept row.
    pub rows: Vec<usize>,
    /// Requested names that matched no channel.
    pub missing: Vec<String>,
}

/// Name matching used for user-supplied channel lists: case-insensitive,
/// spaces ignored, apostrophe variants folded.
fn same_channel(a: &str, b: &str) -> bool {
    let norm = |s: &str| crate::label::normalize_token(s).replace(' ', "").to_lowercase();
    norm(a) == norm(b)
}

fn check_rows(data: &Array2<f64>, labels: &[ChannelLabel]) -> Result<()> {
    if labels.len() != data.nrows() {
        return Err(PrepError::InconsistentChannelCount { labels: labels.len(), rows: data.nrows() });
    }
    Ok(())
}

/// Keep only rows at `rows`, in the given order.
pub fn take_rows(data: &Array2<f64>, labels: &[ChannelLabel], rows: &[usize]) -> Result<Selection> {
    check_rows(data, labels)?;
    Ok(Selection {
        data: data.select(Axis(0), rows),
        labels: rows.iter().map(|&r| labels[r].clone()).collect(),
        rows: rows.to_vec(),
        missing: vec![],
    })
}

/// Keep the channels named in `wanted`, in `wanted` order.
pub fn select_channels(
    data: &Array2<f64>,
    labels: &[ChannelLabel],
    wanted: &[String],
) -> Result<Selection> {
    check_rows(data, labels)?;
    let mut rows = Vec::with_capacity(wanted.len());
    let mut missing = vec![];
    for name in wanted {
        match labels.iter().position(|l| same_channel(l.as_str(), name)) {
            Some(r) if !rows.contains(&r) => rows.push(r),
            Some(_) => {}
            None => {
                log::warn!("select: channel {name:?} not present, skipping");
                missing.push(name.clone());
            }
        }
    }
    let mut sel = take_rows(data, labels, &rows)?;
    sel.missing = missing;
    Ok(sel)
}

/// Remove the channels named in `bad`, keeping the remaining row order.
pub fn drop_channels(
    data: &Array2<f64>,
    labels: &[ChannelLabel],
    bad: &[String],
) -> Result<Selection> {
    check_rows(data, labels)?;
    let missing: Vec<String> = bad
        .iter()
        .filter(|b| !labels.iter().any(|l| same_channel(l.as_str(), b)))
        .cloned()
        .collect();
    for name in &missing {
        log::warn!("drop: bad channel {name:?} not present");
    }
    let rows: Vec<usize> = (0..labels.len())
        .filter(|&r| !bad.iter().any(|b| same_channel(labels[r].as_str(), b)))
        .collect();
    let mut sel = take_rows(data, labels, &rows)?;
    sel.missing = missing;
    Ok(sel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn set(labels: &[&str]) -> ContactSet {
        let labels: Vec<ChannelLabel> = labels.iter().map(|s| ChannelLabel::new(s)).collect();
        ContactSet::from_labels(&labels).unwrap()
    }

    #[test]
    fn channel_sum_is_zero_after_average() {
        let data = Array2::from_shape_fn((8, 512), |(c, t)| ((c * 7 + t * 3) as f64).sin());
        let out = average_reference(&data.view());
        for &s in out.sum_axis(Axis(0)).iter() {
            approx::assert_abs_diff_eq!(s, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn average_preserves_channel_differences() {
        let data = Array2::from_shape_fn((2, 10), |(c, _)| if c == 0 { 2.0 } else { 4.0 });
        let out = average_reference(&data.view());
        for t in 0..10 {
            approx::assert_abs_diff_eq!(out[[0, t]] - out[[1, t]], -2.0, epsilon = 1e-12);
        }
        // Input untouched.
        assert_eq!(data[[0, 0]], 2.0);
    }

    #[test]
    fn bipolar_pairs_follow_numeric_successor() {
        // Acquisition order is not numeric order.
        let contacts = set(&["A2", "B1", "A1", "A3", "B2"]);
        let plan = bipolar_pairs(&contacts);
        let labels: Vec<&str> = plan.pairs.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["A2-A3", "B1-B2", "A1-A2"]);
        assert_eq!(plan.pairs[2].anode, 2);
        assert_eq!(plan.pairs[2].cathode, 0);
        assert_eq!(plan.dropped, [Contact::new("A", 3), Contact::new("B", 2)]);
    }

    #[test]
    fn gap_in_indices_drops_contact() {
        let plan = bipolar_pairs(&set(&["A1", "A3", "A4"]));
        let labels: Vec<&str> = plan.pairs.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["A3-A4"]);
        assert_eq!(plan.dropped.len(), 2);
    }

    #[test]
    fn highest_index_has_no_successor() {
        let contacts = set(&["A4294967295", "A0", "A1"]);
        let plan = bipolar_pairs(&contacts);
        let labels: Vec<&str> = plan.pairs.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["A0-A1"]);
        assert_eq!(plan.dropped, [Contact::new("A", u32::MAX), Contact::new("A", 1)]);

        let raw = Array2::<f64>::zeros((3, 4));
        let out = apply(&raw, &contacts, Montage::Bipolar).unwrap();
        assert_eq!(out.data.nrows(), 1);
    }

    #[test]
    fn bipolar_values() {
        let raw = array![[1.0, 2.0], [10.0, 20.0], [100.0, 200.0]];
        let out = apply(&raw, &set(&["A1", "A2", "A3"]), Montage::Bipolar).unwrap();
        assert_eq!(out.data, array![[-9.0, -18.0], [-90.0, -180.0]]);
        assert_eq!(out.labels.len(), out.data.nrows());
        assert_eq!(
            out.sources[1],
            RowSource::Pair { anode: Contact::new("A", 2), cathode: Contact::new("A", 3) }
        );
    }

    #[test]
    fn channel_count_mismatch_is_reported() {
        let raw = Array2::<f64>::zeros((2, 5));
        let err = apply(&raw, &set(&["A1", "A2", "A3"]), Montage::Monopolar).unwrap_err();
        assert!(matches!(err, PrepError::InconsistentChannelCount { labels: 3, rows: 2 }));
    }

    #[test]
    fn montage_parses_aliases() {
        assert_eq!("avg".parse::<Montage>().unwrap(), Montage::Average);
        assert_eq!(" Bipolar ".parse::<Montage>().unwrap(), Montage::Bipolar);
        assert!("laplacian".parse::<Montage>().is_err());
        assert_eq!(Montage::Monopolar.to_string(), "monopolar");
    }

    #[test]
    fn drop_and_select_by_name() {
        let raw = array![[1.0], [2.0], [3.0]];
        let labels: Vec<ChannelLabel> = ["A1", "A2", "B1"].iter().map(|s| ChannelLabel::new(s)).collect();

        let sel = drop_channels(&raw, &labels, &["a 2".to_string(), "Z9".to_string()]).unwrap();
        assert_eq!(sel.data, array![[1.0], [3.0]]);
        assert_eq!(sel.missing, ["Z9"]);

        let sel = select_channels(&raw, &labels, &["b1".to_string(), "A1".to_string()]).unwrap();
        assert_eq!(sel.data, array![[3.0], [1.0]]);
        assert_eq!(sel.labels[0].as_str(), "B1");
    }
}
