//! Spatial positions of electrode contacts.
//!
//! Two sources are supported:
//!
//! ```text
//! seeg.xyz           A'1  -31.2  12.0  4.5      whitespace `label x y z`
//!                    A'2  -34.6  12.3  4.9      one contact per line
//! <rec>.safetensors  chan_pos [C, 3]            row i belongs to channel i
//! ```
//!
//! Positions are keyed by [`Contact`], so a lookup is independent of the
//! row order of any particular signal.
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;

use crate::contact::{to_contact, Contact, ContactSet};
use crate::error::{PrepError, Result};
use crate::label::ChannelLabel;
use crate::montage::RowSource;

/// `[x, y, z]` in the units of the source file.
pub type Position = [f64; 3];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coordinates {
    positions: HashMap<Contact, Position>,
}

impl Coordinates {
    /// Parse a `label x y z` listing.  Blank lines and `#` comments are
    /// ignored; unreadable lines are skipped with a warning.
    pub fn parse(text: &str) -> Self {
        let mut coords = Self::default();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Some((contact, pos)) => coords.insert(contact, pos),
                None => log::warn!("coordinates: line {}: cannot parse {line:?}, skipping", n + 1),
            }
        }
        log::debug!("coordinates: {} contacts", coords.len());
        coords
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    /// Build from a [C, 3] position matrix whose rows follow `labels`.
    ///
    /// # Errors
    ///
    /// * [`PrepError::InconsistentChannelCount`] when row and label counts differ.
    /// * [`PrepError::InvalidCoordinates`] when the matrix is not three columns wide.
    /// * [`PrepError::MalformedLabel`] for a label with no contact structure.
    pub fn from_rows(labels: &[ChannelLabel], pos: &Array2<f64>) -> Result<Self> {
        if pos.ncols() != 3 {
            return Err(PrepError::InvalidCoordinates(format!(
                "expected [C, 3] positions, got [{}, {}]",
                pos.nrows(),
                pos.ncols()
            )));
        }
        if pos.nrows() != labels.len() {
            return Err(PrepError::InconsistentChannelCount { labels: labels.len(), rows: pos.nrows() });
        }
        let mut coords = Self::default();
        for (label, row) in labels.iter().zip(pos.rows()) {
            let xyz = [row[0], row[1], row[2]];
            // NaN rows mark channels without a known position.
            if xyz.iter().all(|v| v.is_finite()) {
                coords.insert(to_contact(label)?, xyz);
            }
        }
        Ok(coords)
    }

    /// Add or replace the position of `contact`.
    pub fn insert(&mut self, contact: Contact, pos: Position) {
        if let Some(old) = self.positions.insert(contact.clone(), pos) {
            log::warn!("coordinates: {contact} listed twice, replacing {old:?} with {pos:?}");
        }
    }

    pub fn get(&self, contact: &Contact) -> Option<Position> {
        self.positions.get(contact).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position of every contact in `contacts`, in acquisition order.
    pub fn aligned(&self, contacts: &ContactSet) -> Vec<Option<Position>> {
        contacts.iter().map(|c| self.get(c)).collect()
    }

    /// Position of a derived row.  A bipolar row sits at the midpoint of its
    /// two contacts and needs both of them.
    pub fn locate(&self, source: &RowSource) -> Option<Position> {
        match source {
            RowSource::Contact(c) => self.get(c),
            RowSource::Pair { anode, cathode } => {
                let (a, b) = (self.get(anode)?, self.get(cathode)?);
                Some([(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0, (a[2] + b[2]) / 2.0])
            }
        }
    }
}

fn parse_line(line: &str) -> Option<(Contact, Position)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [label, x, y, z] = fields.as_slice() else {
        return None;
    };
    let contact = to_contact(&ChannelLabel::new(label)).ok()?;
    let mut pos = [0.0; 3];
    for (slot, field) in pos.iter_mut().zip([x, y, z]) {
        *slot = field.parse::<f64>().ok().filter(|v| v.is_finite())?;
    }
    Some((contact, pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const XYZ: &str = "\
# implantation export
A'1  -31.2  12.0  4.5
A'2  -34.6  12.3  4.9

b1 10 20 30
EKG  1 2
C3   1 2 nan
";

    #[test]
    fn listing_is_keyed_by_contact() {
        let coords = Coordinates::parse(XYZ);
        assert_eq!(coords.len(), 3);
        assert_eq!(coords.get(&Contact::new("A'", 2)), Some([-34.6, 12.3, 4.9]));
        assert_eq!(coords.get(&Contact::new("B", 1)), Some([10.0, 20.0, 30.0]));
        assert_eq!(coords.get(&Contact::new("C", 3)), None);
    }

    #[test]
    fn aligned_follows_acquisition_order() {
        let coords = Coordinates::parse(XYZ);
        let labels = [ChannelLabel::new("B1"), ChannelLabel::new("Z9"), ChannelLabel::new("A'1")];
        let set = ContactSet::from_labels(&labels).unwrap();
        assert_eq!(coords.aligned(&set), [Some([10.0, 20.0, 30.0]), None, Some([-31.2, 12.0, 4.5])]);
    }

    #[test]
    fn bipolar_row_sits_at_midpoint() {
        let coords = Coordinates::parse("A1 0 0 0\nA2 2 4 -6\n");
        let pair = RowSource::Pair { anode: Contact::new("A", 1), cathode: Contact::new("A", 2) };
        let pos = coords.locate(&pair).unwrap();
        approx::assert_abs_diff_eq!(pos[1], 2.0);
        assert_eq!(pos, [1.0, 2.0, -3.0]);

        let orphan = RowSource::Pair { anode: Contact::new("A", 2), cathode: Contact::new("A", 3) };
        assert_eq!(coords.locate(&orphan), None);
    }

    #[test]
    fn position_matrix_rows_follow_labels() {
        let labels = [ChannelLabel::new("A1"), ChannelLabel::new("A2")];
        let pos = array![[1.0, 2.0, 3.0], [f64::NAN, 0.0, 0.0]];
        let coords = Coordinates::from_rows(&labels, &pos).unwrap();
        assert_eq!(coords.get(&Contact::new("A", 1)), Some([1.0, 2.0, 3.0]));
        assert_eq!(coords.get(&Contact::new("A", 2)), None);

        let err = Coordinates::from_rows(&labels, &Array2::zeros((2, 2))).unwrap_err();
        assert!(matches!(err, PrepError::InvalidCoordinates(_)));
        let err = Coordinates::from_rows(&labels[..1], &pos).unwrap_err();
        assert!(matches!(err, PrepError::InconsistentChannelCount { labels: 1, rows: 2 }));
    }
}
