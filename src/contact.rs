//! Structured contacts: `A'12` → electrode `A'`, index 12.
//!
//! A [`ContactSet`] keeps contacts in acquisition order, which is the row
//! order of the signal matrix they were read alongside.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{PrepError, Result};
use crate::label::ChannelLabel;

/// One recording point on a depth or grid electrode.
///
/// The electrode name is stored upper-cased, so equality and hashing are
/// case-insensitive on the electrode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    pub electrode: String,
    pub index: u32,
}

impl Contact {
    pub fn new(electrode: &str, index: u32) -> Self {
        Self { electrode: electrode.to_uppercase(), index }
    }

    /// Same electrode and consecutive indices.
    pub fn is_adjacent(&self, other: &Contact) -> bool {
        self.electrode == other.electrode && self.index.abs_diff(other.index) == 1
    }

    /// The contact that would follow this one on the same electrode, or
    /// `None` at the top of the index range.
    pub fn successor(&self) -> Option<Contact> {
        let index = self.index.checked_add(1)?;
        Some(Contact { electrode: self.electrode.clone(), index })
    }

    pub fn label(&self) -> ChannelLabel {
        ChannelLabel::new(&self.to_string())
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.electrode, self.index)
    }
}

/// Split `label` at its first digit into `(electrode, index)`.
///
/// Fails with [`PrepError::MalformedLabel`] when there is no digit, the
/// electrode prefix is empty, or the suffix is not a plain integer.
pub fn to_contact(label: &ChannelLabel) -> Result<Contact> {
    let s = label.as_str();
    let malformed = || PrepError::MalformedLabel { label: s.to_string() };

    let split = s.find(|c: char| c.is_ascii_digit()).ok_or_else(malformed)?;
    let (electrode, suffix) = s.split_at(split);
    if electrode.is_empty() {
        return Err(malformed());
    }
    let index: u32 = suffix.parse().map_err(|_| malformed())?;
    Ok(Contact::new(electrode, index))
}

/// Group contacts by electrode, each group sorted by index.
pub fn group_by_electrode<'a, I>(contacts: I) -> BTreeMap<String, Vec<Contact>>
where
    I: IntoIterator<Item = &'a Contact>,
{
    let mut groups: BTreeMap<String, Vec<Contact>> = BTreeMap::new();
    for c in contacts {
        groups.entry(c.electrode.clone()).or_default().push(c.clone());
    }
    for group in groups.values_mut() {
        group.sort_by_key(|c| c.index);
    }
    groups
}

/// Contacts in acquisition order, without duplicates.
///
/// Position `i` corresponds to row `i` of the signal the set was built for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSet {
    contacts: Vec<Contact>,
    positions: HashMap<Contact, usize>,
}

impl ContactSet {
    /// Build from contacts; a repeated `(electrode, index)` is an error.
    pub fn new(contacts: Vec<Contact>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(contacts.len());
        for (i, c) in contacts.iter().enumerate() {
            if positions.insert(c.clone(), i).is_some() {
                return Err(PrepError::DuplicateContact { label: c.to_string() });
            }
        }
        Ok(Self { contacts, positions })
    }

    /// Parse every label into a contact.  Unlike [`crate::label::expand`]
    /// this is strict: dropping a label here would misalign the rows.
    pub fn from_labels(labels: &[ChannelLabel]) -> Result<Self> {
        let contacts = labels.iter().map(to_contact).collect::<Result<Vec<_>>>()?;
        Self::new(contacts)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Contact> {
        self.contacts.iter()
    }

    pub fn get(&self, i: usize) -> Option<&Contact> {
        self.contacts.get(i)
    }

    /// Row position of `contact`, if present.
    pub fn position_of(&self, contact: &Contact) -> Option<usize> {
        self.positions.get(contact).copied()
    }

    /// Canonical labels in acquisition order.
    pub fn labels(&self) -> Vec<ChannelLabel> {
        self.contacts.iter().map(Contact::label).collect()
    }

    pub fn group_by_electrode(&self) -> BTreeMap<String, Vec<Contact>> {
        group_by_electrode(&self.contacts)
    }
}

impl<'a> IntoIterator for &'a ContactSet {
    type Item = &'a Contact;
    type IntoIter = std::slice::Iter<'a, Contact>;

    fn into_iter(self) -> Self::IntoIter {
        self.contacts.iter()
    }
}
