//! Channel-label expansion.
//!
//! Clinical metadata lists recording channels as free text, often in an
//! abbreviated form: `A'1-12` or `B1-B8` stand for twelve and eight
//! contacts respectively.  [`expand`] turns such a list into the explicit,
//! ordered sequence of channel names.
//!
//! Three token shapes are recognised, tried in order:
//!
//! ```text
//! A'3        single contact
//! A'1-12     numeric range on one electrode
//! A'1-A'12   range with the electrode repeated (both sides must agree)
//! ```
//!
//! Anything else is dropped with a warning and reported in
//! [`Expansion::rejected`]; the rest of the batch keeps going.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Largest number of contacts a single range token may expand to.
pub const MAX_RANGE_SPAN: u32 = 256;

/// Apostrophe look-alikes found in exported clinical spreadsheets.
const APOSTROPHE_VARIANTS: [char; 5] = ['\u{2019}', '\u{2018}', '\u{2032}', '\u{00B4}', '`'];

/// A normalised recording-channel name, e.g. `A'1`.
///
/// The electrode prefix is upper-cased and apostrophe variants are folded to
/// `'`; the value never changes after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelLabel(String);

impl ChannelLabel {
    /// Normalise `raw` into canonical form.  No structural validation is done
    /// here; see [`crate::contact::to_contact`] for that.
    pub fn new(raw: &str) -> Self {
        Self(normalize_token(raw).to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ChannelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A token [`expand`] could not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedToken {
    /// Index of the token in the input slice.
    pub position: usize,
    /// The token after apostrophe folding and trimming.
    pub token: String,
}

/// Result of [`expand`]: the parsed labels plus every token that was dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    pub labels: Vec<ChannelLabel>,
    /// `origins[k]` is the input index of the token that produced `labels[k]`.
    pub origins: Vec<usize>,
    pub rejected: Vec<RejectedToken>,
}

impl Expansion {
    /// Label strings in output order.
    pub fn label_strings(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.as_str().to_string()).collect()
    }

    pub fn rejected_tokens(&self) -> Vec<&str> {
        self.rejected.iter().map(|r| r.token.as_str()).collect()
    }

    /// True when every input token produced at most one label, i.e. output
    /// labels can be mapped back one-to-one onto input positions.
    pub fn is_one_to_one(&self) -> bool {
        self.origins.windows(2).all(|w| w[0] != w[1])
    }
}

/// Fold apostrophe variants to `'` and trim surrounding whitespace.
pub fn normalize_token(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if APOSTROPHE_VARIANTS.contains(&c) { '\'' } else { c })
        .collect()
}

fn single_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z]+'*)([0-9]+)$").expect("static regex"))
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z]+'*)([0-9]+)-([0-9]+)$").expect("static regex"))
}

fn cross_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z]+'*)([0-9]+)-([A-Za-z]+'*)([0-9]+)$").expect("static regex")
    })
}

/// Expand raw label tokens into an explicit ordered list of channel names.
///
/// Output keeps the token order of `raw`; ranges expand in ascending index
/// order.  Empty tokens are skipped silently, unparseable ones are logged
/// and collected in [`Expansion::rejected`].
///
/// ```
/// use ieegprep::label::expand;
/// let out = expand(&["A1-3", "B'2"]);
/// assert_eq!(out.label_strings(), ["A1", "A2", "A3", "B'2"]);
/// ```
pub fn expand<S: AsRef<str>>(raw: &[S]) -> Expansion {
    let mut out = Expansion::default();

    for (position, token) in raw.iter().enumerate() {
        let token = normalize_token(token.as_ref());
        if token.is_empty() {
            continue;
        }
        match expand_token(&token) {
            Some(labels) => {
                out.origins.extend(std::iter::repeat(position).take(labels.len()));
                out.labels.extend(labels);
            }
            None => {
                log::warn!("expand: cannot parse channel token {token:?}, dropping it");
                out.rejected.push(RejectedToken { position, token });
            }
        }
    }

    log::debug!(
        "expand: {} tokens -> {} labels ({} rejected)",
        raw.len(),
        out.labels.len(),
        out.rejected.len()
    );
    out
}

/// Expand one normalised token, or `None` if it matches no known shape.
fn expand_token(token: &str) -> Option<Vec<ChannelLabel>> {
    if single_re().is_match(token) {
        return Some(vec![ChannelLabel::new(token)]);
    }

    if let Some(caps) = range_re().captures(token) {
        let first: u32 = caps[2].parse().ok()?;
        let last: u32 = caps[3].parse().ok()?;
        return expand_range(&caps[1], first, last);
    }

    if let Some(caps) = cross_range_re().captures(token) {
        let (name1, name2) = (&caps[1], &caps[3]);
        if !name1.eq_ignore_ascii_case(name2) {
            return None;
        }
        let first: u32 = caps[2].parse().ok()?;
        let last: u32 = caps[4].parse().ok()?;
        return expand_range(name1, first, last);
    }

    None
}

/// Inclusive ascending range.  A descending range would expand to nothing,
/// so it is treated as unparseable rather than silently vanishing.  Spans
/// wider than [`MAX_RANGE_SPAN`] contacts are unparseable too.
fn expand_range(electrode: &str, first: u32, last: u32) -> Option<Vec<ChannelLabel>> {
    if first > last {
        return None;
    }
    if last - first >= MAX_RANGE_SPAN {
        log::warn!("expand: range {electrode}{first}-{last} spans more than {MAX_RANGE_SPAN} contacts");
        return None;
    }
    Some(
        (first..=last)
            .map(|i| ChannelLabel::new(&format!("{electrode}{i}")))
            .collect(),
    )
}
