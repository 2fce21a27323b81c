//! Per-recording patient and equipment metadata.
//!
//! Passed through the pipeline unmodified, apart from deriving the patient
//! age from the birth date when the source does not provide one.
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Date layouts seen in EDF headers and clinical exports.
const DATE_FORMATS: [&str; 5] = ["%d %b %Y", "%d.%m.%y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingMetadata {
    /// Patient identifier, e.g. `id001_ac`.
    pub patient: String,
    /// Recording identifier within the patient, e.g. `sz1`.
    pub record_id: Option<String>,
    pub gender: Option<String>,
    pub equipment: Option<String>,
    /// Hz, as declared by the header.  The signal source's rate is used for
    /// processing; this is kept for reference.
    pub sample_rate: Option<f64>,
    pub record_duration_sec: Option<f64>,
    pub birth_date: Option<String>,
    pub recording_date: Option<String>,
    pub age: Option<u32>,
}

impl RecordingMetadata {
    /// Fill `age` from `birth_date` and `recording_date` when it is missing.
    /// Unparseable dates leave it absent.
    pub fn with_derived_age(mut self) -> Self {
        if self.age.is_none() {
            self.age = match (&self.birth_date, &self.recording_date) {
                (Some(birth), Some(on)) => match (parse_date(birth), parse_date(on)) {
                    (Some(b), Some(r)) => age_in_years(b, r),
                    _ => {
                        log::warn!("metadata: cannot parse birth date {birth:?} or recording date {on:?}");
                        None
                    }
                },
                _ => None,
            };
        }
        self
    }
}

/// Parse a date in any of the layouts in [`DATE_FORMATS`].
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Whole years between `birth` and `on`; `None` if `on` precedes `birth`.
pub fn age_in_years(birth: NaiveDate, on: NaiveDate) -> Option<u32> {
    let mut years = on.year() - birth.year();
    if (on.month(), on.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_counts_whole_years() {
        let birth = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        assert_eq!(age_in_years(birth, NaiveDate::from_ymd_opt(2020, 6, 14).unwrap()), Some(29));
        assert_eq!(age_in_years(birth, NaiveDate::from_ymd_opt(2020, 6, 15).unwrap()), Some(30));
        assert_eq!(age_in_years(birth, NaiveDate::from_ymd_opt(1980, 1, 1).unwrap()), None);
    }

    #[test]
    fn date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2015, 3, 12);
        assert_eq!(parse_date("12 Mar 2015"), expected);
        assert_eq!(parse_date("12.03.15"), expected);
        assert_eq!(parse_date("2015-03-12"), expected);
        assert_eq!(parse_date("sometime"), None);
    }

    #[test]
    fn derived_age_keeps_explicit_value() {
        let meta = RecordingMetadata {
            birth_date: Some("01 Jan 1980".into()),
            recording_date: Some("02.01.20".into()),
            ..Default::default()
        };
        assert_eq!(meta.clone().with_derived_age().age, Some(40));

        let meta = RecordingMetadata { age: Some(7), ..meta };
        assert_eq!(meta.with_derived_age().age, Some(7));
    }
}
