mod common;
use common::{position_signal, recording, sine_signal, write_recording};
use ieegprep::{
    io::load_recording, preprocess, preprocess_all, AnnotationEntry, Coordinates, Montage,
    PipelineConfig, PrepError, Segment,
};
use ndarray::{concatenate, Axis};
use serde_json::json;

fn sz(onset: f64, offset: f64) -> Vec<AnnotationEntry> {
    vec![AnnotationEntry::new(onset, "SZ onset"), AnnotationEntry::new(offset, "fin crise")]
}

#[test]
fn bipolar_clip_and_windows() {
    let rate = 100.0;
    let data = sine_signal(6, 100 * 600, rate);
    let rec = recording(&["A1-3", "B'1-B'3"], data, rate, sz(200.0, 260.0));

    let out = preprocess(&rec, &PipelineConfig::default()).unwrap();
    let labels: Vec<&str> = out.labels.iter().map(|l| l.as_str()).collect();
    assert_eq!(labels, ["A1-A2", "A2-A3", "B'1-B'2", "B'2-B'3"]);
    assert_eq!(out.dropped_contacts.len(), 2);
    assert_eq!(out.clip_start, 140 * 100);
    assert_eq!(out.data.ncols(), (320 - 140) * 100);
    assert_eq!(out.events.onset_sec, Some(200.0));
    assert_eq!(out.events_in_clip().onset_sec, Some(60.0));

    let segs: Vec<Segment> = out.windows(60.0).unwrap().collect();
    assert_eq!(segs.len(), 3);
    assert_eq!(segs[0].start, out.clip_start);
    assert_eq!(segs[2].start, out.clip_start + 2 * 6000);
    let views: Vec<_> = segs.iter().map(|s| s.data.view()).collect();
    assert_eq!(concatenate(Axis(1), &views).unwrap(), out.data);
}

#[test]
fn no_onset_means_no_clip() {
    let rec = recording(&["A1-4"], sine_signal(4, 5000, 10.0), 10.0, vec![AnnotationEntry::new(3.0, "eyes open")]);
    let out = preprocess(&rec, &PipelineConfig::default()).unwrap();
    assert_eq!(out.clip_start, 0);
    assert_eq!(out.data.ncols(), 5000);
    assert_eq!(out.events.onset_sec, None);
}

#[test]
fn clip_past_end_falls_back_to_full_signal() {
    let rec = recording(&["A1-2"], sine_signal(2, 1000, 1.0), 1.0, sz(5000.0, 5100.0));
    let out = preprocess(&rec, &PipelineConfig::default()).unwrap();
    assert_eq!(out.clip_start, 0);
    assert_eq!(out.data.ncols(), 1000);
    assert_eq!(out.events.onset_sec, Some(5000.0));
}

#[test]
fn unparseable_token_drops_its_row() {
    // One token per row; "EKG" cannot be a contact.
    let data = position_signal(4, 50);
    let rec = recording(&["A1", "EKG", "A2", "A3"], data.clone(), 1.0, vec![]);
    let cfg = PipelineConfig { montage: Montage::Monopolar, ..Default::default() };
    let out = preprocess(&rec, &cfg).unwrap();

    assert_eq!(out.rejected_labels.len(), 1);
    assert_eq!(out.rejected_labels[0].position, 1);
    assert_eq!(out.data.nrows(), 3);
    assert_eq!(out.data.row(1), data.row(2));
}

#[test]
fn positions_follow_derived_rows() {
    let mut rec = recording(&["A1-3", "B1-2"], sine_signal(5, 100, 1.0), 1.0, vec![]);
    rec.coordinates = Coordinates::parse("A1 0 0 0\nA2 2 2 2\nA3 4 6 8\nB1 1 1 1\n");

    let out = preprocess(&rec, &PipelineConfig::default()).unwrap();
    assert_eq!(out.positions.len(), out.labels.len());
    assert_eq!(out.positions, [Some([1.0, 1.0, 1.0]), Some([3.0, 4.0, 5.0]), None]);

    let cfg = PipelineConfig {
        montage: Montage::Monopolar,
        included_channels: vec!["B1".into(), "A3".into()],
        ..Default::default()
    };
    let out = preprocess(&rec, &cfg).unwrap();
    assert_eq!(out.positions, [Some([1.0, 1.0, 1.0]), Some([4.0, 6.0, 8.0])]);
}

#[test]
fn row_count_mismatch_is_fatal_for_the_recording() {
    let rec = recording(&["A1-5"], sine_signal(3, 100, 1.0), 1.0, vec![]);
    let err = preprocess(&rec, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PrepError::InconsistentChannelCount { labels: 5, rows: 3 }));
}

#[test]
fn batch_continues_past_a_bad_recording() {
    let good = recording(&["A1-3"], sine_signal(3, 100, 1.0), 1.0, vec![]);
    let bad = recording(&["A1-3"], sine_signal(2, 100, 1.0), 1.0, vec![]);
    let results = preprocess_all(&[bad, good], &PipelineConfig::default());
    assert!(results[0].is_err());
    assert_eq!(results[1].as_ref().unwrap().data.nrows(), 2);
}

#[test]
fn samples_by_channels_matrix_is_transposed() {
    let data = position_signal(3, 40);
    let rec = recording(&["C1-3"], data.t().to_owned(), 1.0, vec![]);
    let cfg = PipelineConfig { montage: Montage::Monopolar, ..Default::default() };
    let out = preprocess(&rec, &cfg).unwrap();
    assert_eq!(out.data, data);
}

#[test]
fn bad_and_included_channels() {
    let rec = recording(&["A1-4", "B1-3"], sine_signal(7, 200, 10.0), 10.0, vec![]);
    let cfg = PipelineConfig {
        bad_channels: vec!["a 4".into(), "Q1".into()],
        included_channels: vec!["b2-b3".into(), "A1-A2".into(), "Z1-Z2".into()],
        ..Default::default()
    };
    let out = preprocess(&rec, &cfg).unwrap();
    let labels: Vec<&str> = out.labels.iter().map(|l| l.as_str()).collect();
    assert_eq!(labels, ["B2-B3", "A1-A2"]);
    assert_eq!(out.missing_channels, ["Q1", "Z1-Z2"]);
}

#[test]
fn duplicate_contact_is_rejected() {
    let rec = recording(&["A1-3", "A2"], sine_signal(4, 10, 1.0), 1.0, vec![]);
    let err = preprocess(&rec, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PrepError::DuplicateContact { .. }));
}

#[test]
fn loads_from_disk_and_summarises() {
    let dir = tempfile::tempdir().unwrap();
    let data = sine_signal(5, 2560, 256.0);
    let sidecar = json!({
        "channels": ["G\u{2019}1-5"],
        "annotations": [
            { "time": "00:00:02", "description": "Crise" },
            { "time": 8.5, "description": "END" },
            { "time": "??", "description": "offset" }
        ],
        "metadata": {
            "patient": "id001",
            "gender": "F",
            "equipment": "Nihon Kohden",
            "birth_date": "03 Feb 1990",
            "recording_date": "10.05.17"
        }
    });
    let (sig, side) = write_recording(dir.path(), &data, 256.0, &sidecar);

    let rec = load_recording(&sig, &side).unwrap();
    assert_eq!(rec.annotations.len(), 2);

    let cfg = PipelineConfig { montage: Montage::Average, ..Default::default() };
    let out = preprocess(&rec, &cfg).unwrap();
    assert_eq!(out.labels[0].as_str(), "G'1");
    assert_eq!(out.clip_start, 0);
    assert_eq!(out.data.ncols(), 2560);

    let summary = out.clinical_summary();
    assert_eq!(summary.onset_sec, Some(2.0));
    assert_eq!(summary.offset_ms, Some(8500.0));
    assert_eq!(summary.age, Some(27));
    assert_eq!(summary.gender.as_deref(), Some("F"));

    let out_path = dir.path().join("out.safetensors");
    ieegprep::io::write_processed(&out, &out_path).unwrap();
    let win_path = dir.path().join("windows.safetensors");
    let n = ieegprep::io::write_segments(out.windows(4.0).unwrap(), &win_path).unwrap();
    assert_eq!(n, 3);
}
