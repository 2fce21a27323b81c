/// Shared helpers for building synthetic recordings.
use ieegprep::{io::StWriter, AnnotationEntry, RawRecording};
use ndarray::Array2;
use std::path::{Path, PathBuf};

#[allow(unused)]
/// [C, T] signal whose value encodes its own position: `c * 1e6 + t`.
pub fn position_signal(n_ch: usize, n_t: usize) -> Array2<f64> {
    Array2::from_shape_fn((n_ch, n_t), |(c, t)| (c * 1_000_000 + t) as f64)
}

#[allow(unused)]
/// Deterministic pseudo-EEG: a few sines per channel.
pub fn sine_signal(n_ch: usize, n_t: usize, sfreq: f64) -> Array2<f64> {
    Array2::from_shape_fn((n_ch, n_t), |(c, t)| {
        let x = t as f64 / sfreq;
        let f = 1.0 + c as f64 * 0.7;
        (2.0 * std::f64::consts::PI * f * x).sin() * 50.0 + (c as f64 * 3.1 + x * 11.0).cos() * 5.0
    })
}

#[allow(unused)]
pub fn recording(raw_labels: &[&str], data: Array2<f64>, sample_rate: f64, annotations: Vec<AnnotationEntry>) -> RawRecording {
    RawRecording {
        raw_labels: raw_labels.iter().map(|s| s.to_string()).collect(),
        data,
        sample_rate,
        annotations,
        metadata: Default::default(),
        coordinates: Default::default(),
    }
}

#[allow(unused)]
/// Write `data`/`sfreq` as safetensors and `sidecar` as JSON into `dir`.
pub fn write_recording(dir: &Path, data: &Array2<f64>, sfreq: f64, sidecar: &serde_json::Value) -> (PathBuf, PathBuf) {
    let signal = dir.join("rec.safetensors");
    let side = dir.join("rec.json");
    let mut w = StWriter::new();
    w.add_f64_arr2("data", data);
    w.add_f64("sfreq", &[sfreq], &[1]);
    w.write(&signal).unwrap();
    std::fs::write(&side, serde_json::to_vec_pretty(sidecar).unwrap()).unwrap();
    (signal, side)
}
