//! Safetensors + JSON I/O at the edges of the pipeline.
//!
//! Input is a pair of files per recording:
//!
//! ```text
//! <rec>.safetensors   data      [C, T] F32 | F64   raw signal
//!                     sfreq     [1]    F32 | F64   sample rate (Hz)
//!                     ch_names  [n]    U8          newline-joined labels (optional)
//!                     chan_pos  [C, 3] F32 | F64   contact positions (optional)
//! <rec>.json          { "channels": [...], "annotations": [...], "metadata": {...} }
//! ```
//!
//! Output is written with [`StWriter`].
use anyhow::{bail, Context, Result};
use ndarray::Array2;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::annotation::{parse_time_sec, AnnotationEntry};
use crate::coordinates::Coordinates;
use crate::label::expand;
use crate::metadata::RecordingMetadata;
use crate::window::Segment;
use crate::{ProcessedRecording, RawRecording};

// ── Low-level safetensors parser ──────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    if bytes.len() < 8 {
        bail!("safetensors file too small");
    }
    let n = u64::from_le_bytes(bytes[..8].try_into()?);
    let end = usize::try_from(n)
        .ok()
        .and_then(|n| n.checked_add(8))
        .filter(|&end| end <= bytes.len());
    let Some(end) = end else {
        bail!("safetensors header length {n} exceeds file size {}", bytes.len());
    };
    let header: HashMap<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..end]).context("failed to parse safetensors header")?;
    Ok((header, end))
}

fn tensor_bytes<'b>(bytes: &'b [u8], data_start: usize, entry: &serde_json::Value) -> Result<&'b [u8]> {
    let offsets = entry["data_offsets"].as_array().context("missing data_offsets")?;
    let (s, e) = match offsets.as_slice() {
        [s, e] => (
            s.as_u64().context("bad data offset")? as usize,
            e.as_u64().context("bad data offset")? as usize,
        ),
        _ => bail!("data_offsets must have two entries"),
    };
    let (Some(start), Some(end)) = (data_start.checked_add(s), data_start.checked_add(e)) else {
        bail!("tensor data offsets [{s}, {e}] overflow");
    };
    bytes.get(start..end).context("tensor data out of bounds")
}

/// Numeric tensor widened to f64.
fn read_f64_tensor(bytes: &[u8], data_start: usize, entry: &serde_json::Value) -> Result<Vec<f64>> {
    let raw = tensor_bytes(bytes, data_start, entry)?;
    let dtype = entry["dtype"].as_str().context("missing dtype")?;
    Ok(match dtype {
        "F32" => raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect(),
        "F64" => raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect(),
        "I32" => raw
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect(),
        other => bail!("unsupported tensor dtype {other}"),
    })
}

fn shape_of(entry: &serde_json::Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .context("missing shape")?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize).context("bad shape entry"))
        .collect()
}

// ── Signal file ───────────────────────────────────────────────────────────────

/// Raw signal as stored on disk.
pub struct RawSignal {
    /// [C, T] in original units.
    pub data: Array2<f64>,
    /// Hz.
    pub sfreq: f64,
    /// Channel names (empty if not saved).
    pub ch_names: Vec<String>,
    /// [C, 3] contact positions, if saved.
    pub chan_pos: Option<Array2<f64>>,
}

impl RawSignal {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let (header, data_start) = parse_header(&bytes)?;

        let data_entry = header.get("data").context("missing 'data' key")?;
        let data_shape = shape_of(data_entry)?;
        let &[n_ch, n_t] = data_shape.as_slice() else {
            bail!("'data' must be 2-D, got shape {data_shape:?}");
        };
        let data_vec = read_f64_tensor(&bytes, data_start, data_entry)?;
        let data = Array2::from_shape_vec((n_ch, n_t), data_vec)?;

        let sfreq_entry = header.get("sfreq").context("missing 'sfreq' key")?;
        let sfreq = *read_f64_tensor(&bytes, data_start, sfreq_entry)?
            .first()
            .context("empty 'sfreq' tensor")?;

        // Channel names are optional.
        let ch_names: Vec<String> = match header.get("ch_names") {
            Some(e) => std::str::from_utf8(tensor_bytes(&bytes, data_start, e)?)?
                .split('\n')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => vec![],
        };

        let chan_pos = match header.get("chan_pos") {
            Some(e) => {
                let shape = shape_of(e)?;
                let &[rows, cols] = shape.as_slice() else {
                    bail!("'chan_pos' must be 2-D, got shape {shape:?}");
                };
                Some(Array2::from_shape_vec((rows, cols), read_f64_tensor(&bytes, data_start, e)?)?)
            }
            None => None,
        };

        Ok(RawSignal { data, sfreq, ch_names, chan_pos })
    }
}

// ── JSON sidecar ──────────────────────────────────────────────────────────────

/// Annotation time as written by exporters: seconds or an `H:M:S` string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TimeField {
    Seconds(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct SidecarAnnotation {
    #[serde(alias = "time_sec", alias = "onset")]
    time: TimeField,
    description: String,
}

/// Per-recording clinical sidecar.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sidecar {
    /// Raw label tokens, possibly abbreviated (`"A1-12"`).
    channels: Vec<String>,
    annotations: Vec<SidecarAnnotation>,
    metadata: RecordingMetadata,
}

fn load_sidecar(path: &Path) -> Result<Sidecar> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Load a recording from its signal file and JSON sidecar.
///
/// Channel tokens come from the sidecar's `channels` list when present,
/// otherwise from the signal file's `ch_names`.  Annotations with an
/// unreadable time are skipped with a warning, and so is a `chan_pos`
/// tensor that does not line up with the expanded labels.
pub fn load_recording(signal_path: &Path, sidecar_path: &Path) -> Result<RawRecording> {
    let signal = RawSignal::load(signal_path)?;
    let sidecar = load_sidecar(sidecar_path)?;

    let raw_labels = if sidecar.channels.is_empty() { signal.ch_names } else { sidecar.channels };

    let coordinates = match &signal.chan_pos {
        Some(pos) => match Coordinates::from_rows(&expand(&raw_labels).labels, pos) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("ignoring chan_pos in {}: {e}", signal_path.display());
                Coordinates::default()
            }
        },
        None => Coordinates::default(),
    };

    let mut annotations = Vec::with_capacity(sidecar.annotations.len());
    for a in sidecar.annotations {
        let time = match a.time {
            TimeField::Seconds(s) => s,
            TimeField::Text(t) => match parse_time_sec(&t) {
                Ok(s) => s,
                Err(e) => {
                    log::warn!("annotation {:?}: {e}, skipping", a.description);
                    continue;
                }
            },
        };
        annotations.push(AnnotationEntry::new(time, a.description));
    }

    Ok(RawRecording {
        raw_labels,
        data: signal.data,
        sample_rate: signal.sfreq,
        annotations,
        metadata: sidecar.metadata,
        coordinates,
    })
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Simple safetensors file writer for F64, I64 and U8 tensors.
///
/// Usage:
/// ```rust,no_run
/// use ieegprep::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("signal", &[1.0f64, 2.0, 3.0], &[1, 3]);
/// w.add_strings("labels", &["A1-A2"]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_i64(&mut self, name: &str, data: &[i64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I64", shape.to_vec()));
    }

    /// Newline-joined UTF-8 strings stored as a U8 tensor.
    pub fn add_strings<S: AsRef<str>>(&mut self, name: &str, items: &[S]) {
        let joined = items.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join("\n");
        let bytes = joined.into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

// ── Output writers ────────────────────────────────────────────────────────────

/// Write a processed recording: `data` [C, T] F64, `sfreq`, `ch_names`,
/// `clip_start` and, when known, `onset_sec` / `offset_sec` and `chan_pos`
/// [C, 3] (NaN rows for channels without a position).
pub fn write_processed(rec: &ProcessedRecording, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("data", &rec.data);
    w.add_f64("sfreq", &[rec.sample_rate], &[1]);
    w.add_strings("ch_names", &rec.labels);
    w.add_i64("clip_start", &[rec.clip_start as i64], &[1]);
    if rec.positions.iter().any(Option::is_some) {
        let pos: Vec<f64> = rec
            .positions
            .iter()
            .flat_map(|p| p.unwrap_or([f64::NAN; 3]))
            .collect();
        w.add_f64("chan_pos", &pos, &[rec.positions.len(), 3]);
    }
    if let Some(t) = rec.events.onset_sec {
        w.add_f64("onset_sec", &[t], &[1]);
    }
    if let Some(t) = rec.events.offset_sec {
        w.add_f64("offset_sec", &[t], &[1]);
    }
    w.write(path)
}

/// Write window segments as `window_{i}` [C, len_i] F64 plus
/// `window_starts` [n] I64 (start sample in the unclipped recording).
pub fn write_segments<I>(segments: I, path: &Path) -> Result<usize>
where
    I: IntoIterator<Item = Segment>,
{
    let mut w = StWriter::new();
    let mut starts = vec![];
    for (i, seg) in segments.into_iter().enumerate() {
        w.add_f64_arr2(&format!("window_{i}"), &seg.data);
        starts.push(seg.start as i64);
    }
    w.add_i64("window_starts", &starts, &[starts.len()]);
    w.write(path)?;
    Ok(starts.len())
}
