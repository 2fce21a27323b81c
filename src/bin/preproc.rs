use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use ieegprep::{preprocess, Coordinates, Montage, PipelineConfig, io::{load_recording, write_processed, write_segments}};

#[derive(Parser)]
#[command(name = "preproc", about = "iEEG preprocessing: label expansion, montage, event clip, windowing")]
struct Args {
    /// Raw signal (.safetensors with `data`, `sfreq`, optional `ch_names`)
    #[arg(long)]
    signal: PathBuf,

    /// JSON sidecar with channel tokens, annotations and metadata
    #[arg(long)]
    sidecar: PathBuf,

    /// Processed recording output path (.safetensors)
    #[arg(long)]
    output: PathBuf,

    /// Also write the streamed windows to this path
    #[arg(long)]
    windows: Option<PathBuf>,

    /// Contact positions as whitespace `label x y z` lines; replaces any
    /// `chan_pos` stored in the signal file
    #[arg(long)]
    coords: Option<PathBuf>,

    /// JSON pipeline config; command-line flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Montage: monopolar, average or bipolar
    #[arg(long)]
    montage: Option<Montage>,

    /// Window length in seconds
    #[arg(long)]
    window_sec: Option<f64>,

    /// Keep the full recording instead of clipping around the event
    #[arg(long)]
    no_clip: bool,

    /// Channel names to exclude (comma-separated)
    #[arg(long, default_value = "")]
    bad_channels: String,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(m) = args.montage {
        cfg.montage = m;
    }
    if let Some(w) = args.window_sec {
        cfg.window_sec = w;
    }
    if args.no_clip {
        cfg.clip = false;
    }
    if !args.bad_channels.is_empty() {
        cfg.bad_channels = args.bad_channels.split(',').map(str::to_string).collect();
    }

    let mut rec = load_recording(&args.signal, &args.sidecar)?;
    if let Some(path) = &args.coords {
        rec.coordinates = Coordinates::from_file(path)
            .with_context(|| format!("loading coordinates {}", path.display()))?;
    }
    println!("Loaded {} ch × {} samples @ {} Hz ({} label tokens, {} annotations)",
        rec.data.nrows(), rec.data.ncols(), rec.sample_rate,
        rec.raw_labels.len(), rec.annotations.len());

    let out = preprocess(&rec, &cfg)?;
    println!("{} montage: {} channels × {} samples, clip start {}",
        out.montage, out.data.nrows(), out.data.ncols(), out.clip_start);
    match (out.events.onset_sec, out.events.offset_sec) {
        (Some(on), Some(off)) => println!("Event: onset {on} s, offset {off} s"),
        (Some(on), None) => println!("Event: onset {on} s, no offset marker"),
        (None, _) => println!("Event: no onset marker"),
    }
    let placed = out.positions.iter().filter(|p| p.is_some()).count();
    if placed > 0 {
        println!("Positions for {placed}/{} channels", out.labels.len());
    }
    if !out.rejected_labels.is_empty() {
        println!("Rejected {} label token(s)", out.rejected_labels.len());
    }

    write_processed(&out, &args.output)?;
    println!("Written → {}", args.output.display());

    if let Some(path) = &args.windows {
        let n = write_segments(out.windows(cfg.window_sec)?, path)?;
        println!("Written {n} windows → {}", path.display());
    }

    println!("{}", serde_json::to_string_pretty(&out.clinical_summary())?);
    Ok(())
}
