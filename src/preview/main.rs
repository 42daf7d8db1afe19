// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("camera2-preview requires the 'std' feature");

use asimov_module::SysexitsError::{self, *};
use camera2_bridge::{
    cli,
    shared::{
        CameraError, CameraSession, DistortionModel, SessionConfig,
        drivers::synthetic::SyntheticConfig, open_platform,
    },
};
use clap::Parser;
use clientele::StandardOptions;
use serde_json::json;
use std::{
    error::Error as StdError,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    /// Camera platform to use
    #[arg(long, default_value = "synthetic")]
    platform: String,

    /// Preview texture size
    #[arg(short, long = "size", value_parser = cli::parse_dimensions, default_value = "1280x720")]
    size: (u32, u32),

    /// Capture rate of the synthetic camera
    #[arg(short, long, value_parser = cli::parse_frequency, default_value = "30")]
    frequency: f64,

    /// Stop after this many seconds (default: until Ctrl-C)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Drop new frames while this many are in flight
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// How five-element distortion arrays are read
    #[arg(long, value_enum, default_value = "radial-five-term")]
    distortion_model: DistortionModelArg,

    /// Directory characteristics dumps are saved under
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Write the final texture contents to this PNG file
    #[arg(long)]
    snapshot: Option<PathBuf>,

    #[arg(
        value_name = "FORMAT",
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text"
    )]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum DistortionModelArg {
    RadialFiveTerm,
    BrownConrady,
}

impl From<DistortionModelArg> for DistortionModel {
    fn from(arg: DistortionModelArg) -> Self {
        match arg {
            DistortionModelArg::RadialFiveTerm => DistortionModel::RadialFiveTerm,
            DistortionModelArg::BrownConrady => DistortionModel::BrownConrady,
        }
    }
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Jsonl,
}

pub fn main() -> Result<SysexitsError, Box<dyn StdError>> {
    asimov_module::dotenv().ok();
    let args = asimov_module::args_os()?;
    let options = Options::parse_from(args);

    if options.flags.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(EX_OK);
    }

    if options.flags.license {
        print!("{}", include_str!("../../UNLICENSE"));
        return Ok(EX_OK);
    }

    #[cfg(feature = "tracing")]
    asimov_module::init_tracing_subscriber(&options.flags).expect("failed to initialize logging");

    let exit_code = match run_preview(&options) {
        Ok(()) => EX_OK,
        Err(err) => cli::handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

fn run_preview(opts: &Options) -> Result<(), CameraError> {
    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit2 = Arc::clone(&quit);
        ctrlc::set_handler(move || {
            quit2.store(true, Ordering::SeqCst);
        })
        .map_err(|e| CameraError::other(format!("{e}")))?;
    }

    let (width, height) = opts.size;
    let mut synthetic = SyntheticConfig::default()
        .with_frame_size(width, height)
        .with_fps(opts.frequency);
    if let Some(dir) = &opts.dump_dir {
        synthetic = synthetic.with_dump_dir(dir);
    }
    let platform = open_platform(&opts.platform, synthetic)?;

    let mut config = SessionConfig::new(width, height)
        .with_distortion_model(opts.distortion_model.into())
        .with_diagnostics(opts.flags.debug || opts.flags.verbose >= 3);
    if let Some(n) = opts.max_in_flight {
        config = config.with_max_in_flight(n);
    }
    let session = CameraSession::new(platform, config)?;

    cli::info_user(&opts.flags, "starting camera preview");
    match session.start_preview() {
        Err(err) if err.is_retryable() => {
            cli::warn_user(&opts.flags, "camera permission requested, retrying");
            session.start_preview()?;
        },
        other => other?,
    }

    let started = Instant::now();
    let deadline = opts.duration.map(|s| started + Duration::from_secs_f64(s.max(0.0)));
    let mut last_report = started;
    while !quit.load(Ordering::SeqCst) && deadline.is_none_or(|d| Instant::now() < d) {
        std::thread::sleep(Duration::from_millis(50));
        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            if matches!(opts.output, OutputFormat::Jsonl) {
                print_stats(&session, started.elapsed());
            }
        }
    }

    session.wait_idle(Duration::from_secs(2));
    if let Some(path) = &opts.snapshot {
        write_snapshot(&session, path)?;
        cli::info_user(&opts.flags, &format!("snapshot written to {}", path.display()));
    }

    print_report(opts, &session);
    session.stop_preview();
    Ok(())
}

fn write_snapshot(session: &CameraSession, path: &Path) -> Result<(), CameraError> {
    let image = session
        .texture()
        .and_then(|t| t.to_rgba_image())
        .ok_or(CameraError::NotActive)?;
    image
        .save(path)
        .map_err(|e| CameraError::driver("writing snapshot", e))
}

fn print_stats(session: &CameraSession, elapsed: Duration) {
    let s = session.stats();
    println!(
        "{}",
        json!({
            "elapsed": elapsed.as_secs_f64(),
            "uploaded": s.uploaded,
            "rejected": s.rejected,
            "dropped_stale": s.dropped_stale,
            "dropped_backpressure": s.dropped_backpressure,
            "in_flight": s.in_flight(),
        })
    );
}

fn print_report(opts: &Options, session: &CameraSession) {
    let k = session.intrinsics();
    let raw = session.distortion_raw();
    let canonical = session.distortion_canonical();
    let original = session.original_resolution();
    let dump = session.characteristics(false);
    let s = session.stats();

    match opts.output {
        OutputFormat::Text => {
            println!("platform: {}", session.platform().name());
            println!(
                "intrinsics: fx={} fy={} cx={} cy={} skew={} calib={}",
                k.fx, k.fy, k.cx, k.cy, k.skew, k.calib
            );
            println!("distortion (raw): {raw:?}");
            println!(
                "distortion (canonical, {}): {canonical:?}",
                session.config().distortion_model
            );
            println!("original resolution: {original}");
            if !dump.file_path.as_os_str().is_empty() {
                println!("characteristics: {}", dump.file_path.display());
            }
            println!(
                "frames: uploaded={} rejected={} dropped={}",
                s.uploaded,
                s.rejected,
                s.dropped_stale + s.dropped_backpressure
            );
        },
        OutputFormat::Jsonl => {
            println!(
                "{}",
                json!({
                    "platform": session.platform().name(),
                    "intrinsics": {
                        "fx": k.fx, "fy": k.fy, "cx": k.cx, "cy": k.cy, "skew": k.skew,
                        "calib": { "width": k.calib.width, "height": k.calib.height },
                    },
                    "distortion": { "raw": raw, "canonical": canonical },
                    "original_resolution": { "width": original.width, "height": original.height },
                    "characteristics_path": dump.file_path.display().to_string(),
                    "frames": {
                        "uploaded": s.uploaded,
                        "rejected": s.rejected,
                        "dropped_stale": s.dropped_stale,
                        "dropped_backpressure": s.dropped_backpressure,
                    },
                })
            );
        },
    }
}
