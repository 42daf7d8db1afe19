// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("camera2-characteristics requires the 'std' feature");

use asimov_module::SysexitsError::{self, *};
use camera2_bridge::{
    cli,
    shared::{
        CameraError, CameraPlatform,
        drivers::synthetic::{SyntheticConfig, SyntheticPlatform},
    },
};
use clap::Parser;
use clientele::StandardOptions;
use serde_json::json;
use std::{error::Error as StdError, path::PathBuf};

#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    /// Save the dump under `<DIR>/Camera2/`
    #[arg(long, value_name = "DIR")]
    dump_dir: Option<PathBuf>,

    /// Only list cameras
    #[arg(short, long)]
    list: bool,

    #[arg(
        value_name = "FORMAT",
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text"
    )]
    output: OutputFormat,
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

    let exit_code = match run_characteristics(&options) {
        Ok(()) => EX_OK,
        Err(err) => cli::handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

fn run_characteristics(options: &Options) -> Result<(), CameraError> {
    let mut config = SyntheticConfig::default();
    if let Some(dir) = &options.dump_dir {
        config = config.with_dump_dir(dir);
    }
    let platform = SyntheticPlatform::new(config);

    if platform.cameras().is_empty() {
        cli::warn_user(&options.flags, "no cameras found");
        return Err(CameraError::NoCamera);
    }

    let selected = platform.selected_camera()?;
    for camera in platform.cameras() {
        let is_selected = camera.id == selected.id;
        match options.output {
            OutputFormat::Text => {
                let marker = if is_selected { " [selected]" } else { "" };
                println!("{}: {}{marker}", camera.id, camera.facing);
            },
            OutputFormat::Jsonl => {
                println!(
                    "{}",
                    json!({
                        "id": camera.id,
                        "facing": camera.facing.to_string(),
                        "selected": is_selected,
                    })
                );
            },
        }
    }

    if options.list {
        return Ok(());
    }

    cli::info_user(&options.flags, &format!("dumping characteristics of camera {}", selected.id));
    let dump = platform.dump_characteristics()?;
    match options.output {
        OutputFormat::Text => {
            if !dump.file_path.as_os_str().is_empty() {
                println!("saved: {}", dump.file_path.display());
            }
            println!("{}", dump.json);
        },
        OutputFormat::Jsonl => {
            println!(
                "{}",
                json!({
                    "path": dump.file_path.display().to_string(),
                    "characteristics": dump.parse()?,
                })
            );
        },
    }

    Ok(())
}
