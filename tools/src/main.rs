use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glob::Pattern;
use mpnet_tools::{decode_capture, format_pretty, CaptureReport};
use wire::Limits;

#[derive(Parser)]
#[command(name = "mpnet-tools", version, about = "mpnet capture inspection tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a capture file (or a directory of them).
    Inspect {
        /// Capture file or directory.
        path: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
        /// Filename filter when inspecting a directory.
        #[arg(long)]
        glob: Option<String>,
        /// Maximum frame payload size to accept.
        #[arg(long, default_value_t = Limits::default().max_frame_bytes)]
        max_frame_bytes: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Pretty,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Inspect {
            path,
            format,
            glob,
            max_frame_bytes,
        } => {
            let limits = Limits {
                max_frame_bytes,
                ..Limits::default()
            };
            if path.is_dir() {
                for file in collect_captures(&path, glob.as_deref())? {
                    println!("== {} ==", file.display());
                    inspect_file(&file, format, &limits)?;
                }
            } else {
                inspect_file(&path, format, &limits)?;
            }
        }
    }
    Ok(())
}

fn inspect_file(path: &Path, format: Format, limits: &Limits) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("read capture {}", path.display()))?;
    let report = decode_capture(&bytes, limits);
    print_report(&report, format)
}

fn print_report(report: &CaptureReport, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let json = serde_json::to_string_pretty(report).context("serialize json")?;
            println!("{json}");
        }
        Format::Pretty => print!("{}", format_pretty(report)),
    }
    Ok(())
}

fn collect_captures(dir: &Path, glob: Option<&str>) -> Result<Vec<PathBuf>> {
    let pattern = glob
        .map(|value| Pattern::new(value).context("invalid glob pattern"))
        .transpose()?;

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(pattern) = &pattern {
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.matches(name));
            if !matches {
                continue;
            }
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}
