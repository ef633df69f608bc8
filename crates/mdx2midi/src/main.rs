//! mdx2midi binary

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use clap::Parser;
use log::{info, warn};
use mdx::errors::ExportError;
use mdx::interpreter::DEFAULT_MAX_LOOPS;
use mdx::{ConversionOptions, InstrumentMap, MdxHeader, Score};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

mod exit_code {
    pub const FILE_NOT_FOUND: i32 = 1;
    pub const FORMAT_ERROR: i32 = 2;
    pub const IO_ERROR: i32 = 3;
    pub const OTHER_ERROR: i32 = 4;
}

macro_rules! error {
    ($code:expr, $($arg:tt)*) => {{
        log::error!($($arg)*);
        std::process::exit($code);
    }};
}

#[derive(Parser)]
#[command(author, version)]
#[command(about = "X68000 MDX to MIDI converter")]
#[command(arg_required_else_help = true)]
struct ArgParser {
    #[arg(value_name = "MDX_FILE", help = "MDX file")]
    mdx_file: PathBuf,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "output MIDI file (default: MDX_FILE with a .mid extension)"
    )]
    output: Option<PathBuf>,

    #[arg(
        short = 'l',
        long,
        value_name = "LOOPS",
        default_value_t = DEFAULT_MAX_LOOPS,
        help = "maximum number of times a loop is played (0 = no repeats)"
    )]
    loops: u8,

    #[arg(short = 'v', long, help = "verbose logging")]
    verbose: bool,

    #[arg(short = 'f', long, help = "force mode (recover non-standard headers)")]
    force: bool,

    #[arg(long, help = "abort if any track cannot be converted")]
    strict: bool,

    #[arg(long, value_name = "JSON_FILE", help = "instrument mappings json file")]
    mappings: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "also write the decoded events as json")]
    json: Option<PathBuf>,
}

fn init_logger(verbose: bool) {
    let level = match verbose {
        true => "debug",
        false => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_mdx_file(path: &Path) -> Vec<u8> {
    match fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => error!(
            exit_code::FILE_NOT_FOUND,
            "File not found: {}",
            path.display()
        ),
        Err(e) => error!(
            exit_code::IO_ERROR,
            "Cannot read {}: {}",
            path.display(),
            e
        ),
    }
}

fn load_instrument_map(path: Option<PathBuf>) -> InstrumentMap {
    match path {
        Some(p) => match mdx::load_instrument_map(&p) {
            Ok(m) => m,
            Err(e) => error!(exit_code::OTHER_ERROR, "{}", e),
        },
        None => InstrumentMap::default(),
    }
}

fn parse_header(data: &[u8], force: bool) -> MdxHeader {
    match mdx::parse_header(data, force) {
        Ok(h) => h,
        Err(e) => error!(exit_code::FORMAT_ERROR, "MDX format error: {}", e),
    }
}

fn convert(
    data: &[u8],
    header: &MdxHeader,
    options: &ConversionOptions,
    instruments: &InstrumentMap,
) -> Score {
    match mdx::convert(data, &header.track_offsets, options, instruments) {
        Ok(s) => s,
        Err(e) => error!(exit_code::FORMAT_ERROR, "MDX format error: {}", e),
    }
}

fn create_parent_dir(path: &Path) {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            if let Err(e) = fs::create_dir_all(dir) {
                error!(
                    exit_code::IO_ERROR,
                    "Cannot create directory {}: {}",
                    dir.display(),
                    e
                );
            }
        }
    }
}

fn check_export(r: Result<(), ExportError>) {
    match r {
        Ok(()) => (),
        Err(e @ ExportError::WriteError(..)) => error!(exit_code::IO_ERROR, "{}", e),
        Err(e @ ExportError::SerdeError(..)) => error!(exit_code::OTHER_ERROR, "{}", e),
    }
}

fn main() {
    let args = ArgParser::parse();

    init_logger(args.verbose);

    let output = match args.output {
        Some(o) => o,
        None => args.mdx_file.with_extension("mid"),
    };

    let options = ConversionOptions {
        max_loops: args.loops,
        strict: args.strict,
    };

    let instruments = load_instrument_map(args.mappings);

    let data = load_mdx_file(&args.mdx_file);
    info!("Loaded {} ({} bytes)", args.mdx_file.display(), data.len());

    let header = parse_header(&data, args.force);
    let score = convert(&data, &header, &options, &instruments);

    let n_skipped = score.skipped_tracks().count();
    if n_skipped > 0 {
        warn!("{} of {} tracks skipped", n_skipped, score.tracks().len());
    }

    create_parent_dir(&output);
    check_export(mdx::export::save_smf(&score, &output));
    info!("Saved {}", output.display());

    if let Some(json) = args.json {
        create_parent_dir(&json);
        check_export(mdx::export::save_score_json(&score, &json));
        info!("Saved {}", json.display());
    }
}
