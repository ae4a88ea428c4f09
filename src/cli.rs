use crate::{
    ld::{haplotype::DEFAULT_MAX_CANDIDATES, Linkage},
    utils::Result,
};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::{Level, LevelFilter};
use owo_colors::{
    colors::{Blue, Green, Magenta, Red, Yellow},
    OwoColorize, Stream, Style,
};
use std::{io::Write, path::PathBuf};

pub const FULL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_HLADB: &str = "3.25.0";

#[derive(Parser)]
#[command(name="hlald",
          version=FULL_VERSION,
          long_about = None,
          disable_help_subcommand = true,
          after_help = "This program comes with ABSOLUTELY NO WARRANTY; it is intended for
Research Use Only and not for use in diagnostic procedures.",
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    /// Enable or disable color output in logging
    #[arg(long, value_enum, default_value_t = Color::Auto, global = true, help_heading = "Advanced")]
    color: Color,

    /// Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true
    )]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "HLA Linkage Disequilibrium Detector")]
    Analyze(AnalyzeArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Analyze(_) => "analyze",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(arg_required_else_help(true))]
pub struct AnalyzeArgs {
    /// File with one GL String per line, optionally preceded by an id and a tab
    #[arg(
        short = 'i',
        long = "input",
        value_name = "GLSTRINGS",
        value_parser = check_file_exists,
        required = true
    )]
    pub input_path: PathBuf,

    /// Haplotype frequency files, one locus group per file
    #[arg(
        short = 'q',
        long = "frequencies",
        value_name = "FREQUENCIES",
        value_parser = check_file_exists,
        num_args = 1..,
        required = true
    )]
    pub frequency_paths: Vec<PathBuf>,

    /// List of common, well documented alleles
    #[arg(
        short = 'l',
        long = "cwd-alleles",
        value_name = "CWD",
        value_parser = check_file_exists
    )]
    pub cwd_path: Option<PathBuf>,

    /// Restrict the search to these linkages (e.g., C~B,DRB1~DQB1)
    #[arg(
        long = "linkage",
        value_name = "LINKAGE",
        value_delimiter = ',',
        num_args = 1..
    )]
    pub linkages: Vec<Linkage>,

    /// Output TSV report (stdout if omitted)
    #[arg(
        short = 'o',
        long = "output",
        value_name = "OUTPUT",
        value_parser = check_output_path
    )]
    pub output_path: Option<PathBuf>,

    /// HLA database version reported with every finding
    #[arg(long = "hladb", value_name = "VERSION", default_value = DEFAULT_HLADB)]
    pub hladb: String,

    /// Only report genotypes with a linkage that found no pair
    #[arg(short = 'w', long = "warnings-only")]
    pub warnings_only: bool,

    /// Number of threads
    #[arg(
        short = 't',
        long = "threads",
        value_name = "THREADS",
        default_value = "1",
        value_parser = threads_in_range
    )]
    pub num_threads: usize,

    /// Maximum number of candidate haplotypes enumerated per linkage
    #[arg(
        long = "max-candidates",
        value_name = "COUNT",
        default_value_t = DEFAULT_MAX_CANDIDATES,
        value_parser = candidates_in_range,
        help_heading = "Advanced"
    )]
    pub max_candidates: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Color {
    Always,
    Auto,
    Never,
}

impl Color {
    fn apply(self) {
        match self {
            Color::Always => owo_colors::set_override(true),
            Color::Auto => {}
            Color::Never => owo_colors::set_override(false),
        }
    }
}

pub fn init_verbose(args: &Cli) {
    args.color.apply();
    env_logger::Builder::from_default_env()
        .format(format_log)
        .filter_level(verbosity_filter(args.verbosity))
        .init();
}

fn verbosity_filter(verbosity: u8) -> LevelFilter {
    [LevelFilter::Warn, LevelFilter::Info, LevelFilter::Debug]
        .get(verbosity as usize)
        .copied()
        .unwrap_or(LevelFilter::Trace)
}

fn level_label(level: Level) -> (&'static str, Style) {
    let style = Style::new();
    match level {
        Level::Error => ("ERROR", style.fg::<Red>().bold()),
        Level::Warn => ("WARN", style.fg::<Yellow>()),
        Level::Info => ("INFO", style.fg::<Green>()),
        Level::Debug => ("DEBUG", style.fg::<Blue>()),
        Level::Trace => ("TRACE", style.fg::<Magenta>()),
    }
}

/// `<timestamp> [LEVEL] <thread>: <message>`, the thread naming the pipeline
/// stage (`reader`, `writer`, `hlald-N`) that logged.
fn format_log(buf: &mut env_logger::fmt::Formatter, record: &log::Record) -> std::io::Result<()> {
    let (label, style) = level_label(record.level());
    let label = label.if_supports_color(Stream::Stderr, |t| style.style(t));
    let thread = std::thread::current();
    writeln!(
        buf,
        "{} [{}] {}: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        label,
        thread.name().unwrap_or("main"),
        record.args()
    )
}

/// The report's directory must already exist; the file itself is created.
fn check_output_path(s: &str) -> Result<PathBuf> {
    let path = PathBuf::from(s);
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
            Err(format!("Output directory does not exist: {}", dir.display()))
        }
        _ => Ok(path),
    }
}

fn parse_positive(s: &str, what: &str) -> Result<usize> {
    match s.parse::<usize>() {
        Ok(0) => Err(format!("{} must be at least 1", what)),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("`{}` is not a valid {}", s, what.to_lowercase())),
    }
}

fn threads_in_range(s: &str) -> Result<usize> {
    parse_positive(s, "Thread count")
}

fn candidates_in_range(s: &str) -> Result<usize> {
    parse_positive(s, "Candidate limit")
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = PathBuf::from(s);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("Input file not found: {}", path.display()))
    }
}
