use crate::utils::Result;
use chrono::Datelike;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser)]
#[command(name="pamgrab",
          version=&**FULL_VERSION,
          long_about = None,
          disable_help_subcommand = true,
          after_help = format!("Copyright (C) 2016-{}     pamgrab developers
This program comes with ABSOLUTELY NO WARRANTY.", chrono::Utc::now().year()),
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Protospacer and PAM extraction from spacer alignments")]
    Extract(ExtractArgs),
    #[clap(about = "Conserved query regions from an all-vs-all BLAST table")]
    Cluster(ClusterArgs),
    #[clap(about = "Pairwise backbone fractions between genomes")]
    Group(GroupArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("source").required(true).multiple(true).args(["db", "genome_path"])))]
#[command(arg_required_else_help(true))]
pub struct ExtractArgs {
    #[clap(required = true)]
    #[clap(short = 's')]
    #[clap(long = "spacers")]
    #[clap(help = "FASTA file with spacer sequences")]
    #[clap(value_name = "SPACERS")]
    #[arg(value_parser = check_file_exists)]
    pub spacers_path: PathBuf,

    #[clap(short = 'd')]
    #[clap(long = "db")]
    #[clap(help = "BLAST nucleotide database the spacers are aligned against")]
    #[clap(value_name = "DB")]
    pub db: Option<PathBuf>,

    #[clap(short = 'g')]
    #[clap(long = "genome")]
    #[clap(help = "Indexed FASTA to fetch windows from instead of the BLAST database")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub genome_path: Option<PathBuf>,

    #[clap(short = 'a')]
    #[clap(long = "alignments")]
    #[clap(help = "Precomputed tabular alignments (outfmt 6 with qlen, slen and btop); blastn is run when omitted")]
    #[clap(value_name = "ALIGNMENTS")]
    #[arg(value_parser = check_file_exists)]
    pub alignments_path: Option<PathBuf>,

    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(help = "Output directory [default: <db>_vs_<spacers>.dir]")]
    #[clap(value_name = "OUTPUT_DIR")]
    #[arg(value_parser = check_prefix_path)]
    pub output_dir: Option<String>,

    #[clap(long = "max-distance")]
    #[clap(value_name = "MAX_DISTANCE")]
    #[clap(help = "Records whose protospacer differs from the spacer at more positions are filtered")]
    #[clap(default_value = "4")]
    pub max_distance: usize,

    #[clap(long = "max-evalue")]
    #[clap(value_name = "EVALUE")]
    #[clap(help = "E-value cutoff for partial alignments and blastn")]
    #[clap(default_value = "0.1")]
    #[arg(value_parser = ensure_positive_float)]
    pub max_evalue: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "blastn")]
    #[clap(value_name = "BLASTN")]
    #[clap(help = "blastn binary path")]
    #[clap(default_value = "blastn")]
    pub blastn_path: PathBuf,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "blastdbcmd")]
    #[clap(value_name = "BLASTDBCMD")]
    #[clap(help = "blastdbcmd binary path")]
    #[clap(default_value = "blastdbcmd")]
    pub blastdbcmd_path: PathBuf,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("cluster")))]
#[command(arg_required_else_help(true))]
pub struct ClusterArgs {
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(help = "All-vs-all BLAST table (outfmt 6)")]
    #[clap(value_name = "BLAST")]
    #[arg(value_parser = check_file_exists)]
    pub input_path: PathBuf,

    #[clap(required = true)]
    #[clap(long = "min-identity")]
    #[clap(value_name = "PIDENT")]
    #[clap(help = "Alignments must exceed this percent identity")]
    #[arg(value_parser = ensure_percentage)]
    pub min_identity: f64,

    #[clap(required = true)]
    #[clap(long = "max-gap")]
    #[clap(value_name = "MAX_GAP")]
    #[clap(help = "Largest distance between covered positions within one region")]
    pub max_gap: u64,

    #[clap(long = "min-fraction")]
    #[clap(value_name = "FRACTION")]
    #[clap(help = "Fraction of genomes that must cover a position")]
    #[clap(default_value = "1.0")]
    #[arg(value_parser = ensure_unit_float)]
    pub min_fraction: f64,

    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Output path [default: stdout]")]
    #[clap(value_name = "OUTPUT")]
    #[arg(value_parser = check_prefix_path)]
    pub output_path: Option<String>,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("group")))]
#[command(arg_required_else_help(true))]
pub struct GroupArgs {
    #[clap(required = true)]
    #[clap(help = "Directory containing FASTA files to compare")]
    #[clap(value_name = "INPUT_DIR")]
    #[arg(value_parser = check_dir_exists)]
    pub input_dir: PathBuf,

    #[clap(short = 's')]
    #[clap(long = "spine")]
    #[clap(help = "spine binary path")]
    #[clap(value_name = "SPINE")]
    #[clap(default_value = "spine")]
    pub spine_path: PathBuf,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Output path")]
    #[clap(value_name = "OUTPUT")]
    #[clap(default_value = "genome_grouper_output.txt")]
    #[arg(value_parser = check_prefix_path)]
    pub output_path: String,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<String> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(s.to_string())
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn check_dir_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.is_dir() {
        Err(format!("Directory does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn ensure_unit_float(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "The value must be between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}

fn ensure_percentage(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=100.0).contains(&value) {
        Err(format!(
            "The value must be between 0 and 100, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}

fn ensure_positive_float(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(format!("The value must be positive, got: {}", value))
    }
}
