use crate::cli::GroupArgs;
use crate::utils::{file_basename, Result};
use itertools::Itertools;
use rayon::{
    iter::{IntoParallelIterator, ParallelIterator},
    ThreadPoolBuilder,
};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

const CONFIG_NAME: &str = "tempspinein";
const OUTPUT_PREFIX: &str = "tempspineout";

/// Backbone fractions of one genome pair, as reported by spine.
#[derive(Debug, Clone, PartialEq)]
pub struct PairFraction {
    pub genomes: [String; 2],
    pub sizes: [f64; 2],
    pub backbone: f64,
}

impl PairFraction {
    /// Fraction of genome `index` covered by the shared backbone
    pub fn fraction(&self, index: usize) -> f64 {
        self.backbone / self.sizes[index]
    }
}

/// Reads genome names, sizes and the backbone length from a spine statistics table.
pub fn parse_statistics(text: &str) -> Result<PairFraction> {
    let mut genomes = Vec::new();
    let mut sizes = Vec::new();
    let mut backbone = None;

    for line in text.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        match line.chars().next() {
            Some(c) if c.is_ascii_digit() => {
                let (name, size) = match (fields.get(1), fields.get(2)) {
                    (Some(name), Some(size)) => (name, size),
                    _ => return Err(format!("Truncated genome line: {}", line)),
                };
                genomes.push(name.to_string());
                sizes.push(
                    size.trim()
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid genome size: '{}'", size))?,
                );
            }
            Some('-') => {
                let length = fields
                    .get(4)
                    .ok_or_else(|| format!("Truncated backbone line: {}", line))?;
                backbone = Some(
                    length
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid backbone length: '{}'", length))?,
                );
            }
            _ => {}
        }
    }

    let backbone = backbone.ok_or("No backbone line in spine statistics")?;
    if genomes.len() < 2 {
        return Err(format!(
            "Expected two genomes in spine statistics, found {}",
            genomes.len()
        ));
    }
    Ok(PairFraction {
        genomes: [genomes[0].clone(), genomes[1].clone()],
        sizes: [sizes[0], sizes[1]],
        backbone,
    })
}

/// Runs spine on one genome pair inside a fresh temporary directory.
fn run_spine(spine: &Path, first: &Path, second: &Path) -> Result<PairFraction> {
    let workdir = tempfile::tempdir().map_err(|e| format!("Failed to create temp dir: {}", e))?;
    let config_path = workdir.path().join(CONFIG_NAME);
    let config = [first, second]
        .iter()
        .map(|path| -> Result<String> {
            Ok(format!(
                "{}\t{}\tfasta",
                path.display(),
                file_basename(path)?
            ))
        })
        .collect::<Result<Vec<_>>>()?
        .join("\n");
    fs::write(&config_path, config)
        .map_err(|e| format!("Failed to write {}: {}", config_path.display(), e))?;

    log::debug!("Running pair {} - {}", first.display(), second.display());
    let status = Command::new(spine)
        .arg("-f")
        .arg(&config_path)
        .arg("-o")
        .arg(workdir.path().join(OUTPUT_PREFIX))
        .arg("-t")
        .arg("1")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| format!("Failed to run {}: {}", spine.display(), e))?;
    if !status.success() {
        log::warn!(
            "{} exited with {} for {} - {}",
            spine.display(),
            status,
            first.display(),
            second.display()
        );
    }

    let stats_path = workdir
        .path()
        .join(format!("{}.statistics.txt", OUTPUT_PREFIX));
    let text = fs::read_to_string(&stats_path)
        .map_err(|e| format!("Failed to read {}: {}", stats_path.display(), e))?;
    parse_statistics(&text)
}

/// Square matrix of backbone fractions; row `i`, column `j` is the fraction of genome `i`
/// shared with genome `j`.
pub fn fraction_matrix(count: usize, pairs: &[((usize, usize), PairFraction)]) -> Vec<Vec<f64>> {
    let mut matrix = vec![vec![1.0; count]; count];
    for ((i, j), pair) in pairs {
        matrix[*i][*j] = pair.fraction(0);
        matrix[*j][*i] = pair.fraction(1);
    }
    matrix
}

pub fn write_matrix<W: Write>(mut writer: W, names: &[String], matrix: &[Vec<f64>]) -> Result<()> {
    let write_err = |e: std::io::Error| format!("Failed to write matrix: {}", e);
    write!(writer, "\t").map_err(write_err)?;
    for name in names {
        write!(writer, "{}\t", name).map_err(write_err)?;
    }
    writeln!(writer).map_err(write_err)?;

    for (name, row) in names.iter().zip(matrix) {
        write!(writer, "{}\t", name).map_err(write_err)?;
        for value in row {
            write!(writer, "{}\t", value).map_err(write_err)?;
        }
        writeln!(writer).map_err(write_err)?;
    }
    writer.flush().map_err(write_err)
}

fn list_genomes(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(input_dir)
        .map_err(|e| format!("Failed to read {}: {}", input_dir.display(), e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| e.to_string())?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

pub fn group(args: GroupArgs) -> Result<()> {
    let genomes = list_genomes(&args.input_dir)?;
    if genomes.len() < 2 {
        return Err(format!(
            "Need at least two FASTA files in {}",
            args.input_dir.display()
        ));
    }
    let names = genomes
        .iter()
        .map(|path| file_basename(path))
        .collect::<Result<Vec<_>>>()?;

    let pairs = (0..genomes.len()).tuple_combinations().collect_vec();
    log::info!(
        "Comparing {} genome pairs on {} threads",
        pairs.len(),
        args.num_threads
    );

    let pool = ThreadPoolBuilder::new()
        .num_threads(args.num_threads)
        .thread_name(|i| format!("pamgrab-{}", i))
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))?;
    let fractions = pool.install(|| {
        pairs
            .into_par_iter()
            .map(|(i, j)| {
                run_spine(&args.spine_path, &genomes[i], &genomes[j]).map(|pair| ((i, j), pair))
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let matrix = fraction_matrix(genomes.len(), &fractions);
    let file = File::create(&args.output_path)
        .map_err(|e| format!("Failed to create {}: {}", args.output_path, e))?;
    write_matrix(BufWriter::new(file), &names, &matrix)?;
    log::info!("Matrix written to {}", args.output_path);
    Ok(())
}
