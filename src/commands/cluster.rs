use crate::cli::ClusterArgs;
use crate::utils::{open_text_reader, GenomicRegion, Result};
use std::{
    collections::{BTreeMap, HashSet},
    fs::File,
    io::{self, BufRead, BufWriter, Write},
};

/// Query span of one tabular BLAST hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageHit {
    pub query_id: String,
    pub subject_id: String,
    pub percent_identity: f64,
    pub query_start: u64,
    pub query_end: u64,
}

impl CoverageHit {
    pub fn from_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() < 8 {
            return Err(format!(
                "Expected at least 8 tab-separated fields, found {}",
                fields.len()
            ));
        }
        let parse_coord = |index: usize| {
            fields[index]
                .parse::<u64>()
                .map_err(|_| format!("Invalid coordinate: '{}'", fields[index]))
        };
        let percent_identity = fields[2]
            .parse::<f64>()
            .map_err(|_| format!("Invalid percent identity: '{}'", fields[2]))?;
        let (start, end) = (parse_coord(6)?, parse_coord(7)?);

        Ok(Self {
            query_id: fields[0].to_string(),
            subject_id: fields[1].to_string(),
            percent_identity,
            query_start: start.min(end),
            query_end: start.max(end),
        })
    }
}

/// Regions of each query covered by alignments to a large enough share of the other genomes.
///
/// `n` is the number of distinct queries among the retained hits. A position of a query is kept
/// when `(coverage + 1) / n >= min_fraction`, the query itself supplying the extra count.
/// Kept positions farther apart than `max_gap` start a new region.
pub fn conserved_regions(
    hits: &[CoverageHit],
    min_identity: f64,
    max_gap: u64,
    min_fraction: f64,
) -> Vec<GenomicRegion> {
    let kept: Vec<&CoverageHit> = hits
        .iter()
        .filter(|hit| hit.percent_identity > min_identity)
        .collect();
    let query_count = kept
        .iter()
        .map(|hit| hit.query_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let mut coverage: BTreeMap<&str, BTreeMap<u64, usize>> = BTreeMap::new();
    for hit in &kept {
        let query_coverage = coverage.entry(hit.query_id.as_str()).or_default();
        if hit.subject_id == hit.query_id {
            continue;
        }
        for pos in hit.query_start..=hit.query_end {
            *query_coverage.entry(pos).or_default() += 1;
        }
    }

    let mut regions = Vec::new();
    for (query, positions) in coverage {
        let covered = positions
            .into_iter()
            .filter(|&(_, depth)| (depth + 1) as f64 / query_count as f64 >= min_fraction)
            .map(|(pos, _)| pos);
        regions.extend(split_on_gaps(query, covered, max_gap));
    }
    regions
}

fn split_on_gaps(
    query: &str,
    positions: impl Iterator<Item = u64>,
    max_gap: u64,
) -> Vec<GenomicRegion> {
    let mut regions = Vec::new();
    let mut current: Option<(u64, u64)> = None;
    for pos in positions {
        current = match current {
            Some((start, end)) if pos - end > max_gap => {
                regions.push((start, end));
                Some((pos, pos))
            }
            Some((start, _)) => Some((start, pos)),
            None => Some((pos, pos)),
        };
    }
    regions.extend(current);
    regions
        .into_iter()
        .filter_map(|(start, end)| GenomicRegion::new(query, start, end).ok())
        .collect()
}

pub fn cluster(args: ClusterArgs) -> Result<()> {
    let reader = open_text_reader(&args.input_path)?;
    let mut hits = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("Error at BLAST line {}: {}", index + 1, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let hit = CoverageHit::from_line(&line)
            .map_err(|e| format!("Error at BLAST line {}: {}", index + 1, e))?;
        hits.push(hit);
    }
    log::info!("Loaded {} alignments", hits.len());

    let regions = conserved_regions(&hits, args.min_identity, args.max_gap, args.min_fraction);
    log::info!("Found {} conserved regions", regions.len());

    let mut writer: Box<dyn Write> = match &args.output_path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).map_err(|e| format!("Failed to create {}: {}", path, e))?,
        )),
        None => Box::new(io::stdout()),
    };
    for region in &regions {
        writeln!(writer, "{}", region).map_err(|e| format!("Write failed: {}", e))?;
    }
    writer.flush().map_err(|e| format!("Write failed: {}", e))
}
