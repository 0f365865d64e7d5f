//! Writers for the per-record outputs of an extraction run and the run-wide summary.

use super::{
    classify::{Classification, HitClass, SkipReason},
    engine::{HitReport, SENTINEL},
    record::AlignmentRecord,
};
use crate::utils::{create_writer, mean, median, OutputPaths, Result};
use itertools::Itertools;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

const MISSING: &str = "NA";

/// Structure for writing the filtered, annotated and console outputs of one run.
pub struct HitWriter<W: Write = Box<dyn Write>> {
    /// Receives records selected by the distance filter, verbatim
    filtered: W,
    /// Receives every processed record with its extraction columns appended
    annotated: W,
    /// Receives one diagnostic line per usable record
    console: W,
}

impl<W: Write> HitWriter<W> {
    pub fn new(filtered: W, annotated: W, console: W) -> Self {
        Self {
            filtered,
            annotated,
            console,
        }
    }

    /// Writes all outputs for a single processed record.
    ///
    /// # Arguments
    /// * `line` - The alignment line as it appeared in the input.
    /// * `record` - The parsed alignment record.
    /// * `spacer` - The catalog sequence of the record's spacer.
    /// * `report` - The outcome of processing the record.
    pub fn write(
        &mut self,
        line: &str,
        record: &AlignmentRecord,
        spacer: &str,
        report: &HitReport,
    ) -> Result<()> {
        if report.filtered {
            writeln!(self.filtered, "{}", line).map_err(|e| format!("Write failed: {}", e))?;
        }

        writeln!(self.annotated, "{}", annotated_line(line, spacer, report))
            .map_err(|e| format!("Write failed: {}", e))?;

        if let (Classification::Hit(_), Some(target)) = (&report.classification, &report.target) {
            writeln!(
                self.console,
                "{}",
                [
                    record.subject_id.as_str(),
                    target.as_str(),
                    report.five_prime_flank.as_deref().unwrap_or(""),
                    report.motif_pair.as_deref().unwrap_or(""),
                    report.three_prime_flank.as_deref().unwrap_or(""),
                    record.btop.as_str(),
                    report.distance.to_string().as_str(),
                ]
                .iter()
                .join("\t")
            )
            .map_err(|e| format!("Write failed: {}", e))?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        for writer in [&mut self.filtered, &mut self.annotated, &mut self.console] {
            writer
                .flush()
                .map_err(|e| format!("Failed to flush output: {}", e))?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> (W, W, W) {
        (self.filtered, self.annotated, self.console)
    }
}

impl HitWriter {
    /// Opens `<name>.filt.aln` and `<name>.extra.aln` under the run directory; console lines
    /// go to stdout.
    pub fn from_paths(paths: &OutputPaths) -> Result<Self> {
        let prefix = paths.prefix();
        let filtered = create_writer(&prefix, "filt.aln", open_file)?;
        let annotated = create_writer(&prefix, "extra.aln", open_file)?;
        Ok(Self::new(filtered, annotated, Box::new(io::stdout())))
    }
}

fn open_file(path: &Path) -> Result<Box<dyn Write>> {
    let file = File::create(path)
        .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn annotated_line(line: &str, spacer: &str, report: &HitReport) -> String {
    let identity = report
        .identity
        .map_or_else(|| MISSING.to_string(), |pid| format!("{:.4}", pid));
    [
        line,
        spacer,
        report.target.as_deref().unwrap_or(SENTINEL),
        identity.as_str(),
        report.five_prime_flank.as_deref().unwrap_or(MISSING),
        report.three_prime_flank.as_deref().unwrap_or(MISSING),
    ]
    .iter()
    .join("\t")
}

/// Run-wide counters folded from every processed record.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub total_records: usize,
    pub unparseable: usize,
    pub catalog_misses: usize,
    pub class_counts: BTreeMap<HitClass, usize>,
    pub cc_motifs: BTreeMap<HitClass, usize>,
    pub filtered: usize,
    pub malformed: usize,
    pub high_evalue: usize,
    pub unclassified: usize,
    /// Identities of recovered spacer ends keyed by the number of recovered bases
    pub extension_identity: BTreeMap<usize, Vec<f64>>,
}

/// Aggregate identity of all recovered ends of one length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtensionStats {
    pub len: usize,
    pub mean: f64,
    pub median: f64,
    pub count: usize,
}

impl RunSummary {
    pub fn add(&mut self, report: &HitReport) {
        match &report.classification {
            Classification::Hit(class) => {
                *self.class_counts.entry(*class).or_default() += 1;
                if report.cc_motif {
                    *self.cc_motifs.entry(*class).or_default() += 1;
                }
            }
            Classification::Skipped(SkipReason::MalformedBtop(_)) => self.malformed += 1,
            Classification::Skipped(SkipReason::HighEvalue) => self.high_evalue += 1,
            Classification::Skipped(SkipReason::Unclassified) => self.unclassified += 1,
        }
        if report.filtered {
            self.filtered += 1;
        }
        for extension in &report.extensions {
            self.extension_identity
                .entry(extension.len)
                .or_default()
                .push(extension.identity);
        }
    }

    pub fn total_cc_motifs(&self) -> usize {
        self.cc_motifs.values().sum()
    }

    pub fn extension_stats(&self) -> Vec<ExtensionStats> {
        self.extension_identity
            .iter()
            .filter_map(|(&len, identities)| {
                Some(ExtensionStats {
                    len,
                    mean: mean(identities)?,
                    median: median(identities)?,
                    count: identities.len(),
                })
            })
            .collect()
    }

    /// Mean identity over every recovered end regardless of length
    pub fn overall_extension_identity(&self) -> Option<f64> {
        let all = self
            .extension_identity
            .values()
            .flatten()
            .copied()
            .collect_vec();
        mean(&all)
    }

    pub fn write_extension_table<W: Write>(&self, mut writer: W) -> Result<()> {
        let write_err = |e: io::Error| format!("Failed to write extension table: {}", e);
        writeln!(writer, "extension_length\tmean_identity\tmedian_identity\tcount")
            .map_err(write_err)?;
        for stats in self.extension_stats() {
            writeln!(
                writer,
                "{}\t{:.4}\t{:.4}\t{}",
                stats.len, stats.mean, stats.median, stats.count
            )
            .map_err(write_err)?;
        }
        writer.flush().map_err(write_err)
    }

    pub fn log(&self) {
        log::info!(
            "Processed {} alignment records ({} unparseable, {} without catalog spacer)",
            self.total_records,
            self.unparseable,
            self.catalog_misses
        );
        for class in HitClass::ALL {
            log::info!(
                "{}: records={}, CC motifs={}",
                class,
                self.class_counts.get(&class).copied().unwrap_or(0),
                self.cc_motifs.get(&class).copied().unwrap_or(0)
            );
        }
        log::info!(
            "Skipped: malformed={}, high_evalue={}, unclassified={}",
            self.malformed,
            self.high_evalue,
            self.unclassified
        );
        log::info!(
            "Total CC motifs: {}; filtered records: {}",
            self.total_cc_motifs(),
            self.filtered
        );
        if let Some(identity) = self.overall_extension_identity() {
            log::info!("Mean identity of recovered spacer ends: {:.4}", identity);
        }
    }
}
