use super::{
    btop::Btop,
    catalog::SpacerCatalog,
    classify::{classify_record, Classification, HitClass, SkipReason},
    coords::{FetchWindow, Overhang},
    distance::{hamming, percent_identity},
    emit::{HitWriter, RunSummary},
    fetch::{FetchedWindow, WindowFetcher},
    gaps::reconstruct,
    record::{AlignmentRecord, RecordLine},
};
use crate::utils::Result;
use crossbeam_channel::Receiver;
use std::io::Write;

/// Placeholder target for records whose window could not be reconciled with the spacer
pub const SENTINEL: &str = "DOES NOT MEET CONDITION";

#[derive(Debug, Clone)]
pub struct Params {
    /// Records whose target differs from the spacer at more positions are written out
    pub max_distance: usize,
    /// Partial hits need an e-value strictly below this to be extended
    pub max_evalue: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_distance: 4,
            max_evalue: 0.1,
        }
    }
}

/// Identity of one recovered spacer end that the aligner left unaligned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtensionIdentity {
    pub len: usize,
    pub identity: f64,
}

/// Outcome of processing one alignment record.
#[derive(Debug, Clone, PartialEq)]
pub struct HitReport {
    pub classification: Classification,
    /// Protospacer without the motif margins (gapped for gapped hits); `None` if unusable
    pub target: Option<String>,
    pub distance: usize,
    pub identity: Option<f64>,
    pub five_prime_flank: Option<String>,
    pub three_prime_flank: Option<String>,
    pub motif_pair: Option<String>,
    pub cc_motif: bool,
    pub extensions: Vec<ExtensionIdentity>,
    pub filtered: bool,
}

impl HitReport {
    fn unusable(classification: Classification, spacer: &str) -> Self {
        Self {
            classification,
            target: None,
            distance: hamming(SENTINEL, spacer),
            identity: None,
            five_prime_flank: None,
            three_prime_flank: None,
            motif_pair: None,
            cc_motif: false,
            extensions: Vec::new(),
            filtered: false,
        }
    }

    fn usable(class: HitClass, window: &FetchedWindow, target: &str, spacer: &str) -> Self {
        let three_prime_flank = match window.margins.three_prime {
            0 => None,
            _ => Some(window.three_prime_flank().to_string()),
        };
        Self {
            classification: Classification::Hit(class),
            target: Some(target.to_string()),
            distance: hamming(target, spacer),
            identity: percent_identity(target, spacer).ok(),
            five_prime_flank: Some(window.five_prime_flank().to_string()),
            three_prime_flank,
            motif_pair: Some(window.motif_pair().to_string()),
            cc_motif: window.has_cc_motif(),
            extensions: Vec::new(),
            filtered: false,
        }
    }

    pub fn class(&self) -> Option<HitClass> {
        match self.classification {
            Classification::Hit(class) => Some(class),
            Classification::Skipped(_) => None,
        }
    }
}

/// Classifies a record, fetches its flanking window and compares the protospacer to the spacer.
///
/// Only a failing fetcher is an error; every data problem degrades into an unusable report.
pub fn analyze_record<F: WindowFetcher + ?Sized>(
    record: &AlignmentRecord,
    spacer: &str,
    params: &Params,
    fetcher: &mut F,
) -> Result<HitReport> {
    let (classification, btop) = classify_record(record, spacer.len(), params.max_evalue);
    let (class, btop) = match (classification, btop) {
        (Classification::Hit(class), Some(btop)) => (class, btop),
        (classification, _) => return Ok(HitReport::unusable(classification, spacer)),
    };

    let overhang = match Overhang::new(record.query_start, record.query_end, spacer.len()) {
        Ok(overhang) => overhang,
        Err(e) => {
            log::debug!("{} vs {}: {}", record.query_id, record.subject_id, e);
            let report = HitReport::unusable(Classification::Hit(class), spacer);
            return Ok(finish(class, report, params));
        }
    };

    let window = match FetchWindow::map(record, overhang, class.margins()) {
        Ok(window) => Some(fetcher.fetch(&record.subject_id, &window)?),
        Err(e) => {
            log::debug!(
                "{} vs {}: skipping {} window, {}",
                record.query_id,
                record.subject_id,
                class,
                e
            );
            None
        }
    };

    let report = match (class, window) {
        (_, None) => HitReport::unusable(Classification::Hit(class), spacer),
        (HitClass::ExactCoreMatch | HitClass::MismatchOnly, Some(window)) => {
            motif_hit(class, &window, spacer)
        }
        (HitClass::PartialWithExtension, Some(window)) => {
            partial_hit(&window, spacer, overhang, record.query_end)
        }
        (HitClass::Gapped, Some(window)) => gapped_hit(&window, spacer, overhang, &btop),
    };

    Ok(finish(class, report, params))
}

fn finish(class: HitClass, mut report: HitReport, params: &Params) -> HitReport {
    report.filtered = class == HitClass::ExactCoreMatch || report.distance > params.max_distance;
    report
}

fn motif_hit(class: HitClass, window: &FetchedWindow, spacer: &str) -> HitReport {
    let core = window.core();
    if window.degraded || core.len() != spacer.len() {
        return HitReport::unusable(Classification::Hit(class), spacer);
    }
    HitReport::usable(class, window, core, spacer)
}

fn partial_hit(
    window: &FetchedWindow,
    spacer: &str,
    overhang: Overhang,
    query_end: usize,
) -> HitReport {
    let mut report = motif_hit(HitClass::PartialWithExtension, window, spacer);
    let Some(core) = report.target.as_deref() else {
        return report;
    };

    let ends = [
        (core.get(..overhang.start), spacer.get(..overhang.start)),
        (core.get(query_end..), spacer.get(query_end..)),
    ];
    report.extensions = ends
        .into_iter()
        .filter_map(|ends| match ends {
            (Some(target_end), Some(spacer_end)) if !target_end.is_empty() => {
                percent_identity(target_end, spacer_end)
                    .ok()
                    .map(|identity| ExtensionIdentity {
                        len: target_end.len(),
                        identity,
                    })
            }
            _ => None,
        })
        .collect();
    report
}

fn gapped_hit(window: &FetchedWindow, spacer: &str, overhang: Overhang, btop: &Btop) -> HitReport {
    let unusable = || HitReport::unusable(Classification::Hit(HitClass::Gapped), spacer);
    if window.degraded {
        return unusable();
    }
    match reconstruct(btop, window.without_five_prime_margin(), spacer, overhang.start) {
        Ok(pair) => HitReport::usable(HitClass::Gapped, window, &pair.target, &pair.spacer),
        Err(e) => {
            log::debug!("Gap reconstruction failed: {}", e);
            unusable()
        }
    }
}

/// Sequentially processes every record arriving on `receiver`.
pub fn process_records<F, W>(
    receiver: Receiver<Result<RecordLine>>,
    catalog: &SpacerCatalog,
    params: &Params,
    fetcher: &mut F,
    writer: &mut HitWriter<W>,
    summary: &mut RunSummary,
) -> Result<()>
where
    F: WindowFetcher + ?Sized,
    W: Write,
{
    for message in receiver {
        summary.total_records += 1;
        let RecordLine {
            line_number,
            line,
            record,
        } = match message {
            Ok(record_line) => record_line,
            Err(e) => {
                log::error!("{}", e);
                summary.unparseable += 1;
                continue;
            }
        };

        let Some(spacer) = catalog.get(&record.query_id) else {
            log::error!(
                "Alignment line {}: spacer {} is not in the spacer catalog",
                line_number,
                record.query_id
            );
            summary.catalog_misses += 1;
            continue;
        };

        let report = analyze_record(&record, spacer, params, fetcher)?;
        if let Classification::Skipped(SkipReason::MalformedBtop(e)) = &report.classification {
            log::warn!("Alignment line {}: {}", line_number, e);
        }

        writer.write(&line, &record, spacer, &report)?;
        summary.add(&report);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protospacer::{coords::Strand, fetch::parse_fetch_response};
    use std::collections::HashMap;

    /// Serves canned FASTA responses keyed by (subject, strand, range) and records requests
    #[derive(Default)]
    struct MockFetcher {
        responses: HashMap<(String, Strand, String), String>,
        requests: Vec<(String, Strand, String)>,
    }

    impl MockFetcher {
        fn with(mut self, subject: &str, strand: Strand, range: &str, response: &str) -> Self {
            self.responses.insert(
                (subject.to_string(), strand, range.to_string()),
                response.to_string(),
            );
            self
        }
    }

    impl WindowFetcher for MockFetcher {
        fn fetch(&mut self, subject_id: &str, window: &FetchWindow) -> Result<FetchedWindow> {
            let key = (subject_id.to_string(), window.strand, window.range_string());
            self.requests.push(key.clone());
            let text = self.responses.get(&key).cloned().unwrap_or_default();
            Ok(parse_fetch_response(&text, window.margins))
        }
    }

    fn record(line: &str) -> AlignmentRecord {
        AlignmentRecord::from_line(line).unwrap()
    }

    const SPACER: &str = "ACGTACGTAC";

    #[test]
    fn test_exact_core_match_plus() {
        let rec = record("spacer1\tchr1\t100\t10\t0\t0\t1\t10\t100\t109\t1e-3\t20\t10\t5000\t10");
        let mut fetcher =
            MockFetcher::default().with("chr1", Strand::Plus, "97-112", ">chr1\nTCCACGTACGTACGGA\n");
        let report = analyze_record(&rec, SPACER, &Params::default(), &mut fetcher).unwrap();

        assert_eq!(fetcher.requests.len(), 1);
        assert_eq!(report.class(), Some(HitClass::ExactCoreMatch));
        assert_eq!(report.target.as_deref(), Some(SPACER));
        assert_eq!(report.distance, 0);
        assert_eq!(report.identity, Some(1.0));
        assert_eq!(report.five_prime_flank.as_deref(), Some("TCC"));
        assert_eq!(report.three_prime_flank.as_deref(), Some("GGA"));
        assert!(report.cc_motif);
        assert!(report.filtered);
    }

    #[test]
    fn test_mismatch_only_minus() {
        let rec = record("spacer1\tchr2\t90\t10\t1\t0\t1\t10\t300\t291\t0.01\t18\t10\t5000\t4AT5");
        let mut fetcher = MockFetcher::default().with(
            "chr2",
            Strand::Minus,
            "288-303",
            ">chr2:288-303\nGAAACGTTCGTACTTT\n",
        );
        let report = analyze_record(&rec, SPACER, &Params::default(), &mut fetcher).unwrap();

        assert_eq!(report.class(), Some(HitClass::MismatchOnly));
        assert_eq!(report.target.as_deref(), Some("ACGTTCGTAC"));
        assert_eq!(report.distance, 1);
        assert_eq!(report.identity, Some(0.9));
        assert!(!report.cc_motif);
        assert!(!report.filtered);
    }

    #[test]
    fn test_header_only_fetch_routes_to_sentinel() {
        let rec = record("spacer1\tchr1\t90\t10\t1\t0\t1\t10\t100\t109\t0.01\t18\t10\t5000\t4AT5");
        let mut fetcher = MockFetcher::default().with("chr1", Strand::Plus, "97-112", ">chr1:97-112");
        let report = analyze_record(&rec, SPACER, &Params::default(), &mut fetcher).unwrap();

        assert_eq!(report.class(), Some(HitClass::MismatchOnly));
        assert_eq!(report.target, None);
        assert_eq!(report.distance, SPACER.len());
        assert!(report.filtered);
    }

    #[test]
    fn test_out_of_bounds_skips_fetch() {
        let rec = record("spacer1\tchr1\t90\t10\t1\t0\t1\t10\t2\t11\t0.01\t18\t10\t5000\t4AT5");
        let mut fetcher = MockFetcher::default();
        let report = analyze_record(&rec, SPACER, &Params::default(), &mut fetcher).unwrap();

        assert!(fetcher.requests.is_empty());
        assert_eq!(report.target, None);
        assert!(report.filtered);
    }

    #[test]
    fn test_partial_with_extension() {
        // spacer positions 3..=8 aligned; two bases recovered on each side
        let rec = record("spacer1\tchr1\t100\t6\t0\t0\t3\t8\t100\t105\t0.05\t12\t10\t5000\t6");
        let mut fetcher = MockFetcher::default().with(
            "chr1",
            Strand::Plus,
            "95-110",
            ">chr1\nGCCTTGTACGTAGGTT\n",
        );
        let report = analyze_record(&rec, SPACER, &Params::default(), &mut fetcher).unwrap();

        assert_eq!(report.class(), Some(HitClass::PartialWithExtension));
        assert_eq!(report.target.as_deref(), Some("TTGTACGTAG"));
        assert_eq!(
            report.extensions,
            vec![
                ExtensionIdentity {
                    len: 2,
                    identity: 0.0
                },
                ExtensionIdentity {
                    len: 2,
                    identity: 0.5
                },
            ]
        );
        assert_eq!(report.distance, 3);
        assert!(report.cc_motif);
        assert!(!report.filtered);
    }

    #[test]
    fn test_partial_with_extension_minus() {
        let rec = record("spacer1\tchr2\t100\t6\t0\t0\t3\t8\t105\t100\t0.05\t12\t10\t5000\t6");
        let mut fetcher = MockFetcher::default().with(
            "chr2",
            Strand::Minus,
            "95-110",
            ">chr2:c110-95\nGCCTTGTACGTAGGTT\n",
        );
        let report = analyze_record(&rec, SPACER, &Params::default(), &mut fetcher).unwrap();

        assert_eq!(
            fetcher.requests,
            vec![("chr2".to_string(), Strand::Minus, "95-110".to_string())]
        );
        assert_eq!(report.class(), Some(HitClass::PartialWithExtension));
        assert_eq!(report.target.as_deref(), Some("TTGTACGTAG"));
        let extensions: Vec<(usize, f64)> = report
            .extensions
            .iter()
            .map(|ext| (ext.len, ext.identity))
            .collect();
        assert_eq!(extensions, vec![(2, 0.0), (2, 0.5)]);
        assert_eq!(report.five_prime_flank.as_deref(), Some("GCC"));
        assert_eq!(report.three_prime_flank.as_deref(), Some("GTT"));
        assert!(!report.filtered);
    }

    #[test]
    fn test_distance_threshold_is_inclusive() {
        let mut fetcher = MockFetcher::default()
            .with("chr1", Strand::Plus, "97-112", ">chr1\nGAAGTCAACGTACTTT\n")
            .with("chr1", Strand::Plus, "397-412", ">chr1\nGAAGTCAGCGTACTTT\n");

        let four = record(
            "spacer1\tchr1\t60\t10\t4\t0\t1\t10\t100\t109\t0.05\t10\t10\t5000\tAGCTGCTA6",
        );
        let report = analyze_record(&four, SPACER, &Params::default(), &mut fetcher).unwrap();
        assert_eq!(report.class(), Some(HitClass::MismatchOnly));
        assert_eq!(report.target.as_deref(), Some("GTCAACGTAC"));
        assert_eq!(report.distance, 4);
        assert!(!report.filtered);

        let five = record(
            "spacer1\tchr1\t50\t10\t5\t0\t1\t10\t400\t409\t0.09\t8\t10\t5000\tAGCTGCTAAG5",
        );
        let report = analyze_record(&five, SPACER, &Params::default(), &mut fetcher).unwrap();
        assert_eq!(report.class(), Some(HitClass::MismatchOnly));
        assert_eq!(report.target.as_deref(), Some("GTCAGCGTAC"));
        assert_eq!(report.distance, 5);
        assert_eq!(report.identity, Some(0.5));
        assert!(report.filtered);
    }

    #[test]
    fn test_gapped_plus() {
        // target has an extra A after spacer base 3
        let rec = record("spacer1\tchr1\t90.9\t11\t0\t1\t1\t10\t100\t110\t0.01\t15\t10\t5000\t3-A7");
        let mut fetcher = MockFetcher::default().with(
            "chr1",
            Strand::Plus,
            "97-110",
            ">chr1\nTTTACGATACGTAC\n",
        );
        let report = analyze_record(&rec, SPACER, &Params::default(), &mut fetcher).unwrap();

        assert_eq!(report.class(), Some(HitClass::Gapped));
        assert_eq!(report.target.as_deref(), Some("ACGATACGTAC"));
        assert_eq!(report.distance, 1);
        assert_eq!(report.five_prime_flank.as_deref(), Some("TTT"));
        assert_eq!(report.three_prime_flank, None);
        assert!(!report.filtered);
    }

    #[test]
    fn test_gapped_minus() {
        // spacer base 5 has no counterpart in the target
        let rec = record("spacer1\tchr2\t90\t10\t0\t1\t1\t10\t200\t192\t0.01\t15\t10\t5000\t4A-5");
        let mut fetcher = MockFetcher::default().with(
            "chr2",
            Strand::Minus,
            "192-203",
            ">chr2:c203-192\nTCCACGTCGTAC\n",
        );
        let report = analyze_record(&rec, SPACER, &Params::default(), &mut fetcher).unwrap();

        assert_eq!(
            fetcher.requests,
            vec![("chr2".to_string(), Strand::Minus, "192-203".to_string())]
        );
        assert_eq!(report.class(), Some(HitClass::Gapped));
        assert_eq!(report.target.as_deref(), Some("ACGT-CGTAC"));
        assert_eq!(report.distance, 1);
        assert_eq!(report.five_prime_flank.as_deref(), Some("TCC"));
        assert_eq!(report.three_prime_flank, None);
        assert!(report.cc_motif);
        assert!(!report.filtered);
    }

    #[test]
    fn test_gapped_reconstruction_mismatch_is_unusable() {
        let rec = record("spacer1\tchr1\t90.9\t11\t0\t1\t1\t10\t100\t110\t0.01\t15\t10\t5000\t3-A7");
        let mut fetcher =
            MockFetcher::default().with("chr1", Strand::Plus, "97-110", ">chr1\nTTTACGATAC\n");
        let report = analyze_record(&rec, SPACER, &Params::default(), &mut fetcher).unwrap();
        assert_eq!(report.class(), Some(HitClass::Gapped));
        assert_eq!(report.target, None);
        assert!(report.filtered);
    }

    #[test]
    fn test_malformed_btop_is_skipped() {
        let rec = record("spacer1\tchr1\t100\t10\t0\t0\t1\t10\t100\t109\t1e-3\t20\t10\t5000\t3AT2");
        let mut fetcher = MockFetcher::default();
        let report = analyze_record(&rec, SPACER, &Params::default(), &mut fetcher).unwrap();
        assert!(matches!(
            report.classification,
            Classification::Skipped(SkipReason::MalformedBtop(_))
        ));
        assert!(fetcher.requests.is_empty());
        assert!(!report.filtered);
    }
}
