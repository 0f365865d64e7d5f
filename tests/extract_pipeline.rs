use bio::alphabets::dna;
use crossbeam_channel::bounded;
use pamgrab::protospacer::{
    analyze_record,
    coords::{FetchWindow, Overhang, Strand},
    fetch::{parse_fetch_response, FetchedWindow},
    process_records, stream_records_into_channel, AlignmentRecord, FaidxFetcher, HitClass,
    HitWriter, Params, RunSummary, SpacerCatalog, WindowFetcher, SENTINEL,
};
use pamgrab::utils::Result;
use std::{collections::HashMap, fs, io::Cursor, thread};

const SPACERS: &str = ">spacer1 CRISPR1\nACGTACGTAC\n>spacer2\nGGGGCCCCAAAATTTT\n";

/// Subject windows served from memory, keyed by subject and range
struct InMemoryFetcher {
    windows: HashMap<(String, String), String>,
}

impl WindowFetcher for InMemoryFetcher {
    fn fetch(&mut self, subject_id: &str, window: &FetchWindow) -> Result<FetchedWindow> {
        let key = (subject_id.to_string(), window.range_string());
        let text = match self.windows.get(&key) {
            Some(seq) => format!(">{}:{}\n{}\n", subject_id, window.range_string(), seq),
            None => format!(">{}:{}", subject_id, window.range_string()),
        };
        Ok(parse_fetch_response(&text, window.margins))
    }
}

fn run(alignments: &str, fetcher: &mut InMemoryFetcher) -> (RunSummary, String, String, String) {
    let catalog = SpacerCatalog::from_reader(Cursor::new(SPACERS)).unwrap();
    let input = alignments.to_string();
    let (sender, receiver) = bounded(4);
    let stream = thread::spawn(move || stream_records_into_channel(Cursor::new(input), sender));

    let mut writer = HitWriter::new(Vec::new(), Vec::new(), Vec::new());
    let mut summary = RunSummary::default();
    process_records(
        receiver,
        &catalog,
        &Params::default(),
        fetcher,
        &mut writer,
        &mut summary,
    )
    .unwrap();
    stream.join().unwrap();

    let (filtered, annotated, console) = writer.into_inner();
    (
        summary,
        String::from_utf8(filtered).unwrap(),
        String::from_utf8(annotated).unwrap(),
        String::from_utf8(console).unwrap(),
    )
}

#[test]
fn test_mixed_alignment_file() {
    let exact = "spacer1\tchr1\t100.000\t10\t0\t0\t1\t10\t100\t109\t0.001\t20.1\t10\t5000\t10";
    let mismatch = "spacer1\tchr1\t90.000\t10\t1\t0\t1\t10\t400\t409\t0.01\t16.4\t10\t5000\t4AT5";
    let no_window = "spacer1\tchr1\t90.000\t10\t1\t0\t1\t10\t800\t809\t0.01\t16.4\t10\t5000\t4AT5";
    let malformed = "spacer1\tchr1\t100.000\t10\t0\t0\t1\t10\t100\t109\t0.001\t20.1\t10\t5000\t3AT2";
    let high_evalue = "spacer1\tchr1\t100.000\t8\t0\t0\t1\t8\t100\t107\t0.5\t14.0\t10\t5000\t8";
    let unknown = "spacer9\tchr1\t100.000\t10\t0\t0\t1\t10\t100\t109\t0.001\t20.1\t10\t5000\t10";
    let alignments = [
        exact,
        mismatch,
        "not an alignment",
        no_window,
        malformed,
        high_evalue,
        unknown,
    ]
    .join("\n");

    let mut fetcher = InMemoryFetcher {
        windows: HashMap::from([
            (
                ("chr1".to_string(), "97-112".to_string()),
                "TCCACGTACGTACGGA".to_string(),
            ),
            (
                ("chr1".to_string(), "397-412".to_string()),
                "GAAACGTTCGTACTTT".to_string(),
            ),
        ]),
    };
    let (summary, filtered, annotated, console) = run(&alignments, &mut fetcher);

    assert_eq!(summary.total_records, 7);
    assert_eq!(summary.unparseable, 1);
    assert_eq!(summary.catalog_misses, 1);
    assert_eq!(summary.class_counts[&HitClass::ExactCoreMatch], 1);
    assert_eq!(summary.class_counts[&HitClass::MismatchOnly], 2);
    assert_eq!(summary.malformed, 1);
    assert_eq!(summary.high_evalue, 1);
    assert_eq!(summary.total_cc_motifs(), 1);

    // exact hit always, the window without sequence by penalty distance
    assert_eq!(filtered, format!("{}\n{}\n", exact, no_window));
    assert_eq!(summary.filtered, 2);

    let annotated: Vec<&str> = annotated.lines().collect();
    assert_eq!(annotated.len(), 5);
    assert_eq!(
        annotated[1],
        format!("{}\tACGTACGTAC\tACGTTCGTAC\t0.9000\tGAA\tTTT", mismatch)
    );
    assert_eq!(
        annotated[2],
        format!("{}\tACGTACGTAC\t{}\tNA\tNA\tNA", no_window, SENTINEL)
    );

    assert_eq!(
        console,
        "chr1\tACGTACGTAC\tTCC\tCC\tGGA\t10\t0\n\
         chr1\tACGTTCGTAC\tGAA\tAA\tTTT\t4AT5\t1\n"
    );
}

fn write_genome(dir: &std::path::Path) -> std::path::PathBuf {
    let chr1 = format!("{}TCC{}GGA{}", "A".repeat(17), "ACGTACGTAC", "A".repeat(27));
    let chr2 = String::from_utf8(dna::revcomp(chr1.as_bytes())).unwrap();
    let genome = dir.join("genome.fa");
    fs::write(&genome, format!(">chr1\n{}\n>chr2\n{}\n", chr1, chr2)).unwrap();
    fs::write(
        dir.join("genome.fa.fai"),
        "chr1\t60\t6\t60\t61\nchr2\t60\t73\t60\t61\n",
    )
    .unwrap();
    genome
}

#[test]
fn test_faidx_windows_on_both_strands() {
    let dir = tempfile::tempdir().unwrap();
    let mut fetcher = FaidxFetcher::from_path(&write_genome(dir.path())).unwrap();
    let params = Params::default();

    let plus =
        AlignmentRecord::from_line("spacer1\tchr1\t100\t10\t0\t0\t1\t10\t21\t30\t1e-3\t20\t10\t60\t10")
            .unwrap();
    let minus =
        AlignmentRecord::from_line("spacer1\tchr2\t100\t10\t0\t0\t1\t10\t40\t31\t1e-3\t20\t10\t60\t10")
            .unwrap();
    let overhang = Overhang::new(1, 10, 10).unwrap();
    let window = FetchWindow::map(&minus, overhang, HitClass::ExactCoreMatch.margins()).unwrap();
    assert_eq!(window.strand, Strand::Minus);
    assert_eq!(window.range_string(), "28-43");

    for record in [&plus, &minus] {
        let report = analyze_record(record, "ACGTACGTAC", &params, &mut fetcher).unwrap();
        assert_eq!(report.class(), Some(HitClass::ExactCoreMatch));
        assert_eq!(report.target.as_deref(), Some("ACGTACGTAC"));
        assert_eq!(report.five_prime_flank.as_deref(), Some("TCC"));
        assert_eq!(report.three_prime_flank.as_deref(), Some("GGA"));
        assert!(report.cc_motif);
    }
}
