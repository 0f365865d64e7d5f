use crate::cli::ExtractArgs;
use crate::protospacer::{
    process_records, run_blastn, stream_records_into_channel, BlastDbFetcher, FaidxFetcher,
    HitWriter, Params, RunSummary, SpacerCatalog, WindowFetcher,
};
use crate::utils::{create_output_dir, file_basename, open_text_reader, OutputPaths, Result};
use crossbeam_channel::bounded;
use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    thread,
};

const CHANNEL_BUFFER_SIZE: usize = 2048;

/// Run layout `<db>_vs_<spacers>.dir/<db>_vs_<spacers>.*`, or the given directory.
pub fn output_paths(
    db: &Path,
    spacers_path: &Path,
    output_dir: Option<&str>,
) -> Result<OutputPaths> {
    let name = format!(
        "{}_vs_{}",
        file_basename(db)?,
        file_basename(spacers_path)?
    );
    let dir = match output_dir {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(format!("{}.dir", name)),
    };
    Ok(OutputPaths::new(dir, name))
}

/// Names the run after the BLAST database, or after the genome when no database is given.
fn source_path(db: Option<&Path>, genome: Option<&Path>) -> Result<PathBuf> {
    db.or(genome)
        .map(Path::to_path_buf)
        .ok_or_else(|| "Either --db or --genome is required".to_string())
}

pub fn extract(args: ExtractArgs) -> Result<()> {
    let source = source_path(args.db.as_deref(), args.genome_path.as_deref())?;

    let catalog = SpacerCatalog::from_path(&args.spacers_path)?;
    if catalog.is_empty() {
        return Err(format!(
            "No spacers found in {}",
            args.spacers_path.display()
        ));
    }
    log::info!("Loaded {} spacers", catalog.len());

    let paths = output_paths(&source, &args.spacers_path, args.output_dir.as_deref())?;
    create_output_dir(&paths.dir)?;

    let alignments_path = match &args.alignments_path {
        Some(path) => path.clone(),
        None => {
            let db = args
                .db
                .as_ref()
                .ok_or("No --db to align spacers against; --genome alone needs --alignments")?;
            let output = paths.with_suffix("aln");
            run_blastn(
                &args.blastn_path,
                &args.spacers_path,
                db,
                &output,
                args.max_evalue,
            )?;
            output
        }
    };
    log::info!("Reading alignments from {}", alignments_path.display());

    let mut fetcher: Box<dyn WindowFetcher> = match &args.genome_path {
        Some(genome) => Box::new(FaidxFetcher::from_path(genome)?),
        None => Box::new(BlastDbFetcher::new(&args.blastdbcmd_path, &source)),
    };

    let params = Params {
        max_distance: args.max_distance,
        max_evalue: args.max_evalue,
    };

    let reader = open_text_reader(&alignments_path)?;
    let (sender, receiver) = bounded(CHANNEL_BUFFER_SIZE);
    let record_stream_thread = thread::spawn(move || stream_records_into_channel(reader, sender));

    let mut writer = HitWriter::from_paths(&paths)?;
    let mut summary = RunSummary::default();
    let result = process_records(
        receiver,
        &catalog,
        &params,
        fetcher.as_mut(),
        &mut writer,
        &mut summary,
    );

    // Clean-up
    record_stream_thread
        .join()
        .map_err(|_| "Record stream thread panicked".to_string())?;
    result?;
    writer.flush()?;

    let table_path = paths.with_suffix("ext_pid.tsv");
    let table = File::create(&table_path)
        .map_err(|e| format!("Failed to create {}: {}", table_path.display(), e))?;
    summary.write_extension_table(BufWriter::new(table))?;
    summary.log();
    log::info!("Results written to {}", paths.dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_paths() {
        let paths = output_paths(
            Path::new("/data/blastdb/phages"),
            Path::new("spacers/CRISPR1.fa"),
            None,
        )
        .unwrap();
        assert_eq!(paths.name, "phages_vs_CRISPR1.fa");
        assert_eq!(paths.dir, PathBuf::from("phages_vs_CRISPR1.fa.dir"));
        assert_eq!(
            paths.with_suffix("filt.aln"),
            PathBuf::from("phages_vs_CRISPR1.fa.dir/phages_vs_CRISPR1.fa.filt.aln")
        );
    }

    #[test]
    fn test_source_prefers_db() {
        let db = Path::new("/data/blastdb/phages");
        let genome = Path::new("phages.fa");
        assert_eq!(source_path(Some(db), Some(genome)), Ok(db.to_path_buf()));
        assert_eq!(source_path(None, Some(genome)), Ok(genome.to_path_buf()));
        assert!(source_path(None, None).is_err());
    }

    #[test]
    fn test_output_dir_override() {
        let paths = output_paths(Path::new("phages"), Path::new("s.fa"), Some("out/run")).unwrap();
        assert_eq!(paths.dir, PathBuf::from("out/run"));
        assert_eq!(paths.name, "phages_vs_s.fa");
    }
}
