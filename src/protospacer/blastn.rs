use super::record::OUTFMT_FIELDS;
use crate::utils::Result;
use std::path::Path;
use std::process::Command;

/// Tabular output format carrying every column the record parser expects.
pub fn outfmt() -> String {
    format!("6 {}", OUTFMT_FIELDS.join(" "))
}

/// Aligns the spacers against a BLAST database with the short-query task.
pub fn run_blastn(
    program: &Path,
    query: &Path,
    db: &Path,
    output: &Path,
    max_evalue: f64,
) -> Result<()> {
    log::info!(
        "Aligning {} against {} with {}",
        query.display(),
        db.display(),
        program.display()
    );
    let status = Command::new(program)
        .arg("-task")
        .arg("blastn-short")
        .arg("-query")
        .arg(query)
        .arg("-db")
        .arg(db)
        .arg("-outfmt")
        .arg(outfmt())
        .arg("-max_target_seqs")
        .arg("1000000")
        .arg("-evalue")
        .arg(max_evalue.to_string())
        .arg("-out")
        .arg(output)
        .status()
        .map_err(|e| format!("Failed to run {}: {}", program.display(), e))?;

    if !status.success() {
        return Err(format!("{} exited with {}", program.display(), status));
    }
    Ok(())
}
