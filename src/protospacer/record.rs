use crate::utils::Result;
use crossbeam_channel::Sender;
use std::io::BufRead;
use std::str::FromStr;

/// Column layout requested from `blastn -outfmt`, in order.
pub const OUTFMT_FIELDS: [&str; 15] = [
    "qseqid", "sseqid", "pident", "length", "mismatch", "gapopen", "qstart", "qend", "sstart",
    "send", "evalue", "bitscore", "qlen", "slen", "btop",
];

/// One tabular hit of a spacer against a subject sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub query_id: String,
    pub subject_id: String,
    pub percent_identity: f64,
    pub alignment_length: usize,
    pub mismatches: usize,
    pub gap_opens: usize,
    pub query_start: usize,
    pub query_end: usize,
    pub subject_start: u64,
    pub subject_end: u64,
    pub evalue: f64,
    pub bit_score: f64,
    pub query_length: usize,
    pub subject_length: u64,
    pub btop: String,
}

impl AlignmentRecord {
    pub fn from_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
        if fields.len() != OUTFMT_FIELDS.len() {
            return Err(format!(
                "Expected {} tab-separated fields ({}), found {}",
                OUTFMT_FIELDS.len(),
                OUTFMT_FIELDS.join(" "),
                fields.len()
            ));
        }

        fn parse<T: FromStr>(fields: &[&str], index: usize) -> Result<T> {
            fields[index].trim().parse::<T>().map_err(|_| {
                format!(
                    "Invalid {} value: '{}'",
                    OUTFMT_FIELDS[index], fields[index]
                )
            })
        }

        let record = AlignmentRecord {
            query_id: fields[0].to_string(),
            subject_id: fields[1].to_string(),
            percent_identity: parse(&fields, 2)?,
            alignment_length: parse(&fields, 3)?,
            mismatches: parse(&fields, 4)?,
            gap_opens: parse(&fields, 5)?,
            query_start: parse(&fields, 6)?,
            query_end: parse(&fields, 7)?,
            subject_start: parse(&fields, 8)?,
            subject_end: parse(&fields, 9)?,
            evalue: parse(&fields, 10)?,
            bit_score: parse(&fields, 11)?,
            query_length: parse(&fields, 12)?,
            subject_length: parse(&fields, 13)?,
            btop: fields[14].trim().to_string(),
        };

        if record.query_start == 0 || record.query_start > record.query_end {
            return Err(format!(
                "Invalid query range {}-{}",
                record.query_start, record.query_end
            ));
        }
        if record.subject_start == 0 || record.subject_end == 0 {
            return Err("Subject coordinates are 1-based".to_string());
        }

        Ok(record)
    }
}

/// A parsed record together with the line it came from, kept for verbatim output.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLine {
    pub line_number: usize,
    pub line: String,
    pub record: AlignmentRecord,
}

/// Reads alignment lines and forwards parsed records; unparseable lines are sent as errors.
pub fn stream_records_into_channel<R: BufRead>(reader: R, sender: Sender<Result<RecordLine>>) {
    for (index, result_line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = match result_line {
            Ok(line) => line,
            Err(err) => {
                let error = format!("Error at alignment line {}: {}", line_number, err);
                if sender.send(Err(error)).is_err() {
                    log::error!("Record channel closed early");
                }
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let message = AlignmentRecord::from_line(&line)
            .map(|record| RecordLine {
                line_number,
                line: line.clone(),
                record,
            })
            .map_err(|e| format!("Error at alignment line {}: {}", line_number, e));

        if sender.send(message).is_err() {
            log::error!("Record channel closed early");
            return;
        }
    }
}
