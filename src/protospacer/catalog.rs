use crate::utils::{open_text_reader, Result};
use bio::io::fasta;
use std::{collections::HashMap, io::Read, path::Path};

/// Spacer sequences keyed by the first word of their FASTA header.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpacerCatalog {
    spacers: HashMap<String, String>,
}

impl SpacerCatalog {
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = open_text_reader(path)?;
        Self::from_reader(reader).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut spacers = HashMap::new();
        for (index, result) in fasta::Reader::new(reader).records().enumerate() {
            let record = result.map_err(|e| format!("Error reading spacer {}: {}", index + 1, e))?;
            record
                .check()
                .map_err(|e| format!("Invalid spacer {}: {}", record.id(), e))?;
            let seq = String::from_utf8_lossy(record.seq()).to_uppercase();
            if seq.is_empty() {
                return Err(format!("Spacer {} has an empty sequence", record.id()));
            }
            if spacers.insert(record.id().to_string(), seq).is_some() {
                return Err(format!("Duplicate spacer identifier: {}", record.id()));
            }
        }
        log::debug!("Loaded {} spacers", spacers.len());
        Ok(Self { spacers })
    }

    pub fn get(&self, spacer_id: &str) -> Option<&str> {
        self.spacers.get(spacer_id).map(|seq| seq.as_str())
    }

    pub fn len(&self) -> usize {
        self.spacers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spacers.is_empty()
    }
}
