use crate::utils::Result;
use std::path::{Path, PathBuf};

/// Creates the run directory; an existing directory is an error so that runs never mix outputs.
pub fn create_output_dir(path: &Path) -> Result<()> {
    std::fs::create_dir(path)
        .map_err(|e| format!("Could not create output directory {}: {}", path.display(), e))
}

pub fn create_writer<T, F>(output_prefix: &Path, output_suffix: &str, f: F) -> Result<T>
where
    F: FnOnce(&Path) -> Result<T>,
{
    let mut output_path = output_prefix.as_os_str().to_owned();
    output_path.push(".");
    output_path.push(output_suffix);
    f(Path::new(&output_path))
}

/// File layout of one extraction run: `<dir>/<name>.<suffix>`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub name: String,
}

impl OutputPaths {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    pub fn prefix(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    pub fn with_suffix(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.name, suffix))
    }
}
