mod io_utils;
mod math;
mod readers;
mod region;
mod util;

pub use io_utils::{create_output_dir, create_writer, OutputPaths};
pub use math::{mean, median};
pub use readers::{open_genome_reader, open_text_reader};
pub use region::GenomicRegion;
pub use util::{file_basename, handle_error_and_exit, Result};
