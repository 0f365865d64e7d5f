pub mod blastn;
pub mod btop;
pub mod catalog;
pub mod classify;
pub mod coords;
pub mod distance;
pub mod emit;
pub mod engine;
pub mod fetch;
pub mod gaps;
pub mod record;

pub use blastn::run_blastn;
pub use catalog::SpacerCatalog;
pub use classify::{Classification, HitClass, SkipReason};
pub use emit::{HitWriter, RunSummary};
pub use engine::{analyze_record, process_records, HitReport, Params, SENTINEL};
pub use fetch::{BlastDbFetcher, FaidxFetcher, WindowFetcher};
pub use record::{stream_records_into_channel, AlignmentRecord, RecordLine};
