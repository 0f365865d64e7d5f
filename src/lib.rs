pub mod cli;
pub mod commands;
pub mod protospacer;
pub mod utils;
