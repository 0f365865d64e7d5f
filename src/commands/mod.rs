pub mod cluster;
pub mod extract;
pub mod group;
