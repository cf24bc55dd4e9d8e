extern crate self as lineage_core;

pub mod log;
pub mod panic;
pub mod time;
