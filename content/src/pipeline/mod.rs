pub mod builder;
pub mod ingest;
pub mod synthetic;
