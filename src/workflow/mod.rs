pub mod ingest_flow;

pub use ingest_flow::{prefixed_name, IngestFlow, IngestOutcome};
