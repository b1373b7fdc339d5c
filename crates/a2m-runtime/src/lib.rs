pub mod importer;
pub mod invocation;
pub mod jsonl_importer;
pub mod orchestrator;
pub mod run_log;

pub use a2m_core as core;
pub use a2m_data as data;

pub use invocation::{run, run_with_log, Config};
