//! Kernel module - server dependencies and the job search workflow.

pub mod deps;
pub mod job_search;

pub use deps::{SearchSettings, ServerDeps};
pub use job_search::{run_job_search, JobSearchRequest, LooseValue};
