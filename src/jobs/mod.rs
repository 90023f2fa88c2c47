// Jobs module - in-memory download job registry and the tasks around it

pub mod models;
pub mod store;
pub mod sweeper;
pub mod worker;

use thiserror::Error;

pub use models::{Job, JobStatus, JobUpdate};
pub use store::JobStore;
pub use sweeper::Sweeper;
pub use worker::JobRunner;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Download not found: {0}")]
    NotFound(String),
}
