pub mod job;

pub use job::{Job, JobId, JobPhase, JobStatus, JobView, Progress, Resolution};
