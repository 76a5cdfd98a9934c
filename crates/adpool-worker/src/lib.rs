//! Scheduled execution of the periodic jobs.
//!
//! Every tick goes through [`adpool_service::PeriodicJobs`], the same
//! facade the HTTP trigger uses, so scheduled and triggered runs are
//! recorded identically.

pub mod scheduler;

pub use scheduler::{CronScheduler, job_schedule};
