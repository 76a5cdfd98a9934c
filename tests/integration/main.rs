//! HTTP integration tests against the router over in-memory stores.

mod helpers;

mod adbot_test;
mod auth_test;
mod job_test;
mod session_test;
