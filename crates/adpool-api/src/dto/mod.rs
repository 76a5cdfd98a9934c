//! Request and response DTOs.

pub mod request;
pub mod response;

pub use request::validated;
pub use response::ApiResponse;
