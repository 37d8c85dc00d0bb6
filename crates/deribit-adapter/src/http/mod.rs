/*
[INPUT]:  HTTP client configuration and REST request descriptions
[OUTPUT]: HTTP responses, decorated requests and typed API errors
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;
pub mod request;

pub use error::{DeribitError, Result};
pub use request::RestRequest;

pub use client::{ClientConfig, DeribitClient};
