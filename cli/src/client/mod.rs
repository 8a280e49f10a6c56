//! HTTP client for the Microsoft Graph `/me` endpoints.

pub mod api;
pub mod middleware;
pub mod request;
pub mod types;

pub use api::GraphApiClient;
pub use request::{AuthenticatedRequestFactory, RequestDescriptor};
