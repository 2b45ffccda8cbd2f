//! HTTP transport seam for external providers.
//!
//! Completion providers and caption sources are opaque network endpoints.
//! Everything that talks to them goes through [`HttpTransport`], so the
//! acquisition logic can be driven by a fake in tests and by
//! [`ReqwestTransport`] in production.

pub mod client;
pub mod error;
pub mod types;

pub use client::{HttpClientConfig, ReqwestTransport};
pub use error::{HttpError, HttpResult};
pub use types::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
