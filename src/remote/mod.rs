//! Remote transcription/formatting service: trait seam, HTTP backend,
//! credential rotation, and retry orchestration.

pub mod credentials;
pub mod http;
pub mod retry;
pub mod service;

pub use credentials::{CredentialLease, CredentialPool};
pub use http::HttpRemoteService;
pub use retry::{RetryPolicy, RetryingClient};
pub use service::{MockRemoteService, Operation, Payload, RemoteService};
