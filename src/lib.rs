//! # KCPS Rust client core
//!
//! Request execution and consistency layer for the KCPS (CloudStack based)
//! control-plane API.
//!
//! Every remote command goes through the same pipeline:
//!
//! 1. its parameters are canonically encoded and signed with HMAC-SHA1,
//! 2. the signed request is sent as GET (or form POST for the few commands
//!    that carry large payloads), retrying connection resets,
//! 3. the single-key response envelope is unwrapped and known type
//!    inconsistencies are repaired,
//! 4. for async commands on a waiting client, the job is polled to
//!    completion and its result goes through the same normalization.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kcps::{Client, Command, ParameterSet};
//! use serde::Deserialize;
//!
//! struct DeleteVolume {
//!     id: String,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct DeleteVolumeResponse {
//!     #[serde(default)]
//!     success: bool,
//! }
//!
//! impl Command for DeleteVolume {
//!     const NAME: &'static str = "deleteVolume";
//!     type Response = DeleteVolumeResponse;
//!
//!     fn params(&self) -> ParameterSet {
//!         let mut p = ParameterSet::new();
//!         p.set("id", self.id.as_str());
//!         p
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new_async(
//!         "https://portal.example.com/client/api",
//!         "api-key",
//!         "secret-key",
//!         true,
//!     )?;
//!
//!     let volume_id = "550e8400-e29b-41d4-a716-446655440000";
//!     if kcps::is_id(volume_id) {
//!         let r = client.call(&DeleteVolume { id: volume_id.to_string() }).await?;
//!         println!("deleted: {}", r.success);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, KcpsError>`. A waiting client that runs
//! out of time returns [`KcpsError::AsyncTimeout`], which keeps the job id so
//! the job can be resumed with [`jobs::AsyncJobsClient::wait`]:
//!
//! ```rust,no_run
//! use kcps::{Client, KcpsError, ParameterSet};
//!
//! # async fn run(client: Client, params: ParameterSet) {
//! match client.call_async_raw("createSnapshot", &params, true).await {
//!     Ok(snapshot) => println!("created {snapshot}"),
//!     Err(KcpsError::AsyncTimeout { job_id, .. }) => println!("still running: {job_id}"),
//!     Err(KcpsError::Api { error_text, .. }) => println!("rejected: {error_text}"),
//!     Err(e) => println!("error: {e}"),
//! }
//! # }
//! ```

pub mod client;
pub mod envelope;
pub mod error;
pub mod identifier;
pub mod jobs;
pub mod normalize;
pub mod params;
pub mod poller;
pub mod retry;
pub mod signer;
pub mod transport;
pub mod types;

// Re-export main types at the crate root
pub use client::{Client, ClientConfig, Command};
pub use error::{KcpsError, Result};
pub use identifier::{is_id, UNLIMITED_RESOURCE_ID};
pub use normalize::{Coercion, Normalizer, Rule};
pub use params::{with_vpc_id, ParameterSet, SupportsVpcScoping};
pub use poller::{AsyncJobPoller, JobStatusSource};
pub use retry::RetryPolicy;
pub use signer::{Credentials, Signature};
pub use types::{AsyncJob, JobAccepted, JobResultKind, JobStatus};
