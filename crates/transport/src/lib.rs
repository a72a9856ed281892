//! HTTP transport for the memochat API.
//!
//! [`RequestExecutor`] runs every JSON call through one pipeline: bearer
//! header, content negotiation, bounded retry, and 401 session expiry.
//! [`StreamReader`] consumes a chat reply as `event:`/`data:` frames with
//! cooperative cancellation.

pub mod context;
pub mod decoder;
pub mod executor;
pub mod request;
pub mod response;
pub mod retry;
pub mod stream;

pub use context::TransportContext;
pub use decoder::{Line, LineDecoder, Utf8Decoder};
pub use executor::RequestExecutor;
pub use request::{RequestOptions, merge_headers};
pub use response::{decode_body, error_message, unwrap_envelope};
pub use retry::{Attempt, Backoff, Decision, RetryPolicy, classify};
pub use stream::{NO_STREAM_MESSAGE, StreamOutcome, StreamReader, read_frames};

// Lets downstream crates name the cancellation type without a direct dependency.
pub use tokio_util::sync::CancellationToken;
