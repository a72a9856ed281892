//! Streaming session reader for `event:`/`data:` framed chat replies.
//!
//! A session is one POST whose body is consumed chunk by chunk. Frames are
//! delivered to a [`StreamHandler`] in arrival order. Failures reach the
//! handler's `on_error` exactly once and are never retried. Cancellation is
//! silent.

use crate::context::TransportContext;
use crate::decoder::{Line, LineDecoder};
use crate::request::merge_headers;
use crate::response::{decode_body, error_message};
use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt as _;
use memochat_types::{
    AUTH_FAILED_MESSAGE, Frame, NETWORK_FAILED_MESSAGE, Result, StreamHandler,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Reported when the response carries no body to read.
pub const NO_STREAM_MESSAGE: &str = "cannot read response stream";

/// How a streaming session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A `done` frame arrived; `on_done` fired.
    Completed { message_id: Option<i64> },
    /// `on_error` fired with `message`.
    Failed { message: String },
    /// The caller cancelled. No callback fired for it.
    Cancelled,
    /// The body ended without a terminal frame. No callback fired.
    Ended,
}

impl StreamOutcome {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

fn fail<H: StreamHandler + ?Sized>(handler: &mut H, message: &str) -> StreamOutcome {
    handler.on_error(message);
    StreamOutcome::Failed {
        message: message.to_string(),
    }
}

/// Like [`fail`], but silent once the caller has cancelled.
fn report<H: StreamHandler + ?Sized>(
    handler: &mut H,
    cancel: &CancellationToken,
    message: &str,
) -> StreamOutcome {
    if cancel.is_cancelled() {
        return StreamOutcome::Cancelled;
    }
    fail(handler, message)
}

/// Opens streaming sessions against the API.
#[derive(Clone)]
pub struct StreamReader {
    ctx: Arc<TransportContext>,
}

impl StreamReader {
    #[must_use]
    pub fn new(ctx: Arc<TransportContext>) -> Self {
        Self { ctx }
    }

    /// Runs one streaming session to its end.
    ///
    /// Every failure after the request is built goes to `handler.on_error`
    /// and shows up as [`StreamOutcome::Failed`], not as `Err`.
    ///
    /// # Errors
    ///
    /// Only setup failures: an unserializable body, an invalid credential
    /// header, or a request that cannot be built.
    pub async fn stream<H: StreamHandler + ?Sized>(
        &self,
        endpoint: &str,
        body: &Value,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome> {
        let url = self.ctx.url(endpoint);
        let credential = self.ctx.credential();
        let mut headers = merge_headers(&HeaderMap::new(), credential.as_deref())?;
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        let request = self
            .ctx
            .http()
            .post(&url)
            .headers(headers)
            .body(serde_json::to_vec(body)?);

        tracing::debug!(%url, "opening stream");
        let sent = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(%url, "stream cancelled before response");
                return Ok(StreamOutcome::Cancelled);
            }
            sent = request.send() => sent,
        };
        let resp = match sent {
            Ok(resp) => resp,
            Err(e) if e.is_builder() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(%url, error = %e, "stream request failed");
                return Ok(report(handler, cancel, NETWORK_FAILED_MESSAGE));
            }
        };

        let status = resp.status().as_u16();
        if status == 401 {
            tracing::info!(%url, "stream rejected with 401");
            self.ctx.expire_session();
            return Ok(report(handler, cancel, AUTH_FAILED_MESSAGE));
        }
        if !resp.status().is_success() {
            let content_type = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let read = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
                read = resp.bytes() => read,
            };
            let payload = read
                .ok()
                .and_then(|bytes| decode_body(content_type.as_deref(), &bytes).ok());
            let message = error_message(payload.as_ref(), status);
            tracing::warn!(%url, status, %message, "stream request rejected");
            return Ok(report(handler, cancel, &message));
        }
        if resp.content_length() == Some(0) {
            return Ok(report(handler, cancel, NO_STREAM_MESSAGE));
        }

        let outcome = read_frames(resp.bytes_stream(), handler, cancel).await;
        tracing::debug!(%url, ?outcome, "stream finished");
        Ok(outcome)
    }
}

/// Drives `handler` from a chunked byte source until a terminal frame, the
/// end of the source, a read error, or cancellation.
///
/// The source is owned by this call and dropped before it returns, on every
/// path.
pub async fn read_frames<S, E, H>(
    source: S,
    handler: &mut H,
    cancel: &CancellationToken,
) -> StreamOutcome
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Display,
    H: StreamHandler + ?Sized,
{
    let mut source = std::pin::pin!(source);
    let mut decoder = LineDecoder::new();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return StreamOutcome::Cancelled,
            next = source.next() => next,
        };
        if cancel.is_cancelled() {
            return StreamOutcome::Cancelled;
        }

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return fail(handler, &e.to_string()),
            None => {
                if !decoder.remainder().is_empty() {
                    tracing::debug!(
                        len = decoder.remainder().len(),
                        "discarding unterminated trailing line"
                    );
                }
                return StreamOutcome::Ended;
            }
        };

        for line in decoder.push(&chunk) {
            if cancel.is_cancelled() {
                return StreamOutcome::Cancelled;
            }
            if let Some(outcome) = dispatch(&line, handler) {
                return outcome;
            }
        }
    }
}

/// Delivers one complete line. Returns the outcome if the line ended the session.
fn dispatch<H: StreamHandler + ?Sized>(line: &str, handler: &mut H) -> Option<StreamOutcome> {
    let payload = match Line::classify(line) {
        Line::Data(payload) => payload,
        Line::Event(name) => {
            tracing::trace!(event = name, "event marker");
            return None;
        }
        Line::Other => return None,
    };

    let frame = match Frame::parse(payload) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(error = %e, "discarding malformed data line");
            return None;
        }
    };

    match frame {
        Frame::Token { content } => handler.on_token(&content),
        Frame::UserMessage {
            message_id,
            content,
        } => handler.on_user_message(message_id, &content),
        Frame::Done { message_id } => {
            handler.on_done(message_id);
            return Some(StreamOutcome::Completed { message_id });
        }
        Frame::Error {
            message,
            error_code,
        } => {
            tracing::debug!(?error_code, %message, "error frame");
            return Some(fail(handler, &message));
        }
        Frame::Unknown => {}
    }
    None
}
