//! Response relay: metadata first, then a bounded body transfer loop.
//!
//! # Responsibilities
//! - Copy status, content type and (known) content length onto the caller response
//! - Stream the upstream body through one fixed-size, reused buffer
//! - Release the upstream body exactly once, whatever happens
//!
//! # Design Decisions
//! - Pull based: the host polls the relay, so slow callers slow the upstream read
//! - Unknown content length is left off; the host picks chunked encoding
//! - A read failure after headers are committed cannot become an error status.
//!   It is logged and yielded as a body error, which makes the host abort the
//!   connection and the caller sees a truncated response.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{header, HeaderValue, Response};
use bytes::Bytes;
use futures_util::Stream;
use tokio::io::ReadBuf;

use crate::forward::error::ForwardError;
use crate::forward::outbound::{OutboundResponse, ResponseBody};
use crate::forward::target::TargetUrl;

/// Build the caller response from the upstream response.
pub fn relay_response(
    response: OutboundResponse,
    target: &TargetUrl,
    buffer_size: usize,
) -> Response<Body> {
    let OutboundResponse {
        status,
        content_type,
        content_length,
        body,
    } = response;

    let relay = BodyRelay::new(body, buffer_size, target.to_string());
    let mut relayed = Response::new(Body::from_stream(relay));
    *relayed.status_mut() = status;
    if let Some(content_type) = content_type {
        relayed.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    if let Some(length) = content_length {
        relayed
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    relayed
}

/// Transfer loop from the upstream body to the caller through a reused buffer.
pub struct BodyRelay {
    /// `None` once released.
    source: Option<ResponseBody>,
    buffer: Box<[u8]>,
    relayed: u64,
    target: String,
}

impl BodyRelay {
    /// A `buffer_size` of zero is raised to one byte; an empty buffer would read as EOF.
    pub fn new(source: ResponseBody, buffer_size: usize, target: String) -> Self {
        Self {
            source: Some(source),
            buffer: vec![0u8; buffer_size.max(1)].into_boxed_slice(),
            relayed: 0,
            target,
        }
    }

    /// Bytes handed to the caller so far.
    pub fn relayed(&self) -> u64 {
        self.relayed
    }

    fn release(&mut self) {
        self.source = None;
    }
}

impl Stream for BodyRelay {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(source) = this.source.as_mut() else {
            return Poll::Ready(None);
        };

        let mut buf = ReadBuf::new(&mut this.buffer);
        match source.as_mut().poll_read(cx, &mut buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(())) => {
                let read = buf.filled().len();
                if read == 0 {
                    this.release();
                    tracing::debug!(
                        target_url = %this.target,
                        bytes = this.relayed,
                        "Response body relayed"
                    );
                    return Poll::Ready(None);
                }
                this.relayed += read as u64;
                Poll::Ready(Some(Ok(Bytes::copy_from_slice(&this.buffer[..read]))))
            }
            Poll::Ready(Err(err)) => {
                this.release();
                let failure = ForwardError::Streaming(io::Error::new(err.kind(), err.to_string()));
                tracing::error!(
                    target_url = %this.target,
                    bytes = this.relayed,
                    stage = %failure.stage(),
                    error = %failure,
                    "Aborting response after headers were sent"
                );
                Poll::Ready(Some(Err(err)))
            }
        }
    }
}

impl Drop for BodyRelay {
    fn drop(&mut self) {
        if self.source.is_some() {
            tracing::debug!(
                target_url = %self.target,
                bytes = self.relayed,
                "Caller went away before the response body finished"
            );
        }
    }
}
