//! Stream transports for the search endpoint.
//!
//! A [`SearchTransport`] opens one byte stream per search. Dropping the
//! returned [`ChunkStream`] releases the connection, which is how a session
//! aborts an in-flight request.
//!
//! | Transport | Use |
//! |-----------|-----|
//! | [`HttpTransport`] | `GET {base_url}{search_path}?query=..&sort=..` via reqwest |
//! | [`StaticTransport`] | Pre-recorded chunks (`scout replay`, tests) |

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tracing::debug;

use price_scout_core::{SearchError, SearchQuery};

use crate::config::EndpointConfig;

/// Raw chunks as delivered by the transport, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<Bytes, TransportError>>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("server answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("stream read failed: {0}")]
    Read(String),
}

impl From<TransportError> for SearchError {
    fn from(e: TransportError) -> Self {
        SearchError::Transport(e.to_string())
    }
}

#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Open the event stream for `query`.
    async fn open(&self, query: &SearchQuery) -> Result<ChunkStream, TransportError>;
}

/// Streaming HTTP transport backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: EndpointConfig,
}

impl HttpTransport {
    pub fn new(endpoint: &EndpointConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(endpoint.connect_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.clone(),
        })
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn open(&self, query: &SearchQuery) -> Result<ChunkStream, TransportError> {
        let url = self.endpoint.search_url();
        debug!(%url, query = %query.text, sort = %query.sort_preference, "opening search stream");

        let response = self
            .client
            .get(&url)
            .query(&[
                (self.endpoint.query_param.as_str(), query.text.as_str()),
                (
                    self.endpoint.sort_param.as_str(),
                    query.sort_preference.as_wire(),
                ),
            ])
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Read(e.to_string())))
            .boxed())
    }
}

/// What a [`StaticTransport`] stream does after its last chunk.
#[derive(Debug, Clone, PartialEq)]
enum Ending {
    Close,
    Fail(String),
    HoldOpen,
}

/// Replays a fixed list of chunks for every search.
pub struct StaticTransport {
    chunks: Vec<Bytes>,
    ending: Ending,
    refuse: Option<TransportError>,
    stall_open: bool,
    opens: AtomicUsize,
}

impl StaticTransport {
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ending: Ending::Close,
            refuse: None,
            stall_open: false,
            opens: AtomicUsize::new(0),
        }
    }

    /// Cut `body` into reads of `chunk_size` bytes, ignoring line boundaries.
    pub fn from_body(body: impl Into<Bytes>, chunk_size: usize) -> Self {
        let body: Bytes = body.into();
        let size = chunk_size.max(1);
        let chunks = (0..body.len())
            .step_by(size)
            .map(|start| body.slice(start..(start + size).min(body.len())));
        Self::from_chunks(chunks.collect::<Vec<_>>())
    }

    /// End the stream with a read error instead of a clean close.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.ending = Ending::Fail(message.into());
        self
    }

    /// Keep the stream pending after the last chunk, like a slow backend.
    pub fn held_open(mut self) -> Self {
        self.ending = Ending::HoldOpen;
        self
    }

    /// Fail every `open` call with `error`.
    pub fn refusing(mut self, error: TransportError) -> Self {
        self.refuse = Some(error);
        self
    }

    /// Never answer `open`, like a backend that accepts the connection but
    /// sends no headers.
    pub fn stalled(mut self) -> Self {
        self.stall_open = true;
        self
    }

    /// Number of streams opened so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchTransport for StaticTransport {
    async fn open(&self, _query: &SearchQuery) -> Result<ChunkStream, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.stall_open {
            futures::future::pending::<()>().await;
        }
        if let Some(error) = &self.refuse {
            return Err(error.clone());
        }

        let body = stream::iter(self.chunks.clone().into_iter().map(Ok));
        let stream = match &self.ending {
            Ending::Close => body.boxed(),
            Ending::Fail(message) => body
                .chain(stream::once(futures::future::ready(Err(
                    TransportError::Read(message.clone()),
                ))))
                .boxed(),
            Ending::HoldOpen => body.chain(stream::pending()).boxed(),
        };
        Ok(stream)
    }
}
