//! Search session state machine.
//!
//! A [`SearchSession`] is one end-to-end search: it owns the transport
//! stream, the frame parser, a [`SourceStatusTracker`] and a [`ResultStore`],
//! all scoped to that one search. [`SearchClient`] owns at most one session
//! and cancels the running one before starting the next.
//!
//! # States
//!
//! ```text
//!          start             final results
//! Idle ───────────▶ Running ───────────────▶ Completed
//!                     │  │
//!      cancel/supersede│  │transport or protocol error
//!                     ▼  ▼
//!               Cancelled  Failed
//! ```
//!
//! Completed, Cancelled and Failed are terminal. Frames dispatched to a
//! session in a terminal state are discarded. Entering any terminal state
//! drops the stream, which closes the underlying connection.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use price_scout_core::{
    Frame, FrameParser, ProjectedView, ResultItem, ResultStore, SearchError, SearchQuery,
    SourceDescriptor, SourceStatus, SourceStatusTracker, ViewParameters, ViewUpdate,
};

use crate::config::StreamConfig;
use crate::transport::{ChunkStream, SearchTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed
        )
    }
}

/// Notification produced while a session consumes its stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A source's status changed.
    Progress(SourceStatus),
    /// The final results frame was stored.
    Results { count: usize },
    /// The session reached a terminal state.
    Finished(SessionState),
}

/// Cancels one session from outside the task that drives it.
#[derive(Debug, Clone)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

enum Read {
    Cancelled,
    Chunk(Option<Result<Bytes, TransportError>>),
}

pub struct SearchSession {
    id: Uuid,
    query: SearchQuery,
    state: SessionState,
    tracker: SourceStatusTracker,
    store: ResultStore,
    parser: FrameParser,
    stream: Option<ChunkStream>,
    token: CancellationToken,
    error: Option<SearchError>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    pending: VecDeque<SessionEvent>,
}

impl SearchSession {
    fn new(query: SearchQuery, universe: &[SourceDescriptor], stream_config: &StreamConfig) -> Self {
        let parser = FrameParser::new()
            .with_success_marker(stream_config.success_marker.clone())
            .with_max_frame_bytes(stream_config.max_frame_bytes);
        Self {
            id: Uuid::new_v4(),
            store: ResultStore::new(query.text.clone(), query.sort_preference),
            tracker: SourceStatusTracker::new(universe),
            query,
            state: SessionState::Idle,
            parser,
            stream: None,
            token: CancellationToken::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
            pending: VecDeque::new(),
        }
    }

    fn attach(&mut self, stream: ChunkStream) {
        self.stream = Some(stream);
        self.state = SessionState::Running;
        info!(session = %self.id, query = %self.query.text, sort = %self.query.sort_preference, "search started");
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The error that moved the session to `Failed`, if any.
    pub fn error(&self) -> Option<&SearchError> {
        self.error.as_ref()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.token.clone())
    }

    pub fn status_snapshot(&self) -> Vec<SourceStatus> {
        self.tracker.snapshot()
    }

    pub fn progress_fraction(&self) -> f64 {
        self.tracker.progress_fraction()
    }

    pub fn completed_sources(&self) -> usize {
        self.tracker.completed_count()
    }

    pub fn expected_sources(&self) -> u64 {
        self.tracker.expected_total()
    }

    pub fn results(&self) -> Arc<[ResultItem]> {
        self.store.current_results()
    }

    pub fn has_results(&self) -> bool {
        self.store.has_results()
    }

    pub fn decode_errors(&self) -> u64 {
        self.parser.decode_errors()
    }

    /// Project the accumulated results with caller-owned parameters.
    ///
    /// Valid in every state: a failed session still shows whatever arrived.
    pub fn current_view(&self, params: &ViewParameters) -> ProjectedView {
        self.store.project_with(params)
    }

    /// Project with the session's stored view parameters.
    pub fn view(&self) -> ProjectedView {
        self.store.view()
    }

    pub fn view_parameters(&self) -> &ViewParameters {
        self.store.view_parameters()
    }

    /// Merge a filter/sort/page change and return the new projection.
    pub fn set_view_parameters(&mut self, update: &ViewUpdate) -> ProjectedView {
        self.store.set_view_parameters(update);
        self.store.view()
    }

    /// Stop the session. Synchronous, idempotent, and infallible; a session
    /// already in a terminal state is left untouched.
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.token.cancel();
        self.pending.clear();
        self.enter_terminal(SessionState::Cancelled);
        info!(session = %self.id, "search cancelled");
    }

    fn fail(&mut self, error: SearchError) {
        if self.state.is_terminal() {
            return;
        }
        warn!(session = %self.id, error = %error, "search failed");
        self.error = Some(error);
        self.enter_terminal(SessionState::Failed);
    }

    fn complete(&mut self) {
        self.enter_terminal(SessionState::Completed);
        info!(
            session = %self.id,
            results = self.store.current_results().len(),
            sources = self.tracker.completed_count(),
            decode_errors = self.parser.decode_errors(),
            "search completed"
        );
    }

    fn enter_terminal(&mut self, state: SessionState) {
        self.state = state;
        // Dropping the stream closes the connection.
        self.stream = None;
        self.finished_at = Some(Utc::now());
        self.pending.push_back(SessionEvent::Finished(state));
    }

    /// Apply one frame. Returns `false` when the frame was discarded because
    /// the session is not running.
    pub fn dispatch(&mut self, frame: Frame) -> bool {
        if self.state != SessionState::Running {
            debug!(session = %self.id, state = ?self.state, "discarding frame for inactive session");
            return false;
        }
        match frame {
            Frame::Progress(progress) => {
                if self.tracker.record_progress(&progress) {
                    if let Some(status) = self.tracker.get(&progress.source) {
                        debug!(
                            session = %self.id,
                            source = %status.source,
                            outcome = ?status.outcome,
                            results = status.result_count,
                            "source settled"
                        );
                        self.pending
                            .push_back(SessionEvent::Progress(status.clone()));
                    }
                }
            }
            Frame::FinalResults(items) => {
                let count = items.len();
                self.store.replace_results(items);
                self.pending.push_back(SessionEvent::Results { count });
                self.complete();
            }
        }
        true
    }

    fn dispatch_all(&mut self, frames: Vec<Frame>) {
        for frame in frames {
            if self.state != SessionState::Running {
                break;
            }
            self.dispatch(frame);
        }
    }

    /// Drive the session until it has something to report.
    ///
    /// Returns `None` once the session is terminal and every event has been
    /// drained. Reads race the cancellation token, and a chunk that arrives
    /// after cancellation was requested is dropped unprocessed.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.state != SessionState::Running {
                return None;
            }

            let read = match self.stream.as_mut() {
                Some(stream) => {
                    let token = self.token.clone();
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => Read::Cancelled,
                        chunk = stream.next() => Read::Chunk(chunk),
                    }
                }
                None => Read::Chunk(None),
            };

            match read {
                Read::Cancelled => self.cancel(),
                Read::Chunk(_) if self.token.is_cancelled() => self.cancel(),
                Read::Chunk(Some(Ok(bytes))) => {
                    let frames = self.parser.push(&bytes);
                    self.dispatch_all(frames);
                }
                Read::Chunk(Some(Err(e))) => self.fail(e.into()),
                Read::Chunk(None) => {
                    let frames = self.parser.finish();
                    self.dispatch_all(frames);
                    if self.state == SessionState::Running {
                        self.fail(SearchError::Protocol(
                            "stream ended before the results frame".to_string(),
                        ));
                    }
                }
            }
        }
    }

    /// Drain the session, calling `on_event` for every notification.
    pub async fn run_to_end<F>(&mut self, mut on_event: F) -> SessionState
    where
        F: FnMut(&SearchSession, &SessionEvent),
    {
        while let Some(event) = self.next_event().await {
            on_event(self, &event);
        }
        self.state
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.to_string(),
            query: self.query.text.clone(),
            sort: self.query.sort_preference.as_wire().to_string(),
            state: self.state,
            started_at: self.started_at,
            finished_at: self.finished_at,
            sources_completed: self.tracker.completed_count(),
            sources_expected: self.tracker.expected_total(),
            results: self.store.current_results().len(),
            decode_errors: self.parser.decode_errors(),
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Machine-readable session outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub query: String,
    pub sort: String,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub sources_completed: usize,
    pub sources_expected: u64,
    pub results: usize,
    pub decode_errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Owns the transport and at most one session.
pub struct SearchClient<T: SearchTransport> {
    transport: T,
    universe: Vec<SourceDescriptor>,
    stream_config: StreamConfig,
    current: Option<SearchSession>,
}

impl<T: SearchTransport> SearchClient<T> {
    pub fn new(transport: T, universe: Vec<SourceDescriptor>, stream_config: StreamConfig) -> Self {
        Self {
            transport,
            universe,
            stream_config,
            current: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start a new search, cancelling and discarding the current one.
    ///
    /// Only an empty query is an error. A transport that fails to open
    /// yields a session already in `Failed`.
    pub async fn start(&mut self, query: SearchQuery) -> Result<&mut SearchSession, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "search text must not be empty".to_string(),
            ));
        }

        if let Some(mut previous) = self.current.take() {
            if previous.state() == SessionState::Running {
                info!(session = %previous.id(), "superseding running search");
            }
            previous.cancel();
        }

        let mut session = SearchSession::new(query, &self.universe, &self.stream_config);
        match self.transport.open(session.query()).await {
            Ok(stream) => session.attach(stream),
            Err(e) => session.fail(e.into()),
        }
        Ok(self.current.insert(session))
    }

    /// Cancel the current session, if any. Never fails.
    pub fn cancel(&mut self) {
        if let Some(session) = self.current.as_mut() {
            session.cancel();
        }
    }

    pub fn state(&self) -> SessionState {
        self.current
            .as_ref()
            .map_or(SessionState::Idle, SearchSession::state)
    }

    pub fn session(&self) -> Option<&SearchSession> {
        self.current.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut SearchSession> {
        self.current.as_mut()
    }

    pub fn status_snapshot(&self) -> Vec<SourceStatus> {
        match &self.current {
            Some(session) => session.status_snapshot(),
            None => SourceStatusTracker::new(&self.universe).snapshot(),
        }
    }

    pub fn current_view(&self, params: &ViewParameters) -> ProjectedView {
        match &self.current {
            Some(session) => session.current_view(params),
            None => price_scout_core::project(&[], params, ""),
        }
    }
}
