//! `scout search` and `scout replay`: drive one session and render it.
//!
//! Both commands share [`drive`], which starts the session, forwards every
//! session event to the progress reporter, applies the view flags, and
//! prints the projected page on stdout. Ctrl-C and the optional deadline
//! cancel the session through its [`CancelHandle`](crate::session::CancelHandle).

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use price_scout_core::{
    Outcome, PageLink, PageWindow, ProjectedView, SearchError, SearchQuery, SortOrder, SourceId,
    SourceStatus, ViewUpdate,
};

use crate::config::Config;
use crate::progress::{format_number, ProgressMode};
use crate::session::{SearchClient, SessionState, SessionSummary};
use crate::transport::{HttpTransport, SearchTransport, StaticTransport};

/// View and runtime flags shared by `search` and `replay`.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub sort: SortOrder,
    pub source: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub page: usize,
    /// Caller deadline; the session is cancelled when it expires.
    pub deadline: Option<Duration>,
    pub progress: ProgressMode,
    pub json: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            sort: SortOrder::None,
            source: None,
            min_price: None,
            max_price: None,
            page: 1,
            deadline: None,
            progress: ProgressMode::Off,
            json: false,
        }
    }
}

impl SearchOptions {
    fn selection(&self) -> ViewUpdate {
        ViewUpdate {
            source_filter: self.source.as_deref().map(|s| Some(SourceId::new(s))),
            price_min: self.min_price,
            price_max: self.max_price,
            ..ViewUpdate::default()
        }
    }
}

/// JSON document printed by `--json`.
#[derive(Debug, Serialize)]
pub struct SearchReport {
    pub session: SessionSummary,
    pub statuses: Vec<SourceStatus>,
    pub view: ProjectedView,
    pub window: PageWindow,
}

/// CLI entry point for `scout search`.
pub async fn run_search(config: &Config, query: &str, opts: &SearchOptions) -> Result<()> {
    let transport = HttpTransport::new(&config.endpoint)?;
    drive(config, transport, query, opts).await
}

/// CLI entry point for `scout replay`: run a recorded NDJSON body through
/// the full session pipeline, delivered in `chunk_size` reads.
pub async fn run_replay(
    config: &Config,
    file: &Path,
    query: &str,
    chunk_size: usize,
    opts: &SearchOptions,
) -> Result<()> {
    let body = std::fs::read(file)
        .with_context(|| format!("Failed to read recorded stream: {}", file.display()))?;
    let transport = StaticTransport::from_body(body, chunk_size);
    drive(config, transport, query, opts).await
}

async fn drive<T: SearchTransport>(
    config: &Config,
    transport: T,
    query: &str,
    opts: &SearchOptions,
) -> Result<()> {
    // Ctrl-C and the deadline are armed before the stream is opened so a
    // stalled connect can be interrupted too.
    let interrupt = CancellationToken::new();
    let watchers = spawn_interrupt_watchers(&interrupt, opts.deadline);

    let mut client = SearchClient::new(
        transport,
        config.sources.descriptors(),
        config.stream.clone(),
    );
    let started = tokio::select! {
        started = client.start(SearchQuery::new(query, opts.sort)) => Some(started),
        _ = interrupt.cancelled() => None,
    };
    let session = match started {
        Some(Ok(session)) => session,
        Some(Err(SearchError::InvalidQuery(reason))) => {
            abort_all(watchers);
            bail!("Invalid query: {}", reason);
        }
        Some(Err(e)) => {
            abort_all(watchers);
            return Err(e.into());
        }
        None => {
            abort_all(watchers);
            debug!("search interrupted while opening the stream");
            if opts.json {
                println!("{}", serde_json::json!({ "state": SessionState::Cancelled }));
            } else {
                println!("Search cancelled.");
            }
            return Ok(());
        }
    };

    let handle = session.cancel_handle();
    let link = tokio::spawn({
        let interrupt = interrupt.clone();
        async move {
            interrupt.cancelled().await;
            handle.cancel();
        }
    });

    let reporter = opts.progress.reporter();
    let state = session
        .run_to_end(|session, event| reporter.report(session, event))
        .await;

    link.abort();
    abort_all(watchers);

    session.set_view_parameters(&opts.selection());
    let view = session.set_view_parameters(&ViewUpdate::page(opts.page));

    if opts.json {
        let report = SearchReport {
            session: session.summary(),
            statuses: session.status_snapshot(),
            window: view.window(),
            view,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_status_panel(&session.status_snapshot()));
        println!();
        match state {
            SessionState::Cancelled => println!("Search cancelled."),
            _ => {
                print!("{}", render_view(&view));
                let window = render_window(&view.window());
                if !window.is_empty() {
                    println!("{}", window);
                }
            }
        }
    }

    if state == SessionState::Failed {
        let reason = session
            .error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        bail!("Search failed: {}", reason);
    }
    Ok(())
}

fn spawn_interrupt_watchers(
    interrupt: &CancellationToken,
    deadline: Option<Duration>,
) -> Vec<JoinHandle<()>> {
    let mut watchers = vec![tokio::spawn({
        let interrupt = interrupt.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.cancel();
            }
        }
    })];
    if let Some(limit) = deadline {
        let interrupt = interrupt.clone();
        watchers.push(tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            debug!(?limit, "search deadline reached");
            interrupt.cancel();
        }));
    }
    watchers
}

fn abort_all(watchers: Vec<JoinHandle<()>>) {
    for task in watchers {
        task.abort();
    }
}

/// Fixed status panel: one row per known store, pending ones included.
pub fn render_status_panel(statuses: &[SourceStatus]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<14} {:<20} {:>8} {:>8}", "STORE", "STATUS", "RESULTS", "TIME");
    for s in statuses {
        let (status, results, time) = match s.outcome {
            Outcome::Pending => ("pending".to_string(), "-".to_string(), "-".to_string()),
            Outcome::Ok => (
                "✓".to_string(),
                format_number(s.result_count),
                format!("{:.2}s", s.elapsed_seconds),
            ),
            Outcome::Failed => (
                format!("✗ {}", s.detail.as_deref().unwrap_or("failed")),
                format_number(s.result_count),
                format!("{:.2}s", s.elapsed_seconds),
            ),
        };
        let _ = writeln!(
            out,
            "{:<14} {:<20} {:>8} {:>8}",
            s.display_name, status, results, time
        );
    }
    out
}

/// One page of results with a range header.
pub fn render_view(view: &ProjectedView) -> String {
    let mut out = String::new();
    if view.total_matching == 0 {
        out.push_str("No results.\n");
        return out;
    }

    let first = (view.page - 1) * price_scout_core::PAGE_SIZE + 1;
    let last = first + view.page_items.len() - 1;
    let _ = writeln!(
        out,
        "Showing {}-{} of {} results (page {} of {})",
        first,
        last,
        format_number(view.total_matching as u64),
        view.page,
        view.total_pages
    );
    for (offset, item) in view.page_items.iter().enumerate() {
        let discount = item
            .discount_percent
            .map(|d| format!("  -{}%", d))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:>4}. S/ {:>10.2}{}  {}  [{}]",
            first + offset,
            item.price,
            discount,
            item.name,
            item.source
        );
        if !item.detail_url.is_empty() {
            let _ = writeln!(out, "      {}", item.detail_url);
        }
    }
    out
}

/// Pagination control as text: `« 1 … 4 5 [6] 7 8 … 12 »`.
pub fn render_window(window: &PageWindow) -> String {
    if window.links.is_empty() {
        return String::new();
    }
    let mut parts = Vec::with_capacity(window.links.len() + 2);
    if window.prev.is_some() {
        parts.push("«".to_string());
    }
    for link in &window.links {
        parts.push(match link {
            PageLink::Page(n) => n.to_string(),
            PageLink::Current(n) => format!("[{}]", n),
            PageLink::Ellipsis => "…".to_string(),
        });
    }
    if window.next.is_some() {
        parts.push("»".to_string());
    }
    format!("Pages: {}", parts.join(" "))
}
