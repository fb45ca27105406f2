//! # Price Scout Core
//!
//! Runtime-free logic for incremental search-result aggregation: the NDJSON
//! frame parser, per-source status tracking, the result store, and the view
//! projector. Transport, sessions, and presentation live in the `price-scout`
//! crate.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O.

pub mod error;
pub mod frame;
pub mod models;
pub mod store;
pub mod tracker;
pub mod view;

pub use error::SearchError;
pub use frame::{Frame, FrameParser, Progress};
pub use models::{
    default_sources, Outcome, ResultItem, SearchQuery, SortOrder, SourceDescriptor, SourceId,
    SourceStatus,
};
pub use store::ResultStore;
pub use tracker::SourceStatusTracker;
pub use view::{
    page_window, project, PageLink, PageWindow, ProjectedView, ViewParameters, ViewUpdate,
    PAGE_SIZE,
};
