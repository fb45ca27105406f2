//! # Price Scout
//!
//! Incremental aggregation of product-search results streamed by a
//! multi-store price backend.
//!
//! One search opens a single streaming HTTP response. The backend emits a
//! progress frame as each store finishes and one final frame with the merged
//! results. Price Scout decodes that stream incrementally, keeps a per-store
//! status panel current, and projects the final results through a
//! filter/sort/paginate pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌───────────────┐
//! │  Transport   │──▶│ FrameParser │──▶│ SearchSession │
//! │ HTTP/replay  │   │  (NDJSON)   │   │ tracker+store │
//! └──────────────┘   └─────────────┘   └───────┬───────┘
//!                                              │
//!                                              ▼
//!                                      ┌───────────────┐
//!                                      │ ViewProjector │
//!                                      │  CLI render   │
//!                                      └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scout sources                              # list the store universe
//! scout search "zapatillas" --sort priceAsc  # stream one search
//! scout replay recorded.ndjson "zapatillas"  # re-run a captured stream
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`transport`] | HTTP and recorded stream transports |
//! | [`session`] | Search session state machine and supersession |
//! | [`progress`] | Progress reporters (human / JSON on stderr) |
//! | [`search`] | `search` and `replay` commands, text rendering |
//! | [`sources`] | `sources` command |
//! | [`subscribe`] | Price-alert subscription client |
//!
//! Frame decoding, status tracking, the result store, and view projection
//! live in `price_scout_core`.

pub mod config;
pub mod progress;
pub mod search;
pub mod session;
pub mod sources;
pub mod subscribe;
pub mod transport;
