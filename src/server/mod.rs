//! HTTP server for sleuth.
//!
//! Exposes research runs over JSON and server-sent events.
//!
//! # Feature Gate
//!
//! This module requires the `server` feature flag (on by default):
//! ```toml
//! [dependencies]
//! sleuth = { version = "...", features = ["server"] }
//! ```
//!
//! # Routes
//!
//! ```text
//! GET  /health           → "ok"
//! POST /api/chat         → RunResult JSON, or {error, code}
//! POST /api/chat/stream  → SSE: progress events…, result | error, done
//! ```

pub mod handlers;
pub mod params;
pub mod transport;

pub use handlers::{AppState, router, status_for};
pub use params::{ChatParams, DeepResearch, DeepResearchOptions};
pub use transport::{serve, serve_listener};
