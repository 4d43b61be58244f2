//! # momentary-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **JSON API** over the live switches
//!   (`/api/switches`, `/api/switches/{unique_id}/{service}`, `/api/reload`)
//! - Map HTTP requests into registry and setup service calls (driving adapter)
//! - Map [`MomentaryError`](momentary_domain::error::MomentaryError) into
//!   HTTP status codes
//!
//! ## Dependency rule
//! Depends on `momentary-app` (for port traits and services) and `momentary-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
