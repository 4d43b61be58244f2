//! # momentary-domain
//!
//! Pure domain model for momentary switches.
//!
//! ## Responsibilities
//! - Foundational types: unique ids, error conventions, timestamps
//! - Define **switch definitions** and the `toggle_for` duration encodings
//! - Define the **timed-toggle state machine** of a single switch
//! - Define **identity records** and the reload reconciliation
//! - Define the **legacy migration** as a pure function
//! - Define **services** and **events**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod slug;
pub mod time;

pub mod duration;
pub mod event;
pub mod identity;
pub mod migration;
pub mod momentary;
pub mod service;
pub mod switch;
