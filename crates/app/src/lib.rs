//! # momentary-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `ReversionScheduler`: run and cancel deferred reversions
//!   - `SwitchConfigStore`: the versioned switches file
//!   - `IdentityRepository`: the name → unique id store
//!   - `LegacyConfigSource`: platform-style entries of the host configuration
//!   - `EventPublisher`: switch events
//! - Run the switches: `SwitchEntity` binds the pure state machine to a
//!   scheduler, `SwitchRegistry` owns the live set
//! - Orchestrate migration and reloads in `SetupService`
//! - Provide **in-process infrastructure** (event bus, manual scheduler) that
//!   doesn't need IO
//!
//! ## Dependency rule
//! Depends on `momentary-domain` only (plus `tokio::sync` for channels and
//! the reload lock). Never imports adapter crates. Adapters depend on *this*
//! crate, not the reverse.

pub mod event_bus;
pub mod manual_scheduler;
pub mod ports;
pub mod services;
