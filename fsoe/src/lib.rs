//! # FSoE
//!
//! This library implements the Fail-Safe over EtherCAT (ETG.5100) safety
//! layer: the master and slave state machines that turn an unreliable
//! "black channel" into a watchdog- and CRC-protected exchange of fixed-size
//! safe process data. It targets `no_std` environments, uses no dynamic
//! memory allocation and runs single-threaded: each endpoint is advanced by
//! one explicit synchronisation call per tick.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐                      ┌─────────────┐
//! │   Master    │                      │    Slave    │
//! │  sync tick  │                      │  sync tick  │
//! └──────┬──────┘                      └──────┬──────┘
//!        ▼                                    ▼
//! ┌─────────────┐   safety PDUs (opaque) ┌─────────────┐
//! │ Link (black │ ◄────────────────────► │ Link (black │
//! │  channel)   │    lossy, duplicating, │  channel)   │
//! └─────────────┘    corrupting          └─────────────┘
//! ```
//!
//! Components:
//! * _Master_ drives connection establishment (Session → Connection →
//!   Parameter → Data) and the cyclic data exchange.
//! * _Slave_ is the responder: it validates, echoes and follows the master's
//!   commands.
//! * _Link_ is the caller-implemented black channel plus the platform
//!   services the stack cannot portably provide itself (session ID entropy,
//!   slave-side parameter verification). See the `fsoe-driver` crate.
//! * The monotonic clock behind the watchdog timers comes from the
//!   `embassy-time` driver the integrator links in.
//!
//! Every frame is authenticated by per-word CRCs bound to both endpoints'
//! random session IDs through a rolling seed, and to a virtual sequence
//! number that never appears on the wire. The stack assumes nothing about
//! the transport; corruption, duplication and replay are caught by these
//! checks, silence by the watchdog.
//!
//! ## Concurrency model
//!
//! Endpoints are not thread-safe and are meant to be owned by the thread (or
//! task) that drives them. Nothing blocks inside a synchronisation call;
//! the black channel callbacks must be non-blocking as well. Two endpoints
//! driven from the same thread are entirely independent.
//!
//! ## Feature flags
//!
//! * `defmt`: `defmt::Format` derives on public types and `defmt` logging
//! * `log`: logging through the `log` facade instead (`defmt` wins when
//!   both are enabled)
#![no_std]

pub use fsoe_core as core;
pub use fsoe_driver::{frame, link, time};

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

mod channel;
mod codec;
pub mod crc;
pub mod master;
pub mod slave;
pub mod sra;
mod watchdog;

pub use master::{Master, MasterConfig};
pub use slave::{Slave, SlaveConfig};
