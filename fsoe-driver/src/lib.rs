//! FSoE black-channel driver interface
//!
//! The crate provides the interface between a black-channel transport adapter
//! and the FSoE stack. Limited scope facilitates compatibility across
//! versions. Transport adapter crates should depend on this crate. FSoE stack
//! users should depend on the `fsoe` crate instead.
//!
//! The safety layer assumes nothing about the transport below it: frames may
//! be lost, duplicated, reordered or corrupted. All integrity guarantees come
//! from the CRC and sequence checks inside the stack. The transport only has
//! to move opaque, fixed-size safety PDUs in both directions:
//!
//! ```text
//!      |  |  |  Endpoint API (fsoe crate):
//!      |  |  |  - Master::sync_with_slave()
//!      v  v  v  - Slave::sync_with_master() etc.
//!    -----------
//!    |         |
//!    | FSoE    |
//!    | stack   |
//!    |         |
//!    -----------
//!      |     | Black channel API (this crate):
//!      |     | - Link::send()
//!      v     v - Link::recv()
//!    -----------
//!    |         |
//!    | Black   |
//!    | channel |
//!    |         |
//!    -----------
//! ```
//!
//! On an EtherCAT device the adapter typically copies frames to and from the
//! process data image; in tests it is a pair of in-memory slots. Both `send`
//! and `recv` must be non-blocking: the stack is advanced by one explicit
//! synchronisation call per tick and never waits inside a call.
//!
//! The `Link` trait also carries the platform services the stack cannot
//! provide itself in a portable way: session ID entropy and (for slaves)
//! application parameter verification. The monotonic clock is supplied
//! through the `embassy-time` driver mechanism, re-exported as [`time`].
#![no_std]

pub mod frame;
pub mod link;

pub mod time {
    pub use embassy_time::{Duration, Instant};
}
