//! Location-free Link State Routing (LLSR) MAC.
//!
//! A MAC block for multi-hop wireless sensor networks: beacons elect a next
//! hop toward the sink by hop count (ties broken by path quality), a
//! stop-and-wait ARQ channel is shared by data and in-band management
//! traffic, and non-sink nodes forward received packets back through the
//! ARQ queues toward the next hop. The sink additionally runs the
//! management plane from the companion `llsr-mgmt` crate.
//!
//! The crate is synchronous and runtime-free: the host feeds it radio
//! frames, application payloads and periodic control ticks under a single
//! lock, and drains the staged outbound frames after each call.

pub mod arq;
pub mod auth;
pub mod diag;
pub mod mac;
pub mod mib;
pub mod neighbor;
pub mod suppress;
pub mod wire;

pub use mac::{Mac, MacConfig};
pub use neighbor::RouteState;
pub use wire::{Packet, WireError};

/// The sink's fixed address.
pub const SINK_ADDR: u8 = 0;

/// Undefined/unset address value.
pub const UNDEF_ADDR: u8 = 255;
