//! Core of the iot32-node firmware.
//!
//! Everything here is hardware-independent and runs on the host: the event
//! queue, the connection state machine, button edge marshalling, and the
//! sampling / notification pipeline. The radio, the magnetometer and the
//! characteristic transport are reached only through the `Radio`,
//! `Magnetometer` and `Transport` traits.
//!
//! Usage: `cargo test --lib`
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and provides the nRF52840 / SoftDevice implementations of those traits.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod connection;
pub mod error;
pub mod marshal;
pub mod node;
pub mod publisher;
pub mod sampler;
pub mod scheduler;
pub mod sensors;

pub mod ble {
    pub mod adv_builder;
}

pub use connection::{ConnectionState, ConnectionStateMachine, Radio, RadioEvent};
pub use error::{Error, RadioError, SensorError, TransportError};
pub use marshal::{ButtonIrq, PendingButton};
pub use node::{SensorNode, Work};
pub use publisher::{Publisher, Transport};
pub use sampler::{Magnetometer, Sampler};
pub use scheduler::{Context, Dispatch, EventQueue, Inbox, IrqPost, IrqWork, Millis, Timebase};
pub use sensors::{ChannelId, SensorSnapshot, Signal, SignalValue};

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests - node wiring through the scheduler
// ═══════════════════════════════════════════════════════════════════════════
