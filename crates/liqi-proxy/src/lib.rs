//! MITM hook engine, waiter registry and per-flow addon context for the
//! Liqi wire protocol.
//!
//! [`addon::Addon`] owns one [`liqi_wire::Codec`] and one
//! [`waiter::WaiterRegistry`] per live flow, runs the hook pipeline on
//! every message, and exposes the `inject` primitive that the automation
//! layer (`liqi-autorun`) builds on.

#![deny(unsafe_code)]

pub mod addon;
pub mod error;
pub mod hook;
pub mod host;
pub mod waiter;

pub use addon::{Addon, Flow};
pub use hook::{BaseAction, Hook, HookOutcome, InjectSpec};
pub use host::{AutorunConfig, ConfigSource, FuseFlags, InjectHost, StateBroadcaster};
pub use waiter::WaiterRegistry;
