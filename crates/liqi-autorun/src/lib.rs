//! PacketBot, AutoRunner, and the supporting planner/valuation/retry
//! utilities for automated play against the amulet roguelike's Liqi RPC
//! surface.
//!
//! [`packet_bot::PacketBot`] wraps `liqi-proxy`'s inject/wait primitives
//! with precondition checks; [`runner::AutoRunner`] drives it stage by
//! stage against [`liqi_state::GameState`] until the configured goal is
//! reached.

#![deny(unsafe_code)]

pub mod error;
pub mod packet_bot;
pub mod planner;
pub mod retry;
pub mod runner;
pub mod valuation;

pub use error::AutoRunError;
pub use packet_bot::PacketBot;
pub use planner::PlanStatus;
pub use runner::AutoRunner;
