//! Pure game-state reducers projected from parsed Liqi server events.
//!
//! `GameState` is the only mutable piece; every reducer here is a plain
//! function `(&mut GameState, ...) -> ()`. No reducer performs I/O, reads
//! the wall clock, or touches ambient randomness — callers own when and
//! how often to invoke them.

pub mod model;
pub mod patch;
pub mod pool;
pub mod reducers;

pub use model::{Amulet, GameState, Good, Stage, Target, TargetKind};
pub use reducers::apply_event;
