//! # Saga Rules
//!
//! The authoritative rules crate: characters, dice checks, the damage model, the
//! combat state machine and story bookkeeping. It holds the single source of
//! truth for game state and contains no AI logic and no I/O.

pub mod config;
pub mod entities;
pub mod error;
pub mod mechanics;
pub mod world_state;

pub use config::*;
pub use entities::*;
pub use error::*;
pub use mechanics::*;
pub use world_state::*;
