//! # Saga Core
//!
//! The turn engine. It talks to the narrative generator, treats everything
//! the generator returns as untrusted, and reconciles it with the
//! authoritative state held by `saga_rules`.
//!
//! ## Core Components
//!
//! - **changes**: the state-change bag and its sanitizing projection
//! - **context_assembler**: builds the prompt context and pacing guidance
//! - **narrative**: the generator port, response parsing and bounded retry
//! - **turn**: the turn orchestrator
//! - **reconciler**: applies a turn's changes to the single source of truth
//! - **session**: one character's play session, turn gating and auto-save
//! - **persist**: save stores, save migration and corrupt-save recovery
//!
//! ## Design Philosophy
//!
//! - **Untrusted Input**: generated JSON never touches state before it is sanitized
//! - **Rules Win**: damage and combat arithmetic are computed locally and
//!   override generated numbers
//! - **Event-Driven**: reconciliation reports what happened as events for the UI

pub mod changes;
pub mod config;
pub mod context_assembler;
pub mod events;
pub mod game_state;
pub mod memory;
pub mod narrative;
pub mod persist;
pub mod reconciler;
pub mod session;
pub mod turn;

pub use changes::*;
pub use config::*;
pub use context_assembler::*;
pub use events::*;
pub use game_state::*;
pub use memory::*;
pub use narrative::*;
pub use persist::*;
pub use reconciler::*;
pub use session::*;
pub use turn::*;
