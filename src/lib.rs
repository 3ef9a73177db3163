//! Authoritative game-state coordinator for a real-time, host-driven social
//! deduction game (a Werewolf/Mafia variant).
//!
//! One device — the Host — owns the game's data model, an explicit night-phase
//! state machine, a schema-driven action validator, per-recipient private
//! "reveal" messages, and a revision-stamped snapshot/resync protocol for
//! late joiners and reconnecting clients. Other devices are thin Players that
//! apply revisioned snapshots and filter their own private inbox.
#![warn(trivial_casts)]
#![forbid(unused_extern_crates, unused_import_braces)]

pub mod applier;
pub mod audio;
pub mod coordinator;
pub mod death;
pub mod error;
pub mod inbox;
pub mod night_flow;
pub mod protocol;
pub mod resolver;
pub mod roles;
pub mod state;
pub mod transport;
pub mod view_model;
pub mod wolf_vote;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::{CoordinatorError, NightFlowError, ProtocolError, ResolverError};
pub use roles::{Faction, Role, RoleSpec};
pub use state::{GameState, PlayerSlot, Status};
