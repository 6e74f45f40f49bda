#![forbid(unsafe_code)]

//! Lucky Draw core
//!
//! The draw state machine and supporting state of a desktop lottery
//! application: participant roster, draw configuration, winner
//! selection, session history and the persistence boundary. The GUI
//! shell renders what this crate computes and relays user intents
//! (start/stop/reset/configure) back into [`DrawEngine`]; nothing in
//! here depends on rendering, timers or a windowing system.

pub mod config;
pub mod constants;
pub mod engine;
pub mod history;
pub mod import;
pub mod persistence;
pub mod roster;

// Re-export commonly used types
pub use config::{ClassicMethod, DrawConfig, DrawMode, TournamentRound};
pub use engine::{DrawEngine, DrawPhase};
pub use history::{HistoryRecord, RoundResult};
pub use import::{ImportReport, ImportedEntry};
pub use persistence::{FileStore, PersistedState, StorePort};
pub use roster::{Participant, Roster};
