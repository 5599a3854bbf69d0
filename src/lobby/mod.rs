//! Matchmaking: connection pooling, bet matching and the
//! countdown/versus/active lifecycle.

pub mod orchestrator;
pub mod status;

pub use orchestrator::{MatchOrchestrator, RegistrationError};
pub use status::{MatchState, MatchStatus};
