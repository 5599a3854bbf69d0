//! Gridclaim matchmaking and bot subsystem.
//!
//! Real-time matchmaking, session lifecycle and autonomous opponents for a
//! territory-capture arena game: the match orchestrator pools connections and
//! runs the countdown/versus/active lifecycle, the bot population controller
//! keeps arenas stocked with autonomous players, and the session multiplexer
//! manages isolated single-player training arenas. The tile engine proper and
//! the wire transport are the host server's concern, consumed through the
//! [`arena::ArenaEngine`] and [`net::Connection`] seams.

pub mod arena;
pub mod bots;
pub mod config;
pub mod constants;
pub mod lobby;
pub mod metrics;
pub mod net;
pub mod training;
pub mod util;
