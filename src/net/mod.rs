//! Connection seam between this subsystem and the host server's transport.

pub mod connection;

pub use connection::{Connection, ConnectionId, PlayerInfo};
