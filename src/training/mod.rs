//! Training mode: many fully isolated single-player arenas, each with its own
//! tick loop and bot population, created per connection and idle-reaped.

pub mod multiplexer;
pub mod session;

pub use multiplexer::{SessionHandle, SessionMultiplexer};
pub use session::{TrainingError, TrainingSession};
