//! Autonomous opponents: stub connections, per-bot decision engines and the
//! population controller that keeps an arena stocked to a target count.

pub mod bot;
pub mod controller;
pub mod engine;
pub mod link;
pub mod loop_detector;
pub mod spatial;

pub use bot::Bot;
pub use controller::BotPopulationController;
pub use engine::{BehaviorMode, BotDecisionEngine};
pub use link::BotLink;
pub use loop_detector::LoopDetector;
pub use spatial::SpatialIndex;
