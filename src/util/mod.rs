pub mod grid;
pub mod timer;
