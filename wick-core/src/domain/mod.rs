//! Domain types shared by the compiler and the reference runtime.

pub mod bar;
pub mod ids;
pub mod number;

pub use bar::Bar;
pub use ids::{EdgeId, NodeId, StrategyHash};
pub use number::format_number;
