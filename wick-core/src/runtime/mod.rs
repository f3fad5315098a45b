//! Reference runtime: interprets a `CompiledStrategy` bar by bar.
//!
//! No fills, cash or equity bookkeeping; this is the minimal execution model
//! needed to observe what a compiled strategy decides on a price history.

mod eval;
pub mod exits;
pub mod series;
pub mod session;
mod sizing;

pub use exits::{ExitSignal, ExitState};
pub use series::{SeriesError, SeriesSet};
pub use session::{replay, Decision, Session};
