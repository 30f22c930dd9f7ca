pub mod context;
pub mod main_loop;
pub mod state;

pub use context::{CycleContext, CycleOutcome};
pub use main_loop::{LoopSettings, MainLoop};
pub use state::CycleState;
