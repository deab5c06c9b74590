//! Game lifecycle: difficulty model, tap dispatch and the run state machine.

pub mod difficulty;
pub mod dispatch;
pub mod state;
