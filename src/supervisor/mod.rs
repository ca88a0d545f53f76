//! Supervisor module owning the watch tasks of a run.

mod error;
mod runner;
mod status;

pub use error::*;
pub use runner::*;
pub use status::*;
