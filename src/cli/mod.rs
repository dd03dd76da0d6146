//! CLI command implementations

mod check;
mod run;

pub use check::run_check;
pub use run::{RunOptions, run_service};
