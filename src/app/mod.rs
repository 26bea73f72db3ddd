//! Application runtime composition modules.

pub(crate) mod config_runtime;
pub(crate) mod exit_handler;
pub(crate) mod output;
pub(crate) mod progress_manager;
pub(crate) mod runtime;
pub(crate) mod terminal;
