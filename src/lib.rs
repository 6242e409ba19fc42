//! Keeps a workstation from going idle by periodically asserting activity,
//! while an interactive console lets the user pause, resume, or inspect the
//! service without restarting it.
//!

pub mod cli;
pub mod console;
pub mod platform;
pub mod service;
pub mod utils;
