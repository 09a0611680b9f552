//! Voice-enabled case interview practice: a conversational turn engine with half-duplex
//! speech capture and playback, plus the terminal front-end that drives it.

mod app;
pub mod config;
pub mod devices;
mod lock;
pub mod render;
pub mod screen;
pub mod service;
pub mod speech;
mod telemetry;
pub mod terminal_restore;
pub mod turn;
pub mod ui;
pub mod voice;

pub use app::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
    log_timing,
};
pub(crate) use lock::lock_or_recover;
