/*
[INPUT]:  Public API exports for deribit-user-stream crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod consumer;

pub use crate::config::StreamConfig;
pub use crate::consumer::forward_events;
