//! Durable, priority-aware broker sitting between a producer of proving work
//! and a pool of distributed worker processes.

pub mod config;
pub mod module;
pub mod service;
