//! Consult API Library Crate
//!
//! This library contains the web service around `consult-core`: configuration,
//! provider binding, conversation storage, REST handlers, the live WebSocket
//! session and routing. The binaries are thin wrappers around it.

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod router;
pub mod simulation;
pub mod state;
pub mod store;
pub mod ws;
