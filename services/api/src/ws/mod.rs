//! WebSocket Live Simulation
//!
//! Runs one simulated visit per connection and streams it to the client as
//! it is produced. It is structured into submodules:
//!
//! - `protocol`: Defines the JSON message format for client-server communication.
//! - `session`: Manages the connection lifecycle, from `start` to the saved transcript.
//! - `voice`: Synthesizes speech for finalized turns in the background.

pub mod protocol;
pub mod session;
mod voice;

pub use session::ws_handler;
