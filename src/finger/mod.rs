//! Finger protocol side
//!
//! - Request parsing and address defaults
//! - Resolution through the ActivityPub client
//! - Plain-text rendering
//! - TCP accept loop

mod address;
mod handler;
mod render;
mod server;

pub use address::Address;
pub use handler::{FingerHandler, FingerResponse};
pub use server::FingerServer;
