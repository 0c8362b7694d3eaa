//! Protocol implementation module
//!
//! This module defines the IPK25-CHAT message model, both wire encodings,
//! the TCP line framing and the session state machine.

pub mod binary;
pub mod codec;
pub mod command;
pub mod message;
pub mod state;
pub mod text;

pub use self::binary::Frame;
pub use self::codec::LineCodec;
pub use self::command::Command;
pub use self::message::Message;
pub use self::state::{Action, CloseReason, ProtocolState, SessionState};
