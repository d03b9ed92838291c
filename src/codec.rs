//! Wire codec
//!
//! Converts between `Message` and the text payload of a WebSocket frame.
//! The transport enforces its own size ceiling on the read path; the codec
//! re-checks it so that a frame handed in from any source is bounded.

use crate::error::CodecError;
use crate::message::{Action, Message};

/// Hard per-frame ceiling for inbound frames, in bytes
pub const MAX_FRAME_SIZE: usize = 512;

/// Encode a message as a JSON text frame
pub fn encode(msg: &Message) -> Result<String, CodecError> {
    if msg.action.as_str().is_empty() {
        return Err(CodecError::MissingAction);
    }
    Ok(serde_json::to_string(msg)?)
}

/// Decode an inbound text frame
///
/// Empty, oversized and malformed frames are rejected; there is no partial
/// recovery.
pub fn decode(frame: &str) -> Result<Message, CodecError> {
    if frame.trim().is_empty() {
        return Err(CodecError::Empty);
    }
    if frame.len() > MAX_FRAME_SIZE {
        return Err(CodecError::TooLarge {
            size: frame.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let msg: Message = serde_json::from_str(frame)?;
    if matches!(&msg.action, Action::Other(tag) if tag.is_empty()) {
        return Err(CodecError::MissingAction);
    }
    Ok(msg)
}
