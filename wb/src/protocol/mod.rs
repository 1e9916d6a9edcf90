//! Wire protocol shared by windows and external clients
//!
//! Every message is an [`Envelope`] serialized as one JSON object and framed
//! with a 4-byte length prefix:
//!
//! ```text
//! [4 bytes: body length (little-endian u32)][N bytes: UTF-8 JSON envelope]
//! ```
//!
//! Window-to-window traffic uses the same envelopes as the external client;
//! the relay commands in [`ControlCommand`] carry forwarded results and
//! snippets between a Secondary and the Primary.

mod codes;
mod commands;
mod envelope;
mod frame;

pub use codes::ErrorCode;
pub use commands::{
    ControlCommand, ForwardedResponse, RegisterTargetPayload, SNIPPET_PUSH, SecondaryPayload, SnippetPayload,
    SnippetRelay,
};
pub use envelope::{Envelope, MessageType, PROTOCOL_VERSION, error_payload, payload_succeeded, success_payload};
pub use frame::{DEFAULT_MAX_FRAME_BYTES, FrameError, read_frame, write_frame};
