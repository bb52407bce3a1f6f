//! `nudge-protocol`: messages exchanged with a presentation client.
//!
//! Every message is one JSON object tagged by `type`, sent one per line.
//! [`frames::Inbound`] covers user intents and notification answers;
//! [`frames::Outbound`] covers list updates, notification requests and
//! advisory errors.

pub mod codec;
pub mod frames;

pub use codec::{decode_line, encode, ProtocolError};
pub use frames::{Inbound, Outbound};
