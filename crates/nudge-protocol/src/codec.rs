use thiserror::Error;

use crate::frames::{Inbound, Outbound};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Empty => "EMPTY_MESSAGE",
            ProtocolError::Malformed(_) => "MALFORMED_MESSAGE",
        }
    }
}

/// Parse one line of input. Surrounding whitespace is ignored.
pub fn decode_line(line: &str) -> Result<Inbound, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

/// Serialize one message as a single line, without the trailing newline.
pub fn encode(message: &Outbound) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}
