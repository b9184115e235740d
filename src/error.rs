//! Error kinds surfaced by the console core.
//!
//! `MalformedCommand` and `NotConnected` are local: the console reports them
//! and the session stays as it is. `MalformedFrame` and `Transport` end the
//! connection.

use std::io;

use thiserror::Error;

use crate::session::TransitionError;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("host not connected")]
    NotConnected,

    #[error("{0}")]
    Transport(#[from] io::Error),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl ConsoleError {
    /// Whether this error forces the connection closed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsoleError::MalformedFrame(_) | ConsoleError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
