//! Per-connection session state: connection lifecycle and prompt mode.
//!
//! ```text
//! Disconnected --Connect--> Connecting --SocketConnected--> Connected(Idle)
//! Connecting   --SocketError--> Disconnected
//! Connected    --SocketDisconnected | SocketError--> Disconnected
//! Connected(Idle)  --Break--> Connected(Break)
//! Connected(Break) --Resume--> Connected(Idle)
//! any          --DisconnectRequested--> Disconnected
//! ```
//!
//! A session is owned by exactly one console and is never shared between
//! tasks, so it carries no locking.

use std::fmt;

use thiserror::Error;

/// Connection lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// A connect attempt to `addr` is in flight.
    Connecting { addr: String },
    Connected,
}

impl ConnectionState {
    fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting { .. } => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

/// Which prompt the host is waiting at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptMode {
    #[default]
    Idle,
    /// Execution is suspended on the host.
    Break,
}

/// Where the host suspended execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakLocation {
    pub file: String,
    pub line: u32,
}

impl BreakLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for BreakLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connect { addr: String },
    SocketConnected,
    SocketError,
    SocketDisconnected,
    /// The host suspended execution. The location is absent when the break
    /// was signalled by a local prompt directive.
    Break(Option<BreakLocation>),
    Resume,
    DisconnectRequested,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::Connect { .. } => "connect",
            SessionEvent::SocketConnected => "complete connect",
            SessionEvent::SocketError => "report socket error",
            SessionEvent::SocketDisconnected => "report socket close",
            SessionEvent::Break(_) => "break",
            SessionEvent::Resume => "resume",
            SessionEvent::DisconnectRequested => "disconnect",
        }
    }
}

/// An event arrived in a state that has no transition for it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot {event} while {state}")]
pub struct TransitionError {
    pub state: &'static str,
    pub event: &'static str,
}

#[derive(Debug, Default)]
pub struct Session {
    state: ConnectionState,
    prompt_mode: PromptMode,
    break_location: Option<BreakLocation>,
}

impl Session {
    /// A fresh, disconnected session.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn prompt_mode(&self) -> PromptMode {
        self.prompt_mode
    }

    /// Set only while in [`PromptMode::Break`].
    pub fn break_location(&self) -> Option<&BreakLocation> {
        self.break_location.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_disconnected(&self) -> bool {
        self.state == ConnectionState::Disconnected
    }

    /// Apply one event, returning an error (and leaving the session
    /// untouched) when the current state has no transition for it.
    pub fn apply(&mut self, event: SessionEvent) -> Result<(), TransitionError> {
        let rejected = TransitionError {
            state: self.state.name(),
            event: event.name(),
        };

        match event {
            SessionEvent::Connect { addr } if self.is_disconnected() => {
                tracing::debug!(%addr, "session connecting");
                self.state = ConnectionState::Connecting { addr };
            }
            SessionEvent::SocketConnected
                if matches!(self.state, ConnectionState::Connecting { .. }) =>
            {
                tracing::debug!("session connected");
                self.state = ConnectionState::Connected;
                self.prompt_mode = PromptMode::Idle;
                self.break_location = None;
            }
            SessionEvent::SocketError | SessionEvent::SocketDisconnected
                if !self.is_disconnected() =>
            {
                tracing::debug!(from = self.state.name(), "session lost connection");
                self.state = ConnectionState::Disconnected;
            }
            SessionEvent::Break(location) if self.is_connected() => {
                tracing::debug!(location = ?location, "session entered break");
                self.prompt_mode = PromptMode::Break;
                self.break_location = location;
            }
            SessionEvent::Resume if self.is_connected() => {
                tracing::debug!("session resumed");
                self.prompt_mode = PromptMode::Idle;
                self.break_location = None;
            }
            SessionEvent::DisconnectRequested => {
                tracing::debug!(from = self.state.name(), "session disconnect requested");
                self.state = ConnectionState::Disconnected;
            }
            _ => return Err(rejected),
        }
        Ok(())
    }
}
