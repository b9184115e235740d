//! The console controller.
//!
//! Owns one [`Session`], its [`FrameCodec`] and the view, and turns UI and
//! transport events into state changes and display directives. It performs
//! no I/O: outbound frames are handed back to the caller, which owns the
//! socket (see [`crate::transport`]).

use std::io;

use bytes::Bytes;

use crate::config::ConsoleConfig;
use crate::dispatch::{Directive, Dispatcher, Flow, WireConvention, DIRECTIVE_MARKER};
use crate::error::{ConsoleError, Result};
use crate::protocol::{self, FrameCodec};
use crate::session::{Session, SessionEvent};
use crate::view::ConsoleView;

pub struct Console<V> {
    config: ConsoleConfig,
    session: Session,
    codec: FrameCodec,
    dispatcher: Dispatcher,
    view: V,
}

impl<V: ConsoleView> Console<V> {
    pub fn new(config: ConsoleConfig, view: V) -> Self {
        let dispatcher = Dispatcher::new(config.convention, config.prompts());
        let codec = FrameCodec::with_max_payload(config.max_payload);
        Self {
            config,
            session: Session::new(),
            codec,
            dispatcher,
            view,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// Show the initial prompt.
    pub fn start(&mut self) {
        self.view.set_prompt_text(&self.config.idle_prompt);
        self.view.show_prompt();
    }

    /// The UI asked to connect. Returns the address to dial.
    pub fn request_connect(&mut self, host: &str, port: u16) -> Result<String> {
        let addr = format!("{host}:{port}");
        self.session.apply(SessionEvent::Connect { addr: addr.clone() })?;
        self.view.append_line(&format!("Connect to {addr}"));
        Ok(addr)
    }

    /// The transport finished connecting.
    pub fn on_connected(&mut self) -> Result<()> {
        self.session.apply(SessionEvent::SocketConnected)?;
        self.codec.reset();
        tracing::info!("connected to debugger host");
        self.view.append_line("Host connected");
        self.view.append_line("Type 'start' to continue game");
        self.view.set_prompt_text(&self.config.idle_prompt);
        self.view.show_prompt();
        Ok(())
    }

    /// The connect attempt failed.
    pub fn on_connect_failed(&mut self, err: io::Error) {
        self.fail(ConsoleError::Transport(err));
    }

    /// The socket failed after connecting.
    pub fn on_transport_error(&mut self, err: io::Error) {
        self.fail(ConsoleError::Transport(err));
    }

    /// The peer closed the socket.
    pub fn on_socket_closed(&mut self) {
        self.codec.reset();
        if self.session.apply(SessionEvent::SocketDisconnected).is_ok() {
            tracing::info!("debugger host disconnected");
            self.view.append_line("Host disconnected");
            self.view.show_prompt();
        }
    }

    /// Bytes arrived from the socket.
    ///
    /// Returns [`Flow::Close`] when the connection must be dropped, either
    /// because the host asked for it or because the stream is malformed.
    /// The session is already `Disconnected` in that case.
    pub fn receive(&mut self, data: &[u8]) -> Flow {
        if !self.session.is_connected() {
            tracing::warn!(len = data.len(), "dropping bytes received while not connected");
            return Flow::Continue;
        }

        let mut fatal = None;
        for item in self.codec.feed(data) {
            let outcome = item.and_then(|payload| {
                tracing::trace!(len = payload.len(), "frame received");
                self.dispatcher
                    .handle(&payload, &mut self.session, &mut self.view)
            });
            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Close) => {
                    let _ = self.session.apply(SessionEvent::SocketDisconnected);
                    break;
                }
                Err(e) if e.is_fatal() => {
                    fatal = Some(e);
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "bad command from host");
                    report(&mut self.view, &e);
                }
            }
        }

        if let Some(e) = fatal {
            self.fail(e);
        }
        if self.session.is_connected() {
            Flow::Continue
        } else {
            self.codec.reset();
            Flow::Close
        }
    }

    /// The user submitted a line. Returns the frame to write, if any.
    ///
    /// Empty lines and local directives produce no frame. While not
    /// connected the line is rejected with `NotConnected`.
    pub fn submit(&mut self, line: &str) -> Result<Option<Bytes>> {
        if line.is_empty() {
            self.view.show_prompt();
            return Ok(None);
        }

        if self.dispatcher.convention() == WireConvention::LocalDirective
            && line.trim().starts_with(DIRECTIVE_MARKER)
        {
            let outcome = Directive::parse(line.trim()).and_then(|directive| {
                self.dispatcher
                    .apply_directive(directive, &mut self.session, &mut self.view)
            });
            if let Err(e) = &outcome {
                report(&mut self.view, e);
            }
            return outcome.map(|_| None);
        }

        if !self.session.is_connected() {
            let err = ConsoleError::NotConnected;
            report(&mut self.view, &err);
            return Err(err);
        }

        tracing::debug!(command = line, "sending command");
        Ok(Some(self.encode_command(line)))
    }

    /// The user asked to disconnect. Returns a farewell frame to write
    /// before closing, when one is configured and the session is connected.
    pub fn request_disconnect(&mut self) -> Option<Bytes> {
        let farewell = (self.session.is_connected() && self.config.quit_on_disconnect)
            .then(|| self.encode_command("quit"));
        let was_disconnected = self.session.is_disconnected();
        let _ = self.session.apply(SessionEvent::DisconnectRequested);
        self.codec.reset();
        if !was_disconnected {
            tracing::info!("disconnected by user");
            self.view.append_line("Disconnected");
            self.view.show_prompt();
        }
        farewell
    }

    fn encode_command(&self, line: &str) -> Bytes {
        if self.config.newline_terminated {
            protocol::encode(&format!("{line}\n"))
        } else {
            protocol::encode(line)
        }
    }

    fn fail(&mut self, err: ConsoleError) {
        tracing::warn!(error = %err, "connection failed");
        report(&mut self.view, &err);
        let _ = self.session.apply(SessionEvent::SocketError);
        self.codec.reset();
    }
}

/// Show an error as a line of output followed by the prompt.
fn report<V: ConsoleView + ?Sized>(view: &mut V, err: &ConsoleError) {
    view.append_line(&err.to_string());
    view.show_prompt();
}
