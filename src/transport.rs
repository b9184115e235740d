//! TCP transport for the console.
//!
//! A single task owns the socket and the [`Console`]. UI events, connect
//! completion and socket reads are multiplexed with `tokio::select!`, so the
//! session and its frame buffer are only ever touched from this task.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::console::Console;
use crate::dispatch::Flow;
use crate::protocol;
use crate::view::ConsoleView;

const READ_BUF_SIZE: usize = 4096;

/// Requests from the UI shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// The user pressed enter on a line.
    Submit(String),
    Connect { host: String, port: u16 },
    Disconnect,
    /// Disconnect and stop the event loop.
    Shutdown,
}

type ConnectFuture = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

/// The socket halves of an established connection.
struct Link {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

/// Dial `addr`, failing with `TimedOut` after `timeout`.
fn dial(addr: String, timeout: Duration) -> ConnectFuture {
    Box::pin(async move {
        let stream = within(timeout, &addr, TcpStream::connect(&addr)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    })
}

async fn within<T, F>(timeout: Duration, addr: &str, connect: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    tokio::time::timeout(timeout, connect).await.map_err(|_| {
        io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connection to {addr} timed out"),
        )
    })?
}

async fn pending_connect(connecting: &mut Option<ConnectFuture>) -> io::Result<TcpStream> {
    match connecting {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn read_some(link: &mut Option<Link>, buf: &mut BytesMut) -> io::Result<usize> {
    match link {
        Some(link) => link.reader.read_buf(buf).await,
        None => std::future::pending().await,
    }
}

/// Close the link, writing `farewell` first when there is one.
async fn close(link: &mut Option<Link>, farewell: Option<Bytes>) {
    if let Some(mut l) = link.take() {
        if let Some(frame) = farewell {
            if let Err(e) = protocol::write_frame(&mut l.writer, &frame).await {
                tracing::debug!(error = %e, "failed to send farewell");
            }
        }
        let _ = l.writer.shutdown().await;
    }
}

/// Run the console until a `Shutdown` event arrives or the event channel
/// closes.
pub async fn run<V: ConsoleView>(console: &mut Console<V>, mut events: mpsc::Receiver<UiEvent>) {
    let mut connecting: Option<ConnectFuture> = None;
    let mut link: Option<Link> = None;
    let mut buf = BytesMut::with_capacity(READ_BUF_SIZE);

    console.start();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(UiEvent::Submit(line)) => {
                        let frame = match console.submit(&line) {
                            Ok(Some(frame)) => frame,
                            Ok(None) => continue,
                            Err(e) => {
                                tracing::debug!(error = %e, "command not sent");
                                continue;
                            }
                        };
                        let Some(l) = link.as_mut() else { continue };
                        let written = protocol::write_frame(&mut l.writer, &frame).await;
                        if let Err(e) = written {
                            link = None;
                            console.on_transport_error(e);
                        }
                    }
                    Some(UiEvent::Connect { host, port }) => {
                        if !console.session().is_disconnected() {
                            connecting = None;
                            let farewell = console.request_disconnect();
                            close(&mut link, farewell).await;
                        }
                        match console.request_connect(&host, port) {
                            Ok(addr) => {
                                tracing::info!(%addr, "connecting");
                                connecting = Some(dial(addr, console.config().connect_timeout()));
                            }
                            Err(e) => tracing::warn!(error = %e, "connect request rejected"),
                        }
                    }
                    Some(UiEvent::Disconnect) => {
                        connecting = None;
                        let farewell = console.request_disconnect();
                        close(&mut link, farewell).await;
                    }
                    Some(UiEvent::Shutdown) | None => {
                        connecting = None;
                        let farewell = console.request_disconnect();
                        close(&mut link, farewell).await;
                        break;
                    }
                }
            }

            result = pending_connect(&mut connecting) => {
                connecting = None;
                match result {
                    Ok(stream) => {
                        let (reader, writer) = stream.into_split();
                        buf.clear();
                        match console.on_connected() {
                            Ok(()) => link = Some(Link { reader, writer }),
                            Err(e) => tracing::warn!(error = %e, "stale connection dropped"),
                        }
                    }
                    Err(e) => console.on_connect_failed(e),
                }
            }

            result = read_some(&mut link, &mut buf) => {
                match result {
                    Ok(0) => {
                        link = None;
                        console.on_socket_closed();
                    }
                    Ok(n) => {
                        tracing::trace!(bytes = n, "socket read");
                        let flow = console.receive(&buf);
                        buf.clear();
                        if flow == Flow::Close {
                            close(&mut link, None).await;
                        }
                    }
                    Err(e) => {
                        link = None;
                        console.on_transport_error(e);
                    }
                }
            }
        }
    }

    tracing::debug!("console event loop stopped");
}
