#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ldb::config::ConsoleConfig;
use ldb::console::Console;
use ldb::protocol::{encode, FrameCodec};
use ldb::transport::{self, UiEvent};
use ldb::view::{Effect, RecordingView};

/// A stand-in for the debugger host: accepts one console and speaks frames.
pub struct FakeHost {
    listener: TcpListener,
    stream: Option<TcpStream>,
    codec: FrameCodec,
}

impl FakeHost {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self {
            listener,
            stream: None,
            codec: FrameCodec::new(),
        }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }

    pub async fn accept(&mut self) {
        let (stream, _) = tokio::time::timeout(Duration::from_secs(2), self.listener.accept())
            .await
            .expect("console did not connect")
            .unwrap();
        self.stream = Some(stream);
        self.codec.reset();
    }

    fn stream(&mut self) -> &mut TcpStream {
        self.stream.as_mut().expect("no console connected")
    }

    /// Send one payload as a frame.
    pub async fn send(&mut self, payload: &str) {
        self.send_raw(&encode(payload)).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        let stream = self.stream();
        stream.write_all(bytes).await.unwrap();
        stream.flush().await.unwrap();
    }

    /// Next payload from the console, or None if it closed the socket.
    pub async fn recv(&mut self) -> Option<String> {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(item) = self.codec.feed(&[]).next() {
                return Some(item.unwrap());
            }
            let stream = self.stream.as_mut().expect("no console connected");
            let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
                .await
                .expect("timed out waiting for the console")
                .unwrap();
            if n == 0 {
                return None;
            }
            drop(self.codec.feed(&buf[..n]));
        }
    }

    /// Drop the connection from the host side.
    pub fn hang_up(&mut self) {
        self.stream = None;
    }
}

/// A console running on its own task, driven through UI events.
pub struct RunningConsole {
    pub view: RecordingView,
    pub events: mpsc::Sender<UiEvent>,
    handle: JoinHandle<Console<RecordingView>>,
}

impl RunningConsole {
    pub fn spawn(config: ConsoleConfig) -> Self {
        let view = RecordingView::new();
        let mut console = Console::new(config, view.clone());
        let (events, rx) = mpsc::channel(16);
        let handle = tokio::spawn(async move {
            transport::run(&mut console, rx).await;
            console
        });
        Self {
            view,
            events,
            handle,
        }
    }

    pub async fn send(&self, event: UiEvent) {
        self.events.send(event).await.unwrap();
    }

    pub async fn connect(&self, port: u16) {
        self.send(UiEvent::Connect {
            host: "127.0.0.1".into(),
            port,
        })
        .await;
    }

    pub async fn submit(&self, line: &str) {
        self.send(UiEvent::Submit(line.to_string())).await;
    }

    /// Wait until `line` has been shown.
    pub async fn wait_for_line(&self, line: &str) {
        wait_until(&self.view, |effects| {
            effects.iter().any(|e| match e {
                Effect::AppendLine(t) | Effect::ReplaceCurrentLine(t) => t == line,
                _ => false,
            })
        })
        .await;
    }

    /// Stop the event loop and hand back the console for inspection.
    pub async fn shutdown(self) -> Console<RecordingView> {
        self.events.send(UiEvent::Shutdown).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), self.handle)
            .await
            .expect("console did not stop")
            .unwrap()
    }
}

pub async fn wait_until<F: Fn(&[Effect]) -> bool>(view: &RecordingView, cond: F) {
    for _ in 0..200 {
        if cond(&view.effects()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met; effects: {:?}", view.effects());
}
