//! ldb - remote console for a Lua debugger host.
//!
//! The console connects over TCP, sends the user's commands as
//! length-prefixed frames and interprets the frames the host sends back,
//! either as output to show or as commands that change the prompt state.

pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod view;
