//! Remote control module
//!
//! A real TCP listener accepting single-word commands from the local
//! network, plus the interpreter that maps each token to an effect.

mod interpreter;
mod protocol;
mod server;

pub use interpreter::interpret;
pub use protocol::{ListeningAddress, RemoteReply};
pub use server::{start, RemoteHandle};
