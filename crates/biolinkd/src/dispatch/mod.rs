//! JSONL request dispatch for the control socket.
//!
//! A client sends one request line and receives one reply line:
//!
//! ```json
//! {"operation":"enroll","id":7,"name":"Ada"}
//! {"kind":"reply","accepted":true,"message":"Enrolled ID 7 successfully"}
//! ```
//!
//! Requests that cannot be parsed or routed are answered with an `error`
//! reply carrying a message and a status code: `1` for caller mistakes and
//! `2` for failures inside the daemon.

mod errors;
mod handler;
mod request;
mod response;
mod router;

pub(crate) use self::handler::DispatchConnectionHandler;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
