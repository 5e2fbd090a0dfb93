//! AI Backend Client.

pub mod envelope;
pub mod http;

pub use envelope::{BackendReply, BackendRequest, decode_reply, encode_request};
pub use http::{BackendClient, HttpBackendClient};
