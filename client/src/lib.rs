pub mod config;
pub mod connection;
pub mod errors;
pub mod status;
pub mod stream;
#[cfg(test)]
mod testing;

pub use config::ConnectionConfig;
pub use connection::Connection;
pub use errors::{RtmpClientError, RtmpClientResult};
pub use status::{StatusCode, StatusEvent};
pub use stream::{MediaKind, MediaMessage, MediaSample, PublishType, Stream, StreamState};
