use std::io;

use rtmp_formats::{chunk::errors::ChunkMessageError, handshake::errors::HandshakeError};
use thiserror::Error;

use crate::{status::StatusEvent, stream::StreamState};

#[derive(Debug, Error)]
pub enum RtmpClientError {
    #[error("{attempted} is not legal while the stream is {current:?}")]
    InvalidState {
        current: StreamState,
        attempted: &'static str,
    },
    #[error("no matching response within the request timeout")]
    RequestTimedOut,
    #[error("request failed with {}: {}", .0.code, .0.description)]
    RequestFailed(StatusEvent),
    #[error("the connection is closed")]
    ConnectionClosed,
    #[error("handshake failed: {0:?}")]
    Handshake(#[from] HandshakeError),
    #[error("chunk codec failed: {0:?}")]
    Chunk(#[from] ChunkMessageError),
    #[error("amf codec failed: {0:?}")]
    Amf(#[from] amf::errors::AmfError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("internal channel closed")]
    ChannelClosed,
}

pub type RtmpClientResult<T> = Result<T, RtmpClientError>;
