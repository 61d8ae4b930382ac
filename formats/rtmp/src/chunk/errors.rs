use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkMessageError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unexpected fmt bits: {0:#b}")]
    UnexpectedFmt(u8),
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),
    #[error("invalid csid: {0}")]
    InvalidBasicHeader(String),
    #[error("invalid message header: {0}")]
    InvalidMessageHead(String),
    #[error("invalid message body: {0}")]
    InvalidMessage(String),
    #[error("got a compressed chunk header while no full message header arrived before")]
    NeedContext,
    #[error("unknown event type: {0}")]
    UnknownEventType(u16),
    #[error("unexpected amf type: {0}")]
    UnexpectedAmfType(String),
    #[error("unknown amf version: {0}")]
    UnknownAmfVersion(u8),
    #[error("amf codec error: {0}")]
    Amf(#[from] amf::errors::AmfError),
}

pub type ChunkMessageResult<T> = Result<T, ChunkMessageError>;
