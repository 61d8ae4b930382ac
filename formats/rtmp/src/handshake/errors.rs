use std::{io, time::SystemTimeError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported rtmp version: {0}")]
    BadVersion(u8),
    #[error("s2 random bytes do not echo the c1 random bytes")]
    EchoMismatch,
    #[error("digest error: {0}")]
    DigestError(#[from] DigestError),
    #[error("get system time failed: {0}")]
    SystemTimeError(#[from] SystemTimeError),
}

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("digest does not match")]
    Invalid,
    #[error("unexpected digest length: {length}")]
    WrongLength { length: usize },
}

pub type HandshakeResult<T> = Result<T, HandshakeError>;
