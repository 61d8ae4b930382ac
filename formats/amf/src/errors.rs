use std::{io, string};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AmfError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid utf8 data: {0}")]
    InvalidUtf8(#[from] string::FromUtf8Error),
    #[error("unsupported amf value marker: {marker}")]
    Unsupported { marker: u8 },
    #[error("unknown marker: {marker}")]
    Unknown { marker: u8 },
    #[error("index of reference out of range, index: {index}")]
    OutOfRangeReference { index: usize },
    #[error("circular reference not supported, index: {index}")]
    CircularReference { index: usize },
    #[error("invalid value for a unix date: {milliseconds}")]
    InvalidDate { milliseconds: f64 },
    #[error("unknown object encoding: {encoding}")]
    UnknownObjectEncoding { encoding: f64 },
}

pub type AmfResult<T> = Result<T, AmfError>;
