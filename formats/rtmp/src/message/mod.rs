use std::fmt::Debug;

use tokio_util::bytes::Bytes;

use crate::{
    chunk::errors::ChunkMessageError,
    commands::{RtmpC2SCommands, RtmpS2CCommands},
};

///! @see: 6.1.1. Message Header
///! messages ride on the chunk stream, the 11 byte message header from 6.1.1
///! never hits the wire on its own. the chunk message header already carries
///! all of its fields:
///! https://stackoverflow.com/questions/59709461/difference-between-chunk-message-header-and-message-header-in-rtmp
pub mod consts;
pub mod reader;
pub mod writer;

pub enum RtmpUserMessageBody {
    C2SCommand(RtmpC2SCommands),
    S2CCommand(RtmpS2CCommands),
    MetaData { payload: Bytes },
    SharedObject { payload: Bytes },
    Audio { payload: Bytes },
    Video { payload: Bytes },
    Aggregate { payload: Bytes },
}

impl Debug for RtmpUserMessageBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::C2SCommand(command) => f.write_str(format!("C2SCommand: {:?}", command).as_str()),
            Self::S2CCommand(command) => f.write_str(format!("S2CCommand: {:?}", command).as_str()),
            Self::MetaData { payload } => {
                f.write_str(format!("Meta, payload length: {}", payload.len()).as_str())
            }
            Self::SharedObject { payload } => {
                f.write_str(format!("SharedObject, payload length: {}", payload.len()).as_str())
            }
            Self::Aggregate { payload } => {
                f.write_str(format!("Aggregate, length: {}", payload.len()).as_str())
            }
            Self::Audio { payload } => {
                f.write_str(format!("Audio, length: {}", payload.len()).as_str())
            }
            Self::Video { payload } => {
                f.write_str(format!("Video, length: {}", payload.len()).as_str())
            }
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum RtmpMessageType {
    AMF3Command = 17,
    AMF0Command = 20,
    AMF3Data = 15,
    AMF0Data = 18,
    AMF3SharedObject = 16,
    AMF0SharedObject = 19,
    Audio = 8,
    Video = 9,
    Aggregate = 22,
}

impl From<RtmpMessageType> for u8 {
    fn from(value: RtmpMessageType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for RtmpMessageType {
    type Error = ChunkMessageError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            17 => Ok(RtmpMessageType::AMF3Command),
            20 => Ok(RtmpMessageType::AMF0Command),
            15 => Ok(RtmpMessageType::AMF3Data),
            18 => Ok(RtmpMessageType::AMF0Data),
            16 => Ok(RtmpMessageType::AMF3SharedObject),
            19 => Ok(RtmpMessageType::AMF0SharedObject),
            8 => Ok(RtmpMessageType::Audio),
            9 => Ok(RtmpMessageType::Video),
            22 => Ok(RtmpMessageType::Aggregate),
            _ => Err(ChunkMessageError::UnknownMessageType(value)),
        }
    }
}
