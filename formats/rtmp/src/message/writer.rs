use std::io;

use super::RtmpUserMessageBody;
use crate::chunk::errors::{ChunkMessageError, ChunkMessageResult};

impl RtmpUserMessageBody {
    pub fn write_to<W: io::Write>(
        &self,
        writer: &mut W,
        version: amf::Version,
    ) -> ChunkMessageResult<()> {
        match self {
            RtmpUserMessageBody::C2SCommand(command) => command.write_to(writer, version),
            RtmpUserMessageBody::S2CCommand(command) => command.write_to(writer, version),
            RtmpUserMessageBody::MetaData { payload }
            | RtmpUserMessageBody::SharedObject { payload }
            | RtmpUserMessageBody::Audio { payload }
            | RtmpUserMessageBody::Video { payload }
            | RtmpUserMessageBody::Aggregate { payload } => {
                writer.write_all(payload).map_err(ChunkMessageError::Io)
            }
        }
    }
}
