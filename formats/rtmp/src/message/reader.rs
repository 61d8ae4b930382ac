use std::io::{self, Cursor, Read};

use crate::{
    chunk::{ChunkMessageCommonHeader, errors::ChunkMessageResult},
    commands::{RtmpC2SCommands, RtmpS2CCommands},
};
use utils::traits::reader::ReadRemainingFrom;

use super::{RtmpMessageType, RtmpUserMessageBody};

impl RtmpUserMessageBody {
    ///! messages sent by the publisher or player end of the connection
    pub fn read_c2s_from<R: io::Read>(
        reader: R,
        version: amf::Version,
        header: &ChunkMessageCommonHeader,
    ) -> ChunkMessageResult<Self> {
        Self::read_from(reader, version, header, true)
    }

    ///! messages sent by the server end of the connection
    pub fn read_s2c_from<R: io::Read>(
        reader: R,
        version: amf::Version,
        header: &ChunkMessageCommonHeader,
    ) -> ChunkMessageResult<Self> {
        Self::read_from(reader, version, header, false)
    }

    fn read_from<R: io::Read>(
        mut reader: R,
        version: amf::Version,
        header: &ChunkMessageCommonHeader,
        c2s: bool,
    ) -> ChunkMessageResult<Self> {
        let mut payload = vec![0; header.message_length as usize];
        reader.read_exact(&mut payload)?;
        let mut payload_reader = Cursor::new(&payload);

        let message = match header.message_type_id.try_into()? {
            RtmpMessageType::AMF0Data | RtmpMessageType::AMF3Data => {
                RtmpUserMessageBody::MetaData {
                    payload: payload.into(),
                }
            }
            RtmpMessageType::AMF0SharedObject | RtmpMessageType::AMF3SharedObject => {
                RtmpUserMessageBody::SharedObject {
                    payload: payload.into(),
                }
            }
            RtmpMessageType::Audio => RtmpUserMessageBody::Audio {
                payload: payload.into(),
            },
            RtmpMessageType::Video => RtmpUserMessageBody::Video {
                payload: payload.into(),
            },
            RtmpMessageType::Aggregate => RtmpUserMessageBody::Aggregate {
                payload: payload.into(),
            },
            RtmpMessageType::AMF0Command | RtmpMessageType::AMF3Command => {
                if c2s {
                    RtmpUserMessageBody::C2SCommand(RtmpC2SCommands::read_remaining_from(
                        version,
                        payload_reader.by_ref(),
                    )?)
                } else {
                    RtmpUserMessageBody::S2CCommand(RtmpS2CCommands::read_remaining_from(
                        version,
                        payload_reader.by_ref(),
                    )?)
                }
            }
        };

        Ok(message)
    }
}
