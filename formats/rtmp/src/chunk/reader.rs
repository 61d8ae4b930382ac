use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::{
    cmp::min,
    collections::HashMap,
    io::{Cursor, Read},
};
use tokio_util::bytes::{Buf, BytesMut};
use utils::traits::reader::ReadFrom;

use crate::{
    message::{RtmpMessageType, RtmpUserMessageBody},
    protocol_control::ProtocolControlMessage,
    user_control::UserControlEvent,
};

use super::{
    CSID, ChunkBasicHeader, ChunkBasicHeaderType, ChunkMessage, ChunkMessageCommonHeader,
    ChunkMessageHeader, ChunkMessageHeaderType0, ChunkMessageHeaderType1, ChunkMessageHeaderType2,
    ChunkMessageHeaderType3, ChunkMessageType, RtmpChunkMessageBody,
    consts::{DEFAULT_CHUNK_SIZE, MAX_TIMESTAMP},
    errors::{ChunkMessageError, ChunkMessageResult},
};

#[derive(Debug, Default, Clone)]
pub struct ChunkPayload {
    pub payload: BytesMut,
    pub total_length: usize,
    pub remaining_length: usize,
}

#[derive(Debug, Default, Clone)]
pub struct ReadContext {
    timestamp: u64,
    timestamp_delta: u64,
    extended_timestamp_enabled: bool,
    message_length: u32,
    message_stream_id: u32,
    message_type_id: u8,
    incomplete_chunk: Option<ChunkPayload>,
}

type ChunkStreamReadContext = HashMap<CSID, ReadContext>;

enum ChunkProgress {
    NeedMoreData,
    MidMessage,
    Message(ChunkMessage),
}

#[derive(Debug)]
pub struct Reader {
    context: ChunkStreamReadContext,
    chunk_size: usize,
    bytes_received: u32,
}

impl Reader {
    pub fn new() -> Self {
        Self {
            context: HashMap::new(),
            chunk_size: DEFAULT_CHUNK_SIZE as usize,
            bytes_received: 0,
        }
    }

    #[inline]
    pub fn get_bytes_read(&self) -> u32 {
        self.bytes_received
    }

    pub fn set_chunk_size(&mut self, size: usize) -> usize {
        let old_size = self.chunk_size;
        self.chunk_size = size;
        old_size
    }

    pub fn abort_chunk_message(&mut self, csid: u32) {
        match self.context.get_mut(&csid) {
            None => {}
            Some(ctx) => ctx.incomplete_chunk = None,
        }
    }

    ///! decode buffered chunks until a whole message completes.
    ///! the cursor always stops on a chunk boundary: a chunk that is not fully
    ///! buffered yet gets rewound, so after every call, Some or None, the
    ///! caller consumes exactly position() bytes from its buffer
    pub fn read(
        &mut self,
        reader: &mut Cursor<&BytesMut>,
        c2s: bool,
    ) -> ChunkMessageResult<Option<ChunkMessage>> {
        loop {
            match self.read_chunk(reader, c2s)? {
                ChunkProgress::NeedMoreData => return Ok(None),
                ChunkProgress::MidMessage => {}
                ChunkProgress::Message(message) => return Ok(Some(message)),
            }
        }
    }

    fn read_chunk(
        &mut self,
        reader: &mut Cursor<&BytesMut>,
        c2s: bool,
    ) -> ChunkMessageResult<ChunkProgress> {
        let chunk_start = reader.position();
        let basic_header = match Self::read_basic_header(reader)? {
            Some(header) => header,
            None => {
                reader.set_position(chunk_start);
                return Ok(ChunkProgress::NeedMoreData);
            }
        };

        let csid = basic_header.chunk_stream_id;
        let continuing = self
            .context
            .get(&csid)
            .is_some_and(|ctx| ctx.incomplete_chunk.is_some());
        if continuing {
            return self.read_continuation_chunk(reader, chunk_start, basic_header, c2s);
        }

        let message_header = match Self::read_message_header(reader, basic_header.fmt)? {
            Some(header) => header,
            None => {
                reader.set_position(chunk_start);
                return Ok(ChunkProgress::NeedMoreData);
            }
        };

        if basic_header.fmt != 0 && !self.context.contains_key(&csid) {
            return Err(ChunkMessageError::NeedContext);
        }

        // a fmt 3 header that opens a new message repeats the extended
        // timestamp field of the header it reuses
        let mut reused_header_delta = None;
        if matches!(message_header, ChunkMessageHeader::Type3(_)) {
            let ctx = self.context.get(&csid).expect("context checked above");
            if ctx.extended_timestamp_enabled {
                if reader.remaining() < 4 {
                    reader.set_position(chunk_start);
                    return Ok(ChunkProgress::NeedMoreData);
                }
                reused_header_delta = Some(reader.read_u32::<BigEndian>()?);
            }
        }

        // apply the header to a scratch context first. nothing is committed
        // until the chunk body is known to be fully buffered, a retry after
        // NeedMoreData must see untouched state
        let mut next = self.context.get(&csid).cloned().unwrap_or_default();
        match &message_header {
            ChunkMessageHeader::Type0(header) => {
                next.timestamp = header.timestamp as u64;
                // a fmt 3 header straight after a fmt 0 one reuses the fmt 0
                // timestamp as its delta, see 5.3.1.2.4
                next.timestamp_delta = header.timestamp as u64;
                next.message_length = header.message_length;
                next.message_type_id = header.message_type_id;
                next.message_stream_id = header.message_stream_id;
                next.extended_timestamp_enabled = header.timestamp >= MAX_TIMESTAMP;
            }
            ChunkMessageHeader::Type1(header) => {
                next.timestamp_delta = header.timestamp_delta as u64;
                next.timestamp += header.timestamp_delta as u64;
                next.message_length = header.message_length;
                next.message_type_id = header.message_type_id;
                next.extended_timestamp_enabled = header.timestamp_delta >= MAX_TIMESTAMP;
            }
            ChunkMessageHeader::Type2(header) => {
                next.timestamp_delta = header.timestamp_delta as u64;
                next.timestamp += header.timestamp_delta as u64;
                next.extended_timestamp_enabled = header.timestamp_delta >= MAX_TIMESTAMP;
            }
            ChunkMessageHeader::Type3(_) => match reused_header_delta {
                Some(delta) => {
                    next.timestamp_delta = delta as u64;
                    next.timestamp += delta as u64;
                }
                None => next.timestamp += next.timestamp_delta,
            },
        }

        let total_length = next.message_length as usize;
        let bytes_need = min(self.chunk_size, total_length);
        if reader.remaining() < bytes_need {
            reader.set_position(chunk_start);
            return Ok(ChunkProgress::NeedMoreData);
        }

        let mut body = vec![0; bytes_need];
        reader.read_exact(&mut body)?;

        let common_header = ChunkMessageCommonHeader {
            basic_header,
            timestamp: next.timestamp as u32,
            message_length: next.message_length,
            message_type_id: next.message_type_id,
            message_stream_id: next.message_stream_id,
            extended_timestamp_enabled: next.extended_timestamp_enabled,
        };

        if bytes_need < total_length {
            let mut payload = BytesMut::with_capacity(total_length);
            payload.extend_from_slice(&body);
            next.incomplete_chunk = Some(ChunkPayload {
                payload,
                total_length,
                remaining_length: total_length - bytes_need,
            });
            self.context.insert(csid, next);
            self.count_received(reader.position() - chunk_start);
            return Ok(ChunkProgress::MidMessage);
        }

        self.context.insert(csid, next);
        self.count_received(reader.position() - chunk_start);
        Self::read_message_body(common_header, BytesMut::from(&body[..]), c2s)
            .map(ChunkProgress::Message)
    }

    fn read_continuation_chunk(
        &mut self,
        reader: &mut Cursor<&BytesMut>,
        chunk_start: u64,
        basic_header: ChunkBasicHeader,
        c2s: bool,
    ) -> ChunkMessageResult<ChunkProgress> {
        if basic_header.fmt != 3 {
            return Err(ChunkMessageError::InvalidMessage(format!(
                "chunk stream {} got a fmt {} header in the middle of a split message",
                basic_header.chunk_stream_id, basic_header.fmt
            )));
        }

        let ctx = self
            .context
            .get_mut(&basic_header.chunk_stream_id)
            .expect("context checked by caller");

        if ctx.extended_timestamp_enabled {
            if reader.remaining() < 4 {
                reader.set_position(chunk_start);
                return Ok(ChunkProgress::NeedMoreData);
            }
            // continuation chunks repeat the field verbatim, nothing accumulates
            reader.read_u32::<BigEndian>()?;
        }

        let chunk = ctx.incomplete_chunk.as_mut().expect("checked by caller");
        let bytes_need = min(self.chunk_size, chunk.remaining_length);
        if reader.remaining() < bytes_need {
            reader.set_position(chunk_start);
            return Ok(ChunkProgress::NeedMoreData);
        }

        let mut body = vec![0; bytes_need];
        reader.read_exact(&mut body)?;
        chunk.payload.extend_from_slice(&body);
        chunk.remaining_length -= bytes_need;

        if chunk.remaining_length > 0 {
            self.count_received(reader.position() - chunk_start);
            return Ok(ChunkProgress::MidMessage);
        }

        let payload = std::mem::take(&mut chunk.payload);
        ctx.incomplete_chunk = None;
        let common_header = ChunkMessageCommonHeader {
            basic_header,
            timestamp: ctx.timestamp as u32,
            message_length: ctx.message_length,
            message_type_id: ctx.message_type_id,
            message_stream_id: ctx.message_stream_id,
            extended_timestamp_enabled: ctx.extended_timestamp_enabled,
        };
        self.count_received(reader.position() - chunk_start);
        Self::read_message_body(common_header, payload, c2s).map(ChunkProgress::Message)
    }

    fn read_message_body(
        header: ChunkMessageCommonHeader,
        bytes: BytesMut,
        c2s: bool,
    ) -> ChunkMessageResult<ChunkMessage> {
        let message_body = match header.message_type_id.try_into()? {
            ChunkMessageType::ProtocolControl(message_type) => {
                RtmpChunkMessageBody::ProtocolControl(ProtocolControlMessage::read_from(
                    &bytes[..],
                    message_type,
                )?)
            }
            ChunkMessageType::UserControl => {
                RtmpChunkMessageBody::UserControl(UserControlEvent::read_from(&bytes[..])?)
            }
            ChunkMessageType::RtmpUserMessage(message_type) => {
                let version = match message_type {
                    RtmpMessageType::AMF3Command
                    | RtmpMessageType::AMF3Data
                    | RtmpMessageType::AMF3SharedObject => amf::Version::Amf3,
                    _ => amf::Version::Amf0,
                };
                let body = if c2s {
                    RtmpUserMessageBody::read_c2s_from(bytes.reader(), version, &header)?
                } else {
                    RtmpUserMessageBody::read_s2c_from(bytes.reader(), version, &header)?
                };
                RtmpChunkMessageBody::RtmpUserMessage(body)
            }
        };

        Ok(ChunkMessage {
            header,
            chunk_message_body: message_body,
        })
    }

    fn count_received(&mut self, bytes: u64) {
        let bytes = bytes as u32;
        // peers reset their ack counters long before u32 wraps, do the same
        if self.bytes_received + bytes > 0xF000_0000 {
            self.bytes_received = bytes;
        } else {
            self.bytes_received += bytes;
        }
    }

    fn read_basic_header(
        reader: &mut Cursor<&BytesMut>,
    ) -> ChunkMessageResult<Option<ChunkBasicHeader>> {
        if !reader.has_remaining() {
            return Ok(None);
        }

        let first_byte = reader.read_u8()?;

        let fmt = (first_byte >> 6) & 0b11;
        let maybe_csid = (first_byte & 0b00111111) as u32;
        match maybe_csid {
            0 => {
                if !reader.has_remaining() {
                    return Ok(None);
                }
                let csid = reader.read_u8()?;

                Ok(Some(ChunkBasicHeader {
                    header_type: ChunkBasicHeaderType::Type2,
                    fmt,
                    chunk_stream_id: csid as CSID + 64,
                }))
            }
            1 => {
                if reader.remaining() < 2 {
                    return Ok(None);
                }
                let mut csid = 64;
                csid += reader.read_u8()? as u32;
                csid += reader.read_u8()? as u32 * 256;

                Ok(Some(ChunkBasicHeader {
                    header_type: ChunkBasicHeaderType::Type3,
                    fmt,
                    chunk_stream_id: csid,
                }))
            }
            csid => Ok(Some(ChunkBasicHeader {
                header_type: ChunkBasicHeaderType::Type1,
                fmt,
                chunk_stream_id: csid,
            })),
        }
    }

    fn read_message_header(
        reader: &mut Cursor<&BytesMut>,
        fmt: u8,
    ) -> ChunkMessageResult<Option<ChunkMessageHeader>> {
        match fmt {
            0 => Ok(Self::read_message_header_type0(reader)?.map(ChunkMessageHeader::Type0)),
            1 => Ok(Self::read_message_header_type1(reader)?.map(ChunkMessageHeader::Type1)),
            2 => Ok(Self::read_message_header_type2(reader)?.map(ChunkMessageHeader::Type2)),
            3 => Ok(Some(ChunkMessageHeader::Type3(ChunkMessageHeaderType3 {}))),
            _ => Err(ChunkMessageError::UnexpectedFmt(fmt)),
        }
    }

    fn read_message_header_type0(
        reader: &mut Cursor<&BytesMut>,
    ) -> ChunkMessageResult<Option<ChunkMessageHeaderType0>> {
        if reader.remaining() < 11 {
            return Ok(None);
        }
        let mut header0 = ChunkMessageHeaderType0 {
            timestamp: reader.read_u24::<BigEndian>()?,
            message_length: reader.read_u24::<BigEndian>()?,
            message_type_id: reader.read_u8()?,
            message_stream_id: reader.read_u32::<LittleEndian>()?,
        };
        if header0.timestamp >= MAX_TIMESTAMP {
            if reader.remaining() < 4 {
                return Ok(None);
            }
            header0.timestamp = reader.read_u32::<BigEndian>()?;
        }
        Ok(Some(header0))
    }

    fn read_message_header_type1(
        reader: &mut Cursor<&BytesMut>,
    ) -> ChunkMessageResult<Option<ChunkMessageHeaderType1>> {
        if reader.remaining() < 7 {
            return Ok(None);
        }
        let mut header1 = ChunkMessageHeaderType1 {
            timestamp_delta: reader.read_u24::<BigEndian>()?,
            message_length: reader.read_u24::<BigEndian>()?,
            message_type_id: reader.read_u8()?,
        };
        if header1.timestamp_delta >= MAX_TIMESTAMP {
            if reader.remaining() < 4 {
                return Ok(None);
            }
            header1.timestamp_delta = reader.read_u32::<BigEndian>()?;
        }
        Ok(Some(header1))
    }

    fn read_message_header_type2(
        reader: &mut Cursor<&BytesMut>,
    ) -> ChunkMessageResult<Option<ChunkMessageHeaderType2>> {
        if reader.remaining() < 3 {
            return Ok(None);
        }
        let mut header2 = ChunkMessageHeaderType2 {
            timestamp_delta: reader.read_u24::<BigEndian>()?,
        };
        if header2.timestamp_delta >= MAX_TIMESTAMP {
            if reader.remaining() < 4 {
                return Ok(None);
            }
            header2.timestamp_delta = reader.read_u32::<BigEndian>()?;
        }
        Ok(Some(header2))
    }
}
