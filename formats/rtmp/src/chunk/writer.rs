use std::collections::HashMap;

use tokio::io::AsyncWriteExt;
use tokio_util::bytes::{BufMut, Bytes, BytesMut};
use utils::traits::writer::WriteTo;

use crate::{
    commands::{
        CallCommandRequest, CloseStreamCommand, ConnectCommandRequest, CreateStreamCommandRequest,
        DeleteStreamCommand, PauseCommand, PlayCommand, PublishCommand, ReceiveAudioCommand,
        ReceiveVideoCommand, RtmpC2SCommands, SeekCommand,
    },
    message::{RtmpMessageType, RtmpUserMessageBody},
    protocol_control::{
        AbortMessage, Acknowledgement, ProtocolControlMessage, ProtocolControlMessageType,
        SetChunkSize, WindowAckSize,
        consts::{MAX_CHUNK_SIZE, PROTOCOL_CONTROL_MESSAGE_STREAM_ID},
    },
    user_control::{
        UserControlEvent,
        consts::{USER_CONTROL_MESSAGE_STREAM_ID, USER_CONTROL_MESSAGE_TYPE},
    },
};

use super::{
    CSID, ChunkBasicHeader, ChunkMessage, ChunkMessageCommonHeader, ChunkMessageHeader,
    ChunkMessageHeaderType0, ChunkMessageHeaderType1, ChunkMessageHeaderType2,
    ChunkMessageHeaderType3, RtmpChunkMessageBody,
    consts::{DEFAULT_CHUNK_SIZE, MAX_TIMESTAMP, csid},
    errors::{ChunkMessageError, ChunkMessageResult},
};

#[derive(Debug, Default)]
struct WriteContext {
    timestamp: u32,
    timestamp_delta: u32,
    extended_timestamp_enabled: bool,
    message_length: u32,
    message_stream_id: u32,
    message_type_id: u8,
    previous_fmt: Option<u8>,
}

type ChunkMessageWriteContext = HashMap<CSID, WriteContext>;

///! serializes whole messages into an internal buffer, splitting them into
///! chunks and compressing headers against the per csid context on the way.
///! call write_to to drain the buffer into the transport
#[derive(Debug)]
pub struct Writer {
    buffer: BytesMut,
    context: ChunkMessageWriteContext,
    chunk_size: usize,
    bytes_written: u64,
    amf_version: amf::Version,
}

impl Writer {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            context: ChunkMessageWriteContext::new(),
            chunk_size: DEFAULT_CHUNK_SIZE as usize,
            bytes_written: 0,
            amf_version: amf::Version::Amf0,
        }
    }

    #[inline]
    pub fn get_bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn set_amf_version(&mut self, version: amf::Version) {
        self.amf_version = version;
    }

    pub fn set_chunk_size(&mut self, size: usize) -> usize {
        let old_size = self.chunk_size;
        self.chunk_size = size;
        old_size
    }

    pub async fn write_to<W>(&mut self, writer: &mut W) -> ChunkMessageResult<()>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        if self.buffer.is_empty() {
            return Ok(());
        }
        writer.write_all(&self.buffer).await?;
        writer.flush().await?;
        self.bytes_written += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    ///! write with the most compressed header the context allows
    pub fn write(&mut self, value: ChunkMessage) -> ChunkMessageResult<()> {
        self.write_with_preferred(value, 3)
    }

    ///! write with at most the requested header compression. the preferred fmt
    ///! drops to whatever the context can actually express, a stream switch or
    ///! a backwards timestamp always falls back to a full fmt 0 header
    pub fn write_with_preferred(
        &mut self,
        mut value: ChunkMessage,
        preferred_fmt: u8,
    ) -> ChunkMessageResult<()> {
        if preferred_fmt > 3 {
            return Err(ChunkMessageError::UnexpectedFmt(preferred_fmt));
        }

        let mut bytes = BytesMut::new();
        {
            let mut body_writer = (&mut bytes).writer();
            match &value.chunk_message_body {
                RtmpChunkMessageBody::ProtocolControl(message) => {
                    message.write_to(&mut body_writer)?
                }
                RtmpChunkMessageBody::UserControl(message) => message.write_to(&mut body_writer)?,
                RtmpChunkMessageBody::RtmpUserMessage(message) => {
                    message.write_to(&mut body_writer, self.amf_version)?
                }
            }
        }

        if bytes.len() > 0xFF_FFFF {
            return Err(ChunkMessageError::InvalidMessage(format!(
                "message body does not fit the 24 bit length field: {}",
                bytes.len()
            )));
        }
        value.header.message_length = bytes.len() as u32;

        let (basic_header, message_header) =
            self.justify_message_header(&value.header, preferred_fmt);
        self.write_basic_header(&basic_header);
        let extended_timestamp =
            self.write_message_header(&message_header, basic_header.chunk_stream_id)?;

        let mut remaining = &bytes[..];
        let first = remaining.len().min(self.chunk_size);
        self.buffer.put_slice(&remaining[..first]);
        remaining = &remaining[first..];

        // every continuation chunk restates a fmt 3 basic header and, when the
        // message header carried one, the extended timestamp field
        while !remaining.is_empty() {
            let continuation = ChunkBasicHeader {
                header_type: basic_header.header_type,
                fmt: 3,
                chunk_stream_id: basic_header.chunk_stream_id,
            };
            self.write_basic_header(&continuation);
            if let Some(timestamp) = extended_timestamp {
                self.buffer.put_u32(timestamp);
            }
            let take = remaining.len().min(self.chunk_size);
            self.buffer.put_slice(&remaining[..take]);
            remaining = &remaining[take..];
        }

        Ok(())
    }

    pub fn write_set_chunk_size(&mut self, chunk_size: u32) -> ChunkMessageResult<()> {
        let chunk_size = (chunk_size & 0x7FFFFFFF).min(MAX_CHUNK_SIZE);
        self.write(ChunkMessage {
            header: self.make_protocol_control_common_header(
                ProtocolControlMessageType::SetChunkSize,
            )?,
            chunk_message_body: RtmpChunkMessageBody::ProtocolControl(
                ProtocolControlMessage::SetChunkSize(SetChunkSize { chunk_size }),
            ),
        })?;
        // everything after the announcement already uses the new size
        self.chunk_size = chunk_size as usize;
        Ok(())
    }

    pub fn write_abort_message(&mut self, chunk_stream_id: u32) -> ChunkMessageResult<()> {
        self.write(ChunkMessage {
            header: self.make_protocol_control_common_header(ProtocolControlMessageType::Abort)?,
            chunk_message_body: RtmpChunkMessageBody::ProtocolControl(
                ProtocolControlMessage::Abort(AbortMessage { chunk_stream_id }),
            ),
        })
    }

    pub fn write_acknowledgement_message(
        &mut self,
        sequence_number: u32,
    ) -> ChunkMessageResult<()> {
        self.write(ChunkMessage {
            header: self
                .make_protocol_control_common_header(ProtocolControlMessageType::Acknowledgement)?,
            chunk_message_body: RtmpChunkMessageBody::ProtocolControl(ProtocolControlMessage::Ack(
                Acknowledgement { sequence_number },
            )),
        })
    }

    pub fn write_window_ack_size_message(
        &mut self,
        window_ack_size: u32,
    ) -> ChunkMessageResult<()> {
        self.write(ChunkMessage {
            header: self
                .make_protocol_control_common_header(ProtocolControlMessageType::WindowAckSize)?,
            chunk_message_body: RtmpChunkMessageBody::ProtocolControl(
                ProtocolControlMessage::WindowAckSize(WindowAckSize {
                    size: window_ack_size,
                }),
            ),
        })
    }

    fn make_protocol_control_common_header(
        &self,
        message_type: ProtocolControlMessageType,
    ) -> ChunkMessageResult<ChunkMessageCommonHeader> {
        Ok(ChunkMessageCommonHeader {
            basic_header: ChunkBasicHeader::new(0, csid::PROTOCOL_CONTROL.into())?,
            timestamp: 0,
            message_length: 0,
            message_type_id: message_type.into(),
            message_stream_id: PROTOCOL_CONTROL_MESSAGE_STREAM_ID,
            extended_timestamp_enabled: false,
        })
    }

    pub fn write_set_buffer_length(
        &mut self,
        stream_id: u32,
        buffer_length: u32,
    ) -> ChunkMessageResult<()> {
        self.write(ChunkMessage {
            header: self.make_user_control_common_header()?,
            chunk_message_body: RtmpChunkMessageBody::UserControl(
                UserControlEvent::SetBufferLength {
                    stream_id,
                    buffer_length,
                },
            ),
        })
    }

    pub fn write_ping_response(&mut self, timestamp: u32) -> ChunkMessageResult<()> {
        self.write(ChunkMessage {
            header: self.make_user_control_common_header()?,
            chunk_message_body: RtmpChunkMessageBody::UserControl(UserControlEvent::PingResponse {
                timestamp,
            }),
        })
    }

    fn make_user_control_common_header(&self) -> ChunkMessageResult<ChunkMessageCommonHeader> {
        Ok(ChunkMessageCommonHeader {
            basic_header: ChunkBasicHeader::new(0, csid::USER_CONTROL.into())?,
            timestamp: 0,
            message_length: 0,
            message_type_id: USER_CONTROL_MESSAGE_TYPE,
            message_stream_id: USER_CONTROL_MESSAGE_STREAM_ID,
            extended_timestamp_enabled: false,
        })
    }

    pub fn write_connect_request(
        &mut self,
        message: ConnectCommandRequest,
    ) -> ChunkMessageResult<()> {
        self.write_connection_command(RtmpC2SCommands::Connect(message))
    }

    pub fn write_call_request(&mut self, message: CallCommandRequest) -> ChunkMessageResult<()> {
        self.write_connection_command(RtmpC2SCommands::Call(message))
    }

    pub fn write_create_stream_request(
        &mut self,
        message: CreateStreamCommandRequest,
    ) -> ChunkMessageResult<()> {
        self.write_connection_command(RtmpC2SCommands::CreateStream(message))
    }

    pub fn write_delete_stream_request(
        &mut self,
        message: DeleteStreamCommand,
    ) -> ChunkMessageResult<()> {
        self.write_connection_command(RtmpC2SCommands::DeleteStream(message))
    }

    pub fn write_close_stream_request(
        &mut self,
        message: CloseStreamCommand,
        message_stream_id: u32,
    ) -> ChunkMessageResult<()> {
        self.write_stream_command(RtmpC2SCommands::CloseStream(message), message_stream_id)
    }

    pub fn write_play_request(
        &mut self,
        message: PlayCommand,
        message_stream_id: u32,
    ) -> ChunkMessageResult<()> {
        self.write_stream_command(RtmpC2SCommands::Play(message), message_stream_id)
    }

    pub fn write_receive_audio_request(
        &mut self,
        message: ReceiveAudioCommand,
        message_stream_id: u32,
    ) -> ChunkMessageResult<()> {
        self.write_stream_command(RtmpC2SCommands::ReceiveAudio(message), message_stream_id)
    }

    pub fn write_receive_video_request(
        &mut self,
        message: ReceiveVideoCommand,
        message_stream_id: u32,
    ) -> ChunkMessageResult<()> {
        self.write_stream_command(RtmpC2SCommands::ReceiveVideo(message), message_stream_id)
    }

    pub fn write_publish_request(
        &mut self,
        message: PublishCommand,
        message_stream_id: u32,
    ) -> ChunkMessageResult<()> {
        self.write_stream_command(RtmpC2SCommands::Publish(message), message_stream_id)
    }

    pub fn write_seek_request(
        &mut self,
        message: SeekCommand,
        message_stream_id: u32,
    ) -> ChunkMessageResult<()> {
        self.write_stream_command(RtmpC2SCommands::Seek(message), message_stream_id)
    }

    pub fn write_pause_request(
        &mut self,
        message: PauseCommand,
        message_stream_id: u32,
    ) -> ChunkMessageResult<()> {
        self.write_stream_command(RtmpC2SCommands::Pause(message), message_stream_id)
    }

    fn write_connection_command(&mut self, command: RtmpC2SCommands) -> ChunkMessageResult<()> {
        self.write(ChunkMessage {
            header: self.make_command_common_header(csid::NET_CONNECTION_COMMAND, 0)?,
            chunk_message_body: RtmpChunkMessageBody::RtmpUserMessage(
                RtmpUserMessageBody::C2SCommand(command),
            ),
        })
    }

    fn write_stream_command(
        &mut self,
        command: RtmpC2SCommands,
        message_stream_id: u32,
    ) -> ChunkMessageResult<()> {
        self.write(ChunkMessage {
            header: self.make_command_common_header(csid::NET_STREAM_COMMAND, message_stream_id)?,
            chunk_message_body: RtmpChunkMessageBody::RtmpUserMessage(
                RtmpUserMessageBody::C2SCommand(command),
            ),
        })
    }

    fn make_command_common_header(
        &self,
        csid: u8,
        message_stream_id: u32,
    ) -> ChunkMessageResult<ChunkMessageCommonHeader> {
        Ok(ChunkMessageCommonHeader {
            basic_header: ChunkBasicHeader::new(0, csid.into())?,
            timestamp: 0,
            message_length: 0,
            message_type_id: match self.amf_version {
                amf::Version::Amf0 => RtmpMessageType::AMF0Command.into(),
                amf::Version::Amf3 => RtmpMessageType::AMF3Command.into(),
            },
            message_stream_id,
            extended_timestamp_enabled: false,
        })
    }

    pub fn write_meta(
        &mut self,
        payload: Bytes,
        timestamp: u32,
        message_stream_id: u32,
        preferred_fmt: u8,
    ) -> ChunkMessageResult<()> {
        self.write_with_preferred(
            ChunkMessage {
                header: ChunkMessageCommonHeader {
                    basic_header: ChunkBasicHeader::new(0, csid::NET_STREAM_COMMAND2.into())?,
                    timestamp,
                    message_length: 0,
                    message_type_id: match self.amf_version {
                        amf::Version::Amf0 => RtmpMessageType::AMF0Data.into(),
                        amf::Version::Amf3 => RtmpMessageType::AMF3Data.into(),
                    },
                    message_stream_id,
                    extended_timestamp_enabled: false,
                },
                chunk_message_body: RtmpChunkMessageBody::RtmpUserMessage(
                    RtmpUserMessageBody::MetaData { payload },
                ),
            },
            preferred_fmt,
        )
    }

    pub fn write_audio(
        &mut self,
        payload: Bytes,
        timestamp: u32,
        message_stream_id: u32,
        preferred_fmt: u8,
    ) -> ChunkMessageResult<()> {
        self.write_with_preferred(
            ChunkMessage {
                header: ChunkMessageCommonHeader {
                    basic_header: ChunkBasicHeader::new(0, csid::AUDIO.into())?,
                    timestamp,
                    message_length: 0,
                    message_type_id: RtmpMessageType::Audio.into(),
                    message_stream_id,
                    extended_timestamp_enabled: false,
                },
                chunk_message_body: RtmpChunkMessageBody::RtmpUserMessage(
                    RtmpUserMessageBody::Audio { payload },
                ),
            },
            preferred_fmt,
        )
    }

    pub fn write_video(
        &mut self,
        payload: Bytes,
        timestamp: u32,
        message_stream_id: u32,
        preferred_fmt: u8,
    ) -> ChunkMessageResult<()> {
        self.write_with_preferred(
            ChunkMessage {
                header: ChunkMessageCommonHeader {
                    basic_header: ChunkBasicHeader::new(0, csid::VIDEO.into())?,
                    timestamp,
                    message_length: 0,
                    message_type_id: RtmpMessageType::Video.into(),
                    message_stream_id,
                    extended_timestamp_enabled: false,
                },
                chunk_message_body: RtmpChunkMessageBody::RtmpUserMessage(
                    RtmpUserMessageBody::Video { payload },
                ),
            },
            preferred_fmt,
        )
    }

    fn justify_message_header(
        &self,
        value: &ChunkMessageCommonHeader,
        preferred_fmt: u8,
    ) -> (ChunkBasicHeader, ChunkMessageHeader) {
        let mut basic_header = value.basic_header.clone();
        let fmt = preferred_fmt.min(self.max_compressible_fmt(value));
        basic_header.fmt = fmt;

        let message_header = match fmt {
            0 => ChunkMessageHeader::Type0(ChunkMessageHeaderType0 {
                timestamp: value.timestamp,
                message_length: value.message_length,
                message_type_id: value.message_type_id,
                message_stream_id: value.message_stream_id,
            }),
            1 => {
                let ctx = self
                    .context
                    .get(&basic_header.chunk_stream_id)
                    .expect("compressed fmt implies context");
                ChunkMessageHeader::Type1(ChunkMessageHeaderType1 {
                    timestamp_delta: value.timestamp - ctx.timestamp,
                    message_length: value.message_length,
                    message_type_id: value.message_type_id,
                })
            }
            2 => {
                let ctx = self
                    .context
                    .get(&basic_header.chunk_stream_id)
                    .expect("compressed fmt implies context");
                ChunkMessageHeader::Type2(ChunkMessageHeaderType2 {
                    timestamp_delta: value.timestamp - ctx.timestamp,
                })
            }
            _ => ChunkMessageHeader::Type3(ChunkMessageHeaderType3 {}),
        };

        (basic_header, message_header)
    }

    fn max_compressible_fmt(&self, value: &ChunkMessageCommonHeader) -> u8 {
        let Some(ctx) = self.context.get(&value.basic_header.chunk_stream_id) else {
            return 0;
        };
        if ctx.previous_fmt.is_none() {
            return 0;
        }
        if ctx.message_stream_id != value.message_stream_id || value.timestamp < ctx.timestamp {
            return 0;
        }
        if ctx.message_length != value.message_length
            || ctx.message_type_id != value.message_type_id
        {
            return 1;
        }
        if value.timestamp - ctx.timestamp != ctx.timestamp_delta {
            return 2;
        }
        3
    }

    fn write_basic_header(&mut self, header: &ChunkBasicHeader) {
        match header.header_type {
            super::ChunkBasicHeaderType::Type1 => {
                self.buffer
                    .put_u8((header.fmt << 6) | header.chunk_stream_id as u8);
            }
            super::ChunkBasicHeaderType::Type2 => {
                self.buffer.put_u8(header.fmt << 6);
                self.buffer.put_u8((header.chunk_stream_id - 64) as u8);
            }
            super::ChunkBasicHeaderType::Type3 => {
                self.buffer.put_u8((header.fmt << 6) | 0b00000001);
                self.buffer.put_u16_le((header.chunk_stream_id - 64) as u16);
            }
        }
    }

    ///! write the message header and update the csid context with it. returns
    ///! the extended timestamp field value when one was written, continuation
    ///! chunks of a split message have to repeat it
    fn write_message_header(
        &mut self,
        header: &ChunkMessageHeader,
        csid: CSID,
    ) -> ChunkMessageResult<Option<u32>> {
        match header {
            ChunkMessageHeader::Type0(header) => {
                let extended_timestamp_enabled = header.timestamp >= MAX_TIMESTAMP;
                self.buffer
                    .put_uint(header.timestamp.min(MAX_TIMESTAMP) as u64, 3);
                self.buffer.put_uint(header.message_length as u64, 3);
                self.buffer.put_u8(header.message_type_id);
                self.buffer.put_u32_le(header.message_stream_id);
                if extended_timestamp_enabled {
                    self.buffer.put_u32(header.timestamp);
                }

                let ctx = self.context.entry(csid).or_default();
                ctx.extended_timestamp_enabled = extended_timestamp_enabled;
                ctx.timestamp = header.timestamp;
                // the fmt 0 timestamp doubles as the delta a following plain
                // fmt 3 header applies
                ctx.timestamp_delta = header.timestamp;
                ctx.message_length = header.message_length;
                ctx.message_stream_id = header.message_stream_id;
                ctx.message_type_id = header.message_type_id;
                ctx.previous_fmt = Some(0);

                Ok(extended_timestamp_enabled.then_some(header.timestamp))
            }
            ChunkMessageHeader::Type1(header) => {
                let Some(ctx) = self.context.get_mut(&csid) else {
                    return Err(ChunkMessageError::InvalidMessageHead(format!(
                        "got a type 1 header while no context found for csid: {}",
                        csid
                    )));
                };

                let extended_timestamp_enabled = header.timestamp_delta >= MAX_TIMESTAMP;
                self.buffer
                    .put_uint(header.timestamp_delta.min(MAX_TIMESTAMP) as u64, 3);
                self.buffer.put_uint(header.message_length as u64, 3);
                self.buffer.put_u8(header.message_type_id);
                if extended_timestamp_enabled {
                    self.buffer.put_u32(header.timestamp_delta);
                }

                ctx.extended_timestamp_enabled = extended_timestamp_enabled;
                ctx.timestamp_delta = header.timestamp_delta;
                ctx.timestamp += header.timestamp_delta;
                ctx.message_length = header.message_length;
                ctx.message_type_id = header.message_type_id;
                ctx.previous_fmt = Some(1);

                Ok(extended_timestamp_enabled.then_some(header.timestamp_delta))
            }
            ChunkMessageHeader::Type2(header) => {
                let Some(ctx) = self.context.get_mut(&csid) else {
                    return Err(ChunkMessageError::InvalidMessageHead(format!(
                        "got a type 2 header while no context found for csid: {}",
                        csid
                    )));
                };

                let extended_timestamp_enabled = header.timestamp_delta >= MAX_TIMESTAMP;
                self.buffer
                    .put_uint(header.timestamp_delta.min(MAX_TIMESTAMP) as u64, 3);
                if extended_timestamp_enabled {
                    self.buffer.put_u32(header.timestamp_delta);
                }

                ctx.extended_timestamp_enabled = extended_timestamp_enabled;
                ctx.timestamp_delta = header.timestamp_delta;
                ctx.timestamp += header.timestamp_delta;
                ctx.previous_fmt = Some(2);

                Ok(extended_timestamp_enabled.then_some(header.timestamp_delta))
            }
            ChunkMessageHeader::Type3(_) => {
                let Some(ctx) = self.context.get_mut(&csid) else {
                    return Err(ChunkMessageError::InvalidMessageHead(format!(
                        "got a type 3 header while no context found for csid: {}",
                        csid
                    )));
                };

                if ctx.extended_timestamp_enabled {
                    self.buffer.put_u32(ctx.timestamp_delta);
                }
                ctx.timestamp += ctx.timestamp_delta;
                ctx.previous_fmt = Some(3);

                Ok(ctx
                    .extended_timestamp_enabled
                    .then_some(ctx.timestamp_delta))
            }
        }
    }
}
