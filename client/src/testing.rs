use std::io::Cursor;

use rtmp_formats::{
    chunk::{
        ChunkBasicHeader, ChunkMessage, ChunkMessageCommonHeader, RtmpChunkMessageBody,
        consts::csid, reader::Reader, writer::Writer,
    },
    commands::{CommandResponse, OnStatusCommand, RtmpC2SCommands, RtmpS2CCommands},
    handshake::consts::RTMP_HANDSHAKE_SIZE,
    message::{RtmpMessageType, RtmpUserMessageBody},
    protocol_control::{
        ProtocolControlMessage, ProtocolControlMessageType, SetPeerBandWidthLimitType,
        SetPeerBandwidth, consts::PROTOCOL_CONTROL_MESSAGE_STREAM_ID,
    },
    user_control::{
        UserControlEvent,
        consts::{USER_CONTROL_MESSAGE_STREAM_ID, USER_CONTROL_MESSAGE_TYPE},
    },
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex},
    sync::mpsc,
};
use tokio_util::bytes::{Buf, Bytes, BytesMut};

use crate::{
    config::ConnectionConfig,
    connection::Connection,
    status::{StatusCode, level},
    stream::{MediaMessage, Stream},
};

pub(crate) const TEST_STREAM_ID: u32 = 5;

// the server half of an in-memory connection, driven explicitly by tests
pub(crate) struct ScriptedPeer {
    io: DuplexStream,
    reader: Reader,
    writer: Writer,
    buffer: BytesMut,
}

impl ScriptedPeer {
    pub(crate) async fn accept(mut io: DuplexStream) -> Self {
        let mut c0c1 = [0u8; RTMP_HANDSHAKE_SIZE + 1];
        io.read_exact(&mut c0c1).await.unwrap();
        io.write_all(&[3u8]).await.unwrap();
        io.write_all(&[7u8; RTMP_HANDSHAKE_SIZE]).await.unwrap();
        // s2 echoes c1 so the echo verification on the client side passes
        io.write_all(&c0c1[1..]).await.unwrap();
        let mut c2 = [0u8; RTMP_HANDSHAKE_SIZE];
        io.read_exact(&mut c2).await.unwrap();
        Self {
            io,
            reader: Reader::new(),
            writer: Writer::new(),
            buffer: BytesMut::with_capacity(4096),
        }
    }

    pub(crate) async fn recv(&mut self) -> ChunkMessage {
        loop {
            let (result, consumed) = {
                let mut cursor = Cursor::new(&self.buffer);
                let result = self.reader.read(&mut cursor, true);
                (result, cursor.position() as usize)
            };
            self.buffer.advance(consumed);
            if let Some(message) = result.unwrap() {
                if let RtmpChunkMessageBody::ProtocolControl(
                    ProtocolControlMessage::SetChunkSize(control),
                ) = &message.chunk_message_body
                {
                    self.reader.set_chunk_size(control.chunk_size as usize);
                }
                return message;
            }
            if self.io.read_buf(&mut self.buffer).await.unwrap() == 0 {
                panic!("the connection closed while a message was expected");
            }
        }
    }

    pub(crate) async fn recv_command(&mut self) -> (ChunkMessageCommonHeader, RtmpC2SCommands) {
        loop {
            let message = self.recv().await;
            if let RtmpChunkMessageBody::RtmpUserMessage(RtmpUserMessageBody::C2SCommand(
                command,
            )) = message.chunk_message_body
            {
                return (message.header, command);
            }
        }
    }

    pub(crate) async fn recv_media(&mut self) -> ChunkMessage {
        loop {
            let message = self.recv().await;
            if let RtmpChunkMessageBody::RtmpUserMessage(
                RtmpUserMessageBody::Audio { .. }
                | RtmpUserMessageBody::Video { .. }
                | RtmpUserMessageBody::MetaData { .. },
            ) = &message.chunk_message_body
            {
                return message;
            }
        }
    }

    pub(crate) async fn expect_eof(&mut self) {
        loop {
            self.buffer.clear();
            if self.io.read_buf(&mut self.buffer).await.unwrap() == 0 {
                return;
            }
        }
    }

    async fn send(&mut self, message: ChunkMessage) {
        self.writer.write(message).unwrap();
        self.flush().await;
    }

    async fn flush(&mut self) {
        self.writer.write_to(&mut self.io).await.unwrap();
    }

    pub(crate) async fn send_result(&mut self, transaction_id: f64, additional: Vec<amf::Value>) {
        self.send(command_message(CommandResponse {
            success: true,
            transaction_id,
            command_object: None,
            additional,
        }))
        .await;
    }

    pub(crate) async fn send_error(&mut self, transaction_id: f64, info: amf::Value) {
        self.send(command_message(CommandResponse {
            success: false,
            transaction_id,
            command_object: None,
            additional: vec![info],
        }))
        .await;
    }

    pub(crate) async fn send_status(
        &mut self,
        stream_id: u32,
        status_level: &str,
        code: &str,
        description: &str,
    ) {
        let command = OnStatusCommand {
            transaction_id: 0,
            info_object: vec![
                ("level".to_string(), amf::string(status_level)),
                ("code".to_string(), amf::string(code)),
                ("description".to_string(), amf::string(description)),
            ],
        };
        self.send(ChunkMessage {
            header: common_header(
                csid::NET_STREAM_COMMAND.into(),
                stream_id,
                RtmpMessageType::AMF0Command.into(),
            ),
            chunk_message_body: RtmpChunkMessageBody::RtmpUserMessage(
                RtmpUserMessageBody::S2CCommand(RtmpS2CCommands::OnStatus(command)),
            ),
        })
        .await;
    }

    pub(crate) async fn send_audio(&mut self, stream_id: u32, payload: Bytes, timestamp: u32) {
        self.writer
            .write_audio(payload, timestamp, stream_id, 0)
            .unwrap();
        self.flush().await;
    }

    pub(crate) async fn send_video(&mut self, stream_id: u32, payload: Bytes, timestamp: u32) {
        self.writer
            .write_video(payload, timestamp, stream_id, 0)
            .unwrap();
        self.flush().await;
    }

    pub(crate) async fn send_meta(&mut self, stream_id: u32, payload: Bytes, timestamp: u32) {
        self.writer
            .write_meta(payload, timestamp, stream_id, 0)
            .unwrap();
        self.flush().await;
    }

    pub(crate) async fn send_window_ack_size(&mut self, size: u32) {
        self.writer.write_window_ack_size_message(size).unwrap();
        self.flush().await;
    }

    pub(crate) async fn send_set_chunk_size(&mut self, size: u32) {
        self.writer.write_set_chunk_size(size).unwrap();
        self.flush().await;
    }

    pub(crate) async fn send_set_peer_bandwidth(&mut self, size: u32) {
        self.send(ChunkMessage {
            header: common_header(
                csid::PROTOCOL_CONTROL.into(),
                PROTOCOL_CONTROL_MESSAGE_STREAM_ID,
                ProtocolControlMessageType::SetPeerBandwidth.into(),
            ),
            chunk_message_body: RtmpChunkMessageBody::ProtocolControl(
                ProtocolControlMessage::SetPeerBandwidth(SetPeerBandwidth {
                    size,
                    limit_type: SetPeerBandWidthLimitType::Dynamic,
                }),
            ),
        })
        .await;
    }

    pub(crate) async fn send_ping_request(&mut self, timestamp: u32) {
        self.send(ChunkMessage {
            header: common_header(
                csid::USER_CONTROL.into(),
                USER_CONTROL_MESSAGE_STREAM_ID,
                USER_CONTROL_MESSAGE_TYPE,
            ),
            chunk_message_body: RtmpChunkMessageBody::UserControl(UserControlEvent::PingRequest {
                timestamp,
            }),
        })
        .await;
    }
}

fn common_header(
    chunk_stream_id: u32,
    message_stream_id: u32,
    message_type_id: u8,
) -> ChunkMessageCommonHeader {
    ChunkMessageCommonHeader {
        basic_header: ChunkBasicHeader::new(0, chunk_stream_id).unwrap(),
        timestamp: 0,
        // the writer recomputes the length from the encoded body
        message_length: 0,
        message_type_id,
        message_stream_id,
        extended_timestamp_enabled: false,
    }
}

fn command_message(response: CommandResponse) -> ChunkMessage {
    ChunkMessage {
        header: common_header(
            csid::NET_CONNECTION_COMMAND.into(),
            0,
            RtmpMessageType::AMF0Command.into(),
        ),
        chunk_message_body: RtmpChunkMessageBody::RtmpUserMessage(
            RtmpUserMessageBody::S2CCommand(RtmpS2CCommands::Response(response)),
        ),
    }
}

pub(crate) fn connect_success_info() -> amf::Value {
    amf::object([
        ("level", amf::string(level::STATUS)),
        ("code", amf::string(StatusCode::ConnectSuccess.as_str())),
        ("description", amf::string("Connection succeeded.")),
    ])
}

pub(crate) async fn connected(config: ConnectionConfig) -> (Connection, ScriptedPeer) {
    let expected_app = config.app.clone();
    let (client_io, server_io) = duplex(65536);
    let server = tokio::spawn(async move {
        let mut peer = ScriptedPeer::accept(server_io).await;
        let (header, command) = peer.recv_command().await;
        assert_eq!(header.message_stream_id, 0);
        let RtmpC2SCommands::Connect(request) = command else {
            panic!("expected a connect request");
        };
        assert_eq!(request.transaction_id, 1);
        assert_eq!(request.command_object.app, expected_app);
        peer.send_result(1.0, vec![connect_success_info()]).await;
        peer
    });
    let (connection, response) = Connection::connect(client_io, config).await.unwrap();
    assert!(response.success);
    (connection, server.await.unwrap())
}

pub(crate) async fn connected_with_stream(
    config: ConnectionConfig,
) -> (Connection, Stream, mpsc::Receiver<MediaMessage>, ScriptedPeer) {
    let (connection, peer) = connected(config).await;
    let server = tokio::spawn(async move {
        let mut peer = peer;
        let (_, command) = peer.recv_command().await;
        let RtmpC2SCommands::CreateStream(request) = command else {
            panic!("expected a createStream request");
        };
        peer.send_result(request.transaction_id, vec![amf::number(TEST_STREAM_ID)])
            .await;
        peer
    });
    let (stream, media) = connection.create_stream().await.unwrap();
    assert_eq!(stream.id(), TEST_STREAM_ID);
    (connection, stream, media, server.await.unwrap())
}
