use std::{
    collections::HashMap,
    fmt::Debug,
    io::Cursor,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use rtmp_formats::{
    chunk::{
        ChunkMessage, ChunkMessageCommonHeader, RtmpChunkMessageBody,
        consts::DEFAULT_CHUNK_SIZE,
        errors::ChunkMessageResult,
        reader::Reader,
        writer::Writer,
    },
    commands::{
        CallCommandRequest, CloseStreamCommand, CommandResponse, ConnectCommandRequest,
        ConnectCommandResponse, CreateStreamCommandRequest, CreateStreamCommandResponse,
        DeleteStreamCommand, PauseCommand, PlayCommand, PublishCommand, ReceiveAudioCommand,
        ReceiveVideoCommand, RtmpS2CCommands, SeekCommand,
    },
    handshake::client::HandshakeClient,
    message::RtmpUserMessageBody,
    protocol_control::ProtocolControlMessage,
    user_control::UserControlEvent,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    select,
    sync::{broadcast, mpsc, oneshot},
    time::sleep,
};
use tokio_util::bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, error, info, trace};

use crate::{
    config::ConnectionConfig,
    errors::{RtmpClientError, RtmpClientResult},
    status::{StatusCode, StatusEvent},
    stream::{MediaMessage, Stream, StreamCore},
};

const WRITER_CHANNEL_SIZE: usize = 128;
const MEDIA_CHANNEL_SIZE: usize = 128;
const STATUS_CHANNEL_SIZE: usize = 32;
const WRITER_BATCH_SIZE: usize = 16;
const READ_BUFFER_SIZE: usize = 4096;
const CONNECT_TRANSACTION_ID: u32 = 1;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub(crate) enum WriterCommand {
    Connect(ConnectCommandRequest),
    Call(CallCommandRequest),
    CreateStream(CreateStreamCommandRequest),
    DeleteStream(DeleteStreamCommand),
    CloseStream {
        command: CloseStreamCommand,
        stream_id: u32,
    },
    Play {
        command: PlayCommand,
        stream_id: u32,
    },
    Publish {
        command: PublishCommand,
        stream_id: u32,
    },
    Seek {
        command: SeekCommand,
        stream_id: u32,
    },
    Pause {
        command: PauseCommand,
        stream_id: u32,
    },
    ReceiveAudio {
        command: ReceiveAudioCommand,
        stream_id: u32,
    },
    ReceiveVideo {
        command: ReceiveVideoCommand,
        stream_id: u32,
    },
    SetBufferLength {
        stream_id: u32,
        buffer_length: u32,
    },
    SetChunkSize(u32),
    Acknowledgement(u32),
    PingResponse(u32),
    Audio {
        payload: Bytes,
        timestamp: u32,
        stream_id: u32,
        preferred_fmt: u8,
    },
    Video {
        payload: Bytes,
        timestamp: u32,
        stream_id: u32,
        preferred_fmt: u8,
    },
    Data {
        payload: Bytes,
        timestamp: u32,
        stream_id: u32,
        preferred_fmt: u8,
    },
    Shutdown,
}

#[derive(Debug)]
struct TransactionTable {
    next_id: u32,
    pending: HashMap<u32, oneshot::Sender<CommandResponse>>,
}

// bytes received since the last acknowledgement, measured against the
// window the peer announced, or the configured default until it does
#[derive(Debug)]
struct AckTracker {
    window: u32,
    acknowledged: u32,
}

#[derive(Debug)]
pub(crate) struct ConnectionCore {
    writer: mpsc::Sender<WriterCommand>,
    transactions: Mutex<TransactionTable>,
    streams: Mutex<HashMap<u32, Arc<StreamCore>>>,
    status: Mutex<Option<broadcast::Sender<StatusEvent>>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    request_timeout: Duration,
    publish_bracketing: bool,
}

impl ConnectionCore {
    pub(crate) async fn enqueue(&self, command: WriterCommand) -> RtmpClientResult<()> {
        self.writer
            .send(command)
            .await
            .map_err(|_| RtmpClientError::ChannelClosed)
    }

    pub(crate) fn try_enqueue(&self, command: WriterCommand) -> RtmpClientResult<()> {
        self.writer
            .try_send(command)
            .map_err(|_| RtmpClientError::ChannelClosed)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub(crate) fn publish_bracketing(&self) -> bool {
        self.publish_bracketing
    }

    // FCPublish and friends burn a transaction id without anyone waiting
    // on the answer
    pub(crate) fn allocate_transaction(&self) -> u32 {
        let mut transactions = lock(&self.transactions);
        let id = transactions.next_id;
        transactions.next_id = transactions
            .next_id
            .checked_add(1)
            .unwrap_or(CONNECT_TRANSACTION_ID + 1);
        id
    }

    fn register_transaction(&self) -> (u32, oneshot::Receiver<CommandResponse>) {
        let mut transactions = lock(&self.transactions);
        let id = transactions.next_id;
        transactions.next_id = transactions
            .next_id
            .checked_add(1)
            .unwrap_or(CONNECT_TRANSACTION_ID + 1);
        let (sender, receiver) = oneshot::channel();
        transactions.pending.insert(id, sender);
        (id, receiver)
    }

    fn take_transaction(&self, transaction_id: u32) {
        lock(&self.transactions).pending.remove(&transaction_id);
    }

    // the send stays under the table lock, a caller peeking after its
    // timeout cannot miss a result that was already on its way
    fn resolve_transaction(&self, response: CommandResponse) {
        let mut transactions = lock(&self.transactions);
        match transactions
            .pending
            .remove(&(response.transaction_id as u32))
        {
            Some(sender) => {
                if sender.send(response).is_err() {
                    trace!("a command response arrived after its caller gave up");
                }
            }
            None => debug!(
                "no pending transaction for response {}",
                response.transaction_id
            ),
        }
    }

    async fn await_response(
        &self,
        transaction_id: u32,
        mut receiver: oneshot::Receiver<CommandResponse>,
    ) -> RtmpClientResult<CommandResponse> {
        select! {
            response = &mut receiver => match response {
                Ok(response) => into_result(response),
                Err(_) => Err(RtmpClientError::ConnectionClosed),
            },
            _ = sleep(self.request_timeout) => {
                let mut transactions = lock(&self.transactions);
                match receiver.try_recv() {
                    Ok(response) => into_result(response),
                    Err(oneshot::error::TryRecvError::Closed) => {
                        Err(RtmpClientError::ConnectionClosed)
                    }
                    Err(oneshot::error::TryRecvError::Empty) => {
                        transactions.pending.remove(&transaction_id);
                        Err(RtmpClientError::RequestTimedOut)
                    }
                }
            }
        }
    }

    pub(crate) fn stream(&self, stream_id: u32) -> Option<Arc<StreamCore>> {
        lock(&self.streams).get(&stream_id).cloned()
    }

    pub(crate) fn detach_stream(&self, stream_id: u32) {
        lock(&self.streams).remove(&stream_id);
    }

    fn broadcast_status(&self, event: StatusEvent) {
        let sender = lock(&self.status).clone();
        if let Some(sender) = sender
            && sender.send(event).is_err()
        {
            trace!("no status subscribers");
        }
    }

    pub(crate) fn shutdown(&self) {
        if let Some(sender) = lock(&self.shutdown).take() {
            let _ = sender.send(());
        }
    }

    fn teardown(&self) {
        // dropping the senders wakes every waiting caller with a closed
        // channel
        lock(&self.transactions).pending.clear();
        let streams: Vec<Arc<StreamCore>> = lock(&self.streams)
            .drain()
            .map(|(_, stream)| stream)
            .collect();
        for stream in streams {
            stream.connection_lost();
        }
        if let Some(sender) = lock(&self.status).take() {
            let _ = sender.send(StatusEvent::from_code(
                StatusCode::ConnectClosed,
                "the connection is closed",
            ));
        }
        if self.try_enqueue(WriterCommand::Shutdown).is_err() {
            trace!("writer task already gone at teardown");
        }
    }
}

// _error responses carry their reason in the first additional value
fn into_result(response: CommandResponse) -> RtmpClientResult<CommandResponse> {
    if response.success {
        Ok(response)
    } else {
        let event = response
            .additional
            .first()
            .map(StatusEvent::from_value)
            .unwrap_or_else(|| StatusEvent::from_code(StatusCode::CallFailed, "the call failed"));
        Err(RtmpClientError::RequestFailed(event))
    }
}

async fn run_writer<T: AsyncWrite + Unpin>(
    mut transport: T,
    mut receiver: mpsc::Receiver<WriterCommand>,
    amf_version: amf::Version,
) {
    let mut writer = Writer::new();
    writer.set_amf_version(amf_version);
    let mut batch = Vec::with_capacity(WRITER_BATCH_SIZE);
    let mut shutting_down = false;
    while !shutting_down {
        batch.clear();
        if receiver.recv_many(&mut batch, WRITER_BATCH_SIZE).await == 0 {
            break;
        }
        for command in batch.drain(..) {
            if matches!(command, WriterCommand::Shutdown) {
                shutting_down = true;
                break;
            }
            if let Err(err) = encode(&mut writer, command) {
                error!("encoding an outbound message failed: {:?}", err);
            }
        }
        if let Err(err) = writer.write_to(&mut transport).await {
            error!("writing to the peer failed: {:?}", err);
            break;
        }
    }
    let _ = transport.shutdown().await;
    trace!("writer task exits");
}

fn encode(writer: &mut Writer, command: WriterCommand) -> ChunkMessageResult<()> {
    match command {
        WriterCommand::Connect(request) => writer.write_connect_request(request),
        WriterCommand::Call(request) => writer.write_call_request(request),
        WriterCommand::CreateStream(request) => writer.write_create_stream_request(request),
        WriterCommand::DeleteStream(command) => writer.write_delete_stream_request(command),
        WriterCommand::CloseStream { command, stream_id } => {
            writer.write_close_stream_request(command, stream_id)
        }
        WriterCommand::Play { command, stream_id } => writer.write_play_request(command, stream_id),
        WriterCommand::Publish { command, stream_id } => {
            writer.write_publish_request(command, stream_id)
        }
        WriterCommand::Seek { command, stream_id } => writer.write_seek_request(command, stream_id),
        WriterCommand::Pause { command, stream_id } => {
            writer.write_pause_request(command, stream_id)
        }
        WriterCommand::ReceiveAudio { command, stream_id } => {
            writer.write_receive_audio_request(command, stream_id)
        }
        WriterCommand::ReceiveVideo { command, stream_id } => {
            writer.write_receive_video_request(command, stream_id)
        }
        WriterCommand::SetBufferLength {
            stream_id,
            buffer_length,
        } => writer.write_set_buffer_length(stream_id, buffer_length),
        WriterCommand::SetChunkSize(chunk_size) => writer.write_set_chunk_size(chunk_size),
        WriterCommand::Acknowledgement(sequence_number) => {
            writer.write_acknowledgement_message(sequence_number)
        }
        WriterCommand::PingResponse(timestamp) => writer.write_ping_response(timestamp),
        WriterCommand::Audio {
            payload,
            timestamp,
            stream_id,
            preferred_fmt,
        } => writer.write_audio(payload, timestamp, stream_id, preferred_fmt),
        WriterCommand::Video {
            payload,
            timestamp,
            stream_id,
            preferred_fmt,
        } => writer.write_video(payload, timestamp, stream_id, preferred_fmt),
        WriterCommand::Data {
            payload,
            timestamp,
            stream_id,
            preferred_fmt,
        } => writer.write_meta(payload, timestamp, stream_id, preferred_fmt),
        WriterCommand::Shutdown => Ok(()),
    }
}

async fn run_reader<T: AsyncRead + Unpin>(
    mut transport: T,
    core: Arc<ConnectionCore>,
    mut shutdown: oneshot::Receiver<()>,
    initial_window: u32,
) {
    let mut reader = Reader::new();
    let mut buffer = BytesMut::with_capacity(READ_BUFFER_SIZE);
    let mut acknowledger = AckTracker {
        window: initial_window,
        acknowledged: 0,
    };
    'session: loop {
        loop {
            let (result, consumed) = {
                let mut cursor = Cursor::new(&buffer);
                let result = reader.read(&mut cursor, false);
                (result, cursor.position() as usize)
            };
            buffer.advance(consumed);
            match result {
                Ok(Some(message)) => {
                    dispatch_message(&core, &mut reader, &mut acknowledger, message).await
                }
                Ok(None) => break,
                Err(err) => {
                    error!("decoding an inbound message failed: {:?}", err);
                    break 'session;
                }
            }
        }
        maybe_acknowledge(&core, &reader, &mut acknowledger);
        select! {
            _ = &mut shutdown => break 'session,
            read = transport.read_buf(&mut buffer) => match read {
                Ok(0) => {
                    if buffer.is_empty() {
                        info!("the peer closed the connection");
                    } else {
                        error!("the peer closed the connection mid message");
                    }
                    break 'session;
                }
                Ok(_) => {}
                Err(err) => {
                    error!("reading from the peer failed: {:?}", err);
                    break 'session;
                }
            },
        }
    }
    core.teardown();
    trace!("reader task exits");
}

fn maybe_acknowledge(core: &ConnectionCore, reader: &Reader, acknowledger: &mut AckTracker) {
    if acknowledger.window == 0 {
        return;
    }
    let received = reader.get_bytes_read();
    if received < acknowledger.acknowledged {
        // the reader wrapped its counter
        acknowledger.acknowledged = 0;
    }
    if received - acknowledger.acknowledged >= acknowledger.window {
        acknowledger.acknowledged = received;
        if core
            .try_enqueue(WriterCommand::Acknowledgement(received))
            .is_err()
        {
            trace!("writer is gone, skipping the acknowledgement");
        }
    }
}

async fn dispatch_message(
    core: &ConnectionCore,
    reader: &mut Reader,
    acknowledger: &mut AckTracker,
    message: ChunkMessage,
) {
    let header = message.header;
    match message.chunk_message_body {
        RtmpChunkMessageBody::ProtocolControl(control) => {
            handle_protocol_control(reader, acknowledger, control)
        }
        RtmpChunkMessageBody::UserControl(event) => handle_user_control(core, event),
        RtmpChunkMessageBody::RtmpUserMessage(body) => {
            handle_user_message(core, &header, body).await
        }
    }
}

fn handle_protocol_control(
    reader: &mut Reader,
    acknowledger: &mut AckTracker,
    control: ProtocolControlMessage,
) {
    match control {
        ProtocolControlMessage::SetChunkSize(message) => {
            let old = reader.set_chunk_size(message.chunk_size as usize);
            debug!("peer chunk size {} -> {}", old, message.chunk_size);
        }
        ProtocolControlMessage::Abort(message) => {
            debug!("peer aborted chunk stream {}", message.chunk_stream_id);
            reader.abort_chunk_message(message.chunk_stream_id);
        }
        ProtocolControlMessage::Ack(message) => {
            trace!("peer acknowledged {} bytes", message.sequence_number);
        }
        ProtocolControlMessage::WindowAckSize(message) => {
            debug!("peer expects acknowledgements every {} bytes", message.size);
            acknowledger.window = message.size;
        }
        ProtocolControlMessage::SetPeerBandwidth(message) => {
            debug!("peer bandwidth {} ({:?})", message.size, message.limit_type);
        }
    }
}

fn handle_user_control(core: &ConnectionCore, event: UserControlEvent) {
    match event {
        UserControlEvent::StreamBegin { stream_id } => {
            debug!("stream {} begins", stream_id);
        }
        UserControlEvent::StreamEOF { stream_id } => {
            if core.stream(stream_id).is_some() {
                core.broadcast_status(StatusEvent::from_code(
                    StatusCode::BufferFlush,
                    "data has finished streaming",
                ));
            }
        }
        UserControlEvent::StreamDry { stream_id } => {
            trace!("stream {} is dry", stream_id);
        }
        UserControlEvent::SetBufferLength {
            stream_id,
            buffer_length,
        } => {
            trace!("peer buffers {} ms of stream {}", buffer_length, stream_id);
        }
        UserControlEvent::StreamIdsRecorded { stream_id } => {
            trace!("stream {} is recorded", stream_id);
        }
        UserControlEvent::PingRequest { timestamp } => {
            // answered off the read loop, the writer channel keeps ordering
            if core
                .try_enqueue(WriterCommand::PingResponse(timestamp))
                .is_err()
            {
                trace!("writer is gone, dropping the ping response");
            }
        }
        UserControlEvent::PingResponse { timestamp } => {
            trace!("peer answered ping {}", timestamp);
        }
        UserControlEvent::BufferEmpty { stream_id } => {
            if core.stream(stream_id).is_some() {
                core.broadcast_status(StatusEvent::from_code(
                    StatusCode::BufferEmpty,
                    "the play buffer ran dry",
                ));
            }
        }
        UserControlEvent::BufferFull { stream_id } => {
            if core.stream(stream_id).is_some() {
                core.broadcast_status(StatusEvent::from_code(
                    StatusCode::BufferFull,
                    "the play buffer refilled",
                ));
            }
        }
    }
}

async fn handle_user_message(
    core: &ConnectionCore,
    header: &ChunkMessageCommonHeader,
    body: RtmpUserMessageBody,
) {
    match body {
        RtmpUserMessageBody::S2CCommand(RtmpS2CCommands::Response(response)) => {
            core.resolve_transaction(response);
        }
        RtmpUserMessageBody::S2CCommand(RtmpS2CCommands::OnStatus(command)) => {
            let event = StatusEvent::from_info_object(command.info_object);
            debug!(
                "stream {} status {}: {}",
                header.message_stream_id, event.code, event.description
            );
            if let Some(stream) = core.stream(header.message_stream_id) {
                stream.handle_status(&event);
            }
            core.broadcast_status(event);
        }
        RtmpUserMessageBody::S2CCommand(RtmpS2CCommands::Call(command)) => {
            debug!("ignoring the server side call {}", command.command_name);
        }
        RtmpUserMessageBody::Audio { payload } => match core.stream(header.message_stream_id) {
            Some(stream) => stream.forward_audio(payload, header.timestamp).await,
            None => trace!("audio for unknown stream {}", header.message_stream_id),
        },
        RtmpUserMessageBody::Video { payload } => match core.stream(header.message_stream_id) {
            Some(stream) => stream.forward_video(payload, header.timestamp).await,
            None => trace!("video for unknown stream {}", header.message_stream_id),
        },
        RtmpUserMessageBody::MetaData { payload } => match core.stream(header.message_stream_id) {
            Some(stream) => stream.forward_data(payload, header.timestamp).await,
            None => trace!("data for unknown stream {}", header.message_stream_id),
        },
        RtmpUserMessageBody::SharedObject { .. } | RtmpUserMessageBody::Aggregate { .. } => {
            trace!("skipping an unhandled message type");
        }
        RtmpUserMessageBody::C2SCommand(command) => {
            debug!("unexpected client side command {:?} from the peer", command);
        }
    }
}

///! @see: 7.2.1. NetConnection Commands
#[derive(Debug)]
pub struct Connection {
    core: Arc<ConnectionCore>,
}

impl Connection {
    pub async fn connect<T>(
        io: T,
        config: ConnectionConfig,
    ) -> RtmpClientResult<(Self, ConnectCommandResponse)>
    where
        T: AsyncRead + AsyncWrite + Unpin + Debug + Send + 'static,
    {
        let io = if config.complex_handshake {
            HandshakeClient::complex(io).handshake(false).await?
        } else {
            HandshakeClient::new(io).handshake(false).await?
        };

        let (writer_sender, writer_receiver) = mpsc::channel(WRITER_CHANNEL_SIZE);
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let (status_sender, _) = broadcast::channel(STATUS_CHANNEL_SIZE);
        let core = Arc::new(ConnectionCore {
            writer: writer_sender,
            transactions: Mutex::new(TransactionTable {
                next_id: CONNECT_TRANSACTION_ID + 1,
                pending: HashMap::new(),
            }),
            streams: Mutex::new(HashMap::new()),
            status: Mutex::new(Some(status_sender)),
            shutdown: Mutex::new(Some(shutdown_sender)),
            request_timeout: config.request_timeout,
            publish_bracketing: config.publish_bracketing,
        });
        let (read_half, write_half) = tokio::io::split(io);
        tokio::spawn(run_writer(
            write_half,
            writer_receiver,
            config.object_encoding,
        ));
        tokio::spawn(run_reader(
            read_half,
            core.clone(),
            shutdown_receiver,
            config.window_ack_size,
        ));

        // the Drop impl tears the tasks down if anything below fails
        let connection = Self { core };
        let receiver = {
            let mut transactions = lock(&connection.core.transactions);
            let (sender, receiver) = oneshot::channel();
            transactions.pending.insert(CONNECT_TRANSACTION_ID, sender);
            receiver
        };
        let request = ConnectCommandRequest {
            transaction_id: CONNECT_TRANSACTION_ID as u8,
            command_object: config.connect_command_object(),
            optional_user_arguments: None,
        };
        connection
            .core
            .enqueue(WriterCommand::Connect(request))
            .await?;
        let response = connection
            .core
            .await_response(CONNECT_TRANSACTION_ID, receiver)
            .await?;
        let response: ConnectCommandResponse = response.try_into()?;
        if config.chunk_size != DEFAULT_CHUNK_SIZE {
            connection
                .core
                .enqueue(WriterCommand::SetChunkSize(config.chunk_size))
                .await?;
        }
        info!("connected to {} as app {}", config.tc_url, config.app);
        Ok((connection, response))
    }

    pub async fn call(
        &self,
        procedure_name: &str,
        arguments: Vec<amf::Value>,
    ) -> RtmpClientResult<CommandResponse> {
        let (transaction_id, receiver) = self.core.register_transaction();
        let request = CallCommandRequest {
            procedure_name: procedure_name.to_string(),
            transaction_id: transaction_id as f64,
            command_object: None,
            optional_arguments: arguments,
        };
        if let Err(err) = self.core.enqueue(WriterCommand::Call(request)).await {
            self.core.take_transaction(transaction_id);
            return Err(err);
        }
        self.core.await_response(transaction_id, receiver).await
    }

    pub async fn create_stream(&self) -> RtmpClientResult<(Stream, mpsc::Receiver<MediaMessage>)> {
        let (transaction_id, receiver) = self.core.register_transaction();
        let request = CreateStreamCommandRequest {
            transaction_id: transaction_id as f64,
            command_object: None,
        };
        if let Err(err) = self
            .core
            .enqueue(WriterCommand::CreateStream(request))
            .await
        {
            self.core.take_transaction(transaction_id);
            return Err(err);
        }
        let response = self.core.await_response(transaction_id, receiver).await?;
        let response = CreateStreamCommandResponse::try_from(response)?;
        let stream_id = response.stream_id as u32;
        let (media_sender, media_receiver) = mpsc::channel(MEDIA_CHANNEL_SIZE);
        let stream = Arc::new(StreamCore::new(stream_id, media_sender));
        lock(&self.core.streams).insert(stream_id, stream.clone());
        info!("created stream {}", stream_id);
        Ok((
            Stream::new(stream, Arc::downgrade(&self.core)),
            media_receiver,
        ))
    }

    pub fn status(&self) -> broadcast::Receiver<StatusEvent> {
        match lock(&self.core.status).as_ref() {
            Some(sender) => sender.subscribe(),
            // a torn down connection hands out a receiver that reports closed
            None => broadcast::channel(1).1,
        }
    }

    pub fn close(&self) {
        self.core.shutdown();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.core.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, ScriptedPeer};
    use rtmp_formats::commands::RtmpC2SCommands;
    use tokio::io::duplex;

    fn test_config() -> ConnectionConfig {
        let mut config = ConnectionConfig::new("live", "rtmp://127.0.0.1/live");
        config.request_timeout = Duration::from_millis(500);
        config
    }

    #[tokio::test]
    async fn connect_completes_against_a_scripted_server() {
        let (_connection, _peer) = testing::connected(test_config()).await;
    }

    #[tokio::test]
    async fn connect_surfaces_a_rejection() {
        let (client_io, server_io) = duplex(65536);
        let server = tokio::spawn(async move {
            let mut peer = ScriptedPeer::accept(server_io).await;
            let _ = peer.recv_command().await;
            peer.send_error(
                1.0,
                amf::object([
                    ("level", amf::string("error")),
                    ("code", amf::string("NetConnection.Connect.Rejected")),
                    ("description", amf::string("the app does not exist")),
                ]),
            )
            .await;
            peer
        });
        match Connection::connect(client_io, test_config()).await {
            Err(RtmpClientError::RequestFailed(event)) => {
                assert_eq!(event.code, StatusCode::ConnectRejected.as_str());
                assert_eq!(event.description, "the app does not exist");
                assert!(event.is_error());
            }
            unexpected => panic!("expected a rejected connect, got {:?}", unexpected),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn call_correlates_out_of_order_responses() {
        let (connection, mut peer) = testing::connected(test_config()).await;
        let connection = Arc::new(connection);

        let first = {
            let connection = connection.clone();
            tokio::spawn(async move { connection.call("first", vec![]).await })
        };
        let second = {
            let connection = connection.clone();
            tokio::spawn(async move { connection.call("second", vec![]).await })
        };

        let mut calls = Vec::new();
        for _ in 0..2 {
            let (_, command) = peer.recv_command().await;
            let RtmpC2SCommands::Call(request) = command else {
                panic!("expected a call request");
            };
            calls.push((request.procedure_name, request.transaction_id));
        }
        // answer in reverse order, each caller must still get its own result
        for (name, transaction_id) in calls.iter().rev() {
            peer.send_result(*transaction_id, vec![amf::string(name.as_str())])
                .await;
        }

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.additional, vec![amf::string("first")]);
        assert_eq!(second.additional, vec![amf::string("second")]);
    }

    #[tokio::test]
    async fn call_times_out_without_a_response() {
        let mut config = test_config();
        config.request_timeout = Duration::from_millis(50);
        let (connection, mut peer) = testing::connected(config).await;
        let connection = Arc::new(connection);

        let result = connection.call("slow", vec![]).await;
        assert!(matches!(result, Err(RtmpClientError::RequestTimedOut)));

        let (_, command) = peer.recv_command().await;
        let RtmpC2SCommands::Call(request) = command else {
            panic!("expected a call request");
        };
        // a late answer to the abandoned transaction is dropped
        peer.send_result(request.transaction_id, vec![]).await;

        let retry = {
            let connection = connection.clone();
            tokio::spawn(async move { connection.call("retry", vec![]).await })
        };
        let (_, command) = peer.recv_command().await;
        let RtmpC2SCommands::Call(request) = command else {
            panic!("expected a call request");
        };
        peer.send_result(request.transaction_id, vec![amf::bool(true)])
            .await;
        let response = retry.await.unwrap().unwrap();
        assert_eq!(response.additional, vec![amf::bool(true)]);
    }

    #[tokio::test]
    async fn call_maps_error_responses() {
        let (connection, mut peer) = testing::connected(test_config()).await;
        let connection = Arc::new(connection);
        let call = {
            let connection = connection.clone();
            tokio::spawn(async move { connection.call("denied", vec![]).await })
        };
        let (_, command) = peer.recv_command().await;
        let RtmpC2SCommands::Call(request) = command else {
            panic!("expected a call request");
        };
        peer.send_error(
            request.transaction_id,
            amf::object([
                ("level", amf::string("error")),
                ("code", amf::string("NetConnection.Call.Failed")),
                ("description", amf::string("no such procedure")),
            ]),
        )
        .await;
        match call.await.unwrap() {
            Err(RtmpClientError::RequestFailed(event)) => {
                assert_eq!(event.code, StatusCode::CallFailed.as_str());
                assert_eq!(event.description, "no such procedure");
                assert!(event.is_error());
            }
            unexpected => panic!("expected a failed call, got {:?}", unexpected),
        }
    }

    #[tokio::test]
    async fn ping_requests_are_answered() {
        let (_connection, mut peer) = testing::connected(test_config()).await;
        peer.send_ping_request(4242).await;
        let message = peer.recv().await;
        match message.chunk_message_body {
            RtmpChunkMessageBody::UserControl(UserControlEvent::PingResponse { timestamp }) => {
                assert_eq!(timestamp, 4242);
            }
            unexpected => panic!("expected a ping response, got {:?}", unexpected),
        }
    }

    #[tokio::test]
    async fn set_peer_bandwidth_is_recorded_without_a_reply() {
        let (_connection, mut peer) = testing::connected(test_config()).await;
        peer.send_set_peer_bandwidth(5_000_000).await;
        peer.send_ping_request(7).await;
        // the first message back must be the ping response, a bandwidth
        // answer would have arrived ahead of it
        let message = peer.recv().await;
        match message.chunk_message_body {
            RtmpChunkMessageBody::UserControl(UserControlEvent::PingResponse { timestamp }) => {
                assert_eq!(timestamp, 7);
            }
            unexpected => panic!("expected only a ping response, got {:?}", unexpected),
        }
    }

    #[tokio::test]
    async fn acknowledgements_follow_the_announced_window() {
        let (_connection, mut peer) = testing::connected(test_config()).await;
        peer.send_window_ack_size(2048).await;
        peer.send_audio(9, Bytes::from(vec![0x2F; 1200]), 0).await;
        peer.send_audio(9, Bytes::from(vec![0x2F; 1200]), 20).await;
        let message = peer.recv().await;
        match message.chunk_message_body {
            RtmpChunkMessageBody::ProtocolControl(ProtocolControlMessage::Ack(ack)) => {
                assert!(ack.sequence_number >= 2048);
            }
            unexpected => panic!("expected an acknowledgement, got {:?}", unexpected),
        }
    }

    #[tokio::test]
    async fn peer_chunk_size_changes_apply_to_the_reader() {
        let (_connection, mut peer) = testing::connected(test_config()).await;
        // a 600 byte message arrives in one chunk only once the announced
        // size is applied, the following ping proves the session survived
        peer.send_set_chunk_size(1024).await;
        peer.send_audio(9, Bytes::from(vec![0x2F; 600]), 0).await;
        peer.send_ping_request(11).await;
        let message = peer.recv().await;
        match message.chunk_message_body {
            RtmpChunkMessageBody::UserControl(UserControlEvent::PingResponse { timestamp }) => {
                assert_eq!(timestamp, 11);
            }
            unexpected => panic!("expected a ping response, got {:?}", unexpected),
        }
    }

    #[tokio::test]
    async fn teardown_fails_pending_and_broadcasts_close() {
        let (connection, mut peer) = testing::connected(test_config()).await;
        let mut status = connection.status();
        let connection = Arc::new(connection);
        let call = {
            let connection = connection.clone();
            tokio::spawn(async move { connection.call("never", vec![]).await })
        };
        let _ = peer.recv_command().await;
        drop(peer);
        let result = call.await.unwrap();
        assert!(matches!(result, Err(RtmpClientError::ConnectionClosed)));
        let event = status.recv().await.unwrap();
        assert_eq!(event.code, StatusCode::ConnectClosed.as_str());
        assert!(matches!(
            status.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn explicit_close_shuts_the_connection_down() {
        let (connection, mut peer) = testing::connected(test_config()).await;
        let mut status = connection.status();
        connection.close();
        let event = status.recv().await.unwrap();
        assert_eq!(event.code, StatusCode::ConnectClosed.as_str());
        peer.expect_eof().await;
    }
}
