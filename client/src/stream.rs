use std::{
    collections::HashSet,
    sync::{Arc, Mutex, Weak},
    time::{Duration, Instant},
};

use rtmp_formats::commands::{
    CallCommandRequest, CloseStreamCommand, DeleteStreamCommand, PauseCommand, PlayCommand,
    PublishCommand, ReceiveAudioCommand, ReceiveVideoCommand, SeekCommand,
    consts::c2s_command_names,
};
use rtmp_formats::message::consts as message_consts;
use tokio::{
    select,
    sync::{mpsc, oneshot},
    time::sleep,
};
use tokio_util::bytes::Bytes;
use tracing::{debug, trace};

use crate::{
    connection::{ConnectionCore, WriterCommand, lock},
    errors::{RtmpClientError, RtmpClientResult},
    status::{StatusCode, StatusEvent},
};

// buffer time announced through SetBufferLength when playback starts
const PLAY_BUFFER_LENGTH_MS: u32 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    // play sent, awaiting NetStream.Play.Start
    Play,
    Playing,
    // publish sent, awaiting NetStream.Publish.Start
    Publish,
    Publishing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishType {
    Live,
    Record,
    Append,
    AppendWithGap,
}

impl PublishType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Record => "record",
            Self::Append => "append",
            Self::AppendWithGap => "appendWithGap",
        }
    }
}

/// one encoded buffer from the publishing application, is_config marks
/// sequence/config records rather than decodable frames
#[derive(Debug, Clone)]
pub struct MediaSample {
    pub kind: MediaKind,
    pub payload: Bytes,
    pub timestamp: u32,
    pub is_config: bool,
}

/// what a playing stream hands to its consumer channel, config records
/// arrive as their own variants ahead of the frames that need them
#[derive(Debug, Clone)]
pub enum MediaMessage {
    AudioConfig { payload: Bytes, timestamp: u32 },
    Audio { payload: Bytes, timestamp: u32 },
    VideoConfig { payload: Bytes, timestamp: u32 },
    Video { payload: Bytes, timestamp: u32 },
    Data { payload: Bytes, timestamp: u32 },
}

#[derive(Debug)]
struct PendingRequest {
    expected: StatusCode,
    success_state: StreamState,
    rollback_state: StreamState,
    set_paused: Option<bool>,
    starts_clock: bool,
    responder: oneshot::Sender<RtmpClientResult<StatusEvent>>,
}

// last config record sent and the absolute timestamp type 1 deltas build on
#[derive(Debug, Default)]
struct MediaTrack {
    config: Option<Bytes>,
    last_timestamp: u32,
}

#[derive(Debug)]
struct StreamInner {
    state: StreamState,
    pending: Option<PendingRequest>,
    paused: bool,
    detached: bool,
    publish_name: Option<String>,
    started_at: Option<Instant>,
    audio: MediaTrack,
    video: MediaTrack,
    data_sent: HashSet<String>,
    media_sender: Option<mpsc::Sender<MediaMessage>>,
}

#[derive(Debug)]
pub(crate) struct StreamCore {
    id: u32,
    inner: Mutex<StreamInner>,
}

impl StreamCore {
    pub(crate) fn new(id: u32, media_sender: mpsc::Sender<MediaMessage>) -> Self {
        Self {
            id,
            inner: Mutex::new(StreamInner {
                state: StreamState::Idle,
                pending: None,
                paused: false,
                detached: false,
                publish_name: None,
                started_at: None,
                audio: MediaTrack::default(),
                video: MediaTrack::default(),
                data_sent: HashSet::new(),
                media_sender: Some(media_sender),
            }),
        }
    }

    // a parked request resolves on its expected code, any other code while
    // a request is in flight fails it and the stream falls back to idle
    pub(crate) fn handle_status(&self, event: &StatusEvent) {
        let mut inner = lock(&self.inner);
        let Some(pending) = inner.pending.take() else {
            return;
        };
        if event.code == pending.expected.as_str() {
            inner.state = pending.success_state;
            if pending.starts_clock {
                inner.started_at = Some(Instant::now());
                inner.data_sent.clear();
            }
            if let Some(paused) = pending.set_paused {
                inner.paused = paused;
            }
            if inner.state == StreamState::Idle {
                inner.paused = false;
            }
            debug!("stream {} is {:?} after {}", self.id, inner.state, event.code);
            let _ = pending.responder.send(Ok(event.clone()));
        } else {
            inner.state = StreamState::Idle;
            debug!(
                "stream {} request expecting {} failed with {}",
                self.id,
                pending.expected.as_str(),
                event.code
            );
            let _ = pending
                .responder
                .send(Err(RtmpClientError::RequestFailed(event.clone())));
        }
    }

    pub(crate) async fn forward_audio(&self, payload: Bytes, timestamp: u32) {
        let message = if is_audio_sequence_header(&payload) {
            MediaMessage::AudioConfig { payload, timestamp }
        } else {
            MediaMessage::Audio { payload, timestamp }
        };
        self.forward(message).await;
    }

    pub(crate) async fn forward_video(&self, payload: Bytes, timestamp: u32) {
        let message = if is_video_sequence_header(&payload) {
            MediaMessage::VideoConfig { payload, timestamp }
        } else {
            MediaMessage::Video { payload, timestamp }
        };
        self.forward(message).await;
    }

    pub(crate) async fn forward_data(&self, payload: Bytes, timestamp: u32) {
        self.forward(MediaMessage::Data { payload, timestamp }).await;
    }

    async fn forward(&self, message: MediaMessage) {
        let sender = {
            let inner = lock(&self.inner);
            if inner.state != StreamState::Playing {
                trace!(
                    "dropping media for stream {} while {:?}",
                    self.id, inner.state
                );
                return;
            }
            inner.media_sender.clone()
        };
        if let Some(sender) = sender
            && sender.send(message).await.is_err()
        {
            trace!("media consumer for stream {} is gone", self.id);
        }
    }

    pub(crate) fn connection_lost(&self) {
        let pending = {
            let mut inner = lock(&self.inner);
            inner.state = StreamState::Idle;
            inner.media_sender = None;
            inner.pending.take()
        };
        if let Some(pending) = pending {
            let _ = pending
                .responder
                .send(Err(RtmpClientError::ConnectionClosed));
        }
    }
}

// FLV tag leading bytes: codec nibble plus a packet type selector, zero
// marks the sequence/config record. bit 7 of the first video byte flags the
// extended layout where the low nibble is the packet type itself
fn is_audio_sequence_header(payload: &[u8]) -> bool {
    payload.len() >= 2 && payload[0] >> 4 == 10 && payload[1] == 0
}

fn is_video_sequence_header(payload: &[u8]) -> bool {
    if payload.len() < 2 {
        return false;
    }
    if payload[0] & 0b1000_0000 != 0 {
        payload[0] & 0b0000_1111 == 0
    } else {
        payload[0] & 0b0000_1111 == 7 && payload[1] == 0
    }
}

///! @see: 7.2.2. NetStream Commands
#[derive(Debug)]
pub struct Stream {
    core: Arc<StreamCore>,
    connection: Weak<ConnectionCore>,
}

impl Stream {
    pub(crate) fn new(core: Arc<StreamCore>, connection: Weak<ConnectionCore>) -> Self {
        Self { core, connection }
    }

    pub fn id(&self) -> u32 {
        self.core.id
    }

    pub fn state(&self) -> StreamState {
        lock(&self.core.inner).state
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.core.inner).paused
    }

    fn connection(&self) -> RtmpClientResult<Arc<ConnectionCore>> {
        self.connection
            .upgrade()
            .ok_or(RtmpClientError::ConnectionClosed)
    }

    pub async fn play(&self, stream_name: &str) -> RtmpClientResult<StatusEvent> {
        let connection = self.connection()?;
        let receiver = {
            let mut inner = lock(&self.core.inner);
            if inner.state != StreamState::Idle || inner.pending.is_some() {
                return Err(RtmpClientError::InvalidState {
                    current: inner.state,
                    attempted: "play",
                });
            }
            let (responder, receiver) = oneshot::channel();
            inner.state = StreamState::Play;
            inner.pending = Some(PendingRequest {
                expected: StatusCode::PlayStart,
                success_state: StreamState::Playing,
                rollback_state: StreamState::Idle,
                set_paused: None,
                starts_clock: true,
                responder,
            });
            receiver
        };
        let command = PlayCommand {
            transaction_id: 0,
            stream_name: stream_name.to_string(),
            start: -2,
            duration: -1,
            reset: false,
        };
        self.send_or_abandon(
            &connection,
            WriterCommand::Play {
                command,
                stream_id: self.core.id,
            },
        )
        .await?;
        self.send_or_abandon(
            &connection,
            WriterCommand::SetBufferLength {
                stream_id: self.core.id,
                buffer_length: PLAY_BUFFER_LENGTH_MS,
            },
        )
        .await?;
        self.await_status(receiver, connection.request_timeout())
            .await
    }

    pub async fn publish(
        &self,
        stream_name: &str,
        publish_type: PublishType,
    ) -> RtmpClientResult<StatusEvent> {
        let connection = self.connection()?;
        let receiver = {
            let mut inner = lock(&self.core.inner);
            if inner.state != StreamState::Idle || inner.pending.is_some() {
                return Err(RtmpClientError::InvalidState {
                    current: inner.state,
                    attempted: "publish",
                });
            }
            let (responder, receiver) = oneshot::channel();
            inner.state = StreamState::Publish;
            inner.audio = MediaTrack::default();
            inner.video = MediaTrack::default();
            inner.publish_name = Some(stream_name.to_string());
            inner.pending = Some(PendingRequest {
                expected: StatusCode::PublishStart,
                success_state: StreamState::Publishing,
                rollback_state: StreamState::Idle,
                set_paused: None,
                starts_clock: true,
                responder,
            });
            receiver
        };
        if connection.publish_bracketing() {
            // FMS lineage servers expect releaseStream and FCPublish ahead
            // of publish, they answer with _result or not at all
            for procedure in [
                c2s_command_names::RELEASE_STREAM,
                c2s_command_names::FC_PUBLISH,
            ] {
                let request = CallCommandRequest {
                    procedure_name: procedure.to_string(),
                    transaction_id: connection.allocate_transaction() as f64,
                    command_object: None,
                    optional_arguments: vec![amf::string(stream_name)],
                };
                self.send_or_abandon(&connection, WriterCommand::Call(request))
                    .await?;
            }
        }
        let command = PublishCommand {
            transaction_id: 0,
            publishing_name: stream_name.to_string(),
            publishing_type: publish_type.as_str().to_string(),
        };
        self.send_or_abandon(
            &connection,
            WriterCommand::Publish {
                command,
                stream_id: self.core.id,
            },
        )
        .await?;
        let event = self
            .await_status(receiver, connection.request_timeout())
            .await?;
        // publishers announce stream metadata before any media message,
        // servers replay it to players that join later
        if let Err(err) = self
            .send_data(
                message_consts::SET_DATA_FRAME,
                &[
                    amf::string(message_consts::ON_META_DATA),
                    amf::Value::ECMAArray(Vec::new()),
                ],
                false,
            )
            .await
        {
            debug!(
                "stream {} metadata announcement failed: {:?}",
                self.core.id, err
            );
        }
        Ok(event)
    }

    pub async fn close(&self) -> RtmpClientResult<StatusEvent> {
        let connection = self.connection()?;
        let (receiver, unpublish_name) = {
            let mut inner = lock(&self.core.inner);
            if inner.pending.is_some() {
                return Err(RtmpClientError::InvalidState {
                    current: inner.state,
                    attempted: "close",
                });
            }
            let (expected, unpublish_name) = match inner.state {
                StreamState::Playing => (StatusCode::PlayStop, None),
                StreamState::Publishing => (
                    StatusCode::UnpublishSuccess,
                    Some(inner.publish_name.clone().unwrap_or_default()),
                ),
                current => {
                    return Err(RtmpClientError::InvalidState {
                        current,
                        attempted: "close",
                    });
                }
            };
            let (responder, receiver) = oneshot::channel();
            // media stops at the close call, not at the confirmation
            inner.media_sender = None;
            inner.pending = Some(PendingRequest {
                expected,
                success_state: StreamState::Idle,
                rollback_state: StreamState::Idle,
                set_paused: None,
                starts_clock: false,
                responder,
            });
            (receiver, unpublish_name)
        };
        if let Some(name) = unpublish_name {
            let request = CallCommandRequest {
                procedure_name: c2s_command_names::FC_UNPUBLISH.to_string(),
                transaction_id: connection.allocate_transaction() as f64,
                command_object: None,
                optional_arguments: vec![amf::string(name)],
            };
            self.send_or_abandon(&connection, WriterCommand::Call(request))
                .await?;
        }
        self.send_or_abandon(
            &connection,
            WriterCommand::CloseStream {
                command: CloseStreamCommand { transaction_id: 0 },
                stream_id: self.core.id,
            },
        )
        .await?;
        self.await_status(receiver, connection.request_timeout())
            .await
    }

    pub async fn pause(&self, paused: bool) -> RtmpClientResult<StatusEvent> {
        let connection = self.connection()?;
        let expected = if paused {
            StatusCode::PauseNotify
        } else {
            StatusCode::UnpauseNotify
        };
        let (receiver, milliseconds) = {
            let mut inner = lock(&self.core.inner);
            if inner.state != StreamState::Playing || inner.pending.is_some() {
                return Err(RtmpClientError::InvalidState {
                    current: inner.state,
                    attempted: "pause",
                });
            }
            let (responder, receiver) = oneshot::channel();
            inner.pending = Some(PendingRequest {
                expected,
                success_state: StreamState::Playing,
                rollback_state: StreamState::Playing,
                set_paused: Some(paused),
                starts_clock: false,
                responder,
            });
            let milliseconds = inner
                .started_at
                .map(|started| started.elapsed().as_millis() as u64)
                .unwrap_or(0);
            (receiver, milliseconds)
        };
        let command = PauseCommand {
            transaction_id: 0,
            pause_flag: paused,
            milliseconds,
        };
        self.send_or_abandon(
            &connection,
            WriterCommand::Pause {
                command,
                stream_id: self.core.id,
            },
        )
        .await?;
        self.await_status(receiver, connection.request_timeout())
            .await
    }

    pub async fn toggle_pause(&self) -> RtmpClientResult<StatusEvent> {
        let paused = lock(&self.core.inner).paused;
        self.pause(!paused).await
    }

    // servers answer with NetStream.Seek.Notify on the status channel but
    // nothing parks for it
    pub async fn seek(&self, milliseconds: u64) -> RtmpClientResult<()> {
        let connection = self.ensure_playing("seek")?;
        connection
            .enqueue(WriterCommand::Seek {
                command: SeekCommand {
                    transaction_id: 0,
                    milliseconds,
                },
                stream_id: self.core.id,
            })
            .await
    }

    pub async fn receive_audio(&self, flag: bool) -> RtmpClientResult<()> {
        let connection = self.ensure_playing("receiveAudio")?;
        connection
            .enqueue(WriterCommand::ReceiveAudio {
                command: ReceiveAudioCommand {
                    transaction_id: 0,
                    bool_flag: flag,
                },
                stream_id: self.core.id,
            })
            .await
    }

    pub async fn receive_video(&self, flag: bool) -> RtmpClientResult<()> {
        let connection = self.ensure_playing("receiveVideo")?;
        connection
            .enqueue(WriterCommand::ReceiveVideo {
                command: ReceiveVideoCommand {
                    transaction_id: 0,
                    bool_flag: flag,
                },
                stream_id: self.core.id,
            })
            .await
    }

    fn ensure_playing(&self, attempted: &'static str) -> RtmpClientResult<Arc<ConnectionCore>> {
        let connection = self.connection()?;
        let inner = lock(&self.core.inner);
        if inner.state != StreamState::Playing {
            return Err(RtmpClientError::InvalidState {
                current: inner.state,
                attempted,
            });
        }
        Ok(connection)
    }

    // the first send of a handler name goes out with a full type 0 header,
    // repeats ride type 1 deltas off the shared data chunk stream
    pub async fn send_data(
        &self,
        handler_name: &str,
        arguments: &[amf::Value],
        reset_timestamp: bool,
    ) -> RtmpClientResult<()> {
        let connection = self.connection()?;
        let (timestamp, preferred_fmt) = {
            let mut inner = lock(&self.core.inner);
            if inner.state != StreamState::Publishing {
                return Err(RtmpClientError::InvalidState {
                    current: inner.state,
                    attempted: "send_data",
                });
            }
            if reset_timestamp {
                inner.data_sent.remove(handler_name);
            }
            let timestamp = inner
                .started_at
                .map(|started| started.elapsed().as_millis() as u32)
                .unwrap_or(0);
            let preferred_fmt = if inner.data_sent.contains(handler_name) {
                1
            } else {
                0
            };
            inner.data_sent.insert(handler_name.to_string());
            (timestamp, preferred_fmt)
        };
        let mut payload = Vec::new();
        let mut writer = amf::amf0::Writer::new(&mut payload);
        writer.write(&amf::string(handler_name))?;
        for argument in arguments {
            writer.write(argument)?;
        }
        connection
            .enqueue(WriterCommand::Data {
                payload: Bytes::from(payload),
                timestamp,
                stream_id: self.core.id,
                preferred_fmt,
            })
            .await
    }

    pub async fn publish_media(&self, sample: MediaSample) -> RtmpClientResult<()> {
        let connection = self.connection()?;
        let framing: Option<(u32, u8)> = {
            let mut inner = lock(&self.core.inner);
            if inner.state != StreamState::Publishing {
                return Err(RtmpClientError::InvalidState {
                    current: inner.state,
                    attempted: "publish_media",
                });
            }
            let track = match sample.kind {
                MediaKind::Audio => &mut inner.audio,
                MediaKind::Video => &mut inner.video,
            };
            if sample.is_config {
                if track.config.as_ref() == Some(&sample.payload) {
                    // an unchanged config record is not repeated
                    None
                } else {
                    // config records restart the track at absolute zero
                    // with a full header
                    track.config = Some(sample.payload.clone());
                    track.last_timestamp = 0;
                    Some((0, 0))
                }
            } else {
                track.last_timestamp = sample.timestamp;
                Some((sample.timestamp, 1))
            }
        };
        let Some((timestamp, preferred_fmt)) = framing else {
            return Ok(());
        };
        let stream_id = self.core.id;
        let command = match sample.kind {
            MediaKind::Audio => WriterCommand::Audio {
                payload: sample.payload,
                timestamp,
                stream_id,
                preferred_fmt,
            },
            MediaKind::Video => WriterCommand::Video {
                payload: sample.payload,
                timestamp,
                stream_id,
                preferred_fmt,
            },
        };
        connection.enqueue(command).await
    }

    pub async fn delete(self) -> RtmpClientResult<()> {
        let connection = self.connection()?;
        {
            let mut inner = lock(&self.core.inner);
            inner.detached = true;
            inner.state = StreamState::Idle;
            inner.media_sender = None;
        }
        connection.detach_stream(self.core.id);
        connection
            .enqueue(WriterCommand::DeleteStream(DeleteStreamCommand {
                transaction_id: connection.allocate_transaction() as u8,
                stream_id: self.core.id as f64,
            }))
            .await
    }

    async fn send_or_abandon(
        &self,
        connection: &ConnectionCore,
        command: WriterCommand,
    ) -> RtmpClientResult<()> {
        match connection.enqueue(command).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.abandon_request();
                Err(err)
            }
        }
    }

    fn abandon_request(&self) {
        let mut inner = lock(&self.core.inner);
        if let Some(pending) = inner.pending.take() {
            inner.state = pending.rollback_state;
        }
    }

    async fn await_status(
        &self,
        mut receiver: oneshot::Receiver<RtmpClientResult<StatusEvent>>,
        timeout: Duration,
    ) -> RtmpClientResult<StatusEvent> {
        select! {
            result = &mut receiver => match result {
                Ok(result) => result,
                Err(_) => Err(RtmpClientError::ConnectionClosed),
            },
            _ = sleep(timeout) => {
                // resolution happens under the stream lock, holding it while
                // peeking the responder rules out a lost result
                let mut inner = lock(&self.core.inner);
                match receiver.try_recv() {
                    Ok(result) => result,
                    Err(oneshot::error::TryRecvError::Closed) => {
                        Err(RtmpClientError::ConnectionClosed)
                    }
                    Err(oneshot::error::TryRecvError::Empty) => {
                        if let Some(pending) = inner.pending.take() {
                            inner.state = pending.rollback_state;
                        }
                        Err(RtmpClientError::RequestTimedOut)
                    }
                }
            }
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        let detached = lock(&self.core.inner).detached;
        if detached {
            return;
        }
        if let Some(connection) = self.connection.upgrade() {
            connection.detach_stream(self.core.id);
            let command = WriterCommand::DeleteStream(DeleteStreamCommand {
                transaction_id: connection.allocate_transaction() as u8,
                stream_id: self.core.id as f64,
            });
            if connection.try_enqueue(command).is_err() {
                trace!(
                    "stream {} dropped without notifying the peer",
                    self.core.id
                );
            }
        }
    }
}
