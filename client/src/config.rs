use std::time::Duration;

use rtmp_formats::{
    chunk::consts::DEFAULT_CHUNK_SIZE,
    commands::{
        ConnectCommandRequestObject,
        consts::{DEFAULT_FLASH_VERSION, audio_codecs, function_flags, video_codecs},
    },
};

pub const DEFAULT_WINDOW_ACK_SIZE: u32 = 2_500_000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(3000);

///! everything tunable about one connection. plain values, no config file
///! layer, the embedding application decides where these come from
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub app: String,
    pub tc_url: String,
    pub swf_url: String,
    pub page_url: String,
    pub flash_version: String,
    pub audio_codecs: u16,
    pub video_codecs: u16,
    pub video_function: u16,
    pub object_encoding: amf::Version,
    /// outbound chunk size, announced with a SetChunkSize message when it
    /// exceeds the protocol default
    pub chunk_size: u32,
    /// how many received bytes to let pass between outbound acknowledgement
    /// messages, until the peer announces its own window. zero disables
    /// acknowledgements entirely
    pub window_ack_size: u32,
    /// one knob for connection RPCs and parked stream requests alike
    pub request_timeout: Duration,
    pub complex_handshake: bool,
    /// bracket publish with the FMLE releaseStream/FCPublish procedure calls
    pub publish_bracketing: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            app: String::new(),
            tc_url: String::new(),
            swf_url: String::new(),
            page_url: String::new(),
            flash_version: DEFAULT_FLASH_VERSION.to_string(),
            audio_codecs: audio_codecs::SUPPORT_SND_AAC,
            video_codecs: video_codecs::SUPPORT_VID_H264,
            video_function: function_flags::SUPPORT_VID_CLIENT_SEEK,
            object_encoding: amf::Version::Amf0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            complex_handshake: false,
            publish_bracketing: false,
        }
    }
}

impl ConnectionConfig {
    pub fn new(app: impl Into<String>, tc_url: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            tc_url: tc_url.into(),
            ..Self::default()
        }
    }

    pub(crate) fn connect_command_object(&self) -> ConnectCommandRequestObject {
        ConnectCommandRequestObject {
            app: self.app.clone(),
            flash_version: self.flash_version.clone(),
            swf_url: self.swf_url.clone(),
            tc_url: self.tc_url.clone(),
            fpad: false,
            audio_codecs: self.audio_codecs,
            video_codecs: self.video_codecs,
            video_function: self.video_function,
            page_url: self.page_url.clone(),
            object_encoding: self.object_encoding,
        }
    }
}
