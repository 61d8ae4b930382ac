use std::io;

use amf::AmfComplexObject;

use crate::chunk::errors::{ChunkMessageError, ChunkMessageResult};

use self::consts::{DEFAULT_FLASH_VERSION, audio_codecs, function_flags, video_codecs};

pub mod consts;
pub mod reader;
pub mod writer;

///! @see: 7.2.1.1. connect
#[derive(Debug, Clone)]
pub struct ConnectCommandRequestObject {
    pub app: String,
    pub flash_version: String,
    pub swf_url: String,
    pub tc_url: String,
    pub fpad: bool,
    pub audio_codecs: u16,
    pub video_codecs: u16,
    pub video_function: u16,
    pub page_url: String,
    pub object_encoding: amf::Version,
}

impl Default for ConnectCommandRequestObject {
    fn default() -> Self {
        Self {
            app: "".to_string(),
            flash_version: DEFAULT_FLASH_VERSION.to_string(),
            swf_url: "".to_string(),
            tc_url: "".to_string(),
            fpad: false,
            audio_codecs: audio_codecs::SUPPORT_SND_AAC,
            video_codecs: video_codecs::SUPPORT_VID_H264,
            video_function: function_flags::SUPPORT_VID_CLIENT_SEEK,
            page_url: "".to_string(),
            object_encoding: amf::Version::Amf0,
        }
    }
}

impl TryFrom<Vec<(String, amf::Value)>> for ConnectCommandRequestObject {
    type Error = ChunkMessageError;
    fn try_from(entries: Vec<(String, amf::Value)>) -> Result<Self, Self::Error> {
        let defaults = ConnectCommandRequestObject::default();
        let flash_version = entries
            .extract_string_field("flashVer")
            // some encoders spell the key all lowercase
            .or_else(|| entries.extract_string_field("flashver"))
            .unwrap_or(defaults.flash_version);
        let object_encoding = match entries.extract_number_field("objectEncoding") {
            None => amf::Version::Amf0,
            Some(encoding) => encoding
                .try_into()
                .map_err(|_| ChunkMessageError::UnknownAmfVersion(encoding as u8))?,
        };
        Ok(ConnectCommandRequestObject {
            app: entries.extract_string_field("app").unwrap_or(defaults.app),
            flash_version,
            swf_url: entries
                .extract_string_field("swfUrl")
                .unwrap_or(defaults.swf_url),
            tc_url: entries
                .extract_string_field("tcUrl")
                .unwrap_or(defaults.tc_url),
            fpad: entries.extract_bool_field("fpad").unwrap_or(defaults.fpad),
            audio_codecs: entries
                .extract_number_field("audioCodecs")
                .map(|v| v as u16)
                .unwrap_or(defaults.audio_codecs),
            video_codecs: entries
                .extract_number_field("videoCodecs")
                .map(|v| v as u16)
                .unwrap_or(defaults.video_codecs),
            video_function: entries
                .extract_number_field("videoFunction")
                .map(|v| v as u16)
                .unwrap_or(defaults.video_function),
            page_url: entries
                .extract_string_field("pageUrl")
                .unwrap_or(defaults.page_url),
            object_encoding,
        })
    }
}

impl Into<Vec<(String, amf::Value)>> for ConnectCommandRequestObject {
    fn into(self) -> Vec<(String, amf::Value)> {
        vec![
            ("app".to_string(), amf::string(self.app)),
            ("flashVer".to_string(), amf::string(self.flash_version)),
            ("swfUrl".to_string(), amf::string(self.swf_url)),
            ("tcUrl".to_string(), amf::string(self.tc_url)),
            ("fpad".to_string(), amf::bool(self.fpad)),
            ("audioCodecs".to_string(), amf::number(self.audio_codecs)),
            ("videoCodecs".to_string(), amf::number(self.video_codecs)),
            (
                "videoFunction".to_string(),
                amf::number(self.video_function),
            ),
            ("pageUrl".to_string(), amf::string(self.page_url)),
            (
                "objectEncoding".to_string(),
                amf::number(self.object_encoding as u8),
            ),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ConnectCommandRequest {
    pub transaction_id: u8, // always 1
    pub command_object: ConnectCommandRequestObject,
    pub optional_user_arguments: Option<Vec<(String, amf::Value)>>,
}

///! @see: 7.2.1.2. Call
#[derive(Debug, Clone)]
pub struct CallCommandRequest {
    pub procedure_name: String,
    pub transaction_id: f64, // 0 when no response is expected
    pub command_object: Option<Vec<(String, amf::Value)>>,
    pub optional_arguments: Vec<amf::Value>,
}

///! @see: 7.2.1.3. createStream
#[derive(Debug, Clone)]
pub struct CreateStreamCommandRequest {
    pub transaction_id: f64,
    pub command_object: Option<Vec<(String, amf::Value)>>,
}

///! generic "_result"/"_error" body. responses carry no request name, the
///! transaction id is the only key back to what was asked, so everything
///! after the command object stays raw until the caller interprets it
#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub transaction_id: f64,
    pub command_object: Option<Vec<(String, amf::Value)>>,
    pub additional: Vec<amf::Value>,
}

#[derive(Debug, Clone)]
pub struct ConnectCommandResponse {
    pub success: bool,
    pub transaction_id: f64, // always 1
    pub properties: Option<Vec<(String, amf::Value)>>,
    pub information: Option<Vec<(String, amf::Value)>>,
}

impl TryFrom<CommandResponse> for ConnectCommandResponse {
    type Error = ChunkMessageError;
    fn try_from(response: CommandResponse) -> Result<Self, Self::Error> {
        let information = response
            .additional
            .into_iter()
            .next()
            .and_then(|value| value.try_into_pairs().ok())
            .map(|pairs| pairs.collect());
        Ok(ConnectCommandResponse {
            success: response.success,
            transaction_id: response.transaction_id,
            properties: response.command_object,
            information,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CreateStreamCommandResponse {
    pub success: bool,
    pub transaction_id: f64,
    pub command_object: Option<Vec<(String, amf::Value)>>,
    pub stream_id: f64,
}

impl TryFrom<CommandResponse> for CreateStreamCommandResponse {
    type Error = ChunkMessageError;
    fn try_from(response: CommandResponse) -> Result<Self, Self::Error> {
        let stream_id = response
            .additional
            .first()
            .and_then(|value| value.try_as_f64())
            .ok_or_else(|| {
                ChunkMessageError::UnexpectedAmfType(
                    "expect a number stream id in the createStream result".to_string(),
                )
            })?;
        Ok(CreateStreamCommandResponse {
            success: response.success,
            transaction_id: response.transaction_id,
            command_object: response.command_object,
            stream_id,
        })
    }
}

///! @see: 7.2.2. NetStream Commands, onStatus is the server side vehicle for
///! every stream level state change
#[derive(Debug, Clone)]
pub struct OnStatusCommand {
    pub transaction_id: u8, // 0
    // command_object is null
    pub info_object: Vec<(String, amf::Value)>, // at least: level, code, description
}

///! a server issued procedure call such as onBWDone, or the response to a
///! client Call with a command name other than _result/_error
#[derive(Debug, Clone)]
pub struct CallCommandResponse {
    pub command_name: String,
    pub transaction_id: f64,
    pub command_object: Option<Vec<(String, amf::Value)>>,
    pub additional: Vec<amf::Value>,
}

#[derive(Debug, Clone)]
pub struct PlayCommand {
    pub transaction_id: u8, // 0
    // command_object is null
    pub stream_name: String,
    pub start: i64,    // default to -2
    pub duration: i64, // default to -1
    pub reset: bool,
}

#[derive(Debug, Clone)]
pub struct DeleteStreamCommand {
    // rides the connection command stream, so unlike the other stream
    // commands this one carries a real transaction id
    pub transaction_id: u8,
    // command_object is null
    pub stream_id: f64,
}

#[derive(Debug, Clone)]
pub struct CloseStreamCommand {
    pub transaction_id: u8, // 0
                            // command_object is null, no further arguments
}

#[derive(Debug, Clone)]
pub struct ReceiveAudioCommand {
    pub transaction_id: u8, // 0
    // command_object is null
    pub bool_flag: bool,
}

#[derive(Debug, Clone)]
pub struct ReceiveVideoCommand {
    pub transaction_id: u8, // 0
    // command_object is null
    pub bool_flag: bool,
}

#[derive(Debug, Clone)]
pub struct PublishCommand {
    pub transaction_id: u8, // 0
    // command_object is null
    pub publishing_name: String, // stream name
    pub publishing_type: String, // "live", "record", "append"
}

#[derive(Debug, Clone)]
pub struct SeekCommand {
    pub transaction_id: u8, // 0
    // command_object is null
    pub milliseconds: u64,
}

#[derive(Debug, Clone)]
pub struct PauseCommand {
    pub transaction_id: u8, // 0
    // command_object is null
    pub pause_flag: bool, // pause or unpause
    pub milliseconds: u64,
}

#[derive(Debug, Clone)]
pub enum RtmpC2SCommands {
    Connect(ConnectCommandRequest),
    Call(CallCommandRequest),
    CreateStream(CreateStreamCommandRequest),
    Play(PlayCommand),
    DeleteStream(DeleteStreamCommand),
    CloseStream(CloseStreamCommand),
    ReceiveAudio(ReceiveAudioCommand),
    ReceiveVideo(ReceiveVideoCommand),
    Publish(PublishCommand),
    Seek(SeekCommand),
    Pause(PauseCommand),
}

#[derive(Debug, Clone)]
pub enum RtmpS2CCommands {
    Response(CommandResponse),
    OnStatus(OnStatusCommand),
    Call(CallCommandResponse),
}

impl RtmpC2SCommands {
    pub fn write_to<W>(&self, inner: &mut W, version: amf::Version) -> ChunkMessageResult<()>
    where
        W: io::Write,
    {
        writer::Writer::new(inner, version).write_c2s_command(self)
    }
}

impl RtmpS2CCommands {
    pub fn write_to<W>(&self, inner: &mut W, version: amf::Version) -> ChunkMessageResult<()>
    where
        W: io::Write,
    {
        writer::Writer::new(inner, version).write_s2c_command(self)
    }
}
