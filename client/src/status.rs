use amf::AmfComplexObject;

///! the onStatus vocabulary. servers signal every stream and connection
///! level state change through these dotted codes, the client matches them
///! against the code a parked request expects
///! @see: 7.2.2. NetStream Commands

pub mod level {
    pub const STATUS: &str = "status";
    pub const WARNING: &str = "warning";
    pub const ERROR: &str = "error";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    // NetConnection
    CallBadVersion,
    CallFailed,
    CallProhibited,
    ConnectAppShutdown,
    ConnectClosed,
    ConnectFailed,
    ConnectIdleTimeOut,
    ConnectInvalidApp,
    ConnectNetworkChange,
    ConnectRejected,
    ConnectSuccess,
    // NetStream
    BufferEmpty,
    BufferFlush,
    BufferFull,
    StreamConnectClosed,
    StreamConnectFailed,
    StreamConnectRejected,
    StreamConnectSuccess,
    DrmUpdateNeeded,
    Failed,
    MulticastStreamReset,
    PauseNotify,
    PlayFailed,
    PlayFileStructureInvalid,
    PlayInsufficientBw,
    PlayNoSupportedTrackFound,
    PlayReset,
    PlayStart,
    PlayStop,
    PlayStreamNotFound,
    PlayTransition,
    PlayUnpublishNotify,
    PublishBadName,
    PublishIdle,
    PublishStart,
    RecordAlreadyExists,
    RecordDiskQuotaExceeded,
    RecordFailed,
    RecordNoAccess,
    RecordStart,
    RecordStop,
    SecondScreenStart,
    SecondScreenStop,
    SeekFailed,
    SeekInvalidTime,
    SeekNotify,
    StepNotify,
    UnpauseNotify,
    UnpublishSuccess,
    VideoDimensionChange,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CallBadVersion => "NetConnection.Call.BadVersion",
            Self::CallFailed => "NetConnection.Call.Failed",
            Self::CallProhibited => "NetConnection.Call.Prohibited",
            Self::ConnectAppShutdown => "NetConnection.Connect.AppShutdown",
            Self::ConnectClosed => "NetConnection.Connect.Closed",
            Self::ConnectFailed => "NetConnection.Connect.Failed",
            Self::ConnectIdleTimeOut => "NetConnection.Connect.IdleTimeOut",
            Self::ConnectInvalidApp => "NetConnection.Connect.InvalidApp",
            Self::ConnectNetworkChange => "NetConnection.Connect.NetworkChange",
            Self::ConnectRejected => "NetConnection.Connect.Rejected",
            Self::ConnectSuccess => "NetConnection.Connect.Success",
            Self::BufferEmpty => "NetStream.Buffer.Empty",
            Self::BufferFlush => "NetStream.Buffer.Flush",
            Self::BufferFull => "NetStream.Buffer.Full",
            Self::StreamConnectClosed => "NetStream.Connect.Closed",
            Self::StreamConnectFailed => "NetStream.Connect.Failed",
            Self::StreamConnectRejected => "NetStream.Connect.Rejected",
            Self::StreamConnectSuccess => "NetStream.Connect.Success",
            Self::DrmUpdateNeeded => "NetStream.DRM.UpdateNeeded",
            Self::Failed => "NetStream.Failed",
            Self::MulticastStreamReset => "NetStream.MulticastStream.Reset",
            Self::PauseNotify => "NetStream.Pause.Notify",
            Self::PlayFailed => "NetStream.Play.Failed",
            Self::PlayFileStructureInvalid => "NetStream.Play.FileStructureInvalid",
            Self::PlayInsufficientBw => "NetStream.Play.InsufficientBW",
            Self::PlayNoSupportedTrackFound => "NetStream.Play.NoSupportedTrackFound",
            Self::PlayReset => "NetStream.Play.Reset",
            Self::PlayStart => "NetStream.Play.Start",
            Self::PlayStop => "NetStream.Play.Stop",
            Self::PlayStreamNotFound => "NetStream.Play.StreamNotFound",
            Self::PlayTransition => "NetStream.Play.Transition",
            Self::PlayUnpublishNotify => "NetStream.Play.UnpublishNotify",
            Self::PublishBadName => "NetStream.Publish.BadName",
            Self::PublishIdle => "NetStream.Publish.Idle",
            Self::PublishStart => "NetStream.Publish.Start",
            Self::RecordAlreadyExists => "NetStream.Record.AlreadyExists",
            Self::RecordDiskQuotaExceeded => "NetStream.Record.DiskQuotaExceeded",
            Self::RecordFailed => "NetStream.Record.Failed",
            Self::RecordNoAccess => "NetStream.Record.NoAccess",
            Self::RecordStart => "NetStream.Record.Start",
            Self::RecordStop => "NetStream.Record.Stop",
            Self::SecondScreenStart => "NetStream.SecondScreen.Start",
            Self::SecondScreenStop => "NetStream.SecondScreen.Stop",
            Self::SeekFailed => "NetStream.Seek.Failed",
            Self::SeekInvalidTime => "NetStream.Seek.InvalidTime",
            Self::SeekNotify => "NetStream.Seek.Notify",
            Self::StepNotify => "NetStream.Step.Notify",
            Self::UnpauseNotify => "NetStream.Unpause.Notify",
            Self::UnpublishSuccess => "NetStream.Unpublish.Success",
            Self::VideoDimensionChange => "NetStream.VideoDimensionChange",
        }
    }

    pub fn level(&self) -> &'static str {
        match self {
            Self::CallBadVersion
            | Self::CallFailed
            | Self::CallProhibited
            | Self::ConnectAppShutdown
            | Self::ConnectFailed
            | Self::ConnectInvalidApp
            | Self::ConnectRejected
            | Self::StreamConnectFailed
            | Self::StreamConnectRejected
            | Self::Failed
            | Self::PlayFailed
            | Self::PlayFileStructureInvalid
            | Self::PlayStreamNotFound
            | Self::PublishBadName
            | Self::RecordDiskQuotaExceeded
            | Self::RecordFailed
            | Self::RecordNoAccess
            | Self::SeekFailed
            | Self::SeekInvalidTime => level::ERROR,
            Self::PlayInsufficientBw => level::WARNING,
            _ => level::STATUS,
        }
    }
}

/// One decoded onStatus information object. `info` keeps the raw entries so
/// callers can reach fields beyond the three the protocol mandates.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub code: String,
    pub level: String,
    pub description: String,
    pub info: Vec<(String, amf::Value)>,
}

impl StatusEvent {
    pub fn from_info_object(info: Vec<(String, amf::Value)>) -> Self {
        let code = info.extract_string_field("code").unwrap_or_default();
        let level = info.extract_string_field("level").unwrap_or_default();
        let description = info.extract_string_field("description").unwrap_or_default();
        Self {
            code,
            level,
            description,
            info,
        }
    }

    pub(crate) fn from_value(value: &amf::Value) -> Self {
        value
            .clone()
            .try_into_pairs()
            .map(|pairs| Self::from_info_object(pairs.collect()))
            .unwrap_or_else(|_| Self::from_info_object(Vec::new()))
    }

    pub(crate) fn from_code(code: StatusCode, description: &str) -> Self {
        Self {
            code: code.as_str().to_string(),
            level: code.level().to_string(),
            description: description.to_string(),
            info: vec![
                ("level".to_string(), amf::string(code.level())),
                ("code".to_string(), amf::string(code.as_str())),
                ("description".to_string(), amf::string(description)),
            ],
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == level::ERROR
    }
}
