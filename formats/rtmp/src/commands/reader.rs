use amf::Value as AmfValue;
use byteorder::ReadBytesExt;
use std::io;
use utils::traits::reader::ReadRemainingFrom;

use crate::chunk::errors::{ChunkMessageError, ChunkMessageResult};

use super::{
    CallCommandRequest, CallCommandResponse, CloseStreamCommand, CommandResponse,
    ConnectCommandRequest, ConnectCommandRequestObject, CreateStreamCommandRequest,
    DeleteStreamCommand, OnStatusCommand, PauseCommand, PlayCommand, PublishCommand,
    ReceiveAudioCommand, ReceiveVideoCommand, RtmpC2SCommands, RtmpS2CCommands, SeekCommand,
    consts::{c2s_command_names, s2c_command_names},
};

impl<R: io::Read> ReadRemainingFrom<amf::Version, R> for RtmpC2SCommands {
    type Error = ChunkMessageError;
    fn read_remaining_from(header: amf::Version, reader: R) -> Result<Self, Self::Error> {
        Reader::new(reader, header).read_c2s_command()
    }
}

impl<R: io::Read> ReadRemainingFrom<amf::Version, R> for RtmpS2CCommands {
    type Error = ChunkMessageError;
    fn read_remaining_from(header: amf::Version, reader: R) -> Result<Self, Self::Error> {
        Reader::new(reader, header).read_s2c_command()
    }
}

#[derive(Debug)]
pub struct Reader<R> {
    inner: R,
    amf_version: amf::Version,
}

impl<R> Reader<R>
where
    R: io::Read,
{
    pub fn new(inner: R, amf_version: amf::Version) -> Self {
        Self { inner, amf_version }
    }

    pub fn read_c2s_command(&mut self) -> ChunkMessageResult<RtmpC2SCommands> {
        self.skip_amf3_format_marker()?;
        let command_name = self.read_amf_string()?;

        match command_name.as_str() {
            c2s_command_names::CONNECT => {
                Ok(RtmpC2SCommands::Connect(self.read_c2s_connect_command()?))
            }
            c2s_command_names::CREATE_STREAM => Ok(RtmpC2SCommands::CreateStream(
                self.read_c2s_create_stream_command()?,
            )),
            c2s_command_names::PLAY => Ok(RtmpC2SCommands::Play(self.read_c2s_play_command()?)),
            c2s_command_names::DELETE_STREAM => Ok(RtmpC2SCommands::DeleteStream(
                self.read_c2s_delete_stream_command()?,
            )),
            c2s_command_names::CLOSE_STREAM => Ok(RtmpC2SCommands::CloseStream(
                self.read_c2s_close_stream_command()?,
            )),
            c2s_command_names::RECEIVE_AUDIO => Ok(RtmpC2SCommands::ReceiveAudio(
                self.read_c2s_receive_audio_command()?,
            )),
            c2s_command_names::RECEIVE_VIDEO => Ok(RtmpC2SCommands::ReceiveVideo(
                self.read_c2s_receive_video_command()?,
            )),
            c2s_command_names::PUBLISH => {
                Ok(RtmpC2SCommands::Publish(self.read_c2s_publish_command()?))
            }
            c2s_command_names::SEEK => Ok(RtmpC2SCommands::Seek(self.read_c2s_seek_command()?)),
            c2s_command_names::PAUSE => Ok(RtmpC2SCommands::Pause(self.read_c2s_pause_command()?)),
            // releaseStream, FCPublish, FCUnpublish and every other RPC
            procedure_name => Ok(RtmpC2SCommands::Call(
                self.read_c2s_call_command(procedure_name.to_string())?,
            )),
        }
    }

    pub fn read_s2c_command(&mut self) -> ChunkMessageResult<RtmpS2CCommands> {
        self.skip_amf3_format_marker()?;
        let command_name = self.read_amf_string()?;

        match command_name.as_str() {
            s2c_command_names::RESULT => Ok(RtmpS2CCommands::Response(self.read_s2c_response(true)?)),
            s2c_command_names::ERROR => {
                Ok(RtmpS2CCommands::Response(self.read_s2c_response(false)?))
            }
            s2c_command_names::ON_STATUS => Ok(RtmpS2CCommands::OnStatus(
                self.read_s2c_on_status_command()?,
            )),
            // onBWDone and friends
            name => Ok(RtmpS2CCommands::Call(
                self.read_s2c_call_command(name.to_string())?,
            )),
        }
    }

    fn read_c2s_connect_command(&mut self) -> ChunkMessageResult<ConnectCommandRequest> {
        let transaction_id = self.read_amf_number()? as u8;
        let command_object = self.read_amf_object()?.ok_or_else(|| {
            ChunkMessageError::UnexpectedAmfType(
                "expect a connect command object, got a null".to_string(),
            )
        })?;
        let command_object: ConnectCommandRequestObject = command_object.try_into()?;

        let optional_user_arguments = match self.read_amf_remaining()?.into_iter().next() {
            Some(value) => value.try_into_pairs().map(|pairs| pairs.collect()).ok(),
            None => None,
        };
        Ok(ConnectCommandRequest {
            transaction_id,
            command_object,
            optional_user_arguments,
        })
    }

    fn read_s2c_response(&mut self, success: bool) -> ChunkMessageResult<CommandResponse> {
        let transaction_id = self.read_amf_number()?;
        let command_object = self.read_amf_object()?;
        let additional = self.read_amf_remaining()?;
        Ok(CommandResponse {
            success,
            transaction_id,
            command_object,
            additional,
        })
    }

    fn read_c2s_call_command(
        &mut self,
        procedure_name: String,
    ) -> ChunkMessageResult<CallCommandRequest> {
        let transaction_id = self.read_amf_number()?;
        let command_object = self.read_amf_object()?;
        let optional_arguments = self.read_amf_remaining()?;
        Ok(CallCommandRequest {
            procedure_name,
            transaction_id,
            command_object,
            optional_arguments,
        })
    }

    fn read_s2c_call_command(
        &mut self,
        command_name: String,
    ) -> ChunkMessageResult<CallCommandResponse> {
        let transaction_id = self.read_amf_number()?;
        let command_object = self.read_amf_object()?;
        let additional = self.read_amf_remaining()?;
        Ok(CallCommandResponse {
            command_name,
            transaction_id,
            command_object,
            additional,
        })
    }

    fn read_c2s_create_stream_command(&mut self) -> ChunkMessageResult<CreateStreamCommandRequest> {
        let transaction_id = self.read_amf_number()?;
        let command_object = self.read_amf_object()?;
        Ok(CreateStreamCommandRequest {
            transaction_id,
            command_object,
        })
    }

    fn read_s2c_on_status_command(&mut self) -> ChunkMessageResult<OnStatusCommand> {
        let transaction_id = self.read_amf_number()? as u8;
        self.read_amf_null()?;
        let info_object = self.read_amf_object()?.ok_or_else(|| {
            ChunkMessageError::UnexpectedAmfType(
                "expect an onStatus info object, got a null".to_string(),
            )
        })?;
        Ok(OnStatusCommand {
            transaction_id,
            info_object,
        })
    }

    fn read_c2s_play_command(&mut self) -> ChunkMessageResult<PlayCommand> {
        let transaction_id = self.read_amf_number()? as u8;
        self.read_amf_null()?;
        let stream_name = self.read_amf_string()?;
        // start, duration and reset are all optional on the wire
        let mut remaining = self.read_amf_remaining()?.into_iter();
        let start = remaining
            .next()
            .and_then(|value| value.try_as_f64())
            .unwrap_or(-2.0) as i64;
        let duration = remaining
            .next()
            .and_then(|value| value.try_as_f64())
            .unwrap_or(-1.0) as i64;
        let reset = remaining
            .next()
            .and_then(|value| value.try_as_bool())
            .unwrap_or(false);
        Ok(PlayCommand {
            transaction_id,
            stream_name,
            start,
            duration,
            reset,
        })
    }

    fn read_c2s_delete_stream_command(&mut self) -> ChunkMessageResult<DeleteStreamCommand> {
        let transaction_id = self.read_amf_number()? as u8;
        self.read_amf_null()?;
        let stream_id = self.read_amf_number()?;
        Ok(DeleteStreamCommand {
            transaction_id,
            stream_id,
        })
    }

    fn read_c2s_close_stream_command(&mut self) -> ChunkMessageResult<CloseStreamCommand> {
        let transaction_id = self.read_amf_number()? as u8;
        self.read_amf_null()?;
        Ok(CloseStreamCommand { transaction_id })
    }

    fn read_c2s_receive_audio_command(&mut self) -> ChunkMessageResult<ReceiveAudioCommand> {
        let transaction_id = self.read_amf_number()? as u8;
        self.read_amf_null()?;
        let bool_flag = self.read_amf_bool()?;
        Ok(ReceiveAudioCommand {
            transaction_id,
            bool_flag,
        })
    }

    fn read_c2s_receive_video_command(&mut self) -> ChunkMessageResult<ReceiveVideoCommand> {
        let transaction_id = self.read_amf_number()? as u8;
        self.read_amf_null()?;
        let bool_flag = self.read_amf_bool()?;
        Ok(ReceiveVideoCommand {
            transaction_id,
            bool_flag,
        })
    }

    fn read_c2s_publish_command(&mut self) -> ChunkMessageResult<PublishCommand> {
        let transaction_id = self.read_amf_number()? as u8;
        self.read_amf_null()?;
        let publishing_name = self.read_amf_string()?;
        let publishing_type = self.read_amf_string()?;
        if publishing_type != "live" && publishing_type != "record" && publishing_type != "append" {
            return Err(ChunkMessageError::UnexpectedAmfType(format!(
                "expect publish type to be live, record or append, got {}",
                publishing_type
            )));
        }

        Ok(PublishCommand {
            transaction_id,
            publishing_name,
            publishing_type,
        })
    }

    fn read_c2s_seek_command(&mut self) -> ChunkMessageResult<SeekCommand> {
        let transaction_id = self.read_amf_number()? as u8;
        self.read_amf_null()?;
        let milliseconds = self.read_amf_number()? as u64;
        Ok(SeekCommand {
            transaction_id,
            milliseconds,
        })
    }

    fn read_c2s_pause_command(&mut self) -> ChunkMessageResult<PauseCommand> {
        let transaction_id = self.read_amf_number()? as u8;
        self.read_amf_null()?;
        let pause_flag = self.read_amf_bool()?;
        let milliseconds = self.read_amf_number()? as u64;
        Ok(PauseCommand {
            transaction_id,
            pause_flag,
            milliseconds,
        })
    }

    ///! command bodies in type 17 messages open with one format byte before
    ///! the amf0 payload
    fn skip_amf3_format_marker(&mut self) -> ChunkMessageResult<()> {
        if self.amf_version == amf::Version::Amf3 {
            self.inner.read_u8()?;
        }
        Ok(())
    }

    fn read_amf_value(&mut self) -> ChunkMessageResult<AmfValue> {
        match AmfValue::read_from(self.inner.by_ref())? {
            Some(value) => Ok(value),
            None => Err(ChunkMessageError::UnexpectedAmfType(
                "unexpected end of command payload".to_string(),
            )),
        }
    }

    fn read_amf_null(&mut self) -> ChunkMessageResult<()> {
        match self.read_amf_value()? {
            AmfValue::Null | AmfValue::Undefined => Ok(()),
            value => Err(ChunkMessageError::UnexpectedAmfType(format!(
                "expect a null type, got a: {:?}",
                value
            ))),
        }
    }

    fn read_amf_string(&mut self) -> ChunkMessageResult<String> {
        match self.read_amf_value()?.try_as_str() {
            Some(v) => Ok(v.to_string()),
            None => Err(ChunkMessageError::UnexpectedAmfType(
                "expect a string type".to_string(),
            )),
        }
    }

    fn read_amf_number(&mut self) -> ChunkMessageResult<f64> {
        match self.read_amf_value()?.try_as_f64() {
            Some(v) => Ok(v),
            None => Err(ChunkMessageError::UnexpectedAmfType(
                "expect a number type".to_string(),
            )),
        }
    }

    fn read_amf_bool(&mut self) -> ChunkMessageResult<bool> {
        match self.read_amf_value()?.try_as_bool() {
            Some(v) => Ok(v),
            None => Err(ChunkMessageError::UnexpectedAmfType(
                "expect a bool type".to_string(),
            )),
        }
    }

    fn read_amf_object(&mut self) -> ChunkMessageResult<Option<Vec<(String, AmfValue)>>> {
        match self.read_amf_value()? {
            AmfValue::Null | AmfValue::Undefined => Ok(None),
            value => match value.try_into_pairs() {
                Err(_) => Err(ChunkMessageError::UnexpectedAmfType(
                    "expect a key-value pair type".to_string(),
                )),
                Ok(pairs) => Ok(Some(pairs.collect())),
            },
        }
    }

    fn read_amf_remaining(&mut self) -> ChunkMessageResult<Vec<AmfValue>> {
        Ok(AmfValue::read_all(self.inner.by_ref())?)
    }
}
