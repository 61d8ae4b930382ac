use amf::Value as AmfValue;
use byteorder::WriteBytesExt;
use std::io;

use crate::chunk::errors::ChunkMessageResult;

use super::{
    CallCommandRequest, CallCommandResponse, CloseStreamCommand, CommandResponse,
    ConnectCommandRequest, CreateStreamCommandRequest, DeleteStreamCommand, OnStatusCommand,
    PauseCommand, PlayCommand, PublishCommand, ReceiveAudioCommand, ReceiveVideoCommand,
    RtmpC2SCommands, RtmpS2CCommands, SeekCommand,
    consts::{c2s_command_names, s2c_command_names},
};

pub struct Writer<W> {
    inner: amf::amf0::Writer<W>,
    amf_version: amf::Version,
}

impl<W> Writer<W>
where
    W: io::Write,
{
    pub fn new(inner: W, amf_version: amf::Version) -> Self {
        Self {
            inner: amf::amf0::Writer::new(inner),
            amf_version,
        }
    }

    pub fn write_c2s_command(&mut self, command: &RtmpC2SCommands) -> ChunkMessageResult<()> {
        self.write_amf3_format_marker()?;
        match command {
            RtmpC2SCommands::Connect(command) => self.write_c2s_connect_command(command),
            RtmpC2SCommands::Call(command) => self.write_c2s_call_command(command),
            RtmpC2SCommands::CreateStream(command) => self.write_c2s_create_stream_command(command),
            RtmpC2SCommands::Play(command) => self.write_c2s_play_command(command),
            RtmpC2SCommands::DeleteStream(command) => self.write_c2s_delete_stream_command(command),
            RtmpC2SCommands::CloseStream(command) => self.write_c2s_close_stream_command(command),
            RtmpC2SCommands::ReceiveAudio(command) => self.write_c2s_receive_audio_command(command),
            RtmpC2SCommands::ReceiveVideo(command) => self.write_c2s_receive_video_command(command),
            RtmpC2SCommands::Publish(command) => self.write_c2s_publish_command(command),
            RtmpC2SCommands::Seek(command) => self.write_c2s_seek_command(command),
            RtmpC2SCommands::Pause(command) => self.write_c2s_pause_command(command),
        }
    }

    pub fn write_s2c_command(&mut self, command: &RtmpS2CCommands) -> ChunkMessageResult<()> {
        self.write_amf3_format_marker()?;
        match command {
            RtmpS2CCommands::Response(command) => self.write_s2c_response(command),
            RtmpS2CCommands::OnStatus(command) => self.write_s2c_on_status_command(command),
            RtmpS2CCommands::Call(command) => self.write_s2c_call_command(command),
        }
    }

    fn write_c2s_connect_command(
        &mut self,
        command: &ConnectCommandRequest,
    ) -> ChunkMessageResult<()> {
        self.write_amf_str(c2s_command_names::CONNECT)?;
        self.write_amf_number(command.transaction_id as f64)?;
        let entries: Vec<(String, AmfValue)> = command.command_object.clone().into();
        self.write_amf_object_or_null(Some(&entries))?;
        if let Some(arguments) = &command.optional_user_arguments {
            self.write_amf_object_or_null(Some(arguments))?;
        }
        Ok(())
    }

    fn write_s2c_response(&mut self, command: &CommandResponse) -> ChunkMessageResult<()> {
        let command_name = if command.success {
            s2c_command_names::RESULT
        } else {
            s2c_command_names::ERROR
        };
        self.write_amf_str(command_name)?;
        self.write_amf_number(command.transaction_id)?;
        self.write_amf_object_or_null(command.command_object.as_deref())?;
        for value in &command.additional {
            self.inner.write(value)?;
        }
        Ok(())
    }

    fn write_c2s_call_command(&mut self, command: &CallCommandRequest) -> ChunkMessageResult<()> {
        self.write_amf_str(&command.procedure_name)?;
        self.write_amf_number(command.transaction_id)?;
        self.write_amf_object_or_null(command.command_object.as_deref())?;
        for value in &command.optional_arguments {
            self.inner.write(value)?;
        }
        Ok(())
    }

    fn write_s2c_call_command(&mut self, command: &CallCommandResponse) -> ChunkMessageResult<()> {
        self.write_amf_str(&command.command_name)?;
        self.write_amf_number(command.transaction_id)?;
        self.write_amf_object_or_null(command.command_object.as_deref())?;
        for value in &command.additional {
            self.inner.write(value)?;
        }
        Ok(())
    }

    fn write_c2s_create_stream_command(
        &mut self,
        command: &CreateStreamCommandRequest,
    ) -> ChunkMessageResult<()> {
        self.write_amf_str(c2s_command_names::CREATE_STREAM)?;
        self.write_amf_number(command.transaction_id)?;
        self.write_amf_object_or_null(command.command_object.as_deref())?;
        Ok(())
    }

    fn write_s2c_on_status_command(&mut self, command: &OnStatusCommand) -> ChunkMessageResult<()> {
        self.write_amf_str(s2c_command_names::ON_STATUS)?;
        self.write_amf_number(command.transaction_id as f64)?;
        self.write_amf_null()?;
        self.write_amf_object_or_null(Some(&command.info_object))?;
        Ok(())
    }

    fn write_c2s_play_command(&mut self, command: &PlayCommand) -> ChunkMessageResult<()> {
        self.write_amf_str(c2s_command_names::PLAY)?;
        self.write_amf_number(command.transaction_id as f64)?;
        self.write_amf_null()?;
        self.write_amf_str(&command.stream_name)?;
        self.write_amf_number(command.start as f64)?;
        self.write_amf_number(command.duration as f64)?;
        self.write_amf_bool(command.reset)?;
        Ok(())
    }

    fn write_c2s_delete_stream_command(
        &mut self,
        command: &DeleteStreamCommand,
    ) -> ChunkMessageResult<()> {
        self.write_amf_str(c2s_command_names::DELETE_STREAM)?;
        self.write_amf_number(command.transaction_id as f64)?;
        self.write_amf_null()?;
        self.write_amf_number(command.stream_id)?;
        Ok(())
    }

    fn write_c2s_close_stream_command(
        &mut self,
        command: &CloseStreamCommand,
    ) -> ChunkMessageResult<()> {
        self.write_amf_str(c2s_command_names::CLOSE_STREAM)?;
        self.write_amf_number(command.transaction_id as f64)?;
        self.write_amf_null()?;
        Ok(())
    }

    fn write_c2s_receive_audio_command(
        &mut self,
        command: &ReceiveAudioCommand,
    ) -> ChunkMessageResult<()> {
        self.write_amf_str(c2s_command_names::RECEIVE_AUDIO)?;
        self.write_amf_number(command.transaction_id as f64)?;
        self.write_amf_null()?;
        self.write_amf_bool(command.bool_flag)?;
        Ok(())
    }

    fn write_c2s_receive_video_command(
        &mut self,
        command: &ReceiveVideoCommand,
    ) -> ChunkMessageResult<()> {
        self.write_amf_str(c2s_command_names::RECEIVE_VIDEO)?;
        self.write_amf_number(command.transaction_id as f64)?;
        self.write_amf_null()?;
        self.write_amf_bool(command.bool_flag)?;
        Ok(())
    }

    fn write_c2s_publish_command(&mut self, command: &PublishCommand) -> ChunkMessageResult<()> {
        self.write_amf_str(c2s_command_names::PUBLISH)?;
        self.write_amf_number(command.transaction_id as f64)?;
        self.write_amf_null()?;
        self.write_amf_str(&command.publishing_name)?;
        self.write_amf_str(&command.publishing_type)?;
        Ok(())
    }

    fn write_c2s_seek_command(&mut self, command: &SeekCommand) -> ChunkMessageResult<()> {
        self.write_amf_str(c2s_command_names::SEEK)?;
        self.write_amf_number(command.transaction_id as f64)?;
        self.write_amf_null()?;
        self.write_amf_number(command.milliseconds as f64)?;
        Ok(())
    }

    fn write_c2s_pause_command(&mut self, command: &PauseCommand) -> ChunkMessageResult<()> {
        self.write_amf_str(c2s_command_names::PAUSE)?;
        self.write_amf_number(command.transaction_id as f64)?;
        self.write_amf_null()?;
        self.write_amf_bool(command.pause_flag)?;
        self.write_amf_number(command.milliseconds as f64)?;
        Ok(())
    }

    ///! command bodies in type 17 messages open with one format byte, 0
    ///! selects amf0 for the rest of the body
    fn write_amf3_format_marker(&mut self) -> ChunkMessageResult<()> {
        if self.amf_version == amf::Version::Amf3 {
            self.inner.inner_mut().write_u8(0)?;
        }
        Ok(())
    }

    fn write_amf_str(&mut self, value: &str) -> ChunkMessageResult<()> {
        self.inner.write(&amf::string(value))?;
        Ok(())
    }

    fn write_amf_bool(&mut self, value: bool) -> ChunkMessageResult<()> {
        self.inner.write(&amf::bool(value))?;
        Ok(())
    }

    fn write_amf_number(&mut self, value: f64) -> ChunkMessageResult<()> {
        self.inner.write(&amf::number(value))?;
        Ok(())
    }

    fn write_amf_object_or_null(
        &mut self,
        value: Option<&[(String, AmfValue)]>,
    ) -> ChunkMessageResult<()> {
        match value {
            Some(entries) => self.inner.write(&amf::object(entries.iter().cloned()))?,
            None => self.write_amf_null()?,
        }
        Ok(())
    }

    fn write_amf_null(&mut self) -> ChunkMessageResult<()> {
        self.inner.write(&AmfValue::Null)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use utils::traits::reader::ReadRemainingFrom;

    use crate::{
        chunk::errors::ChunkMessageError,
        commands::{
            CallCommandRequest, CommandResponse, ConnectCommandRequest,
            ConnectCommandRequestObject, CreateStreamCommandResponse, PlayCommand, PublishCommand,
            RtmpC2SCommands, RtmpS2CCommands,
            consts::c2s_command_names,
        },
    };
    use amf::AmfComplexObject;

    fn encode_c2s(command: &RtmpC2SCommands, version: amf::Version) -> Vec<u8> {
        let mut bytes = Vec::new();
        command.write_to(&mut bytes, version).unwrap();
        bytes
    }

    #[test]
    fn connect_request_roundtrip() {
        let request = ConnectCommandRequest {
            transaction_id: 1,
            command_object: ConnectCommandRequestObject {
                app: "live".to_string(),
                tc_url: "rtmp://localhost/live".to_string(),
                ..Default::default()
            },
            optional_user_arguments: None,
        };
        let bytes = encode_c2s(&RtmpC2SCommands::Connect(request), amf::Version::Amf0);
        // amf0 string marker, length 7, "connect"
        assert_eq!(&bytes[..10], b"\x02\x00\x07connect");

        let parsed = RtmpC2SCommands::read_remaining_from(amf::Version::Amf0, &bytes[..]).unwrap();
        match parsed {
            RtmpC2SCommands::Connect(parsed) => {
                assert_eq!(parsed.transaction_id, 1);
                assert_eq!(parsed.command_object.app, "live");
                assert_eq!(parsed.command_object.tc_url, "rtmp://localhost/live");
                assert_eq!(parsed.command_object.object_encoding, amf::Version::Amf0);
            }
            unexpected => panic!("unexpected command: {:?}", unexpected),
        }
    }

    #[test]
    fn amf3_command_bodies_carry_a_format_marker() {
        let request = ConnectCommandRequest {
            transaction_id: 1,
            command_object: ConnectCommandRequestObject {
                object_encoding: amf::Version::Amf3,
                ..Default::default()
            },
            optional_user_arguments: None,
        };
        let bytes = encode_c2s(&RtmpC2SCommands::Connect(request), amf::Version::Amf3);
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..11], b"\x02\x00\x07connect");

        let parsed = RtmpC2SCommands::read_remaining_from(amf::Version::Amf3, &bytes[..]).unwrap();
        assert!(matches!(parsed, RtmpC2SCommands::Connect(_)));
    }

    #[test]
    fn release_stream_rides_on_call() {
        let request = CallCommandRequest {
            procedure_name: c2s_command_names::RELEASE_STREAM.to_string(),
            transaction_id: 0.0,
            command_object: None,
            optional_arguments: vec![amf::string("stream-key")],
        };
        let bytes = encode_c2s(&RtmpC2SCommands::Call(request), amf::Version::Amf0);
        let parsed = RtmpC2SCommands::read_remaining_from(amf::Version::Amf0, &bytes[..]).unwrap();
        match parsed {
            RtmpC2SCommands::Call(parsed) => {
                assert_eq!(parsed.procedure_name, "releaseStream");
                assert_eq!(parsed.transaction_id, 0.0);
                assert!(parsed.command_object.is_none());
                assert_eq!(
                    parsed.optional_arguments[0].try_as_str(),
                    Some("stream-key")
                );
            }
            unexpected => panic!("unexpected command: {:?}", unexpected),
        }
    }

    #[test]
    fn play_fills_missing_trailing_arguments() {
        // bare play with only a stream name, like most encoders send it
        let mut bytes = Vec::new();
        let mut amf_writer = amf::amf0::Writer::new(&mut bytes);
        amf_writer.write(&amf::string("play")).unwrap();
        amf_writer.write(&amf::number(0)).unwrap();
        amf_writer.write(&amf::Value::Null).unwrap();
        amf_writer.write(&amf::string("some-stream")).unwrap();

        let parsed = RtmpC2SCommands::read_remaining_from(amf::Version::Amf0, &bytes[..]).unwrap();
        match parsed {
            RtmpC2SCommands::Play(parsed) => {
                assert_eq!(parsed.stream_name, "some-stream");
                assert_eq!(parsed.start, -2);
                assert_eq!(parsed.duration, -1);
                assert!(!parsed.reset);
            }
            unexpected => panic!("unexpected command: {:?}", unexpected),
        }
    }

    #[test]
    fn play_roundtrip_keeps_explicit_arguments() {
        let command = PlayCommand {
            transaction_id: 0,
            stream_name: "vod-asset".to_string(),
            start: 3000,
            duration: 60000,
            reset: true,
        };
        let bytes = encode_c2s(&RtmpC2SCommands::Play(command), amf::Version::Amf0);
        let parsed = RtmpC2SCommands::read_remaining_from(amf::Version::Amf0, &bytes[..]).unwrap();
        match parsed {
            RtmpC2SCommands::Play(parsed) => {
                assert_eq!(parsed.stream_name, "vod-asset");
                assert_eq!(parsed.start, 3000);
                assert_eq!(parsed.duration, 60000);
                assert!(parsed.reset);
            }
            unexpected => panic!("unexpected command: {:?}", unexpected),
        }
    }

    #[test]
    fn bogus_publish_type_is_rejected() {
        let ok = PublishCommand {
            transaction_id: 0,
            publishing_name: "key".to_string(),
            publishing_type: "live".to_string(),
        };
        let bytes = encode_c2s(&RtmpC2SCommands::Publish(ok), amf::Version::Amf0);
        assert!(RtmpC2SCommands::read_remaining_from(amf::Version::Amf0, &bytes[..]).is_ok());

        let mut bytes = Vec::new();
        let mut amf_writer = amf::amf0::Writer::new(&mut bytes);
        amf_writer.write(&amf::string("publish")).unwrap();
        amf_writer.write(&amf::number(0)).unwrap();
        amf_writer.write(&amf::Value::Null).unwrap();
        amf_writer.write(&amf::string("key")).unwrap();
        amf_writer.write(&amf::string("broadcast")).unwrap();
        let result = RtmpC2SCommands::read_remaining_from(amf::Version::Amf0, &bytes[..]);
        assert!(matches!(
            result,
            Err(ChunkMessageError::UnexpectedAmfType(_))
        ));
    }

    #[test]
    fn create_stream_result_converts_to_typed_response() {
        let response = CommandResponse {
            success: true,
            transaction_id: 2.0,
            command_object: None,
            additional: vec![amf::number(5)],
        };
        let mut bytes = Vec::new();
        RtmpS2CCommands::Response(response)
            .write_to(&mut bytes, amf::Version::Amf0)
            .unwrap();

        let parsed = RtmpS2CCommands::read_remaining_from(amf::Version::Amf0, &bytes[..]).unwrap();
        let response = match parsed {
            RtmpS2CCommands::Response(response) => response,
            unexpected => panic!("unexpected command: {:?}", unexpected),
        };
        assert!(response.success);
        assert_eq!(response.transaction_id, 2.0);
        let typed: CreateStreamCommandResponse = response.try_into().unwrap();
        assert_eq!(typed.stream_id, 5.0);
    }

    #[test]
    fn on_status_roundtrip() {
        let info = vec![
            ("level".to_string(), amf::string("status")),
            ("code".to_string(), amf::string("NetStream.Publish.Start")),
            ("description".to_string(), amf::string("key is published")),
        ];
        let mut bytes = Vec::new();
        RtmpS2CCommands::OnStatus(crate::commands::OnStatusCommand {
            transaction_id: 0,
            info_object: info,
        })
        .write_to(&mut bytes, amf::Version::Amf0)
        .unwrap();

        let parsed = RtmpS2CCommands::read_remaining_from(amf::Version::Amf0, &bytes[..]).unwrap();
        match parsed {
            RtmpS2CCommands::OnStatus(parsed) => {
                assert_eq!(
                    parsed.info_object.extract_string_field("code"),
                    Some("NetStream.Publish.Start".to_string())
                );
                assert_eq!(
                    parsed.info_object.extract_string_field("level"),
                    Some("status".to_string())
                );
            }
            unexpected => panic!("unexpected command: {:?}", unexpected),
        }
    }

    #[test]
    fn server_side_calls_parse_as_calls() {
        // onBWDone from the server, transaction 0, null object, one number
        let mut bytes = Vec::new();
        let mut amf_writer = amf::amf0::Writer::new(&mut bytes);
        amf_writer.write(&amf::string("onBWDone")).unwrap();
        amf_writer.write(&amf::number(0)).unwrap();
        amf_writer.write(&amf::Value::Null).unwrap();
        amf_writer.write(&amf::number(8192)).unwrap();

        let parsed = RtmpS2CCommands::read_remaining_from(amf::Version::Amf0, &bytes[..]).unwrap();
        match parsed {
            RtmpS2CCommands::Call(parsed) => {
                assert_eq!(parsed.command_name, "onBWDone");
                assert_eq!(parsed.additional[0].try_as_f64(), Some(8192.0));
            }
            unexpected => panic!("unexpected command: {:?}", unexpected),
        }
    }
}
