use tokio_util::{
    bytes::{Buf, BufMut},
    codec::{Decoder, Encoder},
};

use super::{
    C0S0Packet, C1S1Packet, C2S2Packet, consts::RTMP_HANDSHAKE_SIZE, errors::HandshakeError,
    reader::Reader, writer::Writer,
};

pub struct C0S0PacketCodec;

impl Decoder for C0S0PacketCodec {
    type Error = HandshakeError;
    type Item = C0S0Packet;
    fn decode(
        &mut self,
        src: &mut tokio_util::bytes::BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        let len = src.len();
        if len < 1 {
            return Ok(None);
        }

        Ok(Some(Reader::new(src.reader()).read_c0s0()?))
    }
}

impl Encoder<C0S0Packet> for C0S0PacketCodec {
    type Error = HandshakeError;
    fn encode(
        &mut self,
        item: C0S0Packet,
        dst: &mut tokio_util::bytes::BytesMut,
    ) -> Result<(), Self::Error> {
        Writer::new(dst.writer()).write_c0s0(item.version)?;
        Ok(())
    }
}

pub struct C1S1PacketCodec;

impl Decoder for C1S1PacketCodec {
    type Error = HandshakeError;
    type Item = C1S1Packet;
    fn decode(
        &mut self,
        src: &mut tokio_util::bytes::BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        let len = src.len();
        if len < RTMP_HANDSHAKE_SIZE {
            src.reserve(RTMP_HANDSHAKE_SIZE);
            return Ok(None);
        }

        Ok(Some(Reader::new(src.reader()).read_c1s1()?))
    }
}

impl Encoder<C1S1Packet> for C1S1PacketCodec {
    type Error = HandshakeError;
    fn encode(
        &mut self,
        item: C1S1Packet,
        dst: &mut tokio_util::bytes::BytesMut,
    ) -> Result<(), Self::Error> {
        dst.reserve(RTMP_HANDSHAKE_SIZE);
        Writer::new(dst.writer()).write_c1s1(item)?;
        Ok(())
    }
}

pub struct C2S2PacketCodec;

impl Decoder for C2S2PacketCodec {
    type Error = HandshakeError;
    type Item = C2S2Packet;
    fn decode(
        &mut self,
        src: &mut tokio_util::bytes::BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        let len = src.len();
        if len < RTMP_HANDSHAKE_SIZE {
            src.reserve(RTMP_HANDSHAKE_SIZE);
            return Ok(None);
        }

        Ok(Some(Reader::new(src.reader()).read_c2s2()?))
    }
}

impl Encoder<C2S2Packet> for C2S2PacketCodec {
    type Error = HandshakeError;
    fn encode(
        &mut self,
        item: C2S2Packet,
        dst: &mut tokio_util::bytes::BytesMut,
    ) -> Result<(), Self::Error> {
        dst.reserve(RTMP_HANDSHAKE_SIZE);
        Writer::new(dst.writer()).write_c2s2(item)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::time;

    use tokio_util::{
        bytes::BytesMut,
        codec::{Decoder, Encoder},
    };

    use super::*;
    use crate::handshake::{Version, errors::HandshakeError};

    #[test]
    fn c0s0_decode_waits_for_a_full_packet() {
        let mut buf = BytesMut::new();
        assert!(C0S0PacketCodec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[3]);
        let packet = C0S0PacketCodec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(packet.version, Version::V3));
    }

    #[test]
    fn c0s0_decode_rejects_unknown_versions() {
        let mut buf = BytesMut::from(&[9u8][..]);
        let result = C0S0PacketCodec.decode(&mut buf);
        assert!(matches!(result, Err(HandshakeError::BadVersion(9))));
    }

    #[test]
    fn c1s1_codec_round_trip_keeps_the_version_field() {
        let mut random_bytes = [0u8; 1528];
        utils::random::random_fill(&mut random_bytes);
        let mut buf = BytesMut::new();
        C1S1PacketCodec
            .encode(
                C1S1Packet {
                    timestamp: time::Duration::from_millis(5000),
                    zeros: 0x0C000D0E,
                    random_bytes,
                },
                &mut buf,
            )
            .unwrap();
        assert_eq!(buf.len(), RTMP_HANDSHAKE_SIZE);

        let decoded = C1S1PacketCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.timestamp, time::Duration::from_millis(5000));
        assert_eq!(decoded.zeros, 0x0C000D0E);
        assert_eq!(decoded.random_bytes, random_bytes);
    }

    #[test]
    fn c2s2_codec_round_trip() {
        let mut random_echo = [0u8; 1528];
        utils::random::random_fill(&mut random_echo);
        let mut buf = BytesMut::new();
        C2S2PacketCodec
            .encode(
                C2S2Packet {
                    timestamp: time::Duration::from_millis(1),
                    timestamp2: time::Duration::from_millis(2),
                    random_echo,
                },
                &mut buf,
            )
            .unwrap();

        let decoded = C2S2PacketCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.timestamp, time::Duration::from_millis(1));
        assert_eq!(decoded.timestamp2, time::Duration::from_millis(2));
        assert_eq!(decoded.random_echo, random_echo);
    }
}
