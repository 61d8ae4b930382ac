use core::time;
use std::{
    fmt::Debug,
    time::{SystemTime, UNIX_EPOCH},
};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::{bytes::BytesMut, codec::Encoder, either::Either};
use tracing::{debug, error, trace, warn};

use super::{
    C0S0Packet, C1S1Packet, C2S2Packet, HandshakeClientState, RTMP_VERSION,
    codec::{C0S0PacketCodec, C1S1PacketCodec, C2S2PacketCodec},
    consts::{
        RTMP_CLIENT_KEY, RTMP_CLIENT_KEY_FIRST_HALF, RTMP_CLIENT_VERSION, RTMP_HANDSHAKE_SIZE,
        RTMP_SERVER_KEY, RTMP_SERVER_KEY_FIRST_HALF, SHA256_DIGEST_SIZE,
    },
    digest::{DigestSchema, extract_digest, make_digest, make_message, validate_digest},
    errors::{DigestError, HandshakeError, HandshakeResult},
    reader::Reader,
};

pub trait AsyncHandshakeClient {
    async fn write_c0(&mut self) -> HandshakeResult<()>;
    async fn write_c1(&mut self) -> HandshakeResult<()>;
    async fn write_c2(&mut self) -> HandshakeResult<()>;

    async fn read_s0(&mut self) -> HandshakeResult<()>;
    async fn read_s1(&mut self) -> HandshakeResult<()>;
    async fn read_s2(&mut self) -> HandshakeResult<()>;
    async fn flush(&mut self) -> HandshakeResult<()>;

    fn state(&self) -> HandshakeClientState;
    fn set_state(&mut self, state: HandshakeClientState);

    async fn handshake(&mut self) -> HandshakeResult<()> {
        loop {
            let state = self.state();
            debug!("handshake with state: {:?}", state);
            match state {
                HandshakeClientState::Uninitialized => {
                    self.write_c0().await?;
                    self.write_c1().await?;
                    self.flush().await?;
                    self.set_state(HandshakeClientState::C0C1Sent);
                }
                HandshakeClientState::C0C1Sent => {
                    self.read_s0().await?;
                    self.read_s1().await?;
                    self.set_state(HandshakeClientState::S0S1Read);
                }
                HandshakeClientState::S0S1Read => {
                    self.write_c2().await?;
                    self.flush().await?;
                    self.set_state(HandshakeClientState::C2Sent);
                }
                HandshakeClientState::C2Sent => {
                    self.read_s2().await?;
                    self.set_state(HandshakeClientState::Done);
                }
                HandshakeClientState::Done => break,
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct SimpleHandshakeClient<T> {
    io: T,
    c1_random: [u8; 1528],
    s1_bytes: Vec<u8>,
    state: HandshakeClientState,
}

impl<T> SimpleHandshakeClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Debug,
{
    pub fn new(io: T) -> Self {
        Self {
            io,
            c1_random: [0; 1528],
            s1_bytes: Vec::with_capacity(RTMP_HANDSHAKE_SIZE),
            state: HandshakeClientState::Uninitialized,
        }
    }

    pub fn into_io(self) -> T {
        self.io
    }
}

impl<IO> AsyncHandshakeClient for SimpleHandshakeClient<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Debug,
{
    async fn flush(&mut self) -> HandshakeResult<()> {
        self.io.flush().await?;
        Ok(())
    }
    fn state(&self) -> HandshakeClientState {
        self.state.clone()
    }
    fn set_state(&mut self, state: HandshakeClientState) {
        self.state = state
    }
    async fn write_c0(&mut self) -> HandshakeResult<()> {
        let mut bytes = BytesMut::with_capacity(1);
        C0S0PacketCodec.encode(
            C0S0Packet {
                version: RTMP_VERSION,
            },
            &mut bytes,
        )?;
        self.io.write_all(&bytes[..]).await?;
        debug!("c0 bytes sent");
        Ok(())
    }
    async fn write_c1(&mut self) -> HandshakeResult<()> {
        let mut bytes = BytesMut::with_capacity(RTMP_HANDSHAKE_SIZE);
        utils::random::random_fill(&mut self.c1_random);
        C1S1PacketCodec.encode(
            C1S1Packet {
                timestamp: SystemTime::now().duration_since(UNIX_EPOCH)?,
                zeros: 0,
                random_bytes: self.c1_random,
            },
            &mut bytes,
        )?;
        self.io.write_all(&bytes[..]).await?;
        debug!("c1 bytes sent");
        Ok(())
    }
    async fn write_c2(&mut self) -> HandshakeResult<()> {
        let s1 = Reader::new(&self.s1_bytes[..]).read_c1s1()?;
        let mut bytes = BytesMut::with_capacity(RTMP_HANDSHAKE_SIZE);
        C2S2PacketCodec.encode(
            C2S2Packet {
                timestamp: s1.timestamp,
                timestamp2: SystemTime::now().duration_since(UNIX_EPOCH)?,
                random_echo: s1.random_bytes,
            },
            &mut bytes,
        )?;
        self.io.write_all(&bytes[..]).await?;
        debug!("c2 bytes sent");
        Ok(())
    }
    async fn read_s0(&mut self) -> HandshakeResult<()> {
        let version = self.io.read_u8().await?;
        if version > u8::from(RTMP_VERSION) {
            return Err(HandshakeError::BadVersion(version));
        }
        debug!("read s0, version: {}", version);
        Ok(())
    }
    async fn read_s1(&mut self) -> HandshakeResult<()> {
        self.s1_bytes.resize(RTMP_HANDSHAKE_SIZE, 0);
        self.io.read_exact(&mut self.s1_bytes).await?;
        debug!("read s1");
        Ok(())
    }
    async fn read_s2(&mut self) -> HandshakeResult<()> {
        let mut buf: [u8; RTMP_HANDSHAKE_SIZE] = [0; RTMP_HANDSHAKE_SIZE];
        self.io.read_exact(&mut buf).await?;
        let s2 = Reader::new(&buf[..]).read_c2s2()?;
        if s2.random_echo != self.c1_random {
            return Err(HandshakeError::EchoMismatch);
        }
        debug!("read s2, echo verified");
        Ok(())
    }
}

#[derive(Debug)]
struct ComplexHandshakeClient<T> {
    io: T,
    writer_buffer: BytesMut,
    c1_bytes: Vec<u8>,
    c1_digest: [u8; SHA256_DIGEST_SIZE],
    s1_bytes: Vec<u8>,
    s1_digest: [u8; SHA256_DIGEST_SIZE],
    s1_timestamp: u32,
    state: HandshakeClientState,
}

impl<T> ComplexHandshakeClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Debug,
{
    pub fn new(io: T) -> Self {
        Self {
            io,
            writer_buffer: BytesMut::with_capacity(4096),
            c1_bytes: Vec::with_capacity(RTMP_HANDSHAKE_SIZE),
            c1_digest: [0; SHA256_DIGEST_SIZE],
            s1_bytes: Vec::with_capacity(RTMP_HANDSHAKE_SIZE),
            s1_digest: [0; SHA256_DIGEST_SIZE],
            s1_timestamp: 0,
            state: HandshakeClientState::Uninitialized,
        }
    }

    pub fn into_io(self) -> T {
        self.io
    }
}

impl<T> AsyncHandshakeClient for ComplexHandshakeClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Debug,
{
    async fn flush(&mut self) -> HandshakeResult<()> {
        self.io.write_all(&self.writer_buffer[..]).await?;
        self.io.flush().await?;
        self.writer_buffer.clear();
        Ok(())
    }
    fn state(&self) -> HandshakeClientState {
        self.state.clone()
    }
    fn set_state(&mut self, state: HandshakeClientState) {
        self.state = state
    }
    async fn write_c0(&mut self) -> HandshakeResult<()> {
        C0S0PacketCodec.encode(
            C0S0Packet {
                version: RTMP_VERSION,
            },
            &mut self.writer_buffer,
        )?;
        debug!("write c0");
        Ok(())
    }
    async fn write_c1(&mut self) -> HandshakeResult<()> {
        let mut bytes = BytesMut::with_capacity(RTMP_HANDSHAKE_SIZE);
        let mut random_bytes: [u8; 1528] = [0; 1528];
        utils::random::random_fill(&mut random_bytes);
        C1S1PacketCodec.encode(
            C1S1Packet {
                timestamp: SystemTime::now().duration_since(UNIX_EPOCH)?,
                zeros: RTMP_CLIENT_VERSION.into(),
                random_bytes,
            },
            &mut bytes,
        )?;
        let mut bytes_array: [u8; RTMP_HANDSHAKE_SIZE] = [0; RTMP_HANDSHAKE_SIZE];
        bytes_array.copy_from_slice(&bytes[..]);
        let message = make_message(
            RTMP_CLIENT_KEY_FIRST_HALF.as_bytes(),
            &bytes_array,
            DigestSchema::Schema2,
        )?;
        bytes_array.copy_from_slice(&message);
        self.c1_digest = extract_digest(&bytes_array, DigestSchema::Schema2);
        self.c1_bytes = message;
        self.writer_buffer.extend_from_slice(&self.c1_bytes);
        debug!("write c1");
        Ok(())
    }
    async fn write_c2(&mut self) -> HandshakeResult<()> {
        let mut bytes = BytesMut::with_capacity(RTMP_HANDSHAKE_SIZE);
        let mut random_bytes: [u8; 1528] = [0; 1528];
        utils::random::random_fill(&mut random_bytes);
        C2S2PacketCodec.encode(
            C2S2Packet {
                timestamp: time::Duration::from_millis(self.s1_timestamp as u64),
                timestamp2: SystemTime::now().duration_since(UNIX_EPOCH)?,
                random_echo: random_bytes,
            },
            &mut bytes,
        )?;
        let key = make_digest(&RTMP_CLIENT_KEY, &self.s1_digest)?;
        let mut bytes_array: [u8; RTMP_HANDSHAKE_SIZE] = [0; RTMP_HANDSHAKE_SIZE];
        bytes_array.copy_from_slice(&bytes[..]);
        let digest = make_digest(
            &key,
            &bytes_array[..RTMP_HANDSHAKE_SIZE - SHA256_DIGEST_SIZE],
        )?;
        self.writer_buffer
            .extend_from_slice(&bytes_array[..RTMP_HANDSHAKE_SIZE - SHA256_DIGEST_SIZE]);
        self.writer_buffer.extend_from_slice(&digest);
        debug!("write c2");
        Ok(())
    }
    async fn read_s0(&mut self) -> HandshakeResult<()> {
        let version = self.io.read_u8().await?;
        if version > u8::from(RTMP_VERSION) {
            return Err(HandshakeError::BadVersion(version));
        }
        debug!("read s0, version: {}", version);
        Ok(())
    }
    async fn read_s1(&mut self) -> HandshakeResult<()> {
        self.s1_bytes.resize(RTMP_HANDSHAKE_SIZE, 0);
        self.io.read_exact(&mut self.s1_bytes).await?;
        let packet = Reader::new(&self.s1_bytes[..]).read_c1s1()?;
        self.s1_timestamp = packet.timestamp.as_millis() as u32;
        let mut bytes = [0u8; RTMP_HANDSHAKE_SIZE];
        bytes.copy_from_slice(&self.s1_bytes);
        let digest = validate_digest(&bytes, RTMP_SERVER_KEY_FIRST_HALF.as_bytes())?;
        if digest.len() != SHA256_DIGEST_SIZE {
            return Err(HandshakeError::DigestError(DigestError::WrongLength {
                length: digest.len(),
            }));
        }
        self.s1_digest.copy_from_slice(&digest);
        debug!("read s1, digest validated");
        Ok(())
    }
    async fn read_s2(&mut self) -> HandshakeResult<()> {
        let mut bytes = [0u8; RTMP_HANDSHAKE_SIZE];
        self.io.read_exact(&mut bytes).await?;
        let key = make_digest(&RTMP_SERVER_KEY, &self.c1_digest)?;
        let expected = make_digest(&key, &bytes[..RTMP_HANDSHAKE_SIZE - SHA256_DIGEST_SIZE])?;
        if expected.as_slice() != &bytes[RTMP_HANDSHAKE_SIZE - SHA256_DIGEST_SIZE..] {
            warn!("s2 digest mismatch");
        }
        debug!("read s2");
        Ok(())
    }
}

impl<T> Into<SimpleHandshakeClient<T>> for ComplexHandshakeClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Debug,
{
    fn into(self) -> SimpleHandshakeClient<T> {
        let mut c1_random = [0; 1528];
        if self.c1_bytes.len() == RTMP_HANDSHAKE_SIZE {
            c1_random.copy_from_slice(&self.c1_bytes[8..]);
        }
        SimpleHandshakeClient {
            io: self.io,
            c1_random,
            s1_bytes: self.s1_bytes,
            state: self.state,
        }
    }
}

/// Runs the client side of the handshake over any async transport, the plain
/// exchange by default and the digested one on request, falling back to plain
/// when the peer did not sign its s1.
#[derive(Debug)]
pub struct HandshakeClient<T: AsyncRead + AsyncWrite + Unpin + Debug> {
    handshaker: Either<ComplexHandshakeClient<T>, SimpleHandshakeClient<T>>,
}

impl<T> HandshakeClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Debug,
{
    pub fn new(io: T) -> Self {
        Self {
            handshaker: Either::Right(SimpleHandshakeClient::new(io)),
        }
    }

    pub fn complex(io: T) -> Self {
        Self {
            handshaker: Either::Left(ComplexHandshakeClient::new(io)),
        }
    }

    ///! runs the exchange to completion and hands the transport back, ready
    ///! for chunked traffic
    pub async fn handshake(mut self, complex_only: bool) -> HandshakeResult<T> {
        if let Either::Left(mut h) = self.handshaker {
            debug!("now do complex handshake");
            match h.handshake().await {
                Err(HandshakeError::DigestError(err)) => {
                    if complex_only {
                        return Err(HandshakeError::DigestError(err));
                    }
                    trace!(
                        "complex handshake failed due to digest error: {}, retry with simple handshake",
                        err
                    );
                    let mut sim: SimpleHandshakeClient<_> = h.into();
                    sim.state = HandshakeClientState::S0S1Read;
                    self.handshaker = Either::Right(sim);
                }
                Err(err) => {
                    error!("complex handshake failed: {}", err);
                    return Err(err);
                }
                Ok(()) => return Ok(h.into_io()),
            }
        }

        match self.handshaker {
            Either::Right(mut h) => {
                debug!("now do simple handshake");
                h.handshake().await?;
                Ok(h.into_io())
            }
            Either::Left(_) => unreachable!("the digested exchange finished or fell back"),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::DuplexStream;

    use super::*;

    async fn run_plain_server(
        mut io: DuplexStream,
    ) -> ([u8; RTMP_HANDSHAKE_SIZE], [u8; RTMP_HANDSHAKE_SIZE]) {
        let mut c0 = [0u8; 1];
        io.read_exact(&mut c0).await.unwrap();
        let mut c1 = [0u8; RTMP_HANDSHAKE_SIZE];
        io.read_exact(&mut c1).await.unwrap();

        io.write_all(&[3]).await.unwrap();
        let mut s1 = [0u8; RTMP_HANDSHAKE_SIZE];
        utils::random::random_fill(&mut s1[8..]);
        io.write_all(&s1).await.unwrap();
        io.write_all(&c1).await.unwrap();
        io.flush().await.unwrap();

        let mut c2 = [0u8; RTMP_HANDSHAKE_SIZE];
        io.read_exact(&mut c2).await.unwrap();
        (s1, c2)
    }

    async fn run_digest_server(
        mut io: DuplexStream,
    ) -> ([u8; SHA256_DIGEST_SIZE], [u8; RTMP_HANDSHAKE_SIZE]) {
        let mut c0 = [0u8; 1];
        io.read_exact(&mut c0).await.unwrap();
        let mut c1 = [0u8; RTMP_HANDSHAKE_SIZE];
        io.read_exact(&mut c1).await.unwrap();
        let c1_digest = validate_digest(&c1, RTMP_CLIENT_KEY_FIRST_HALF.as_bytes()).unwrap();

        io.write_all(&[3]).await.unwrap();
        let mut s1_plain = [0u8; RTMP_HANDSHAKE_SIZE];
        utils::random::random_fill(&mut s1_plain);
        s1_plain[0..4].copy_from_slice(&[0, 0, 0, 1]);
        s1_plain[4..8].copy_from_slice(&[4, 5, 6, 1]);
        let s1 = make_message(
            RTMP_SERVER_KEY_FIRST_HALF.as_bytes(),
            &s1_plain,
            DigestSchema::Schema1,
        )
        .unwrap();
        io.write_all(&s1).await.unwrap();

        let key = make_digest(&RTMP_SERVER_KEY, &c1_digest).unwrap();
        let mut s2 = [0u8; RTMP_HANDSHAKE_SIZE];
        utils::random::random_fill(&mut s2[..RTMP_HANDSHAKE_SIZE - SHA256_DIGEST_SIZE]);
        let tail =
            make_digest(&key, &s2[..RTMP_HANDSHAKE_SIZE - SHA256_DIGEST_SIZE]).unwrap();
        s2[RTMP_HANDSHAKE_SIZE - SHA256_DIGEST_SIZE..].copy_from_slice(&tail);
        io.write_all(&s2).await.unwrap();
        io.flush().await.unwrap();

        let mut c2 = [0u8; RTMP_HANDSHAKE_SIZE];
        io.read_exact(&mut c2).await.unwrap();
        let s1_array: [u8; RTMP_HANDSHAKE_SIZE] = s1.try_into().unwrap();
        (extract_digest(&s1_array, DigestSchema::Schema1), c2)
    }

    #[tokio::test]
    async fn simple_handshake_completes_and_echoes_s1() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(run_plain_server(server_io));

        HandshakeClient::new(client_io).handshake(false).await.unwrap();

        let (s1, c2) = server.await.unwrap();
        assert_eq!(&c2[8..], &s1[8..]);
    }

    #[tokio::test]
    async fn complex_handshake_signs_c1_and_c2() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(run_digest_server(server_io));

        HandshakeClient::complex(client_io)
            .handshake(true)
            .await
            .unwrap();

        let (s1_digest, c2) = server.await.unwrap();
        let key = make_digest(&RTMP_CLIENT_KEY, &s1_digest).unwrap();
        let expected =
            make_digest(&key, &c2[..RTMP_HANDSHAKE_SIZE - SHA256_DIGEST_SIZE]).unwrap();
        assert_eq!(
            expected.as_slice(),
            &c2[RTMP_HANDSHAKE_SIZE - SHA256_DIGEST_SIZE..]
        );
    }

    #[tokio::test]
    async fn complex_falls_back_to_simple_against_a_plain_peer() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(run_plain_server(server_io));

        HandshakeClient::complex(client_io)
            .handshake(false)
            .await
            .unwrap();

        let (s1, c2) = server.await.unwrap();
        assert_eq!(&c2[8..], &s1[8..]);
    }

    #[tokio::test]
    async fn complex_only_rejects_an_unsigned_s1() {
        let (client_io, mut server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let mut c0c1 = [0u8; 1 + RTMP_HANDSHAKE_SIZE];
            server_io.read_exact(&mut c0c1).await.unwrap();
            server_io.write_all(&[3]).await.unwrap();
            let mut s1 = [0u8; RTMP_HANDSHAKE_SIZE];
            utils::random::random_fill(&mut s1[8..]);
            server_io.write_all(&s1).await.unwrap();
            server_io.write_all(&c0c1[1..]).await.unwrap();
        });

        let result = HandshakeClient::complex(client_io).handshake(true).await;
        assert!(matches!(result, Err(HandshakeError::DigestError(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn bails_out_on_an_unsupported_version() {
        let (client_io, mut server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let mut c0c1 = [0u8; 1 + RTMP_HANDSHAKE_SIZE];
            server_io.read_exact(&mut c0c1).await.unwrap();
            server_io.write_all(&[9]).await.unwrap();
        });

        let result = HandshakeClient::new(client_io).handshake(false).await;
        assert!(matches!(result, Err(HandshakeError::BadVersion(9))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn bails_out_on_a_bad_s2_echo() {
        let (client_io, mut server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let mut c0c1 = [0u8; 1 + RTMP_HANDSHAKE_SIZE];
            server_io.read_exact(&mut c0c1).await.unwrap();
            server_io.write_all(&[3]).await.unwrap();
            let mut s1 = [0u8; RTMP_HANDSHAKE_SIZE];
            utils::random::random_fill(&mut s1[8..]);
            server_io.write_all(&s1).await.unwrap();
            let mut s2 = [0u8; RTMP_HANDSHAKE_SIZE];
            utils::random::random_fill(&mut s2[8..]);
            server_io.write_all(&s2).await.unwrap();
            let mut c2 = [0u8; RTMP_HANDSHAKE_SIZE];
            server_io.read_exact(&mut c2).await.unwrap();
        });

        let result = HandshakeClient::new(client_io).handshake(false).await;
        assert!(matches!(result, Err(HandshakeError::EchoMismatch)));
        server.await.unwrap();
    }
}
