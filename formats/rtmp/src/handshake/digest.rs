use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use super::{
    consts::{RTMP_HANDSHAKE_SIZE, SHA256_DIGEST_SIZE},
    errors::DigestError,
};

// @see: https://blog.csdn.net/win_lin/article/details/13006803
// @see: https://github.com/harlanc/xiu/blob/master/protocol/rtmp/src/handshake/handshake_client.rs

/// two types of schema for c1s1 random bytes:
/// schema1:
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | key (764 bytes) | digest (764 bytes)  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///
/// schema2:
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | digest (764 bytes) | key (764 bytes)  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///
/// where key:
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | {offset} bytes  | public key (128 bytes)  | {764 - offset - 128 - 4} bytes  | offset (4bytes) |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// digest:
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | offset (4 bytes)  | {offset} bytes  | hash digest (32 bytes)  | {764 - 4 - offset - 32} bytes |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone, Copy)]
pub enum DigestSchema {
    Schema1,
    Schema2,
}

type DigestResult<T> = Result<T, DigestError>;

fn get_digest_index(random_bytes: &[u8; RTMP_HANDSHAKE_SIZE], schema: DigestSchema) -> usize {
    let mut index: usize = 0;
    match schema {
        DigestSchema::Schema1 => {
            index += random_bytes[772] as usize;
            index += random_bytes[773] as usize;
            index += random_bytes[774] as usize;
            index += random_bytes[775] as usize;
            index %= 728;
            index += 776;
        }
        DigestSchema::Schema2 => {
            index += random_bytes[8] as usize;
            index += random_bytes[9] as usize;
            index += random_bytes[10] as usize;
            index += random_bytes[11] as usize;
            index %= 728;
            index += 12;
        }
    }
    index
}

fn validate_digest_with_schema(
    bytes: &[u8; RTMP_HANDSHAKE_SIZE],
    key: &[u8],
    schema: DigestSchema,
) -> DigestResult<Vec<u8>> {
    let index = get_digest_index(bytes, schema);
    let left = &bytes[..index];
    let hash_digest = &bytes[index..index + SHA256_DIGEST_SIZE];
    let right = &bytes[index + SHA256_DIGEST_SIZE..];
    let raw_message = [left, right].concat();
    let digest = make_digest(key, &raw_message)?;
    if &*digest == hash_digest {
        return Ok(digest);
    }
    debug!(
        "received digest: {:?}, expected digest: {:?}, split at: {}",
        hash_digest, digest, index,
    );

    Err(DigestError::Invalid)
}

/// find and check the digest a peer spliced into its 1536 byte packet,
/// trying both layouts. returns the digest bytes on success
pub fn validate_digest(bytes: &[u8; RTMP_HANDSHAKE_SIZE], key: &[u8]) -> DigestResult<Vec<u8>> {
    validate_digest_with_schema(bytes, key, DigestSchema::Schema1)
        .or_else(|_| validate_digest_with_schema(bytes, key, DigestSchema::Schema2))
}

pub fn make_digest(key: &[u8], message: &[u8]) -> DigestResult<Vec<u8>> {
    let mut hmac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    hmac.update(message);
    let result = hmac.finalize().into_bytes();
    if result.len() != SHA256_DIGEST_SIZE {
        return Err(DigestError::WrongLength {
            length: result.len(),
        });
    }

    Ok(Vec::from(result.as_slice()))
}

/// splice a keyed digest into a plain 1536 byte packet at the position the
/// given schema derives from the packet's own offset bytes
pub fn make_message(
    key: &[u8],
    bytes: &[u8; RTMP_HANDSHAKE_SIZE],
    schema: DigestSchema,
) -> DigestResult<Vec<u8>> {
    let index = get_digest_index(bytes, schema);
    let left_part = &bytes[..index];
    let right_part = &bytes[index + SHA256_DIGEST_SIZE..];
    let digest = make_c1s1_digest(key, left_part, right_part)?;
    Ok([left_part, digest.as_slice(), right_part].concat())
}

pub fn make_c1s1_digest(key: &[u8], left_part: &[u8], right_part: &[u8]) -> DigestResult<Vec<u8>> {
    let message = [left_part, right_part].concat();
    make_digest(key, &message)
}

pub fn extract_digest(
    bytes: &[u8; RTMP_HANDSHAKE_SIZE],
    schema: DigestSchema,
) -> [u8; SHA256_DIGEST_SIZE] {
    let index = get_digest_index(bytes, schema);
    let mut digest = [0; SHA256_DIGEST_SIZE];
    digest.copy_from_slice(&bytes[index..index + SHA256_DIGEST_SIZE]);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::consts::{RTMP_CLIENT_KEY_FIRST_HALF, RTMP_SERVER_KEY_FIRST_HALF};

    #[test]
    fn make_digest_is_deterministic() {
        let first = make_digest(RTMP_CLIENT_KEY_FIRST_HALF.as_bytes(), b"payload").unwrap();
        let second = make_digest(RTMP_CLIENT_KEY_FIRST_HALF.as_bytes(), b"payload").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), SHA256_DIGEST_SIZE);
    }

    #[test]
    fn signed_message_validates_under_either_schema() {
        for schema in [DigestSchema::Schema1, DigestSchema::Schema2] {
            let mut bytes = [0u8; RTMP_HANDSHAKE_SIZE];
            utils::random::random_fill(&mut bytes);
            let message =
                make_message(RTMP_CLIENT_KEY_FIRST_HALF.as_bytes(), &bytes, schema).unwrap();
            let signed: [u8; RTMP_HANDSHAKE_SIZE] = message.try_into().unwrap();
            let digest =
                validate_digest(&signed, RTMP_CLIENT_KEY_FIRST_HALF.as_bytes()).unwrap();
            assert_eq!(digest.as_slice(), extract_digest(&signed, schema));
        }
    }

    #[test]
    fn tampered_message_fails_validation() {
        let mut bytes = [0u8; RTMP_HANDSHAKE_SIZE];
        utils::random::random_fill(&mut bytes);
        let message = make_message(
            RTMP_SERVER_KEY_FIRST_HALF.as_bytes(),
            &bytes,
            DigestSchema::Schema1,
        )
        .unwrap();
        let mut signed: [u8; RTMP_HANDSHAKE_SIZE] = message.try_into().unwrap();
        signed[0] ^= 0xFF;
        let result = validate_digest(&signed, RTMP_SERVER_KEY_FIRST_HALF.as_bytes());
        assert!(matches!(result, Err(DigestError::Invalid)));
    }

    #[test]
    fn wrong_key_fails_validation() {
        let mut bytes = [0u8; RTMP_HANDSHAKE_SIZE];
        utils::random::random_fill(&mut bytes);
        let message = make_message(
            RTMP_CLIENT_KEY_FIRST_HALF.as_bytes(),
            &bytes,
            DigestSchema::Schema2,
        )
        .unwrap();
        let signed: [u8; RTMP_HANDSHAKE_SIZE] = message.try_into().unwrap();
        let result = validate_digest(&signed, RTMP_SERVER_KEY_FIRST_HALF.as_bytes());
        assert!(matches!(result, Err(DigestError::Invalid)));
    }
}
