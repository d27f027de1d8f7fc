use thiserror::Error;

use crate::DrawingPayload;

/// Stored drawings start with this tag followed by a little-endian `u32`
/// format version and the bincode body.
pub const PAYLOAD_MAGIC: [u8; 4] = *b"SBMP";
pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadFormatError {
    #[error("not a body map payload")]
    BadMagic,
    #[error("body map payload header is truncated")]
    TruncatedHeader,
    #[error("unsupported body map payload version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid body map payload body: {0}")]
    Body(String),
    #[error("{0} unexpected bytes after body map payload")]
    TrailingBytes(usize),
    #[error("could not encode body map payload: {0}")]
    Encode(String),
}

fn config() -> bincode::config::Configuration {
    bincode::config::standard()
}

pub fn encode_drawing_payload(data: &DrawingPayload) -> Result<Vec<u8>, PayloadFormatError> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&PAYLOAD_MAGIC);
    out.extend_from_slice(&PAYLOAD_VERSION.to_le_bytes());
    bincode::encode_into_std_write(data, &mut out, config())
        .map_err(|err| PayloadFormatError::Encode(err.to_string()))?;
    Ok(out)
}

pub fn decode_drawing_payload(bytes: &[u8]) -> Result<DrawingPayload, PayloadFormatError> {
    let rest = bytes
        .strip_prefix(&PAYLOAD_MAGIC[..])
        .ok_or(PayloadFormatError::BadMagic)?;
    let (version, body) = rest
        .split_first_chunk::<4>()
        .ok_or(PayloadFormatError::TruncatedHeader)?;
    let version = u32::from_le_bytes(*version);
    if version != PAYLOAD_VERSION {
        return Err(PayloadFormatError::UnsupportedVersion(version));
    }
    let (payload, read) = bincode::decode_from_slice::<DrawingPayload, _>(body, config())
        .map_err(|err| PayloadFormatError::Body(err.to_string()))?;
    match body.len() - read {
        0 => Ok(payload),
        extra => Err(PayloadFormatError::TrailingBytes(extra)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Point, StageSize, Stroke};

    fn sample() -> DrawingPayload {
        DrawingPayload {
            shapes: vec![
                Stroke::Draw {
                    color: "#d7263d".into(),
                    width: 6.0,
                    points: vec![Point { x: 1.5, y: 2.5 }, Point { x: 3.0, y: 4.0 }],
                },
                Stroke::Erase {
                    width: 20.0,
                    points: vec![Point { x: 2.0, y: 3.0 }],
                },
            ],
            stage: Some(StageSize::new(360.0, 720.0)),
        }
    }

    #[test]
    fn encoded_payload_decodes_with_stage() {
        let bytes = encode_drawing_payload(&sample()).unwrap();
        assert!(bytes.starts_with(&PAYLOAD_MAGIC));
        assert_eq!(decode_drawing_payload(&bytes).unwrap(), sample());
    }

    #[test]
    fn foreign_bytes_fail_on_magic() {
        assert_eq!(
            decode_drawing_payload(b"{\"shapes\":[]}"),
            Err(PayloadFormatError::BadMagic)
        );
        assert_eq!(decode_drawing_payload(b"SB"), Err(PayloadFormatError::BadMagic));
    }

    #[test]
    fn short_header_is_truncated() {
        assert_eq!(
            decode_drawing_payload(b"SBMP\x01\x00"),
            Err(PayloadFormatError::TruncatedHeader)
        );
    }

    #[test]
    fn future_versions_are_refused() {
        let mut bytes = encode_drawing_payload(&DrawingPayload::default()).unwrap();
        bytes[4..8].copy_from_slice(&7u32.to_le_bytes());
        assert_eq!(
            decode_drawing_payload(&bytes),
            Err(PayloadFormatError::UnsupportedVersion(7))
        );
    }

    #[test]
    fn damaged_body_and_trailing_bytes_are_reported() {
        let bytes = encode_drawing_payload(&sample()).unwrap();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(
            decode_drawing_payload(cut),
            Err(PayloadFormatError::Body(_))
        ));

        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0, 0]);
        assert_eq!(
            decode_drawing_payload(&padded),
            Err(PayloadFormatError::TrailingBytes(2))
        );
    }
}
