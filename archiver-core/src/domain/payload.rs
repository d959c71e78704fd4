//! Torrent payload
//!
//! The raw `.torrent` bytes handed out by the remote service, together with the
//! name and total size decoded from their bencoded `info` dictionary.

use serde::Deserialize;
use thiserror::Error;

/// Name used when the metadata cannot be decoded
pub const UNKNOWN_NAME: &str = "unknown";

/// A downloaded torrent ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Raw metainfo bytes, passed to backends untouched
    pub bytes: Vec<u8>,

    /// Torrent name from `info.name`
    pub name: String,

    /// Single-file length, or the sum of all file lengths
    pub total_size: u64,
}

/// Metadata that could not be decoded
///
/// Carries the bytes back so the caller can still dispatch them.
#[derive(Debug, Error)]
#[error("failed to decode torrent metadata: {source}")]
pub struct DecodeError {
    bytes: Vec<u8>,
    #[source]
    source: MetadataError,
}

/// What was wrong with the metadata
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Bencode(#[from] serde_bencode::Error),

    #[error("file lengths overflow a 64-bit total")]
    SizeOverflow,
}

impl DecodeError {
    /// Falls back to a payload named "unknown" with a size of zero
    pub fn into_placeholder(self) -> Payload {
        Payload {
            bytes: self.bytes,
            name: UNKNOWN_NAME.to_string(),
            total_size: 0,
        }
    }
}

#[derive(Deserialize)]
struct Metainfo {
    info: Info,
}

#[derive(Deserialize)]
struct Info {
    #[serde(default)]
    name: String,
    #[serde(default)]
    length: Option<u64>,
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Deserialize)]
struct FileEntry {
    length: u64,
}

impl Payload {
    /// Decodes name and size from bencoded metainfo
    pub fn decode(bytes: Vec<u8>) -> Result<Self, DecodeError> {
        let info = match serde_bencode::from_bytes::<Metainfo>(&bytes) {
            Ok(metainfo) => metainfo.info,
            Err(e) => {
                return Err(DecodeError {
                    bytes,
                    source: e.into(),
                });
            }
        };

        let total_size = match info.length {
            Some(length) if length > 0 => Some(length),
            _ => info
                .files
                .iter()
                .try_fold(0u64, |total, f| total.checked_add(f.length)),
        };
        let Some(total_size) = total_size else {
            return Err(DecodeError {
                bytes,
                source: MetadataError::SizeOverflow,
            });
        };

        let name = if info.name.is_empty() {
            UNKNOWN_NAME.to_string()
        } else {
            info.name
        };

        Ok(Self {
            bytes,
            name,
            total_size,
        })
    }

    /// Disk space needed to accept this payload
    pub fn required_space(&self) -> u64 {
        required_space(self.total_size)
    }
}

/// Size plus a 10% buffer, rounded up: `ceil(size * 1.1)`
///
/// Computed in integers so the boundary is exact for every size.
pub fn required_space(size: u64) -> u64 {
    let required = (u128::from(size) * 11).div_ceil(10);
    u64::try_from(required).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE: &[u8] = b"d8:announce9:http://tr4:infod6:lengthi1000e4:name3:foo12:piece lengthi16384e6:pieces0:ee";
    const MULTI: &[u8] = b"d4:infod5:filesld6:lengthi10e4:pathl1:aeed6:lengthi20e4:pathl1:beee4:name4:dirs12:piece lengthi16384e6:pieces0:ee";

    #[test]
    fn test_decode_single_file() {
        let payload = Payload::decode(SINGLE.to_vec()).unwrap();
        assert_eq!(payload.name, "foo");
        assert_eq!(payload.total_size, 1000);
        assert_eq!(payload.bytes, SINGLE);
    }

    #[test]
    fn test_decode_multi_file_sums_lengths() {
        let payload = Payload::decode(MULTI.to_vec()).unwrap();
        assert_eq!(payload.name, "dirs");
        assert_eq!(payload.total_size, 30);
    }

    #[test]
    fn test_decode_failure_keeps_bytes() {
        let garbage = b"<html>not a torrent</html>".to_vec();
        let err = Payload::decode(garbage.clone()).unwrap_err();
        let payload = err.into_placeholder();
        assert_eq!(payload.name, UNKNOWN_NAME);
        assert_eq!(payload.total_size, 0);
        assert_eq!(payload.bytes, garbage);
    }

    #[test]
    fn test_decode_overflowing_lengths_falls_back() {
        let huge = "d6:lengthi9223372036854775807e4:pathl1:aee";
        let torrent = format!("d4:infod5:filesl{}e4:name1:xee", huge.repeat(3)).into_bytes();

        let err = Payload::decode(torrent.clone()).unwrap_err();
        assert!(matches!(err.source, MetadataError::SizeOverflow));

        let payload = err.into_placeholder();
        assert_eq!(payload.name, UNKNOWN_NAME);
        assert_eq!(payload.total_size, 0);
        assert_eq!(payload.bytes, torrent);
    }

    #[test]
    fn test_required_space_rounds_up() {
        assert_eq!(required_space(0), 0);
        assert_eq!(required_space(10), 11);
        assert_eq!(required_space(1), 2);
        assert_eq!(required_space(1000), 1100);
        assert_eq!(required_space(1001), 1102);
    }

    #[test]
    fn test_required_space_saturates() {
        assert_eq!(required_space(u64::MAX), u64::MAX);
    }
}
