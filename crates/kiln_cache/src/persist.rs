//! Versioned binary blobs for incremental-cache files.
//!
//! A blob is a 4-byte little-endian header length, a bincode-encoded
//! [`BlobHeader`], then the bincode-encoded payload. The header carries magic
//! bytes, the format version, the toolchain version that wrote the blob and a
//! checksum of the payload. Blobs are only readable by the toolchain version
//! that wrote them.

use std::io::{Read, Write};

use kiln_common::ContentHash;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Magic bytes identifying a kiln cache blob.
const BLOB_MAGIC: [u8; 4] = *b"KILN";

/// Current blob format version. Increment on breaking changes to the header
/// or payload layout.
const BLOB_FORMAT_VERSION: u32 = 2;

/// Header prepended to every blob for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobHeader {
    /// Magic bytes: must be `b"KILN"`.
    pub magic: [u8; 4],
    /// Blob format version.
    pub format_version: u32,
    /// Toolchain version that produced this blob.
    pub toolchain_version: String,
    /// Content hash of the payload.
    pub checksum: ContentHash,
}

fn serialization(e: impl std::fmt::Display) -> CacheError {
    CacheError::Serialization {
        reason: e.to_string(),
    }
}

/// Serializes `value` into `writer` as a blob. Returns the bytes written.
pub fn encode_blob<T: Serialize>(
    value: &T,
    toolchain_version: &str,
    writer: &mut dyn Write,
) -> Result<u64, CacheError> {
    let payload =
        bincode::serde::encode_to_vec(value, bincode::config::standard()).map_err(serialization)?;

    let header = BlobHeader {
        magic: BLOB_MAGIC,
        format_version: BLOB_FORMAT_VERSION,
        toolchain_version: toolchain_version.to_string(),
        checksum: ContentHash::from_bytes(&payload),
    };
    let header_bytes =
        bincode::serde::encode_to_vec(&header, bincode::config::standard()).map_err(serialization)?;
    let header_len = u32::try_from(header_bytes.len()).map_err(serialization)?;

    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(&header_bytes)?;
    writer.write_all(&payload)?;
    writer.flush()?;

    Ok((4 + header_bytes.len() + payload.len()) as u64)
}

/// Reads and validates a blob from `reader`, returning its payload.
pub fn decode_blob<T: DeserializeOwned>(
    reader: &mut dyn Read,
    toolchain_version: &str,
) -> Result<T, CacheError> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;

    if raw.len() < 4 {
        return Err(CacheError::InvalidHeader {
            reason: "blob is shorter than its length prefix".to_string(),
        });
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&raw[..4]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    if raw.len() < 4 + header_len {
        return Err(CacheError::InvalidHeader {
            reason: "truncated header".to_string(),
        });
    }

    let (header, _): (BlobHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .map_err(|e| CacheError::InvalidHeader {
                reason: e.to_string(),
            })?;

    if header.magic != BLOB_MAGIC {
        return Err(CacheError::InvalidHeader {
            reason: "missing magic bytes".to_string(),
        });
    }
    if header.format_version != BLOB_FORMAT_VERSION {
        return Err(CacheError::VersionMismatch {
            expected: BLOB_FORMAT_VERSION,
            actual: header.format_version,
        });
    }
    if header.toolchain_version != toolchain_version {
        return Err(CacheError::ToolchainMismatch {
            expected: toolchain_version.to_string(),
            actual: header.toolchain_version,
        });
    }

    let payload = &raw[4 + header_len..];
    let actual = ContentHash::from_bytes(payload);
    if actual != header.checksum {
        return Err(CacheError::ChecksumMismatch {
            expected: header.checksum.to_string(),
            actual: actual.to_string(),
        });
    }

    let (value, _) = bincode::serde::decode_from_slice(payload, bincode::config::standard())
        .map_err(serialization)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct State {
        fingerprint: u64,
        files: BTreeMap<String, u64>,
    }

    fn sample() -> State {
        State {
            fingerprint: 0xfeed,
            files: [("a.lib".to_string(), 3)].into_iter().collect(),
        }
    }

    fn encoded() -> Vec<u8> {
        let mut buf = Vec::new();
        let written = encode_blob(&sample(), "0.1.0", &mut buf).unwrap();
        assert_eq!(written as usize, buf.len());
        buf
    }

    #[test]
    fn decode_what_was_encoded() {
        let buf = encoded();
        let state: State = decode_blob(&mut buf.as_slice(), "0.1.0").unwrap();
        assert_eq!(state, sample());
    }

    #[test]
    fn other_toolchain_rejected() {
        let buf = encoded();
        let err = decode_blob::<State>(&mut buf.as_slice(), "0.2.0").unwrap_err();
        assert!(matches!(err, CacheError::ToolchainMismatch { .. }));
    }

    #[test]
    fn corrupted_payload_rejected() {
        let mut buf = encoded();
        let last = buf.len() - 1;
        buf[last] ^= 0xff;
        let err = decode_blob::<State>(&mut buf.as_slice(), "0.1.0").unwrap_err();
        assert!(matches!(err, CacheError::ChecksumMismatch { .. }));
    }

    #[test]
    fn short_input_rejected() {
        let err = decode_blob::<State>(&mut [1u8, 2].as_slice(), "0.1.0").unwrap_err();
        assert!(matches!(err, CacheError::InvalidHeader { .. }));
    }

    #[test]
    fn truncated_header_rejected() {
        let buf = encoded();
        let err = decode_blob::<State>(&mut &buf[..6], "0.1.0").unwrap_err();
        assert!(matches!(err, CacheError::InvalidHeader { .. }));
    }

    #[test]
    fn wrong_magic_rejected() {
        let mut buf = encoded();
        // The header's first field is the magic array, right after the length prefix.
        buf[4] = b'X';
        let err = decode_blob::<State>(&mut buf.as_slice(), "0.1.0").unwrap_err();
        assert!(matches!(err, CacheError::InvalidHeader { .. }));
    }
}
