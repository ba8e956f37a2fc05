//! Commit log framing and replay.
//!
//! The store's durability format is a sequence of framed commits:
//!
//! ```text
//! magic "TLOG" (4) | version u16 (2) | len u32 (4) | payload | crc32 (4)
//! ```
//!
//! The payload is the CBOR encoding of a [`LogCommit`] - a whole
//! multi-table batch. The CRC covers everything before it. A commit is
//! therefore applied in full or not at all; replay discards a torn frame
//! at the tail (a crash mid-append) but treats interior damage as
//! corruption.

use crate::backend::StorageBackend;
use crate::error::{StoreError, StoreResult};
use crate::table::TableId;
use serde::{Deserialize, Serialize};

/// Magic bytes identifying a commit frame.
pub const LOG_MAGIC: [u8; 4] = *b"TLOG";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// Header size: magic (4) + version (2) + length (4).
const HEADER_SIZE: usize = 10;

/// CRC size.
const CRC_SIZE: usize = 4;

/// A single operation inside a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOp {
    /// Insert or replace a value.
    Put {
        /// Target table.
        table: TableId,
        /// Row key.
        key: [u8; 16],
        /// Row value.
        value: Vec<u8>,
    },
    /// Remove a value.
    Delete {
        /// Target table.
        table: TableId,
        /// Row key.
        key: [u8; 16],
    },
}

impl LogOp {
    /// Returns the table this operation targets.
    #[must_use]
    pub fn table(&self) -> TableId {
        match self {
            Self::Put { table, .. } | Self::Delete { table, .. } => *table,
        }
    }

    /// Returns the key this operation targets.
    #[must_use]
    pub fn key(&self) -> [u8; 16] {
        match self {
            Self::Put { key, .. } | Self::Delete { key, .. } => *key,
        }
    }
}

/// One committed batch of operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCommit {
    /// Commit sequence, assigned in append order.
    pub seq: u64,
    /// Operations in the batch.
    pub ops: Vec<LogOp>,
}

/// Encodes a commit into a complete frame ready to append.
pub fn encode_frame(commit: &LogCommit) -> StoreResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::ser::into_writer(commit, &mut payload)
        .map_err(|e| StoreError::Codec(e.to_string()))?;

    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::Codec("commit payload too large".into()))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    frame.extend_from_slice(&LOG_MAGIC);
    frame.extend_from_slice(&LOG_VERSION.to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);

    let crc = compute_crc32(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());

    Ok(frame)
}

/// The result of replaying a commit log.
#[derive(Debug)]
pub struct Replay {
    /// All complete commits, in append order.
    pub commits: Vec<LogCommit>,
    /// Length of the valid prefix. Bytes past this are a torn tail.
    pub valid_len: u64,
}

/// Replays all complete commits from a backend.
///
/// Stops cleanly at a torn frame at the tail (incomplete header, frame
/// extending past the end, or a CRC mismatch on the final frame). Damage
/// anywhere before the tail is a [`StoreError::Corrupted`].
pub fn replay(backend: &dyn StorageBackend) -> StoreResult<Replay> {
    let size = backend.size()?;
    let mut commits = Vec::new();
    let mut offset = 0u64;

    while offset < size {
        if offset + HEADER_SIZE as u64 > size {
            // Torn header at the tail
            break;
        }

        let header = backend.read_at(offset, HEADER_SIZE)?;

        if header[0..4] != LOG_MAGIC {
            return Err(StoreError::corrupted(offset, "bad frame magic"));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != LOG_VERSION {
            return Err(StoreError::corrupted(
                offset,
                format!("unsupported log version {version}"),
            ));
        }

        let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as u64;
        let frame_end = offset + HEADER_SIZE as u64 + len + CRC_SIZE as u64;

        if frame_end > size {
            // Torn payload at the tail
            break;
        }

        let body = backend.read_at(offset, (frame_end - offset) as usize)?;
        let (framed, crc_bytes) = body.split_at(body.len() - CRC_SIZE);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        if compute_crc32(framed) != stored_crc {
            if frame_end == size {
                // Torn CRC at the tail
                break;
            }
            return Err(StoreError::corrupted(offset, "frame checksum mismatch"));
        }

        let commit: LogCommit = ciborium::de::from_reader(&framed[HEADER_SIZE..])
            .map_err(|e| StoreError::corrupted(offset, format!("undecodable commit: {e}")))?;

        commits.push(commit);
        offset = frame_end;
    }

    Ok(Replay {
        commits,
        valid_len: offset,
    })
}

/// Computes CRC32 (IEEE polynomial) of the given data.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;

    fn sample_commit(seq: u64) -> LogCommit {
        LogCommit {
            seq,
            ops: vec![
                LogOp::Put {
                    table: TableId::new(1),
                    key: [seq as u8; 16],
                    value: vec![1, 2, 3],
                },
                LogOp::Delete {
                    table: TableId::new(2),
                    key: [0xAB; 16],
                },
            ],
        }
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0x0000_0000);
    }

    #[test]
    fn frame_roundtrip() {
        let mut backend = InMemoryBackend::new();

        for seq in 1..=3 {
            let frame = encode_frame(&sample_commit(seq)).unwrap();
            backend.append(&frame).unwrap();
        }

        let replay = replay(&backend).unwrap();
        assert_eq!(replay.commits.len(), 3);
        assert_eq!(replay.commits[0], sample_commit(1));
        assert_eq!(replay.commits[2].seq, 3);
        assert_eq!(replay.valid_len, backend.size().unwrap());
    }

    #[test]
    fn empty_log_replays_to_nothing() {
        let backend = InMemoryBackend::new();
        let replay = replay(&backend).unwrap();
        assert!(replay.commits.is_empty());
        assert_eq!(replay.valid_len, 0);
    }

    #[test]
    fn torn_tail_is_discarded() {
        let mut backend = InMemoryBackend::new();
        let frame1 = encode_frame(&sample_commit(1)).unwrap();
        let frame2 = encode_frame(&sample_commit(2)).unwrap();
        backend.append(&frame1).unwrap();
        // Only half of the second frame makes it to disk
        backend.append(&frame2[..frame2.len() / 2]).unwrap();

        let replay = replay(&backend).unwrap();
        assert_eq!(replay.commits.len(), 1);
        assert_eq!(replay.valid_len, frame1.len() as u64);
    }

    #[test]
    fn torn_crc_at_tail_is_discarded() {
        let mut backend = InMemoryBackend::new();
        let frame = encode_frame(&sample_commit(1)).unwrap();
        // Frame body is complete but the CRC bytes are garbage
        let mut broken = frame.clone();
        let n = broken.len();
        broken[n - 1] ^= 0xFF;
        backend.append(&broken).unwrap();

        let replay = replay(&backend).unwrap();
        assert!(replay.commits.is_empty());
        assert_eq!(replay.valid_len, 0);
    }

    #[test]
    fn interior_corruption_is_an_error() {
        let mut backend = InMemoryBackend::new();
        let mut frame1 = encode_frame(&sample_commit(1)).unwrap();
        let frame2 = encode_frame(&sample_commit(2)).unwrap();
        // Flip a payload byte in the first frame
        frame1[HEADER_SIZE + 1] ^= 0xFF;
        backend.append(&frame1).unwrap();
        backend.append(&frame2).unwrap();

        assert!(matches!(
            replay(&backend),
            Err(StoreError::Corrupted { offset: 0, .. })
        ));
    }

    #[test]
    fn bad_magic_is_an_error() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"NOPE______").unwrap();

        assert!(matches!(
            replay(&backend),
            Err(StoreError::Corrupted { .. })
        ));
    }
}
