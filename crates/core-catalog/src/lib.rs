//! Memory-mapped star catalog shards.
//!
//! A catalog file is a 256-byte ASCII header followed by packed 33-byte star
//! records. The first 11 header bytes are the magic `BSRENDER_LE` or
//! `BSRENDER_BE`; the magic must match the host byte order because records
//! are read without swapping (both orders are produced offline by the
//! catalog builder).
//!
//! Shards are partitioned by Gaia parallax quality (parallax/error ≥ 100,
//! 50, 30, 20, 10, 5, 3, 2, 1, 0); a render opens every shard at or above
//! the configured minimum quality, plus one optional external (non-Gaia)
//! shard. Each worker receives a contiguous record range of every shard via
//! [`partition`].
//!
//! Invariants:
//! * every record read starts at `256 + 33*n` for `n < record_count`;
//! * a zero-length shard file is a valid empty shard, not an error;
//! * a shard with a wrong magic or a length not equal to `256 + 33*n` is
//!   fatal at open time — no partial renders from a damaged catalog.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use thiserror::Error;
use tracing::{debug, info};

mod record;

pub use record::{ExtinctionUndo, RECORD_SIZE, StarRecord};

pub const HEADER_SIZE: usize = 256;
pub const MAGIC_LE: &[u8; 11] = b"BSRENDER_LE";
pub const MAGIC_BE: &[u8; 11] = b"BSRENDER_BE";

/// Magic expected on this host.
#[cfg(target_endian = "little")]
pub const MAGIC_NATIVE: &[u8; 11] = MAGIC_LE;
#[cfg(target_endian = "big")]
pub const MAGIC_NATIVE: &[u8; 11] = MAGIC_BE;

#[cfg(target_endian = "little")]
const FILE_SUFFIX: &str = "le";
#[cfg(target_endian = "big")]
const FILE_SUFFIX: &str = "be";

/// Parallax-quality tiers, best first; shard files are named
/// `galaxy-pqNNN-le.bsr` (or `-be`).
pub const PARALLAX_QUALITY_TIERS: [u32; 10] = [100, 50, 30, 20, 10, 5, 3, 2, 1, 0];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not open catalog shard {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not map catalog shard {}: {source}", .path.display())]
    Map {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(
        "{} is not a catalog file in host byte order (expected magic {expected:?})",
        .path.display()
    )]
    BadMagic { path: PathBuf, expected: String },
    #[error(
        "{} is truncated: {len} bytes is smaller than the {HEADER_SIZE}-byte header",
        .path.display()
    )]
    TruncatedHeader { path: PathBuf, len: u64 },
    #[error(
        "{} record section is {len} bytes, not a multiple of {RECORD_SIZE}",
        .path.display()
    )]
    RaggedRecords { path: PathBuf, len: u64 },
}

/// One read-only memory-mapped shard. An empty shard holds no map at all.
#[derive(Debug)]
pub struct Shard {
    path: PathBuf,
    map: Option<Mmap>,
    record_count: u64,
}

impl Shard {
    /// Open and validate one shard file.
    pub fn open(path: &Path) -> Result<Shard, CatalogError> {
        let file = File::open(path).map_err(|source| CatalogError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let len = file
            .metadata()
            .map_err(|source| CatalogError::Open {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        if len == 0 {
            // a tier with no surviving stars writes an empty file
            debug!(path = %path.display(), "empty catalog shard");
            return Ok(Shard {
                path: path.to_path_buf(),
                map: None,
                record_count: 0,
            });
        }
        if len < HEADER_SIZE as u64 {
            return Err(CatalogError::TruncatedHeader {
                path: path.to_path_buf(),
                len,
            });
        }

        // Safety: the map is read-only and the catalog is never rewritten
        // while a render runs (offline builder, separate files per run).
        let map = unsafe { Mmap::map(&file) }.map_err(|source| CatalogError::Map {
            path: path.to_path_buf(),
            source,
        })?;

        if &map[..MAGIC_NATIVE.len()] != MAGIC_NATIVE {
            return Err(CatalogError::BadMagic {
                path: path.to_path_buf(),
                expected: String::from_utf8_lossy(MAGIC_NATIVE).into_owned(),
            });
        }
        let payload = len - HEADER_SIZE as u64;
        if payload % RECORD_SIZE as u64 != 0 {
            return Err(CatalogError::RaggedRecords {
                path: path.to_path_buf(),
                len: payload,
            });
        }

        let record_count = payload / RECORD_SIZE as u64;
        debug!(path = %path.display(), records = record_count, "mapped catalog shard");
        Ok(Shard {
            path: path.to_path_buf(),
            map: Some(map),
            record_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Iterate decoded records in `start..start + count` (clamped to the
    /// shard end).
    pub fn records(&self, start: u64, count: u64) -> RecordIter<'_> {
        let end = start.saturating_add(count).min(self.record_count);
        let start = start.min(self.record_count);
        RecordIter {
            shard: self,
            next: start,
            end,
        }
    }

    #[inline]
    fn record_at(&self, index: u64) -> StarRecord {
        debug_assert!(index < self.record_count);
        // record_count > 0 implies the map exists
        let map = self.map.as_ref().unwrap();
        let offset = HEADER_SIZE + index as usize * RECORD_SIZE;
        let bytes: &[u8; RECORD_SIZE] = map[offset..offset + RECORD_SIZE].try_into().unwrap();
        StarRecord::decode(bytes)
    }
}

pub struct RecordIter<'a> {
    shard: &'a Shard,
    next: u64,
    end: u64,
}

impl Iterator for RecordIter<'_> {
    type Item = StarRecord;

    #[inline]
    fn next(&mut self) -> Option<StarRecord> {
        if self.next >= self.end {
            return None;
        }
        let record = self.shard.record_at(self.next);
        self.next += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

/// Contiguous per-worker slice of a shard: `count = ceil(total/workers)`,
/// `start = min(worker * count, total)`. The last worker's range is clamped
/// at the shard end.
pub fn partition(total: u64, workers: u32, worker: u32) -> (u64, u64) {
    debug_assert!(worker < workers.max(1));
    if total == 0 {
        return (0, 0);
    }
    let workers = workers.max(1) as u64;
    let count = total.div_ceil(workers).max(1);
    let start = (worker as u64 * count).min(total);
    (start, count.min(total - start))
}

/// The set of shards a render reads.
#[derive(Debug, Default)]
pub struct ShardSet {
    shards: Vec<Shard>,
}

impl ShardSet {
    /// Open every Gaia shard at or above `min_parallax_quality` (when Gaia
    /// input is enabled) and the external shard (when enabled) from
    /// `data_dir`. Any missing or invalid shard aborts the open.
    pub fn open(
        data_dir: &Path,
        gaia_enable: bool,
        min_parallax_quality: u32,
        external_enable: bool,
    ) -> Result<ShardSet, CatalogError> {
        let mut shards = Vec::new();
        if external_enable {
            shards.push(Shard::open(
                &data_dir.join(format!("external-{FILE_SUFFIX}.bsr")),
            )?);
        }
        if gaia_enable {
            for tier in PARALLAX_QUALITY_TIERS {
                if tier < min_parallax_quality {
                    break;
                }
                shards.push(Shard::open(
                    &data_dir.join(format!("galaxy-pq{tier:03}-{FILE_SUFFIX}.bsr")),
                )?);
            }
        }
        let total: u64 = shards.iter().map(Shard::record_count).sum();
        info!(
            shards = shards.len(),
            stars = total,
            dir = %data_dir.display(),
            "opened catalog"
        );
        Ok(ShardSet { shards })
    }

    pub fn from_shards(shards: Vec<Shard>) -> ShardSet {
        ShardSet { shards }
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub fn total_records(&self) -> u64 {
        self.shards.iter().map(Shard::record_count).sum()
    }
}

/// Build a well-formed shard file in memory: header plus packed records.
/// The offline catalog builder owns production files; this exists for
/// fixtures and the external-shard tooling.
pub fn build_shard_bytes(records: &[StarRecord]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_SIZE + records.len() * RECORD_SIZE);
    bytes.extend_from_slice(MAGIC_NATIVE);
    let note = format!(" skyrender catalog, {} records", records.len());
    bytes.extend_from_slice(note.as_bytes());
    bytes.resize(HEADER_SIZE, b' ');
    for record in records {
        bytes.extend_from_slice(&record.encode());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn star(id: u64, x: f64) -> StarRecord {
        StarRecord {
            source_id: id,
            icrs_x: x,
            icrs_y: 0.5,
            icrs_z: -2.0,
            linear_1pc_intensity: 1.0,
            linear_1pc_intensity_undimmed: 1.0,
            color_temperature: 5800,
            color_temperature_unreddened: 5800,
        }
    }

    fn write_shard(records: &[StarRecord]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&build_shard_bytes(records)).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn open_reads_back_records() {
        let records: Vec<_> = (0..7).map(|i| star(i, i as f64)).collect();
        let file = write_shard(&records);
        let shard = Shard::open(file.path()).unwrap();
        assert_eq!(shard.record_count(), 7);
        let read: Vec<_> = shard.records(0, 7).collect();
        assert_eq!(read, records);
    }

    #[test]
    fn zero_length_shard_is_empty() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let shard = Shard::open(file.path()).unwrap();
        assert_eq!(shard.record_count(), 0);
        assert_eq!(shard.records(0, 10).count(), 0);
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut bytes = build_shard_bytes(&[star(1, 1.0)]);
        bytes[0..11].copy_from_slice(b"NOT_A_MAGIC");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        assert!(matches!(
            Shard::open(file.path()),
            Err(CatalogError::BadMagic { .. })
        ));
    }

    #[test]
    fn short_header_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"BSRENDER_LE too short").unwrap();
        assert!(matches!(
            Shard::open(file.path()),
            Err(CatalogError::TruncatedHeader { .. })
        ));
    }

    #[test]
    fn ragged_record_section_is_fatal() {
        let mut bytes = build_shard_bytes(&[star(1, 1.0)]);
        bytes.push(0);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        assert!(matches!(
            Shard::open(file.path()),
            Err(CatalogError::RaggedRecords { .. })
        ));
    }

    #[test]
    fn partition_covers_every_record_exactly_once() {
        for total in [0u64, 1, 5, 16, 17, 1000] {
            for workers in [1u32, 2, 3, 7, 16, 40] {
                let mut covered = 0;
                let mut next_start = 0;
                for w in 0..workers {
                    let (start, count) = partition(total, workers, w);
                    assert!(start >= next_start || count == 0);
                    if count > 0 {
                        assert_eq!(start, next_start);
                        next_start = start + count;
                    }
                    covered += count;
                }
                assert_eq!(covered, total, "total {total} workers {workers}");
            }
        }
    }

    #[test]
    fn partition_is_balanced() {
        let (start, count) = partition(100, 3, 0);
        assert_eq!((start, count), (0, 34));
        let (start, count) = partition(100, 3, 1);
        assert_eq!((start, count), (34, 34));
        let (start, count) = partition(100, 3, 2);
        assert_eq!((start, count), (68, 32));
    }
}
