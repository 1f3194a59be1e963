//! Worker to coordinator reporting of append-optimized storage growth
//!
//! Message layout (big-endian):
//!
//! ```text
//! 'h' | len: u32 (includes itself) | content: i32 | count: u32 | record*
//! record = relid: u32 | insert_count: i64 | segno: i32 | varblock_count: i64
//!        | nfiles: u32 | (eof: i64, uncompressed_eof: i64)* | next_fast_sequence: i64
//! ```

use crate::error::{DistributedError, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use query_catalog::{AoSegFile, CatalogRow, CatalogSource, CatalogStore, FastSequence, FileEof};
use query_core::{oids, ContentId, Oid, RelStorage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Message type byte of a send-back envelope
pub const SENDBACK_MESSAGE_TYPE: u8 = b'h';

/// Storage facts for one relation written by one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBackRecord {
    pub relid: Oid,
    pub segno: i32,
    pub insert_count: i64,
    pub varblock_count: i64,
    /// One pair per physical file, in file order
    pub eofs: Vec<FileEof>,
    pub next_fast_sequence: i64,
}

impl SendBackRecord {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_u32::<BigEndian>(self.relid)?;
        out.write_i64::<BigEndian>(self.insert_count)?;
        out.write_i32::<BigEndian>(self.segno)?;
        out.write_i64::<BigEndian>(self.varblock_count)?;
        out.write_u32::<BigEndian>(self.eofs.len() as u32)?;
        for eof in &self.eofs {
            out.write_i64::<BigEndian>(eof.eof)?;
            out.write_i64::<BigEndian>(eof.uncompressed_eof)?;
        }
        out.write_i64::<BigEndian>(self.next_fast_sequence)?;
        Ok(())
    }

    fn decode_from(r: &mut Cursor<&[u8]>) -> Result<Self> {
        let relid = r.read_u32::<BigEndian>()?;
        let insert_count = r.read_i64::<BigEndian>()?;
        let segno = r.read_i32::<BigEndian>()?;
        let varblock_count = r.read_i64::<BigEndian>()?;
        let nfiles = r.read_u32::<BigEndian>()? as usize;
        let remaining = r.get_ref().len() - r.position() as usize;
        if nfiles.saturating_mul(16) > remaining {
            return Err(DistributedError::protocol(format!(
                "send-back record for relation {} declares {} files but only {} bytes remain",
                relid, nfiles, remaining
            )));
        }
        let mut eofs = Vec::with_capacity(nfiles);
        for _ in 0..nfiles {
            let eof = r.read_i64::<BigEndian>()?;
            let uncompressed_eof = r.read_i64::<BigEndian>()?;
            eofs.push(FileEof::new(eof, uncompressed_eof));
        }
        let next_fast_sequence = r.read_i64::<BigEndian>()?;
        Ok(Self {
            relid,
            segno,
            insert_count,
            varblock_count,
            eofs,
            next_fast_sequence,
        })
    }
}

/// A decoded send-back message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBackMessage {
    pub content: ContentId,
    pub records: Vec<SendBackRecord>,
}

impl SendBackMessage {
    /// Decode a complete enveloped message
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::decode_inner(bytes).map_err(|e| match e {
            DistributedError::IoError(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                DistributedError::protocol(format!("truncated send-back message: {}", io))
            }
            other => other,
        })
    }

    fn decode_inner(bytes: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(bytes);
        let kind = r.read_u8()?;
        if kind != SENDBACK_MESSAGE_TYPE {
            return Err(DistributedError::protocol(format!(
                "unexpected send-back message type {:#04x}",
                kind
            )));
        }
        let len = r.read_u32::<BigEndian>()? as usize;
        if len != bytes.len() - 1 {
            return Err(DistributedError::protocol(format!(
                "send-back message length {} does not match {} received bytes",
                len,
                bytes.len() - 1
            )));
        }
        let content = r.read_i32::<BigEndian>()?;
        let count = r.read_u32::<BigEndian>()?;
        let mut records = Vec::new();
        for _ in 0..count {
            records.push(SendBackRecord::decode_from(&mut r)?);
        }
        if (r.position() as usize) != bytes.len() {
            return Err(DistributedError::protocol(format!(
                "{} trailing bytes after send-back records",
                bytes.len() - r.position() as usize
            )));
        }
        Ok(Self { content, records })
    }
}

/// Accumulates one worker's send-back message
#[derive(Debug)]
pub struct SendBackBuilder {
    buf: Vec<u8>,
    declared: u32,
    added: u32,
}

/// Start a message for `count` records from segment `content`
pub fn pre_sendback_changed_catalog(content: ContentId, count: u32) -> SendBackBuilder {
    let mut buf = Vec::with_capacity(13);
    buf.push(SENDBACK_MESSAGE_TYPE);
    buf.extend_from_slice(&[0; 4]);
    buf.extend_from_slice(&content.to_be_bytes());
    buf.extend_from_slice(&count.to_be_bytes());
    SendBackBuilder {
        buf,
        declared: count,
        added: 0,
    }
}

impl SendBackBuilder {
    pub fn add_sendback_changed_catalog_content(&mut self, record: &SendBackRecord) -> Result<()> {
        if self.added == self.declared {
            return Err(DistributedError::protocol(format!(
                "send-back message declared {} records",
                self.declared
            )));
        }
        record.encode_into(&mut self.buf)?;
        self.added += 1;
        Ok(())
    }

    /// Seal the envelope and return the wire bytes
    pub fn finish_sendback_changed_catalog(mut self) -> Result<Vec<u8>> {
        if self.added != self.declared {
            return Err(DistributedError::protocol(format!(
                "send-back message declared {} records but {} were added",
                self.declared, self.added
            )));
        }
        let len = (self.buf.len() - 1) as u32;
        self.buf[1..5].copy_from_slice(&len.to_be_bytes());
        Ok(self.buf)
    }
}

/// Commit one worker's record into the authoritative catalog
pub fn update_catalog_modified_on_segments<S: CatalogStore + ?Sized>(
    store: &S,
    content: ContentId,
    record: &SendBackRecord,
) -> Result<()> {
    let appendonly = store
        .lookup(oids::PG_APPENDONLY, record.relid)
        .and_then(|t| t.row.as_appendonly().cloned())
        .ok_or_else(|| {
            DistributedError::catalog(format!(
                "no pg_appendonly entry for relation {}",
                record.relid
            ))
        })?;
    let (_, class) = store.relation(record.relid)?;

    match class.relstorage {
        RelStorage::AoCols => {
            if record.eofs.len() != class.relnatts as usize {
                return Err(DistributedError::catalog(format!(
                    "relation {} has {} columns but {} file offsets were reported",
                    record.relid,
                    class.relnatts,
                    record.eofs.len()
                )));
            }
        }
        RelStorage::AoRows => {
            if record.eofs.len() != 1 {
                return Err(DistributedError::catalog(format!(
                    "row-oriented relation {} reported {} file offsets",
                    record.relid,
                    record.eofs.len()
                )));
            }
        }
        other => {
            return Err(DistributedError::catalog(format!(
                "relation {} with storage '{}' is not append-optimized",
                record.relid,
                other.as_char()
            )))
        }
    }

    let segrelid = appendonly.segrelid;
    let segno = record.segno;
    let current = store
        .scan_all(segrelid)
        .into_iter()
        .filter_map(|t| t.row.as_aoseg().cloned())
        .find(|s| s.segno == segno && s.content == content);
    let (tupcount, varblockcount) = current
        .map(|s| (s.tupcount, s.varblockcount))
        .unwrap_or((0, 0));
    let segfile = AoSegFile {
        segno,
        content,
        tupcount: tupcount + record.insert_count,
        varblockcount: varblockcount + record.varblock_count,
        eofs: record.eofs.clone(),
    };
    store.upsert(segrelid, CatalogRow::AoSegFile(segfile), &|row: &CatalogRow| {
        row.as_aoseg()
            .map_or(false, |s| s.segno == segno && s.content == content)
    })?;

    let matches_sequence = |s: &FastSequence| {
        s.objid == segrelid && s.objmod == segno as i64 && s.contentid == content
    };
    let last_sequence = store
        .scan(oids::GP_FASTSEQUENCE, segrelid)
        .into_iter()
        .filter_map(|t| t.row.as_fast_sequence().cloned())
        .find(|s| matches_sequence(s))
        .map_or(record.next_fast_sequence, |s| {
            s.last_sequence.max(record.next_fast_sequence)
        });
    store.upsert(
        oids::GP_FASTSEQUENCE,
        CatalogRow::FastSequence(FastSequence {
            objid: segrelid,
            objmod: segno as i64,
            last_sequence,
            contentid: content,
        }),
        &|row: &CatalogRow| row.as_fast_sequence().map_or(false, matches_sequence),
    )?;

    tracing::debug!(
        "Committed segment file {} of relation {} for content {}: +{} tuples",
        segno,
        record.relid,
        content,
        record.insert_count
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn record(relid: Oid, files: usize) -> SendBackRecord {
        SendBackRecord {
            relid,
            segno: 1,
            insert_count: 100,
            varblock_count: 4,
            eofs: (0..files)
                .map(|i| FileEof::new(1000 + i as i64, 2000 + i as i64))
                .collect(),
            next_fast_sequence: 101,
        }
    }

    fn build(content: ContentId, records: &[SendBackRecord]) -> Vec<u8> {
        let mut builder = pre_sendback_changed_catalog(content, records.len() as u32);
        for r in records {
            builder.add_sendback_changed_catalog_content(r).unwrap();
        }
        builder.finish_sendback_changed_catalog().unwrap()
    }

    #[test]
    fn test_four_file_round_trip() {
        let rec = record(16510, 4);
        let bytes = build(2, &[rec.clone()]);

        // 'h' + len + content + count + fixed record part + 4 pairs
        assert_eq!(bytes.len(), 1 + 4 + 4 + 4 + (4 + 8 + 4 + 8 + 4 + 8) + 4 * 16);
        assert_eq!(bytes[0], b'h');
        assert_eq!(
            u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize,
            bytes.len() - 1
        );

        let message = SendBackMessage::decode(&bytes).unwrap();
        assert_eq!(message.content, 2);
        assert_eq!(message.records, vec![rec]);
        let eofs: Vec<i64> = message.records[0].eofs.iter().map(|e| e.eof).collect();
        assert_eq!(eofs, vec![1000, 1001, 1002, 1003]);
    }

    #[test]
    fn test_empty_message() {
        let bytes = build(0, &[]);
        let message = SendBackMessage::decode(&bytes).unwrap();
        assert!(message.records.is_empty());
    }

    #[test]
    fn test_count_mismatch() {
        let builder = pre_sendback_changed_catalog(0, 2);
        assert!(builder
            .finish_sendback_changed_catalog()
            .unwrap_err()
            .is_protocol_error());

        let mut builder = pre_sendback_changed_catalog(0, 1);
        builder
            .add_sendback_changed_catalog_content(&record(1, 1))
            .unwrap();
        assert!(builder
            .add_sendback_changed_catalog_content(&record(2, 1))
            .unwrap_err()
            .is_protocol_error());
    }

    #[test]
    fn test_malformed_messages() {
        let bytes = build(0, &[record(16400, 1)]);

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(SendBackMessage::decode(&trailing)
            .unwrap_err()
            .is_protocol_error());

        for cut in [0, 3, bytes.len() - 1] {
            let err = SendBackMessage::decode(&bytes[..cut]).unwrap_err();
            assert!(err.is_protocol_error(), "cut at {}", cut);
        }

        let mut wrong_type = bytes;
        wrong_type[0] = b'D';
        assert!(SendBackMessage::decode(&wrong_type)
            .unwrap_err()
            .is_protocol_error());
    }

    #[test]
    fn test_commit_row_storage() {
        let catalog = scenario_catalog();
        add_segment_file(&catalog, ORDERS_SEGREL, 1, 0);

        let rec = record(ORDERS, 1);
        update_catalog_modified_on_segments(&catalog, 0, &rec).unwrap();
        update_catalog_modified_on_segments(&catalog, 0, &rec).unwrap();

        let segfiles: Vec<AoSegFile> = catalog
            .scan_all(ORDERS_SEGREL)
            .into_iter()
            .filter_map(|t| t.row.as_aoseg().cloned())
            .filter(|s| s.content == 0 && s.segno == 1)
            .collect();
        assert_eq!(segfiles.len(), 1);
        assert_eq!(segfiles[0].tupcount, 100 + 200);
        assert_eq!(segfiles[0].varblockcount, 4 + 8);
        assert_eq!(segfiles[0].eofs, rec.eofs);

        let sequences: Vec<FastSequence> = catalog
            .scan(oids::GP_FASTSEQUENCE, ORDERS_SEGREL)
            .into_iter()
            .filter_map(|t| t.row.as_fast_sequence().cloned())
            .filter(|s| s.objmod == 1 && s.contentid == 0)
            .collect();
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].last_sequence, 101);
    }

    #[test]
    fn test_commit_creates_missing_rows() {
        let catalog = scenario_catalog();
        update_catalog_modified_on_segments(&catalog, 3, &record(ORDERS, 1)).unwrap();

        let segfile = catalog
            .scan_all(ORDERS_SEGREL)
            .into_iter()
            .filter_map(|t| t.row.as_aoseg().cloned())
            .find(|s| s.content == 3)
            .unwrap();
        assert_eq!(segfile.tupcount, 100);
        assert_eq!(segfile.varblockcount, 4);
        assert!(catalog
            .scan(oids::GP_FASTSEQUENCE, ORDERS_SEGREL)
            .iter()
            .any(|t| t.row.as_fast_sequence().map(|s| s.contentid) == Some(3)));
    }

    #[test]
    fn test_fast_sequence_never_moves_backwards() {
        let catalog = scenario_catalog();
        let mut rec = record(ORDERS, 1);
        rec.next_fast_sequence = 500;
        update_catalog_modified_on_segments(&catalog, 0, &rec).unwrap();
        rec.next_fast_sequence = 200;
        update_catalog_modified_on_segments(&catalog, 0, &rec).unwrap();

        let last = catalog
            .scan(oids::GP_FASTSEQUENCE, ORDERS_SEGREL)
            .into_iter()
            .filter_map(|t| t.row.as_fast_sequence().cloned())
            .find(|s| s.objmod == 1 && s.contentid == 0)
            .map(|s| s.last_sequence);
        assert_eq!(last, Some(500));
    }

    #[test]
    fn test_commit_column_storage_checks_file_count() {
        let catalog = partitioned_catalog();
        let leaf = PARTITION_LEAVES[0];
        let (_, class) = catalog.relation(leaf).unwrap();
        let natts = class.relnatts as usize;

        update_catalog_modified_on_segments(&catalog, 0, &record(leaf, natts)).unwrap();
        let err = update_catalog_modified_on_segments(&catalog, 0, &record(leaf, natts + 1))
            .unwrap_err();
        assert!(err.is_catalog_inconsistency());
    }

    #[test]
    fn test_commit_rejects_bad_relations() {
        let catalog = scenario_catalog();

        let err = update_catalog_modified_on_segments(&catalog, 0, &record(ORDERS, 2)).unwrap_err();
        assert!(err.is_catalog_inconsistency());

        // no pg_appendonly row
        let err =
            update_catalog_modified_on_segments(&catalog, 0, &record(ORDERS_SEQ, 1)).unwrap_err();
        assert!(err.is_catalog_inconsistency());
    }
}
