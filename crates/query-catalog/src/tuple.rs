//! Raw tuple form shipped in a dispatched context
//!
//! A tuple is a fixed 14-byte header followed by the encoded [`CatalogRow`].
//! Header layout, big-endian: data length (4), item pointer block (4), item
//! pointer offset (2), owning table oid (4).

use crate::rows::CatalogRow;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use query_core::{Oid, QueryError, Result};
use std::io::Cursor;

pub const TUPLE_HEADER_SIZE: usize = 14;

/// Physical location of a tuple within its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ItemPointer {
    pub block: u32,
    pub offset: u16,
}

impl ItemPointer {
    pub fn new(block: u32, offset: u16) -> Self {
        Self { block, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleHeader {
    pub t_len: u32,
    pub ctid: ItemPointer,
    pub table_oid: Oid,
}

impl TupleHeader {
    pub fn to_bytes(&self) -> [u8; TUPLE_HEADER_SIZE] {
        let mut out = [0u8; TUPLE_HEADER_SIZE];
        let mut w = &mut out[..];
        // Writing into a fixed array of the exact size cannot fail
        let _ = w.write_u32::<BigEndian>(self.t_len);
        let _ = w.write_u32::<BigEndian>(self.ctid.block);
        let _ = w.write_u16::<BigEndian>(self.ctid.offset);
        let _ = w.write_u32::<BigEndian>(self.table_oid);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TUPLE_HEADER_SIZE {
            return Err(QueryError::SerializationError(format!(
                "tuple header must be {} bytes, got {}",
                TUPLE_HEADER_SIZE,
                bytes.len()
            )));
        }
        let mut r = Cursor::new(bytes);
        let t_len = r.read_u32::<BigEndian>()?;
        let block = r.read_u32::<BigEndian>()?;
        let offset = r.read_u16::<BigEndian>()?;
        let table_oid = r.read_u32::<BigEndian>()?;
        Ok(Self {
            t_len,
            ctid: ItemPointer::new(block, offset),
            table_oid,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapTuple {
    pub header: TupleHeader,
    pub data: Vec<u8>,
}

impl HeapTuple {
    /// Form a tuple for `row` stored in `table_oid` at `ctid`
    pub fn form(table_oid: Oid, ctid: ItemPointer, row: &CatalogRow) -> Result<Self> {
        let data = row.encode()?;
        Ok(Self {
            header: TupleHeader {
                t_len: data.len() as u32,
                ctid,
                table_oid,
            },
            data,
        })
    }

    /// Reassemble a tuple from its shipped parts, checking the length field
    pub fn from_parts(header: &[u8], data: Vec<u8>) -> Result<Self> {
        let header = TupleHeader::from_bytes(header)?;
        if header.t_len as usize != data.len() {
            return Err(QueryError::SerializationError(format!(
                "tuple header length {} does not match data length {}",
                header.t_len,
                data.len()
            )));
        }
        Ok(Self { header, data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self) -> Result<CatalogRow> {
        CatalogRow::decode(&self.data)
    }
}
