//! Wire format of a query context
//!
//! A context is a sequence of tagged items, all integers big-endian:
//!
//! | Tag | Payload |
//! |-----|---------|
//! | `0` MasterXid | xid (4) |
//! | `1` TablespaceLocation | length (4), tablespace oid (4), NUL-terminated template |
//! | `2` TupleType | length (4), relid (4), content id (4), tuple header (14), tuple data |
//! | `3` EmptyTable | relid (4) |
//!
//! The length field counts the bytes that follow it. A clean end of input
//! where a tag is expected ends the stream.

use crate::buffer::ContextBuffer;
use crate::error::{DistributedError, Result};
use crate::spill::TransactionContext;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use query_catalog::{HeapTuple, TUPLE_HEADER_SIZE};
use query_core::{ContentId, Oid, TransactionId};
use std::io::Cursor;

/// Bytes before the tuple header in a TupleType payload
const TUPLE_PREFIX_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ItemTag {
    MasterXid = 0,
    TablespaceLocation = 1,
    TupleType = 2,
    EmptyTable = 3,
}

/// How the payload following a tag is delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLayout {
    Fixed(usize),
    /// Preceded by a 4-byte length
    Variable,
}

impl ItemTag {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(ItemTag::MasterXid),
            1 => Ok(ItemTag::TablespaceLocation),
            2 => Ok(ItemTag::TupleType),
            3 => Ok(ItemTag::EmptyTable),
            other => Err(DistributedError::protocol(format!(
                "unrecognized query context item tag {}",
                other
            ))),
        }
    }

    pub fn layout(&self) -> PayloadLayout {
        match self {
            ItemTag::MasterXid | ItemTag::EmptyTable => PayloadLayout::Fixed(4),
            ItemTag::TablespaceLocation | ItemTag::TupleType => PayloadLayout::Variable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireItem {
    MasterXid(TransactionId),
    TablespaceLocation {
        tablespace: Oid,
        /// Location with a single `%d` standing for the segment index
        template: String,
    },
    Tuple {
        relid: Oid,
        content: ContentId,
        tuple: HeapTuple,
    },
    EmptyTable(Oid),
}

impl WireItem {
    pub fn tag(&self) -> ItemTag {
        match self {
            WireItem::MasterXid(_) => ItemTag::MasterXid,
            WireItem::TablespaceLocation { .. } => ItemTag::TablespaceLocation,
            WireItem::Tuple { .. } => ItemTag::TupleType,
            WireItem::EmptyTable(_) => ItemTag::EmptyTable,
        }
    }

    /// Append the encoded item to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_u8(self.tag() as u8)?;
        match self {
            WireItem::MasterXid(xid) => out.write_u32::<BigEndian>(*xid)?,
            WireItem::EmptyTable(relid) => out.write_u32::<BigEndian>(*relid)?,
            WireItem::TablespaceLocation {
                tablespace,
                template,
            } => {
                if template.as_bytes().contains(&0) {
                    return Err(DistributedError::protocol(
                        "tablespace location template contains a NUL byte",
                    ));
                }
                let len = 4 + template.len() + 1;
                out.write_u32::<BigEndian>(len as u32)?;
                out.write_u32::<BigEndian>(*tablespace)?;
                out.extend_from_slice(template.as_bytes());
                out.write_u8(0)?;
            }
            WireItem::Tuple {
                relid,
                content,
                tuple,
            } => {
                let len = TUPLE_PREFIX_SIZE + TUPLE_HEADER_SIZE + tuple.data.len();
                out.write_u32::<BigEndian>(len as u32)?;
                out.write_u32::<BigEndian>(*relid)?;
                out.write_i32::<BigEndian>(*content)?;
                out.extend_from_slice(&tuple.header.to_bytes());
                out.extend_from_slice(&tuple.data);
            }
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Decode the payload of an item whose tag has already been read. For
    /// variable items `payload` excludes the length field.
    pub fn decode_payload(tag: ItemTag, payload: &[u8]) -> Result<Self> {
        if let PayloadLayout::Fixed(n) = tag.layout() {
            if payload.len() != n {
                return Err(DistributedError::protocol(format!(
                    "{:?} payload must be {} bytes, got {}",
                    tag,
                    n,
                    payload.len()
                )));
            }
        }
        let mut r = Cursor::new(payload);
        match tag {
            ItemTag::MasterXid => Ok(WireItem::MasterXid(r.read_u32::<BigEndian>()?)),
            ItemTag::EmptyTable => Ok(WireItem::EmptyTable(r.read_u32::<BigEndian>()?)),
            ItemTag::TablespaceLocation => {
                if payload.len() < 5 {
                    return Err(DistributedError::protocol(format!(
                        "tablespace location payload too short: {} bytes",
                        payload.len()
                    )));
                }
                let tablespace = r.read_u32::<BigEndian>()?;
                let rest = &payload[4..];
                let nul = rest.iter().position(|b| *b == 0).ok_or_else(|| {
                    DistributedError::protocol("tablespace location template is not NUL-terminated")
                })?;
                if nul != rest.len() - 1 {
                    return Err(DistributedError::protocol(
                        "trailing bytes after tablespace location template",
                    ));
                }
                let template = std::str::from_utf8(&rest[..nul])
                    .map_err(|e| {
                        DistributedError::protocol(format!("tablespace location template: {}", e))
                    })?
                    .to_string();
                Ok(WireItem::TablespaceLocation {
                    tablespace,
                    template,
                })
            }
            ItemTag::TupleType => {
                if payload.len() < TUPLE_PREFIX_SIZE + TUPLE_HEADER_SIZE {
                    return Err(DistributedError::protocol(format!(
                        "tuple payload too short: {} bytes",
                        payload.len()
                    )));
                }
                let relid = r.read_u32::<BigEndian>()?;
                let content = r.read_i32::<BigEndian>()?;
                let header_end = TUPLE_PREFIX_SIZE + TUPLE_HEADER_SIZE;
                let tuple = HeapTuple::from_parts(
                    &payload[TUPLE_PREFIX_SIZE..header_end],
                    payload[header_end..].to_vec(),
                )
                .map_err(|e| DistributedError::protocol(format!("relation {}: {}", relid, e)))?;
                Ok(WireItem::Tuple {
                    relid,
                    content,
                    tuple,
                })
            }
        }
    }
}

/// Encode `item` and append it to `buffer`
pub fn write_item(
    buffer: &mut ContextBuffer,
    txn: &mut TransactionContext,
    item: &WireItem,
) -> Result<()> {
    buffer.write(&item.encode()?, txn)
}

/// Read one tag; `Ok(None)` at a clean end of stream
pub fn read_tag(buffer: &mut ContextBuffer) -> Result<Option<ItemTag>> {
    match buffer.read(1, false)? {
        None => Ok(None),
        Some(byte) => ItemTag::from_byte(byte[0]).map(Some),
    }
}

/// Read the payload for `layout`; any shortfall is a protocol error
pub fn read_payload(buffer: &mut ContextBuffer, layout: PayloadLayout) -> Result<Vec<u8>> {
    match layout {
        PayloadLayout::Fixed(n) => read_exact(buffer, n),
        PayloadLayout::Variable => {
            let len_bytes = read_exact(buffer, 4)?;
            let len = Cursor::new(&len_bytes).read_u32::<BigEndian>()?;
            if u64::from(len) > buffer.remaining() {
                return Err(DistributedError::protocol(format!(
                    "item length {} exceeds the {} bytes left in the query context",
                    len,
                    buffer.remaining()
                )));
            }
            read_exact(buffer, len as usize)
        }
    }
}

/// Read the next complete item; `Ok(None)` at a clean end of stream
pub fn read_item(buffer: &mut ContextBuffer) -> Result<Option<WireItem>> {
    let tag = match read_tag(buffer)? {
        Some(tag) => tag,
        None => return Ok(None),
    };
    let payload = read_payload(buffer, tag.layout())?;
    WireItem::decode_payload(tag, &payload).map(Some)
}

fn read_exact(buffer: &mut ContextBuffer, n: usize) -> Result<Vec<u8>> {
    match buffer.read(n, true) {
        Ok(Some(bytes)) => Ok(bytes),
        Ok(None) => Err(DistributedError::protocol("query context ended inside an item")),
        Err(DistributedError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(DistributedError::protocol(format!(
                "truncated query context item: {}",
                e
            )))
        }
        Err(e) => Err(e),
    }
}
