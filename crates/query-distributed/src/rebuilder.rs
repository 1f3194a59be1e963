//! Worker-side rebuild of a query context
//!
//! [`CatalogRebuilder`] drives an explicit state machine over the stream:
//!
//! ```text
//! AwaitingTag --tag--> DecodingFixedPayload | DecodingVariablePayload --payload--> AwaitingTag
//! AwaitingTag --clean end of stream--> Done
//! ```
//!
//! Tuples addressed to another segment are discarded without touching the
//! mirror.

use crate::buffer::ContextBuffer;
use crate::codec::{read_payload, read_tag, ItemTag, PayloadLayout, WireItem};
use crate::error::{DistributedError, Result};
use query_catalog::{CatalogMirror, HeapTuple};
use query_core::{ContentId, Oid, MASTER_CONTENT_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildState {
    AwaitingTag,
    DecodingFixedPayload { tag: ItemTag, len: usize },
    DecodingVariablePayload { tag: ItemTag },
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub items: usize,
    pub tablespaces: usize,
    pub tuples_accepted: usize,
    pub tuples_discarded: usize,
    pub empty_tables: usize,
}

/// Fill the single `%d` of a tablespace template with `segindex`
pub fn format_location(template: &str, segindex: ContentId) -> Result<String> {
    let parts: Vec<&str> = template.split("%d").collect();
    if parts.len() != 2 {
        return Err(DistributedError::protocol(format!(
            "tablespace location template \"{}\" must contain exactly one %d",
            template
        )));
    }
    Ok(format!("{}{}{}", parts[0], segindex, parts[1]))
}

pub struct CatalogRebuilder<'a> {
    mirror: &'a mut CatalogMirror,
    segindex: ContentId,
    state: RebuildState,
    stats: RebuildStats,
    debug_print_tuple: bool,
}

impl<'a> CatalogRebuilder<'a> {
    pub fn new(mirror: &'a mut CatalogMirror, segindex: ContentId) -> Self {
        Self {
            mirror,
            segindex,
            state: RebuildState::AwaitingTag,
            stats: RebuildStats::default(),
            debug_print_tuple: false,
        }
    }

    pub fn with_debug_print_tuple(mut self, enabled: bool) -> Self {
        self.debug_print_tuple = enabled;
        self
    }

    pub fn state(&self) -> RebuildState {
        self.state
    }

    /// Advance the state machine by one transition
    pub fn step(&mut self, buffer: &mut ContextBuffer) -> Result<RebuildState> {
        self.state = match self.state {
            RebuildState::AwaitingTag => match read_tag(buffer)? {
                None => RebuildState::Done,
                Some(tag) => match tag.layout() {
                    PayloadLayout::Fixed(len) => RebuildState::DecodingFixedPayload { tag, len },
                    PayloadLayout::Variable => RebuildState::DecodingVariablePayload { tag },
                },
            },
            RebuildState::DecodingFixedPayload { tag, len } => {
                let payload = read_payload(buffer, PayloadLayout::Fixed(len))?;
                self.apply(WireItem::decode_payload(tag, &payload)?)?;
                RebuildState::AwaitingTag
            }
            RebuildState::DecodingVariablePayload { tag } => {
                let payload = read_payload(buffer, PayloadLayout::Variable)?;
                self.apply(WireItem::decode_payload(tag, &payload)?)?;
                RebuildState::AwaitingTag
            }
            RebuildState::Done => RebuildState::Done,
        };
        Ok(self.state)
    }

    /// Consume the whole stream
    pub fn run(mut self, buffer: &mut ContextBuffer) -> Result<RebuildStats> {
        while self.step(buffer)? != RebuildState::Done {}
        Ok(self.stats)
    }

    fn apply(&mut self, item: WireItem) -> Result<()> {
        self.stats.items += 1;
        match item {
            WireItem::MasterXid(xid) => {
                self.mirror.set_master_xid(xid);
                Ok(())
            }
            WireItem::TablespaceLocation {
                tablespace,
                template,
            } => {
                let path = format_location(&template, self.segindex)?;
                tracing::debug!("Bound tablespace {} to {}", tablespace, path);
                self.mirror.bind_tablespace(tablespace, path);
                self.stats.tablespaces += 1;
                Ok(())
            }
            WireItem::Tuple {
                relid,
                content,
                tuple,
            } => self.rebuild_tuple(relid, content, tuple),
            WireItem::EmptyTable(relid) => {
                if !self.mirror.create_empty_table(relid) {
                    return Err(DistributedError::protocol(format!(
                        "empty table marker for relation {} which is already materialized",
                        relid
                    )));
                }
                self.stats.empty_tables += 1;
                Ok(())
            }
        }
    }

    fn rebuild_tuple(&mut self, relid: Oid, content: ContentId, tuple: HeapTuple) -> Result<()> {
        if content != MASTER_CONTENT_ID && content != self.segindex {
            self.stats.tuples_discarded += 1;
            return Ok(());
        }
        if self.debug_print_tuple {
            tracing::debug!(
                "Rebuilt tuple for relation {}, content {}, {} bytes",
                relid,
                content,
                tuple.len()
            );
        }
        self.mirror
            .insert_tuple(relid, tuple)
            .map_err(|e| DistributedError::protocol(format!("relation {}: {}", relid, e)))?;
        self.stats.tuples_accepted += 1;
        Ok(())
    }
}
