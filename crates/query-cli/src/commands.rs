use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{Cell, Color, Table as ComfyTable};
use query_catalog::CatalogMirror;
use query_distributed::{
    read_item, CatalogRebuilder, ContextBuffer, DispatchConfig, SendBackMessage, WireItem,
};
use query_core::MASTER_CONTENT_ID;
use std::path::Path;
use std::time::Instant;

/// One printable line of an inspected context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSummary {
    pub tag: &'static str,
    pub relid: String,
    pub content: String,
    pub detail: String,
}

impl ItemSummary {
    fn of(item: &WireItem) -> Self {
        match item {
            WireItem::MasterXid(xid) => Self {
                tag: "MasterXid",
                relid: String::new(),
                content: String::new(),
                detail: format!("xid {}", xid),
            },
            WireItem::TablespaceLocation {
                tablespace,
                template,
            } => Self {
                tag: "TablespaceLocation",
                relid: tablespace.to_string(),
                content: String::new(),
                detail: template.clone(),
            },
            WireItem::Tuple {
                relid,
                content,
                tuple,
            } => Self {
                tag: "Tuple",
                relid: relid.to_string(),
                content: if *content == MASTER_CONTENT_ID {
                    "all".to_string()
                } else {
                    content.to_string()
                },
                detail: match tuple.row() {
                    Ok(row) => format!("{} {} ({} bytes)", row.kind_name(), row.key(), tuple.len()),
                    Err(e) => format!("undecodable: {}", e),
                },
            },
            WireItem::EmptyTable(relid) => Self {
                tag: "EmptyTable",
                relid: relid.to_string(),
                content: String::new(),
                detail: "no rows".to_string(),
            },
        }
    }
}

/// Decode every item of a spilled context file
pub fn read_context(file: &Path) -> Result<Vec<WireItem>> {
    let mut buffer = ContextBuffer::open_shared(file)
        .with_context(|| format!("Failed to open query context {:?}", file))?;
    let mut items = Vec::new();
    while let Some(item) = read_item(&mut buffer)? {
        items.push(item);
    }
    buffer.drop_context()?;
    tracing::debug!("Decoded {} items from {:?}", items.len(), file);
    Ok(items)
}

pub fn inspect_context(file: &Path, segindex: Option<i32>, config: &DispatchConfig) -> Result<()> {
    let start = Instant::now();
    println!("{} Reading {:?}", "→".bright_blue(), file);

    let items = read_context(file)?;

    let mut table = ComfyTable::new();
    table.set_header(vec![
        Cell::new("#").fg(Color::Cyan),
        Cell::new("Item").fg(Color::Yellow),
        Cell::new("Relation").fg(Color::Green),
        Cell::new("Content").fg(Color::Magenta),
        Cell::new("Detail"),
    ]);
    for (i, item) in items.iter().enumerate() {
        let summary = ItemSummary::of(item);
        table.add_row(vec![
            i.to_string(),
            summary.tag.to_string(),
            summary.relid,
            summary.content,
            summary.detail,
        ]);
    }
    println!("{}", table);
    println!(
        "{} {} items in {:.2}ms",
        "✓".bright_green(),
        items.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    if let Some(segindex) = segindex {
        let mut mirror = CatalogMirror::new();
        let mut buffer = ContextBuffer::open_shared(file)?;
        let stats = CatalogRebuilder::new(&mut mirror, segindex)
            .with_debug_print_tuple(config.debug_print_tuple)
            .run(&mut buffer)?;
        buffer.drop_context()?;

        println!();
        println!(
            "{} segment {}: {} tuples accepted, {} discarded, {} empty tables",
            "Rebuilt for".bright_yellow(),
            segindex,
            stats.tuples_accepted,
            stats.tuples_discarded,
            stats.empty_tables
        );
        let mut tables = ComfyTable::new();
        tables.set_header(vec![
            Cell::new("Relation").fg(Color::Cyan),
            Cell::new("Tuples").fg(Color::Yellow),
        ]);
        for relid in mirror.table_ids() {
            let count = mirror.table(relid).map_or(0, |t| t.len());
            tables.add_row(vec![relid.to_string(), count.to_string()]);
        }
        println!("{}", tables);
    }

    Ok(())
}

pub fn decode_sendback(file: &Path) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read send-back message {:?}", file))?;
    let message = SendBackMessage::decode(&bytes)?;

    println!(
        "{} content {}, {} records",
        "Send-back from".bright_yellow(),
        message.content,
        message.records.len()
    );

    let mut table = ComfyTable::new();
    table.set_header(vec![
        Cell::new("Relation").fg(Color::Cyan),
        Cell::new("Segno").fg(Color::Yellow),
        Cell::new("Inserted").fg(Color::Green),
        Cell::new("Varblocks").fg(Color::Green),
        Cell::new("EOFs").fg(Color::Magenta),
        Cell::new("Next fastseq"),
    ]);
    for record in &message.records {
        let eofs: Vec<String> = record
            .eofs
            .iter()
            .map(|e| format!("{}/{}", e.eof, e.uncompressed_eof))
            .collect();
        table.add_row(vec![
            record.relid.to_string(),
            record.segno.to_string(),
            record.insert_count.to_string(),
            record.varblock_count.to_string(),
            eofs.join(", "),
            record.next_fast_sequence.to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}

pub fn write_default_config(path: &Path) -> Result<()> {
    DispatchConfig::default().save(path)?;
    println!("{} Wrote {:?}", "✓".bright_green(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_catalog::{CatalogRow, HeapTuple, ItemPointer, PgNamespace};
    use query_core::oids;
    use tempfile::TempDir;

    #[test]
    fn test_read_context_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ctx");
        let row = CatalogRow::Namespace(PgNamespace {
            oid: 16390,
            nspname: "sales".to_string(),
        });
        let items = vec![
            WireItem::MasterXid(3),
            WireItem::Tuple {
                relid: oids::PG_NAMESPACE,
                content: MASTER_CONTENT_ID,
                tuple: HeapTuple::form(oids::PG_NAMESPACE, ItemPointer::new(0, 1), &row).unwrap(),
            },
            WireItem::EmptyTable(16402),
        ];
        let mut bytes = Vec::new();
        for item in &items {
            item.encode_into(&mut bytes).unwrap();
        }
        std::fs::write(&path, bytes).unwrap();

        assert_eq!(read_context(&path).unwrap(), items);
        assert!(inspect_context(&path, Some(0), &DispatchConfig::default()).is_ok());
    }

    #[test]
    fn test_item_summary() {
        let summary = ItemSummary::of(&WireItem::TablespaceLocation {
            tablespace: 16385,
            template: "/data/seg%d".to_string(),
        });
        assert_eq!(summary.tag, "TablespaceLocation");
        assert_eq!(summary.relid, "16385");
        assert_eq!(summary.detail, "/data/seg%d");
    }

    #[test]
    fn test_default_config_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qctx.json");
        write_default_config(&path).unwrap();
        let config = DispatchConfig::from_file(&path).unwrap();
        assert_eq!(config.memory_limit_kb, 100 * 1024);
    }

    #[test]
    fn test_missing_file() {
        assert!(read_context(Path::new("/nonexistent/ctx")).is_err());
        assert!(decode_sendback(Path::new("/nonexistent/sendback")).is_err());
    }
}
