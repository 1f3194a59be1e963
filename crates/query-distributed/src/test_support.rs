//! Catalog fixtures shared by the unit tests

use crate::buffer::ContextBuffer;
use crate::codec::{read_item, WireItem};
use crate::collector::CatalogCollector;
use crate::error::Result;
use crate::spill::TransactionContext;
use query_catalog::*;
use query_core::oids;
use query_core::{ContentId, Oid, RelKind, RelStorage, TypType};
use query_planner::Expr;

pub const SALES_NAMESPACE: Oid = 16390;
pub const SALES_TABLESPACE: Oid = 16385;
pub const ORDERS: Oid = 16400;
pub const ORDERS_SEGREL: Oid = 16402;
pub const ADDRESS: Oid = 16410;
pub const ORDERS_SEQ: Oid = 16420;

pub const PARTITION_PARENT: Oid = 16500;
pub const PARTITION_LEAVES: [Oid; 3] = [16510, 16520, 16530];

/// Row type of every fixture relation
pub fn row_type(relid: Oid) -> Oid {
    relid + 1000
}

pub fn partition_segrel(relid: Oid) -> Oid {
    relid + 2
}

fn class(
    oid: Oid,
    name: &str,
    namespace: Oid,
    relkind: RelKind,
    storage: RelStorage,
    natts: i16,
) -> PgClass {
    PgClass {
        oid,
        relname: name.to_string(),
        relnamespace: namespace,
        reltype: row_type(oid),
        relowner: 10,
        reltablespace: 0,
        reltoastrelid: 0,
        relkind,
        relstorage: storage,
        relnatts: natts,
    }
}

fn add_relation(
    catalog: &MemoryCatalog,
    oid: Oid,
    name: &str,
    namespace: Oid,
    relkind: RelKind,
    storage: RelStorage,
    attrs: &[(&str, Oid)],
) {
    catalog
        .insert(CatalogRow::Class(class(
            oid,
            name,
            namespace,
            relkind,
            storage,
            attrs.len() as i16,
        )))
        .unwrap();
    catalog
        .insert(CatalogRow::Type(PgType {
            oid: row_type(oid),
            typname: name.to_string(),
            typnamespace: namespace,
            typtype: TypType::Composite,
            typrelid: oid,
        }))
        .unwrap();
    for (i, (attname, atttypid)) in attrs.iter().enumerate() {
        catalog
            .insert(CatalogRow::Attribute(PgAttribute {
                attrelid: oid,
                attname: attname.to_string(),
                atttypid: *atttypid,
                attnum: i as i16 + 1,
            }))
            .unwrap();
    }
}

/// Ordinary relation in the sales namespace
pub fn add_plain_relation(
    catalog: &MemoryCatalog,
    oid: Oid,
    name: &str,
    storage: RelStorage,
    attrs: &[(&str, Oid)],
) {
    add_relation(
        catalog,
        oid,
        name,
        SALES_NAMESPACE,
        RelKind::Relation,
        storage,
        attrs,
    );
}

/// Append-optimized relation with its pg_appendonly entry and empty segment-file relation
pub fn add_ao_relation(
    catalog: &MemoryCatalog,
    oid: Oid,
    name: &str,
    storage: RelStorage,
    attrs: &[(&str, Oid)],
) -> Oid {
    add_plain_relation(catalog, oid, name, storage, attrs);
    let segrelid = partition_segrel(oid);
    catalog
        .insert(CatalogRow::AppendOnly(PgAppendOnly {
            relid: oid,
            segrelid,
            segidxid: segrelid + 1,
            blocksize: 32768,
            compresstype: None,
            columnstore: storage == RelStorage::AoCols,
        }))
        .unwrap();
    add_relation(
        catalog,
        segrelid,
        &format!("pg_aoseg_{}", oid),
        oids::PG_AOSEGMENT_NAMESPACE,
        RelKind::AoSegments,
        RelStorage::Heap,
        &[("segno", 23)],
    );
    catalog.create_table(segrelid);
    segrelid
}

pub fn add_segment_file(catalog: &MemoryCatalog, segrelid: Oid, segno: i32, content: ContentId) {
    catalog
        .insert_into(
            segrelid,
            CatalogRow::AoSegFile(AoSegFile {
                segno,
                content,
                tupcount: 100,
                varblockcount: 4,
                eofs: vec![FileEof::new(4096, 8192)],
            }),
        )
        .unwrap();
}

pub fn add_fast_sequence(catalog: &MemoryCatalog, segrelid: Oid, segno: i32, content: ContentId) {
    catalog
        .insert(CatalogRow::FastSequence(FastSequence {
            objid: segrelid,
            objmod: segno as i64,
            last_sequence: 100,
            contentid: content,
        }))
        .unwrap();
}

pub fn add_external_definition(catalog: &MemoryCatalog, relid: Oid) {
    catalog
        .insert(CatalogRow::ExtTable(PgExtTable {
            reloid: relid,
            location: vec!["gpfdist://etl:8080/orders.csv".to_string()],
            fmttype: 't',
            command: None,
        }))
        .unwrap();
}

/// Rewrite the pg_class row of `relid`
pub fn set_class(catalog: &MemoryCatalog, relid: Oid, f: impl FnOnce(&mut PgClass)) {
    let (_, mut row) = catalog.relation(relid).unwrap();
    f(&mut row);
    catalog
        .upsert(oids::PG_CLASS, CatalogRow::Class(row), &|r: &CatalogRow| {
            r.as_class().map_or(false, |c| c.oid == relid)
        })
        .unwrap();
}

/// An append-optimized `orders` table with a composite-typed column, a
/// sequence default and a check constraint.
pub fn populate_scenario(catalog: &MemoryCatalog) {
    catalog
        .insert(CatalogRow::Namespace(PgNamespace {
            oid: SALES_NAMESPACE,
            nspname: "sales".to_string(),
        }))
        .unwrap();
    catalog.add_tablespace(SALES_TABLESPACE, "/data/fs/seg");

    add_plain_relation(catalog, ADDRESS, "address", RelStorage::Virtual, &[("street", 25)]);
    set_class(catalog, ADDRESS, |c| c.relkind = RelKind::CompositeType);

    add_relation(
        catalog,
        ORDERS_SEQ,
        "orders_id_seq",
        SALES_NAMESPACE,
        RelKind::Sequence,
        RelStorage::Heap,
        &[],
    );

    add_ao_relation(
        catalog,
        ORDERS,
        "orders",
        RelStorage::AoRows,
        &[("id", 20), ("ship_to", row_type(ADDRESS))],
    );
    catalog
        .insert(CatalogRow::AttrDef(PgAttrDef {
            adrelid: ORDERS,
            adnum: 1,
            adbin: Expr::nextval(Expr::regclass(ORDERS_SEQ)),
        }))
        .unwrap();
    catalog
        .insert(CatalogRow::Constraint(PgConstraint {
            oid: 16405,
            conname: "orders_id_check".to_string(),
            conrelid: ORDERS,
            contype: 'c',
            consrc: "(id > 0)".to_string(),
        }))
        .unwrap();
    add_fast_sequence(catalog, ORDERS_SEGREL, 1, 0);
    add_fast_sequence(catalog, ORDERS_SEGREL, 1, 1);
}

pub fn scenario_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new().with_default_tablespace(SALES_TABLESPACE);
    populate_scenario(&catalog);
    catalog
}

/// Partitioned append-optimized table with three leaves
pub fn partitioned_catalog() -> MemoryCatalog {
    let catalog = scenario_catalog();
    add_ao_relation(&catalog, PARTITION_PARENT, "events", RelStorage::AoRows, &[("id", 20)]);
    for (i, leaf) in PARTITION_LEAVES.iter().enumerate() {
        let segrel = add_ao_relation(
            &catalog,
            *leaf,
            &format!("events_1_prt_{}", i + 1),
            RelStorage::AoCols,
            &[("id", 20)],
        );
        add_fast_sequence(&catalog, segrel, i as i32 + 1, 0);
    }
    catalog.add_inheritance(PARTITION_PARENT, &PARTITION_LEAVES);
    catalog
}

/// Run `f` against a fresh in-memory context and decode what it wrote
pub fn collect<F>(catalog: &MemoryCatalog, f: F) -> Result<Vec<WireItem>>
where
    F: FnOnce(&mut CatalogCollector<'_>) -> Result<()>,
{
    let mut buffer = ContextBuffer::from_bytes(Vec::new());
    let mut txn = TransactionContext::new(1);
    {
        let mut collector = CatalogCollector::new(catalog, catalog, &mut buffer, &mut txn);
        f(&mut collector)?;
    }
    let mut items = Vec::new();
    while let Some(item) = read_item(&mut buffer)? {
        items.push(item);
    }
    Ok(items)
}

/// Short label for order assertions
pub fn describe(item: &WireItem) -> String {
    match item {
        WireItem::MasterXid(xid) => format!("xid {}", xid),
        WireItem::TablespaceLocation {
            tablespace,
            template,
        } => format!("tablespace {} {}", tablespace, template),
        WireItem::EmptyTable(relid) => format!("empty {}", relid),
        WireItem::Tuple { content, tuple, .. } => {
            let row = tuple.row().unwrap();
            match &row {
                CatalogRow::FastSequence(seq) => {
                    format!("gp_fastsequence {} content {}", seq.objid, content)
                }
                CatalogRow::AoSegFile(seg) => {
                    format!("pg_aoseg {} content {}", seg.segno, content)
                }
                other => format!("{} {}", other.kind_name(), other.key()),
            }
        }
    }
}
