//! Coordinator-side catalog collection
//!
//! A [`CatalogCollector`] walks the relations, range table and plan of one
//! statement and writes every catalog fact a worker needs into a
//! [`ContextBuffer`]. Each relation, namespace and tablespace is written at
//! most once per collector.
//!
//! Per relation the stream carries, in order: the pg_class tuple, its
//! namespace, its tablespace location, backing relations of composite-typed
//! columns, the pg_type tuple, pg_attribute tuples, each pg_attrdef tuple
//! followed by whatever its expression references, pg_constraint tuples and
//! finally the storage-specific catalog rows.

use crate::buffer::ContextBuffer;
use crate::codec::{write_item, WireItem};
use crate::error::{DistributedError, Result};
use crate::spill::TransactionContext;
use ahash::{AHashMap, AHashSet};
use query_catalog::{
    CatalogRow, CatalogSource, CoordinatorCatalog, HeapTuple, PgClass, PrivilegeChecker,
};
use query_core::oids::{self, NEXTVAL_FUNC, REGCLASS_TYPE};
use query_core::{
    is_builtin_object, AclMode, ContentId, ObjectKind, Oid, QueryError, RelStorage, TypType,
    INVALID_OID, MASTER_CONTENT_ID,
};
use query_planner::{Datum, Expr, Plan, RangeTblEntry, TargetEntry};

/// Segment file each relation of an insert writes to
pub type SegnoMap = AHashMap<Oid, i32>;

/// Dedupe key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub oid: Oid,
    pub kind: ObjectKind,
}

/// Counters for one collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub relations: usize,
    pub namespaces: usize,
    pub tablespaces: usize,
    pub tuples: usize,
    pub empty_tables: usize,
}

/// Walks plans and range tables, writing every catalog row the workers need
pub struct CatalogCollector<'a> {
    /// Coordinator catalog the rows are read from
    catalog: &'a dyn CoordinatorCatalog,
    /// Checked before any sequence is shipped
    privileges: &'a dyn PrivilegeChecker,
    /// Destination of the encoded items
    buffer: &'a mut ContextBuffer,
    /// Owns the spill file if the buffer outgrows memory
    txn: &'a mut TransactionContext,
    /// Objects already written, so each ships once
    dispatched: AHashSet<DispatchKey>,
    /// Counters for what was written
    stats: CollectStats,
    /// Log every dispatched object
    debug_print: bool,
    /// Also log the decoded tuples
    debug_print_tuple: bool,
}

/// Turn the content-0 location of a tablespace into a per-segment template
pub fn tablespace_template(location: &str) -> Result<String> {
    location
        .strip_suffix('0')
        .map(|prefix| format!("{}%d", prefix))
        .ok_or_else(|| {
            DistributedError::catalog(format!(
                "tablespace location \"{}\" does not end with segment index 0",
                location
            ))
        })
}

impl<'a> CatalogCollector<'a> {
    /// Create a collector writing into `buffer`
    pub fn new(
        catalog: &'a dyn CoordinatorCatalog,
        privileges: &'a dyn PrivilegeChecker,
        buffer: &'a mut ContextBuffer,
        txn: &'a mut TransactionContext,
    ) -> Self {
        Self {
            catalog,
            privileges,
            buffer,
            txn,
            dispatched: AHashSet::new(),
            stats: CollectStats::default(),
            debug_print: false,
            debug_print_tuple: false,
        }
    }

    /// Enable debug logging of dispatched objects and tuples
    pub fn with_debug(mut self, debug_print: bool, debug_print_tuple: bool) -> Self {
        self.debug_print = debug_print;
        self.debug_print_tuple = debug_print_tuple;
        self
    }

    pub fn stats(&self) -> &CollectStats {
        &self.stats
    }

    /// Whether `oid` of `kind` has been written in this collection
    pub fn is_dispatched(&self, oid: Oid, kind: ObjectKind) -> bool {
        self.dispatched.contains(&DispatchKey { oid, kind })
    }

    /// Walk a range table
    pub fn prepare_dispatched_catalog(&mut self, rtable: &[RangeTblEntry]) -> Result<()> {
        for rte in rtable {
            match rte {
                RangeTblEntry::Relation { relid } => {
                    self.prepare_dispatched_catalog_relation(*relid, false, None)?
                }
                RangeTblEntry::Function { funcexpr } => self.prepare_function_expr(funcexpr)?,
                RangeTblEntry::Subquery { subquery } => {
                    self.prepare_dispatched_catalog(&subquery.rtable)?;
                    self.prepare_dispatched_catalog_targets(&subquery.target_list)?;
                }
                RangeTblEntry::Values { values_lists } => {
                    for expr in values_lists.iter().flatten() {
                        self.prepare_function_expr(expr)?;
                    }
                }
                RangeTblEntry::Join | RangeTblEntry::Void => {}
                RangeTblEntry::Special
                | RangeTblEntry::Cte { .. }
                | RangeTblEntry::TableFunction { .. } => {
                    return Err(DistributedError::not_implemented(format!(
                        "{} in range table",
                        rte.kind_name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Walk the target lists of a plan tree
    pub fn prepare_dispatched_catalog_plan(&mut self, plan: &Plan) -> Result<()> {
        self.prepare_dispatched_catalog_targets(&plan.target_list)?;
        if let Some(left) = &plan.lefttree {
            self.prepare_dispatched_catalog_plan(left)?;
        }
        if let Some(right) = &plan.righttree {
            self.prepare_dispatched_catalog_plan(right)?;
        }
        Ok(())
    }

    /// Walk a target list, skipping junk entries
    pub fn prepare_dispatched_catalog_targets(&mut self, targets: &[TargetEntry]) -> Result<()> {
        for te in targets.iter().filter(|te| !te.resjunk) {
            self.prepare_function_expr(&te.expr)?;
        }
        Ok(())
    }

    /// Dispatch a relation and, when partitioned, every inheritor.
    ///
    /// On insert each append-optimized member must have an entry in
    /// `segno_map`. A partitioned parent without an entry goes through the
    /// read path.
    pub fn prepare_dispatched_catalog_relation(
        &mut self,
        relid: Oid,
        for_insert: bool,
        segno_map: Option<&SegnoMap>,
    ) -> Result<()> {
        let members = self.catalog.inheritors(relid);
        let partitioned = self.catalog.is_partitioned(relid);

        if !for_insert || (segno_map.is_none() && !partitioned) {
            for member in members {
                self.prepare_dispatched_catalog_single_relation(member, false, 0)?;
            }
            return Ok(());
        }

        let empty = SegnoMap::new();
        let map = segno_map.unwrap_or(&empty);
        for member in members {
            match map.get(&member) {
                Some(segno) => {
                    self.prepare_dispatched_catalog_single_relation(member, true, *segno)?
                }
                None if partitioned && member == relid => {
                    self.prepare_dispatched_catalog_single_relation(member, false, 0)?
                }
                None => {
                    let (_, class) = self.catalog.relation(member)?;
                    if class.relstorage.is_append_optimized() {
                        return Err(DistributedError::catalog(format!(
                            "no segment file assigned to relation \"{}\" ({})",
                            class.relname, member
                        )));
                    }
                    self.prepare_dispatched_catalog_single_relation(member, false, 0)?;
                }
            }
        }
        Ok(())
    }

    /// Dispatch one relation and everything it depends on
    pub fn prepare_dispatched_catalog_single_relation(
        &mut self,
        relid: Oid,
        for_insert: bool,
        segno: i32,
    ) -> Result<()> {
        if relid == INVALID_OID {
            return Err(DistributedError::catalog("invalid relation id"));
        }
        if is_builtin_object(relid) {
            return Ok(());
        }
        if !self.mark(relid, ObjectKind::Relation) {
            return Ok(());
        }

        let (classtuple, class) = self.catalog.relation(relid)?;
        if self.debug_print {
            tracing::debug!(
                "Query context: prepare relid = {}, relname = {}, relnamespace = {}, relkind = {:?}",
                relid,
                class.relname,
                class.relnamespace,
                class.relkind
            );
        }
        self.stats.relations += 1;
        self.add_tuple(oids::PG_CLASS, &classtuple.tuple, MASTER_CONTENT_ID)?;

        if class.relnamespace == INVALID_OID {
            return Err(DistributedError::catalog(format!(
                "relnamespace field in pg_class of {} is invalid",
                relid
            )));
        }
        self.prepare_namespace(class.relnamespace)?;

        if class.reltoastrelid != INVALID_OID {
            return Err(DistributedError::not_implemented(format!(
                "toast relation {} of relation \"{}\"",
                class.reltoastrelid, class.relname
            )));
        }

        let tablespace =
            if class.reltablespace == INVALID_OID && class.relstorage.is_append_optimized() {
                self.catalog.database_default_tablespace()
            } else {
                class.reltablespace
            };
        self.prepare_tablespace(tablespace)?;

        let attributes = self.catalog.scan(oids::PG_ATTRIBUTE, relid);
        for attr in attributes.iter().filter_map(|t| t.row.as_attribute()) {
            if attr.attnum > 0 && attr.atttypid != INVALID_OID {
                self.prepare_composite_type(attr.atttypid)?;
            }
        }
        self.prepare_type_by_relation(&class)?;
        for attr in &attributes {
            self.add_tuple(oids::PG_ATTRIBUTE, &attr.tuple, MASTER_CONTENT_ID)?;
        }

        for def in self.catalog.scan(oids::PG_ATTRDEF, relid) {
            self.add_tuple(oids::PG_ATTRDEF, &def.tuple, MASTER_CONTENT_ID)?;
            if let Some(attrdef) = def.row.as_attrdef() {
                self.prepare_function_expr(&attrdef.adbin)?;
            }
        }

        for con in self.catalog.scan(oids::PG_CONSTRAINT, relid) {
            self.add_tuple(oids::PG_CONSTRAINT, &con.tuple, MASTER_CONTENT_ID)?;
        }

        match class.relstorage {
            RelStorage::AoRows | RelStorage::AoCols => {
                self.prepare_append_only(&class, for_insert, segno)
            }
            RelStorage::External => self.prepare_external_table(&class),
            RelStorage::Heap | RelStorage::Virtual => Ok(()),
            RelStorage::Foreign => Err(DistributedError::not_implemented(format!(
                "relstorage {} of relation \"{}\"",
                class.relstorage.as_char(),
                class.relname
            ))),
        }
    }

    /// Record a dispatch; false if already recorded
    fn mark(&mut self, oid: Oid, kind: ObjectKind) -> bool {
        self.dispatched.insert(DispatchKey { oid, kind })
    }

    fn write(&mut self, item: &WireItem) -> Result<()> {
        write_item(self.buffer, self.txn, item)
    }

    fn add_tuple(&mut self, relid: Oid, tuple: &HeapTuple, content: ContentId) -> Result<()> {
        let item = WireItem::Tuple {
            relid,
            content,
            tuple: tuple.clone(),
        };
        self.write(&item)?;
        self.stats.tuples += 1;
        if self.debug_print_tuple {
            tracing::debug!(
                "Query context: tuple for relation {}, content {}, {} bytes",
                relid,
                content,
                tuple.len()
            );
        }
        Ok(())
    }

    fn prepare_namespace(&mut self, namespace: Oid) -> Result<()> {
        if oids::is_builtin_namespace(namespace) {
            return Ok(());
        }
        if !self.mark(namespace, ObjectKind::Namespace) {
            return Ok(());
        }
        let tuple = self
            .catalog
            .lookup(oids::PG_NAMESPACE, namespace)
            .ok_or_else(|| QueryError::cache_lookup_failed("namespace", namespace))?;
        self.stats.namespaces += 1;
        self.add_tuple(oids::PG_NAMESPACE, &tuple.tuple, MASTER_CONTENT_ID)
    }

    fn prepare_tablespace(&mut self, tablespace: Oid) -> Result<()> {
        if tablespace == INVALID_OID || oids::is_builtin_tablespace(tablespace) {
            return Ok(());
        }
        if !self.mark(tablespace, ObjectKind::Tablespace) {
            return Ok(());
        }
        // Content 0 stands in for every segment; the coordinator's own
        // location does not follow the per-segment pattern.
        let location = self
            .catalog
            .tablespace_location(tablespace, 0)
            .ok_or_else(|| QueryError::cache_lookup_failed("tablespace", tablespace))?;
        let template = tablespace_template(&location)?;
        self.stats.tablespaces += 1;
        self.write(&WireItem::TablespaceLocation {
            tablespace,
            template,
        })
    }

    fn prepare_composite_type(&mut self, typeid: Oid) -> Result<()> {
        let typrelid = match self.catalog.lookup(oids::PG_TYPE, typeid) {
            Some(tuple) => match tuple.row.as_type() {
                Some(t) if t.typtype == TypType::Composite => t.typrelid,
                _ => return Ok(()),
            },
            None => return Ok(()),
        };
        self.prepare_dispatched_catalog_single_relation(typrelid, false, 0)
    }

    fn prepare_type_by_relation(&mut self, class: &PgClass) -> Result<()> {
        if class.reltype == INVALID_OID {
            return Err(DistributedError::catalog(format!(
                "reltype in pg_class for {} is invalid",
                class.oid
            )));
        }
        let tuple = self
            .catalog
            .lookup(oids::PG_TYPE, class.reltype)
            .ok_or_else(|| QueryError::cache_lookup_failed("type", class.reltype))?;
        self.add_tuple(oids::PG_TYPE, &tuple.tuple, MASTER_CONTENT_ID)
    }

    fn prepare_function_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::FuncExpr {
                funcid: NEXTVAL_FUNC,
                args,
                ..
            } => match args.first() {
                Some(Expr::Const {
                    consttype: REGCLASS_TYPE,
                    value: Datum::Oid(seqoid),
                }) => self.prepare_sequence(*seqoid),
                _ => Err(DistributedError::not_implemented(
                    "non-constant argument to nextval",
                )),
            },
            other => {
                for child in other.children() {
                    self.prepare_function_expr(child)?;
                }
                Ok(())
            }
        }
    }

    /// Workers do not check privileges, so the sequence update check
    /// happens here before the sequence is dispatched.
    fn prepare_sequence(&mut self, seqoid: Oid) -> Result<()> {
        let user = self.catalog.current_user();
        if !self.privileges.has_privilege(user, seqoid, AclMode::Update) {
            let name = self
                .catalog
                .relation(seqoid)
                .map(|(_, class)| class.relname)
                .unwrap_or_else(|_| seqoid.to_string());
            return Err(QueryError::PrivilegeError(format!(
                "permission denied for sequence {}",
                name
            ))
            .into());
        }
        self.prepare_dispatched_catalog_single_relation(seqoid, false, 0)
    }

    fn prepare_append_only(&mut self, class: &PgClass, for_insert: bool, segno: i32) -> Result<()> {
        let tuple = self
            .catalog
            .lookup(oids::PG_APPENDONLY, class.oid)
            .ok_or_else(|| {
                DistributedError::catalog(format!(
                    "missing pg_appendonly entry for relation \"{}\"",
                    class.relname
                ))
            })?;
        self.add_tuple(oids::PG_APPENDONLY, &tuple.tuple, MASTER_CONTENT_ID)?;

        let segrelid = match &tuple.row {
            CatalogRow::AppendOnly(ao) if ao.segrelid != INVALID_OID => ao.segrelid,
            _ => {
                return Err(DistributedError::catalog(format!(
                    "invalid pg_appendonly entry for relation \"{}\"",
                    class.relname
                )))
            }
        };
        if self.debug_print {
            tracing::debug!(
                "Query context: prepare pg_appendonly for rel = {}, segrelid = {}",
                class.oid,
                segrelid
            );
        }

        self.prepare_dispatched_catalog_single_relation(segrelid, false, 0)?;
        self.prepare_segment_files(segrelid, for_insert, segno)?;
        if for_insert {
            self.prepare_fast_sequence(segrelid, segno)?;
        }
        Ok(())
    }

    fn prepare_segment_files(&mut self, segrelid: Oid, for_insert: bool, segno: i32) -> Result<()> {
        let rows = if for_insert {
            let key = u32::try_from(segno).map_err(|_| {
                DistributedError::catalog(format!(
                    "invalid segment number {} for segment file relation {}",
                    segno, segrelid
                ))
            })?;
            self.catalog.scan(segrelid, key)
        } else {
            self.catalog.scan_all(segrelid)
        };

        if rows.is_empty() {
            self.stats.empty_tables += 1;
            return self.write(&WireItem::EmptyTable(segrelid));
        }
        for row in rows {
            let content = row.row.as_aoseg().map(|s| s.content).ok_or_else(|| {
                DistributedError::catalog(format!(
                    "segment file relation {} holds a {} row",
                    segrelid,
                    row.row.kind_name()
                ))
            })?;
            self.add_tuple(segrelid, &row.tuple, content)?;
        }
        Ok(())
    }

    fn prepare_fast_sequence(&mut self, segrelid: Oid, segno: i32) -> Result<()> {
        for tuple in self.catalog.scan(oids::GP_FASTSEQUENCE, segrelid) {
            if let Some(seq) = tuple.row.as_fast_sequence() {
                if seq.objmod == segno as i64 {
                    self.add_tuple(oids::GP_FASTSEQUENCE, &tuple.tuple, seq.contentid)?;
                }
            }
        }
        Ok(())
    }

    fn prepare_external_table(&mut self, class: &PgClass) -> Result<()> {
        let tuple = self
            .catalog
            .lookup(oids::PG_EXTTABLE, class.oid)
            .ok_or_else(|| {
                DistributedError::catalog(format!(
                    "missing pg_exttable entry for relation \"{}\"",
                    class.relname
                ))
            })?;
        self.add_tuple(oids::PG_EXTTABLE, &tuple.tuple, MASTER_CONTENT_ID)
    }
}
