//! Catalog fetchers
//!
//! One query per object kind. Multi-row records (routine parameters, index
//! key columns, constraint columns, trigger events) arrive as flat rows and
//! are grouped here in query order.

mod queries;

use futures::TryFutureExt;
use indexmap::IndexMap;
use std::hash::Hash;
use std::sync::Arc;
use zqlz_core::{
    ColumnInfo, ConstraintInfo, ConstraintType, FunctionInfo, FunctionKind, IndexInfo,
    MetadataSource, ParameterInfo, ProcedureInfo, QueryParam, Result, Row, TableInfo,
    TriggerEvent, TriggerInfo, Value, ViewInfo,
};

use crate::error::{CacheError, CacheResult};
use crate::hash::HashOracle;
use crate::key::{ConnectionKey, ObjectKey};
use crate::model::{CachedSchema, ObjectMap};

use queries::*;

/// Columns, indexes and constraints of one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableDetails {
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
    pub constraints: Vec<ConstraintInfo>,
}

fn filter_value(value: Option<&str>) -> Value {
    value.map_or(Value::Null, Value::from)
}

fn object_params(schema: Option<&str>, name: Option<&str>) -> [QueryParam; 2] {
    [
        QueryParam::new("schema", filter_value(schema)),
        QueryParam::new("name", filter_value(name)),
    ]
}

fn table_params(schema: Option<&str>, table: Option<&str>) -> [QueryParam; 2] {
    [
        QueryParam::new("schema", filter_value(schema)),
        QueryParam::new("table", filter_value(table)),
    ]
}

/// Group rows by `key`, keeping first-seen order of groups and of rows
/// within each group
fn group_rows<'r, K, F>(rows: &'r [Row], key: F) -> IndexMap<K, Vec<&'r Row>>
where
    K: Hash + Eq,
    F: Fn(&Row) -> K,
{
    let mut groups: IndexMap<K, Vec<&Row>> = IndexMap::new();
    for row in rows {
        groups.entry(key(row)).or_default().push(row);
    }
    groups
}

fn object_key(row: &Row) -> ObjectKey {
    ObjectKey::new(
        &row.string_or_empty("schema_name"),
        &row.string_or_empty("object_name"),
    )
}

fn table_key(row: &Row) -> ObjectKey {
    ObjectKey::new(
        &row.string_or_empty("schema_name"),
        &row.string_or_empty("table_name"),
    )
}

fn keyed<T>(items: Vec<T>, key: impl Fn(&T) -> ObjectKey) -> ObjectMap<T> {
    items.into_iter().map(|item| (key(&item), item)).collect()
}

fn by_table<T>(items: Vec<T>, key: impl Fn(&T) -> ObjectKey) -> ObjectMap<Vec<T>> {
    let mut map: ObjectMap<Vec<T>> = ObjectMap::new();
    for item in items {
        map.entry(key(&item)).or_default().push(item);
    }
    map
}

fn table_from_row(row: &Row) -> TableInfo {
    TableInfo {
        schema: row.string_or_empty("schema_name"),
        name: row.string_or_empty("object_name"),
        object_id: row.i64("object_id").unwrap_or(0),
        create_date: row.string("create_date"),
        modify_date: row.string("modify_date"),
    }
}

fn column_from_row(row: &Row) -> ColumnInfo {
    ColumnInfo {
        schema: row.string_or_empty("schema_name"),
        table: row.string_or_empty("table_name"),
        name: row.string_or_empty("column_name"),
        ordinal: row.i64("ordinal").unwrap_or(0),
        data_type: row.string_or_empty("data_type"),
        max_length: row.i64("max_length"),
        precision: row.i64("precision"),
        scale: row.i64("scale"),
        nullable: row.flag("is_nullable"),
        is_identity: row.flag("is_identity"),
        is_computed: row.flag("is_computed"),
        default_value: row.string("default_value"),
        is_primary_key: row.flag("is_primary_key"),
    }
}

fn view_from_row(row: &Row) -> ViewInfo {
    ViewInfo {
        schema: row.string_or_empty("schema_name"),
        name: row.string_or_empty("object_name"),
        object_id: row.i64("object_id").unwrap_or(0),
        modify_date: row.string("modify_date"),
    }
}

/// Parameters carried on routine rows; a routine without parameters comes
/// back as a single row with NULL parameter columns
fn parameters_from_rows(rows: &[&Row]) -> Vec<ParameterInfo> {
    rows.iter()
        .filter_map(|row| {
            let name = row.string("parameter_name")?;
            Some(ParameterInfo {
                name,
                data_type: row.string_or_empty("parameter_type"),
                ordinal: row.i64("parameter_ordinal").unwrap_or(0),
                is_output: row.flag("parameter_is_output"),
            })
        })
        .collect()
}

fn procedures_from_rows(rows: &[Row]) -> Vec<ProcedureInfo> {
    group_rows(rows, object_key)
        .into_values()
        .filter_map(|group| {
            let head = group.first()?;
            Some(ProcedureInfo {
                schema: head.string_or_empty("schema_name"),
                name: head.string_or_empty("object_name"),
                object_id: head.i64("object_id").unwrap_or(0),
                modify_date: head.string("modify_date"),
                parameters: parameters_from_rows(&group),
            })
        })
        .collect()
}

fn functions_from_rows(rows: &[Row]) -> Vec<FunctionInfo> {
    group_rows(rows, object_key)
        .into_values()
        .filter_map(|group| {
            let head = group.first()?;
            let function_kind = FunctionKind::from_type_code(&head.string_or_empty("type_code"));
            let return_type = head.string("return_type").or_else(|| {
                (function_kind != FunctionKind::Scalar).then(|| "TABLE".to_string())
            });
            Some(FunctionInfo {
                schema: head.string_or_empty("schema_name"),
                name: head.string_or_empty("object_name"),
                object_id: head.i64("object_id").unwrap_or(0),
                function_kind,
                return_type,
                modify_date: head.string("modify_date"),
                parameters: parameters_from_rows(&group),
            })
        })
        .collect()
}

fn indexes_from_rows(rows: &[Row]) -> Vec<IndexInfo> {
    group_rows(rows, |row| (table_key(row), row.string_or_empty("index_name")))
        .into_values()
        .filter_map(|group| {
            let head = group.first()?;
            Some(IndexInfo {
                schema: head.string_or_empty("schema_name"),
                table: head.string_or_empty("table_name"),
                name: head.string_or_empty("index_name"),
                index_type: head.string_or_empty("index_type"),
                is_unique: head.flag("is_unique"),
                is_primary_key: head.flag("is_primary_key"),
                columns: group.iter().filter_map(|row| row.string("column_name")).collect(),
            })
        })
        .collect()
}

fn constraints_from_rows(rows: &[Row]) -> Vec<ConstraintInfo> {
    group_rows(rows, |row| {
        (table_key(row), row.string_or_empty("constraint_name"))
    })
    .into_values()
    .filter_map(|group| {
        let head = group.first()?;
        let type_code = head.string_or_empty("type_code");
        let Some(constraint_type) = ConstraintType::from_type_code(&type_code) else {
            tracing::debug!(type_code = %type_code, "skipping unknown constraint type");
            return None;
        };
        Some(ConstraintInfo {
            schema: head.string_or_empty("schema_name"),
            table: head.string_or_empty("table_name"),
            name: head.string_or_empty("constraint_name"),
            constraint_type,
            columns: group.iter().filter_map(|row| row.string("column_name")).collect(),
            referenced_schema: head.string("referenced_schema"),
            referenced_table: head.string("referenced_table"),
            referenced_columns: group
                .iter()
                .filter_map(|row| row.string("referenced_column"))
                .collect(),
            definition: head.string("definition"),
        })
    })
    .collect()
}

fn triggers_from_rows(rows: &[Row]) -> Vec<TriggerInfo> {
    group_rows(rows, object_key)
        .into_values()
        .filter_map(|group| {
            let head = group.first()?;
            let mut events = Vec::new();
            for event in group
                .iter()
                .filter_map(|row| row.string("event"))
                .filter_map(|desc| TriggerEvent::from_desc(&desc))
            {
                if !events.contains(&event) {
                    events.push(event);
                }
            }
            Some(TriggerInfo {
                schema: head.string_or_empty("schema_name"),
                name: head.string_or_empty("object_name"),
                table: head.string("table_name"),
                is_disabled: head.flag("is_disabled"),
                is_instead_of: head.flag("is_instead_of"),
                events,
            })
        })
        .collect()
}

async fn query_tables(
    source: &dyn MetadataSource,
    schema: Option<&str>,
    name: Option<&str>,
) -> Result<Vec<TableInfo>> {
    let result = source.query(TABLES, &object_params(schema, name)).await?;
    Ok(result.rows.iter().map(table_from_row).collect())
}

async fn query_views(
    source: &dyn MetadataSource,
    schema: Option<&str>,
    name: Option<&str>,
) -> Result<Vec<ViewInfo>> {
    let result = source.query(VIEWS, &object_params(schema, name)).await?;
    Ok(result.rows.iter().map(view_from_row).collect())
}

async fn query_procedures(
    source: &dyn MetadataSource,
    schema: Option<&str>,
    name: Option<&str>,
) -> Result<Vec<ProcedureInfo>> {
    let result = source.query(PROCEDURES, &object_params(schema, name)).await?;
    Ok(procedures_from_rows(&result.rows))
}

async fn query_functions(
    source: &dyn MetadataSource,
    schema: Option<&str>,
    name: Option<&str>,
) -> Result<Vec<FunctionInfo>> {
    let result = source.query(FUNCTIONS, &object_params(schema, name)).await?;
    Ok(functions_from_rows(&result.rows))
}

async fn query_columns(
    source: &dyn MetadataSource,
    schema: Option<&str>,
    table: Option<&str>,
) -> Result<Vec<ColumnInfo>> {
    let result = source.query(COLUMNS, &table_params(schema, table)).await?;
    Ok(result.rows.iter().map(column_from_row).collect())
}

async fn query_indexes(
    source: &dyn MetadataSource,
    schema: Option<&str>,
    table: Option<&str>,
) -> Result<Vec<IndexInfo>> {
    let result = source.query(INDEXES, &table_params(schema, table)).await?;
    Ok(indexes_from_rows(&result.rows))
}

async fn query_constraints(
    source: &dyn MetadataSource,
    schema: Option<&str>,
    table: Option<&str>,
) -> Result<Vec<ConstraintInfo>> {
    let result = source.query(CONSTRAINTS, &table_params(schema, table)).await?;
    Ok(constraints_from_rows(&result.rows))
}

pub async fn fetch_tables(source: &dyn MetadataSource) -> Result<ObjectMap<TableInfo>> {
    let tables = query_tables(source, None, None).await?;
    Ok(keyed(tables, |t| ObjectKey::new(&t.schema, &t.name)))
}

/// Columns of every table, keyed by owning table
pub async fn fetch_columns(source: &dyn MetadataSource) -> Result<ObjectMap<Vec<ColumnInfo>>> {
    let columns = query_columns(source, None, None).await?;
    Ok(by_table(columns, |c| ObjectKey::new(&c.schema, &c.table)))
}

pub async fn fetch_views(source: &dyn MetadataSource) -> Result<ObjectMap<ViewInfo>> {
    let views = query_views(source, None, None).await?;
    Ok(keyed(views, |v| ObjectKey::new(&v.schema, &v.name)))
}

pub async fn fetch_procedures(source: &dyn MetadataSource) -> Result<ObjectMap<ProcedureInfo>> {
    let procedures = query_procedures(source, None, None).await?;
    Ok(keyed(procedures, |p| ObjectKey::new(&p.schema, &p.name)))
}

pub async fn fetch_functions(source: &dyn MetadataSource) -> Result<ObjectMap<FunctionInfo>> {
    let functions = query_functions(source, None, None).await?;
    Ok(keyed(functions, |f| ObjectKey::new(&f.schema, &f.name)))
}

/// Indexes of every table, keyed by owning table
pub async fn fetch_indexes(source: &dyn MetadataSource) -> Result<ObjectMap<Vec<IndexInfo>>> {
    let indexes = query_indexes(source, None, None).await?;
    Ok(by_table(indexes, |i| ObjectKey::new(&i.schema, &i.table)))
}

/// Constraints of every table, keyed by owning table
pub async fn fetch_constraints(
    source: &dyn MetadataSource,
) -> Result<ObjectMap<Vec<ConstraintInfo>>> {
    let constraints = query_constraints(source, None, None).await?;
    Ok(by_table(constraints, |c| ObjectKey::new(&c.schema, &c.table)))
}

/// Triggers keyed by their own schema and name
pub async fn fetch_triggers(source: &dyn MetadataSource) -> Result<ObjectMap<TriggerInfo>> {
    let result = source.query(TRIGGERS, &[]).await?;
    let triggers = triggers_from_rows(&result.rows);
    Ok(keyed(triggers, |t| ObjectKey::new(&t.schema, &t.name)))
}

pub async fn fetch_table(
    source: &dyn MetadataSource,
    schema: &str,
    name: &str,
) -> Result<Option<TableInfo>> {
    Ok(query_tables(source, Some(schema), Some(name)).await?.into_iter().next())
}

pub async fn fetch_view(
    source: &dyn MetadataSource,
    schema: &str,
    name: &str,
) -> Result<Option<ViewInfo>> {
    Ok(query_views(source, Some(schema), Some(name)).await?.into_iter().next())
}

pub async fn fetch_procedure(
    source: &dyn MetadataSource,
    schema: &str,
    name: &str,
) -> Result<Option<ProcedureInfo>> {
    Ok(query_procedures(source, Some(schema), Some(name))
        .await?
        .into_iter()
        .next())
}

pub async fn fetch_function(
    source: &dyn MetadataSource,
    schema: &str,
    name: &str,
) -> Result<Option<FunctionInfo>> {
    Ok(query_functions(source, Some(schema), Some(name))
        .await?
        .into_iter()
        .next())
}

/// Columns, indexes and constraints of one table, queried concurrently
pub async fn fetch_table_details(
    source: &dyn MetadataSource,
    schema: &str,
    table: &str,
) -> Result<TableDetails> {
    let (columns, indexes, constraints) = futures::try_join!(
        query_columns(source, Some(schema), Some(table)),
        query_indexes(source, Some(schema), Some(table)),
        query_constraints(source, Some(schema), Some(table)),
    )?;
    Ok(TableDetails {
        columns,
        indexes,
        constraints,
    })
}

/// Load the whole catalog: the eight collections plus a fresh hash, all
/// concurrently. The first failure aborts the load.
#[tracing::instrument(skip(source, oracle, key), fields(connection = %key))]
pub async fn fetch_full_schema(
    source: Arc<dyn MetadataSource>,
    oracle: &HashOracle,
    key: &ConnectionKey,
) -> CacheResult<CachedSchema> {
    let started = std::time::Instant::now();
    let src = source.as_ref();

    let (
        hash,
        tables,
        mut columns,
        views,
        procedures,
        functions,
        mut indexes,
        mut constraints,
        triggers,
    ) = futures::try_join!(
        oracle.compute_fresh(source.clone(), key),
        fetch_tables(src).err_into::<CacheError>(),
        fetch_columns(src).err_into::<CacheError>(),
        fetch_views(src).err_into::<CacheError>(),
        fetch_procedures(src).err_into::<CacheError>(),
        fetch_functions(src).err_into::<CacheError>(),
        fetch_indexes(src).err_into::<CacheError>(),
        fetch_constraints(src).err_into::<CacheError>(),
        fetch_triggers(src).err_into::<CacheError>(),
    )?;

    let mut schema = CachedSchema::new(hash);
    schema.views = views;
    schema.procedures = procedures;
    schema.functions = functions;
    schema.triggers = triggers;

    // Per-table collections are attached through their table so none can
    // exist without it
    for (table_key, table) in tables {
        schema.insert_table(
            table,
            columns.shift_remove(&table_key).unwrap_or_default(),
            indexes.shift_remove(&table_key).unwrap_or_default(),
            constraints.shift_remove(&table_key).unwrap_or_default(),
        );
    }

    let orphaned = columns.len() + indexes.len() + constraints.len();
    if orphaned > 0 {
        tracing::debug!(orphaned, "dropped per-table entries without a table");
    }

    tracing::info!(
        objects = schema.object_count(),
        tables = schema.tables.len(),
        views = schema.views.len(),
        procedures = schema.procedures.len(),
        functions = schema.functions.len(),
        triggers = schema.triggers.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "fetched full schema"
    );
    Ok(schema)
}
