//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use zqlz_core::{MetadataSource, QueryParam, QueryResult, Result, Value, ZqlzError};

/// Catalog query kinds, recognized by a fragment of their SQL text.
/// The hash query is checked first.
const KINDS: &[(&str, &str)] = &[
    ("hash", "CHECKSUM_AGG"),
    ("tables", "FROM sys.tables"),
    ("columns", "FROM sys.columns"),
    ("views", "FROM sys.views"),
    ("procedures", "FROM sys.procedures"),
    ("functions", "ret.return_type"),
    ("indexes", "FROM sys.indexes"),
    ("constraints", "FROM sys.key_constraints"),
    ("triggers", "FROM sys.triggers"),
];

/// The eight collection kinds a full fetch queries
pub const COLLECTIONS: &[&str] = &[
    "tables",
    "columns",
    "views",
    "procedures",
    "functions",
    "indexes",
    "constraints",
    "triggers",
];

#[derive(Debug, Clone)]
pub struct MockTable {
    pub schema: String,
    pub name: String,
    /// First column is the primary key
    pub columns: Vec<String>,
    /// (column, referenced table) in the same schema
    pub foreign_key: Option<(String, String)>,
    /// Extra non-unique single-column indexes
    pub indexes: Vec<String>,
}

impl MockTable {
    pub fn new(schema: &str, name: &str, columns: &[&str]) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            foreign_key: None,
            indexes: Vec::new(),
        }
    }

    pub fn with_foreign_key(mut self, column: &str, referenced_table: &str) -> Self {
        self.foreign_key = Some((column.to_string(), referenced_table.to_string()));
        self
    }
}

/// (schema, name) of a view, procedure or function
pub type MockObject = (String, String);

#[derive(Debug, Clone)]
pub struct MockTrigger {
    pub schema: String,
    pub name: String,
    pub table: String,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub checksum: i64,
    pub max_modify_date: String,
    pub tables: Vec<MockTable>,
    pub views: Vec<MockObject>,
    pub procedures: Vec<MockObject>,
    pub functions: Vec<MockObject>,
    pub triggers: Vec<MockTrigger>,
}

fn object(schema: &str, name: &str) -> MockObject {
    (schema.to_string(), name.to_string())
}

/// Users, Orders (referencing Users), one view, procedure, function and
/// trigger, all in `dbo`
pub fn sample_catalog() -> Catalog {
    Catalog {
        checksum: 1_000,
        max_modify_date: "2024-05-01T10:30:00.250".to_string(),
        tables: vec![
            MockTable::new("dbo", "Users", &["Id", "Email", "Name"]),
            MockTable::new("dbo", "Orders", &["Id", "UserId", "Total"])
                .with_foreign_key("UserId", "Users"),
        ],
        views: vec![object("dbo", "vw_ActiveUsers")],
        procedures: vec![object("dbo", "usp_GetOrders")],
        functions: vec![object("dbo", "fn_OrderTotal")],
        triggers: vec![MockTrigger {
            schema: "dbo".to_string(),
            name: "trg_Orders_Audit".to_string(),
            table: "Orders".to_string(),
        }],
    }
}

fn s(value: &str) -> Value {
    Value::String(value.to_string())
}

fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
    QueryResult::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows)
}

impl Catalog {
    fn rows_for(&self, kind: &str) -> QueryResult {
        match kind {
            "hash" => result(
                &[
                    "checksum",
                    "max_modify_date",
                    "table_count",
                    "view_count",
                    "procedure_count",
                    "function_count",
                ],
                vec![vec![
                    Value::Int32(self.checksum as i32),
                    s(&self.max_modify_date),
                    Value::Int32(self.tables.len() as i32),
                    Value::Int32(self.views.len() as i32),
                    Value::Int32(self.procedures.len() as i32),
                    Value::Int32(self.functions.len() as i32),
                ]],
            ),
            "tables" => result(
                &["schema_name", "object_name", "object_id", "create_date", "modify_date"],
                self.tables
                    .iter()
                    .enumerate()
                    .map(|(i, t)| {
                        vec![
                            s(&t.schema),
                            s(&t.name),
                            Value::Int32(100 + i as i32),
                            s("2024-01-01T00:00:00"),
                            s(&self.max_modify_date),
                        ]
                    })
                    .collect(),
            ),
            "columns" => result(
                &[
                    "schema_name",
                    "table_name",
                    "column_name",
                    "ordinal",
                    "data_type",
                    "max_length",
                    "precision",
                    "scale",
                    "is_nullable",
                    "is_identity",
                    "is_computed",
                    "default_value",
                    "is_primary_key",
                ],
                self.tables
                    .iter()
                    .flat_map(|t| {
                        t.columns.iter().enumerate().map(|(i, column)| {
                            let is_key = i == 0;
                            vec![
                                s(&t.schema),
                                s(&t.name),
                                s(column),
                                Value::Int32(i as i32 + 1),
                                s(if is_key { "int" } else { "nvarchar" }),
                                Value::Int16(if is_key { 4 } else { 200 }),
                                Value::Null,
                                Value::Null,
                                Value::Bool(!is_key),
                                Value::Bool(is_key),
                                Value::Bool(false),
                                Value::Null,
                                Value::Bool(is_key),
                            ]
                        })
                    })
                    .collect(),
            ),
            "views" => result(
                &["schema_name", "object_name", "object_id", "modify_date"],
                self.views
                    .iter()
                    .map(|(schema, name)| {
                        vec![s(schema), s(name), Value::Int32(200), Value::Null]
                    })
                    .collect(),
            ),
            "procedures" | "functions" => {
                let objects = if kind == "procedures" {
                    &self.procedures
                } else {
                    &self.functions
                };
                result(
                    &[
                        "schema_name",
                        "object_name",
                        "object_id",
                        "type_code",
                        "modify_date",
                        "return_type",
                        "parameter_name",
                        "parameter_type",
                        "parameter_ordinal",
                        "parameter_is_output",
                    ],
                    objects
                        .iter()
                        .map(|(schema, name)| {
                            let (type_code, return_type) = if kind == "procedures" {
                                (s("P "), Value::Null)
                            } else {
                                (s("FN"), s("money"))
                            };
                            vec![
                                s(schema),
                                s(name),
                                Value::Int32(300),
                                type_code,
                                Value::Null,
                                return_type,
                                s("@OrderId"),
                                s("int"),
                                Value::Int32(1),
                                Value::Bool(false),
                            ]
                        })
                        .collect(),
                )
            }
            "indexes" => result(
                &[
                    "schema_name",
                    "table_name",
                    "index_name",
                    "index_type",
                    "is_unique",
                    "is_primary_key",
                    "column_name",
                ],
                self.tables
                    .iter()
                    .flat_map(|t| {
                        let primary = vec![
                            s(&t.schema),
                            s(&t.name),
                            s(&format!("PK_{}", t.name)),
                            s("CLUSTERED"),
                            Value::Bool(true),
                            Value::Bool(true),
                            s(&t.columns[0]),
                        ];
                        let extra = t.indexes.iter().map(|column| {
                            vec![
                                s(&t.schema),
                                s(&t.name),
                                s(&format!("IX_{}_{}", t.name, column)),
                                s("NONCLUSTERED"),
                                Value::Bool(false),
                                Value::Bool(false),
                                s(column),
                            ]
                        });
                        std::iter::once(primary).chain(extra).collect::<Vec<_>>()
                    })
                    .collect(),
            ),
            "constraints" => result(
                &[
                    "schema_name",
                    "table_name",
                    "constraint_name",
                    "type_code",
                    "column_name",
                    "referenced_schema",
                    "referenced_table",
                    "referenced_column",
                    "definition",
                    "position",
                ],
                self.tables
                    .iter()
                    .flat_map(|t| {
                        let mut rows = vec![vec![
                            s(&t.schema),
                            s(&t.name),
                            s(&format!("PK_{}", t.name)),
                            s("PK"),
                            s(&t.columns[0]),
                            Value::Null,
                            Value::Null,
                            Value::Null,
                            Value::Null,
                            Value::Int32(1),
                        ]];
                        if let Some((column, referenced)) = &t.foreign_key {
                            rows.push(vec![
                                s(&t.schema),
                                s(&t.name),
                                s(&format!("FK_{}_{}", t.name, referenced)),
                                s("F "),
                                s(column),
                                s(&t.schema),
                                s(referenced),
                                s("Id"),
                                Value::Null,
                                Value::Int32(1),
                            ]);
                        }
                        rows
                    })
                    .collect(),
            ),
            "triggers" => result(
                &[
                    "schema_name",
                    "object_name",
                    "table_name",
                    "is_disabled",
                    "is_instead_of",
                    "event",
                ],
                self.triggers
                    .iter()
                    .flat_map(|t| {
                        ["INSERT", "UPDATE"].into_iter().map(|event| {
                            vec![
                                s(&t.schema),
                                s(&t.name),
                                s(&t.table),
                                Value::Bool(false),
                                Value::Bool(false),
                                s(event),
                            ]
                        })
                    })
                    .collect(),
            ),
            _ => QueryResult::empty(),
        }
    }
}

/// Keep rows matching every non-NULL filter parameter, the way the
/// `(@p IS NULL OR col = @p)` predicates do
fn apply_filters(result: QueryResult, params: &[QueryParam]) -> QueryResult {
    let filters: Vec<(&str, String)> = params
        .iter()
        .filter_map(|param| {
            let column = match param.name {
                "schema" => "schema_name",
                "name" => "object_name",
                "table" => "table_name",
                _ => return None,
            };
            param.value.as_str().map(|v| (column, v.to_string()))
        })
        .collect();
    if filters.is_empty() {
        return result;
    }

    let rows = result
        .rows
        .into_iter()
        .filter(|row| {
            filters.iter().all(|(column, value)| {
                row.string(column)
                    .is_some_and(|actual| actual.eq_ignore_ascii_case(value))
            })
        })
        .collect();
    QueryResult { rows, ..result }
}

/// In-memory SQL Server catalog answering the cache's queries by SQL pattern
pub struct MockSource {
    server: String,
    database: String,
    catalog: Mutex<Catalog>,
    failing: Mutex<HashSet<&'static str>>,
    delay: Option<Duration>,
    /// (kind, params) of every query executed, for assertion in tests
    query_log: Arc<Mutex<Vec<(&'static str, Vec<QueryParam>)>>>,
}

impl MockSource {
    pub fn new(server: &str, database: &str) -> Self {
        Self {
            server: server.to_string(),
            database: database.to_string(),
            catalog: Mutex::new(sample_catalog()),
            failing: Mutex::new(HashSet::new()),
            delay: None,
            query_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sales database on localhost with the sample catalog
    pub fn sales() -> Self {
        Self::new("localhost", "Sales")
    }

    /// Every query sleeps this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Change the catalog as a DDL statement would, moving the checksum and
    /// the max-modify timestamp
    pub fn alter(&self, change: impl FnOnce(&mut Catalog)) {
        let mut catalog = self.catalog.lock();
        change(&mut catalog);
        catalog.checksum += 1;
        catalog.max_modify_date = format!("2024-05-01T11:{:02}:00", catalog.checksum % 60);
    }

    /// Change the catalog without touching the checksum or the timestamp
    pub fn edit(&self, change: impl FnOnce(&mut Catalog)) {
        change(&mut self.catalog.lock());
    }

    pub fn fail(&self, kind: &'static str) {
        self.failing.lock().insert(kind);
    }

    pub fn recover(&self, kind: &'static str) {
        self.failing.lock().remove(kind);
    }

    pub fn query_count(&self, kind: &str) -> usize {
        self.query_log.lock().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn total_queries(&self) -> usize {
        self.query_log.lock().len()
    }

    pub fn query_log(&self) -> Vec<(&'static str, Vec<QueryParam>)> {
        self.query_log.lock().clone()
    }

    pub fn reset_log(&self) {
        self.query_log.lock().clear();
    }
}

#[async_trait]
impl MetadataSource for MockSource {
    fn server_name(&self) -> &str {
        &self.server
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn query(&self, sql: &str, params: &[QueryParam]) -> Result<QueryResult> {
        let kind = KINDS
            .iter()
            .find(|(_, pattern)| sql.contains(pattern))
            .map(|(kind, _)| *kind)
            .unwrap_or("unknown");
        self.query_log.lock().push((kind, params.to_vec()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().contains(kind) {
            return Err(ZqlzError::Query(format!("{kind} query failed")));
        }

        let result = self.catalog.lock().rows_for(kind);
        Ok(apply_filters(result, params))
    }
}
