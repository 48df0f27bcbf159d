//! SQL Server catalog queries
//!
//! Every query accepts optional filter parameters (`@schema` plus `@name` or
//! `@table`). Passing NULL fetches the whole collection; passing values
//! narrows it to one object or one table, so the full and targeted paths
//! always agree on shape. Column aliases are stable: `schema_name`,
//! `object_name` for top-level objects, `table_name` for per-table data.

pub(crate) const TABLES: &str = "SELECT
    s.name AS schema_name,
    t.name AS object_name,
    t.object_id,
    CONVERT(varchar(33), t.create_date, 126) AS create_date,
    CONVERT(varchar(33), t.modify_date, 126) AS modify_date
 FROM sys.tables t
 INNER JOIN sys.schemas s ON s.schema_id = t.schema_id
 WHERE t.is_ms_shipped = 0
   AND (@schema IS NULL OR s.name = @schema)
   AND (@name IS NULL OR t.name = @name)
 ORDER BY s.name, t.name";

pub(crate) const COLUMNS: &str = "SELECT
    s.name AS schema_name,
    t.name AS table_name,
    c.name AS column_name,
    c.column_id AS ordinal,
    ty.name AS data_type,
    c.max_length,
    c.precision,
    c.scale,
    c.is_nullable,
    c.is_identity,
    c.is_computed,
    dc.definition AS default_value,
    CAST(CASE WHEN pk.column_id IS NULL THEN 0 ELSE 1 END AS bit) AS is_primary_key
 FROM sys.columns c
 INNER JOIN sys.tables t ON t.object_id = c.object_id
 INNER JOIN sys.schemas s ON s.schema_id = t.schema_id
 INNER JOIN sys.types ty ON ty.user_type_id = c.user_type_id
 LEFT JOIN sys.default_constraints dc ON dc.object_id = c.default_object_id
 LEFT JOIN (
    SELECT ic.object_id, ic.column_id
    FROM sys.index_columns ic
    INNER JOIN sys.indexes i ON i.object_id = ic.object_id AND i.index_id = ic.index_id
    WHERE i.is_primary_key = 1
 ) pk ON pk.object_id = c.object_id AND pk.column_id = c.column_id
 WHERE t.is_ms_shipped = 0
   AND (@schema IS NULL OR s.name = @schema)
   AND (@table IS NULL OR t.name = @table)
 ORDER BY s.name, t.name, c.column_id";

pub(crate) const VIEWS: &str = "SELECT
    s.name AS schema_name,
    v.name AS object_name,
    v.object_id,
    CONVERT(varchar(33), v.modify_date, 126) AS modify_date
 FROM sys.views v
 INNER JOIN sys.schemas s ON s.schema_id = v.schema_id
 WHERE v.is_ms_shipped = 0
   AND (@schema IS NULL OR s.name = @schema)
   AND (@name IS NULL OR v.name = @name)
 ORDER BY s.name, v.name";

pub(crate) const PROCEDURES: &str = "SELECT
    s.name AS schema_name,
    p.name AS object_name,
    p.object_id,
    CONVERT(varchar(33), p.modify_date, 126) AS modify_date,
    prm.name AS parameter_name,
    TYPE_NAME(prm.user_type_id) AS parameter_type,
    prm.parameter_id AS parameter_ordinal,
    prm.is_output AS parameter_is_output
 FROM sys.procedures p
 INNER JOIN sys.schemas s ON s.schema_id = p.schema_id
 LEFT JOIN sys.parameters prm ON prm.object_id = p.object_id
 WHERE p.is_ms_shipped = 0
   AND (@schema IS NULL OR s.name = @schema)
   AND (@name IS NULL OR p.name = @name)
 ORDER BY s.name, p.name, prm.parameter_id";

pub(crate) const FUNCTIONS: &str = "SELECT
    s.name AS schema_name,
    o.name AS object_name,
    o.object_id,
    o.type AS type_code,
    CONVERT(varchar(33), o.modify_date, 126) AS modify_date,
    ret.return_type,
    prm.name AS parameter_name,
    TYPE_NAME(prm.user_type_id) AS parameter_type,
    prm.parameter_id AS parameter_ordinal,
    prm.is_output AS parameter_is_output
 FROM sys.objects o
 INNER JOIN sys.schemas s ON s.schema_id = o.schema_id
 LEFT JOIN (
    SELECT object_id, TYPE_NAME(user_type_id) AS return_type
    FROM sys.parameters
    WHERE parameter_id = 0
 ) ret ON ret.object_id = o.object_id
 LEFT JOIN sys.parameters prm ON prm.object_id = o.object_id AND prm.parameter_id > 0
 WHERE o.type IN ('FN', 'IF', 'TF', 'FS', 'FT')
   AND o.is_ms_shipped = 0
   AND (@schema IS NULL OR s.name = @schema)
   AND (@name IS NULL OR o.name = @name)
 ORDER BY s.name, o.name, prm.parameter_id";

pub(crate) const INDEXES: &str = "SELECT
    s.name AS schema_name,
    t.name AS table_name,
    i.name AS index_name,
    i.type_desc AS index_type,
    i.is_unique,
    i.is_primary_key,
    col.name AS column_name
 FROM sys.indexes i
 INNER JOIN sys.tables t ON t.object_id = i.object_id
 INNER JOIN sys.schemas s ON s.schema_id = t.schema_id
 LEFT JOIN sys.index_columns ic
    ON ic.object_id = i.object_id AND ic.index_id = i.index_id AND ic.is_included_column = 0
 LEFT JOIN sys.columns col ON col.object_id = ic.object_id AND col.column_id = ic.column_id
 WHERE i.index_id > 0
   AND i.is_hypothetical = 0
   AND t.is_ms_shipped = 0
   AND (@schema IS NULL OR s.name = @schema)
   AND (@table IS NULL OR t.name = @table)
 ORDER BY s.name, t.name, i.name, ic.key_ordinal";

pub(crate) const CONSTRAINTS: &str = "SELECT * FROM (
    SELECT
        s.name AS schema_name,
        t.name AS table_name,
        kc.name AS constraint_name,
        kc.type AS type_code,
        col.name AS column_name,
        CAST(NULL AS sysname) AS referenced_schema,
        CAST(NULL AS sysname) AS referenced_table,
        CAST(NULL AS sysname) AS referenced_column,
        CAST(NULL AS nvarchar(max)) AS definition,
        ic.key_ordinal AS position
    FROM sys.key_constraints kc
    INNER JOIN sys.tables t ON t.object_id = kc.parent_object_id
    INNER JOIN sys.schemas s ON s.schema_id = t.schema_id
    INNER JOIN sys.index_columns ic
        ON ic.object_id = kc.parent_object_id AND ic.index_id = kc.unique_index_id
    INNER JOIN sys.columns col ON col.object_id = ic.object_id AND col.column_id = ic.column_id
    UNION ALL
    SELECT
        s.name, t.name, fk.name, fk.type, pc.name,
        rs.name, rt.name, rc.name,
        NULL, fkc.constraint_column_id
    FROM sys.foreign_keys fk
    INNER JOIN sys.tables t ON t.object_id = fk.parent_object_id
    INNER JOIN sys.schemas s ON s.schema_id = t.schema_id
    INNER JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
    INNER JOIN sys.columns pc
        ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
    INNER JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id
    INNER JOIN sys.schemas rs ON rs.schema_id = rt.schema_id
    INNER JOIN sys.columns rc
        ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
    UNION ALL
    SELECT
        s.name, t.name, cc.name, cc.type, col.name,
        NULL, NULL, NULL,
        cc.definition, 0
    FROM sys.check_constraints cc
    INNER JOIN sys.tables t ON t.object_id = cc.parent_object_id
    INNER JOIN sys.schemas s ON s.schema_id = t.schema_id
    LEFT JOIN sys.columns col
        ON col.object_id = cc.parent_object_id AND col.column_id = cc.parent_column_id
    UNION ALL
    SELECT
        s.name, t.name, dc.name, dc.type, col.name,
        NULL, NULL, NULL,
        dc.definition, 0
    FROM sys.default_constraints dc
    INNER JOIN sys.tables t ON t.object_id = dc.parent_object_id
    INNER JOIN sys.schemas s ON s.schema_id = t.schema_id
    LEFT JOIN sys.columns col
        ON col.object_id = dc.parent_object_id AND col.column_id = dc.parent_column_id
 ) c
 WHERE (@schema IS NULL OR c.schema_name = @schema)
   AND (@table IS NULL OR c.table_name = @table)
 ORDER BY c.schema_name, c.table_name, c.constraint_name, c.position";

pub(crate) const TRIGGERS: &str = "SELECT
    s.name AS schema_name,
    tr.name AS object_name,
    parent.name AS table_name,
    tr.is_disabled,
    tr.is_instead_of_trigger AS is_instead_of,
    te.type_desc AS event
 FROM sys.triggers tr
 INNER JOIN sys.objects parent ON parent.object_id = tr.parent_id
 INNER JOIN sys.schemas s ON s.schema_id = parent.schema_id
 LEFT JOIN sys.trigger_events te ON te.object_id = tr.object_id
 WHERE tr.is_ms_shipped = 0
   AND tr.parent_class = 1
 ORDER BY s.name, tr.name";
