//! Catalog fingerprinting
//!
//! One aggregate query answers "has anything changed?" without enumerating
//! the catalog: an order-independent checksum over every user object's
//! (id, modify date, type), the newest modify date, and per-kind counts.
//! Additions and drops move the counts; edits, renames and drop/recreate
//! cycles move the checksum and the timestamp.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use zqlz_core::{MetadataSource, Result, Row, ZqlzError};

use crate::coalesce::Coalescer;
use crate::error::CacheResult;
use crate::key::ConnectionKey;
use crate::model::{DatabaseHash, ObjectCounts};

pub(crate) const HASH_QUERY: &str = "SELECT
    ISNULL(CHECKSUM_AGG(CHECKSUM(o.object_id, o.modify_date, o.type)), 0) AS checksum,
    ISNULL(CONVERT(varchar(33), MAX(o.modify_date), 126), '') AS max_modify_date,
    ISNULL(SUM(CASE WHEN o.type = 'U' THEN 1 ELSE 0 END), 0) AS table_count,
    ISNULL(SUM(CASE WHEN o.type = 'V' THEN 1 ELSE 0 END), 0) AS view_count,
    ISNULL(SUM(CASE WHEN o.type IN ('P', 'PC') THEN 1 ELSE 0 END), 0) AS procedure_count,
    ISNULL(SUM(CASE WHEN o.type IN ('FN', 'IF', 'TF', 'FS', 'FT') THEN 1 ELSE 0 END), 0) AS function_count
 FROM sys.objects o
 WHERE o.is_ms_shipped = 0
   AND o.type NOT IN ('S', 'IT', 'SQ')";

/// Run the fingerprint query once, uncached
#[tracing::instrument(skip(source), fields(server = %source.server_name(), database = %source.database_name()))]
pub async fn compute_hash(source: &dyn MetadataSource) -> Result<DatabaseHash> {
    let result = source.query(HASH_QUERY, &[]).await?;
    let row = result
        .first()
        .ok_or_else(|| ZqlzError::Schema("catalog hash query returned no rows".into()))?;

    let hash = DatabaseHash {
        checksum: required_i64(row, "checksum")?,
        max_modify_date: row.string("max_modify_date").ok_or_else(|| {
            ZqlzError::Schema("catalog hash query returned no max_modify_date".into())
        })?,
        object_counts: ObjectCounts {
            tables: required_i64(row, "table_count")?,
            views: required_i64(row, "view_count")?,
            procedures: required_i64(row, "procedure_count")?,
            functions: required_i64(row, "function_count")?,
        },
        computed_at: Utc::now(),
    };

    tracing::debug!(
        checksum = hash.checksum,
        max_modify_date = %hash.max_modify_date,
        tables = hash.object_counts.tables,
        views = hash.object_counts.views,
        "computed catalog hash"
    );
    Ok(hash)
}

fn required_i64(row: &Row, column: &str) -> Result<i64> {
    row.i64(column).ok_or_else(|| {
        ZqlzError::Schema(format!(
            "catalog hash column {column} is missing or not an integer"
        ))
    })
}

/// Coalesced, briefly retained catalog fingerprints per connection
pub struct HashOracle {
    computations: Coalescer<DatabaseHash>,
}

impl HashOracle {
    pub fn new(validity: Duration) -> Self {
        Self {
            computations: Coalescer::new("hash", validity),
        }
    }

    /// Current fingerprint, shared with concurrent callers and reused for
    /// the validity window
    pub async fn compute(
        &self,
        source: Arc<dyn MetadataSource>,
        key: &ConnectionKey,
    ) -> CacheResult<DatabaseHash> {
        self.computations
            .run(key, async move { Ok(compute_hash(source.as_ref()).await?) })
            .await
    }

    /// Fingerprint from a query that has not settled yet: a retained result
    /// is dropped, one still running is joined
    pub async fn compute_fresh(
        &self,
        source: Arc<dyn MetadataSource>,
        key: &ConnectionKey,
    ) -> CacheResult<DatabaseHash> {
        self.computations.forget_settled(key);
        self.compute(source, key).await
    }

    pub fn forget(&self, key: &ConnectionKey) {
        self.computations.forget(key);
    }

    pub fn clear(&self) {
        self.computations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use zqlz_core::{QueryParam, QueryResult, Value};

    struct OneRow(QueryResult);

    #[async_trait]
    impl MetadataSource for OneRow {
        fn server_name(&self) -> &str {
            "srv"
        }

        fn database_name(&self) -> &str {
            "db"
        }

        async fn query(&self, _sql: &str, _params: &[QueryParam]) -> Result<QueryResult> {
            Ok(self.0.clone())
        }
    }

    const COLUMNS: [&str; 6] = [
        "checksum",
        "max_modify_date",
        "table_count",
        "view_count",
        "procedure_count",
        "function_count",
    ];

    fn row(checksum: Value) -> OneRow {
        OneRow(QueryResult::from_rows(
            COLUMNS.iter().map(|c| c.to_string()).collect(),
            vec![vec![
                checksum,
                Value::String("2024-05-01T10:30:00.250".into()),
                Value::Int32(3),
                Value::Int32(1),
                Value::Int32(0),
                Value::Int32(2),
            ]],
        ))
    }

    #[tokio::test]
    async fn test_hash_row_is_parsed() {
        let hash = compute_hash(&row(Value::Int32(-17))).await.unwrap();
        assert_eq!(hash.checksum, -17);
        assert_eq!(hash.max_modify_date, "2024-05-01T10:30:00.250");
        assert_eq!(hash.object_counts.tables, 3);
        assert_eq!(hash.object_counts.functions, 2);
    }

    #[tokio::test]
    async fn test_unreadable_checksum_is_an_error() {
        let result = compute_hash(&row(Value::Float64(1.5))).await;
        assert!(matches!(result, Err(ZqlzError::Schema(_))));

        let result = compute_hash(&row(Value::Null)).await;
        assert!(matches!(result, Err(ZqlzError::Schema(_))));
    }

    #[tokio::test]
    async fn test_missing_count_column_is_an_error() {
        let source = OneRow(QueryResult::from_rows(
            vec!["checksum".to_string(), "max_modify_date".to_string()],
            vec![vec![Value::Int32(1), Value::String(String::new())]],
        ));
        let result = compute_hash(&source).await;
        assert!(matches!(result, Err(ZqlzError::Schema(msg)) if msg.contains("table_count")));
    }

    #[tokio::test]
    async fn test_empty_result_is_an_error() {
        let source = OneRow(QueryResult::empty());
        assert!(matches!(compute_hash(&source).await, Err(ZqlzError::Schema(_))));
    }
}
