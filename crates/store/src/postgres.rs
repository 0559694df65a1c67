use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use crate::store::prepare_body;
use crate::{
    Adjustment, Condition, DocumentId, DocumentStore, Filter, IncrementGuard, Result, StoreError,
    TenantId,
};

/// A value bound to a generated SQL placeholder.
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Text(String),
    Json(Value),
}

/// SQL `WHERE` fragment compiled from a [`Filter`].
///
/// Placeholders start after `offset`, since `$1` and `$2` are always the
/// tenant and collection.
struct SqlFilter {
    clause: String,
    binds: Vec<Bind>,
    offset: usize,
}

impl SqlFilter {
    fn compile(filter: &Filter, offset: usize) -> Self {
        let mut compiled = SqlFilter {
            clause: String::new(),
            binds: Vec::new(),
            offset,
        };

        let parts: Vec<String> = filter
            .conditions()
            .iter()
            .map(|c| compiled.condition(c))
            .collect();
        compiled.clause = if parts.is_empty() {
            "TRUE".to_string()
        } else {
            parts.join(" AND ")
        };
        compiled
    }

    fn placeholder(&mut self, bind: Bind) -> String {
        self.binds.push(bind);
        format!("${}", self.offset + self.binds.len())
    }

    fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Eq { field, value } => {
                let f = self.placeholder(Bind::Text(field.clone()));
                let v = self.placeholder(Bind::Json(value.clone()));
                format!("(body -> {f}) = {v}::jsonb")
            }
            Condition::EqIgnoreCase { field, value } => {
                let f = self.placeholder(Bind::Text(field.clone()));
                let v = self.placeholder(Bind::Text(value.clone()));
                format!("lower(body ->> {f}) = lower({v})")
            }
            Condition::EndsWith { field, suffix } => {
                let f = self.placeholder(Bind::Text(field.clone()));
                let s = self.placeholder(Bind::Text(suffix.clone()));
                format!("(char_length({s}) > 0 AND right(body ->> {f}, char_length({s})) = {s})")
            }
            Condition::In { field, values } => {
                let f = self.placeholder(Bind::Text(field.clone()));
                let v = self.placeholder(Bind::Json(Value::Array(values.clone())));
                format!("({v}::jsonb @> jsonb_build_array(body -> {f}))")
            }
            Condition::AnyOf(conditions) => {
                if conditions.is_empty() {
                    return "FALSE".to_string();
                }
                let parts: Vec<String> = conditions.iter().map(|c| self.condition(c)).collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }

    fn limit_clause(filter: &Filter) -> String {
        filter
            .result_limit()
            .map(|limit| format!(" LIMIT {limit}"))
            .unwrap_or_default()
    }

    fn bind_all<'q>(
        &self,
        mut query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        for bind in &self.binds {
            query = match bind {
                Bind::Text(s) => query.bind(s.clone()),
                Bind::Json(v) => query.bind(v.clone()),
            };
        }
        query
    }
}

/// PostgreSQL-backed document store keeping each document as a JSONB row.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn find_one(
        &self,
        tenant: &TenantId,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Value>> {
        let compiled = SqlFilter::compile(filter, 2);
        let sql = format!(
            "SELECT body FROM documents WHERE tenant_id = $1 AND collection = $2 AND {} ORDER BY seq ASC LIMIT 1",
            compiled.clause
        );

        let query = sqlx::query(&sql).bind(tenant.as_str()).bind(collection);
        let row = compiled.bind_all(query).fetch_optional(&self.pool).await?;

        Ok(match row {
            Some(row) => Some(row.try_get("body")?),
            None => None,
        })
    }

    async fn find(
        &self,
        tenant: &TenantId,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Value>> {
        let compiled = SqlFilter::compile(filter, 2);
        let sql = format!(
            "SELECT body FROM documents WHERE tenant_id = $1 AND collection = $2 AND {} ORDER BY seq ASC{}",
            compiled.clause,
            SqlFilter::limit_clause(filter)
        );

        let query = sqlx::query(&sql).bind(tenant.as_str()).bind(collection);
        let rows = compiled.bind_all(query).fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|row| row.try_get::<Value, _>("body").map_err(StoreError::from))
            .collect()
    }

    async fn insert_one(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: DocumentId,
        body: Value,
    ) -> Result<DocumentId> {
        let body = prepare_body(id, body)?;

        sqlx::query(
            r#"
            INSERT INTO documents (tenant_id, collection, id, body)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(tenant.as_str())
        .bind(collection)
        .bind(id.as_uuid())
        .bind(&body)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("documents_pkey")
            {
                return StoreError::Conflict {
                    collection: collection.to_string(),
                    id,
                };
            }
            StoreError::Database(e)
        })?;

        Ok(id)
    }

    async fn update_one(
        &self,
        tenant: &TenantId,
        collection: &str,
        filter: &Filter,
        patch: Value,
    ) -> Result<bool> {
        let Some(object) = patch.as_object() else {
            return Err(StoreError::InvalidDocument("patch must be an object".into()));
        };
        if object.contains_key("id") {
            return Err(StoreError::InvalidDocument("patch may not change id".into()));
        }

        let compiled = SqlFilter::compile(filter, 3);
        let sql = format!(
            r#"
            UPDATE documents SET body = body || $3::jsonb, updated_at = now()
            WHERE seq = (
                SELECT seq FROM documents
                WHERE tenant_id = $1 AND collection = $2 AND {}
                ORDER BY seq ASC LIMIT 1
            )
            "#,
            compiled.clause
        );

        let query = sqlx::query(&sql)
            .bind(tenant.as_str())
            .bind(collection)
            .bind(&patch);
        let result = compiled.bind_all(query).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, tenant: &TenantId, collection: &str, filter: &Filter) -> Result<u64> {
        let compiled = SqlFilter::compile(filter, 2);
        let sql = format!(
            "SELECT COUNT(*) AS n FROM documents WHERE tenant_id = $1 AND collection = $2 AND {}",
            compiled.clause
        );

        let query = sqlx::query(&sql).bind(tenant.as_str()).bind(collection);
        let row = compiled.bind_all(query).fetch_one(&self.pool).await?;
        let n: i64 = row.try_get("n")?;

        Ok(n.max(0) as u64)
    }

    async fn increment(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: DocumentId,
        field: &str,
        delta: i64,
        guard: IncrementGuard,
    ) -> Result<Option<Adjustment>> {
        let minimum = match guard {
            IncrementGuard::None => None,
            IncrementGuard::AtLeast(min) => Some(min),
        };

        // The row lock taken by UPDATE re-checks the guard against the
        // latest committed value, so concurrent decrements serialize here.
        let row = sqlx::query(
            r#"
            UPDATE documents
            SET body = jsonb_set(
                    body,
                    ARRAY[$4::text],
                    to_jsonb(COALESCE((body ->> $4)::bigint, 0) + $5)
                ),
                updated_at = now()
            WHERE tenant_id = $1 AND collection = $2 AND id = $3
              AND ($6::bigint IS NULL OR COALESCE((body ->> $4)::bigint, 0) >= $6)
            RETURNING (body ->> $4)::bigint AS current
            "#,
        )
        .bind(tenant.as_str())
        .bind(collection)
        .bind(id.as_uuid())
        .bind(field)
        .bind(delta)
        .bind(minimum)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let current: i64 = row.try_get("current")?;
                Ok(Some(Adjustment {
                    previous: current - delta,
                    current,
                }))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_compiles_to_true() {
        let compiled = SqlFilter::compile(&Filter::new(), 2);
        assert_eq!(compiled.clause, "TRUE");
        assert!(compiled.binds.is_empty());
    }

    #[test]
    fn placeholders_continue_after_offset() {
        let filter = Filter::new()
            .eq("slug", "shirt")
            .eq_ignore_case("email", "A@B.C");
        let compiled = SqlFilter::compile(&filter, 2);
        assert_eq!(
            compiled.clause,
            "(body -> $3) = $4::jsonb AND lower(body ->> $5) = lower($6)"
        );
        assert_eq!(
            compiled.binds,
            vec![
                Bind::Text("slug".into()),
                Bind::Json(json!("shirt")),
                Bind::Text("email".into()),
                Bind::Text("A@B.C".into()),
            ]
        );
    }

    #[test]
    fn any_of_compiles_to_or_group() {
        let filter = Filter::new().any_of(vec![
            Condition::eq("phone", "017"),
            Condition::ends_with("phone", "17"),
        ]);
        let compiled = SqlFilter::compile(&filter, 3);
        assert!(compiled.clause.starts_with("((body -> $4) = $5::jsonb OR "));
        assert_eq!(compiled.binds.len(), 4);
    }

    #[test]
    fn empty_any_of_is_false() {
        let compiled = SqlFilter::compile(&Filter::new().any_of(vec![]), 2);
        assert_eq!(compiled.clause, "FALSE");
    }

    #[test]
    fn limit_clause() {
        assert_eq!(SqlFilter::limit_clause(&Filter::new()), "");
        assert_eq!(SqlFilter::limit_clause(&Filter::new().limit(5)), " LIMIT 5");
    }
}
