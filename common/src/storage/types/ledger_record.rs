use std::collections::HashSet;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(LedgerRecord, "ledger_record", {
    key: String,
    namespace: String,
    group_id: String,
    #[serde(serialize_with = "serialize_datetime", deserialize_with = "deserialize_datetime", default)]
    last_seen: DateTime<Utc>
});

/// Row shape for key-projection queries.
#[derive(serde::Deserialize)]
struct KeyRow {
    key: String,
}

impl LedgerRecord {
    /// The record id doubles as the chunk key: content fingerprints embed the
    /// namespace (it is part of the hashed metadata), so keys are unique
    /// across namespaces.
    pub fn new(
        key: String,
        namespace: String,
        group_id: String,
        last_seen: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: key.clone(),
            created_at: now,
            updated_at: now,
            key,
            namespace,
            group_id,
            last_seen,
        }
    }

    /// Returns the subset of `keys` already present in the namespace.
    pub async fn exists(
        db: &SurrealDbClient,
        namespace: &str,
        keys: &[String],
    ) -> Result<HashSet<String>, AppError> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<KeyRow> = db
            .query(format!(
                "SELECT key FROM {} WHERE namespace = $namespace AND key IN $keys",
                Self::table_name()
            ))
            .bind(("namespace", namespace.to_owned()))
            .bind(("keys", keys.to_vec()))
            .await?
            .take(0)?;

        Ok(rows.into_iter().map(|row| row.key).collect())
    }

    /// Bumps `last_seen` for every given key in the namespace.
    pub async fn touch(
        db: &SurrealDbClient,
        namespace: &str,
        keys: &[String],
        seen_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if keys.is_empty() {
            return Ok(());
        }

        db.query(format!(
            "UPDATE {} SET last_seen = $seen_at, updated_at = time::now() \
             WHERE namespace = $namespace AND key IN $keys",
            Self::table_name()
        ))
        .bind(("seen_at", surrealdb::sql::Datetime::from(seen_at)))
        .bind(("namespace", namespace.to_owned()))
        .bind(("keys", keys.to_vec()))
        .await?;

        Ok(())
    }

    /// Lists keys in the namespace, optionally narrowed to a set of group ids
    /// and/or to records last seen strictly before `before`. Results are
    /// ordered by key so callers get deterministic batches.
    pub async fn list_keys(
        db: &SurrealDbClient,
        namespace: &str,
        group_ids: Option<&[String]>,
        before: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<String>, AppError> {
        let mut query = format!(
            "SELECT key FROM {} WHERE namespace = $namespace",
            Self::table_name()
        );
        if group_ids.is_some() {
            query.push_str(" AND group_id IN $group_ids");
        }
        if before.is_some() {
            query.push_str(" AND last_seen < $cutoff");
        }
        query.push_str(" ORDER BY key");
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut request = db.query(query).bind(("namespace", namespace.to_owned()));
        if let Some(group_ids) = group_ids {
            request = request.bind(("group_ids", group_ids.to_vec()));
        }
        if let Some(before) = before {
            request = request.bind(("cutoff", surrealdb::sql::Datetime::from(before)));
        }

        let rows: Vec<KeyRow> = request.await?.take(0)?;
        Ok(rows.into_iter().map(|row| row.key).collect())
    }

    /// Removes the given keys from the namespace.
    pub async fn delete_keys(
        db: &SurrealDbClient,
        namespace: &str,
        keys: &[String],
    ) -> Result<(), AppError> {
        if keys.is_empty() {
            return Ok(());
        }

        db.query(format!(
            "DELETE {} WHERE namespace = $namespace AND key IN $keys",
            Self::table_name()
        ))
        .bind(("namespace", namespace.to_owned()))
        .bind(("keys", keys.to_vec()))
        .await?;

        Ok(())
    }
}
