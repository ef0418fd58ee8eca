//! JSON documents addressed by slash paths, plus the transaction handle that
//! reads and writes them.

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::RemoteError;

pub type Fields = Map<String, Value>;

/// `collection/id` or `collection/id/sub/id`, always an even number of
/// non-empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath(String);

impl DocPath {
    pub fn new(collection: &str, id: &str) -> Result<Self, RemoteError> {
        validate_id(id)?;
        Self::parse(&format!("{collection}/{id}"))
    }

    pub fn parse(raw: &str) -> Result<Self, RemoteError> {
        let segments: Vec<&str> = raw.split('/').collect();
        if segments.len() < 2 || segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty())
        {
            return Err(RemoteError::InvalidPath(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn child(&self, collection: &str, id: &str) -> Result<Self, RemoteError> {
        validate_id(id)?;
        Self::parse(&format!("{}/{collection}/{id}", self.0))
    }

    /// Everything before the final id, e.g. `users/u1/tasks`.
    pub fn collection(&self) -> &str {
        self.0.rsplit_once('/').map(|(head, _)| head).unwrap_or("")
    }

    pub fn id(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, id)| id).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_id(id: &str) -> Result<(), RemoteError> {
    if id.is_empty() || id.contains('/') {
        return Err(RemoteError::InvalidPath(format!("bad document id {id:?}")));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub data: Fields,
    pub version: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Document {
    pub fn id(&self) -> &str {
        self.path.id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    Overwrite,
    /// Shallow merge: top-level fields in the new data replace old ones,
    /// untouched fields survive.
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Gte,
}

#[derive(Debug, Clone)]
struct Filter {
    field: String,
    op: FilterOp,
    value: Value,
}

/// Equality and lower-bound filters over one collection, with optional
/// ordering and limit.
#[derive(Debug, Clone)]
pub struct Query {
    collection: String,
    filters: Vec<Filter>,
    order_by: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn subcollection(parent: &DocPath, name: &str) -> Self {
        Self::collection(format!("{parent}/{name}"))
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        });
        self
    }

    pub fn where_gte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::Gte,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn to_sql(&self, select: &str) -> Result<(String, Vec<SqlValue>), RemoteError> {
        let mut sql = format!("SELECT {select} FROM documents WHERE collection = ?1");
        let mut values = vec![SqlValue::Text(self.collection.clone())];

        for filter in &self.filters {
            let target = json_field(&filter.field)?;
            match (filter.op, to_sql_value(&filter.value)) {
                (FilterOp::Eq, SqlValue::Null) => {
                    sql.push_str(&format!(" AND {target} IS NULL"));
                }
                (op, value) => {
                    values.push(value);
                    let symbol = if op == FilterOp::Eq { "=" } else { ">=" };
                    sql.push_str(&format!(" AND {target} {symbol} ?{}", values.len()));
                }
            }
        }

        match &self.order_by {
            Some((field, direction)) => sql.push_str(&format!(
                " ORDER BY {} {}, path ASC",
                json_field(field)?,
                direction.as_sql()
            )),
            None => sql.push_str(" ORDER BY created_at ASC, path ASC"),
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        Ok((sql, values))
    }
}

fn json_field(field: &str) -> Result<String, RemoteError> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RemoteError::InvalidPath(format!("bad field name {field:?}")));
    }
    Ok(format!("json_extract(data, '$.{field}')"))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => SqlValue::Real(number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// A committed write, published to watchers after commit.
#[derive(Debug, Clone)]
pub(crate) struct DocChange {
    pub path: DocPath,
    pub document: Option<Document>,
}

/// Handle given to transaction closures. All reads see the transaction's
/// snapshot; writes land only if the closure returns `Ok`.
pub struct DocTransaction<'conn> {
    conn: &'conn Connection,
    now_ms: i64,
    changes: Vec<DocChange>,
}

impl<'conn> DocTransaction<'conn> {
    pub(crate) fn new(conn: &'conn Connection, now_ms: i64) -> Self {
        Self {
            conn,
            now_ms,
            changes: Vec::new(),
        }
    }

    /// Server time for this transaction.
    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms).unwrap_or_default()
    }

    pub fn get(&self, path: &DocPath) -> Result<Option<Document>, RemoteError> {
        read_document(self.conn, path)
    }

    pub fn set(&mut self, path: &DocPath, data: Fields, mode: SetMode) -> Result<Document, RemoteError> {
        let existing = read_document(self.conn, path)?;
        let merged = match (mode, &existing) {
            (SetMode::Merge, Some(previous)) => {
                let mut merged = previous.data.clone();
                merged.extend(data);
                merged
            }
            _ => data,
        };
        self.write(path, merged, existing.as_ref())
    }

    /// Merges `fields` into an existing document; fails with `NotFound` when
    /// there is none.
    pub fn update(&mut self, path: &DocPath, fields: Fields) -> Result<Document, RemoteError> {
        let existing = read_document(self.conn, path)?
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
        let mut merged = existing.data.clone();
        merged.extend(fields);
        self.write(path, merged, Some(&existing))
    }

    /// Adds a document with a generated id.
    pub fn create(&mut self, collection: &str, data: Fields) -> Result<Document, RemoteError> {
        let id = Uuid::new_v4().simple().to_string();
        let path = DocPath::parse(&format!("{collection}/{id}"))?;
        self.write(&path, data, None)
    }

    pub fn delete(&mut self, path: &DocPath) -> Result<bool, RemoteError> {
        let removed = self
            .conn
            .execute("DELETE FROM documents WHERE path = ?1", params![path.as_str()])?;
        if removed > 0 {
            self.changes.push(DocChange {
                path: path.clone(),
                document: None,
            });
        }
        Ok(removed > 0)
    }

    pub fn query(&self, query: &Query) -> Result<Vec<Document>, RemoteError> {
        let (sql, values) = query.to_sql("path, data, version, created_at, updated_at")?;
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values.iter()))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let path: String = row.get(0)?;
            let raw: String = row.get(1)?;
            documents.push(Document {
                path: DocPath::parse(&path)?,
                data: serde_json::from_str(&raw)?,
                version: row.get(2)?,
                created_at_ms: row.get(3)?,
                updated_at_ms: row.get(4)?,
            });
        }
        Ok(documents)
    }

    pub fn count(&self, query: &Query) -> Result<u64, RemoteError> {
        let (sql, values) = query.to_sql("path")?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM ({sql})"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub(crate) fn into_changes(self) -> Vec<DocChange> {
        self.changes
    }

    fn write(
        &mut self,
        path: &DocPath,
        data: Fields,
        previous: Option<&Document>,
    ) -> Result<Document, RemoteError> {
        let document = Document {
            path: path.clone(),
            version: previous.map(|doc| doc.version + 1).unwrap_or(1),
            created_at_ms: previous.map(|doc| doc.created_at_ms).unwrap_or(self.now_ms),
            updated_at_ms: self.now_ms,
            data,
        };
        self.conn.execute(
            "INSERT INTO documents (path, collection, doc_id, data, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(path) DO UPDATE SET
                data = excluded.data,
                version = excluded.version,
                updated_at = excluded.updated_at",
            params![
                path.as_str(),
                path.collection(),
                path.id(),
                serde_json::to_string(&document.data)?,
                document.version,
                document.created_at_ms,
                document.updated_at_ms,
            ],
        )?;
        self.changes.push(DocChange {
            path: path.clone(),
            document: Some(document.clone()),
        });
        Ok(document)
    }
}

pub(crate) fn read_document(conn: &Connection, path: &DocPath) -> Result<Option<Document>, RemoteError> {
    let row = conn
        .query_row(
            "SELECT data, version, created_at, updated_at FROM documents WHERE path = ?1",
            params![path.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(raw, version, created_at_ms, updated_at_ms)| -> Result<Document, RemoteError> {
        Ok(Document {
            path: path.clone(),
            data: serde_json::from_str(&raw)?,
            version,
            created_at_ms,
            updated_at_ms,
        })
    })
    .transpose()
}

/// Builds a [`Fields`] map from `key => value` pairs.
#[macro_export]
macro_rules! fields {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::db::Fields::new();
        $( map.insert(String::from($key), serde_json::json!($value)); )*
        map
    }};
}
