//! Entry CRUD within one named container.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use crate::Error;
use crate::request::{Request, Response};
use crate::storage::{CacheContainer, CachedRequest};

/// A container inside a [`CacheDb`].
///
/// `put` never recreates a deleted container; only `open` and `add_all` do.
pub(crate) struct SqliteContainer {
    db: CacheDb,
    name: String,
}

/// Owned row data moved into the database thread.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    final_url: String,
    status: u16,
    headers_json: String,
    body: Bytes,
}

impl EntryRow {
    fn new(request: &Request, response: &Response) -> Result<Self, Error> {
        Ok(Self {
            key_hash: request.key(),
            method: request.method().to_string(),
            url: request.url().to_string(),
            final_url: response.url.clone(),
            status: response.status,
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.clone(),
        })
    }
}

const UPSERT_ENTRY: &str = "INSERT INTO entries (
        cache_name, key_hash, method, url, final_url, status, headers_json, body, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(cache_name, key_hash) DO UPDATE SET
        method = excluded.method,
        url = excluded.url,
        final_url = excluded.final_url,
        status = excluded.status,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

const ENSURE_CONTAINER: &str = "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)";

const CONTAINER_EXISTS: &str = "SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)";

fn upsert(conn: &rusqlite::Connection, cache_name: &str, row: &EntryRow, stored_at: &str) -> Result<(), Error> {
    conn.execute(
        UPSERT_ENTRY,
        params![
            cache_name,
            &row.key_hash,
            &row.method,
            &row.url,
            &row.final_url,
            row.status,
            &row.headers_json,
            &row.body[..],
            stored_at,
        ],
    )?;
    Ok(())
}

impl SqliteContainer {
    pub(crate) fn new(db: CacheDb, name: &str) -> Self {
        Self { db, name: name.to_string() }
    }
}

#[async_trait]
impl CacheContainer for SqliteContainer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        let name = self.name.clone();
        let key_hash = request.key();
        self.db
            .conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT final_url, status, headers_json, body
                    FROM entries WHERE cache_name = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![name, key_hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                });

                match result {
                    Ok((url, status, headers_json, body)) => {
                        let headers = serde_json::from_str(&headers_json)?;
                        Ok(Some(Response { url, status, headers, body: Bytes::from(body) }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        let name = self.name.clone();
        let row = EntryRow::new(request, response)?;
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let exists: bool = conn.query_row(CONTAINER_EXISTS, params![name], |row| row.get(0))?;
                if !exists {
                    return Err(Error::InvalidState(format!("container {name} has been deleted")));
                }
                upsert(conn, &name, &row, &chrono::Utc::now().to_rfc3339())
            })
            .await
            .map_err(Error::from)
    }

    async fn add_all(&self, entries: Vec<(Request, Response)>) -> Result<(), Error> {
        let name = self.name.clone();
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let now = chrono::Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                tx.execute(ENSURE_CONTAINER, params![name, now])?;
                for row in &rows {
                    upsert(&tx, &name, row, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn requests(&self) -> Result<Vec<CachedRequest>, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<CachedRequest>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE cache_name = ?1 ORDER BY rowid")?;
                let requests = stmt
                    .query_map(params![name], |row| Ok(CachedRequest { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(requests)
            })
            .await
            .map_err(Error::from)
    }

    async fn len(&self) -> Result<usize, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE cache_name = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }
}
