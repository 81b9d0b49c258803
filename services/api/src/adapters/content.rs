//! services/api/src/adapters/content.rs
//!
//! This module contains the chunked binary content adapter, the concrete
//! implementation of the `ContentStore` port. Document bytes are stored in
//! PostgreSQL as fixed-size chunks referenced by an opaque content id.

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::PgPool;
use study_shelf_core::domain::StoredContent;
use study_shelf_core::ports::{ContentStore, ContentStream, PortError, PortResult};
use uuid::Uuid;

/// Chunk rows never exceed this many bytes.
const CHUNK_SIZE: usize = 256 * 1024;

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// A database adapter that implements the `ContentStore` port.
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    /// Creates a new `PgContentStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn put(&self, file_name: &str, mime_type: &str, data: Bytes) -> PortResult<StoredContent> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO content_files (id, file_name, mime_type, size_bytes) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(file_name)
        .bind(mime_type)
        .bind(data.len() as i64)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        for (seq, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
            sqlx::query("INSERT INTO content_chunks (content_id, seq, data) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(seq as i32)
                .bind(chunk)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;

        Ok(StoredContent {
            id,
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            size_bytes: data.len() as i64,
        })
    }

    async fn open_read(&self, content_id: Uuid) -> PortResult<ContentStream> {
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM content_files WHERE id = $1")
            .bind(content_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        if exists.is_none() {
            return Err(PortError::NotFound(format!("Content {} not found", content_id)));
        }

        // Chunks are pulled one row at a time so a large file never has to
        // be resident in the adapter; the ceiling is the caller's concern.
        let pool = self.pool.clone();
        let stream = async_stream::try_stream! {
            let mut seq: i32 = 0;
            loop {
                let chunk: Option<Vec<u8>> = sqlx::query_scalar(
                    "SELECT data FROM content_chunks WHERE content_id = $1 AND seq = $2",
                )
                .bind(content_id)
                .bind(seq)
                .fetch_optional(&pool)
                .await
                .map_err(unexpected)?;

                match chunk {
                    Some(data) => {
                        yield Bytes::from(data);
                        seq += 1;
                    }
                    None => break,
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn delete(&self, content_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM content_files WHERE id = $1")
            .bind(content_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Content {} not found", content_id)));
        }
        Ok(())
    }
}
