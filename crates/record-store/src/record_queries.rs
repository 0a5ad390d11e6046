use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::record::{FileRecord, NewRecord, RecordChanges};

const RECORD_COLUMNS: &str = "id, path, kind, target_id, attrs, contents, mode, nlink, size, \
                              uid, gid, created_at, atime, mtime, ctime";

/// Prefix shared by every descendant of `dir`.
fn child_prefix(dir: &str) -> String {
    if dir == "/" {
        "/".to_string()
    } else {
        format!("{}/", dir.trim_end_matches('/'))
    }
}

impl Database {
    /// Insert a record. Fails with [`StoreError::UniqueViolation`] without
    /// touching the table if the path is taken.
    pub async fn create(&self, record: &NewRecord) -> Result<FileRecord> {
        let sql = format!(
            r#"
            INSERT INTO files (
                path, kind, target_id, contents, mode, nlink, size, uid, gid,
                created_at, atime, mtime, ctime
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, ?10, ?10)
            RETURNING {RECORD_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(&record.path)
            .bind(record.kind)
            .bind(record.target_id)
            .bind(record.contents.as_deref())
            .bind(record.mode)
            .bind(record.nlink)
            .bind(record.size())
            .bind(record.uid)
            .bind(record.gid)
            .bind(record.now)
            .fetch_one(&**self)
            .await
            .map_err(|e| StoreError::from_write(e, &record.path))?;

        debug!(path = %created.path, kind = %created.kind, id = created.id, "record created");
        Ok(created)
    }

    /// Look a record up by its path.
    pub async fn find_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM files WHERE path = ?1");
        let record = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(path)
            .fetch_optional(&**self)
            .await?;
        Ok(record)
    }

    /// Look a record up by its row id.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM files WHERE id = ?1");
        let record = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(id)
            .fetch_optional(&**self)
            .await?;
        Ok(record)
    }

    /// Immediate children of `dir`, ordered by path. The root record is
    /// never part of a listing.
    pub async fn find_children(&self, dir: &str) -> Result<Vec<FileRecord>> {
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM files
            WHERE path != '/'
              AND substr(path, 1, length(?1)) = ?1
              AND length(path) > length(?1)
              AND instr(substr(path, length(?1) + 1), '/') = 0
            ORDER BY path ASC
            "#
        );

        let records = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(child_prefix(dir))
            .fetch_all(&**self)
            .await?;
        Ok(records)
    }

    /// Whether anything lives below `dir`.
    pub async fn has_children(&self, dir: &str) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM files
                WHERE path != '/'
                  AND substr(path, 1, length(?1)) = ?1
                  AND length(path) > length(?1)
            ) AS present
            "#,
        )
        .bind(child_prefix(dir))
        .fetch_one(&**self)
        .await?;
        Ok(row.get::<i64, _>("present") != 0)
    }

    /// Apply `changes` to the record at `path`, returning the number of
    /// rows touched. An empty change set issues no statement.
    pub async fn update(&self, path: &str, changes: &RecordChanges) -> Result<u64> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE files SET ");
        let mut set = builder.separated(", ");
        if let Some(mode) = changes.mode {
            set.push("mode = ").push_bind_unseparated(mode);
        }
        if let Some(uid) = changes.uid {
            set.push("uid = ").push_bind_unseparated(uid);
        }
        if let Some(gid) = changes.gid {
            set.push("gid = ").push_bind_unseparated(gid);
        }
        if let Some(contents) = &changes.contents {
            set.push("contents = ").push_bind_unseparated(contents.clone());
        }
        if let Some(size) = changes.size {
            set.push("size = ").push_bind_unseparated(size);
        }
        if let Some(atime) = changes.atime {
            set.push("atime = ").push_bind_unseparated(atime);
        }
        if let Some(mtime) = changes.mtime {
            set.push("mtime = ").push_bind_unseparated(mtime);
        }
        if let Some(ctime) = changes.ctime {
            set.push("ctime = ").push_bind_unseparated(ctime);
        }
        builder.push(" WHERE path = ").push_bind(path);

        let result = builder.build().execute(&**self).await?;
        Ok(result.rows_affected())
    }

    /// Add `delta` to the link count of the record at `path`.
    pub async fn adjust_link_count(&self, path: &str, delta: i64) -> Result<u64> {
        let result = sqlx::query("UPDATE files SET nlink = MAX(nlink + ?1, 0) WHERE path = ?2")
            .bind(delta)
            .bind(path)
            .execute(&**self)
            .await?;
        Ok(result.rows_affected())
    }

    /// Move the record at `old` and everything below it to `new`.
    ///
    /// Runs as one statement, so a path collision anywhere in the subtree
    /// leaves the table untouched.
    pub async fn rename_tree(&self, old: &str, new: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET path = ?2 || substr(path, length(?1) + 1)
            WHERE path = ?1 OR substr(path, 1, length(?1) + 1) = ?1 || '/'
            "#,
        )
        .bind(old)
        .bind(new)
        .execute(&**self)
        .await
        .map_err(|e| StoreError::from_write(e, new))?;

        debug!(old = %old, new = %new, rows = result.rows_affected(), "records renamed");
        Ok(result.rows_affected())
    }

    /// Delete the record at `path`, returning the number of rows removed.
    pub async fn delete(&self, path: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM files WHERE path = ?1")
            .bind(path)
            .execute(&**self)
            .await?;
        Ok(result.rows_affected())
    }
}
