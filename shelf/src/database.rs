//! SQLite database layer for clip metadata and the snippet tree
//!
//! Three tables: `clips` (history metadata, payloads live in files),
//! `folders` and `snippets`. Uses r2d2 connection pooling; every public
//! mutation is one transaction, nothing spans calls.

use crate::interface::{Attachment, ClipRecord, Folder, HistoryOrder, Snippet};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

const CLIP_COLUMNS: &str = "dataHash, dataPath, title, primaryType, updateTime, thumbnailPath";
const SNIPPET_COLUMNS: &str = "identifier, folderId, idx, enable, title, content";

/// Thread-safe database wrapper using connection pooling
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create a database at the given path with connection pooling
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA foreign_keys=ON;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(4).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys=ON;")?;
            Ok(())
        });

        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Get a connection from the pool
    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS clips (
                dataHash TEXT PRIMARY KEY NOT NULL,
                dataPath TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                primaryType TEXT NOT NULL DEFAULT '',
                updateTime INTEGER NOT NULL,
                thumbnailPath TEXT
            );

            CREATE TABLE IF NOT EXISTS folders (
                identifier TEXT PRIMARY KEY NOT NULL,
                idx INTEGER NOT NULL DEFAULT 0,
                enable INTEGER NOT NULL DEFAULT 1,
                title TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS snippets (
                identifier TEXT PRIMARY KEY NOT NULL,
                folderId TEXT REFERENCES folders(identifier),
                idx INTEGER NOT NULL DEFAULT 0,
                enable INTEGER NOT NULL DEFAULT 1,
                title TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_clips_update_time ON clips(updateTime);
            CREATE INDEX IF NOT EXISTS idx_snippets_folder ON snippets(folderId, idx);
        "#,
        )?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Clips
    // ─────────────────────────────────────────────────────────────────────────

    pub fn count_clips(&self) -> DatabaseResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM clips", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn find_clip(&self, hash: &str) -> DatabaseResult<Option<ClipRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM clips WHERE dataHash = ?1", CLIP_COLUMNS);
        Ok(conn.query_row(&sql, [hash], Self::row_to_clip).optional()?)
    }

    /// Insert or replace a clip row keyed by hash.
    /// Returns the previous row when one was replaced.
    pub fn upsert_clip(&self, clip: &ClipRecord) -> DatabaseResult<Option<ClipRecord>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let select = format!("SELECT {} FROM clips WHERE dataHash = ?1", CLIP_COLUMNS);
        let previous = tx.query_row(&select, [&clip.data_hash], Self::row_to_clip).optional()?;

        tx.execute(
            r#"INSERT INTO clips (dataHash, dataPath, title, primaryType, updateTime, thumbnailPath)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT(dataHash) DO UPDATE SET
                   dataPath = excluded.dataPath,
                   title = excluded.title,
                   primaryType = excluded.primaryType,
                   updateTime = excluded.updateTime,
                   thumbnailPath = excluded.thumbnailPath"#,
            params![
                clip.data_hash,
                clip.data_path,
                clip.title,
                clip.primary_type,
                clip.update_time,
                clip.thumbnail_path,
            ],
        )?;

        tx.commit()?;
        Ok(previous)
    }

    pub fn update_clip_time(&self, hash: &str, update_time: i64) -> DatabaseResult<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE clips SET updateTime = ?1 WHERE dataHash = ?2",
            params![update_time, hash],
        )?;
        Ok(changed > 0)
    }

    /// Clips ordered by update time; ties broken by insertion order
    pub fn fetch_clips(&self, order: HistoryOrder, limit: Option<usize>) -> DatabaseResult<Vec<ClipRecord>> {
        let conn = self.get_conn()?;
        let direction = match order {
            HistoryOrder::NewestFirst => "DESC",
            HistoryOrder::OldestFirst => "ASC",
        };
        let sql = format!(
            "SELECT {} FROM clips ORDER BY updateTime {dir}, rowid {dir} LIMIT ?1",
            CLIP_COLUMNS,
            dir = direction
        );
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(&sql)?;
        let clips = stmt
            .query_map([limit], Self::row_to_clip)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(clips)
    }

    /// Delete everything past the newest `keep` clips; returns the deleted rows
    pub fn delete_clips_beyond(&self, keep: usize) -> DatabaseResult<Vec<ClipRecord>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let sql = format!(
            "SELECT {} FROM clips ORDER BY updateTime DESC, rowid DESC LIMIT -1 OFFSET ?1",
            CLIP_COLUMNS
        );
        let doomed = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map([keep as i64], Self::row_to_clip)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        for clip in &doomed {
            tx.execute("DELETE FROM clips WHERE dataHash = ?1", [&clip.data_hash])?;
        }

        tx.commit()?;
        Ok(doomed)
    }

    pub fn delete_clip(&self, hash: &str) -> DatabaseResult<Option<ClipRecord>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let select = format!("SELECT {} FROM clips WHERE dataHash = ?1", CLIP_COLUMNS);
        let existing = tx.query_row(&select, [hash], Self::row_to_clip).optional()?;
        if existing.is_some() {
            tx.execute("DELETE FROM clips WHERE dataHash = ?1", [hash])?;
        }
        tx.commit()?;
        Ok(existing)
    }

    /// Delete all clip rows, returning them so their files can be removed
    pub fn clear_clips(&self) -> DatabaseResult<Vec<ClipRecord>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let sql = format!("SELECT {} FROM clips", CLIP_COLUMNS);
        let all = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map([], Self::row_to_clip)?.collect::<Result<Vec<_>, _>>()?;
            rows
        };
        tx.execute("DELETE FROM clips", [])?;
        tx.commit()?;
        Ok(all)
    }

    fn row_to_clip(row: &rusqlite::Row) -> rusqlite::Result<ClipRecord> {
        Ok(ClipRecord {
            data_hash: row.get(0)?,
            data_path: row.get(1)?,
            title: row.get(2)?,
            primary_type: row.get(3)?,
            update_time: row.get(4)?,
            thumbnail_path: row.get(5)?,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Folders
    // ─────────────────────────────────────────────────────────────────────────

    pub fn max_folder_index(&self) -> DatabaseResult<Option<i64>> {
        let conn = self.get_conn()?;
        Ok(conn.query_row("SELECT MAX(idx) FROM folders", [], |row| row.get(0))?)
    }

    /// Fetch one folder with its snippets ordered by index
    pub fn fetch_folder(&self, identifier: &str) -> DatabaseResult<Option<Folder>> {
        let conn = self.get_conn()?;
        let folder = conn
            .query_row(
                "SELECT identifier, idx, enable, title FROM folders WHERE identifier = ?1",
                [identifier],
                Self::row_to_folder,
            )
            .optional()?;
        match folder {
            Some(mut folder) => {
                folder.snippets = Self::snippets_in(&conn, &folder.identifier)?;
                Ok(Some(folder))
            }
            None => Ok(None),
        }
    }

    /// All folders ordered by index, each with its ordered snippets
    pub fn fetch_folders(&self) -> DatabaseResult<Vec<Folder>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT identifier, idx, enable, title FROM folders ORDER BY idx, rowid")?;
        let mut folders = stmt
            .query_map([], Self::row_to_folder)?
            .collect::<Result<Vec<_>, _>>()?;
        for folder in &mut folders {
            folder.snippets = Self::snippets_in(&conn, &folder.identifier)?;
        }
        Ok(folders)
    }

    /// Insert a folder row (scalars only)
    pub fn insert_folder(&self, folder: &Folder) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO folders (identifier, idx, enable, title) VALUES (?1, ?2, ?3, ?4)",
            params![folder.identifier, folder.index, folder.enable, folder.title],
        )?;
        Ok(())
    }

    /// Insert a folder and all of its snippets in one transaction
    pub fn insert_folder_tree(&self, folder: &Folder) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO folders (identifier, idx, enable, title) VALUES (?1, ?2, ?3, ?4)",
            params![folder.identifier, folder.index, folder.enable, folder.title],
        )?;
        for snippet in &folder.snippets {
            tx.execute(
                r#"INSERT INTO snippets (identifier, folderId, idx, enable, title, content)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                   ON CONFLICT(identifier) DO UPDATE SET
                       folderId = excluded.folderId, idx = excluded.idx, enable = excluded.enable,
                       title = excluded.title, content = excluded.content"#,
                params![
                    snippet.identifier,
                    folder.identifier,
                    snippet.index,
                    snippet.enable,
                    snippet.title,
                    snippet.content,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Update scalar fields of an existing folder. Returns false if absent.
    pub fn update_folder(&self, folder: &Folder) -> DatabaseResult<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE folders SET idx = ?1, enable = ?2, title = ?3 WHERE identifier = ?4",
            params![folder.index, folder.enable, folder.title, folder.identifier],
        )?;
        Ok(changed > 0)
    }

    pub fn set_folder_index(&self, identifier: &str, index: i64) -> DatabaseResult<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE folders SET idx = ?1 WHERE identifier = ?2",
            params![index, identifier],
        )?;
        Ok(changed > 0)
    }

    /// Set `idx` = position for each folder identifier, in one transaction
    pub fn reorder_folders(&self, ordered: &[String]) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        for (position, identifier) in ordered.iter().enumerate() {
            tx.execute(
                "UPDATE folders SET idx = ?1 WHERE identifier = ?2",
                params![position as i64, identifier],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete every snippet owned by a folder (one transaction)
    pub fn delete_snippets_in(&self, folder_identifier: &str) -> DatabaseResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM snippets WHERE folderId = ?1", [folder_identifier])?;
        tx.commit()?;
        Ok(deleted)
    }

    /// Delete the folder row itself (one transaction)
    pub fn delete_folder_row(&self, identifier: &str) -> DatabaseResult<bool> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM folders WHERE identifier = ?1", [identifier])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn row_to_folder(row: &rusqlite::Row) -> rusqlite::Result<Folder> {
        Ok(Folder {
            identifier: row.get(0)?,
            index: row.get(1)?,
            enable: row.get(2)?,
            title: row.get(3)?,
            snippets: Vec::new(),
            attachment: Attachment::Attached,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snippets
    // ─────────────────────────────────────────────────────────────────────────

    pub fn fetch_snippet(&self, identifier: &str) -> DatabaseResult<Option<Snippet>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM snippets WHERE identifier = ?1", SNIPPET_COLUMNS);
        Ok(conn.query_row(&sql, [identifier], Self::row_to_snippet).optional()?)
    }

    /// Upsert a snippet's scalar fields. The owning folder is left untouched
    /// for existing rows; new rows are created with `folder_identifier`.
    pub fn upsert_snippet(&self, snippet: &Snippet, folder_identifier: Option<&str>) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO snippets (identifier, folderId, idx, enable, title, content)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT(identifier) DO UPDATE SET
                   idx = excluded.idx, enable = excluded.enable,
                   title = excluded.title, content = excluded.content"#,
            params![
                snippet.identifier,
                folder_identifier,
                snippet.index,
                snippet.enable,
                snippet.title,
                snippet.content,
            ],
        )?;
        Ok(())
    }

    /// Rewrite a folder's membership: `ordered` becomes exactly the folder's
    /// snippet list, with `idx` set to list position. Snippets previously in
    /// the folder but absent from `ordered` are detached (folderId NULL).
    pub fn replace_folder_members(&self, folder_identifier: &str, ordered: &[String]) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE snippets SET folderId = NULL WHERE folderId = ?1",
            [folder_identifier],
        )?;
        for (position, identifier) in ordered.iter().enumerate() {
            tx.execute(
                "UPDATE snippets SET folderId = ?1, idx = ?2 WHERE identifier = ?3",
                params![folder_identifier, position as i64, identifier],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn delete_snippet(&self, identifier: &str) -> DatabaseResult<bool> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM snippets WHERE identifier = ?1", [identifier])?;
        Ok(deleted > 0)
    }

    fn snippets_in(conn: &rusqlite::Connection, folder_identifier: &str) -> DatabaseResult<Vec<Snippet>> {
        let sql = format!(
            "SELECT {} FROM snippets WHERE folderId = ?1 ORDER BY idx, rowid",
            SNIPPET_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let snippets = stmt
            .query_map([folder_identifier], Self::row_to_snippet)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(snippets)
    }

    fn row_to_snippet(row: &rusqlite::Row) -> rusqlite::Result<Snippet> {
        Ok(Snippet {
            identifier: row.get(0)?,
            folder_identifier: row.get(1)?,
            index: row.get(2)?,
            enable: row.get(3)?,
            title: row.get(4)?,
            content: row.get(5)?,
            attachment: Attachment::Attached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(hash: &str, time: i64) -> ClipRecord {
        ClipRecord {
            data_hash: hash.to_string(),
            data_path: format!("/tmp/{}.data", hash),
            title: hash.to_string(),
            primary_type: "String".to_string(),
            update_time: time,
            thumbnail_path: None,
        }
    }

    #[test]
    fn test_upsert_clip_returns_previous() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.upsert_clip(&clip("a", 1)).unwrap().is_none());

        let mut newer = clip("a", 5);
        newer.data_path = "/tmp/other.data".into();
        let previous = db.upsert_clip(&newer).unwrap().unwrap();
        assert_eq!(previous.data_path, "/tmp/a.data");
        assert_eq!(db.count_clips().unwrap(), 1);
        assert_eq!(db.find_clip("a").unwrap().unwrap().update_time, 5);
    }

    #[test]
    fn test_fetch_clips_order() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_clip(&clip("old", 1)).unwrap();
        db.upsert_clip(&clip("new", 3)).unwrap();
        db.upsert_clip(&clip("mid", 2)).unwrap();

        let newest: Vec<_> = db
            .fetch_clips(HistoryOrder::NewestFirst, None)
            .unwrap()
            .into_iter()
            .map(|c| c.data_hash)
            .collect();
        assert_eq!(newest, vec!["new", "mid", "old"]);

        let oldest = db.fetch_clips(HistoryOrder::OldestFirst, Some(1)).unwrap();
        assert_eq!(oldest[0].data_hash, "old");
    }

    #[test]
    fn test_delete_clips_beyond() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.upsert_clip(&clip(&format!("c{}", i), i)).unwrap();
        }
        let deleted = db.delete_clips_beyond(2).unwrap();
        assert_eq!(deleted.len(), 3);
        assert_eq!(db.count_clips().unwrap(), 2);
        assert!(db.find_clip("c4").unwrap().is_some());
        assert!(db.find_clip("c3").unwrap().is_some());
        assert!(db.find_clip("c0").unwrap().is_none());
    }

    #[test]
    fn test_folder_member_replacement_detaches_missing() {
        let db = Database::open_in_memory().unwrap();
        let folder = Folder {
            identifier: "f".into(),
            index: 0,
            enable: true,
            title: "F".into(),
            snippets: Vec::new(),
            attachment: Attachment::Detached,
        };
        db.insert_folder(&folder).unwrap();
        for id in ["s1", "s2"] {
            let snippet = Snippet {
                identifier: id.into(),
                index: 0,
                enable: true,
                title: id.into(),
                content: String::new(),
                folder_identifier: None,
                attachment: Attachment::Detached,
            };
            db.upsert_snippet(&snippet, Some("f")).unwrap();
        }

        db.replace_folder_members("f", &["s2".to_string()]).unwrap();
        let fetched = db.fetch_folder("f").unwrap().unwrap();
        assert_eq!(fetched.snippets.len(), 1);
        assert_eq!(fetched.snippets[0].identifier, "s2");
        assert_eq!(fetched.snippets[0].index, 0);
        assert_eq!(db.fetch_snippet("s1").unwrap().unwrap().folder_identifier, None);
    }
}
