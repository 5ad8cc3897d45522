//! SQL operations for the `jobs` table.
//!
//! Column names follow the schema of earlier deployments so existing
//! databases keep working. Every column except `job_id` is nullable.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobRow {
    pub job_id: String,
    pub title: Option<String>,
    pub filename: Option<String>,
    pub filepath: Option<String>,
    pub resultpath: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub completed_at: Option<String>,
    pub pages: Option<i64>,
    pub size_bytes: Option<i64>,
    pub extra: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            title: row.get("title")?,
            filename: row.get("filename")?,
            filepath: row.get("filepath")?,
            resultpath: row.get("resultpath")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            completed_at: row.get("completed_at")?,
            pages: row.get("pages")?,
            size_bytes: row.get("size_bytes")?,
            extra: row.get("extra")?,
        })
    }
}

/// Values written by a terminal update.
#[derive(Debug, Clone)]
pub struct TerminalUpdate<'a> {
    pub resultpath: &'a str,
    pub status: &'a str,
    pub completed_at: &'a str,
    pub pages: Option<i64>,
    pub title: Option<&'a str>,
}

/// Inserts a new job row. Fails if the id already exists.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (job_id, title, filename, filepath, resultpath, status,
             created_at, completed_at, pages, size_bytes, extra)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.job_id,
                job.title,
                job.filename,
                job.filepath,
                job.resultpath,
                job.status,
                job.created_at,
                job.completed_at,
                job.pages,
                job.size_bytes,
                job.extra,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, job_id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE job_id = ?1")?;
        let mut rows = stmt.query_map(params![job_id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists the most recent jobs, newest first. Rows created within the same
/// timestamp keep insertion order (later insert first).
pub fn list_recent(db: &Database, limit: u64) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM jobs ORDER BY created_at DESC, rowid DESC LIMIT ?1")?;
        let rows = stmt
            .query_map(params![limit as i64], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Moves a pending job to a terminal status.
///
/// Only rows still `pending` (or with no status at all) are touched, which
/// keeps the status transition one-way. A `None` title leaves the stored
/// title alone. Returns whether a row changed.
pub fn update_terminal(
    db: &Database,
    job_id: &str,
    update: &TerminalUpdate<'_>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET resultpath = ?2, status = ?3, completed_at = ?4, pages = ?5,
             title = COALESCE(?6, title)
             WHERE job_id = ?1 AND (status IS NULL OR status = 'pending')",
            params![
                job_id,
                update.resultpath,
                update.status,
                update.completed_at,
                update.pages,
                update.title,
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Overwrites the title of a job regardless of its status.
pub fn update_title(db: &Database, job_id: &str, title: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET title = ?2 WHERE job_id = ?1",
            params![job_id, title],
        )?;
        Ok(changed > 0)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_job(id: &str) -> JobRow {
        JobRow {
            job_id: id.to_string(),
            title: None,
            filename: Some("scan.pdf".to_string()),
            filepath: Some(format!("/data/uploads/{}_scan.pdf", id)),
            resultpath: None,
            status: Some("pending".to_string()),
            created_at: Some("2026-01-01T00:00:00.000000Z".to_string()),
            completed_at: None,
            pages: None,
            size_bytes: Some(1024),
            extra: Some("{}".to_string()),
        }
    }

    fn completed(resultpath: &str) -> TerminalUpdate<'_> {
        TerminalUpdate {
            resultpath,
            status: "completed",
            completed_at: "2026-01-01T00:01:00.000000Z",
            pages: Some(3),
            title: Some("Quarterly report"),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_job("job-1")).unwrap();

        let found = find_by_id(&db, "job-1").unwrap().unwrap();
        assert_eq!(found.filename.as_deref(), Some("scan.pdf"));
        assert_eq!(found.status.as_deref(), Some("pending"));
        assert_eq!(found.size_bytes, Some(1024));
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let db = test_db();
        insert(&db, &sample_job("dup")).unwrap();
        assert!(insert(&db, &sample_job("dup")).is_err());
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_update_terminal_sets_fields() {
        let db = test_db();
        insert(&db, &sample_job("t1")).unwrap();

        assert!(update_terminal(&db, "t1", &completed("/data/results/t1.json")).unwrap());

        let found = find_by_id(&db, "t1").unwrap().unwrap();
        assert_eq!(found.status.as_deref(), Some("completed"));
        assert_eq!(found.resultpath.as_deref(), Some("/data/results/t1.json"));
        assert_eq!(found.pages, Some(3));
        assert_eq!(found.title.as_deref(), Some("Quarterly report"));
        assert!(found.completed_at.is_some());
    }

    #[test]
    fn test_update_terminal_is_one_way() {
        let db = test_db();
        insert(&db, &sample_job("t2")).unwrap();
        assert!(update_terminal(&db, "t2", &completed("/r.json")).unwrap());

        let failed = TerminalUpdate {
            resultpath: "/r.json",
            status: "failed",
            completed_at: "2026-01-01T00:02:00.000000Z",
            pages: None,
            title: None,
        };
        assert!(!update_terminal(&db, "t2", &failed).unwrap());

        let found = find_by_id(&db, "t2").unwrap().unwrap();
        assert_eq!(found.status.as_deref(), Some("completed"));
        assert_eq!(found.pages, Some(3));
    }

    #[test]
    fn test_update_terminal_without_title_keeps_existing() {
        let db = test_db();
        let mut job = sample_job("t3");
        job.title = Some("Set early".to_string());
        insert(&db, &job).unwrap();

        let update = TerminalUpdate {
            title: None,
            ..completed("/r.json")
        };
        update_terminal(&db, "t3", &update).unwrap();

        let found = find_by_id(&db, "t3").unwrap().unwrap();
        assert_eq!(found.title.as_deref(), Some("Set early"));
    }

    #[test]
    fn test_update_title() {
        let db = test_db();
        insert(&db, &sample_job("t4")).unwrap();
        assert!(update_title(&db, "t4", "Backfilled").unwrap());
        assert!(!update_title(&db, "missing", "Backfilled").unwrap());

        let found = find_by_id(&db, "t4").unwrap().unwrap();
        assert_eq!(found.title.as_deref(), Some("Backfilled"));
    }

    #[test]
    fn test_list_recent_orders_and_limits() {
        let db = test_db();
        for i in 0..10 {
            let mut job = sample_job(&format!("p{}", i));
            job.created_at = Some(format!("2026-01-{:02}T00:00:00.000000Z", i + 1));
            insert(&db, &job).unwrap();
        }

        let rows = list_recent(&db, 3).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.job_id.as_str()).collect();
        assert_eq!(ids, vec!["p9", "p8", "p7"]);
    }

    #[test]
    fn test_list_recent_same_timestamp_uses_insertion_order() {
        let db = test_db();
        insert(&db, &sample_job("first")).unwrap();
        insert(&db, &sample_job("second")).unwrap();

        let rows = list_recent(&db, 10).unwrap();
        assert_eq!(rows[0].job_id, "second");
        assert_eq!(rows[1].job_id, "first");
    }

    #[test]
    fn test_count_by_status() {
        let db = test_db();
        insert(&db, &sample_job("c1")).unwrap();
        insert(&db, &sample_job("c2")).unwrap();
        update_terminal(&db, "c2", &completed("/r.json")).unwrap();

        assert_eq!(count_by_status(&db, "pending").unwrap(), 1);
        assert_eq!(count_by_status(&db, "completed").unwrap(), 1);
        assert_eq!(count_by_status(&db, "failed").unwrap(), 0);
    }
}
