use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use tracing::info;

use crate::table::NormalizedTable;

/// Open (or create) the dashboard database, creating parent directories
/// the way the upload tool expects its `db/` folder to appear on first run.
pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }
    }
    Connection::open(path).with_context(|| format!("opening database {}", path.display()))
}

/// Write the normalized table under `name`, replacing any existing table of
/// that name. Pass-through bulk write: one row per (category, date), the
/// five metrics as nullable REALs, and any metric rows outside the expected
/// five as a JSON blob so nothing from the upload is lost.
pub fn save_table(conn: &mut Connection, name: &str, table: &NormalizedTable) -> Result<usize> {
    validate_table_name(name)?;

    let tx = conn.transaction().context("starting transaction")?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS \"{name}\";
         CREATE TABLE \"{name}\" (
             category    TEXT NOT NULL,
             date        TEXT NOT NULL,
             total_tests REAL,
             pass        REAL,
             false_defect REAL,
             true_defect  REAL,
             fail        REAL,
             extra       TEXT
         );"
    ))
    .with_context(|| format!("recreating table {name}"))?;

    {
        let mut stmt = tx
            .prepare(&format!(
                "INSERT INTO \"{name}\" (category, date, total_tests, pass, false_defect, true_defect, fail, extra)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ))
            .context("preparing insert")?;
        for row in &table.rows {
            let extra = if row.extra.is_empty() {
                None
            } else {
                Some(
                    serde_json::to_string(&row.extra)
                        .with_context(|| format!("encoding extra metrics for ({}, {})", row.category, row.date))?,
                )
            };
            stmt.execute(params![
                row.category,
                row.date,
                row.total_tests,
                row.pass,
                row.false_defect,
                row.true_defect,
                row.fail,
                extra,
            ])
            .with_context(|| format!("inserting ({}, {})", row.category, row.date))?;
        }
    }
    tx.commit().context("committing")?;

    info!(table = name, rows = table.rows.len(), "saved normalized table");
    Ok(table.rows.len())
}

/// Names of all user tables in the database.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .context("querying sqlite_master")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !head_ok || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("invalid table name `{name}`: use letters, digits and underscores");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest;
    use tempfile::tempdir;

    const UPLOAD: &str = "\
지표,250908,250909
총 테스트 수,4157,5798
PASS,3944,5548
가성불량,81,N/A
진성불량,132,140
FAIL,213,250
";

    #[test]
    fn saved_rows_can_be_queried_back() -> Result<()> {
        let dir = tempdir()?;
        let mut conn = open_db(&dir.path().join("db").join("inspection.sqlite3"))?;
        let table = ingest::parse_text(UPLOAD).unwrap().table;

        let written = save_table(&mut conn, "historyinspection", &table)?;
        assert_eq!(written, 2);

        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM historyinspection", [], |r| r.get(0))?;
        assert_eq!(count, 2);

        let (pass, false_defect): (Option<f64>, Option<f64>) = conn.query_row(
            "SELECT pass, false_defect FROM historyinspection WHERE date = '250909'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        assert_eq!(pass, Some(5548.0));
        assert_eq!(false_defect, None);

        assert_eq!(list_tables(&conn)?, vec!["historyinspection".to_string()]);
        Ok(())
    }

    #[test]
    fn unexpected_metric_rows_are_persisted_as_json() -> Result<()> {
        let dir = tempdir()?;
        let mut conn = open_db(&dir.path().join("inspection.sqlite3"))?;
        let text = "\
지표,250908,250909
PASS,3944,5548
재검수,17,
";
        let table = ingest::parse_text(text).unwrap().table;

        save_table(&mut conn, "historyinspection", &table)?;

        let extra: Option<String> = conn.query_row(
            "SELECT extra FROM historyinspection WHERE date = '250908'",
            [],
            |r| r.get(0),
        )?;
        assert_eq!(extra.as_deref(), Some(r#"{"재검수":"17"}"#));

        // The second date's cell was blank but the metric row still rides
        // along verbatim.
        let extra: Option<String> = conn.query_row(
            "SELECT extra FROM historyinspection WHERE date = '250909'",
            [],
            |r| r.get(0),
        )?;
        assert_eq!(extra.as_deref(), Some(r#"{"재검수":""}"#));
        Ok(())
    }

    #[test]
    fn rows_without_extras_store_a_null_blob() -> Result<()> {
        let dir = tempdir()?;
        let mut conn = open_db(&dir.path().join("inspection.sqlite3"))?;
        let table = ingest::parse_text(UPLOAD).unwrap().table;

        save_table(&mut conn, "historyinspection", &table)?;

        let extra: Option<String> = conn.query_row(
            "SELECT extra FROM historyinspection WHERE date = '250908'",
            [],
            |r| r.get(0),
        )?;
        assert_eq!(extra, None);
        Ok(())
    }

    #[test]
    fn saving_again_replaces_the_table() -> Result<()> {
        let dir = tempdir()?;
        let mut conn = open_db(&dir.path().join("inspection.sqlite3"))?;
        let table = ingest::parse_text(UPLOAD).unwrap().table;

        save_table(&mut conn, "historyinspection", &table)?;
        save_table(&mut conn, "historyinspection", &table)?;

        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM historyinspection", [], |r| r.get(0))?;
        assert_eq!(count, 2);
        Ok(())
    }

    #[test]
    fn hostile_table_names_are_rejected() -> Result<()> {
        let dir = tempdir()?;
        let mut conn = open_db(&dir.path().join("inspection.sqlite3"))?;
        let table = NormalizedTable::default();

        assert!(save_table(&mut conn, "", &table).is_err());
        assert!(save_table(&mut conn, "drop table;--", &table).is_err());
        assert!(save_table(&mut conn, "1st", &table).is_err());
        assert!(save_table(&mut conn, "history_2025", &table).is_ok());
        Ok(())
    }
}
