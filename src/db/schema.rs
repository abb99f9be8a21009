use rusqlite::{Connection, Result};

pub fn run_migrations(conn: &Connection) -> Result<()> {
  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS ephemeral_records (
      id TEXT PRIMARY KEY,
      blob TEXT NOT NULL,
      created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_ephemeral_records_created_at ON ephemeral_records(created_at);
    "#,
  )?;

  Ok(())
}
