//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "drivers_and_companies",
        sql: r#"
            CREATE TABLE IF NOT EXISTS drivers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE,
                lang TEXT NOT NULL,
                status INTEGER NOT NULL DEFAULT 1,
                name TEXT,
                birth_year INTEGER,
                phone_number TEXT,
                messangers TEXT,
                car_types TEXT,
                citizenships TEXT,
                basis_of_stay TEXT,
                availability_95_code TEXT,
                date_start_work TEXT,
                language_skills TEXT,
                job_experience TEXT,
                need_internship TEXT,
                unsuitable_countries TEXT,
                dangerous_goods TEXT,
                expected_salary REAL,
                categories_availability TEXT,
                country_driving_licence TEXT,
                country_current_live TEXT,
                work_type TEXT,
                cadence TEXT,
                crew TEXT,
                driver_gender TEXT,
                form_price TEXT NOT NULL,
                opens_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_drivers_status ON drivers(status);

            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE,
                lang TEXT NOT NULL,
                f_birth_year_left INTEGER,
                f_birth_year_right INTEGER,
                f_date_start_work_left TEXT,
                f_date_start_work_right TEXT,
                f_expected_salary_left REAL,
                f_expected_salary_right REAL,
                f_car_types TEXT,
                f_citizenships TEXT,
                f_basis_of_stay TEXT,
                f_availability_95_code TEXT,
                f_language_skills TEXT,
                f_job_experience TEXT,
                f_need_internship TEXT,
                f_unsuitable_countries TEXT,
                f_dangerous_goods TEXT,
                f_categories_availability TEXT,
                f_country_driving_licence TEXT,
                f_country_current_live TEXT,
                f_work_type TEXT,
                f_cadence TEXT,
                f_crew TEXT,
                f_driver_gender TEXT,
                viewed_drivers TEXT NOT NULL DEFAULT '[]',
                saved_drivers TEXT NOT NULL DEFAULT '[]',
                open_drivers TEXT NOT NULL DEFAULT '[]',
                paid_subscription INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "payments",
        sql: r#"
            ALTER TABLE drivers ADD COLUMN provider_product_id TEXT;
            ALTER TABLE drivers ADD COLUMN provider_price_id TEXT;
            ALTER TABLE companies ADD COLUMN provider_customer_id TEXT;
            ALTER TABLE companies ADD COLUMN provider_product_id TEXT;
            ALTER TABLE companies ADD COLUMN provider_price_id TEXT;

            CREATE TABLE IF NOT EXISTS payments (
                id TEXT PRIMARY KEY,
                creator_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                driver_id INTEGER,
                amount INTEGER NOT NULL,
                status INTEGER NOT NULL DEFAULT 0,
                invoice_id TEXT NOT NULL,
                invoice_url TEXT NOT NULL,
                due_at TEXT NOT NULL,
                message_chat_id INTEGER,
                message_id INTEGER,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_payments_status ON payments(status);
            CREATE INDEX IF NOT EXISTS idx_payments_creator ON payments(creator_id);
        "#,
    },
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    tracing::debug!(
        "Database migrations complete (at V{})",
        get_current_version(conn).await?
    );
    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row.get::<i64>(0).map_err(|e| {
            DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
        }),
        None => Ok(0),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    #[tokio::test]
    async fn migrations_create_all_tables() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        for table in &["drivers", "companies", "payments", "_migrations"] {
            let mut rows = conn
                .query(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    libsql::params![*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap().unwrap();
            let count: i64 = row.get(0).unwrap();
            assert_eq!(count, 1, "Table '{}' should exist", table);
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        let version = get_current_version(&conn).await.unwrap();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn version_tracking() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT version, name FROM _migrations ORDER BY version", ())
            .await
            .unwrap();
        let row1 = rows.next().await.unwrap().unwrap();
        let v1: i64 = row1.get(0).unwrap();
        let n1: String = row1.get(1).unwrap();
        assert_eq!(v1, 1);
        assert_eq!(n1, "drivers_and_companies");
    }
}
