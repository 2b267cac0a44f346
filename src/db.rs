use sqlx::SqlitePool;

use crate::types::{Mentor, NewMentor};

const MENTOR_COLUMNS: &str = "id, uid, firebase_uid, email, password, nama_lengkap, nik, keahlian, \
    keahlian_utama, keahlian_lain, kelamin, linkedin, deskripsi, status_verifikasi, status, verified, created_at";

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA temp_store=MEMORY;").execute(pool).await {
        tracing::warn!("Failed to set temp_store: {}", e);
    }

    // mentor table; every column but id is nullable because rows come from
    // several registration flows
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS mentor (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uid TEXT NULL,
            firebase_uid TEXT NULL,
            email TEXT NULL,
            password TEXT NULL,
            nama_lengkap TEXT NULL,
            nik TEXT NULL,
            keahlian TEXT NULL,
            keahlian_utama TEXT NULL,
            keahlian_lain TEXT NULL,
            kelamin TEXT NULL,
            linkedin TEXT NULL,
            deskripsi TEXT NULL,
            status_verifikasi TEXT NULL,
            status TEXT NULL,
            verified INTEGER NULL,
            created_at TEXT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%S','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    // Columns added after the first deployments
    for (column, ty) in [("firebase_uid", "TEXT"), ("keahlian_utama", "TEXT"), ("deskripsi", "TEXT")] {
        let query = format!("ALTER TABLE mentor ADD COLUMN {} {} NULL", column, ty);
        if let Err(e) = sqlx::query(&query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err) => {
                    let msg = db_err.message().to_lowercase();
                    if !msg.contains("duplicate") && !msg.contains("already exists") {
                        tracing::error!("Failed to add {} column to mentor: {}", column, e);
                        return Err(anyhow::anyhow!("Migration failed: {}", e));
                    }
                }
                _ => {
                    tracing::error!("Unexpected error adding {} to mentor: {}", column, e);
                    return Err(anyhow::anyhow!("Migration failed: {}", e));
                }
            }
        }
    }

    let indexes = [
        ("idx_mentor_email", "CREATE INDEX IF NOT EXISTS idx_mentor_email ON mentor(email)"),
        ("idx_mentor_uid", "CREATE INDEX IF NOT EXISTS idx_mentor_uid ON mentor(uid)"),
        ("idx_mentor_firebase_uid", "CREATE INDEX IF NOT EXISTS idx_mentor_firebase_uid ON mentor(firebase_uid)"),
    ];
    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }

    Ok(())
}

pub async fn find_mentor_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Mentor>, sqlx::Error> {
    let sql = format!("SELECT {} FROM mentor WHERE email = ?1 LIMIT 1", MENTOR_COLUMNS);
    sqlx::query_as::<_, Mentor>(&sql).bind(email).fetch_optional(pool).await
}

/// Matches either the app uid or the Firebase uid.
pub async fn find_mentor_by_uid(pool: &SqlitePool, uid: &str) -> Result<Option<Mentor>, sqlx::Error> {
    let sql = format!("SELECT {} FROM mentor WHERE uid = ?1 OR firebase_uid = ?1 LIMIT 1", MENTOR_COLUMNS);
    sqlx::query_as::<_, Mentor>(&sql).bind(uid).fetch_optional(pool).await
}

pub async fn insert_mentor(pool: &SqlitePool, mentor: &NewMentor) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT INTO mentor (uid, firebase_uid, email, password, nama_lengkap, nik, keahlian,
            keahlian_utama, keahlian_lain, kelamin, linkedin, deskripsi, status_verifikasi, status, verified)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"#,
    )
    .bind(&mentor.uid)
    .bind(&mentor.firebase_uid)
    .bind(&mentor.email)
    .bind(&mentor.password)
    .bind(&mentor.nama_lengkap)
    .bind(&mentor.nik)
    .bind(&mentor.keahlian)
    .bind(&mentor.keahlian_utama)
    .bind(&mentor.keahlian_lain)
    .bind(&mentor.kelamin)
    .bind(&mentor.linkedin)
    .bind(&mentor.deskripsi)
    .bind(&mentor.status_verifikasi)
    .bind(&mentor.status)
    .bind(mentor.verified)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_mentor_password(pool: &SqlitePool, id: i64, password_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE mentor SET password = ?1 WHERE id = ?2")
        .bind(password_hash)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
