//! Schema initialization, grounded in
//! `adapters/meta-adapter-sqlite/src/schema.rs`'s single `init_db`
//! function running every `CREATE TABLE IF NOT EXISTS` inside one
//! transaction.
//!
//! The abstract schema of §6.3 additionally lists legacy `comments` and
//! `users` tables; this adapter does not create them — the core never
//! treats them as authoritative (comments live in the CRDT, users are
//! soft awareness state), so carrying dead tables here would just be
//! schema for schema's sake.

use sqlx::SqlitePool;

pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS documents (
			id TEXT NOT NULL,
			title TEXT NOT NULL,
			content TEXT NOT NULL,
			html_content TEXT,
			render_mode TEXT NOT NULL DEFAULT 'markdown',
			metadata TEXT,
			crdt_snapshot BLOB,
			views INTEGER NOT NULL DEFAULT 0,
			active_editors INTEGER NOT NULL DEFAULT 0,
			published_at INTEGER,
			created_at INTEGER NOT NULL DEFAULT (unixepoch()),
			updated_at INTEGER NOT NULL DEFAULT (unixepoch()),
			PRIMARY KEY(id)
		)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS versions (
			id INTEGER NOT NULL,
			document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
			version INTEGER NOT NULL,
			snapshot BLOB NOT NULL,
			metadata TEXT,
			created_at INTEGER NOT NULL DEFAULT (unixepoch()),
			created_by TEXT,
			message TEXT,
			PRIMARY KEY(id),
			UNIQUE(document_id, version)
		)",
	)
	.execute(&mut *tx)
	.await?;

	tx.commit().await
}

// vim: ts=4
