#![forbid(unsafe_code)]

//! SQLite-backed `Store`, grounded in the teacher's
//! `adapters/meta-adapter-sqlite`: the same `push_patch!`-driven dynamic
//! `UPDATE`, the same `SqliteConnectOptions`/WAL setup, the same
//! `map_res`/`inspect` error-mapping idiom. This adapter has one table
//! family instead of a dozen, so it keeps a single pool rather than the
//! teacher's write/read-pool split — there is no read-heavy fan-out here
//! to justify the second pool.

mod schema;

use async_trait::async_trait;
use sqlx::sqlite::{self, SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row};
use std::path::Path;

use collabnotes_types::prelude::*;
use collabnotes_types::{Document, DocumentPatch, DocumentSummary, Store, VersionSnapshot};

fn inspect(err: &sqlx::Error) {
	tracing::warn!("store: db error: {err:#?}");
}

/// `push_patch!`, trimmed to the one conversion shape this adapter
/// needs (plain bindable values — no enum-conversion or raw-SQL-expr
/// variants, since `DocumentPatch`'s three fields are all strings).
macro_rules! push_patch {
	($query:expr, $has_updates:expr, $field:literal, $patch:expr) => {{
		match $patch {
			Patch::Undefined => $has_updates,
			Patch::Null => {
				if $has_updates {
					$query.push(", ");
				}
				$query.push(concat!($field, "=NULL"));
				true
			}
			Patch::Value(v) => {
				if $has_updates {
					$query.push(", ");
				}
				$query.push(concat!($field, "=")).push_bind(v);
				true
			}
		}
	}};
}

fn map_res<T>(row: Result<SqliteRow, sqlx::Error>, f: impl FnOnce(SqliteRow) -> Result<T, sqlx::Error>) -> ClResult<T> {
	match row {
		Ok(row) => f(row).inspect_err(inspect).map_err(|_| Error::DbError),
		Err(sqlx::Error::RowNotFound) => Err(Error::NotFound),
		Err(err) => {
			inspect(&err);
			Err(Error::DbError)
		}
	}
}

fn render_mode_str(mode: RenderMode) -> &'static str {
	match mode {
		RenderMode::Markdown => "markdown",
		RenderMode::Html => "html",
	}
}

fn parse_render_mode(s: &str) -> RenderMode {
	match s {
		"html" => RenderMode::Html,
		_ => RenderMode::Markdown,
	}
}

fn row_to_document(row: SqliteRow) -> Result<Document, sqlx::Error> {
	let render_mode: String = row.try_get("render_mode")?;
	Ok(Document {
		id: row.try_get("id")?,
		title: row.try_get("title")?,
		text_projection: row.try_get("content")?,
		html_projection: row.try_get("html_content")?,
		render_mode: parse_render_mode(&render_mode),
		crdt_snapshot: row.try_get::<Option<Vec<u8>>, _>("crdt_snapshot")?.unwrap_or_default(),
		created_at: row.try_get("created_at").map(Timestamp)?,
		updated_at: row.try_get("updated_at").map(Timestamp)?,
		views: row.try_get::<i64, _>("views")? as u32,
		active_editors: row.try_get::<i64, _>("active_editors")? as u32,
	})
}

#[derive(Debug)]
pub struct StoreSqlite {
	db: SqlitePool,
}

impl StoreSqlite {
	/// `dsn` is a `sqlite://` connection string (e.g. the `STORE_DSN`
	/// config key's default `sqlite://./data/collabnotes.db`), or a bare
	/// filesystem path.
	pub async fn new(dsn: &str) -> ClResult<Self> {
		let opts = Self::connect_options(dsn)?
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal)
			.foreign_keys(true);

		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		schema::init_db(&db).await.inspect_err(inspect).or(Err(Error::DbError))?;

		Ok(Self { db })
	}

	/// Also usable directly from a plain path, for tests and tools that
	/// don't want to build a `sqlite://` string.
	pub async fn open(path: impl AsRef<Path>) -> ClResult<Self> {
		let path = path.as_ref();
		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path)
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal)
			.foreign_keys(true);

		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		schema::init_db(&db).await.inspect_err(inspect).or(Err(Error::DbError))?;

		Ok(Self { db })
	}

	fn connect_options(dsn: &str) -> ClResult<sqlite::SqliteConnectOptions> {
		use std::str::FromStr;

		if let Some(path) = dsn.strip_prefix("sqlite://") {
			Ok(sqlite::SqliteConnectOptions::new().filename(path))
		} else {
			sqlite::SqliteConnectOptions::from_str(dsn).or(Err(Error::Validation(format!(
				"invalid store DSN: {dsn}"
			))))
		}
	}
}

#[async_trait]
impl Store for StoreSqlite {
	async fn create(
		&self,
		id: &str,
		title: &str,
		text_projection: &str,
		html_projection: Option<&str>,
		render_mode: RenderMode,
	) -> ClResult<Document> {
		let res = sqlx::query(
			"INSERT INTO documents (id, title, content, html_content, render_mode)
			 VALUES (?, ?, ?, ?, ?)",
		)
		.bind(id)
		.bind(title)
		.bind(text_projection)
		.bind(html_projection)
		.bind(render_mode_str(render_mode))
		.execute(&self.db)
		.await;

		if let Err(sqlx::Error::Database(db_err)) = &res {
			if db_err.is_unique_violation() {
				return Err(Error::AlreadyExists);
			}
		}
		res.inspect_err(inspect).map_err(|_| Error::DbError)?;

		self.get(id).await
	}

	async fn get(&self, id: &str) -> ClResult<Document> {
		let row = sqlx::query(
			"SELECT id, title, content, html_content, render_mode, crdt_snapshot,
			        created_at, updated_at, views, active_editors
			 FROM documents WHERE id=?",
		)
		.bind(id)
		.fetch_one(&self.db)
		.await;

		map_res(row, row_to_document)
	}

	async fn list(&self, limit: u32, offset: u32) -> ClResult<Vec<DocumentSummary>> {
		let rows = sqlx::query(
			"SELECT id, title, created_at, updated_at FROM documents
			 ORDER BY updated_at DESC LIMIT ? OFFSET ?",
		)
		.bind(limit as i64)
		.bind(offset as i64)
		.fetch_all(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		rows.iter()
			.map(|row| {
				Ok(DocumentSummary {
					id: row.try_get("id")?,
					title: row.try_get("title")?,
					created_at: row.try_get("created_at").map(Timestamp)?,
					updated_at: row.try_get("updated_at").map(Timestamp)?,
				})
			})
			.collect::<Result<Vec<_>, sqlx::Error>>()
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)
	}

	async fn upsert_snapshot(
		&self,
		id: &str,
		crdt_snapshot: &[u8],
		text_projection: &str,
		html_projection: Option<&str>,
		title: Option<&str>,
		render_mode: Option<RenderMode>,
	) -> ClResult<()> {
		let title = title.unwrap_or(Document::DEFAULT_TITLE);
		let render_mode_s = render_mode_str(render_mode.unwrap_or_default());

		sqlx::query(
			"INSERT INTO documents (id, title, content, html_content, render_mode, crdt_snapshot, updated_at)
			 VALUES (?, ?, ?, ?, ?, ?, unixepoch())
			 ON CONFLICT(id) DO UPDATE SET
				content=excluded.content,
				html_content=coalesce(?, documents.html_content),
				crdt_snapshot=excluded.crdt_snapshot,
				title=coalesce(?, documents.title),
				render_mode=coalesce(?, documents.render_mode),
				updated_at=unixepoch()",
		)
		.bind(id)
		.bind(title)
		.bind(text_projection)
		.bind(html_projection)
		.bind(render_mode_s)
		.bind(crdt_snapshot)
		.bind(html_projection)
		.bind(title)
		.bind(render_mode_s)
		.execute(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		Ok(())
	}

	async fn patch(&self, id: &str, patch: DocumentPatch) -> ClResult<()> {
		if patch.is_empty() {
			return Ok(());
		}

		let mut query = QueryBuilder::new("UPDATE documents SET ");
		let mut has_updates = false;

		has_updates = push_patch!(query, has_updates, "title", patch.title);
		has_updates = push_patch!(query, has_updates, "content", patch.text_projection);
		has_updates = push_patch!(query, has_updates, "html_content", patch.html_projection);

		if has_updates {
			query.push(", ");
		}
		query.push("updated_at=unixepoch()");
		query.push(" WHERE id=").push_bind(id);

		let res = query
			.build()
			.execute(&self.db)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;

		if res.rows_affected() == 0 {
			return Err(Error::NotFound);
		}

		Ok(())
	}

	async fn delete(&self, id: &str) -> ClResult<()> {
		let res = sqlx::query("DELETE FROM documents WHERE id=?")
			.bind(id)
			.execute(&self.db)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;

		if res.rows_affected() == 0 {
			return Err(Error::NotFound);
		}

		Ok(())
	}

	async fn append_version(
		&self,
		id: &str,
		snapshot: &[u8],
		author: Option<&str>,
		message: Option<&str>,
	) -> ClResult<VersionSnapshot> {
		// `(document_id, version)` is unique; under concurrent writers the
		// next-version read and the insert can race, so retry a few times
		// rather than serializing through a transaction for every call.
		for _ in 0..5 {
			let next_version: i64 = sqlx::query(
				"SELECT coalesce(max(version), 0) + 1 FROM versions WHERE document_id=?",
			)
			.bind(id)
			.fetch_one(&self.db)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?
			.try_get(0)
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;

			let res = sqlx::query(
				"INSERT INTO versions (document_id, version, snapshot, created_by, message)
				 VALUES (?, ?, ?, ?, ?)
				 RETURNING id, created_at",
			)
			.bind(id)
			.bind(next_version)
			.bind(snapshot)
			.bind(author)
			.bind(message)
			.fetch_one(&self.db)
			.await;

			match res {
				Ok(row) => {
					let row_id: i64 = row.try_get("id").inspect_err(inspect).map_err(|_| Error::DbError)?;
					let created_at =
						row.try_get("created_at").map(Timestamp).inspect_err(inspect).map_err(|_| Error::DbError)?;
					return Ok(VersionSnapshot {
						id: row_id as u64,
						document_id: id.into(),
						version: next_version as u64,
						snapshot: snapshot.to_vec(),
						created_at,
						author: author.map(Into::into),
						message: message.map(Into::into),
					});
				}
				Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => continue,
				Err(err) => {
					inspect(&err);
					return Err(Error::DbError);
				}
			}
		}

		Err(Error::Transient("version allocation conflict".into()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn connect_options_strips_sqlite_scheme() {
		let opts = StoreSqlite::connect_options("sqlite://./data/collabnotes.db");
		assert!(opts.is_ok());
	}

	#[test]
	fn connect_options_accepts_query_params() {
		let opts = StoreSqlite::connect_options("sqlite://file:memdb?mode=memory&cache=shared");
		assert!(opts.is_ok());
	}
}

// vim: ts=4
