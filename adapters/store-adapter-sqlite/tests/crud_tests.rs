//! Store adapter CRUD tests: create, read, list, patch, version, delete.

use collabnotes_store_adapter_sqlite::StoreSqlite;
use collabnotes_types::{DocumentPatch, Patch, RenderMode, Store};
use tempfile::TempDir;

async fn create_test_store() -> (StoreSqlite, TempDir) {
	let temp_dir = TempDir::new().expect("failed to create temp dir");
	let db_path = temp_dir.path().join("collabnotes.db");
	let store = StoreSqlite::open(&db_path).await.expect("failed to open store");
	(store, temp_dir)
}

#[tokio::test]
async fn create_and_get_roundtrip() {
	let (store, _temp) = create_test_store().await;

	let doc = store
		.create("doc-1", "My Note", "hello world", None, RenderMode::Markdown)
		.await
		.expect("create should succeed");

	assert_eq!(doc.id.as_ref(), "doc-1");
	assert_eq!(doc.title.as_ref(), "My Note");
	assert_eq!(doc.text_projection.as_ref(), "hello world");
	assert!(doc.html_projection.is_none());

	let fetched = store.get("doc-1").await.expect("get should succeed");
	assert_eq!(fetched.title.as_ref(), "My Note");
	assert_eq!(fetched.text_projection.as_ref(), "hello world");
}

#[tokio::test]
async fn create_duplicate_id_conflicts() {
	let (store, _temp) = create_test_store().await;

	store.create("doc-1", "A", "a", None, RenderMode::Markdown).await.expect("first create");
	let result = store.create("doc-1", "B", "b", None, RenderMode::Markdown).await;

	assert!(matches!(result, Err(collabnotes_types::Error::AlreadyExists)));
}

#[tokio::test]
async fn get_missing_is_not_found() {
	let (store, _temp) = create_test_store().await;

	let result = store.get("nope").await;
	assert!(matches!(result, Err(collabnotes_types::Error::NotFound)));
}

#[tokio::test]
async fn list_returns_every_document_once() {
	let (store, _temp) = create_test_store().await;

	store.create("doc-a", "A", "a", None, RenderMode::Markdown).await.expect("create a");
	store.create("doc-b", "B", "b", None, RenderMode::Markdown).await.expect("create b");

	let page = store.list(10, 0).await.expect("list should succeed");
	let mut ids: Vec<&str> = page.iter().map(|s| s.id.as_ref()).collect();
	ids.sort_unstable();
	assert_eq!(ids, vec!["doc-a", "doc-b"]);

	// updated_at is non-increasing down the page (ORDER BY updated_at DESC).
	for pair in page.windows(2) {
		assert!(pair[0].updated_at >= pair[1].updated_at);
	}
}

#[tokio::test]
async fn list_respects_limit_and_offset() {
	let (store, _temp) = create_test_store().await;

	for i in 0..5 {
		store
			.create(&format!("doc-{i}"), "T", "body", None, RenderMode::Markdown)
			.await
			.expect("create");
	}

	let first_page = store.list(2, 0).await.expect("list page 1");
	let second_page = store.list(2, 2).await.expect("list page 2");
	assert_eq!(first_page.len(), 2);
	assert_eq!(second_page.len(), 2);
	assert_ne!(first_page[0].id, second_page[0].id);
}

#[tokio::test]
async fn upsert_snapshot_creates_when_absent() {
	let (store, _temp) = create_test_store().await;

	store
		.upsert_snapshot("doc-new", b"\x01\x02", "seeded text", None, Some("Seeded"), None)
		.await
		.expect("upsert should create the row");

	let doc = store.get("doc-new").await.expect("get should succeed");
	assert_eq!(doc.title.as_ref(), "Seeded");
	assert_eq!(doc.text_projection.as_ref(), "seeded text");
	assert_eq!(doc.crdt_snapshot, b"\x01\x02");
}

#[tokio::test]
async fn upsert_snapshot_preserves_html_when_none_supplied() {
	let (store, _temp) = create_test_store().await;

	store
		.upsert_snapshot("doc-1", b"\x01", "text v1", Some("<p>hi</p>"), Some("Title"), None)
		.await
		.expect("first upsert");

	store
		.upsert_snapshot("doc-1", b"\x02", "text v2", None, None, None)
		.await
		.expect("second upsert should not wipe html_content");

	let doc = store.get("doc-1").await.expect("get should succeed");
	assert_eq!(doc.text_projection.as_ref(), "text v2");
	assert_eq!(doc.html_projection.as_deref(), Some("<p>hi</p>"));
}

#[tokio::test]
async fn patch_applies_only_provided_fields() {
	let (store, _temp) = create_test_store().await;
	store.create("doc-1", "Original", "body", None, RenderMode::Markdown).await.expect("create");

	store
		.patch(
			"doc-1",
			DocumentPatch {
				title: Patch::Value("Renamed".into()),
				text_projection: Patch::Undefined,
				html_projection: Patch::Undefined,
			},
		)
		.await
		.expect("patch should succeed");

	let doc = store.get("doc-1").await.expect("get should succeed");
	assert_eq!(doc.title.as_ref(), "Renamed");
	assert_eq!(doc.text_projection.as_ref(), "body");
}

#[tokio::test]
async fn patch_missing_document_is_not_found() {
	let (store, _temp) = create_test_store().await;

	let result = store
		.patch(
			"nope",
			DocumentPatch {
				title: Patch::Value("X".into()),
				text_projection: Patch::Undefined,
				html_projection: Patch::Undefined,
			},
		)
		.await;

	assert!(matches!(result, Err(collabnotes_types::Error::NotFound)));
}

#[tokio::test]
async fn delete_removes_document_and_cascades_versions() {
	let (store, _temp) = create_test_store().await;
	store.create("doc-1", "A", "a", None, RenderMode::Markdown).await.expect("create");
	store.append_version("doc-1", b"snap", None, None).await.expect("append version");

	store.delete("doc-1").await.expect("delete should succeed");

	assert!(matches!(store.get("doc-1").await, Err(collabnotes_types::Error::NotFound)));

	let result = store.delete("doc-1").await;
	assert!(matches!(result, Err(collabnotes_types::Error::NotFound)));
}

#[tokio::test]
async fn append_version_allocates_gap_free_sequence() {
	let (store, _temp) = create_test_store().await;
	store.create("doc-1", "A", "a", None, RenderMode::Markdown).await.expect("create");

	let v1 = store.append_version("doc-1", b"snap-1", Some("alice"), None).await.expect("v1");
	let v2 = store.append_version("doc-1", b"snap-2", Some("bob"), Some("checkpoint")).await.expect("v2");

	assert_eq!(v1.version, 1);
	assert_eq!(v2.version, 2);
	assert_eq!(v2.author.as_deref(), Some("bob"));
	assert_eq!(v2.message.as_deref(), Some("checkpoint"));
}
