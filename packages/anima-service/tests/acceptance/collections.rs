use super::{harness, put, scored};
use anima_service::{
	CollectionRequest, DeleteBatchRequest, DeleteCollectionRequest, DeleteRequest, Error,
	ExportRequest, ImportRequest, InsertRequest, MergeRequest, RebuildRequest,
	TestConnectionRequest,
};

fn decode<T>(raw: serde_json::Value) -> T
where
	T: serde::de::DeserializeOwned,
{
	serde_json::from_value(raw).expect("Request must decode.")
}

fn collection(id: &str) -> CollectionRequest {
	decode(serde_json::json!({ "collectionId": id }))
}

#[tokio::test]
async fn reinserting_a_position_key_replaces_the_fragment() {
	let harness = harness();

	put(&harness, "diary", "First draft.", &[], "3_1", scored(0.5)).await;
	put(&harness, "diary", "Unrelated.", &[], "3_2", scored(0.1)).await;

	let replacement = put(&harness, "diary", "Final draft.", &["Edited"], "3_1", scored(0.6)).await;
	let view = harness.service.view(collection("diary")).await.expect("View failed.");
	let at_key: Vec<_> =
		view.items.iter().filter(|item| item.index.as_deref() == Some("3_1")).collect();

	assert_eq!(at_key.len(), 1);
	assert_eq!(at_key[0].id, replacement);
	assert_eq!(at_key[0].text, "Final draft.");
	assert_eq!(at_key[0].batch_id, Some(3));
	assert_eq!(view.items.len(), 2);
	assert_eq!(view.failed, 0);

	let files = std::fs::read_dir(harness.roots.vector_root().join("diary"))
		.expect("Collection directory must exist.")
		.count();

	// index.json plus one payload per fragment.
	assert_eq!(files, 3);
}

#[tokio::test]
async fn view_lists_fragments_in_narrative_order() {
	let harness = harness();

	put(&harness, "diary", "Second.", &[], "1_2", scored(0.5)).await;
	put(&harness, "diary", "First.", &[], "1_1", scored(0.5)).await;
	put(&harness, "diary", "Third.", &[], "2_0", scored(0.5)).await;

	let view = harness.service.view(collection("diary")).await.expect("View failed.");
	let texts: Vec<&str> = view.items.iter().map(|item| item.text.as_str()).collect();

	assert_eq!(texts, vec!["First.", "Second.", "Third."]);
}

#[tokio::test]
async fn missing_collections_are_reported_without_side_effects() {
	let harness = harness();
	let err = harness.service.view(collection("ghost")).await.expect_err("Expected not found.");
	let exists = harness.service.exists(collection("ghost")).await.expect("Exists failed.");

	assert!(matches!(err, Error::NotFound { .. }));
	assert!(!exists.exists);
	assert_eq!(exists.count, 0);
	assert!(!harness.roots.vector_root().join("ghost").exists());
}

#[tokio::test]
async fn insert_requires_text_and_collection() {
	let harness = harness();
	let no_text: InsertRequest = decode(serde_json::json!({ "collectionId": "diary" }));
	let no_collection: InsertRequest = decode(serde_json::json!({ "text": "Hello." }));

	assert!(matches!(
		harness.service.insert(no_text).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(
		harness.service.insert(no_collection).await,
		Err(Error::InvalidRequest { .. })
	));
	assert_eq!(harness.embedding.calls(), 0);
}

#[tokio::test]
async fn deletes_by_position_and_batch() {
	let harness = harness();

	put(&harness, "diary", "One.", &[], "1_0", scored(0.5)).await;
	put(&harness, "diary", "Two.", &[], "2_0", scored(0.5)).await;
	put(&harness, "diary", "Two again.", &[], "2_1", scored(0.5)).await;

	let by_position: DeleteRequest =
		decode(serde_json::json!({ "collectionId": "diary", "index": "1_0" }));
	let removed = harness.service.delete(by_position).await.expect("Delete failed.");

	assert_eq!((removed.count, removed.physical_count), (1, 1));

	let by_batch: DeleteBatchRequest =
		decode(serde_json::json!({ "collectionId": "diary", "batch_id": "2" }));
	let removed = harness.service.delete_batch(by_batch).await.expect("Delete batch failed.");

	assert_eq!((removed.count, removed.physical_count), (2, 2));

	let exists = harness.service.exists(collection("diary")).await.expect("Exists failed.");

	assert!(exists.exists);
	assert_eq!(exists.count, 0);
}

#[tokio::test]
async fn delete_collection_reports_prior_existence() {
	let harness = harness();

	put(&harness, "diary", "One.", &[], "1_0", scored(0.5)).await;

	let request =
		|| -> DeleteCollectionRequest { decode(serde_json::json!({ "collectionId": "diary" })) };
	let first = harness.service.delete_collection(request()).await.expect("Delete failed.");
	let second = harness.service.delete_collection(request()).await.expect("Delete failed.");

	assert!(first.existed);
	assert!(!second.existed);
	assert!(harness.service.list().await.expect("List failed.").is_empty());
	assert!(harness.service.writes.is_empty());

	let traversal: DeleteCollectionRequest =
		decode(serde_json::json!({ "collectionId": "../sessions" }));

	assert!(matches!(
		harness.service.delete_collection(traversal).await,
		Err(Error::InvalidRequest { .. })
	));
}

#[tokio::test]
async fn merge_copies_vectors_and_keeps_position_keys_unique() {
	let harness = harness();

	put(&harness, "left", "Left one.", &[], "1_0", scored(0.9)).await;
	put(&harness, "left", "Left two.", &[], "2_0", scored(0.8)).await;
	put(&harness, "right", "Right two.", &[], "2_0", scored(0.7)).await;
	put(&harness, "target", "Old two.", &[], "2_0", scored(0.1)).await;
	put(&harness, "target", "Target three.", &[], "3_0", scored(0.1)).await;

	let calls_before = harness.embedding.calls();
	let req: MergeRequest =
		decode(serde_json::json!({ "sourceIds": ["left", "right"], "targetId": "target" }));
	let merged = harness.service.merge(req).await.expect("Merge failed.");

	assert_eq!((merged.merged, merged.failed), (2, 0));
	assert_eq!(harness.embedding.calls(), calls_before);

	let view = harness.service.view(collection("target")).await.expect("View failed.");
	let texts: Vec<&str> = view.items.iter().map(|item| item.text.as_str()).collect();

	assert_eq!(texts, vec!["Left one.", "Right two.", "Target three."]);

	let missing: MergeRequest =
		decode(serde_json::json!({ "sourceIds": ["ghost"], "targetId": "target" }));

	assert!(matches!(harness.service.merge(missing).await, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn rebuild_reembeds_every_fragment() {
	let harness = harness();

	put(&harness, "diary", "Alpha.", &[], "1_0", vec![1.0, 0.0, 0.0]).await;
	put(&harness, "diary", "Beta.", &[], "2_0", vec![0.0, 1.0, 0.0]).await;

	harness.embedding.set("Alpha.", vec![0.0, 1.0, 0.0, 0.0]);
	harness.embedding.set("Beta.", vec![1.0, 0.0, 0.0, 0.0]);
	harness.embedding.set("alpha?", vec![0.0, 1.0, 0.0, 0.0]);

	let req: RebuildRequest = decode(serde_json::json!({ "collectionId": "diary" }));
	let rebuilt = harness.service.rebuild(req).await.expect("Rebuild failed.");

	assert_eq!((rebuilt.rebuilt, rebuilt.failed), (2, 0));

	let response = harness
		.service
		.query(decode(serde_json::json!({
			"searchText": "alpha?",
			"chatContext": { "ids": ["diary"], "strategy": [{ "type": "base", "count": 1 }] }
		})))
		.await
		.expect("Query failed.");

	assert_eq!(response.chat_results.len(), 1);
	assert_eq!(response.chat_results[0].text, "Alpha.");
}

#[tokio::test]
async fn export_and_import_round_trip() {
	let harness = harness();

	put(&harness, "diary", "One.", &["Daily"], "1_0", scored(0.5)).await;
	put(&harness, "diary", "Two.", &[], "2_0", scored(0.4)).await;

	let exported = harness
		.service
		.export(decode::<ExportRequest>(serde_json::json!({ "collectionId": "diary" })))
		.await
		.expect("Export failed.");
	let import = |id: &str, force: bool| -> ImportRequest {
		decode(serde_json::json!({
			"collectionId": id,
			"zipData": exported.zip_data,
			"force": force
		}))
	};
	let imported = harness.service.import(import("copy", false)).await.expect("Import failed.");

	assert_eq!(imported.count, 2);

	let view = harness.service.view(collection("copy")).await.expect("View failed.");

	assert_eq!(view.items.len(), 2);
	assert_eq!(view.items[0].tags, vec!["Daily".to_string()]);
	assert!(matches!(
		harness.service.import(import("copy", false)).await,
		Err(Error::Conflict { .. })
	));
	assert_eq!(
		harness.service.import(import("copy", true)).await.expect("Forced import failed.").count,
		2
	);
	assert_eq!(
		harness.service.list().await.expect("List failed."),
		vec!["copy".to_string(), "diary".to_string()]
	);

	let garbage: ImportRequest = decode(serde_json::json!({
		"collectionId": "broken",
		"zipData": "bm90IGFuIGFyY2hpdmU="
	}));

	assert!(matches!(harness.service.import(garbage).await, Err(Error::InvalidRequest { .. })));
	assert!(!harness.roots.vector_root().join("broken").exists());
}

#[tokio::test]
async fn test_connection_reports_dimensions() {
	let harness = harness();

	harness.embedding.set("Connection test.", vec![0.1; 8]);

	let probe: TestConnectionRequest =
		decode(serde_json::json!({ "apiConfig": { "model": "other-model" } }));
	let response = harness.service.test_connection(probe).await.expect("Probe failed.");

	assert!(response.success);
	assert_eq!(response.dimensions, 8);
}
