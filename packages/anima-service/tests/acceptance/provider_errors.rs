use super::{harness, harness_with, put, scored};
use anima_service::{Error, InsertRequest, QueryRequest, RebuildRequest};
use anima_testkit::set_value;

#[tokio::test]
async fn upstream_message_surfaces_verbatim() {
	let harness = harness();

	put(&harness, "diary", "One.", &[], "1_0", scored(0.5)).await;
	harness.embedding.fail_with(500, "rate limited");

	let req: QueryRequest = serde_json::from_value(serde_json::json!({
		"searchText": "anything",
		"chatContext": { "ids": ["diary"] }
	}))
	.expect("Query request must decode.");
	let err = harness.service.query(req).await.expect_err("Expected a provider error.");

	assert!(matches!(err, Error::Provider { .. }));
	assert_eq!(err.message(), "rate limited");
}

#[tokio::test]
async fn failed_insert_leaves_no_collection_behind() {
	let harness = harness();

	harness.embedding.fail_with(503, "overloaded");

	let req: InsertRequest = serde_json::from_value(serde_json::json!({
		"collectionId": "fresh",
		"text": "Never stored.",
		"index": "1_0"
	}))
	.expect("Insert request must decode.");
	let err = harness.service.insert(req).await.expect_err("Expected a provider error.");

	assert_eq!(err.message(), "overloaded");
	assert!(!harness.roots.vector_root().join("fresh").exists());
}

#[tokio::test]
async fn failed_rebuild_keeps_existing_vectors() {
	let harness = harness();

	put(&harness, "diary", "Alpha.", &[], "1_0", vec![1.0, 0.0, 0.0]).await;
	harness.embedding.set("alpha?", vec![1.0, 0.0, 0.0]);
	harness.embedding.fail_with(500, "rate limited");

	let req: RebuildRequest =
		serde_json::from_value(serde_json::json!({ "collectionId": "diary" }))
			.expect("Rebuild request must decode.");
	let err = harness.service.rebuild(req).await.expect_err("Expected a provider error.");

	assert!(matches!(err, Error::Provider { .. }));

	let index = tokio::fs::read(harness.roots.vector_root().join("diary").join("index.json"))
		.await
		.expect("Index file must exist.");
	let index: serde_json::Value = serde_json::from_slice(&index).expect("Index must decode.");

	assert_eq!(index["items"][0]["vector"], serde_json::json!([1.0, 0.0, 0.0]));
}

#[tokio::test]
async fn missing_api_key_is_an_input_error() {
	let harness = harness_with(|root| {
		set_value(root, "providers.embedding", "api_key", "");
	});
	let req: InsertRequest = serde_json::from_value(serde_json::json!({
		"collectionId": "diary",
		"text": "Hello."
	}))
	.expect("Insert request must decode.");
	let err = harness.service.insert(req).await.expect_err("Expected an input error.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert_eq!(err.message(), "Embedding API key is missing.");
	assert_eq!(harness.embedding.calls(), 0);
}
