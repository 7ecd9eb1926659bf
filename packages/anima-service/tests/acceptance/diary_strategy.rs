use std::collections::HashSet;

use super::{harness, harness_with, put, scored};
use anima_service::{Error, QueryRequest, QueryResponse};
use anima_testkit::set_value;

fn query_request(raw: serde_json::Value) -> QueryRequest {
	serde_json::from_value(raw).expect("Query request must decode.")
}

async fn seed_diary(harness: &super::Harness) {
	put(harness, "diary", "Morning walk by the river.", &["Daily"], "1_0", scored(0.95)).await;
	put(harness, "diary", "Coffee with an old friend.", &["Daily"], "2_0", scored(0.9)).await;
	put(harness, "diary", "Rain all afternoon.", &["Weather"], "3_0", scored(0.8)).await;
	put(harness, "diary", "Promised to write every week.", &["important"], "4_0", scored(0.4))
		.await;
	put(harness, "diary", "Her birthday dinner.", &["Birthday"], "5_0", scored(0.35)).await;
}

fn diary_query() -> QueryRequest {
	query_request(serde_json::json!({
		"searchText": "what happened",
		"chatContext": {
			"ids": ["diary"],
			"strategy": [
				{ "type": "base", "count": 2 },
				{ "type": "important", "count": 1, "labels": ["important"] },
				{ "type": "special", "count": 1, "target_tag": "Birthday" },
				{ "type": "diversity", "count": 1 }
			]
		}
	}))
}

fn texts(response: &QueryResponse) -> Vec<&str> {
	response.chat_results.iter().map(|item| item.text.as_str()).collect()
}

#[tokio::test]
async fn diary_strategy_keeps_tagged_fragments_below_the_cutoff() {
	let harness = harness_with(|root| {
		set_value(root, "retrieval", "min_score", 0.5);
		set_value(root, "retrieval", "exemption_slack", 0.3);
	});

	harness.embedding.set("what happened", vec![1.0, 0.0, 0.0]);
	seed_diary(&harness).await;

	let response = harness.service.query(diary_query()).await.expect("Query failed.");

	assert_eq!(
		texts(&response),
		vec![
			"Morning walk by the river.",
			"Coffee with an old friend.",
			"Rain all afternoon.",
			"Promised to write every week.",
			"Her birthday dinner.",
		]
	);
	assert!(response.chat_results.iter().all(|item| item.collection_id == "diary"));
	assert!(response.chat_results.iter().all(|item| !item.is_echo));
	assert!(response.kb_results.is_empty());
	assert!(response.debug_logs.iter().any(|line| line.starts_with("chat [base]")));
	assert!(response.debug_logs.iter().any(|line| line.contains("vibe=Daily")));
}

#[tokio::test]
async fn base_step_respects_min_score_without_exemption() {
	let harness = harness_with(|root| {
		set_value(root, "retrieval", "min_score", 0.5);
	});

	harness.embedding.set("what happened", vec![1.0, 0.0, 0.0]);
	seed_diary(&harness).await;

	let response = harness
		.service
		.query(query_request(serde_json::json!({
			"searchText": "what happened",
			"chatContext": { "ids": ["diary"], "strategy": [{ "type": "base", "count": 10 }] }
		})))
		.await
		.expect("Query failed.");

	assert_eq!(response.chat_results.len(), 3);
	assert!(response.chat_results.iter().all(|item| item.score >= 0.5));
}

#[tokio::test]
async fn track_min_score_overrides_configuration() {
	let harness = harness();

	harness.embedding.set("what happened", vec![1.0, 0.0, 0.0]);
	seed_diary(&harness).await;

	let response = harness
		.service
		.query(query_request(serde_json::json!({
			"searchText": "what happened",
			"chatContext": {
				"ids": ["diary"],
				"strategy": [{ "type": "base", "count": 10 }],
				"min_score": 0.85
			}
		})))
		.await
		.expect("Query failed.");

	assert_eq!(
		texts(&response),
		vec!["Morning walk by the river.", "Coffee with an old friend."]
	);
}

#[tokio::test]
async fn ignored_positions_never_reach_chat_results() {
	let harness = harness();

	harness.embedding.set("what happened", vec![1.0, 0.0, 0.0]);
	seed_diary(&harness).await;

	let response = harness
		.service
		.query(query_request(serde_json::json!({
			"searchText": "what happened",
			"chatContext": { "ids": ["diary"], "strategy": [{ "type": "base", "count": 2 }] },
			"ignore_ids": ["1_0", "2_0"]
		})))
		.await
		.expect("Query failed.");

	assert_eq!(texts(&response), vec!["Rain all afternoon.", "Promised to write every week."]);
}

#[tokio::test]
async fn tracks_run_over_their_own_collections() {
	let harness = harness();

	harness.embedding.set("what happened", vec![1.0, 0.0, 0.0]);
	seed_diary(&harness).await;
	put(&harness, "notes", "River flood history.", &[], "1_0", scored(0.7)).await;
	put(&harness, "notes", "Tea varieties.", &[], "2_0", scored(0.2)).await;

	let response = harness
		.service
		.query(query_request(serde_json::json!({
			"searchText": "what happened",
			"chatContext": {
				"ids": ["diary", "missing"],
				"strategy": [{ "type": "base", "count": 1 }]
			},
			"kbContext": { "ids": ["notes"], "strategy": [{ "type": "base", "count": 1 }] }
		})))
		.await
		.expect("Query failed.");

	assert_eq!(texts(&response), vec!["Morning walk by the river."]);
	assert_eq!(response.kb_results.len(), 1);
	assert_eq!(response.kb_results[0].text, "River flood history.");
	assert_eq!(response.kb_results[0].collection_id, "notes");
	assert!(response.debug_logs.iter().any(|line| line.starts_with("kb [base]")));
	assert!(!harness.roots.vector_root().join("missing").exists());
}

#[tokio::test]
async fn default_strategy_applies_when_none_is_sent() {
	let harness = harness();

	harness.embedding.set("what happened", vec![1.0, 0.0, 0.0]);
	seed_diary(&harness).await;

	let response = harness
		.service
		.query(query_request(serde_json::json!({
			"searchText": "what happened",
			"chatContext": { "ids": ["diary"] }
		})))
		.await
		.expect("Query failed.");
	let ids: HashSet<&str> = response.chat_results.iter().map(|item| item.id.as_str()).collect();

	assert_eq!(ids.len(), response.chat_results.len());
	assert!(response.debug_logs.iter().any(|line| line.starts_with("chat [diversity]")));
}

#[tokio::test]
async fn unknown_step_type_is_an_input_error() {
	let harness = harness();
	let err = harness
		.service
		.query(query_request(serde_json::json!({
			"searchText": "what happened",
			"chatContext": { "ids": ["diary"], "strategy": [{ "type": "holiday", "count": 1 }] }
		})))
		.await
		.expect_err("Expected an input error.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert_eq!(err.message(), "Unknown strategy step type: holiday.");
	assert_eq!(harness.embedding.calls(), 0);
}

#[tokio::test]
async fn blank_search_text_is_rejected() {
	let harness = harness();
	let err = harness
		.service
		.query(query_request(serde_json::json!({ "searchText": "  " })))
		.await
		.expect_err("Expected an input error.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
}

#[tokio::test]
async fn later_steps_widen_past_already_accepted_results() {
	let harness = harness();

	harness.embedding.set("today", vec![1.0, 0.0, 0.0]);
	put(&harness, "diary", "Breakfast.", &["Daily"], "1_0", scored(0.95)).await;
	put(&harness, "diary", "Lunch.", &["Daily"], "2_0", scored(0.9)).await;
	put(&harness, "diary", "Dinner.", &["Daily"], "3_0", scored(0.5)).await;

	let response = harness
		.service
		.query(query_request(serde_json::json!({
			"searchText": "today",
			"chatContext": {
				"ids": ["diary"],
				"strategy": [
					{ "type": "base", "count": 2 },
					{ "type": "period", "count": 1, "labels": ["Daily"] }
				]
			}
		})))
		.await
		.expect("Query failed.");

	assert_eq!(texts(&response), vec!["Breakfast.", "Lunch.", "Dinner."]);
	assert!(
		response
			.debug_logs
			.iter()
			.any(|line| line.starts_with("chat [period] count=1 k=4 candidates=3 accepted=1"))
	);
}
