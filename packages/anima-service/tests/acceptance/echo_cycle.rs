use super::{Harness, harness, put};
use anima_domain::echo::EchoMemory;
use anima_service::{Error, QueryRequest, QueryResponse};

const SESSION: &str = "chat-1";

async fn seed(harness: &Harness) {
	put(harness, "chat", "The lantern by the door.", &["Scene"], "1_0", vec![0.0, 0.0, 1.0]).await;
	put(harness, "chat", "Boats in the harbor.", &["Scene"], "2_0", vec![1.0, 0.0, 0.0]).await;
	put(harness, "chat", "The orchard in bloom.", &["Important"], "3_0", vec![0.0, 1.0, 0.0])
		.await;

	harness.embedding.set("lantern", vec![0.0, 0.0, 1.0]);
	harness.embedding.set("harbor", vec![1.0, 0.0, 0.0]);
	harness.embedding.set("orchard", vec![0.0, 1.0, 0.0]);
}

async fn ask(harness: &Harness, text: &str, is_swipe: bool) -> QueryResponse {
	ask_in(harness, SESSION, text, is_swipe).await
}

async fn ask_in(harness: &Harness, session: &str, text: &str, is_swipe: bool) -> QueryResponse {
	let req: QueryRequest = serde_json::from_value(serde_json::json!({
		"searchText": text,
		"chatContext": { "ids": ["chat"], "strategy": [{ "type": "base", "count": 1 }] },
		"sessionId": session,
		"is_swipe": is_swipe
	}))
	.expect("Query request must decode.");

	harness.service.query(req).await.expect("Query failed.")
}

fn shown(response: &QueryResponse) -> Vec<(&str, bool)> {
	response.chat_results.iter().map(|item| (item.text.as_str(), item.is_echo)).collect()
}

async fn memory(harness: &Harness) -> EchoMemory {
	let path = harness.roots.session_root().join(format!("{SESSION}.json"));
	let raw = tokio::fs::read(&path).await.expect("Session file must exist.");

	serde_json::from_slice(&raw).expect("Session file must decode.")
}

#[tokio::test]
async fn previous_results_are_echoed_once_then_collected() {
	let harness = harness();

	seed(&harness).await;

	let first = ask(&harness, "lantern", false).await;

	assert_eq!(shown(&first), vec![("The lantern by the door.", false)]);

	let second = ask(&harness, "harbor", false).await;

	assert_eq!(
		shown(&second),
		vec![("The lantern by the door.", true), ("Boats in the harbor.", false)]
	);

	let third = ask(&harness, "orchard", false).await;

	assert_eq!(
		shown(&third),
		vec![("Boats in the harbor.", true), ("The orchard in bloom.", false)]
	);
	assert!(third.debug_logs.iter().any(|line| line.contains("collected=1")));

	let stored = memory(&harness).await;
	let orchard = stored
		.memories
		.values()
		.find(|entry| entry.fragment.metadata.text == "The orchard in bloom.")
		.expect("Orchard must be tracked.");

	assert_eq!(stored.len(), 2);
	assert_eq!(orchard.max_life, 3);
	assert!(stored.last_updated > 0);
}

#[tokio::test]
async fn swipe_resurrects_exhausted_entries() {
	let harness = harness();

	seed(&harness).await;
	ask(&harness, "lantern", false).await;
	ask(&harness, "harbor", false).await;

	let swiped = ask(&harness, "harbor", true).await;

	assert_eq!(
		shown(&swiped),
		vec![("The lantern by the door.", true), ("Boats in the harbor.", false)]
	);
	assert!(swiped.debug_logs.iter().any(|line| line.contains("resurrected=1")));
}

#[tokio::test]
async fn repeated_queries_do_not_grow_memory() {
	let harness = harness();

	seed(&harness).await;
	ask(&harness, "lantern", false).await;
	ask(&harness, "lantern", false).await;

	let again = ask(&harness, "lantern", false).await;

	assert_eq!(shown(&again), vec![("The lantern by the door.", false)]);
	assert_eq!(memory(&harness).await.len(), 1);
}

#[tokio::test]
async fn echo_can_be_disabled_per_request() {
	let harness = harness();

	seed(&harness).await;
	ask(&harness, "lantern", false).await;

	let req: QueryRequest = serde_json::from_value(serde_json::json!({
		"searchText": "harbor",
		"chatContext": { "ids": ["chat"], "strategy": [{ "type": "base", "count": 1 }] },
		"sessionId": SESSION,
		"echoConfig": { "enabled": false }
	}))
	.expect("Query request must decode.");
	let response = harness.service.query(req).await.expect("Query failed.");

	assert_eq!(shown(&response), vec![("Boats in the harbor.", false)]);
}

#[tokio::test]
async fn invalid_echo_overrides_are_rejected() {
	let harness = harness();
	let req: QueryRequest = serde_json::from_value(serde_json::json!({
		"searchText": "harbor",
		"chatContext": { "ids": ["chat"] },
		"sessionId": SESSION,
		"echoConfig": { "base_life": 2, "important_life": 1 }
	}))
	.expect("Query request must decode.");
	let err = harness.service.query(req).await.expect_err("Expected an input error.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
}

#[tokio::test]
async fn unreadable_session_file_does_not_fail_the_query() {
	let harness = harness();

	seed(&harness).await;
	tokio::fs::create_dir_all(harness.roots.session_root())
		.await
		.expect("Failed to create session root.");
	tokio::fs::write(harness.roots.session_root().join(format!("{SESSION}.json")), b"{not json")
		.await
		.expect("Failed to write session file.");

	let response = ask(&harness, "lantern", false).await;

	assert_eq!(shown(&response), vec![("The lantern by the door.", false)]);
}

#[tokio::test]
async fn look_alike_session_ids_keep_separate_memories() {
	let harness = harness();

	seed(&harness).await;

	let first = ask_in(&harness, "chat 1", "lantern", false).await;

	assert_eq!(shown(&first), vec![("The lantern by the door.", false)]);

	let other = ask_in(&harness, "chat_1", "harbor", false).await;

	assert_eq!(shown(&other), vec![("Boats in the harbor.", false)]);

	let files = std::fs::read_dir(harness.roots.session_root())
		.expect("Session directory must exist.")
		.count();

	assert_eq!(files, 2);
}
