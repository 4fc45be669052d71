use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use plotline::ai::AiConfig;
use plotline::evaluate;
use plotline::qa::{ask_loop, load_documents, QaSystem};
use plotline::splitter::RecursiveSplitter;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

// --- Stub OpenAI-compatible server ---

enum Reply {
    Text(&'static str),
    NullContent,
    Status(u16),
}

#[derive(Clone, Default)]
struct Stub {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    chats: Arc<Mutex<Vec<Value>>>,
}

impl Stub {
    fn with_replies(replies: Vec<Reply>) -> Self {
        let stub = Stub::default();
        stub.replies.lock().unwrap().extend(replies);
        stub
    }

    fn chats(&self) -> Vec<Value> {
        self.chats.lock().unwrap().clone()
    }
}

fn user_msg(chat: &Value) -> &str {
    chat["messages"][1]["content"].as_str().unwrap()
}

async fn chat(State(stub): State<Stub>, Json(body): Json<Value>) -> Response {
    stub.chats.lock().unwrap().push(body);
    let reply = stub.replies.lock().unwrap().pop_front();
    match reply {
        Some(Reply::Text(t)) => Json(json!({
            "choices": [{"message": {"role": "assistant", "content": t}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .into_response(),
        Some(Reply::NullContent) => Json(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }))
        .into_response(),
        Some(Reply::Status(code)) => {
            (StatusCode::from_u16(code).unwrap(), "upstream exploded").into_response()
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, "no reply queued").into_response(),
    }
}

fn fake_embedding(text: &str) -> Vec<f32> {
    let t = text.to_lowercase();
    vec![t.matches("hairpin").count() as f32, t.matches("letter").count() as f32, 0.01]
}

async fn embeddings(Json(body): Json<Value>) -> Json<Value> {
    let data: Vec<Value> = body["input"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| json!({"embedding": fake_embedding(t.as_str().unwrap())}))
        .collect();
    Json(json!({"data": data}))
}

async fn spawn_stub(stub: Stub) -> AiConfig {
    let app = Router::new()
        .route("/v1/chat/completions", post(chat))
        .route("/v1/embeddings", post(embeddings))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    AiConfig::with_endpoints(
        &format!("http://{addr}/v1/chat/completions"),
        &format!("http://{addr}/v1/embeddings"),
        "test-key",
    )
}

const UPDATE_WITH_ITEMS: &str = "**Updated Summary:**\nLin finds the hairpin.\n\n\
**Updated Key Items and Their Statuses:**\n\n\
Item Name: Hairpin\n- Current Status: Owned\n- Last Known Location/Owner: Lin\n- Current Importance: High";

fn story() -> Value {
    json!({
        "Hairpin": {
            "Episode 2": {"initialRecords": ["Wei steals the hairpin."]},
            "Episode 1": {"initialRecords": ["Lin finds a hairpin.", "She keeps it."]}
        }
    })
}

// --- Evaluate ---

#[tokio::test]
async fn evaluates_in_order_and_threads_state() {
    let stub = Stub::with_replies(vec![
        Reply::Text("Solid opening.\nScore: 4"),
        Reply::Text(UPDATE_WITH_ITEMS),
        Reply::Text("Score: 2 — the theft is abrupt."),
        Reply::Text("Wei now has the hairpin."),
    ]);
    let cfg = spawn_stub(stub.clone()).await;
    let mut doc = story();

    let report = evaluate::run(&cfg, &mut doc).await;

    assert_eq!(report.scored, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(doc["Hairpin"]["Episode 1"]["score"], 4);
    assert_eq!(doc["Hairpin"]["Episode 1"]["evaluation_reasoning"], "Solid opening.\nScore: 4");
    assert_eq!(doc["Hairpin"]["Episode 2"]["score"], 2);

    // no marker in the last update: whole text is the summary, items carry over
    assert_eq!(report.final_state.summary, "Wei now has the hairpin.");
    assert_eq!(report.final_state.key_items.get("Hairpin").unwrap().location, "Lin");

    let chats = stub.chats();
    assert_eq!(chats.len(), 4);
    assert_eq!(chats[0]["temperature"], 0.3);
    assert_eq!(chats[1]["temperature"], 0.1);
    assert_eq!(chats[0]["model"], "gpt-4o-2024-08-06");
    assert!(user_msg(&chats[0]).contains("Lin finds a hairpin.\nShe keeps it."));
    assert!(user_msg(&chats[0]).contains("**Next Episode:**\n\nWei steals the hairpin."));
    assert!(user_msg(&chats[2]).contains("Lin finds the hairpin."));
    assert!(user_msg(&chats[2]).contains("- Hairpin: [Status: Owned, Last Known Location/Owner: Lin"));
    assert!(user_msg(&chats[2]).contains("without next scene"));
}

#[tokio::test]
async fn missing_score_skips_episode() {
    let stub = Stub::with_replies(vec![
        Reply::Text("I cannot rate this."),
        Reply::Text("Score: 5"),
        Reply::Text(UPDATE_WITH_ITEMS),
    ]);
    let cfg = spawn_stub(stub.clone()).await;
    let mut doc = story();

    let report = evaluate::run(&cfg, &mut doc).await;

    assert_eq!(report.scored, 1);
    assert_eq!(report.skipped, 1);
    assert!(doc["Hairpin"]["Episode 1"].get("score").is_none());
    assert_eq!(doc["Hairpin"]["Episode 2"]["score"], 5);

    let chats = stub.chats();
    assert_eq!(chats.len(), 3);
    // episode 2 is still evaluated against the empty starting state
    assert!(user_msg(&chats[1]).contains("**Previous Summary:**\n\n\n\n**Current Episode (2):**"));
}

#[tokio::test]
async fn failed_update_keeps_previous_state() {
    let stub = Stub::with_replies(vec![
        Reply::Text("Score: 3"),
        Reply::Status(502),
        Reply::Status(500),
    ]);
    let cfg = spawn_stub(stub.clone()).await;
    let mut doc = story();

    let report = evaluate::run(&cfg, &mut doc).await;

    assert_eq!(report.scored, 1);
    assert_eq!(report.failed_updates, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(doc["Hairpin"]["Episode 1"]["score"], 3);
    assert!(report.final_state.summary.is_empty());
    assert!(report.final_state.key_items.is_empty());
}

#[tokio::test]
async fn null_content_update_keeps_previous_state() {
    let stub = Stub::with_replies(vec![
        Reply::Text("Score: 4"),
        Reply::Text(UPDATE_WITH_ITEMS),
        Reply::Text("Score: 3"),
        Reply::NullContent,
    ]);
    let cfg = spawn_stub(stub).await;
    let mut doc = story();

    let report = evaluate::run(&cfg, &mut doc).await;

    assert_eq!(report.scored, 2);
    assert_eq!(report.failed_updates, 1);
    assert_eq!(doc["Hairpin"]["Episode 2"]["score"], 3);
    assert_eq!(report.final_state.summary, "Lin finds the hairpin.");
    assert_eq!(report.final_state.key_items.get("Hairpin").unwrap().location, "Lin");
}

#[tokio::test]
async fn evaluate_file_rewrites_document() {
    let stub = Stub::with_replies(vec![
        Reply::Text("Score: 4"),
        Reply::Text(UPDATE_WITH_ITEMS),
        Reply::Text("Score: 3"),
        Reply::Text(UPDATE_WITH_ITEMS),
    ]);
    let cfg = spawn_stub(stub).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("story.json");
    let input = json!({
        "发卡": {
            "Episode 2": {"initialRecords": ["她丢了发卡。"], "note": "keep me"},
            "Episode 1": {"initialRecords": ["她找到发卡。"]}
        }
    });
    std::fs::write(&path, serde_json::to_string(&input).unwrap()).unwrap();

    let report = evaluate::evaluate_file(&cfg, &path, &path).await.unwrap();
    assert_eq!(report.scored, 2);

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("她丢了发卡。"));
    assert!(written.contains("\n  \"发卡\": {"));
    assert!(written.find("Episode 2").unwrap() < written.find("Episode 1").unwrap());

    let doc: Value = serde_json::from_str(&written).unwrap();
    assert_eq!(doc["发卡"]["Episode 1"]["score"], 4);
    assert_eq!(doc["发卡"]["Episode 2"]["score"], 3);
    assert_eq!(doc["发卡"]["Episode 2"]["note"], "keep me");
}

#[tokio::test]
async fn unreadable_input_fails_before_any_call() {
    let stub = Stub::default();
    let cfg = spawn_stub(stub.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");

    let err = evaluate::evaluate_file(&cfg, &missing, &missing).await.unwrap_err();
    assert!(matches!(err, plotline::error::PlotlineError::Io(_)));
    assert!(stub.chats().is_empty());
}

// --- Ask ---

async fn hairpin_qa(stub: &Stub) -> QaSystem {
    let cfg = spawn_stub(stub.clone()).await;
    let documents = vec![
        "Episode 1: Lin hides the hairpin.".to_string(),
        "Episode 2: Wei burns the letter.".to_string(),
    ];
    let splitter = RecursiveSplitter::new(50, 0).unwrap();
    QaSystem::build(cfg, &documents, &splitter, 1).await.unwrap()
}

#[tokio::test]
async fn answer_uses_nearest_chunk() {
    let stub = Stub::with_replies(vec![Reply::Text("In the garden.")]);
    let qa = hairpin_qa(&stub).await;
    assert_eq!(qa.chunk_count(), 2);

    let answer = qa.answer("Where is the hairpin?").await.unwrap();
    assert_eq!(answer, "In the garden.");

    let chats = stub.chats();
    assert_eq!(chats[0]["model"], "gpt-4");
    assert_eq!(chats[0]["temperature"], 0.7);
    assert_eq!(user_msg(&chats[0]), "Where is the hairpin?");
    let system = chats[0]["messages"][0]["content"].as_str().unwrap();
    assert!(system.contains("Lin hides the hairpin."));
    assert!(!system.contains("letter"));
}

#[tokio::test]
async fn ask_loop_stops_on_exit() {
    let stub = Stub::with_replies(vec![Reply::Text("In the garden.")]);
    let qa = hairpin_qa(&stub).await;

    let input: &[u8] = b"Where is the hairpin?\n\n  EXIT \nnever asked\n";
    let mut out: Vec<u8> = Vec::new();
    ask_loop(&qa, input, &mut out).await.unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Answer: In the garden.\n"));
    assert!(out.ends_with("Exiting.\n"));
    assert_eq!(stub.chats().len(), 1);
}

#[tokio::test]
async fn ask_loop_survives_failed_question() {
    let stub = Stub::with_replies(vec![Reply::Status(503), Reply::Text("Wei burned it.")]);
    let qa = hairpin_qa(&stub).await;

    let input: &[u8] = b"first?\nWhat happened to the letter?";
    let mut out: Vec<u8> = Vec::new();
    ask_loop(&qa, input, &mut out).await.unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Error: AI backend error: LLM returned 503"));
    assert!(out.contains("Answer: Wei burned it.\n"));
    assert_eq!(stub.chats().len(), 2);
}

#[tokio::test]
async fn documents_feed_the_index() {
    let doc = json!({
        "1": {"characters": {"Lin": {"Interactions_with_Key_Items": {"Musical Note Hairpin": "hides it"}}}},
        "2": {"characters": {"Wei": {"Interactions_with_Key_Items": {}}}}
    });
    let documents = load_documents(&doc, "Musical Note Hairpin").unwrap();
    assert_eq!(documents.len(), 1);

    let stub = Stub::default();
    let cfg = spawn_stub(stub).await;
    let qa = QaSystem::build(cfg, &documents, &RecursiveSplitter::default(), 4).await.unwrap();
    assert_eq!(qa.chunk_count(), 1);
}

#[tokio::test]
async fn no_documents_builds_empty_index() {
    let cfg = spawn_stub(Stub::default()).await;
    let qa = QaSystem::build(cfg, &[], &RecursiveSplitter::default(), 4).await.unwrap();
    assert_eq!(qa.chunk_count(), 0);
}
