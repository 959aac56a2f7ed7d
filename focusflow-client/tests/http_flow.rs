use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use focusflow_client::{BackendConfig, HttpBackend};
use focusflow_core::{
    ComplexityLevel, EnergyLevel, EnvironmentChecklist, FlowConfig, FlowError, FlowServices,
    FlowStage, OrchestrationController, Progress, SubtaskInput, SwitchResolution, TaskDraft,
    TaskId,
};

#[derive(Default)]
struct Recorded {
    hits: Vec<String>,
    idempotency_keys: Vec<String>,
    bodies: Vec<(String, Value)>,
    /// Server-side subtask rows as (id, title).
    subtasks: Vec<(i64, String)>,
    next_subtask_id: i64,
}

#[derive(Clone)]
struct Fake {
    recorded: Arc<Mutex<Recorded>>,
    reject_create: bool,
    environment_down: bool,
    warn_switch: bool,
}

impl Fake {
    fn new() -> Self {
        Self {
            recorded: Arc::new(Mutex::new(Recorded::default())),
            reject_create: false,
            environment_down: false,
            warn_switch: false,
        }
    }

    fn record(&self, route: String, body: Value) {
        let mut r = self.recorded.lock().unwrap();
        r.hits.push(route.clone());
        r.bodies.push((route, body));
    }

    fn stored_subtasks(&self) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .subtasks
            .iter()
            .map(|(_, title)| title.clone())
            .collect()
    }

    fn hits(&self) -> Vec<String> {
        self.recorded.lock().unwrap().hits.clone()
    }

    fn body(&self, route: &str) -> Option<Value> {
        self.recorded
            .lock()
            .unwrap()
            .bodies
            .iter()
            .find(|(r, _)| r == route)
            .map(|(_, b)| b.clone())
    }
}

fn ok(data: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "success": true, "data": data })))
}

async fn create_task(State(fake): State<Fake>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if let Some(key) = headers.get("Idempotency-Key").and_then(|v| v.to_str().ok()) {
        fake.recorded.lock().unwrap().idempotency_keys.push(key.to_string());
    }
    fake.record("tasks".into(), body.clone());
    if fake.reject_create {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "success": false, "message": "Validation failed", "error": "deadline is in the past" })),
        );
    }
    ok(json!({ "id": 42, "title": body["title"], "category": body["category"] }))
}

async fn create_subtasks(
    State(fake): State<Fake>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.record(format!("tasks/{id}/subtasks"), body.clone());
    let mut r = fake.recorded.lock().unwrap();
    let mut saved = Vec::new();
    for s in body["subtasks"].as_array().cloned().unwrap_or_default() {
        let row_id = 500 + r.next_subtask_id;
        r.next_subtask_id += 1;
        r.subtasks.push((row_id, s["title"].as_str().unwrap_or_default().to_string()));
        saved.push(json!({ "id": row_id, "title": s["title"], "estimated_minutes": s["estimated_minutes"] }));
    }
    ok(json!(saved))
}

async fn delete_subtask(State(fake): State<Fake>, Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    fake.record(format!("subtasks/{id}"), Value::Null);
    let mut r = fake.recorded.lock().unwrap();
    let before = r.subtasks.len();
    r.subtasks.retain(|(row_id, _)| *row_id != id);
    if r.subtasks.len() == before {
        return (StatusCode::NOT_FOUND, Json(json!({ "success": false, "error": "Subtask not found" })));
    }
    (StatusCode::OK, Json(json!({ "success": true, "message": "Subtask deleted" })))
}

async fn breakdown(State(fake): State<Fake>, Path(id): Path<i64>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    fake.record(format!("tasks/{id}/breakdown"), body);
    ok(json!({
        "subtasks": [
            { "title": "Gather sources", "estimated_minutes": 20 },
            { "title": "Outline", "estimated_minutes": 15 }
        ]
    }))
}

async fn environment_check(
    State(fake): State<Fake>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.record(format!("tasks/{id}/environment-check"), body);
    if fake.environment_down {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "success": false, "error": "maintenance" })));
    }
    (StatusCode::OK, Json(json!({ "success": true, "message": "Environment check saved" })))
}

async fn context_switch(State(fake): State<Fake>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    fake.record("context-switch".into(), body);
    if !fake.warn_switch {
        return ok(Value::Null);
    }
    ok(json!({
        "should_warn": true,
        "warning_message": "Context switch detected",
        "context_switch": {
            "id": 9,
            "from_category": "study",
            "to_category": "work",
            "estimated_cost_minutes": 15,
            "is_significant_switch": true
        }
    }))
}

async fn confirm_switch(State(fake): State<Fake>, Path(id): Path<i64>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    fake.record(format!("context-switch/{id}/confirm"), body);
    (StatusCode::OK, Json(json!({ "success": true, "message": "Context switch confirmed" })))
}

async fn start_session(State(fake): State<Fake>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    fake.record("sessions".into(), body.clone());
    ok(json!({
        "id": 77,
        "task_id": body["task_id"],
        "duration_minutes": body["duration_minutes"],
        "started_at": "2026-10-17T09:00:00Z"
    }))
}

async fn serve(fake: Fake) -> String {
    let app = Router::new()
        .route("/tasks", post(create_task))
        .route("/tasks/:id/subtasks", post(create_subtasks))
        .route("/subtasks/:id", delete(delete_subtask))
        .route("/tasks/:id/breakdown", post(breakdown))
        .route("/tasks/:id/environment-check", post(environment_check))
        .route("/context-switch", post(context_switch))
        .route("/context-switch/:id/confirm", post(confirm_switch))
        .route("/sessions", post(start_session))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn controller(base_url: String, draft: TaskDraft) -> OrchestrationController {
    let backend = HttpBackend::new(BackendConfig {
        base_url,
        api_token: Some("test-token".into()),
        request_timeout: Duration::from_secs(5),
    })
    .unwrap();
    let (c, _rx) = OrchestrationController::new(
        draft,
        FlowServices::from_backend(Arc::new(backend)),
        FlowConfig::default(),
    );
    c
}

fn report_draft() -> TaskDraft {
    TaskDraft::new("Write report")
        .with_priority(3)
        .with_energy(EnergyLevel::Medium)
}

#[tokio::test]
async fn full_flow_over_http_launches_once() {
    let fake = Fake {
        environment_down: true,
        warn_switch: true,
        ..Fake::new()
    };
    let base = serve(fake.clone()).await;
    let c = controller(base, report_draft()).with_previous_task(Some(TaskId(7)));

    assert_eq!(c.submit(true).await.unwrap(), Progress::Advanced(FlowStage::EnvironmentPending));
    assert_eq!(
        c.save_environment(EnvironmentChecklist::all_checked()).await.unwrap(),
        Progress::Advanced(FlowStage::SwitchWarned)
    );
    assert_eq!(
        c.resolve_switch(SwitchResolution::Proceed { note: Some("deadline".into()) })
            .await
            .unwrap(),
        Progress::Advanced(FlowStage::Launched)
    );

    assert_eq!(
        fake.hits(),
        vec![
            "tasks",
            "tasks/42/environment-check",
            "context-switch",
            "context-switch/9/confirm",
            "sessions",
        ]
    );

    let switch = fake.body("context-switch").unwrap();
    assert_eq!(switch["to_task_id"], 42);
    assert_eq!(switch["from_task_id"], 7);

    let session = fake.body("sessions").unwrap();
    assert_eq!(session["task_id"], 42);
    assert_eq!(session["session_type"], "work");
    assert_eq!(session["duration_minutes"], 25);

    let keys = fake.recorded.lock().unwrap().idempotency_keys.clone();
    assert_eq!(keys.len(), 1);
    assert!(!keys[0].is_empty());
}

#[tokio::test]
async fn unprocessable_draft_stays_editable() {
    let fake = Fake {
        reject_create: true,
        ..Fake::new()
    };
    let base = serve(fake.clone()).await;
    let c = controller(base, report_draft());

    let err = c.submit(true).await.unwrap_err();
    assert_eq!(err, FlowError::Validation("deadline is in the past".into()));
    assert_eq!(c.stage(), FlowStage::Draft);
    assert!(c.update_draft(|d| d.deadline = None).is_ok());

    // a retry of the same flow carries the same key
    let _ = c.submit(true).await;
    let keys = fake.recorded.lock().unwrap().idempotency_keys.clone();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0], keys[1]);
}

#[tokio::test]
async fn breakdown_is_proposed_then_persisted_on_apply() {
    let fake = Fake::new();
    let base = serve(fake.clone()).await;
    let draft = report_draft().with_subtask(SubtaskInput::new("c1", "Read brief"));
    let c = controller(base, draft);

    c.breakdown_draft(ComplexityLevel::Complex, false).await.unwrap();
    assert_eq!(c.stage(), FlowStage::BreakdownProposed);
    assert_eq!(fake.body("tasks/42/breakdown").unwrap()["complexity"], "complex");
    assert_eq!(fake.stored_subtasks(), vec!["Read brief"]);

    c.apply_breakdown().await.unwrap();
    let titles: Vec<String> = c.draft().subtasks.into_iter().map(|s| s.title).collect();
    assert_eq!(titles, vec!["Gather sources", "Outline"]);

    // the server holds the proposal only, not the proposal on top of the draft rows
    assert_eq!(fake.stored_subtasks(), vec!["Gather sources", "Outline"]);
    assert!(fake.hits().contains(&"subtasks/500".to_string()));
    let saved = c.created_task().unwrap().subtasks;
    assert_eq!(saved.iter().map(|s| s.id).collect::<Vec<_>>(), vec![501, 502]);
    assert!(!fake.hits().contains(&"sessions".to_string()));
}

#[tokio::test]
async fn breakdown_with_immediate_start_launches_after_apply() {
    let fake = Fake::new();
    let base = serve(fake.clone()).await;
    let c = controller(base, report_draft());

    c.breakdown_draft(ComplexityLevel::Medium, true).await.unwrap();
    c.apply_breakdown().await.unwrap();
    assert_eq!(c.start_session().unwrap(), Progress::Advanced(FlowStage::EnvironmentPending));
    assert_eq!(c.skip_environment().await.unwrap(), Progress::Advanced(FlowStage::Launched));

    assert_eq!(
        fake.hits(),
        vec![
            "tasks",
            "tasks/42/breakdown",
            "tasks/42/subtasks",
            "context-switch",
            "sessions",
        ]
    );
    assert_eq!(fake.stored_subtasks(), vec!["Gather sources", "Outline"]);
}

#[tokio::test]
async fn quiet_switch_check_launches_directly() {
    let fake = Fake::new();
    let base = serve(fake.clone()).await;
    let c = controller(base, report_draft().with_duration(Some(0), Some(50)));

    c.submit(true).await.unwrap();
    assert_eq!(c.skip_environment().await.unwrap(), Progress::Advanced(FlowStage::Launched));
    assert!(!fake.hits().iter().any(|h| h.contains("environment-check")));
    assert_eq!(fake.body("sessions").unwrap()["duration_minutes"], 50);
}
