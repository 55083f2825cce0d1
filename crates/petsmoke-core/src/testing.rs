//! In-process stand-in for the mock pets server, used by tests.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Behaviour knobs for the mock server.
#[derive(Debug, Clone)]
pub struct MockPets {
    /// Id handed out by POST instead of a counter
    pub fixed_id: Option<Value>,
    /// Hand out counter ids as JSON numbers rather than strings
    pub numeric_ids: bool,
    /// Leave `id` out of the POST response
    pub omit_id: bool,
    /// Answer GET /pets with an object instead of an array
    pub list_as_object: bool,
    /// Accept POSTs without storing them
    pub forget_created: bool,
    /// Status returned by DELETE for known ids
    pub delete_status: StatusCode,
}

impl Default for MockPets {
    fn default() -> Self {
        Self {
            fixed_id: None,
            numeric_ids: false,
            omit_id: false,
            list_as_object: false,
            forget_created: false,
            delete_status: StatusCode::NO_CONTENT,
        }
    }
}

pub struct MockState {
    config: MockPets,
    pets: Mutex<Vec<Value>>,
    next_id: AtomicU64,
    /// Decoded `{id}` path segment of every DELETE received
    deleted: Mutex<Vec<String>>,
}

impl MockState {
    pub fn pet_count(&self) -> usize {
        self.pets.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn delete_count(&self) -> usize {
        self.deleted_ids().len()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

pub struct MockServer {
    pub base_url: String,
    pub port: u16,
    pub state: Arc<MockState>,
}

impl MockPets {
    pub async fn spawn(self) -> MockServer {
        let state = Arc::new(MockState {
            config: self,
            pets: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            deleted: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/__status", get(status))
            .route("/pets", get(list_pets).post(create_pet))
            .route("/pets/{id}", delete(delete_pet))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let port = listener.local_addr().expect("local addr").port();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        MockServer {
            base_url: format!("http://127.0.0.1:{}", port),
            port,
            state,
        }
    }
}

async fn status(State(state): State<Arc<MockState>>) -> Json<Value> {
    Json(json!({ "status": "ok", "count": state.pet_count() }))
}

async fn list_pets(State(state): State<Arc<MockState>>) -> Json<Value> {
    let pets = state.pets.lock().map(|p| p.clone()).unwrap_or_default();
    if state.config.list_as_object {
        return Json(json!({ "items": pets }));
    }
    Json(Value::Array(pets))
}

async fn create_pet(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let id = match state.config.fixed_id {
        Some(ref id) => id.clone(),
        None => {
            let n = state.next_id.fetch_add(1, Ordering::SeqCst);
            if state.config.numeric_ids {
                json!(n)
            } else {
                json!(n.to_string())
            }
        }
    };

    let mut pet = body;
    if let Some(obj) = pet.as_object_mut() {
        obj.insert("id".into(), id);
    }

    if !state.config.forget_created {
        if let Ok(mut pets) = state.pets.lock() {
            pets.push(pet.clone());
        }
    }

    if state.config.omit_id {
        if let Some(obj) = pet.as_object_mut() {
            obj.remove("id");
        }
    }

    (StatusCode::CREATED, Json(pet)).into_response()
}

async fn delete_pet(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> StatusCode {
    if let Ok(mut deleted) = state.deleted.lock() {
        deleted.push(id.clone());
    }
    let Ok(mut pets) = state.pets.lock() else {
        return StatusCode::INTERNAL_SERVER_ERROR;
    };
    let before = pets.len();
    pets.retain(|p| p.get("id").map(id_text).as_deref() != Some(id.as_str()));
    if pets.len() == before {
        StatusCode::NOT_FOUND
    } else {
        state.config.delete_status
    }
}

/// An id as it appears in a URL path.
fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A localhost port with nothing listening on it.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    listener.local_addr().expect("local addr").port()
}

/// Whether a pid refers to a live process. Zombies count as dead: orphans
/// are reaped by whatever init the test runs under, possibly never.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    if unsafe { libc::kill(pid as libc::pid_t, 0) } != 0 {
        return false;
    }
    // /proc/<pid>/stat: "<pid> (<comm>) <state> ..."
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.trim_start().chars().next())
            .is_none_or(|state| state != 'Z'),
        Err(_) => true,
    }
}

/// Poll until `pid` is gone. Returns `false` if it outlived `timeout`.
#[cfg(unix)]
pub async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while pid_alive(pid) {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    true
}
