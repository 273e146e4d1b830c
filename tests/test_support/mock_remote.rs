use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct MockRow {
    pub date: String,
    pub class: String,
    pub period: String,
    pub students: Vec<u32>,
    pub score: f64,
}

#[derive(Debug, Default)]
pub struct MockSheet {
    pub students: Value,
    pub rows: Vec<MockRow>,
    /// getAttendance for this class answers only after the delay.
    pub slow_class: Option<(String, Duration)>,
    /// When set, every updateAttendance is refused with this message.
    pub reject_updates: Option<String>,
    /// When set, every request fails with this HTTP status.
    pub fail_status: Option<u16>,
    pub posts: usize,
}

pub type SharedSheet = Arc<Mutex<MockSheet>>;

pub fn row(date: &str, class: &str, period: &str, students: &[u32]) -> MockRow {
    MockRow {
        date: date.to_string(),
        class: class.to_string(),
        period: period.to_string(),
        students: students.to_vec(),
        score: 0.0,
    }
}

fn attendance_delay(sheet: &SharedSheet, class: &str) -> Option<Duration> {
    let g = sheet.lock().expect("sheet lock");
    g.slow_class
        .as_ref()
        .filter(|(c, _)| c == class)
        .map(|(_, d)| *d)
}

fn read_action(sheet: &SharedSheet, q: &HashMap<String, String>) -> Value {
    let g = sheet.lock().expect("sheet lock");
    let param = |k: &str| q.get(k).cloned().unwrap_or_default();
    match param("action").as_str() {
        "getStudents" => json!({ "success": true, "data": g.students }),
        "getAttendance" => {
            let date = param("date");
            let class = param("class");
            let data = g
                .rows
                .iter()
                .find(|r| r.date == date && r.class == class)
                .map(|r| json!({ "students": r.students }));
            json!({ "success": true, "data": data })
        }
        other => json!({ "success": false, "message": format!("unknown action {}", other) }),
    }
}

fn write_action(sheet: &SharedSheet, body: &Value) -> Value {
    let mut g = sheet.lock().expect("sheet lock");
    if body["action"] != "updateAttendance" {
        return json!({ "success": false, "message": "unknown action" });
    }
    if let Some(msg) = g.reject_updates.clone() {
        return json!({ "success": false, "message": msg });
    }
    g.posts += 1;

    let incoming = MockRow {
        date: body["date"].as_str().unwrap_or_default().to_string(),
        class: body["class"].as_str().unwrap_or_default().to_string(),
        period: body["period"].as_str().unwrap_or_default().to_string(),
        students: body["students"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_u64()).map(|v| v as u32).collect())
            .unwrap_or_default(),
        score: body["score"].as_f64().unwrap_or_default(),
    };
    let existing = g.rows.iter_mut().find(|r| {
        r.date == incoming.date && r.class == incoming.class && r.period == incoming.period
    });
    match existing {
        Some(r) => {
            *r = incoming;
            json!({ "success": true, "message": "Attendance updated" })
        }
        None => {
            g.rows.push(incoming);
            json!({ "success": true, "message": "Attendance saved" })
        }
    }
}

fn forced_failure(sheet: &SharedSheet) -> Result<(), StatusCode> {
    let g = sheet.lock().expect("sheet lock");
    match g.fail_status {
        Some(code) => Err(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)),
        None => Ok(()),
    }
}

async fn get_handler(
    State(sheet): State<SharedSheet>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    forced_failure(&sheet)?;
    let class = q.get("class").cloned().unwrap_or_default();
    if let Some(delay) = attendance_delay(&sheet, &class) {
        tokio::time::sleep(delay).await;
    }
    Ok(Json(read_action(&sheet, &q)))
}

async fn post_handler(
    State(sheet): State<SharedSheet>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    forced_failure(&sheet)?;
    Ok(Json(write_action(&sheet, &body)))
}

/// Serves the sheet on an ephemeral port and returns the endpoint URL.
pub fn start(sheet: SharedSheet) -> String {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("mock runtime");
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind mock");
            tx.send(listener.local_addr().expect("mock addr"))
                .expect("send mock addr");
            let app = Router::new()
                .route("/exec", get(get_handler).post(post_handler))
                .with_state(sheet);
            axum::serve(listener, app).await.expect("serve mock");
        });
    });
    let addr = rx.recv().expect("mock addr");
    format!("http://{}/exec", addr)
}
