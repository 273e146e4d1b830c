use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, HandlerErr};
use crate::ipc::types::{AppState, Completion, Reply, Request};
use crate::record::StudentNameMap;
use crate::remote::RemoteError;
use serde_json::json;

pub const NAMES_SETTING: &str = "students.names";

fn refresh(state: &mut AppState, req: &Request) {
    let request_id = req.id.clone();
    state.remote.spawn(move |client| async move {
        let result = client.fetch_student_names().await;
        Completion::StudentNames { request_id, result }
    });
}

fn names(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    match get_optional_str(params, "classId")? {
        Some(class_id) => {
            if state.roster.class(&class_id).is_none() {
                return Err(HandlerErr::new(
                    "not_found",
                    format!("unknown class {}", class_id),
                ));
            }
            let labels = state.student_names.get(&class_id).cloned().unwrap_or_default();
            Ok(json!({ "classId": class_id, "names": labels }))
        }
        None => Ok(json!({ "names": state.student_names })),
    }
}

pub fn on_names(
    state: &mut AppState,
    request_id: &str,
    result: Result<StudentNameMap, RemoteError>,
) -> serde_json::Value {
    match result {
        Ok(fetched) => {
            if let Some(conn) = state.db.as_ref() {
                let cached = serde_json::to_value(&fetched)
                    .map_err(anyhow::Error::from)
                    .and_then(|v| db::settings_set_json(conn, NAMES_SETTING, &v));
                if let Err(e) = cached {
                    tracing::warn!(error = %e, "failed to cache student names");
                }
            }
            tracing::info!(classes = fetched.len(), "student names loaded");
            state.student_names = fetched;
            ok(
                request_id,
                json!({
                    "classes": state.student_names.len(),
                    "names": state.student_names,
                }),
            )
        }
        Err(e) => {
            // Labels are cosmetic; keep whatever we had (cached or empty).
            tracing::warn!(error = %e, "failed to fetch student names");
            err(
                request_id,
                e.code(),
                e.to_string(),
                Some(json!({ "fallbackClasses": state.student_names.len() })),
            )
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Reply> {
    let resp = match req.method.as_str() {
        "students.refresh" => {
            refresh(state, req);
            return Some(Reply::Deferred);
        }
        "students.names" => match names(state, &req.params) {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        },
        _ => return None,
    };
    Some(Reply::Now(resp))
}
