use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::students::NAMES_SETTING;
use crate::ipc::types::{AppState, Reply, Request};
use crate::record::StudentNameMap;
use anyhow::Context;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "remoteConfigured": state.remote.client().is_configured(),
            "activeClass": state.session.class_id(),
        }),
    )
}

/// Opens the record cache in `path`, moves sheets saved before any workspace
/// was open into it and loads cached student names. Returns the number of
/// cached records.
pub fn open_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<usize> {
    let conn = db::open_db(&path)?;
    for record in &state.records {
        db::upsert_record(&conn, record)
            .with_context(|| format!("failed to cache {} {}", record.class_id, record.date))?;
    }
    let flushed = std::mem::take(&mut state.records).len();
    let cached = db::list_records(&conn)?.len();

    // Best-effort: cached names stand in until students.refresh succeeds.
    match db::settings_get_json(&conn, NAMES_SETTING) {
        Ok(Some(v)) => match serde_json::from_value::<StudentNameMap>(v) {
            Ok(names) => state.student_names = names,
            Err(e) => tracing::warn!(error = %e, "ignoring unreadable cached student names"),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "failed to read cached student names"),
    }

    tracing::info!(path = %path.display(), cached, flushed, "workspace opened");
    state.workspace = Some(path);
    state.db = Some(conn);
    Ok(cached)
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, path.clone()) {
        Ok(cached) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "cachedRecords": cached,
            }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Reply> {
    match req.method.as_str() {
        "health" => Some(Reply::Now(handle_health(state, req))),
        "workspace.select" => Some(Reply::Now(handle_workspace_select(state, req))),
        _ => None,
    }
}
