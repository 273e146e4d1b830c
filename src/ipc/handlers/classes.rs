use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Reply, Request};
use crate::layout::{compute_layout, seat_map};
use serde_json::json;
use std::collections::BTreeSet;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let classes: Vec<serde_json::Value> = state
        .roster
        .classes
        .iter()
        .map(|c| {
            json!({
                "classId": c.class_id,
                "displayName": c.display_name,
                "seatCount": c.seat_count,
                "irregular": !state.roster.overrides_for(&c.class_id).is_empty(),
            })
        })
        .collect();
    ok(&req.id, json!({ "classes": classes }))
}

fn handle_periods_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "periods": state.roster.periods }))
}

fn layout_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let class = state
        .roster
        .class(&class_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("unknown class {}", class_id)))?;
    let layout = compute_layout(class, state.roster.overrides_for(&class_id));

    // Marks only show for the class being edited.
    let empty = BTreeSet::new();
    let present = match state.session.present() {
        Some(p) if state.session.class_id() == Some(class_id.as_str()) => p,
        _ => &empty,
    };
    let map = seat_map(&layout, present, state.student_names.get(&class_id));

    Ok(json!({
        "leftGroups": layout.left_groups(),
        "rightGroups": layout.right_groups(),
        "layout": layout,
        "seatMap": map,
    }))
}

fn handle_layout_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match layout_get(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Reply> {
    let resp = match req.method.as_str() {
        "classes.list" => handle_classes_list(state, req),
        "periods.list" => handle_periods_list(state, req),
        "layout.get" => handle_layout_get(state, req),
        _ => return None,
    };
    Some(Reply::Now(resp))
}
