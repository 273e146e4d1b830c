use crate::db;
use crate::history::{
    compute_stats, find_record, recent_records, HistoryFilter, RecordMatch, DEFAULT_RECENT_LIMIT,
};
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_optional_date, get_optional_str, get_optional_u32, get_required_str, parse_date,
    HandlerErr,
};
use crate::ipc::types::{AppState, Reply, Request};
use crate::layout::{compute_layout, seat_map};
use crate::record::AttendanceRecord;
use serde_json::json;
use std::collections::BTreeSet;

/// Workspace cache when one is open, otherwise the in-memory sheets.
fn load_records(state: &AppState) -> Result<Vec<AttendanceRecord>, HandlerErr> {
    match state.db.as_ref() {
        Some(conn) => db::list_records(conn)
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string())),
        None => Ok(state.records.clone()),
    }
}

fn history_query(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let filter = HistoryFilter {
        date: get_optional_date(params, "date")?,
        period_id: get_optional_str(params, "periodId")?,
        class_id: get_optional_str(params, "classId")?,
    };
    let class = match filter.class_id.as_deref() {
        Some(id) => Some(
            state
                .roster
                .class(id)
                .ok_or_else(|| HandlerErr::new("not_found", format!("unknown class {}", id)))?,
        ),
        None => None,
    };

    let records = load_records(state)?;
    let found = find_record(&records, &filter);
    let ambiguous = matches!(found, RecordMatch::Ambiguous(_));

    // Totals need a class: the filter's, or else the single match's.
    let stats_class = class.or_else(|| {
        found
            .unique()
            .and_then(|r| state.roster.class(&r.class_id))
    });
    let stats = match stats_class {
        Some(c) if !ambiguous => Some(compute_stats(found.unique(), c)),
        _ => None,
    };

    Ok(json!({
        "exact": filter.is_exact(),
        "ambiguous": ambiguous,
        "matches": found.all(),
        "record": found.unique(),
        "stats": stats,
    }))
}

fn history_view(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = parse_date(&get_required_str(params, "date")?)?;
    let period_id = get_required_str(params, "periodId")?;
    let class_id = get_required_str(params, "classId")?;
    let period = state
        .roster
        .period(&period_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("unknown period {}", period_id)))?;
    let class = state
        .roster
        .class(&class_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("unknown class {}", class_id)))?;

    let records = load_records(state)?;
    let found = find_record(&records, &HistoryFilter::exact(date, &period_id, &class_id));
    // Cache rows are unique per key, so an exact filter never matches twice.
    let record = found.unique();

    let present: BTreeSet<u32> = record
        .map(|r| r.present_seats.iter().copied().collect())
        .unwrap_or_default();
    let layout = compute_layout(class, state.roster.overrides_for(&class_id));
    let map = seat_map(&layout, &present, state.student_names.get(&class_id));

    Ok(json!({
        "date": date,
        "classId": class_id,
        "periodId": period_id,
        "score": period.score_weight,
        "record": record,
        "stats": compute_stats(record, class),
        "seatMap": map,
    }))
}

fn history_recent(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let limit = get_optional_u32(params, "limit")?
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_RECENT_LIMIT);
    let records = load_records(state)?;
    Ok(json!({ "records": recent_records(&records, limit) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Reply> {
    let result = match req.method.as_str() {
        "history.query" => history_query(state, &req.params),
        "history.view" => history_view(state, &req.params),
        "history.recent" => history_recent(state, &req.params),
        _ => return None,
    };
    Some(Reply::Now(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }))
}
