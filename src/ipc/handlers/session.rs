use crate::db;
use crate::history::remember_record;
use crate::ipc::error::{err, event, ok};
use crate::ipc::helpers::{get_required_str, get_required_u32, today, HandlerErr};
use crate::ipc::types::{AppState, Completion, Reply, Request};
use crate::record::AttendanceRecord;
use crate::remote::{RemoteError, SaveOutcome};
use crate::session::{PrefillOutcome, Ticket};
use serde_json::json;

fn session_json(state: &AppState) -> serde_json::Value {
    let present = state.session.present_seats();
    json!({
        "classId": state.session.class_id(),
        "presentCount": present.len(),
        "presentSeats": present,
        "ticket": state.session.ticket(),
    })
}

fn select_class(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let class = state
        .roster
        .class(&class_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("unknown class {}", class_id)))?;
    let ticket = state.session.select_class(class);

    let date = today();
    let lookup = class_id.clone();
    state.remote.spawn(move |client| async move {
        let result = client.fetch_attendance(date, &lookup).await;
        Completion::Prefill {
            ticket,
            class_id: lookup,
            result,
        }
    });
    tracing::info!(class_id = %class_id, ticket = ticket.0, "class selected");

    Ok(json!({
        "classId": class_id,
        "ticket": ticket,
        "presentSeats": state.session.present_seats(),
    }))
}

fn toggle_seat(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let seat = get_required_u32(params, "seat")?;
    let present = state.session.toggle_seat(seat)?;
    let mut out = session_json(state);
    out["seat"] = json!(seat);
    out["present"] = json!(present);
    Ok(out)
}

fn save(state: &mut AppState, req: &Request) -> Result<(), HandlerErr> {
    let period_id = get_required_str(&req.params, "periodId")?;
    let period = state
        .roster
        .period(&period_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("unknown period {}", period_id)))?;
    let record = state.session.prepare_record(period, today())?;
    let ticket = state.session.ticket();

    let request_id = req.id.clone();
    state.remote.spawn(move |client| async move {
        let result = client.update_attendance(&record).await;
        Completion::Saved {
            request_id,
            ticket,
            record,
            result,
        }
    });
    Ok(())
}

pub fn on_prefill(
    state: &mut AppState,
    ticket: Ticket,
    class_id: String,
    result: Result<Option<Vec<u32>>, RemoteError>,
) -> Option<serde_json::Value> {
    match result {
        Ok(saved) => {
            let found = saved.is_some();
            let seats = saved.unwrap_or_default();
            match state.session.apply_prefill(ticket, &seats) {
                PrefillOutcome::Stale => {
                    tracing::debug!(class_id = %class_id, ticket = ticket.0, "discarding stale prefill");
                    None
                }
                PrefillOutcome::Applied { rejected } => {
                    if !rejected.is_empty() {
                        tracing::warn!(class_id = %class_id, ?rejected, "saved sheet has seats outside the class");
                    }
                    Some(event(
                        "session.prefilled",
                        json!({
                            "ticket": ticket,
                            "classId": class_id,
                            "found": found,
                            "presentSeats": state.session.present_seats(),
                            "rejectedSeats": rejected,
                        }),
                    ))
                }
            }
        }
        Err(e) => {
            if !state.session.is_current(ticket) {
                tracing::debug!(class_id = %class_id, error = %e, "stale prefill failed");
                return None;
            }
            // Marks stay empty; the class is still editable.
            tracing::warn!(class_id = %class_id, error = %e, "failed to load today's attendance");
            Some(event(
                "session.warning",
                json!({
                    "ticket": ticket,
                    "classId": class_id,
                    "code": e.code(),
                    "message": e.to_string(),
                }),
            ))
        }
    }
}

pub fn on_saved(
    state: &mut AppState,
    request_id: &str,
    ticket: Ticket,
    record: AttendanceRecord,
    result: Result<SaveOutcome, RemoteError>,
) -> serde_json::Value {
    let outcome = match result {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                class_id = %record.class_id,
                period_id = %record.period_id,
                error = %e,
                "attendance save failed"
            );
            return err(
                request_id,
                e.code(),
                e.to_string(),
                Some(json!({
                    "classId": record.class_id,
                    "periodId": record.period_id,
                })),
            );
        }
    };

    let cached = match state.db.as_ref() {
        Some(conn) => match db::upsert_record(conn, &record) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "saved remotely but failed to cache record");
                false
            }
        },
        None => {
            remember_record(&mut state.records, record.clone());
            true
        }
    };
    let cleared = state.session.finish_commit(ticket);
    tracing::info!(
        class_id = %record.class_id,
        period_id = %record.period_id,
        present = record.present_seats.len(),
        outcome = ?outcome.kind,
        "attendance saved"
    );

    ok(
        request_id,
        json!({
            "outcome": outcome.kind,
            "message": outcome.message,
            "presentCount": record.present_seats.len(),
            "record": record,
            "cached": cached,
            "cleared": cleared,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Reply> {
    let resp = match req.method.as_str() {
        "session.selectClass" => match select_class(state, &req.params) {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        },
        "session.toggleSeat" => match toggle_seat(state, &req.params) {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        },
        "session.reset" => {
            state.session.reset();
            ok(&req.id, session_json(state))
        }
        "session.get" => ok(&req.id, session_json(state)),
        "session.save" => match save(state, req) {
            Ok(()) => return Some(Reply::Deferred),
            Err(error) => error.response(&req.id),
        },
        _ => return None,
    };
    Some(Reply::Now(resp))
}
