use super::handlers;
use super::types::{AppState, Completion, Reply, Request};
use crate::ipc::error::err;

pub fn handle_request(state: &mut AppState, req: Request) -> Reply {
    let reply = dispatch(state, req);
    if let Reply::Deferred = reply {
        state.deferred += 1;
    }
    reply
}

fn dispatch(state: &mut AppState, req: Request) -> Reply {
    if let Some(reply) = handlers::core::try_handle(state, &req) {
        return reply;
    }
    if let Some(reply) = handlers::classes::try_handle(state, &req) {
        return reply;
    }
    if let Some(reply) = handlers::session::try_handle(state, &req) {
        return reply;
    }
    if let Some(reply) = handlers::students::try_handle(state, &req) {
        return reply;
    }
    if let Some(reply) = handlers::history::try_handle(state, &req) {
        return reply;
    }

    Reply::Now(err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    ))
}

/// Turns a finished remote call into the line to write, if any.
pub fn handle_completion(state: &mut AppState, done: Completion) -> Option<serde_json::Value> {
    match done {
        Completion::Prefill {
            ticket,
            class_id,
            result,
        } => handlers::session::on_prefill(state, ticket, class_id, result),
        Completion::Saved {
            request_id,
            ticket,
            record,
            result,
        } => {
            state.deferred = state.deferred.saturating_sub(1);
            Some(handlers::session::on_saved(
                state, &request_id, ticket, record, result,
            ))
        }
        Completion::StudentNames { request_id, result } => {
            state.deferred = state.deferred.saturating_sub(1);
            Some(handlers::students::on_names(state, &request_id, result))
        }
    }
}
