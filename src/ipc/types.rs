use std::future::Future;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::record::{AttendanceRecord, StudentNameMap};
use crate::remote::{RemoteClient, RemoteError, SaveOutcome};
use crate::roster::Roster;
use crate::session::{AttendanceSession, Ticket};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub enum Reply {
    Now(serde_json::Value),
    /// Answered later from a [`Completion`] carrying the request id.
    Deferred,
}

#[derive(Debug)]
pub enum Completion {
    Prefill {
        ticket: Ticket,
        class_id: String,
        result: Result<Option<Vec<u32>>, RemoteError>,
    },
    Saved {
        request_id: String,
        ticket: Ticket,
        record: AttendanceRecord,
        result: Result<SaveOutcome, RemoteError>,
    },
    StudentNames {
        request_id: String,
        result: Result<StudentNameMap, RemoteError>,
    },
}

/// Runs remote calls off the request loop. Each call reports back exactly
/// one [`Completion`] on the loop's channel.
#[derive(Clone)]
pub struct RemoteTasks {
    client: RemoteClient,
    done: UnboundedSender<Completion>,
}

impl RemoteTasks {
    pub fn new(client: RemoteClient, done: UnboundedSender<Completion>) -> Self {
        Self { client, done }
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    pub fn spawn<F, Fut>(&self, work: F)
    where
        F: FnOnce(RemoteClient) -> Fut,
        Fut: Future<Output = Completion> + Send + 'static,
    {
        let fut = work(self.client.clone());
        let done = self.done.clone();
        tokio::spawn(async move {
            let completion = fut.await;
            if done.send(completion).is_err() {
                tracing::debug!("request loop closed; dropping completion");
            }
        });
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Saved sheets held in memory until a workspace is opened.
    pub records: Vec<AttendanceRecord>,
    /// Deferred replies still owed to the caller.
    pub deferred: usize,
    pub roster: Roster,
    pub session: AttendanceSession,
    pub student_names: StudentNameMap,
    pub remote: RemoteTasks,
}

impl AppState {
    pub fn new(roster: Roster, remote: RemoteTasks) -> Self {
        Self {
            workspace: None,
            db: None,
            records: Vec::new(),
            deferred: 0,
            roster,
            session: AttendanceSession::new(),
            student_names: StudentNameMap::new(),
            remote,
        }
    }
}
