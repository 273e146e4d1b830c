mod config;
mod db;
mod history;
mod ipc;
mod layout;
mod record;
mod remote;
mod roster;
mod session;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

async fn write_line(out: &mut tokio::io::Stdout, value: &serde_json::Value) -> std::io::Result<()> {
    let line = serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string());
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // stdout is the protocol channel; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rollcalld=info")),
        )
        .init();

    let config = config::Config::from_env()?;
    let roster = config.load_roster()?;
    let client = remote::RemoteClient::new(&config)?;
    if !client.is_configured() {
        tracing::warn!("ROLLCALL_ENDPOINT not set; remote calls will fail");
    }

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let mut state = ipc::AppState::new(roster, ipc::RemoteTasks::new(client, done_tx));
    if let Some(path) = config.workspace.clone() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::warn!(error = ?e, "could not open configured workspace");
        }
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        classes = state.roster.classes.len(),
        "rollcalld ready"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let mut reading = true;
    // After stdin closes, keep serving completions until every deferred
    // reply has been written.
    while reading || state.deferred > 0 {
        tokio::select! {
            line = lines.next_line(), if reading => {
                let line = match line {
                    Ok(Some(v)) => v,
                    Ok(None) => {
                        tracing::info!(pending = state.deferred, "stdin closed");
                        reading = false;
                        continue;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "stdin read failed");
                        reading = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                let req: ipc::Request = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(e) => {
                        // Can't reply without id.
                        let resp = serde_json::json!({
                            "ok": false,
                            "error": { "code": "bad_json", "message": e.to_string() }
                        });
                        write_line(&mut stdout, &resp).await?;
                        continue;
                    }
                };

                tracing::debug!(id = %req.id, method = %req.method, "request");
                if let ipc::Reply::Now(resp) = ipc::handle_request(&mut state, req) {
                    write_line(&mut stdout, &resp).await?;
                }
            }
            Some(done) = done_rx.recv() => {
                if let Some(msg) = ipc::handle_completion(&mut state, done) {
                    write_line(&mut stdout, &msg).await?;
                }
            }
        }
    }

    tracing::info!("all replies written; exiting");
    Ok(())
}
