use crate::config::Config;
use crate::record::{AttendanceRecord, StudentNameMap};
use chrono::NaiveDate;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote endpoint is not configured")]
    NotConfigured,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("remote returned HTTP {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Logic(String),
}

impl RemoteError {
    pub fn code(&self) -> &'static str {
        match self {
            RemoteError::Logic(_) => "remote_logic_error",
            _ => "network_error",
        }
    }
}

/// Every web app reply is `{ success, data?, message? }`; `success: false` is
/// a logic error carrying the message.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<(Option<T>, Option<String>), RemoteError> {
        if !self.success {
            return Err(RemoteError::Logic(
                self.message
                    .unwrap_or_else(|| "remote reported failure".to_string()),
            ));
        }
        Ok((self.data, self.message))
    }
}

#[derive(Debug, Deserialize)]
struct SavedSheet {
    #[serde(default, deserialize_with = "lenient_seats")]
    students: Vec<u32>,
}

/// Spreadsheet cells come back as numbers or numeric strings.
fn lenient_seats<'de, D>(deserializer: D) -> Result<Vec<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    let mut out = Vec::new();
    for v in raw.unwrap_or_default() {
        let seat = match &v {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        match seat.and_then(|s| u32::try_from(s).ok()) {
            Some(s) => out.push(s),
            None => {
                return Err(serde::de::Error::custom(format!(
                    "seat number expected, got {v}"
                )))
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Serialize)]
struct UpdateAttendance<'a> {
    action: &'static str,
    date: String,
    class: &'a str,
    period: &'a str,
    students: &'a [u32],
    score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveKind {
    Inserted,
    Updated,
}

impl SaveKind {
    /// The web app only tells the two apart in its message text, and only
    /// the lowercase word counts.
    pub fn from_message(message: &str) -> Self {
        if message.contains("updated") {
            SaveKind::Updated
        } else {
            SaveKind::Inserted
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub kind: SaveKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    endpoint: Option<Url>,
}

impl RemoteClient {
    pub fn new(config: &Config) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    fn endpoint(&self) -> Result<&Url, RemoteError> {
        self.endpoint.as_ref().ok_or(RemoteError::NotConfigured)
    }

    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Envelope<T>, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        parse_envelope(&body)
    }

    pub async fn fetch_student_names(&self) -> Result<StudentNameMap, RemoteError> {
        let url = self.endpoint()?.clone();
        let response = self
            .client
            .get(url)
            .query(&[("action", "getStudents")])
            .send()
            .await?;
        let (data, _) = Self::read_envelope::<StudentNameMap>(response)
            .await?
            .into_result()?;
        Ok(data.unwrap_or_default())
    }

    /// Today's sheet for a class, if one was saved. The web app matches on
    /// date and class only.
    pub async fn fetch_attendance(
        &self,
        date: NaiveDate,
        class_id: &str,
    ) -> Result<Option<Vec<u32>>, RemoteError> {
        let url = self.endpoint()?.clone();
        let date = date.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(url)
            .query(&[
                ("action", "getAttendance"),
                ("date", date.as_str()),
                ("class", class_id),
            ])
            .send()
            .await?;
        let (data, _) = Self::read_envelope::<SavedSheet>(response)
            .await?
            .into_result()?;
        Ok(data.map(|sheet| sheet.students))
    }

    /// Upsert on (date, class, period). The web app decides insert vs update.
    pub async fn update_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> Result<SaveOutcome, RemoteError> {
        let url = self.endpoint()?.clone();
        let body = UpdateAttendance {
            action: "updateAttendance",
            date: record.date.format("%Y-%m-%d").to_string(),
            class: &record.class_id,
            period: &record.period_id,
            students: &record.present_seats,
            score: record.score,
        };
        let response = self.client.post(url).json(&body).send().await?;
        let (_, message) = Self::read_envelope::<serde_json::Value>(response)
            .await?
            .into_result()?;
        let message = message.unwrap_or_default();
        Ok(SaveOutcome {
            kind: SaveKind::from_message(&message),
            message,
        })
    }
}

fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<Envelope<T>, RemoteError> {
    serde_json::from_str(body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}
