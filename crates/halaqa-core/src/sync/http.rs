//! Submitter speaking to the Halaqa REST backend through a [`Transport`].

use reqwest::Method;
use serde_json::{Map, Value};

use super::transport::{classify_failure, Transport, TransportRequest};
use super::{Accepted, FailureReason, SubmitOutcome, Submission, Submitter};
use crate::models::server_id_from_value;
use crate::util::{compact_text, join_url};

pub struct HttpSubmitter<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> HttpSubmitter<T> {
    /// `base_url` is expected to be normalized (no trailing slash)
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    fn url_for(&self, submission: &Submission) -> String {
        match submission {
            Submission::Attendance { .. } => join_url(&self.base_url, &["attendance"]),
            Submission::Session { .. } => join_url(&self.base_url, &["sessions"]),
            Submission::Note { session_id, .. } => {
                join_url(&self.base_url, &["sessions", session_id.as_str(), "notes"])
            }
        }
    }
}

impl<T: Transport> Submitter for HttpSubmitter<T> {
    async fn submit(&self, submission: &Submission) -> SubmitOutcome {
        let body = match submission.body() {
            Ok(body) => body,
            Err(error) => {
                tracing::error!(
                    "Failed to encode {} {}: {error}",
                    submission.kind(),
                    submission.local_id()
                );
                return Err(FailureReason::Unknown);
            }
        };
        let request = TransportRequest {
            method: Method::POST,
            url: self.url_for(submission),
            body,
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!("{error}");
                return Err(FailureReason::NetworkUnreachable);
            }
        };

        if !response.ok {
            tracing::debug!(
                "Backend refused {} {} with HTTP {}: {}",
                submission.kind(),
                submission.local_id(),
                response.status,
                compact_text(&response.data.to_string())
            );
            return Err(classify_failure(&response));
        }

        accepted_from_data(response.data).ok_or_else(|| {
            tracing::warn!(
                "Backend accepted {} {} without returning an id",
                submission.kind(),
                submission.local_id()
            );
            FailureReason::Unknown
        })
    }
}

/// Split a success body into the server id and the remaining fields.
///
/// Accepts both a bare object and a `{ "data": { .. } }` envelope.
fn accepted_from_data(data: Value) -> Option<Accepted> {
    let Value::Object(mut object) = data else {
        return None;
    };
    if !object.contains_key("id") {
        if let Some(Value::Object(inner)) = object.remove("data") {
            object = inner;
        }
    }

    let server_id = object.remove("id").as_ref().and_then(server_id_from_value)?;
    let fields: Map<String, Value> = object;
    Some(Accepted::new(server_id).with_fields(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceSheet, LocalId, ServerId};
    use crate::sync::transport::{TransportError, TransportResponse};
    use chrono::{NaiveDate, Utc};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Transport replaying canned responses and recording requests
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
        requests: Mutex<Vec<TransportRequest>>,
    }

    impl ScriptedTransport {
        fn respond(self, status: u16, data: Value) -> Self {
            self.responses.lock().unwrap().push_back(Ok(TransportResponse {
                ok: (200..300).contains(&status),
                status,
                data,
            }));
            self
        }

        fn fail(self) -> Self {
            self.responses.lock().unwrap().push_back(Err(TransportError {
                url: "http://test".to_string(),
                message: "connection refused".to_string(),
            }));
            self
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted response left")
        }
    }

    fn attendance() -> Submission {
        Submission::Attendance {
            local_id: LocalId::new(),
            created_at: Utc::now(),
            sheet: AttendanceSheet::new("class-1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        }
    }

    #[tokio::test]
    async fn success_returns_server_id_and_fields() {
        let transport = ScriptedTransport::default().respond(201, json!({ "id": "srv-42", "items": [] }));
        let submitter = HttpSubmitter::new(transport, "https://api.example.com/");

        let accepted = submitter.submit(&attendance()).await.unwrap();

        assert_eq!(accepted.server_id, ServerId::new("srv-42").unwrap());
        assert_eq!(accepted.fields.get("items"), Some(&json!([])));
        assert!(!accepted.fields.contains_key("id"));

        let requests = submitter.transport().requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://api.example.com/attendance");
        assert_eq!(requests[0].method, Method::POST);
    }

    #[tokio::test]
    async fn enveloped_numeric_id_is_accepted() {
        let transport = ScriptedTransport::default().respond(200, json!({ "data": { "id": 7 } }));
        let submitter = HttpSubmitter::new(transport, "https://api.example.com");
        let accepted = submitter.submit(&attendance()).await.unwrap();
        assert_eq!(accepted.server_id.as_str(), "7");
    }

    #[tokio::test]
    async fn failures_are_classified() {
        let transport = ScriptedTransport::default()
            .fail()
            .respond(422, json!({ "error": "invalid" }))
            .respond(500, Value::Null)
            .respond(200, json!({ "ok": true }));
        let submitter = HttpSubmitter::new(transport, "https://api.example.com");
        let submission = attendance();

        assert_eq!(
            submitter.submit(&submission).await,
            Err(FailureReason::NetworkUnreachable)
        );
        assert_eq!(
            submitter.submit(&submission).await,
            Err(FailureReason::Rejected)
        );
        assert_eq!(
            submitter.submit(&submission).await,
            Err(FailureReason::Unknown)
        );
        assert_eq!(
            submitter.submit(&submission).await,
            Err(FailureReason::Unknown)
        );
    }

    #[tokio::test]
    async fn notes_post_under_their_session() {
        let transport = ScriptedTransport::default().respond(201, json!({ "id": "note-1" }));
        let submitter = HttpSubmitter::new(transport, "https://api.example.com");
        let submission = Submission::Note {
            local_id: LocalId::new(),
            created_at: Utc::now(),
            session_id: ServerId::new("srv-9").unwrap(),
            body: "review surah al-mulk".to_string(),
        };

        submitter.submit(&submission).await.unwrap();

        let requests = submitter.transport().requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://api.example.com/sessions/srv-9/notes");
        assert_eq!(requests[0].body["session_id"], "srv-9");
    }

    #[tokio::test]
    async fn session_id_is_escaped_in_note_path() {
        let transport = ScriptedTransport::default().respond(201, json!({ "id": "note-1" }));
        let submitter = HttpSubmitter::new(transport, "https://api.example.com");
        let submission = Submission::Note {
            local_id: LocalId::new(),
            created_at: Utc::now(),
            session_id: ServerId::new("42/../../admin?x=1").unwrap(),
            body: "n".to_string(),
        };

        submitter.submit(&submission).await.unwrap();

        let requests = submitter.transport().requests.lock().unwrap();
        assert_eq!(
            requests[0].url,
            "https://api.example.com/sessions/42%2F..%2F..%2Fadmin%3Fx%3D1/notes"
        );
    }
}
