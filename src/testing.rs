//! Test harness: a canned transport and row builders.

use crate::error::TransportError;
use crate::ids::Credential;
use crate::transport::{Endpoint, Transport};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves fixed responses per endpoint and records every request.
///
/// Endpoints without a registered response answer with status 404.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<Endpoint, Result<Value, TransportError>>>,
    calls: Mutex<Vec<Endpoint>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, endpoint: Endpoint, body: Value) -> Self {
        self.set(endpoint, Ok(body));
        self
    }

    pub fn fail(self, endpoint: Endpoint, status: u16) -> Self {
        self.set(endpoint, Err(TransportError::Status(status)));
        self
    }

    /// Replaces the response for `endpoint` after construction.
    pub fn set(&self, endpoint: Endpoint, response: Result<Value, TransportError>) {
        self.responses.lock().unwrap().insert(endpoint, response);
    }

    pub fn calls(&self) -> Vec<Endpoint> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, endpoint: &Endpoint) -> usize {
        self.calls.lock().unwrap().iter().filter(|e| *e == endpoint).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(
        &self,
        endpoint: &Endpoint,
        _credential: &Credential,
    ) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(*endpoint);
        self.responses
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .unwrap_or(Err(TransportError::Status(404)))
    }
}

pub fn credential() -> Credential {
    Credential::new("test-token")
}

/// A gradebook row with `(assessment_id, name, label, score)` cells.
pub fn gradebook_row(
    user_id: u64,
    name: &str,
    uid: &str,
    cells: &[(u64, &str, &str, Option<f64>)],
) -> Value {
    let assessments: Vec<Value> = cells
        .iter()
        .map(|(id, name, label, score)| {
            json!({
                "assessment_id": id,
                "assessment_name": name,
                "assessment_label": label,
                "score_perc": score,
            })
        })
        .collect();

    json!({
        "user_id": user_id,
        "user_name": name,
        "user_uid": uid,
        "assessments": assessments,
    })
}

pub fn assessment_row(id: u64, name: &str, label: &str) -> Value {
    json!({
        "assessment_id": id,
        "assessment_name": name,
        "assessment_label": label,
    })
}

pub fn submissions(scores: &[Option<f64>]) -> Value {
    Value::Array(
        scores
            .iter()
            .map(|score| json!({ "score_perc": score, "open": false }))
            .collect(),
    )
}
