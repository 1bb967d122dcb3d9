//! Access to the PrairieLearn REST API.
//!
//! The entities never talk HTTP directly: they ask a [`Transport`] for the
//! JSON behind an [`Endpoint`]. [`HttpTransport`] is the real implementation;
//! tests substitute a canned one.

use crate::error::{PlError, PlResult, Resource, TransportError};
use crate::ids::{AssessmentId, CourseId, Credential, StudentId};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Default API root of the hosted PrairieLearn instance.
pub const DEFAULT_BASE_URL: &str = "https://us.prairielearn.com/pl/api/v1";

/// The API endpoints this crate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `/course_instances/{course_id}/gradebook`
    Gradebook(CourseId),
    /// `/course_instances/{course_id}/assessments`
    Assessments(CourseId),
    /// `/course_instances/{course_id}/assessments/{assessment_id}/assessment_instances`
    Submissions(CourseId, AssessmentId),
}

impl Endpoint {
    /// Path relative to the API root, always starting with `/`.
    pub fn path(&self) -> String {
        match self {
            Endpoint::Gradebook(course) => format!("/course_instances/{}/gradebook", course),
            Endpoint::Assessments(course) => format!("/course_instances/{}/assessments", course),
            Endpoint::Submissions(course, assessment) => format!(
                "/course_instances/{}/assessments/{}/assessment_instances",
                course, assessment
            ),
        }
    }

    pub fn resource(&self) -> Resource {
        match self {
            Endpoint::Gradebook(_) => Resource::Gradebook,
            Endpoint::Assessments(_) => Resource::Assessments,
            Endpoint::Submissions(..) => Resource::Submissions,
        }
    }

    /// Identifier used in error messages.
    pub fn subject(&self) -> String {
        match self {
            Endpoint::Gradebook(course) | Endpoint::Assessments(course) => {
                format!("course {}", course)
            }
            Endpoint::Submissions(course, assessment) => {
                format!("assessment {} (course {})", assessment, course)
            }
        }
    }
}

/// Something that can GET an endpoint and hand back its JSON body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, endpoint: &Endpoint, credential: &Credential)
        -> Result<Value, TransportError>;
}

/// Fetches `endpoint` and decodes the body as a JSON array of `T`.
///
/// Transport failures become [`PlError::FetchFailed`] and shape mismatches
/// become [`PlError::Decode`], both naming the endpoint.
pub(crate) async fn fetch_rows<T: DeserializeOwned>(
    transport: &dyn Transport,
    endpoint: Endpoint,
    credential: &Credential,
) -> PlResult<Vec<T>> {
    let value = transport
        .fetch(&endpoint, credential)
        .await
        .map_err(|source| PlError::FetchFailed {
            resource: endpoint.resource(),
            id: endpoint.subject(),
            source,
        })?;

    serde_json::from_value(value).map_err(|e| PlError::Decode {
        resource: endpoint.resource(),
        id: endpoint.subject(),
        message: e.to_string(),
    })
}

/// One student row of a course gradebook.
#[derive(Debug, Clone, Deserialize)]
pub struct GradebookRow {
    pub user_id: StudentId,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_uid: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub assessments: Vec<GradebookEntry>,
}

/// Reads an explicit `null` list as empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// One assessment cell of a gradebook row.
#[derive(Debug, Clone, Deserialize)]
pub struct GradebookEntry {
    pub assessment_id: AssessmentId,
    #[serde(default)]
    pub assessment_name: Option<String>,
    #[serde(default)]
    pub assessment_label: Option<String>,
    #[serde(default)]
    pub score_perc: Option<f64>,
}

/// One row of a course's assessment list.
#[derive(Debug, Clone, Deserialize)]
pub struct AssessmentRow {
    pub assessment_id: AssessmentId,
    #[serde(default)]
    pub assessment_name: Option<String>,
    #[serde(default)]
    pub assessment_label: Option<String>,
}

/// One assessment instance. Only the score is read.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionRow {
    #[serde(default)]
    pub score_perc: Option<f64>,
}

/// [`Transport`] over HTTPS with reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout_seconds: u64,
}

impl HttpTransport {
    /// Creates a transport rooted at `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| TransportError::Request(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_seconds,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        endpoint: &Endpoint,
        credential: &Credential,
    ) -> Result<Value, TransportError> {
        let url = self.url_for(endpoint);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("Private-Token", credential.expose())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Request(format!(
                        "request timed out after {}s",
                        self.timeout_seconds
                    ))
                } else if e.is_connect() {
                    TransportError::Request(format!("cannot connect to {}", self.base_url))
                } else {
                    TransportError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!("GET {} returned {}", url, status);
            return Err(TransportError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))
    }
}
