//! Assessments and their submission scores.

use crate::chart::{ChartSpec, Field, Layer, MarkKind};
use crate::error::{PlError, PlResult};
use crate::fetch_state::{self, FetchState};
use crate::ids::{AssessmentId, CourseId, Credential};
use crate::stats::ScoreStatistics;
use crate::transport::{fetch_rows, AssessmentRow, Endpoint, SubmissionRow, Transport};
use serde_json::json;
use std::sync::RwLock;
use tracing::info;

/// Bin count of the single-assessment histogram.
pub const SCORE_HISTOGRAM_BINS: usize = 10;

/// An assessment of one course instance.
///
/// Metadata is fixed at construction. Scores start `Unfetched` and are
/// filled by [`fetch_submissions`](Self::fetch_submissions); submissions
/// without a score are dropped, never counted as zero.
#[derive(Debug)]
pub struct Assessment {
    assessment_id: AssessmentId,
    name: String,
    label: String,
    course_id: CourseId,
    credential: Credential,
    scores: RwLock<FetchState<Vec<f64>>>,
}

impl Assessment {
    pub fn new(
        assessment_id: AssessmentId,
        name: impl Into<String>,
        label: impl Into<String>,
        course_id: CourseId,
        credential: Credential,
    ) -> Self {
        Self {
            assessment_id,
            name: name.into(),
            label: label.into(),
            course_id,
            credential,
            scores: RwLock::new(FetchState::Unfetched),
        }
    }

    pub(crate) fn from_row(row: AssessmentRow, course_id: CourseId, credential: Credential) -> Self {
        Self::new(
            row.assessment_id,
            row.assessment_name.unwrap_or_default(),
            row.assessment_label.unwrap_or_default(),
            course_id,
            credential,
        )
    }

    pub fn assessment_id(&self) -> AssessmentId {
        self.assessment_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    /// `NAME (LABEL)`, the category used on course-level charts.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.label)
    }

    pub fn submissions_fetched(&self) -> bool {
        fetch_state::read(&self.scores).is_fetched()
    }

    /// Scores as of the last fetch; empty if never fetched.
    pub fn scores(&self) -> Vec<f64> {
        fetch_state::read(&self.scores)
            .fetched()
            .cloned()
            .unwrap_or_default()
    }

    /// Fetches this assessment's submissions and replaces the stored scores.
    ///
    /// On failure the previously stored scores are left untouched.
    pub async fn fetch_submissions(&self, transport: &dyn Transport) -> PlResult<Vec<f64>> {
        let rows: Vec<SubmissionRow> = fetch_rows(
            transport,
            Endpoint::Submissions(self.course_id, self.assessment_id),
            &self.credential,
        )
        .await?;

        let submitted = rows.len();
        let scores: Vec<f64> = rows.into_iter().filter_map(|row| row.score_perc).collect();
        info!(
            "Fetched {} submissions for {} ({} scored)",
            submitted,
            self.display_name(),
            scores.len()
        );

        *fetch_state::write(&self.scores) = FetchState::Fetched(scores.clone());
        Ok(scores)
    }

    /// Returns the stored scores, fetching them first if they never were.
    pub async fn scores_or_fetch(&self, transport: &dyn Transport) -> PlResult<Vec<f64>> {
        let cached = fetch_state::read(&self.scores).fetched().cloned();
        if let Some(scores) = cached {
            return Ok(scores);
        }
        self.fetch_submissions(transport).await
    }

    /// Summary statistics of the scores, fetching them if needed.
    ///
    /// Fails with [`PlError::NoData`] when no submission carries a score.
    pub async fn get_summary_statistics(
        &self,
        transport: &dyn Transport,
    ) -> PlResult<ScoreStatistics> {
        let scores = self.scores_or_fetch(transport).await?;
        ScoreStatistics::from_scores(&scores).ok_or_else(|| {
            PlError::NoData(format!("no scored submissions for {}", self.display_name()))
        })
    }

    /// Histogram of the scores in [`SCORE_HISTOGRAM_BINS`] bins.
    pub async fn render_score_histogram(&self, transport: &dyn Transport) -> PlResult<ChartSpec> {
        let scores = self.scores_or_fetch(transport).await?;
        if scores.is_empty() {
            return Err(PlError::NoData(format!(
                "no scored submissions to plot for {}",
                self.display_name()
            )));
        }

        let rows = scores.iter().map(|s| json!({ "scores": s })).collect();
        let title = format!(
            "Score Distribution for {} (Label: {})",
            self.name, self.label
        );

        Ok(ChartSpec::new(title, rows).layer(
            Layer::new(MarkKind::Bar)
                .x(Field::quantitative("scores")
                    .binned(SCORE_HISTOGRAM_BINS)
                    .domain(0.0, 100.0)
                    .title("Score Percentage"))
                .y(Field::count().title("Frequency"))
                .tooltip(&["scores"]),
        ))
    }
}
