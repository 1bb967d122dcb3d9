//! Course instances: roster, assessment list and course-level charts.

use crate::assessment::Assessment;
use crate::chart::{ChartSpec, Field, Layer, MarkKind};
use crate::error::{PlError, PlResult};
use crate::ids::{AssessmentId, CourseId, Credential, StudentId};
use crate::registry::SharedRegistry;
use crate::stats::ScoreStatistics;
use crate::student::{CourseMembership, Student};
use crate::transport::{fetch_rows, AssessmentRow, Endpoint, GradebookRow, Transport};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub type StudentRegistry = SharedRegistry<StudentId, Student>;
pub type AssessmentRegistry = SharedRegistry<AssessmentId, Assessment>;

/// Default bin count of the layered course histogram.
pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

/// Statistics for one assessment of a course. `stats` is `None` when the
/// assessment has no scored submissions.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentSummary {
    pub assessment_id: AssessmentId,
    pub name: String,
    pub label: String,
    pub stats: Option<ScoreStatistics>,
}

/// One course instance.
///
/// `students` and `assessments` only ever hold entities fetched for this
/// course, though the entities themselves may be shared with other courses
/// through a registry.
#[derive(Debug)]
pub struct Course {
    course_code: String,
    course_id: CourseId,
    credential: Credential,
    students: Vec<Arc<Student>>,
    assessments: Vec<Arc<Assessment>>,
    students_fetched: bool,
    assessments_fetched: bool,
}

impl Course {
    pub fn new(course_code: impl Into<String>, course_id: CourseId, credential: Credential) -> Self {
        Self {
            course_code: course_code.into(),
            course_id,
            credential,
            students: Vec::new(),
            assessments: Vec::new(),
            students_fetched: false,
            assessments_fetched: false,
        }
    }

    pub fn course_code(&self) -> &str {
        &self.course_code
    }

    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    pub fn students(&self) -> &[Arc<Student>] {
        &self.students
    }

    pub fn assessments(&self) -> &[Arc<Assessment>] {
        &self.assessments
    }

    /// Output name for a course chart of `kind`. Carries the course id so
    /// codes that differ only in punctuation never share a file.
    pub fn chart_name(&self, kind: &str) -> String {
        format!("{} {} {}", self.course_code, self.course_id, kind)
    }

    pub fn membership(&self) -> CourseMembership {
        CourseMembership {
            course_code: self.course_code.clone(),
            course_id: self.course_id,
        }
    }

    /// Fetches the roster.
    ///
    /// With a registry, each `user_id` resolves to the registered student,
    /// creating it on first sight; without one every row gets a fresh,
    /// unshared student. Either way the student gains this course as a
    /// membership. The local roster is rebuilt from the response, and a
    /// failed request leaves roster and registry untouched.
    pub async fn fetch_students(
        &mut self,
        transport: &dyn Transport,
        mut registry: Option<&mut StudentRegistry>,
    ) -> PlResult<()> {
        let rows: Vec<GradebookRow> = fetch_rows(
            transport,
            Endpoint::Gradebook(self.course_id),
            &self.credential,
        )
        .await?;

        let mut students = Vec::with_capacity(rows.len());
        for row in &rows {
            let student = match registry.as_deref_mut() {
                Some(registry) => {
                    let (student, created) = registry.get_or_insert_with(row.user_id, || {
                        Student::from_row(row, self.credential.clone())
                    });
                    if !created {
                        debug!(
                            "Reusing student {} for course {}",
                            row.user_id, self.course_code
                        );
                    }
                    student
                }
                None => Arc::new(Student::from_row(row, self.credential.clone())),
            };
            student.add_course(self.membership());
            students.push(student);
        }

        self.students = students;
        self.students_fetched = true;
        info!(
            "Fetched {} students for course code {}",
            self.students.len(),
            self.course_code
        );
        Ok(())
    }

    /// Fetches the assessment list.
    ///
    /// Assessment ids are course-scoped, so a registry here only memoizes
    /// within a pass; it never links assessments of different courses.
    pub async fn fetch_assessments(
        &mut self,
        transport: &dyn Transport,
        mut registry: Option<&mut AssessmentRegistry>,
    ) -> PlResult<()> {
        let rows: Vec<AssessmentRow> = fetch_rows(
            transport,
            Endpoint::Assessments(self.course_id),
            &self.credential,
        )
        .await?;

        let mut assessments = Vec::with_capacity(rows.len());
        for row in rows {
            let assessment = match registry.as_deref_mut() {
                Some(registry) => {
                    registry
                        .get_or_insert_with(row.assessment_id, || {
                            Assessment::from_row(row, self.course_id, self.credential.clone())
                        })
                        .0
                }
                None => Arc::new(Assessment::from_row(
                    row,
                    self.course_id,
                    self.credential.clone(),
                )),
            };
            assessments.push(assessment);
        }

        self.assessments = assessments;
        self.assessments_fetched = true;
        info!(
            "Fetched {} assessments for course code {}",
            self.assessments.len(),
            self.course_code
        );
        for assessment in &self.assessments {
            debug!("- {} (Label: {})", assessment.name(), assessment.label());
        }
        Ok(())
    }

    async fn ensure_students(&mut self, transport: &dyn Transport) -> PlResult<()> {
        if !self.students_fetched {
            self.fetch_students(transport, None).await?;
        }
        Ok(())
    }

    async fn ensure_assessments(&mut self, transport: &dyn Transport) -> PlResult<()> {
        if !self.assessments_fetched {
            self.fetch_assessments(transport, None).await?;
        }
        Ok(())
    }

    /// Roster listing, fetching the roster first if it never was.
    pub async fn show_student_list(&mut self, transport: &dyn Transport) -> PlResult<String> {
        self.ensure_students(transport).await?;
        Ok(crate::report::student_list(self))
    }

    /// Re-fetches every assessment's submissions and summarizes each, in
    /// assessment order. Runs one request at a time.
    pub async fn get_assessment_summary_statistics(
        &mut self,
        transport: &dyn Transport,
    ) -> PlResult<Vec<AssessmentSummary>> {
        self.ensure_assessments(transport).await?;

        let mut summaries = Vec::with_capacity(self.assessments.len());
        for assessment in &self.assessments {
            assessment.fetch_submissions(transport).await?;
            let stats = match assessment.get_summary_statistics(transport).await {
                Ok(stats) => Some(stats),
                Err(PlError::NoData(_)) => None,
                Err(e) => return Err(e),
            };
            summaries.push(AssessmentSummary {
                assessment_id: assessment.assessment_id(),
                name: assessment.name().to_string(),
                label: assessment.label().to_string(),
                stats,
            });
        }

        Ok(summaries)
    }

    /// Assessments whose label is in `labels`; all of them for `None`.
    pub fn select_assessments(&self, labels: Option<&[String]>) -> Vec<Arc<Assessment>> {
        self.assessments
            .iter()
            .filter(|a| labels.map_or(true, |labels| labels.iter().any(|l| l == a.label())))
            .cloned()
            .collect()
    }

    /// `(assessment_name, score)` rows for the selected assessments, with
    /// submissions fetched fresh.
    async fn score_rows(
        &mut self,
        transport: &dyn Transport,
        labels: Option<&[String]>,
    ) -> PlResult<Vec<Value>> {
        self.ensure_assessments(transport).await?;

        let mut rows = Vec::new();
        for assessment in self.select_assessments(labels) {
            let scores = assessment.fetch_submissions(transport).await?;
            let name = assessment.display_name();
            rows.extend(
                scores
                    .into_iter()
                    .map(|score| json!({ "assessment_name": name, "score": score })),
            );
        }

        if rows.is_empty() {
            return Err(PlError::NoData(format!(
                "no scores to plot for course {}",
                self.course_code
            )));
        }
        Ok(rows)
    }

    /// Boxplot of score distributions, one box per selected assessment.
    pub async fn render_boxplot(
        &mut self,
        transport: &dyn Transport,
        labels: Option<&[String]>,
    ) -> PlResult<ChartSpec> {
        let rows = self.score_rows(transport, labels).await?;
        let title = format!(
            "Score Distribution Across Assessments in {}",
            self.course_code
        );

        Ok(ChartSpec::new(title, rows).layer(
            Layer::new(MarkKind::Boxplot)
                .y(Field::nominal("assessment_name")
                    .title("Assessments")
                    .unsorted())
                .x(Field::quantitative("score")
                    .title("Score Percentage")
                    .domain(0.0, 100.0))
                .color(Field::nominal("assessment_name").without_legend())
                .tooltip(&["assessment_name", "score"]),
        ))
    }

    /// Overlaid, unstacked histograms of the selected assessments.
    pub async fn render_histogram(
        &mut self,
        transport: &dyn Transport,
        labels: Option<&[String]>,
        bin_count: usize,
    ) -> PlResult<ChartSpec> {
        if bin_count == 0 {
            return Err(PlError::InvalidArgument(
                "histogram bin count must be at least 1".to_string(),
            ));
        }

        let rows = self.score_rows(transport, labels).await?;
        let title = format!("Layered Histogram of Scores in {}", self.course_code);

        Ok(ChartSpec::new(title, rows).layer(
            Layer::new(MarkKind::Bar)
                .opacity(0.3)
                .bin_spacing(0)
                .x(Field::quantitative("score")
                    .binned(bin_count)
                    .domain(0.0, 100.0)
                    .title("Score Percentage"))
                .y(Field::count().title("Count").unstacked())
                .color(Field::nominal("assessment_name").title("Assessments")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assessment_row, credential, gradebook_row, submissions, MockTransport};

    const CS101: CourseId = CourseId(1001);
    const MATH201: CourseId = CourseId(1002);

    fn transport() -> MockTransport {
        MockTransport::new()
            .respond(
                Endpoint::Gradebook(CS101),
                Value::Array(vec![
                    gradebook_row(7, "A", "a@ubc.ca", &[]),
                    gradebook_row(8, "B", "b@ubc.ca", &[]),
                ]),
            )
            .respond(
                Endpoint::Gradebook(MATH201),
                Value::Array(vec![gradebook_row(7, "A", "a@ubc.ca", &[])]),
            )
            .respond(
                Endpoint::Assessments(CS101),
                Value::Array(vec![
                    assessment_row(1, "Quiz 1", "Q1"),
                    assessment_row(2, "Midterm", "M1"),
                    assessment_row(3, "Survey", "S1"),
                ]),
            )
            .respond(
                Endpoint::Submissions(CS101, AssessmentId(1)),
                submissions(&[Some(80.0), None, Some(60.0), Some(100.0)]),
            )
            .respond(
                Endpoint::Submissions(CS101, AssessmentId(2)),
                submissions(&[Some(40.0), Some(50.0)]),
            )
            .respond(Endpoint::Submissions(CS101, AssessmentId(3)), submissions(&[None]))
    }

    #[tokio::test]
    async fn test_shared_registry_yields_same_student() {
        let transport = transport();
        let mut registry = StudentRegistry::new();
        let mut cs = Course::new("CS101", CS101, credential());
        let mut math = Course::new("MATH201", MATH201, credential());

        cs.fetch_students(&transport, Some(&mut registry)).await.unwrap();
        math.fetch_students(&transport, Some(&mut registry)).await.unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(cs.students().len(), 2);
        assert_eq!(math.students().len(), 1);
        assert!(Arc::ptr_eq(&cs.students()[0], &math.students()[0]));

        let shared = registry.get(&StudentId(7)).unwrap();
        let codes: Vec<String> = shared.courses().into_iter().map(|c| c.course_code).collect();
        assert_eq!(codes, vec!["CS101", "MATH201"]);
    }

    #[tokio::test]
    async fn test_refetch_does_not_duplicate() {
        let transport = transport();
        let mut registry = StudentRegistry::new();
        let mut cs = Course::new("CS101", CS101, credential());

        cs.fetch_students(&transport, Some(&mut registry)).await.unwrap();
        cs.fetch_students(&transport, Some(&mut registry)).await.unwrap();

        assert_eq!(cs.students().len(), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(cs.students()[0].courses().len(), 1);
    }

    #[tokio::test]
    async fn test_without_registry_students_are_unshared() {
        let transport = transport();
        let mut cs = Course::new("CS101", CS101, credential());
        let mut math = Course::new("MATH201", MATH201, credential());

        cs.fetch_students(&transport, None).await.unwrap();
        math.fetch_students(&transport, None).await.unwrap();

        assert!(!Arc::ptr_eq(&cs.students()[0], &math.students()[0]));
        assert_eq!(cs.students()[0].courses().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_roster_fetch_keeps_state() {
        let transport = transport().fail(Endpoint::Gradebook(MATH201), 500);
        let mut registry = StudentRegistry::new();
        let mut math = Course::new("MATH201", MATH201, credential());

        let err = math
            .fetch_students(&transport, Some(&mut registry))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert!(math.students().is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_assessments_with_registry() {
        let transport = transport();
        let mut registry = AssessmentRegistry::new();
        let mut cs = Course::new("CS101", CS101, credential());

        cs.fetch_assessments(&transport, Some(&mut registry)).await.unwrap();

        assert_eq!(cs.assessments().len(), 3);
        assert_eq!(registry.len(), 3);
        let quiz = registry.get(&AssessmentId(1)).unwrap();
        assert!(Arc::ptr_eq(&quiz, &cs.assessments()[0]));
        assert_eq!(quiz.course_id(), CS101);
    }

    #[tokio::test]
    async fn test_summary_statistics_per_assessment() {
        let transport = transport();
        let mut cs = Course::new("CS101", CS101, credential());

        let summaries = cs.get_assessment_summary_statistics(&transport).await.unwrap();

        assert_eq!(summaries.len(), 3);
        let quiz = summaries[0].stats.unwrap();
        assert_eq!(quiz.count, 3);
        assert_eq!(quiz.mean, 80.0);
        assert_eq!(summaries[1].stats.map(|s| s.median), Some(45.0));
        assert!(summaries[2].stats.is_none());
        assert_eq!(transport.call_count(&Endpoint::Assessments(CS101)), 1);
    }

    #[tokio::test]
    async fn test_summary_statistics_propagates_fetch_failure() {
        let transport = transport().fail(Endpoint::Submissions(CS101, AssessmentId(2)), 403);
        let mut cs = Course::new("CS101", CS101, credential());

        let err = cs.get_assessment_summary_statistics(&transport).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_boxplot_label_filter() {
        let transport = transport();
        let mut cs = Course::new("CS101", CS101, credential());

        let labels = vec!["M1".to_string()];
        let chart = cs.render_boxplot(&transport, Some(labels.as_slice())).await.unwrap();

        assert_eq!(chart.rows.len(), 2);
        assert!(chart.rows.iter().all(|r| r["assessment_name"] == "Midterm (M1)"));
        assert_eq!(chart.mark_kinds(), vec![MarkKind::Boxplot]);
        assert_eq!(chart.title, "Score Distribution Across Assessments in CS101");
        assert_eq!(
            transport.call_count(&Endpoint::Submissions(CS101, AssessmentId(1))),
            0
        );
    }

    #[tokio::test]
    async fn test_boxplot_without_filter_selects_all() {
        let transport = transport();
        let mut cs = Course::new("CS101", CS101, credential());

        let chart = cs.render_boxplot(&transport, None).await.unwrap();

        assert_eq!(chart.rows.len(), 5);
    }

    #[tokio::test]
    async fn test_histogram_no_matching_labels() {
        let transport = transport();
        let mut cs = Course::new("CS101", CS101, credential());

        let labels = vec!["S1".to_string()];
        let result = cs.render_histogram(&transport, Some(labels.as_slice()), 20).await;
        assert!(matches!(result, Err(PlError::NoData(_))));

        let result = cs.render_histogram(&transport, None, 0).await;
        assert!(matches!(result, Err(PlError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_histogram_encoding() {
        let transport = transport();
        let mut cs = Course::new("CS101", CS101, credential());

        let chart = cs
            .render_histogram(&transport, None, DEFAULT_HISTOGRAM_BINS)
            .await
            .unwrap();

        let layer = &chart.layers[0];
        assert_eq!(layer.mark.opacity, Some(0.3));
        assert_eq!(layer.x.as_ref().and_then(|x| x.max_bins), Some(20));
        assert_eq!(layer.x.as_ref().and_then(|x| x.domain), Some([0.0, 100.0]));
        assert!(layer.y.as_ref().map_or(false, |y| y.count && y.unstacked));
    }

    #[test]
    fn test_chart_name_carries_course_id() {
        let a = Course::new("CS-101", CS101, credential());
        let b = Course::new("CS 101", MATH201, credential());

        assert_eq!(a.chart_name("boxplot"), "CS-101 1001 boxplot");
        assert_ne!(a.chart_name("boxplot"), b.chart_name("boxplot"));
    }

    #[tokio::test]
    async fn test_show_student_list_fetches_lazily() {
        let transport = transport();
        let mut cs = Course::new("CS101", CS101, credential());

        let listing = cs.show_student_list(&transport).await.unwrap();

        assert!(listing.contains("There are 2 students in Course CS101"));
        assert!(listing.contains("User ID: 8, User Name: B, User UID: b@ubc.ca"));
    }
}
