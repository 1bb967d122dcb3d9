//! Students, their course memberships and grades.

use crate::chart::{ChartSpec, Field, Layer, MarkKind};
use crate::error::{PlError, PlResult};
use crate::fetch_state::{self, FetchState};
use crate::ids::{AssessmentId, CourseId, Credential, StudentId};
use crate::transport::{fetch_rows, Endpoint, GradebookRow, Transport};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// A course a student belongs to, identified by its course instance id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseMembership {
    pub course_code: String,
    pub course_id: CourseId,
}

/// One assessment score of a student, as read from a course gradebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub course_code: String,
    pub course_id: CourseId,
    pub assessment_id: AssessmentId,
    pub assessment_name: String,
    pub assessment_label: String,
    /// `None` when the assessment has not been graded or attempted.
    pub score_percent: Option<f64>,
}

impl GradeRecord {
    /// `CODE - NAME (LABEL)`, the bar label on grade charts.
    pub fn qualified_name(&self) -> String {
        format!(
            "{} - {} ({})",
            self.course_code, self.assessment_name, self.assessment_label
        )
    }
}

/// Inclusion filters for [`Student::render_grades`]. `None` on a dimension
/// keeps everything on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeFilter {
    pub course_codes: Option<Vec<String>>,
    pub assessment_labels: Option<Vec<String>>,
}

impl GradeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn courses<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.course_codes = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assessment_labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn matches(&self, grade: &GradeRecord) -> bool {
        let course_ok = self
            .course_codes
            .as_ref()
            .map_or(true, |codes| codes.contains(&grade.course_code));
        let label_ok = self
            .assessment_labels
            .as_ref()
            .map_or(true, |labels| labels.contains(&grade.assessment_label));
        course_ok && label_ok
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(codes) = &self.course_codes {
            parts.push(format!("course(s): {}", codes.join(", ")));
        }
        if let Some(labels) = &self.assessment_labels {
            parts.push(format!("assessment label(s): {}", labels.join(", ")));
        }
        if parts.is_empty() {
            "any course".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// A student, shared by every course whose roster lists them.
#[derive(Debug)]
pub struct Student {
    user_id: StudentId,
    display_name: String,
    login_uid: String,
    credential: Credential,
    courses: RwLock<Vec<CourseMembership>>,
    grades: RwLock<FetchState<Vec<GradeRecord>>>,
}

impl Student {
    pub fn new(
        user_id: StudentId,
        display_name: impl Into<String>,
        login_uid: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            login_uid: login_uid.into(),
            credential,
            courses: RwLock::new(Vec::new()),
            grades: RwLock::new(FetchState::Unfetched),
        }
    }

    pub(crate) fn from_row(row: &GradebookRow, credential: Credential) -> Self {
        Self::new(
            row.user_id,
            row.user_name.clone().unwrap_or_default(),
            row.user_uid.clone().unwrap_or_default(),
            credential,
        )
    }

    pub fn user_id(&self) -> StudentId {
        self.user_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn login_uid(&self) -> &str {
        &self.login_uid
    }

    /// Adds a membership unless one with the same course id exists.
    /// Returns whether it was added.
    pub fn add_course(&self, membership: CourseMembership) -> bool {
        let mut courses = fetch_state::write(&self.courses);
        if courses.iter().any(|c| c.course_id == membership.course_id) {
            return false;
        }
        debug!(
            "Student {} joins course {}",
            self.user_id, membership.course_code
        );
        courses.push(membership);
        true
    }

    pub fn courses(&self) -> Vec<CourseMembership> {
        fetch_state::read(&self.courses).clone()
    }

    pub fn grades_fetched(&self) -> bool {
        fetch_state::read(&self.grades).is_fetched()
    }

    /// Grades as of the last fetch; empty if never fetched.
    pub fn grades(&self) -> Vec<GradeRecord> {
        fetch_state::read(&self.grades)
            .fetched()
            .cloned()
            .unwrap_or_default()
    }

    /// Fetches this student's grades in every course they belong to.
    ///
    /// Each course's whole gradebook is downloaded and only this student's
    /// row is kept, so the cost grows with courses times roster size. The
    /// first failing course aborts the call and leaves stored grades as
    /// they were; on success they are replaced wholesale.
    pub async fn fetch_all_grades(&self, transport: &dyn Transport) -> PlResult<Vec<GradeRecord>> {
        let mut grades = Vec::new();

        for course in self.courses() {
            let rows: Vec<GradebookRow> = fetch_rows(
                transport,
                Endpoint::Gradebook(course.course_id),
                &self.credential,
            )
            .await?;

            let Some(row) = rows.into_iter().find(|r| r.user_id == self.user_id) else {
                warn!(
                    "Student {} not found in gradebook of course {}",
                    self.user_id, course.course_code
                );
                continue;
            };

            grades.extend(row.assessments.into_iter().map(|entry| GradeRecord {
                course_code: course.course_code.clone(),
                course_id: course.course_id,
                assessment_id: entry.assessment_id,
                assessment_name: entry.assessment_name.unwrap_or_default(),
                assessment_label: entry.assessment_label.unwrap_or_default(),
                score_percent: entry.score_perc,
            }));
        }

        info!(
            "Fetched {} grades for {} across {} course(s)",
            grades.len(),
            self.display_name,
            fetch_state::read(&self.courses).len()
        );

        *fetch_state::write(&self.grades) = FetchState::Fetched(grades.clone());
        Ok(grades)
    }

    /// Returns the stored grades, fetching them first if they never were.
    pub async fn grades_or_fetch(&self, transport: &dyn Transport) -> PlResult<Vec<GradeRecord>> {
        let cached = fetch_state::read(&self.grades).fetched().cloned();
        if let Some(grades) = cached {
            return Ok(grades);
        }
        self.fetch_all_grades(transport).await
    }

    /// Stored grades passing `filter`, in stored order.
    pub fn filter_grades(&self, filter: &GradeFilter) -> Vec<GradeRecord> {
        self.grades()
            .into_iter()
            .filter(|g| filter.matches(g))
            .collect()
    }

    /// Bar chart of grades, one bar per assessment, coloured by course and
    /// annotated with the score.
    ///
    /// Ungraded entries plot as 0. Fails with [`PlError::NoData`] when the
    /// student has no grades or none pass the filter.
    pub async fn render_grades(
        &self,
        transport: &dyn Transport,
        filter: &GradeFilter,
    ) -> PlResult<ChartSpec> {
        let grades = self.grades_or_fetch(transport).await?;
        if grades.is_empty() {
            return Err(PlError::NoData(format!(
                "no grades found for {}",
                self.display_name
            )));
        }

        let selected: Vec<&GradeRecord> = grades.iter().filter(|g| filter.matches(g)).collect();
        if selected.is_empty() {
            return Err(PlError::NoData(format!(
                "no grades found for {} in {}",
                self.display_name,
                filter.describe()
            )));
        }

        let rows = selected
            .iter()
            .map(|g| {
                json!({
                    "course_code": g.course_code,
                    "assessment_name": g.assessment_name,
                    "assessment_label": g.assessment_label,
                    "score_perc": g.score_percent.unwrap_or(0.0),
                    "true_assessment_name": g.qualified_name(),
                })
            })
            .collect();

        let mut title = format!("Grades for {}", self.display_name);
        if let Some(codes) = &filter.course_codes {
            title.push_str(&format!(" in {}", codes.join(", ")));
        }

        let bars = Layer::new(MarkKind::Bar)
            .x(Field::quantitative("score_perc")
                .title("Score Percentage")
                .domain(0.0, 100.0))
            .y(Field::nominal("true_assessment_name")
                .title("Assessments")
                .unsorted())
            .color(Field::nominal("course_code").title("Course Code"))
            .tooltip(&[
                "course_code",
                "assessment_name",
                "assessment_label",
                "score_perc",
            ]);

        let annotations = Layer::new(MarkKind::Text)
            .x(Field::quantitative("score_perc"))
            .y(Field::nominal("true_assessment_name").unsorted())
            .text(Field::quantitative("score_perc").format(".1f"))
            .annotation_style(15, 10);

        Ok(ChartSpec::new(title, rows).layer(bars).layer(annotations))
    }

    /// Output name for this student's grade chart, keyed by user id.
    pub fn chart_name(&self) -> String {
        format!("grades {} {}", self.login_uid, self.user_id)
    }

    /// Multi-line listing of this student's courses.
    pub fn list_courses(&self) -> String {
        crate::report::course_list(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::testing::{credential, gradebook_row, MockTransport};
    use serde_json::Value;

    fn membership(code: &str, id: u64) -> CourseMembership {
        CourseMembership {
            course_code: code.to_string(),
            course_id: CourseId(id),
        }
    }

    fn alice() -> Student {
        Student::new(StudentId(7), "Alice", "alice@ubc.ca", credential())
    }

    fn two_course_transport() -> MockTransport {
        MockTransport::new()
            .respond(
                Endpoint::Gradebook(CourseId(1001)),
                Value::Array(vec![
                    gradebook_row(3, "Bob", "bob@ubc.ca", &[(1, "Quiz", "Q1", Some(10.0))]),
                    gradebook_row(
                        7,
                        "Alice",
                        "alice@ubc.ca",
                        &[(1, "Quiz", "Q1", Some(90.0)), (2, "Exam", "E1", None)],
                    ),
                ]),
            )
            .respond(
                Endpoint::Gradebook(CourseId(1002)),
                Value::Array(vec![gradebook_row(
                    7,
                    "Alice",
                    "alice@ubc.ca",
                    &[(5, "Homework", "HW1", Some(75.5))],
                )]),
            )
    }

    #[test]
    fn test_add_course_is_idempotent() {
        let student = alice();
        assert!(student.add_course(membership("CS101", 1001)));
        assert!(!student.add_course(membership("CS101", 1001)));
        // Same course id under another code is still the same course.
        assert!(!student.add_course(membership("CS-101", 1001)));
        assert!(student.add_course(membership("MATH201", 1002)));
        assert_eq!(student.courses().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_all_grades_flattens_own_rows() {
        let transport = two_course_transport();
        let student = alice();
        student.add_course(membership("CS101", 1001));
        student.add_course(membership("MATH201", 1002));

        let grades = student.fetch_all_grades(&transport).await.unwrap();

        assert_eq!(grades.len(), 3);
        assert_eq!(grades[0].course_code, "CS101");
        assert_eq!(grades[0].score_percent, Some(90.0));
        assert_eq!(grades[1].score_percent, None);
        assert_eq!(grades[2].course_code, "MATH201");
        assert_eq!(grades[2].assessment_label, "HW1");
        assert!(student.grades_fetched());
    }

    #[tokio::test]
    async fn test_fetch_all_grades_replaces_wholesale() {
        let transport = two_course_transport();
        let student = alice();
        student.add_course(membership("CS101", 1001));

        student.fetch_all_grades(&transport).await.unwrap();
        student.fetch_all_grades(&transport).await.unwrap();

        assert_eq!(student.grades().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_all_grades_aborts_on_failure() {
        let transport = two_course_transport();
        let student = alice();
        student.add_course(membership("CS101", 1001));
        student.fetch_all_grades(&transport).await.unwrap();

        student.add_course(membership("PHYS100", 1003));
        transport.set(
            Endpoint::Gradebook(CourseId(1003)),
            Err(TransportError::Status(503)),
        );
        let err = student.fetch_all_grades(&transport).await.unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("course 1003"));
        assert_eq!(student.grades().len(), 2);
    }

    #[tokio::test]
    async fn test_filter_preserves_order() {
        let transport = two_course_transport();
        let student = alice();
        student.add_course(membership("CS101", 1001));
        student.add_course(membership("MATH201", 1002));
        student.fetch_all_grades(&transport).await.unwrap();

        let cs = student.filter_grades(&GradeFilter::all().courses(["CS101"]));
        let labels: Vec<&str> = cs.iter().map(|g| g.assessment_label.as_str()).collect();
        assert_eq!(labels, vec!["Q1", "E1"]);
        assert!(cs.iter().all(|g| g.course_code == "CS101"));

        let q1 = student.filter_grades(&GradeFilter::all().labels(["Q1", "HW1"]));
        assert_eq!(q1.len(), 2);
    }

    #[tokio::test]
    async fn test_render_grades_fetches_lazily() {
        let transport = two_course_transport();
        let student = alice();
        student.add_course(membership("CS101", 1001));

        let chart = student
            .render_grades(&transport, &GradeFilter::all().courses(["CS101"]))
            .await
            .unwrap();

        assert_eq!(chart.title, "Grades for Alice in CS101");
        assert_eq!(chart.mark_kinds(), vec![MarkKind::Bar, MarkKind::Text]);
        assert_eq!(chart.rows.len(), 2);
        assert_eq!(chart.rows[0]["true_assessment_name"], "CS101 - Quiz (Q1)");
        // Ungraded entries plot as zero but stay `None` in storage.
        assert_eq!(chart.rows[1]["score_perc"], 0.0);
        assert_eq!(student.grades()[1].score_percent, None);
    }

    #[tokio::test]
    async fn test_render_grades_course_filter_across_two_courses() {
        let transport = two_course_transport();
        let student = alice();
        student.add_course(membership("CS101", 1001));
        student.add_course(membership("MATH201", 1002));

        let chart = student
            .render_grades(&transport, &GradeFilter::all().courses(["CS101"]))
            .await
            .unwrap();

        assert_eq!(student.grades().len(), 3);
        let names: Vec<&str> = chart
            .rows
            .iter()
            .filter_map(|r| r["true_assessment_name"].as_str())
            .collect();
        assert_eq!(names, vec!["CS101 - Quiz (Q1)", "CS101 - Exam (E1)"]);
        assert!(chart.rows.iter().all(|r| r["course_code"] == "CS101"));
    }

    #[test]
    fn test_chart_name_carries_user_id() {
        assert_eq!(alice().chart_name(), "grades alice@ubc.ca 7");
    }

    #[tokio::test]
    async fn test_render_grades_empty_filter_result() {
        let transport = two_course_transport();
        let student = alice();
        student.add_course(membership("CS101", 1001));

        let result = student
            .render_grades(&transport, &GradeFilter::all().labels(["FINAL"]))
            .await;

        match result {
            Err(PlError::NoData(message)) => assert!(message.contains("FINAL")),
            other => panic!("Expected NoData, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_render_grades_without_courses() {
        let transport = MockTransport::new();
        let result = alice().render_grades(&transport, &GradeFilter::all()).await;
        assert!(matches!(result, Err(PlError::NoData(_))));
    }
}
