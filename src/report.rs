//! Plain-text reports.
//!
//! This module renders the listings and statistics tables printed by the
//! command-line tool.

use crate::aggregator::StudentMatch;
use crate::course::{AssessmentSummary, Course};
use crate::student::Student;
use chrono::{DateTime, Utc};

/// Roster of a course, one line per student.
pub fn student_list(course: &Course) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "There are {} students in Course {}:\n",
        course.students().len(),
        course.course_code()
    ));

    for student in course.students() {
        output.push_str(&format!(
            "User ID: {}, User Name: {}, User UID: {}\n",
            student.user_id(),
            student.display_name(),
            student.login_uid()
        ));
    }

    output
}

/// A student's course memberships.
pub fn course_list(student: &Student) -> String {
    let mut output = format!("Student: {}\n", student.display_name());
    let courses = student.courses();

    if courses.is_empty() {
        output.push_str("Not enrolled in any courses.\n");
        return output;
    }

    output.push_str("Enrolled in the following courses:\n");
    for course in courses {
        output.push_str(&format!(
            "- {} (Course ID: {})\n",
            course.course_code, course.course_id
        ));
    }

    output
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Statistics table for every assessment of a course.
pub fn assessment_statistics(
    course_code: &str,
    summaries: &[AssessmentSummary],
    generated_at: DateTime<Utc>,
) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Assessment Summary Statistics for {}\n",
        course_code
    ));
    output.push_str(&format!(
        "Generated: {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if summaries.is_empty() {
        output.push_str("\nNo assessments found.\n");
        return output;
    }

    for summary in summaries {
        output.push_str(&format!(
            "\nAssessment: {} (Label: {})\n",
            summary.name, summary.label
        ));
        match &summary.stats {
            Some(stats) => {
                output.push_str(&format!("  - Number of submissions: {}\n", stats.count));
                output.push_str(&format!("  - Mean score: {}\n", percent(stats.mean)));
                output.push_str(&format!("  - Median score: {}\n", percent(stats.median)));
                output.push_str(&format!("  - Max score: {}\n", percent(stats.max)));
                output.push_str(&format!("  - Min score: {}\n", percent(stats.min)));
            }
            None => output.push_str("  - No submissions available.\n"),
        }
    }

    output
}

/// Describes the outcome of a student lookup for `key`.
pub fn lookup_result(key: &str, found: &StudentMatch) -> String {
    match found {
        StudentMatch::NotFound => format!("No students found for '{}'.\n", key),
        StudentMatch::One(student) => format!(
            "'{}' -> {} ({}, ID {})\n",
            key,
            student.display_name(),
            student.login_uid(),
            student.user_id()
        ),
        StudentMatch::Many(students) => {
            let mut output = format!(
                "Ambiguity: {} students found for '{}':\n",
                students.len(),
                key
            );
            for student in students {
                output.push_str(&format!(
                    "  - {} ({}, ID {})\n",
                    student.display_name(),
                    student.login_uid(),
                    student.user_id()
                ));
            }
            output
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{AssessmentId, CourseId, StudentId};
    use crate::stats::ScoreStatistics;
    use crate::student::CourseMembership;
    use crate::testing::credential;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn student() -> Student {
        Student::new(StudentId(7), "Alice", "alice@ubc.ca", credential())
    }

    #[test]
    fn test_course_list() {
        let student = student();
        assert!(course_list(&student).contains("Not enrolled in any courses."));

        student.add_course(CourseMembership {
            course_code: "CS101".to_string(),
            course_id: CourseId(1001),
        });
        let listing = course_list(&student);
        assert!(listing.starts_with("Student: Alice\n"));
        assert!(listing.contains("- CS101 (Course ID: 1001)"));
    }

    #[test]
    fn test_student_list_empty_course() {
        let course = Course::new("CS101", CourseId(1001), credential());
        assert_eq!(
            student_list(&course),
            "There are 0 students in Course CS101:\n"
        );
    }

    #[test]
    fn test_assessment_statistics() {
        let generated_at = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap();
        let summaries = vec![
            AssessmentSummary {
                assessment_id: AssessmentId(1),
                name: "Quiz 1".to_string(),
                label: "Q1".to_string(),
                stats: ScoreStatistics::from_scores(&[80.0, 60.0, 100.0]),
            },
            AssessmentSummary {
                assessment_id: AssessmentId(2),
                name: "Survey".to_string(),
                label: "S1".to_string(),
                stats: None,
            },
        ];

        let report = assessment_statistics("CS101", &summaries, generated_at);

        assert!(report.contains("Generated: 2024-09-01 12:00:00 UTC"));
        assert!(report.contains("Assessment: Quiz 1 (Label: Q1)"));
        assert!(report.contains("  - Mean score: 80.00%"));
        assert!(report.contains("  - Number of submissions: 3"));
        assert!(report.contains("No submissions available."));
    }

    #[test]
    fn test_lookup_result_shapes() {
        let alice = Arc::new(student());
        let other = Arc::new(Student::new(StudentId(8), "Alice", "alice2@ubc.ca", credential()));

        assert!(lookup_result("Bob", &StudentMatch::NotFound).contains("No students found"));
        assert!(lookup_result("Alice", &StudentMatch::One(alice.clone())).contains("ID 7"));

        let many = lookup_result("Alice", &StudentMatch::Many(vec![alice, other]));
        assert!(many.starts_with("Ambiguity: 2 students"));
        assert!(many.contains("alice2@ubc.ca"));
    }
}
