//! Multi-course aggregation and student lookup.
//!
//! [`fetch_data`] builds one [`Course`] per requested course instance and
//! threads a fresh pair of registries through all of them, so a student
//! enrolled in several courses ends up as a single shared [`Student`].

use crate::course::{AssessmentRegistry, Course, StudentRegistry};
use crate::error::{PlError, PlResult};
use crate::ids::{CourseId, Credential};
use crate::student::Student;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// A course to fetch: its human-readable code and instance id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSpec {
    pub code: String,
    pub id: CourseId,
}

impl CourseSpec {
    pub fn new(code: impl Into<String>, id: impl Into<CourseId>) -> Self {
        Self {
            code: code.into(),
            id: id.into(),
        }
    }
}

/// Everything fetched in one aggregation pass.
///
/// `courses` keeps the order of the requested course specs; codes are
/// unique, so [`course`](Self::course) finds at most one.
#[derive(Debug, Default)]
pub struct AggregatedData {
    pub courses: Vec<Course>,
    pub assessments: AssessmentRegistry,
    pub students: StudentRegistry,
}

impl AggregatedData {
    pub fn course(&self, code: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.course_code() == code)
    }

    pub fn course_mut(&mut self, code: &str) -> Option<&mut Course> {
        self.courses.iter_mut().find(|c| c.course_code() == code)
    }

    pub fn course_codes(&self) -> Vec<&str> {
        self.courses.iter().map(Course::course_code).collect()
    }

    pub fn into_parts(self) -> (Vec<Course>, AssessmentRegistry, StudentRegistry) {
        (self.courses, self.assessments, self.students)
    }
}

/// Fetches roster and assessments of each course, in order.
///
/// The first failing course aborts the pass; later courses are not tried.
/// Course codes must be unique.
pub async fn fetch_data(
    transport: &dyn Transport,
    course_specs: &[CourseSpec],
    credential: &Credential,
) -> PlResult<AggregatedData> {
    let mut seen = HashSet::new();
    if let Some(duplicate) = course_specs.iter().find(|s| !seen.insert(s.code.as_str())) {
        return Err(PlError::InvalidArgument(format!(
            "course code {} listed more than once",
            duplicate.code
        )));
    }

    let mut data = AggregatedData::default();

    for spec in course_specs {
        let mut course = Course::new(spec.code.clone(), spec.id, credential.clone());
        course
            .fetch_students(transport, Some(&mut data.students))
            .await?;
        course
            .fetch_assessments(transport, Some(&mut data.assessments))
            .await?;
        data.courses.push(course);
    }

    info!(
        "Aggregated {} course(s): {} distinct students, {} assessments",
        data.courses.len(),
        data.students.len(),
        data.assessments.len()
    );
    Ok(data)
}

/// Outcome of looking up one name or login.
#[derive(Debug, Clone)]
pub enum StudentMatch {
    NotFound,
    One(Arc<Student>),
    /// Several students share the queried name; the caller must choose.
    Many(Vec<Arc<Student>>),
}

impl StudentMatch {
    fn from_matches(mut matches: Vec<Arc<Student>>) -> Self {
        match matches.len() {
            0 => StudentMatch::NotFound,
            1 => StudentMatch::One(matches.remove(0)),
            _ => {
                matches.sort_by_key(|s| s.user_id());
                StudentMatch::Many(matches)
            }
        }
    }

    pub fn students(&self) -> &[Arc<Student>] {
        match self {
            StudentMatch::NotFound => &[],
            StudentMatch::One(student) => std::slice::from_ref(student),
            StudentMatch::Many(students) => students,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, StudentMatch::NotFound)
    }
}

/// How to look students up: by display name or by short login (CWL).
#[derive(Debug, Clone, Copy)]
pub enum StudentQuery<'a> {
    Names(&'a [String]),
    /// Logins are turned into `login@login_domain` before matching.
    Logins {
        logins: &'a [String],
        login_domain: &'a str,
    },
}

impl<'a> StudentQuery<'a> {
    /// Builds a query from optional selectors. Exactly one of `names` and
    /// `logins` must be given and non-empty.
    pub fn from_selectors(
        names: Option<&'a [String]>,
        logins: Option<&'a [String]>,
        login_domain: &'a str,
    ) -> PlResult<Self> {
        let names = names.filter(|n| !n.is_empty());
        let logins = logins.filter(|l| !l.is_empty());

        match (names, logins) {
            (Some(names), None) => Ok(StudentQuery::Names(names)),
            (None, Some(logins)) => Ok(StudentQuery::Logins {
                logins,
                login_domain,
            }),
            _ => Err(PlError::InvalidArgument(
                "provide either names or logins, but not both".to_string(),
            )),
        }
    }
}

/// Appends the institutional domain to a short login.
pub fn login_address(login: &str, login_domain: &str) -> String {
    format!("{}@{}", login, login_domain.trim_start_matches('@'))
}

/// Resolves students by name or login. See [`StudentQuery::from_selectors`].
///
/// Every queried key appears in the result. Names match exactly and may be
/// ambiguous; logins match the stored login address exactly.
pub fn find_students(
    registry: &StudentRegistry,
    names: Option<&[String]>,
    logins: Option<&[String]>,
    login_domain: &str,
) -> PlResult<BTreeMap<String, StudentMatch>> {
    let query = StudentQuery::from_selectors(names, logins, login_domain)?;
    Ok(resolve(registry, query))
}

pub fn resolve(registry: &StudentRegistry, query: StudentQuery<'_>) -> BTreeMap<String, StudentMatch> {
    let mut results = BTreeMap::new();

    match query {
        StudentQuery::Names(names) => {
            for name in names {
                let matches: Vec<Arc<Student>> = registry
                    .values()
                    .filter(|s| s.display_name() == name)
                    .cloned()
                    .collect();
                let found = StudentMatch::from_matches(matches);
                match &found {
                    StudentMatch::NotFound => warn!("No students found with name '{}'", name),
                    StudentMatch::Many(all) => warn!(
                        "Ambiguity: {} students found with name '{}'",
                        all.len(),
                        name
                    ),
                    StudentMatch::One(_) => {}
                }
                results.insert(name.clone(), found);
            }
        }
        StudentQuery::Logins {
            logins,
            login_domain,
        } => {
            for login in logins {
                let address = login_address(login, login_domain);
                let matches: Vec<Arc<Student>> = registry
                    .values()
                    .filter(|s| s.login_uid() == address)
                    .cloned()
                    .collect();
                let found = StudentMatch::from_matches(matches);
                match &found {
                    StudentMatch::NotFound => warn!("No students found with CWL '{}'", login),
                    StudentMatch::Many(all) => warn!(
                        "{} students share login address {}",
                        all.len(),
                        address
                    ),
                    StudentMatch::One(_) => {}
                }
                results.insert(login.clone(), found);
            }
        }
    }

    results
}
