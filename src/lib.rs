//! plviz - grade aggregation over the PrairieLearn API
//!
//! Fetches course rosters, assessment lists and submission scores,
//! recognizes students shared between course instances as one entity,
//! and produces summary statistics and declarative charts.
//!
//! The entry point for multi-course work is [`aggregator::fetch_data`];
//! single courses can be driven directly through [`course::Course`].

pub mod aggregator;
pub mod assessment;
pub mod chart;
pub mod cli;
pub mod config;
pub mod course;
pub mod error;
pub mod fetch_state;
pub mod ids;
pub mod registry;
pub mod report;
pub mod stats;
pub mod student;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{fetch_data, find_students, AggregatedData, CourseSpec, StudentMatch};
pub use assessment::Assessment;
pub use course::{AssessmentRegistry, Course, StudentRegistry};
pub use error::{PlError, PlResult};
pub use ids::{AssessmentId, CourseId, Credential, StudentId};
pub use student::{GradeFilter, GradeRecord, Student};
pub use transport::{HttpTransport, Transport};
