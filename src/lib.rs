//! Reconciles class roster achievement sheets into one longitudinal dataset
//! and derives per-student grade statistics.
//!
//! Pipeline: [`sheet`] tabulates a raw grid, [`parser`] reads the student
//! blocks, [`reconciler`] merges files and [`analyzer`] computes the
//! population-wide measures. [`batch`] drives the whole thing over files.

pub mod analyzer;
pub mod batch;
pub mod classifier;
pub mod error;
pub mod extract;
pub mod models;
pub mod parser;
pub mod reconciler;
pub mod schema;
pub mod sheet;

pub use analyzer::{group_averages, GradeAnalyzer, GroupAverage};
pub use classifier::{SubjectClassifier, SubjectGroupConfig};
pub use error::{EngineError, Result};
pub use models::{
    Cell, CombinedDataset, CombinedStudent, Config, FileData, Grid, ParsedFile, StudentRecord,
    Subject, UnreadablePolicy,
};
pub use reconciler::{reconcile, Reconciler};
