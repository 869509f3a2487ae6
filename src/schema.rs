//! Positional layout of a roster achievement sheet.
//!
//! Every row/column offset the tabulator and the student parser rely on lives
//! here. If the exporting system changes its layout, bump `SCHEMA_VERSION` and
//! adjust the table.

pub const SCHEMA_VERSION: u32 = 1;

/// Free-text cell holding "... N학년 M반 ..." class metadata.
pub const CLASS_HEADER_ROW: usize = 2;
pub const CLASS_HEADER_COL: usize = 0;

/// Row carrying "name(credits)" subject headers.
pub const SUBJECT_HEADER_ROW: usize = 3;
/// First column that may hold a subject header.
pub const FIRST_SUBJECT_COL: usize = 3;

/// Cohort average per subject.
pub const SUBJECT_AVERAGE_ROW: usize = 4;
/// Compact "A(6.3)B(15.3)..." distribution string per subject.
pub const DISTRIBUTION_ROW: usize = 5;

/// First row of the first student block.
pub const FIRST_STUDENT_ROW: usize = 6;
/// Rows per student block.
pub const STUDENT_BLOCK_ROWS: usize = 5;

/// Offsets inside a student block.
pub const SCORE_OFFSET: usize = 0;
pub const ACHIEVEMENT_OFFSET: usize = 1;
pub const GRADE_OFFSET: usize = 2;
pub const RANK_OFFSET: usize = 3;
pub const COHORT_OFFSET: usize = 4;

/// Columns of the first block row.
pub const ROSTER_NUMBER_COL: usize = 0;
pub const STUDENT_NAME_COL: usize = 1;

/// Parsing stops once this many rows in a row were skipped (three empty blocks).
pub const MAX_SKIPPED_ROWS: usize = 15;
