use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_directory: Option<String>,
    pub file_extension: Option<String>,
    #[serde(default)]
    pub on_unreadable: UnreadablePolicy,
    // Falls back to the built-in subject groups when unset or unreadable
    pub subject_groups_file: Option<String>,
}

/// What to do with a sheet that cannot be read at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnreadablePolicy {
    #[default]
    #[serde(rename = "abort")]
    Abort,
    #[serde(rename = "skip")]
    Skip,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_directory: Some("data-source".to_string()),
            file_extension: Some("csv".to_string()),
            on_unreadable: UnreadablePolicy::Abort,
            subject_groups_file: None,
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// One cell of a raw sheet grid.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Classifies a raw exported field.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// String form of the cell; `None` for empty cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) if s.trim().is_empty() => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Cell::Empty => None,
        }
    }
}

/// Rows of cells; rows may be ragged.
pub type Grid = Vec<Vec<Cell>>;

static EMPTY_CELL: Cell = Cell::Empty;

/// Positional lookup treating anything outside the grid as empty.
pub fn cell_at(grid: &[Vec<Cell>], row: usize, col: usize) -> &Cell {
    grid.get(row)
        .and_then(|r| r.get(col))
        .unwrap_or(&EMPTY_CELL)
}

/// Subject identity: the same name with different credits is a different subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectKey {
    pub name: String,
    pub credits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub name: String,
    pub credits: u32,
    pub column_index: usize,
    pub average: f64,
    /// Cohort percentage per achievement letter; absent letters are not zero-filled.
    pub distribution: BTreeMap<String, f64>,
}

impl Subject {
    pub fn key(&self) -> SubjectKey {
        SubjectKey {
            name: self.name.clone(),
            credits: self.credits,
        }
    }
}

/// One student as read from a single sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub number: u32,
    pub name: String,
    pub scores: BTreeMap<String, u32>,
    pub achievements: BTreeMap<String, String>,
    pub grades: BTreeMap<String, u32>,
    pub ranks: BTreeMap<String, u32>,
    pub subject_totals: BTreeMap<String, u32>,
    pub subject_credits: BTreeMap<String, u32>,
    pub total_students: Option<u32>,
    /// Provisional, computed from this file alone.
    pub weighted_average_grade: Option<f64>,
    /// Provisional, computed from this file alone.
    #[serde(rename = "weightedAverage9Grade")]
    pub weighted_average_9grade: Option<f64>,
}

/// Everything extracted from one sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub grade: u32,
    pub class: u32,
    pub subjects: Vec<Subject>,
    pub students: Vec<StudentRecord>,
}

/// A parsed sheet together with the display name it was uploaded under.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub file_name: String,
    pub data: FileData,
}

/// A student after all files were reconciled and statistics computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedStudent {
    /// Sequential identifier assigned after merging, starting at 1.
    pub number: u32,
    pub grade: u32,
    pub class: u32,
    pub original_number: u32,
    pub original_name: String,
    pub name: String,
    pub display_name: String,
    pub file_names: Vec<String>,
    pub scores: BTreeMap<String, u32>,
    pub achievements: BTreeMap<String, String>,
    pub grades: BTreeMap<String, u32>,
    pub ranks: BTreeMap<String, u32>,
    pub subject_totals: BTreeMap<String, u32>,
    pub subject_credits: BTreeMap<String, u32>,
    pub total_students: Option<u32>,
    pub weighted_average_grade: Option<f64>,
    #[serde(rename = "weightedAverage9Grade")]
    pub weighted_average_9grade: Option<f64>,
    pub percentiles: BTreeMap<String, u32>,
    pub average_grade_rank: Option<u32>,
    pub same_grade_count: Option<u32>,
    pub total_graded_students: Option<u32>,
}

/// The reconciled, fully analyzed batch. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedDataset {
    subjects: Vec<Subject>,
    students: Vec<CombinedStudent>,
    file_names: Vec<String>,
}

impl CombinedDataset {
    pub(crate) fn new(
        subjects: Vec<Subject>,
        students: Vec<CombinedStudent>,
        file_names: Vec<String>,
    ) -> Self {
        Self {
            subjects,
            students,
            file_names,
        }
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn students(&self) -> &[CombinedStudent] {
        &self.students
    }

    pub fn file_names(&self) -> &[String] {
        &self.file_names
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty() && self.subjects.is_empty()
    }

    /// Looks a student up by the post-merge sequential number.
    pub fn student(&self, number: u32) -> Option<&CombinedStudent> {
        self.students.iter().find(|s| s.number == number)
    }

    pub fn subject(&self, name: &str, credits: u32) -> Option<&Subject> {
        self.subjects
            .iter()
            .find(|s| s.name == name && s.credits == credits)
    }
}
