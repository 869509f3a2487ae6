use crate::error::{EngineError, Result};
use crate::extract::cell_float;
use crate::models::{cell_at, Cell, Grid, Subject};
use crate::schema;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

static GRADE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+(\d+)학년").unwrap());
static CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+(\d+)반").unwrap());
static SUBJECT_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)\((\d+)\)$").unwrap());
static DISTRIBUTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-E])\((\d+\.?\d*)\)").unwrap());

/// Reads a CSV export of a roster sheet into a raw cell grid.
///
/// Any failure to open or decode the file is reported as an unreadable file;
/// the cells themselves are never validated here.
pub fn load_grid(file_path: &Path) -> Result<Grid> {
    let display = file_path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(file_path)
        .map_err(|e| EngineError::unreadable(&display, e))?;

    let mut grid = Grid::new();
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::unreadable(&display, e))?;
        grid.push(record.iter().map(Cell::from_raw).collect());
    }
    Ok(grid)
}

/// Header metadata of one sheet plus access to its student row blocks.
#[derive(Debug)]
pub struct Tabulation<'g> {
    pub grade: u32,
    pub class: u32,
    pub subjects: Vec<Subject>,
    grid: &'g [Vec<Cell>],
}

impl<'g> Tabulation<'g> {
    /// Consecutive fixed-size student blocks, from the first student row to the end of the grid.
    pub fn student_blocks(&self) -> StudentBlocks<'g> {
        StudentBlocks {
            grid: self.grid,
            next_row: schema::FIRST_STUDENT_ROW,
        }
    }
}

pub fn tabulate(grid: &[Vec<Cell>]) -> Tabulation<'_> {
    let (grade, class) = extract_grade_and_class(cell_at(
        grid,
        schema::CLASS_HEADER_ROW,
        schema::CLASS_HEADER_COL,
    ));
    let subjects = extract_subjects(grid);

    Tabulation {
        grade,
        class,
        subjects,
        grid,
    }
}

/// Grade and class from the free-text header cell; `(1, 1)` for whatever is missing.
pub fn extract_grade_and_class(header: &Cell) -> (u32, u32) {
    let text = header.as_text().unwrap_or_default();

    let capture = |re: &Regex| {
        re.captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
    };

    let grade = capture(&GRADE_RE).unwrap_or_else(|| {
        debug!("no grade in class header {:?}, defaulting to 1", text);
        1
    });
    let class = capture(&CLASS_RE).unwrap_or_else(|| {
        debug!("no class in class header {:?}, defaulting to 1", text);
        1
    });
    (grade, class)
}

fn extract_subjects(grid: &[Vec<Cell>]) -> Vec<Subject> {
    let Some(header_row) = grid.get(schema::SUBJECT_HEADER_ROW) else {
        return Vec::new();
    };

    let mut subjects = Vec::new();
    for (col, cell) in header_row
        .iter()
        .enumerate()
        .skip(schema::FIRST_SUBJECT_COL)
    {
        let Some((name, credits)) = parse_subject_header(cell) else {
            continue;
        };

        let average = cell_float(cell_at(grid, schema::SUBJECT_AVERAGE_ROW, col)).unwrap_or(0.0);
        let distribution = cell_at(grid, schema::DISTRIBUTION_ROW, col)
            .as_text()
            .map(|t| parse_distribution(&t))
            .unwrap_or_default();

        subjects.push(Subject {
            name,
            credits,
            column_index: col,
            average,
            distribution,
        });
    }
    subjects
}

/// `"수학(4)"` → `("수학", 4)`. Only text cells containing `(` qualify.
pub fn parse_subject_header(cell: &Cell) -> Option<(String, u32)> {
    let Cell::Text(raw) = cell else {
        return None;
    };
    if !raw.contains('(') {
        return None;
    }
    let caps = SUBJECT_HEADER_RE.captures(raw.trim())?;
    let name = caps.get(1)?.as_str().trim().to_string();
    let credits = caps.get(2)?.as_str().parse::<u32>().ok()?;
    if name.is_empty() {
        return None;
    }
    Some((name, credits))
}

/// `"A(6.3)B(15.3)C(12.6)"` → `{A: 6.3, B: 15.3, C: 12.6}`.
pub fn parse_distribution(text: &str) -> BTreeMap<String, f64> {
    DISTRIBUTION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let letter = caps.get(1)?.as_str().to_string();
            let value = caps.get(2)?.as_str().parse::<f64>().ok()?;
            Some((letter, value))
        })
        .collect()
}

pub struct StudentBlocks<'g> {
    grid: &'g [Vec<Cell>],
    next_row: usize,
}

impl<'g> Iterator for StudentBlocks<'g> {
    type Item = StudentBlock<'g>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_row >= self.grid.len() {
            return None;
        }
        let block = StudentBlock {
            grid: self.grid,
            start_row: self.next_row,
        };
        self.next_row += schema::STUDENT_BLOCK_ROWS;
        Some(block)
    }
}

/// A window of `STUDENT_BLOCK_ROWS` rows; rows past the grid end read as empty.
#[derive(Debug, Clone, Copy)]
pub struct StudentBlock<'g> {
    grid: &'g [Vec<Cell>],
    start_row: usize,
}

impl<'g> StudentBlock<'g> {
    pub fn start_row(&self) -> usize {
        self.start_row
    }

    pub fn cell(&self, offset: usize, col: usize) -> &'g Cell {
        cell_at(self.grid, self.start_row + offset, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn grade_and_class_from_header() {
        let header = text("2024학년도 1학기 1학년 4반 성적일람표");
        assert_eq!(extract_grade_and_class(&header), (1, 4));
    }

    #[test]
    fn header_without_match_defaults() {
        assert_eq!(extract_grade_and_class(&text("성적일람표")), (1, 1));
        assert_eq!(extract_grade_and_class(&Cell::Empty), (1, 1));
        // The digits must be preceded by whitespace.
        assert_eq!(extract_grade_and_class(&text("2학년3반")), (1, 1));
    }

    #[test]
    fn subject_header_requires_credit_suffix() {
        assert_eq!(
            parse_subject_header(&text("수학(4)")),
            Some(("수학".to_string(), 4))
        );
        assert_eq!(
            parse_subject_header(&text(" 확률과 통계 (3)")),
            Some(("확률과 통계".to_string(), 3))
        );
        assert_eq!(parse_subject_header(&text("수학")), None);
        assert_eq!(parse_subject_header(&text("수학(A)")), None);
        assert_eq!(parse_subject_header(&Cell::Number(4.0)), None);
    }

    #[test]
    fn distribution_keeps_only_present_letters() {
        let dist = parse_distribution("A(6.3)B(15.3)C(12.6)D(18.9)E(46.8)");
        assert_eq!(dist.len(), 5);
        assert_eq!(dist["A"], 6.3);
        assert_eq!(dist["E"], 46.8);

        let partial = parse_distribution("A(10)C(90.0)");
        assert_eq!(partial.len(), 2);
        assert!(!partial.contains_key("B"));
    }

    #[test]
    fn tabulate_reads_subject_columns() {
        let mut grid: Grid = vec![Vec::new(); 6];
        grid[2] = vec![text("2024학년도 2학년 7반")];
        grid[3] = vec![
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            text("국어(4)"),
            text("비고"),
            text("영어(3)"),
        ];
        grid[4] = vec![
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            Cell::Number(71.2),
            Cell::Empty,
            text("n/a"),
        ];
        grid[5] = vec![
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            text("A(20)B(80)"),
        ];

        let tab = tabulate(&grid);
        assert_eq!((tab.grade, tab.class), (2, 7));
        assert_eq!(tab.subjects.len(), 2);
        assert_eq!(tab.subjects[0].column_index, 3);
        assert_eq!(tab.subjects[0].average, 71.2);
        assert_eq!(tab.subjects[0].distribution.len(), 2);
        assert_eq!(tab.subjects[1].name, "영어");
        assert_eq!(tab.subjects[1].column_index, 5);
        assert_eq!(tab.subjects[1].average, 0.0);
        assert!(tab.subjects[1].distribution.is_empty());
        assert_eq!(tab.student_blocks().count(), 0);
    }

    #[test]
    fn subject_average_reads_leading_number_of_annotated_cell() {
        let mut grid: Grid = vec![Vec::new(); 6];
        grid[3] = vec![Cell::Empty, Cell::Empty, Cell::Empty, text("수학(4)"), text("과학(2)")];
        grid[4] = vec![Cell::Empty, Cell::Empty, Cell::Empty, text("71.2점"), text("평균 60")];

        let tab = tabulate(&grid);
        assert_eq!(tab.subjects[0].average, 71.2);
        assert_eq!(tab.subjects[1].average, 0.0);
    }

    #[test]
    fn student_blocks_stride_five_rows() {
        let grid: Grid = vec![vec![Cell::Empty]; 6 + 12];
        let tab = tabulate(&grid);
        let starts: Vec<usize> = tab.student_blocks().map(|b| b.start_row()).collect();
        assert_eq!(starts, vec![6, 11, 16]);
    }
}
