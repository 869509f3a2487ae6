#![allow(dead_code)]

use roster_analyzer::{Cell, FileData, Grid, ParsedFile};

/// One subject cell set for a student: (score, achievement, grade, rank, cohort).
pub type Marks<'a> = [&'a str; 5];

type OwnedMarks = [String; 5];

pub struct SheetBuilder {
    header: String,
    subjects: Vec<(String, String, String)>,
    students: Vec<(u32, String, Vec<Option<OwnedMarks>>)>,
}

impl SheetBuilder {
    pub fn new(grade: u32, class: u32) -> Self {
        Self {
            header: format!("2024학년도 1학기 {}학년 {}반 성적일람표", grade, class),
            subjects: Vec::new(),
            students: Vec::new(),
        }
    }

    pub fn header(mut self, header: &str) -> Self {
        self.header = header.to_string();
        self
    }

    /// `header` like "수학(4)", with the cohort average and distribution cells.
    pub fn subject(mut self, header: &str, average: &str, distribution: &str) -> Self {
        self.subjects
            .push((header.to_string(), average.to_string(), distribution.to_string()));
        self
    }

    /// Marks are index-aligned with the declared subjects; `None` leaves the column blank.
    pub fn student(mut self, number: u32, name: &str, marks: Vec<Option<Marks<'_>>>) -> Self {
        let owned = marks
            .into_iter()
            .map(|m| m.map(|cells| cells.map(str::to_string)))
            .collect();
        self.students.push((number, name.to_string(), owned));
        self
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        let width = 3 + self.subjects.len();
        let mut rows = vec![vec![String::new(); width]; 6];
        rows[0][0] = "학업성적관리".to_string();
        rows[2][0] = self.header.clone();
        for (i, (header, average, distribution)) in self.subjects.iter().enumerate() {
            rows[3][3 + i] = header.clone();
            rows[4][3 + i] = average.clone();
            rows[5][3 + i] = distribution.clone();
        }

        for (number, name, marks) in &self.students {
            let mut block = vec![vec![String::new(); width]; 5];
            block[0][0] = number.to_string();
            block[0][1] = name.clone();
            for (i, m) in marks.iter().enumerate() {
                if let Some(m) = m {
                    for (offset, value) in m.iter().enumerate() {
                        block[offset][3 + i] = value.clone();
                    }
                }
            }
            rows.extend(block);
        }
        rows
    }

    pub fn grid(&self) -> Grid {
        self.rows()
            .iter()
            .map(|r| r.iter().map(|c| Cell::from_raw(c)).collect())
            .collect()
    }

    pub fn csv(&self) -> String {
        self.rows()
            .iter()
            .map(|r| r.join(","))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn parse(&self, file_name: &str) -> ParsedFile {
        let data: FileData = roster_analyzer::parser::parse_sheet(&self.grid());
        ParsedFile {
            file_name: file_name.to_string(),
            data,
        }
    }
}
