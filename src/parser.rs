use crate::analyzer;
use crate::extract::{cell_integer, parenthesized_integer};
use crate::models::{Cell, FileData, StudentRecord, Subject};
use crate::schema;
use crate::sheet::{self, StudentBlock, Tabulation};
use tracing::{debug, info};

/// Parses a whole sheet grid: header metadata, subjects and every student block.
pub fn parse_sheet(grid: &[Vec<Cell>]) -> FileData {
    debug!("tabulating with sheet schema v{}", schema::SCHEMA_VERSION);
    let tabulation = sheet::tabulate(grid);
    let mut students = parse_students(&tabulation);

    analyzer::apply_provisional_statistics(&mut students);

    info!(
        "parsed {}학년 {}반: {} subjects, {} students",
        tabulation.grade,
        tabulation.class,
        tabulation.subjects.len(),
        students.len()
    );

    FileData {
        grade: tabulation.grade,
        class: tabulation.class,
        subjects: tabulation.subjects,
        students,
    }
}

/// Walks the student blocks, stopping after three consecutive empty blocks.
pub fn parse_students(tabulation: &Tabulation<'_>) -> Vec<StudentRecord> {
    let mut students = Vec::new();
    let mut skipped_rows = 0usize;

    for block in tabulation.student_blocks() {
        let Some(number) = roster_number(&block) else {
            skipped_rows += schema::STUDENT_BLOCK_ROWS;
            debug!("no student at row {}", block.start_row());
            if skipped_rows >= schema::MAX_SKIPPED_ROWS {
                debug!("stopping at row {} after {} empty rows", block.start_row(), skipped_rows);
                break;
            }
            continue;
        };
        skipped_rows = 0;

        students.push(parse_student(&block, number, &tabulation.subjects));
    }

    students
}

fn roster_number(block: &StudentBlock<'_>) -> Option<u32> {
    let n = block
        .cell(schema::SCORE_OFFSET, schema::ROSTER_NUMBER_COL)
        .as_number()?;
    if n < 0.0 || n > u32::MAX as f64 {
        return None;
    }
    Some(n.trunc() as u32)
}

fn parse_student(block: &StudentBlock<'_>, number: u32, subjects: &[Subject]) -> StudentRecord {
    let name = block
        .cell(schema::SCORE_OFFSET, schema::STUDENT_NAME_COL)
        .as_text()
        .map(|n| n.trim().to_string())
        .unwrap_or_default();

    let mut record = StudentRecord {
        number,
        name,
        ..Default::default()
    };

    for subject in subjects {
        let col = subject.column_index;
        let key = &subject.name;
        record.subject_credits.insert(key.clone(), subject.credits);

        if let Some(score) = parenthesized_integer(block.cell(schema::SCORE_OFFSET, col)) {
            record.scores.insert(key.clone(), score);
        }
        if let Some(letter) = block.cell(schema::ACHIEVEMENT_OFFSET, col).as_text() {
            record.achievements.insert(key.clone(), letter);
        }
        if let Some(grade) = cell_integer(block.cell(schema::GRADE_OFFSET, col)) {
            record.grades.insert(key.clone(), grade);
        }
        if let Some(rank) = cell_integer(block.cell(schema::RANK_OFFSET, col)) {
            record.ranks.insert(key.clone(), rank);
        }
        if let Some(total) = cell_integer(block.cell(schema::COHORT_OFFSET, col)) {
            record.subject_totals.insert(key.clone(), total);
            if record.total_students.is_none() {
                record.total_students = Some(total);
            }
        }
    }

    record
}
