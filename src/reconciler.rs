use crate::analyzer::GradeAnalyzer;
use crate::models::{CombinedDataset, CombinedStudent, ParsedFile, StudentRecord, Subject, SubjectKey};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Student identity across files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StudentKey {
    pub grade: u32,
    pub class: u32,
    pub number: u32,
}

#[derive(Debug, Clone)]
struct SubjectAccumulator {
    subject: Subject,
    averages: Vec<f64>,
    // letter -> (non-zero percentages, reported at all)
    letters: BTreeMap<String, (Vec<f64>, bool)>,
}

impl SubjectAccumulator {
    fn new(subject: &Subject) -> Self {
        let mut acc = Self {
            subject: subject.clone(),
            averages: Vec::new(),
            letters: BTreeMap::new(),
        };
        acc.add(subject);
        acc
    }

    fn add(&mut self, subject: &Subject) {
        self.averages.push(subject.average);
        for (letter, value) in &subject.distribution {
            let entry = self
                .letters
                .entry(letter.clone())
                .or_insert_with(|| (Vec::new(), false));
            entry.1 = true;
            if *value != 0.0 {
                entry.0.push(*value);
            }
        }
    }

    fn finish(self) -> Subject {
        let average = mean(&self.averages).unwrap_or(0.0);
        let distribution = self
            .letters
            .into_iter()
            .filter(|(_, (_, seen))| *seen)
            .map(|(letter, (values, _))| (letter, mean(&values).unwrap_or(0.0)))
            .collect();

        Subject {
            average,
            distribution,
            ..self.subject
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Incremental merge of parsed files into one population.
///
/// Feed files in upload order with [`Reconciler::fold`], then call
/// [`Reconciler::finish`] once every file has been parsed.
#[derive(Debug, Default)]
pub struct Reconciler {
    subjects: Vec<SubjectAccumulator>,
    subject_index: HashMap<SubjectKey, usize>,
    students: Vec<CombinedStudent>,
    student_index: HashMap<StudentKey, usize>,
    file_names: Vec<String>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(mut self, file: ParsedFile) -> Self {
        self.absorb(file);
        self
    }

    fn absorb(&mut self, file: ParsedFile) {
        let ParsedFile { file_name, data } = file;

        for subject in &data.subjects {
            match self.subject_index.get(&subject.key()) {
                Some(&idx) => self.subjects[idx].add(subject),
                None => {
                    self.subject_index.insert(subject.key(), self.subjects.len());
                    self.subjects.push(SubjectAccumulator::new(subject));
                }
            }
        }

        for record in data.students {
            let key = StudentKey {
                grade: data.grade,
                class: data.class,
                number: record.number,
            };
            match self.student_index.get(&key) {
                Some(&idx) => {
                    debug!(
                        "merging {}학년 {}반 {}번 from {}",
                        key.grade, key.class, key.number, file_name
                    );
                    overlay(&mut self.students[idx], record, &file_name);
                }
                None => {
                    self.student_index.insert(key, self.students.len());
                    self.students.push(seed(key, record, &file_name));
                }
            }
        }

        self.file_names.push(file_name);
    }

    /// Averages subjects, numbers students and runs the population statistics.
    pub fn finish(self) -> CombinedDataset {
        let subjects: Vec<Subject> = self
            .subjects
            .into_iter()
            .map(SubjectAccumulator::finish)
            .collect();

        let mut students = self.students;
        for (i, student) in students.iter_mut().enumerate() {
            student.number = i as u32 + 1;
        }

        GradeAnalyzer::new().analyze(&mut students);

        CombinedDataset::new(subjects, students, self.file_names)
    }
}

/// Merges every parsed file, in order, into one analyzed dataset.
pub fn reconcile<I>(files: I) -> CombinedDataset
where
    I: IntoIterator<Item = ParsedFile>,
{
    files
        .into_iter()
        .fold(Reconciler::new(), Reconciler::fold)
        .finish()
}

fn seed(key: StudentKey, record: StudentRecord, file_name: &str) -> CombinedStudent {
    CombinedStudent {
        number: 0,
        grade: key.grade,
        class: key.class,
        original_number: record.number,
        original_name: record.name.clone(),
        display_name: format!("{}학년{}반-{}", key.grade, key.class, record.name),
        name: record.name,
        file_names: vec![file_name.to_string()],
        scores: record.scores,
        achievements: record.achievements,
        grades: record.grades,
        ranks: record.ranks,
        subject_totals: record.subject_totals,
        subject_credits: record.subject_credits,
        total_students: record.total_students,
        ..Default::default()
    }
}

/// Last writer wins only for subjects present in the incoming record.
fn overlay(student: &mut CombinedStudent, record: StudentRecord, file_name: &str) {
    student.file_names.push(file_name.to_string());
    student.scores.extend(record.scores);
    student.achievements.extend(record.achievements);
    student.grades.extend(record.grades);
    student.ranks.extend(record.ranks);
    student.subject_totals.extend(record.subject_totals);
    student.subject_credits.extend(record.subject_credits);
    student.total_students = match (student.total_students, record.total_students) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileData;

    fn subject(name: &str, credits: u32, average: f64, dist: &[(&str, f64)]) -> Subject {
        Subject {
            name: name.to_string(),
            credits,
            column_index: 3,
            average,
            distribution: dist.iter().map(|(l, v)| (l.to_string(), *v)).collect(),
        }
    }

    fn file(name: &str, subjects: Vec<Subject>, students: Vec<StudentRecord>) -> ParsedFile {
        ParsedFile {
            file_name: name.to_string(),
            data: FileData {
                grade: 1,
                class: 4,
                subjects,
                students,
            },
        }
    }

    #[test]
    fn subject_average_is_plain_mean_across_files() {
        let a = file("a", vec![subject("수학", 4, 60.0, &[])], Vec::new());
        let b = file("b", vec![subject("수학", 4, 70.0, &[])], Vec::new());
        let dataset = reconcile(vec![a, b]);
        assert_eq!(dataset.subjects().len(), 1);
        assert_eq!(dataset.subjects()[0].average, 65.0);
    }

    #[test]
    fn zero_letters_do_not_drag_distribution_down() {
        let a = file(
            "a",
            vec![subject("수학", 4, 0.0, &[("A", 10.0), ("B", 0.0)])],
            Vec::new(),
        );
        let b = file(
            "b",
            vec![subject("수학", 4, 0.0, &[("A", 0.0), ("B", 30.0), ("C", 5.0)])],
            Vec::new(),
        );
        let dataset = reconcile(vec![a, b]);
        let dist = &dataset.subjects()[0].distribution;
        assert_eq!(dist["A"], 10.0);
        assert_eq!(dist["B"], 30.0);
        assert_eq!(dist["C"], 5.0);
        assert!(!dist.contains_key("D"));
    }

    #[test]
    fn total_students_never_decreases() {
        let mut first = StudentRecord {
            number: 3,
            name: "이영희".to_string(),
            total_students: Some(30),
            ..Default::default()
        };
        first.grades.insert("수학".into(), 2);
        let second = StudentRecord {
            number: 3,
            name: "이영희".to_string(),
            total_students: Some(25),
            ..Default::default()
        };
        let dataset = reconcile(vec![
            file("a", Vec::new(), vec![first]),
            file("b", Vec::new(), vec![second]),
        ]);
        let s = &dataset.students()[0];
        assert_eq!(s.total_students, Some(30));
        assert_eq!(s.grades.get("수학"), Some(&2));
        assert_eq!(s.file_names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn students_numbered_in_first_seen_order() {
        let r = |n: u32, name: &str| StudentRecord {
            number: n,
            name: name.to_string(),
            ..Default::default()
        };
        let mut other_class = file("b", Vec::new(), vec![r(1, "다")]);
        other_class.data.class = 5;
        let dataset = reconcile(vec![
            file("a", Vec::new(), vec![r(7, "가"), r(2, "나")]),
            other_class,
        ]);
        let names: Vec<(&str, u32, u32)> = dataset
            .students()
            .iter()
            .map(|s| (s.display_name.as_str(), s.number, s.original_number))
            .collect();
        assert_eq!(
            names,
            vec![("1학년4반-가", 1, 7), ("1학년4반-나", 2, 2), ("1학년5반-다", 3, 1)]
        );
    }
}
