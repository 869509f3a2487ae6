use crate::classifier::SubjectClassifier;
use crate::models::{CombinedStudent, StudentRecord};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Average grades closer than this are treated as tied.
pub const GRADE_TIE_TOLERANCE: f64 = 0.01;

/// Percentile cut points for the 9-band scale, best band first.
const NINE_BAND_CUTOFFS: [(u32, u32); 8] = [
    (96, 1),
    (89, 2),
    (77, 3),
    (60, 4),
    (40, 5),
    (23, 6),
    (11, 7),
    (4, 8),
];

/// Per-subject marks a student carries, whether from one file or merged.
pub trait SubjectMarks {
    fn grades(&self) -> &BTreeMap<String, u32>;
    fn ranks(&self) -> &BTreeMap<String, u32>;
    fn subject_totals(&self) -> &BTreeMap<String, u32>;
    fn subject_credits(&self) -> &BTreeMap<String, u32>;
}

impl SubjectMarks for StudentRecord {
    fn grades(&self) -> &BTreeMap<String, u32> {
        &self.grades
    }
    fn ranks(&self) -> &BTreeMap<String, u32> {
        &self.ranks
    }
    fn subject_totals(&self) -> &BTreeMap<String, u32> {
        &self.subject_totals
    }
    fn subject_credits(&self) -> &BTreeMap<String, u32> {
        &self.subject_credits
    }
}

impl SubjectMarks for CombinedStudent {
    fn grades(&self) -> &BTreeMap<String, u32> {
        &self.grades
    }
    fn ranks(&self) -> &BTreeMap<String, u32> {
        &self.ranks
    }
    fn subject_totals(&self) -> &BTreeMap<String, u32> {
        &self.subject_totals
    }
    fn subject_credits(&self) -> &BTreeMap<String, u32> {
        &self.subject_credits
    }
}

/// Credit-weighted mean of `(value, credits)` pairs; subjects without positive credits are ignored.
pub fn credit_weighted_mean<I>(entries: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, u32)>,
{
    let mut weighted_sum = 0.0_f64;
    let mut credit_sum = 0u64;
    for (value, credits) in entries {
        if credits == 0 {
            continue;
        }
        weighted_sum += value * credits as f64;
        credit_sum += credits as u64;
    }
    if credit_sum > 0 {
        Some(weighted_sum / credit_sum as f64)
    } else {
        None
    }
}

/// 5-band average over every subject with a present grade.
pub fn weighted_average_grade<S: SubjectMarks>(student: &S) -> Option<f64> {
    let credits = student.subject_credits();
    credit_weighted_mean(student.grades().iter().filter_map(|(subject, grade)| {
        credits.get(subject).map(|c| (*grade as f64, *c))
    }))
}

/// Percentile of `rank` within a cohort of `total`, with a half-rank tie correction.
///
/// Rank 1 of 40 gives 98, rank 40 of 40 gives 1. Results are floored and clamped to 0..=100.
pub fn percentile_from_rank(rank: u32, total: u32) -> u32 {
    let total_f = total as f64;
    let raw = ((total_f - rank as f64 + 0.5) / total_f.max(1.0)) * 100.0;
    raw.clamp(0.0, 100.0).floor() as u32
}

/// Maps a percentile onto the 9-band scale (1 best, 9 worst).
pub fn nine_band_grade(percentile: Option<u32>) -> Option<u32> {
    let p = percentile?;
    let band = NINE_BAND_CUTOFFS
        .iter()
        .find(|(cutoff, _)| p >= *cutoff)
        .map(|(_, band)| *band)
        .unwrap_or(9);
    Some(band)
}

/// Count of students carrying a rank, per subject.
fn ranked_counts<S: SubjectMarks>(population: &[S]) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for student in population {
        for subject in student.ranks().keys() {
            *counts.entry(subject.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// Percentiles for every student, index-aligned with `population`.
///
/// The denominator is the cohort size the student reported for that subject,
/// falling back to the number of ranked students in the population.
pub fn percentiles_for<S: SubjectMarks>(population: &[S]) -> Vec<BTreeMap<String, u32>> {
    let counts = ranked_counts(population);

    population
        .iter()
        .map(|student| {
            student
                .ranks()
                .iter()
                .map(|(subject, rank)| {
                    let total = student
                        .subject_totals()
                        .get(subject)
                        .copied()
                        .or_else(|| counts.get(subject).copied())
                        .unwrap_or(0);
                    (subject.clone(), percentile_from_rank(*rank, total))
                })
                .collect()
        })
        .collect()
}

/// 9-band average; only subjects with both a rank and a percentile take part.
pub fn weighted_average_9grade<S: SubjectMarks>(
    student: &S,
    percentiles: &BTreeMap<String, u32>,
) -> Option<f64> {
    let credits = student.subject_credits();
    credit_weighted_mean(student.ranks().keys().filter_map(|subject| {
        let band = nine_band_grade(percentiles.get(subject).copied())?;
        let c = credits.get(subject)?;
        Some((band as f64, *c))
    }))
}

/// Fills the per-file provisional averages using only the file's own students.
pub fn apply_provisional_statistics(students: &mut [StudentRecord]) {
    let percentiles = percentiles_for(&*students);
    for (student, pct) in students.iter_mut().zip(percentiles.iter()) {
        student.weighted_average_grade = weighted_average_grade(&*student);
        student.weighted_average_9grade = weighted_average_9grade(&*student, pct);
    }
}

/// Population-wide statistics over the reconciled students.
pub struct GradeAnalyzer;

impl GradeAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Runs every stage in order; each stage only reads what earlier stages finalized.
    pub fn analyze(&self, students: &mut [CombinedStudent]) {
        // Step 1: 5-band weighted average
        for student in students.iter_mut() {
            student.weighted_average_grade = weighted_average_grade(&*student);
        }

        // Step 2: percentile from rank, across the whole merged population
        let percentiles = percentiles_for(&*students);
        for (student, pct) in students.iter_mut().zip(percentiles) {
            student.percentiles = pct;
        }

        // Steps 3 and 4: 9-band conversion and its weighted average
        for student in students.iter_mut() {
            let nine = weighted_average_9grade(&*student, &student.percentiles);
            student.weighted_average_9grade = nine;
        }

        // Step 5: dense rank with ties over the 5-band average
        assign_average_grade_ranks(students);
    }
}

impl Default for GradeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Ranks students by ascending weighted average grade.
///
/// A new rank starts whenever a grade differs from the previous one in sorted
/// order by at least `GRADE_TIE_TOLERANCE`; the rank is the 1-based position of
/// the first member of the tie group. Students without an average get no rank.
pub fn assign_average_grade_ranks(students: &mut [CombinedStudent]) {
    let mut graded: Vec<(usize, f64)> = students
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.weighted_average_grade.map(|g| (i, g)))
        .collect();
    graded.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| students[a.0].number.cmp(&students[b.0].number))
    });

    let total = graded.len() as u32;
    let mut ranks: Vec<Option<u32>> = vec![None; students.len()];
    let mut current_rank = 0u32;
    let mut previous: Option<f64> = None;
    for (position, (idx, grade)) in graded.iter().enumerate() {
        let starts_group = previous
            .map(|p| (grade - p).abs() >= GRADE_TIE_TOLERANCE)
            .unwrap_or(true);
        if starts_group {
            current_rank = position as u32 + 1;
        }
        ranks[*idx] = Some(current_rank);
        previous = Some(*grade);
    }

    for (i, rank) in ranks.into_iter().enumerate() {
        let Some(grade) = students[i].weighted_average_grade else {
            students[i].average_grade_rank = None;
            students[i].same_grade_count = None;
            students[i].total_graded_students = None;
            continue;
        };
        let same = graded
            .iter()
            .filter(|(_, g)| (g - grade).abs() < GRADE_TIE_TOLERANCE)
            .count() as u32;
        let student = &mut students[i];
        student.average_grade_rank = rank;
        student.same_grade_count = Some(same);
        student.total_graded_students = Some(total);
    }
}

/// Weighted averages of one student restricted to one subject group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAverage {
    pub group: String,
    pub order: u32,
    pub color: String,
    pub subject_count: usize,
    pub weighted_average_grade: Option<f64>,
    #[serde(rename = "weightedAverage9Grade")]
    pub weighted_average_9grade: Option<f64>,
}

/// Per-group 5-band and 9-band averages, in group sort order.
///
/// Groups where the student has no subject at all are left out.
pub fn group_averages(student: &CombinedStudent, classifier: &SubjectClassifier) -> Vec<GroupAverage> {
    let mut by_group: BTreeMap<(u32, String), Vec<&String>> = BTreeMap::new();
    for subject in student.subject_credits.keys() {
        let group = classifier.group_of(subject);
        by_group
            .entry((group.order, group.name.clone()))
            .or_default()
            .push(subject);
    }

    by_group
        .into_iter()
        .map(|((order, name), subjects)| {
            let credits = |s: &String| student.subject_credits.get(s).copied().unwrap_or(0);
            let five = credit_weighted_mean(subjects.iter().filter_map(|s| {
                student.grades.get(*s).map(|g| (*g as f64, credits(*s)))
            }));
            let nine = credit_weighted_mean(subjects.iter().filter_map(|s| {
                if !student.ranks.contains_key(*s) {
                    return None;
                }
                let band = nine_band_grade(student.percentiles.get(*s).copied())?;
                Some((band as f64, credits(*s)))
            }));
            let color = classifier
                .group(&name)
                .map(|g| g.color.clone())
                .unwrap_or_default();
            GroupAverage {
                group: name,
                order,
                color,
                subject_count: subjects.len(),
                weighted_average_grade: five,
                weighted_average_9grade: nine,
            }
        })
        .collect()
}
