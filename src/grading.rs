//! Result aggregation: raw marks in, totals, percentage, outcome and letter
//! grades out.
//!
//! Everything here is permissive. A missing mark counts as zero, a subject
//! whose maximum is zero scores 0 %, and obtained marks are taken as entered
//! (no clamping to the exam maximum).

use std::fmt;

use serde::Serialize;

use crate::model::{ClassConfig, Student};

/// Letter grade on the eight-point scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Grade {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
    D,
    E,
}

/// Lower bounds (inclusive), highest first.
const GRADE_TABLE: [(f64, Grade); 7] = [
    (91.0, Grade::A1),
    (81.0, Grade::A2),
    (71.0, Grade::B1),
    (61.0, Grade::B2),
    (51.0, Grade::C1),
    (41.0, Grade::C2),
    (33.0, Grade::D),
];

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A1 => "A1",
            Grade::A2 => "A2",
            Grade::B1 => "B1",
            Grade::B2 => "B2",
            Grade::C1 => "C1",
            Grade::C2 => "C2",
            Grade::D => "D",
            Grade::E => "E",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grade for a percentage. NaN falls through to `E`.
pub fn grade_for(percentage: f64) -> Grade {
    GRADE_TABLE
        .iter()
        .find(|(bound, _)| percentage >= *bound)
        .map(|(_, grade)| *grade)
        .unwrap_or(Grade::E)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Pass,
    NeedsImprovement,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Pass => "PASS",
            Outcome::NeedsImprovement => "NEEDS IMPROVEMENT",
        }
    }

    pub fn is_pass(&self) -> bool {
        *self == Outcome::Pass
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Totals for one scholastic subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectResult {
    pub subject_id: String,
    pub obtained: f64,
    pub max: f64,
    pub grade: Grade,
}

impl SubjectResult {
    pub fn percentage(&self) -> f64 {
        percentage_of(self.obtained, self.max)
    }
}

/// Computed, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedResult {
    pub grand_total_obtained: f64,
    pub grand_total_max: f64,
    pub percentage: f64,
    pub outcome: Outcome,
    pub overall_grade: Grade,
    /// One entry per scholastic subject, in class order.
    pub subjects: Vec<SubjectResult>,
}

impl DerivedResult {
    pub fn subject(&self, subject_id: &str) -> Option<&SubjectResult> {
        self.subjects.iter().find(|s| s.subject_id == subject_id)
    }
}

fn percentage_of(obtained: f64, max: f64) -> f64 {
    if max > 0.0 {
        obtained / max * 100.0
    } else {
        0.0
    }
}

/// Aggregate a student's marks against the class configuration.
pub fn aggregate(student: &Student, class: &ClassConfig) -> DerivedResult {
    let subjects: Vec<SubjectResult> = class
        .scholastic_subjects()
        .map(|subject| {
            let (obtained, max) = subject.exams.iter().fold((0.0, 0.0), |(o, m), exam| {
                (
                    o + student.mark(&subject.id, &exam.id).unwrap_or(0.0),
                    m + exam.max_marks,
                )
            });
            SubjectResult {
                subject_id: subject.id.clone(),
                obtained,
                max,
                grade: grade_for(percentage_of(obtained, max)),
            }
        })
        .collect();

    let grand_total_obtained: f64 = subjects.iter().map(|s| s.obtained).sum();
    let grand_total_max: f64 = subjects.iter().map(|s| s.max).sum();
    let percentage = percentage_of(grand_total_obtained, grand_total_max);
    let outcome = if percentage >= class.pass_percentage {
        Outcome::Pass
    } else {
        Outcome::NeedsImprovement
    };

    DerivedResult {
        grand_total_obtained,
        grand_total_max,
        percentage,
        outcome,
        overall_grade: grade_for(percentage),
        subjects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExamConfig, Gender, StudentMark, SubjectConfig, SubjectKind};

    fn class(pass: f64, maxes: &[f64]) -> ClassConfig {
        ClassConfig {
            id: "c1".into(),
            class_name: "Class 10".into(),
            subjects: vec![
                SubjectConfig {
                    id: "s1".into(),
                    name: "Maths".into(),
                    kind: SubjectKind::Scholastic,
                    exams: maxes
                        .iter()
                        .enumerate()
                        .map(|(i, m)| ExamConfig {
                            id: format!("e{}", i + 1),
                            name: format!("Term {}", i + 1),
                            max_marks: *m,
                            weightage: 0.0,
                        })
                        .collect(),
                },
                SubjectConfig {
                    id: "cs1".into(),
                    name: "Art".into(),
                    kind: SubjectKind::CoScholastic,
                    exams: vec![],
                },
            ],
            extra_info_fields: vec![],
            pass_percentage: pass,
            enable_photo: false,
        }
    }

    fn student(marks: &[(&str, &str, f64)]) -> Student {
        Student {
            id: "st1".into(),
            roll_no: "1".into(),
            name: "Asha".into(),
            gender: Gender::Female,
            class_name: "Class 10".into(),
            class_id: None,
            info: Default::default(),
            marks: marks
                .iter()
                .map(|(s, e, o)| StudentMark {
                    subject_id: s.to_string(),
                    exam_id: e.to_string(),
                    obtained: *o,
                })
                .collect(),
            co_scholastic_grades: vec![],
            photo: None,
        }
    }

    #[test]
    fn grade_boundaries() {
        assert_eq!(grade_for(100.0), Grade::A1);
        assert_eq!(grade_for(91.0), Grade::A1);
        assert_eq!(grade_for(90.999), Grade::A2);
        assert_eq!(grade_for(81.0), Grade::A2);
        assert_eq!(grade_for(71.0), Grade::B1);
        assert_eq!(grade_for(61.0), Grade::B2);
        assert_eq!(grade_for(51.0), Grade::C1);
        assert_eq!(grade_for(41.0), Grade::C2);
        assert_eq!(grade_for(33.0), Grade::D);
        assert_eq!(grade_for(32.999), Grade::E);
        assert_eq!(grade_for(0.0), Grade::E);
        assert_eq!(grade_for(f64::NAN), Grade::E);
    }

    #[test]
    fn totals_and_missing_marks() {
        let r = aggregate(&student(&[("s1", "e1", 80.0)]), &class(33.0, &[100.0, 100.0]));
        assert_eq!(r.grand_total_obtained, 80.0);
        assert_eq!(r.grand_total_max, 200.0);
        assert_eq!(r.percentage, 40.0);
        assert_eq!(r.outcome, Outcome::Pass);
        assert_eq!(r.overall_grade, Grade::D);
        assert_eq!(r.subjects.len(), 1);
        assert_eq!(r.subject("s1").unwrap().grade, Grade::D);
    }

    #[test]
    fn percentage_equal_to_pass_mark_passes() {
        let r = aggregate(&student(&[("s1", "e1", 33.0)]), &class(33.0, &[100.0]));
        assert_eq!(r.percentage, 33.0);
        assert_eq!(r.outcome, Outcome::Pass);

        let r = aggregate(&student(&[("s1", "e1", 32.0)]), &class(33.0, &[100.0]));
        assert_eq!(r.outcome, Outcome::NeedsImprovement);
        assert_eq!(r.outcome.label(), "NEEDS IMPROVEMENT");
    }

    #[test]
    fn zero_max_gives_zero_percent() {
        let r = aggregate(&student(&[]), &class(0.0, &[]));
        assert_eq!(r.percentage, 0.0);
        assert_eq!(r.outcome, Outcome::Pass);
        assert_eq!(r.subjects[0].grade, Grade::E);

        let r = aggregate(&student(&[]), &class(33.0, &[]));
        assert_eq!(r.outcome, Outcome::NeedsImprovement);
    }

    #[test]
    fn marks_order_does_not_matter() {
        let c = class(33.0, &[100.0, 50.0]);
        let a = aggregate(&student(&[("s1", "e1", 70.0), ("s1", "e2", 45.0)]), &c);
        let b = aggregate(&student(&[("s1", "e2", 45.0), ("s1", "e1", 70.0)]), &c);
        assert_eq!(a, b);
    }

    #[test]
    fn marks_are_not_clamped() {
        let r = aggregate(&student(&[("s1", "e1", 120.0)]), &class(33.0, &[100.0]));
        assert_eq!(r.percentage, 120.0);
        assert_eq!(r.overall_grade, Grade::A1);
    }
}
