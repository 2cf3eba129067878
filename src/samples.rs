//! Sample records for tests, demos and the `--demo` CLI flag.

use std::collections::BTreeMap;

use crate::model::{
    ClassConfig, CoScholasticGrade, ExamConfig, Gender, Orientation, SchoolInfo, Student,
    StudentMark, SubjectConfig, SubjectKind,
};
use crate::records::Records;
use crate::theme::ThemeConfig;

/// A 1×1 PNG, usable wherever a logo or photo data URI is expected.
pub const PLACEHOLDER_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

const FIRST_NAMES: [&str; 8] = [
    "Aarav", "Diya", "Kabir", "Meera", "Rohan", "Sara", "Vihaan", "Anika",
];
const SURNAMES: [&str; 5] = ["Sharma", "Iyer", "Khan", "Das", "Mehta"];
const CO_GRADES: [&str; 3] = ["A", "B", "A+"];

pub fn demo_school() -> SchoolInfo {
    SchoolInfo {
        name: "Demo Public School".into(),
        address: "123 Education Lane, Knowledge City".into(),
        affiliation: "Affiliated to CBSE".into(),
        logo: None,
        session: "2024-2025".into(),
    }
}

fn term_exams() -> Vec<ExamConfig> {
    [("e1", "Term 1"), ("e2", "Term 2")]
        .into_iter()
        .map(|(id, name)| ExamConfig {
            id: id.into(),
            name: name.into(),
            max_marks: 100.0,
            weightage: 50.0,
        })
        .collect()
}

fn subject(id: &str, name: &str, kind: SubjectKind) -> SubjectConfig {
    SubjectConfig {
        id: id.into(),
        name: name.into(),
        kind,
        exams: match kind {
            SubjectKind::Scholastic => term_exams(),
            SubjectKind::CoScholastic => Vec::new(),
        },
    }
}

/// "Class 10": three scholastic subjects over two terms and two
/// co-scholastic areas.
pub fn demo_class() -> ClassConfig {
    ClassConfig {
        id: "c1".into(),
        class_name: "Class 10".into(),
        subjects: vec![
            subject("s1", "Mathematics", SubjectKind::Scholastic),
            subject("s2", "Science", SubjectKind::Scholastic),
            subject("s3", "English", SubjectKind::Scholastic),
            subject("cs1", "Discipline", SubjectKind::CoScholastic),
            subject("cs2", "Art Education", SubjectKind::CoScholastic),
        ],
        extra_info_fields: vec!["Father Name".into(), "Mother Name".into(), "DOB".into()],
        pass_percentage: 33.0,
        enable_photo: false,
    }
}

/// `count` students of `class` with complete, deterministic records.
pub fn demo_students(class: &ClassConfig, count: usize) -> Vec<Student> {
    (0..count)
        .map(|i| {
            let first = FIRST_NAMES[i % FIRST_NAMES.len()];
            let surname = SURNAMES[(i / FIRST_NAMES.len()) % SURNAMES.len()];

            let mut marks = Vec::new();
            for (s, subject) in class.scholastic_subjects().enumerate() {
                for (e, exam) in subject.exams.iter().enumerate() {
                    let spread = (i * 17 + s * 11 + e * 7) % 61;
                    marks.push(StudentMark {
                        subject_id: subject.id.clone(),
                        exam_id: exam.id.clone(),
                        obtained: (exam.max_marks * (35 + spread) as f64 / 100.0).round(),
                    });
                }
            }
            let co_scholastic_grades = class
                .co_scholastic_subjects()
                .enumerate()
                .map(|(k, subject)| CoScholasticGrade {
                    subject_id: subject.id.clone(),
                    grade: CO_GRADES[(i + k) % CO_GRADES.len()].into(),
                })
                .collect();

            let mut info = BTreeMap::new();
            for field in &class.extra_info_fields {
                let value = match field.as_str() {
                    "Father Name" => format!("Mr. {surname}"),
                    "Mother Name" => format!("Mrs. {surname}"),
                    "DOB" => format!("2009-{:02}-{:02}", i % 12 + 1, i % 28 + 1),
                    other => format!("{other} {}", i + 1),
                };
                info.insert(field.clone(), value);
            }

            Student {
                id: format!("st-{}", i + 1),
                roll_no: format!("{}", i + 1),
                name: format!("{first} {surname}"),
                gender: if i % 2 == 0 { Gender::Male } else { Gender::Female },
                class_name: class.class_name.clone(),
                class_id: Some(class.id.clone()),
                info,
                marks,
                co_scholastic_grades,
                photo: None,
            }
        })
        .collect()
}

/// The application's initial state: one class, no students.
pub fn demo_records() -> Records {
    Records {
        school_info: demo_school(),
        classes: vec![demo_class()],
        students: Vec::new(),
        orientation: Orientation::Portrait,
        theme: ThemeConfig::default(),
    }
}

/// The initial state with `count` students enrolled in the demo class.
pub fn demo_records_with_students(count: usize) -> Records {
    let mut records = demo_records();
    records.students = demo_students(&records.classes[0], count);
    records
}
