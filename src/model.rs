//! Academic records as they are persisted: classes with their subjects and
//! exams, students with their marks, and the school letterhead.
//!
//! All types (de)serialize with camelCase keys so saved application state can
//! be loaded directly.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamConfig {
    pub id: String,
    pub name: String,
    pub max_marks: f64,
    /// Carried through from the saved records; no computation reads it.
    #[serde(default)]
    pub weightage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectKind {
    Scholastic,
    #[serde(rename = "Co-Scholastic")]
    CoScholastic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SubjectKind,
    /// Empty for co-scholastic subjects.
    #[serde(default)]
    pub exams: Vec<ExamConfig>,
}

impl SubjectConfig {
    pub fn is_scholastic(&self) -> bool {
        self.kind == SubjectKind::Scholastic
    }

    pub fn exam(&self, exam_id: &str) -> Option<&ExamConfig> {
        self.exams.iter().find(|e| e.id == exam_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassConfig {
    pub id: String,
    pub class_name: String,
    #[serde(default)]
    pub subjects: Vec<SubjectConfig>,
    #[serde(default)]
    pub extra_info_fields: Vec<String>,
    pub pass_percentage: f64,
    #[serde(default, rename = "enableStudentPhoto", alias = "enablePhoto")]
    pub enable_photo: bool,
}

/// A column of the scholastic table: one exam id, labelled with the name it
/// has in the first subject that declares it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamColumn {
    pub exam_id: String,
    pub name: String,
}

impl ClassConfig {
    /// Check the structural invariants, reporting the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.pass_percentage) {
            return Err(ConfigError::PassPercentageOutOfRange {
                class: self.class_name.clone(),
                value: self.pass_percentage,
            });
        }

        let mut subject_ids = HashSet::new();
        for subject in &self.subjects {
            if !subject_ids.insert(subject.id.as_str()) {
                return Err(ConfigError::DuplicateSubject {
                    class: self.class_name.clone(),
                    subject_id: subject.id.clone(),
                });
            }
            let mut exam_ids = HashSet::new();
            for exam in &subject.exams {
                if !exam_ids.insert(exam.id.as_str()) {
                    return Err(ConfigError::DuplicateExam {
                        class: self.class_name.clone(),
                        subject_id: subject.id.clone(),
                        exam_id: exam.id.clone(),
                    });
                }
                if exam.max_marks <= 0.0 {
                    return Err(ConfigError::NonPositiveMaxMarks {
                        subject_id: subject.id.clone(),
                        exam_id: exam.id.clone(),
                        max_marks: exam.max_marks,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn scholastic_subjects(&self) -> impl Iterator<Item = &SubjectConfig> {
        self.subjects.iter().filter(|s| s.is_scholastic())
    }

    pub fn co_scholastic_subjects(&self) -> impl Iterator<Item = &SubjectConfig> {
        self.subjects.iter().filter(|s| !s.is_scholastic())
    }

    /// Union of exam ids over the scholastic subjects, in first-seen order.
    pub fn exam_columns(&self) -> Vec<ExamColumn> {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for exam in self.scholastic_subjects().flat_map(|s| &s.exams) {
            if seen.insert(exam.id.as_str()) {
                columns.push(ExamColumn {
                    exam_id: exam.id.clone(),
                    name: exam.name.clone(),
                });
            }
        }
        columns
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMark {
    pub subject_id: String,
    pub exam_id: String,
    pub obtained: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoScholasticGrade {
    pub subject_id: String,
    pub grade: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub roll_no: String,
    pub name: String,
    #[serde(default)]
    pub gender: Gender,
    /// Legacy link: a class name, or for older records a class id.
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    #[serde(default)]
    pub info: BTreeMap<String, String>,
    #[serde(default)]
    pub marks: Vec<StudentMark>,
    #[serde(default)]
    pub co_scholastic_grades: Vec<CoScholasticGrade>,
    /// Base64 data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl Student {
    /// Obtained marks for (subject, exam). The first matching entry wins.
    pub fn mark(&self, subject_id: &str, exam_id: &str) -> Option<f64> {
        self.marks
            .iter()
            .find(|m| m.subject_id == subject_id && m.exam_id == exam_id)
            .map(|m| m.obtained)
    }

    pub fn co_scholastic_grade(&self, subject_id: &str) -> Option<&str> {
        self.co_scholastic_grades
            .iter()
            .find(|g| g.subject_id == subject_id)
            .map(|g| g.grade.as_str())
    }

    /// Value of an extra info field; empty when the student has none.
    pub fn info_value(&self, field: &str) -> &str {
        self.info.get(field).map(String::as_str).unwrap_or("")
    }

    /// Whether this student is linked to `class`, by id when the record has
    /// one and by the legacy name link otherwise.
    pub fn belongs_to(&self, class: &ClassConfig) -> bool {
        match &self.class_id {
            Some(id) => *id == class.id,
            None => self.class_name == class.class_name || self.class_name == class.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolInfo {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub affiliation: String,
    /// Base64 data URI.
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub session: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}
