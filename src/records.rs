//! Persisted application state, read-only, and class resolution.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RecordsError;
use crate::model::{ClassConfig, Orientation, SchoolInfo, Student};
use crate::theme::ThemeConfig;

/// Saved state. Top-level keys that are absent take the demo state's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Records {
    pub school_info: SchoolInfo,
    pub classes: Vec<ClassConfig>,
    pub students: Vec<Student>,
    pub orientation: Orientation,
    pub theme: ThemeConfig,
}

impl Default for Records {
    fn default() -> Self {
        crate::samples::demo_records()
    }
}

impl Records {
    pub fn from_json(json: &str) -> Result<Self, RecordsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, RecordsError> {
        let json = fs::read_to_string(path).map_err(|source| RecordsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let records = Self::from_json(&json)?;
        log::info!(
            "loaded {} class(es) and {} student(s) from '{}'",
            records.classes.len(),
            records.students.len(),
            path.display()
        );
        Ok(records)
    }

    pub fn student(&self, id: &str) -> Result<&Student, RecordsError> {
        self.students
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| RecordsError::UnknownStudent(id.to_string()))
    }

    pub fn directory(&self) -> ClassDirectory<'_> {
        ClassDirectory::new(&self.classes)
    }
}

/// Resolves students to their class: by `classId` when the record carries one,
/// by `className` for legacy records.
#[derive(Debug, Clone, Copy)]
pub struct ClassDirectory<'a> {
    classes: &'a [ClassConfig],
}

impl<'a> ClassDirectory<'a> {
    pub fn new(classes: &'a [ClassConfig]) -> Self {
        Self { classes }
    }

    /// Look a class up by id, then by name.
    pub fn find(&self, key: &str) -> Result<&'a ClassConfig, RecordsError> {
        self.classes
            .iter()
            .find(|c| c.id == key)
            .or_else(|| self.classes.iter().find(|c| c.class_name == key))
            .ok_or_else(|| RecordsError::UnknownClass(key.to_string()))
    }

    pub fn class_for(&self, student: &Student) -> Result<&'a ClassConfig, RecordsError> {
        match &student.class_id {
            Some(id) => self
                .classes
                .iter()
                .find(|c| &c.id == id)
                .ok_or_else(|| RecordsError::DanglingClassLink {
                    student_id: student.id.clone(),
                    class: id.clone(),
                }),
            None => {
                log::warn!(
                    "student '{}' has no class id; resolving by name '{}'",
                    student.id,
                    student.class_name
                );
                self.find(&student.class_name)
                    .map_err(|_| RecordsError::DanglingClassLink {
                        student_id: student.id.clone(),
                        class: student.class_name.clone(),
                    })
            }
        }
    }

    /// Students of `class`, in record order.
    pub fn students_of<'s>(
        &self,
        class: &ClassConfig,
        students: &'s [Student],
    ) -> Vec<&'s Student> {
        students.iter().filter(|s| s.belongs_to(class)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples;

    #[test]
    fn missing_keys_fall_back_to_demo_state() {
        let r = Records::from_json("{}").unwrap();
        assert_eq!(r, samples::demo_records());

        let r = Records::from_json(
            r#"{"orientation": "landscape", "theme": {"watermarkOpacity": 0.3}}"#,
        )
        .unwrap();
        assert_eq!(r.orientation, Orientation::Landscape);
        assert_eq!(r.theme.watermark_opacity, 0.3);
        assert_eq!(r.theme.margins, ThemeConfig::default().margins);
        assert_eq!(r.classes.len(), 1);
    }

    #[test]
    fn class_resolution_prefers_id() {
        let mut records = samples::demo_records_with_students(2);
        let mut other = records.classes[0].clone();
        other.id = "c2".into();
        other.class_name = "c1".into();
        records.classes.push(other);

        let dir = records.directory();
        let st = &records.students[0];
        assert_eq!(dir.class_for(st).unwrap().id, "c1");

        let mut legacy = st.clone();
        legacy.class_id = None;
        legacy.class_name = "Class 10".into();
        assert_eq!(dir.class_for(&legacy).unwrap().id, "c1");

        let mut dangling = st.clone();
        dangling.class_id = Some("gone".into());
        assert!(matches!(
            dir.class_for(&dangling),
            Err(RecordsError::DanglingClassLink { .. })
        ));
        assert!(matches!(dir.find("Class 11"), Err(RecordsError::UnknownClass(_))));
    }

    #[test]
    fn students_of_keeps_record_order() {
        let records = samples::demo_records_with_students(5);
        let dir = records.directory();
        let class = dir.find("Class 10").unwrap();
        let ids: Vec<_> = dir
            .students_of(class, &records.students)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, ["st-1", "st-2", "st-3", "st-4", "st-5"]);
        assert!(matches!(records.student("st-9"), Err(RecordsError::UnknownStudent(_))));
    }
}
