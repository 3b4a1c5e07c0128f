pub mod domain;
pub mod error;

#[cfg(test)]
mod tests {
    use super::domain::{Student, StudentId, StudentStatus};

    #[test]
    fn student_serializes_with_camel_case_and_display_status() {
        let mut student = Student::new(StudentId::new("S001"), "Jane", "Doe", "Fall 2025");
        student.status = StudentStatus::AtRisk;
        let json = serde_json::to_value(&student).expect("serialize");
        assert_eq!(json["firstName"], "Jane");
        assert_eq!(json["status"], "At Risk");
        assert_eq!(json["clinicalHoursRequired"], 400.0);
        assert!(json.get("gpa").is_none());
    }

    #[test]
    fn loose_status_parse_ignores_case_and_separators() {
        assert_eq!(StudentStatus::parse_loose("at-risk"), Some(StudentStatus::AtRisk));
        assert_eq!(StudentStatus::parse_loose(" ACTIVE "), Some(StudentStatus::Active));
        assert_eq!(StudentStatus::parse_loose("Withdrawn"), None);
    }

    #[test]
    fn generated_ids_carry_prefix() {
        let id = StudentId::generate();
        assert!(id.as_str().starts_with("STU-"));
        assert_eq!(id.as_str().len(), "STU-".len() + 8);
    }
}
