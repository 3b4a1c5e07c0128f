use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Fresh identifier with the record prefix, e.g. `STU-1A2B3C4D`.
            pub fn generate() -> Self {
                let raw = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
                Self(format!("{}-{}", $prefix, &raw[..8]))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(StudentId, "STU");
id_newtype!(ClinicalLogId, "LOG");
id_newtype!(GradeId, "GRD");

pub const DEFAULT_CLINICAL_HOURS_REQUIRED: f64 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StudentStatus {
    #[default]
    Active,
    #[serde(rename = "At Risk")]
    AtRisk,
    Graduated,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "Active",
            StudentStatus::AtRisk => "At Risk",
            StudentStatus::Graduated => "Graduated",
        }
    }

    /// Lenient parse used by imports: case and separators are ignored,
    /// anything unrecognized is `None`.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "active" => Some(StudentStatus::Active),
            "atrisk" => Some(StudentStatus::AtRisk),
            "graduated" => Some(StudentStatus::Graduated),
            _ => None,
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(StudentStatus::Active),
            "At Risk" => Ok(StudentStatus::AtRisk),
            "Graduated" => Ok(StudentStatus::Graduated),
            other => Err(format!("unknown student status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemediationStatus {
    None,
    Assigned,
    #[serde(rename = "In Progress")]
    InProgress,
    Validated,
}

impl RemediationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationStatus::None => "None",
            RemediationStatus::Assigned => "Assigned",
            RemediationStatus::InProgress => "In Progress",
            RemediationStatus::Validated => "Validated",
        }
    }
}

impl FromStr for RemediationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(RemediationStatus::None),
            "Assigned" => Ok(RemediationStatus::Assigned),
            "In Progress" => Ok(RemediationStatus::InProgress),
            "Validated" => Ok(RemediationStatus::Validated),
            other => Err(format!("unknown remediation status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Pending => "Pending",
            LogStatus::Approved => "Approved",
            LogStatus::Rejected => "Rejected",
        }
    }
}

impl FromStr for LogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(LogStatus::Pending),
            "Approved" => Ok(LogStatus::Approved),
            "Rejected" => Ok(LogStatus::Rejected),
            other => Err(format!("unknown clinical log status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub cohort: String,
    pub status: StudentStatus,
    pub clinical_hours_completed: f64,
    pub clinical_hours_required: f64,
    #[serde(default)]
    pub skills_completed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nclex_predictor_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_status: Option<RemediationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Student {
    pub fn new(
        id: StudentId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        cohort: impl Into<String>,
    ) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            cohort: cohort.into(),
            status: StudentStatus::Active,
            clinical_hours_completed: 0.0,
            clinical_hours_required: DEFAULT_CLINICAL_HOURS_REQUIRED,
            skills_completed: Vec::new(),
            nclex_predictor_score: None,
            win_probability: None,
            remediation_status: None,
            remediation_topic: None,
            email: None,
            phone: None,
            dob: None,
            gpa: None,
            notes: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalLog {
    pub id: ClinicalLogId,
    pub student_id: StudentId,
    pub date: String,
    pub site_name: String,
    /// Generic diagnosis only; never patient-identifying.
    pub patient_diagnosis: String,
    #[serde(default)]
    pub mapped_competencies: Vec<String>,
    pub status: LogStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor_feedback: Option<String>,
    #[serde(default)]
    pub hours: f64,
    #[serde(default)]
    pub is_simulation: bool,
    #[serde(default)]
    pub is_makeup: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: GradeId,
    pub student_id: StudentId,
    pub course_id: String,
    pub course_name: String,
    pub grade: f64,
    pub semester: String,
}
