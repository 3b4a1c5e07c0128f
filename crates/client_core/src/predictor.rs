//! Cohort NCLEX-PN readiness: a fixed weighted sum over four cohort averages.

use serde::Serialize;
use shared::domain::{Student, StudentStatus};

const GPA_WEIGHT: f64 = 0.35;
const HOURS_WEIGHT: f64 = 0.25;
const SKILLS_WEIGHT: f64 = 0.25;
const RISK_WEIGHT: f64 = 0.15;
/// Core LPN skills expected before licensure testing.
const CORE_SKILL_TARGET: f64 = 6.0;
const MIN_PASS_RATE: f64 = 65.0;
const MAX_PASS_RATE: f64 = 98.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessBand {
    Strong,
    Moderate,
    AtRisk,
}

impl ReadinessBand {
    pub fn for_score(score: u32) -> Self {
        if score >= 80 {
            ReadinessBand::Strong
        } else if score >= 65 {
            ReadinessBand::Moderate
        } else {
            ReadinessBand::AtRisk
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadinessFactor {
    pub label: &'static str,
    pub value: u32,
    pub weight_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortReadiness {
    pub cohort_score: u32,
    pub pass_rate: u32,
    pub band: ReadinessBand,
    pub factors: Vec<ReadinessFactor>,
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    (part / whole * 100.0).min(100.0)
}

pub fn cohort_readiness(students: &[Student]) -> CohortReadiness {
    if students.is_empty() {
        return CohortReadiness {
            cohort_score: 0,
            pass_rate: 0,
            band: ReadinessBand::AtRisk,
            factors: Vec::new(),
        };
    }
    let count = students.len() as f64;

    let avg_gpa = students.iter().map(|s| s.gpa.unwrap_or(0.0)).sum::<f64>() / count;
    let avg_hours = students
        .iter()
        .map(|s| percent(s.clinical_hours_completed, s.clinical_hours_required))
        .sum::<f64>()
        / count;
    let avg_skills = students
        .iter()
        .map(|s| percent(s.skills_completed.len() as f64, CORE_SKILL_TARGET))
        .sum::<f64>()
        / count;
    let at_risk = students
        .iter()
        .filter(|s| s.status == StudentStatus::AtRisk)
        .count() as f64;

    let gpa_score = avg_gpa / 4.0 * 100.0;
    let risk_score = 100.0 - at_risk / count * 100.0;

    let composite = (gpa_score * GPA_WEIGHT
        + avg_hours * HOURS_WEIGHT
        + avg_skills * SKILLS_WEIGHT
        + risk_score * RISK_WEIGHT)
        .round()
        .max(0.0);
    let pass_rate = (composite * 0.95).clamp(MIN_PASS_RATE, MAX_PASS_RATE).round();

    let cohort_score = composite as u32;
    CohortReadiness {
        cohort_score,
        pass_rate: pass_rate as u32,
        band: ReadinessBand::for_score(cohort_score),
        factors: vec![
            ReadinessFactor {
                label: "GPA Factor",
                value: gpa_score.round() as u32,
                weight_percent: 35,
            },
            ReadinessFactor {
                label: "Clinical Hours",
                value: avg_hours.round() as u32,
                weight_percent: 25,
            },
            ReadinessFactor {
                label: "Skills Mastery",
                value: avg_skills.round() as u32,
                weight_percent: 25,
            },
            ReadinessFactor {
                label: "At-Risk Index",
                value: risk_score.round() as u32,
                weight_percent: 15,
            },
        ],
    }
}
