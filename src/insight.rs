//! Template-based narrative and recommendations for a parent audience.

use serde::Serialize;

use crate::classify::{AcademicBand, AttendanceBand, EngagementBand};
use crate::correlation::{AcademicTrend, CrossDomainAnalysis};
use crate::models::MAX_RECOMMENDATIONS;

pub const DEFAULT_NARRATIVE: &str =
    "Overall performance is within normal ranges with opportunities for growth.";

pub const GENERIC_RECOMMENDATIONS: [&str; 2] = [
    "Maintain regular communication with teachers",
    "Celebrate achievements to maintain motivation",
];

const NAMED_SUBJECTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct RuleInsight {
    pub narrative: String,
    pub recommendations: Vec<String>,
}

pub fn generate(analysis: &CrossDomainAnalysis) -> RuleInsight {
    RuleInsight {
        narrative: narrative(analysis),
        recommendations: recommendations(analysis),
    }
}

/// 0.60 base plus 0.05 for every domain that was supplied.
pub fn rule_based_confidence(analysis: &CrossDomainAnalysis) -> f64 {
    0.60 + 0.05 * analysis.domain_count() as f64
}

pub fn narrative(analysis: &CrossDomainAnalysis) -> String {
    let mut sentences: Vec<String> = Vec::new();

    if let Some(academic) = &analysis.academic {
        match academic.band {
            AcademicBand::Excellent => sentences
                .push("Your child is performing well academically with a strong GPA.".to_string()),
            AcademicBand::Critical | AcademicBand::BelowAverage => sentences.push(format!(
                "Academic performance needs attention with a GPA of {:.2}; additional support is recommended.",
                academic.overall_gpa
            )),
            AcademicBand::Average if academic.trend == AcademicTrend::Declining => {
                let subjects = academic
                    .declining_subjects
                    .iter()
                    .take(NAMED_SUBJECTS)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
                sentences.push(format!("Academic performance shows some decline in {subjects}."));
            }
            AcademicBand::Average => {}
        }
    }

    if let Some(attendance) = &analysis.attendance {
        match attendance.band {
            AttendanceBand::Excellent => sentences
                .push("Excellent attendance record supports consistent learning.".to_string()),
            AttendanceBand::Critical | AttendanceBand::BelowOptimal => sentences.push(format!(
                "Attendance at {}% could be improved for better academic outcomes.",
                attendance.overall_rate
            )),
            AttendanceBand::Acceptable => {}
        }
    }

    if let Some(engagement) = &analysis.engagement {
        match engagement.band {
            EngagementBand::High => sentences
                .push("High engagement levels show active participation in learning.".to_string()),
            EngagementBand::Low => sentences.push(
                "Engagement could be enhanced through more interactive learning approaches."
                    .to_string(),
            ),
            EngagementBand::Moderate => {}
        }
    }

    if sentences.is_empty() {
        DEFAULT_NARRATIVE.to_string()
    } else {
        sentences.join(" ")
    }
}

/// Domain-specific items first, capped at five, then generic items fill
/// any remaining slots.
pub fn recommendations(analysis: &CrossDomainAnalysis) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();

    if let Some(academic) = &analysis.academic {
        for subject in academic.declining_subjects.iter().take(NAMED_SUBJECTS) {
            items.push(format!("Consider additional tutoring or practice in {subject}"));
        }
        if !academic.weak_subjects.is_empty() {
            let subjects = academic
                .weak_subjects
                .iter()
                .take(NAMED_SUBJECTS)
                .cloned()
                .collect::<Vec<_>>()
                .join(" and ");
            items.push(format!("Focus on strengthening performance in {subjects}"));
        }
        if matches!(academic.band, AcademicBand::Critical | AcademicBand::BelowAverage) {
            items.push("Meet with teachers to agree on an academic support plan".to_string());
        }
    }

    if let Some(attendance) = &analysis.attendance {
        if matches!(
            attendance.band,
            AttendanceBand::Critical | AttendanceBand::BelowOptimal
        ) {
            items.push("Establish consistent morning routines to improve attendance".to_string());
        }
        if attendance.punctuality_concern {
            items.push("Work on time management to reduce tardiness".to_string());
        }
    }

    if let Some(engagement) = &analysis.engagement {
        if engagement.band == EngagementBand::Low {
            items.push("Explore interactive learning methods to boost engagement".to_string());
        }
        if !engagement.study_time_adequate {
            items.push("Increase dedicated study time to meet grade-level expectations".to_string());
        }
    }

    items.truncate(MAX_RECOMMENDATIONS);
    for generic in GENERIC_RECOMMENDATIONS {
        if items.len() >= MAX_RECOMMENDATIONS {
            break;
        }
        items.push(generic.to_string());
    }
    items
}

/// Topic of a parent question, recorded with each stored insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    Academic,
    Attendance,
    Engagement,
    Behavioral,
    Recommendation,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightType::Academic => "academic",
            InsightType::Attendance => "attendance",
            InsightType::Engagement => "engagement",
            InsightType::Behavioral => "behavioral",
            InsightType::Recommendation => "recommendation",
        }
    }
}

const TOPIC_KEYWORDS: [(InsightType, &[&str]); 4] = [
    (
        InsightType::Academic,
        &["grade", "score", "academic", "subject", "test", "exam"],
    ),
    (
        InsightType::Attendance,
        &["attendance", "absent", "present", "late"],
    ),
    (
        InsightType::Engagement,
        &["engagement", "participation", "activity", "focus"],
    ),
    (InsightType::Behavioral, &["behavior", "conduct", "discipline"]),
];

/// First topic with a keyword in the query wins; anything else is a
/// request for recommendations.
pub fn classify_insight_type(query: &str) -> InsightType {
    let query = query.to_lowercase();
    TOPIC_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|word| query.contains(word)))
        .map(|(topic, _)| *topic)
        .unwrap_or(InsightType::Recommendation)
}

pub fn weekly_summary_query() -> String {
    "Provide a comprehensive weekly summary of the student's performance, highlighting key \
     achievements, areas of concern, and recommendations for the upcoming week."
        .to_string()
}

pub fn subject_query(subject: &str) -> String {
    format!(
        "Analyze the student's performance specifically in {}. Include recent grades, \
         participation, engagement, and specific recommendations for improvement.",
        subject.trim()
    )
}
