//! Per-domain summaries and cross-domain correlation notes for insights.

use serde::Serialize;

use crate::classify::{
    self, AcademicBand, AcademicScale, AttendanceBand, EngagementBand,
};
use crate::models::{AcademicData, AttendanceData, DomainData, EngagementData, Trend};

pub const STRONG_SUBJECT_MIN: f64 = 90.0;
pub const WEAK_SUBJECT_BELOW: f64 = 75.0;
pub const LATE_DAYS_CONCERN_ABOVE: u32 = 5;
pub const ADEQUATE_STUDY_HOURS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcademicTrend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcademicSummary {
    pub overall_gpa: f64,
    pub band: AcademicBand,
    pub strong_subjects: Vec<String>,
    pub weak_subjects: Vec<String>,
    pub improving_subjects: Vec<String>,
    pub declining_subjects: Vec<String>,
    pub total_subjects: usize,
    pub trend: AcademicTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub overall_rate: f64,
    pub late_days: u32,
    pub absent_days: u32,
    pub band: AttendanceBand,
    pub punctuality_concern: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementSummary {
    pub overall_score: f64,
    pub study_hours_per_week: f64,
    pub participation_score: f64,
    pub band: EngagementBand,
    pub study_time_adequate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationKind {
    Positive,
    Risk,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationNote {
    pub kind: CorrelationKind,
    pub message: String,
}

/// Everything the insight generators need, rebuilt for every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrossDomainAnalysis {
    pub academic: Option<AcademicSummary>,
    pub attendance: Option<AttendanceSummary>,
    pub engagement: Option<EngagementSummary>,
    pub correlations: Vec<CorrelationNote>,
}

impl CrossDomainAnalysis {
    pub fn domain_count(&self) -> usize {
        [
            self.academic.is_some(),
            self.attendance.is_some(),
            self.engagement.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

pub fn analyze(data: &DomainData) -> CrossDomainAnalysis {
    CrossDomainAnalysis {
        academic: data.academic.as_ref().map(summarize_academic),
        attendance: data.attendance.as_ref().map(summarize_attendance),
        engagement: data.engagement.as_ref().map(summarize_engagement),
        correlations: find_correlations(data),
    }
}

pub fn summarize_academic(data: &AcademicData) -> AcademicSummary {
    let mut summary = AcademicSummary {
        overall_gpa: data.overall_gpa,
        band: classify::academic_band_on(AcademicScale::Gpa, data.overall_gpa),
        strong_subjects: Vec::new(),
        weak_subjects: Vec::new(),
        improving_subjects: Vec::new(),
        declining_subjects: Vec::new(),
        total_subjects: data.subjects.len(),
        trend: AcademicTrend::Stable,
    };

    // Level and trend partitions are independent; a subject may sit in both.
    for subject in &data.subjects {
        if subject.percentage >= STRONG_SUBJECT_MIN {
            summary.strong_subjects.push(subject.subject.clone());
        } else if subject.percentage < WEAK_SUBJECT_BELOW {
            summary.weak_subjects.push(subject.subject.clone());
        }

        match subject.trend {
            Trend::Up => summary.improving_subjects.push(subject.subject.clone()),
            Trend::Down => summary.declining_subjects.push(subject.subject.clone()),
            Trend::Stable => {}
        }
    }

    summary.trend = aggregate_trend(
        summary.improving_subjects.len(),
        summary.declining_subjects.len(),
    );
    summary
}

pub fn aggregate_trend(improving: usize, declining: usize) -> AcademicTrend {
    match declining.cmp(&improving) {
        std::cmp::Ordering::Greater => AcademicTrend::Declining,
        std::cmp::Ordering::Less => AcademicTrend::Improving,
        std::cmp::Ordering::Equal => AcademicTrend::Stable,
    }
}

pub fn summarize_attendance(data: &AttendanceData) -> AttendanceSummary {
    AttendanceSummary {
        overall_rate: data.overall_percentage,
        late_days: data.late_days,
        absent_days: data.absent_days,
        band: classify::attendance_band(data.overall_percentage),
        punctuality_concern: data.late_days > LATE_DAYS_CONCERN_ABOVE,
    }
}

pub fn summarize_engagement(data: &EngagementData) -> EngagementSummary {
    EngagementSummary {
        overall_score: data.overall_engagement_score,
        study_hours_per_week: data.total_study_hours,
        participation_score: data.participation_score,
        band: classify::engagement_band(data.overall_engagement_score),
        study_time_adequate: data.total_study_hours >= ADEQUATE_STUDY_HOURS,
    }
}

/// Notes are emitted only on the boundary combinations; none is the common case.
pub fn find_correlations(data: &DomainData) -> Vec<CorrelationNote> {
    let mut notes = Vec::new();
    let Some(gpa) = data.academic.as_ref().map(|a| a.overall_gpa) else {
        return notes;
    };

    if let Some(attendance) = &data.attendance {
        let rate = attendance.overall_percentage;
        if rate >= 95.0 && gpa > 3.5 {
            notes.push(CorrelationNote {
                kind: CorrelationKind::Positive,
                message: "Strong attendance is reflected in strong academic performance".to_string(),
            });
        } else if rate < 85.0 && gpa < 3.0 {
            notes.push(CorrelationNote {
                kind: CorrelationKind::Risk,
                message: "Low attendance may be affecting academic performance".to_string(),
            });
        }
    }

    if let Some(engagement) = &data.engagement {
        if engagement.overall_engagement_score >= 85.0 && gpa > 3.5 {
            notes.push(CorrelationNote {
                kind: CorrelationKind::Positive,
                message: "High engagement goes hand in hand with strong academic performance"
                    .to_string(),
            });
        }
    }

    notes
}
