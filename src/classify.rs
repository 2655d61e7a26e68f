//! Threshold bands for single student metrics.
//!
//! Every function here is total over validated input (finite, in range).
//! Range checks live on the input types; see `StudentSignals::validate`.

use std::fmt;

use serde::Serialize;

use crate::models::ParticipationLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceBand {
    Critical,
    BelowOptimal,
    Acceptable,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AcademicBand {
    Critical,
    BelowAverage,
    Average,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParticipationBand {
    Concern,
    Neutral,
    Strength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EngagementBand {
    Low,
    Moderate,
    High,
}

/// Scale an academic value is read on.
///
/// Values at or below 4.0 are GPA; anything above is a 0-100 percentage.
/// A percentage of 4 or less is therefore read as a GPA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcademicScale {
    Gpa,
    Percentage,
}

pub const GPA_SCALE_MAX: f64 = 4.0;

impl AcademicScale {
    pub fn detect(value: f64) -> Self {
        if value <= GPA_SCALE_MAX {
            AcademicScale::Gpa
        } else {
            AcademicScale::Percentage
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcademicScale::Gpa => "GPA",
            AcademicScale::Percentage => "percentage",
        }
    }
}

pub fn attendance_band(percentage: f64) -> AttendanceBand {
    if percentage < 75.0 {
        AttendanceBand::Critical
    } else if percentage < 85.0 {
        AttendanceBand::BelowOptimal
    } else if percentage < 95.0 {
        AttendanceBand::Acceptable
    } else {
        AttendanceBand::Excellent
    }
}

/// Classify an academic value after picking its scale.
pub fn academic_band(value: f64) -> AcademicBand {
    academic_band_on(AcademicScale::detect(value), value)
}

pub fn academic_band_on(scale: AcademicScale, value: f64) -> AcademicBand {
    let (critical, below_average, excellent) = match scale {
        AcademicScale::Gpa => (2.0, 3.0, 3.5),
        AcademicScale::Percentage => (50.0, 70.0, 85.0),
    };

    if value < critical {
        AcademicBand::Critical
    } else if value < below_average {
        AcademicBand::BelowAverage
    } else if value >= excellent {
        AcademicBand::Excellent
    } else {
        AcademicBand::Average
    }
}

pub fn participation_band(level: ParticipationLevel) -> ParticipationBand {
    match level {
        ParticipationLevel::Low => ParticipationBand::Concern,
        ParticipationLevel::Medium => ParticipationBand::Neutral,
        ParticipationLevel::High => ParticipationBand::Strength,
    }
}

pub fn engagement_band(score: f64) -> EngagementBand {
    if score >= 85.0 {
        EngagementBand::High
    } else if score >= 70.0 {
        EngagementBand::Moderate
    } else {
        EngagementBand::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Attendance(f64),
    Academic(f64),
    Participation(ParticipationLevel),
    Engagement(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Attendance(AttendanceBand),
    Academic(AcademicBand),
    Participation(ParticipationBand),
    Engagement(EngagementBand),
}

pub fn classify(metric: Metric) -> Label {
    match metric {
        Metric::Attendance(value) => Label::Attendance(attendance_band(value)),
        Metric::Academic(value) => Label::Academic(academic_band(value)),
        Metric::Participation(level) => Label::Participation(participation_band(level)),
        Metric::Engagement(value) => Label::Engagement(engagement_band(value)),
    }
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Attendance(AttendanceBand::Critical) => "critical",
            Label::Attendance(AttendanceBand::BelowOptimal) => "belowOptimal",
            Label::Attendance(AttendanceBand::Acceptable) => "acceptable",
            Label::Attendance(AttendanceBand::Excellent) => "excellent",
            Label::Academic(AcademicBand::Critical) => "critical",
            Label::Academic(AcademicBand::BelowAverage) => "belowAverage",
            Label::Academic(AcademicBand::Average) => "average",
            Label::Academic(AcademicBand::Excellent) => "excellent",
            Label::Participation(ParticipationBand::Concern) => "concern",
            Label::Participation(ParticipationBand::Neutral) => "neutral",
            Label::Participation(ParticipationBand::Strength) => "strength",
            Label::Engagement(EngagementBand::Low) => "low",
            Label::Engagement(EngagementBand::Moderate) => "moderate",
            Label::Engagement(EngagementBand::High) => "high",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
