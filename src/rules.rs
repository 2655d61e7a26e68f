//! Deterministic alert policy used whenever the generative path is skipped
//! or fails. Each domain yields at most one alert, picked by the first
//! matching band in descending severity.

use crate::classify::{
    self, AcademicBand, AcademicScale, AttendanceBand, ParticipationBand,
};
use crate::models::{AlertType, Category, GeneratedAlert, Priority, StudentSignals};

/// Notes at or below this many characters are not inspected.
pub const MIN_BEHAVIOR_NOTES_LEN: usize = 10;

// Plain substring match, so "not disruptive" still counts as negative.
pub const NEGATIVE_KEYWORDS: [&str; 5] =
    ["disruptive", "concerning", "issue", "problem", "inappropriate"];
pub const POSITIVE_KEYWORDS: [&str; 5] = ["excellent", "outstanding", "positive", "good", "respectful"];

/// Fixed per-band confidence values.
mod confidence {
    pub const ATTENDANCE_CRITICAL: f64 = 0.95;
    pub const ATTENDANCE_BELOW_OPTIMAL: f64 = 0.90;
    pub const ATTENDANCE_EXCELLENT: f64 = 0.90;
    pub const ACADEMIC_CRITICAL: f64 = 0.92;
    pub const ACADEMIC_BELOW_AVERAGE: f64 = 0.88;
    pub const ACADEMIC_EXCELLENT: f64 = 0.88;
    pub const PARTICIPATION_LOW: f64 = 0.82;
    pub const PARTICIPATION_HIGH: f64 = 0.80;
    pub const BEHAVIOR_NEGATIVE: f64 = 0.85;
    pub const BEHAVIOR_POSITIVE: f64 = 0.80;
}

pub fn generate(signals: &StudentSignals) -> Vec<GeneratedAlert> {
    [
        attendance_alert(signals),
        academic_alert(signals),
        participation_alert(signals),
        behavior_alert(signals),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn attendance_alert(signals: &StudentSignals) -> Option<GeneratedAlert> {
    let name = &signals.student_name;
    let value = signals.attendance_percentage;

    match classify::attendance_band(value) {
        AttendanceBand::Critical => Some(GeneratedAlert {
            alert_type: AlertType::Error,
            priority: Priority::High,
            category: Category::Attendance,
            title: "Critical Attendance Alert".to_string(),
            message: format!(
                "{name}'s attendance is at {value}%, which is critically below the required 75% minimum. \
                 Immediate intervention is needed to prevent academic consequences."
            ),
            action_required: true,
            suggestions: owned(&[
                "Schedule an immediate meeting with the student and parents",
                "Review the reasons for absences",
                "Create an attendance improvement plan",
                "Monitor daily attendance closely",
            ]),
            reasoning: format!("Attendance at {value}% is below the 75% minimum threshold"),
            confidence_score: confidence::ATTENDANCE_CRITICAL,
        }),
        AttendanceBand::BelowOptimal => Some(GeneratedAlert {
            alert_type: AlertType::Warning,
            priority: Priority::Medium,
            category: Category::Attendance,
            title: "Attendance Needs Improvement".to_string(),
            message: format!(
                "{name}'s attendance is at {value}%, which is below optimal levels. \
                 Consistent attendance is crucial for academic success."
            ),
            action_required: true,
            suggestions: owned(&[
                "Contact parents about attendance patterns",
                "Identify barriers to regular attendance",
                "Set attendance improvement goals",
            ]),
            reasoning: format!("Attendance at {value}% is below the 85% optimal range"),
            confidence_score: confidence::ATTENDANCE_BELOW_OPTIMAL,
        }),
        AttendanceBand::Excellent => Some(GeneratedAlert {
            alert_type: AlertType::Success,
            priority: Priority::Low,
            category: Category::Attendance,
            title: "Excellent Attendance Record".to_string(),
            message: format!(
                "Congratulations! {name} has maintained excellent attendance at {value}%. \
                 This dedication supports academic success."
            ),
            action_required: false,
            suggestions: owned(&[
                "Recognize and reward consistent attendance",
                "Share the achievement with the student",
            ]),
            reasoning: format!("Attendance at {value}% meets the 95% excellence threshold"),
            confidence_score: confidence::ATTENDANCE_EXCELLENT,
        }),
        AttendanceBand::Acceptable => None,
    }
}

pub fn academic_alert(signals: &StudentSignals) -> Option<GeneratedAlert> {
    let name = &signals.student_name;
    let value = signals.academic_performance;
    let scale = AcademicScale::detect(value);
    let scale_label = scale.as_str();

    match classify::academic_band_on(scale, value) {
        AcademicBand::Critical => Some(GeneratedAlert {
            alert_type: AlertType::Error,
            priority: Priority::High,
            category: Category::Academic,
            title: "Academic Performance Concern".to_string(),
            message: format!(
                "{name}'s academic performance ({value} on the {scale_label} scale) is significantly \
                 below expectations. Immediate academic support is required."
            ),
            action_required: true,
            suggestions: owned(&[
                "Arrange tutoring or academic support sessions",
                "Meet with teachers to identify specific challenges",
                "Develop a personalized learning plan",
                "Consider additional study resources",
            ]),
            reasoning: format!(
                "Academic performance of {value} is in the critical band of the {scale_label} scale"
            ),
            confidence_score: confidence::ACADEMIC_CRITICAL,
        }),
        AcademicBand::BelowAverage => Some(GeneratedAlert {
            alert_type: AlertType::Warning,
            priority: Priority::Medium,
            category: Category::Academic,
            title: "Academic Performance Below Average".to_string(),
            message: format!(
                "{name}'s academic performance ({value} on the {scale_label} scale) shows room for \
                 improvement. Additional support could help achieve better results."
            ),
            action_required: true,
            suggestions: owned(&[
                "Review study habits and time management",
                "Identify subjects needing extra attention",
                "Consider peer study groups or tutoring",
            ]),
            reasoning: format!(
                "Academic performance of {value} is below average on the {scale_label} scale"
            ),
            confidence_score: confidence::ACADEMIC_BELOW_AVERAGE,
        }),
        AcademicBand::Excellent => Some(GeneratedAlert {
            alert_type: AlertType::Success,
            priority: Priority::Low,
            category: Category::Academic,
            title: "Outstanding Academic Performance".to_string(),
            message: format!(
                "Excellent work! {name} is performing exceptionally well with {value} on the \
                 {scale_label} scale."
            ),
            action_required: false,
            suggestions: owned(&[
                "Encourage continued excellence",
                "Consider advanced or enrichment opportunities",
                "Recognize the achievement",
            ]),
            reasoning: format!(
                "Academic performance of {value} is in the excellent band of the {scale_label} scale"
            ),
            confidence_score: confidence::ACADEMIC_EXCELLENT,
        }),
        AcademicBand::Average => None,
    }
}

pub fn participation_alert(signals: &StudentSignals) -> Option<GeneratedAlert> {
    let name = &signals.student_name;
    let level = signals.participation_level;

    match classify::participation_band(level) {
        ParticipationBand::Concern => Some(GeneratedAlert {
            alert_type: AlertType::Warning,
            priority: Priority::Medium,
            category: Category::Engagement,
            title: "Low Class Participation".to_string(),
            message: format!(
                "{name} shows a {level} participation level in class activities. Increased \
                 engagement could improve learning outcomes."
            ),
            action_required: true,
            suggestions: owned(&[
                "Encourage active participation in discussions",
                "Identify barriers to engagement",
                "Build confidence through smaller group activities",
            ]),
            reasoning: format!("Participation level '{level}' indicates an engagement concern"),
            confidence_score: confidence::PARTICIPATION_LOW,
        }),
        ParticipationBand::Strength => Some(GeneratedAlert {
            alert_type: AlertType::Success,
            priority: Priority::Low,
            category: Category::Engagement,
            title: "Excellent Class Engagement".to_string(),
            message: format!(
                "{name} shows a {level} participation level in class. This active involvement \
                 contributes positively to the classroom."
            ),
            action_required: false,
            suggestions: owned(&[
                "Continue encouraging active participation",
                "Consider leadership opportunities",
            ]),
            reasoning: format!("Participation level '{level}' shows strong engagement"),
            confidence_score: confidence::PARTICIPATION_HIGH,
        }),
        ParticipationBand::Neutral => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorTone {
    Negative,
    Positive,
}

/// Negative keywords win when both classes match.
pub fn behavior_tone(notes: &str) -> Option<BehaviorTone> {
    if notes.chars().count() <= MIN_BEHAVIOR_NOTES_LEN {
        return None;
    }
    let lowered = notes.to_lowercase();
    if NEGATIVE_KEYWORDS.iter().any(|word| lowered.contains(word)) {
        Some(BehaviorTone::Negative)
    } else if POSITIVE_KEYWORDS.iter().any(|word| lowered.contains(word)) {
        Some(BehaviorTone::Positive)
    } else {
        None
    }
}

fn matched_keywords(notes: &str, keywords: &[&str]) -> String {
    let lowered = notes.to_lowercase();
    keywords
        .iter()
        .filter(|word| lowered.contains(*word))
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn behavior_alert(signals: &StudentSignals) -> Option<GeneratedAlert> {
    let name = &signals.student_name;
    let notes = &signals.behavior_notes;

    match behavior_tone(notes)? {
        BehaviorTone::Negative => Some(GeneratedAlert {
            alert_type: AlertType::Warning,
            priority: Priority::High,
            category: Category::General,
            title: "Behavioral Attention Required".to_string(),
            message: format!(
                "Behavioral concerns have been noted for {name}: {notes}. Addressing them promptly \
                 will support a positive learning environment."
            ),
            action_required: true,
            suggestions: owned(&[
                "Schedule a counseling session",
                "Meet with parents to discuss behavior",
                "Develop a behavior improvement plan",
                "Identify underlying causes",
            ]),
            reasoning: format!(
                "Behavior notes mention concern keywords: {}",
                matched_keywords(notes, &NEGATIVE_KEYWORDS)
            ),
            confidence_score: confidence::BEHAVIOR_NEGATIVE,
        }),
        BehaviorTone::Positive => Some(GeneratedAlert {
            alert_type: AlertType::Success,
            priority: Priority::Low,
            category: Category::General,
            title: "Positive Behavior Recognition".to_string(),
            message: format!(
                "{name} demonstrates positive behavior: {notes}. This conduct contributes to a \
                 productive learning environment."
            ),
            action_required: false,
            suggestions: owned(&[
                "Recognize positive behavior publicly",
                "Continue positive reinforcement",
            ]),
            reasoning: format!(
                "Behavior notes mention positive keywords: {}",
                matched_keywords(notes, &POSITIVE_KEYWORDS)
            ),
            confidence_score: confidence::BEHAVIOR_POSITIVE,
        }),
    }
}
