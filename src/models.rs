use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ValidationError;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_ROLL_ID_LEN: usize = 50;
pub const MAX_NOTES_LEN: usize = 500;
pub const MAX_QUERY_LEN: usize = 500;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_MESSAGE_LEN: usize = 1000;
pub const MAX_RECOMMENDATIONS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipationLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl ParticipationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationLevel::Low => "low",
            ParticipationLevel::Medium => "medium",
            ParticipationLevel::High => "high",
        }
    }
}

/// Raw per-student signals for one alert request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentSignals {
    pub student_name: String,
    pub roll_id: String,
    pub attendance_percentage: f64,
    /// GPA (0-4.0) or marks (0-100); see `classify::AcademicScale`.
    pub academic_performance: f64,
    #[serde(default)]
    pub behavior_notes: String,
    #[serde(default)]
    pub participation_level: ParticipationLevel,
    #[serde(default)]
    pub additional_comments: String,
}

impl StudentSignals {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("student_name", &self.student_name, MAX_NAME_LEN)?;
        require_text("roll_id", &self.roll_id, MAX_ROLL_ID_LEN)?;
        require_range("attendance_percentage", self.attendance_percentage, 0.0, 100.0)?;
        require_range("academic_performance", self.academic_performance, 0.0, 100.0)?;
        limit_text("behavior_notes", &self.behavior_notes, MAX_NOTES_LEN)?;
        limit_text("additional_comments", &self.additional_comments, MAX_NOTES_LEN)?;
        Ok(())
    }
}

pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    limit_text(field, value, max)
}

pub(crate) fn limit_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

pub(crate) fn require_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Info,
    Warning,
    Error,
    Success,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Info => "info",
            AlertType::Warning => "warning",
            AlertType::Error => "error",
            AlertType::Success => "success",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Sort key for storage; higher is more urgent.
    pub fn rank(&self) -> i16 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Academic,
    Attendance,
    Engagement,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Academic => "academic",
            Category::Attendance => "attendance",
            Category::Engagement => "engagement",
            Category::General => "general",
        }
    }
}

macro_rules! impl_text_enum {
    ($ty:ty, [$($variant:expr),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase();
                [$($variant),+]
                    .into_iter()
                    .find(|candidate| candidate.as_str() == wanted)
                    .ok_or_else(|| format!("unknown {} value {s:?}", stringify!($ty)))
            }
        }
    };
}

impl_text_enum!(AlertType, [AlertType::Info, AlertType::Warning, AlertType::Error, AlertType::Success]);
impl_text_enum!(
    ParticipationLevel,
    [ParticipationLevel::Low, ParticipationLevel::Medium, ParticipationLevel::High]
);
impl_text_enum!(Priority, [Priority::Low, Priority::Medium, Priority::High]);
impl_text_enum!(
    Category,
    [Category::Academic, Category::Attendance, Category::Engagement, Category::General]
);

/// One structured alert. Value object until the caller persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratedAlert {
    pub alert_type: AlertType,
    pub priority: Priority,
    pub category: Category,
    pub title: String,
    pub message: String,
    pub action_required: bool,
    pub suggestions: Vec<String>,
    pub reasoning: String,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryCounts {
    pub academic: usize,
    pub attendance: usize,
    pub engagement: usize,
    pub general: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeCounts {
    pub error: usize,
    pub warning: usize,
    pub success: usize,
    pub info: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertSummary {
    pub total_alerts: usize,
    pub high_priority_count: usize,
    pub action_required_count: usize,
    pub categories: CategoryCounts,
    pub types: TypeCounts,
    pub average_confidence: f64,
}

/// Ordered alerts. The summary is derived on demand and never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertSet {
    alerts: Vec<GeneratedAlert>,
}

impl AlertSet {
    pub fn new(alerts: Vec<GeneratedAlert>) -> Self {
        Self { alerts }
    }

    pub fn alerts(&self) -> &[GeneratedAlert] {
        &self.alerts
    }

    pub fn into_alerts(self) -> Vec<GeneratedAlert> {
        self.alerts
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn summary(&self) -> AlertSummary {
        let mut summary = AlertSummary {
            total_alerts: self.alerts.len(),
            ..Default::default()
        };

        let mut confidence_total = 0.0;
        for alert in &self.alerts {
            if alert.priority == Priority::High {
                summary.high_priority_count += 1;
            }
            if alert.action_required {
                summary.action_required_count += 1;
            }
            match alert.category {
                Category::Academic => summary.categories.academic += 1,
                Category::Attendance => summary.categories.attendance += 1,
                Category::Engagement => summary.categories.engagement += 1,
                Category::General => summary.categories.general += 1,
            }
            match alert.alert_type {
                AlertType::Error => summary.types.error += 1,
                AlertType::Warning => summary.types.warning += 1,
                AlertType::Success => summary.types.success += 1,
                AlertType::Info => summary.types.info += 1,
            }
            confidence_total += alert.confidence_score;
        }

        if !self.alerts.is_empty() {
            summary.average_confidence = confidence_total / self.alerts.len() as f64;
        }
        summary
    }
}

impl Serialize for AlertSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AlertSet", 2)?;
        state.serialize_field("alerts", &self.alerts)?;
        state.serialize_field("summary", &self.summary())?;
        state.end()
    }
}

/// Which path produced a result. Observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationSource {
    Generative,
    RuleBased,
}

impl GenerationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationSource::Generative => "generative",
            GenerationSource::RuleBased => "rule_based",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertReport {
    pub student_name: String,
    pub roll_id: String,
    pub alerts: AlertSet,
    pub source: GenerationSource,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Academic,
    Attendance,
    Engagement,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Academic => "academic",
            DataSource::Attendance => "attendance",
            DataSource::Engagement => "engagement",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightResult {
    pub student_id: String,
    pub narrative_text: String,
    pub recommendations: Vec<String>,
    pub confidence: f64,
    pub data_sources_used: BTreeSet<DataSource>,
    pub correlations: Vec<String>,
    pub source: GenerationSource,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub subject: String,
    pub percentage: f64,
    #[serde(default)]
    pub trend: Trend,
    #[serde(default)]
    pub grade: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicData {
    pub overall_gpa: f64,
    #[serde(default)]
    pub subjects: Vec<SubjectRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceData {
    pub overall_percentage: f64,
    #[serde(default)]
    pub late_days: u32,
    #[serde(default)]
    pub absent_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementData {
    pub overall_engagement_score: f64,
    #[serde(default)]
    pub total_study_hours: f64,
    #[serde(default)]
    pub participation_score: f64,
}

/// Per-domain inputs for an insight request. Missing domains are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainData {
    #[serde(default)]
    pub academic: Option<AcademicData>,
    #[serde(default)]
    pub attendance: Option<AttendanceData>,
    #[serde(default)]
    pub engagement: Option<EngagementData>,
}

impl DomainData {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(academic) = &self.academic {
            require_range("overall_gpa", academic.overall_gpa, 0.0, 4.0)?;
            for subject in &academic.subjects {
                require_text("subject", &subject.subject, MAX_NAME_LEN)?;
                require_range("subject.percentage", subject.percentage, 0.0, 100.0)?;
            }
        }
        if let Some(attendance) = &self.attendance {
            require_range("overall_percentage", attendance.overall_percentage, 0.0, 100.0)?;
        }
        if let Some(engagement) = &self.engagement {
            require_range(
                "overall_engagement_score",
                engagement.overall_engagement_score,
                0.0,
                100.0,
            )?;
            require_range("total_study_hours", engagement.total_study_hours, 0.0, 168.0)?;
            require_range("participation_score", engagement.participation_score, 0.0, 100.0)?;
        }
        Ok(())
    }

    pub fn data_sources(&self) -> BTreeSet<DataSource> {
        let mut sources = BTreeSet::new();
        if self.academic.is_some() {
            sources.insert(DataSource::Academic);
        }
        if self.attendance.is_some() {
            sources.insert(DataSource::Attendance);
        }
        if self.engagement.is_some() {
            sources.insert(DataSource::Engagement);
        }
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(priority: Priority, category: Category, alert_type: AlertType) -> GeneratedAlert {
        GeneratedAlert {
            alert_type,
            priority,
            category,
            title: "Title".to_string(),
            message: "Message".to_string(),
            action_required: priority != Priority::Low,
            suggestions: vec!["Do something".to_string()],
            reasoning: "Because".to_string(),
            confidence_score: 0.8,
        }
    }

    fn signals() -> StudentSignals {
        StudentSignals {
            student_name: "Avery Lee".to_string(),
            roll_id: "STU001".to_string(),
            attendance_percentage: 90.0,
            academic_performance: 3.1,
            behavior_notes: String::new(),
            participation_level: ParticipationLevel::Medium,
            additional_comments: String::new(),
        }
    }

    #[test]
    fn empty_set_summary_is_all_zeros() {
        let summary = AlertSet::default().summary();
        assert_eq!(summary, AlertSummary::default());
        assert_eq!(summary.average_confidence, 0.0);
    }

    #[test]
    fn summary_counts_follow_alerts() {
        let set = AlertSet::new(vec![
            alert(Priority::High, Category::Attendance, AlertType::Error),
            alert(Priority::High, Category::Academic, AlertType::Error),
            alert(Priority::Low, Category::Engagement, AlertType::Success),
        ]);
        let summary = set.summary();
        assert_eq!(summary.total_alerts, set.len());
        assert_eq!(summary.high_priority_count, 2);
        assert_eq!(summary.action_required_count, 2);
        assert_eq!(summary.categories.attendance, 1);
        assert_eq!(summary.categories.general, 0);
        assert_eq!(summary.types.error, 2);
        assert_eq!(summary.types.success, 1);
        assert!((summary.average_confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn alert_set_serializes_with_summary() {
        let set = AlertSet::new(vec![alert(
            Priority::Medium,
            Category::Engagement,
            AlertType::Warning,
        )]);
        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value["alerts"].as_array().unwrap().len(), 1);
        assert_eq!(value["summary"]["total_alerts"], 1);
        assert_eq!(value["alerts"][0]["priority"], "medium");
    }

    #[test]
    fn validation_rejects_out_of_range_attendance() {
        let mut input = signals();
        input.attendance_percentage = 101.0;
        assert!(matches!(
            input.validate(),
            Err(ValidationError::OutOfRange { field: "attendance_percentage", .. })
        ));
    }

    #[test]
    fn validation_rejects_blank_name_and_nan() {
        let mut input = signals();
        input.student_name = "   ".to_string();
        assert_eq!(
            input.validate(),
            Err(ValidationError::Empty { field: "student_name" })
        );

        let mut input = signals();
        input.academic_performance = f64::NAN;
        assert_eq!(
            input.validate(),
            Err(ValidationError::NotFinite { field: "academic_performance" })
        );
    }

    #[test]
    fn validation_rejects_long_notes() {
        let mut input = signals();
        input.behavior_notes = "x".repeat(MAX_NOTES_LEN + 1);
        assert!(matches!(input.validate(), Err(ValidationError::TooLong { .. })));
        assert!(signals().validate().is_ok());
    }

    #[test]
    fn signals_default_optional_fields() {
        let parsed: StudentSignals = serde_json::from_str(
            r#"{"student_name":"Jules","roll_id":"R1","attendance_percentage":80,"academic_performance":70}"#,
        )
        .unwrap();
        assert_eq!(parsed.participation_level, ParticipationLevel::Medium);
        assert!(parsed.behavior_notes.is_empty());
    }

    #[test]
    fn domain_data_reports_sources_and_validates() {
        let data = DomainData {
            attendance: Some(AttendanceData {
                overall_percentage: 92.0,
                late_days: 1,
                absent_days: 2,
            }),
            ..Default::default()
        };
        assert!(data.validate().is_ok());
        assert_eq!(
            data.data_sources().into_iter().collect::<Vec<_>>(),
            vec![DataSource::Attendance]
        );

        let bad = DomainData {
            academic: Some(AcademicData {
                overall_gpa: 4.5,
                subjects: vec![],
            }),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn enums_parse_from_text() {
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert_eq!(" attendance ".parse::<Category>(), Ok(Category::Attendance));
        assert_eq!("success".parse::<AlertType>(), Ok(AlertType::Success));
        assert_eq!("low".parse::<ParticipationLevel>(), Ok(ParticipationLevel::Low));
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn priority_rank_orders_high_first() {
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
    }
}
