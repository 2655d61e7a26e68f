//! Entry point for alert and insight requests.
//!
//! Each request first tries the generative backend (when one is configured)
//! and falls back to the deterministic generators on any failure. The only
//! error a caller can see is `ValidationError`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::adapter::GenerativeAdapter;
use crate::completion::{HttpCompletionClient, TextCompletionClient};
use crate::config::EngineConfig;
use crate::correlation;
use crate::error::{AdapterFailure, ValidationError};
use crate::insight;
use crate::models::{
    require_text, AlertReport, AlertSet, DomainData, GenerationSource, InsightResult,
    StudentSignals, MAX_QUERY_LEN, MAX_ROLL_ID_LEN,
};
use crate::rules;

pub const GENERATIVE_INSIGHT_CONFIDENCE: f64 = 0.85;

/// Outcome of the generative step.
enum Attempt<T> {
    Generated(T),
    Fallback(FallbackReason),
}

enum FallbackReason {
    Unconfigured,
    Failed(AdapterFailure),
}

impl FallbackReason {
    fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::Unconfigured => "unconfigured",
            FallbackReason::Failed(failure) => failure.reason(),
        }
    }
}

/// Stateless between requests; safe to share across tasks.
pub struct AlertEngine {
    adapter: Option<GenerativeAdapter>,
}

impl AlertEngine {
    pub fn new(client: Option<Arc<dyn TextCompletionClient>>, timeout: Duration) -> Self {
        Self {
            adapter: client.map(|client| GenerativeAdapter::new(client, timeout)),
        }
    }

    pub fn rule_based() -> Self {
        Self { adapter: None }
    }

    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        let client: Option<Arc<dyn TextCompletionClient>> = match &config.completion {
            Some(completion) => {
                info!(model = %completion.model, "generative backend configured");
                Some(Arc::new(HttpCompletionClient::new(completion.clone())?))
            }
            None => {
                info!("no API key set; using rule-based generation only");
                None
            }
        };
        Ok(Self::new(client, config.timeout))
    }

    pub fn is_generative(&self) -> bool {
        self.adapter.is_some()
    }

    pub async fn generate_alerts(
        &self,
        signals: &StudentSignals,
    ) -> Result<AlertReport, ValidationError> {
        signals.validate()?;

        let attempt = match &self.adapter {
            None => Attempt::Fallback(FallbackReason::Unconfigured),
            Some(adapter) => match adapter.complete_alerts(signals).await {
                Ok(alerts) => Attempt::Generated(alerts),
                Err(failure) => Attempt::Fallback(FallbackReason::Failed(failure)),
            },
        };

        let (alerts, source) = match attempt {
            Attempt::Generated(alerts) => (alerts, GenerationSource::Generative),
            Attempt::Fallback(reason) => {
                log_fallback("alerts", &reason);
                (rules::generate(signals), GenerationSource::RuleBased)
            }
        };

        let alerts = AlertSet::new(alerts);
        info!(
            roll_id = %signals.roll_id,
            source = source.as_str(),
            alerts = alerts.len(),
            "alerts generated"
        );

        Ok(AlertReport {
            student_name: signals.student_name.clone(),
            roll_id: signals.roll_id.clone(),
            alerts,
            source,
            generated_at: Utc::now(),
        })
    }

    pub async fn generate_insight(
        &self,
        student_id: &str,
        data: &DomainData,
        query: &str,
    ) -> Result<InsightResult, ValidationError> {
        require_text("student_id", student_id, MAX_ROLL_ID_LEN)?;
        require_text("query", query, MAX_QUERY_LEN)?;
        data.validate()?;

        let analysis = correlation::analyze(data);

        let attempt = match &self.adapter {
            None => Attempt::Fallback(FallbackReason::Unconfigured),
            Some(adapter) => match adapter.complete_insight(query, &analysis).await {
                Ok(generated) => Attempt::Generated(generated),
                Err(failure) => Attempt::Fallback(FallbackReason::Failed(failure)),
            },
        };

        let (narrative_text, recommendations, confidence, source) = match attempt {
            Attempt::Generated(generated) => (
                generated.narrative,
                generated.recommendations,
                GENERATIVE_INSIGHT_CONFIDENCE,
                GenerationSource::Generative,
            ),
            Attempt::Fallback(reason) => {
                log_fallback("insight", &reason);
                let fallback = insight::generate(&analysis);
                (
                    fallback.narrative,
                    fallback.recommendations,
                    insight::rule_based_confidence(&analysis),
                    GenerationSource::RuleBased,
                )
            }
        };

        info!(student_id, source = source.as_str(), "insight generated");

        Ok(InsightResult {
            student_id: student_id.to_string(),
            narrative_text,
            recommendations,
            confidence,
            data_sources_used: data.data_sources(),
            correlations: analysis
                .correlations
                .into_iter()
                .map(|note| note.message)
                .collect(),
            source,
            generated_at: Utc::now(),
        })
    }
}

fn log_fallback(request: &'static str, reason: &FallbackReason) {
    match reason {
        FallbackReason::Unconfigured => {
            info!(request, reason = reason.as_str(), "using rule-based generation")
        }
        FallbackReason::Failed(failure) => warn!(
            request,
            reason = reason.as_str(),
            error = %failure,
            "generative path failed; using rule-based generation"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ScriptedCompletionClient;
    use crate::error::CompletionError;
    use crate::insight::DEFAULT_NARRATIVE;
    use crate::models::{
        AcademicData, AlertType, AttendanceData, EngagementData, ParticipationLevel, Priority,
    };

    fn signals(attendance: f64, academic: f64, participation: ParticipationLevel) -> StudentSignals {
        StudentSignals {
            student_name: "Avery Lee".to_string(),
            roll_id: "STU001".to_string(),
            attendance_percentage: attendance,
            academic_performance: academic,
            behavior_notes: String::new(),
            participation_level: participation,
            additional_comments: String::new(),
        }
    }

    fn domain_data() -> DomainData {
        DomainData {
            academic: Some(AcademicData {
                overall_gpa: 3.2,
                subjects: vec![],
            }),
            attendance: Some(AttendanceData {
                overall_percentage: 90.0,
                late_days: 2,
                absent_days: 4,
            }),
            engagement: Some(EngagementData {
                overall_engagement_score: 78.0,
                total_study_hours: 22.0,
                participation_score: 85.0,
            }),
        }
    }

    fn engine_with(client: ScriptedCompletionClient) -> (AlertEngine, Arc<ScriptedCompletionClient>) {
        let client = Arc::new(client);
        let engine = AlertEngine::new(Some(client.clone()), Duration::from_secs(5));
        (engine, client)
    }

    const GENERATED_ALERTS: &str = r#"```json
    [{
        "alert_type": "info",
        "priority": "low",
        "category": "general",
        "title": "Keep it up",
        "message": "Avery is on track.",
        "action_required": false,
        "suggestions": ["Keep going"],
        "reasoning": "All metrics are in range",
        "confidence_score": 0.7
    }]
    ```"#;

    #[tokio::test]
    async fn unconfigured_engine_matches_rules() {
        let engine = AlertEngine::rule_based();
        let input = signals(65.0, 45.0, ParticipationLevel::Low);

        let report = engine.generate_alerts(&input).await.unwrap();
        assert_eq!(report.source, GenerationSource::RuleBased);
        assert_eq!(report.alerts.alerts(), rules::generate(&input).as_slice());

        let summary = report.alerts.summary();
        assert_eq!(summary.total_alerts, 3);
        assert_eq!(summary.high_priority_count, 2);
    }

    #[tokio::test]
    async fn well_formed_generation_is_used_directly() {
        let (engine, client) = engine_with(ScriptedCompletionClient::always(GENERATED_ALERTS));
        let report = engine
            .generate_alerts(&signals(65.0, 45.0, ParticipationLevel::Low))
            .await
            .unwrap();

        assert_eq!(report.source, GenerationSource::Generative);
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts.alerts()[0].alert_type, AlertType::Info);
        assert_eq!(report.alerts.alerts()[0].priority, Priority::Low);
        assert_eq!(client.prompts().len(), 1);
    }

    #[tokio::test]
    async fn malformed_generation_falls_back() {
        let (engine, _) = engine_with(ScriptedCompletionClient::always("I cannot help with that."));
        let input = signals(80.0, 2.5, ParticipationLevel::High);
        let report = engine.generate_alerts(&input).await.unwrap();
        assert_eq!(report.source, GenerationSource::RuleBased);
        assert_eq!(report.alerts.alerts(), rules::generate(&input).as_slice());
    }

    #[tokio::test]
    async fn service_failure_falls_back() {
        let (engine, _) = engine_with(ScriptedCompletionClient::failing(CompletionError::Http(
            "connection refused".to_string(),
        )));
        let report = engine
            .generate_alerts(&signals(98.0, 92.0, ParticipationLevel::High))
            .await
            .unwrap();
        assert_eq!(report.source, GenerationSource::RuleBased);
        assert_eq!(report.alerts.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back() {
        let client = ScriptedCompletionClient::always(GENERATED_ALERTS)
            .with_delay(Duration::from_secs(30));
        let engine = AlertEngine::new(Some(Arc::new(client)), Duration::from_secs(1));
        let report = engine
            .generate_alerts(&signals(90.0, 75.0, ParticipationLevel::Medium))
            .await
            .unwrap();
        assert_eq!(report.source, GenerationSource::RuleBased);
        assert!(report.alerts.is_empty());
        assert_eq!(report.alerts.summary().total_alerts, 0);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_generation() {
        let (engine, client) = engine_with(ScriptedCompletionClient::always(GENERATED_ALERTS));
        let result = engine
            .generate_alerts(&signals(120.0, 3.0, ParticipationLevel::Medium))
            .await;
        assert!(matches!(result, Err(ValidationError::OutOfRange { .. })));
        assert!(client.prompts().is_empty());
    }

    #[tokio::test]
    async fn concurrent_requests_are_independent() {
        let engine = AlertEngine::rule_based();
        let low = signals(60.0, 1.5, ParticipationLevel::Low);
        let high = signals(99.0, 3.9, ParticipationLevel::High);
        let (a, b) = tokio::join!(engine.generate_alerts(&low), engine.generate_alerts(&high));
        assert_eq!(a.unwrap().alerts.summary().high_priority_count, 2);
        assert_eq!(b.unwrap().alerts.summary().high_priority_count, 0);
    }

    #[tokio::test]
    async fn insight_fallback_uses_default_sentence() {
        let engine = AlertEngine::rule_based();
        let result = engine
            .generate_insight("student-1", &domain_data(), "How is my child doing?")
            .await
            .unwrap();
        assert_eq!(result.narrative_text, DEFAULT_NARRATIVE);
        assert_eq!(result.source, GenerationSource::RuleBased);
        assert!((result.confidence - 0.75).abs() < 1e-9);
        assert_eq!(result.data_sources_used.len(), 3);
        let expected = insight::generate(&correlation::analyze(&domain_data()));
        assert_eq!(result.recommendations, expected.recommendations);
    }

    #[tokio::test]
    async fn insight_fallback_matches_rule_generator_on_notable_data() {
        let data = DomainData {
            academic: Some(AcademicData {
                overall_gpa: 1.9,
                subjects: vec![],
            }),
            attendance: Some(AttendanceData {
                overall_percentage: 72.0,
                late_days: 8,
                absent_days: 12,
            }),
            engagement: None,
        };
        let engine = AlertEngine::rule_based();
        let result = engine
            .generate_insight("student-1", &data, "What should we work on?")
            .await
            .unwrap();

        let expected = insight::generate(&correlation::analyze(&data));
        assert_ne!(expected.narrative, DEFAULT_NARRATIVE);
        assert_eq!(result.narrative_text, expected.narrative);
        assert_eq!(result.recommendations, expected.recommendations);
        assert!((result.confidence - 0.70).abs() < 1e-9);
    }

    #[tokio::test]
    async fn insight_uses_generated_text() {
        let (engine, client) = engine_with(ScriptedCompletionClient::always(
            r#"{"insight": "Avery is doing well.", "recommendations": ["Read together"]}"#,
        ));
        let result = engine
            .generate_insight("student-1", &domain_data(), "Any concerns?")
            .await
            .unwrap();
        assert_eq!(result.narrative_text, "Avery is doing well.");
        assert_eq!(result.recommendations, vec!["Read together"]);
        assert_eq!(result.source, GenerationSource::Generative);
        assert_eq!(result.confidence, GENERATIVE_INSIGHT_CONFIDENCE);
        assert!(client.prompts()[0].contains("Any concerns?"));
    }

    #[tokio::test]
    async fn insight_with_bad_output_falls_back() {
        let (engine, _) = engine_with(ScriptedCompletionClient::always("{\"insight\": \"\"}"));
        let result = engine
            .generate_insight("student-1", &DomainData::default(), "Update?")
            .await
            .unwrap();
        assert_eq!(result.source, GenerationSource::RuleBased);
        assert!(!result.narrative_text.is_empty());
        assert!(result.data_sources_used.is_empty());
    }

    #[tokio::test]
    async fn insight_rejects_empty_query() {
        let engine = AlertEngine::rule_based();
        let result = engine.generate_insight("student-1", &domain_data(), "  ").await;
        assert_eq!(result.unwrap_err(), ValidationError::Empty { field: "query" });
    }
}
