//! Prompt construction and response parsing for the generative backend.
//!
//! Every failure is logged and returned as `AdapterFailure`; nothing here
//! panics or propagates past the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::completion::TextCompletionClient;
use crate::correlation::CrossDomainAnalysis;
use crate::error::AdapterFailure;
use crate::insight::GENERIC_RECOMMENDATIONS;
use crate::models::{
    GeneratedAlert, StudentSignals, MAX_MESSAGE_LEN, MAX_RECOMMENDATIONS, MAX_TITLE_LEN,
};

const ALERT_SCHEMA_EXAMPLE: &str = r#"[
  {
    "alert_type": "warning",
    "priority": "high",
    "category": "attendance",
    "title": "Low Attendance Alert",
    "message": "Student attendance has fallen below the acceptable threshold...",
    "action_required": true,
    "suggestions": ["Contact parents", "Schedule meeting", "Review attendance policy"],
    "reasoning": "Attendance at 65% is significantly below the 75% minimum requirement",
    "confidence_score": 0.95
  }
]"#;

const INSIGHT_SCHEMA_EXAMPLE: &str = r#"{
  "insight": "Two to three parent-friendly sentences.",
  "recommendations": ["First recommendation", "Second recommendation", "Third recommendation"]
}"#;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerativeInsight {
    pub narrative: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InsightPayload {
    insight: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

pub struct GenerativeAdapter {
    client: Arc<dyn TextCompletionClient>,
    timeout: Duration,
}

impl GenerativeAdapter {
    pub fn new(client: Arc<dyn TextCompletionClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn complete_alerts(
        &self,
        signals: &StudentSignals,
    ) -> Result<Vec<GeneratedAlert>, AdapterFailure> {
        let prompt = alert_prompt(signals);
        let raw = self.call(&prompt).await?;
        parse_alerts(&raw).map_err(|failure| {
            warn!(reason = failure.reason(), error = %failure, "discarding generated alerts");
            failure
        })
    }

    pub async fn complete_insight(
        &self,
        query: &str,
        analysis: &CrossDomainAnalysis,
    ) -> Result<GenerativeInsight, AdapterFailure> {
        let prompt = insight_prompt(query, analysis)?;
        let raw = self.call(&prompt).await?;
        parse_insight(&raw).map_err(|failure| {
            warn!(reason = failure.reason(), error = %failure, "discarding generated insight");
            failure
        })
    }

    async fn call(&self, prompt: &str) -> Result<String, AdapterFailure> {
        let failure = match tokio::time::timeout(self.timeout, self.client.complete(prompt)).await {
            Ok(Ok(text)) => {
                debug!(response_len = text.len(), "completion received");
                return Ok(text);
            }
            Ok(Err(error)) => AdapterFailure::Service(error),
            Err(_) => AdapterFailure::Timeout(self.timeout),
        };
        warn!(reason = failure.reason(), error = %failure, "completion call failed");
        Err(failure)
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

pub fn alert_prompt(signals: &StudentSignals) -> String {
    format!(
        "You are an educational alert system. Analyze the following student data and generate \
appropriate alerts.

Student Information:
- Name: {name}
- Roll Number: {roll}
- Attendance: {attendance}%
- Academic Performance: {academic} (GPA on a 0-4.0 scale if 4.0 or below, otherwise marks out of 100)
- Behavior Notes: {notes}
- Participation Level: {participation}
- Additional Comments: {comments}

Generate 1-4 alerts, only those that are truly relevant. Each alert has:
alert_type (one of info, warning, error, success), priority (one of low, medium, high),
category (one of academic, attendance, engagement, general), title (max {title_max} characters),
message (max {message_max} characters), action_required (true or false),
suggestions (2-4 specific, actionable items), reasoning (why this alert was generated,
citing the metric values), confidence_score (0.0 to 1.0).

Guidelines:
- Attendance below 75%: high priority error
- Attendance 75-85%: medium priority warning
- Attendance 95% or above: consider a success alert
- GPA below 2.0 or marks below 50: high priority academic error
- GPA 2.0-3.0 or marks 50-70: medium priority academic warning
- GPA 3.5+ or marks 85+: consider a success alert
- Behavior issues: appropriate warnings
- Low participation: engagement alerts
- Keep the tone constructive and supportive

Return only a JSON array of alerts using exactly these field names, for example:
{example}",
        name = signals.student_name,
        roll = signals.roll_id,
        attendance = signals.attendance_percentage,
        academic = signals.academic_performance,
        notes = or_placeholder(&signals.behavior_notes, "No specific notes"),
        participation = signals.participation_level,
        comments = or_placeholder(&signals.additional_comments, "None"),
        title_max = MAX_TITLE_LEN,
        message_max = MAX_MESSAGE_LEN,
        example = ALERT_SCHEMA_EXAMPLE,
    )
}

pub fn insight_prompt(query: &str, analysis: &CrossDomainAnalysis) -> Result<String, AdapterFailure> {
    let bundle = serde_json::to_string_pretty(analysis)
        .map_err(|e| AdapterFailure::Parse(format!("could not encode analysis: {e}")))?;

    Ok(format!(
        "You are an educational assistant helping parents understand their child's progress.

Parent's Question: {query}

Student Data Analysis:
{bundle}

Write a clear, parent-friendly insight of 2-3 sentences covering current performance, notable \
trends, strengths and areas needing attention. Then give 3-5 specific, actionable \
recommendations a parent can carry out.

Return only a JSON object of this shape:
{INSIGHT_SCHEMA_EXAMPLE}"
    ))
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub fn validate_alert(alert: &GeneratedAlert) -> Result<(), String> {
    if alert.title.trim().is_empty() {
        return Err("title is empty".to_string());
    }
    if alert.title.chars().count() > MAX_TITLE_LEN {
        return Err(format!("title exceeds {MAX_TITLE_LEN} characters"));
    }
    if alert.message.trim().is_empty() {
        return Err("message is empty".to_string());
    }
    if alert.message.chars().count() > MAX_MESSAGE_LEN {
        return Err(format!("message exceeds {MAX_MESSAGE_LEN} characters"));
    }
    if alert.reasoning.trim().is_empty() {
        return Err("reasoning is empty".to_string());
    }
    if !(0.0..=1.0).contains(&alert.confidence_score) {
        return Err(format!(
            "confidence_score {} is outside 0..=1",
            alert.confidence_score
        ));
    }
    Ok(())
}

/// Decode an alert array. Invalid items are dropped; none left is a failure.
pub fn parse_alerts(raw: &str) -> Result<Vec<GeneratedAlert>, AdapterFailure> {
    let items: Vec<serde_json::Value> = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| AdapterFailure::Parse(e.to_string()))?;

    let mut alerts = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let alert: GeneratedAlert = match serde_json::from_value(item) {
            Ok(alert) => alert,
            Err(e) => {
                warn!(index, error = %e, "dropping malformed generated alert");
                continue;
            }
        };
        if let Err(reason) = validate_alert(&alert) {
            warn!(index, %reason, "dropping invalid generated alert");
            continue;
        }
        alerts.push(alert);
    }

    if alerts.is_empty() {
        return Err(AdapterFailure::NoValidItems);
    }
    Ok(alerts)
}

pub fn parse_insight(raw: &str) -> Result<GenerativeInsight, AdapterFailure> {
    let payload: InsightPayload = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| AdapterFailure::Parse(e.to_string()))?;

    let narrative = payload.insight.trim().to_string();
    if narrative.is_empty() {
        return Err(AdapterFailure::EmptyNarrative);
    }

    let mut recommendations: Vec<String> = payload
        .recommendations
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .take(MAX_RECOMMENDATIONS)
        .collect();
    if recommendations.is_empty() {
        debug!("generated insight has no recommendations; using generic ones");
        recommendations = GENERIC_RECOMMENDATIONS.iter().map(|item| item.to_string()).collect();
    }

    Ok(GenerativeInsight {
        narrative,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ScriptedCompletionClient;
    use crate::error::CompletionError;
    use crate::models::{Category, ParticipationLevel, Priority};

    fn signals() -> StudentSignals {
        StudentSignals {
            student_name: "Jules Moreno".to_string(),
            roll_id: "STU777".to_string(),
            attendance_percentage: 78.5,
            academic_performance: 3.2,
            behavior_notes: String::new(),
            participation_level: ParticipationLevel::Low,
            additional_comments: "Shows improvement in recent weeks".to_string(),
        }
    }

    const VALID_ALERT: &str = r#"{
        "alert_type": "warning",
        "priority": "medium",
        "category": "attendance",
        "title": "Attendance Needs Improvement",
        "message": "Attendance is at 78.5%.",
        "action_required": true,
        "suggestions": ["Contact parents"],
        "reasoning": "78.5% is below 85%",
        "confidence_score": 0.85
    }"#;

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fences("  [2] "), "[2]");
    }

    #[test]
    fn alert_prompt_embeds_exact_values() {
        let prompt = alert_prompt(&signals());
        assert!(prompt.contains("- Name: Jules Moreno"));
        assert!(prompt.contains("- Roll Number: STU777"));
        assert!(prompt.contains("- Attendance: 78.5%"));
        assert!(prompt.contains("- Academic Performance: 3.2 "));
        assert!(prompt.contains("- Behavior Notes: No specific notes"));
        assert!(prompt.contains("- Participation Level: low"));
        assert!(prompt.contains("Shows improvement in recent weeks"));
        assert!(prompt.contains("\"confidence_score\""));
    }

    #[test]
    fn insight_prompt_embeds_query_and_analysis() {
        let prompt = insight_prompt("How is math going?", &CrossDomainAnalysis::default()).unwrap();
        assert!(prompt.contains("Parent's Question: How is math going?"));
        assert!(prompt.contains("\"correlations\""));
    }

    #[test]
    fn parses_fenced_alert_array() {
        let raw = format!("```json\n[{VALID_ALERT}]\n```");
        let alerts = parse_alerts(&raw).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].priority, Priority::Medium);
        assert_eq!(alerts[0].category, Category::Attendance);
    }

    #[test]
    fn drops_items_that_fail_validation() {
        let bad_enum = VALID_ALERT.replace("\"medium\"", "\"urgent\"");
        let bad_confidence = VALID_ALERT.replace("0.85", "1.5");
        let extra_field = VALID_ALERT.replace("\"title\"", "\"severity\": 3, \"title\"");
        let raw = format!("[{VALID_ALERT}, {bad_enum}, {bad_confidence}, {extra_field}]");
        assert_eq!(parse_alerts(&raw).unwrap().len(), 1);
    }

    #[test]
    fn missing_reasoning_drops_item() {
        let no_reasoning = VALID_ALERT.replace("78.5% is below 85%", " ");
        assert!(matches!(
            parse_alerts(&format!("[{no_reasoning}]")),
            Err(AdapterFailure::NoValidItems)
        ));
    }

    #[test]
    fn non_array_is_parse_failure() {
        assert!(matches!(parse_alerts(VALID_ALERT), Err(AdapterFailure::Parse(_))));
        assert!(matches!(parse_alerts("Sure! Here are"), Err(AdapterFailure::Parse(_))));
        assert!(matches!(parse_alerts("[]"), Err(AdapterFailure::NoValidItems)));
    }

    #[test]
    fn parses_insight_and_caps_recommendations() {
        let raw = r#"```json
        {"insight": " Steady progress. ", "recommendations": ["a", "", "b", "c", "d", "e", "f"]}
        ```"#;
        let insight = parse_insight(raw).unwrap();
        assert_eq!(insight.narrative, "Steady progress.");
        assert_eq!(insight.recommendations, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn blank_recommendations_get_generic_items() {
        for raw in [
            r#"{"insight": "ok", "recommendations": []}"#,
            r#"{"insight": "ok", "recommendations": ["  ", ""]}"#,
            r#"{"insight": "ok"}"#,
        ] {
            let insight = parse_insight(raw).unwrap();
            assert_eq!(insight.recommendations, GENERIC_RECOMMENDATIONS.to_vec());
        }
    }

    #[test]
    fn empty_insight_is_rejected() {
        assert!(matches!(
            parse_insight(r#"{"insight": "  ", "recommendations": []}"#),
            Err(AdapterFailure::EmptyNarrative)
        ));
        assert!(matches!(
            parse_insight(r#"{"summary": "x"}"#),
            Err(AdapterFailure::Parse(_))
        ));
    }

    #[tokio::test]
    async fn service_errors_become_failures() {
        let adapter = GenerativeAdapter::new(
            Arc::new(ScriptedCompletionClient::failing(CompletionError::Status(500))),
            Duration::from_secs(1),
        );
        let result = adapter.complete_alerts(&signals()).await;
        assert!(matches!(result, Err(AdapterFailure::Service(CompletionError::Status(500)))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let client = ScriptedCompletionClient::always("[]").with_delay(Duration::from_secs(60));
        let adapter = GenerativeAdapter::new(Arc::new(client), Duration::from_secs(2));
        let result = adapter.complete_alerts(&signals()).await;
        assert!(matches!(result, Err(AdapterFailure::Timeout(_))));
    }

    #[tokio::test]
    async fn sends_prompt_and_returns_alerts() {
        let client = Arc::new(ScriptedCompletionClient::always(format!("[{VALID_ALERT}]")));
        let adapter = GenerativeAdapter::new(client.clone(), Duration::from_secs(1));
        let alerts = adapter.complete_alerts(&signals()).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(client.prompts().len(), 1);
        assert!(client.prompts()[0].contains("Jules Moreno"));
    }
}
