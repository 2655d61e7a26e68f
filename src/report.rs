use std::fmt::Write;

use crate::models::{AlertReport, InsightResult, Priority};

pub fn build_alert_report(reports: &[AlertReport]) -> String {
    let mut output = String::new();

    let total: usize = reports.iter().map(|report| report.alerts.len()).sum();
    let high: usize = reports
        .iter()
        .map(|report| report.alerts.summary().high_priority_count)
        .sum();

    let _ = writeln!(output, "# Student Alert Report");
    let _ = writeln!(
        output,
        "{} students, {} alerts ({} high priority)",
        reports.len(),
        total,
        high
    );

    if reports.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No students in this batch.");
        return output;
    }

    for report in reports {
        let summary = report.alerts.summary();
        let _ = writeln!(output);
        let _ = writeln!(output, "## {} ({})", report.student_name, report.roll_id);
        let _ = writeln!(
            output,
            "Generated {} via {}",
            report.generated_at.format("%Y-%m-%d %H:%M UTC"),
            report.source.as_str()
        );
        let _ = writeln!(
            output,
            "- {} alerts, {} high priority, {} need action, avg confidence {:.2}",
            summary.total_alerts,
            summary.high_priority_count,
            summary.action_required_count,
            summary.average_confidence
        );

        if report.alerts.is_empty() {
            let _ = writeln!(output, "No alerts raised.");
            continue;
        }

        for alert in report.alerts.alerts() {
            let marker = if alert.priority == Priority::High { "!" } else { "-" };
            let _ = writeln!(output);
            let _ = writeln!(
                output,
                "### {} [{} {} {}] {}",
                marker,
                alert.priority,
                alert.alert_type,
                alert.category,
                alert.title
            );
            let _ = writeln!(output, "{}", alert.message);
            for suggestion in &alert.suggestions {
                let _ = writeln!(output, "- {suggestion}");
            }
        }
    }

    output
}

pub fn build_insight_report(insight: &InsightResult) -> String {
    let mut output = String::new();
    let sources: Vec<&str> = insight
        .data_sources_used
        .iter()
        .map(|source| source.as_str())
        .collect();

    let _ = writeln!(output, "# Insight for {}", insight.student_id);
    let _ = writeln!(
        output,
        "Confidence {:.2} via {}, data: {}",
        insight.confidence,
        insight.source.as_str(),
        if sources.is_empty() {
            "none".to_string()
        } else {
            sources.join(", ")
        }
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "{}", insight.narrative_text);

    if !insight.correlations.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Patterns");
        for note in &insight.correlations {
            let _ = writeln!(output, "- {note}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    for (index, recommendation) in insight.recommendations.iter().enumerate() {
        let _ = writeln!(output, "{}. {}", index + 1, recommendation);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AlertSet, AlertType, Category, DataSource, GeneratedAlert, GenerationSource,
    };
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn report(alerts: Vec<GeneratedAlert>) -> AlertReport {
        AlertReport {
            student_name: "Asha Rao".to_string(),
            roll_id: "R-12".to_string(),
            alerts: AlertSet::new(alerts),
            source: GenerationSource::RuleBased,
            generated_at: Utc::now(),
        }
    }

    fn attendance_alert() -> GeneratedAlert {
        GeneratedAlert {
            alert_type: AlertType::Error,
            priority: Priority::High,
            category: Category::Attendance,
            title: "Critical Attendance Issue".to_string(),
            message: "Attendance is at 58.0%.".to_string(),
            action_required: true,
            suggestions: vec!["Call home".to_string()],
            reasoning: "below 60".to_string(),
            confidence_score: 0.95,
        }
    }

    #[test]
    fn alert_report_lists_students_and_alerts() {
        let output = build_alert_report(&[report(vec![attendance_alert()])]);
        assert!(output.starts_with("# Student Alert Report"));
        assert!(output.contains("1 students, 1 alerts (1 high priority)"));
        assert!(output.contains("## Asha Rao (R-12)"));
        assert!(output.contains("### ! [high error attendance] Critical Attendance Issue"));
        assert!(output.contains("- Call home"));
        assert!(output.contains("via rule_based"));
    }

    #[test]
    fn alert_report_handles_empty_inputs() {
        assert!(build_alert_report(&[]).contains("No students in this batch."));
        assert!(build_alert_report(&[report(Vec::new())]).contains("No alerts raised."));
    }

    #[test]
    fn insight_report_numbers_recommendations() {
        let insight = InsightResult {
            student_id: "stu-7".to_string(),
            narrative_text: "Attendance is strong.".to_string(),
            recommendations: vec!["Keep routines".to_string(), "Read nightly".to_string()],
            confidence: 0.65,
            data_sources_used: BTreeSet::from([DataSource::Attendance]),
            correlations: Vec::new(),
            source: GenerationSource::RuleBased,
            generated_at: Utc::now(),
        };
        let output = build_insight_report(&insight);
        assert!(output.contains("# Insight for stu-7"));
        assert!(output.contains("Confidence 0.65 via rule_based, data: attendance"));
        assert!(output.contains("1. Keep routines\n2. Read nightly"));
        assert!(!output.contains("## Patterns"));
    }
}
