use std::io::Read;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::models::{ParticipationLevel, StudentSignals};

#[derive(Debug, Deserialize)]
struct CsvRow {
    name: String,
    roll_id: String,
    attendance_percentage: f64,
    academic_performance: f64,
    #[serde(default)]
    participation_level: Option<String>,
    #[serde(default)]
    behavior_notes: Option<String>,
    #[serde(default)]
    additional_comments: Option<String>,
}

impl CsvRow {
    fn into_signals(self) -> anyhow::Result<StudentSignals> {
        let participation_level = match self.participation_level.as_deref().map(str::trim) {
            None | Some("") => ParticipationLevel::default(),
            Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
        };

        Ok(StudentSignals {
            student_name: self.name,
            roll_id: self.roll_id,
            attendance_percentage: self.attendance_percentage,
            academic_performance: self.academic_performance,
            behavior_notes: self.behavior_notes.unwrap_or_default(),
            participation_level,
            additional_comments: self.additional_comments.unwrap_or_default(),
        })
    }
}

pub fn read_signals(path: &Path) -> anyhow::Result<Vec<StudentSignals>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_signals_from(file).with_context(|| format!("failed to import {}", path.display()))
}

/// Rows are numbered from 1, excluding the header line.
pub fn read_signals_from<R: Read>(input: R) -> anyhow::Result<Vec<StudentSignals>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let mut signals = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row_number = index + 1;
        let row = result.with_context(|| format!("row {row_number} is malformed"))?;
        let student = row
            .into_signals()
            .with_context(|| format!("row {row_number} has an invalid participation level"))?;
        signals.push(student);
    }

    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "name,roll_id,attendance_percentage,academic_performance,participation_level,behavior_notes,additional_comments\n";

    #[test]
    fn reads_full_rows() {
        let data = format!(
            "{HEADER}Asha Rao,R-12,58,45,low,Often disruptive in class,Needs follow up\n\
             Ben Cole,R-13,97,3.8,High,,\n"
        );
        let signals = read_signals_from(data.as_bytes()).unwrap();

        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].student_name, "Asha Rao");
        assert_eq!(signals[0].participation_level, ParticipationLevel::Low);
        assert_eq!(signals[0].behavior_notes, "Often disruptive in class");
        assert_eq!(signals[1].academic_performance, 3.8);
        assert_eq!(signals[1].participation_level, ParticipationLevel::High);
        assert!(signals[1].behavior_notes.is_empty());
    }

    #[test]
    fn blank_participation_defaults_to_medium() {
        let data = format!("{HEADER}Cara Diaz,R-14,88,72,,,\n");
        let signals = read_signals_from(data.as_bytes()).unwrap();
        assert_eq!(signals[0].participation_level, ParticipationLevel::Medium);
    }

    #[test]
    fn optional_columns_may_be_omitted() {
        let data = "name,roll_id,attendance_percentage,academic_performance\nDev Shah,R-15,91,80\n";
        let signals = read_signals_from(data.as_bytes()).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].participation_level, ParticipationLevel::Medium);
        assert!(signals[0].additional_comments.is_empty());
    }

    #[test]
    fn malformed_row_reports_its_number() {
        let data = format!("{HEADER}Asha Rao,R-12,58,45,low,,\nBen Cole,R-13,lots,3.8,high,,\n");
        let err = read_signals_from(data.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("row 2"));
    }

    #[test]
    fn unknown_participation_is_rejected() {
        let data = format!("{HEADER}Asha Rao,R-12,58,45,sometimes,,\n");
        let err = read_signals_from(data.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("row 1"));
    }
}
