// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Score records and response validation
//!
//! The scoring service replies with a single JSON object, sometimes wrapped in
//! a Markdown code fence. [`ScoreRecord::from_response`] unwraps it and checks
//! every dimension is present and in range; anything else is rejected as
//! [`ScoringError::Malformed`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ScoringError;

/// Upper bound of each sub-score
pub const DIMENSION_MAX: f64 = 10.0;

/// Upper bound of the overall score
pub const OVERALL_MAX: f64 = 100.0;

/// One of the five scored dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// How effectively AI tooling was used
    AiUtilization,
    /// Effect on maintainability and correctness
    CodeQualityImpact,
    /// How quickly the change moved from first commit to merge
    DeliveryVelocity,
    /// Novelty of the approach
    InnovationLevel,
    /// Evidence of collaboration and review
    TeamCollaboration,
}

impl Dimension {
    /// All dimensions in rubric order
    pub const ALL: [Dimension; 5] = [
        Dimension::AiUtilization,
        Dimension::CodeQualityImpact,
        Dimension::DeliveryVelocity,
        Dimension::InnovationLevel,
        Dimension::TeamCollaboration,
    ];

    /// JSON field name in the scorer reply
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Self::AiUtilization => "ai_utilization",
            Self::CodeQualityImpact => "code_quality_impact",
            Self::DeliveryVelocity => "delivery_velocity",
            Self::InnovationLevel => "innovation_level",
            Self::TeamCollaboration => "team_collaboration",
        }
    }

    /// Weight in percent; the weights sum to 100
    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            Self::AiUtilization | Self::CodeQualityImpact => 25,
            Self::DeliveryVelocity => 20,
            Self::InnovationLevel | Self::TeamCollaboration => 15,
        }
    }
}

/// A validated score for one merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// AI Utilization, 0-10
    pub ai_utilization: f64,
    /// Code Quality Impact, 0-10
    pub code_quality_impact: f64,
    /// Delivery Velocity, 0-10
    pub delivery_velocity: f64,
    /// Innovation Level, 0-10
    pub innovation_level: f64,
    /// Team Collaboration, 0-10
    pub team_collaboration: f64,
    /// Overall score, 0-100
    pub overall_score: f64,
    /// Free-text rationale
    pub rationale: String,
}

impl ScoreRecord {
    /// Parse and validate a raw scorer reply
    ///
    /// # Errors
    ///
    /// Returns `ScoringError::Malformed` when the reply is not a JSON object,
    /// or when any field is missing, non-numeric, non-finite or out of range.
    pub fn from_response(raw: &str) -> Result<Self, ScoringError> {
        let body = strip_code_fence(raw);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ScoringError::malformed(format!("invalid JSON: {e}")))?;
        let Value::Object(object) = value else {
            return Err(ScoringError::malformed("expected a JSON object"));
        };

        let rationale = match object.get("rationale") {
            Some(Value::String(text)) => text.clone(),
            Some(_) => return Err(ScoringError::malformed("`rationale` is not a string")),
            None => return Err(ScoringError::malformed("missing field `rationale`")),
        };

        let record = Self {
            ai_utilization: dimension(&object, Dimension::AiUtilization)?,
            code_quality_impact: dimension(&object, Dimension::CodeQualityImpact)?,
            delivery_velocity: dimension(&object, Dimension::DeliveryVelocity)?,
            innovation_level: dimension(&object, Dimension::InnovationLevel)?,
            team_collaboration: dimension(&object, Dimension::TeamCollaboration)?,
            overall_score: bounded(&object, "overall_score", OVERALL_MAX)?,
            rationale,
        };
        Ok(record)
    }

    /// Sub-score for `dim`
    #[must_use]
    pub fn get(&self, dim: Dimension) -> f64 {
        match dim {
            Dimension::AiUtilization => self.ai_utilization,
            Dimension::CodeQualityImpact => self.code_quality_impact,
            Dimension::DeliveryVelocity => self.delivery_velocity,
            Dimension::InnovationLevel => self.innovation_level,
            Dimension::TeamCollaboration => self.team_collaboration,
        }
    }

    /// Overall score recomputed from the sub-scores with the rubric weights
    ///
    /// The service reports its own `overall_score`; this is the reference
    /// value the rubric asks it to produce.
    #[must_use]
    pub fn weighted_overall(&self) -> f64 {
        Dimension::ALL
            .iter()
            .map(|&d| self.get(d) * f64::from(d.weight()) / 100.0)
            .sum::<f64>()
            * 10.0
    }
}

/// Remove a surrounding Markdown code fence (```json or ```), if any
#[must_use]
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (e.g. "json") on the opening line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn dimension(object: &Map<String, Value>, dim: Dimension) -> Result<f64, ScoringError> {
    bounded(object, dim.field(), DIMENSION_MAX)
}

fn bounded(object: &Map<String, Value>, field: &str, max: f64) -> Result<f64, ScoringError> {
    let value = object
        .get(field)
        .ok_or_else(|| ScoringError::malformed(format!("missing field `{field}`")))?;
    let number = value
        .as_f64()
        .ok_or_else(|| ScoringError::malformed(format!("`{field}` is not a number")))?;
    if !number.is_finite() {
        return Err(ScoringError::malformed(format!("`{field}` is not finite")));
    }
    if !(0.0..=max).contains(&number) {
        return Err(ScoringError::malformed(format!(
            "`{field}` = {number} is outside 0-{max}"
        )));
    }
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    const VALID: &str = r#"{
        "ai_utilization": 7,
        "code_quality_impact": 8,
        "delivery_velocity": 6.5,
        "innovation_level": 5,
        "team_collaboration": 9,
        "overall_score": 72,
        "rationale": "Solid change with good review."
    }"#;

    #[test]
    fn test_parse_valid_response() {
        let record = ScoreRecord::from_response(VALID).expect("valid");
        assert_eq!(record.ai_utilization, 7.0);
        assert_eq!(record.delivery_velocity, 6.5);
        assert_eq!(record.overall_score, 72.0);
        assert_eq!(record.rationale, "Solid change with good review.");
    }

    #[test]
    fn test_parse_fenced_response() {
        let fenced = format!("```json\n{VALID}\n```");
        let record = ScoreRecord::from_response(&fenced).expect("fenced");
        assert_eq!(record.team_collaboration, 9.0);

        let bare_fence = format!("```\n{VALID}\n```");
        assert!(ScoreRecord::from_response(&bare_fence).is_ok());
    }

    #[test]
    fn test_missing_overall_score_is_malformed() {
        let raw = VALID.replace("\"overall_score\": 72,", "");
        let err = ScoreRecord::from_response(&raw).unwrap_err();
        assert!(matches!(err, ScoringError::Malformed { .. }));
        assert!(err.to_string().contains("overall_score"));
    }

    #[test]
    fn test_out_of_range_is_malformed() {
        let raw = VALID.replace("\"innovation_level\": 5", "\"innovation_level\": 11");
        assert!(matches!(
            ScoreRecord::from_response(&raw),
            Err(ScoringError::Malformed { .. })
        ));

        let raw = VALID.replace("\"overall_score\": 72", "\"overall_score\": -1");
        assert!(ScoreRecord::from_response(&raw).is_err());
    }

    #[test]
    fn test_non_numeric_is_malformed() {
        let raw = VALID.replace("\"ai_utilization\": 7", "\"ai_utilization\": \"high\"");
        let err = ScoreRecord::from_response(&raw).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn test_missing_rationale_is_malformed() {
        let raw = VALID.replace(",\n        \"rationale\": \"Solid change with good review.\"", "");
        assert!(ScoreRecord::from_response(&raw).is_err());
    }

    #[test]
    fn test_not_an_object() {
        assert!(ScoreRecord::from_response("[1, 2, 3]").is_err());
        assert!(ScoreRecord::from_response("I think this PR is great").is_err());
        assert!(ScoreRecord::from_response("").is_err());
    }

    #[test]
    fn test_boundaries_accepted() {
        let raw = r#"{"ai_utilization": 0, "code_quality_impact": 10,
            "delivery_velocity": 0, "innovation_level": 10, "team_collaboration": 0,
            "overall_score": 100, "rationale": ""}"#;
        let record = ScoreRecord::from_response(raw).expect("boundaries are inclusive");
        assert_eq!(record.overall_score, 100.0);
    }

    #[test]
    fn test_weights_sum_to_100() {
        let total: u32 = Dimension::ALL.iter().map(|d| d.weight()).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_weighted_overall() {
        let record = ScoreRecord::from_response(VALID).expect("valid");
        // (7*25 + 8*25 + 6.5*20 + 5*15 + 9*15) / 100 * 10
        let expected = (175.0 + 200.0 + 130.0 + 75.0 + 135.0) / 10.0;
        assert!((record.weighted_overall() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("  {}  "), "{}");
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```{}```"), "{}");
    }
}
