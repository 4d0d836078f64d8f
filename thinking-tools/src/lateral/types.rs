//! Lateral session model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a divergent concept was bridged back to the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// X is like Y because...
    Analogy,
    /// X is opposite to Y in that...
    Contrast,
    Causal,
    Metaphor,
    /// Shared structure or pattern
    Structural,
    /// Forced connection with no clear basis
    Arbitrary,
    /// Needs a `connection_type_detail`
    Other,
}

impl ConnectionType {
    pub const ALL: [ConnectionType; 7] = [
        ConnectionType::Analogy,
        ConnectionType::Contrast,
        ConnectionType::Causal,
        ConnectionType::Metaphor,
        ConnectionType::Structural,
        ConnectionType::Arbitrary,
        ConnectionType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Analogy => "analogy",
            ConnectionType::Contrast => "contrast",
            ConnectionType::Causal => "causal",
            ConnectionType::Metaphor => "metaphor",
            ConnectionType::Structural => "structural",
            ConnectionType::Arbitrary => "arbitrary",
            ConnectionType::Other => "other",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.as_str()).collect()
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptSynthesis {
    pub divergent_concept: String,
    pub connection_type: ConnectionType,
    pub connection_type_detail: Option<String>,
    pub confidence: f64,
    pub insight: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReflection {
    pub most_valuable_insight: String,
    pub why_valuable: String,
    pub surprising_connections: Vec<String>,
    pub overall_rating: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateralSession {
    pub session_id: String,
    pub origin: String,
    #[serde(default)]
    pub divergent_concepts: Vec<String>,
    #[serde(default)]
    pub syntheses: Vec<ConceptSynthesis>,
    #[serde(default)]
    pub reflection: Option<SessionReflection>,
    pub method: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl LateralSession {
    pub fn new(origin: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            origin: origin.into(),
            divergent_concepts: Vec::new(),
            syntheses: Vec::new(),
            reflection: None,
            method: method.into(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Concepts still waiting for a synthesis, in generation order.
    ///
    /// A concept drawn twice needs two syntheses.
    pub fn remaining_concepts(&self) -> Vec<String> {
        let mut done: Vec<&str> = self
            .syntheses
            .iter()
            .map(|s| s.divergent_concept.as_str())
            .collect();
        let mut remaining = Vec::new();
        for concept in &self.divergent_concepts {
            match done.iter().position(|d| *d == concept.as_str()) {
                Some(i) => {
                    done.swap_remove(i);
                }
                None => remaining.push(concept.clone()),
            }
        }
        remaining
    }

    pub fn is_synthesis_complete(&self) -> bool {
        !self.divergent_concepts.is_empty() && self.remaining_concepts().is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.is_synthesis_complete() && self.reflection.is_some()
    }

    /// Drop everything derived from the divergent concepts.
    pub fn reset_divergence(&mut self) {
        self.divergent_concepts.clear();
        self.syntheses.clear();
        self.reflection = None;
        self.completed_at = None;
    }

    /// Origin cut to `max` chars with an ellipsis.
    pub fn origin_preview(&self, max: usize) -> String {
        if self.origin.chars().count() > max {
            let head: String = self.origin.chars().take(max).collect();
            format!("{}...", head)
        } else {
            self.origin.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesis(concept: &str) -> ConceptSynthesis {
        ConceptSynthesis {
            divergent_concept: concept.to_string(),
            connection_type: ConnectionType::Analogy,
            connection_type_detail: None,
            confidence: 0.5,
            insight: "x".to_string(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_connection_type_parse() {
        assert_eq!("Metaphor".parse::<ConnectionType>(), Ok(ConnectionType::Metaphor));
        assert!("sideways".parse::<ConnectionType>().is_err());
        assert_eq!(ConnectionType::names().len(), 7);
    }

    #[test]
    fn test_remaining_counts_duplicates() {
        let mut session = LateralSession::new("origin", "random");
        assert!(!session.is_synthesis_complete());

        session.divergent_concepts = vec!["prism".into(), "tide".into(), "prism".into()];
        session.syntheses.push(synthesis("prism"));
        assert_eq!(session.remaining_concepts(), vec!["tide", "prism"]);

        session.syntheses.push(synthesis("prism"));
        session.syntheses.push(synthesis("tide"));
        assert!(session.is_synthesis_complete());
        assert!(!session.is_complete());
    }

    #[test]
    fn test_origin_preview() {
        let session = LateralSession::new("a".repeat(120), "random");
        assert_eq!(session.origin_preview(100).chars().count(), 103);
        assert_eq!(LateralSession::new("short", "random").origin_preview(100), "short");
    }
}
