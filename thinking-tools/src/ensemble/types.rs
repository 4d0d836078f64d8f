//! Ensemble session data model

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{EnsembleError, EnsembleResult};

/// A fixed reasoning perspective an agent adopts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLens {
    Analytical,
    Skeptical,
    Creative,
    Pragmatic,
    Ethical,
}

impl AgentLens {
    pub const ALL: [AgentLens; 5] = [
        AgentLens::Analytical,
        AgentLens::Skeptical,
        AgentLens::Creative,
        AgentLens::Pragmatic,
        AgentLens::Ethical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentLens::Analytical => "analytical",
            AgentLens::Skeptical => "skeptical",
            AgentLens::Creative => "creative",
            AgentLens::Pragmatic => "pragmatic",
            AgentLens::Ethical => "ethical",
        }
    }

    /// What this lens pays attention to.
    pub fn focus(&self) -> &'static str {
        match self {
            AgentLens::Analytical => "Data-driven, logical decomposition, systematic analysis",
            AgentLens::Skeptical => "Critical examination, identifying flaws, risk assessment",
            AgentLens::Creative => "Novel solutions, lateral thinking, unconventional approaches",
            AgentLens::Pragmatic => {
                "Feasibility, resources, implementation, real-world constraints"
            }
            AgentLens::Ethical => "Values, fairness, long-term impact, stakeholder effects",
        }
    }

    /// The blind spot this lens should watch for.
    pub fn bias_check(&self) -> &'static str {
        match self {
            AgentLens::Analytical => "May overlook human factors and edge cases",
            AgentLens::Skeptical => "May be overly negative, miss opportunities",
            AgentLens::Creative => "May propose impractical or risky ideas",
            AgentLens::Pragmatic => "May be too conservative, miss innovation",
            AgentLens::Ethical => "May prioritize ideals over practicality",
        }
    }

    pub fn description(&self) -> LensDescription {
        LensDescription {
            focus: self.focus(),
            bias_check: self.bias_check(),
        }
    }
}

impl fmt::Display for AgentLens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentLens {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentLens::ALL
            .into_iter()
            .find(|lens| lens.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LensDescription {
    pub focus: &'static str,
    pub bias_check: &'static str,
}

/// A negative endorsement that came with an explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub from_agent: AgentLens,
    pub concern: String,
    pub level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    pub thought_id: u64,
    pub thought: String,
    pub agent_lens: AgentLens,
    #[serde(default)]
    pub builds_on: Vec<u64>,
    pub weight: f64,
    #[serde(default)]
    pub endorsements: BTreeMap<AgentLens, f64>,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
    pub timestamp: DateTime<Utc>,
}

impl Thought {
    /// A thought awaiting an id. Weight is clamped to `[0, 1]`.
    pub fn new(agent_lens: AgentLens, thought: impl Into<String>, builds_on: Vec<u64>, weight: f64) -> Self {
        Self {
            thought_id: 0,
            thought: thought.into(),
            agent_lens,
            builds_on,
            weight: clamp_unit(weight),
            endorsements: BTreeMap::new(),
            challenges: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set or overwrite an endorsement. Returns the stored (clamped) level.
    pub fn endorse(&mut self, from: AgentLens, level: f64, note: Option<&str>) -> f64 {
        let level = clamp_signed(level);
        self.endorsements.insert(from, level);
        if let Some(note) = note.filter(|n| !n.is_empty()) {
            if level < 0.0 {
                self.challenges.push(Challenge {
                    from_agent: from,
                    concern: note.to_string(),
                    level,
                });
            }
        }
        level
    }

    pub fn mean_endorsement(&self) -> Option<f64> {
        if self.endorsements.is_empty() {
            return None;
        }
        Some(self.endorsements.values().sum::<f64>() / self.endorsements.len() as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationProposal {
    pub proposal_id: u64,
    pub proposing_agent: AgentLens,
    pub integration: String,
    pub reconciles: Vec<u64>,
    #[serde(default)]
    pub endorsements: BTreeMap<AgentLens, f64>,
    pub timestamp: DateTime<Utc>,
}

impl IntegrationProposal {
    pub fn new(proposing_agent: AgentLens, integration: impl Into<String>, reconciles: Vec<u64>) -> Self {
        Self {
            proposal_id: 0,
            proposing_agent,
            integration: integration.into(),
            reconciles,
            endorsements: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Per-session capacity limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_thoughts: usize,
    pub max_thoughts_per_agent: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_thoughts: 1000,
            max_thoughts_per_agent: 50,
        }
    }
}

/// A collaborative reasoning session.
///
/// Thought ids start at 1 and increase by one per accepted thought; proposal
/// ids run on their own counter. The id and agent indices are rebuilt as
/// thoughts are added and are never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct EnsembleSession {
    pub session_id: String,
    pub problem: String,
    pub agent_lenses: Vec<AgentLens>,
    pub(crate) thoughts: Vec<Thought>,
    integrations: Vec<IntegrationProposal>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    thought_index: HashMap<u64, usize>,
    #[serde(skip)]
    agent_thoughts: HashMap<AgentLens, Vec<u64>>,
    #[serde(skip)]
    next_thought_id: u64,
    #[serde(skip)]
    next_proposal_id: u64,
    #[serde(skip)]
    limits: SessionLimits,
}

impl EnsembleSession {
    pub fn new(
        session_id: impl Into<String>,
        problem: impl Into<String>,
        agent_lenses: Vec<AgentLens>,
        limits: SessionLimits,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            problem: problem.into(),
            agent_lenses,
            thoughts: Vec::new(),
            integrations: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            thought_index: HashMap::new(),
            agent_thoughts: HashMap::new(),
            next_thought_id: 1,
            next_proposal_id: 1,
            limits,
        }
    }

    pub fn has_agent(&self, agent: AgentLens) -> bool {
        self.agent_lenses.contains(&agent)
    }

    /// Check capacity for one more thought from `agent` without mutating.
    pub fn check_capacity(&self, agent: AgentLens) -> EnsembleResult<()> {
        if self.thoughts.len() >= self.limits.max_thoughts {
            return Err(EnsembleError::SessionCapacityExceeded {
                max: self.limits.max_thoughts,
            });
        }
        let agent_count = self.agent_thoughts.get(&agent).map_or(0, Vec::len);
        if agent_count >= self.limits.max_thoughts_per_agent {
            return Err(EnsembleError::AgentCapacityExceeded {
                agent: agent.to_string(),
                max: self.limits.max_thoughts_per_agent,
            });
        }
        Ok(())
    }

    /// Append a thought, assigning the next id.
    ///
    /// Only capacity is enforced here; reference validation belongs to the
    /// store so that analyzers can be exercised on arbitrary graphs.
    pub fn add_thought(&mut self, mut thought: Thought) -> EnsembleResult<u64> {
        self.check_capacity(thought.agent_lens)?;

        let id = self.next_thought_id;
        self.next_thought_id += 1;
        thought.thought_id = id;

        self.agent_thoughts
            .entry(thought.agent_lens)
            .or_default()
            .push(id);
        self.thought_index.insert(id, self.thoughts.len());
        self.thoughts.push(thought);
        Ok(id)
    }

    pub fn add_integration(&mut self, mut proposal: IntegrationProposal) -> u64 {
        let id = self.next_proposal_id;
        self.next_proposal_id += 1;
        proposal.proposal_id = id;
        self.integrations.push(proposal);
        id
    }

    pub fn get_thought(&self, thought_id: u64) -> Option<&Thought> {
        self.thought_index
            .get(&thought_id)
            .and_then(|&idx| self.thoughts.get(idx))
    }

    pub fn get_thought_mut(&mut self, thought_id: u64) -> Option<&mut Thought> {
        let idx = *self.thought_index.get(&thought_id)?;
        self.thoughts.get_mut(idx)
    }

    /// Thoughts by `agent`, in contribution order.
    pub fn agent_thoughts(&self, agent: AgentLens) -> Vec<&Thought> {
        self.agent_thoughts
            .get(&agent)
            .map(|ids| ids.iter().filter_map(|id| self.get_thought(*id)).collect())
            .unwrap_or_default()
    }

    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
    }

    pub fn integrations(&self) -> &[IntegrationProposal] {
        &self.integrations
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 1.0;
    }
    value.clamp(0.0, 1.0)
}

pub(crate) fn clamp_signed(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(limits: SessionLimits) -> EnsembleSession {
        EnsembleSession::new(
            "s-1",
            "problem",
            vec![AgentLens::Analytical, AgentLens::Skeptical],
            limits,
        )
    }

    #[test]
    fn test_lens_parse_round_trip() {
        for lens in AgentLens::ALL {
            assert_eq!(lens.as_str().parse::<AgentLens>().unwrap(), lens);
        }
        assert_eq!("mystic".parse::<AgentLens>().unwrap_err(), "mystic");
        assert!(AgentLens::Skeptical.focus().contains("risk"));
    }

    #[test]
    fn test_ids_are_contiguous_from_one() {
        let mut s = session(SessionLimits::default());
        for expected in 1..=4 {
            let id = s
                .add_thought(Thought::new(AgentLens::Analytical, "t", vec![], 1.0))
                .unwrap();
            assert_eq!(id, expected);
        }
        assert_eq!(s.add_integration(IntegrationProposal::new(AgentLens::Skeptical, "i", vec![1])), 1);
        assert_eq!(s.get_thought(3).unwrap().thought_id, 3);
        assert!(s.get_thought(5).is_none());
    }

    #[test]
    fn test_capacity_limits() {
        let mut s = session(SessionLimits {
            max_thoughts: 3,
            max_thoughts_per_agent: 2,
        });
        s.add_thought(Thought::new(AgentLens::Analytical, "a", vec![], 1.0)).unwrap();
        s.add_thought(Thought::new(AgentLens::Analytical, "b", vec![], 1.0)).unwrap();
        let err = s
            .add_thought(Thought::new(AgentLens::Analytical, "c", vec![], 1.0))
            .unwrap_err();
        assert!(matches!(err, EnsembleError::AgentCapacityExceeded { max: 2, .. }));

        s.add_thought(Thought::new(AgentLens::Skeptical, "d", vec![], 1.0)).unwrap();
        let err = s
            .add_thought(Thought::new(AgentLens::Skeptical, "e", vec![], 1.0))
            .unwrap_err();
        assert_eq!(err, EnsembleError::SessionCapacityExceeded { max: 3 });
        assert_eq!(s.thoughts().len(), 3);
    }

    #[test]
    fn test_agent_index_preserves_order() {
        let mut s = session(SessionLimits::default());
        s.add_thought(Thought::new(AgentLens::Analytical, "first", vec![], 1.0)).unwrap();
        s.add_thought(Thought::new(AgentLens::Skeptical, "other", vec![], 1.0)).unwrap();
        s.add_thought(Thought::new(AgentLens::Analytical, "second", vec![1], 1.0)).unwrap();

        let texts: Vec<_> = s
            .agent_thoughts(AgentLens::Analytical)
            .iter()
            .map(|t| t.thought.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(s.agent_thoughts(AgentLens::Ethical).is_empty());
    }

    #[test]
    fn test_endorse_clamps_and_records_challenge() {
        let mut t = Thought::new(AgentLens::Analytical, "x", vec![], 3.0);
        assert_eq!(t.weight, 1.0);

        assert_eq!(t.endorse(AgentLens::Skeptical, -4.0, Some("too risky")), -1.0);
        assert_eq!(t.challenges.len(), 1);
        assert_eq!(t.challenges[0].concern, "too risky");

        // Overwrite, positive levels never record a challenge
        t.endorse(AgentLens::Skeptical, 0.8, Some("convinced now"));
        assert_eq!(t.endorsements.len(), 1);
        assert_eq!(t.endorsements[&AgentLens::Skeptical], 0.8);
        assert_eq!(t.challenges.len(), 1);
    }

    #[test]
    fn test_session_serializes_without_indices() {
        let mut s = session(SessionLimits::default());
        s.add_thought(Thought::new(AgentLens::Analytical, "a", vec![], 0.5)).unwrap();
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["session_id"], "s-1");
        assert_eq!(v["agent_lenses"][1], "skeptical");
        assert_eq!(v["thoughts"][0]["thought_id"], 1);
        assert!(v.get("thought_index").is_none());
        assert!(v["completed_at"].is_null());
    }
}
