//! Convergence analysis
//!
//! Pure, read-only views over an [`EnsembleSession`]:
//!
//! - **consensus**: thoughts whose mean endorsement clears a threshold
//! - **tensions**: thoughts with both strong support and strong challenge
//! - **convergence score**: share of all endorsements that are positive
//! - **cycles**: circular `builds_on` chains
//! - **convergence map**: a fixed plain-text report of the above

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use super::config::Thresholds;
use super::types::{AgentLens, Challenge, EnsembleSession};

/// Characters of thought text quoted in reports
const EXCERPT_CHARS: usize = 100;
/// Characters of a challenge quoted in the map
const CONCERN_EXCERPT_CHARS: usize = 80;
/// Challenges listed per tension in the map
const MAP_CHALLENGES_PER_TENSION: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusThought {
    pub thought_id: u64,
    pub agent: AgentLens,
    pub thought: String,
    pub agreement: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsensusReport {
    pub consensus_thoughts: Vec<ConsensusThought>,
    /// Flat mean over every endorsement value in the session
    pub avg_agreement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tension {
    pub thought_id: u64,
    pub agent: AgentLens,
    pub thought: String,
    pub supporters: usize,
    pub challengers: usize,
    pub challenges: Vec<Challenge>,
}

/// Everything `synthesize_convergence` reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Synthesis {
    pub session_id: String,
    pub convergence_score: f64,
    pub consensus: ConsensusReport,
    pub tensions: Vec<Tension>,
    pub circular_reasoning: Vec<Vec<u64>>,
    pub total_thoughts: usize,
    pub agent_contributions: BTreeMap<AgentLens, usize>,
}

pub fn calculate_consensus(session: &EnsembleSession, threshold: f64) -> ConsensusReport {
    let thoughts = session.thoughts();
    if thoughts.len() < 2 {
        return ConsensusReport::default();
    }

    let mut consensus_thoughts = Vec::new();
    let mut sum = 0.0;
    let mut count = 0usize;

    for thought in thoughts {
        let Some(mean) = thought.mean_endorsement() else {
            continue;
        };
        sum += thought.endorsements.values().sum::<f64>();
        count += thought.endorsements.len();

        if mean >= threshold {
            consensus_thoughts.push(ConsensusThought {
                thought_id: thought.thought_id,
                agent: thought.agent_lens,
                thought: excerpt(&thought.thought, EXCERPT_CHARS),
                agreement: round2(mean),
            });
        }
    }

    let avg_agreement = if count == 0 { 0.0 } else { sum / count as f64 };
    ConsensusReport {
        consensus_thoughts,
        avg_agreement: round2(avg_agreement),
    }
}

pub fn identify_tensions(session: &EnsembleSession, thresholds: Thresholds) -> Vec<Tension> {
    session
        .thoughts()
        .iter()
        .filter_map(|thought| {
            let supporters = thought
                .endorsements
                .values()
                .filter(|&&v| v >= thresholds.positive)
                .count();
            let challengers = thought
                .endorsements
                .values()
                .filter(|&&v| v <= thresholds.negative)
                .count();
            (supporters > 0 && challengers > 0).then(|| Tension {
                thought_id: thought.thought_id,
                agent: thought.agent_lens,
                thought: excerpt(&thought.thought, EXCERPT_CHARS),
                supporters,
                challengers,
                challenges: thought.challenges.clone(),
            })
        })
        .collect()
}

/// Share of endorsements at or above the positive threshold.
///
/// Returns 0.0 for sessions with fewer than three thoughts or no
/// endorsements at all.
pub fn compute_convergence_score(session: &EnsembleSession, positive_threshold: f64) -> f64 {
    if session.thoughts().len() < 3 {
        return 0.0;
    }
    let (total, positive) = session
        .thoughts()
        .iter()
        .flat_map(|t| t.endorsements.values())
        .fold((0usize, 0usize), |(total, positive), &v| {
            (total + 1, positive + usize::from(v >= positive_threshold))
        });
    if total == 0 {
        0.0
    } else {
        positive as f64 / total as f64
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Visiting,
    Done,
}

/// Find circular `builds_on` chains.
///
/// Iterative depth-first search with an explicit `(node, next_child)` stack
/// so deep chains cannot overflow the call stack. Each cycle is rotated to
/// start at its smallest id; the result is de-duplicated and sorted.
pub fn detect_cycles(session: &EnsembleSession) -> Vec<Vec<u64>> {
    let mut color: HashMap<u64, Color> = HashMap::new();
    let mut parent: HashMap<u64, u64> = HashMap::new();
    let mut cycles: BTreeSet<Vec<u64>> = BTreeSet::new();

    for start in session.thoughts().iter().map(|t| t.thought_id) {
        if color.contains_key(&start) {
            continue;
        }
        color.insert(start, Color::Visiting);
        parent.remove(&start);

        let mut stack: Vec<(u64, usize)> = vec![(start, 0)];
        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            let deps = dependencies(session, node);
            if next >= deps.len() {
                color.insert(node, Color::Done);
                stack.pop();
                continue;
            }
            top.1 += 1;
            let dep = deps[next];

            match color.get(&dep) {
                None => {
                    parent.insert(dep, node);
                    color.insert(dep, Color::Visiting);
                    stack.push((dep, 0));
                }
                Some(Color::Visiting) => {
                    // Back edge: walk parents from `node` back to `dep`
                    let mut cycle = vec![dep];
                    let mut cur = node;
                    while cur != dep {
                        cycle.push(cur);
                        match parent.get(&cur) {
                            Some(&p) => cur = p,
                            None => break,
                        }
                    }
                    if cur == dep {
                        cycle.reverse();
                        cycles.insert(normalize_cycle(cycle));
                    }
                }
                Some(Color::Done) => {}
            }
        }
    }

    cycles.into_iter().collect()
}

fn dependencies(session: &EnsembleSession, id: u64) -> &[u64] {
    session
        .get_thought(id)
        .map(|t| t.builds_on.as_slice())
        .unwrap_or(&[])
}

fn normalize_cycle(mut cycle: Vec<u64>) -> Vec<u64> {
    if let Some(min_pos) = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(pos, _)| pos)
    {
        cycle.rotate_left(min_pos);
    }
    cycle
}

/// Run every analysis and bundle the results.
pub fn synthesize(session: &EnsembleSession, threshold: f64, thresholds: Thresholds) -> Synthesis {
    let agent_contributions = session
        .agent_lenses
        .iter()
        .map(|&lens| (lens, session.agent_thoughts(lens).len()))
        .collect();

    Synthesis {
        session_id: session.session_id.clone(),
        convergence_score: round2(compute_convergence_score(session, thresholds.positive)),
        consensus: calculate_consensus(session, threshold),
        tensions: identify_tensions(session, thresholds),
        circular_reasoning: detect_cycles(session),
        total_thoughts: session.thoughts().len(),
        agent_contributions,
    }
}

/// Render the plain-text convergence map.
pub fn format_convergence_map(
    session: &EnsembleSession,
    consensus: &ConsensusReport,
    tensions: &[Tension],
    convergence: f64,
) -> String {
    let rule = "=".repeat(80);
    let agents: Vec<&str> = session.agent_lenses.iter().map(AgentLens::as_str).collect();

    let mut lines = vec![
        rule.clone(),
        "ENSEMBLE CONVERGENCE MAP".to_string(),
        rule.clone(),
        format!("Problem: {}", session.problem),
        format!("Agents: {}", agents.join(", ")),
        format!("Thoughts: {}", session.thoughts().len()),
        format!("Convergence Score: {:.2}", convergence),
        String::new(),
        "--- CONSENSUS AREAS ---".to_string(),
    ];

    if consensus.consensus_thoughts.is_empty() {
        lines.push("(No strong consensus yet)".to_string());
    } else {
        for item in &consensus.consensus_thoughts {
            lines.push(format!(
                "[CONSENSUS] [{}] {}... (agreement: {})",
                item.agent,
                item.thought,
                display_float(item.agreement)
            ));
        }
    }

    lines.push(String::new());
    lines.push("--- PRODUCTIVE TENSIONS ---".to_string());

    if tensions.is_empty() {
        lines.push("(No major disagreements)".to_string());
    } else {
        for tension in tensions {
            lines.push(format!("[TENSION] [{}] {}...", tension.agent, tension.thought));
            lines.push(format!(
                "   {} support, {} challenge",
                tension.supporters, tension.challengers
            ));
            for challenge in tension.challenges.iter().take(MAP_CHALLENGES_PER_TENSION) {
                lines.push(format!(
                    "   - {}: {}...",
                    challenge.from_agent,
                    excerpt(&challenge.concern, CONCERN_EXCERPT_CHARS)
                ));
            }
        }
    }

    lines.push(String::new());
    lines.push("--- AGENT CONTRIBUTIONS ---".to_string());

    for &lens in &session.agent_lenses {
        let thoughts = session.agent_thoughts(lens);
        let avg_weight = if thoughts.is_empty() {
            0.0
        } else {
            thoughts.iter().map(|t| t.weight).sum::<f64>() / thoughts.len() as f64
        };
        lines.push(format!(
            "{}: {} thoughts, avg weight: {:.2}",
            lens,
            thoughts.len(),
            avg_weight
        ));
    }

    lines.push(String::new());
    lines.push(rule);
    lines.join("\n")
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// First `max` characters (not bytes) of `text`.
pub(crate) fn excerpt(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Whole numbers keep one decimal place (`1.0`, not `1`).
fn display_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
