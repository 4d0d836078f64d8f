//! Ensemble session store
//!
//! Owns every session, tracks which one is current, and applies all
//! validation before touching session state. Operations that omit a session
//! id act on the current session.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::config::EnsembleConfig;
use super::error::{EnsembleError, EnsembleResult};
use super::events::{EventLog, SessionEvent, SessionEventKind};
use super::rate_limit::{RateLimiter, SharedRateLimiter};
use super::types::{AgentLens, EnsembleSession, IntegrationProposal, SessionLimits, Thought};

pub type SharedSessionStore = Arc<Mutex<SessionStore>>;

/// Result of an accepted contribution
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub session_id: String,
    pub thought_id: u64,
    pub agent: AgentLens,
    pub builds_on: Vec<u64>,
    pub weight: f64,
}

/// Result of an accepted endorsement or challenge
#[derive(Debug, Clone, PartialEq)]
pub struct Endorsement {
    pub session_id: String,
    pub thought_id: u64,
    pub agent: AgentLens,
    pub level: f64,
    pub total_endorsements: usize,
}

/// Result of an accepted integration proposal
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub session_id: String,
    pub proposal_id: u64,
    pub agent: AgentLens,
    pub reconciles: Vec<u64>,
}

#[derive(Debug)]
pub struct SessionStore {
    config: EnsembleConfig,
    sessions: HashMap<String, EnsembleSession>,
    current: Option<String>,
    rate_limiter: SharedRateLimiter,
    event_log: Option<EventLog>,
}

impl SessionStore {
    /// Build a store from config. The event log is enabled per config.
    pub fn new(config: EnsembleConfig) -> Self {
        let event_log = config
            .event_log_enabled
            .then(|| EventLog::new(config.event_log_dir.clone()));
        let rate_limiter =
            RateLimiter::new(config.rate_limit_ops, config.rate_limit_window()).shared();
        Self {
            config,
            sessions: HashMap::new(),
            current: None,
            rate_limiter,
            event_log,
        }
    }

    pub fn with_event_log(mut self, event_log: Option<EventLog>) -> Self {
        self.event_log = event_log;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: SharedRateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn shared(self) -> SharedSessionStore {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &SharedRateLimiter {
        &self.rate_limiter
    }

    pub fn event_log(&self) -> Option<&EventLog> {
        self.event_log.as_ref()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    // ── Lifecycle ──

    /// Create a session and make it current.
    ///
    /// Labels must all be known lenses; duplicates collapse onto their first
    /// occurrence and at least two distinct lenses must remain.
    pub fn start(&mut self, problem: &str, labels: &[String]) -> EnsembleResult<&EnsembleSession> {
        let mut lenses: Vec<AgentLens> = Vec::new();
        let mut invalid = Vec::new();
        for label in labels {
            match label.parse::<AgentLens>() {
                Ok(lens) if !lenses.contains(&lens) => lenses.push(lens),
                Ok(_) => {}
                Err(unknown) => invalid.push(unknown),
            }
        }
        if !invalid.is_empty() {
            return Err(EnsembleError::InvalidAgentSet {
                reason: format!("unknown agent lens(es): {}", invalid.join(", ")),
                invalid,
            });
        }
        if lenses.len() < 2 {
            return Err(EnsembleError::InvalidAgentSet {
                reason: "need at least 2 distinct agent lenses for collaboration".to_string(),
                invalid,
            });
        }

        let session_id = Uuid::new_v4().to_string();
        let limits = SessionLimits {
            max_thoughts: self.config.max_thoughts_per_session,
            max_thoughts_per_agent: self.config.max_thoughts_per_agent,
        };
        let session = EnsembleSession::new(session_id.clone(), problem, lenses.clone(), limits);

        self.log_event(
            SessionEventKind::Start,
            &session_id,
            Some(json!({ "problem": problem, "agent_lenses": lenses })),
        );
        info!(
            session_id = %session_id,
            agents = lenses.len(),
            "Started ensemble session"
        );

        self.current = Some(session_id.clone());
        Ok(self.sessions.entry(session_id).or_insert(session))
    }

    /// The session named by `session_id`, or the current one.
    pub fn resolve(&self, session_id: Option<&str>) -> EnsembleResult<&EnsembleSession> {
        let id = self.resolve_id(session_id)?;
        self.sessions.get(&id).ok_or(EnsembleError::NoActiveSession)
    }

    pub fn session(&self, session_id: &str) -> Option<&EnsembleSession> {
        self.sessions.get(session_id)
    }

    pub fn active_session(&self) -> EnsembleResult<&EnsembleSession> {
        self.resolve(None)
    }

    fn resolve_id(&self, session_id: Option<&str>) -> EnsembleResult<String> {
        let id = session_id
            .filter(|id| !id.is_empty())
            .or(self.current.as_deref())
            .ok_or(EnsembleError::NoActiveSession)?;
        if self.sessions.contains_key(id) {
            Ok(id.to_string())
        } else {
            Err(EnsembleError::NoActiveSession)
        }
    }

    // ── Mutations ──

    pub fn contribute(
        &mut self,
        session_id: Option<&str>,
        agent: &str,
        text: &str,
        builds_on: &[i64],
        weight: Option<f64>,
    ) -> EnsembleResult<Contribution> {
        let id = self.resolve_id(session_id)?;
        let session = self.sessions.get(&id).ok_or(EnsembleError::NoActiveSession)?;
        let lens = member_lens(session, agent)?;
        self.check_rate(&id, lens)?;

        if text.chars().count() > self.config.max_thought_length {
            return Err(EnsembleError::ThoughtTooLong {
                max: self.config.max_thought_length,
            });
        }
        let mut parents = Vec::with_capacity(builds_on.len());
        for &raw in builds_on {
            match u64::try_from(raw).ok().filter(|&tid| session.get_thought(tid).is_some()) {
                Some(tid) => parents.push(tid),
                None => {
                    return Err(EnsembleError::InvalidReference {
                        field: "buildsOn",
                        thought_id: raw,
                    })
                }
            }
        }
        session.check_capacity(lens)?;

        let thought = Thought::new(lens, text, parents.clone(), weight.unwrap_or(1.0));
        let weight = thought.weight;
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(EnsembleError::NoActiveSession)?;
        let thought_id = session.add_thought(thought)?;
        let details = session
            .get_thought(thought_id)
            .and_then(|t| serde_json::to_value(t).ok());

        self.rate_limiter.record(&id, lens.as_str());
        self.log_event(
            SessionEventKind::Contribute,
            &id,
            details.map(|thought| json!({ "thought": thought })),
        );
        info!(session_id = %id, agent = %lens, thought_id, "Thought contributed");

        Ok(Contribution {
            session_id: id,
            thought_id,
            agent: lens,
            builds_on: parents,
            weight,
        })
    }

    pub fn endorse_or_challenge(
        &mut self,
        session_id: Option<&str>,
        raw_id: i64,
        agent: &str,
        level: f64,
        note: Option<&str>,
    ) -> EnsembleResult<Endorsement> {
        let id = self.resolve_id(session_id)?;
        let session = self.sessions.get(&id).ok_or(EnsembleError::NoActiveSession)?;
        let not_found = EnsembleError::ThoughtNotFound { thought_id: raw_id };
        let thought_id = u64::try_from(raw_id).map_err(|_| not_found.clone())?;
        let thought = session.get_thought(thought_id).ok_or(not_found.clone())?;
        let lens = member_lens(session, agent)?;
        self.check_rate(&id, lens)?;

        let note = note.filter(|n| !n.is_empty());
        if let Some(note) = note {
            if note.chars().count() > self.config.max_note_length {
                return Err(EnsembleError::NoteTooLong {
                    max: self.config.max_note_length,
                });
            }
        }
        if thought.agent_lens == lens {
            return Err(EnsembleError::SelfEndorsementNotAllowed {
                agent: lens.to_string(),
            });
        }
        let max = self.config.max_endorsements_per_thought;
        if !thought.endorsements.contains_key(&lens) && thought.endorsements.len() >= max {
            return Err(EnsembleError::MaxEndorsementsReached { thought_id, max });
        }

        let thought = self
            .sessions
            .get_mut(&id)
            .and_then(|s| s.get_thought_mut(thought_id))
            .ok_or(not_found)?;
        let level = thought.endorse(lens, level, note);
        let total_endorsements = thought.endorsements.len();

        self.rate_limiter.record(&id, lens.as_str());
        self.log_event(
            SessionEventKind::EndorseChallenge,
            &id,
            Some(json!({
                "thought_id": thought_id,
                "agent_lens": lens,
                "endorsement_level": level,
                "note": note.unwrap_or_default(),
            })),
        );
        info!(
            session_id = %id,
            agent = %lens,
            thought_id,
            level,
            "{}",
            reaction_label(level)
        );

        Ok(Endorsement {
            session_id: id,
            thought_id,
            agent: lens,
            level,
            total_endorsements,
        })
    }

    /// Record an integration proposal.
    ///
    /// `reconciles` is taken as raw JSON so a non-list payload can be
    /// reported as its own error kind.
    pub fn propose_integration(
        &mut self,
        session_id: Option<&str>,
        agent: &str,
        text: &str,
        reconciles: &Value,
    ) -> EnsembleResult<Proposal> {
        let id = self.resolve_id(session_id)?;
        let session = self.sessions.get(&id).ok_or(EnsembleError::NoActiveSession)?;
        let lens = member_lens(session, agent)?;
        self.check_rate(&id, lens)?;

        if text.chars().count() > self.config.max_integration_length {
            return Err(EnsembleError::IntegrationTooLong {
                max: self.config.max_integration_length,
            });
        }
        let items = reconciles
            .as_array()
            .ok_or_else(|| EnsembleError::InvalidReconcilesType {
                found: reconciles.clone(),
            })?;
        if items.len() > self.config.max_reconciles {
            return Err(EnsembleError::TooManyReconciles {
                max: self.config.max_reconciles,
            });
        }

        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let thought_id = match (item.as_u64(), item.as_i64()) {
                (Some(tid), _) => tid,
                (None, Some(negative)) => {
                    return Err(EnsembleError::InvalidReference {
                        field: "reconciles",
                        thought_id: negative,
                    })
                }
                _ => {
                    return Err(EnsembleError::InvalidReconcilesType {
                        found: item.clone(),
                    })
                }
            };
            if session.get_thought(thought_id).is_none() {
                return Err(EnsembleError::InvalidReference {
                    field: "reconciles",
                    thought_id: thought_id as i64,
                });
            }
            ids.push(thought_id);
        }

        let proposal = IntegrationProposal::new(lens, text, ids.clone());
        let details = serde_json::to_value(&proposal).ok();
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(EnsembleError::NoActiveSession)?;
        let proposal_id = session.add_integration(proposal);

        self.rate_limiter.record(&id, lens.as_str());
        self.log_event(
            SessionEventKind::ProposeIntegration,
            &id,
            details.map(|mut p| {
                p["proposal_id"] = json!(proposal_id);
                json!({ "proposal": p })
            }),
        );
        info!(session_id = %id, agent = %lens, proposal_id, reconciles = ?ids, "Integration proposed");

        Ok(Proposal {
            session_id: id,
            proposal_id,
            agent: lens,
            reconciles: ids,
        })
    }

    // ── Lookups ──

    pub fn get_thought(&self, session_id: Option<&str>, thought_id: u64) -> EnsembleResult<&Thought> {
        self.resolve(session_id)?
            .get_thought(thought_id)
            .ok_or(EnsembleError::ThoughtNotFound {
                thought_id: thought_id as i64,
            })
    }

    pub fn get_agent_thoughts(
        &self,
        session_id: Option<&str>,
        agent: &str,
    ) -> EnsembleResult<Vec<&Thought>> {
        let session = self.resolve(session_id)?;
        let lens = member_lens(session, agent)?;
        Ok(session.agent_thoughts(lens))
    }

    // ── Rate limiting ──

    pub fn rate_status(&self) -> BTreeMap<String, BTreeMap<String, usize>> {
        self.rate_limiter.status()
    }

    pub fn reset_agent_rate(&self, agent: &str, session_id: Option<&str>) {
        let session_id = session_id.filter(|id| !id.is_empty());
        self.rate_limiter.reset(agent, session_id);
        if let Some(id) = session_id {
            self.log_event(
                SessionEventKind::ResetRate,
                id,
                Some(json!({ "agent_lens": agent })),
            );
        }
        info!(
            agent,
            scope = session_id.unwrap_or("all sessions"),
            "Reset rate window"
        );
    }

    fn check_rate(&self, session_id: &str, lens: AgentLens) -> EnsembleResult<()> {
        if self.rate_limiter.is_limited(session_id, lens.as_str()) {
            warn!(session_id, agent = %lens, "Agent rate limited");
            return Err(EnsembleError::RateLimited {
                agent: lens.to_string(),
                max_ops: self.rate_limiter.max_ops(),
                window_secs: self.rate_limiter.window().as_secs(),
            });
        }
        Ok(())
    }

    /// Append to the session's event log. Failures are logged, never raised.
    pub fn log_event(&self, kind: SessionEventKind, session_id: &str, details: Option<Value>) {
        let Some(log) = &self.event_log else {
            return;
        };
        if let Err(e) = log.append(&SessionEvent::new(kind, session_id, details)) {
            warn!(session_id, error = %e, "Failed to append session event");
        }
    }
}

/// Parse `agent` and require it to be a participant of `session`.
fn member_lens(session: &EnsembleSession, agent: &str) -> EnsembleResult<AgentLens> {
    agent
        .parse::<AgentLens>()
        .ok()
        .filter(|lens| session.has_agent(*lens))
        .ok_or_else(|| EnsembleError::agent_not_in_session(agent))
}

fn reaction_label(level: f64) -> &'static str {
    if level > 0.3 {
        "Thought endorsed"
    } else if level < -0.3 {
        "Thought challenged"
    } else {
        "Neutral reaction recorded"
    }
}
