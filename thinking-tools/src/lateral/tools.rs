//! Lateral synthesis MCP tool bodies
//!
//! The workflow per session is strictly ordered:
//! `start_session` → `generate_divergence` → one `record_synthesis` per
//! concept → `reflect_on_session`. Each step validates fully before
//! changing the session.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::config::LateralConfig;
use super::divergence::StrategyRegistry;
use super::error::{LateralError, LateralResult};
use super::persistence::{SessionHistory, SnapshotStage};
use super::types::{ConceptSynthesis, ConnectionType, LateralSession, SessionReflection};
use crate::envelope::{parse_args, DispatchError, Envelope};

pub const TOOL_NAMES: [&str; 6] = [
    "start_session",
    "generate_divergence",
    "record_synthesis",
    "reflect_on_session",
    "get_session",
    "list_sessions",
];

pub const MAX_DIVERGENCE_COUNT: usize = 50;
const DEFAULT_LIST_LIMIT: usize = 20;
const LIST_ORIGIN_CHARS: usize = 100;

// ============================================================================
// Request Types
// ============================================================================

/// A number or a numeric string. Anything else fails validation when read.
#[derive(Debug, Clone, PartialEq, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum Score {
    Number(f64),
    Text(String),
    Other(Value),
}

impl Score {
    fn value(&self, field: &str) -> LateralResult<f64> {
        let not_numeric =
            || LateralError::validation(format!("{} must be numeric (0.0-1.0)", field));
        let value = match self {
            Score::Number(n) => *n,
            Score::Text(s) => s.trim().parse().map_err(|_| not_numeric())?,
            Score::Other(_) => return Err(not_numeric()),
        };
        if !(0.0..=1.0).contains(&value) {
            return Err(LateralError::validation_value(
                format!("{} must be between 0.0 and 1.0", field),
                value,
            ));
        }
        Ok(value)
    }
}

/// An integer, or a string holding one.
#[derive(Debug, Clone, PartialEq, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum Count {
    Integer(i64),
    Text(String),
    Other(Value),
}

impl Count {
    fn value(&self) -> Option<i64> {
        match self {
            Count::Integer(n) => Some(*n),
            Count::Text(s) => s.trim().parse().ok(),
            Count::Other(_) => None,
        }
    }
}

/// A single string is accepted where a list is expected.
#[derive(Debug, Clone, PartialEq, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct StartSessionRequest {
    #[schemars(description = "The starting concept, phrase or question")]
    #[serde(default)]
    pub origin: String,

    #[schemars(description = "Divergence method (default from config)")]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
pub struct GenerateDivergenceRequest {
    #[schemars(description = "Session ID (defaults to the current session)")]
    pub session_id: Option<String>,

    #[schemars(description = "Number of concepts to generate (1-50)")]
    pub count: Option<Count>,

    #[schemars(description = "Regenerate even if concepts exist; clears syntheses and reflection")]
    #[serde(default, rename = "override")]
    pub override_existing: bool,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct RecordSynthesisRequest {
    #[schemars(description = "One of the session's divergent concepts")]
    #[serde(default)]
    pub divergent_concept: String,

    #[schemars(
        description = "analogy, contrast, causal, metaphor, structural, arbitrary or other"
    )]
    #[serde(default)]
    pub connection_type: String,

    #[schemars(description = "Required when connection_type is 'other'")]
    pub connection_type_detail: Option<String>,

    #[schemars(description = "Confidence in the connection (0.0-1.0)")]
    pub confidence: Option<Score>,

    #[schemars(description = "The bridging insight")]
    #[serde(default)]
    pub insight: String,

    #[schemars(description = "Session ID (defaults to the current session)")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct ReflectRequest {
    #[schemars(description = "Which synthesis was most valuable")]
    #[serde(default)]
    pub most_valuable_insight: String,

    #[schemars(description = "Why it was valuable")]
    #[serde(default)]
    pub why_valuable: String,

    #[schemars(description = "Concepts that yielded unexpected links")]
    #[serde(default)]
    pub surprising_connections: OneOrMany,

    #[schemars(description = "How productive the session was (0.0-1.0)")]
    pub overall_rating: Option<Score>,

    #[schemars(description = "Session ID (defaults to the current session)")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
pub struct GetSessionRequest {
    #[schemars(description = "Session ID (defaults to the current session)")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
pub struct ListSessionsRequest {
    #[schemars(description = "Include completed sessions from disk")]
    #[serde(default)]
    pub include_history: bool,

    #[schemars(description = "Maximum sessions to return (default 20)")]
    pub limit: Option<usize>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub has_divergence: bool,
    pub syntheses_completed: usize,
    pub syntheses_required: usize,
    pub remaining_concepts: Vec<String>,
    pub synthesis_complete: bool,
    pub has_reflection: bool,
    pub fully_complete: bool,
}

impl SessionStatus {
    fn of(session: &LateralSession) -> Self {
        Self {
            has_divergence: !session.divergent_concepts.is_empty(),
            syntheses_completed: session.syntheses.len(),
            syntheses_required: session.divergent_concepts.len(),
            remaining_concepts: session.remaining_concepts(),
            synthesis_complete: session.is_synthesis_complete(),
            has_reflection: session.reflection.is_some(),
            fully_complete: session.is_complete(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    Memory,
    History,
}

#[derive(Debug, Serialize)]
pub struct SessionListing {
    pub session_id: String,
    pub origin: String,
    pub method: String,
    pub created_at: chrono::DateTime<Utc>,
    pub completed_at: Option<chrono::DateTime<Utc>>,
    pub is_complete: bool,
    pub source: SessionSource,
}

impl SessionListing {
    fn of(session: &LateralSession, source: SessionSource) -> Self {
        Self {
            session_id: session.session_id.clone(),
            origin: session.origin_preview(LIST_ORIGIN_CHARS),
            method: session.method.clone(),
            created_at: session.created_at,
            completed_at: session.completed_at,
            is_complete: session.is_complete(),
            source,
        }
    }
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[derive(Debug, Default)]
struct LateralState {
    sessions: HashMap<String, LateralSession>,
    current: Option<String>,
}

impl LateralState {
    fn resolve(&mut self, session_id: Option<&str>) -> LateralResult<&mut LateralSession> {
        let id = match session_id.filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => self.current.clone().ok_or(LateralError::NoSession)?,
        };
        self.sessions.get_mut(&id).ok_or(LateralError::NoSession)
    }
}

#[derive(Clone)]
pub struct LateralTools {
    config: Arc<LateralConfig>,
    strategies: Arc<StrategyRegistry>,
    history: Arc<SessionHistory>,
    state: Arc<Mutex<LateralState>>,
}

impl LateralTools {
    pub fn new(config: LateralConfig, strategies: StrategyRegistry, history: SessionHistory) -> Self {
        Self {
            config: Arc::new(config),
            strategies: Arc::new(strategies),
            history: Arc::new(history),
            state: Arc::new(Mutex::new(LateralState::default())),
        }
    }

    /// Strategies and history wired from `config`.
    pub fn from_config(config: LateralConfig) -> Self {
        let strategies = StrategyRegistry::with_defaults(config.concepts_path.as_deref());
        let history = SessionHistory::new(config.history_dir.clone(), config.persistence_enabled);
        Self::new(config, strategies, history)
    }

    pub fn config(&self) -> &LateralConfig {
        &self.config
    }

    pub fn start_session(&self, req: StartSessionRequest) -> Envelope {
        Envelope::from_result(self.start(req))
    }

    fn start(&self, req: StartSessionRequest) -> LateralResult<Value> {
        let origin = req.origin.trim();
        if origin.is_empty() {
            return Err(LateralError::MissingOrigin);
        }
        let length = origin.chars().count();
        if length > self.config.max_origin_chars {
            return Err(LateralError::OriginTooLong {
                length,
                max: self.config.max_origin_chars,
            });
        }
        let method = req
            .method
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.config.divergence_method.clone());

        let session = LateralSession::new(origin, method);
        self.history.snapshot(&session, SnapshotStage::Start);
        info!(session_id = %session.session_id, method = %session.method, "Lateral session started");

        let result = json!({
            "session_id": session.session_id,
            "origin": session.origin,
            "method": session.method,
            "created_at": session.created_at,
            "next_step": "Call generate_divergence to produce divergent concepts",
        });
        let mut state = self.state();
        state.current = Some(session.session_id.clone());
        state.sessions.insert(session.session_id.clone(), session);
        Ok(result)
    }

    pub fn generate_divergence(&self, req: GenerateDivergenceRequest) -> Envelope {
        Envelope::from_result(self.diverge(req))
    }

    fn diverge(&self, req: GenerateDivergenceRequest) -> LateralResult<Value> {
        let mut state = self.state();
        let session = state.resolve(req.session_id.as_deref())?;

        if !session.divergent_concepts.is_empty() && !req.override_existing {
            return Err(LateralError::AlreadyGenerated {
                concepts: session.divergent_concepts.clone(),
            });
        }
        let count = match &req.count {
            Some(raw) => raw.value().ok_or(LateralError::InvalidCount {
                value: None,
                max: MAX_DIVERGENCE_COUNT,
            })?,
            None => self.config.divergence_count as i64,
        };
        if !(1..=MAX_DIVERGENCE_COUNT as i64).contains(&count) {
            return Err(LateralError::InvalidCount {
                value: Some(count),
                max: MAX_DIVERGENCE_COUNT,
            });
        }

        if req.override_existing {
            session.reset_divergence();
        }
        let concepts = self
            .strategies
            .generate(&session.origin, &session.method, count as usize);
        session.divergent_concepts = concepts.clone();
        self.history.snapshot(session, SnapshotStage::Divergence);
        info!(session_id = %session.session_id, count = concepts.len(), "Divergent concepts generated");

        Ok(json!({
            "session_id": session.session_id,
            "origin": session.origin,
            "divergent_concepts": concepts,
            "next_step": format!("Call record_synthesis for each of the {} concepts", concepts.len()),
            "overridden": req.override_existing,
        }))
    }

    pub fn record_synthesis(&self, req: RecordSynthesisRequest) -> Envelope {
        Envelope::from_result(self.record(req))
    }

    fn record(&self, req: RecordSynthesisRequest) -> LateralResult<Value> {
        let mut state = self.state();
        let session = state.resolve(req.session_id.as_deref())?;

        if session.divergent_concepts.is_empty() {
            return Err(LateralError::NoDivergence);
        }
        let concept = req.divergent_concept.trim();
        if concept.is_empty() {
            return Err(LateralError::MissingConcept);
        }
        if !session.divergent_concepts.iter().any(|c| c == concept) {
            return Err(LateralError::InvalidConcept {
                concept: concept.to_string(),
                valid: session.divergent_concepts.clone(),
            });
        }
        let remaining = session.remaining_concepts();
        if !remaining.iter().any(|c| c == concept) {
            return Err(LateralError::AlreadySynthesized {
                concept: concept.to_string(),
                remaining,
            });
        }

        let raw_type = req.connection_type.trim();
        if raw_type.is_empty() {
            return Err(LateralError::MissingConnectionType {
                valid: ConnectionType::names().join(", "),
            });
        }
        let confidence = req
            .confidence
            .ok_or(LateralError::MissingConfidence)?
            .value("confidence")?;

        let insight = req.insight.trim();
        if insight.is_empty() {
            return Err(LateralError::MissingInsight);
        }
        let length = insight.chars().count();
        if length > self.config.max_insight_chars {
            return Err(LateralError::InsightTooLong {
                length,
                max: self.config.max_insight_chars,
            });
        }

        let connection_type: ConnectionType = raw_type.parse().map_err(|raw: String| {
            LateralError::validation(format!(
                "Invalid connection_type '{}'. Must be one of: {}",
                raw,
                ConnectionType::names().join(", ")
            ))
        })?;
        let detail = req
            .connection_type_detail
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if connection_type == ConnectionType::Other && detail.is_none() {
            return Err(LateralError::validation(
                "connection_type_detail is required when connection_type is 'other'",
            ));
        }

        session.syntheses.push(ConceptSynthesis {
            divergent_concept: concept.to_string(),
            connection_type,
            connection_type_detail: detail,
            confidence,
            insight: insight.to_string(),
            recorded_at: Utc::now(),
        });
        self.history.snapshot(session, SnapshotStage::Synthesis);
        debug!(session_id = %session.session_id, concept, "Synthesis recorded");

        let remaining = session.remaining_concepts();
        let next_step = if remaining.is_empty() {
            "All syntheses complete. Call reflect_on_session to finish.".to_string()
        } else {
            format!("Record synthesis for remaining concepts: {}", remaining.join(", "))
        };
        Ok(json!({
            "session_id": session.session_id,
            "recorded": concept,
            "connection_type": connection_type,
            "confidence": confidence,
            "syntheses_completed": session.syntheses.len(),
            "syntheses_required": session.divergent_concepts.len(),
            "remaining_concepts": remaining,
            "next_step": next_step,
        }))
    }

    pub fn reflect_on_session(&self, req: ReflectRequest) -> Envelope {
        Envelope::from_result(self.reflect(req))
    }

    fn reflect(&self, req: ReflectRequest) -> LateralResult<Value> {
        let mut state = self.state();
        let session = state.resolve(req.session_id.as_deref())?;

        if !session.is_synthesis_complete() {
            return Err(LateralError::SynthesisIncomplete {
                completed: session.syntheses.len(),
                required: session.divergent_concepts.len(),
                remaining: session.remaining_concepts(),
            });
        }
        if session.reflection.is_some() {
            return Err(LateralError::AlreadyReflected);
        }

        let most_valuable = req.most_valuable_insight.trim();
        if most_valuable.is_empty() {
            return Err(LateralError::MissingMostValuable);
        }
        let why_valuable = req.why_valuable.trim();
        if why_valuable.is_empty() {
            return Err(LateralError::MissingWhyValuable);
        }
        let rating = req
            .overall_rating
            .ok_or(LateralError::MissingRating)?
            .value("overall_rating")?;

        let now = Utc::now();
        session.reflection = Some(SessionReflection {
            most_valuable_insight: most_valuable.to_string(),
            why_valuable: why_valuable.to_string(),
            surprising_connections: req.surprising_connections.into_vec(),
            overall_rating: rating,
            recorded_at: now,
        });
        session.completed_at = Some(now);
        self.history.snapshot(session, SnapshotStage::Reflection);
        self.history.save_completed(session);
        info!(session_id = %session.session_id, rating, "Lateral session completed");

        Ok(json!({
            "session_id": session.session_id,
            "completed": true,
            "completed_at": now,
            "overall_rating": rating,
            "summary": {
                "origin": session.origin,
                "divergent_concepts": session.divergent_concepts,
                "syntheses_count": session.syntheses.len(),
                "most_valuable": most_valuable,
            },
        }))
    }

    pub fn get_session(&self, req: GetSessionRequest) -> Envelope {
        let mut state = self.state();
        let result = state.resolve(req.session_id.as_deref()).map(|session| {
            json!({
                "session": session,
                "status": SessionStatus::of(session),
            })
        });
        Envelope::from_result(result)
    }

    pub fn list_sessions(&self, req: ListSessionsRequest) -> Envelope {
        let limit = req.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let (mut listings, current) = {
            let state = self.state();
            let listings: Vec<SessionListing> = state
                .sessions
                .values()
                .map(|s| SessionListing::of(s, SessionSource::Memory))
                .collect();
            (listings, state.current.clone())
        };

        if req.include_history {
            let known: HashSet<String> = listings.iter().map(|l| l.session_id.clone()).collect();
            listings.extend(
                self.history
                    .load(limit)
                    .iter()
                    .filter(|s| !known.contains(&s.session_id))
                    .map(|s| SessionListing::of(s, SessionSource::History)),
            );
        }

        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = listings.len();
        listings.truncate(limit);
        Envelope::success(&json!({
            "sessions": listings,
            "total": total,
            "limit": limit,
            "current_session_id": current,
        }))
    }

    pub fn dispatch(&self, name: &str, args: Value) -> Envelope {
        let result = match name {
            "start_session" => parse_args(name, args).map(|req| self.start_session(req)),
            "generate_divergence" => {
                parse_args(name, args).map(|req| self.generate_divergence(req))
            }
            "record_synthesis" => parse_args(name, args).map(|req| self.record_synthesis(req)),
            "reflect_on_session" => parse_args(name, args).map(|req| self.reflect_on_session(req)),
            "get_session" => parse_args(name, args).map(|req| self.get_session(req)),
            "list_sessions" => parse_args(name, args).map(|req| self.list_sessions(req)),
            other => Err(DispatchError::unknown_tool(other)),
        };
        result.unwrap_or_else(|e| Envelope::failure(&e))
    }

    fn state(&self) -> MutexGuard<'_, LateralState> {
        // Every step validates before mutating, so a poisoned guard is consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for LateralTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LateralTools")
            .field("strategies", &self.strategies)
            .field("history", &self.history.dir())
            .finish_non_exhaustive()
    }
}
