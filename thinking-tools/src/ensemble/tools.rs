//! Ensemble MCP tool bodies
//!
//! Request types carry the camelCase argument names hosts send. Every tool
//! body locks the session store for the duration of one synchronous call,
//! records a latency sample and renders the outcome as an [`Envelope`].

use std::collections::BTreeMap;
use std::sync::MutexGuard;

use rmcp::schemars;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::analysis::{self, round2, ConsensusReport, Synthesis};
use super::error::{EnsembleError, EnsembleResult};
use super::events::SessionEventKind;
use super::store::{SessionStore, SharedSessionStore};
use super::types::{AgentLens, EnsembleSession, LensDescription};
use crate::envelope::{parse_args, DispatchError, Envelope};
use crate::metrics::SharedMetrics;

/// Names of every tool this server exposes, in listing order.
pub const TOOL_NAMES: [&str; 10] = [
    "start_collaborative_reasoning",
    "contribute_perspective",
    "endorse_or_challenge",
    "synthesize_convergence",
    "propose_integration",
    "get_convergence_map",
    "get_active_session",
    "get_metrics",
    "get_rate_status",
    "reset_agent_rate",
];

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[schemars(description = "The problem or question the agents reason about together")]
    pub problem: String,

    #[schemars(
        description = "At least two of: analytical, skeptical, creative, pragmatic, ethical"
    )]
    pub agent_lenses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContributeRequest {
    #[schemars(description = "Session to contribute to (defaults to the current session)")]
    pub session_id: Option<String>,

    #[schemars(description = "Lens of the contributing agent")]
    pub agent_lens: String,

    #[schemars(description = "The perspective being contributed")]
    pub thought: String,

    #[schemars(description = "IDs of earlier thoughts this one builds on")]
    #[serde(default)]
    pub builds_on: Vec<i64>,

    #[schemars(description = "Confidence in this thought, 0.0 to 1.0 (default: 1.0)")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndorseRequest {
    #[schemars(description = "Session containing the thought (defaults to the current session)")]
    pub session_id: Option<String>,

    #[schemars(description = "ID of the thought to react to")]
    pub thought_id: i64,

    #[schemars(description = "Lens of the reacting agent")]
    pub agent_lens: String,

    #[schemars(description = "-1.0 (strong challenge) to 1.0 (strong endorsement)")]
    pub endorsement_level: f64,

    #[schemars(description = "Reasoning; recorded as a challenge when the level is negative")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeRequest {
    #[schemars(description = "Session to synthesize (defaults to the current session)")]
    pub session_id: Option<String>,

    #[schemars(description = "Mean endorsement a thought needs to count as consensus")]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProposeRequest {
    #[schemars(description = "Session to propose into (defaults to the current session)")]
    pub session_id: Option<String>,

    #[schemars(description = "Lens of the proposing agent")]
    pub agent_lens: String,

    #[schemars(description = "The integrating idea")]
    pub integration: String,

    #[schemars(description = "IDs of the thoughts this proposal reconciles")]
    #[serde(default)]
    pub reconciles: Value,
}

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[schemars(description = "Session to inspect (defaults to the current session)")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetRateRequest {
    #[schemars(description = "The agent lens whose rate window is cleared")]
    pub agent_lens: String,

    #[schemars(description = "Only clear this session's window (default: every session)")]
    pub session_id: Option<String>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub session_id: String,
    pub problem: String,
    pub agent_lenses: Vec<AgentLens>,
    pub lens_descriptions: BTreeMap<AgentLens, LensDescription>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributeResponse {
    pub thought_id: u64,
    pub agent_lens: AgentLens,
    pub builds_on: Vec<u64>,
    pub weight: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndorseResponse {
    pub thought_id: u64,
    pub agent_lens: AgentLens,
    pub endorsement_level: f64,
    pub total_endorsements: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeResponse {
    pub proposal_id: u64,
    pub agent_lens: AgentLens,
    pub reconciles: Vec<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceMapResponse {
    pub session_id: String,
    pub convergence_score: f64,
    pub map_text: String,
}

/// `get_metrics` payload; keys stay snake_case like the export file.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub counters: BTreeMap<String, u64>,
    pub avg_latencies_seconds: BTreeMap<String, Option<f64>>,
    pub config: Value,
}

// ============================================================================
// Tool Implementations
// ============================================================================

/// Ensemble tool surface over a shared store and metrics registry.
#[derive(Debug, Clone)]
pub struct EnsembleTools {
    store: SharedSessionStore,
    metrics: SharedMetrics,
}

impl EnsembleTools {
    pub fn new(store: SharedSessionStore, metrics: SharedMetrics) -> Self {
        Self { store, metrics }
    }

    pub fn store(&self) -> &SharedSessionStore {
        &self.store
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    pub fn start_collaborative_reasoning(&self, req: StartRequest) -> Envelope {
        self.run("start_collaborative_reasoning", |store| {
            let session = store.start(&req.problem, &req.agent_lenses)?;
            Ok(StartResponse {
                session_id: session.session_id.clone(),
                problem: session.problem.clone(),
                agent_lenses: session.agent_lenses.clone(),
                lens_descriptions: session
                    .agent_lenses
                    .iter()
                    .map(|lens| (*lens, lens.description()))
                    .collect(),
            })
        })
        .tap_success(|| self.metrics.inc_counter("sessions_started_total", 1))
    }

    pub fn contribute_perspective(&self, req: ContributeRequest) -> Envelope {
        self.run("contribute_perspective", |store| {
            let c = store.contribute(
                req.session_id.as_deref(),
                &req.agent_lens,
                &req.thought,
                &req.builds_on,
                req.weight,
            )?;
            Ok(ContributeResponse {
                thought_id: c.thought_id,
                agent_lens: c.agent,
                builds_on: c.builds_on,
                weight: c.weight,
            })
        })
        .tap_success(|| {
            self.metrics.inc_counter("agent_ops_total", 1);
            self.metrics.inc_counter("thoughts_total", 1);
        })
    }

    pub fn endorse_or_challenge(&self, req: EndorseRequest) -> Envelope {
        self.run("endorse_or_challenge", |store| {
            let e = store.endorse_or_challenge(
                req.session_id.as_deref(),
                req.thought_id,
                &req.agent_lens,
                req.endorsement_level,
                req.note.as_deref(),
            )?;
            Ok(EndorseResponse {
                thought_id: e.thought_id,
                agent_lens: e.agent,
                endorsement_level: e.level,
                total_endorsements: e.total_endorsements,
            })
        })
        .tap_success(|| {
            self.metrics.inc_counter("agent_ops_total", 1);
            self.metrics.inc_counter("endorsements_total", 1);
        })
    }

    pub fn synthesize_convergence(&self, req: SynthesizeRequest) -> Envelope {
        self.run("synthesize_convergence", |store| {
            let threshold = req
                .threshold
                .unwrap_or(store.config().default_synthesis_threshold);
            let thresholds = store.config().thresholds();
            let session = store.resolve(req.session_id.as_deref())?;
            let synthesis: Synthesis = analysis::synthesize(session, threshold, thresholds);

            info!(
                session_id = %synthesis.session_id,
                convergence = synthesis.convergence_score,
                consensus = synthesis.consensus.consensus_thoughts.len(),
                tensions = synthesis.tensions.len(),
                "Synthesis computed"
            );
            store.log_event(
                SessionEventKind::Synthesize,
                &synthesis.session_id,
                Some(json!({
                    "convergence_score": synthesis.convergence_score,
                    "tensions": synthesis.tensions,
                })),
            );
            Ok(synthesis)
        })
        .tap_success(|| self.metrics.inc_counter("syntheses_total", 1))
    }

    pub fn propose_integration(&self, req: ProposeRequest) -> Envelope {
        self.run("propose_integration", |store| {
            let p = store.propose_integration(
                req.session_id.as_deref(),
                &req.agent_lens,
                &req.integration,
                &req.reconciles,
            )?;
            Ok(ProposeResponse {
                proposal_id: p.proposal_id,
                agent_lens: p.agent,
                reconciles: p.reconciles,
            })
        })
        .tap_success(|| {
            self.metrics.inc_counter("agent_ops_total", 1);
            self.metrics.inc_counter("integrations_total", 1);
        })
    }

    pub fn get_convergence_map(&self, req: SessionRequest) -> Envelope {
        self.run("get_convergence_map", |store| {
            let config = store.config();
            let threshold = config.default_synthesis_threshold;
            let thresholds = config.thresholds();
            let session: &EnsembleSession = store.resolve(req.session_id.as_deref())?;

            let consensus: ConsensusReport = analysis::calculate_consensus(session, threshold);
            let tensions = analysis::identify_tensions(session, thresholds);
            let score = analysis::compute_convergence_score(session, thresholds.positive);
            Ok(ConvergenceMapResponse {
                session_id: session.session_id.clone(),
                convergence_score: round2(score),
                map_text: analysis::format_convergence_map(session, &consensus, &tensions, score),
            })
        })
    }

    pub fn get_active_session(&self) -> Envelope {
        self.run("get_active_session", |store| {
            let session = store.active_session()?;
            Ok(json!({ "session": session }))
        })
    }

    pub fn get_metrics(&self) -> Envelope {
        if !self.metrics.is_enabled() {
            return Envelope::failure(&EnsembleError::MetricsDisabled);
        }
        let config = match self.lock() {
            Ok(store) => {
                let config = store.config();
                json!({
                    "max_thoughts_per_session": config.max_thoughts_per_session,
                    "max_endorsements_per_thought": config.max_endorsements_per_thought,
                    "default_synthesis_threshold": config.default_synthesis_threshold,
                })
            }
            Err(e) => return Envelope::failure(&e),
        };
        let snapshot = self.metrics.snapshot();
        Envelope::success(&MetricsResponse {
            avg_latencies_seconds: snapshot.average_latencies(),
            counters: snapshot.counters,
            config,
        })
    }

    pub fn get_rate_status(&self) -> Envelope {
        self.run("get_rate_status", |store| {
            Ok(json!({ "rateStatus": store.rate_status() }))
        })
    }

    pub fn reset_agent_rate(&self, req: ResetRateRequest) -> Envelope {
        self.run("reset_agent_rate", |store| {
            store.reset_agent_rate(&req.agent_lens, req.session_id.as_deref());
            Ok(json!({ "agentLens": req.agent_lens }))
        })
    }

    /// Route a tool call by name with raw JSON arguments.
    pub fn dispatch(&self, name: &str, args: Value) -> Envelope {
        debug!(tool = name, "dispatching ensemble tool");
        let result = match name {
            "start_collaborative_reasoning" => {
                parse_args(name, args).map(|req| self.start_collaborative_reasoning(req))
            }
            "contribute_perspective" => {
                parse_args(name, args).map(|req| self.contribute_perspective(req))
            }
            "endorse_or_challenge" => {
                parse_args(name, args).map(|req| self.endorse_or_challenge(req))
            }
            "synthesize_convergence" => {
                parse_args(name, args).map(|req| self.synthesize_convergence(req))
            }
            "propose_integration" => {
                parse_args(name, args).map(|req| self.propose_integration(req))
            }
            "get_convergence_map" => {
                parse_args(name, args).map(|req| self.get_convergence_map(req))
            }
            "get_active_session" => Ok(self.get_active_session()),
            "get_metrics" => Ok(self.get_metrics()),
            "get_rate_status" => Ok(self.get_rate_status()),
            "reset_agent_rate" => parse_args(name, args).map(|req| self.reset_agent_rate(req)),
            other => Err(DispatchError::unknown_tool(other)),
        };
        result.unwrap_or_else(|e| Envelope::failure(&e))
    }

    // ── Helpers ──

    fn lock(&self) -> EnsembleResult<MutexGuard<'_, SessionStore>> {
        self.store
            .lock()
            .map_err(|_| EnsembleError::internal("session store lock poisoned"))
    }

    /// Lock the store, run `f` and time it under `op`.
    fn run<T: Serialize>(
        &self,
        op: &str,
        f: impl FnOnce(&mut SessionStore) -> EnsembleResult<T>,
    ) -> Envelope {
        let result = self.metrics.time(op, || {
            let mut store = self.lock()?;
            f(&mut store)
        });
        if let Err(e) = &result {
            debug!(tool = op, error = %e, "ensemble tool rejected");
            self.metrics.inc_counter("errors_total", 1);
        }
        Envelope::from_result(result)
    }
}

trait TapSuccess {
    fn tap_success(self, f: impl FnOnce()) -> Self;
}

impl TapSuccess for Envelope {
    fn tap_success(self, f: impl FnOnce()) -> Self {
        if self.is_success() {
            f();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::config::EnsembleConfig;
    use crate::metrics::Metrics;

    fn tools() -> EnsembleTools {
        let config = EnsembleConfig {
            event_log_enabled: false,
            ..EnsembleConfig::default()
        };
        EnsembleTools::new(
            SessionStore::new(config).shared(),
            Metrics::new(true).shared(),
        )
    }

    fn call(tools: &EnsembleTools, name: &str, args: Value) -> Envelope {
        tools.dispatch(name, args)
    }

    #[test]
    fn test_start_returns_lens_descriptions() {
        let tools = tools();
        let env = call(
            &tools,
            "start_collaborative_reasoning",
            json!({"problem": "p", "agentLenses": ["analytical", "creative"]}),
        );
        let result = env.result().unwrap();
        assert_eq!(result["agentLenses"], json!(["analytical", "creative"]));
        assert!(result["lensDescriptions"]["creative"]["bias_check"].is_string());
        assert_eq!(tools.metrics().snapshot().counters["sessions_started_total"], 1);
    }

    #[test]
    fn test_negative_ids_report_missing_thoughts() {
        let tools = tools();
        call(
            &tools,
            "start_collaborative_reasoning",
            json!({"problem": "p", "agentLenses": ["analytical", "skeptical"]}),
        );
        let env = call(
            &tools,
            "contribute_perspective",
            json!({"agentLens": "analytical", "thought": "t", "buildsOn": [-1]}),
        );
        assert_eq!(env.error_kind(), Some("invalid_reference"));
        assert_eq!(env.details().unwrap()["field"], "buildsOn");

        let env = call(
            &tools,
            "endorse_or_challenge",
            json!({"thoughtId": -1, "agentLens": "skeptical", "endorsementLevel": 0.5}),
        );
        assert_eq!(env.error_kind(), Some("thought_not_found"));
        assert_eq!(env.details().unwrap()["thoughtId"], -1);
    }

    #[test]
    fn test_unknown_tool_and_bad_args() {
        let tools = tools();
        let env = call(&tools, "summon_oracle", json!({}));
        assert_eq!(env.error_kind(), Some("unknown_tool"));
        assert_eq!(env.details().unwrap()["tool"], "summon_oracle");

        let env = call(&tools, "contribute_perspective", json!({"thought": 3}));
        assert_eq!(env.error_kind(), Some("invalid_arguments"));
    }

    #[test]
    fn test_contribute_without_session() {
        let tools = tools();
        let env = call(
            &tools,
            "contribute_perspective",
            json!({"agentLens": "analytical", "thought": "x"}),
        );
        assert_eq!(env.error_kind(), Some("no_active_session"));
        assert_eq!(tools.metrics().snapshot().counters["errors_total"], 1);
    }

    #[test]
    fn test_synthesize_and_map() {
        let tools = tools();
        call(
            &tools,
            "start_collaborative_reasoning",
            json!({"problem": "Should we ship?", "agentLenses": ["analytical", "skeptical"]}),
        );
        call(
            &tools,
            "contribute_perspective",
            json!({"agentLens": "analytical", "thought": "Metrics look good"}),
        );
        call(
            &tools,
            "endorse_or_challenge",
            json!({"thoughtId": 1, "agentLens": "skeptical", "endorsementLevel": 0.8}),
        );

        let env = call(&tools, "synthesize_convergence", json!({"threshold": 0.6}));
        let result = env.result().unwrap();
        assert_eq!(result["totalThoughts"], 1);
        assert_eq!(result["consensus"]["consensus_thoughts"][0]["thought_id"], 1);
        assert_eq!(result["agentContributions"]["analytical"], 1);
        assert_eq!(result["agentContributions"]["skeptical"], 0);

        let env = call(&tools, "get_convergence_map", Value::Null);
        let map = env.result().unwrap()["mapText"].as_str().unwrap().to_string();
        assert!(map.contains("Problem: Should we ship?"));
        assert!(map.contains("[CONSENSUS] [analytical]"));
    }

    #[test]
    fn test_metrics_tool() {
        let tools = tools();
        call(
            &tools,
            "start_collaborative_reasoning",
            json!({"problem": "p", "agentLenses": ["analytical", "skeptical"]}),
        );
        let env = call(&tools, "get_metrics", json!({}));
        let result = env.result().unwrap();
        assert_eq!(result["counters"]["sessions_started_total"], 1);
        assert!(result["avg_latencies_seconds"]["start_collaborative_reasoning"].is_number());
        assert_eq!(result["config"]["max_thoughts_per_session"], 1000);

        let disabled = EnsembleTools::new(
            SessionStore::new(EnsembleConfig::default()).shared(),
            Metrics::new(false).shared(),
        );
        assert_eq!(
            disabled.get_metrics().error_kind(),
            Some("metrics_disabled")
        );
    }

    #[test]
    fn test_rate_status_and_reset() {
        let tools = tools();
        let env = call(
            &tools,
            "start_collaborative_reasoning",
            json!({"problem": "p", "agentLenses": ["analytical", "skeptical"]}),
        );
        let session_id = env.result().unwrap()["sessionId"].as_str().unwrap().to_string();
        call(
            &tools,
            "contribute_perspective",
            json!({"agentLens": "analytical", "thought": "x"}),
        );

        let env = call(&tools, "get_rate_status", json!({}));
        assert_eq!(env.result().unwrap()["rateStatus"][&session_id]["analytical"], 1);

        let env = call(&tools, "reset_agent_rate", json!({"agentLens": "analytical"}));
        assert_eq!(env.result().unwrap()["agentLens"], "analytical");
        let env = call(&tools, "get_rate_status", json!({}));
        assert_eq!(env.result().unwrap()["rateStatus"][&session_id]["analytical"], 0);
    }

    #[test]
    fn test_missing_reconciles_is_type_error() {
        let tools = tools();
        call(
            &tools,
            "start_collaborative_reasoning",
            json!({"problem": "p", "agentLenses": ["analytical", "skeptical"]}),
        );
        let env = call(
            &tools,
            "propose_integration",
            json!({"agentLens": "skeptical", "integration": "merge"}),
        );
        assert_eq!(env.error_kind(), Some("invalid_reconciles_type"));
    }
}
