//! Lateral synthesis sessions from origin to reflection

use std::io::Write;

use serde_json::{json, Value};
use thinking_tools::lateral::{LateralConfig, LateralTools};

fn concepts_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "{}",
        json!({
            "fallback_words": {
                "nouns": ["kite", "anchor"],
                "verbs": ["unravel"],
                "abstract": ["gravity"]
            }
        })
    )
    .unwrap();
    file
}

fn concepts(result: &Value) -> Vec<String> {
    result["divergent_concepts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_session_runs_to_completion_and_lands_in_history() {
    let words = concepts_file();
    let history = tempfile::tempdir().unwrap();
    let config = LateralConfig {
        divergence_count: 4,
        concepts_path: Some(words.path().to_path_buf()),
        history_dir: history.path().to_path_buf(),
        ..LateralConfig::default()
    };
    let tools = LateralTools::from_config(config.clone());

    let start = tools.dispatch("start_session", json!({"origin": "How do cities breathe?"}));
    let session_id = start.result().unwrap()["session_id"].as_str().unwrap().to_string();

    let divergence = tools.dispatch("generate_divergence", json!({"session_id": session_id}));
    let mut drawn = concepts(divergence.result().unwrap());
    assert_eq!(drawn.len(), 4);
    drawn.sort();
    assert_eq!(drawn, vec!["anchor", "gravity", "kite", "unravel"]);

    for (i, concept) in drawn.iter().enumerate() {
        let env = tools.dispatch(
            "record_synthesis",
            json!({
                "session_id": session_id,
                "divergent_concept": concept,
                "connection_type": if i == 0 { "structural" } else { "metaphor" },
                "confidence": 0.25 * i as f64,
                "insight": format!("A city and a {} both ...", concept),
            }),
        );
        assert!(env.is_success(), "{}", env.to_json());
        assert_eq!(env.result().unwrap()["syntheses_completed"], i + 1);
    }

    let reflection = tools.dispatch(
        "reflect_on_session",
        json!({
            "session_id": session_id,
            "most_valuable_insight": "kite",
            "why_valuable": "Wind corridors as urban lungs",
            "surprising_connections": ["anchor", "gravity"],
            "overall_rating": "0.9"
        }),
    );
    assert_eq!(reflection.result().unwrap()["overall_rating"], 0.9);

    let files: Vec<String> = std::fs::read_dir(history.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert!(files.iter().any(|f| f == "snapshots.jsonl"));
    assert!(files.iter().any(|f| f.starts_with("lateral-synthesis-session-")));

    let restarted = LateralTools::from_config(config);
    let listed = restarted.dispatch("list_sessions", json!({"include_history": true, "limit": 5}));
    let result = listed.result().unwrap();
    assert_eq!(result["total"], 1);
    assert_eq!(result["sessions"][0]["session_id"], session_id.as_str());
    assert_eq!(result["sessions"][0]["source"], "history");
    assert_eq!(result["current_session_id"], Value::Null);
}

#[test]
fn test_unknown_method_falls_back_to_random() {
    let config = LateralConfig {
        persistence_enabled: false,
        ..LateralConfig::default()
    };
    let tools = LateralTools::from_config(config);
    let start = tools.dispatch(
        "start_session",
        json!({"origin": "origin", "method": "semantic-drift"}),
    );
    assert_eq!(start.result().unwrap()["method"], "semantic-drift");

    let divergence = tools.dispatch("generate_divergence", json!({"count": 3}));
    assert_eq!(concepts(divergence.result().unwrap()).len(), 3);
}

#[test]
fn test_count_is_coerced_from_strings() {
    let config = LateralConfig {
        persistence_enabled: false,
        ..LateralConfig::default()
    };
    let tools = LateralTools::from_config(config);
    tools.dispatch("start_session", json!({"origin": "o"}));
    let env = tools.dispatch("generate_divergence", json!({"count": "many"}));
    assert_eq!(env.error_kind(), Some("invalid_count"));
    let env = tools.dispatch("generate_divergence", json!({"count": "2"}));
    assert_eq!(concepts(env.result().unwrap()).len(), 2);
}
