//! Episode-by-episode coherence scoring with a rolling summary.
//!
//! Episodes are processed strictly in order. Each one is scored against the
//! summary and key items accumulated so far, then the model refreshes that
//! state from the episode's text. A failed call never aborts the run: the
//! episode is skipped or the previous state is kept, and the loop moves on.

use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::ai::{self, AiConfig};
use crate::episode::{collect_scenes, KeyItems, Scene};
use crate::error::PlotlineError;
use crate::parse::{extract_score, split_update_response};
use crate::prompts;

const EVALUATE_TEMPERATURE: f64 = 0.3;
const UPDATE_TEMPERATURE: f64 = 0.1;

/// Summary and key items carried from one episode to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryState {
    pub summary: String,
    pub key_items: KeyItems,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub score: Option<u64>,
    pub reasoning: String,
}

#[derive(Debug, Default)]
pub struct EvaluationReport {
    pub scored: usize,
    pub skipped: usize,
    pub failed_updates: usize,
    pub final_state: StoryState,
}

/// Score one episode against the story so far.
pub async fn evaluate_scene(
    cfg: &AiConfig,
    state: &StoryState,
    scene: &Scene,
    next: Option<&Scene>,
) -> Result<Evaluation, PlotlineError> {
    let next_text = next.map(Scene::text).unwrap_or_else(|| prompts::NO_NEXT_SCENE.to_string());
    let prompt = prompts::evaluation_prompt(
        scene.number,
        &state.summary,
        &state.key_items.render(),
        &scene.text(),
        &next_text,
    );
    debug!(episode = scene.number, %prompt, "evaluation prompt");

    let r = ai::llm_chat_as(cfg, "evaluate", prompts::EVALUATE_SYSTEM, &prompt, EVALUATE_TEMPERATURE)
        .await?;
    r.log_usage("evaluate");
    debug!(episode = scene.number, response = %r.content, "evaluation response");

    Ok(Evaluation { score: extract_score(&r.content), reasoning: r.content })
}

/// Ask the model to fold this episode into the summary and key items.
pub async fn update_story_state(
    cfg: &AiConfig,
    state: &StoryState,
    scene: &Scene,
) -> Result<StoryState, PlotlineError> {
    let prompt = prompts::update_prompt(
        scene.number,
        &state.summary,
        &state.key_items.render(),
        &scene.text(),
    );
    debug!(episode = scene.number, %prompt, "update prompt");

    let r = ai::llm_chat_as(cfg, "update", prompts::UPDATE_SYSTEM, &prompt, UPDATE_TEMPERATURE)
        .await?;
    r.log_usage("update");
    debug!(episode = scene.number, response = %r.content, "update response");

    let (summary, key_items) = split_update_response(&r.content, &state.key_items);
    Ok(StoryState { summary, key_items })
}

/// Evaluate every episode in `doc`, writing `score` and `evaluation_reasoning`
/// back onto the episode records.
pub async fn run(cfg: &AiConfig, doc: &mut Value) -> EvaluationReport {
    let scenes = collect_scenes(doc);
    info!(episodes = scenes.len(), "collected episodes");

    let mut report = EvaluationReport::default();
    let mut state = StoryState::default();

    for (i, scene) in scenes.iter().enumerate() {
        info!(storyline = %scene.storyline, episode = %scene.key, "processing");
        let next = scenes.get(i + 1);

        let evaluation = match evaluate_scene(cfg, &state, scene, next).await {
            Ok(e) => e,
            Err(e) => {
                warn!(episode = %scene.key, error = %e, "evaluation failed");
                report.skipped += 1;
                continue;
            }
        };
        let Some(score) = evaluation.score else {
            warn!(episode = %scene.key, "cannot evaluate: no score in response");
            report.skipped += 1;
            continue;
        };
        info!(episode = %scene.key, score, reasoning = %evaluation.reasoning, "scored");

        match update_story_state(cfg, &state, scene).await {
            Ok(s) => state = s,
            Err(e) => {
                warn!(episode = %scene.key, error = %e, "summary update failed, keeping previous state");
                report.failed_updates += 1;
            }
        }

        if let Some(record) = doc
            .get_mut(&scene.storyline)
            .and_then(|s| s.get_mut(&scene.key))
            .and_then(Value::as_object_mut)
        {
            record.insert("score".into(), Value::from(score));
            record.insert("evaluation_reasoning".into(), Value::String(evaluation.reasoning));
        }
        report.scored += 1;
    }

    info!(
        scored = report.scored,
        skipped = report.skipped,
        failed_updates = report.failed_updates,
        key_items = state.key_items.len(),
        "evaluation finished"
    );
    report.final_state = state;
    report
}

/// Load `input`, evaluate it and write the whole document to `output`.
///
/// Nothing is written until every episode has been processed.
pub async fn evaluate_file(
    cfg: &AiConfig,
    input: &Path,
    output: &Path,
) -> Result<EvaluationReport, PlotlineError> {
    let mut doc = crate::load_json(input).await?;
    info!(path = %input.display(), "loaded data");

    let report = run(cfg, &mut doc).await;

    let body = serde_json::to_string_pretty(&doc)?;
    tokio::fs::write(output, body).await?;
    info!(path = %output.display(), "results written");
    Ok(report)
}
