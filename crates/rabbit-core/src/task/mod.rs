//! ============================================================================
//! Task Generation - Page content to a validated interactive task
//! ============================================================================
//! Builds a profile-aware prompt, runs one non-streaming completion and
//! validates the model's JSON. Retries are left to the completion client.
//! ============================================================================

mod prompt;
mod types;

pub use prompt::{build_system_prompt, build_user_prompt, MAX_CONTENT_CHARS};
pub use types::{InteractiveTask, StepKind, TaskResource, TaskStep};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::error::{RabbitError, Result};
use crate::types::Profile;

/// Sampling temperature for task generation
pub const TASK_TEMPERATURE: f32 = 0.3;

/// Runs a single non-streaming completion for the adapter
#[async_trait]
pub trait TaskCompleter: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_payload: Value,
        temperature: f32,
    ) -> Result<String>;
}

/// Turn page content into an interactive task for this learner
pub async fn generate_task(
    content: &str,
    profile: &Profile,
    completer: &dyn TaskCompleter,
) -> Result<InteractiveTask> {
    info!(
        "Generating interactive task from {} chars of content",
        content.chars().count()
    );

    let system_prompt = build_system_prompt(profile);
    let user_prompt = build_user_prompt(content);

    let response = completer
        .complete(&system_prompt, Value::String(user_prompt), TASK_TEMPERATURE)
        .await?;

    let task = parse_task_response(&response)?;
    debug!("Task '{}' has {} steps", task.title, task.steps.len());
    Ok(task)
}

/// Validate and normalize a raw model reply
pub fn parse_task_response(response: &str) -> Result<InteractiveTask> {
    let json = strip_code_fence(response);

    let mut data: Value = serde_json::from_str(json).map_err(|e| {
        warn!("Task response is not JSON: {}", e);
        RabbitError::InvalidTaskStructure(format!("response is not valid JSON: {}", e))
    })?;

    let has_title = data
        .get("title")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.trim().is_empty());
    if !has_title {
        return Err(RabbitError::InvalidTaskStructure(
            "missing title".to_string(),
        ));
    }

    let steps = match data.get_mut("steps") {
        Some(Value::Array(steps)) => steps,
        Some(_) => {
            return Err(RabbitError::InvalidTaskStructure(
                "steps is not an array".to_string(),
            ))
        }
        None => {
            return Err(RabbitError::InvalidTaskStructure(
                "missing steps".to_string(),
            ))
        }
    };
    if steps.is_empty() {
        return Err(RabbitError::InvalidTaskStructure(
            "steps is empty".to_string(),
        ));
    }

    normalize_steps(steps)?;
    coerce_optional_fields(&mut data);

    serde_json::from_value(data).map_err(|e| RabbitError::InvalidTaskStructure(e.to_string()))
}

/// Assign ids and reset completion. Model-supplied ids are kept when they
/// are positive and unique; otherwise every step is numbered by position.
fn normalize_steps(steps: &mut [Value]) -> Result<()> {
    let mut ids: Vec<u32> = steps
        .iter()
        .enumerate()
        .map(|(index, step)| step.get("id").and_then(step_id).unwrap_or(index as u32 + 1))
        .collect();

    let mut seen = HashSet::new();
    if !ids.iter().all(|id| seen.insert(*id)) {
        debug!("Duplicate step ids from model, renumbering");
        ids = (1..=steps.len() as u32).collect();
    }

    for (step, id) in steps.iter_mut().zip(ids) {
        let fields = step.as_object_mut().ok_or_else(|| {
            RabbitError::InvalidTaskStructure("step is not an object".to_string())
        })?;
        fields.insert("id".to_string(), Value::from(id));
        fields.insert("completed".to_string(), Value::Bool(false));
    }

    Ok(())
}

const TASK_TEXT_FIELDS: [&str; 2] = ["description", "estimatedTime"];
const STEP_TEXT_FIELDS: [&str; 5] = ["title", "description", "type", "searchQuery", "externalLink"];
const RESOURCE_TEXT_FIELDS: [&str; 3] = ["title", "url", "type"];

/// Models are loose with optional fields. Nulls fall back to defaults and
/// scalars such as `"estimatedTime": 15` become strings.
fn coerce_optional_fields(data: &mut Value) {
    let Some(task) = data.as_object_mut() else {
        return;
    };
    coerce_text(task, &TASK_TEXT_FIELDS);

    if let Some(Value::Array(steps)) = task.get_mut("steps") {
        for step in steps.iter_mut().filter_map(Value::as_object_mut) {
            coerce_text(step, &STEP_TEXT_FIELDS);
        }
    }

    if task.get("resources").is_some_and(|r| !r.is_array()) {
        debug!("Ignoring resources that are not a list");
        task.remove("resources");
    }
    if let Some(Value::Array(resources)) = task.get_mut("resources") {
        resources.retain(Value::is_object);
        for resource in resources.iter_mut().filter_map(Value::as_object_mut) {
            coerce_text(resource, &RESOURCE_TEXT_FIELDS);
        }
    }
}

fn coerce_text(fields: &mut serde_json::Map<String, Value>, names: &[&str]) {
    for name in names {
        let text = match fields.get(*name) {
            Some(Value::String(_)) | None => continue,
            Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            Some(other) => Some(other.to_string()),
        };
        match text {
            Some(text) => fields.insert(name.to_string(), Value::String(text)),
            None => fields.remove(*name),
        };
    }
}

/// Positive integer id, or a numeric string the model quoted
fn step_id(value: &Value) -> Option<u32> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;

    u32::try_from(id).ok().filter(|id| *id > 0)
}

/// Content of a surrounding markdown code fence, or the trimmed input
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(after_start) = trimmed.strip_prefix("```") {
        // Skip language identifier if present
        let code_start = after_start.find('\n').map(|i| i + 1).unwrap_or(0);
        let code_content = &after_start[code_start..];

        if let Some(end) = code_content.rfind("```") {
            return code_content[..end].trim();
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedCompleter {
        reply: String,
        calls: Mutex<Vec<(String, Value, f32)>>,
    }

    impl FixedCompleter {
        fn new(reply: impl Into<String>) -> Self {
            Self {
                reply: reply.into(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TaskCompleter for FixedCompleter {
        async fn complete(
            &self,
            system_prompt: &str,
            user_payload: Value,
            temperature: f32,
        ) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_payload, temperature));
            Ok(self.reply.clone())
        }
    }

    struct FailingCompleter;

    #[async_trait]
    impl TaskCompleter for FailingCompleter {
        async fn complete(&self, _: &str, _: Value, _: f32) -> Result<String> {
            Err(RabbitError::Api {
                status: 500,
                body: "down".into(),
            })
        }
    }

    fn four_steps_without_ids() -> String {
        json!({
            "title": "Brew better tea",
            "description": "Learn the basics",
            "estimatedTime": "15 minutes",
            "steps": [
                {"title": "Boil water", "description": "...", "type": "action"},
                {"title": "Read the label", "description": "...", "type": "read"},
                {"title": "Compare leaves", "description": "...", "type": "research",
                 "searchQuery": "green vs black tea"},
                {"title": "Brew a cup", "description": "...", "type": "practice"}
            ],
            "resources": [{"title": "Guide", "url": "https://tea.test", "type": "article"}]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_generate_assigns_positional_ids() {
        let completer = FixedCompleter::new(four_steps_without_ids());
        let task = generate_task("Some tea article", &Profile::default(), &completer)
            .await
            .unwrap();

        assert_eq!(task.title, "Brew better tea");
        assert_eq!(task.estimated_time, "15 minutes");
        let ids: Vec<u32> = task.steps.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(task.steps.iter().all(|s| !s.completed));
        assert_eq!(task.steps[2].search_query.as_deref(), Some("green vs black tea"));
        assert_eq!(task.resources.len(), 1);
    }

    #[tokio::test]
    async fn test_generate_sends_prompt_and_temperature() {
        let completer = FixedCompleter::new(four_steps_without_ids());
        generate_task("Some tea article", &Profile::default(), &completer)
            .await
            .unwrap();

        let calls = completer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (system, payload, temperature) = &calls[0];
        assert!(system.contains("Knowledge Level: beginner"));
        assert_eq!(
            payload,
            &Value::String(
                "Convert this web content into an interactive learning task:\n\nSome tea article"
                    .to_string()
            )
        );
        assert!((temperature - TASK_TEMPERATURE).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_completion_errors_pass_through() {
        let err = generate_task("text", &Profile::default(), &FailingCompleter)
            .await
            .unwrap_err();
        assert!(matches!(err, RabbitError::Api { status: 500, .. }));
    }

    #[test]
    fn test_missing_steps_is_invalid() {
        let err = parse_task_response(r#"{"title": "No steps"}"#).unwrap_err();
        assert!(matches!(err, RabbitError::InvalidTaskStructure(_)));
    }

    #[test]
    fn test_missing_title_is_invalid() {
        let err = parse_task_response(r#"{"steps": [{"title": "a"}]}"#).unwrap_err();
        assert!(matches!(err, RabbitError::InvalidTaskStructure(_)));

        let blank = parse_task_response(r#"{"title": " ", "steps": [{"title": "a"}]}"#);
        assert!(blank.is_err());
    }

    #[test]
    fn test_steps_must_be_non_empty_array() {
        assert!(parse_task_response(r#"{"title": "t", "steps": {}}"#).is_err());
        assert!(parse_task_response(r#"{"title": "t", "steps": []}"#).is_err());
        assert!(parse_task_response(r#"{"title": "t", "steps": ["oops"]}"#).is_err());
    }

    #[test]
    fn test_not_json_is_invalid() {
        let err = parse_task_response("Sure! Here is your task.").unwrap_err();
        assert!(matches!(err, RabbitError::InvalidTaskStructure(_)));
    }

    #[test]
    fn test_fenced_json_is_accepted() {
        let fenced = format!("```json\n{}\n```", four_steps_without_ids());
        let task = parse_task_response(&fenced).unwrap();
        assert_eq!(task.steps.len(), 4);
    }

    #[test]
    fn test_model_ids_kept_when_unique() {
        let task = parse_task_response(
            r#"{"title": "t", "steps": [{"id": 10}, {"id": "20"}, {"id": 0}], "completed": true}"#,
        )
        .unwrap();
        let ids: Vec<u32> = task.steps.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![10, 20, 3]);
    }

    #[test]
    fn test_duplicate_ids_are_renumbered() {
        let task = parse_task_response(
            r#"{"title": "t", "steps": [{"id": 1}, {"id": 1}, {"id": 2, "completed": true}]}"#,
        )
        .unwrap();
        let ids: Vec<u32> = task.steps.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(task.steps.iter().all(|s| !s.completed));
    }

    #[test]
    fn test_numeric_estimated_time_is_accepted() {
        let task = parse_task_response(
            r#"{"title": "T", "estimatedTime": 15, "steps": [{"title": "a"}, {"title": "b"}, {"title": "c"}]}"#,
        )
        .unwrap();
        assert_eq!(task.estimated_time, "15");
        assert_eq!(task.steps.len(), 3);
    }

    #[test]
    fn test_null_optional_fields_use_defaults() {
        let task = parse_task_response(
            r#"{"title": "T", "description": null, "resources": null,
                "steps": [{"title": "a", "type": null, "description": null, "searchQuery": null}]}"#,
        )
        .unwrap();
        assert!(task.description.is_empty());
        assert!(task.resources.is_empty());
        assert_eq!(task.steps[0].step_type, StepKind::Action);
        assert!(task.steps[0].description.is_empty());
        assert!(task.steps[0].search_query.is_none());
    }

    #[test]
    fn test_loose_step_and_resource_fields() {
        let task = parse_task_response(
            r#"{"title": "T",
                "steps": [{"title": 42, "type": 7, "externalLink": true}],
                "resources": ["https://loose.test", {"title": "Docs", "url": null, "type": 1}]}"#,
        )
        .unwrap();
        let step = &task.steps[0];
        assert_eq!(step.title, "42");
        assert_eq!(step.step_type, StepKind::Other);
        assert_eq!(step.external_link.as_deref(), Some("true"));

        assert_eq!(task.resources.len(), 1);
        assert_eq!(task.resources[0].title, "Docs");
        assert!(task.resources[0].url.is_empty());
        assert_eq!(task.resources[0].resource_type, "1");
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }
}
