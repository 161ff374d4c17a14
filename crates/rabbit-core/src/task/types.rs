//! Interactive task records produced by the task generation adapter.

use serde::{Deserialize, Serialize};

/// Structured checklist derived from page content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub estimated_time: String,
    /// Never empty; ids are unique
    pub steps: Vec<TaskStep>,
    #[serde(default)]
    pub resources: Vec<TaskResource>,
}

impl InteractiveTask {
    /// Mark a step done. Returns true only when the step was open before,
    /// so a caller can grant the step reward exactly once.
    pub fn complete_step(&mut self, id: u32) -> bool {
        match self.steps.iter_mut().find(|s| s.id == id) {
            Some(step) if !step.completed => {
                step.completed = true;
                true
            }
            _ => false,
        }
    }

    /// `(completed, total)` step counts
    pub fn progress(&self) -> (usize, usize) {
        let done = self.steps.iter().filter(|s| s.completed).count();
        (done, self.steps.len())
    }

    pub fn is_finished(&self) -> bool {
        self.steps.iter().all(|s| s.completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStep {
    pub id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub step_type: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_link: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    #[default]
    Action,
    Read,
    Research,
    Practice,
    /// Anything the model invents outside the four known kinds
    #[serde(other)]
    Other,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Action => "action",
            StepKind::Read => "read",
            StepKind::Research => "research",
            StepKind::Practice => "practice",
            StepKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResource {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> InteractiveTask {
        serde_json::from_value(serde_json::json!({
            "title": "Learn",
            "steps": [
                {"id": 1, "title": "a", "type": "read"},
                {"id": 2, "title": "b", "type": "quiz"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_unknown_step_kind_is_other() {
        let task = task();
        assert_eq!(task.steps[0].step_type, StepKind::Read);
        assert_eq!(task.steps[1].step_type, StepKind::Other);
        assert!(task.resources.is_empty());
    }

    #[test]
    fn test_complete_step_once() {
        let mut task = task();
        assert_eq!(task.progress(), (0, 2));

        assert!(task.complete_step(2));
        assert!(!task.complete_step(2));
        assert!(!task.complete_step(9));
        assert_eq!(task.progress(), (1, 2));
        assert!(!task.is_finished());

        assert!(task.complete_step(1));
        assert!(task.is_finished());
    }
}
