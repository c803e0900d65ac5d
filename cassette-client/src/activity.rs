//! Projection of the code-generation backend's custom events.
//!
//! The core client treats `CUSTOM` events as opaque. The multi-agent code
//! generation backend uses a fixed set of names to describe its pipeline:
//!
//! | name              | payload                                     |
//! |-------------------|---------------------------------------------|
//! | `agent_activity`  | an agent's progress line                    |
//! | `agent_result`    | an agent's findings and applied fixes       |
//! | `workflow_update` | the full pipeline step list                 |
//! | `project_plan`    | the planned file list of a multi-file run   |
//! | `file_started`    | generation of one planned file began        |
//! | `file_completed`  | one file's generated content                |
//! | `file_updated`    | one file's content after an agent's fixes   |
//! | `code_update`     | single-file code after an agent's fixes     |
//!
//! [`ActivityProjection`] subscribes to these names and folds them into an
//! [`ActivityView`]. Payload keys are accepted in camelCase or snake_case. A
//! payload that does not have the expected shape is logged and ignored.

use std::collections::HashMap;
use std::sync::Arc;

use cassette_protocol::{AguiEvent, EventKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::SubscriptionId;
use crate::client::AguiClient;

pub const AGENT_ACTIVITY: &str = "agent_activity";
pub const AGENT_RESULT: &str = "agent_result";
pub const WORKFLOW_UPDATE: &str = "workflow_update";
pub const PROJECT_PLAN: &str = "project_plan";
pub const FILE_STARTED: &str = "file_started";
pub const FILE_COMPLETED: &str = "file_completed";
pub const FILE_UPDATED: &str = "file_updated";
pub const CODE_UPDATE: &str = "code_update";

/// Every custom event name the projection understands.
pub const ACTIVITY_EVENTS: [&str; 8] = [
    AGENT_ACTIVITY,
    AGENT_RESULT,
    WORKFLOW_UPDATE,
    PROJECT_PLAN,
    FILE_STARTED,
    FILE_COMPLETED,
    FILE_UPDATED,
    CODE_UPDATE,
];

/// One progress line from an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentActivity {
    #[serde(alias = "agent_name")]
    pub agent_name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub message: String,
    /// Percentage, when the agent reports one.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub stats: Option<Value>,
}

/// Final report of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    #[serde(alias = "agent_name")]
    pub agent_name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub fixes: Vec<Value>,
    #[serde(default)]
    pub stats: Option<Value>,
}

/// One entry of the pipeline timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// `pending`, `active` or `complete`.
    #[serde(default)]
    pub status: String,
    /// Seconds spent in the step, once complete.
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedFile {
    pub path: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
}

/// File layout proposed by the planner for a multi-file run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPlan {
    #[serde(default, alias = "project_name")]
    pub project_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub files: Vec<PlannedFile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Generating,
    Completed,
    /// Rewritten by a reviewing agent after completion.
    Updated,
}

/// A generated file as last reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedFile {
    pub path: String,
    pub language: Option<String>,
    pub purpose: Option<String>,
    pub status: FileStatus,
    pub content: String,
    pub lines: Option<u64>,
    /// Agent that last rewrote the file.
    pub updated_by: Option<String>,
}

/// Latest whole-program code of a single-file run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeUpdate {
    pub code: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub fixes: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileStartedPayload {
    #[serde(alias = "file_path")]
    file_path: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    purpose: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileContentPayload {
    #[serde(alias = "file_path")]
    file_path: String,
    content: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    lines: Option<u64>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WorkflowPayload {
    Wrapped { steps: Vec<WorkflowStep> },
    Bare(Vec<WorkflowStep>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanPayload {
    Wrapped { plan: ProjectPlan },
    Bare(ProjectPlan),
}

/// Everything the projection has seen during the current run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityView {
    /// Activity lines in arrival order.
    pub activities: Vec<AgentActivity>,
    /// Agent reports in arrival order.
    pub results: Vec<AgentResult>,
    /// Latest pipeline step list.
    pub workflow: Vec<WorkflowStep>,
    pub plan: Option<ProjectPlan>,
    files: Vec<GeneratedFile>,
    #[serde(skip)]
    file_index: HashMap<String, usize>,
    pub code: Option<CodeUpdate>,
}

impl ActivityView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files in the order they were first reported.
    pub fn files(&self) -> &[GeneratedFile] {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&GeneratedFile> {
        self.file_index.get(path).map(|&slot| &self.files[slot])
    }

    /// Most recent activity line of the named agent.
    pub fn latest_activity(&self, agent_name: &str) -> Option<&AgentActivity> {
        self.activities
            .iter()
            .rev()
            .find(|a| a.agent_name == agent_name)
    }

    /// The step currently marked `active`, if any.
    pub fn active_step(&self) -> Option<&WorkflowStep> {
        self.workflow.iter().find(|s| s.status == "active")
    }

    /// Fold one custom event.
    ///
    /// Returns `Ok(false)` for names this view does not track.
    pub fn apply(&mut self, name: &str, value: &Value) -> Result<bool, serde_json::Error> {
        match name {
            AGENT_ACTIVITY => self.activities.push(AgentActivity::deserialize(value)?),
            AGENT_RESULT => self.results.push(AgentResult::deserialize(value)?),
            WORKFLOW_UPDATE => {
                self.workflow = match WorkflowPayload::deserialize(value)? {
                    WorkflowPayload::Wrapped { steps } | WorkflowPayload::Bare(steps) => steps,
                };
            }
            PROJECT_PLAN => {
                self.plan = Some(match PlanPayload::deserialize(value)? {
                    PlanPayload::Wrapped { plan } | PlanPayload::Bare(plan) => plan,
                });
            }
            FILE_STARTED => {
                let payload = FileStartedPayload::deserialize(value)?;
                self.upsert_file(GeneratedFile {
                    path: payload.file_path,
                    language: payload.language,
                    purpose: payload.purpose,
                    status: FileStatus::Generating,
                    content: String::new(),
                    lines: None,
                    updated_by: None,
                });
            }
            FILE_COMPLETED | FILE_UPDATED => {
                let payload = FileContentPayload::deserialize(value)?;
                let status = if name == FILE_COMPLETED {
                    FileStatus::Completed
                } else {
                    FileStatus::Updated
                };
                let previous = self.file(&payload.file_path).cloned();
                let lines = payload
                    .lines
                    .unwrap_or_else(|| payload.content.lines().count() as u64);
                self.upsert_file(GeneratedFile {
                    language: payload
                        .language
                        .or_else(|| previous.as_ref().and_then(|f| f.language.clone())),
                    purpose: previous.as_ref().and_then(|f| f.purpose.clone()),
                    updated_by: payload
                        .source
                        .or_else(|| previous.and_then(|f| f.updated_by)),
                    path: payload.file_path,
                    status,
                    content: payload.content,
                    lines: Some(lines),
                });
            }
            CODE_UPDATE => self.code = Some(CodeUpdate::deserialize(value)?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn upsert_file(&mut self, file: GeneratedFile) {
        match self.file_index.get(&file.path) {
            Some(&slot) => self.files[slot] = file,
            None => {
                self.file_index.insert(file.path.clone(), self.files.len());
                self.files.push(file);
            }
        }
    }
}

/// Keeps an [`ActivityView`] current by subscribing to a client.
///
/// The view is cleared whenever a `RUN_STARTED` event arrives.
///
/// # Example
/// ```no_run
/// use cassette_client::{activity::ActivityProjection, AguiClient};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), cassette_client::ClientError> {
/// let client = AguiClient::new("http://localhost:8000/api/agui/generate")?;
/// let activity = ActivityProjection::attach(&client);
///
/// client.run(&json!({"prompt": "todo app with a REST API"})).await?;
///
/// for file in activity.view().files() {
///     println!("{} ({:?} lines)", file.path, file.lines);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ActivityProjection {
    view: Arc<RwLock<ActivityView>>,
    subscriptions: Vec<SubscriptionId>,
}

impl ActivityProjection {
    /// Subscribe a new projection to `client`.
    pub fn attach(client: &AguiClient) -> Self {
        let view = Arc::new(RwLock::new(ActivityView::new()));
        let mut subscriptions = Vec::with_capacity(ACTIVITY_EVENTS.len() + 1);

        let reset_view = view.clone();
        subscriptions.push(
            client.subscribe(EventKind::RunStarted, move |_: &AguiEvent| {
                *reset_view.write() = ActivityView::new();
            }),
        );

        for name in ACTIVITY_EVENTS {
            let handler_view = view.clone();
            subscriptions.push(client.subscribe_custom(name, move |event: &AguiEvent| {
                if let AguiEvent::Custom { name, value } = event {
                    if let Err(e) = handler_view.write().apply(name, value) {
                        log::warn!("Ignoring malformed '{}' payload: {}", name, e);
                    }
                }
            }));
        }

        Self {
            view,
            subscriptions,
        }
    }

    /// Copy of the current view.
    pub fn view(&self) -> ActivityView {
        self.view.read().clone()
    }

    pub fn reset(&self) {
        *self.view.write() = ActivityView::new();
    }

    /// Remove this projection's subscriptions from `client`.
    pub fn detach(&self, client: &AguiClient) {
        for id in &self.subscriptions {
            client.unsubscribe(*id);
        }
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
