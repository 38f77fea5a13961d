//! Interaction state machine for the release wizard.
//!
//! A workflow moves through four prompts: branch, version, build number, and
//! confirmation. Each step is a function of the pressed control's action name
//! and the token carried in its value. Nothing is kept between requests; the
//! only server-side state is the manifest snapshot the token points at.
//!
//! ```text
//! AwaitingBranch --branch--> AwaitingVersion --version--> AwaitingBuildNumber
//!     --build_number--> AwaitingConfirmation --run:<lane>--> (release job)
//! any step --cancel--> (acknowledgement)
//! ```

pub mod error;
pub mod snapshot;
pub mod token;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::api::providers::chat::{Attachment, Control, Message, SelectOption};
use crate::api::providers::repo::SourceHost;
use crate::config::{ManifestConfig, ReleaseLane};
use crate::manifest::ManifestSnapshot;
use crate::release::ReleaseJob;
use crate::version::{following_build_numbers, parse_build_number, ReleaseCandidates};

pub use error::WorkflowError;
pub use snapshot::SnapshotStore;
pub use token::WorkflowToken;

pub const ACTION_BRANCH: &str = "branch";
pub const ACTION_VERSION: &str = "version";
pub const ACTION_BUILD_NUMBER: &str = "build_number";
pub const ACTION_CANCEL: &str = "cancel";
/// Prefix of the confirmation actions; the rest is a release lane id
pub const ACTION_RUN_PREFIX: &str = "run:";

/// Callback id on every prompt attachment
pub const CALLBACK_ID: &str = "release";

/// Build numbers offered in the select menu after the default one
pub const BUILD_NUMBER_ALTERNATIVES: usize = 5;

const COLOR_DANGER: &str = "danger";

/// The step a pressed control asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Branch,
    Version,
    BuildNumber,
    Run(String),
    Cancel,
}

impl Action {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            ACTION_BRANCH => Some(Action::Branch),
            ACTION_VERSION => Some(Action::Version),
            ACTION_BUILD_NUMBER => Some(Action::BuildNumber),
            ACTION_CANCEL => Some(Action::Cancel),
            other => other
                .strip_prefix(ACTION_RUN_PREFIX)
                .filter(|lane| !lane.is_empty())
                .map(|lane| Action::Run(lane.to_string())),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Action::Branch => ACTION_BRANCH.to_string(),
            Action::Version => ACTION_VERSION.to_string(),
            Action::BuildNumber => ACTION_BUILD_NUMBER.to_string(),
            Action::Run(lane) => format!("{ACTION_RUN_PREFIX}{lane}"),
            Action::Cancel => ACTION_CANCEL.to_string(),
        }
    }
}

/// One pressed control, as delivered by the chat platform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interaction {
    /// Control name
    pub action: String,
    /// Control value, or the selected option's value for a select menu
    pub value: String,
    pub user_name: String,
    pub channel_id: String,
}

/// What a step produced
#[derive(Debug)]
pub enum Transition {
    /// Replace the prompt with the next one
    Prompt(Message),
    /// The release was confirmed; the job must be started in the background
    /// and the acknowledgement returned right away.
    Dispatched {
        acknowledgement: Message,
        job: ReleaseJob,
    },
    Cancelled(Message),
}

impl Transition {
    /// The message that answers the interaction
    pub fn message(&self) -> &Message {
        match self {
            Transition::Prompt(message) | Transition::Cancelled(message) => message,
            Transition::Dispatched {
                acknowledgement, ..
            } => acknowledgement,
        }
    }
}

pub struct Workflow {
    source: Arc<dyn SourceHost>,
    snapshots: SnapshotStore,
    manifest: ManifestConfig,
    lanes: Vec<ReleaseLane>,
}

impl Workflow {
    pub fn new(
        source: Arc<dyn SourceHost>,
        snapshots: SnapshotStore,
        manifest: ManifestConfig,
        lanes: Vec<ReleaseLane>,
    ) -> Self {
        Self {
            source,
            snapshots,
            manifest,
            lanes,
        }
    }

    /// Advance the workflow by one step.
    #[instrument(skip(self, interaction), fields(action = %interaction.action, user = %interaction.user_name))]
    pub async fn advance(&self, interaction: &Interaction) -> Result<Transition, WorkflowError> {
        let action = Action::parse(&interaction.action).ok_or_else(|| {
            WorkflowError::MalformedRequest(format!("unknown action `{}`", interaction.action))
        })?;

        match action {
            Action::Branch => self.choose_branch(&interaction.value).await,
            Action::Version => choose_version(&WorkflowToken::decode(&interaction.value)),
            Action::BuildNumber => {
                choose_build_number(&WorkflowToken::decode(&interaction.value), &self.lanes)
            }
            Action::Run(lane_id) => {
                self.run(&lane_id, &WorkflowToken::decode(&interaction.value), interaction)
                    .await
            }
            Action::Cancel => {
                info!(user = %interaction.user_name, "Release canceled");
                Ok(Transition::Cancelled(notice(format!(
                    "Operation canceled by '{}'.",
                    interaction.user_name
                ))))
            }
        }
    }

    /// Step 1. The value is a bare branch name from the branch prompt, or a
    /// token that already names one.
    async fn choose_branch(&self, value: &str) -> Result<Transition, WorkflowError> {
        let token = WorkflowToken::decode(value);
        let branch = if token.is_resumed() {
            token.branch
        } else {
            value.trim().to_string()
        };
        if branch.is_empty() {
            return Err(WorkflowError::invalid_transition("no branch was selected"));
        }

        debug!(branch = %branch, path = %self.manifest.path, "Fetching manifest");
        let bytes = self.source.download_file(&branch, &self.manifest.path).await?;
        let manifest = ManifestSnapshot::decode(&bytes, &self.manifest)?;
        let candidates =
            ReleaseCandidates::derive(manifest.current_version(), manifest.current_build_number())?;
        let manifest_ref = self.snapshots.put(&bytes).await?;

        let token = WorkflowToken {
            branch,
            current_version: candidates.current_version,
            current_build_number: candidates.current_build_number,
            next_patch: candidates.next_patch,
            next_minor: candidates.next_minor,
            next_major: candidates.next_major,
            next_build_number: candidates.next_build_number,
            manifest_ref,
            ..WorkflowToken::fresh()
        };
        if let Err(e) = widest_token(&token).and_then(|t| t.ensure_encodable()) {
            self.snapshots.discard(&token.manifest_ref).await;
            return Err(e);
        }
        Ok(Transition::Prompt(version_prompt(&token)))
    }

    /// Terminal step: apply the release to the snapshot and hand it off.
    async fn run(
        &self,
        lane_id: &str,
        token: &WorkflowToken,
        interaction: &Interaction,
    ) -> Result<Transition, WorkflowError> {
        let lane = self
            .lanes
            .iter()
            .find(|l| l.id == lane_id)
            .ok_or_else(|| {
                WorkflowError::invalid_transition(format!("unknown release lane `{lane_id}`"))
            })?;
        require_build_number(token)?;

        let bytes = self.snapshots.get(&token.manifest_ref).await?;
        let manifest = ManifestSnapshot::decode(&bytes, &self.manifest)?;
        let file_content = manifest.with_release(&token.version, &token.build_number)?;
        self.snapshots.discard(&token.manifest_ref).await;

        let commit_branch = format!(
            "{}/{}-{}-{}",
            lane.branch_prefix,
            token.version,
            token.build_number,
            Utc::now().timestamp()
        );
        let job = ReleaseJob {
            channel_id: interaction.channel_id.clone(),
            version: token.version.clone(),
            build_number: token.build_number.clone(),
            target_branch: token.branch.clone(),
            commit_branch,
            title: format!("Release {}", token.next_label()),
            file_path: self.manifest.path.clone(),
            file_content,
        };
        info!(
            release = %job.label(),
            lane = %lane.id,
            branch = %job.commit_branch,
            "Release confirmed"
        );

        let acknowledgement = notice(format!(
            "Releasing `{}` to {} ...",
            token.next_label(),
            lane.destination
        ));
        Ok(Transition::Dispatched {
            acknowledgement,
            job,
        })
    }
}

/// The largest token any later prompt can carry for this workflow.
fn widest_token(token: &WorkflowToken) -> Result<WorkflowToken, WorkflowError> {
    let version = [
        &token.current_version,
        &token.next_patch,
        &token.next_minor,
        &token.next_major,
    ]
    .into_iter()
    .max_by_key(|v| v.len())
    .cloned()
    .unwrap_or_default();
    let build_number = following_build_numbers(&token.next_build_number, BUILD_NUMBER_ALTERNATIVES)?
        .pop()
        .unwrap_or_else(|| token.next_build_number.clone());
    Ok(token.with_version(version).with_build_number(build_number))
}

/// Step 2
fn choose_version(token: &WorkflowToken) -> Result<Transition, WorkflowError> {
    require_version(token)?;
    Ok(Transition::Prompt(build_number_prompt(token)?))
}

/// Step 3
fn choose_build_number(
    token: &WorkflowToken,
    lanes: &[ReleaseLane],
) -> Result<Transition, WorkflowError> {
    require_build_number(token)?;
    Ok(Transition::Prompt(confirmation_prompt(token, lanes)))
}

fn require_snapshot(token: &WorkflowToken) -> Result<(), WorkflowError> {
    if !token.is_resumed() {
        return Err(WorkflowError::invalid_transition("no branch has been chosen"));
    }
    if token.manifest_ref.is_empty() {
        return Err(WorkflowError::invalid_transition(
            "workflow has no manifest snapshot",
        ));
    }
    Ok(())
}

fn require_version(token: &WorkflowToken) -> Result<(), WorkflowError> {
    require_snapshot(token)?;
    if token.version.is_empty() {
        return Err(WorkflowError::invalid_transition("no version has been chosen"));
    }
    let offered = [
        &token.current_version,
        &token.next_patch,
        &token.next_minor,
        &token.next_major,
    ];
    if !offered.iter().any(|v| **v == token.version) {
        return Err(WorkflowError::invalid_transition(format!(
            "`{}` is not one of the offered versions",
            token.version
        )));
    }
    Ok(())
}

fn require_build_number(token: &WorkflowToken) -> Result<(), WorkflowError> {
    require_version(token)?;
    if token.build_number.is_empty() {
        return Err(WorkflowError::invalid_transition(
            "no build number has been chosen",
        ));
    }
    parse_build_number(&token.build_number)?;
    Ok(())
}

fn prompt(text: String, actions: Vec<Control>) -> Message {
    let attachment = actions
        .into_iter()
        .fold(Attachment::new(text).callback(CALLBACK_ID), Attachment::action);
    Message::default()
        .with_attachment(attachment)
        .replacing_original()
}

/// Controls removed, one line of status in their place.
fn notice(title: String) -> Message {
    let attachment = Attachment {
        callback_id: CALLBACK_ID.to_string(),
        ..Attachment::default()
    }
    .field(title, "");
    Message::default()
        .with_attachment(attachment)
        .replacing_original()
}

pub fn cancel_control() -> Control {
    Control::button(ACTION_CANCEL, "Cancel", ACTION_CANCEL).danger()
}

fn version_prompt(token: &WorkflowToken) -> Message {
    let text = format!(
        "Branch: `{}` ✔︎\nCurrent Version: `{}`\nNext Version:",
        token.branch,
        token.current_label()
    );
    let button = |version: &str| {
        Control::button(ACTION_VERSION, version, token.with_version(version).encode())
    };
    prompt(
        text,
        vec![
            button(&token.current_version).primary(),
            button(&token.next_patch),
            button(&token.next_minor),
            button(&token.next_major),
            cancel_control(),
        ],
    )
}

fn build_number_prompt(token: &WorkflowToken) -> Result<Message, WorkflowError> {
    let text = format!(
        "Branch: `{}` ✔︎\nCurrent Version: `{}`\nNext Version: `{}` ✔︎\nBuild:",
        token.branch,
        token.current_label(),
        token.version
    );
    let default_build = Control::button(
        ACTION_BUILD_NUMBER,
        &token.next_build_number,
        token.with_build_number(&token.next_build_number).encode(),
    )
    .primary();
    let options = following_build_numbers(&token.next_build_number, BUILD_NUMBER_ALTERNATIVES)?
        .into_iter()
        .map(|build| {
            let value = token.with_build_number(&build).encode();
            SelectOption::new(build, value)
        })
        .collect();

    Ok(prompt(
        text,
        vec![
            default_build,
            Control::select(ACTION_BUILD_NUMBER, "Build number", options),
            cancel_control(),
        ],
    ))
}

fn confirmation_prompt(token: &WorkflowToken, lanes: &[ReleaseLane]) -> Message {
    let text = format!(
        "Branch: `{}` ✔︎\nCurrent Version: `{}`\nNext Version: `{}` ✔︎",
        token.branch,
        token.current_label(),
        token.next_label()
    );
    let value = token.encode();
    let mut actions: Vec<Control> = lanes
        .iter()
        .enumerate()
        .map(|(i, lane)| {
            let control = Control::button(Action::Run(lane.id.clone()).name(), &lane.label, &value);
            if i == 0 {
                control.primary()
            } else {
                control
            }
        })
        .collect();
    actions.push(cancel_control());
    prompt(text, actions)
}

/// In-channel rendering of a failed step. The prompt's controls are removed
/// so the failed workflow cannot be continued.
pub fn render_error(err: &WorkflowError) -> Message {
    let attachment = Attachment {
        callback_id: CALLBACK_ID.to_string(),
        ..Attachment::default()
    }
    .color(COLOR_DANGER)
    .field(err.title(), err.to_string());
    Message::default()
        .with_attachment(attachment)
        .replacing_original()
}
