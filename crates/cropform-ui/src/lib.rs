#![warn(missing_docs)]
//! # cropform-ui
//!
//! ## Purpose
//! Defines the page-facing state the pipeline mutates: submit control, busy
//! indicator, dialog visibility, slot previews, and user-visible messages.
//!
//! ## Responsibilities
//! - Disable and relabel the submit control while a request is in flight and
//!   restore it afterwards.
//! - Track which preview surface shows which file.
//! - Queue alert-style messages for the shell to display.
//!
//! ## Data flow
//! The page controller mutates [`UiState`] from its event handlers; the shell
//! renders it.
//!
//! ## Ownership and lifetimes
//! `UiState` owns every string so handlers can update it without borrowing
//! from form state.
//!
//! ## Error model
//! This crate favors explicit state over recoverable errors.
//!
//! ## Security and privacy notes
//! Previews reference files by content digest; image bytes are not copied
//! into UI state.

use std::collections::BTreeMap;

use cropform_core::{ElementId, FileValue, FormMarkup};

/// Label shown on the submit control while a request is in flight.
pub const SUBMITTING_LABEL: &str = "Submitting...";

/// Generic stage status used for the submission flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Stage has not started.
    Idle,
    /// Stage is currently running.
    Running,
    /// Stage completed successfully.
    Healthy,
    /// Stage encountered non-fatal error.
    Degraded,
}

/// Visible state of the submit control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitControlState {
    /// Whether the control accepts clicks.
    pub enabled: bool,
    /// Current label.
    pub label: String,
}

/// What a preview surface currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewContent {
    /// Placeholder.
    Empty,
    /// An image file.
    Image {
        /// Displayed file name.
        file_name: String,
        /// SHA-256 of the displayed bytes.
        content_digest: String,
        /// Size of the displayed bytes.
        byte_len: usize,
    },
}

impl PreviewContent {
    /// Preview for a file value.
    pub fn for_file(file: &FileValue) -> Self {
        Self::Image {
            file_name: file.name.clone(),
            content_digest: file.digest(),
            byte_len: file.bytes.len(),
        }
    }

    /// Digest of the displayed image, if any.
    pub fn digest(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Image { content_digest, .. } => Some(content_digest.as_str()),
        }
    }
}

/// Aggregate UI runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    /// Submit control state.
    pub submit_control: SubmitControlState,
    /// Busy indicator visibility.
    pub busy_indicator_visible: bool,
    /// Crop dialog visibility.
    pub crop_dialog_visible: bool,
    /// Camera dialog visibility.
    pub camera_dialog_visible: bool,
    /// Submission stage status.
    pub submission: StageStatus,
    /// Location the page navigated to, once it has.
    pub navigated_to: Option<String>,
    idle_label: String,
    previews: BTreeMap<ElementId, PreviewContent>,
    messages: Vec<String>,
}

impl UiState {
    /// Creates the initial state for a page.
    pub fn new(markup: &FormMarkup) -> Self {
        Self {
            submit_control: SubmitControlState {
                enabled: true,
                label: markup.submit_control.label.clone(),
            },
            busy_indicator_visible: false,
            crop_dialog_visible: false,
            camera_dialog_visible: false,
            submission: StageStatus::Idle,
            navigated_to: None,
            idle_label: markup.submit_control.label.clone(),
            previews: BTreeMap::new(),
            messages: Vec::new(),
        }
    }

    /// Disables the submit control and shows the busy indicator.
    pub fn begin_submission(&mut self) {
        self.submit_control.enabled = false;
        self.submit_control.label = SUBMITTING_LABEL.to_string();
        self.busy_indicator_visible = true;
        self.submission = StageStatus::Running;
    }

    /// Restores the submit control, hides the busy indicator, and shows
    /// `message`.
    pub fn fail_submission(&mut self, message: impl Into<String>) {
        self.submit_control.enabled = true;
        self.submit_control.label = self.idle_label.clone();
        self.busy_indicator_visible = false;
        self.submission = StageStatus::Degraded;
        self.show_message(message);
    }

    /// Records navigation after a successful submission. The control stays
    /// disabled while the page unloads.
    pub fn navigate(&mut self, location: impl Into<String>) {
        self.submission = StageStatus::Healthy;
        self.navigated_to = Some(location.into());
    }

    /// Queues an alert-style message.
    pub fn show_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Most recent message.
    pub fn last_message(&self) -> Option<&str> {
        self.messages.last().map(String::as_str)
    }

    /// Drains queued messages.
    pub fn take_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    /// Replaces the content of a preview surface.
    pub fn set_preview(&mut self, preview: &ElementId, content: PreviewContent) {
        self.previews.insert(preview.clone(), content);
    }

    /// Content of a preview surface; unset surfaces are empty.
    pub fn preview(&self, preview: &ElementId) -> PreviewContent {
        self.previews
            .get(preview)
            .cloned()
            .unwrap_or(PreviewContent::Empty)
    }
}
