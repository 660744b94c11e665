#![warn(missing_docs)]
//! # cropform-app
//!
//! ## Purpose
//! Orchestrates acquisition, crop, file synthesis, and submission for one
//! form page.
//!
//! ## Responsibilities
//! - Wire discovered photo slots to page events through a binding table.
//! - Own the single active target and the shared crop and camera dialogs.
//! - Write committed crops into slot file inputs and previews.
//! - Gate, send, and react to the form submission.
//! - Load runtime configuration from the environment.
//!
//! ## Data flow
//! [`PageEvent`] -> [`PageController::dispatch`] -> acquisition -> crop ->
//! [`synthesize_into_slot`] -> [`PageController::submit`] -> navigation or
//! recovery.
//!
//! ## Ownership and lifetimes
//! [`PageController`] owns every piece of mutable page state; handlers take
//! `&mut self`, so one page instance never shares state with another.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]. Handlers convert them into
//! user-visible messages; none of them leave the page unusable.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use cropform_capture::{
    AcquiredImage, AcquisitionSource, CameraBackend, CameraDialog, CaptureError, first_selected,
};
use cropform_core::{
    CoreError, ElementId, EncodedJpeg, FileOrigin, FileValue, FormMarkup, FormState, PhotoSlot,
    SlotId, discover_slots,
};
use cropform_crop::{CropDialog, CropError, CropSettings, CropSurface};
use cropform_submission_contract::{SubmissionContractError, SubmissionOutcome, SubmissionResponse};
use cropform_submit::{
    SubmissionRequest, SubmissionTransport, SubmitClient, SubmitError, TransportResponse,
};
use cropform_ui::{PreviewContent, UiState};
use thiserror::Error;
use url::Url;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("CROPFORM_VERSION");

/// Env var selecting the [`SubmissionPolicy`].
pub const ENV_SUBMIT_POLICY: &str = "CROPFORM_SUBMIT_POLICY";
/// Env var overriding the JPEG quality.
pub const ENV_JPEG_QUALITY: &str = "CROPFORM_JPEG_QUALITY";

/// Shown when the strict policy blocks a submission without a cropped photo.
pub const MSG_PHOTO_REQUIRED: &str = "Please choose and crop a photo.";
/// Shown for transport failures and malformed responses.
pub const MSG_NETWORK_ERROR: &str = "A network error occurred. Please try again.";
/// Prefix of server-reported failure messages.
pub const MSG_SERVER_ERROR_PREFIX: &str = "An error occurred: ";
/// Shown when camera permission is denied.
pub const MSG_CAMERA_DENIED: &str = "Camera access was denied. You can still choose a file.";
/// Shown when no camera can be used.
pub const MSG_CAMERA_UNAVAILABLE: &str =
    "No camera is available on this device. You can still choose a file.";
/// Shown when a camera frame could not be captured.
pub const MSG_CAMERA_FAILED: &str = "The camera stopped unexpectedly. Please try again.";
/// Shown when a chosen file is not a readable image.
pub const MSG_UNREADABLE_IMAGE: &str = "The selected file could not be read as an image.";
/// Shown when the crop could not be rendered.
pub const MSG_CROP_FAILED: &str = "The photo could not be cropped. Please try again.";

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Whether a submission requires at least one committed crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionPolicy {
    /// Block submission locally until some slot holds a committed crop.
    RequireCommittedPhoto,
    /// Submit whatever the form holds; only native `required` applies.
    #[default]
    Unconditional,
}

impl FromStr for SubmissionPolicy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "require-photo" | "require_committed_photo" => Ok(Self::RequireCommittedPhoto),
            "unconditional" => Ok(Self::Unconditional),
            other => Err(AppError::Config(format!("unknown submission policy: {other}"))),
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AppConfig {
    /// Submission precondition policy.
    pub submission_policy: SubmissionPolicy,
    /// Crop and JPEG parameters.
    pub crop: CropSettings,
}

impl AppConfig {
    /// Builds configuration from a key lookup, applying defaults for unset
    /// keys.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] for unparseable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(policy) = lookup(ENV_SUBMIT_POLICY) {
            config.submission_policy = policy.parse()?;
        }

        if let Some(quality) = lookup(ENV_JPEG_QUALITY) {
            let quality: u8 = quality
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("invalid jpeg quality: {quality}")))?;
            if !(1..=100).contains(&quality) {
                return Err(AppError::Config(format!(
                    "jpeg quality must be within 1..=100, got {quality}"
                )));
            }
            config.crop.jpeg_quality = quality;
        }

        Ok(config)
    }

    /// Builds configuration from process environment variables.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] for unparseable values.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Single-slot reference naming the slot bound to the shared dialogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveTarget {
    slot: Option<SlotId>,
}

impl ActiveTarget {
    /// Overwrites the current target unconditionally and returns the previous one.
    pub fn set_active(&mut self, slot: SlotId) -> Option<SlotId> {
        self.slot.replace(slot)
    }

    /// Resets to empty.
    pub fn clear(&mut self) {
        self.slot = None;
    }

    /// Current target.
    pub fn current(&self) -> Option<SlotId> {
        self.slot
    }
}

/// Role of a bound control within its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRole {
    /// Styled trigger that clicks through to the file input.
    ChooseTrigger,
    /// Native file input.
    FileInput,
    /// Camera trigger.
    CameraTrigger,
}

/// Event wiring produced by the registry pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotBindings {
    bindings: BTreeMap<ElementId, (SlotId, ControlRole)>,
}

impl SlotBindings {
    /// Binds every control of every slot.
    pub fn wire(slots: &[PhotoSlot]) -> Self {
        let mut bindings = BTreeMap::new();
        for slot in slots {
            bindings.insert(slot.file_input.clone(), (slot.id, ControlRole::FileInput));
            if let Some(choose) = &slot.choose_trigger {
                bindings.insert(choose.clone(), (slot.id, ControlRole::ChooseTrigger));
            }
            if let Some(camera) = &slot.camera_trigger {
                bindings.insert(camera.clone(), (slot.id, ControlRole::CameraTrigger));
            }
        }
        log::debug!(target: "registry", "wired controls={}", bindings.len());
        Self { bindings }
    }

    /// Looks up the slot and role bound to a control.
    pub fn lookup(&self, control: &ElementId) -> Option<(SlotId, ControlRole)> {
        self.bindings.get(control).copied()
    }

    /// Number of bound controls.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// User interaction delivered to the page controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// A control was clicked.
    Click(ElementId),
    /// A native file chooser returned a selection for an input.
    FilesChosen {
        /// File input that received the selection.
        input: ElementId,
        /// Selected files in chooser order.
        files: Vec<FileValue>,
    },
    /// The crop region was dragged.
    CropMove {
        /// Horizontal delta in source pixels.
        dx: i64,
        /// Vertical delta in source pixels.
        dy: i64,
    },
    /// The crop region was resized.
    CropResize {
        /// Requested edge length in source pixels.
        side: u32,
    },
    /// The crop dialog's confirm button.
    CropConfirm,
    /// The crop dialog was dismissed.
    CropDismiss,
    /// The camera dialog's capture button.
    CameraCapture,
    /// The camera dialog's cancel button.
    CameraCancel,
    /// The form's native submit action.
    Submit,
}

/// Side effect the shell must perform after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEffect {
    /// Nothing to do.
    None,
    /// Open the native file chooser of this input.
    OpenFileChooser(ElementId),
    /// Navigate the page to this location.
    Navigate(Url),
}

/// Result of confirming the crop dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The crop was written into the slot.
    Committed {
        /// Target slot.
        slot: SlotId,
        /// Digest of the synthesized file.
        digest: String,
    },
    /// No active target; nothing happened.
    NoTarget,
    /// The dialog held no image.
    NothingLoaded,
    /// Rendering failed; the dialog stays open.
    Failed,
}

/// Result of a submit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    /// A submission is already in flight or the page is navigating.
    Ignored,
    /// Rejected locally; no request was sent.
    Blocked,
    /// Accepted; the page navigates to this location.
    Navigated(Url),
    /// The request failed; the control is re-enabled.
    Failed,
}

/// Writes a committed crop into `slot`: the file input holds exactly the
/// synthesized file and the preview shows it.
///
/// # Errors
/// Returns [`AppError::Core`] when the slot's file input is not part of the
/// form.
pub fn synthesize_into_slot(
    form: &mut FormState,
    ui: &mut UiState,
    slot: &PhotoSlot,
    jpeg: EncodedJpeg,
) -> Result<String, AppError> {
    let file = FileValue::synthesized(jpeg);
    let preview = PreviewContent::for_file(&file);
    let digest = file.digest();

    let replaced = form.replace_file(&slot.file_input, file)?;
    ui.set_preview(&slot.preview, preview);

    log::info!(
        target: "synth",
        "wrote slot={} input={} digest={digest} replaced={}",
        slot.id,
        slot.file_input,
        replaced.is_some()
    );
    Ok(digest)
}

/// Page-level controller owning every piece of mutable page state.
pub struct PageController {
    config: AppConfig,
    markup: FormMarkup,
    slots: Vec<PhotoSlot>,
    bindings: SlotBindings,
    active: ActiveTarget,
    crop: CropDialog,
    camera: CameraDialog,
    form: FormState,
    ui: UiState,
    camera_backend: Arc<dyn CameraBackend>,
    client: SubmitClient,
}

impl PageController {
    /// Runs the discovery pass over `markup` and wires every slot.
    pub fn new(
        markup: FormMarkup,
        config: AppConfig,
        camera_backend: Arc<dyn CameraBackend>,
        client: SubmitClient,
    ) -> Self {
        let slots = discover_slots(&markup);
        let bindings = SlotBindings::wire(&slots);
        let form = FormState::from_markup(&markup);
        let ui = UiState::new(&markup);

        Self {
            config,
            markup,
            slots,
            bindings,
            active: ActiveTarget::default(),
            crop: CropDialog::new(config.crop),
            camera: CameraDialog::new(),
            form,
            ui,
            camera_backend,
            client,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Discovered slots.
    pub fn slots(&self) -> &[PhotoSlot] {
        &self.slots
    }

    /// Looks up a slot by id.
    pub fn slot(&self, id: SlotId) -> Option<&PhotoSlot> {
        self.slots.get(id.0)
    }

    /// Looks up a slot by its form field name.
    pub fn slot_by_field(&self, field_name: &str) -> Option<&PhotoSlot> {
        self.slots.iter().find(|slot| slot.field_name == field_name)
    }

    /// Event wiring.
    pub fn bindings(&self) -> &SlotBindings {
        &self.bindings
    }

    /// Current active target.
    pub fn active_target(&self) -> Option<SlotId> {
        self.active.current()
    }

    /// Live form state.
    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Mutable form state for ordinary field edits.
    pub fn form_mut(&mut self) -> &mut FormState {
        &mut self.form
    }

    /// UI state.
    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    /// Mutable UI state, used by the shell to drain messages.
    pub fn ui_mut(&mut self) -> &mut UiState {
        &mut self.ui
    }

    /// Shared crop dialog.
    pub fn crop_dialog(&self) -> &CropDialog {
        &self.crop
    }

    /// Loaded crop surface, if any.
    pub fn crop_surface_mut(&mut self) -> Option<&mut CropSurface> {
        self.crop.surface_mut()
    }

    /// Shared camera dialog.
    pub fn camera_dialog(&self) -> &CameraDialog {
        &self.camera
    }

    /// Routes one page event through the binding table.
    pub fn dispatch(&mut self, event: PageEvent) -> EventEffect {
        match event {
            PageEvent::Click(control) => self.on_click(&control),
            PageEvent::FilesChosen { input, files } => {
                match self.bindings.lookup(&input) {
                    Some((slot, ControlRole::FileInput)) => self.files_chosen(slot, files),
                    _ => self.native_files_chosen(&input, files),
                }
                EventEffect::None
            }
            PageEvent::CropMove { dx, dy } => {
                if let Some(surface) = self.crop.surface_mut() {
                    surface.move_by(dx, dy);
                }
                EventEffect::None
            }
            PageEvent::CropResize { side } => {
                if let Some(surface) = self.crop.surface_mut() {
                    surface.resize_to(side);
                }
                EventEffect::None
            }
            PageEvent::CropConfirm => {
                self.confirm_crop();
                EventEffect::None
            }
            PageEvent::CropDismiss => {
                self.dismiss_crop();
                EventEffect::None
            }
            PageEvent::CameraCapture => {
                self.capture_camera();
                EventEffect::None
            }
            PageEvent::CameraCancel => {
                self.cancel_camera();
                EventEffect::None
            }
            PageEvent::Submit => match self.submit() {
                SubmitResult::Navigated(location) => EventEffect::Navigate(location),
                _ => EventEffect::None,
            },
        }
    }

    fn on_click(&mut self, control: &ElementId) -> EventEffect {
        if control == &self.markup.submit_control.id {
            return self.dispatch(PageEvent::Submit);
        }

        match self.bindings.lookup(control) {
            Some((slot, ControlRole::ChooseTrigger | ControlRole::FileInput)) => self.choose(slot),
            Some((slot, ControlRole::CameraTrigger)) => {
                self.open_camera(slot);
                EventEffect::None
            }
            None => {
                log::debug!(target: "registry", "unbound click control={control}");
                EventEffect::None
            }
        }
    }

    /// Click-through from a choose trigger to its file input.
    pub fn choose(&self, slot: SlotId) -> EventEffect {
        match self.slot(slot) {
            Some(slot) => EventEffect::OpenFileChooser(slot.file_input.clone()),
            None => EventEffect::None,
        }
    }

    /// Handles a native selection on a slot's file input and opens the crop
    /// dialog over the first file.
    ///
    /// The raw file is stored in the input only while the slot holds no
    /// committed crop; a committed file is replaced by the next commit and
    /// nothing else.
    pub fn files_chosen(&mut self, slot: SlotId, files: Vec<FileValue>) {
        let Some(target) = self.slot(slot).cloned() else {
            return;
        };
        let Some(file) = first_selected(files) else {
            log::debug!(target: "acquire", "empty selection slot={slot}");
            return;
        };

        self.begin_acquisition(slot);
        let committed = self
            .form
            .file(&target.file_input)
            .is_some_and(|held| held.origin == FileOrigin::Synthesized);
        if committed {
            log::debug!(target: "acquire", "kept committed file slot={slot}");
        } else if let Err(error) = self.form.replace_file(&target.file_input, file.clone()) {
            log::error!(target: "acquire", "store chosen file failed slot={slot} error={error}");
        }

        let acquired = AcquiredImage {
            source: AcquisitionSource::File,
            file,
        };
        self.deliver_to_crop(slot, &acquired);
    }

    fn native_files_chosen(&mut self, input: &ElementId, files: Vec<FileValue>) {
        let Some(file) = first_selected(files) else {
            return;
        };
        if let Err(error) = self.form.replace_file(input, file) {
            log::warn!(target: "acquire", "unbound file input input={input} error={error}");
        }
    }

    /// Opens the camera dialog for `slot`.
    pub fn open_camera(&mut self, slot: SlotId) {
        if self.slot(slot).is_none() {
            return;
        }
        self.begin_acquisition(slot);

        match self.camera.open(self.camera_backend.as_ref()) {
            Ok(facing) => {
                log::info!(target: "camera", "dialog open slot={slot} facing={facing:?}");
                self.ui.camera_dialog_visible = true;
            }
            Err(error) => {
                log::warn!(target: "camera", "open failed slot={slot} error={error}");
                self.ui.camera_dialog_visible = false;
                self.ui.show_message(camera_error_message(&error));
                self.active.clear();
            }
        }
    }

    /// Captures the live frame and opens the crop dialog over it.
    pub fn capture_camera(&mut self) {
        let captured = self.camera.capture(self.crop.settings().jpeg_quality);
        self.ui.camera_dialog_visible = false;

        match captured {
            Ok(acquired) => match self.active.current() {
                Some(slot) => self.deliver_to_crop(slot, &acquired),
                None => log::warn!(target: "camera", "capture without active target"),
            },
            Err(CaptureError::NoActiveStream) => {
                log::debug!(target: "camera", "capture ignored: no stream");
            }
            Err(error) => {
                log::warn!(target: "camera", "capture failed error={error}");
                self.ui.show_message(MSG_CAMERA_FAILED);
                self.active.clear();
            }
        }
    }

    /// Stops the camera without delivering anything.
    pub fn cancel_camera(&mut self) {
        self.ui.camera_dialog_visible = false;
        if self.camera.stop() {
            self.active.clear();
        }
    }

    /// Commits the crop into the active slot.
    pub fn confirm_crop(&mut self) -> CommitOutcome {
        let Some(slot_id) = self.active.current() else {
            log::debug!(target: "crop", "commit ignored: no active target");
            return CommitOutcome::NoTarget;
        };
        let Some(slot) = self.slot(slot_id).cloned() else {
            self.active.clear();
            return CommitOutcome::NoTarget;
        };

        let jpeg = match self.crop.commit() {
            Ok(Some(jpeg)) => jpeg,
            Ok(None) => return CommitOutcome::NothingLoaded,
            Err(error) => {
                log::error!(target: "crop", "render failed slot={slot_id} error={error}");
                self.ui.show_message(MSG_CROP_FAILED);
                return CommitOutcome::Failed;
            }
        };
        self.ui.crop_dialog_visible = false;
        self.active.clear();

        match synthesize_into_slot(&mut self.form, &mut self.ui, &slot, jpeg) {
            Ok(digest) => CommitOutcome::Committed {
                slot: slot_id,
                digest,
            },
            Err(error) => {
                log::error!(target: "synth", "write failed slot={slot_id} error={error}");
                self.ui.show_message(MSG_CROP_FAILED);
                CommitOutcome::Failed
            }
        }
    }

    /// Dismisses the crop dialog, leaving the slot untouched.
    pub fn dismiss_crop(&mut self) {
        self.crop.cancel();
        self.ui.crop_dialog_visible = false;
        self.active.clear();
    }

    /// Returns `true` when some slot holds a committed crop.
    pub fn has_committed_photo(&self) -> bool {
        self.slots.iter().any(|slot| {
            self.form
                .file(&slot.file_input)
                .is_some_and(|file| file.origin == FileOrigin::Synthesized)
        })
    }

    /// Handles the form's submit action.
    pub fn submit(&mut self) -> SubmitResult {
        if !self.ui.submit_control.enabled {
            return SubmitResult::Ignored;
        }

        if let Some(field) = self.form.first_missing_required() {
            let message = format!("{} is required.", field.name);
            log::info!(target: "submit", "blocked reason=required field={}", field.name);
            self.ui.show_message(message);
            return SubmitResult::Blocked;
        }

        if self.config.submission_policy == SubmissionPolicy::RequireCommittedPhoto
            && !self.has_committed_photo()
        {
            log::info!(target: "submit", "blocked reason=no_committed_photo");
            self.ui.show_message(MSG_PHOTO_REQUIRED);
            return SubmitResult::Blocked;
        }

        self.ui.begin_submission();

        let outcome = self.client.submit(&self.form).and_then(|outcome| match outcome {
            SubmissionOutcome::Success { redirect_url } => self
                .client
                .resolve_redirect(&redirect_url)
                .map(SubmissionResolution::Navigate),
            SubmissionOutcome::Failure { status, message } => {
                Ok(SubmissionResolution::Rejected { status, message })
            }
        });

        match outcome {
            Ok(SubmissionResolution::Navigate(location)) => {
                log::info!(target: "submit", "accepted redirect={location}");
                self.ui.navigate(location.as_str());
                SubmitResult::Navigated(location)
            }
            Ok(SubmissionResolution::Rejected { status, message }) => {
                log::warn!(target: "submit", "rejected status={status}");
                self.ui
                    .fail_submission(format!("{MSG_SERVER_ERROR_PREFIX}{message}"));
                SubmitResult::Failed
            }
            Err(error) => {
                log::error!(target: "submit", "failed error={error}");
                self.ui.fail_submission(MSG_NETWORK_ERROR);
                SubmitResult::Failed
            }
        }
    }

    // Binds `slot` and tears down whatever the previous target left open.
    fn begin_acquisition(&mut self, slot: SlotId) {
        let previous = self.active.set_active(slot);
        if self.crop.cancel() {
            log::info!(target: "crop", "torn down for new acquisition previous={previous:?}");
        }
        if self.camera.stop() {
            log::info!(target: "camera", "stopped for new acquisition previous={previous:?}");
        }
        self.ui.crop_dialog_visible = false;
        self.ui.camera_dialog_visible = false;
    }

    fn deliver_to_crop(&mut self, slot: SlotId, acquired: &AcquiredImage) {
        match acquired.decode() {
            Ok(raster) => {
                log::info!(
                    target: "acquire",
                    "delivered slot={slot} source={:?} size={}x{}",
                    acquired.source,
                    raster.width,
                    raster.height
                );
                self.crop.load(raster);
                self.ui.crop_dialog_visible = true;
            }
            Err(error) => {
                log::warn!(target: "acquire", "decode failed slot={slot} error={error}");
                self.ui.show_message(MSG_UNREADABLE_IMAGE);
                self.active.clear();
            }
        }
    }
}

impl std::fmt::Debug for PageController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageController")
            .field("slots", &self.slots.len())
            .field("active", &self.active)
            .field("crop", &self.crop.phase())
            .field("camera", &self.camera.phase())
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

enum SubmissionResolution {
    Navigate(Url),
    Rejected { status: String, message: String },
}

fn camera_error_message(error: &CaptureError) -> &'static str {
    match error {
        CaptureError::PermissionDenied => MSG_CAMERA_DENIED,
        CaptureError::NoCamera | CaptureError::Unsupported => MSG_CAMERA_UNAVAILABLE,
        _ => MSG_CAMERA_FAILED,
    }
}

/// Redirect reported by [`DryRunTransport`], matching the live endpoint.
pub const DRY_RUN_REDIRECT: &str = "/form/success/";

/// Transport that stages each request on disk instead of sending it and
/// answers as the endpoint does for an accepted submission.
#[derive(Debug, Clone)]
pub struct DryRunTransport {
    out_dir: PathBuf,
}

impl DryRunTransport {
    /// File holding the raw multipart body.
    pub const BODY_FILE: &'static str = "request.multipart";
    /// File holding request metadata as JSON.
    pub const META_FILE: &'static str = "request.json";

    /// Stages requests under `out_dir`.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

impl SubmissionTransport for DryRunTransport {
    fn post(&self, request: &SubmissionRequest) -> Result<TransportResponse, SubmitError> {
        let stage_error =
            |error: std::io::Error| SubmitError::Transport(format!("staging failed: {error}"));

        fs::create_dir_all(&self.out_dir).map_err(stage_error)?;
        fs::write(self.out_dir.join(Self::BODY_FILE), request.body.bytes()).map_err(stage_error)?;

        let parts: Vec<serde_json::Value> = request
            .body
            .parts()
            .iter()
            .map(|part| {
                serde_json::json!({
                    "name": part.name,
                    "filename": part.filename,
                    "len": part.len,
                })
            })
            .collect();
        let meta = serde_json::json!({
            "method": request.method,
            "url": request.url.as_str(),
            "content_type": request.body.content_type(),
            "boundary": request.body.boundary(),
            "parts": parts,
        });
        let meta = serde_json::to_vec_pretty(&meta)
            .map_err(|error| SubmitError::Transport(error.to_string()))?;
        fs::write(self.out_dir.join(Self::META_FILE), meta).map_err(stage_error)?;

        log::info!(
            target: "submit",
            "staged dir={} boundary={}",
            self.out_dir.display(),
            request.body.boundary()
        );

        let body = SubmissionResponse::success(DRY_RUN_REDIRECT)
            .to_json_bytes()
            .map_err(SubmitError::Contract)?;
        Ok(TransportResponse { status: 200, body })
    }
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Core model error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    /// Acquisition error.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Crop error.
    #[error("crop error: {0}")]
    Crop(#[from] CropError),
    /// Submission error.
    #[error("submit error: {0}")]
    Submit(#[from] SubmitError),
    /// Response contract error.
    #[error("contract error: {0}")]
    Contract(#[from] SubmissionContractError),
    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Filesystem error in the CLI shell.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    //! Unit tests for configuration and target tracking.

    use super::*;

    #[test]
    fn config_defaults_to_unconditional_policy() {
        let config = AppConfig::from_lookup(|_| None).expect("defaults");
        assert_eq!(config.submission_policy, SubmissionPolicy::Unconditional);
        assert_eq!(config.crop, CropSettings::default());
    }

    #[test]
    fn config_reads_policy_and_quality() {
        let config = AppConfig::from_lookup(|key| match key {
            ENV_SUBMIT_POLICY => Some(" Require-Photo ".to_string()),
            ENV_JPEG_QUALITY => Some("80".to_string()),
            _ => None,
        })
        .expect("valid config");
        assert_eq!(
            config.submission_policy,
            SubmissionPolicy::RequireCommittedPhoto
        );
        assert_eq!(config.crop.jpeg_quality, 80);
    }

    #[test]
    fn config_rejects_out_of_range_quality() {
        let result = AppConfig::from_lookup(|key| {
            (key == ENV_JPEG_QUALITY).then(|| "0".to_string())
        });
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn active_target_overwrites_without_rejection() {
        let mut target = ActiveTarget::default();
        assert_eq!(target.set_active(SlotId(0)), None);
        assert_eq!(target.set_active(SlotId(1)), Some(SlotId(0)));
        assert_eq!(target.current(), Some(SlotId(1)));
        target.clear();
        assert_eq!(target.current(), None);
    }

    #[test]
    fn version_is_embedded() {
        assert!(!app_version().is_empty());
    }
}
