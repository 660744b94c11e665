#![warn(missing_docs)]
//! # cropform-core
//!
//! ## Purpose
//! Defines the pure data model used across the `cropform` workspace.
//!
//! ## Responsibilities
//! - Describe form markup (fields, photo regions, submit control) and derive it
//!   from JSON form templates.
//! - Run the one-time photo slot discovery pass over the markup.
//! - Hold mutable form state, including file inputs and their contents.
//! - Decode uploaded bytes into [`RasterImage`] values and encode rasters to JPEG.
//!
//! ## Data flow
//! A [`FormTemplate`] becomes a [`FormMarkup`]; [`discover_slots`] turns the
//! markup into typed [`PhotoSlot`] descriptors and [`FormState::from_markup`]
//! creates the empty field values that acquisition and submission mutate.
//!
//! ## Ownership and lifetimes
//! Files and rasters own their byte buffers (`Vec<u8>`) so they can move
//! between acquisition, crop, and submission stages without borrow coupling.
//!
//! ## Error model
//! Template validation, field lookups, and codec failures return [`CoreError`].
//!
//! ## Security and privacy notes
//! File contents are never logged. Files are identified by their SHA-256
//! content digest.
//!
//! ## Example
//! ```rust
//! use cropform_core::{FormMarkup, discover_slots, parse_form_template};
//!
//! let template = parse_form_template(
//!     r#"{"title":"Intake","form_fields":[{"name":"Photo","type":"photo_croppable"}]}"#,
//! )
//! .expect("template should parse");
//! let markup = FormMarkup::from_template(&template);
//! let slots = discover_slots(&markup);
//! assert_eq!(slots.len(), 1);
//! assert_eq!(slots[0].file_input.as_str(), "photo-input");
//! ```

use std::fmt;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// File name given to every cropped upload.
pub const SYNTHESIZED_FILE_NAME: &str = "photo.jpg";

/// File name given to a captured camera frame before cropping.
pub const CAMERA_FILE_NAME: &str = "camera.jpg";

/// Content type for JPEG payloads.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Content type used when a chosen file carries no type of its own.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Identifier of one element in the page markup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(String);

impl ElementId {
    /// Creates an element id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Field type names used by form templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFieldKind {
    /// Photo field that goes through the crop pipeline.
    PhotoCroppable,
    /// Plain document upload, submitted as chosen.
    FileDocument,
    /// Multi-value checkbox group.
    Checkbox,
    /// Any other type renders as a single text value.
    #[serde(other)]
    Text,
}

/// One field declared by a form template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateField {
    /// Field name used as the multipart part name.
    pub name: String,
    /// Declared field type.
    #[serde(rename = "type")]
    pub kind: TemplateFieldKind,
    /// Native `required` constraint.
    #[serde(default)]
    pub required: bool,
    /// File-name suffix used by the server when storing uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// Choices offered by checkbox groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// JSON form template as authored in the admin panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormTemplate {
    /// Human-readable form title.
    pub title: String,
    /// Ordered field declarations.
    #[serde(default)]
    pub form_fields: Vec<TemplateField>,
}

/// Parses and validates a form template.
///
/// # Errors
/// Returns [`CoreError::Codec`] for invalid JSON and
/// [`CoreError::InvalidTemplate`] for blank, unsluggable, or colliding field
/// names.
pub fn parse_form_template(raw: &str) -> Result<FormTemplate, CoreError> {
    let template: FormTemplate = serde_json::from_str(raw)?;

    let mut seen = Vec::with_capacity(template.form_fields.len());
    for field in &template.form_fields {
        if field.name.trim().is_empty() {
            return Err(CoreError::InvalidTemplate("field name is empty".to_string()));
        }
        let slug = slugify(&field.name);
        if slug.is_empty() {
            return Err(CoreError::InvalidTemplate(format!(
                "field '{}' has no alphanumeric characters",
                field.name
            )));
        }
        if seen.contains(&slug) {
            return Err(CoreError::InvalidTemplate(format!(
                "field '{}' collides with an earlier field",
                field.name
            )));
        }
        seen.push(slug);
    }

    Ok(template)
}

/// Lowercases `value` and joins alphanumeric runs with `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for ch in value.trim().chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Kind of native input element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// Single text value.
    Text,
    /// Checkbox group with its offered options.
    Checkbox(Vec<String>),
    /// File input.
    File,
}

/// Markup for one native form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMarkup {
    /// Element id.
    pub id: ElementId,
    /// Form field name.
    pub name: String,
    /// Input kind.
    pub kind: InputKind,
    /// Native `required` attribute.
    pub required: bool,
}

/// Markup for a button-like control with a visible label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMarkup {
    /// Element id.
    pub id: ElementId,
    /// Label shown while idle.
    pub label: String,
}

/// Markup for one photo-upload region. Every part is optional so partially
/// rendered regions can be represented and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhotoRegionMarkup {
    /// Hidden native file input backing the region.
    pub file_input: Option<ElementId>,
    /// Surface that shows the current image.
    pub preview: Option<ElementId>,
    /// Styled trigger that clicks through to the file input.
    pub choose_trigger: Option<ElementId>,
    /// Trigger that opens the camera dialog.
    pub camera_trigger: Option<ElementId>,
}

/// Markup contract of the whole form page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMarkup {
    /// Form element id.
    pub form_id: ElementId,
    /// Submit control.
    pub submit_control: ControlMarkup,
    /// Busy indicator shown while a submission is in flight.
    pub busy_indicator: ElementId,
    /// Native inputs in document order.
    pub fields: Vec<FieldMarkup>,
    /// Photo regions in document order.
    pub photo_regions: Vec<PhotoRegionMarkup>,
}

/// Id of the form element in generated markup.
pub const FORM_ID: &str = "student-form";
/// Id of the submit control in generated markup.
pub const SUBMIT_CONTROL_ID: &str = "submit-btn";
/// Idle label of the submit control in generated markup.
pub const SUBMIT_CONTROL_LABEL: &str = "Submit Details";
/// Id of the busy indicator in generated markup.
pub const BUSY_INDICATOR_ID: &str = "loader";

impl FormMarkup {
    /// Generates markup for a template using the fixed id conventions
    /// `<slug>`, `<slug>-input`, `<slug>-preview`, `<slug>-choose`, and
    /// `<slug>-camera`.
    pub fn from_template(template: &FormTemplate) -> Self {
        let mut fields = Vec::with_capacity(template.form_fields.len());
        let mut photo_regions = Vec::new();

        for field in &template.form_fields {
            let slug = slugify(&field.name);
            match field.kind {
                TemplateFieldKind::PhotoCroppable => {
                    let input = ElementId::new(format!("{slug}-input"));
                    fields.push(FieldMarkup {
                        id: input.clone(),
                        name: field.name.clone(),
                        kind: InputKind::File,
                        required: field.required,
                    });
                    photo_regions.push(PhotoRegionMarkup {
                        file_input: Some(input),
                        preview: Some(ElementId::new(format!("{slug}-preview"))),
                        choose_trigger: Some(ElementId::new(format!("{slug}-choose"))),
                        camera_trigger: Some(ElementId::new(format!("{slug}-camera"))),
                    });
                }
                TemplateFieldKind::FileDocument => fields.push(FieldMarkup {
                    id: ElementId::new(format!("{slug}-input")),
                    name: field.name.clone(),
                    kind: InputKind::File,
                    required: field.required,
                }),
                TemplateFieldKind::Checkbox => fields.push(FieldMarkup {
                    id: ElementId::new(slug),
                    name: field.name.clone(),
                    kind: InputKind::Checkbox(field.options.clone()),
                    required: field.required,
                }),
                TemplateFieldKind::Text => fields.push(FieldMarkup {
                    id: ElementId::new(slug),
                    name: field.name.clone(),
                    kind: InputKind::Text,
                    required: field.required,
                }),
            }
        }

        Self {
            form_id: ElementId::new(FORM_ID),
            submit_control: ControlMarkup {
                id: ElementId::new(SUBMIT_CONTROL_ID),
                label: SUBMIT_CONTROL_LABEL.to_string(),
            },
            busy_indicator: ElementId::new(BUSY_INDICATOR_ID),
            fields,
            photo_regions,
        }
    }

    /// Looks up a field by element id.
    pub fn field(&self, id: &ElementId) -> Option<&FieldMarkup> {
        self.fields.iter().find(|field| &field.id == id)
    }
}

/// Index of a discovered photo slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub usize);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// One logical photo field bundling its input, preview, and triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoSlot {
    /// Position in the discovered slot list.
    pub id: SlotId,
    /// Form field name of the backing file input.
    pub field_name: String,
    /// Backing file input.
    pub file_input: ElementId,
    /// Preview surface.
    pub preview: ElementId,
    /// Optional styled choose trigger.
    pub choose_trigger: Option<ElementId>,
    /// Optional camera trigger.
    pub camera_trigger: Option<ElementId>,
}

/// Scans the markup once and returns every usable photo slot.
///
/// Regions without a file input, without a preview surface, or whose file
/// input does not name a file field are skipped.
pub fn discover_slots(markup: &FormMarkup) -> Vec<PhotoSlot> {
    let mut slots = Vec::with_capacity(markup.photo_regions.len());

    for (index, region) in markup.photo_regions.iter().enumerate() {
        let (Some(file_input), Some(preview)) = (&region.file_input, &region.preview) else {
            log::debug!(target: "registry", "skip region={index} reason=incomplete");
            continue;
        };

        let Some(field) = markup
            .field(file_input)
            .filter(|field| field.kind == InputKind::File)
        else {
            log::debug!(
                target: "registry",
                "skip region={index} reason=no_file_field input={file_input}"
            );
            continue;
        };

        slots.push(PhotoSlot {
            id: SlotId(slots.len()),
            field_name: field.name.clone(),
            file_input: file_input.clone(),
            preview: preview.clone(),
            choose_trigger: region.choose_trigger.clone(),
            camera_trigger: region.camera_trigger.clone(),
        });
    }

    log::info!(target: "registry", "discovered slots={}", slots.len());
    slots
}

/// Where the contents of a file input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOrigin {
    /// Picked through the native file chooser.
    Chosen,
    /// Written by the crop pipeline.
    Synthesized,
}

/// File-like value stored in a file input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileValue {
    /// File name reported in the multipart part.
    pub name: String,
    /// MIME content type.
    pub content_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
    /// Provenance of the file.
    pub origin: FileOrigin,
}

impl FileValue {
    /// Creates a file as produced by the native file chooser. A blank content
    /// type falls back to `application/octet-stream`.
    pub fn chosen(name: impl Into<String>, content_type: &str, bytes: Vec<u8>) -> Self {
        let content_type = if content_type.trim().is_empty() {
            FALLBACK_CONTENT_TYPE
        } else {
            content_type
        };
        Self {
            name: name.into(),
            content_type: content_type.to_string(),
            bytes,
            origin: FileOrigin::Chosen,
        }
    }

    /// Wraps a committed crop as the fixed-name JPEG upload.
    pub fn synthesized(jpeg: EncodedJpeg) -> Self {
        Self {
            name: SYNTHESIZED_FILE_NAME.to_string(),
            content_type: JPEG_CONTENT_TYPE.to_string(),
            bytes: jpeg.bytes,
            origin: FileOrigin::Synthesized,
        }
    }

    /// Returns the lowercase hex SHA-256 of the contents.
    pub fn digest(&self) -> String {
        content_digest(&self.bytes)
    }
}

/// Returns the lowercase hex SHA-256 of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Current value of one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Text input value.
    Text(String),
    /// Checked options of a checkbox group.
    Checked(Vec<String>),
    /// File input contents; at most one file per input.
    File(Option<FileValue>),
}

impl FieldValue {
    fn is_empty(&self) -> bool {
        match self {
            Self::Text(value) => value.is_empty(),
            Self::Checked(values) => values.is_empty(),
            Self::File(file) => file.is_none(),
        }
    }
}

/// One field of the live form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    /// Element id.
    pub id: ElementId,
    /// Field name.
    pub name: String,
    /// Native `required` attribute.
    pub required: bool,
    /// Current value.
    pub value: FieldValue,
}

/// Mutable state of every native input on the form, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    fields: Vec<FormField>,
}

impl FormState {
    /// Creates empty values for every field of `markup`.
    pub fn from_markup(markup: &FormMarkup) -> Self {
        let fields = markup
            .fields
            .iter()
            .map(|field| FormField {
                id: field.id.clone(),
                name: field.name.clone(),
                required: field.required,
                value: match field.kind {
                    InputKind::Text => FieldValue::Text(String::new()),
                    InputKind::Checkbox(_) => FieldValue::Checked(Vec::new()),
                    InputKind::File => FieldValue::File(None),
                },
            })
            .collect();

        Self { fields }
    }

    /// Returns all fields in document order.
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// Sets a text field by name.
    ///
    /// # Errors
    /// Returns [`CoreError::UnknownField`] or [`CoreError::FieldKindMismatch`].
    pub fn set_text(&mut self, name: &str, value: impl Into<String>) -> Result<(), CoreError> {
        match &mut self.field_by_name_mut(name)?.value {
            FieldValue::Text(current) => {
                *current = value.into();
                Ok(())
            }
            _ => Err(CoreError::FieldKindMismatch(name.to_string())),
        }
    }

    /// Replaces the checked options of a checkbox group.
    ///
    /// # Errors
    /// Returns [`CoreError::UnknownField`] or [`CoreError::FieldKindMismatch`].
    pub fn set_checked(&mut self, name: &str, values: Vec<String>) -> Result<(), CoreError> {
        match &mut self.field_by_name_mut(name)?.value {
            FieldValue::Checked(current) => {
                *current = values;
                Ok(())
            }
            _ => Err(CoreError::FieldKindMismatch(name.to_string())),
        }
    }

    /// Replaces the contents of a file input with exactly one file and
    /// returns the file it held before.
    ///
    /// # Errors
    /// Returns [`CoreError::UnknownField`] or [`CoreError::FieldKindMismatch`].
    pub fn replace_file(
        &mut self,
        input: &ElementId,
        file: FileValue,
    ) -> Result<Option<FileValue>, CoreError> {
        let field = self
            .fields
            .iter_mut()
            .find(|field| &field.id == input)
            .ok_or_else(|| CoreError::UnknownField(input.to_string()))?;

        match &mut field.value {
            FieldValue::File(current) => Ok(current.replace(file)),
            _ => Err(CoreError::FieldKindMismatch(input.to_string())),
        }
    }

    /// Returns the file held by a file input, if any.
    pub fn file(&self, input: &ElementId) -> Option<&FileValue> {
        self.fields
            .iter()
            .find(|field| &field.id == input)
            .and_then(|field| match &field.value {
                FieldValue::File(file) => file.as_ref(),
                _ => None,
            })
    }

    /// Returns the first required field without a value, as native
    /// constraint validation would report it.
    pub fn first_missing_required(&self) -> Option<&FormField> {
        self.fields
            .iter()
            .find(|field| field.required && field.value.is_empty())
    }

    fn field_by_name_mut(&mut self, name: &str) -> Result<&mut FormField, CoreError> {
        self.fields
            .iter_mut()
            .find(|field| field.name == name)
            .ok_or_else(|| CoreError::UnknownField(name.to_string()))
    }
}

/// Owned RGBA raster with validated geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA bytes in row-major order (`width * height * 4`).
    pub rgba: Vec<u8>,
}

impl RasterImage {
    /// Constructs a validated raster.
    ///
    /// # Errors
    /// Returns [`CoreError::ZeroDimensions`] for an empty geometry and
    /// [`CoreError::InvalidRasterShape`] when the buffer length is not
    /// `width * height * 4`.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::ZeroDimensions);
        }

        let expected = required_rgba_len(width, height)?;
        if rgba.len() != expected {
            return Err(CoreError::InvalidRasterShape {
                expected,
                actual: rgba.len(),
            });
        }

        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Converts into an `image` buffer.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidRasterShape`] if the buffer was mutated
    /// out of shape after construction.
    pub fn into_rgba_image(self) -> Result<RgbaImage, CoreError> {
        let expected = required_rgba_len(self.width, self.height)?;
        let actual = self.rgba.len();
        RgbaImage::from_raw(self.width, self.height, self.rgba)
            .ok_or(CoreError::InvalidRasterShape { expected, actual })
    }

    /// Wraps an `image` buffer.
    ///
    /// # Errors
    /// Returns [`CoreError::ZeroDimensions`] for an empty buffer.
    pub fn from_rgba_image(image: RgbaImage) -> Result<Self, CoreError> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }
}

/// JPEG bytes together with their pixel geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedJpeg {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Encoded JPEG stream.
    pub bytes: Vec<u8>,
}

/// Decodes PNG or JPEG bytes into an RGBA raster.
///
/// # Errors
/// Returns [`CoreError::Decode`] for unreadable bytes and
/// [`CoreError::ZeroDimensions`] for empty images.
pub fn decode_image_bytes(bytes: &[u8]) -> Result<RasterImage, CoreError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|error| CoreError::Decode(error.to_string()))?;
    RasterImage::from_rgba_image(decoded.to_rgba8())
}

/// Encodes a raster as baseline JPEG, dropping the alpha channel.
///
/// # Errors
/// Returns [`CoreError::InvalidQuality`] outside `1..=100` and
/// [`CoreError::Encode`] when the encoder fails.
pub fn encode_jpeg(raster: &RasterImage, quality: u8) -> Result<EncodedJpeg, CoreError> {
    if !(1..=100).contains(&quality) {
        return Err(CoreError::InvalidQuality(quality));
    }

    let rgb: Vec<u8> = raster
        .rgba
        .chunks_exact(4)
        .flat_map(|pixel| [pixel[0], pixel[1], pixel[2]])
        .collect();

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .write_image(&rgb, raster.width, raster.height, ExtendedColorType::Rgb8)
        .map_err(|error| CoreError::Encode(error.to_string()))?;

    Ok(EncodedJpeg {
        width: raster.width,
        height: raster.height,
        bytes,
    })
}

/// Error type for core model, template, and codec failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Template JSON is malformed.
    #[error("template codec failure: {0}")]
    Codec(#[from] serde_json::Error),
    /// Template content violates its invariants.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),
    /// No field with the given name or id exists.
    #[error("unknown field: {0}")]
    UnknownField(String),
    /// The field exists but holds a different kind of value.
    #[error("field has a different kind: {0}")]
    FieldKindMismatch(String),
    /// Raster buffer shape does not match declared geometry.
    #[error("invalid raster shape: expected {expected} bytes, got {actual}")]
    InvalidRasterShape {
        /// Expected RGBA byte count.
        expected: usize,
        /// Actual RGBA byte count.
        actual: usize,
    },
    /// Raster has zero width or height.
    #[error("image dimensions are zero")]
    ZeroDimensions,
    /// Raster dimensions overflow addressable memory.
    #[error("image dimensions overflow")]
    Overflow,
    /// Bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(String),
    /// Encoder failure.
    #[error("failed to encode image: {0}")]
    Encode(String),
    /// JPEG quality outside `1..=100`.
    #[error("jpeg quality must be within 1..=100, got {0}")]
    InvalidQuality(u8),
}

fn required_rgba_len(width: u32, height: u32) -> Result<usize, CoreError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(CoreError::Overflow)
}
