//! Shared fixtures for app integration tests.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cropform_app::{AppConfig, PageController, SubmissionPolicy};
use cropform_capture::{CameraBackend, SyntheticCameraBackend};
use cropform_core::{FileValue, FormMarkup, parse_form_template};
use cropform_submission_contract::SubmissionResponse;
use cropform_submit::{
    SubmissionRequest, SubmissionTransport, SubmitClient, SubmitError, TransportResponse,
};

/// Page URL every fixture client posts to.
#[allow(dead_code)]
pub const PAGE_URL: &str = "https://school.example/form/admissions/";

/// Template with two photo slots, a document field, and ordinary fields.
#[allow(dead_code)]
pub fn fixture_markup() -> FormMarkup {
    let template = parse_form_template(
        r#"{
            "title": "Admissions",
            "form_fields": [
                {"name": "Full Name", "type": "text"},
                {"name": "Student Photo", "type": "photo_croppable"},
                {"name": "Father Photo", "type": "photo_croppable", "suffix": "-Father"},
                {"name": "Marksheet", "type": "file_document"},
                {"name": "Hobbies", "type": "checkbox", "options": ["Music", "Art"]}
            ]
        }"#,
    )
    .expect("fixture template should parse");
    FormMarkup::from_template(&template)
}

/// Encodes a solid-colour PNG with the given size.
#[allow(dead_code)]
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([rgb[0], rgb[1], rgb[2], 255]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("fixture png should encode");
    out.into_inner()
}

/// A chosen PNG file as the native chooser would deliver it.
#[allow(dead_code)]
pub fn chosen_png(name: &str, width: u32, height: u32, rgb: [u8; 3]) -> FileValue {
    FileValue::chosen(name, "image/png", png_bytes(width, height, rgb))
}

/// Scripted reply of a [`RecordingTransport`].
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond with this body and status.
    Body(u16, Vec<u8>),
    /// Fail without a response.
    NetworkFailure,
}

/// Transport that records every request and answers with a scripted reply.
#[derive(Debug)]
pub struct RecordingTransport {
    reply: Reply,
    requests: Mutex<Vec<SubmissionRequest>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    /// Transport that replies with `reply` to every request.
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Transport that accepts every submission with `redirect`.
    pub fn accepting(redirect: &str) -> Arc<Self> {
        let body = SubmissionResponse::success(redirect)
            .to_json_bytes()
            .expect("fixture response should encode");
        Self::new(Reply::Body(200, body))
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<SubmissionRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl SubmissionTransport for RecordingTransport {
    fn post(&self, request: &SubmissionRequest) -> Result<TransportResponse, SubmitError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        match &self.reply {
            Reply::Body(status, body) => Ok(TransportResponse {
                status: *status,
                body: body.clone(),
            }),
            Reply::NetworkFailure => Err(SubmitError::Transport("connection reset".to_string())),
        }
    }
}

/// Builds a page over the fixture markup.
#[allow(dead_code)]
pub fn fixture_page(
    policy: SubmissionPolicy,
    camera: Arc<dyn CameraBackend>,
    transport: Arc<RecordingTransport>,
) -> PageController {
    let config = AppConfig {
        submission_policy: policy,
        ..AppConfig::default()
    };
    let client = SubmitClient::new(PAGE_URL, transport).expect("fixture url should parse");
    PageController::new(fixture_markup(), config, camera, client)
}

/// Page with a working synthetic camera and an accepting transport.
#[allow(dead_code)]
pub fn default_page() -> (PageController, Arc<SyntheticCameraBackend>, Arc<RecordingTransport>) {
    let camera = Arc::new(SyntheticCameraBackend::new(640, 480));
    let transport = RecordingTransport::accepting("/form/success/");
    let page = fixture_page(
        SubmissionPolicy::Unconditional,
        Arc::clone(&camera) as Arc<dyn CameraBackend>,
        Arc::clone(&transport),
    );
    (page, camera, transport)
}
