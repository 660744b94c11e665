//! Integration tests for submission gating, transport, and recovery.

mod common;

use std::sync::Arc;

use common::{PAGE_URL, RecordingTransport, Reply, chosen_png, default_page, fixture_page};
use cropform_app::{
    AppConfig, EventEffect, MSG_NETWORK_ERROR, MSG_PHOTO_REQUIRED, PageController, PageEvent,
    SubmitResult, SubmissionPolicy,
};
use cropform_capture::{SyntheticCameraBackend, UnsupportedCameraBackend};
use cropform_core::{ElementId, FileValue, FormMarkup, SUBMIT_CONTROL_LABEL, parse_form_template};
use cropform_submission_contract::SubmissionResponse;
use cropform_submit::SubmitClient;
use cropform_ui::{SUBMITTING_LABEL, StageStatus};

fn commit_photo(page: &mut PageController, input: &str) {
    page.dispatch(PageEvent::FilesChosen {
        input: ElementId::new(input),
        files: vec![chosen_png("photo.png", 40, 30, [9, 9, 9])],
    });
    page.dispatch(PageEvent::CropConfirm);
}

fn page_replying(policy: SubmissionPolicy, reply: Reply) -> (PageController, Arc<RecordingTransport>) {
    let transport = RecordingTransport::new(reply);
    let page = fixture_page(
        policy,
        Arc::new(UnsupportedCameraBackend),
        Arc::clone(&transport),
    );
    (page, transport)
}

fn failure_body(message: &str) -> Vec<u8> {
    SubmissionResponse::failure("error", message)
        .to_json_bytes()
        .expect("fixture response should encode")
}

#[test]
fn submission_flow_tests_file_parts_match_slots_with_files() {
    let (mut page, _, transport) = default_page();
    page.form_mut()
        .set_text("Full Name", "Asha Rao")
        .expect("text field exists");
    page.form_mut()
        .set_checked("Hobbies", vec!["Music".to_string(), "Art".to_string()])
        .expect("checkbox field exists");
    commit_photo(&mut page, "father-photo-input");

    assert!(matches!(page.submit(), SubmitResult::Navigated(_)));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.url.as_str(), PAGE_URL);
    assert_eq!(request.body.file_part_names(), vec!["Father Photo"]);

    let hobbies = request
        .body
        .parts()
        .iter()
        .filter(|part| part.name == "Hobbies")
        .count();
    assert_eq!(hobbies, 2);

    let body = String::from_utf8_lossy(request.body.bytes());
    assert!(body.contains("filename=\"photo.jpg\""));
    assert!(body.contains("Asha Rao"));
}

#[test]
fn submission_flow_tests_success_navigates_to_resolved_redirect() {
    let transport = RecordingTransport::accepting("/done");
    let mut page = fixture_page(
        SubmissionPolicy::Unconditional,
        Arc::new(UnsupportedCameraBackend),
        Arc::clone(&transport),
    );

    let effect = page.dispatch(PageEvent::Submit);
    let EventEffect::Navigate(location) = effect else {
        panic!("expected navigation, got {effect:?}");
    };
    assert_eq!(location.as_str(), "https://school.example/done");
    assert_eq!(
        page.ui().navigated_to.as_deref(),
        Some("https://school.example/done")
    );
    assert_eq!(page.ui().submission, StageStatus::Healthy);
    assert!(!page.ui().submit_control.enabled);
    assert_eq!(page.ui().submit_control.label, SUBMITTING_LABEL);
}

#[test]
fn submission_flow_tests_second_submit_while_navigating_sends_nothing() {
    let (mut page, _, transport) = default_page();

    assert!(matches!(page.submit(), SubmitResult::Navigated(_)));
    assert_eq!(page.submit(), SubmitResult::Ignored);
    assert_eq!(transport.requests().len(), 1);
}

#[test]
fn submission_flow_tests_server_error_restores_control() {
    let (mut page, transport) = page_replying(
        SubmissionPolicy::Unconditional,
        Reply::Body(200, failure_body("Roll number already used")),
    );

    assert_eq!(page.submit(), SubmitResult::Failed);
    assert_eq!(transport.requests().len(), 1);
    assert!(page.ui().submit_control.enabled);
    assert_eq!(page.ui().submit_control.label, SUBMIT_CONTROL_LABEL);
    assert!(!page.ui().busy_indicator_visible);
    assert_eq!(
        page.ui().last_message(),
        Some("An error occurred: Roll number already used")
    );
    assert_eq!(page.ui().navigated_to, None);
}

#[test]
fn submission_flow_tests_network_failure_restores_control() {
    let (mut page, _) = page_replying(SubmissionPolicy::Unconditional, Reply::NetworkFailure);

    assert_eq!(page.submit(), SubmitResult::Failed);
    assert!(page.ui().submit_control.enabled);
    assert!(!page.ui().busy_indicator_visible);
    assert_eq!(page.ui().last_message(), Some(MSG_NETWORK_ERROR));

    // The page stays usable for a retry.
    assert_eq!(page.submit(), SubmitResult::Failed);
}

#[test]
fn submission_flow_tests_malformed_body_is_a_network_error() {
    let (mut page, _) = page_replying(
        SubmissionPolicy::Unconditional,
        Reply::Body(200, b"<html>oops</html>".to_vec()),
    );

    assert_eq!(page.submit(), SubmitResult::Failed);
    assert_eq!(page.ui().last_message(), Some(MSG_NETWORK_ERROR));
}

#[test]
fn submission_flow_tests_status_code_does_not_override_success_body() {
    let body = SubmissionResponse::success("/form/success/")
        .to_json_bytes()
        .expect("fixture response should encode");
    let (mut page, _) = page_replying(SubmissionPolicy::Unconditional, Reply::Body(500, body));

    assert!(matches!(page.submit(), SubmitResult::Navigated(_)));
}

#[test]
fn submission_flow_tests_strict_policy_blocks_without_committed_photo() {
    let (mut page, transport) = page_replying(
        SubmissionPolicy::RequireCommittedPhoto,
        Reply::NetworkFailure,
    );

    // A raw chosen file that was never cropped does not count.
    page.dispatch(PageEvent::FilesChosen {
        input: ElementId::new("student-photo-input"),
        files: vec![chosen_png("raw.png", 10, 10, [0, 0, 0])],
    });
    page.dispatch(PageEvent::CropDismiss);

    assert_eq!(page.submit(), SubmitResult::Blocked);
    assert!(transport.requests().is_empty());
    assert_eq!(page.ui().last_message(), Some(MSG_PHOTO_REQUIRED));
    assert!(page.ui().submit_control.enabled);
    assert!(!page.ui().busy_indicator_visible);
}

#[test]
fn submission_flow_tests_strict_policy_allows_committed_photo() {
    let (mut page, transport) = page_replying(
        SubmissionPolicy::RequireCommittedPhoto,
        Reply::Body(200, SubmissionResponse::success("/ok/").to_json_bytes().expect("encode")),
    );
    commit_photo(&mut page, "student-photo-input");

    assert!(matches!(page.submit(), SubmitResult::Navigated(_)));
    assert_eq!(transport.requests().len(), 1);
}

#[test]
fn submission_flow_tests_required_field_blocks_before_any_request() {
    let template = parse_form_template(
        r#"{"title":"t","form_fields":[
            {"name":"Full Name","type":"text","required":true},
            {"name":"Photo","type":"photo_croppable"}
        ]}"#,
    )
    .expect("template should parse");
    let transport = RecordingTransport::accepting("/form/success/");
    let client = SubmitClient::new(PAGE_URL, transport.clone())
        .expect("fixture url should parse");
    let mut page = PageController::new(
        FormMarkup::from_template(&template),
        AppConfig::default(),
        Arc::new(SyntheticCameraBackend::new(8, 8)),
        client,
    );

    assert_eq!(page.submit(), SubmitResult::Blocked);
    assert_eq!(page.ui().last_message(), Some("Full Name is required."));
    assert!(transport.requests().is_empty());

    page.form_mut()
        .set_text("Full Name", "Asha")
        .expect("text field exists");
    assert!(matches!(page.submit(), SubmitResult::Navigated(_)));
}

#[test]
fn submission_flow_tests_document_fields_are_sent_as_chosen() {
    let (mut page, _, transport) = default_page();

    page.dispatch(PageEvent::FilesChosen {
        input: ElementId::new("marksheet-input"),
        files: vec![FileValue::chosen("marks.pdf", "application/pdf", b"%PDF-1.4".to_vec())],
    });
    assert!(!page.ui().crop_dialog_visible);

    page.dispatch(PageEvent::Click(ElementId::new("submit-btn")));

    let requests = transport.requests();
    assert_eq!(requests[0].body.file_part_names(), vec!["Marksheet"]);
    let body = String::from_utf8_lossy(requests[0].body.bytes());
    assert!(body.contains("filename=\"marks.pdf\""));
    assert!(body.contains("Content-Type: application/pdf"));
}
