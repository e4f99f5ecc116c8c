//! End-to-end workflow behaviour against a scripted backend.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use assert_matches::assert_matches;

use std::time::Duration;

use common::{
    at_damage_review, at_first_photo, at_quality_review, controller, jpeg, AnalyzeReply,
    FakeBackend, FinalizeReply,
};
use inspecta_core::analysis::QualityStatus;
use inspecta_core::error::CoreError;
use inspecta_core::photo::{GeoPoint, PhotoFile, PhotoKey};
use inspecta_core::quality_gate::GateDecision;
use inspecta_core::step::Step;
use inspecta_gateway::GatewayError;
use inspecta_workflow::busy::Operation;
use inspecta_workflow::{Action, IdentityOutcome, VehicleOutcome, WorkflowError, WorkflowEvent};

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_inspection_reaches_results() {
    let backend = Arc::new(FakeBackend::default());
    let ctrl = controller(&backend);
    let mut events = ctrl.subscribe();

    assert!(ctrl.load_reference_data().await.is_some());
    assert!(ctrl.store().read(|s| s.thresholds().is_some()));

    at_damage_review(&ctrl).await;
    assert_eq!(ctrl.store().step(), Step::DamageDetection);

    ctrl.set_note_draft("Small dent near the left headlight");
    ctrl.finalize().await.unwrap();

    let (step, notes, inspection_id) = ctrl.store().read(|s| {
        (
            s.step(),
            s.notes().to_vec(),
            s.finalize_result().and_then(|r| r.inspection_id.clone()),
        )
    });
    assert_eq!(step, Step::Results);
    assert_eq!(notes, vec!["Small dent near the left headlight"]);
    assert_eq!(inspection_id.as_deref(), Some("insp-1"));
    assert_eq!(backend.calls_to("analyze:"), 6);
    assert_eq!(backend.calls_to("finalize:ABC123"), 1);

    let pdf = ctrl.download_report().await.unwrap();
    assert!(pdf.starts_with(b"%PDF"));

    let all: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(all.contains(&WorkflowEvent::Finalized {
        inspection_id: Some("insp-1".into())
    }));
    assert!(all.contains(&WorkflowEvent::StepChanged {
        from: Step::Finalizing,
        to: Step::Results
    }));
}

#[tokio::test]
async fn plate_lookup_records_vehicle_history_and_holder() {
    let backend = Arc::new(FakeBackend::default());
    let ctrl = controller(&backend);
    ctrl.start().unwrap();
    ctrl.submit_identity("Jane Doe", "12345").await.unwrap();

    let outcome = ctrl.submit_plate(" abc123 ").await.unwrap();

    assert_matches!(outcome, VehicleOutcome::Found(ref v) if v.plate == "ABC123");
    ctrl.store().read(|s| {
        assert_eq!(s.step(), Step::ShowVehicle);
        assert_eq!(s.vehicle_history().unwrap().previous_owners, 2);
        let info = s.user_info().unwrap();
        assert_eq!(info.plate, "ABC123");
        assert_eq!(info.id_number, "12345");
    });
    assert_eq!(backend.calls_to("verify_vehicle:ABC123"), 1);
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_identity_returns_to_form() {
    let backend = Arc::new(FakeBackend::default());
    backend.identity_valid.store(false, Ordering::SeqCst);
    let ctrl = controller(&backend);
    ctrl.start().unwrap();

    let outcome = ctrl.submit_identity("  Jane Doe  ", " 12345 ").await.unwrap();

    assert_eq!(outcome, IdentityOutcome::Rejected);
    assert_eq!(backend.calls(), vec!["verify_identity:Jane Doe|12345"]);
    ctrl.store().read(|s| {
        assert_eq!(s.step(), Step::AskId);
        assert!(!s.error().unwrap_or_default().is_empty());
        assert!(s.user_info().is_none());
        assert!(s.identity().is_none());
    });
}

#[tokio::test]
async fn identity_transport_failure_surfaces_message() {
    let backend = Arc::new(FakeBackend::default());
    backend.identity_fails.store(true, Ordering::SeqCst);
    let ctrl = controller(&backend);
    ctrl.start().unwrap();

    let err = ctrl.submit_identity("Jane Doe", "12345").await.unwrap_err();

    assert_matches!(err, WorkflowError::Gateway(GatewayError::Timeout { .. }));
    assert_eq!(ctrl.store().step(), Step::AskId);
    assert!(ctrl.view().error.unwrap().contains("too long"));
}

#[tokio::test]
async fn short_identity_never_reaches_backend() {
    let backend = Arc::new(FakeBackend::default());
    let ctrl = controller(&backend);
    ctrl.start().unwrap();

    let err = ctrl.submit_identity("Jo", "123").await.unwrap_err();

    assert_matches!(err, WorkflowError::Core(CoreError::Validation(_)));
    assert!(backend.calls().is_empty());
    assert_eq!(ctrl.store().step(), Step::AskId);
    assert!(ctrl.store().read(|s| s.error().is_some()));
}

#[tokio::test]
async fn second_submit_while_verifying_is_ignored() {
    let backend = Arc::new(FakeBackend::default());
    backend.identity_delay_ms.store(50, Ordering::SeqCst);
    let ctrl = controller(&backend);
    ctrl.start().unwrap();

    let (first, second) = tokio::join!(
        ctrl.submit_identity("Jane Doe", "12345"),
        ctrl.submit_identity("Jane Doe", "12345"),
    );

    assert_eq!(first.unwrap(), IdentityOutcome::Verified);
    assert_matches!(second, Err(WorkflowError::Busy(_)));
    assert_eq!(backend.calls_to("verify_identity"), 1);
}

#[tokio::test]
async fn response_after_reset_is_discarded() {
    let backend = Arc::new(FakeBackend::default());
    backend.identity_delay_ms.store(50, Ordering::SeqCst);
    let ctrl = controller(&backend);
    ctrl.start().unwrap();
    let old_session = ctrl.store().session_id();

    let (result, new_session) = tokio::join!(ctrl.submit_identity("Jane Doe", "12345"), async {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        ctrl.reset()
    });

    assert_matches!(result, Err(WorkflowError::SessionChanged));
    assert_ne!(old_session, new_session);
    ctrl.store().read(|s| {
        assert_eq!(s.step(), Step::Welcome);
        assert!(s.identity().is_none());
    });
}

// ---------------------------------------------------------------------------
// Vehicle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_plate_is_rejected_locally() {
    let backend = Arc::new(FakeBackend::default());
    let ctrl = controller(&backend);
    ctrl.start().unwrap();
    ctrl.submit_identity("Jane Doe", "12345").await.unwrap();

    let err = ctrl.submit_plate("ab-12cd").await.unwrap_err();

    assert_matches!(err, WorkflowError::Core(CoreError::Validation(_)));
    assert_eq!(backend.calls_to("verify_vehicle"), 0);
    assert_eq!(ctrl.store().step(), Step::AskPlate);
    assert!(ctrl.store().read(|s| s.error().is_some()));
}

#[tokio::test]
async fn unknown_plate_stays_on_plate_form() {
    let backend = Arc::new(FakeBackend::default());
    *backend.vehicle.lock().unwrap() = None;
    let ctrl = controller(&backend);
    ctrl.start().unwrap();
    ctrl.submit_identity("Jane Doe", "12345").await.unwrap();

    let outcome = ctrl.submit_plate("ZZZ999").await.unwrap();

    assert_eq!(outcome, VehicleOutcome::NotFound);
    assert_eq!(ctrl.store().step(), Step::AskPlate);
    assert!(ctrl.store().read(|s| s.error().unwrap().contains("ZZZ999")));
    assert_eq!(backend.calls_to("history:"), 0);
}

#[tokio::test]
async fn owner_mismatch_returns_to_plate_form() {
    let backend = Arc::new(FakeBackend::default());
    backend.vehicle.lock().unwrap().as_mut().unwrap().id = Some("99999".into());
    let ctrl = controller(&backend);
    ctrl.start().unwrap();
    ctrl.submit_identity("Jane Doe", "12345").await.unwrap();

    let outcome = ctrl.submit_plate("ABC123").await.unwrap();

    assert_eq!(outcome, VehicleOutcome::OwnerMismatch);
    ctrl.store().read(|s| {
        assert_eq!(s.step(), Step::AskPlate);
        assert!(s.error().is_some());
        assert!(s.user_info().is_some());
    });
}

#[tokio::test]
async fn history_failure_is_ignored() {
    let backend = Arc::new(FakeBackend::default());
    backend.history_fails.store(true, Ordering::SeqCst);
    let ctrl = controller(&backend);
    ctrl.start().unwrap();
    ctrl.submit_identity("Jane Doe", "12345").await.unwrap();

    let outcome = ctrl.submit_plate("ABC123").await.unwrap();

    assert_matches!(outcome, VehicleOutcome::Found(_));
    ctrl.store().read(|s| {
        assert_eq!(s.step(), Step::ShowVehicle);
        assert!(s.vehicle_history().is_none());
        assert!(s.error().is_none());
    });
}

#[tokio::test]
async fn vehicle_transport_failure_returns_to_plate_form() {
    let backend = Arc::new(FakeBackend::default());
    backend.vehicle_fails.store(true, Ordering::SeqCst);
    let ctrl = controller(&backend);
    ctrl.start().unwrap();
    ctrl.submit_identity("Jane Doe", "12345").await.unwrap();

    let err = ctrl.submit_plate("ABC123").await.unwrap_err();

    assert_matches!(err, WorkflowError::Gateway(_));
    assert_eq!(ctrl.store().step(), Step::AskPlate);
}

// ---------------------------------------------------------------------------
// Photos and quality gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn capture_sends_session_plate_and_geo() {
    let backend = Arc::new(FakeBackend::default());
    let ctrl = controller(&backend);
    at_first_photo(&ctrl).await;
    ctrl.set_note_draft("  ");

    let geo = GeoPoint::new(4.6, -74.1).unwrap();
    let outcome = ctrl.capture_photo(jpeg("front.jpg"), Some(geo)).await.unwrap();

    assert_eq!(outcome.quality, Some(QualityStatus::Ok));
    assert!(outcome.advanced);
    assert_eq!(ctrl.store().step(), Step::Photo(PhotoKey::Rear));
    let sent = backend.last_analyze.lock().unwrap().clone().unwrap();
    assert_eq!(sent.plate, "ABC123");
    assert_eq!(sent.photo_key, PhotoKey::Front);
    assert_eq!(sent.session_id, ctrl.store().session_id());
    assert_eq!(sent.geo, Some(geo));
    assert_eq!(sent.note, None);
}

#[tokio::test]
async fn non_image_is_rejected_before_upload() {
    let backend = Arc::new(FakeBackend::default());
    let ctrl = controller(&backend);
    at_first_photo(&ctrl).await;

    let pdf = PhotoFile::new("scan.pdf", "application/pdf", vec![1, 2, 3]);
    let err = ctrl.capture_photo(pdf, None).await.unwrap_err();

    assert_matches!(err, WorkflowError::Core(CoreError::Validation(_)));
    assert_eq!(backend.calls_to("analyze:"), 0);
    assert!(ctrl.store().read(|s| s.slot(PhotoKey::Front).is_none()));
}

#[tokio::test]
async fn blurry_photo_needs_override_and_retake_clears_it() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_analyze([
        AnalyzeReply::Quality(QualityStatus::Blur),
        AnalyzeReply::Quality(QualityStatus::Blur),
    ]);
    let ctrl = controller(&backend);
    at_first_photo(&ctrl).await;

    let outcome = ctrl.capture_photo(jpeg("front.jpg"), None).await.unwrap();
    assert_eq!(outcome.gate, GateDecision::Overridable);
    assert!(!outcome.advanced);
    assert_eq!(ctrl.store().step(), Step::Photo(PhotoKey::Front));
    assert_matches!(ctrl.advance(), Err(WorkflowError::Core(CoreError::Conflict(_))));

    assert_eq!(ctrl.continue_anyway().unwrap(), Step::Photo(PhotoKey::Rear));
    assert!(ctrl.store().read(|s| s.is_overridden(PhotoKey::Front)));

    // Another slot cannot be retaken from this photo step.
    assert_matches!(
        ctrl.retake(PhotoKey::Front),
        Err(WorkflowError::Core(CoreError::Conflict(_)))
    );
    ctrl.back().unwrap();
    ctrl.retake(PhotoKey::Front).unwrap();
    assert_eq!(ctrl.store().step(), Step::Photo(PhotoKey::Front));
    let outcome = ctrl.capture_photo(jpeg("front2.jpg"), None).await.unwrap();
    assert_eq!(outcome.gate, GateDecision::Overridable);
    assert!(!ctrl.store().read(|s| s.is_overridden(PhotoKey::Front)));
}

#[tokio::test]
async fn very_blurry_photo_cannot_be_overridden() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_analyze([AnalyzeReply::Quality(QualityStatus::VeryBlur)]);
    let ctrl = controller(&backend);
    at_first_photo(&ctrl).await;

    let outcome = ctrl.capture_photo(jpeg("front.jpg"), None).await.unwrap();
    assert_eq!(outcome.gate, GateDecision::RetakeRequired);

    assert_matches!(
        ctrl.continue_anyway(),
        Err(WorkflowError::Core(CoreError::Conflict(_)))
    );
    assert_eq!(ctrl.store().step(), Step::Photo(PhotoKey::Front));

    let outcome = ctrl.capture_photo(jpeg("front2.jpg"), None).await.unwrap();
    assert!(outcome.advanced);
}

#[tokio::test]
async fn quality_review_refuses_a_gated_slot() {
    let backend = Arc::new(FakeBackend::default());
    let ctrl = controller(&backend);
    at_quality_review(&ctrl).await;
    ctrl.store()
        .update(|s| s.store_analysis(PhotoKey::Front, analysed(QualityStatus::VeryBlur)));

    assert!(!ctrl.view().actions.contains(&Action::Next));
    assert_matches!(
        ctrl.advance(),
        Err(WorkflowError::Core(CoreError::Conflict(msg))) if msg.contains("front")
    );
    assert_eq!(ctrl.store().step(), Step::QualityCheck);
    assert_matches!(ctrl.finalize().await, Err(WorkflowError::Core(CoreError::Conflict(_))));
    assert_eq!(backend.calls_to("finalize:"), 0);
}

#[tokio::test]
async fn retake_from_quality_review_clears_only_that_slot() {
    let backend = Arc::new(FakeBackend::default());
    let ctrl = controller(&backend);
    at_quality_review(&ctrl).await;

    ctrl.retake(PhotoKey::Left).unwrap();

    ctrl.store().read(|s| {
        assert_eq!(s.step(), Step::Photo(PhotoKey::Left));
        assert_eq!(s.missing_photos(), vec![PhotoKey::Left]);
        assert!(s.analysis(PhotoKey::Rear).is_some());
    });

    // A very blurry retake cannot be walked past.
    backend.script_analyze([AnalyzeReply::Quality(QualityStatus::VeryBlur)]);
    let outcome = ctrl.capture_photo(jpeg("left2.jpg"), None).await.unwrap();
    assert!(!outcome.advanced);
    assert_matches!(ctrl.advance(), Err(WorkflowError::Core(CoreError::Conflict(_))));
    assert_matches!(
        ctrl.retake(PhotoKey::Vin),
        Err(WorkflowError::Core(CoreError::Conflict(_)))
    );
}

#[tokio::test]
async fn advance_is_refused_while_photo_is_analysed() {
    let backend = Arc::new(FakeBackend::default());
    backend.analyze_delay_ms.store(200, Ordering::SeqCst);
    let ctrl = controller(&backend);
    at_first_photo(&ctrl).await;

    let capturing = {
        let ctrl = ctrl.clone();
        tokio::spawn(async move { ctrl.capture_photo(jpeg("front.jpg"), None).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_matches!(
        ctrl.advance(),
        Err(WorkflowError::Busy(Operation::Analyze(PhotoKey::Front)))
    );
    assert_matches!(ctrl.continue_anyway(), Err(WorkflowError::Busy(_)));
    assert_matches!(ctrl.retake(PhotoKey::Front), Err(WorkflowError::Busy(_)));
    assert_eq!(ctrl.store().step(), Step::Photo(PhotoKey::Front));

    let outcome = capturing.await.unwrap().unwrap();
    assert!(outcome.advanced);
    assert_eq!(ctrl.store().step(), Step::Photo(PhotoKey::Rear));
}

#[tokio::test]
async fn failed_analysis_blocks_advance_until_retaken() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_analyze([AnalyzeReply::Fail]);
    let ctrl = controller(&backend);
    at_first_photo(&ctrl).await;

    ctrl.capture_photo(jpeg("front.jpg"), None).await.unwrap_err();
    assert_matches!(ctrl.advance(), Err(WorkflowError::Core(CoreError::Conflict(_))));
    assert_eq!(ctrl.store().step(), Step::Photo(PhotoKey::Front));

    let outcome = ctrl.capture_photo(jpeg("front2.jpg"), None).await.unwrap();
    assert!(outcome.advanced);
}

fn analysed(status: QualityStatus) -> inspecta_core::analysis::AnalysisResult {
    inspecta_core::analysis::AnalysisResult {
        quality_status: Some(status),
        ..Default::default()
    }
}

#[tokio::test]
async fn analysis_failure_keeps_photo_step() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_analyze([AnalyzeReply::Fail]);
    let ctrl = controller(&backend);
    at_first_photo(&ctrl).await;

    let err = ctrl.capture_photo(jpeg("front.jpg"), None).await.unwrap_err();

    assert_matches!(err, WorkflowError::Gateway(_));
    ctrl.store().read(|s| {
        assert_eq!(s.step(), Step::Photo(PhotoKey::Front));
        assert!(s.slot(PhotoKey::Front).is_some());
        assert!(s.analysis(PhotoKey::Front).is_none());
        assert!(s.error().unwrap().starts_with("Photo analysis failed"));
    });
}

#[tokio::test]
async fn abort_in_analysis_is_terminal() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_analyze([AnalyzeReply::Abort("FRAUD_SUSPECTED".into())]);
    let ctrl = controller(&backend);
    at_first_photo(&ctrl).await;
    let mut events = ctrl.subscribe();

    let outcome = ctrl.capture_photo(jpeg("front.jpg"), None).await.unwrap();

    assert!(outcome.aborted);
    assert!(!outcome.advanced);
    assert_eq!(ctrl.store().step(), Step::Results);
    let all: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(all.contains(&WorkflowEvent::Aborted {
        reason: "FRAUD_SUSPECTED".into()
    }));

    let err = ctrl.back().unwrap_err();
    assert_matches!(err, WorkflowError::Core(CoreError::Aborted(ref r)) if r == "FRAUD_SUSPECTED");
    assert_eq!(ctrl.view().title, "Inspection cancelled");
}

// ---------------------------------------------------------------------------
// Finalize and reset
// ---------------------------------------------------------------------------

#[tokio::test]
async fn finalize_failure_returns_to_damage_review() {
    let backend = Arc::new(FakeBackend::default());
    *backend.finalize_reply.lock().unwrap() = FinalizeReply::Fail;
    let ctrl = controller(&backend);
    at_damage_review(&ctrl).await;

    let err = ctrl.finalize().await.unwrap_err();

    assert_matches!(err, WorkflowError::Gateway(GatewayError::Http { status: 502, .. }));
    ctrl.store().read(|s| {
        assert_eq!(s.step(), Step::DamageDetection);
        assert!(s.error().unwrap().starts_with("Could not finalize"));
        assert!(s.finalize_result().is_none());
    });
}

#[tokio::test]
async fn finalize_abort_marker_aborts() {
    let backend = Arc::new(FakeBackend::default());
    *backend.finalize_reply.lock().unwrap() = FinalizeReply::Abort("VIN_MISMATCH".into());
    let ctrl = controller(&backend);
    at_damage_review(&ctrl).await;

    ctrl.finalize().await.unwrap();

    ctrl.store().read(|s| {
        assert_eq!(s.step(), Step::Results);
        assert_eq!(s.abort_state().unwrap().reason, "VIN_MISMATCH");
    });
    assert_matches!(
        ctrl.download_report().await,
        Err(WorkflowError::Core(CoreError::Conflict(_)))
    );
}

#[tokio::test]
async fn finalize_requires_damage_review() {
    let backend = Arc::new(FakeBackend::default());
    let ctrl = controller(&backend);
    at_first_photo(&ctrl).await;

    assert_matches!(
        ctrl.finalize().await,
        Err(WorkflowError::Core(CoreError::Conflict(_)))
    );
    assert_eq!(backend.calls_to("finalize:"), 0);
}

#[tokio::test]
async fn reset_starts_a_clean_session_keeping_thresholds() {
    let backend = Arc::new(FakeBackend::default());
    let ctrl = controller(&backend);
    ctrl.load_reference_data().await;
    at_first_photo(&ctrl).await;
    ctrl.capture_photo(jpeg("front.jpg"), None).await.unwrap();
    ctrl.add_note("Scuffed bumper").unwrap();
    let old_session = ctrl.store().session_id();

    let new_session = ctrl.reset();

    assert_ne!(old_session, new_session);
    ctrl.store().read(|s| {
        assert_eq!(s.step(), Step::Welcome);
        assert!(s.slot(PhotoKey::Front).is_none());
        assert!(s.analysis(PhotoKey::Front).is_none());
        assert!(s.notes().is_empty());
        assert!(s.thresholds().is_some());
        assert_eq!(s.live_previews(), 0);
    });
}
