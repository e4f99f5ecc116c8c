//! Scriptable in-memory backend for workflow tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use inspecta_core::analysis::{AnalysisResult, FinalizeResult, QualityStatus};
use inspecta_core::photo::{PhotoFile, PHOTO_ORDER};
use inspecta_core::quality_gate::QualityThresholds;
use inspecta_core::validation::{validate_plate, IdentityInput};
use inspecta_core::vehicle::{VehicleHistory, VehicleRecord};
use inspecta_gateway::types::{
    AnalyzeRequest, FinalizeRequest, HealthInfo, IdentityVerification, ModelInfo, VehicleLookup,
};
use inspecta_gateway::{GatewayError, InspectionBackend};
use inspecta_workflow::{ControllerOptions, InspectionController};

/// Scripted answer of one analyze call.
#[derive(Debug, Clone)]
pub enum AnalyzeReply {
    Quality(QualityStatus),
    Abort(String),
    Fail,
}

/// Scripted answer of finalize.
#[derive(Debug, Clone)]
pub enum FinalizeReply {
    Approved,
    Abort(String),
    Fail,
}

pub struct FakeBackend {
    pub calls: Mutex<Vec<String>>,
    pub identity_valid: AtomicBool,
    pub identity_fails: AtomicBool,
    /// Delay applied to identity verification.
    pub identity_delay_ms: AtomicU64,
    pub vehicle: Mutex<Option<VehicleRecord>>,
    pub vehicle_fails: AtomicBool,
    pub history_fails: AtomicBool,
    /// Consumed in order; `Quality(Ok)` once empty.
    pub analyze_replies: Mutex<VecDeque<AnalyzeReply>>,
    pub finalize_reply: Mutex<FinalizeReply>,
    pub last_analyze: Mutex<Option<AnalyzeRequest>>,
    /// Delay applied to photo analysis.
    pub analyze_delay_ms: AtomicU64,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            identity_valid: AtomicBool::new(true),
            identity_fails: AtomicBool::new(false),
            identity_delay_ms: AtomicU64::new(0),
            vehicle: Mutex::new(Some(VehicleRecord {
                plate: "ABC123".into(),
                brand: Some("Mazda".into()),
                model: Some("3".into()),
                year: Some("2019".into()),
                owner: Some("Jane Doe".into()),
                id: Some("12345".into()),
                history: None,
            })),
            vehicle_fails: AtomicBool::new(false),
            history_fails: AtomicBool::new(false),
            analyze_replies: Mutex::new(VecDeque::new()),
            finalize_reply: Mutex::new(FinalizeReply::Approved),
            last_analyze: Mutex::new(None),
            analyze_delay_ms: AtomicU64::new(0),
        }
    }
}

impl FakeBackend {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn script_analyze(&self, replies: impl IntoIterator<Item = AnalyzeReply>) {
        self.analyze_replies.lock().unwrap().extend(replies);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn timeout() -> GatewayError {
    GatewayError::Timeout {
        after: Duration::from_secs(8),
    }
}

#[async_trait]
impl InspectionBackend for FakeBackend {
    async fn model_info(&self) -> Result<ModelInfo, GatewayError> {
        Ok(ModelInfo::default())
    }

    async fn health(&self) -> Result<HealthInfo, GatewayError> {
        self.record("health".into());
        Ok(HealthInfo {
            status: "ok".into(),
            quality_thresholds: Some(QualityThresholds::default()),
            ..Default::default()
        })
    }

    async fn verify_vehicle(&self, plate: &str) -> Result<VehicleLookup, GatewayError> {
        let plate = validate_plate(plate)?;
        self.record(format!("verify_vehicle:{plate}"));
        if self.vehicle_fails.load(Ordering::SeqCst) {
            return Err(timeout());
        }
        let data = self.vehicle.lock().unwrap().clone();
        Ok(VehicleLookup {
            found: data.is_some(),
            data,
        })
    }

    async fn verify_identity(
        &self,
        identity: &IdentityInput,
    ) -> Result<IdentityVerification, GatewayError> {
        self.record(format!(
            "verify_identity:{}|{}",
            identity.name, identity.document
        ));
        let delay = self.identity_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.identity_fails.load(Ordering::SeqCst) {
            return Err(timeout());
        }
        Ok(IdentityVerification {
            valid: self.identity_valid.load(Ordering::SeqCst),
            matched_driver: None,
        })
    }

    async fn vehicle_history(&self, plate: &str) -> Result<VehicleHistory, GatewayError> {
        self.record(format!("history:{plate}"));
        if self.history_fails.load(Ordering::SeqCst) {
            return Err(GatewayError::Http {
                status: 500,
                body: "history down".into(),
            });
        }
        Ok(VehicleHistory {
            plate: plate.to_string(),
            infractions: 1,
            previous_owners: 2,
            tech_ok: true,
            notes: vec![],
        })
    }

    async fn analyze_photo(
        &self,
        request: &AnalyzeRequest,
    ) -> Result<AnalysisResult, GatewayError> {
        self.record(format!("analyze:{}", request.photo_key.as_str()));
        *self.last_analyze.lock().unwrap() = Some(request.clone());
        let delay = self.analyze_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let reply = self
            .analyze_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(AnalyzeReply::Quality(QualityStatus::Ok));
        match reply {
            AnalyzeReply::Quality(status) => Ok(AnalysisResult {
                session_id: request.session_id.to_string(),
                quality_status: Some(status),
                ..Default::default()
            }),
            AnalyzeReply::Abort(reason) => Ok(AnalysisResult {
                session_id: request.session_id.to_string(),
                aborted: true,
                abort_reason: Some(reason),
                ..Default::default()
            }),
            AnalyzeReply::Fail => Err(timeout()),
        }
    }

    async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResult, GatewayError> {
        self.record(format!("finalize:{}", request.plate));
        let reply = self.finalize_reply.lock().unwrap().clone();
        match reply {
            FinalizeReply::Approved => Ok(FinalizeResult {
                inspection_id: Some("insp-1".into()),
                session_id: request.session_id.to_string(),
                status: "approved".into(),
                ..Default::default()
            }),
            FinalizeReply::Abort(reason) => Ok(FinalizeResult {
                session_id: request.session_id.to_string(),
                status: "aborted".into(),
                aborted: Some(true),
                abort_reason: Some(reason),
                ..Default::default()
            }),
            FinalizeReply::Fail => Err(GatewayError::Http {
                status: 502,
                body: "bad gateway".into(),
            }),
        }
    }

    async fn report_pdf(&self, inspection_id: &str) -> Result<Vec<u8>, GatewayError> {
        self.record(format!("report:{inspection_id}"));
        Ok(b"%PDF-1.4".to_vec())
    }
}

pub fn controller(backend: &Arc<FakeBackend>) -> InspectionController {
    let backend: Arc<dyn InspectionBackend> = backend.clone();
    InspectionController::new(backend, ControllerOptions::default())
}

pub fn jpeg(name: &str) -> PhotoFile {
    PhotoFile::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0])
}

/// Walk a fresh controller up to the first photo step.
pub async fn at_first_photo(ctrl: &InspectionController) {
    ctrl.start().unwrap();
    ctrl.submit_identity("Jane Doe", "12345").await.unwrap();
    ctrl.submit_plate("ABC123").await.unwrap();
    ctrl.advance().unwrap();
}

/// Walk a fresh controller up to the quality review with six good photos.
pub async fn at_quality_review(ctrl: &InspectionController) {
    at_first_photo(ctrl).await;
    for key in PHOTO_ORDER {
        let outcome = ctrl
            .capture_photo(jpeg(&format!("{}.jpg", key.as_str())), None)
            .await
            .unwrap();
        assert!(outcome.advanced, "{key:?} should auto-advance");
    }
}

/// Walk a fresh controller up to damage review with six good photos.
pub async fn at_damage_review(ctrl: &InspectionController) {
    at_quality_review(ctrl).await;
    ctrl.advance().unwrap();
}
