//! Inspection workflow controller.
//!
//! Couples the [`SharedStore`] with an [`InspectionBackend`]. Each user
//! action validates locally, marks itself busy, moves the store into the
//! matching transient step, awaits the backend, then applies the outcome
//! to the store. Failures become step-local error messages and return
//! the session to an interactive step.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use inspecta_core::analysis::QualityStatus;
use inspecta_core::error::CoreError;
use inspecta_core::photo::{validate_photo_intake, GeoPoint, PhotoFile, PhotoKey};
use inspecta_core::quality_gate::GateDecision;
use inspecta_core::step::Step;
use inspecta_core::store::InspectionStore;
use inspecta_core::types::SessionId;
use inspecta_core::validation::{validate_plate, IdentityInput};
use inspecta_core::vehicle::{UserInfo, VehicleRecord, VerifiedIdentity};
use inspecta_gateway::reconnect::ReconnectConfig;
use inspecta_gateway::types::{AnalyzeRequest, ConfidenceOverrides, FinalizeRequest, HealthInfo};
use inspecta_gateway::upload::optimize_photo;
use inspecta_gateway::InspectionBackend;

use crate::busy::{BusyGuard, BusyTracker, Operation};
use crate::error::WorkflowError;
use crate::events::WorkflowEvent;
use crate::state::SharedStore;
use crate::view::{render, StepView};
use crate::watcher::spawn_session_watcher;

// ---------------------------------------------------------------------------
// Options and outcomes
// ---------------------------------------------------------------------------

/// Per-client settings applied to every session.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub confidence: ConfidenceOverrides,
    /// Ask the backend for debug overlays on analyze.
    pub debug_images: bool,
    /// Subscribe to the session socket for server-pushed aborts.
    pub watch_session: bool,
    pub reconnect: ReconnectConfig,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            confidence: ConfidenceOverrides::default(),
            debug_images: false,
            watch_session: true,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Result of [`InspectionController::submit_identity`].
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityOutcome {
    Verified,
    /// The backend answered but did not accept the identity.
    Rejected,
}

/// Result of [`InspectionController::submit_plate`].
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleOutcome {
    Found(VehicleRecord),
    NotFound,
    /// The registered owner is not the verified person.
    OwnerMismatch,
}

/// Result of [`InspectionController::capture_photo`].
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOutcome {
    pub photo_key: PhotoKey,
    pub quality: Option<QualityStatus>,
    pub gate: GateDecision,
    /// The workflow moved on to the next step automatically.
    pub advanced: bool,
    pub aborted: bool,
}

const IDENTITY_REJECTED: &str = "We could not verify your identity. Check the name and document.";
const OWNER_MISMATCH: &str = "The vehicle owner does not match the verified identity.";

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Drives one inspection at a time. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct InspectionController {
    backend: Arc<dyn InspectionBackend>,
    store: SharedStore,
    busy: BusyTracker,
    options: ControllerOptions,
    watcher: Arc<Mutex<Option<CancellationToken>>>,
}

impl InspectionController {
    pub fn new(backend: Arc<dyn InspectionBackend>, options: ControllerOptions) -> Self {
        Self {
            backend,
            store: SharedStore::default(),
            busy: BusyTracker::new(),
            options,
            watcher: Arc::new(Mutex::new(None)),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.store.subscribe()
    }

    pub fn is_busy(&self, op: Operation) -> bool {
        self.busy.is_busy(op)
    }

    /// Render the current step.
    pub fn view(&self) -> StepView {
        let busy = self.busy.snapshot();
        self.store.read(|store| render(store, &busy))
    }

    // ---- reference data ----

    /// Fetch backend health once and keep its quality thresholds.
    ///
    /// Failures are logged and ignored; the gate then relies on the
    /// backend's own quality status.
    pub async fn load_reference_data(&self) -> Option<HealthInfo> {
        let health = match self.backend.health().await {
            Ok(health) => health,
            Err(e) => {
                tracing::warn!(error = %e, "Backend health unavailable; using backend quality status only");
                return None;
            }
        };

        match &health.quality_thresholds {
            Some(thresholds) => match thresholds.validate() {
                Ok(()) => {
                    let thresholds = thresholds.clone();
                    self.store.update(|s| s.set_thresholds(thresholds));
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring invalid backend thresholds"),
            },
            None => tracing::debug!("Backend sent no quality thresholds"),
        }
        tracing::info!(
            status = %health.status,
            model_version = health.model_version.as_deref().unwrap_or("unknown"),
            "Backend reference data loaded",
        );
        Some(health)
    }

    // ---- navigation ----

    /// Leave `WELCOME` and subscribe to the session socket.
    pub fn start(&self) -> Result<Step, WorkflowError> {
        let step = self.store.update(|s| s.advance())?;
        self.watch_session();
        Ok(step)
    }

    /// Move forward. Refused while the current photo is being analysed.
    pub fn advance(&self) -> Result<Step, WorkflowError> {
        let _guard = self.hold_current_photo()?;
        Ok(self.store.update(|s| s.advance())?)
    }

    pub fn back(&self) -> Result<Step, WorkflowError> {
        Ok(self.store.update(|s| s.retreat())?)
    }

    /// One-time override of a `blur` status on the current photo step.
    pub fn continue_anyway(&self) -> Result<Step, WorkflowError> {
        let _guard = self.hold_current_photo()?;
        Ok(self.store.update(|s| s.continue_anyway())?)
    }

    /// Clear `key` and return to its photo step for a new capture.
    ///
    /// Only from the quality review, or for the current photo step's own
    /// slot while its analysis is not in flight.
    pub fn retake(&self, key: PhotoKey) -> Result<(), WorkflowError> {
        let _guard = self.begin(Operation::Analyze(key))?;
        Ok(self.store.update(|s| s.retake(key))?)
    }

    // ---- identity ----

    /// Verify the inspector's identity.
    ///
    /// Input is trimmed and checked locally first. A rejection or a
    /// failed call returns to `ASK_ID` with an error message.
    pub async fn submit_identity(
        &self,
        name: &str,
        document: &str,
    ) -> Result<IdentityOutcome, WorkflowError> {
        let _guard = self.begin(Operation::VerifyIdentity)?;
        self.expect_step(Step::AskId)?;

        let input = IdentityInput::parse(name, document).map_err(|e| self.fail(e.into()))?;

        let session_id = self.store.session_id();
        self.store.update(|s| {
            s.clear_error();
            s.enter_step(Step::VerifyingId)
        })?;

        let result = self.backend.verify_identity(&input).await;

        self.store
            .update_if_session(&session_id, |s| -> Result<IdentityOutcome, WorkflowError> {
                match result {
                    Ok(answer) if answer.valid => {
                        tracing::info!(session_id = %session_id, "Identity verified");
                        s.set_identity(VerifiedIdentity {
                            name: input.name.clone(),
                            document: input.document.clone(),
                            matched_driver: answer.matched_driver,
                        })?;
                        s.enter_step(Step::AskPlate)?;
                        Ok(IdentityOutcome::Verified)
                    }
                    Ok(_) => {
                        tracing::info!(session_id = %session_id, "Identity rejected by backend");
                        s.enter_step(Step::AskId)?;
                        s.set_error(IDENTITY_REJECTED);
                        Ok(IdentityOutcome::Rejected)
                    }
                    Err(e) => {
                        let err = WorkflowError::from(e);
                        s.enter_step(Step::AskId)?;
                        s.set_error(err.user_message());
                        Err(err)
                    }
                }
            })
            .ok_or(WorkflowError::SessionChanged)?
    }

    // ---- vehicle ----

    /// Look up the vehicle by plate.
    ///
    /// A malformed plate never reaches the backend. On success the
    /// vehicle history is fetched too (failures ignored) and the holder
    /// info recorded. Not-found, owner mismatch and transport failures
    /// return to `ASK_PLATE` with an error message.
    pub async fn submit_plate(&self, raw_plate: &str) -> Result<VehicleOutcome, WorkflowError> {
        let _guard = self.begin(Operation::VerifyVehicle)?;
        self.expect_step(Step::AskPlate)?;

        let plate = validate_plate(raw_plate).map_err(|e| self.fail(e.into()))?;

        let session_id = self.store.session_id();
        self.store.update(|s| {
            s.clear_error();
            s.enter_step(Step::VerifyingVehicle)
        })?;

        let lookup = match self.backend.verify_vehicle(&plate).await {
            Ok(lookup) => lookup,
            Err(e) => {
                let err = WorkflowError::from(e);
                self.store
                    .update_if_session(&session_id, |s| {
                        s.enter_step(Step::AskPlate)?;
                        s.set_error(err.user_message());
                        Ok::<_, CoreError>(())
                    })
                    .ok_or(WorkflowError::SessionChanged)??;
                return Err(err);
            }
        };

        let Some(record) = lookup.record().cloned() else {
            tracing::info!(session_id = %session_id, plate = %plate, "Vehicle not found");
            self.store
                .update_if_session(&session_id, |s| {
                    s.enter_step(Step::AskPlate)?;
                    s.set_error(format!("No vehicle registered with plate {plate}."));
                    Ok::<_, CoreError>(())
                })
                .ok_or(WorkflowError::SessionChanged)??;
            return Ok(VehicleOutcome::NotFound);
        };

        let history = match self.backend.vehicle_history(&plate).await {
            Ok(history) => Some(history),
            Err(e) => {
                tracing::warn!(session_id = %session_id, plate = %plate, error = %e, "Vehicle history unavailable");
                None
            }
        };

        self.store
            .update_if_session(&session_id, |s| -> Result<VehicleOutcome, WorkflowError> {
                s.set_vehicle(record.clone())?;
                if let Some(history) = history {
                    s.set_vehicle_history(history)?;
                }
                let identity = s.identity().cloned();
                if let Some(identity) = &identity {
                    s.set_user_info(UserInfo {
                        name: identity.name.clone(),
                        id_number: identity.document.clone(),
                        plate: plate.clone(),
                    })?;
                }

                if identity.is_some_and(|i| record.owner_mismatch(&i.document)) {
                    tracing::warn!(session_id = %session_id, plate = %plate, "Vehicle owner mismatch");
                    s.enter_step(Step::AskPlate)?;
                    s.set_error(OWNER_MISMATCH);
                    return Ok(VehicleOutcome::OwnerMismatch);
                }

                tracing::info!(session_id = %session_id, plate = %plate, "Vehicle verified");
                s.enter_step(Step::ShowVehicle)?;
                Ok(VehicleOutcome::Found(record))
            })
            .ok_or(WorkflowError::SessionChanged)?
    }

    // ---- photos ----

    /// Capture, analyse and gate the photo of the current photo step.
    ///
    /// The file is checked (`image/*`, at most 8 MiB) and stored before
    /// upload; oversized images are downscaled for the upload only. When
    /// the analysis passes the gate and the user is still on this step,
    /// the workflow advances. An analysis failure keeps the step and
    /// raises an error message.
    pub async fn capture_photo(
        &self,
        file: PhotoFile,
        geo: Option<GeoPoint>,
    ) -> Result<CaptureOutcome, WorkflowError> {
        let key = self
            .store
            .step()
            .photo_key()
            .ok_or_else(|| CoreError::Conflict("Not on a photo step".to_string()))?;
        let _guard = self.begin(Operation::Analyze(key))?;

        validate_photo_intake(&file).map_err(|e| self.fail(e.into()))?;

        let upload = optimize_photo(&file).into_owned();
        let session_id = self.store.session_id();
        let (plate, note) = self.store.update(|s| {
            s.set_photo(key, Some(file), geo)?;
            s.clear_error();
            Ok::<_, CoreError>((session_plate(s), non_blank(s.note_draft())))
        })?;
        let plate = plate.ok_or_else(|| self.fail(WorkflowError::MissingPlate))?;

        let request = AnalyzeRequest {
            session_id: session_id.clone(),
            plate,
            photo_key: key,
            file: upload,
            geo,
            note,
            confidence: self.options.confidence,
            debug: self.options.debug_images,
        };

        let result = self.backend.analyze_photo(&request).await;

        self.store
            .update_if_session(&session_id, |s| -> Result<CaptureOutcome, WorkflowError> {
                let analysis = match result {
                    Ok(analysis) => analysis,
                    Err(e) => {
                        let err = WorkflowError::from(e);
                        tracing::warn!(session_id = %session_id, photo_key = key.as_str(), error = %err, "Photo analysis failed");
                        if !s.is_aborted() {
                            s.set_error(format!("Photo analysis failed: {}", err.user_message()));
                        }
                        return Err(err);
                    }
                };

                s.store_analysis(key, analysis);
                let quality = s.quality_of(key);
                let gate = s.gate(key);
                let aborted = s.is_aborted();
                let mut advanced = false;

                if !aborted && s.step() == Step::Photo(key) {
                    match gate {
                        GateDecision::Pass => advanced = s.advance().is_ok(),
                        GateDecision::Overridable => s.set_error(format!(
                            "The {} photo is blurry. Retake it or continue anyway.",
                            key.label()
                        )),
                        GateDecision::RetakeRequired => s.set_error(format!(
                            "The {} photo is too blurry. Please retake it.",
                            key.label()
                        )),
                    }
                }

                Ok(CaptureOutcome {
                    photo_key: key,
                    quality,
                    gate,
                    advanced,
                    aborted,
                })
            })
            .ok_or(WorkflowError::SessionChanged)?
            .inspect(|outcome| {
                self.store.emit(WorkflowEvent::PhotoAnalyzed {
                    photo_key: outcome.photo_key,
                    quality: outcome.quality,
                });
            })
    }

    // ---- notes ----

    pub fn add_note(&self, text: &str) -> Result<(), WorkflowError> {
        Ok(self.store.update(|s| s.add_note(text))?)
    }

    pub fn set_note_draft(&self, text: &str) {
        self.store.update(|s| s.set_note_draft(text));
    }

    pub fn commit_note_draft(&self) -> bool {
        self.store.update(InspectionStore::commit_note_draft)
    }

    // ---- finalize ----

    /// Ask the backend for the consolidated verdict.
    ///
    /// Moves through `FINALIZING` to `RESULTS`. On failure the session
    /// returns to `DAMAGE_DETECTION` with an error message.
    pub async fn finalize(&self) -> Result<(), WorkflowError> {
        let _guard = self.begin(Operation::Finalize)?;
        self.expect_step(Step::DamageDetection)?;

        let plate = self
            .store
            .read(session_plate)
            .ok_or_else(|| self.fail(WorkflowError::MissingPlate))?;
        let session_id = self.store.session_id();
        self.store.update(|s| {
            s.commit_note_draft();
            s.clear_error();
            s.enter_step(Step::Finalizing)
        })?;

        let request = FinalizeRequest {
            session_id: session_id.clone(),
            plate,
            confidence: self.options.confidence,
        };
        let result = self.backend.finalize(&request).await;

        self.store
            .update_if_session(&session_id, |s| -> Result<Option<String>, WorkflowError> {
                match result {
                    Ok(result) => {
                        let inspection_id = result.inspection_id.clone();
                        s.store_finalize(result);
                        if !s.is_aborted() {
                            s.enter_step(Step::Results)?;
                            tracing::info!(
                                session_id = %session_id,
                                inspection_id = inspection_id.as_deref().unwrap_or("-"),
                                "Inspection finalized",
                            );
                        }
                        Ok(inspection_id)
                    }
                    Err(e) => {
                        let err = WorkflowError::from(e);
                        if !s.is_aborted() {
                            s.enter_step(Step::DamageDetection)?;
                            s.set_error(format!("Could not finalize: {}", err.user_message()));
                        }
                        Err(err)
                    }
                }
            })
            .ok_or(WorkflowError::SessionChanged)?
            .map(|inspection_id| {
                self.store.emit(WorkflowEvent::Finalized { inspection_id });
            })
    }

    /// Fetch the PDF report of the finalized inspection.
    pub async fn download_report(&self) -> Result<Vec<u8>, WorkflowError> {
        let _guard = self.begin(Operation::DownloadReport)?;
        let inspection_id = self
            .store
            .read(|s| s.finalize_result().and_then(|r| r.inspection_id.clone()))
            .ok_or_else(|| CoreError::Conflict("No finalized inspection to download".to_string()))?;

        self.backend.report_pdf(&inspection_id).await.map_err(|e| {
            let err = WorkflowError::from(e);
            self.store
                .update(|s| s.set_error(format!("Report download failed: {}", err.user_message())));
            err
        })
    }

    // ---- session lifecycle ----

    /// Discard the session and start a new one at `WELCOME`.
    pub fn reset(&self) -> SessionId {
        self.stop_watching();
        self.store.update(InspectionStore::reset);
        let session_id = self.store.session_id();
        tracing::info!(session_id = %session_id, "New inspection session");
        session_id
    }

    /// Subscribe to the current session's socket, replacing any
    /// previous subscription. No-op when disabled or unsupported.
    pub fn watch_session(&self) {
        if !self.options.watch_session {
            return;
        }
        let session_id = self.store.session_id();
        let Some(url) = self.backend.session_url(&session_id) else {
            return;
        };
        let cancel = spawn_session_watcher(
            self.store.clone(),
            session_id,
            url,
            self.options.reconnect.clone(),
        );
        if let Some(previous) = self.watcher_slot().replace(cancel) {
            previous.cancel();
        }
    }

    pub fn stop_watching(&self) {
        if let Some(cancel) = self.watcher_slot().take() {
            cancel.cancel();
        }
    }

    // ---- private helpers ----

    fn begin(&self, op: Operation) -> Result<BusyGuard, WorkflowError> {
        self.busy.try_begin(op).ok_or_else(|| {
            tracing::debug!(operation = %op, "Ignoring re-entrant trigger");
            WorkflowError::Busy(op)
        })
    }

    /// On a photo step, claim that slot's analysis so navigation cannot
    /// race an in-flight capture.
    fn hold_current_photo(&self) -> Result<Option<BusyGuard>, WorkflowError> {
        match self.store.step().photo_key() {
            Some(key) => self.begin(Operation::Analyze(key)).map(Some),
            None => Ok(None),
        }
    }

    fn expect_step(&self, expected: Step) -> Result<(), WorkflowError> {
        let current = self.store.read(|s| {
            if s.is_aborted() {
                Err(CoreError::Aborted(
                    s.abort_state().map(|a| a.reason.clone()).unwrap_or_default(),
                ))
            } else {
                Ok(s.step())
            }
        })?;
        if current != expected {
            return Err(CoreError::Conflict(format!("Expected step {expected}, at {current}")).into());
        }
        Ok(())
    }

    /// Record `err` as the step-local message and hand it back.
    fn fail(&self, err: WorkflowError) -> WorkflowError {
        self.store.update(|s| s.set_error(err.user_message()));
        err
    }

    fn watcher_slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.watcher.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn session_plate(store: &InspectionStore) -> Option<String> {
    store
        .user_info()
        .map(|u| u.plate.clone())
        .or_else(|| store.vehicle().map(|v| v.plate.clone()))
        .filter(|p| !p.is_empty())
}

fn non_blank(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
