//! Workflow state store for one inspection session.
//!
//! [`InspectionStore`] holds every piece of mutable session state (step,
//! photo slots, analyses, notes, abort status, finalize result) and
//! exposes the only operations allowed to change it. All mutations are
//! synchronous; callers that share a store across tasks wrap it in a
//! lock and apply async completions in completion order.
//!
//! Abort is terminal: once recorded, the step is pinned to `RESULTS` and
//! photo, identity and navigation mutations fail with
//! [`CoreError::Aborted`].

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{AnalysisResult, FinalizeResult, QualityStatus};
use crate::error::CoreError;
use crate::photo::{GeoPoint, PhotoFile, PhotoKey, PHOTO_ORDER};
use crate::preview::{PreviewHandle, PreviewRegistry};
use crate::quality_gate::{compute_summary, evaluate_gate, GateDecision, QualitySummary, QualityThresholds};
use crate::step::Step;
use crate::types::SessionId;
use crate::vehicle::{UserInfo, VehicleHistory, VehicleRecord, VerifiedIdentity};

/// A filled photo slot.
#[derive(Debug)]
pub struct PhotoSlot {
    pub file: PhotoFile,
    pub geo: Option<GeoPoint>,
    preview: PreviewHandle,
}

impl PhotoSlot {
    pub fn preview_url(&self) -> &str {
        self.preview.url()
    }
}

/// Recorded abort. First writer wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortState {
    pub reason: String,
}

#[derive(Debug)]
pub struct InspectionStore {
    session_id: SessionId,
    step: Step,
    identity: Option<VerifiedIdentity>,
    vehicle: Option<VehicleRecord>,
    vehicle_history: Option<VehicleHistory>,
    user_info: Option<UserInfo>,
    slots: BTreeMap<PhotoKey, PhotoSlot>,
    analyses: BTreeMap<PhotoKey, AnalysisResult>,
    /// Slots whose `blur` status the user chose to continue past.
    overrides: BTreeSet<PhotoKey>,
    notes: Vec<String>,
    note_draft: String,
    abort: Option<AbortState>,
    finalize: Option<FinalizeResult>,
    /// Backend reference data; survives reset.
    thresholds: Option<QualityThresholds>,
    error: Option<String>,
    previews: PreviewRegistry,
}

impl Default for InspectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InspectionStore {
    pub fn new() -> Self {
        Self {
            session_id: SessionId::generate(),
            step: Step::Welcome,
            identity: None,
            vehicle: None,
            vehicle_history: None,
            user_info: None,
            slots: BTreeMap::new(),
            analyses: BTreeMap::new(),
            overrides: BTreeSet::new(),
            notes: Vec::new(),
            note_draft: String::new(),
            abort: None,
            finalize: None,
            thresholds: None,
            error: None,
            previews: PreviewRegistry::new(),
        }
    }

    // ---- read access ----

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn identity(&self) -> Option<&VerifiedIdentity> {
        self.identity.as_ref()
    }

    pub fn vehicle(&self) -> Option<&VehicleRecord> {
        self.vehicle.as_ref()
    }

    pub fn vehicle_history(&self) -> Option<&VehicleHistory> {
        self.vehicle_history.as_ref()
    }

    pub fn user_info(&self) -> Option<&UserInfo> {
        self.user_info.as_ref()
    }

    pub fn slot(&self, key: PhotoKey) -> Option<&PhotoSlot> {
        self.slots.get(&key)
    }

    pub fn preview_url(&self, key: PhotoKey) -> Option<&str> {
        self.slots.get(&key).map(PhotoSlot::preview_url)
    }

    pub fn analysis(&self, key: PhotoKey) -> Option<&AnalysisResult> {
        self.analyses.get(&key)
    }

    pub fn analyses(&self) -> impl Iterator<Item = (PhotoKey, &AnalysisResult)> {
        self.analyses.iter().map(|(k, v)| (*k, v))
    }

    pub fn is_overridden(&self, key: PhotoKey) -> bool {
        self.overrides.contains(&key)
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn note_draft(&self) -> &str {
        &self.note_draft
    }

    pub fn abort_state(&self) -> Option<&AbortState> {
        self.abort.as_ref()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_some()
    }

    pub fn finalize_result(&self) -> Option<&FinalizeResult> {
        self.finalize.as_ref()
    }

    pub fn thresholds(&self) -> Option<&QualityThresholds> {
        self.thresholds.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of preview handles currently held.
    pub fn live_previews(&self) -> usize {
        self.previews.live_count()
    }

    /// Number of preview handles released since the store was created.
    pub fn released_previews(&self) -> u64 {
        self.previews.released_count()
    }

    /// Required slots that have no photo yet, in capture order.
    pub fn missing_photos(&self) -> Vec<PhotoKey> {
        PHOTO_ORDER
            .iter()
            .copied()
            .filter(|k| !self.slots.contains_key(k))
            .collect()
    }

    /// Quality status used for gating the slot.
    pub fn quality_of(&self, key: PhotoKey) -> Option<QualityStatus> {
        self.analyses
            .get(&key)
            .and_then(|a| a.effective_quality(self.thresholds.as_ref()))
    }

    pub fn gate(&self, key: PhotoKey) -> GateDecision {
        evaluate_gate(self.quality_of(key), self.overrides.contains(&key))
    }

    /// Captured slots that may not be left behind: no analysis yet, or a
    /// gate other than [`GateDecision::Pass`].
    pub fn blocked_photos(&self) -> Vec<PhotoKey> {
        PHOTO_ORDER
            .iter()
            .copied()
            .filter(|k| self.slots.contains_key(k))
            .filter(|k| !self.analyses.contains_key(k) || !self.gate(*k).allows_advance())
            .collect()
    }

    /// Status counts across captured slots.
    pub fn quality_summary(&self) -> QualitySummary {
        compute_summary(self.slots.keys().map(|k| self.quality_of(*k)))
    }

    // ---- navigation ----

    /// Move to the next step in the fixed order.
    ///
    /// Photo steps require an analysed capture and a passing quality
    /// gate; the quality review requires every slot to be filled,
    /// analysed and passing.
    pub fn advance(&mut self) -> Result<Step, CoreError> {
        self.ensure_not_aborted()?;
        let target = self.step.forward_target().ok_or_else(|| {
            CoreError::Conflict(format!("{} cannot be advanced directly", self.step))
        })?;

        match self.step {
            Step::Photo(key) => self.check_photo_gate(key)?,
            Step::QualityCheck => {
                let missing = self.missing_photos();
                if !missing.is_empty() {
                    return Err(CoreError::Conflict(format!(
                        "Missing photos: {}",
                        key_list(&missing)
                    )));
                }
                let blocked = self.blocked_photos();
                if !blocked.is_empty() {
                    return Err(CoreError::Conflict(format!(
                        "Photos need a retake or review: {}",
                        key_list(&blocked)
                    )));
                }
            }
            _ => {}
        }

        self.error = None;
        self.transition(target);
        Ok(target)
    }

    /// Move to the previous navigable step.
    pub fn retreat(&mut self) -> Result<Step, CoreError> {
        self.ensure_not_aborted()?;
        let target = self.step.back_target().ok_or_else(|| {
            CoreError::Conflict(format!("Cannot go back from {}", self.step))
        })?;
        self.error = None;
        self.transition(target);
        Ok(target)
    }

    /// Enter a step as the result of a backend response or an explicit
    /// controller decision (e.g. `VERIFYING_ID`, revert to `ASK_PLATE`).
    pub fn enter_step(&mut self, step: Step) -> Result<(), CoreError> {
        if self.is_aborted() && step != Step::Results {
            return Err(self.aborted_error());
        }
        self.transition(step);
        Ok(())
    }

    /// Apply the one-time "continue anyway" escape hatch on the current
    /// photo step and advance.
    ///
    /// Only a `blur` status can be overridden. The override lasts until
    /// the slot is retaken.
    pub fn continue_anyway(&mut self) -> Result<Step, CoreError> {
        self.ensure_not_aborted()?;
        let key = self.step.photo_key().ok_or_else(|| {
            CoreError::Conflict(format!("{} is not a photo step", self.step))
        })?;
        match self.gate(key) {
            GateDecision::RetakeRequired => Err(CoreError::Conflict(format!(
                "Photo '{}' is too blurry; retake it",
                key.as_str()
            ))),
            GateDecision::Overridable => {
                self.overrides.insert(key);
                tracing::info!(session_id = %self.session_id, photo_key = key.as_str(), "Quality override applied");
                self.advance()
            }
            GateDecision::Pass => self.advance(),
        }
    }

    /// Clear `key` and return to its photo step for a new capture.
    ///
    /// Allowed from the quality review for any slot, or from a photo step
    /// for that step's own slot.
    pub fn retake(&mut self, key: PhotoKey) -> Result<(), CoreError> {
        self.ensure_not_aborted()?;
        let allowed = match self.step {
            Step::QualityCheck => true,
            Step::Photo(current) => current == key,
            _ => false,
        };
        if !allowed {
            return Err(CoreError::Conflict(format!(
                "Cannot retake the '{}' photo from {}",
                key.as_str(),
                self.step
            )));
        }
        self.set_photo(key, None, None)?;
        self.error = None;
        self.transition(Step::Photo(key));
        Ok(())
    }

    // ---- photos ----

    /// Store or clear the capture for `key`.
    ///
    /// Any prior preview is released. Both a new capture and a clear
    /// count as a retake: the slot's analysis and override are dropped.
    pub fn set_photo(
        &mut self,
        key: PhotoKey,
        file: Option<PhotoFile>,
        geo: Option<GeoPoint>,
    ) -> Result<(), CoreError> {
        self.ensure_not_aborted()?;

        if let Some(old) = self.slots.remove(&key) {
            self.previews.release(old.preview);
        }
        self.analyses.remove(&key);
        self.overrides.remove(&key);

        if let Some(file) = file {
            let preview = self.previews.create(&file.file_name);
            tracing::debug!(
                session_id = %self.session_id,
                photo_key = key.as_str(),
                bytes = file.len(),
                "Photo stored",
            );
            self.slots.insert(key, PhotoSlot { file, geo, preview });
        } else {
            tracing::debug!(session_id = %self.session_id, photo_key = key.as_str(), "Photo cleared");
        }
        Ok(())
    }

    /// Record the backend analysis for `key`, replacing any prior one.
    ///
    /// A result carrying an abort signal triggers [`abort`](Self::abort)
    /// whatever the current step. Results arriving after an abort are
    /// dropped.
    pub fn store_analysis(&mut self, key: PhotoKey, result: AnalysisResult) {
        if self.is_aborted() {
            tracing::debug!(photo_key = key.as_str(), "Analysis ignored after abort");
            return;
        }
        let abort = result.abort_signal();
        self.analyses.insert(key, result);
        if let Some(reason) = abort {
            self.abort(reason);
        }
    }

    // ---- identity / vehicle ----

    pub fn set_identity(&mut self, identity: VerifiedIdentity) -> Result<(), CoreError> {
        self.ensure_not_aborted()?;
        self.identity = Some(identity);
        Ok(())
    }

    pub fn set_vehicle(&mut self, vehicle: VehicleRecord) -> Result<(), CoreError> {
        self.ensure_not_aborted()?;
        self.vehicle = Some(vehicle);
        Ok(())
    }

    pub fn set_vehicle_history(&mut self, history: VehicleHistory) -> Result<(), CoreError> {
        self.ensure_not_aborted()?;
        self.vehicle_history = Some(history);
        Ok(())
    }

    pub fn set_user_info(&mut self, info: UserInfo) -> Result<(), CoreError> {
        self.ensure_not_aborted()?;
        self.user_info = Some(info);
        Ok(())
    }

    pub fn set_thresholds(&mut self, thresholds: QualityThresholds) {
        self.thresholds = Some(thresholds);
    }

    // ---- notes ----

    /// Append a note. Notes are only ever cleared by [`reset`](Self::reset).
    pub fn add_note(&mut self, text: &str) -> Result<(), CoreError> {
        let note = text.trim();
        if note.is_empty() {
            return Err(CoreError::Validation("Note must not be empty".to_string()));
        }
        self.notes.push(note.to_string());
        Ok(())
    }

    pub fn set_note_draft(&mut self, text: impl Into<String>) {
        self.note_draft = text.into();
    }

    /// Append the draft as a note and clear it. Returns `false` when the
    /// draft was blank.
    pub fn commit_note_draft(&mut self) -> bool {
        let draft = std::mem::take(&mut self.note_draft);
        self.add_note(&draft).is_ok()
    }

    // ---- errors ----

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    // ---- terminal transitions ----

    /// Record an abort and jump to `RESULTS`.
    ///
    /// One-shot: returns `false` (and changes nothing) when an abort is
    /// already recorded.
    pub fn abort(&mut self, reason: impl Into<String>) -> bool {
        if self.abort.is_some() {
            return false;
        }
        let reason = reason.into();
        tracing::warn!(session_id = %self.session_id, reason = %reason, "Inspection aborted");
        self.abort = Some(AbortState { reason });
        self.transition(Step::Results);
        true
    }

    /// Record the finalize output, overwriting any previous one.
    ///
    /// Does not move the step unless the result carries an abort marker.
    pub fn store_finalize(&mut self, result: FinalizeResult) {
        let abort = result.abort_signal();
        self.finalize = Some(result);
        if let Some(reason) = abort {
            self.abort(reason);
        }
    }

    /// Release every preview, discard all session state, and start a new
    /// session at `WELCOME`. Thresholds are kept.
    pub fn reset(&mut self) {
        for (_, slot) in std::mem::take(&mut self.slots) {
            self.previews.release(slot.preview);
        }
        let previous = std::mem::replace(&mut self.session_id, SessionId::generate());
        self.step = Step::Welcome;
        self.identity = None;
        self.vehicle = None;
        self.vehicle_history = None;
        self.user_info = None;
        self.analyses.clear();
        self.overrides.clear();
        self.notes.clear();
        self.note_draft.clear();
        self.abort = None;
        self.finalize = None;
        self.error = None;
        tracing::info!(previous = %previous, session_id = %self.session_id, "Session reset");
    }

    // ---- private helpers ----

    fn transition(&mut self, step: Step) {
        if self.step != step {
            tracing::debug!(
                session_id = %self.session_id,
                from = %self.step,
                to = %step,
                "Step transition",
            );
        }
        self.step = step;
    }

    fn check_photo_gate(&self, key: PhotoKey) -> Result<(), CoreError> {
        if !self.slots.contains_key(&key) {
            return Err(CoreError::Conflict(format!(
                "Capture the '{}' photo first",
                key.as_str()
            )));
        }
        if !self.analyses.contains_key(&key) {
            return Err(CoreError::Conflict(format!(
                "Photo '{}' has not been analysed; wait for the result or retake it",
                key.as_str()
            )));
        }
        match self.gate(key) {
            GateDecision::Pass => Ok(()),
            GateDecision::Overridable => Err(CoreError::Conflict(format!(
                "Photo '{}' is blurry; retake it or continue anyway",
                key.as_str()
            ))),
            GateDecision::RetakeRequired => Err(CoreError::Conflict(format!(
                "Photo '{}' is too blurry; retake it",
                key.as_str()
            ))),
        }
    }

    fn ensure_not_aborted(&self) -> Result<(), CoreError> {
        if self.is_aborted() {
            Err(self.aborted_error())
        } else {
            Ok(())
        }
    }

    fn aborted_error(&self) -> CoreError {
        CoreError::Aborted(
            self.abort
                .as_ref()
                .map(|a| a.reason.clone())
                .unwrap_or_default(),
        )
    }
}

fn key_list(keys: &[PhotoKey]) -> String {
    keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
