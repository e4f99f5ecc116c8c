//! Step renderer: a pure function from store state to a view model.
//!
//! Front ends draw a [`StepView`] and map the user's choice back to one
//! of its [`Action`]s. Rendering never mutates anything.

use std::collections::BTreeSet;

use serde::Serialize;

use inspecta_core::analysis::QualityStatus;
use inspecta_core::photo::{PhotoKey, PHOTO_ORDER};
use inspecta_core::quality_gate::GateDecision;
use inspecta_core::step::Step;
use inspecta_core::store::InspectionStore;

use crate::busy::Operation;

/// Something the user can do from the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "photo", rename_all = "snake_case")]
pub enum Action {
    Start,
    SubmitIdentity,
    SubmitPlate,
    Next,
    Back,
    CapturePhoto(PhotoKey),
    Retake(PhotoKey),
    ContinueAnyway,
    AddNote,
    Finalize,
    DownloadReport,
    NewInspection,
}

/// Everything a front end needs to draw one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub step: Step,
    /// One-based `(position, total)`.
    pub progress: (usize, usize),
    pub title: String,
    pub lines: Vec<String>,
    pub error: Option<String>,
    /// A backend call for this step is in flight; actions are disabled.
    pub busy: bool,
    pub actions: Vec<Action>,
}

/// Render the current step of `store`.
pub fn render(store: &InspectionStore, busy: &BTreeSet<Operation>) -> StepView {
    let step = store.step();
    let mut view = StepView {
        step,
        progress: step.progress(),
        title: String::new(),
        lines: Vec::new(),
        error: store.error().map(str::to_string),
        busy: step.is_transient(),
        actions: Vec::new(),
    };

    match step {
        Step::Welcome => {
            view.title = "Vehicle inspection".into();
            view.lines.push(
                "You will verify your identity and vehicle, then take six photos.".into(),
            );
            view.actions.push(Action::Start);
        }
        Step::AskId => {
            view.title = "Who is inspecting?".into();
            view.lines
                .push("Enter your full name and identity document number.".into());
            view.actions = vec![Action::SubmitIdentity, Action::Back];
        }
        Step::VerifyingId => {
            view.title = "Verifying identity...".into();
        }
        Step::AskPlate => {
            view.title = "Vehicle plate".into();
            view.lines
                .push("Enter the plate: 5 to 7 letters or digits.".into());
            view.actions = vec![Action::SubmitPlate, Action::Back];
        }
        Step::VerifyingVehicle => {
            view.title = "Looking up vehicle...".into();
        }
        Step::ShowVehicle => {
            view.title = "Your vehicle".into();
            vehicle_lines(store, &mut view.lines);
            view.actions = vec![Action::Next, Action::Back];
        }
        Step::Photo(key) => render_photo(store, key, busy, &mut view),
        Step::QualityCheck => render_quality(store, &mut view),
        Step::DamageDetection => render_damage(store, &mut view),
        Step::Finalizing => {
            view.title = "Computing verdict...".into();
        }
        Step::Results => render_results(store, busy, &mut view),
    }

    if view.busy {
        view.actions.clear();
    }
    view
}

fn vehicle_lines(store: &InspectionStore, lines: &mut Vec<String>) {
    let Some(vehicle) = store.vehicle() else {
        lines.push("No vehicle recorded.".into());
        return;
    };
    let field = |v: &Option<String>| v.as_deref().unwrap_or("-").to_string();
    lines.push(format!("Plate: {}", vehicle.plate));
    lines.push(format!(
        "{} {} ({})",
        field(&vehicle.brand),
        field(&vehicle.model),
        field(&vehicle.year)
    ));
    if let Some(owner) = &vehicle.owner {
        lines.push(format!("Owner: {owner}"));
    }
    if let Some(history) = store.vehicle_history() {
        lines.push(format!(
            "History: {} infraction(s), {} previous owner(s), technical check {}",
            history.infractions,
            history.previous_owners,
            if history.tech_ok { "ok" } else { "pending" }
        ));
        lines.extend(history.notes.iter().map(|n| format!("  - {n}")));
    }
}

fn status_text(status: Option<QualityStatus>) -> &'static str {
    status.map_or("pending", QualityStatus::as_str)
}

fn render_photo(
    store: &InspectionStore,
    key: PhotoKey,
    busy: &BTreeSet<Operation>,
    view: &mut StepView,
) {
    view.title = format!("Photo {} of {}: {}", key.index() + 1, PHOTO_ORDER.len(), key.label());
    view.lines.push(key.helper().into());
    view.busy = busy.contains(&Operation::Analyze(key));

    let Some(slot) = store.slot(key) else {
        view.actions = vec![Action::CapturePhoto(key), Action::Back];
        return;
    };

    view.lines.push(format!("Preview: {}", slot.preview_url()));
    if view.busy {
        view.lines.push("Analysing...".into());
        return;
    }
    if store.analysis(key).is_some() {
        view.lines
            .push(format!("Quality: {}", status_text(store.quality_of(key))));
    }

    view.actions.push(Action::Retake(key));
    if store.analysis(key).is_none() {
        view.lines.push("No analysis for this photo yet. Retake it to try again.".into());
        view.actions.push(Action::Back);
        return;
    }
    match store.gate(key) {
        GateDecision::Pass => view.actions.push(Action::Next),
        GateDecision::Overridable => view.actions.push(Action::ContinueAnyway),
        GateDecision::RetakeRequired => {}
    }
    view.actions.push(Action::Back);
}

fn render_quality(store: &InspectionStore, view: &mut StepView) {
    view.title = "Photo quality review".into();
    let summary = store.quality_summary();
    view.lines.push(format!(
        "{} photo(s): {} ok, {} warn, {} blur, {} very blurry, {} pending",
        summary.total, summary.ok, summary.warn, summary.blur, summary.very_blur, summary.pending
    ));
    for key in PHOTO_ORDER {
        let line = match store.slot(key) {
            Some(_) => {
                let flag = if store.is_overridden(key) { " (accepted)" } else { "" };
                format!("{}: {}{}", key.label(), status_text(store.quality_of(key)), flag)
            }
            None => format!("{}: missing", key.label()),
        };
        view.lines.push(line);
        view.actions.push(Action::Retake(key));
    }

    let blocked = store.blocked_photos();
    if !blocked.is_empty() {
        let names: Vec<&str> = blocked.iter().map(|k| k.label()).collect();
        view.lines.push(format!("Retake before continuing: {}", names.join(", ")));
    }
    if store.missing_photos().is_empty() && blocked.is_empty() {
        view.actions.insert(0, Action::Next);
    }
    view.actions.push(Action::Back);
}

fn render_damage(store: &InspectionStore, view: &mut StepView) {
    view.title = "Damage review".into();
    let mut any = false;
    for (key, analysis) in store.analyses() {
        for damage in &analysis.damage {
            any = true;
            view.lines.push(format!(
                "{}: {} ({:.0}%)",
                key.label(),
                damage.label,
                damage.confidence * 100.0
            ));
        }
        if !analysis.missing_parts.is_empty() {
            view.lines.push(format!(
                "{}: missing parts {}",
                key.label(),
                analysis.missing_parts.join(", ")
            ));
        }
    }
    if !any {
        view.lines.push("No damage detected.".into());
    }
    notes_lines(store, &mut view.lines);
    view.actions = vec![Action::Finalize, Action::AddNote, Action::Back];
}

fn notes_lines(store: &InspectionStore, lines: &mut Vec<String>) {
    if store.notes().is_empty() && store.note_draft().trim().is_empty() {
        return;
    }
    lines.push("Notes:".into());
    lines.extend(store.notes().iter().map(|n| format!("  - {n}")));
    if !store.note_draft().trim().is_empty() {
        lines.push(format!("  (draft) {}", store.note_draft().trim()));
    }
}

fn render_results(store: &InspectionStore, busy: &BTreeSet<Operation>, view: &mut StepView) {
    view.busy = busy.contains(&Operation::DownloadReport);

    if let Some(abort) = store.abort_state() {
        view.title = "Inspection cancelled".into();
        view.lines
            .push(format!("This inspection was voided: {}", abort.reason));
        view.actions = vec![Action::NewInspection];
        return;
    }

    view.title = "Inspection result".into();
    let Some(result) = store.finalize_result() else {
        view.lines.push("No result yet.".into());
        view.actions = vec![Action::Back, Action::NewInspection];
        return;
    };

    if let Some(id) = &result.inspection_id {
        view.lines.push(format!("Inspection: {id}"));
    }
    view.lines.push(format!("Status: {}", result.status));
    if let Some(reasons) = result
        .verdict
        .as_ref()
        .and_then(|v| v.get("reasons"))
        .and_then(|r| r.as_array())
    {
        view.lines.extend(
            reasons
                .iter()
                .filter_map(|r| r.as_str())
                .map(|r| format!("  - {r}")),
        );
    }
    if !result.fraud_flags.is_empty() {
        view.lines
            .push(format!("Fraud flags: {}", result.fraud_flags.join(", ")));
    }
    if !result.review_flags.is_empty() {
        view.lines
            .push(format!("Review flags: {}", result.review_flags.join(", ")));
    }
    notes_lines(store, &mut view.lines);

    if result.inspection_id.is_some() {
        view.actions.push(Action::DownloadReport);
    }
    view.actions.push(Action::NewInspection);
}
