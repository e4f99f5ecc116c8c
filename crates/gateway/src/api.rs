//! Typed client for the inspection backend.
//!
//! One method per backend capability. Each builds its request (JSON or
//! multipart), runs it through [`send_with_retry`] under the capability's
//! [`RequestPolicy`], and decodes the JSON body it returns.

use std::time::Duration;

use reqwest::multipart::{Form, Part};

use inspecta_core::analysis::{AnalysisResult, FinalizeResult};
use inspecta_core::error::CoreError;
use inspecta_core::photo::PhotoFile;
use inspecta_core::types::SessionId;
use inspecta_core::validation::{validate_plate, IdentityInput};
use inspecta_core::vehicle::VehicleHistory;

use crate::cache::TtlCache;
use crate::error::GatewayError;
use crate::http::{parse_json, send_with_retry, RequestPolicy};
use crate::types::{
    AnalyzeRequest, ConfidenceOverrides, FinalizeRequest, HealthInfo, IdentityVerification,
    ModelInfo, VehicleLookup,
};

// ---------------------------------------------------------------------------
// Capability budgets
// ---------------------------------------------------------------------------

/// Timeout and retry budget for every backend capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayPolicies {
    pub model_info: RequestPolicy,
    pub health: RequestPolicy,
    pub verify_vehicle: RequestPolicy,
    pub verify_identity: RequestPolicy,
    pub vehicle_history: RequestPolicy,
    pub analyze: RequestPolicy,
    pub finalize: RequestPolicy,
    pub report_pdf: RequestPolicy,
}

impl GatewayPolicies {
    /// Same budgets with a different backoff base for every capability.
    pub fn with_base_delay(self, base_delay: Duration) -> Self {
        Self {
            model_info: self.model_info.with_base_delay(base_delay),
            health: self.health.with_base_delay(base_delay),
            verify_vehicle: self.verify_vehicle.with_base_delay(base_delay),
            verify_identity: self.verify_identity.with_base_delay(base_delay),
            vehicle_history: self.vehicle_history.with_base_delay(base_delay),
            analyze: self.analyze.with_base_delay(base_delay),
            finalize: self.finalize.with_base_delay(base_delay),
            report_pdf: self.report_pdf.with_base_delay(base_delay),
        }
    }
}

impl Default for GatewayPolicies {
    fn default() -> Self {
        let secs = Duration::from_secs;
        Self {
            model_info: RequestPolicy::new(secs(6), 0),
            health: RequestPolicy::new(secs(6), 0),
            verify_vehicle: RequestPolicy::new(secs(10), 0),
            verify_identity: RequestPolicy::new(secs(8), 0),
            vehicle_history: RequestPolicy::new(secs(8), 0),
            analyze: RequestPolicy::new(secs(30), 1),
            finalize: RequestPolicy::new(secs(35), 1),
            report_pdf: RequestPolicy::new(secs(20), 1),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for one inspection backend.
pub struct BackendApi {
    client: reqwest::Client,
    base_url: String,
    policies: GatewayPolicies,
    vehicle_cache: TtlCache<VehicleLookup>,
}

impl BackendApi {
    /// * `base_url` - e.g. `http://localhost:8000`; a trailing `/` is dropped.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            policies: GatewayPolicies::default(),
            vehicle_cache: TtlCache::default(),
        }
    }

    pub fn with_policies(mut self, policies: GatewayPolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.vehicle_cache = TtlCache::new(ttl);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policies(&self) -> &GatewayPolicies {
        &self.policies
    }

    /// Session socket URL: the base URL with `http` swapped for `ws`.
    pub fn ws_url(&self, session_id: &SessionId) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{base}/ws/inspection/{session_id}")
    }

    /// `GET /model/info`.
    pub async fn model_info(&self) -> Result<ModelInfo, GatewayError> {
        let url = self.url("/model/info");
        let body = send_with_retry("model_info", &self.policies.model_info, || {
            Ok(self.client.get(&url))
        })
        .await?;
        parse_json(&body)
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<HealthInfo, GatewayError> {
        let url = self.url("/health");
        let body = send_with_retry("health", &self.policies.health, || {
            Ok(self.client.get(&url))
        })
        .await?;
        parse_json(&body)
    }

    /// `GET /inspection/verify?plate=`.
    ///
    /// The plate is normalised and validated first; a malformed plate
    /// never reaches the network. Successful lookups are cached per plate
    /// for the cache TTL.
    pub async fn verify_vehicle(&self, raw_plate: &str) -> Result<VehicleLookup, GatewayError> {
        let plate = validate_plate(raw_plate)?;
        let cache_key = vehicle_cache_key(&plate);

        if let Some(hit) = self.vehicle_cache.get(&cache_key) {
            tracing::debug!(plate = %plate, "Vehicle lookup served from cache");
            return Ok(hit);
        }

        let url = self.url("/inspection/verify");
        let body = send_with_retry("verify_vehicle", &self.policies.verify_vehicle, || {
            Ok(self.client.get(&url).query(&[("plate", plate.as_str())]))
        })
        .await?;
        let lookup: VehicleLookup = parse_json(&body)?;

        self.vehicle_cache.put(cache_key, lookup.clone());
        Ok(lookup)
    }

    /// `POST /identity/verify`.
    pub async fn verify_identity(
        &self,
        identity: &IdentityInput,
    ) -> Result<IdentityVerification, GatewayError> {
        let url = self.url("/identity/verify");
        let payload = serde_json::json!({
            "name": identity.name,
            "document": identity.document,
        });
        let body = send_with_retry("verify_identity", &self.policies.verify_identity, || {
            Ok(self.client.post(&url).json(&payload))
        })
        .await?;
        parse_json(&body)
    }

    /// `GET /vehicle/history?plate=`.
    pub async fn vehicle_history(&self, plate: &str) -> Result<VehicleHistory, GatewayError> {
        let url = self.url("/vehicle/history");
        let body = send_with_retry("vehicle_history", &self.policies.vehicle_history, || {
            Ok(self.client.get(&url).query(&[("plate", plate)]))
        })
        .await?;
        parse_json(&body)
    }

    /// `POST /inspection/analyze` (multipart).
    pub async fn analyze_photo(
        &self,
        request: &AnalyzeRequest,
    ) -> Result<AnalysisResult, GatewayError> {
        let url = self.url("/inspection/analyze");
        let body = send_with_retry("analyze_photo", &self.policies.analyze, || {
            Ok(self.client.post(&url).multipart(analyze_form(request)?))
        })
        .await?;
        parse_json(&body)
    }

    /// `POST /inspection/finalize` (multipart).
    pub async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResult, GatewayError> {
        let url = self.url("/inspection/finalize");
        let body = send_with_retry("finalize", &self.policies.finalize, || {
            Ok(self.client.post(&url).multipart(finalize_form(request)))
        })
        .await?;
        parse_json(&body)
    }

    /// `GET /inspection/report/{id}/pdf`, returned as raw bytes.
    pub async fn report_pdf(&self, inspection_id: &str) -> Result<Vec<u8>, GatewayError> {
        let url = self.url(&format!("/inspection/report/{inspection_id}/pdf"));
        let body = send_with_retry("report_pdf", &self.policies.report_pdf, || {
            Ok(self.client.get(&url))
        })
        .await?;
        Ok(body)
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn vehicle_cache_key(plate: &str) -> String {
    format!("veh_verify_{plate}")
}

fn file_part(file: &PhotoFile) -> Result<Part, GatewayError> {
    Part::bytes(file.bytes.clone())
        .file_name(file.file_name.clone())
        .mime_str(&file.content_type)
        .map_err(|_| {
            GatewayError::from(CoreError::Validation(format!(
                "Invalid content type '{}' for {}",
                file.content_type, file.file_name
            )))
        })
}

fn with_confidence(mut form: Form, confidence: &ConfidenceOverrides) -> Form {
    if let Some(damage) = confidence.damage {
        form = form.text("conf_damage", damage.to_string());
    }
    if let Some(parts) = confidence.parts {
        form = form.text("conf_parts", parts.to_string());
    }
    form
}

fn analyze_form(request: &AnalyzeRequest) -> Result<Form, GatewayError> {
    let mut form = Form::new()
        .part("file", file_part(&request.file)?)
        .text("session_id", request.session_id.to_string())
        .text("plate", request.plate.clone())
        .text("photo_key", request.photo_key.as_str());
    if let Some(geo) = request.geo {
        form = form
            .text("browser_lat", geo.lat.to_string())
            .text("browser_lon", geo.lon.to_string());
    }
    if let Some(note) = request.note.as_deref().filter(|n| !n.trim().is_empty()) {
        form = form.text("note", note.to_string());
    }
    form = with_confidence(form, &request.confidence);
    if request.debug {
        form = form.text("debug", "1");
    }
    Ok(form)
}

fn finalize_form(request: &FinalizeRequest) -> Form {
    let form = Form::new()
        .text("session_id", request.session_id.to_string())
        .text("plate", request.plate.clone());
    with_confidence(form, &request.confidence)
}
