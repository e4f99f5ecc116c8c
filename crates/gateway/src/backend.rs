//! Backend seam consumed by the workflow controller.
//!
//! [`BackendApi`] is the production implementation; tests substitute an
//! in-memory fake.

use async_trait::async_trait;

use inspecta_core::analysis::{AnalysisResult, FinalizeResult};
use inspecta_core::types::SessionId;
use inspecta_core::validation::IdentityInput;
use inspecta_core::vehicle::VehicleHistory;

use crate::api::BackendApi;
use crate::error::GatewayError;
use crate::types::{
    AnalyzeRequest, FinalizeRequest, HealthInfo, IdentityVerification, ModelInfo, VehicleLookup,
};

/// Every backend capability the inspection workflow relies on.
#[async_trait]
pub trait InspectionBackend: Send + Sync {
    async fn model_info(&self) -> Result<ModelInfo, GatewayError>;

    async fn health(&self) -> Result<HealthInfo, GatewayError>;

    /// Must reject a malformed plate without any network traffic.
    async fn verify_vehicle(&self, plate: &str) -> Result<VehicleLookup, GatewayError>;

    async fn verify_identity(
        &self,
        identity: &IdentityInput,
    ) -> Result<IdentityVerification, GatewayError>;

    async fn vehicle_history(&self, plate: &str) -> Result<VehicleHistory, GatewayError>;

    async fn analyze_photo(&self, request: &AnalyzeRequest)
        -> Result<AnalysisResult, GatewayError>;

    async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResult, GatewayError>;

    async fn report_pdf(&self, inspection_id: &str) -> Result<Vec<u8>, GatewayError>;

    /// Session socket URL, or `None` when the backend pushes no events.
    fn session_url(&self, _session_id: &SessionId) -> Option<String> {
        None
    }
}

#[async_trait]
impl InspectionBackend for BackendApi {
    async fn model_info(&self) -> Result<ModelInfo, GatewayError> {
        BackendApi::model_info(self).await
    }

    async fn health(&self) -> Result<HealthInfo, GatewayError> {
        BackendApi::health(self).await
    }

    async fn verify_vehicle(&self, plate: &str) -> Result<VehicleLookup, GatewayError> {
        BackendApi::verify_vehicle(self, plate).await
    }

    async fn verify_identity(
        &self,
        identity: &IdentityInput,
    ) -> Result<IdentityVerification, GatewayError> {
        BackendApi::verify_identity(self, identity).await
    }

    async fn vehicle_history(&self, plate: &str) -> Result<VehicleHistory, GatewayError> {
        BackendApi::vehicle_history(self, plate).await
    }

    async fn analyze_photo(
        &self,
        request: &AnalyzeRequest,
    ) -> Result<AnalysisResult, GatewayError> {
        BackendApi::analyze_photo(self, request).await
    }

    async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResult, GatewayError> {
        BackendApi::finalize(self, request).await
    }

    async fn report_pdf(&self, inspection_id: &str) -> Result<Vec<u8>, GatewayError> {
        BackendApi::report_pdf(self, inspection_id).await
    }

    fn session_url(&self, session_id: &SessionId) -> Option<String> {
        Some(self.ws_url(session_id))
    }
}
