// [libs/infra/uplink-client/src/ota.rs]
/*!
 * =================================================================
 * APARATO: OTA TRANSPORT ENDPOINTS (V4.1 - CHUNK STREAM)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CHECK / INITIATE / CHUNK / COMPLETE / BOOT-REPORT
 * =================================================================
 */

use reqwest::{header, StatusCode};
use tracing::{debug, instrument};

use vatio_domain_models::ota::{
    OtaBootReport, OtaChunkResponse, OtaCompletionSignal, OtaInitiateRequest, OtaInitiateResponse,
    OtaManifest,
};

use crate::client::{NetworkBudget, UplinkClient};
use crate::errors::UplinkError;

impl UplinkClient {
    /// GET /ota/check/<id>?version=<v> → manifiesto firmado o silencio.
    #[instrument(skip(self))]
    pub async fn ota_check(
        &self,
        current_version: &str,
        budget: NetworkBudget,
    ) -> Result<Option<OtaManifest>, UplinkError> {
        let target = self.ota_endpoint(&format!(
            "ota/check/{}?version={}",
            self.device_identifier(),
            current_version
        ));
        let response = self.ota_request(reqwest::Method::GET, &target, None, budget).await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<OtaManifest>().await?)),
            status => Err(UplinkError::ServerRejection { status: status.as_u16() }),
        }
    }

    /// POST /ota/initiate/<id> → identificador de sesión.
    #[instrument(skip(self))]
    pub async fn ota_initiate(
        &self,
        firmware_version: &str,
        budget: NetworkBudget,
    ) -> Result<String, UplinkError> {
        let target = self.ota_endpoint(&format!("ota/initiate/{}", self.device_identifier()));
        let body = serde_json::to_value(OtaInitiateRequest {
            firmware_version: firmware_version.to_string(),
        })?;
        let response = self.ota_request(reqwest::Method::POST, &target, Some(body), budget).await?;

        if response.status().is_success() {
            Ok(response.json::<OtaInitiateResponse>().await?.session_id)
        } else {
            Err(UplinkError::ServerRejection { status: response.status().as_u16() })
        }
    }

    /// GET /ota/chunk/<id>?version=&chunk=N → trozo cifrado en base64.
    #[instrument(skip(self), fields(chunk = chunk_index))]
    pub async fn ota_fetch_chunk(
        &self,
        firmware_version: &str,
        chunk_index: u32,
        budget: NetworkBudget,
    ) -> Result<OtaChunkResponse, UplinkError> {
        let target = self.ota_endpoint(&format!(
            "ota/chunk/{}?version={}&chunk={}",
            self.device_identifier(),
            firmware_version,
            chunk_index
        ));
        let response = self.ota_request(reqwest::Method::GET, &target, None, budget).await?;

        if response.status().is_success() {
            let chunk = response.json::<OtaChunkResponse>().await?;
            debug!("📥 [OTA_CHUNK]: index {} ({} bytes) received", chunk.index, chunk.size);
            Ok(chunk)
        } else {
            Err(UplinkError::ServerRejection { status: response.status().as_u16() })
        }
    }

    /// POST /ota/complete/<id> con el veredicto de la sesión.
    #[instrument(skip(self))]
    pub async fn ota_complete(
        &self,
        success: bool,
        budget: NetworkBudget,
    ) -> Result<(), UplinkError> {
        let target = self.ota_endpoint(&format!("ota/complete/{}", self.device_identifier()));
        let body = serde_json::to_value(OtaCompletionSignal { success })?;
        let response = self.ota_request(reqwest::Method::POST, &target, Some(body), budget).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(UplinkError::ServerRejection { status: response.status().as_u16() })
        }
    }

    /// POST /ota/<id>/complete con el reporte de estado post-reinicio.
    #[instrument(skip(self, report))]
    pub async fn ota_report_boot_status(
        &self,
        report: &OtaBootReport,
        budget: NetworkBudget,
    ) -> Result<(), UplinkError> {
        let target = self.ota_endpoint(&format!("ota/{}/complete", self.device_identifier()));
        let body = serde_json::to_value(report)?;
        let response = self.ota_request(reqwest::Method::POST, &target, Some(body), budget).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(UplinkError::ServerRejection { status: response.status().as_u16() })
        }
    }
}
