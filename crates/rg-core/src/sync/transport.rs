//! Remote settings store interface and request payloads

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::settings::{SettingsDocument, ViewId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterValuesRequest {
    pub report_id: String,
    pub column_id: String,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFormat {
    Csv,
    Html,
    Xlsx,
    Pdf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub report_id: String,
    pub view_id: ViewId,
    pub format: DownloadFormat,
}

/// One call to the remote settings store.
///
/// Serializes externally tagged, e.g. `{ "setReportSettings": [ {...} ] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncRequest {
    SetReportSettings(Vec<SettingsDocument>),
    ResetReportSettings(Vec<ReportRef>),
    GetReport(ReportRef),
    GetFilterValues(FilterValuesRequest),
    Download(DownloadRequest),
}

impl SyncRequest {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            SyncRequest::SetReportSettings(_) => "setReportSettings",
            SyncRequest::ResetReportSettings(_) => "resetReportSettings",
            SyncRequest::GetReport(_) => "getReport",
            SyncRequest::GetFilterValues(_) => "getFilterValues",
            SyncRequest::Download(_) => "download",
        }
    }
}

/// Remote call collaborator. Timeouts and retries belong to the implementation.
#[async_trait]
pub trait SettingsTransport: Send + Sync {
    /// Perform one call. Settings calls answer with the canonical document.
    async fn call(&self, request: SyncRequest) -> anyhow::Result<Value>;
}
