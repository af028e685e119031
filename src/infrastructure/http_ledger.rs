use crate::domain::ledger::{LedgerTransferRequest, LedgerTransferResponse};
use crate::domain::ports::LedgerClient;
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Path of the transfer endpoint on the ledger service.
pub const TRANSFER_PATH: &str = "/ledger/transfer";

/// `LedgerClient` speaking JSON over HTTP to the remote ledger.
///
/// Any transport error, non-2xx status or undecodable body is reported as
/// `TransferError::DownstreamUnavailable`.
#[derive(Clone)]
pub struct HttpLedgerClient {
    base_url: String,
    client: Client,
}

impl HttpLedgerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransferError::InternalError(Box::new(e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn transfer(&self, request: &LedgerTransferRequest) -> Result<LedgerTransferResponse> {
        let url = format!("{}{}", self.base_url, TRANSFER_PATH);
        debug!(%url, transfer_id = %request.transfer_id, "posting transfer to ledger");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TransferError::DownstreamUnavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransferError::DownstreamUnavailable(format!(
                "ledger answered {}: {}",
                status, body
            )));
        }

        response.json::<LedgerTransferResponse>().await.map_err(|e| {
            TransferError::DownstreamUnavailable(format!("failed to parse ledger response: {}", e))
        })
    }
}
