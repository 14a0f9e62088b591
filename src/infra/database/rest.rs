//! Deposit store backed by the HTTP API of a running server.
//!
//! Lets the transaction flow run outside the server process (the CLI).

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::domain::{
    AppError, DatabaseError, Deposit, DepositStatus, DepositStore, ErrorResponse, NewDeposit,
    ValidationError,
};

pub struct RestDepositStore {
    http_client: Client,
    base_url: String,
}

impl RestDepositStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn deposits_url(&self) -> String {
        format!("{}/deposits", self.base_url)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| AppError::Serialization(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ErrorResponse>(&body).ok();
        let message = parsed
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| body.clone());
        debug!(status = %status, message = %message, "Deposit API returned an error");

        Err(match status {
            StatusCode::BAD_REQUEST => {
                match parsed.and_then(|e| e.field) {
                    Some(field) => {
                        AppError::Validation(ValidationError::InvalidField { field, message })
                    }
                    None => AppError::Validation(ValidationError::Multiple(message)),
                }
            }
            StatusCode::NOT_FOUND => AppError::Database(DatabaseError::NotFound(message)),
            s if s.is_server_error() => AppError::Database(DatabaseError::Connection(format!(
                "HTTP {}: {}",
                s, message
            ))),
            s => AppError::Database(DatabaseError::Query(format!("HTTP {}: {}", s, message))),
        })
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    AppError::Database(DatabaseError::Connection(err.to_string()))
}

#[async_trait]
impl DepositStore for RestDepositStore {
    #[instrument(skip(self, deposit), fields(wallet = %deposit.wallet_address))]
    async fn create_deposit(&self, deposit: &NewDeposit) -> Result<Deposit, AppError> {
        let response = self
            .http_client
            .post(self.deposits_url())
            .json(deposit)
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn update_deposit_status(
        &self,
        id: i32,
        status: DepositStatus,
    ) -> Result<Deposit, AppError> {
        let response = self
            .http_client
            .patch(self.deposits_url())
            .query(&[("id", id)])
            .json(&json!({ "status": status.as_str() }))
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn list_active_deposits(&self, wallet_address: &str) -> Result<Vec<Deposit>, AppError> {
        let response = self
            .http_client
            .get(self.deposits_url())
            .query(&[("walletAddress", wallet_address)])
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(response).await
    }
}
