//! REST backend client
//!
//! Every call takes the caller's [`SessionContext`] explicitly. A 401 clears
//! the session token, a 204 means the backend found nothing, and any other
//! failure carries the backend's `returnmessage`. Nothing is retried.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::domain::adjustment::StockAdjustment;
use crate::domain::aggregates::{Product, PurchaseOrder};
use crate::domain::receiving::ReceivingPayload;

/// Bearer token of the signed-in operator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionContext {
    token: Option<String>,
}

impl SessionContext {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self { token: (!token.trim().is_empty()).then_some(token) }
    }

    pub fn anonymous() -> Self { Self::default() }

    /// Parses an `Authorization: Bearer <token>` header value.
    pub fn from_authorization(header: &str) -> Self {
        match header.trim().split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => Self::new(token.trim()),
            _ => Self::anonymous(),
        }
    }

    pub fn token(&self) -> Option<&str> { self.token.as_deref() }
    pub fn is_authenticated(&self) -> bool { self.token.is_some() }
    pub fn clear(&mut self) { self.token = None; }
}

/// `{ returncode, returnmessage, data }` wrapper used by every backend response.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub returncode: String,
    #[serde(default)]
    pub returnmessage: String,
    pub data: Option<T>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Session expired, please sign in again")]
    SessionExpired,

    #[error("Data Not Found.")]
    NoContent,

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Backend response had no data")]
    MissingData,

    #[error("Backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    pub async fn get_purchase_order(&self, session: &mut SessionContext, id: &str) -> Result<PurchaseOrder, BackendError> {
        let request = self.client.get(self.url(&format!("purchase-orders/{}", id)));
        self.send::<PurchaseOrder>(session, "GET", request).await?.data.ok_or(BackendError::MissingData)
    }

    /// Returns the backend's confirmation message.
    pub async fn submit_receiving(&self, session: &mut SessionContext, payload: &ReceivingPayload) -> Result<String, BackendError> {
        let path = format!("purchase-orders/{}/receive-inventory", payload.purchase_order_id);
        let request = self.client.put(self.url(&path)).json(payload);
        Ok(self.send::<serde_json::Value>(session, "PUT", request).await?.returnmessage)
    }

    pub async fn get_product(&self, session: &mut SessionContext, id: &str) -> Result<Product, BackendError> {
        let request = self.client.get(self.url(&format!("products/{}", id)));
        self.send::<Product>(session, "GET", request).await?.data.ok_or(BackendError::MissingData)
    }

    /// `POST products` for a new product, `PUT products/{id}` otherwise.
    pub async fn save_product(&self, session: &mut SessionContext, product: &Product) -> Result<String, BackendError> {
        let payload = product.to_save_payload();
        let (method, request) = match product.id() {
            Some(id) => ("PUT", self.client.put(self.url(&format!("products/{}", id))).json(&payload)),
            None => ("POST", self.client.post(self.url("products")).json(&payload)),
        };
        Ok(self.send::<serde_json::Value>(session, method, request).await?.returnmessage)
    }

    pub async fn adjust_stock(&self, session: &mut SessionContext, adjustment: &StockAdjustment) -> Result<String, BackendError> {
        let request = self.client.put(self.url(&adjustment.endpoint())).json(&adjustment.to_payload());
        Ok(self.send::<serde_json::Value>(session, "PUT", request).await?.returnmessage)
    }

    fn url(&self, path: &str) -> String { format!("{}/{}", self.base_url, path) }

    async fn send<T: DeserializeOwned>(&self, session: &mut SessionContext, method: &str, request: RequestBuilder) -> Result<Envelope<T>, BackendError> {
        let request = match session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        tracing::info!(method, url = %response.url(), status = status.as_u16(), "backend call");

        match status {
            StatusCode::UNAUTHORIZED => {
                tracing::warn!("backend rejected session, clearing token");
                session.clear();
                Err(BackendError::SessionExpired)
            }
            StatusCode::NO_CONTENT => {
                tracing::warn!(method, "backend returned no content");
                Err(BackendError::NoContent)
            }
            s if s.is_success() => Ok(response.json::<Envelope<T>>().await?),
            s => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                    .ok()
                    .map(|e| e.returnmessage)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| if body.is_empty() { s.to_string() } else { body });
                tracing::error!(status = s.as_u16(), %message, "backend call failed");
                Err(BackendError::Api { status: s.as_u16(), message })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_from_authorization() {
        assert_eq!(SessionContext::from_authorization("Bearer abc").token(), Some("abc"));
        assert_eq!(SessionContext::from_authorization("bearer  xyz ").token(), Some("xyz"));
        assert!(!SessionContext::from_authorization("Basic abc").is_authenticated());
        assert!(!SessionContext::from_authorization("Bearer ").is_authenticated());
    }

    #[test]
    fn test_session_clear() {
        let mut session = SessionContext::new("t0k3n");
        assert!(session.is_authenticated());
        session.clear();
        assert_eq!(session, SessionContext::anonymous());
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = BackendClient::new("http://localhost:4000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:4000/api");
        assert_eq!(client.url("products/1"), "http://localhost:4000/api/products/1");
    }
}
