//! Credential lifecycle with single-flight refresh
//!
//! Owns the access/refresh token pair persisted in the state store. All
//! concurrent callers that need a refresh at the same moment share one
//! outstanding network call: the in-flight handle lives in a mutex-guarded
//! slot (the registry for the one fixed refresh key) and is cleared by the
//! refresh task itself when the call settles, success or failure. The call
//! runs in a spawned task, so cancelling a waiter never cancels a refresh
//! other callers depend on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use pagetrail_core::storage::{StateStore, StateStoreExt};
use pagetrail_core::AuthNotifier;
use pagetrail_domain::constants::keys;
use pagetrail_domain::{AuthSignal, Result, TokenSet};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::http::HttpClient;

type RefreshFuture = Shared<BoxFuture<'static, Option<String>>>;

/// Wire format of the refresh endpoint response.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    /// Rotated refresh token, when the scheme rotates on use
    refresh_token: Option<String>,
}

/// Manages the persisted credential set and coordinates token refresh.
pub struct CredentialManager {
    store: Arc<dyn StateStore>,
    http: HttpClient,
    refresh_url: String,
    notifier: Arc<dyn AuthNotifier>,
    in_flight: Arc<Mutex<Option<RefreshFuture>>>,
}

impl CredentialManager {
    /// Create a new credential manager.
    ///
    /// `refresh_url` is the absolute refresh endpoint; the refresh call goes
    /// through the bare transport, never through the authenticated client,
    /// so auth handling cannot recurse.
    pub fn new(
        store: Arc<dyn StateStore>,
        http: HttpClient,
        refresh_url: String,
        notifier: Arc<dyn AuthNotifier>,
    ) -> Self {
        Self { store, http, refresh_url, notifier, in_flight: Arc::new(Mutex::new(None)) }
    }

    /// Current access token from the store. Never triggers a refresh.
    ///
    /// # Errors
    /// Returns an error when the store read fails.
    pub async fn access_token(&self) -> Result<Option<String>> {
        self.store.get_string(keys::ACCESS_TOKEN).await
    }

    /// Current refresh token from the store. Never triggers a refresh.
    ///
    /// # Errors
    /// Returns an error when the store read fails.
    pub async fn refresh_token(&self) -> Result<Option<String>> {
        self.store.get_string(keys::REFRESH_TOKEN).await
    }

    /// Read the full credential set.
    ///
    /// # Errors
    /// Returns an error when the store read fails.
    pub async fn tokens(&self) -> Result<TokenSet> {
        self.store.token_set().await
    }

    /// Persist a credential pair after a successful login.
    ///
    /// # Errors
    /// Returns an error when the store write fails.
    pub async fn store_tokens(&self, access: String, refresh: Option<String>) -> Result<()> {
        let mut entries: HashMap<String, Value> = HashMap::new();
        entries.insert(keys::ACCESS_TOKEN.into(), json!(access));
        if let Some(refresh) = refresh {
            entries.insert(keys::REFRESH_TOKEN.into(), json!(refresh));
        }
        self.store.set(entries).await?;
        info!("credentials stored");
        Ok(())
    }

    /// Clear both credentials (logout).
    ///
    /// # Errors
    /// Returns an error when the store write fails.
    pub async fn clear_tokens(&self) -> Result<()> {
        self.store.remove(&[keys::ACCESS_TOKEN, keys::REFRESH_TOKEN]).await?;
        info!("credentials cleared");
        Ok(())
    }

    /// Perform or join the coordinated refresh.
    ///
    /// Returns the new access token, or `None` when no refresh token is
    /// present or the refresh failed (in which case both credentials have
    /// been wiped and `AuthSignal::Invalid` emitted).
    pub async fn refresh(&self) -> Option<String> {
        let shared = {
            // Synchronous critical section: check the registry and publish
            // the new handle before anything awaits.
            let mut slot = match self.in_flight.lock() {
                Ok(slot) => slot,
                Err(poisoned) => poisoned.into_inner(),
            };

            if let Some(existing) = slot.as_ref() {
                debug!("joining in-flight token refresh");
                existing.clone()
            } else {
                let store = Arc::clone(&self.store);
                let http = self.http.clone();
                let url = self.refresh_url.clone();
                let notifier = Arc::clone(&self.notifier);
                let registry = Arc::clone(&self.in_flight);

                let task = tokio::spawn(async move {
                    let outcome = perform_refresh(store, http, url, notifier).await;
                    // Settled: drop the registry entry regardless of outcome.
                    match registry.lock() {
                        Ok(mut slot) => *slot = None,
                        Err(poisoned) => *poisoned.into_inner() = None,
                    }
                    outcome
                });

                let shared: RefreshFuture =
                    async move { task.await.unwrap_or(None) }.boxed().shared();
                *slot = Some(shared.clone());
                shared
            }
        };

        shared.await
    }
}

/// The actual refresh round-trip. Runs inside the spawned single-flight
/// task; must not panic.
async fn perform_refresh(
    store: Arc<dyn StateStore>,
    http: HttpClient,
    refresh_url: String,
    notifier: Arc<dyn AuthNotifier>,
) -> Option<String> {
    let refresh_token = match store.get_string(keys::REFRESH_TOKEN).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            debug!("no refresh token present, skipping refresh call");
            return None;
        }
        Err(err) => {
            warn!(error = %err, "failed to read refresh token");
            return None;
        }
    };

    let request = http
        .request(reqwest::Method::POST, &refresh_url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .json(&json!({ "refresh_token": refresh_token }));

    let parsed: std::result::Result<RefreshResponse, String> = match http.send(request).await {
        Ok(response) if response.status().is_success() => {
            response.json().await.map_err(|err| format!("malformed refresh response: {err}"))
        }
        Ok(response) => Err(format!("refresh endpoint returned {}", response.status())),
        Err(err) => Err(err.to_string()),
    };

    match parsed {
        Ok(tokens) => {
            let mut entries: HashMap<String, Value> = HashMap::new();
            entries.insert(keys::ACCESS_TOKEN.into(), json!(tokens.access_token));
            if let Some(rotated) = &tokens.refresh_token {
                entries.insert(keys::REFRESH_TOKEN.into(), json!(rotated));
            }
            if let Err(err) = store.set(entries).await {
                // The token is still valid for this process lifetime even if
                // persistence failed; callers may proceed.
                warn!(error = %err, "failed to persist refreshed credentials");
            }
            info!("access token refreshed");
            Some(tokens.access_token)
        }
        Err(reason) => {
            warn!(reason = %reason, "token refresh failed, clearing credentials");
            if let Err(err) = store.remove(&[keys::ACCESS_TOKEN, keys::REFRESH_TOKEN]).await {
                warn!(error = %err, "failed to clear credentials after refresh failure");
            }
            notifier.notify(AuthSignal::Invalid).await;
            None
        }
    }
}
