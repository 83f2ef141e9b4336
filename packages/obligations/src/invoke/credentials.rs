//! Credential pool with secure memory and lossless rotation.
//!
//! Uses the `secrecy` crate to prevent accidental logging of sensitive
//! values. The pool holds a primary credential and ordered fallbacks;
//! rotation moves the current credential to the back of the line (grace
//! period; it is never dropped) and promotes the next valid fallback.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretBox};
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{ExtractionError, Result};

/// How long a probe result is trusted before re-checking.
pub const VALIDITY_TTL_HOURS: i64 = 24;

/// A secret string that won't be logged or displayed.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    /// Create a new secret string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Expose the secret value for use.
    ///
    /// Only call this when actually using the secret (e.g. in a request).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// One completion-service credential with its cached validity.
#[derive(Clone)]
pub struct Credential {
    id: uuid::Uuid,
    secret: SecretString,
    /// Probe verdict and when it was obtained; None = never probed
    validity: Option<(bool, DateTime<Utc>)>,
}

impl Credential {
    /// Wrap a raw secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            secret: SecretString::new(secret),
            validity: None,
        }
    }

    /// Expose the secret for an outbound call.
    pub fn secret(&self) -> &str {
        self.secret.expose()
    }

    fn cached_validity(&self, ttl: Duration) -> Option<bool> {
        self.validity
            .filter(|(_, at)| Utc::now() - *at < ttl)
            .map(|(valid, _)| valid)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .field("validity", &self.validity)
            .finish()
    }
}

/// Out-of-band credential check.
///
/// Production wires this to the service's model-listing endpoint
/// (`CompletionClient::check_credential`); tests script it.
#[async_trait]
pub trait CredentialProbe: Send + Sync {
    /// Whether the service accepts this secret right now.
    async fn probe(&self, secret: &str) -> Result<bool>;
}

/// Probe that accepts every credential. Useful when the environment is
/// trusted or in tests.
pub struct AlwaysValid;

#[async_trait]
impl CredentialProbe for AlwaysValid {
    async fn probe(&self, _secret: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Probe backed by the completion service itself.
pub struct ServiceProbe {
    client: completion_client::CompletionClient,
    timeout: std::time::Duration,
}

impl ServiceProbe {
    pub fn new(client: completion_client::CompletionClient) -> Self {
        Self {
            client,
            timeout: std::time::Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl CredentialProbe for ServiceProbe {
    async fn probe(&self, secret: &str) -> Result<bool> {
        Ok(self.client.check_credential(secret, self.timeout).await?)
    }
}

/// Ordered pool: element 0 is current, the rest are fallbacks in order.
struct PoolState {
    order: Vec<Credential>,
}

/// Thread-safe credential pool shared across document pipelines.
///
/// Reads are cheap; rotation and validity-cache writes happen under a
/// single write lock so concurrent documents never observe a half-rotated
/// pool.
pub struct CredentialPool {
    state: RwLock<PoolState>,
    probe: Arc<dyn CredentialProbe>,
    ttl: Duration,
}

impl CredentialPool {
    /// Create a pool from a primary credential and ordered fallbacks.
    pub fn new(primary: Credential, fallbacks: Vec<Credential>) -> Self {
        let mut order = Vec::with_capacity(1 + fallbacks.len());
        order.push(primary);
        order.extend(fallbacks);
        Self {
            state: RwLock::new(PoolState { order }),
            probe: Arc::new(AlwaysValid),
            ttl: Duration::hours(VALIDITY_TTL_HOURS),
        }
    }

    /// Create a pool from raw secrets. A missing primary is a fatal
    /// startup condition.
    pub fn from_secrets(
        primary: Option<String>,
        fallbacks: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let primary = primary.ok_or(ExtractionError::NoPrimaryCredential)?;
        Ok(Self::new(
            Credential::new(primary),
            fallbacks.into_iter().map(Credential::new).collect(),
        ))
    }

    /// Install a real probe (defaults to [`AlwaysValid`]).
    pub fn with_probe(mut self, probe: Arc<dyn CredentialProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.state.read().unwrap().order.len()
    }

    /// Whether the pool holds any credential.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current credential.
    pub fn current(&self) -> Credential {
        self.state.read().unwrap().order[0].clone()
    }

    /// Validate the current credential, trusting a probe verdict for
    /// [`VALIDITY_TTL_HOURS`].
    pub async fn validate(&self) -> Result<bool> {
        let current = self.current();
        self.credential_valid(&current).await
    }

    /// Rotate: current moves to the back of the pool, the next valid
    /// fallback becomes current. Lossless: credentials are reordered,
    /// never dropped.
    pub async fn rotate(&self) -> Result<Credential> {
        let snapshot: Vec<Credential> = self.state.read().unwrap().order.clone();
        if snapshot.len() <= 1 {
            return Err(ExtractionError::NoValidFallback);
        }

        for candidate in &snapshot[1..] {
            if self.credential_valid(candidate).await? {
                let mut state = self.state.write().unwrap();
                // Another document may have rotated first; if the head
                // changed, the pool is already in a fresh state.
                if state.order[0].id != snapshot[0].id {
                    return Ok(state.order[0].clone());
                }
                let old = state.order.remove(0);
                if let Some(pos) = state.order.iter().position(|c| c.id == candidate.id) {
                    let chosen = state.order.remove(pos);
                    state.order.insert(0, chosen);
                }
                state.order.push(old);
                tracing::info!(pool_size = state.order.len(), "rotated credential");
                return Ok(state.order[0].clone());
            }
        }

        Err(ExtractionError::NoValidFallback)
    }

    /// Check one credential, consulting and refreshing the cached verdict.
    async fn credential_valid(&self, credential: &Credential) -> Result<bool> {
        if let Some(valid) = credential.cached_validity(self.ttl) {
            return Ok(valid);
        }

        let valid = self.probe.probe(credential.secret()).await?;
        let mut state = self.state.write().unwrap();
        if let Some(stored) = state.order.iter_mut().find(|c| c.id == credential.id) {
            stored.validity = Some((valid, Utc::now()));
        }
        Ok(valid)
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("len", &self.len())
            .finish()
    }
}
