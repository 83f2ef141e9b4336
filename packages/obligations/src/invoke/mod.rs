//! Resilient invocation layer for the completion service.
//!
//! Three pieces: the credential pool (validation caching + lossless
//! rotation), the retry policy (attempt ceiling, exponential backoff,
//! size-adaptive timeouts), and the resilient client that ties them
//! together behind the [`CompletionService`] seam.

pub mod client;
pub mod credentials;
pub mod policy;

pub use client::{CompletionService, CompletionTransport, ResilientClient};
pub use credentials::{
    AlwaysValid, Credential, CredentialPool, CredentialProbe, SecretString, ServiceProbe,
    VALIDITY_TTL_HOURS,
};
pub use policy::{RetryPolicy, TimeoutClass};
