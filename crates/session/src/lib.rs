//! Session identity and persistence layer for a private mobile-API client.
//!
//! This crate centralizes the stateful core of the client: normalizing
//! browser-exported credential material into a validated session
//! identity, migrating device fingerprints mid-session, persisting many
//! accounts' sessions on disk behind an identifier index, and executing
//! requests with failure classification, bounded retries, and challenge
//! escalation.
//!
//! The surrounding concerns (request signing, domain-object extraction,
//! verification-code retrieval) are consumed through narrow injected
//! interfaces: [`Signer`], [`ObjectExtractor`], [`ChallengeProvider`].

/// Bounded-retry secondary verification flow.
pub mod challenge;
/// Coordinating client assembled from the component interfaces.
pub mod client;
/// Cookie ingestion and normalization.
pub mod cookie;
/// Persisted session descriptor schema and helpers.
pub mod descriptor;
/// Error taxonomy shared across the subsystem.
pub mod error;
/// Retry/backoff-governed request execution.
pub mod executor;
/// Device fingerprint migration from response headers.
pub mod fingerprint;
/// Session identity derivation and validation.
pub mod identity;
/// Durable multi-account session persistence.
pub mod store;

pub use challenge::{ChallengeContext, ChallengeCoordinator, ChallengeProvider, DeliveryChoice};
pub use client::{Client, ClientBuilder};
pub use cookie::{CookieSet, ESSENTIAL_COOKIES};
pub use descriptor::SessionDescriptor;
pub use error::{Error, Result};
pub use executor::{
	FakeTransport, HttpTransport, PassthroughSigner, RequestExecutor, RequestSpec, ResponseParts,
	RetryPolicy, Signer, Transport,
};
pub use identity::{AccountFields, JsonAccountExtractor, ObjectExtractor, SessionIdentity};
pub use store::{IndexRecord, SessionStore};
