//! Intake Relay Library
//!
//! This library provides the core functionality for the intake relay
//! service, which forwards captured form submissions to a remote
//! loan-origination REST API with dedup, retries, and token lifecycle
//! management.
//!
//! # Modules
//!
//! - `api_client`: Delivery engine and existence resolver for the remote API.
//! - `circuit_breaker`: Circuit breaker for outbound calls.
//! - `config`: Configuration management.
//! - `errors`: Error handling types and retryability classification.
//! - `fields`: Typed field accessor over raw submissions.
//! - `intake`: Intake hook HTTP handlers.
//! - `models`: Core data models and the task envelope.
//! - `payload`: Submission-to-payload mapping.
//! - `pipeline`: Per-form-type delivery pipelines.
//! - `queue`: Relay task queue with dedup and backoff retries.
//! - `router`: Task decoding and dispatch.
//! - `token`: Bearer-token lifecycle management.
//! - `transform`: Pure value transformers.

pub mod api_client;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod fields;
pub mod intake;
pub mod models;
pub mod payload;
pub mod pipeline;
pub mod queue;
pub mod router;
pub mod token;
pub mod transform;
