//! Sentinel Common - Shared types for the Sentinel platform services
//!
//! This crate provides the primitives every service exchanges:
//! - Domain event metadata and the [`DomainEvent`] trait
//! - Store error types shared by repository implementations
//!
//! # Domain Events
//!
//! Events are immutable records named in past tense. Each carries
//! [`EventMetadata`] so consumers can deduplicate redelivered messages
//! by `event_id`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod events;

pub use error::*;
pub use events::*;
