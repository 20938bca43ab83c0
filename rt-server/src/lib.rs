//! Realtime disruption reconciliation server.
//!
//! Ingests realtime disruption feeds for scheduled public-transport trips,
//! reconciles each update against the base schedule and the previously
//! stored realtime state, and republishes the result as a differential
//! feed for downstream consumers.

pub mod connectors;
pub mod domain;
pub mod ingest;
pub mod merge;
pub mod publish;
pub mod schedule;
pub mod store;
pub mod web;
