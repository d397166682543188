//! Identity linking and access control SDK for streaming community apps.
//!
//! The crate covers the account-facing core of the Castlink platform: OAuth
//! authorization-code flows (with PKCE) against the supported identity
//! providers, linking exchanged provider profiles onto a primary account,
//! hybrid session-identity resolution, role and feature access evaluation,
//! and opportunistic risk/IP intake.

pub mod access;
pub mod app;
pub mod identity;
pub mod logger;
pub mod risk;
