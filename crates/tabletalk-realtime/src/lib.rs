// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime credential issuer for the TableTalk dialogue orchestrator.
//!
//! Mints short-lived (~1 hour) credentials from the upstream realtime voice
//! API, tagged with session metadata. The browser connects to the upstream
//! directly; this server never proxies the audio stream.

pub mod issuer;

pub use issuer::RealtimeIssuer;
