// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policy shared by the speech providers.
//!
//! Transient failures (timeouts, connection errors, rate limits, server
//! errors) retry with exponential backoff; contract errors do not. Callers
//! that exhaust their attempts fall back to the adapter-default silent
//! result rather than surfacing an error.

use std::time::Duration;

use tabletalk_core::TableTalkError;

/// A failed attempt plus whether it is worth retrying.
pub(crate) struct AttemptError {
    pub transient: bool,
    pub error: TableTalkError,
}

impl AttemptError {
    pub fn transient(error: TableTalkError) -> Self {
        Self {
            transient: true,
            error,
        }
    }

    pub fn fatal(error: TableTalkError) -> Self {
        Self {
            transient: false,
            error,
        }
    }
}

/// Delay before the given retry attempt: `base * 2^(attempt-1)`, capped.
pub(crate) fn backoff_delay(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << (attempt - 1).min(16));
    Duration::from_millis(exp.min(cap_ms))
}

/// Whether an HTTP status is worth another attempt.
pub(crate) fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}
