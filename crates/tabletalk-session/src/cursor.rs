// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session intent cursor.
//!
//! The cursor is a single value `(section_idx, intent_idx, completed_fields,
//! retry_count)` mutated through a narrow interface. The client drives
//! cursor advancement; the server tracks its own copy for validation and
//! observability.

use std::collections::BTreeMap;

use tabletalk_core::types::{CompiledAgent, Intent};

/// Pointer to the `(section, intent)` currently being processed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentCursor {
    section_idx: usize,
    intent_idx: usize,
    completed_fields: BTreeMap<String, String>,
    retry_count: u32,
}

impl IntentCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The intent under the cursor, or `None` when the cursor sits past the
    /// end of its section (advance to move on) or the agent is exhausted.
    pub fn current<'a>(&self, agent: &'a CompiledAgent) -> Option<&'a Intent> {
        agent
            .sections
            .get(self.section_idx)?
            .intents
            .get(self.intent_idx)
    }

    /// Merge extracted fields into the session's accumulated set
    /// (last-write-wins per field name).
    pub fn record_fields(&mut self, fields: &BTreeMap<String, String>) {
        for (name, value) in fields {
            self.completed_fields.insert(name.clone(), value.clone());
        }
    }

    pub fn completed_fields(&self) -> &BTreeMap<String, String> {
        &self.completed_fields
    }

    /// Advance to the next intent, crossing section boundaries and skipping
    /// empty sections. Resets the retry counter. Returns the new current
    /// intent, or `None` when the agent is exhausted.
    pub fn advance<'a>(&mut self, agent: &'a CompiledAgent) -> Option<&'a Intent> {
        self.retry_count = 0;
        self.intent_idx += 1;
        loop {
            let section = agent.sections.get(self.section_idx)?;
            if let Some(intent) = section.intents.get(self.intent_idx) {
                return Some(intent);
            }
            self.section_idx += 1;
            self.intent_idx = 0;
        }
    }

    /// Count one failed attempt at the current intent; returns the new count.
    pub fn note_retry(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Whether the current intent's retry budget is spent.
    pub fn retries_exhausted(&self, agent: &CompiledAgent) -> bool {
        match self.current(agent) {
            Some(intent) if intent.retry_limit > 0 => self.retry_count >= intent.retry_limit,
            _ => false,
        }
    }

    pub fn position(&self) -> (usize, usize) {
        (self.section_idx, self.intent_idx)
    }
}
