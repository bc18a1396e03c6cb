// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation summarizer.
//!
//! Flattens the client-supplied history into `speaker: text` lines, asks the
//! LLM for a bulleted chronological digest, and returns the bullet block
//! verbatim. The client uses the summary to compact its own in-memory
//! history; nothing is persisted server-side.

use serde::{Deserialize, Serialize};

use tabletalk_core::{CompletionAdapter, TableTalkError};

/// System prompt for the digest call. The bullets read chronologically, one
/// line per development ("Agent introduced...", "User shared...").
const SUMMARY_PROMPT: &str = "\
You are a conversation summarizer for a voice meal-logging assistant. \
Summarize the conversation below as a bulleted chronological digest.\n\n\
Rules:\n\
- One bullet per development, in the order it happened.\n\
- Start each bullet with the actor, e.g. \"- Agent introduced itself and asked about breakfast\" \
or \"- User shared that they had eggs and toast\".\n\
- Keep names, foods, quantities, and decisions; drop filler and repetition.\n\
- Output ONLY the bullet lines, no heading and no closing remarks.";

/// One entry of client-side conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: String,
    pub text: String,
}

/// Flatten history entries into the `speaker: text` transcript form fed to
/// the LLM.
pub fn flatten_history(entries: &[HistoryEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{}: {}", entry.speaker, entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Produce the digest for the given history. The returned bullet block is
/// passed through verbatim.
pub async fn summarize_history(
    provider: &dyn CompletionAdapter,
    entries: &[HistoryEntry],
) -> Result<String, TableTalkError> {
    let transcript = flatten_history(entries);
    provider
        .complete_text(
            SUMMARY_PROMPT,
            &format!("Summarize this conversation:\n\n{transcript}"),
        )
        .await
}
