// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent catalog: loads and compiles agent -> sections -> intents graphs
//! from the three source collections into a single traversable document.
//!
//! Compiled documents are memoized per `agent_id`; callers invalidate on
//! source change. Consumers only ever read the compiled view.

pub mod compiler;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use tabletalk_core::types::CompiledAgent;
use tabletalk_core::{StorageAdapter, TableTalkError};

/// Compiles and caches agent documents.
pub struct AgentCatalog {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    cache: DashMap<String, Arc<CompiledAgent>>,
}

impl AgentCatalog {
    pub fn new(storage: Arc<dyn StorageAdapter + Send + Sync>) -> Self {
        Self {
            storage,
            cache: DashMap::new(),
        }
    }

    /// Returns the compiled document for `agent_id`, or `None` when the
    /// agent does not exist. Storage errors propagate.
    pub async fn get_compiled_agent(
        &self,
        agent_id: &str,
    ) -> Result<Option<Arc<CompiledAgent>>, TableTalkError> {
        if let Some(cached) = self.cache.get(agent_id) {
            return Ok(Some(cached.clone()));
        }

        let Some(agent) = self.storage.get_agent(agent_id).await? else {
            return Ok(None);
        };

        let section_rows = self.storage.list_sections(agent_id).await?;
        let mut sections = Vec::with_capacity(section_rows.len());
        for section in section_rows {
            let intents = self.storage.list_intents(&section.id).await?;
            sections.push((section, intents));
        }

        let compiled = Arc::new(compiler::compile(agent, sections));
        debug!(
            agent_id,
            sections = compiled.sections.len(),
            "agent compiled"
        );
        self.cache.insert(agent_id.to_string(), compiled.clone());
        Ok(Some(compiled))
    }

    /// Drops the memoized document so the next read recompiles from source.
    pub fn invalidate(&self, agent_id: &str) {
        self.cache.remove(agent_id);
    }
}
