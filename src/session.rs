//! Conversations that span several runs.
//!
//! A [`Session`] seeds each run with the stored transcript and, once the run
//! returns, appends only what that run added.

use crate::agent::{AgentRun, RunOptions};
use crate::error::{AgentError, Result};
use crate::memory::ConversationMemory;
use crate::storage::TranscriptStore;

pub struct Session<S: TranscriptStore> {
    store: S,
    transcript: ConversationMemory,
}

impl<S: TranscriptStore> Session<S> {
    /// Opens the session backed by `store`, loading whatever it already holds.
    pub async fn open(store: S) -> Result<Self> {
        let transcript = ConversationMemory::with_messages(store.read().await?);
        tracing::debug!(messages = transcript.len(), "session opened");
        Ok(Self { store, transcript })
    }

    pub fn transcript(&self) -> &ConversationMemory {
        &self.transcript
    }

    /// Options for the next run, seeded with the session transcript.
    pub fn run_options(&self) -> RunOptions {
        RunOptions::new().with_memory(self.transcript.clone())
    }

    /// Stores the messages `run` added on top of the session transcript and
    /// returns how many there were.
    ///
    /// Fails without writing anything when the run did not start from this
    /// session's transcript.
    pub async fn record(&mut self, run: &AgentRun) -> Result<usize> {
        let known = self.transcript.messages();
        let produced = run.memory.messages();
        if !produced.starts_with(known) {
            return Err(AgentError::Storage(format!(
                "run {} did not continue this session's transcript",
                run.run_id
            )));
        }

        let added = &produced[known.len()..];
        self.store.append(added).await?;
        for message in added {
            self.transcript.push(message.clone());
        }
        tracing::debug!(run_id = %run.run_id, added = added.len(), "session updated");
        Ok(added.len())
    }

    /// Forgets the conversation, in storage and in memory.
    pub async fn reset(&mut self) -> Result<()> {
        self.store.reset().await?;
        self.transcript.clear();
        Ok(())
    }
}
