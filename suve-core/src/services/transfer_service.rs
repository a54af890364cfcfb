//! Stash transfer service
//!
//! Moves staged state between the agent and the stash file:
//! - push / persist: agent -> file
//! - pop / drain: file -> agent
//!
//! The destination write is the durable half and must succeed; clearing the
//! source afterwards is best-effort, since a failed cleanup can only leave a
//! duplicate behind.

use std::sync::Arc;

use crate::error::{CoreError, CoreResult, NonFatalError};
use crate::services::lifecycle::{
    execute_file, execute_read, execute_write, FileCommand, ReadCommand, ReadOutcome,
    WriteCommand,
};
use crate::services::ServiceContext;
use crate::traits::{Choice, StateStore};
use crate::types::{
    Service, State, TransferDirection, TransferMode, TransferOptions, TransferOutput,
};

/// Stash transfer service
pub struct TransferService {
    ctx: Arc<ServiceContext>,
}

impl TransferService {
    /// 创建 transfer 服务实例
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// `stash push`: move staged changes from a running agent into the stash file
    ///
    /// Returns `NothingStaged` when no agent is running.
    pub async fn push(&self, options: TransferOptions) -> CoreResult<ReadOutcome<TransferOutput>> {
        execute_read(self.ctx.pinger.as_ref(), ReadCommand::STASH_PUSH, || {
            self.persist(options)
        })
        .await
    }

    /// `stash pop`: move the stash file into the agent, starting it if needed
    pub async fn pop(&self, options: TransferOptions) -> CoreResult<TransferOutput> {
        execute_write(self.ctx.starter.as_ref(), WriteCommand::STASH_POP, || {
            self.drain(options)
        })
        .await
    }

    /// Agent -> file transfer without lifecycle handling
    pub async fn persist(&self, options: TransferOptions) -> CoreResult<TransferOutput> {
        self.transfer(
            TransferDirection::AgentToFile,
            self.ctx.agent.as_ref(),
            self.ctx.file_store.as_ref(),
            options,
        )
        .await
    }

    /// File -> agent transfer without lifecycle handling
    pub async fn drain(&self, options: TransferOptions) -> CoreResult<TransferOutput> {
        self.transfer(
            TransferDirection::FileToAgent,
            self.ctx.file_store.as_ref(),
            self.ctx.agent.as_ref(),
            options,
        )
        .await
    }

    /// `stash show`: read the stash file without consuming it
    pub async fn show(&self, service: Option<Service>) -> CoreResult<State> {
        execute_file(FileCommand::STASH_SHOW, || async {
            let state = self.ctx.file_store.drain(service, true).await?;
            if state.is_empty_in(service) {
                return Err(CoreError::NothingToTransfer);
            }
            Ok(state)
        })
        .await
    }

    /// `stash drop`: discard the stash without decrypting it
    ///
    /// # Returns
    /// `false` when there was no stash to drop
    pub async fn drop_stash(&self, service: Option<Service>) -> CoreResult<bool> {
        execute_file(FileCommand::STASH_DROP, || async {
            if !self.ctx.file_store.exists().await? {
                return Ok(false);
            }
            match service {
                None => self.ctx.file_store.delete().await?,
                // An empty scoped write removes only that service's document
                Some(svc) => {
                    self.ctx
                        .file_store
                        .write_state(Some(svc), &State::new())
                        .await?;
                }
            }
            log::info!("Dropped stash ({})", scope_label(service));
            Ok(true)
        })
        .await
    }

    async fn transfer<S, D>(
        &self,
        direction: TransferDirection,
        source: &S,
        dest: &D,
        options: TransferOptions,
    ) -> CoreResult<TransferOutput>
    where
        S: StateStore + ?Sized,
        D: StateStore + ?Sized,
    {
        let service = options.service;

        // 1. Peek at the source
        let incoming = source.drain(service, true).await?;
        if incoming.is_empty_in(service) {
            return Err(CoreError::NothingToTransfer);
        }

        // 2. Reconcile with what the destination already holds
        let (mode, to_write) = if options.mode == Some(TransferMode::Overwrite) {
            (Some(TransferMode::Overwrite), incoming.clone())
        } else {
            let existing = dest.drain(service, true).await?;
            if existing.is_empty_in(service) {
                (None, incoming.clone())
            } else {
                let count = existing.scoped(service).total_count();
                match self.resolve_mode(options.mode, direction, count).await? {
                    TransferMode::Merge => {
                        let mut merged = existing;
                        merged.merge(incoming.clone());
                        (Some(TransferMode::Merge), merged)
                    }
                    TransferMode::Overwrite => (Some(TransferMode::Overwrite), incoming.clone()),
                }
            }
        };

        // 3. Durable half
        dest.write_state(service, &to_write).await?;

        // 4. Best-effort cleanup
        let warning = if options.keep {
            None
        } else {
            match source.drain(service, false).await {
                Ok(_) => None,
                Err(e) => {
                    log::warn!("Transfer ({direction}) succeeded but clearing the source failed: {e}");
                    Some(NonFatalError::after_write(e))
                }
            }
        };

        let scoped = incoming.scoped(service);
        let output = TransferOutput {
            direction,
            mode,
            entry_count: scoped.entries.len(),
            tag_count: scoped.tags.len(),
            warning,
        };
        log::info!(
            "Transferred {} staged change(s) ({direction}, {}, mode: {:?})",
            output.total(),
            scope_label(service),
            output.mode
        );
        Ok(output)
    }

    /// Pick the reconciliation mode for a non-empty destination
    async fn resolve_mode(
        &self,
        requested: Option<TransferMode>,
        direction: TransferDirection,
        existing_count: usize,
    ) -> CoreResult<TransferMode> {
        if let Some(mode) = requested {
            return Ok(mode);
        }
        if !self.ctx.prompter.is_interactive() {
            log::debug!("Destination not empty and no terminal, merging");
            return Ok(TransferMode::Merge);
        }

        let holder = match direction {
            TransferDirection::AgentToFile => "stash file",
            TransferDirection::FileToAgent => "agent",
        };
        let message = format!("The {holder} already holds {existing_count} staged change(s).");
        let choices = [
            Choice::new("Merge", "Combine both; incoming changes win on the same name"),
            Choice::new("Overwrite", format!("Discard what the {holder} holds")),
            Choice::new("Cancel", "Leave both sides untouched"),
        ];

        match self.ctx.prompter.choose(&message, &choices).await? {
            Some(0) => Ok(TransferMode::Merge),
            Some(1) => Ok(TransferMode::Overwrite),
            _ => Err(CoreError::Cancelled),
        }
    }
}

fn scope_label(service: Option<Service>) -> &'static str {
    service.map_or("all services", Service::as_str)
}
