use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::Duration;
use tracing::{debug, info};

use crate::domains::actor::ActorRef;
use crate::domains::event::EventRecord;
use crate::error::Result;
use crate::export::{ExportGenerator, ExportOutcome};
use crate::interactions::{ConfirmChoice, InteractionRouter, ListingChoice};
use crate::interfaces::directory::{UsernameResolver, UNKNOWN_USER};
use crate::interfaces::permissions::{Capability, PermissionGate};
use crate::interfaces::presenter::{
    ConfirmationView, ListingEntry, ListingView, WorkflowNotice, WorkflowPresenter,
};
use crate::ledger::EventLedger;

/// How many candidates the picker shows.
const LISTING_LIMIT: i64 = 10;

pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Listing,
    AwaitingSelection,
    AwaitingConfirmation,
    Deleted,
    Cancelled,
    TimedOut,
}

/// Terminal result of one workflow instance.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    Denied,
    NotFound(i64),
    NothingToList,
    Deleted(i64),
    Cancelled(i64),
    TimedOut,
    Exported { rows: usize },
}

#[derive(Debug, Clone)]
pub struct DeletionRequest {
    pub actor: ActorRef,
    /// A known id skips the listing and goes straight to confirmation.
    pub target: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkflowTimeouts {
    pub confirm: Duration,
    pub list: Duration,
}

impl Default for WorkflowTimeouts {
    fn default() -> Self {
        Self {
            confirm: DEFAULT_CONFIRM_TIMEOUT,
            list: DEFAULT_LIST_TIMEOUT,
        }
    }
}

/// One run of the interactive deletion state machine, scoped to one
/// invoking actor. Consuming `run` enforces that terminal states are
/// final: an instance cannot be re-entered.
pub struct DeletionWorkflow {
    ledger: Arc<EventLedger>,
    directory: Arc<dyn UsernameResolver>,
    gate: Arc<dyn PermissionGate>,
    presenter: Arc<dyn WorkflowPresenter>,
    router: Arc<InteractionRouter>,
    exporter: ExportGenerator,
    timeouts: WorkflowTimeouts,
    state: WorkflowState,
}

impl DeletionWorkflow {
    pub fn new(
        ledger: Arc<EventLedger>,
        directory: Arc<dyn UsernameResolver>,
        gate: Arc<dyn PermissionGate>,
        presenter: Arc<dyn WorkflowPresenter>,
        router: Arc<InteractionRouter>,
        exporter: ExportGenerator,
        timeouts: WorkflowTimeouts,
    ) -> Self {
        Self {
            ledger,
            directory,
            gate,
            presenter,
            router,
            exporter,
            timeouts,
            state: WorkflowState::Idle,
        }
    }

    pub async fn run(mut self, request: DeletionRequest) -> Result<WorkflowOutcome> {
        if !self.gate.allows(&request.actor, Capability::ManageLedger) {
            self.presenter
                .show_notice(WorkflowNotice::PermissionDenied)
                .await?;
            return Ok(WorkflowOutcome::Denied);
        }
        match request.target {
            Some(id) => self.confirm_and_delete(&request.actor, id).await,
            None => self.run_listing(&request.actor).await,
        }
    }

    async fn run_listing(&mut self, actor: &ActorRef) -> Result<WorkflowOutcome> {
        self.transition(WorkflowState::Listing);
        let recent = self.ledger.list_recent(LISTING_LIMIT).await?;
        if recent.is_empty() {
            self.presenter
                .show_notice(WorkflowNotice::LedgerEmpty)
                .await?;
            return Ok(WorkflowOutcome::NothingToList);
        }

        let names = self.resolve_names(recent.iter().map(|e| e.actor_id.as_str())).await;
        let entries = recent
            .iter()
            .map(|event| ListingEntry {
                id: event.id,
                kind: event.kind,
                customer_name: event.customer_name.clone(),
                actor_id: event.actor_id.clone(),
                actor_name: display_name(&names, &event.actor_id),
                set_at: event.set_at,
            })
            .collect();

        let ticket = self.router.subscribe_listing(&actor.id);
        self.presenter
            .show_listing(&ListingView { entries })
            .await?;

        match ticket.choice(self.timeouts.list).await {
            Some(ListingChoice::Pick(id)) => {
                self.transition(WorkflowState::AwaitingSelection);
                self.confirm_and_delete(actor, id).await
            }
            // Export is a side channel: it consumes the listing's single
            // action slot but never touches the ledger.
            Some(ListingChoice::Export) => self.run_export().await,
            None => {
                self.transition(WorkflowState::TimedOut);
                self.presenter
                    .show_notice(WorkflowNotice::ListingTimedOut)
                    .await?;
                Ok(WorkflowOutcome::TimedOut)
            }
        }
    }

    async fn confirm_and_delete(&mut self, actor: &ActorRef, id: i64) -> Result<WorkflowOutcome> {
        let Some(event) = self.ledger.get_by_id(id).await? else {
            self.presenter
                .show_notice(WorkflowNotice::EventNotFound(id))
                .await?;
            return Ok(WorkflowOutcome::NotFound(id));
        };
        self.transition(WorkflowState::AwaitingConfirmation);

        let view = self.confirmation_view(event).await;
        let ticket = self.router.subscribe_confirmation(&actor.id, id);
        self.presenter.show_confirmation(&view).await?;

        match ticket.choice(self.timeouts.confirm).await {
            Some(ConfirmChoice::Confirm) => {
                let deleted = self.ledger.delete(id).await?;
                if deleted == 0 {
                    // A concurrent instance got there first.
                    self.presenter
                        .show_notice(WorkflowNotice::EventNotFound(id))
                        .await?;
                    return Ok(WorkflowOutcome::NotFound(id));
                }
                self.transition(WorkflowState::Deleted);
                info!(event_id = id, actor_id = %actor.id, "event deleted");
                self.presenter
                    .show_notice(WorkflowNotice::Deleted(id))
                    .await?;
                Ok(WorkflowOutcome::Deleted(id))
            }
            Some(ConfirmChoice::Cancel) => {
                self.transition(WorkflowState::Cancelled);
                self.presenter
                    .show_notice(WorkflowNotice::Cancelled(id))
                    .await?;
                Ok(WorkflowOutcome::Cancelled(id))
            }
            None => {
                self.transition(WorkflowState::TimedOut);
                self.presenter
                    .show_notice(WorkflowNotice::ConfirmationTimedOut(id))
                    .await?;
                Ok(WorkflowOutcome::TimedOut)
            }
        }
    }

    async fn run_export(&self) -> Result<WorkflowOutcome> {
        match self.exporter.generate().await? {
            ExportOutcome::Empty => {
                self.presenter
                    .show_notice(WorkflowNotice::ExportEmpty)
                    .await?;
                Ok(WorkflowOutcome::Exported { rows: 0 })
            }
            ExportOutcome::Ready(export) => {
                self.presenter.deliver_export(&export).await?;
                Ok(WorkflowOutcome::Exported { rows: export.rows })
            }
        }
    }

    async fn confirmation_view(&self, event: EventRecord) -> ConfirmationView {
        let ids: Vec<&str> = std::iter::once(event.actor_id.as_str())
            .chain(event.setter_id.as_deref())
            .collect();
        let names = self.resolve_names(ids.into_iter()).await;
        ConfirmationView {
            actor_name: display_name(&names, &event.actor_id),
            setter_name: event
                .setter_id
                .as_deref()
                .map(|id| display_name(&names, id)),
            event,
        }
    }

    async fn resolve_names<'a>(
        &self,
        ids: impl Iterator<Item = &'a str>,
    ) -> HashMap<String, String> {
        let mut distinct: Vec<String> = Vec::new();
        for id in ids {
            if !distinct.iter().any(|seen| seen == id) {
                distinct.push(id.to_string());
            }
        }
        self.directory.resolve(&distinct).await
    }

    fn transition(&mut self, to: WorkflowState) {
        debug!(from = ?self.state, to = ?to, "deletion workflow transition");
        self.state = to;
    }
}

fn display_name(names: &HashMap<String, String>, id: &str) -> String {
    names
        .get(id)
        .map(String::as_str)
        .unwrap_or(UNKNOWN_USER)
        .to_string()
}
