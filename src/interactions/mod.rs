use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};
use tracing::debug;

/// A workflow-continuation action decoded from a component's custom id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowAction {
    SelectEvent(i64),
    ConfirmDelete(i64),
    CancelDelete(i64),
    ExportAll,
}

impl WorkflowAction {
    /// Opaque id the renderer attaches to the matching component.
    pub fn custom_id(self) -> String {
        match self {
            WorkflowAction::SelectEvent(id) => format!("delete_specific_{id}"),
            WorkflowAction::ConfirmDelete(id) => format!("confirm_delete_{id}"),
            WorkflowAction::CancelDelete(id) => format!("cancel_delete_{id}"),
            WorkflowAction::ExportAll => "export_ledger".to_string(),
        }
    }

    pub fn parse(custom_id: &str) -> Option<Self> {
        if custom_id == "export_ledger" {
            return Some(WorkflowAction::ExportAll);
        }
        if let Some(raw) = custom_id.strip_prefix("delete_specific_") {
            return raw.parse().ok().map(WorkflowAction::SelectEvent);
        }
        if let Some(raw) = custom_id.strip_prefix("confirm_delete_") {
            return raw.parse().ok().map(WorkflowAction::ConfirmDelete);
        }
        if let Some(raw) = custom_id.strip_prefix("cancel_delete_") {
            return raw.parse().ok().map(WorkflowAction::CancelDelete);
        }
        None
    }
}

/// A raw component interaction as the gateway hands it over.
#[derive(Debug, Clone)]
pub struct ComponentAction {
    pub actor_id: String,
    pub custom_id: String,
}

/// What became of a delivered interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Consumed,
    /// A live subscription matched the action but belongs to a different
    /// actor; the event is dropped, the subscription stays open.
    IgnoredActor,
    Unclaimed,
}

/// Which actions a subscription accepts.
#[derive(Debug, Clone, Copy)]
enum ActionFilter {
    /// Confirm or cancel for one specific event id.
    Confirmation(i64),
    /// Pick-one or export from the listing view.
    Listing,
}

impl ActionFilter {
    fn matches(self, action: WorkflowAction) -> bool {
        match self {
            ActionFilter::Confirmation(id) => matches!(
                action,
                WorkflowAction::ConfirmDelete(target) | WorkflowAction::CancelDelete(target)
                    if target == id
            ),
            ActionFilter::Listing => matches!(
                action,
                WorkflowAction::SelectEvent(_) | WorkflowAction::ExportAll
            ),
        }
    }
}

struct Pending {
    token: u64,
    actor_id: String,
    filter: ActionFilter,
    tx: oneshot::Sender<WorkflowAction>,
}

/// Bounded single-result listener hub. Each subscription is scoped to one
/// actor and one action shape; the first matching delivery wins and the
/// subscription is gone, so a double click or a replayed interaction
/// cannot fire twice.
#[derive(Default)]
pub struct InteractionRouter {
    pending: Mutex<Vec<Pending>>,
    next_token: AtomicU64,
}

impl InteractionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes a gateway-delivered action to the oldest matching
    /// subscription owned by the acting user.
    pub fn deliver(&self, action: &ComponentAction) -> Delivery {
        let Some(parsed) = WorkflowAction::parse(&action.custom_id) else {
            return Delivery::Unclaimed;
        };
        let mut pending = self.lock_pending();
        let position = pending
            .iter()
            .position(|p| p.filter.matches(parsed) && p.actor_id == action.actor_id);
        match position {
            Some(pos) => {
                let sub = pending.remove(pos);
                let _ = sub.tx.send(parsed);
                Delivery::Consumed
            }
            None if pending.iter().any(|p| p.filter.matches(parsed)) => {
                debug!(actor_id = %action.actor_id, custom_id = %action.custom_id,
                       "interaction from a non-invoking actor ignored");
                Delivery::IgnoredActor
            }
            None => Delivery::Unclaimed,
        }
    }

    pub fn subscribe_confirmation(&self, actor_id: &str, event_id: i64) -> ConfirmationTicket<'_> {
        ConfirmationTicket(self.subscribe(actor_id, ActionFilter::Confirmation(event_id)))
    }

    pub fn subscribe_listing(&self, actor_id: &str) -> ListingTicket<'_> {
        ListingTicket(self.subscribe(actor_id, ActionFilter::Listing))
    }

    fn subscribe(&self, actor_id: &str, filter: ActionFilter) -> ActionTicket<'_> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.lock_pending().push(Pending {
            token,
            actor_id: actor_id.to_string(),
            filter,
            tx,
        });
        ActionTicket {
            router: self,
            token,
            rx,
        }
    }

    fn unsubscribe(&self, token: u64) {
        self.lock_pending().retain(|p| p.token != token);
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One-shot wait on a subscription: resolves with the first matching
/// action or with `None` when the bound elapses. Either way the
/// subscription is unregistered afterwards, so late or repeated actions
/// find nothing to act on.
struct ActionTicket<'r> {
    router: &'r InteractionRouter,
    token: u64,
    rx: oneshot::Receiver<WorkflowAction>,
}

impl ActionTicket<'_> {
    async fn first_action(mut self, timeout: Duration) -> Option<WorkflowAction> {
        tokio::select! {
            action = &mut self.rx => action.ok(),
            () = sleep(timeout) => None,
        }
    }
}

impl Drop for ActionTicket<'_> {
    fn drop(&mut self) {
        self.router.unsubscribe(self.token);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmChoice {
    Confirm,
    Cancel,
}

pub struct ConfirmationTicket<'r>(ActionTicket<'r>);

impl ConfirmationTicket<'_> {
    pub async fn choice(self, timeout: Duration) -> Option<ConfirmChoice> {
        match self.0.first_action(timeout).await {
            Some(WorkflowAction::ConfirmDelete(_)) => Some(ConfirmChoice::Confirm),
            Some(WorkflowAction::CancelDelete(_)) => Some(ConfirmChoice::Cancel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingChoice {
    Pick(i64),
    Export,
}

pub struct ListingTicket<'r>(ActionTicket<'r>);

impl ListingTicket<'_> {
    pub async fn choice(self, timeout: Duration) -> Option<ListingChoice> {
        match self.0.first_action(timeout).await {
            Some(WorkflowAction::SelectEvent(id)) => Some(ListingChoice::Pick(id)),
            Some(WorkflowAction::ExportAll) => Some(ListingChoice::Export),
            _ => None,
        }
    }
}
