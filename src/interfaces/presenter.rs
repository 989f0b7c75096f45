use async_trait::async_trait;

use crate::domains::event::{EventKind, EventRecord};
use crate::error::Result;
use crate::export::CsvExport;

/// One row of the deletion picker, already enriched with the actor's
/// display name.
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub id: i64,
    pub kind: EventKind,
    pub customer_name: String,
    pub actor_id: String,
    pub actor_name: String,
    pub set_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ListingView {
    pub entries: Vec<ListingEntry>,
}

/// Full event detail shown before a destructive confirm.
#[derive(Debug, Clone)]
pub struct ConfirmationView {
    pub event: EventRecord,
    pub actor_name: String,
    pub setter_name: Option<String>,
}

/// Expected, non-alarming outcomes the renderer turns into user-facing
/// notices. Store failures are not notices; they propagate as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowNotice {
    PermissionDenied,
    EventNotFound(i64),
    LedgerEmpty,
    Deleted(i64),
    Cancelled(i64),
    ConfirmationTimedOut(i64),
    ListingTimedOut,
    ExportEmpty,
}

/// Rendering seam: the workflow hands over structured values; turning
/// them into embeds or messages is the chat collaborator's job.
#[async_trait]
pub trait WorkflowPresenter: Send + Sync {
    async fn show_listing(&self, listing: &ListingView) -> Result<()>;
    async fn show_confirmation(&self, view: &ConfirmationView) -> Result<()>;
    async fn show_notice(&self, notice: WorkflowNotice) -> Result<()>;
    async fn deliver_export(&self, export: &CsvExport) -> Result<()>;
}
