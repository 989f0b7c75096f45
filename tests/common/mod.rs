#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use time::UtcOffset;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use suntally::domains::actor::ActorRef;
use suntally::domains::event::EventDraft;
use suntally::error::Result;
use suntally::export::{CsvExport, ExportGenerator};
use suntally::interactions::InteractionRouter;
use suntally::interfaces::directory::{UsernameResolver, UNKNOWN_USER};
use suntally::interfaces::permissions::{Capability, PermissionGate};
use suntally::interfaces::presenter::{
    ConfirmationView, ListingView, WorkflowNotice, WorkflowPresenter,
};
use suntally::ledger::EventLedger;
use suntally::workflow::{DeletionWorkflow, WorkflowTimeouts};

pub async fn temp_ledger() -> (TempDir, Arc<EventLedger>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ledger.db");
    let ledger = EventLedger::open(path.to_string_lossy())
        .await
        .expect("open ledger");
    (dir, Arc::new(ledger))
}

pub fn actor(id: &str) -> ActorRef {
    ActorRef::new(id, vec!["r-test".to_string()])
}

pub fn set_draft(actor_id: &str, customer: &str, set_at: i64) -> EventDraft {
    EventDraft::Set {
        actor_id: actor_id.to_string(),
        channel_id: "chan-1".to_string(),
        customer_name: customer.to_string(),
        set_at,
        has_bill: false,
    }
}

pub fn closed_draft(actor_id: &str, customer: &str, setter_id: &str) -> EventDraft {
    EventDraft::Closed {
        actor_id: actor_id.to_string(),
        channel_id: "chan-1".to_string(),
        customer_name: customer.to_string(),
        system_size: 8.5,
        setter_id: setter_id.to_string(),
    }
}

pub fn install_draft(actor_id: &str, customer: &str, setter_id: &str) -> EventDraft {
    EventDraft::InstallScheduled {
        actor_id: actor_id.to_string(),
        channel_id: "chan-1".to_string(),
        customer_name: customer.to_string(),
        setter_id: setter_id.to_string(),
    }
}

/// Resolver backed by a fixed map; unknown ids get the placeholder, per
/// the directory contract. Records each `resolve` call for assertions.
pub struct MockResolver {
    known: HashMap<String, String>,
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl MockResolver {
    pub fn new(known: &[(&str, &str)]) -> Self {
        Self {
            known: known
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl UsernameResolver for MockResolver {
    async fn resolve(&self, ids: &[String]) -> HashMap<String, String> {
        self.calls.lock().await.push(ids.to_vec());
        ids.iter()
            .map(|id| {
                let name = self
                    .known
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_USER.to_string());
                (id.clone(), name)
            })
            .collect()
    }
}

pub struct AllowAllGate;

impl PermissionGate for AllowAllGate {
    fn allows(&self, _actor: &ActorRef, _capability: Capability) -> bool {
        true
    }
}

pub struct DenyAllGate;

impl PermissionGate for DenyAllGate {
    fn allows(&self, _actor: &ActorRef, _capability: Capability) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresenterEvent {
    Listing(usize),
    Confirmation(i64),
    Notice(WorkflowNotice),
    Export(usize),
}

/// Presenter that streams every call to the test, so tests can both
/// sequence against the workflow and assert what was shown.
pub struct RecordingPresenter {
    tx: UnboundedSender<PresenterEvent>,
}

impl RecordingPresenter {
    pub fn new() -> (Arc<Self>, UnboundedReceiver<PresenterEvent>) {
        let (tx, rx) = unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl WorkflowPresenter for RecordingPresenter {
    async fn show_listing(&self, listing: &ListingView) -> Result<()> {
        let _ = self.tx.send(PresenterEvent::Listing(listing.entries.len()));
        Ok(())
    }

    async fn show_confirmation(&self, view: &ConfirmationView) -> Result<()> {
        let _ = self.tx.send(PresenterEvent::Confirmation(view.event.id));
        Ok(())
    }

    async fn show_notice(&self, notice: WorkflowNotice) -> Result<()> {
        let _ = self.tx.send(PresenterEvent::Notice(notice));
        Ok(())
    }

    async fn deliver_export(&self, export: &CsvExport) -> Result<()> {
        let _ = self.tx.send(PresenterEvent::Export(export.rows));
        Ok(())
    }
}

pub struct WorkflowHarness {
    pub ledger: Arc<EventLedger>,
    pub router: Arc<InteractionRouter>,
    pub presenter_rx: UnboundedReceiver<PresenterEvent>,
    presenter: Arc<RecordingPresenter>,
    resolver: Arc<MockResolver>,
    gate: Arc<dyn PermissionGate>,
    _dir: TempDir,
}

impl WorkflowHarness {
    pub async fn new() -> Self {
        Self::with_gate(Arc::new(AllowAllGate)).await
    }

    pub async fn with_gate(gate: Arc<dyn PermissionGate>) -> Self {
        let (dir, ledger) = temp_ledger().await;
        let (presenter, presenter_rx) = RecordingPresenter::new();
        Self {
            ledger,
            router: Arc::new(InteractionRouter::new()),
            presenter_rx,
            presenter,
            resolver: Arc::new(MockResolver::new(&[("u1", "Avery"), ("u2", "Blake")])),
            gate,
            _dir: dir,
        }
    }

    pub fn workflow(&self) -> DeletionWorkflow {
        let exporter = ExportGenerator::new(
            self.ledger.clone(),
            self.resolver.clone(),
            UtcOffset::UTC,
        );
        DeletionWorkflow::new(
            self.ledger.clone(),
            self.resolver.clone(),
            self.gate.clone(),
            self.presenter.clone(),
            self.router.clone(),
            exporter,
            WorkflowTimeouts::default(),
        )
    }
}
