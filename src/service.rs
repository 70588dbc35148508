//! Service layer API for stock and request operations
use super::catalog::{self, Material};
use super::config::StockConfig;
use super::error::{LedgerError, Shortage, SyncError};
use super::fulfillment::{StatusChange, StockState};
use super::ledger::{InventoryItem, InventoryLedger};
use super::request::{MaterialRequest, RequestQueue};
use super::store::{SledStore, StockStore};
use super::sync::{
    REQUEST_SHEET, RemoteMirror, SheetMirror, SyncTicket, TRANSACTION_SHEET, request_row,
    transaction_row,
};
use super::transaction::{StockTransaction, TransactionLog};
use super::types::{MovementType, RequestStatus};
use super::utils::{TRANSACTION_HRP, new_uuid_to_bech32};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reason recorded on an admin movement when none is given.
pub const DEFAULT_ADJUSTMENT_REASON: &str = "Entrada de Estoque";

pub struct StockService<S: StockStore> {
    store: S,
    state: StockState,
    mirror: Option<Arc<dyn RemoteMirror>>,
    pending: Vec<SyncTicket>,
    admin_password: String,
}

impl StockService<SledStore> {
    /// Open the configured sled database and, if a remote url is set, the spreadsheet mirror.
    pub fn from_config(config: &StockConfig) -> Result<Self, LedgerError> {
        let store = SledStore::open(&config.storage.path)?;
        let mut service = Self::open(store, &catalog::materials())?
            .with_admin_password(&config.admin.password);

        if let Some(url) = config.remote.endpoint() {
            match SheetMirror::new(url, Duration::from_secs(config.remote.timeout_secs)) {
                Ok(mirror) => service = service.with_mirror(Arc::new(mirror)),
                Err(e) => warn!(error = %e, "remote mirror unavailable, continuing local only"),
            }
        }
        Ok(service)
    }
}

impl<S: StockStore> StockService<S> {
    /// Load inventory, requests and transactions from the store.
    pub fn open(store: S, catalog: &[Material]) -> Result<Self, LedgerError> {
        let ledger = InventoryLedger::from_items(store.load_inventory(catalog)?);
        let log = TransactionLog::from_newest_first(store.load_transactions()?);
        let queue = RequestQueue::from_newest_first(store.load_requests()?);
        info!(
            materials = ledger.len(),
            requests = queue.len(),
            transactions = log.len(),
            "stock service opened"
        );

        Ok(Self {
            store,
            state: StockState::new(ledger, log, queue),
            mirror: None,
            pending: Vec::new(),
            admin_password: String::new(),
        })
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn RemoteMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn with_admin_password(mut self, password: &str) -> Self {
        self.admin_password = password.to_string();
        self
    }

    /// Check the shared admin password.
    pub fn authenticate(&self, password: &str) -> bool {
        !self.admin_password.is_empty() && password == self.admin_password
    }

    pub fn state(&self) -> &StockState {
        &self.state
    }

    pub fn inventory(&self) -> &[InventoryItem] {
        self.state.ledger.get()
    }

    pub fn search_inventory(&self, term: &str) -> Vec<&InventoryItem> {
        self.state.ledger.search(term)
    }

    pub fn requestable_materials(&self, term: &str) -> Vec<&InventoryItem> {
        self.state.ledger.requestable(term)
    }

    pub fn requests(&self) -> impl Iterator<Item = &MaterialRequest> {
        self.state.queue.list()
    }

    pub fn find_request(&self, id: &str) -> Option<&MaterialRequest> {
        self.state.queue.find_by_id(id)
    }

    /// Requests still waiting for an admin decision, newest first.
    pub fn pending_requests(&self) -> impl Iterator<Item = &MaterialRequest> {
        self.state.queue.pending()
    }

    pub fn transactions(&self) -> impl Iterator<Item = &StockTransaction> {
        self.state.log.list()
    }

    /// Lines of a request that current stock cannot cover.
    pub fn shortages(&self, request_id: &str) -> Result<Vec<Shortage>, LedgerError> {
        self.state.shortages(request_id)
    }

    /// Enqueue a crew's request and mirror it.
    pub fn submit_request(
        &mut self,
        request: MaterialRequest,
    ) -> Result<MaterialRequest, LedgerError> {
        let request = self.state.submit(request)?.clone();
        self.store.persist_request(&request)?;
        info!(request_id = %request.id, vtr = %request.vtr, lines = request.items.len(), "request submitted");

        self.mirror_rows(REQUEST_SHEET, vec![request_row(&request)]);
        Ok(request)
    }

    /// Approve (`Atendido`) or deny (`Não Atendido`) a request.
    ///
    /// Stock, transactions and the request are written after the in-memory
    /// change succeeds. A storage failure at that point is returned but the
    /// in-memory state is kept.
    pub fn set_status(
        &mut self,
        request_id: &str,
        status: RequestStatus,
    ) -> Result<StatusChange, LedgerError> {
        let change = self.state.set_status(request_id, status)?;

        let Some(request) = change.request().cloned() else {
            return Ok(change);
        };

        if !change.transactions().is_empty() {
            for tx in change.transactions() {
                self.store.persist_transaction(tx)?;
            }
            self.store.persist_inventory(self.state.ledger.get())?;
        }
        self.store.persist_request(&request)?;

        let mut tx_rows = Vec::new();
        for tx in change.transactions() {
            if let Some(item) = self.state.ledger.item(&tx.material_id) {
                tx_rows.push(transaction_row(tx, item));
            }
        }
        if !tx_rows.is_empty() {
            self.mirror_rows(TRANSACTION_SHEET, tx_rows);
        }
        self.mirror_rows(REQUEST_SHEET, vec![request_row(&request)]);

        Ok(change)
    }

    /// Direct admin movement. A `saida` larger than the balance leaves it at zero.
    pub fn adjust_stock(
        &mut self,
        material_id: &str,
        movement: MovementType,
        quantity: u64,
        reason: Option<&str>,
    ) -> Result<(StockTransaction, u64), LedgerError> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_ADJUSTMENT_REASON);
        let tx_id = new_uuid_to_bech32(TRANSACTION_HRP)?;

        let (tx, balance) = self
            .state
            .adjust_stock(tx_id, material_id, movement, quantity, reason)?;
        self.store.persist_transaction(&tx)?;
        self.store.persist_inventory(self.state.ledger.get())?;

        if let Some(item) = self.state.ledger.item(material_id) {
            let row = transaction_row(&tx, item);
            self.mirror_rows(TRANSACTION_SHEET, vec![row]);
        }
        Ok((tx, balance))
    }

    /// Merge the remote snapshot into the local inventory and return how many
    /// rows it carried.
    ///
    /// Materials absent from the snapshot keep their local balance. When the
    /// mirror is disabled or the fetch fails the local inventory is untouched
    /// and the cause comes back as [`LedgerError::Remote`].
    pub fn refresh_from_remote(&mut self) -> Result<usize, LedgerError> {
        let Some(mirror) = &self.mirror else {
            warn!("remote mirroring disabled, keeping local inventory");
            return Err(SyncError::Disabled.into());
        };

        let snapshot = mirror.fetch_inventory().inspect_err(|e| {
            warn!(error = %e, "remote refresh failed, keeping local inventory");
        })?;
        let touched = self.state.ledger.merge(snapshot);
        self.store.persist_inventory(self.state.ledger.get())?;
        info!(
            touched,
            materials = self.state.ledger.len(),
            "inventory refreshed from remote"
        );
        Ok(touched)
    }

    /// Whether replaying the whole transaction log reproduces the ledger.
    pub fn is_consistent(&self) -> Result<bool, LedgerError> {
        Ok(self.state.replayed_ledger()? == self.state.ledger)
    }

    fn mirror_rows(&mut self, sheet: &str, rows: Vec<serde_json::Value>) {
        let Some(mirror) = self.mirror.clone() else {
            warn!(sheet, "remote mirroring disabled, rows kept local");
            return;
        };
        // workers log their own failures
        for (done, res) in self.drain_sync_results() {
            debug!(sheet = %done, ok = res.is_ok(), "mirror write settled");
        }
        self.pending.push(SyncTicket::spawn(mirror, sheet, rows));
    }

    /// Results of mirror writes that have finished since the last call.
    pub fn drain_sync_results(&mut self) -> Vec<(String, Result<(), SyncError>)> {
        let mut done = Vec::new();
        self.pending.retain(|ticket| match ticket.try_result() {
            Some(res) => {
                done.push((ticket.sheet().to_string(), res));
                false
            }
            None => true,
        });
        done
    }

    pub fn pending_syncs(&self) -> usize {
        self.pending.len()
    }

    /// Flush the store and wait for every in-flight mirror write.
    pub fn flush(&mut self) -> Result<Vec<(String, Result<(), SyncError>)>, LedgerError> {
        self.store.flush()?;
        Ok(self
            .pending
            .drain(..)
            .map(|ticket| {
                let sheet = ticket.sheet().to_string();
                (sheet, ticket.wait())
            })
            .collect())
    }

    pub fn close(mut self) -> Result<(), LedgerError> {
        for (sheet, res) in self.flush()? {
            if let Err(e) = res {
                warn!(sheet = %sheet, error = %e, "mirror write lost on close");
            }
        }
        self.store.close()?;
        Ok(())
    }
}
