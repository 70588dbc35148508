//! Fulfillment engine: the rules that move stock between requests, the
//! transaction log and the inventory ledger.
//!
//! A request is fulfilled all-or-nothing. Every line is checked against the
//! ledger before any debit is emitted, so a multi-item request never ends up
//! half served. Direct admin adjustments take the other path and simply clamp
//! outbound movements at zero.
use super::error::{LedgerError, Shortage};
use super::ledger::InventoryLedger;
use super::request::{MaterialRequest, RequestQueue};
use super::transaction::{StockTransaction, TransactionLog};
use super::types::{MovementType, RequestStatus, TimeStamp};
use super::utils::request_debit_id;
use chrono::Utc;
use tracing::{info, warn};

/// Result of a status change that was accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    /// Request moved to `Atendido`; carries the debits that were emitted.
    Fulfilled {
        request: MaterialRequest,
        transactions: Vec<StockTransaction>,
    },
    /// Request moved to `Não Atendido`. No stock moved.
    Denied { request: MaterialRequest },
    /// Request was already in the target terminal state.
    Unchanged { status: RequestStatus },
}

impl StatusChange {
    pub fn transactions(&self) -> &[StockTransaction] {
        match self {
            StatusChange::Fulfilled { transactions, .. } => transactions,
            _ => &[],
        }
    }
    pub fn request(&self) -> Option<&MaterialRequest> {
        match self {
            StatusChange::Fulfilled { request, .. } | StatusChange::Denied { request } => {
                Some(request)
            }
            StatusChange::Unchanged { .. } => None,
        }
    }
}

/// The whole mutable state the engine works on.
#[derive(Debug, Default, Clone)]
pub struct StockState {
    pub ledger: InventoryLedger,
    pub log: TransactionLog,
    pub queue: RequestQueue,
}

impl StockState {
    pub fn new(ledger: InventoryLedger, log: TransactionLog, queue: RequestQueue) -> Self {
        Self { ledger, log, queue }
    }

    /// Validate and enqueue a submission as `Pendente`.
    pub fn submit(&mut self, request: MaterialRequest) -> Result<&MaterialRequest, LedgerError> {
        request.validate()?;
        if self.queue.find_by_id(&request.id).is_some() {
            return Err(LedgerError::InvalidRequest(format!(
                "request {} already submitted",
                request.id
            )));
        }
        let id = request.id.clone();
        self.queue.submit(request);
        self.queue
            .find_by_id(&id)
            .ok_or(LedgerError::NotFound(id))
    }

    /// Lines of a request the current stock cannot cover. Lines already
    /// debited by an earlier attempt are not counted.
    pub fn shortages(&self, request_id: &str) -> Result<Vec<Shortage>, LedgerError> {
        let request = self
            .queue
            .find_by_id(request_id)
            .ok_or_else(|| LedgerError::NotFound(request_id.to_string()))?;
        Ok(self.collect_shortages(request))
    }

    fn collect_shortages(&self, request: &MaterialRequest) -> Vec<Shortage> {
        request
            .items
            .iter()
            .filter(|line| {
                !self
                    .log
                    .contains(&request_debit_id(&request.id, &line.material_id))
            })
            .filter_map(|line| {
                let available = self.ledger.quantity(&line.material_id).unwrap_or(0);
                (available < line.quantity).then(|| Shortage {
                    material_id: line.material_id.clone(),
                    requested: line.quantity,
                    available,
                })
            })
            .collect()
    }

    /// Apply a status transition to a request.
    ///
    /// Only `Pendente` requests move. Asking for the state a terminal request
    /// already has is a no-op, which is what keeps a second approval from
    /// debiting stock twice.
    pub fn set_status(
        &mut self,
        request_id: &str,
        new_status: RequestStatus,
    ) -> Result<StatusChange, LedgerError> {
        let current = self
            .queue
            .find_by_id(request_id)
            .ok_or_else(|| LedgerError::NotFound(request_id.to_string()))?
            .status;

        match (current, new_status) {
            (from, to) if from == to && from.is_terminal() => {
                Ok(StatusChange::Unchanged { status: from })
            }
            (RequestStatus::Pendente, RequestStatus::Atendido) => self.fulfil(request_id),
            (RequestStatus::Pendente, RequestStatus::NaoAtendido) => self.deny(request_id),
            (from, to) => Err(LedgerError::InvalidTransition { from, to }),
        }
    }

    fn fulfil(&mut self, request_id: &str) -> Result<StatusChange, LedgerError> {
        let request = self
            .queue
            .find_by_id(request_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(request_id.to_string()))?;

        let shortages = self.collect_shortages(&request);
        if !shortages.is_empty() {
            warn!(
                request_id,
                vtr = %request.vtr,
                short_lines = shortages.len(),
                "fulfilment rejected, insufficient stock"
            );
            return Err(LedgerError::InsufficientStock {
                request_id: request_id.to_string(),
                shortages,
            });
        }

        let now = TimeStamp::new();
        let reason = format!("Atendimento VTR {}", request.vtr);
        let mut transactions = Vec::with_capacity(request.items.len());

        for line in &request.items {
            let tx_id = request_debit_id(&request.id, &line.material_id);
            if self.log.contains(&tx_id) {
                continue;
            }
            let tx = StockTransaction::new(
                tx_id,
                line.material_id.clone(),
                MovementType::Saida,
                line.quantity,
                reason.clone(),
                now.clone(),
            )?;
            self.ledger.apply(&tx)?;
            self.log.append(tx.clone());
            transactions.push(tx);
        }

        let request = self.mark(request_id, RequestStatus::Atendido)?;
        info!(request_id, debits = transactions.len(), "request fulfilled");

        Ok(StatusChange::Fulfilled {
            request,
            transactions,
        })
    }

    fn deny(&mut self, request_id: &str) -> Result<StatusChange, LedgerError> {
        let request = self.mark(request_id, RequestStatus::NaoAtendido)?;
        info!(request_id, "request denied");
        Ok(StatusChange::Denied { request })
    }

    fn mark(
        &mut self,
        request_id: &str,
        status: RequestStatus,
    ) -> Result<MaterialRequest, LedgerError> {
        let request = self
            .queue
            .find_mut(request_id)
            .ok_or_else(|| LedgerError::NotFound(request_id.to_string()))?;
        request.status = status;
        Ok(request.clone())
    }

    /// Direct admin movement. Outbound quantities larger than the balance
    /// clamp it to zero instead of failing.
    pub fn adjust_stock(
        &mut self,
        tx_id: String,
        material_id: &str,
        movement: MovementType,
        quantity: u64,
        reason: &str,
    ) -> Result<(StockTransaction, u64), LedgerError> {
        if self.ledger.item(material_id).is_none() {
            return Err(LedgerError::MaterialNotFound(material_id.to_string()));
        }
        let tx = StockTransaction::new(
            tx_id,
            material_id.to_string(),
            movement,
            quantity,
            reason.to_string(),
            TimeStamp::<Utc>::new(),
        )?;
        let balance = self.ledger.apply(&tx)?;
        self.log.append(tx.clone());
        info!(material_id, %movement, quantity, balance, "stock adjusted");
        Ok((tx, balance))
    }

    /// Ledger rebuilt from a zero baseline by replaying the whole log.
    pub fn replayed_ledger(&self) -> Result<InventoryLedger, LedgerError> {
        InventoryLedger::replay(
            self.ledger.get().iter().map(|item| item.material.clone()),
            self.log.oldest_first(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Material;
    use crate::request::RequestLine;

    fn state(stock: &[(&str, u64)]) -> StockState {
        let mut state = StockState::new(
            InventoryLedger::seeded(
                stock
                    .iter()
                    .map(|(id, _)| Material::new(*id, "000", format!("Material {id}"))),
            ),
            TransactionLog::new(),
            RequestQueue::new(),
        );
        for (id, qty) in stock {
            if *qty > 0 {
                state
                    .adjust_stock(format!("seed-{id}"), id, MovementType::Entrada, *qty, "seed")
                    .unwrap();
            }
        }
        state
    }

    fn request(id: &str, lines: &[(&str, u64)]) -> MaterialRequest {
        MaterialRequest::new(
            id,
            "12",
            "Ana",
            lines
                .iter()
                .map(|(m, q)| RequestLine::new(*m, format!("Material {m}"), *q))
                .collect(),
        )
    }

    #[test]
    fn fulfil_debits_every_line() {
        let mut state = state(&[("A", 5), ("B", 3)]);
        state.submit(request("r1", &[("A", 5), ("B", 3)])).unwrap();

        let change = state.set_status("r1", RequestStatus::Atendido).unwrap();
        assert_eq!(change.transactions().len(), 2);
        assert_eq!(state.ledger.quantity("A"), Some(0));
        assert_eq!(state.ledger.quantity("B"), Some(0));
        assert_eq!(
            state.queue.find_by_id("r1").unwrap().status,
            RequestStatus::Atendido
        );
        let tx = &change.transactions()[0];
        assert_eq!(tx.id, "req-out-r1-A");
        assert_eq!(tx.reason, "Atendimento VTR 12");
        assert_eq!(tx.movement, MovementType::Saida);
    }

    #[test]
    fn shortage_on_any_line_rejects_whole_request() {
        let mut state = state(&[("A", 5), ("B", 2)]);
        state.submit(request("r1", &[("A", 5), ("B", 3)])).unwrap();
        let log_before = state.log.len();

        let err = state.set_status("r1", RequestStatus::Atendido).unwrap_err();
        match err {
            LedgerError::InsufficientStock { shortages, .. } => {
                assert_eq!(
                    shortages,
                    vec![Shortage {
                        material_id: "B".into(),
                        requested: 3,
                        available: 2
                    }]
                );
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(state.ledger.quantity("A"), Some(5));
        assert_eq!(state.log.len(), log_before);
        assert_eq!(
            state.queue.find_by_id("r1").unwrap().status,
            RequestStatus::Pendente
        );
    }

    #[test]
    fn second_approval_is_a_noop() {
        let mut state = state(&[("A", 10)]);
        state.submit(request("r1", &[("A", 4)])).unwrap();

        state.set_status("r1", RequestStatus::Atendido).unwrap();
        let again = state.set_status("r1", RequestStatus::Atendido).unwrap();

        assert_eq!(
            again,
            StatusChange::Unchanged {
                status: RequestStatus::Atendido
            }
        );
        assert_eq!(state.ledger.quantity("A"), Some(6));
    }

    #[test]
    fn deny_leaves_stock_alone() {
        let mut state = state(&[("A", 1)]);
        state.submit(request("r1", &[("A", 40)])).unwrap();
        let change = state.set_status("r1", RequestStatus::NaoAtendido).unwrap();
        assert!(change.transactions().is_empty());
        assert_eq!(state.ledger.quantity("A"), Some(1));
    }

    #[test]
    fn terminal_requests_do_not_reopen() {
        let mut state = state(&[("A", 10)]);
        state.submit(request("r1", &[("A", 1)])).unwrap();
        state.set_status("r1", RequestStatus::NaoAtendido).unwrap();

        assert!(matches!(
            state.set_status("r1", RequestStatus::Atendido),
            Err(LedgerError::InvalidTransition { .. })
        ));
        assert!(matches!(
            state.set_status("r1", RequestStatus::Pendente),
            Err(LedgerError::InvalidTransition { .. })
        ));
        assert_eq!(state.ledger.quantity("A"), Some(10));
    }

    #[test]
    fn unknown_request_is_not_found() {
        let mut state = state(&[("A", 10)]);
        assert!(matches!(
            state.set_status("nope", RequestStatus::Atendido),
            Err(LedgerError::NotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn unknown_material_counts_as_shortage() {
        let mut state = state(&[("A", 10)]);
        state.submit(request("r1", &[("ghost", 1)])).unwrap();
        let shortages = state.shortages("r1").unwrap();
        assert_eq!(shortages[0].available, 0);
        assert!(state.set_status("r1", RequestStatus::Atendido).is_err());
    }

    #[test]
    fn retry_skips_lines_already_debited() {
        let mut state = state(&[("A", 10), ("B", 10)]);
        state.submit(request("r1", &[("A", 4), ("B", 4)])).unwrap();

        // a previous attempt got as far as debiting A before stopping
        let partial = StockTransaction::new(
            request_debit_id("r1", "A"),
            "A".into(),
            MovementType::Saida,
            4,
            "Atendimento VTR 12".into(),
            TimeStamp::new(),
        )
        .unwrap();
        state.ledger.apply(&partial).unwrap();
        state.log.append(partial);

        let change = state.set_status("r1", RequestStatus::Atendido).unwrap();
        assert_eq!(change.transactions().len(), 1);
        assert_eq!(state.ledger.quantity("A"), Some(6));
        assert_eq!(state.ledger.quantity("B"), Some(6));
    }

    #[test]
    fn admin_adjustment_clamps_and_checks_material() {
        let mut state = state(&[("A", 10)]);
        let (_, balance) = state
            .adjust_stock("t1".into(), "A", MovementType::Entrada, 20, "Entrada de Estoque")
            .unwrap();
        assert_eq!(balance, 30);
        let (_, balance) = state
            .adjust_stock("t2".into(), "A", MovementType::Saida, 50, "Baixa")
            .unwrap();
        assert_eq!(balance, 0);

        assert!(matches!(
            state.adjust_stock("t3".into(), "Z", MovementType::Entrada, 1, "x"),
            Err(LedgerError::MaterialNotFound(_))
        ));
        assert!(matches!(
            state.adjust_stock("t4".into(), "A", MovementType::Entrada, 0, "x"),
            Err(LedgerError::InvalidQuantity)
        ));
        assert_eq!(state.replayed_ledger().unwrap(), state.ledger);
    }

    #[test]
    fn duplicate_submission_is_rejected() {
        let mut state = state(&[("A", 10)]);
        state.submit(request("r1", &[("A", 1)])).unwrap();
        assert!(state.submit(request("r1", &[("A", 1)])).is_err());
        assert!(state.submit(request("r2", &[("A", 1), ("A", 2)])).is_err());
    }
}
