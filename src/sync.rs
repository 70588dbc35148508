//! Best-effort mirroring to a remote spreadsheet.
//!
//! Local state is authoritative. Every mirror write runs on its own thread and
//! reports through a [`SyncTicket`]; failures are logged there and never reach
//! the mutation that triggered them.
use super::catalog::Material;
use super::error::SyncError;
use super::ledger::InventoryItem;
use super::request::MaterialRequest;
use super::transaction::StockTransaction;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const REQUEST_SHEET: &str = "Solicitacoes";
pub const TRANSACTION_SHEET: &str = "Transacoes";

pub trait RemoteMirror: Send + Sync {
    /// Append rows to a named sheet.
    fn append(&self, sheet: &str, rows: Vec<Value>) -> Result<(), SyncError>;
    /// Full inventory snapshot held remotely.
    fn fetch_inventory(&self) -> Result<Vec<InventoryItem>, SyncError>;
}

#[derive(Serialize)]
struct AppendPayload<'a> {
    action: &'static str,
    sheet: &'a str,
    rows: Vec<Value>,
}

#[derive(Deserialize)]
struct RemoteItem {
    id: String,
    code: String,
    name: String,
    quantity: u64,
}

/// Mirror backed by a spreadsheet web app that accepts JSON posts.
pub struct SheetMirror {
    client: reqwest::blocking::Client,
    url: String,
}

impl SheetMirror {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl RemoteMirror for SheetMirror {
    fn append(&self, sheet: &str, rows: Vec<Value>) -> Result<(), SyncError> {
        let payload = AppendPayload {
            action: "append",
            sheet,
            rows,
        };
        let response = self.client.post(&self.url).json(&payload).send()?;
        if !response.status().is_success() {
            return Err(SyncError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    fn fetch_inventory(&self) -> Result<Vec<InventoryItem>, SyncError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("action", "inventory")])
            .send()?;
        if !response.status().is_success() {
            return Err(SyncError::Status(response.status().as_u16()));
        }
        let rows: Vec<RemoteItem> = response.json()?;
        if rows.is_empty() {
            return Err(SyncError::Decode("remote inventory snapshot is empty".into()));
        }
        Ok(rows
            .into_iter()
            .map(|r| InventoryItem::new(Material::new(r.id, r.code, r.name), r.quantity))
            .collect())
    }
}

/// Row for the request sheet: date, VTR, requester, items, status.
pub fn request_row(request: &MaterialRequest) -> Value {
    json!([
        request.date.to_pt_br(),
        request.vtr,
        request.requester_name,
        request.items_summary(),
        request.status.label(),
    ])
}

/// Row for the transaction sheet, ending with the balance after the movement.
pub fn transaction_row(tx: &StockTransaction, item: &InventoryItem) -> Value {
    json!([
        tx.date.to_pt_br(),
        item.code(),
        item.name(),
        tx.movement.as_str().to_uppercase(),
        tx.quantity,
        tx.reason,
        item.quantity,
    ])
}

/// Handle on one background mirror write.
pub struct SyncTicket {
    sheet: String,
    rx: Receiver<Result<(), SyncError>>,
}

impl SyncTicket {
    pub fn spawn(mirror: Arc<dyn RemoteMirror>, sheet: &str, rows: Vec<Value>) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let sheet_name = sheet.to_string();

        let spawned = std::thread::Builder::new()
            .name("stock-sync".into())
            .spawn(move || {
                let res = mirror.append(&sheet_name, rows);
                match &res {
                    Ok(()) => debug!(sheet = %sheet_name, "rows mirrored"),
                    Err(e) => warn!(sheet = %sheet_name, error = %e, "remote sync failed"),
                }
                let _ = tx.send(res);
            });

        if let Err(e) = spawned {
            // the sender went down with the closure, so the ticket reads as Dropped
            warn!(sheet, error = %e, "could not start sync worker");
        }

        Self {
            sheet: sheet.to_string(),
            rx,
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Non-blocking check. `None` while the write is still in flight.
    pub fn try_result(&self) -> Option<Result<(), SyncError>> {
        match self.rx.try_recv() {
            Ok(res) => Some(res),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(SyncError::Dropped)),
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<(), SyncError>> {
        match self.rx.recv_timeout(timeout) {
            Ok(res) => Some(res),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(SyncError::Dropped)),
        }
    }

    pub fn wait(self) -> Result<(), SyncError> {
        self.rx.recv().unwrap_or(Err(SyncError::Dropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestLine;
    use crate::types::{MovementType, TimeStamp};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        rows: Mutex<Vec<(String, Vec<Value>)>>,
        fail: bool,
    }

    impl RemoteMirror for Recorder {
        fn append(&self, sheet: &str, rows: Vec<Value>) -> Result<(), SyncError> {
            if self.fail {
                return Err(SyncError::Status(500));
            }
            self.rows.lock().unwrap().push((sheet.to_string(), rows));
            Ok(())
        }
        fn fetch_inventory(&self) -> Result<Vec<InventoryItem>, SyncError> {
            Ok(vec![])
        }
    }

    #[test]
    fn ticket_reports_success() {
        let recorder = Arc::new(Recorder::default());
        let ticket = SyncTicket::spawn(recorder.clone(), REQUEST_SHEET, vec![json!(["a"])]);
        assert_eq!(ticket.sheet(), REQUEST_SHEET);
        assert!(ticket.wait().is_ok());
        assert_eq!(recorder.rows.lock().unwrap()[0].0, REQUEST_SHEET);
    }

    #[test]
    fn ticket_reports_failure() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let ticket = SyncTicket::spawn(recorder, TRANSACTION_SHEET, vec![]);
        let res = ticket.wait_timeout(Duration::from_secs(5));
        assert!(matches!(res, Some(Err(SyncError::Status(500)))));
    }

    #[test]
    fn row_shapes() {
        let mut request = MaterialRequest::new(
            "1",
            "12",
            "Ana",
            vec![RequestLine::new("m1", "Luva", 4)],
        );
        request.date = TimeStamp::new_with(2024, 1, 2, 3, 4, 5);
        assert_eq!(
            request_row(&request),
            json!(["02/01/2024, 03:04:05", "12", "Ana", "Luva (x4)", "Pendente"])
        );

        let item = InventoryItem::new(Material::new("m1", "001", "Luva"), 6);
        let tx = StockTransaction::new(
            "t".into(),
            "m1".into(),
            MovementType::Saida,
            4,
            "Atendimento VTR 12".into(),
            TimeStamp::new_with(2024, 1, 2, 3, 4, 5),
        )
        .unwrap();
        assert_eq!(
            transaction_row(&tx, &item),
            json!(["02/01/2024, 03:04:05", "001", "Luva", "SAIDA", 4, "Atendimento VTR 12", 6])
        );
    }
}
