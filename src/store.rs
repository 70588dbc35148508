//! Durable local storage for inventory, requests and transactions.
//!
//! [`StockStore`] is the seam the service depends on; [`SledStore`] keeps
//! everything in one sled tree as CBOR records. Requests and transactions are
//! keyed by id, with a sequence-keyed index beside them so lists come back
//! newest first.
use super::catalog::Material;
use super::error::StoreError;
use super::ledger::InventoryItem;
use super::request::MaterialRequest;
use super::transaction::StockTransaction;
use sled::{Batch, Db};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const INVENTORY_KEY: &[u8] = b"inventory";
const REQUEST_PREFIX: &[u8] = b"req/";
const REQUEST_SEQ_PREFIX: &[u8] = b"reqseq/";
const TX_PREFIX: &[u8] = b"tx/";
const TX_SEQ_PREFIX: &[u8] = b"txseq/";

pub trait StockStore {
    /// Current inventory. An empty store is seeded with every catalog material at zero.
    fn load_inventory(&self, catalog: &[Material]) -> Result<Vec<InventoryItem>, StoreError>;
    /// Requests, newest first.
    fn load_requests(&self) -> Result<Vec<MaterialRequest>, StoreError>;
    /// Transactions, newest first.
    fn load_transactions(&self) -> Result<Vec<StockTransaction>, StoreError>;
    fn persist_inventory(&self, items: &[InventoryItem]) -> Result<(), StoreError>;
    /// Insert or update. An updated request keeps its place in the order.
    fn persist_request(&self, request: &MaterialRequest) -> Result<(), StoreError>;
    /// Append a transaction. Returns `false` when the id was already stored.
    fn persist_transaction(&self, tx: &StockTransaction) -> Result<bool, StoreError>;
    fn flush(&self) -> Result<(), StoreError>;
    fn close(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

pub struct SledStore {
    instance: Arc<sled::Db>,
}

fn key(prefix: &[u8], id: &str) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.extend_from_slice(id.as_bytes());
    key
}

fn seq_key(prefix: &[u8], seq: u64) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self::from_db(Arc::new(db)))
    }

    /// Throwaway database, removed when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self::from_db(Arc::new(db)))
    }

    pub fn from_db(instance: Arc<Db>) -> Self {
        Self { instance }
    }

    fn append_indexed(
        &self,
        record_key: Vec<u8>,
        seq_prefix: &[u8],
        id: &str,
        record: Vec<u8>,
    ) -> Result<(), StoreError> {
        let seq = self.instance.generate_id()?;
        let mut batch = Batch::default();
        batch.insert(record_key, record);
        batch.insert(seq_key(seq_prefix, seq), id.as_bytes());
        self.instance.apply_batch(batch)?;
        Ok(())
    }

    /// Walk a sequence index backwards and decode each referenced record.
    fn load_indexed<T>(&self, seq_prefix: &[u8], record_prefix: &[u8]) -> Result<Vec<T>, StoreError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        let mut out = Vec::new();
        for entry in self.instance.scan_prefix(seq_prefix).rev() {
            let (seq, id) = entry?;
            let id = String::from_utf8(id.to_vec())
                .map_err(|_| StoreError::Corrupt(String::from_utf8_lossy(&seq).into_owned()))?;
            let record_key = key(record_prefix, &id);
            let bytes = self
                .instance
                .get(&record_key)?
                .ok_or_else(|| StoreError::Corrupt(String::from_utf8_lossy(&record_key).into_owned()))?;
            out.push(minicbor::decode(&bytes)?);
        }
        Ok(out)
    }
}

impl StockStore for SledStore {
    fn load_inventory(&self, catalog: &[Material]) -> Result<Vec<InventoryItem>, StoreError> {
        if let Some(bytes) = self.instance.get(INVENTORY_KEY)? {
            let items: Vec<InventoryItem> = minicbor::decode(&bytes)?;
            if !items.is_empty() {
                return Ok(items);
            }
        }
        let seeded: Vec<InventoryItem> = catalog
            .iter()
            .cloned()
            .map(|m| InventoryItem::new(m, 0))
            .collect();
        debug!(materials = seeded.len(), "seeding inventory from catalog");
        self.persist_inventory(&seeded)?;
        Ok(seeded)
    }

    fn load_requests(&self) -> Result<Vec<MaterialRequest>, StoreError> {
        self.load_indexed(REQUEST_SEQ_PREFIX, REQUEST_PREFIX)
    }

    fn load_transactions(&self) -> Result<Vec<StockTransaction>, StoreError> {
        self.load_indexed(TX_SEQ_PREFIX, TX_PREFIX)
    }

    fn persist_inventory(&self, items: &[InventoryItem]) -> Result<(), StoreError> {
        self.instance.insert(INVENTORY_KEY, minicbor::to_vec(items)?)?;
        Ok(())
    }

    fn persist_request(&self, request: &MaterialRequest) -> Result<(), StoreError> {
        let record_key = key(REQUEST_PREFIX, &request.id);
        let record = minicbor::to_vec(request)?;

        if self.instance.contains_key(&record_key)? {
            self.instance.insert(record_key, record)?;
        } else {
            self.append_indexed(record_key, REQUEST_SEQ_PREFIX, &request.id, record)?;
        }
        debug!(request_id = %request.id, status = %request.status, "request persisted");
        Ok(())
    }

    fn persist_transaction(&self, tx: &StockTransaction) -> Result<bool, StoreError> {
        let record_key = key(TX_PREFIX, &tx.id);
        if self.instance.contains_key(&record_key)? {
            debug!(tx_id = %tx.id, "transaction already stored");
            return Ok(false);
        }
        self.append_indexed(record_key, TX_SEQ_PREFIX, &tx.id, minicbor::to_vec(tx)?)?;
        debug!(tx_id = %tx.id, "transaction persisted");
        Ok(true)
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.instance.flush()?;
        Ok(())
    }

    fn close(self) -> Result<(), StoreError> {
        self.flush()
    }
}
