//! Append-only record of stock movements
use super::error::LedgerError;
use super::types::{MovementType, TimeStamp};
use chrono::Utc;
use std::collections::VecDeque;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct StockTransaction {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub material_id: String,
    #[n(2)]
    pub movement: MovementType,
    #[n(3)]
    pub quantity: u64, // always > 0
    #[n(4)]
    pub date: TimeStamp<Utc>,
    #[n(5)]
    pub reason: String,
}

impl StockTransaction {
    pub fn new(
        id: String,
        material_id: String,
        movement: MovementType,
        quantity: u64,
        reason: String,
        date: TimeStamp<Utc>,
    ) -> Result<Self, LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::InvalidQuantity);
        }
        Ok(Self {
            id,
            material_id,
            movement,
            quantity,
            date,
            reason,
        })
    }
}

/// In-memory view of the movement history, newest entry first.
#[derive(Debug, Default, Clone)]
pub struct TransactionLog {
    entries: VecDeque<StockTransaction>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list already ordered newest first, as the store returns it.
    pub fn from_newest_first(entries: Vec<StockTransaction>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// Record a movement. No validation happens here; callers check stock first.
    pub fn append(&mut self, tx: StockTransaction) {
        self.entries.push_front(tx);
    }

    pub fn list(&self) -> impl Iterator<Item = &StockTransaction> {
        self.entries.iter()
    }

    /// Chronological order, for replaying onto a ledger.
    pub fn oldest_first(&self) -> impl Iterator<Item = &StockTransaction> {
        self.entries.iter().rev()
    }

    pub fn contains(&self, tx_id: &str) -> bool {
        self.entries.iter().any(|tx| tx.id == tx_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str, movement: MovementType, quantity: u64) -> StockTransaction {
        StockTransaction::new(
            id.into(),
            "m1".into(),
            movement,
            quantity,
            "test".into(),
            TimeStamp::new(),
        )
        .unwrap()
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let res = StockTransaction::new(
            "t".into(),
            "m1".into(),
            MovementType::Entrada,
            0,
            "x".into(),
            TimeStamp::new(),
        );
        assert!(matches!(res, Err(LedgerError::InvalidQuantity)));
    }

    #[test]
    fn list_is_newest_first() {
        let mut log = TransactionLog::new();
        log.append(tx("a", MovementType::Entrada, 5));
        log.append(tx("b", MovementType::Saida, 2));

        let ids: Vec<_> = log.list().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let ids: Vec<_> = log.oldest_first().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(log.contains("a"));
        assert!(!log.contains("c"));
    }

    #[test]
    fn cbor_roundtrip_keeps_all_fields() {
        let original = tx("a", MovementType::Saida, 3);
        let encoded = minicbor::to_vec(&original).unwrap();
        let decoded: StockTransaction = minicbor::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }
}
