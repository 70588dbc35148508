//! Inventory ledger: the current on-hand balance per material.
//!
//! Balances only move through [`InventoryLedger::apply_delta`]. An outbound
//! movement floors the balance at zero; rejecting an over-withdrawal is the
//! caller's job (see [`crate::fulfillment`]).
use super::catalog::Material;
use super::error::LedgerError;
use super::transaction::StockTransaction;
use super::types::MovementType;

/// Maximum number of materials offered when a crew searches for something to request.
pub const REQUESTABLE_LIMIT: usize = 20;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    #[n(0)]
    pub material: Material,
    #[n(1)]
    pub quantity: u64,
}

impl InventoryItem {
    pub fn new(material: Material, quantity: u64) -> Self {
        Self { material, quantity }
    }
    pub fn id(&self) -> &str {
        &self.material.id
    }
    pub fn code(&self) -> &str {
        &self.material.code
    }
    pub fn name(&self) -> &str {
        &self.material.name
    }
    fn matches(&self, term: &str) -> bool {
        term.is_empty()
            || self.material.name.to_lowercase().contains(&term.to_lowercase())
            || self.material.code.contains(term)
    }
}

/// One row per material id, in catalog order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InventoryLedger {
    items: Vec<InventoryItem>,
}

impl InventoryLedger {
    /// Every material at quantity zero.
    pub fn seeded<I: IntoIterator<Item = Material>>(materials: I) -> Self {
        Self::from_items(materials.into_iter().map(|m| InventoryItem::new(m, 0)))
    }

    /// Build from stored rows. A repeated material id keeps its first row.
    pub fn from_items<I: IntoIterator<Item = InventoryItem>>(items: I) -> Self {
        let mut ledger = Self::default();
        for item in items {
            if ledger.item(item.id()).is_none() {
                ledger.items.push(item);
            }
        }
        ledger
    }

    /// Fold a chronological movement history onto a zero baseline.
    pub fn replay<'a, M, T>(materials: M, transactions: T) -> Result<Self, LedgerError>
    where
        M: IntoIterator<Item = Material>,
        T: IntoIterator<Item = &'a StockTransaction>,
    {
        let mut ledger = Self::seeded(materials);
        for tx in transactions {
            ledger.apply(tx)?;
        }
        Ok(ledger)
    }

    pub fn get(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn item(&self, material_id: &str) -> Option<&InventoryItem> {
        self.items.iter().find(|i| i.id() == material_id)
    }

    pub fn quantity(&self, material_id: &str) -> Option<u64> {
        self.item(material_id).map(|i| i.quantity)
    }

    /// Move stock for one material and return the new balance.
    pub fn apply_delta(
        &mut self,
        material_id: &str,
        movement: MovementType,
        quantity: u64,
    ) -> Result<u64, LedgerError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.material.id == material_id)
            .ok_or_else(|| LedgerError::MaterialNotFound(material_id.to_string()))?;

        item.quantity = match movement {
            MovementType::Entrada => item.quantity.saturating_add(quantity),
            MovementType::Saida => item.quantity.saturating_sub(quantity),
        };
        Ok(item.quantity)
    }

    pub fn apply(&mut self, tx: &StockTransaction) -> Result<u64, LedgerError> {
        self.apply_delta(&tx.material_id, tx.movement, tx.quantity)
    }

    /// Overlay a remote snapshot. Known ids take the snapshot balance, unknown
    /// ids are appended, and rows the snapshot omits are left as they are.
    /// Returns how many rows the snapshot touched.
    pub fn merge<I: IntoIterator<Item = InventoryItem>>(&mut self, snapshot: I) -> usize {
        let mut touched = 0;
        for incoming in snapshot {
            match self.items.iter_mut().find(|i| i.id() == incoming.id()) {
                Some(item) => item.quantity = incoming.quantity,
                None => self.items.push(incoming),
            }
            touched += 1;
        }
        touched
    }

    /// Case-insensitive name match or code substring match. An empty term matches everything.
    pub fn search(&self, term: &str) -> Vec<&InventoryItem> {
        self.items.iter().filter(|i| i.matches(term)).collect()
    }

    /// Materials a crew may pick: in stock and matching the term, capped at [`REQUESTABLE_LIMIT`].
    pub fn requestable(&self, term: &str) -> Vec<&InventoryItem> {
        self.items
            .iter()
            .filter(|i| i.quantity > 0 && i.matches(term))
            .take(REQUESTABLE_LIMIT)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
