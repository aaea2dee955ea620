//! Remote capabilities the saga calls, with ledger-backed and mock implementations.

pub mod inventory;
pub mod payment;

pub use inventory::{InventoryService, LedgerInventory};
pub use payment::{ChargeRequest, MockPaymentGateway, PaymentReceipt, PaymentService};
