//! # Stock Service
//!
//! 庫存服務層：記錄異動、修改與刪除、警示檢查與規則維護。
//! 儲存層與物料目錄透過 trait 注入。

pub mod dirty_tracking;
pub mod memory;
pub mod service;
pub mod store;

// Re-export 主要類型
pub use dirty_tracking::DirtyTracker;
pub use memory::{MemoryAlertRuleStore, MemoryCatalog, MemoryOperationStore};
pub use service::{AuditRecord, RecordOutcome, StockService};
pub use store::{AlertRuleStore, MaterialCatalog, OperationStore};
