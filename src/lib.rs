//! # Stock Ledger
//!
//! 工地物料異動帳與庫存警示引擎。
//!
//! - [`core`]：資料模型、錯誤、配置與時鐘
//! - [`calc`]：數量帳、操作驗證、警示評估與對帳
//! - [`service`]：儲存介面與庫存服務

pub use stock_calc as calc;
pub use stock_core as core;
pub use stock_service as service;

pub use stock_calc::{AlertTransition, TransitionKind};
pub use stock_core::{
    Actor, AlertType, LedgerConfig, MaterialProfile, NewMaterialOperation, OperationQuery,
    OperationType, Result, StockAlertRule, StockError, StockScope,
};
pub use stock_service::{RecordOutcome, StockService};
