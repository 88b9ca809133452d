//! # Stock Core
//!
//! 庫存異動帳與庫存警示的核心資料模型與類型定義

pub mod actor;
pub mod alert;
pub mod clock;
pub mod config;
pub mod material;
pub mod operation;
pub mod query;
pub mod stock;

use rust_decimal::Decimal;

// Re-export 主要類型
pub use actor::{Actor, Role};
pub use alert::{AlertStatus, AlertType, StockAlertRule, StockAlertState};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{LedgerConfig, NegativeStockPolicy};
pub use material::MaterialProfile;
pub use operation::{
    MaterialOperation, NewMaterialOperation, OperationAmendment, OperationDraft, OperationId,
    OperationType, ScopeVersion, StockScope,
};
pub use query::OperationQuery;
pub use stock::MaterialStockState;

/// 庫存錯誤類型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StockError {
    #[error("驗證失敗: {0}")]
    Validation(String),

    #[error("庫存不足：套用操作 {operation_id} 後結存為 {balance}")]
    NegativeBalance {
        operation_id: OperationId,
        balance: Decimal,
    },

    #[error("並發寫入衝突 ({scope})：預期版本 {expected}，實際為 {actual}")]
    Conflict {
        scope: StockScope,
        expected: ScopeVersion,
        actual: ScopeVersion,
    },

    #[error("警示規則配置錯誤: {0}")]
    Configuration(String),

    #[error("權限不足: {0}")]
    Unauthorized(String),

    #[error("找不到資料: {0}")]
    NotFound(String),

    #[error("儲存層錯誤: {0}")]
    Storage(String),
}

impl StockError {
    /// 是否為呼叫端可重試的錯誤（重新讀取資料後再送出）
    pub fn is_retryable(&self) -> bool {
        matches!(self, StockError::Conflict { .. })
    }

    /// 是否為操作被拒絕（輸入或庫存規則），而非系統錯誤
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            StockError::Validation(_) | StockError::NegativeBalance { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StockError>;
