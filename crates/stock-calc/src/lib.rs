//! # Stock Calculation Engine
//!
//! 庫存異動帳、操作驗證、警示評估與警示狀態對帳。
//! 全部為純函數，不做 I/O，也不讀取系統時間。

pub mod evaluator;
pub mod ledger;
pub mod reconciler;
pub mod rules;
pub mod stats;
pub mod validator;

use chrono::{DateTime, Utc};
use stock_core::{MaterialStockState, StockAlertRule, StockAlertState};

// Re-export 主要類型
pub use evaluator::{AlertEvaluator, TriggeredAlert};
pub use ledger::{compute_quantity, compute_quantity_as_of, Ledger, LedgerResult, RunningBalance};
pub use reconciler::{AlertReconciler, AlertTransition, TransitionKind};
pub use rules::rules_for_project;
pub use stats::{OperationStats, TypeTotals};
pub use validator::{LedgerSnapshot, OperationValidator, ValidatedOperation, ValidationContext};

/// 單一物料的警示檢查結果
#[derive(Debug, Clone)]
pub struct AlertCheckResult {
    /// 物料ID
    pub material_id: String,

    /// 本次觸發中的警示
    pub triggered: Vec<TriggeredAlert>,

    /// 狀態轉換（需保存）
    pub transitions: Vec<AlertTransition>,
}

impl AlertCheckResult {
    /// 是否有觸發中的警示
    pub fn has_triggered(&self) -> bool {
        !self.triggered.is_empty()
    }

    /// 新觸發（需要通知）的警示
    pub fn fired(&self) -> impl Iterator<Item = &AlertTransition> {
        self.transitions.iter().filter(|t| t.is_fire())
    }

    /// 解除的警示
    pub fn cleared(&self) -> impl Iterator<Item = &AlertTransition> {
        self.transitions.iter().filter(|t| t.is_clear())
    }
}

/// 評估 + 對帳
pub fn check_material(
    state: &MaterialStockState,
    rules: &[StockAlertRule],
    previous: &[StockAlertState],
    now: DateTime<Utc>,
) -> AlertCheckResult {
    let triggered = AlertEvaluator::evaluate(state, rules, now);
    let transitions = AlertReconciler::reconcile(previous, &triggered, now);

    AlertCheckResult {
        material_id: state.material_id.clone(),
        triggered,
        transitions,
    }
}
