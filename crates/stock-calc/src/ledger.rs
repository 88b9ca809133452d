//! 數量帳：將異動操作轉為現有庫存與逐筆結存

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use stock_core::{
    MaterialOperation, MaterialStockState, NegativeStockPolicy, OperationId, OperationType,
    StockError, StockScope,
};

/// 逐筆結存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningBalance {
    /// 操作ID
    pub operation_id: OperationId,
    /// 操作類型
    pub operation_type: OperationType,
    /// 增減量
    pub delta: Decimal,
    /// 套用後結存
    pub balance_after: Decimal,
    /// 發生時間
    pub occurred_at: DateTime<Utc>,
}

/// 數量帳計算結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerResult {
    /// 最終庫存
    pub quantity: Decimal,
    /// 逐筆結存（依套用順序）
    pub history: Vec<RunningBalance>,
    /// 第一個負結存點（僅在允許負庫存時出現）
    pub first_negative: Option<RunningBalance>,
}

impl LedgerResult {
    pub fn empty() -> Self {
        Self {
            quantity: Decimal::ZERO,
            history: Vec::new(),
            first_negative: None,
        }
    }

    /// 最後套用的操作
    pub fn last_operation_id(&self) -> Option<OperationId> {
        self.history.last().map(|entry| entry.operation_id)
    }

    /// 指定操作套用後的結存
    pub fn balance_after(&self, operation_id: OperationId) -> Option<Decimal> {
        self.history
            .iter()
            .find(|entry| entry.operation_id == operation_id)
            .map(|entry| entry.balance_after)
    }

    /// 轉為庫存狀態
    pub fn to_stock_state(&self, scope: &StockScope, at: DateTime<Utc>) -> MaterialStockState {
        MaterialStockState::new(scope, self.quantity, self.last_operation_id(), at)
    }
}

/// 數量帳計算器
#[derive(Debug, Clone, Copy, Default)]
pub struct Ledger {
    policy: NegativeStockPolicy,
}

impl Ledger {
    /// 預設拒絕負結存
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: NegativeStockPolicy) -> Self {
        Self { policy }
    }

    /// 計算單一範圍的庫存
    ///
    /// 依發生時間排序，同時間以操作ID（寫入順序）決定先後；
    /// 被取代的操作不計入。
    pub fn compute(&self, operations: &[MaterialOperation]) -> stock_core::Result<LedgerResult> {
        ensure_single_scope(operations)?;

        let effective = effective_operations(operations);
        let mut result = LedgerResult::empty();
        let mut balance = Decimal::ZERO;

        for op in effective {
            let delta = op.delta();
            balance += delta;

            let entry = RunningBalance {
                operation_id: op.id,
                operation_type: op.operation_type,
                delta,
                balance_after: balance,
                occurred_at: op.occurred_at,
            };

            if balance < Decimal::ZERO {
                match self.policy {
                    NegativeStockPolicy::Reject => {
                        return Err(StockError::NegativeBalance {
                            operation_id: op.id,
                            balance,
                        });
                    }
                    NegativeStockPolicy::Allow => {
                        if result.first_negative.is_none() {
                            tracing::debug!("操作 {} 後結存為負: {}", op.id, balance);
                            result.first_negative = Some(entry.clone());
                        }
                    }
                }
            }

            result.history.push(entry);
        }

        result.quantity = balance;
        Ok(result)
    }

    /// 只計入 `occurred_at <= now` 的操作
    pub fn compute_as_of(
        &self,
        operations: &[MaterialOperation],
        now: DateTime<Utc>,
    ) -> stock_core::Result<LedgerResult> {
        let past: Vec<MaterialOperation> = operations
            .iter()
            .filter(|op| op.occurred_at <= now)
            .cloned()
            .collect();
        self.compute(&past)
    }
}

/// 計算庫存（負結存視為錯誤）
pub fn compute_quantity(operations: &[MaterialOperation]) -> stock_core::Result<LedgerResult> {
    Ledger::new().compute(operations)
}

/// 計算截至 `now` 的庫存（負結存視為錯誤）
pub fn compute_quantity_as_of(
    operations: &[MaterialOperation],
    now: DateTime<Utc>,
) -> stock_core::Result<LedgerResult> {
    Ledger::new().compute_as_of(operations, now)
}

/// 有效操作（排除被取代者），依套用順序排列
pub fn effective_operations(operations: &[MaterialOperation]) -> Vec<&MaterialOperation> {
    let superseded: HashSet<OperationId> =
        operations.iter().filter_map(|op| op.supersedes).collect();

    let mut effective: Vec<&MaterialOperation> = operations
        .iter()
        .filter(|op| !superseded.contains(&op.id))
        .collect();

    effective.sort_by(|a, b| {
        a.occurred_at
            .cmp(&b.occurred_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    effective
}

fn ensure_single_scope(operations: &[MaterialOperation]) -> stock_core::Result<()> {
    if let Some(first) = operations.first() {
        if let Some(other) = operations
            .iter()
            .find(|op| op.material_id != first.material_id || op.project_id != first.project_id)
        {
            return Err(StockError::Validation(format!(
                "數量帳只能計算單一範圍：{} 與 {}",
                first.scope(),
                other.scope()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use stock_core::NewMaterialOperation;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 1, 8, 0, 0).unwrap()
    }

    fn op(id: u64, operation_type: OperationType, qty: i64, minutes: i64) -> MaterialOperation {
        NewMaterialOperation::new(
            "CEMENT-42",
            operation_type,
            Decimal::from(qty),
            base_time() + Duration::minutes(minutes),
            "tester",
        )
        .into_operation(OperationId(id))
    }

    #[test]
    fn test_ledger_running_balance() {
        let ops = vec![
            op(1, OperationType::Reception, 100, 0),
            op(2, OperationType::Consumption, 30, 10),
            op(3, OperationType::Return, 5, 20),
        ];

        let result = compute_quantity(&ops).unwrap();

        assert_eq!(result.quantity, Decimal::from(75));
        assert_eq!(result.history.len(), 3);
        assert_eq!(result.history[0].balance_after, Decimal::from(100));
        assert_eq!(result.history[1].balance_after, Decimal::from(70));
        assert_eq!(result.history[1].delta, Decimal::from(-30));
        assert_eq!(result.history[2].balance_after, Decimal::from(75));
        assert_eq!(result.last_operation_id(), Some(OperationId(3)));
        assert!(result.first_negative.is_none());
    }

    #[test]
    fn test_ledger_sorts_by_time_then_id() {
        // 輸入順序打亂，且 2、3 同時間
        let ops = vec![
            op(3, OperationType::Consumption, 20, 5),
            op(1, OperationType::Reception, 50, 0),
            op(2, OperationType::Reception, 10, 5),
        ];

        let result = compute_quantity(&ops).unwrap();
        let order: Vec<u64> = result.history.iter().map(|e| e.operation_id.0).collect();

        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(result.balance_after(OperationId(2)), Some(Decimal::from(60)));
        assert_eq!(result.quantity, Decimal::from(40));
    }

    #[test]
    fn test_negative_balance_is_reported() {
        let ops = vec![
            op(1, OperationType::Reception, 100, 0),
            op(2, OperationType::Consumption, 30, 1),
            op(3, OperationType::Consumption, 80, 2),
        ];

        let err = compute_quantity(&ops).unwrap_err();
        assert_eq!(
            err,
            StockError::NegativeBalance {
                operation_id: OperationId(3),
                balance: Decimal::from(-10),
            }
        );
    }

    #[test]
    fn test_allow_policy_keeps_negative_balance() {
        let ops = vec![
            op(1, OperationType::Reception, 10, 0),
            op(2, OperationType::Consumption, 25, 1),
            op(3, OperationType::Reception, 5, 2),
        ];

        let result = Ledger::with_policy(NegativeStockPolicy::Allow)
            .compute(&ops)
            .unwrap();

        assert_eq!(result.quantity, Decimal::from(-10));
        let first_negative = result.first_negative.unwrap();
        assert_eq!(first_negative.operation_id, OperationId(2));
        assert_eq!(first_negative.balance_after, Decimal::from(-15));
    }

    #[test]
    fn test_superseded_operation_is_excluded() {
        let mut amended = op(4, OperationType::Consumption, 20, 10);
        amended.supersedes = Some(OperationId(2));

        let ops = vec![
            op(1, OperationType::Reception, 100, 0),
            op(2, OperationType::Consumption, 60, 10),
            amended,
        ];

        let result = compute_quantity(&ops).unwrap();
        assert_eq!(result.quantity, Decimal::from(80));
        assert_eq!(result.balance_after(OperationId(2)), None);
        assert_eq!(result.balance_after(OperationId(4)), Some(Decimal::from(80)));
    }

    #[test]
    fn test_compute_as_of_ignores_future_operations() {
        let ops = vec![
            op(1, OperationType::Reception, 100, 0),
            op(2, OperationType::Consumption, 40, 60 * 24),
        ];

        let result = compute_quantity_as_of(&ops, base_time() + Duration::hours(1)).unwrap();
        assert_eq!(result.quantity, Decimal::from(100));
        assert_eq!(result.history.len(), 1);
    }

    #[test]
    fn test_mixed_scopes_rejected() {
        let mut other = op(2, OperationType::Reception, 5, 1);
        other.project_id = Some("SITE-B".to_string());

        let ops = vec![op(1, OperationType::Reception, 10, 0), other];
        assert!(matches!(
            compute_quantity(&ops),
            Err(StockError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_ledger() {
        let result = compute_quantity(&[]).unwrap();
        assert_eq!(result.quantity, Decimal::ZERO);
        assert!(result.history.is_empty());
        assert_eq!(result.last_operation_id(), None);
    }

    fn inbound_ops() -> impl Strategy<Value = Vec<MaterialOperation>> {
        prop::collection::vec((any::<bool>(), 1i64..1_000, 0i64..500), 0..40).prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (is_return, qty, minutes))| {
                    let operation_type = if is_return {
                        OperationType::Return
                    } else {
                        OperationType::Reception
                    };
                    op(i as u64 + 1, operation_type, qty, minutes)
                })
                .collect()
        })
    }

    fn mixed_ops() -> impl Strategy<Value = Vec<MaterialOperation>> {
        prop::collection::vec((0u8..3, 1i64..200, 0i64..100), 0..40).prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (kind, qty, minutes))| {
                    let operation_type = match kind {
                        0 => OperationType::Reception,
                        1 => OperationType::Consumption,
                        _ => OperationType::Return,
                    };
                    op(i as u64 + 1, operation_type, qty, minutes)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_inbound_sum_is_order_independent(ops in inbound_ops()) {
            let expected: Decimal = ops.iter().map(|o| o.quantity).sum();

            let mut reversed = ops.clone();
            reversed.reverse();

            let forward = compute_quantity(&ops).unwrap();
            let backward = compute_quantity(&reversed).unwrap();

            prop_assert_eq!(forward.quantity, expected);
            prop_assert_eq!(backward.quantity, expected);
            prop_assert_eq!(forward.history, backward.history);
        }

        #[test]
        fn prop_ledger_is_idempotent(ops in mixed_ops()) {
            let ledger = Ledger::with_policy(NegativeStockPolicy::Allow);
            let first = ledger.compute(&ops).unwrap();
            let second = ledger.compute(&ops).unwrap();
            prop_assert_eq!(&first, &second);

            // 拒絕策略下結果也必須一致（成功或同一個錯誤）
            prop_assert_eq!(compute_quantity(&ops), compute_quantity(&ops));
        }

        #[test]
        fn prop_quantity_matches_signed_sum(ops in mixed_ops()) {
            let expected: Decimal = ops.iter().map(|o| o.delta()).sum();
            let result = Ledger::with_policy(NegativeStockPolicy::Allow).compute(&ops).unwrap();
            prop_assert_eq!(result.quantity, expected);
        }
    }
}
