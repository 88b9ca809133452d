//! 操作驗證
//!
//! 驗證不寫入任何資料；寫入由呼叫端透過儲存層完成。

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use stock_core::{
    LedgerConfig, MaterialOperation, NegativeStockPolicy, NewMaterialOperation, OperationDraft,
    OperationId, ScopeVersion, StockError, StockScope,
};

use crate::ledger::{Ledger, LedgerResult, RunningBalance};

/// 驗證時使用的帳本快照（呼叫端應在驗證前重新讀取）
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    /// 範圍
    pub scope: StockScope,
    /// 該範圍的全部操作
    pub operations: Vec<MaterialOperation>,
    /// 目前結存
    pub balance: Decimal,
    /// 範圍內最大的操作ID（決定暫定ID）
    pub last_operation_id: Option<OperationId>,
    /// 讀取時的範圍版本（寫入時作為樂觀鎖）
    pub version: ScopeVersion,
}

impl LedgerSnapshot {
    /// 空帳本
    pub fn empty(scope: StockScope) -> Self {
        Self {
            scope,
            operations: Vec::new(),
            balance: Decimal::ZERO,
            last_operation_id: None,
            version: ScopeVersion::default(),
        }
    }

    /// 由操作清單建立快照
    ///
    /// 歷史中已存在的負結存（過去以欠料方式寫入）不會使快照失敗。
    pub fn from_operations(
        scope: StockScope,
        operations: Vec<MaterialOperation>,
    ) -> stock_core::Result<Self> {
        if let Some(foreign) = operations.iter().find(|op| !op.belongs_to(&scope)) {
            return Err(StockError::Validation(format!(
                "操作 {} 不屬於範圍 {}",
                foreign.id, scope
            )));
        }

        let ledger = Ledger::with_policy(NegativeStockPolicy::Allow).compute(&operations)?;
        let last_operation_id = operations.iter().map(|op| op.id).max();

        Ok(Self {
            scope,
            operations,
            balance: ledger.quantity,
            last_operation_id,
            version: ScopeVersion::default(),
        })
    }

    /// 建構器模式：設置讀取時的範圍版本
    pub fn with_version(mut self, version: ScopeVersion) -> Self {
        self.version = version;
        self
    }

    /// 候選操作的暫定ID（排序用，大於快照內所有ID）
    pub fn provisional_id(&self) -> OperationId {
        self.last_operation_id
            .map(OperationId::next)
            .unwrap_or(OperationId(1))
    }

    pub fn find(&self, operation_id: OperationId) -> Option<&MaterialOperation> {
        self.operations.iter().find(|op| op.id == operation_id)
    }

    fn is_superseded(&self, operation_id: OperationId) -> bool {
        self.operations
            .iter()
            .any(|op| op.supersedes == Some(operation_id))
    }
}

/// 驗證參數
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    /// 目前時間
    pub now: DateTime<Utc>,
    /// 允許超前的時間
    pub future_skew: Duration,
    /// 負庫存策略
    pub policy: NegativeStockPolicy,
}

impl ValidationContext {
    pub fn new(now: DateTime<Utc>, config: &LedgerConfig) -> Self {
        Self {
            now,
            future_skew: config.future_skew(),
            policy: config.negative_stock_policy,
        }
    }
}

/// 通過驗證的操作
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOperation {
    /// 操作內容
    pub operation: NewMaterialOperation,
    /// 驗證時使用的暫定ID
    pub provisional_id: OperationId,
    /// 套用此操作後的逐筆結存
    pub balance_after: Decimal,
    /// 套用後的最終結存
    pub balance: Decimal,
    /// 驗證時的範圍版本（寫入時作為樂觀鎖）
    pub expected_version: ScopeVersion,
}

/// 操作驗證器
pub struct OperationValidator;

impl OperationValidator {
    /// 驗證新操作
    ///
    /// 拒絕條件：
    /// - 數量 <= 0、單價為負、缺少物料或建立者
    /// - 發生時間超過目前時間加容忍值
    /// - 使歷史中任何一點結存轉負（除非本次允許欠料或策略允許）
    pub fn validate(
        candidate: NewMaterialOperation,
        snapshot: &LedgerSnapshot,
        ctx: &ValidationContext,
    ) -> stock_core::Result<ValidatedOperation> {
        Self::check_shape(&candidate, snapshot, ctx)?;

        if let Some(original_id) = candidate.supersedes {
            Self::check_supersedable(original_id, &candidate, snapshot)?;
        }

        let provisional_id = snapshot.provisional_id();
        let mut operations = snapshot.operations.clone();
        operations.push(candidate.clone().into_operation(provisional_id));

        let allow_negative = candidate.backorder || ctx.policy == NegativeStockPolicy::Allow;
        let proposed = Self::check_balances(
            snapshot,
            &operations,
            Some(provisional_id),
            allow_negative,
        )?;

        let balance_after = proposed
            .balance_after(provisional_id)
            .unwrap_or(proposed.quantity);

        tracing::debug!(
            "操作驗證通過：{} {} {}，結存 {} → {}",
            snapshot.scope,
            candidate.operation_type,
            candidate.quantity,
            snapshot.balance,
            proposed.quantity
        );

        Ok(ValidatedOperation {
            operation: candidate,
            provisional_id,
            balance_after,
            balance: proposed.quantity,
            expected_version: snapshot.version,
        })
    }

    /// 驗證表單原始輸入（含操作類型解析）
    pub fn validate_draft(
        draft: OperationDraft,
        snapshot: &LedgerSnapshot,
        ctx: &ValidationContext,
    ) -> stock_core::Result<ValidatedOperation> {
        let candidate = NewMaterialOperation::try_from(draft)?;
        Self::validate(candidate, snapshot, ctx)
    }

    /// 驗證刪除操作後的歷史是否仍合法
    pub fn validate_removal(
        operation_id: OperationId,
        snapshot: &LedgerSnapshot,
        ctx: &ValidationContext,
    ) -> stock_core::Result<LedgerResult> {
        if snapshot.find(operation_id).is_none() {
            return Err(StockError::NotFound(format!(
                "範圍 {} 中沒有操作 {}",
                snapshot.scope, operation_id
            )));
        }

        let remaining: Vec<MaterialOperation> = snapshot
            .operations
            .iter()
            .filter(|op| op.id != operation_id)
            .cloned()
            .collect();

        Self::check_balances(
            snapshot,
            &remaining,
            None,
            ctx.policy == NegativeStockPolicy::Allow,
        )
    }

    fn check_shape(
        candidate: &NewMaterialOperation,
        snapshot: &LedgerSnapshot,
        ctx: &ValidationContext,
    ) -> stock_core::Result<()> {
        if candidate.material_id.trim().is_empty() {
            return Err(StockError::Validation("缺少物料ID".to_string()));
        }

        if candidate.created_by.trim().is_empty() {
            return Err(StockError::Validation("缺少建立者".to_string()));
        }

        if candidate.quantity <= Decimal::ZERO {
            return Err(StockError::Validation(format!(
                "數量必須為正數: {}",
                candidate.quantity
            )));
        }

        if let Some(price) = candidate.unit_price {
            if price < Decimal::ZERO {
                return Err(StockError::Validation(format!("單價不可為負數: {price}")));
            }
        }

        let latest_allowed = ctx.now + ctx.future_skew;
        if candidate.occurred_at > latest_allowed {
            return Err(StockError::Validation(format!(
                "發生時間 {} 晚於目前時間 {}",
                candidate.occurred_at, ctx.now
            )));
        }

        if candidate.scope() != snapshot.scope {
            return Err(StockError::Validation(format!(
                "操作範圍 {} 與快照範圍 {} 不一致",
                candidate.scope(),
                snapshot.scope
            )));
        }

        Ok(())
    }

    /// 修改只能變更數量、單價、地點與備註
    fn check_supersedable(
        original_id: OperationId,
        candidate: &NewMaterialOperation,
        snapshot: &LedgerSnapshot,
    ) -> stock_core::Result<()> {
        let Some(original) = snapshot.find(original_id) else {
            return Err(StockError::NotFound(format!(
                "要修改的操作 {} 不存在於範圍 {}",
                original_id, snapshot.scope
            )));
        };

        if candidate.operation_type != original.operation_type {
            return Err(StockError::Validation(format!(
                "修改不可變更操作類型：{} → {}",
                original.operation_type, candidate.operation_type
            )));
        }

        if candidate.occurred_at != original.occurred_at {
            return Err(StockError::Validation(format!(
                "修改不可變更發生時間：{} → {}",
                original.occurred_at, candidate.occurred_at
            )));
        }

        if snapshot.is_superseded(original_id) {
            return Err(StockError::Validation(format!(
                "操作 {original_id} 已被修改過，請修改最新版本"
            )));
        }

        Ok(())
    }

    /// 比較變更前後的逐筆結存
    ///
    /// 只有「因本次變更而變低且為負」的點才算違規，
    /// 既有的欠料紀錄不會讓後續的入庫被拒絕。
    fn check_balances(
        snapshot: &LedgerSnapshot,
        proposed_operations: &[MaterialOperation],
        new_id: Option<OperationId>,
        allow_negative: bool,
    ) -> stock_core::Result<LedgerResult> {
        let ledger = Ledger::with_policy(NegativeStockPolicy::Allow);
        let baseline = ledger.compute(&snapshot.operations)?;
        let proposed = ledger.compute(proposed_operations)?;

        if let Some(violation) = find_violation(&baseline, &proposed, new_id) {
            if allow_negative {
                tracing::warn!(
                    "範圍 {} 允許欠料：操作 {} 後結存為 {}",
                    snapshot.scope,
                    violation.operation_id,
                    violation.balance_after
                );
            } else {
                return Err(StockError::NegativeBalance {
                    operation_id: violation.operation_id,
                    balance: violation.balance_after,
                });
            }
        }

        Ok(proposed)
    }
}

fn find_violation<'a>(
    baseline: &LedgerResult,
    proposed: &'a LedgerResult,
    new_id: Option<OperationId>,
) -> Option<&'a RunningBalance> {
    proposed.history.iter().find(|entry| {
        if entry.balance_after >= Decimal::ZERO {
            return false;
        }

        let prior = if Some(entry.operation_id) == new_id {
            entry.balance_after - entry.delta
        } else {
            baseline
                .balance_after(entry.operation_id)
                // 原本被取代、現在重新生效的操作
                .unwrap_or(Decimal::ZERO)
        };

        entry.balance_after < prior
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stock_core::OperationType;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 10, 12, 0, 0).unwrap()
    }

    fn ctx() -> ValidationContext {
        ValidationContext::new(now(), &LedgerConfig::default())
    }

    fn scope() -> StockScope {
        StockScope::project("REBAR-12", "SITE-A")
    }

    fn candidate(operation_type: OperationType, qty: i64, hours_ago: i64) -> NewMaterialOperation {
        NewMaterialOperation::new(
            "REBAR-12",
            operation_type,
            Decimal::from(qty),
            now() - Duration::hours(hours_ago),
            "ion",
        )
        .with_project_id("SITE-A")
    }

    fn recorded(ops: Vec<(OperationType, i64, i64)>) -> LedgerSnapshot {
        let operations = ops
            .into_iter()
            .enumerate()
            .map(|(i, (t, qty, hours_ago))| {
                candidate(t, qty, hours_ago).into_operation(OperationId(i as u64 + 1))
            })
            .collect();
        LedgerSnapshot::from_operations(scope(), operations).unwrap()
    }

    #[test]
    fn test_accept_reception_on_empty_ledger() {
        let snapshot = LedgerSnapshot::empty(scope());
        let validated =
            OperationValidator::validate(candidate(OperationType::Reception, 100, 1), &snapshot, &ctx())
                .unwrap();

        assert_eq!(validated.provisional_id, OperationId(1));
        assert_eq!(validated.balance_after, Decimal::from(100));
        assert_eq!(validated.balance, Decimal::from(100));
        assert_eq!(validated.expected_version, ScopeVersion::default());
    }

    #[test]
    fn test_reject_overdraw_names_candidate() {
        // reception 100, consumption 30 → 70；再領 80 會變成 -10
        let snapshot = recorded(vec![
            (OperationType::Reception, 100, 3),
            (OperationType::Consumption, 30, 2),
        ]);
        assert_eq!(snapshot.balance, Decimal::from(70));

        let err = OperationValidator::validate(
            candidate(OperationType::Consumption, 80, 1),
            &snapshot,
            &ctx(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            StockError::NegativeBalance {
                operation_id: snapshot.provisional_id(),
                balance: Decimal::from(-10),
            }
        );
        // 快照不受影響
        assert_eq!(snapshot.balance, Decimal::from(70));
    }

    #[test]
    fn test_backdated_consumption_breaking_later_history() {
        // 時間線：-10h 入 50，-5h 領 40；在 -8h 插入領用 20 會讓 -5h 那筆變成 -10
        let snapshot = recorded(vec![
            (OperationType::Reception, 50, 10),
            (OperationType::Consumption, 40, 5),
        ]);

        let err = OperationValidator::validate(
            candidate(OperationType::Consumption, 20, 8),
            &snapshot,
            &ctx(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            StockError::NegativeBalance {
                operation_id: OperationId(2),
                balance: Decimal::from(-10),
            }
        );
    }

    #[test]
    fn test_backorder_flag_allows_overdraw() {
        let snapshot = recorded(vec![(OperationType::Reception, 10, 2)]);
        let validated = OperationValidator::validate(
            candidate(OperationType::Consumption, 25, 1).with_backorder(true),
            &snapshot,
            &ctx(),
        )
        .unwrap();

        assert_eq!(validated.balance, Decimal::from(-15));
        assert_eq!(validated.balance_after, Decimal::from(-15));
    }

    #[test]
    fn test_allow_policy_allows_overdraw() {
        let snapshot = recorded(vec![(OperationType::Reception, 10, 2)]);
        let config = LedgerConfig::new().with_negative_stock_policy(NegativeStockPolicy::Allow);
        let ctx = ValidationContext::new(now(), &config);

        let validated =
            OperationValidator::validate(candidate(OperationType::Consumption, 25, 1), &snapshot, &ctx)
                .unwrap();
        assert_eq!(validated.balance, Decimal::from(-15));
    }

    #[test]
    fn test_reception_accepted_after_existing_backorder() {
        let snapshot = recorded(vec![
            (OperationType::Reception, 10, 3),
            (OperationType::Consumption, 25, 2),
        ]);
        assert_eq!(snapshot.balance, Decimal::from(-15));

        let validated = OperationValidator::validate(
            candidate(OperationType::Reception, 5, 1),
            &snapshot,
            &ctx(),
        )
        .unwrap();
        assert_eq!(validated.balance, Decimal::from(-10));
    }

    #[test]
    fn test_reject_invalid_shapes() {
        let snapshot = LedgerSnapshot::empty(scope());

        let zero = candidate(OperationType::Reception, 0, 1);
        let negative_price =
            candidate(OperationType::Reception, 5, 1).with_unit_price(Decimal::from(-2));
        let future = NewMaterialOperation::new(
            "REBAR-12",
            OperationType::Reception,
            Decimal::from(5),
            now() + Duration::hours(1),
            "ion",
        )
        .with_project_id("SITE-A");
        let wrong_scope = NewMaterialOperation::new(
            "REBAR-12",
            OperationType::Reception,
            Decimal::from(5),
            now(),
            "ion",
        );

        for bad in [zero, negative_price, future, wrong_scope] {
            assert!(matches!(
                OperationValidator::validate(bad, &snapshot, &ctx()),
                Err(StockError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_future_within_skew_is_accepted() {
        let snapshot = LedgerSnapshot::empty(scope());
        let slightly_ahead = NewMaterialOperation::new(
            "REBAR-12",
            OperationType::Reception,
            Decimal::from(5),
            now() + Duration::minutes(2),
            "ion",
        )
        .with_project_id("SITE-A");

        assert!(OperationValidator::validate(slightly_ahead, &snapshot, &ctx()).is_ok());
    }

    #[test]
    fn test_validate_draft_rejects_unknown_type() {
        let draft = OperationDraft {
            material_id: "REBAR-12".to_string(),
            project_id: Some("SITE-A".to_string()),
            operation_type: "transfer".to_string(),
            quantity: Decimal::from(5),
            unit_price: None,
            location: None,
            notes: None,
            occurred_at: now(),
            created_by: "ion".to_string(),
            backorder: false,
        };

        let err = OperationValidator::validate_draft(draft, &LedgerSnapshot::empty(scope()), &ctx())
            .unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));
    }

    #[test]
    fn test_amendment_replaces_original() {
        let snapshot = recorded(vec![
            (OperationType::Reception, 100, 3),
            (OperationType::Consumption, 30, 2),
        ]);

        let amended = candidate(OperationType::Consumption, 90, 2).superseding(OperationId(2));
        let validated = OperationValidator::validate(amended, &snapshot, &ctx()).unwrap();
        assert_eq!(validated.balance, Decimal::from(10));

        let too_much = candidate(OperationType::Consumption, 120, 2).superseding(OperationId(2));
        assert!(matches!(
            OperationValidator::validate(too_much, &snapshot, &ctx()),
            Err(StockError::NegativeBalance { .. })
        ));

        let missing = candidate(OperationType::Consumption, 5, 2).superseding(OperationId(42));
        assert!(matches!(
            OperationValidator::validate(missing, &snapshot, &ctx()),
            Err(StockError::NotFound(_))
        ));
    }

    #[test]
    fn test_amendment_keeps_type_and_time() {
        let snapshot = recorded(vec![
            (OperationType::Reception, 100, 3),
            (OperationType::Consumption, 30, 2),
        ]);

        let retyped = candidate(OperationType::Reception, 30, 2).superseding(OperationId(2));
        let moved = candidate(OperationType::Consumption, 30, 1).superseding(OperationId(2));

        for bad in [retyped, moved] {
            assert!(matches!(
                OperationValidator::validate(bad, &snapshot, &ctx()),
                Err(StockError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_validated_operation_carries_snapshot_version() {
        let snapshot = recorded(vec![(OperationType::Reception, 10, 2)]).with_version(ScopeVersion(4));
        let validated =
            OperationValidator::validate(candidate(OperationType::Consumption, 5, 1), &snapshot, &ctx())
                .unwrap();

        assert_eq!(validated.expected_version, ScopeVersion(4));
        assert_eq!(validated.provisional_id, OperationId(2));
    }

    #[test]
    fn test_amending_superseded_operation_rejected() {
        let mut snapshot = recorded(vec![
            (OperationType::Reception, 100, 3),
            (OperationType::Consumption, 30, 2),
        ]);
        let replacement = candidate(OperationType::Consumption, 20, 2)
            .superseding(OperationId(2))
            .into_operation(OperationId(3));
        snapshot.operations.push(replacement);
        let snapshot = LedgerSnapshot::from_operations(scope(), snapshot.operations).unwrap();

        let again = candidate(OperationType::Consumption, 10, 2).superseding(OperationId(2));
        assert!(matches!(
            OperationValidator::validate(again, &snapshot, &ctx()),
            Err(StockError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_removal() {
        let snapshot = recorded(vec![
            (OperationType::Reception, 100, 3),
            (OperationType::Consumption, 30, 2),
            (OperationType::Return, 5, 1),
        ]);

        // 刪除領用：結存變高，允許
        let result = OperationValidator::validate_removal(OperationId(2), &snapshot, &ctx()).unwrap();
        assert_eq!(result.quantity, Decimal::from(105));

        // 刪除入庫：領用會變成負數，拒絕
        let err = OperationValidator::validate_removal(OperationId(1), &snapshot, &ctx()).unwrap_err();
        assert_eq!(
            err,
            StockError::NegativeBalance {
                operation_id: OperationId(2),
                balance: Decimal::from(-30),
            }
        );

        assert!(matches!(
            OperationValidator::validate_removal(OperationId(9), &snapshot, &ctx()),
            Err(StockError::NotFound(_))
        ));
    }
}
