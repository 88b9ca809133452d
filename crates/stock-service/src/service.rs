//! 庫存服務：串接儲存層與計算引擎

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use stock_calc::{
    rules_for_project, AlertEvaluator, AlertReconciler, AlertTransition, Ledger, LedgerSnapshot,
    OperationStats, OperationValidator, ValidationContext,
};
use stock_core::{
    Actor, AlertType, Clock, LedgerConfig, MaterialOperation, MaterialStockState,
    NegativeStockPolicy, NewMaterialOperation, OperationAmendment, OperationDraft, OperationId,
    OperationQuery, Result, StockAlertRule, StockAlertState, StockError, StockScope,
};
use uuid::Uuid;

use crate::dirty_tracking::DirtyTracker;
use crate::store::{AlertRuleStore, MaterialCatalog, OperationStore};

/// 記錄操作的結果
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// 已寫入
    Accepted {
        operation: MaterialOperation,
        /// 此操作套用後的結存
        balance_after: Decimal,
        /// 範圍的最終結存
        balance: Decimal,
    },
    /// 被拒絕（驗證失敗或庫存不足），未寫入
    Rejected { reason: StockError },
}

impl RecordOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RecordOutcome::Accepted { .. })
    }

    /// 寫入後的結存
    pub fn balance(&self) -> Option<Decimal> {
        match self {
            RecordOutcome::Accepted { balance, .. } => Some(*balance),
            RecordOutcome::Rejected { .. } => None,
        }
    }

    pub fn operation(&self) -> Option<&MaterialOperation> {
        match self {
            RecordOutcome::Accepted { operation, .. } => Some(operation),
            RecordOutcome::Rejected { .. } => None,
        }
    }

    pub fn rejection(&self) -> Option<&StockError> {
        match self {
            RecordOutcome::Accepted { .. } => None,
            RecordOutcome::Rejected { reason } => Some(reason),
        }
    }
}

/// 刪除操作的稽核紀錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// 被刪除的操作
    pub operation: MaterialOperation,
    pub removed_by: String,
    pub removed_at: DateTime<Utc>,
    /// 刪除前結存
    pub balance_before: Decimal,
    /// 刪除後結存
    pub balance_after: Decimal,
}

/// 庫存服務
pub struct StockService {
    operations: Arc<dyn OperationStore>,
    rules: Arc<dyn AlertRuleStore>,
    catalog: Arc<dyn MaterialCatalog>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
    dirty: Mutex<DirtyTracker>,
    /// 警示檢查從讀取狀態到保存轉換的整段期間持有
    alert_lock: Mutex<()>,
}

impl StockService {
    /// 創建新的庫存服務
    pub fn new(
        operations: Arc<dyn OperationStore>,
        rules: Arc<dyn AlertRuleStore>,
        catalog: Arc<dyn MaterialCatalog>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            operations,
            rules,
            catalog,
            clock,
            config,
            dirty: Mutex::new(DirtyTracker::new()),
            alert_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// 讀取範圍的最新快照（含範圍版本）
    pub fn snapshot(&self, scope: &StockScope) -> Result<LedgerSnapshot> {
        let loaded = self.operations.load_scope(scope)?;
        Ok(LedgerSnapshot::from_operations(scope.clone(), loaded.operations)?
            .with_version(loaded.version))
    }

    /// 記錄異動操作
    ///
    /// 驗證前重新讀取範圍內的操作；寫入時以讀到的範圍版本做樂觀鎖。
    /// 驗證失敗回傳 `Rejected`，只有寫入衝突與儲存錯誤回傳 `Err`。
    /// 衝突時不自動重試，由呼叫端重新送出。
    pub fn record_operation(
        &self,
        mut candidate: NewMaterialOperation,
        actor: &Actor,
    ) -> Result<RecordOutcome> {
        if candidate.supersedes.is_some() {
            actor.require_manager("修改異動")?;
        }
        candidate.created_by = actor.user_id.clone();
        self.submit(candidate)
    }

    /// 記錄表單輸入
    pub fn record_draft(&self, draft: OperationDraft, actor: &Actor) -> Result<RecordOutcome> {
        match NewMaterialOperation::try_from(draft) {
            Ok(candidate) => self.record_operation(candidate, actor),
            Err(reason) => Ok(RecordOutcome::Rejected { reason }),
        }
    }

    /// 修改操作（產生取代原操作的新版本）
    pub fn amend_operation(
        &self,
        original_id: OperationId,
        changes: &OperationAmendment,
        actor: &Actor,
    ) -> Result<RecordOutcome> {
        actor.require_manager("修改異動")?;

        let original = self
            .operations
            .get_operation(original_id)?
            .ok_or_else(|| StockError::NotFound(format!("操作 {original_id}")))?;

        tracing::info!("{} 修改操作 {} ({})", actor.user_id, original_id, original.scope());
        self.submit(changes.apply_to(&original, actor.user_id.clone()))
    }

    /// 刪除操作（僅管理者，保留稽核紀錄）
    ///
    /// 刪除後的歷史若出現新的負結存，回傳 `NegativeBalance` 且不刪除。
    pub fn delete_operation(&self, operation_id: OperationId, actor: &Actor) -> Result<AuditRecord> {
        actor.require_manager("刪除異動")?;

        let target = self
            .operations
            .get_operation(operation_id)?
            .ok_or_else(|| StockError::NotFound(format!("操作 {operation_id}")))?;

        let snapshot = self.snapshot(&target.scope())?;
        let ctx = ValidationContext::new(self.clock.now(), &self.config);
        let remaining = OperationValidator::validate_removal(operation_id, &snapshot, &ctx)?;

        let removed = self
            .operations
            .remove_operation(operation_id, snapshot.version)?;
        self.mark_dirty(&removed.material_id);

        tracing::warn!(
            "操作 {} 已由 {} 刪除（{}），結存 {} → {}",
            operation_id,
            actor.user_id,
            snapshot.scope,
            snapshot.balance,
            remaining.quantity
        );

        Ok(AuditRecord {
            operation: removed,
            removed_by: actor.user_id.clone(),
            removed_at: ctx.now,
            balance_before: snapshot.balance,
            balance_after: remaining.quantity,
        })
    }

    fn submit(&self, candidate: NewMaterialOperation) -> Result<RecordOutcome> {
        let scope = candidate.scope();
        let snapshot = self.snapshot(&scope)?;
        let ctx = ValidationContext::new(self.clock.now(), &self.config);

        let validated = match OperationValidator::validate(candidate, &snapshot, &ctx) {
            Ok(validated) => validated,
            Err(reason) if reason.is_rejection() || matches!(reason, StockError::NotFound(_)) => {
                tracing::info!("操作被拒絕 ({}): {}", scope, reason);
                return Ok(RecordOutcome::Rejected { reason });
            }
            Err(e) => return Err(e),
        };

        let operation = self
            .operations
            .append_operation(validated.operation, validated.expected_version)?;
        self.mark_dirty(&operation.material_id);

        tracing::info!(
            "操作 {} 已寫入：{} {} {}，結存 {}",
            operation.id,
            scope,
            operation.operation_type,
            operation.quantity,
            validated.balance
        );

        Ok(RecordOutcome::Accepted {
            operation,
            balance_after: validated.balance_after,
            balance: validated.balance,
        })
    }

    /// 單一範圍目前的庫存（只計入已發生的操作）
    pub fn stock_state(&self, scope: &StockScope) -> Result<MaterialStockState> {
        let now = self.clock.now();
        let operations = self.operations.list_operations(scope)?;
        let result = Self::ledger().compute_as_of(&operations, now)?;

        Ok(result
            .to_stock_state(scope, now)
            .with_expires_at(self.expires_at(&scope.material_id)?))
    }

    /// 物料在所有範圍的合計庫存
    pub fn material_state(&self, material_id: &str) -> Result<MaterialStockState> {
        self.material_state_at(material_id, self.clock.now())
    }

    fn material_state_at(&self, material_id: &str, now: DateTime<Utc>) -> Result<MaterialStockState> {
        let mut by_scope: BTreeMap<StockScope, Vec<MaterialOperation>> = BTreeMap::new();
        for op in self.operations.list_material_operations(material_id)? {
            by_scope.entry(op.scope()).or_default().push(op);
        }

        let ledger = Self::ledger();
        let mut parts = Vec::with_capacity(by_scope.len());
        for (scope, operations) in &by_scope {
            parts.push(ledger.compute_as_of(operations, now)?.to_stock_state(scope, now));
        }

        Ok(MaterialStockState::material_total(material_id, &parts, now)
            .with_expires_at(self.expires_at(material_id)?))
    }

    /// 異動統計
    pub fn operation_stats(&self, material_id: &str) -> Result<OperationStats> {
        let operations = self.operations.list_material_operations(material_id)?;
        Ok(OperationStats::collect(&operations))
    }

    /// 專案範圍的異動統計（所有物料）
    pub fn project_operation_stats(&self, project_id: &str) -> Result<OperationStats> {
        let operations = self
            .operations
            .query_operations(&OperationQuery::new().with_project_id(project_id))?;
        Ok(OperationStats::collect(&operations))
    }

    /// 查詢異動紀錄（由新到舊，含分頁）
    pub fn operation_history(&self, query: &OperationQuery) -> Result<Vec<MaterialOperation>> {
        self.operations.query_operations(query)
    }

    /// 檢查單一物料的警示並保存狀態
    pub fn check_alerts(&self, material_id: &str) -> Result<Vec<AlertTransition>> {
        let _guard = self.alert_guard();
        self.dirty().mark_clean(material_id);

        let materials = [material_id.to_string()];
        self.check_materials(&materials)
    }

    /// 輪詢：檢查上次輪詢後有變動的物料
    ///
    /// 任一步驟失敗時，尚未保存的物料會重新標記為髒。
    pub fn check_dirty_alerts(&self) -> Result<Vec<AlertTransition>> {
        let _guard = self.alert_guard();
        let materials = self.dirty().take();
        if materials.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!("開始警示輪詢：{} 個物料", materials.len());
        let transitions = self.check_materials(&materials)?;
        tracing::info!("警示輪詢完成：{} 筆狀態轉換", transitions.len());
        Ok(transitions)
    }

    /// 檢查專案的物料（目錄中屬於專案，或在專案內有異動者）
    pub fn check_project_alerts(&self, project_id: &str) -> Result<Vec<AlertTransition>> {
        let mut materials: BTreeSet<String> = self
            .catalog
            .project_materials(project_id)?
            .into_iter()
            .map(|profile| profile.material_id)
            .collect();
        materials.extend(
            self.operations
                .query_operations(&OperationQuery::new().with_project_id(project_id))?
                .into_iter()
                .map(|op| op.material_id),
        );
        let materials: Vec<String> = materials.into_iter().collect();

        let _guard = self.alert_guard();
        tracing::info!("專案 {} 警示檢查：{} 個物料", project_id, materials.len());
        self.check_materials(&materials)
    }

    /// 評估並保存多個物料的警示，呼叫端須持有 `alert_lock`
    fn check_materials(&self, materials: &[String]) -> Result<Vec<AlertTransition>> {
        let now = self.clock.now();

        let mut batch = Vec::with_capacity(materials.len());
        let mut previous = Vec::with_capacity(materials.len());
        for material_id in materials {
            match self.alert_inputs(material_id, now) {
                Ok((state, rules, prior)) => {
                    batch.push((state, rules));
                    previous.push(prior);
                }
                Err(e) => {
                    self.remark_dirty(materials);
                    return Err(e);
                }
            }
        }

        let triggered = AlertEvaluator::evaluate_many(&batch, now);

        let mut transitions = Vec::new();
        for (i, (prior, triggered_now)) in previous.iter().zip(&triggered).enumerate() {
            let changes = AlertReconciler::reconcile(prior, triggered_now, now);
            if let Err(e) = self.persist_transitions(&changes) {
                self.remark_dirty(&materials[i..]);
                return Err(e);
            }
            transitions.extend(changes);
        }

        Ok(transitions)
    }

    /// 尚待警示檢查的物料
    pub fn pending_alert_checks(&self) -> Vec<String> {
        self.dirty().dirty_materials()
    }

    /// 確認警示（現場人員即可）
    pub fn acknowledge_alert(&self, rule_id: Uuid, actor: &Actor) -> Result<AlertTransition> {
        let _guard = self.alert_guard();
        let state = self
            .rules
            .get_alert_state(rule_id)?
            .ok_or_else(|| StockError::NotFound(format!("規則 {rule_id} 沒有警示")))?;

        let transition = AlertReconciler::acknowledge(&state, self.clock.now())?;
        self.rules.save_alert_state(transition.state.clone())?;

        tracing::info!("警示 {} 已由 {} 確認", rule_id, actor.user_id);
        Ok(transition)
    }

    /// 新增或更新警示規則
    pub fn save_rule(&self, rule: StockAlertRule, actor: &Actor) -> Result<StockAlertRule> {
        actor.require_manager("維護警示規則")?;
        rule.validate()?;

        self.rules.save_rule(rule.clone())?;
        self.mark_dirty(&rule.material_id);

        tracing::info!(
            "警示規則 {} 已保存：{} {} 門檻 {}",
            rule.id,
            rule.material_id,
            rule.alert_type,
            rule.threshold
        );
        Ok(rule)
    }

    /// 啟用/停用規則
    ///
    /// 停用中的規則不評估，下次檢查時原本的警示會解除。
    pub fn set_rule_enabled(
        &self,
        rule_id: Uuid,
        enabled: bool,
        actor: &Actor,
    ) -> Result<StockAlertRule> {
        actor.require_manager("維護警示規則")?;

        let rule = self
            .rules
            .get_rule(rule_id)?
            .ok_or_else(|| StockError::NotFound(format!("規則 {rule_id}")))?
            .with_enabled(enabled);

        self.rules.save_rule(rule.clone())?;
        self.mark_dirty(&rule.material_id);

        tracing::info!("警示規則 {} 已{}", rule_id, if enabled { "啟用" } else { "停用" });
        Ok(rule)
    }

    /// 刪除警示規則與其警示狀態（僅管理者）
    pub fn delete_rule(&self, rule_id: Uuid, actor: &Actor) -> Result<StockAlertRule> {
        actor.require_manager("維護警示規則")?;

        let _guard = self.alert_guard();
        let rule = self
            .rules
            .delete_rule(rule_id)?
            .ok_or_else(|| StockError::NotFound(format!("規則 {rule_id}")))?;
        self.rules.delete_alert_state(rule_id)?;

        tracing::warn!(
            "警示規則 {} 已由 {} 刪除：{} {}",
            rule_id,
            actor.user_id,
            rule.material_id,
            rule.alert_type
        );
        Ok(rule)
    }

    /// 為專案物料建立低庫存規則
    ///
    /// 已有低庫存規則的物料保留原規則。
    pub fn create_project_rules(
        &self,
        project_id: &str,
        percent: Option<Decimal>,
        actor: &Actor,
    ) -> Result<Vec<StockAlertRule>> {
        actor.require_manager("維護警示規則")?;

        let percent = percent.unwrap_or(self.config.default_low_stock_percent);
        let profiles = self.catalog.project_materials(project_id)?;

        let mut created = Vec::new();
        for rule in rules_for_project(&profiles, percent)? {
            let existing = self.rules.list_rules(&rule.material_id)?;
            if existing.iter().any(|r| r.alert_type == AlertType::LowStock) {
                tracing::debug!("物料 {} 已有低庫存規則，跳過", rule.material_id);
                continue;
            }

            self.rules.save_rule(rule.clone())?;
            self.mark_dirty(&rule.material_id);
            created.push(rule);
        }

        tracing::info!(
            "專案 {} 建立 {} 條低庫存規則（{}%）",
            project_id,
            created.len(),
            percent
        );
        Ok(created)
    }

    fn alert_inputs(
        &self,
        material_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(MaterialStockState, Vec<StockAlertRule>, Vec<StockAlertState>)> {
        let state = self.material_state_at(material_id, now)?;
        let rules = self.rules.list_rules(material_id)?;

        let mut previous = Vec::with_capacity(rules.len());
        for rule in &rules {
            if let Some(prior) = self.rules.get_alert_state(rule.id)? {
                previous.push(prior);
            }
        }

        Ok((state, rules, previous))
    }

    fn persist_transitions(&self, transitions: &[AlertTransition]) -> Result<()> {
        for transition in transitions {
            self.rules.save_alert_state(transition.state.clone())?;

            match &transition.alert {
                Some(alert) if transition.is_fire() => tracing::warn!(
                    "警示觸發：{} {}（庫存 {}，門檻 {}）",
                    alert.material_id,
                    alert.alert_type,
                    alert.quantity,
                    alert.threshold
                ),
                _ => tracing::info!("警示 {} 狀態：{:?}", transition.rule_id, transition.kind),
            }
        }
        Ok(())
    }

    fn expires_at(&self, material_id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .catalog
            .material(material_id)?
            .and_then(|profile| profile.expires_at))
    }

    /// 狀態查詢容許歷史中既有的欠料
    fn ledger() -> Ledger {
        Ledger::with_policy(NegativeStockPolicy::Allow)
    }

    fn alert_guard(&self) -> MutexGuard<'_, ()> {
        self.alert_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn dirty(&self) -> MutexGuard<'_, DirtyTracker> {
        self.dirty.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mark_dirty(&self, material_id: &str) {
        self.dirty().mark_dirty(material_id);
    }

    fn remark_dirty(&self, materials: &[String]) {
        let mut dirty = self.dirty();
        for material_id in materials {
            dirty.mark_dirty(material_id.clone());
        }
    }
}
