//! 警示規則評估

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stock_core::{AlertType, MaterialStockState, StockAlertRule};
use uuid::Uuid;

/// 已觸發的警示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredAlert {
    /// 規則ID
    pub rule_id: Uuid,
    /// 物料ID
    pub material_id: String,
    /// 警示類型
    pub alert_type: AlertType,
    /// 規則門檻
    pub threshold: Decimal,
    /// 評估時的庫存
    pub quantity: Decimal,
    /// 評估時的到期日
    pub expires_at: Option<DateTime<Utc>>,
    /// 評估時間
    pub evaluated_at: DateTime<Utc>,
}

/// 警示評估器
///
/// 只依傳入的快照判斷，不做任何 I/O。
/// 同一物料的缺貨與低庫存規則各自獨立判斷，不互相壓制。
pub struct AlertEvaluator;

impl AlertEvaluator {
    /// 評估單一物料
    pub fn evaluate(
        state: &MaterialStockState,
        rules: &[StockAlertRule],
        now: DateTime<Utc>,
    ) -> Vec<TriggeredAlert> {
        rules
            .iter()
            .filter(|rule| rule.enabled && rule.material_id == state.material_id)
            .filter(|rule| Self::is_triggered(rule, state, now))
            .map(|rule| TriggeredAlert {
                rule_id: rule.id,
                material_id: state.material_id.clone(),
                alert_type: rule.alert_type,
                threshold: rule.threshold,
                quantity: state.quantity,
                expires_at: state.expires_at,
                evaluated_at: now,
            })
            .collect()
    }

    /// 單一規則是否觸發（不檢查啟用狀態）
    pub fn is_triggered(
        rule: &StockAlertRule,
        state: &MaterialStockState,
        now: DateTime<Utc>,
    ) -> bool {
        match rule.alert_type {
            AlertType::LowStock => {
                state.quantity > Decimal::ZERO && state.quantity <= rule.threshold
            }
            AlertType::OutOfStock => state.quantity <= Decimal::ZERO,
            AlertType::Expiring => {
                // 無到期日的物料永不觸發
                match (state.time_to_expiry(now), rule.expiry_window()) {
                    (Some(remaining), Some(window)) => remaining <= window,
                    _ => false,
                }
            }
        }
    }

    /// 批次評估多個物料（平行計算，輸出順序與輸入一致）
    pub fn evaluate_many(
        batch: &[(MaterialStockState, Vec<StockAlertRule>)],
        now: DateTime<Utc>,
    ) -> Vec<Vec<TriggeredAlert>> {
        tracing::debug!("批次評估警示：{} 個物料", batch.len());
        batch
            .par_iter()
            .map(|(state, rules)| Self::evaluate(state, rules, now))
            .collect()
    }
}
