//! 警示狀態對帳
//!
//! 比對本次觸發結果與上次保存的狀態，決定哪些警示是新觸發、
//! 持續中或應解除。重複輪詢不會重複通知。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use stock_core::{AlertStatus, StockAlertState, StockError};
use uuid::Uuid;

use crate::evaluator::TriggeredAlert;

/// 轉換類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// 觸發
    Fire,
    /// 解除
    Clear,
    /// 確認
    Acknowledge,
}

/// 警示狀態轉換
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertTransition {
    /// 規則ID
    pub rule_id: Uuid,
    /// 轉換類型
    pub kind: TransitionKind,
    /// 轉換前狀態
    pub from: AlertStatus,
    /// 轉換後狀態（呼叫端應保存）
    pub state: StockAlertState,
    /// 觸發內容（僅 Fire）
    pub alert: Option<TriggeredAlert>,
}

impl AlertTransition {
    pub fn is_fire(&self) -> bool {
        self.kind == TransitionKind::Fire
    }

    pub fn is_clear(&self) -> bool {
        self.kind == TransitionKind::Clear
    }
}

/// 警示狀態對帳器
pub struct AlertReconciler;

impl AlertReconciler {
    /// 對帳
    ///
    /// 狀態機（每條規則）：
    /// - inactive → triggered：Fire
    /// - triggered/acknowledged 且條件仍成立：不輸出
    /// - triggered/acknowledged 且條件解除：Clear（回到 inactive）
    ///
    /// 沒有舊紀錄的規則視為 inactive。
    pub fn reconcile(
        previous: &[StockAlertState],
        triggered_now: &[TriggeredAlert],
        now: DateTime<Utc>,
    ) -> Vec<AlertTransition> {
        let previous_by_rule: HashMap<Uuid, &StockAlertState> =
            previous.iter().map(|s| (s.rule_id, s)).collect();

        let mut transitions = Vec::new();
        let mut still_triggered = HashSet::new();

        for alert in triggered_now {
            if !still_triggered.insert(alert.rule_id) {
                continue;
            }

            let prior = previous_by_rule
                .get(&alert.rule_id)
                .map(|s| (*s).clone())
                .unwrap_or_else(|| StockAlertState::inactive(alert.rule_id));

            if prior.is_active() {
                continue;
            }

            let state = StockAlertState {
                status: AlertStatus::Triggered,
                triggered_at: Some(now),
                acknowledged_at: None,
                ..prior.clone()
            };

            transitions.push(AlertTransition {
                rule_id: alert.rule_id,
                kind: TransitionKind::Fire,
                from: prior.status,
                state,
                alert: Some(alert.clone()),
            });
        }

        for prior in previous {
            if !prior.is_active() || still_triggered.contains(&prior.rule_id) {
                continue;
            }

            let state = StockAlertState {
                status: AlertStatus::Inactive,
                cleared_at: Some(now),
                ..prior.clone()
            };

            transitions.push(AlertTransition {
                rule_id: prior.rule_id,
                kind: TransitionKind::Clear,
                from: prior.status,
                state,
                alert: None,
            });
        }

        if !transitions.is_empty() {
            tracing::debug!("警示對帳：{} 筆狀態轉換", transitions.len());
        }

        transitions
    }

    /// 確認警示（triggered → acknowledged）
    ///
    /// 確認不會壓制之後獨立的再次觸發：條件解除後再成立仍會 Fire。
    pub fn acknowledge(
        state: &StockAlertState,
        now: DateTime<Utc>,
    ) -> stock_core::Result<AlertTransition> {
        if state.status != AlertStatus::Triggered {
            return Err(StockError::Validation(format!(
                "只有已觸發的警示可以確認，目前狀態: {:?}",
                state.status
            )));
        }

        Ok(AlertTransition {
            rule_id: state.rule_id,
            kind: TransitionKind::Acknowledge,
            from: state.status,
            state: StockAlertState {
                status: AlertStatus::Acknowledged,
                acknowledged_at: Some(now),
                ..state.clone()
            },
            alert: None,
        })
    }

    /// 將轉換套用到狀態清單（以規則ID覆蓋）
    pub fn apply(states: &mut Vec<StockAlertState>, transitions: &[AlertTransition]) {
        for transition in transitions {
            match states.iter_mut().find(|s| s.rule_id == transition.rule_id) {
                Some(existing) => *existing = transition.state.clone(),
                None => states.push(transition.state.clone()),
            }
        }
    }
}
