//! 庫存警示規則與狀態模型

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Result, StockError};

/// 警示類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// 低庫存（0 < 數量 <= 門檻）
    LowStock,
    /// 缺貨（數量 <= 0）
    OutOfStock,
    /// 即將到期（距到期日 <= 門檻天數）
    Expiring,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LowStock => "low_stock",
            AlertType::OutOfStock => "out_of_stock",
            AlertType::Expiring => "expiring",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = StockError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "low_stock" => Ok(AlertType::LowStock),
            "out_of_stock" => Ok(AlertType::OutOfStock),
            "expiring" => Ok(AlertType::Expiring),
            other => Err(StockError::Configuration(format!("未知的警示類型: {other}"))),
        }
    }
}

/// 庫存警示規則
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlertRule {
    /// 規則ID
    pub id: Uuid,

    /// 物料ID
    pub material_id: String,

    /// 警示類型
    pub alert_type: AlertType,

    /// 門檻（數量，或到期前天數）
    pub threshold: Decimal,

    /// 是否啟用
    pub enabled: bool,
}

impl StockAlertRule {
    /// 創建新的警示規則（預設啟用）
    pub fn new(material_id: impl Into<String>, alert_type: AlertType, threshold: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            material_id: material_id.into(),
            alert_type,
            threshold,
            enabled: true,
        }
    }

    pub fn low_stock(material_id: impl Into<String>, threshold: Decimal) -> Self {
        Self::new(material_id, AlertType::LowStock, threshold)
    }

    pub fn out_of_stock(material_id: impl Into<String>) -> Self {
        Self::new(material_id, AlertType::OutOfStock, Decimal::ZERO)
    }

    pub fn expiring(material_id: impl Into<String>, days: u32) -> Self {
        Self::new(material_id, AlertType::Expiring, Decimal::from(days))
    }

    /// 建構器模式：設置是否啟用
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 建構器模式：指定規則ID
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// 到期警示的門檻天數
    pub fn threshold_days(&self) -> Option<i64> {
        match self.alert_type {
            AlertType::Expiring => self.threshold.trunc().to_i64(),
            _ => None,
        }
    }

    /// 到期警示的時間窗；天數無法表示為時間長度時為 None
    pub fn expiry_window(&self) -> Option<Duration> {
        self.threshold_days().and_then(Duration::try_days)
    }

    /// 儲存前的規則檢查
    ///
    /// 評估時不再檢查規則格式，錯誤必須在此攔下。
    pub fn validate(&self) -> Result<()> {
        if self.material_id.trim().is_empty() {
            return Err(StockError::Configuration("規則缺少物料ID".to_string()));
        }

        if self.threshold < Decimal::ZERO {
            return Err(StockError::Configuration(format!(
                "門檻不可為負數: {}",
                self.threshold
            )));
        }

        match self.alert_type {
            AlertType::LowStock if self.threshold.is_zero() => Err(StockError::Configuration(
                "低庫存警示的門檻必須大於 0".to_string(),
            )),
            AlertType::Expiring if !self.threshold.fract().is_zero() => {
                Err(StockError::Configuration(format!(
                    "到期警示的門檻必須為整數天: {}",
                    self.threshold
                )))
            }
            AlertType::Expiring if self.expiry_window().is_none() => Err(
                StockError::Configuration(format!("到期門檻超出範圍: {}", self.threshold)),
            ),
            _ => Ok(()),
        }
    }
}

/// 警示狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// 未觸發
    Inactive,
    /// 已觸發
    Triggered,
    /// 已確認（條件仍成立）
    Acknowledged,
}

impl AlertStatus {
    /// 條件是否仍被視為成立
    pub fn is_active(&self) -> bool {
        matches!(self, AlertStatus::Triggered | AlertStatus::Acknowledged)
    }
}

/// 警示狀態（每條規則至多一筆）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlertState {
    /// 規則ID
    pub rule_id: Uuid,

    /// 狀態
    pub status: AlertStatus,

    /// 最近一次觸發時間
    pub triggered_at: Option<DateTime<Utc>>,

    /// 最近一次解除時間
    pub cleared_at: Option<DateTime<Utc>>,

    /// 最近一次確認時間
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl StockAlertState {
    /// 初始狀態
    pub fn inactive(rule_id: Uuid) -> Self {
        Self {
            rule_id,
            status: AlertStatus::Inactive,
            triggered_at: None,
            cleared_at: None,
            acknowledged_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
