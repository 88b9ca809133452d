//! 庫存帳配置模型

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Result, StockError};

/// 負庫存處理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeStockPolicy {
    /// 拒絕任何會造成負結存的操作（預設）
    #[default]
    Reject,
    /// 允許負結存（欠料/後補）
    Allow,
}

/// 庫存帳配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// 負庫存策略
    ///
    /// 使用場景：
    /// - Reject：實體倉庫、工地現場庫存
    /// - Allow：先領後補的欠料流程
    pub negative_stock_policy: NegativeStockPolicy,

    /// 允許操作發生時間超前目前時間的秒數（時鐘誤差容忍）
    pub future_skew_seconds: i64,

    /// 批次建立低庫存規則時，門檻佔最大庫存量的百分比
    pub default_low_stock_percent: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            negative_stock_policy: NegativeStockPolicy::Reject,
            future_skew_seconds: 300,
            default_low_stock_percent: Decimal::from(20),
        }
    }
}

impl LedgerConfig {
    /// 創建預設配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 從 JSON 載入配置（缺少的欄位使用預設值）
    ///
    /// # 範例
    /// ```
    /// # use stock_core::{LedgerConfig, NegativeStockPolicy};
    /// let config = LedgerConfig::from_json_str(r#"{ "negative_stock_policy": "allow" }"#).unwrap();
    /// assert_eq!(config.negative_stock_policy, NegativeStockPolicy::Allow);
    /// assert_eq!(config.future_skew_seconds, 300);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| StockError::Configuration(format!("無法解析庫存帳配置: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 建構器模式：設置負庫存策略
    pub fn with_negative_stock_policy(mut self, policy: NegativeStockPolicy) -> Self {
        self.negative_stock_policy = policy;
        self
    }

    /// 建構器模式：設置時鐘誤差容忍秒數
    pub fn with_future_skew_seconds(mut self, seconds: i64) -> Self {
        self.future_skew_seconds = seconds;
        self
    }

    /// 建構器模式：設置低庫存百分比
    pub fn with_default_low_stock_percent(mut self, percent: Decimal) -> Self {
        self.default_low_stock_percent = percent;
        self
    }

    pub fn allows_negative(&self) -> bool {
        self.negative_stock_policy == NegativeStockPolicy::Allow
    }

    pub fn future_skew(&self) -> Duration {
        Duration::seconds(self.future_skew_seconds)
    }

    /// 檢查配置值
    pub fn validate(&self) -> Result<()> {
        if self.future_skew_seconds < 0 {
            return Err(StockError::Configuration(format!(
                "時鐘誤差容忍不可為負數: {}",
                self.future_skew_seconds
            )));
        }

        if self.default_low_stock_percent <= Decimal::ZERO
            || self.default_low_stock_percent > Decimal::ONE_HUNDRED
        {
            return Err(StockError::Configuration(format!(
                "低庫存百分比必須介於 0 與 100 之間: {}",
                self.default_low_stock_percent
            )));
        }

        Ok(())
    }
}
