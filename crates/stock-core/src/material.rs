//! 物料主檔（由外部物料目錄提供）

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// 物料主檔
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProfile {
    /// 物料ID
    pub material_id: String,

    /// 所屬專案（None = 倉庫物料）
    pub project_id: Option<String>,

    /// 名稱
    pub name: String,

    /// 最大庫存量
    pub max_stock_level: Option<Decimal>,

    /// 到期日
    pub expires_at: Option<DateTime<Utc>>,
}

impl MaterialProfile {
    pub fn new(material_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            material_id: material_id.into(),
            project_id: None,
            name: name.into(),
            max_stock_level: None,
            expires_at: None,
        }
    }

    /// 建構器模式：設置專案
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// 建構器模式：設置最大庫存量
    pub fn with_max_stock_level(mut self, level: Decimal) -> Self {
        self.max_stock_level = Some(level);
        self
    }

    /// 建構器模式：設置到期日
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// 依最大庫存量的百分比計算低庫存門檻（四捨五入到整數）
    pub fn low_stock_threshold(&self, percent: Decimal) -> Option<Decimal> {
        self.max_stock_level.map(|max| {
            (max * percent / Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        })
    }
}
