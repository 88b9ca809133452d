//! 庫存狀態模型（由異動帳推導，非權威資料）

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OperationId, StockScope};

/// 物料庫存狀態
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialStockState {
    /// 物料ID
    pub material_id: String,

    /// 專案ID（None = 倉庫，或物料跨範圍合計）
    pub project_id: Option<String>,

    /// 現有庫存
    pub quantity: Decimal,

    /// 最後一筆套用的操作
    pub last_operation_id: Option<OperationId>,

    /// 重新計算時間
    pub last_recomputed_at: DateTime<Utc>,

    /// 到期日（有效期物料）
    pub expires_at: Option<DateTime<Utc>>,
}

impl MaterialStockState {
    /// 創建新的庫存狀態
    pub fn new(
        scope: &StockScope,
        quantity: Decimal,
        last_operation_id: Option<OperationId>,
        last_recomputed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            material_id: scope.material_id.clone(),
            project_id: scope.project_id.clone(),
            quantity,
            last_operation_id,
            last_recomputed_at,
            expires_at: None,
        }
    }

    /// 建構器模式：設置到期日
    pub fn with_expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// 合計同一物料在各範圍的庫存
    ///
    /// 警示規則以物料為單位，評估時使用合計後的狀態。
    pub fn material_total(
        material_id: &str,
        parts: &[MaterialStockState],
        at: DateTime<Utc>,
    ) -> Self {
        let quantity = parts
            .iter()
            .filter(|p| p.material_id == material_id)
            .map(|p| p.quantity)
            .sum::<Decimal>();

        let last_operation_id = parts
            .iter()
            .filter(|p| p.material_id == material_id)
            .filter_map(|p| p.last_operation_id)
            .max();

        Self {
            material_id: material_id.to_string(),
            project_id: None,
            quantity,
            last_operation_id,
            last_recomputed_at: at,
            expires_at: None,
        }
    }

    pub fn scope(&self) -> StockScope {
        StockScope::new(self.material_id.clone(), self.project_id.clone())
    }

    /// 檢查是否缺貨
    pub fn is_out_of_stock(&self) -> bool {
        self.quantity <= Decimal::ZERO
    }

    /// 距到期日的時間
    pub fn time_to_expiry(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.expires_at.map(|expires_at| expires_at - now)
    }
}
