//! 物料異動操作模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::StockError;

/// 操作ID（由儲存層依寫入順序遞增配發）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl OperationId {
    /// 下一個ID
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 範圍版本（每次寫入或刪除該範圍的操作時遞增，作為樂觀鎖）
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ScopeVersion(pub u64);

impl ScopeVersion {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ScopeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// 操作類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// 入庫（收貨）
    Reception,
    /// 領用（消耗）
    Consumption,
    /// 退料
    Return,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Reception => "reception",
            OperationType::Consumption => "consumption",
            OperationType::Return => "return",
        }
    }

    /// 是否增加庫存
    pub fn is_inbound(&self) -> bool {
        matches!(self, OperationType::Reception | OperationType::Return)
    }

    /// 將數量轉為對結存的增減量
    pub fn signed(&self, quantity: Decimal) -> Decimal {
        if self.is_inbound() {
            quantity
        } else {
            -quantity
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reception" => Ok(OperationType::Reception),
            "consumption" => Ok(OperationType::Consumption),
            "return" => Ok(OperationType::Return),
            other => Err(StockError::Validation(format!("未知的操作類型: {other}"))),
        }
    }
}

/// 庫存範圍：(物料, 專案)，專案為空代表倉庫層級
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockScope {
    /// 物料ID
    pub material_id: String,

    /// 專案ID（None = 倉庫）
    pub project_id: Option<String>,
}

impl StockScope {
    pub fn new(material_id: impl Into<String>, project_id: Option<String>) -> Self {
        Self {
            material_id: material_id.into(),
            project_id,
        }
    }

    /// 倉庫層級範圍
    pub fn warehouse(material_id: impl Into<String>) -> Self {
        Self::new(material_id, None)
    }

    /// 專案層級範圍
    pub fn project(material_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self::new(material_id, Some(project_id.into()))
    }

    pub fn is_warehouse(&self) -> bool {
        self.project_id.is_none()
    }
}

impl fmt::Display for StockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project_id {
            Some(project_id) => write!(f, "{}@{}", self.material_id, project_id),
            None => write!(f, "{}@warehouse", self.material_id),
        }
    }
}

/// 已記錄的物料異動（不可變）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialOperation {
    /// 操作ID
    pub id: OperationId,

    /// 物料ID
    pub material_id: String,

    /// 專案ID（None = 倉庫）
    pub project_id: Option<String>,

    /// 操作類型
    pub operation_type: OperationType,

    /// 數量（恆為正）
    pub quantity: Decimal,

    /// 單價
    pub unit_price: Option<Decimal>,

    /// 儲位
    pub location: Option<String>,

    /// 備註
    pub notes: Option<String>,

    /// 發生時間
    pub occurred_at: DateTime<Utc>,

    /// 建立者
    pub created_by: String,

    /// 被此操作取代的舊操作（修改 = 追加一筆取代操作）
    pub supersedes: Option<OperationId>,
}

impl MaterialOperation {
    pub fn scope(&self) -> StockScope {
        StockScope::new(self.material_id.clone(), self.project_id.clone())
    }

    /// 檢查是否屬於指定範圍
    pub fn belongs_to(&self, scope: &StockScope) -> bool {
        self.material_id == scope.material_id && self.project_id == scope.project_id
    }

    /// 對結存的增減量
    pub fn delta(&self) -> Decimal {
        self.operation_type.signed(self.quantity)
    }

    /// 金額（數量 × 單價）
    pub fn value(&self) -> Option<Decimal> {
        self.unit_price.map(|price| price * self.quantity)
    }
}

/// 待寫入的物料異動
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMaterialOperation {
    pub material_id: String,
    pub project_id: Option<String>,
    pub operation_type: OperationType,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub created_by: String,
    pub supersedes: Option<OperationId>,

    /// 本次呼叫允許欠料（負庫存）
    #[serde(default)]
    pub backorder: bool,
}

impl NewMaterialOperation {
    /// 創建新的待寫入操作
    pub fn new(
        material_id: impl Into<String>,
        operation_type: OperationType,
        quantity: Decimal,
        occurred_at: DateTime<Utc>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            material_id: material_id.into(),
            project_id: None,
            operation_type,
            quantity,
            unit_price: None,
            location: None,
            notes: None,
            occurred_at,
            created_by: created_by.into(),
            supersedes: None,
            backorder: false,
        }
    }

    /// 建構器模式：設置專案
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// 建構器模式：設置單價
    pub fn with_unit_price(mut self, unit_price: Decimal) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    /// 建構器模式：設置儲位
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// 建構器模式：設置備註
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// 建構器模式：允許本次欠料
    pub fn with_backorder(mut self, backorder: bool) -> Self {
        self.backorder = backorder;
        self
    }

    /// 建構器模式：取代既有操作
    pub fn superseding(mut self, original: OperationId) -> Self {
        self.supersedes = Some(original);
        self
    }

    pub fn scope(&self) -> StockScope {
        StockScope::new(self.material_id.clone(), self.project_id.clone())
    }

    /// 配發ID後轉為已記錄操作
    pub fn into_operation(self, id: OperationId) -> MaterialOperation {
        MaterialOperation {
            id,
            material_id: self.material_id,
            project_id: self.project_id,
            operation_type: self.operation_type,
            quantity: self.quantity,
            unit_price: self.unit_price,
            location: self.location,
            notes: self.notes,
            occurred_at: self.occurred_at,
            created_by: self.created_by,
            supersedes: self.supersedes,
        }
    }
}

/// 表單送來的原始操作（操作類型尚未解析）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDraft {
    pub material_id: String,
    pub project_id: Option<String>,
    pub operation_type: String,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub backorder: bool,
}

impl TryFrom<OperationDraft> for NewMaterialOperation {
    type Error = StockError;

    fn try_from(draft: OperationDraft) -> Result<Self, Self::Error> {
        let operation_type = draft.operation_type.parse::<OperationType>()?;
        Ok(Self {
            material_id: draft.material_id,
            project_id: draft.project_id.filter(|p| !p.trim().is_empty()),
            operation_type,
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            location: draft.location.filter(|l| !l.trim().is_empty()),
            notes: draft.notes.filter(|n| !n.trim().is_empty()),
            occurred_at: draft.occurred_at,
            created_by: draft.created_by,
            supersedes: None,
            backorder: draft.backorder,
        })
    }
}

/// 對既有操作的修改內容
///
/// 修改不會改寫歷史紀錄，而是產生一筆取代原操作的新操作；
/// 物料、專案、類型與發生時間沿用原操作。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationAmendment {
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl OperationAmendment {
    pub fn quantity(quantity: Decimal) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::default()
        }
    }

    /// 產生取代原操作的新操作
    pub fn apply_to(
        &self,
        original: &MaterialOperation,
        created_by: impl Into<String>,
    ) -> NewMaterialOperation {
        NewMaterialOperation {
            material_id: original.material_id.clone(),
            project_id: original.project_id.clone(),
            operation_type: original.operation_type,
            quantity: self.quantity.unwrap_or(original.quantity),
            unit_price: self.unit_price.or(original.unit_price),
            location: self.location.clone().or_else(|| original.location.clone()),
            notes: self.notes.clone().or_else(|| original.notes.clone()),
            occurred_at: original.occurred_at,
            created_by: created_by.into(),
            supersedes: Some(original.id),
            backorder: false,
        }
    }
}
