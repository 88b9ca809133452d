//! 外部協作者介面（儲存層、物料目錄）

use stock_core::{
    MaterialOperation, MaterialProfile, NewMaterialOperation, OperationId, OperationQuery, Result,
    ScopeVersion, StockAlertRule, StockAlertState, StockScope,
};
use uuid::Uuid;

/// 範圍內的操作與讀取當下的版本
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeOperations {
    pub operations: Vec<MaterialOperation>,
    pub version: ScopeVersion,
}

/// 異動操作儲存
///
/// 每個範圍有一個版本號，追加或刪除該範圍的操作時遞增。
/// `append_operation` / `remove_operation` 以呼叫端讀到的版本做比較後寫入
/// （compare-and-set），不一致時回傳 `StockError::Conflict`。
pub trait OperationStore: Send + Sync {
    /// 原子地讀取範圍內的全部操作與目前版本
    fn load_scope(&self, scope: &StockScope) -> Result<ScopeOperations>;

    /// 列出範圍內的全部操作
    fn list_operations(&self, scope: &StockScope) -> Result<Vec<MaterialOperation>> {
        Ok(self.load_scope(scope)?.operations)
    }

    /// 列出物料在所有範圍的操作
    fn list_material_operations(&self, material_id: &str) -> Result<Vec<MaterialOperation>>;

    /// 依條件查詢（由新到舊，含分頁）
    fn query_operations(&self, query: &OperationQuery) -> Result<Vec<MaterialOperation>>;

    fn get_operation(&self, operation_id: OperationId) -> Result<Option<MaterialOperation>>;

    /// 追加操作並配發ID
    fn append_operation(
        &self,
        operation: NewMaterialOperation,
        expected_version: ScopeVersion,
    ) -> Result<MaterialOperation>;

    /// 刪除操作（僅供管理者稽核流程使用）
    fn remove_operation(
        &self,
        operation_id: OperationId,
        expected_version: ScopeVersion,
    ) -> Result<MaterialOperation>;
}

/// 警示規則與狀態儲存
pub trait AlertRuleStore: Send + Sync {
    fn list_rules(&self, material_id: &str) -> Result<Vec<StockAlertRule>>;

    fn get_rule(&self, rule_id: Uuid) -> Result<Option<StockAlertRule>>;

    /// 新增或覆蓋規則
    fn save_rule(&self, rule: StockAlertRule) -> Result<()>;

    fn get_alert_state(&self, rule_id: Uuid) -> Result<Option<StockAlertState>>;

    fn save_alert_state(&self, state: StockAlertState) -> Result<()>;

    /// 刪除規則，回傳被刪除的規則
    fn delete_rule(&self, rule_id: Uuid) -> Result<Option<StockAlertRule>>;

    fn delete_alert_state(&self, rule_id: Uuid) -> Result<()>;
}

/// 物料目錄
pub trait MaterialCatalog: Send + Sync {
    fn material(&self, material_id: &str) -> Result<Option<MaterialProfile>>;

    fn project_materials(&self, project_id: &str) -> Result<Vec<MaterialProfile>>;
}
