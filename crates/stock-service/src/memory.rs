//! 記憶體內的儲存實作（測試與示範用）

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, RwLock};
use stock_core::{
    MaterialOperation, MaterialProfile, NewMaterialOperation, OperationId, OperationQuery, Result,
    ScopeVersion, StockAlertRule, StockAlertState, StockError, StockScope,
};
use uuid::Uuid;

use crate::store::{AlertRuleStore, MaterialCatalog, OperationStore, ScopeOperations};

#[derive(Debug, Default)]
struct OperationLog {
    last_id: u64,
    operations: Vec<MaterialOperation>,
    versions: HashMap<StockScope, ScopeVersion>,
}

impl OperationLog {
    fn version(&self, scope: &StockScope) -> ScopeVersion {
        self.versions.get(scope).copied().unwrap_or_default()
    }

    fn check_expected(&self, scope: &StockScope, expected: ScopeVersion) -> Result<()> {
        let actual = self.version(scope);
        if actual != expected {
            return Err(StockError::Conflict {
                scope: scope.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn bump(&mut self, scope: StockScope) {
        let version = self.versions.entry(scope).or_default();
        *version = version.next();
    }
}

/// 記憶體異動儲存
#[derive(Debug, Default)]
pub struct MemoryOperationStore {
    log: Mutex<OperationLog>,
}

impl MemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, OperationLog>> {
        self.log
            .lock()
            .map_err(|_| StockError::Storage("異動儲存鎖已損壞".to_string()))
    }
}

impl OperationStore for MemoryOperationStore {
    fn load_scope(&self, scope: &StockScope) -> Result<ScopeOperations> {
        let log = self.lock()?;
        Ok(ScopeOperations {
            operations: log
                .operations
                .iter()
                .filter(|op| op.belongs_to(scope))
                .cloned()
                .collect(),
            version: log.version(scope),
        })
    }

    fn list_material_operations(&self, material_id: &str) -> Result<Vec<MaterialOperation>> {
        let log = self.lock()?;
        Ok(log
            .operations
            .iter()
            .filter(|op| op.material_id == material_id)
            .cloned()
            .collect())
    }

    fn query_operations(&self, query: &OperationQuery) -> Result<Vec<MaterialOperation>> {
        let log = self.lock()?;
        Ok(query.apply(&log.operations))
    }

    fn get_operation(&self, operation_id: OperationId) -> Result<Option<MaterialOperation>> {
        let log = self.lock()?;
        Ok(log.operations.iter().find(|op| op.id == operation_id).cloned())
    }

    fn append_operation(
        &self,
        operation: NewMaterialOperation,
        expected_version: ScopeVersion,
    ) -> Result<MaterialOperation> {
        let mut log = self.lock()?;
        let scope = operation.scope();
        log.check_expected(&scope, expected_version)?;

        log.last_id += 1;
        let recorded = operation.into_operation(OperationId(log.last_id));
        log.operations.push(recorded.clone());
        log.bump(scope);
        Ok(recorded)
    }

    fn remove_operation(
        &self,
        operation_id: OperationId,
        expected_version: ScopeVersion,
    ) -> Result<MaterialOperation> {
        let mut log = self.lock()?;
        let index = log
            .operations
            .iter()
            .position(|op| op.id == operation_id)
            .ok_or_else(|| StockError::NotFound(format!("操作 {operation_id}")))?;

        let scope = log.operations[index].scope();
        log.check_expected(&scope, expected_version)?;

        let removed = log.operations.remove(index);
        log.bump(scope);
        Ok(removed)
    }
}

/// 記憶體警示規則儲存
#[derive(Debug, Default)]
pub struct MemoryAlertRuleStore {
    rules: RwLock<Vec<StockAlertRule>>,
    states: RwLock<HashMap<Uuid, StockAlertState>>,
}

impl MemoryAlertRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StockError {
    StockError::Storage("警示儲存鎖已損壞".to_string())
}

impl AlertRuleStore for MemoryAlertRuleStore {
    fn list_rules(&self, material_id: &str) -> Result<Vec<StockAlertRule>> {
        let rules = self.rules.read().map_err(poisoned)?;
        Ok(rules
            .iter()
            .filter(|r| r.material_id == material_id)
            .cloned()
            .collect())
    }

    fn get_rule(&self, rule_id: Uuid) -> Result<Option<StockAlertRule>> {
        let rules = self.rules.read().map_err(poisoned)?;
        Ok(rules.iter().find(|r| r.id == rule_id).cloned())
    }

    fn save_rule(&self, rule: StockAlertRule) -> Result<()> {
        let mut rules = self.rules.write().map_err(poisoned)?;
        match rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
        Ok(())
    }

    fn get_alert_state(&self, rule_id: Uuid) -> Result<Option<StockAlertState>> {
        let states = self.states.read().map_err(poisoned)?;
        Ok(states.get(&rule_id).cloned())
    }

    fn save_alert_state(&self, state: StockAlertState) -> Result<()> {
        let mut states = self.states.write().map_err(poisoned)?;
        states.insert(state.rule_id, state);
        Ok(())
    }

    fn delete_rule(&self, rule_id: Uuid) -> Result<Option<StockAlertRule>> {
        let mut rules = self.rules.write().map_err(poisoned)?;
        Ok(rules
            .iter()
            .position(|r| r.id == rule_id)
            .map(|index| rules.remove(index)))
    }

    fn delete_alert_state(&self, rule_id: Uuid) -> Result<()> {
        let mut states = self.states.write().map_err(poisoned)?;
        states.remove(&rule_id);
        Ok(())
    }
}

/// 記憶體物料目錄
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    materials: RwLock<Vec<MaterialProfile>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新增或覆蓋物料
    pub fn insert(&self, profile: MaterialProfile) -> Result<()> {
        let mut materials = self.materials.write().map_err(poisoned)?;
        match materials
            .iter_mut()
            .find(|m| m.material_id == profile.material_id)
        {
            Some(existing) => *existing = profile,
            None => materials.push(profile),
        }
        Ok(())
    }
}

impl MaterialCatalog for MemoryCatalog {
    fn material(&self, material_id: &str) -> Result<Option<MaterialProfile>> {
        let materials = self.materials.read().map_err(poisoned)?;
        Ok(materials
            .iter()
            .find(|m| m.material_id == material_id)
            .cloned())
    }

    fn project_materials(&self, project_id: &str) -> Result<Vec<MaterialProfile>> {
        let materials = self.materials.read().map_err(poisoned)?;
        Ok(materials
            .iter()
            .filter(|m| m.project_id.as_deref() == Some(project_id))
            .cloned()
            .collect())
    }
}
