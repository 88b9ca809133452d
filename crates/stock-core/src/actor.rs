//! 操作者與角色

use serde::{Deserialize, Serialize};

use crate::{Result, StockError};

/// 角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// 現場人員：可記錄異動、確認警示
    Operator,
    /// 管理者：另可修改/刪除異動、維護警示規則
    Manager,
}

/// 呼叫端身分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn operator(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Operator,
        }
    }

    pub fn manager(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Manager,
        }
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }

    /// 要求管理者權限
    pub fn require_manager(&self, action: &str) -> Result<()> {
        if self.is_manager() {
            Ok(())
        } else {
            Err(StockError::Unauthorized(format!(
                "使用者 {} 無權執行: {}",
                self.user_id, action
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_manager() {
        assert!(Actor::manager("maria").require_manager("刪除操作").is_ok());

        let err = Actor::operator("ion").require_manager("刪除操作").unwrap_err();
        assert!(matches!(err, StockError::Unauthorized(_)));
    }
}
