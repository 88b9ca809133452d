//! 異動查詢條件

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::operation::{MaterialOperation, OperationType};

/// 異動查詢
///
/// 所有條件皆為 AND；結果依發生時間由新到舊排序（同時間依ID由大到小），
/// 再套用 `offset` / `limit` 分頁。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationQuery {
    pub material_id: Option<String>,
    pub project_id: Option<String>,
    pub operation_type: Option<OperationType>,
    /// 發生時間下限（含）
    pub from: Option<DateTime<Utc>>,
    /// 發生時間上限（不含）
    pub to: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl OperationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_material_id(mut self, material_id: impl Into<String>) -> Self {
        self.material_id = Some(material_id.into());
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_operation_type(mut self, operation_type: OperationType) -> Self {
        self.operation_type = Some(operation_type);
        self
    }

    /// 建構器模式：設置時間區間 [from, to)
    pub fn with_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// 建構器模式：設置分頁
    pub fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// 檢查操作是否符合篩選條件（不含分頁）
    pub fn matches(&self, op: &MaterialOperation) -> bool {
        self.material_id.as_deref().map_or(true, |m| op.material_id == m)
            && self
                .project_id
                .as_deref()
                .map_or(true, |p| op.project_id.as_deref() == Some(p))
            && self.operation_type.map_or(true, |t| op.operation_type == t)
            && self.from.map_or(true, |from| op.occurred_at >= from)
            && self.to.map_or(true, |to| op.occurred_at < to)
    }

    /// 篩選、排序並分頁
    pub fn apply<'a, I>(&self, operations: I) -> Vec<MaterialOperation>
    where
        I: IntoIterator<Item = &'a MaterialOperation>,
    {
        let mut matched: Vec<&MaterialOperation> =
            operations.into_iter().filter(|op| self.matches(op)).collect();
        matched.sort_by(|a, b| (b.occurred_at, b.id).cmp(&(a.occurred_at, a.id)));

        matched
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{NewMaterialOperation, OperationId};
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, d, 8, 0, 0).unwrap()
    }

    fn history() -> Vec<MaterialOperation> {
        [
            (OperationType::Reception, Some("SITE-A"), 1),
            (OperationType::Consumption, Some("SITE-A"), 2),
            (OperationType::Consumption, None, 3),
            (OperationType::Return, Some("SITE-A"), 4),
            (OperationType::Consumption, Some("SITE-A"), 4),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (operation_type, project, d))| {
            let op = NewMaterialOperation::new(
                "CEMENT-42",
                operation_type,
                Decimal::from(10),
                day(d),
                "ion",
            );
            let op = match project {
                Some(p) => op.with_project_id(p),
                None => op,
            };
            op.into_operation(OperationId(i as u64 + 1))
        })
        .collect()
    }

    fn ids(ops: &[MaterialOperation]) -> Vec<u64> {
        ops.iter().map(|op| op.id.0).collect()
    }

    #[test]
    fn test_newest_first_with_id_tie_break() {
        let ops = history();
        assert_eq!(ids(&OperationQuery::new().apply(&ops)), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_type_and_project_filter() {
        let ops = history();
        let query = OperationQuery::new()
            .with_project_id("SITE-A")
            .with_operation_type(OperationType::Consumption);

        assert_eq!(ids(&query.apply(&ops)), vec![5, 2]);
    }

    #[test]
    fn test_range_is_half_open() {
        let ops = history();
        let query = OperationQuery::new().with_range(day(2), day(4));

        assert_eq!(ids(&query.apply(&ops)), vec![3, 2]);

        let widened = OperationQuery::new().with_range(day(2), day(4) + Duration::seconds(1));
        assert_eq!(ids(&widened.apply(&ops)), vec![5, 4, 3, 2]);
    }

    #[test]
    fn test_paging() {
        let ops = history();

        assert_eq!(ids(&OperationQuery::new().with_page(0, 2).apply(&ops)), vec![5, 4]);
        assert_eq!(ids(&OperationQuery::new().with_page(4, 2).apply(&ops)), vec![1]);
        assert!(OperationQuery::new().with_page(9, 2).apply(&ops).is_empty());
    }

    #[test]
    fn test_query_from_json() {
        let query: OperationQuery =
            serde_json::from_str(r#"{ "operation_type": "consumption", "limit": 20 }"#).unwrap();

        assert_eq!(query.operation_type, Some(OperationType::Consumption));
        assert_eq!(query.limit, Some(20));
        assert_eq!(query.offset, 0);
    }
}
