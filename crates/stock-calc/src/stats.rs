//! 異動統計

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stock_core::{MaterialOperation, OperationType};

use crate::ledger::effective_operations;

/// 單一操作類型的合計
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeTotals {
    pub count: usize,
    pub quantity: Decimal,
}

impl TypeTotals {
    fn add(&mut self, quantity: Decimal) {
        self.count += 1;
        self.quantity += quantity;
    }
}

/// 異動統計
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    /// 入庫
    pub reception: TypeTotals,
    /// 領用
    pub consumption: TypeTotals,
    /// 退料
    pub returned: TypeTotals,
    /// 入庫金額（有單價者）
    pub reception_value: Decimal,
}

impl OperationStats {
    /// 統計有效操作（被取代的舊版本不計）
    pub fn collect(operations: &[MaterialOperation]) -> Self {
        let mut stats = Self::default();

        for op in effective_operations(operations) {
            match op.operation_type {
                OperationType::Reception => {
                    stats.reception.add(op.quantity);
                    if let Some(value) = op.value() {
                        stats.reception_value += value;
                    }
                }
                OperationType::Consumption => stats.consumption.add(op.quantity),
                OperationType::Return => stats.returned.add(op.quantity),
            }
        }

        stats
    }

    pub fn operation_count(&self) -> usize {
        self.reception.count + self.consumption.count + self.returned.count
    }

    /// 淨增減量
    pub fn net_quantity(&self) -> Decimal {
        self.reception.quantity + self.returned.quantity - self.consumption.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use stock_core::{NewMaterialOperation, OperationId};

    #[test]
    fn test_collect_stats() {
        let at = Utc.with_ymd_and_hms(2025, 11, 1, 8, 0, 0).unwrap();
        let mk = |id: u64, t: OperationType, qty: i64| {
            NewMaterialOperation::new("PAINT-7", t, Decimal::from(qty), at, "ion")
                .into_operation(OperationId(id))
        };

        let mut priced = mk(1, OperationType::Reception, 40);
        priced.unit_price = Some(Decimal::new(250, 2));
        let mut amended = mk(5, OperationType::Consumption, 12);
        amended.supersedes = Some(OperationId(3));

        let ops = vec![
            priced,
            mk(2, OperationType::Reception, 10),
            mk(3, OperationType::Consumption, 15),
            mk(4, OperationType::Return, 2),
            amended,
        ];

        let stats = OperationStats::collect(&ops);

        assert_eq!(stats.operation_count(), 4);
        assert_eq!(stats.reception.count, 2);
        assert_eq!(stats.reception.quantity, Decimal::from(50));
        assert_eq!(stats.consumption.quantity, Decimal::from(12));
        assert_eq!(stats.returned.quantity, Decimal::from(2));
        assert_eq!(stats.reception_value, Decimal::from(100));
        assert_eq!(stats.net_quantity(), Decimal::from(40));
    }
}
