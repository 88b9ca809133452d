//! 簡單工地物料帳示例

use anyhow::Context;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use stock_ledger::core::SystemClock;
use stock_ledger::service::{MemoryAlertRuleStore, MemoryCatalog, MemoryOperationStore};
use stock_ledger::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== 簡單工地物料帳示例 ===\n");

    // 物料目錄
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.insert(
        MaterialProfile::new("CEMENT-42", "Portland cement 42.5")
            .with_project_id("SITE-A")
            .with_max_stock_level(Decimal::from(200))
            .with_expires_at(Utc::now() + Duration::days(5)),
    )?;

    let config = LedgerConfig::from_json_str(r#"{ "future_skew_seconds": 120 }"#)
        .context("載入庫存帳配置失敗")?;

    let service = StockService::new(
        Arc::new(MemoryOperationStore::new()),
        Arc::new(MemoryAlertRuleStore::new()),
        catalog,
        Arc::new(SystemClock),
        config,
    );

    let foreman = Actor::operator("foreman");
    let manager = Actor::manager("site-manager");

    // 警示規則
    let rules = service.create_project_rules("SITE-A", None, &manager)?;
    service.save_rule(StockAlertRule::out_of_stock("CEMENT-42"), &manager)?;
    service.save_rule(StockAlertRule::expiring("CEMENT-42", 7), &manager)?;
    println!("已建立 {} 條專案低庫存規則", rules.len());

    // 異動
    let now = Utc::now();
    let movements = [
        (OperationType::Reception, 100, 180),
        (OperationType::Consumption, 30, 120),
        (OperationType::Consumption, 80, 60),
        (OperationType::Consumption, 45, 30),
        (OperationType::Return, 5, 10),
    ];

    println!("\n異動紀錄:");
    for (operation_type, qty, minutes_ago) in movements {
        let candidate = NewMaterialOperation::new(
            "CEMENT-42",
            operation_type,
            Decimal::from(qty),
            now - Duration::minutes(minutes_ago),
            "",
        )
        .with_project_id("SITE-A");

        match service.record_operation(candidate, &foreman)? {
            RecordOutcome::Accepted { operation, balance, .. } => println!(
                "  ✓ {} {} {:>4} → 結存 {}",
                operation.id, operation.operation_type, operation.quantity, balance
            ),
            RecordOutcome::Rejected { reason } => {
                println!("  ✗ {} {:>4} 被拒絕: {}", operation_type, qty, reason)
            }
        }
    }

    // 警示輪詢
    println!("\n警示:");
    for transition in service.check_dirty_alerts()? {
        match &transition.alert {
            Some(alert) => println!(
                "  - {:?} {} {}（庫存 {}，門檻 {}）",
                transition.kind, alert.material_id, alert.alert_type, alert.quantity, alert.threshold
            ),
            None => println!("  - {:?} 規則 {}", transition.kind, transition.rule_id),
        }
    }

    let stats = service.operation_stats("CEMENT-42")?;
    println!(
        "\n統計: 入庫 {} 筆 / 領用 {} 筆 / 退料 {} 筆，淨增減 {}",
        stats.reception.count,
        stats.consumption.count,
        stats.returned.count,
        stats.net_quantity()
    );

    let project = service.project_operation_stats("SITE-A")?;
    println!("專案 SITE-A 入庫金額: {}", project.reception_value);

    println!("\n最近三筆領用:");
    let recent = service.operation_history(
        &OperationQuery::new()
            .with_project_id("SITE-A")
            .with_operation_type(OperationType::Consumption)
            .with_page(0, 3),
    )?;
    for op in recent {
        println!("  {} {} {}", op.id, op.occurred_at.format("%H:%M"), op.quantity);
    }

    let state = service.stock_state(&StockScope::project("CEMENT-42", "SITE-A"))?;
    println!("目前庫存: {}", state.quantity);

    Ok(())
}
