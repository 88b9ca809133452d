//! 依物料主檔批次產生警示規則

use rust_decimal::Decimal;
use stock_core::{MaterialProfile, StockAlertRule, StockError};

/// 為專案物料產生低庫存規則
///
/// 每個有最大庫存量的物料一條規則，門檻 = round(最大庫存量 × percent / 100)。
/// 門檻四捨五入後為 0 的物料略過。
pub fn rules_for_project(
    profiles: &[MaterialProfile],
    percent: Decimal,
) -> stock_core::Result<Vec<StockAlertRule>> {
    if percent <= Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(StockError::Configuration(format!(
            "低庫存百分比必須介於 0 與 100 之間: {percent}"
        )));
    }

    let mut rules = Vec::new();
    for profile in profiles {
        let Some(threshold) = profile.low_stock_threshold(percent) else {
            tracing::debug!("物料 {} 沒有最大庫存量，跳過", profile.material_id);
            continue;
        };

        if threshold <= Decimal::ZERO {
            tracing::debug!("物料 {} 門檻為 0，跳過", profile.material_id);
            continue;
        }

        let rule = StockAlertRule::low_stock(profile.material_id.clone(), threshold);
        rule.validate()?;
        rules.push(rule);
    }

    Ok(rules)
}
