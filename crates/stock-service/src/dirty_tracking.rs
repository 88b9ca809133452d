//! 髒標記追蹤
//!
//! 記錄自上次警示檢查後有異動或規則變更的物料，供輪詢時只檢查必要的物料。

use std::collections::BTreeSet;

/// 髒標記追蹤器
#[derive(Debug, Default)]
pub struct DirtyTracker {
    dirty_materials: BTreeSet<String>,
}

impl DirtyTracker {
    /// 創建新的追蹤器
    pub fn new() -> Self {
        Self::default()
    }

    /// 標記物料為髒
    pub fn mark_dirty(&mut self, material_id: impl Into<String>) {
        self.dirty_materials.insert(material_id.into());
    }

    /// 清除單一物料的髒標記
    pub fn mark_clean(&mut self, material_id: &str) {
        self.dirty_materials.remove(material_id);
    }

    /// 檢查物料是否為髒
    pub fn is_dirty(&self, material_id: &str) -> bool {
        self.dirty_materials.contains(material_id)
    }

    /// 清除所有髒標記
    pub fn clear(&mut self) {
        self.dirty_materials.clear();
    }

    /// 獲取所有髒物料（依ID排序）
    pub fn dirty_materials(&self) -> Vec<String> {
        self.dirty_materials.iter().cloned().collect()
    }

    /// 取出並清除所有髒物料
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.dirty_materials).into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty_materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_take() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_dirty("SAND-1");
        tracker.mark_dirty("CEMENT-42");
        tracker.mark_dirty("SAND-1");

        assert!(tracker.is_dirty("CEMENT-42"));
        assert_eq!(tracker.dirty_materials(), vec!["CEMENT-42", "SAND-1"]);

        let taken = tracker.take();
        assert_eq!(taken, vec!["CEMENT-42", "SAND-1"]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_mark_clean() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_dirty("CEMENT-42");
        tracker.mark_clean("CEMENT-42");
        assert!(!tracker.is_dirty("CEMENT-42"));

        tracker.mark_dirty("SAND-1");
        tracker.clear();
        assert!(tracker.is_empty());
    }
}
