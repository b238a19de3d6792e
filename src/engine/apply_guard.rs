// ==========================================
// 供应商价格导入 - 应用互斥
// ==========================================
// 约束: 同一模板同时最多一个 applyPrices 在执行
// 第二个调用立即被拒绝（不排队），由调用方决定是否重试
// ==========================================

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Clone, Default)]
pub struct ApplyGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// 持有期间该模板处于“应用中”，Drop 时释放
pub struct ApplyPermit {
    template_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ApplyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试占用模板；已被占用时返回 None
    pub fn try_acquire(&self, template_id: &str) -> Option<ApplyPermit> {
        let mut set = match self.in_flight.lock() {
            Ok(guard) => guard,
            // 持锁线程 panic 后集合本身仍然一致
            Err(poisoned) => poisoned.into_inner(),
        };
        if !set.insert(template_id.to_string()) {
            debug!(template_id, "模板已有应用在执行");
            return None;
        }
        Some(ApplyPermit {
            template_id: template_id.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_in_flight(&self, template_id: &str) -> bool {
        match self.in_flight.lock() {
            Ok(set) => set.contains(template_id),
            Err(poisoned) => poisoned.into_inner().contains(template_id),
        }
    }
}

impl ApplyPermit {
    pub fn template_id(&self) -> &str {
        &self.template_id
    }
}

impl Drop for ApplyPermit {
    fn drop(&mut self) {
        let mut set = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.remove(&self.template_id);
    }
}
