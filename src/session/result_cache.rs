use std::sync::Arc;

use crate::models::ProcessingResult;

/// 最近一次完成任务的处理结果
///
/// 结果与任务 id 绑定，整体替换，不做部分修改。
#[derive(Debug, Default)]
pub struct ResultCache {
    entry: Option<(String, Arc<ProcessingResult>)>,
}

impl ResultCache {
    pub fn store(&mut self, job_id: &str, result: ProcessingResult) -> Arc<ProcessingResult> {
        let result = Arc::new(result);
        self.entry = Some((job_id.to_string(), Arc::clone(&result)));
        result
    }

    /// 只返回属于 `job_id` 的结果
    pub fn get(&self, job_id: &str) -> Option<Arc<ProcessingResult>> {
        self.entry
            .as_ref()
            .filter(|(owner, _)| owner == job_id)
            .map(|(_, result)| Arc::clone(result))
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}
