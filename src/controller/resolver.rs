use std::sync::Arc;

use super::error::ControlError;
use crate::registry::{TaskDetails, TaskHandle, TaskId, TaskRegistry};

/// 标识到任务句柄的查找。不做任何缓存，存活与否以注册表为准。
#[derive(Clone)]
pub struct TaskResolver {
    registry: Arc<dyn TaskRegistry>,
}

impl TaskResolver {
    pub fn new(registry: Arc<dyn TaskRegistry>) -> Self {
        Self { registry }
    }

    pub fn resolve(&self, id: &TaskId) -> Result<TaskHandle, ControlError> {
        self.registry
            .lookup(id)
            .ok_or_else(|| ControlError::LookupMiss(id.clone()))
    }

    // 查找与读取之间任务可能被删除，两步都可能落空
    pub fn details(&self, id: &TaskId) -> Result<TaskDetails, ControlError> {
        let handle = self.resolve(id)?;
        self.registry
            .details(&handle)
            .ok_or_else(|| ControlError::LookupMiss(id.clone()))
    }
}
