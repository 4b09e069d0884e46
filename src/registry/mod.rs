use std::sync::Arc;

pub mod error;
pub mod models;
pub mod simulated;

pub use error::RegistryError;
pub use models::{
    ProgressCounters, RegistryConfig, SubscriptionId, TaskDetails, TaskEvent, TaskEventKind,
    TaskHandle, TaskId, TaskStatus, Validation,
};
pub use simulated::SimulatedRegistry;

/// 回调接收端。注册表可能在任意线程调用它，实现方只应把事件转交出去。
pub type EventSink = Arc<dyn Fn(TaskEvent) + Send + Sync>;

/// 外部任务注册表：持有所有任务的实时状态、并发策略与命令执行。
///
/// 所有命令立即返回，真实的状态变化通过订阅回调异步到达。
pub trait TaskRegistry: Send + Sync {
    fn list_tasks(&self) -> Vec<TaskId>;
    fn lookup(&self, id: &TaskId) -> Option<TaskHandle>;

    // 句柄失效（任务已被删除或重建）时返回 None
    fn status(&self, handle: &TaskHandle) -> Option<TaskStatus>;
    fn progress(&self, handle: &TaskHandle) -> Option<ProgressCounters>;
    fn details(&self, handle: &TaskHandle) -> Option<TaskDetails>;

    /// 订阅单个任务的 progress / success / failure 回调流
    fn subscribe(&self, handle: &TaskHandle, sink: EventSink) -> Option<SubscriptionId>;
    /// 订阅所有任务的回调流（含新任务创建）
    fn subscribe_all(&self, sink: EventSink) -> SubscriptionId;
    fn unsubscribe(&self, subscription: SubscriptionId);

    fn start(&self, id: &TaskId);
    fn suspend(&self, id: &TaskId);
    fn cancel(&self, id: &TaskId);
    fn remove(&self, id: &TaskId, completely: bool);

    fn total_start(&self);
    fn total_suspend(&self);
    fn total_cancel(&self);
    fn total_remove(&self, completely: bool);

    fn clear_disk_cache(&self);

    fn configuration(&self) -> RegistryConfig;
    fn set_max_concurrent_tasks(&self, limit: usize);
    fn set_allows_cellular_access(&self, allowed: bool);
}
