use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::error::RegistryError;
use super::models::{
    ProgressCounters, RegistryConfig, SubscriptionId, TaskDetails, TaskEvent, TaskEventKind,
    TaskHandle, TaskId, TaskStatus, Validation,
};
use super::{EventSink, TaskRegistry};
use crate::controller::dispatcher::{AggregateAction, TaskCommand};

struct SimTask {
    generation: u64,
    file_name: String,
    status: TaskStatus,
    completed: u64,
    total: u64,
    nominal_rate: u64,
    validation: Validation,
    // 完成时校验会失败
    corrupt: bool,
    start_date: Option<DateTime<Local>>,
    end_date: Option<DateTime<Local>>,
}

impl SimTask {
    fn details(&self, id: &TaskId) -> TaskDetails {
        let rate = if self.status == TaskStatus::Running {
            self.nominal_rate
        } else {
            0
        };
        let remaining = self.total.saturating_sub(self.completed);
        TaskDetails {
            id: id.clone(),
            file_name: self.file_name.clone(),
            status: self.status,
            progress: ProgressCounters {
                completed_units: self.completed,
                total_units: self.total,
                rate,
                time_remaining: (rate > 0).then(|| remaining.div_ceil(rate)),
            },
            validation: self.validation,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

// 事件连同任务的 generation 一起记录，投递时用来匹配单任务订阅
type Emitted = Vec<(u64, TaskEvent)>;

#[derive(Default)]
struct Inner {
    order: Vec<TaskId>,
    tasks: HashMap<TaskId, SimTask>,
    next_generation: u64,
    config: RegistryConfig,
    removals: Vec<(TaskId, bool)>,
    cached_bytes: u64,
}

impl Inner {
    fn running_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|task| task.status == TaskStatus::Running)
            .count()
    }

    fn has_capacity(&self) -> bool {
        self.running_count() < self.config.max_concurrent_tasks
    }

    fn apply(&mut self, id: &TaskId, command: TaskCommand, emitted: &mut Emitted) {
        self.transition(id, command, emitted);
        self.promote_waiting(emitted);
    }

    // 只改变单个任务的状态，不触发等待任务的提升
    fn transition(&mut self, id: &TaskId, command: TaskCommand, emitted: &mut Emitted) {
        let has_capacity = self.has_capacity();
        let Some(task) = self.tasks.get_mut(id) else {
            debug!("命令目标不存在，忽略: {:?} -> {}", command, id);
            return;
        };
        let generation = task.generation;

        match command {
            TaskCommand::Start => {
                if !matches!(
                    task.status,
                    TaskStatus::Waiting
                        | TaskStatus::Suspended
                        | TaskStatus::Failed
                        | TaskStatus::Canceled
                ) {
                    return;
                }
                if has_capacity {
                    task.status = TaskStatus::Running;
                    task.start_date.get_or_insert_with(Local::now);
                    task.end_date = None;
                } else {
                    task.status = TaskStatus::Waiting;
                }
                emitted.push((generation, TaskEvent::new(id.clone(), TaskEventKind::Progress)));
            }
            TaskCommand::Suspend => {
                if !matches!(task.status, TaskStatus::Running | TaskStatus::Waiting) {
                    return;
                }
                task.status = TaskStatus::Suspended;
                emitted.push((
                    generation,
                    TaskEvent::new(id.clone(), TaskEventKind::Failure(TaskStatus::Suspended)),
                ));
            }
            TaskCommand::Cancel => {
                if matches!(
                    task.status,
                    TaskStatus::Succeeded | TaskStatus::Removed | TaskStatus::Canceled
                ) {
                    return;
                }
                task.status = TaskStatus::Canceled;
                task.completed = 0;
                task.validation = Validation::Unknown;
                emitted.push((
                    generation,
                    TaskEvent::new(id.clone(), TaskEventKind::Failure(TaskStatus::Canceled)),
                ));
            }
            TaskCommand::Remove { completely } => {
                if task.status == TaskStatus::Removed {
                    return;
                }
                // 删除是异步的：先标记，下一次 tick 才真正移除并回调确认
                task.status = TaskStatus::Removed;
                self.removals.push((id.clone(), completely));
            }
        }
    }

    fn promote_waiting(&mut self, emitted: &mut Emitted) {
        let mut running = self.running_count();
        for id in &self.order {
            if running >= self.config.max_concurrent_tasks {
                break;
            }
            if let Some(task) = self.tasks.get_mut(id) {
                if task.status == TaskStatus::Waiting {
                    task.status = TaskStatus::Running;
                    task.start_date.get_or_insert_with(Local::now);
                    running += 1;
                    debug!("等待中的任务开始运行: {}", id);
                    emitted.push((task.generation, TaskEvent::new(id.clone(), TaskEventKind::Progress)));
                }
            }
        }
    }

    fn confirm_removals(&mut self, emitted: &mut Emitted) {
        for (id, completely) in std::mem::take(&mut self.removals) {
            let Some(task) = self.tasks.remove(&id) else {
                continue;
            };
            self.order.retain(|existing| existing != &id);
            if !completely {
                // 非彻底删除保留已下载的部分文件
                self.cached_bytes += task.completed;
            }
            info!("任务已删除: {} (彻底: {})", id, completely);
            emitted.push((
                task.generation,
                TaskEvent::new(id, TaskEventKind::Failure(TaskStatus::Removed)),
            ));
        }
    }

    fn advance(&mut self, elapsed: Duration, emitted: &mut Emitted) {
        let now = Local::now();
        for id in &self.order {
            let Some(task) = self.tasks.get_mut(id) else {
                continue;
            };
            if task.status != TaskStatus::Running {
                continue;
            }
            let step = (task.nominal_rate as f64 * elapsed.as_secs_f64()) as u64;
            task.completed = task.completed.saturating_add(step).min(task.total);
            emitted.push((task.generation, TaskEvent::new(id.clone(), TaskEventKind::Progress)));

            if task.completed >= task.total {
                task.status = TaskStatus::Succeeded;
                task.end_date = Some(now);
                task.validation = if task.corrupt {
                    Validation::Incorrect
                } else {
                    Validation::Correct
                };
                self.cached_bytes += task.total;
                info!("✅ 下载任务完成: {}", id);
                emitted.push((task.generation, TaskEvent::new(id.clone(), TaskEventKind::Succeeded)));
            }
        }
    }
}

struct Subscriber {
    target: Option<TaskHandle>,
    sink: EventSink,
}

/// 进程内的模拟注册表：不做网络传输，由 `tick` 推进各任务的进度
pub struct SimulatedRegistry {
    inner: Mutex<Inner>,
    subscribers: DashMap<SubscriptionId, Subscriber>,
}

impl SimulatedRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                config,
                ..Default::default()
            }),
            subscribers: DashMap::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // 在锁内修改状态，释放锁之后再投递回调
    fn with_state<T>(&self, f: impl FnOnce(&mut Inner, &mut Emitted) -> T) -> T {
        let mut emitted = Emitted::new();
        let output = {
            let mut inner = self.state();
            f(&mut inner, &mut emitted)
        };
        self.emit(emitted);
        output
    }

    fn emit(&self, emitted: Emitted) {
        for (generation, event) in emitted {
            let sinks: Vec<EventSink> = self
                .subscribers
                .iter()
                .filter(|entry| match &entry.target {
                    None => true,
                    Some(handle) => handle.id == event.id && handle.generation == generation,
                })
                .map(|entry| entry.sink.clone())
                .collect();
            for sink in sinks {
                sink(event.clone());
            }
        }
    }

    /// 新建下载任务；同一 URL 的任务已存在时直接返回它的标识
    pub fn download(
        &self,
        url: &str,
        total_units: u64,
        rate: u64,
    ) -> Result<TaskId, RegistryError> {
        let parsed = url::Url::parse(url)?;
        let id = TaskId::new(parsed.as_str());

        self.with_state(|inner, emitted| {
            if inner.tasks.contains_key(&id) {
                debug!("任务已存在: {}", id);
                return Ok(id.clone());
            }

            let generation = inner.next_generation;
            inner.next_generation += 1;
            let running = inner.has_capacity();
            let task = SimTask {
                generation,
                file_name: id.file_name(),
                status: if running {
                    TaskStatus::Running
                } else {
                    TaskStatus::Waiting
                },
                completed: 0,
                total: total_units,
                nominal_rate: rate,
                validation: Validation::Unknown,
                corrupt: false,
                start_date: running.then(Local::now),
                end_date: None,
            };
            info!("添加下载任务: {} ({})", id, task.status);
            inner.tasks.insert(id.clone(), task);
            inner.order.push(id.clone());
            emitted.push((generation, TaskEvent::new(id.clone(), TaskEventKind::Created)));
            emitted.push((generation, TaskEvent::new(id.clone(), TaskEventKind::Progress)));
            Ok(id.clone())
        })
    }

    /// 推进模拟时钟：先确认上一轮的删除，再推进运行中任务的进度
    pub fn tick(&self, elapsed: Duration) {
        self.with_state(|inner, emitted| {
            inner.confirm_removals(emitted);
            inner.advance(elapsed, emitted);
            inner.promote_waiting(emitted);
        });
    }

    /// 模拟一次传输失败
    pub fn fail(&self, id: &TaskId) -> Result<(), RegistryError> {
        self.with_state(|inner, emitted| {
            let task = inner
                .tasks
                .get_mut(id)
                .ok_or_else(|| RegistryError::TaskNotFound(id.to_string()))?;
            if matches!(task.status, TaskStatus::Running | TaskStatus::Waiting) {
                task.status = TaskStatus::Failed;
                warn!("❌ 下载任务失败: {}", id);
                emitted.push((
                    task.generation,
                    TaskEvent::new(id.clone(), TaskEventKind::Failure(TaskStatus::Failed)),
                ));
                inner.promote_waiting(emitted);
            }
            Ok(())
        })
    }

    /// 模拟内容损坏：任务完成时校验结果为 INCORRECT
    pub fn corrupt(&self, id: &TaskId) -> Result<(), RegistryError> {
        let mut inner = self.state();
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| RegistryError::TaskNotFound(id.to_string()))?;
        task.corrupt = true;
        debug!("任务内容将校验失败: {}", id);
        Ok(())
    }

    pub fn cached_bytes(&self) -> u64 {
        self.state().cached_bytes
    }

    /// 所有任务都已完成（或已无任务）
    pub fn is_settled(&self) -> bool {
        let inner = self.state();
        inner.removals.is_empty()
            && inner
                .tasks
                .values()
                .all(|task| task.status == TaskStatus::Succeeded)
    }

    fn run_aggregate(&self, action: AggregateAction) {
        self.with_state(|inner, emitted| {
            for id in inner.order.clone() {
                let Some(status) = inner.tasks.get(&id).map(|task| task.status) else {
                    continue;
                };
                if let Some(command) = action.command_for(status) {
                    inner.transition(&id, command, emitted);
                }
            }
            // 全部暂停不能让任何等待中的任务开始运行
            if action != AggregateAction::SuspendAll {
                inner.promote_waiting(emitted);
            }
        });
    }
}

impl Default for SimulatedRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl TaskRegistry for SimulatedRegistry {
    fn list_tasks(&self) -> Vec<TaskId> {
        self.state().order.clone()
    }

    fn lookup(&self, id: &TaskId) -> Option<TaskHandle> {
        self.state().tasks.get(id).map(|task| TaskHandle {
            id: id.clone(),
            generation: task.generation,
        })
    }

    fn status(&self, handle: &TaskHandle) -> Option<TaskStatus> {
        self.details(handle).map(|details| details.status)
    }

    fn progress(&self, handle: &TaskHandle) -> Option<ProgressCounters> {
        self.details(handle).map(|details| details.progress)
    }

    fn details(&self, handle: &TaskHandle) -> Option<TaskDetails> {
        self.state()
            .tasks
            .get(&handle.id)
            .filter(|task| task.generation == handle.generation)
            .map(|task| task.details(&handle.id))
    }

    fn subscribe(&self, handle: &TaskHandle, sink: EventSink) -> Option<SubscriptionId> {
        self.lookup(&handle.id)
            .filter(|current| current == handle)?;
        let subscription = SubscriptionId::new();
        self.subscribers.insert(
            subscription,
            Subscriber {
                target: Some(handle.clone()),
                sink,
            },
        );
        Some(subscription)
    }

    fn subscribe_all(&self, sink: EventSink) -> SubscriptionId {
        let subscription = SubscriptionId::new();
        self.subscribers
            .insert(subscription, Subscriber { target: None, sink });
        subscription
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.subscribers.remove(&subscription);
    }

    fn start(&self, id: &TaskId) {
        self.with_state(|inner, emitted| inner.apply(id, TaskCommand::Start, emitted));
    }

    fn suspend(&self, id: &TaskId) {
        self.with_state(|inner, emitted| inner.apply(id, TaskCommand::Suspend, emitted));
    }

    fn cancel(&self, id: &TaskId) {
        self.with_state(|inner, emitted| inner.apply(id, TaskCommand::Cancel, emitted));
    }

    fn remove(&self, id: &TaskId, completely: bool) {
        self.with_state(|inner, emitted| {
            inner.apply(id, TaskCommand::Remove { completely }, emitted)
        });
    }

    fn total_start(&self) {
        self.run_aggregate(AggregateAction::StartAll);
    }

    fn total_suspend(&self) {
        self.run_aggregate(AggregateAction::SuspendAll);
    }

    fn total_cancel(&self) {
        self.run_aggregate(AggregateAction::CancelAll);
    }

    fn total_remove(&self, completely: bool) {
        self.run_aggregate(AggregateAction::RemoveAll { completely });
    }

    fn clear_disk_cache(&self) {
        let mut inner = self.state();
        info!("清理磁盘缓存: {} 字节", inner.cached_bytes);
        inner.cached_bytes = 0;
    }

    fn configuration(&self) -> RegistryConfig {
        self.state().config
    }

    fn set_max_concurrent_tasks(&self, limit: usize) {
        // 调低上限不会挂起已在运行的任务，只影响之后的调度
        self.with_state(|inner, emitted| {
            inner.config.max_concurrent_tasks = limit.max(1);
            inner.promote_waiting(emitted);
        });
    }

    fn set_allows_cellular_access(&self, allowed: bool) {
        self.state().config.allows_cellular_access = allowed;
    }
}
