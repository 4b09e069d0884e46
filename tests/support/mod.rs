#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use transfer_board::registry::{
    EventSink, ProgressCounters, RegistryConfig, SubscriptionId, TaskDetails, TaskEvent,
    TaskEventKind, TaskHandle, TaskId, TaskRegistry, TaskStatus, Validation,
};
use transfer_board::render::{AggregateView, RenderSurface, RowView, SlotId, SwitchStates};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start(TaskId),
    Suspend(TaskId),
    Cancel(TaskId),
    Remove(TaskId, bool),
    TotalStart,
    TotalSuspend,
    TotalCancel,
    TotalRemove(bool),
    ClearDiskCache,
    MaxConcurrent(usize),
    Cellular(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Subscribe(Option<TaskId>, SubscriptionId),
    Unsubscribe(SubscriptionId),
}

struct Subscription {
    target: Option<TaskId>,
    sink: EventSink,
    active: bool,
}

#[derive(Default)]
struct FakeState {
    order: Vec<TaskId>,
    tasks: HashMap<TaskId, TaskDetails>,
    subscriptions: Vec<(SubscriptionId, Subscription)>,
    commands: Vec<Command>,
    ops: Vec<Op>,
    config: RegistryConfig,
}

/// 只记录命令、不改变任务状态的注册表；状态由测试直接设置
#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<FakeState>,
}

pub fn url(name: &str) -> TaskId {
    TaskId::new(format!("https://example.com/files/{}", name))
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_tasks(tasks: &[(&str, TaskStatus, u64, u64)]) -> Arc<Self> {
        let registry = Self::new();
        for (name, status, completed, total) in tasks {
            registry.insert(name, *status, *completed, *total);
        }
        registry
    }

    pub fn insert(&self, name: &str, status: TaskStatus, completed: u64, total: u64) -> TaskId {
        let id = url(name);
        let details = TaskDetails {
            id: id.clone(),
            file_name: name.to_string(),
            status,
            progress: ProgressCounters {
                completed_units: completed,
                total_units: total,
                rate: if status == TaskStatus::Running { 10 } else { 0 },
                time_remaining: None,
            },
            validation: Validation::Unknown,
            start_date: None,
            end_date: None,
        };
        let mut state = self.state.lock().unwrap();
        if !state.order.contains(&id) {
            state.order.push(id.clone());
        }
        state.tasks.insert(id.clone(), details);
        id
    }

    pub fn set_status(&self, id: &TaskId, status: TaskStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(task) = state.tasks.get_mut(id) {
            task.status = status;
        }
    }

    pub fn set_progress(&self, id: &TaskId, completed: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(task) = state.tasks.get_mut(id) {
            task.progress.completed_units = completed;
        }
    }

    /// 让任务从注册表消失，但不发任何回调
    pub fn drop_task(&self, id: &TaskId) {
        let mut state = self.state.lock().unwrap();
        state.tasks.remove(id);
        state.order.retain(|existing| existing != id);
    }

    /// 把事件投递给当前仍有效的订阅
    pub fn emit(&self, id: &TaskId, kind: TaskEventKind) {
        let sinks: Vec<EventSink> = {
            let state = self.state.lock().unwrap();
            state
                .subscriptions
                .iter()
                .filter(|(_, sub)| sub.active)
                .filter(|(_, sub)| sub.target.as_ref().is_none_or(|target| target == id))
                .map(|(_, sub)| sub.sink.clone())
                .collect()
        };
        for sink in sinks {
            sink(TaskEvent::new(id.clone(), kind));
        }
    }

    /// 曾经为某个任务创建过的所有回调（包括已取消的）
    pub fn sinks_ever_created_for(&self, id: &TaskId) -> Vec<EventSink> {
        let state = self.state.lock().unwrap();
        state
            .subscriptions
            .iter()
            .filter(|(_, sub)| sub.target.as_ref() == Some(id))
            .map(|(_, sub)| sub.sink.clone())
            .collect()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn active_task_subscriptions(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .subscriptions
            .iter()
            .filter(|(_, sub)| sub.active && sub.target.is_some())
            .count()
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, Op::Unsubscribe(_)))
            .count()
    }

    fn record(&self, command: Command) {
        self.state.lock().unwrap().commands.push(command);
    }

    fn add_subscription(&self, target: Option<TaskId>, sink: EventSink) -> SubscriptionId {
        let id = SubscriptionId::new();
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Subscribe(target.clone(), id));
        state.subscriptions.push((
            id,
            Subscription {
                target,
                sink,
                active: true,
            },
        ));
        id
    }
}

impl TaskRegistry for FakeRegistry {
    fn list_tasks(&self) -> Vec<TaskId> {
        self.state.lock().unwrap().order.clone()
    }

    fn lookup(&self, id: &TaskId) -> Option<TaskHandle> {
        let state = self.state.lock().unwrap();
        state.tasks.contains_key(id).then(|| TaskHandle {
            id: id.clone(),
            generation: 0,
        })
    }

    fn status(&self, handle: &TaskHandle) -> Option<TaskStatus> {
        self.details(handle).map(|details| details.status)
    }

    fn progress(&self, handle: &TaskHandle) -> Option<ProgressCounters> {
        self.details(handle).map(|details| details.progress)
    }

    fn details(&self, handle: &TaskHandle) -> Option<TaskDetails> {
        self.state.lock().unwrap().tasks.get(&handle.id).cloned()
    }

    fn subscribe(&self, handle: &TaskHandle, sink: EventSink) -> Option<SubscriptionId> {
        self.lookup(&handle.id)?;
        Some(self.add_subscription(Some(handle.id.clone()), sink))
    }

    fn subscribe_all(&self, sink: EventSink) -> SubscriptionId {
        self.add_subscription(None, sink)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Unsubscribe(subscription));
        for (id, sub) in state.subscriptions.iter_mut() {
            if *id == subscription {
                sub.active = false;
            }
        }
    }

    fn start(&self, id: &TaskId) {
        self.record(Command::Start(id.clone()));
    }

    fn suspend(&self, id: &TaskId) {
        self.record(Command::Suspend(id.clone()));
    }

    fn cancel(&self, id: &TaskId) {
        self.record(Command::Cancel(id.clone()));
    }

    fn remove(&self, id: &TaskId, completely: bool) {
        self.record(Command::Remove(id.clone(), completely));
    }

    fn total_start(&self) {
        self.record(Command::TotalStart);
    }

    fn total_suspend(&self) {
        self.record(Command::TotalSuspend);
    }

    fn total_cancel(&self) {
        self.record(Command::TotalCancel);
    }

    fn total_remove(&self, completely: bool) {
        self.record(Command::TotalRemove(completely));
    }

    fn clear_disk_cache(&self) {
        self.record(Command::ClearDiskCache);
    }

    fn configuration(&self) -> RegistryConfig {
        self.state.lock().unwrap().config
    }

    fn set_max_concurrent_tasks(&self, limit: usize) {
        self.record(Command::MaxConcurrent(limit));
        self.state.lock().unwrap().config.max_concurrent_tasks = limit;
    }

    fn set_allows_cellular_access(&self, allowed: bool) {
        self.record(Command::Cellular(allowed));
        self.state.lock().unwrap().config.allows_cellular_access = allowed;
    }
}

/// 记录所有推送内容的渲染面
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub rows: HashMap<SlotId, RowView>,
    pub renders: Vec<(SlotId, TaskId)>,
    pub placeholders: Vec<SlotId>,
    pub cleared: Vec<SlotId>,
    pub reloads: Vec<usize>,
    pub aggregate: Option<AggregateView>,
    pub switches: Option<SwitchStates>,
}

impl RecordingSurface {
    pub fn renders_for(&self, slot: SlotId) -> Vec<&TaskId> {
        self.renders
            .iter()
            .filter(|(rendered, _)| *rendered == slot)
            .map(|(_, id)| id)
            .collect()
    }
}

impl RenderSurface for RecordingSurface {
    fn reload(&mut self, row_count: usize) {
        self.reloads.push(row_count);
    }

    fn render_row(&mut self, slot: SlotId, row: &RowView) {
        self.renders.push((slot, row.id.clone()));
        self.rows.insert(slot, row.clone());
    }

    fn render_placeholder(&mut self, slot: SlotId) {
        self.placeholders.push(slot);
        self.rows.remove(&slot);
    }

    fn clear_row(&mut self, slot: SlotId) {
        self.cleared.push(slot);
        self.rows.remove(&slot);
    }

    fn render_aggregate(&mut self, view: &AggregateView) {
        self.aggregate = Some(view.clone());
    }

    fn render_switches(&mut self, switches: SwitchStates) {
        self.switches = Some(switches);
    }
}
