use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use binding::RowBindingManager;
use dispatcher::{AggregateAction, ConfigChange, ControlDispatcher, TaskCommand};
use error::ControlError;
use resolver::TaskResolver;

use crate::registry::{
    EventSink, SubscriptionId, TaskDetails, TaskEvent, TaskEventKind, TaskId, TaskRegistry,
    TaskStatus,
};
use crate::render::{RenderSurface, SlotId, SwitchStates};

pub mod binding;
pub mod dispatcher;
pub mod error;
pub mod projector;
pub mod resolver;

/// 从注册表回调线程转交到控制器执行上下文的一次投递
#[derive(Debug, Clone)]
pub enum Delivery {
    /// 某个槽位订阅收到的单任务事件，`tag` 标识创建订阅时的那次绑定
    Row {
        slot: SlotId,
        tag: Uuid,
        event: TaskEvent,
    },
    /// 全局订阅收到的事件
    Registry(TaskEvent),
}

/// 来自界面的输入
#[derive(Debug, Clone, PartialEq)]
pub enum UiInput {
    WillDisplay { slot: SlotId, index: usize },
    DidEndDisplay { slot: SlotId },
    TapRow { index: usize },
    CancelRow { index: usize },
    RemoveRow { index: usize, completely: bool },
    Aggregate(AggregateAction),
    Config(ConfigChange),
    ClearDiskCache,
    TaskCreated(TaskId),
}

/// 列表控制器：持有规范的任务标识序列，驱动绑定、投影与命令分发。
///
/// 所有方法都在同一个执行上下文中调用；注册表回调经由通道排队后，
/// 由 [`TaskListController::drain_deliveries`] 或 [`TaskListController::run`] 依次处理。
pub struct TaskListController<S: RenderSurface> {
    registry: Arc<dyn TaskRegistry>,
    resolver: TaskResolver,
    bindings: RowBindingManager,
    dispatcher: ControlDispatcher,
    surface: S,
    sequence: Vec<TaskId>,
    pending_removals: HashSet<TaskId>,
    sender: UnboundedSender<Delivery>,
    deliveries: UnboundedReceiver<Delivery>,
    registry_subscription: Option<SubscriptionId>,
}

impl<S: RenderSurface> TaskListController<S> {
    pub fn new(registry: Arc<dyn TaskRegistry>, surface: S) -> Self {
        let (sender, deliveries) = mpsc::unbounded_channel();
        Self {
            resolver: TaskResolver::new(registry.clone()),
            bindings: RowBindingManager::new(registry.clone(), sender.clone()),
            dispatcher: ControlDispatcher::new(registry.clone()),
            registry,
            surface,
            sequence: Vec::new(),
            pending_removals: HashSet::new(),
            sender,
            deliveries,
            registry_subscription: None,
        }
    }

    /// 用注册表当前的任务集合建立规范序列，并订阅全局事件
    pub fn initialize(&mut self) {
        self.sequence.clear();
        for id in self.registry.list_tasks() {
            if !self.sequence.contains(&id) {
                self.sequence.push(id);
            }
        }

        if self.registry_subscription.is_none() {
            let sender = self.sender.clone();
            let sink: EventSink = Arc::new(move |event| {
                let _ = sender.send(Delivery::Registry(event));
            });
            self.registry_subscription = Some(self.registry.subscribe_all(sink));
        }

        info!("任务列表初始化完成: {} 个任务", self.sequence.len());
        self.surface.reload(self.sequence.len());
        self.render_aggregate();
        let switches = self.dispatcher.switch_states();
        self.surface.render_switches(switches);
    }

    pub fn sequence(&self) -> &[TaskId] {
        &self.sequence
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn bindings(&self) -> &RowBindingManager {
        &self.bindings
    }

    pub fn is_removal_pending(&self, id: &TaskId) -> bool {
        self.pending_removals.contains(id)
    }

    pub fn switch_states(&self) -> SwitchStates {
        self.dispatcher.switch_states()
    }

    pub fn on_external_task_created(&mut self, id: TaskId) -> bool {
        if self.sequence.contains(&id) {
            return false;
        }
        debug!("追加新任务: {}", id);
        self.sequence.push(id);
        self.surface.reload(self.sequence.len());
        self.render_aggregate();
        true
    }

    /// 注册表确认删除完成后才把标识移出规范序列
    pub fn on_remove_confirmed(&mut self, id: &TaskId) -> bool {
        self.pending_removals.remove(id);
        let Some(index) = self.sequence.iter().position(|existing| existing == id) else {
            return false;
        };
        self.sequence.remove(index);
        for slot in self.bindings.unbind_task(id) {
            self.surface.clear_row(slot);
        }
        info!("删除已确认: {}", id);
        self.surface.reload(self.sequence.len());
        self.render_aggregate();
        true
    }

    fn id_at(&self, index: usize) -> Result<TaskId, ControlError> {
        self.sequence
            .get(index)
            .cloned()
            .ok_or(ControlError::RowOutOfRange {
                index,
                len: self.sequence.len(),
            })
    }

    /// 行进入可见区域（或被复用到新的行号）
    pub fn row_will_display(&mut self, slot: SlotId, index: usize) -> Result<(), ControlError> {
        let id = match self.id_at(index) {
            Ok(id) => id,
            Err(err) => {
                self.bindings.unbind(slot);
                self.surface.render_placeholder(slot);
                return Err(err);
            }
        };
        if let Err(err) = self.bindings.bind(slot, &id) {
            debug!("绑定失败，显示占位行: {}", err);
            self.render_missing(slot, &id);
            return Err(err);
        }
        self.render_slot(slot, &id);
        Ok(())
    }

    /// 行离开可见区域：只取消订阅，不影响传输
    pub fn row_did_end_display(&mut self, slot: SlotId) {
        if self.bindings.unbind(slot) {
            self.surface.clear_row(slot);
        }
    }

    /// 行上的开关按钮：运行中则暂停，否则开始
    pub fn tap_row(&mut self, index: usize) -> Result<Option<TaskCommand>, ControlError> {
        let id = self.id_at(index)?;
        if self.pending_removals.contains(&id) {
            return Err(ControlError::RemovalPending(id));
        }
        let handle = self.resolver.resolve(&id)?;
        let status = self
            .registry
            .status(&handle)
            .ok_or_else(|| ControlError::LookupMiss(id.clone()))?;
        Ok(self.dispatcher.tap_row(&id, status))
    }

    pub fn cancel_row(&mut self, index: usize) -> Result<(), ControlError> {
        let id = self.id_at(index)?;
        if self.pending_removals.contains(&id) {
            return Err(ControlError::RemovalPending(id));
        }
        self.resolver.resolve(&id)?;
        self.dispatcher.issue(&id, TaskCommand::Cancel);
        Ok(())
    }

    /// 发出删除命令。标识会留在序列里，直到注册表回调确认。
    pub fn remove_row(&mut self, index: usize, completely: bool) -> Result<(), ControlError> {
        let id = self.id_at(index)?;
        if self.pending_removals.contains(&id) {
            return Err(ControlError::RemovalPending(id));
        }
        self.resolver.resolve(&id)?;
        self.dispatcher
            .issue(&id, TaskCommand::Remove { completely });
        self.pending_removals.insert(id.clone());
        self.refresh_task(&id);
        Ok(())
    }

    pub fn tap_aggregate(&mut self, action: AggregateAction) {
        if let AggregateAction::RemoveAll { .. } = action {
            // 先记下会被删除的任务，删除确认前它们的行显示为待删除
            for id in &self.sequence {
                let status = self
                    .resolver
                    .resolve(id)
                    .ok()
                    .and_then(|handle| self.registry.status(&handle));
                if let Some(status) = status {
                    if action.command_for(status).is_some() {
                        self.pending_removals.insert(id.clone());
                    }
                }
            }
        }
        self.dispatcher.tap_aggregate(action);
        self.refresh_visible();
        self.render_aggregate();
    }

    pub fn change_config(&mut self, change: ConfigChange) -> SwitchStates {
        let switches = self.dispatcher.change_config(change);
        self.surface.render_switches(switches);
        switches
    }

    pub fn clear_disk_cache(&mut self) {
        self.registry.clear_disk_cache();
        self.render_aggregate();
    }

    pub fn handle_input(&mut self, input: UiInput) {
        let result = match input {
            UiInput::WillDisplay { slot, index } => self.row_will_display(slot, index),
            UiInput::DidEndDisplay { slot } => {
                self.row_did_end_display(slot);
                Ok(())
            }
            UiInput::TapRow { index } => self.tap_row(index).map(|_| ()),
            UiInput::CancelRow { index } => self.cancel_row(index),
            UiInput::RemoveRow { index, completely } => self.remove_row(index, completely),
            UiInput::Aggregate(action) => {
                self.tap_aggregate(action);
                Ok(())
            }
            UiInput::Config(change) => {
                self.change_config(change);
                Ok(())
            }
            UiInput::ClearDiskCache => {
                self.clear_disk_cache();
                Ok(())
            }
            UiInput::TaskCreated(id) => {
                self.on_external_task_created(id);
                Ok(())
            }
        };
        if let Err(err) = result {
            debug!("输入被跳过: {}", err);
        }
    }

    pub fn handle_delivery(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Row { slot, tag, event } => {
                let Some(id) = self.bindings.accept(slot, tag).cloned() else {
                    return;
                };
                if id != event.id {
                    warn!("回调任务与绑定不一致，丢弃: {} != {}", event.id, id);
                    return;
                }
                self.render_slot(slot, &id);
            }
            Delivery::Registry(event) => self.handle_registry_event(event),
        }
    }

    fn handle_registry_event(&mut self, event: TaskEvent) {
        match event.kind {
            TaskEventKind::Created => {
                self.on_external_task_created(event.id);
                return;
            }
            TaskEventKind::Failure(TaskStatus::Removed) => {
                self.on_remove_confirmed(&event.id);
                return;
            }
            TaskEventKind::Failure(status) => {
                // 失败只刷新可见行，不重建序列，避免无关行被重排
                debug!("任务进入 {} 状态: {}", status, event.id);
                self.refresh_visible();
            }
            TaskEventKind::Progress | TaskEventKind::Succeeded => {}
        }
        self.render_aggregate();
    }

    /// 同步处理所有已排队的投递，返回处理条数
    pub fn drain_deliveries(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(delivery) = self.deliveries.try_recv() {
            self.handle_delivery(delivery);
            handled += 1;
        }
        handled
    }

    /// 事件循环：在同一个任务里交替处理界面输入与注册表回调，输入通道关闭后返回
    pub async fn run(&mut self, mut inputs: UnboundedReceiver<UiInput>) {
        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => break,
                },
                Some(delivery) = self.deliveries.recv() => self.handle_delivery(delivery),
            }
        }
        self.drain_deliveries();
        debug!("控制器事件循环结束");
    }

    fn render_slot(&mut self, slot: SlotId, id: &TaskId) {
        let pending = self.pending_removals.contains(id);
        match self.resolver.details(id) {
            Ok(details) => {
                let row = projector::project_row(&details, pending);
                self.surface.render_row(slot, &row);
            }
            Err(_) => self.render_missing(slot, id),
        }
    }

    fn render_missing(&mut self, slot: SlotId, id: &TaskId) {
        if self.pending_removals.contains(id) {
            self.surface
                .render_row(slot, &projector::removal_pending_row(id));
        } else {
            self.surface.render_placeholder(slot);
        }
    }

    fn refresh_task(&mut self, id: &TaskId) {
        for (slot, bound) in self.bindings.bound_slots() {
            if &bound == id {
                self.render_slot(slot, &bound);
            }
        }
    }

    fn refresh_visible(&mut self) {
        for (slot, id) in self.bindings.bound_slots() {
            self.render_slot(slot, &id);
        }
    }

    fn render_aggregate(&mut self) {
        let details: Vec<TaskDetails> = self
            .sequence
            .iter()
            .filter_map(|id| self.resolver.details(id).ok())
            .collect();
        let counters = projector::aggregate(self.sequence.len(), &details);
        self.surface
            .render_aggregate(&projector::project_aggregate(&counters));
    }
}

impl<S: RenderSurface> Drop for TaskListController<S> {
    fn drop(&mut self) {
        if let Some(subscription) = self.registry_subscription.take() {
            self.registry.unsubscribe(subscription);
        }
    }
}
