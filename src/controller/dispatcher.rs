use std::sync::Arc;

use tracing::{debug, info};

use crate::registry::{TaskId, TaskRegistry, TaskStatus};
use crate::render::SwitchStates;

/// 打开任务数限制开关时使用的并发上限
pub const TASK_LIMIT_CAP: usize = 2;

/// 针对单个任务的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCommand {
    Start,
    Suspend,
    Cancel,
    Remove { completely: bool },
}

/// 针对全部任务的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateAction {
    StartAll,
    SuspendAll,
    CancelAll,
    RemoveAll { completely: bool },
}

impl AggregateAction {
    /// 全局操作作用到某个状态的任务上时，对应的单任务命令
    pub fn command_for(self, status: TaskStatus) -> Option<TaskCommand> {
        use crate::registry::TaskStatus::*;
        match (self, status) {
            (_, Removed) => None,
            (AggregateAction::StartAll, Waiting | Suspended | Failed | Canceled) => {
                Some(TaskCommand::Start)
            }
            (AggregateAction::SuspendAll, Running) => Some(TaskCommand::Suspend),
            (AggregateAction::CancelAll, Running | Waiting | Suspended | Failed) => {
                Some(TaskCommand::Cancel)
            }
            (AggregateAction::RemoveAll { completely }, _) => {
                Some(TaskCommand::Remove { completely })
            }
            _ => None,
        }
    }
}

/// 行点击只在“运行”与“不运行”之间切换，从不取消或删除
pub fn row_tap_command(status: TaskStatus) -> Option<TaskCommand> {
    match status {
        TaskStatus::Running => Some(TaskCommand::Suspend),
        TaskStatus::Waiting | TaskStatus::Suspended | TaskStatus::Failed | TaskStatus::Canceled => {
            Some(TaskCommand::Start)
        }
        TaskStatus::Succeeded | TaskStatus::Removed => None,
    }
}

/// 配置开关
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChange {
    TaskLimit(bool),
    CellularAccess(bool),
}

/// 把用户交互翻译成对注册表的命令，每次交互至多发出一条
pub struct ControlDispatcher {
    registry: Arc<dyn TaskRegistry>,
}

impl ControlDispatcher {
    pub fn new(registry: Arc<dyn TaskRegistry>) -> Self {
        Self { registry }
    }

    pub fn tap_row(&self, id: &TaskId, status: TaskStatus) -> Option<TaskCommand> {
        let command = row_tap_command(status);
        match command {
            Some(command) => self.issue(id, command),
            None => debug!("行点击无需操作: {} ({})", id, status),
        }
        command
    }

    pub fn issue(&self, id: &TaskId, command: TaskCommand) {
        debug!("发出任务命令: {:?} -> {}", command, id);
        match command {
            TaskCommand::Start => self.registry.start(id),
            TaskCommand::Suspend => self.registry.suspend(id),
            TaskCommand::Cancel => self.registry.cancel(id),
            TaskCommand::Remove { completely } => self.registry.remove(id, completely),
        }
    }

    pub fn tap_aggregate(&self, action: AggregateAction) {
        info!("发出全局命令: {:?}", action);
        match action {
            AggregateAction::StartAll => self.registry.total_start(),
            AggregateAction::SuspendAll => self.registry.total_suspend(),
            AggregateAction::CancelAll => self.registry.total_cancel(),
            AggregateAction::RemoveAll { completely } => self.registry.total_remove(completely),
        }
    }

    /// 配置修改作用于注册表的配置对象，返回修改后的开关状态
    pub fn change_config(&self, change: ConfigChange) -> SwitchStates {
        match change {
            ConfigChange::TaskLimit(on) => {
                let limit = if on { TASK_LIMIT_CAP } else { usize::MAX };
                info!("设置最大并发任务数: {}", limit);
                self.registry.set_max_concurrent_tasks(limit);
            }
            ConfigChange::CellularAccess(allowed) => {
                info!("设置蜂窝网络访问: {}", allowed);
                self.registry.set_allows_cellular_access(allowed);
            }
        }
        self.switch_states()
    }

    pub fn switch_states(&self) -> SwitchStates {
        SwitchStates::from_config(&self.registry.configuration())
    }
}
