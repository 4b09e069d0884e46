use serde::Serialize;

use crate::controller::dispatcher::TASK_LIMIT_CAP;
use crate::registry::{RegistryConfig, TaskId, TaskStatus};

pub mod terminal;

pub use terminal::TerminalSurface;

/// 可复用的行槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SlotId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusIcon {
    Running,
    Stopped,
    Finished,
    RemovalPending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub id: TaskId,
    pub status: TaskStatus,
    pub status_icon: StatusIcon,
    pub title_text: String,
    pub fraction: f64,
    pub percent_text: String,
    pub bytes_text: String,
    pub rate_text: String,
    pub eta_text: String,
    pub validation_text: String,
    pub start_date_text: String,
    pub end_date_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateView {
    pub fraction: f64,
    pub total_count_text: String,
    pub total_speed_text: String,
    pub total_eta_text: String,
    pub total_percent_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwitchStates {
    pub task_limit: bool,
    pub cellular_access: bool,
}

impl SwitchStates {
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            task_limit: config.max_concurrent_tasks <= TASK_LIMIT_CAP,
            cellular_access: config.allows_cellular_access,
        }
    }
}

/// 控制器把展示数据推送到这里；布局与绘制都不归控制器管
pub trait RenderSurface {
    /// 行数变化（新增任务或删除确认）后整体重载
    fn reload(&mut self, row_count: usize);
    fn render_row(&mut self, slot: SlotId, row: &RowView);
    /// 标识查不到任务时的空白行
    fn render_placeholder(&mut self, slot: SlotId);
    /// 槽位离开可见区域
    fn clear_row(&mut self, slot: SlotId);
    fn render_aggregate(&mut self, view: &AggregateView);
    fn render_switches(&mut self, switches: SwitchStates);
}
