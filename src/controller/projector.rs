//! 把原始进度计数投影成可直接展示的文本。这里全部是纯函数。

use crate::common::format::{format_bytes, format_date, format_duration, format_speed};
use crate::registry::{ProgressCounters, TaskDetails, TaskId, TaskStatus, Validation};
use crate::render::{AggregateView, RowView, StatusIcon};

pub const IDLE_RATE_TEXT: &str = "not transferring";
pub const UNKNOWN_ETA_TEXT: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub fraction: f64,
    pub percent_text: String,
    pub bytes_text: String,
    pub rate_text: String,
    pub eta_text: String,
}

pub fn project(counters: &ProgressCounters, running: bool) -> Projection {
    let fraction = counters.fraction_complete();
    let percent = if counters.total_units == 0 {
        0
    } else {
        let completed = counters.completed_units.min(counters.total_units) as u128;
        completed * 100 / counters.total_units as u128
    };

    let rate_text = if counters.rate == 0 && !running {
        IDLE_RATE_TEXT.to_string()
    } else {
        format_speed(counters.rate)
    };

    let eta_text = if counters.rate == 0 {
        UNKNOWN_ETA_TEXT.to_string()
    } else {
        let seconds = counters
            .time_remaining
            .unwrap_or_else(|| counters.remaining_units().div_ceil(counters.rate));
        format_duration(seconds)
    };

    Projection {
        fraction,
        percent_text: format!("{}%", percent),
        bytes_text: format!(
            "{}/{}",
            format_bytes(counters.completed_units),
            format_bytes(counters.total_units)
        ),
        rate_text,
        eta_text,
    }
}

pub fn status_icon(status: TaskStatus, removal_pending: bool) -> StatusIcon {
    if removal_pending {
        return StatusIcon::RemovalPending;
    }
    match status {
        TaskStatus::Running => StatusIcon::Running,
        TaskStatus::Succeeded => StatusIcon::Finished,
        TaskStatus::Removed => StatusIcon::RemovalPending,
        _ => StatusIcon::Stopped,
    }
}

pub fn project_row(details: &TaskDetails, removal_pending: bool) -> RowView {
    let projection = project(&details.progress, details.status == TaskStatus::Running);
    RowView {
        id: details.id.clone(),
        status: details.status,
        status_icon: status_icon(details.status, removal_pending),
        title_text: details.file_name.clone(),
        fraction: projection.fraction,
        percent_text: projection.percent_text,
        bytes_text: projection.bytes_text,
        rate_text: projection.rate_text,
        eta_text: projection.eta_text,
        validation_text: format!("VALIDATION: {}", details.validation),
        start_date_text: format_date(details.start_date),
        end_date_text: format_date(details.end_date),
    }
}

/// 任务已从注册表消失、但删除尚未确认时的占位行
pub fn removal_pending_row(id: &TaskId) -> RowView {
    let projection = project(&ProgressCounters::default(), false);
    RowView {
        id: id.clone(),
        status: TaskStatus::Removed,
        status_icon: StatusIcon::RemovalPending,
        title_text: id.file_name(),
        fraction: projection.fraction,
        percent_text: projection.percent_text,
        bytes_text: projection.bytes_text,
        rate_text: projection.rate_text,
        eta_text: projection.eta_text,
        validation_text: format!("VALIDATION: {}", Validation::Unknown),
        start_date_text: format_date(None),
        end_date_text: format_date(None),
    }
}

/// 对规范序列中所有任务求和得到的汇总计数，每次都从输入重新计算
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateCounters {
    pub task_count: usize,
    pub succeeded_count: usize,
    pub any_running: bool,
    pub progress: ProgressCounters,
}

impl AggregateCounters {
    pub fn fraction_complete(&self) -> f64 {
        self.progress.fraction_complete()
    }
}

/// `task_count` 是规范序列的长度，即便其中某些任务已查不到
pub fn aggregate<'a>(
    task_count: usize,
    tasks: impl IntoIterator<Item = &'a TaskDetails>,
) -> AggregateCounters {
    let mut counters = AggregateCounters {
        task_count,
        ..Default::default()
    };
    for task in tasks {
        if task.status == TaskStatus::Succeeded {
            counters.succeeded_count += 1;
        }
        counters.any_running |= task.status == TaskStatus::Running;
        let progress = &mut counters.progress;
        progress.completed_units = progress
            .completed_units
            .saturating_add(task.progress.completed_units);
        progress.total_units = progress.total_units.saturating_add(task.progress.total_units);
        progress.rate = progress.rate.saturating_add(task.progress.rate);
    }
    // 各任务的剩余时间不能直接相加，交给 project 按总速率推算
    counters.progress.time_remaining = None;
    counters
}

pub fn project_aggregate(counters: &AggregateCounters) -> AggregateView {
    let projection = project(&counters.progress, counters.any_running);
    AggregateView {
        fraction: projection.fraction,
        total_count_text: format!(
            "Total tasks: {}/{}",
            counters.succeeded_count, counters.task_count
        ),
        total_speed_text: format!("Total speed: {}", projection.rate_text),
        total_eta_text: format!("Remaining time: {}", projection.eta_text),
        total_percent_text: format!("Total progress: {}", projection.percent_text),
    }
}
