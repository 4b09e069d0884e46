use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 任务的稳定标识（即任务的源 URL）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 从 URL 的最后一段路径推导文件名，解析失败时退回原始字符串
    pub fn file_name(&self) -> String {
        url::Url::parse(&self.0)
            .ok()
            .and_then(|url| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.0.clone())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for TaskId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

// --------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Waiting,
    Running,
    Suspended,
    Canceled,
    Failed,
    Succeeded,
    Removed,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Running => "running",
            TaskStatus::Suspended => "suspended",
            TaskStatus::Canceled => "canceled",
            TaskStatus::Failed => "failed",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 下载完成后对文件内容的校验结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    /// 尚未完成，或引擎没有可比对的校验值
    #[default]
    Unknown,
    Correct,
    Incorrect,
}

impl Validation {
    pub fn label(self) -> &'static str {
        match self {
            Validation::Unknown => "UNKNOWN",
            Validation::Correct => "CORRECT",
            Validation::Incorrect => "INCORRECT",
        }
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 原始进度计数，单位为字节
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressCounters {
    pub completed_units: u64,
    /// 传输开始前可能为 0（未知）
    pub total_units: u64,
    /// 瞬时速率，字节/秒
    pub rate: u64,
    /// 引擎给出的剩余时间估计（秒）
    pub time_remaining: Option<u64>,
}

impl ProgressCounters {
    pub fn fraction_complete(&self) -> f64 {
        if self.total_units == 0 {
            return 0.0;
        }
        let completed = self.completed_units.min(self.total_units);
        completed as f64 / self.total_units as f64
    }

    pub fn remaining_units(&self) -> u64 {
        self.total_units.saturating_sub(self.completed_units)
    }
}

/// 某一时刻任务的完整快照
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDetails {
    pub id: TaskId,
    pub file_name: String,
    pub status: TaskStatus,
    pub progress: ProgressCounters,
    pub validation: Validation,
    pub start_date: Option<DateTime<Local>>,
    pub end_date: Option<DateTime<Local>>,
}

/// 注册表签发的任务句柄。
///
/// 同一个 URL 被删除后重新创建会得到新的 `generation`，旧句柄随之失效。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    pub id: TaskId,
    pub generation: u64,
}

// --------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEventKind {
    /// 注册表中出现了新任务（仅在全局订阅中投递）
    Created,
    Progress,
    Succeeded,
    /// 暂停、失败、取消、删除都走这一路，携带事件发生时的状态
    Failure(TaskStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    pub id: TaskId,
    pub kind: TaskEventKind,
}

impl TaskEvent {
    pub fn new(id: TaskId, kind: TaskEventKind) -> Self {
        Self { id, kind }
    }

    pub fn is_removal(&self) -> bool {
        self.kind == TaskEventKind::Failure(TaskStatus::Removed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub max_concurrent_tasks: usize,
    pub allows_cellular_access: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: usize::MAX,
            allows_cellular_access: false,
        }
    }
}
