use thiserror::Error;

use crate::registry::TaskId;

/// 控制层的错误都不是致命错误：调用方记录日志后跳过本次渲染或命令
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("任务未找到: {0}")]
    LookupMiss(TaskId),
    #[error("行号越界: {index} (共 {len} 行)")]
    RowOutOfRange { index: usize, len: usize },
    #[error("任务正在删除: {0}")]
    RemovalPending(TaskId),
}
