use colored::*;

use crate::render::{AggregateView, RowView, StatusIcon, SwitchStates};

/// 漂亮的控制台输出工具
pub struct PrettyLogger;

impl PrettyLogger {
    /// 显示成功消息
    pub fn success(message: impl AsRef<str>) {
        println!("{} {}", "✓".green().bold(), message.as_ref());
    }

    /// 显示信息消息
    pub fn info(message: impl AsRef<str>) {
        println!("{} {}", "ℹ".blue().bold(), message.as_ref());
    }

    /// 显示警告消息
    pub fn warning(message: impl AsRef<str>) {
        println!("{} {}", "⚠".yellow().bold(), message.as_ref());
    }

    /// 显示分割线
    pub fn separator() {
        println!("{}", "─".repeat(50).bright_black());
    }

    /// 显示标题
    pub fn title(text: impl AsRef<str>) {
        let text = text.as_ref();
        let width = text.chars().count().min(48);
        let padding = (48 - width) / 2;
        println!(
            "{} {} {}",
            "─".repeat(padding).bright_black(),
            text.bold(),
            "─".repeat(48 - padding - width).bright_black()
        );
    }

    /// 显示一行任务的最终状态
    pub fn task_row(row: &RowView) {
        let status = match row.status_icon {
            StatusIcon::Running => row.status.label().cyan(),
            StatusIcon::Stopped => row.status.label().yellow(),
            StatusIcon::Finished => row.status.label().green(),
            StatusIcon::RemovalPending => row.status.label().red(),
        };
        println!(
            "{} {} [{}] {} {}",
            "⬇".blue().bold(),
            row.title_text.bold(),
            status,
            row.percent_text,
            row.bytes_text.bright_black()
        );
        println!(
            "    start: {}  end: {}  {}",
            row.start_date_text.bright_black(),
            row.end_date_text.bright_black(),
            row.validation_text
        );
    }

    /// 显示汇总信息
    pub fn aggregate(view: &AggregateView) {
        println!("{} {}", "Σ".magenta().bold(), view.total_count_text.bold());
        println!("  {}", view.total_speed_text);
        println!("  {}", view.total_eta_text);
        println!("  {}", view.total_percent_text);
    }

    /// 显示开关状态
    pub fn switches(switches: &SwitchStates) {
        let flag = |on: bool| if on { "on".green() } else { "off".bright_black() };
        println!(
            "{} task limit: {}  cellular access: {}",
            "⚙".cyan().bold(),
            flag(switches.task_limit),
            flag(switches.cellular_access)
        );
    }

    /// 显示完成总结
    pub fn completion_summary(items: Vec<impl AsRef<str>>) {
        println!("\n{}", "🎉 全部任务处理完成！".green().bold());
        for item in items {
            println!("  {}", item.as_ref());
        }
    }
}

/// 便捷宏用于漂亮的日志输出
#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::success(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::info(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::common::logger::PrettyLogger::warning(format!($($arg)*))
    };
}
