use std::collections::HashMap;

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::debug;

use super::{AggregateView, RenderSurface, RowView, SlotId, StatusIcon, SwitchStates};

// 进度条按千分比显示
const BAR_SCALE: u64 = 1000;

/// 终端渲染：每个可见槽位一条进度条，外加一条汇总进度条
pub struct TerminalSurface {
    multi_pb: MultiProgress,
    total_pb: ProgressBar,
    row_pbs: HashMap<SlotId, ProgressBar>,
    last_rows: HashMap<SlotId, RowView>,
    row_count: usize,
    aggregate: Option<AggregateView>,
    switches: Option<SwitchStates>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        let multi_pb = MultiProgress::new();
        let total_pb = multi_pb.add(ProgressBar::new(BAR_SCALE));
        total_pb.set_style(bar_style("{msg}\n[{bar:40.green/white}] {percent}%"));
        Self {
            multi_pb,
            total_pb,
            row_pbs: HashMap::new(),
            last_rows: HashMap::new(),
            row_count: 0,
            aggregate: None,
            switches: None,
        }
    }

    fn row_bar(&mut self, slot: SlotId) -> &ProgressBar {
        let multi_pb = &self.multi_pb;
        self.row_pbs.entry(slot).or_insert_with(|| {
            let pb = multi_pb.add(ProgressBar::new(BAR_SCALE));
            pb.set_style(bar_style("{prefix} [{bar:30.cyan/blue}] {msg}"));
            pb
        })
    }

    /// 各槽位最后一次渲染的内容，按槽位排序
    pub fn rows(&self) -> Vec<&RowView> {
        let mut slots: Vec<_> = self.last_rows.keys().copied().collect();
        slots.sort();
        slots
            .into_iter()
            .filter_map(|slot| self.last_rows.get(&slot))
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn aggregate(&self) -> Option<&AggregateView> {
        self.aggregate.as_ref()
    }

    pub fn switches(&self) -> Option<SwitchStates> {
        self.switches
    }

    pub fn finish(&self) {
        for pb in self.row_pbs.values() {
            pb.finish();
        }
        self.total_pb.finish();
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

fn icon(status_icon: StatusIcon) -> String {
    match status_icon {
        StatusIcon::Running => "▶".green().bold().to_string(),
        StatusIcon::Stopped => "⏸".yellow().bold().to_string(),
        StatusIcon::Finished => "✓".green().to_string(),
        StatusIcon::RemovalPending => "✗".red().to_string(),
    }
}

impl RenderSurface for TerminalSurface {
    fn reload(&mut self, row_count: usize) {
        debug!("列表重载: {} 行", row_count);
        self.row_count = row_count;
    }

    fn render_row(&mut self, slot: SlotId, row: &RowView) {
        let position = (row.fraction * BAR_SCALE as f64) as u64;
        let prefix = format!("{} {}", icon(row.status_icon), row.title_text.bold());
        let message = format!(
            "{} {} {} eta {}",
            row.percent_text,
            row.bytes_text,
            row.rate_text.cyan(),
            row.eta_text
        );
        let pb = self.row_bar(slot);
        pb.set_prefix(prefix);
        pb.set_position(position);
        pb.set_message(message);
        self.last_rows.insert(slot, row.clone());
    }

    fn render_placeholder(&mut self, slot: SlotId) {
        let pb = self.row_bar(slot);
        pb.set_prefix("-".bright_black().to_string());
        pb.set_position(0);
        pb.set_message("");
        self.last_rows.remove(&slot);
    }

    fn clear_row(&mut self, slot: SlotId) {
        if let Some(pb) = self.row_pbs.remove(&slot) {
            pb.finish_and_clear();
            self.multi_pb.remove(&pb);
        }
        self.last_rows.remove(&slot);
    }

    fn render_aggregate(&mut self, view: &AggregateView) {
        self.total_pb
            .set_position((view.fraction * BAR_SCALE as f64) as u64);
        self.total_pb.set_message(format!(
            "{}  {}  {}  {}",
            view.total_count_text.bold(),
            view.total_speed_text,
            view.total_eta_text,
            view.total_percent_text
        ));
        self.aggregate = Some(view.clone());
    }

    fn render_switches(&mut self, switches: SwitchStates) {
        debug!(
            "开关状态: 任务数限制={}, 蜂窝网络={}",
            switches.task_limit, switches.cellular_access
        );
        self.switches = Some(switches);
    }
}
