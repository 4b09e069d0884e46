use clap::Parser;

/// 单个模拟任务的大小上限 (MB)，即 1 TB
pub const MAX_SIZE_MB: u64 = 1024 * 1024;

/// 下载任务列表演示
#[derive(Parser, Debug)]
#[command(name = "tboard")]
#[command(version = "0.1")]
#[command(about = "在终端里演示下载任务列表与任务状态的同步", long_about = None)]
pub struct Cli {
    /// 任务链接，不指定时使用内置的示例链接
    #[arg(value_name = "URL")]
    #[arg(value_hint = clap::ValueHint::Url)]
    pub urls: Vec<String>,

    /// 每个模拟任务的大小 (MB)
    #[arg(
        long,
        value_name = "MB",
        default_value_t = 32,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SIZE_MB)
    )]
    pub size_mb: u64,

    /// 最大并发任务数
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// 打开任务数限制开关（并发上限为 2）
    #[arg(long)]
    pub task_limit: bool,

    /// 允许蜂窝网络访问
    #[arg(long)]
    pub cellular: bool,

    /// 可见行数
    #[arg(long, value_name = "ROWS", default_value_t = 4)]
    pub visible_rows: usize,

    /// 模拟时钟步长 (毫秒)
    #[arg(long, value_name = "MS", default_value_t = 200)]
    pub tick_ms: u64,

    /// 结束时以 JSON 输出各行的最终状态
    #[arg(long)]
    pub json: bool,

    /// 输出调试日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// 每个模拟任务的字节数
    pub fn size_bytes(&self) -> u64 {
        self.size_mb.saturating_mul(1024 * 1024)
    }
}
