use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use transfer_board::common::logger::PrettyLogger;
use transfer_board::controller::dispatcher::ConfigChange;
use transfer_board::registry::{RegistryConfig, SimulatedRegistry, TaskRegistry};
use transfer_board::render::{SlotId, TerminalSurface};
use transfer_board::{TaskListController, UiInput, log_info, log_success, log_warning};

mod cli;

const DEMO_URLS: &[&str] = &[
    "https://downloads.example.com/mac/QQ_V4.2.4.dmg",
    "https://downloads.example.com/mac/BaiduNetdisk_mac_2.2.3.dmg",
    "https://downloads.example.com/mac/VicomsoftFTPClient.dmg",
    "https://downloads.example.com/win/QQ9.0.8_2.exe",
    "https://downloads.example.com/mac/XiamiMac-03051058.dmg",
    "https://downloads.example.com/mac/iQIYIMedia_005.dmg",
];

/// 向模拟注册表添加任务，无效链接跳过
fn seed_registry(registry: &SimulatedRegistry, urls: &[String], total: u64) -> usize {
    let mut rng = rand::rng();
    let mut added = 0;
    for url in urls {
        // 每个任务的速率在 5~20 秒下完之间随机
        let rate = rng.random_range(total / 20..=total / 5).max(1);
        match registry.download(url, total, rate) {
            Ok(id) => {
                debug!("添加任务: {} ({}/s)", id, rate);
                added += 1;
            }
            Err(e) => warn!("跳过无效链接 {}: {}", url, e),
        }
    }
    added
}

/// 模拟用户操作：暂停并恢复首行、模拟失败后重试、删除末行、滚动复用槽位
async fn drive_demo(
    registry: Arc<SimulatedRegistry>,
    inputs: UnboundedSender<UiInput>,
    row_count: usize,
    visible_rows: usize,
    step: Duration,
) {
    let pause = step * 5;
    let send = |input: UiInput| {
        if inputs.send(input).is_err() {
            debug!("控制器已退出，忽略输入");
        }
    };

    tokio::time::sleep(pause).await;
    send(UiInput::TapRow { index: 0 });
    tokio::time::sleep(pause).await;
    send(UiInput::TapRow { index: 0 });

    if row_count > 1 {
        if let Some(id) = registry.list_tasks().get(1) {
            if registry.fail(id).is_ok() {
                tokio::time::sleep(pause).await;
                // 失败的任务只在用户再次开始时重试
                send(UiInput::TapRow { index: 1 });
            }
        }
    }

    if row_count > 2 {
        send(UiInput::RemoveRow {
            index: row_count - 1,
            completely: false,
        });
    }

    if row_count > visible_rows && visible_rows > 0 {
        tokio::time::sleep(pause).await;
        send(UiInput::DidEndDisplay { slot: SlotId(0) });
        send(UiInput::WillDisplay {
            slot: SlotId(0),
            index: visible_rows,
        });
    }

    while !registry.is_settled() {
        tokio::time::sleep(step).await;
    }
    send(UiInput::ClearDiskCache);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let config = RegistryConfig {
        max_concurrent_tasks: args.max_concurrent.unwrap_or(usize::MAX),
        allows_cellular_access: args.cellular,
    };
    let registry = Arc::new(SimulatedRegistry::new(config));

    let urls: Vec<String> = if args.urls.is_empty() {
        DEMO_URLS.iter().map(|url| url.to_string()).collect()
    } else {
        args.urls.clone()
    };
    let added = seed_registry(&registry, &urls, args.size_bytes());
    if added == 0 {
        log_warning!("没有可用的任务链接");
        return Ok(());
    }
    PrettyLogger::title("transfer board");
    log_info!("已添加 {} 个任务", added);

    let mut controller = TaskListController::new(registry.clone(), TerminalSurface::new());
    controller.initialize();
    if args.task_limit {
        controller.change_config(ConfigChange::TaskLimit(true));
    }

    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let row_count = controller.sequence().len();
    let visible_rows = args.visible_rows.min(row_count);
    for index in 0..visible_rows {
        input_tx.send(UiInput::WillDisplay {
            slot: SlotId(index),
            index,
        })?;
    }

    let step = Duration::from_millis(args.tick_ms.max(1));
    let token = CancellationToken::new();
    let ticker = {
        let registry = registry.clone();
        let token = token.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(step);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => registry.tick(step),
                }
            }
        })
    };
    let script = tokio::spawn(drive_demo(
        registry.clone(),
        input_tx,
        row_count,
        args.visible_rows,
        step,
    ));

    controller.run(input_rx).await;
    token.cancel();
    ticker.await?;
    script.await?;

    let surface = controller.surface();
    surface.finish();
    PrettyLogger::separator();
    for row in surface.rows() {
        PrettyLogger::task_row(row);
    }
    if let Some(view) = surface.aggregate() {
        PrettyLogger::aggregate(view);
    }
    PrettyLogger::switches(&controller.switch_states());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&surface.rows())?);
    }

    info!("剩余缓存: {} 字节", registry.cached_bytes());
    log_success!("剩余 {} 个任务", controller.sequence().len());
    let remaining: Vec<String> = controller
        .sequence()
        .iter()
        .map(|id| id.file_name())
        .collect();
    PrettyLogger::completion_summary(remaining);
    Ok(())
}
