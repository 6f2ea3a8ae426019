/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// 日志级别句柄，读取配置后再决定是否打开 debug
pub struct LogHandle {
    filter: Option<reload::Handle<EnvFilter, Registry>>,
}

/// 初始化日志
///
/// 在加载配置之前调用。`RUST_LOG` 优先；未设置时先使用 `info`，
/// 之后由 [`LogHandle::set_verbose`] 按配置调整。
/// 重复调用不会报错（测试中可能多次初始化）。
pub fn init() -> LogHandle {
    let from_env = EnvFilter::try_from_default_env().ok();
    let pinned = from_env.is_some();
    let (filter, handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new(default_level(false))));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .is_ok();

    LogHandle {
        filter: (installed && !pinned).then_some(handle),
    }
}

impl LogHandle {
    /// `verbose` 为 true 时切换到 `debug`；设置了 `RUST_LOG` 时不做改动
    pub fn set_verbose(&self, verbose: bool) {
        let Some(handle) = &self.filter else {
            return;
        };
        if let Err(e) = handle.reload(EnvFilter::new(default_level(verbose))) {
            warn!("调整日志级别失败: {}", e);
        }
    }
}

fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// 记录程序启动信息
///
/// # 参数
/// - `mode`: 运行模式（子命令名）
/// - `folder_id`: 监控的文件夹
pub fn log_startup(mode: &str, folder_id: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - {} 模式", mode);
    info!("📁 监控文件夹: {}", folder_id);
    info!(
        "启动时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
}

/// 打印一次导入的统计信息
///
/// # 参数
/// - `listed`: 列出的文件数
/// - `ingested`: 新写入台账的文件数
/// - `skipped`: 已在台账中而跳过的文件数
/// - `failed`: 处理失败的文件数
pub fn log_ingest_stats(listed: usize, ingested: usize, skipped: usize, failed: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 文件夹处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📄 文件总数: {}", listed);
    info!("✅ 新增: {}", ingested);
    info!("⏭️ 跳过: {}", skipped);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
