use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::PathBuf;

use summary_broadcast::models::TriageStatus;
use summary_broadcast::orchestrator::FireOutcome;
use summary_broadcast::utils::logging;
use summary_broadcast::{App, Config};

fn cli() -> Command {
    Command::new("summary-broadcast")
        .version(env!("CARGO_PKG_VERSION"))
        .about("PDF 通知摘要与定时推送")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("配置文件路径（默认读取当前目录的 pipeline.toml）"),
        )
        .subcommand(Command::new("ingest").about("导入文件夹中最近更新的 PDF"))
        .subcommand(Command::new("sweep").about("为待推送的台账行登记推送任务"))
        .subcommand(
            Command::new("fire")
                .about("立即执行一个推送任务")
                .arg(Arg::new("action_id").required(true).help("任务ID")),
        )
        .subcommand(Command::new("dispatch").about("执行所有到期的任务"))
        .subcommand(
            Command::new("requeue")
                .about("推送失败后重新排队")
                .arg(Arg::new("document_id").required(true).help("文档ID"))
                .arg(
                    Arg::new("at")
                        .long("at")
                        .required(true)
                        .help("新的推送时间，例如 \"2024-11-03 09:00\""),
                ),
        )
        .subcommand(
            Command::new("errors")
                .about("查看和处理错误台账")
                .subcommand_required(true)
                .subcommand(
                    Command::new("list")
                        .about("列出错误记录")
                        .arg(Arg::new("subject").long("subject").help("只显示该主体的记录")),
                )
                .subcommand(
                    Command::new("resolve")
                        .about("更新错误记录的处理状态")
                        .arg(
                            Arg::new("index")
                                .required(true)
                                .value_parser(value_parser!(usize))
                                .help("错误记录序号"),
                        )
                        .arg(
                            Arg::new("status")
                                .required(true)
                                .help("unhandled / in_progress / resolved / ignored"),
                        ),
                ),
        )
        .subcommand(Command::new("daemon").about("常驻运行：定时导入、扫描和推送"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    let log = logging::init();

    let matches = cli().get_matches();

    // 加载配置
    let config = Config::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .inspect_err(|e| tracing::error!("❌ 配置加载失败: {}", e))?;
    log.set_verbose(config.verbose_logging);

    // 初始化并运行应用
    let app = App::initialize(config).await?;

    match matches.subcommand() {
        Some(("ingest", _)) => {
            let stats = app.ingest().await?;
            println!(
                "处理完成: 新增 {} / 跳过 {} / 失败 {} (共 {})",
                stats.ingested, stats.skipped, stats.failed, stats.listed
            );
        }
        Some(("sweep", _)) => {
            let report = app.sweep().await?;
            println!(
                "扫描完成: 新登记 {} / 重新登记 {} / 已过期 {} / 需人工处理 {}",
                report.scheduled, report.rearmed, report.skipped_past, report.stale
            );
        }
        Some(("fire", args)) => {
            let outcome = app.fire(arg(args, "action_id")?).await?;
            match outcome {
                FireOutcome::Delivered { document_id } => println!("推送成功: {}", document_id),
                FireOutcome::SendFailed { document_id } => println!("推送失败: {}", document_id),
                FireOutcome::NothingToSend => println!("没有待推送的内容"),
            }
        }
        Some(("dispatch", _)) => {
            let stats = app.dispatch().await?;
            println!(
                "到期任务 {}: 推送 {} / 扫描 {} / 失败 {}",
                stats.due, stats.delivered, stats.sweeps, stats.failed
            );
        }
        Some(("requeue", args)) => {
            let document_id = arg(args, "document_id")?;
            let at = parse_datetime(arg(args, "at")?)?;
            let id = app.requeue(document_id, at).await?;
            println!("已重新排队: {} @ {} (任务 {})", document_id, at, id);
        }
        Some(("errors", sub)) => run_errors(&app, sub).await?,
        Some(("daemon", _)) => app.run_daemon().await?,
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}

async fn run_errors(app: &App, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("list", args)) => {
            let subject = args.get_one::<String>("subject").map(String::as_str);
            let errors = app.errors(subject).await?;
            if errors.is_empty() {
                println!("没有错误记录");
            }
            for (index, record) in errors {
                println!(
                    "#{} [{}] {} {} - {}",
                    index,
                    record.status,
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.subject,
                    record.message
                );
            }
        }
        Some(("resolve", args)) => {
            let index = *args
                .get_one::<usize>("index")
                .context("缺少错误记录序号")?;
            let status: TriageStatus = arg(args, "status")?
                .parse()
                .map_err(anyhow::Error::msg)?;
            app.set_error_status(index, status).await?;
            println!("错误记录 #{} 已更新为 {}", index, status);
        }
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}

fn arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("缺少参数: {}", name))
}

/// 支持 `YYYY-MM-DD HH:MM`、`YYYY-MM-DDTHH:MM` 以及带秒的写法
fn parse_datetime(value: &str) -> Result<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value.trim(), f).ok())
        .with_context(|| format!("无法解析时间: {}", value))
}
