use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{value_parser, Arg, ArgMatches, Command};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use batchsync::{load_request, preview, Application, Definitions, ShutdownManager};
use batchsync_config::{AppConfig, LogFormat};
use batchsync_domain::TimeWindow;

/// 收到关闭信号后等待调度循环退出的上限
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

fn cli() -> Command {
    let file_arg = || {
        Arg::new("file")
            .value_name("FILE")
            .required(true)
            .value_parser(value_parser!(PathBuf))
    };

    Command::new("batchsync")
        .version("1.0.0")
        .about("批量内容同步调度系统")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(Command::new("run").about("运行调度循环"))
        .subcommand(
            Command::new("import")
                .about("校验并导入作业定义与调度定义")
                .arg(file_arg().help("定义文件 (JSON)"))
                .arg(
                    Arg::new("by")
                        .long("by")
                        .value_name("USER")
                        .help("记录在审计信息中的操作人")
                        .default_value("batchsync"),
                ),
        )
        .subcommand(
            Command::new("preview")
                .about("预览定义文件中的调度定义在窗口内的触发时刻")
                .arg(file_arg().help("定义文件 (JSON)"))
                .arg(
                    Arg::new("from")
                        .long("from")
                        .value_name("RFC3339")
                        .help("窗口起点（含），默认为当前时间")
                        .value_parser(parse_timestamp),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .value_name("RFC3339")
                        .help("窗口终点（不含），默认为起点加上 lookahead")
                        .value_parser(parse_timestamp),
                ),
        )
        .subcommand(
            Command::new("submit")
                .about("提交一个手工作业请求")
                .arg(file_arg().help("请求文件 (JSON)")),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let config = AppConfig::load(config_path).context("加载配置失败")?;

    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.observability.log_level.clone());
    let log_format = match matches.get_one::<String>("log-format") {
        Some(format) => format.parse::<LogFormat>().map_err(anyhow::Error::msg)?,
        None => config.observability.format()?,
    };
    init_logging(&log_level, log_format)?;

    match matches.subcommand() {
        Some(("run", _)) => run(config).await,
        Some(("import", args)) => import(config, args).await,
        Some(("preview", args)) => preview_command(&config, args),
        Some(("submit", args)) => submit(config, args).await,
        _ => Err(anyhow::anyhow!("未知的子命令")),
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("无效的时间 {value}: {e}"))
}

fn required_file(args: &ArgMatches) -> Result<&PathBuf> {
    args.get_one::<PathBuf>("file")
        .context("缺少文件参数")
}

async fn run(config: AppConfig) -> Result<()> {
    info!("启动批量内容同步调度系统");

    let app = Arc::new(Application::new(config).await?);
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);

        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e:#}");
            }
        })
    };

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    app.close().await;
    info!("批量内容同步调度系统已退出");
    Ok(())
}

async fn import(config: AppConfig, args: &ArgMatches) -> Result<()> {
    let definitions = Definitions::load(required_file(args)?)?;
    let by = args
        .get_one::<String>("by")
        .map(String::as_str)
        .unwrap_or("batchsync");

    let app = Application::new(config).await?;
    let summary = app.import(&definitions, by).await;
    app.close().await;

    println!("{}", serde_json::to_string_pretty(&summary?)?);
    Ok(())
}

fn preview_command(config: &AppConfig, args: &ArgMatches) -> Result<()> {
    let definitions = Definitions::load(required_file(args)?)?;

    let from = args
        .get_one::<DateTime<Utc>>("from")
        .copied()
        .unwrap_or_else(Utc::now);
    let to = match args.get_one::<DateTime<Utc>>("to") {
        Some(to) => *to,
        None => from
            .checked_add_signed(chrono::Duration::from_std(config.scheduler.lookahead())?)
            .context("预览窗口超出可表示范围")?,
    };

    let entries = preview(&definitions.schedefs, &TimeWindow::new(from, to));
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

async fn submit(config: AppConfig, args: &ArgMatches) -> Result<()> {
    let request = load_request(required_file(args)?)?;

    let app = Application::new(config).await?;
    let job = app.submit(&request).await;
    app.close().await;

    println!("{}", serde_json::to_string_pretty(&job?)?);
    Ok(())
}

/// 初始化日志系统，`RUST_LOG` 优先于配置
fn init_logging(log_level: &str, log_format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
    }

    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到Ctrl+C信号"),
        _ = terminate => info!("收到SIGTERM信号"),
    }
}
