//! dbkv-config 主程序入口
//!
//! 数据库支撑的实时配置缓存

use anyhow::{Context, Result};
use dbkv_config::cli::args::{Args, Commands};
use dbkv_config::cli::commands::{
    Command, GetCommand, InitCommand, InsertCommand, ServeCommand, UpdateCommand,
    ValidateCommand,
};
use dbkv_config::logging::{LogConfig, LoggingSystem};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse_args();

    // 初始化日志系统
    let log_config = LogConfig {
        level: args.log_level.clone().into(),
        console: true,
        json_format: args.json_logs,
        ..Default::default()
    };

    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("dbkv-config v{} 启动", dbkv_config::VERSION);

    // 执行命令
    if let Err(e) = execute_command(&args).await {
        error!("命令执行失败: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(args: &Args) -> Result<()> {
    let command: Box<dyn Command> = match &args.command {
        Commands::Serve => Box::new(ServeCommand),
        Commands::Get { .. } => Box::new(GetCommand),
        Commands::Insert { .. } => Box::new(InsertCommand),
        Commands::Update { .. } => Box::new(UpdateCommand),
        Commands::Validate => Box::new(ValidateCommand),
        Commands::Init { .. } => Box::new(InitCommand),
    };
    command.execute(args).await
}
