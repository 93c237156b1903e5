use clap::Parser;
use git_proxy_sync::app;
use git_proxy_sync::config::Config;
use git_proxy_sync::detect::ProcessEnv;
use git_proxy_sync::ui::{OutputFormat, report};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

/// 检测系统代理，验证连通性，并同步到 git 的 http.proxy / https.proxy
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 配置文件路径
    #[arg(short = 'f', long, default_value = "config/config.yaml")]
    config: String,

    /// 连通性检测地址
    #[arg(long)]
    target: Option<String>,

    /// 连通性检测超时时间（毫秒）
    #[arg(long)]
    timeout: Option<u64>,

    /// 只显示将要执行的操作，不修改 git 配置
    #[arg(long)]
    dry_run: bool,

    /// 写入指定的 git 配置文件而不是全局配置
    #[arg(long)]
    git_config_file: Option<String>,

    /// 不读取操作系统代理设置
    #[arg(long)]
    no_system_settings: bool,

    /// 不显示进度动画
    #[arg(long)]
    no_progress: bool,

    /// 日志级别
    #[arg(long)]
    log_level: Option<String>,

    /// 输出格式
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// 详细输出
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(path: &str, announce: bool) -> Config {
    if !Path::new(path).exists() {
        if announce {
            println!("📝 使用默认配置 (配置文件不存在: {})", path);
        }
        return Config::default();
    }

    match Config::load_from_file(path) {
        Ok(config) => {
            if announce {
                println!("📁 从配置文件加载设置: {}", path);
            }
            config
        }
        Err(e) => {
            eprintln!("⚠️  配置文件加载失败: {}", e);
            eprintln!("📝 使用默认配置");
            Config::default()
        }
    }
}

fn apply_args(config: &mut Config, args: &Args) {
    if let Some(target) = &args.target {
        config.probe_url = target.clone();
    }
    if let Some(timeout) = args.timeout {
        config.probe_timeout = timeout;
    }
    if args.dry_run {
        config.dry_run = true;
    }
    if let Some(file) = &args.git_config_file {
        config.git_config_file = Some(file.clone());
    }
    if args.no_system_settings {
        config.use_system_settings = false;
    }
    if args.no_progress {
        config.print_progress = false;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    let text_output = args.format == OutputFormat::Text;

    let mut config = load_config(&args.config, text_output);
    let env = Arc::new(ProcessEnv);
    if let Err(e) = config.apply_env_overrides(&*env) {
        eprintln!("❌ {}", e);
        return ExitCode::FAILURE;
    }
    apply_args(&mut config, &args);

    let level = if args.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let store = app::git_store(&config);
    let summary = match app::run(&config, env, &store, text_output).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match report::render(&summary, args.format) {
        Ok(Some(rendered)) => println!("{}", rendered),
        Ok(None) => report::print_text(&summary, args.verbose),
        Err(e) => {
            eprintln!("❌ 结果序列化失败: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
