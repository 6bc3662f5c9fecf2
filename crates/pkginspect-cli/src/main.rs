use anyhow::{Context, Result};
use clap::Parser;
use pkginspect_core::{
    scan_and_write, DefaultRetriever, Orchestrator, RuleEngine, ScanConfig,
    DEFAULT_DOWNLOAD_COMMAND,
};
use std::ffi::OsString;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, warn};

const TOOL_NAME: &str = "pkginspect";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 命令行入口（基于 clap）
///
/// 帮助与版本由自身处理（输出到 stderr 并以 1 退出），未识别的参数一律视为包标识。
#[derive(Parser, Debug)]
#[command(
    name = "pkginspect",
    disable_help_flag = true,
    disable_version_flag = true,
    args_override_self = true
)]
struct Cli {
    #[arg(short = 'h', long = "help")]
    help: bool,

    #[arg(short = 'v', long = "version")]
    version: bool,

    /// 从该目录加载自定义规则（递归读取 *.toml）
    #[arg(long = "custom-rule-directory", value_name = "DIR", allow_hyphen_values = true)]
    custom_rule_directory: Option<PathBuf>,

    /// 不加载内置规则
    #[arg(long = "disable-default-rules")]
    disable_default_rules: bool,

    /// 并发处理的包数量（"auto"=CPU 核心数）
    #[arg(long, default_value = "1")]
    jobs: String,

    /// 最大扫描文件大小（字节）
    #[arg(long = "max-file-size", value_name = "BYTES")]
    max_file_size: Option<u64>,

    /// 外部下载工具
    #[arg(
        long = "download-command",
        value_name = "PROG",
        allow_hyphen_values = true,
        default_value = DEFAULT_DOWNLOAD_COMMAND
    )]
    download_command: String,

    /// 包标识（可重复）
    #[arg(value_name = "package-url")]
    targets: Vec<String>,
}

/// 无参数的开关
const SWITCHES: [&str; 5] = ["-h", "--help", "-v", "--version", "--disable-default-rules"];
/// 需要紧随一个值的选项
const VALUED: [&str; 4] =
    ["--custom-rule-directory", "--jobs", "--max-file-size", "--download-command"];

/// 参数解析结果
#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Run(ScanConfig),
    Help,
    Version,
    /// 用法错误，附带提示信息
    Usage(String),
}

fn main() -> Result<ExitCode> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    debug!("{TOOL_NAME} {VERSION}");

    let config = match parse_args(std::env::args_os()) {
        Invocation::Run(config) => config,
        Invocation::Help => {
            print_usage();
            return Ok(ExitCode::from(1));
        }
        Invocation::Version => {
            eprintln!("{TOOL_NAME} {VERSION}");
            return Ok(ExitCode::from(1));
        }
        Invocation::Usage(msg) => {
            warn!("{msg}");
            print_usage();
            return Ok(ExitCode::from(1));
        }
    };

    info!(targets = config.targets.len(), jobs = config.effective_jobs(), "starting analysis");
    let retriever = DefaultRetriever::with_download_command(config.download_command.clone());
    let orchestrator = Orchestrator::new(retriever, RuleEngine::default(), config);

    // 文本块写到 stdout，日志走 stderr
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let report = scan_and_write(&orchestrator, &mut out).context("write findings")?;
    out.flush().ok();

    for target in report.failed_targets() {
        debug!(package = target, "target had failures");
    }
    Ok(ExitCode::SUCCESS)
}

/// 将原始参数解析为 Invocation；不做任何退出动作，便于测试
fn parse_args<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match split_targets(args) {
        Ok(args) => args,
        Err(msg) => return Invocation::Usage(msg),
    };
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let rendered = e.to_string();
            let first = rendered.lines().next().unwrap_or_default();
            return Invocation::Usage(first.trim_start_matches("error: ").to_string());
        }
    };

    if cli.help {
        return Invocation::Help;
    }
    if cli.version {
        return Invocation::Version;
    }
    let jobs = match parse_jobs(&cli.jobs) {
        Some(jobs) => jobs,
        None => return Invocation::Usage(format!("invalid value '{}' for --jobs", cli.jobs)),
    };
    if cli.targets.is_empty() {
        return Invocation::Usage("No target provided; nothing to analyze.".to_string());
    }

    Invocation::Run(ScanConfig {
        targets: cli.targets,
        disable_default_rules: cli.disable_default_rules,
        custom_rule_directory: cli.custom_rule_directory,
        jobs,
        max_file_size: cli.max_file_size,
        download_command: cli.download_command,
    })
}

/// 预先切分参数：已知选项（及其值）交给 clap，其余一律作为包标识放到 `--` 之后
///
/// 选项可以出现在任意位置；选项的值按原样取下一个参数（即使以 `-` 开头）。
fn split_targets<I, T>(args: I) -> Result<Vec<OsString>, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut args = args.into_iter().map(Into::into);
    let mut options: Vec<OsString> = args.next().into_iter().collect();
    let mut targets: Vec<OsString> = Vec::new();

    while let Some(arg) = args.next() {
        let text = arg.to_string_lossy().into_owned();
        let is_inline = VALUED.iter().any(|v| text.starts_with(&format!("{v}=")));
        if VALUED.contains(&text.as_str()) {
            let value = args
                .next()
                .ok_or_else(|| format!("a value is required for '{text}' but none was supplied"))?;
            options.push(arg);
            options.push(value);
        } else if SWITCHES.contains(&text.as_str()) || is_inline {
            options.push(arg);
        } else {
            targets.push(arg);
        }
    }

    options.push("--".into());
    options.extend(targets);
    Ok(options)
}

/// 解析并发参数："auto" 表示自动（等于 CPU 核数）；其他须为正整数
fn parse_jobs(s: &str) -> Option<Option<usize>> {
    if s.eq_ignore_ascii_case("auto") {
        return Some(None);
    }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(Some(n)),
        _ => None,
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn print_usage() {
    eprintln!(
        "
{TOOL_NAME} {VERSION}

Usage: {TOOL_NAME} [options] package-url...

positional arguments:
    package-url                 package identifier to download (required, repeats OK);
                                a local .tar.gz/.tgz/.crate archive or directory also works

optional arguments:
  --custom-rule-directory DIR   load rules from directory DIR
  --disable-default-rules       do not load default, built-in rules.
  --jobs N|auto                 analyze up to N packages concurrently (default 1)
  --max-file-size BYTES         skip files larger than BYTES
  --download-command PROG       download tool for package identifiers
                                (default {DEFAULT_DOWNLOAD_COMMAND})
  --help                        show this help message and exit
  --version                     show version of this tool
"
    );
}
