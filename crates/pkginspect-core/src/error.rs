//! 错误类型
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// 核心库统一错误
#[derive(Debug, Error)]
pub enum InspectError {
    /// 获取器未产出任何目录
    #[error("error downloading {0}")]
    NoDirectories(String),

    /// 外部下载工具不在 PATH 中
    #[error("download tool `{0}` not found on PATH")]
    DownloaderMissing(String),

    /// 外部下载工具以非零状态退出
    #[error("download tool `{program}` failed ({status}): {stderr}")]
    DownloaderFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// 归档格式无法识别
    #[error("unsupported archive {0}")]
    UnsupportedArchive(PathBuf),

    /// 引擎未返回任何输出（区别于零命中的合法 JSON）
    #[error("no output retrieved from inspection engine")]
    NoEngineOutput,

    #[error("malformed scan report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("malformed excerpt: {0}")]
    Excerpt(#[from] base64::DecodeError),

    #[error("cannot read rule file {path}: {source}")]
    RuleFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse rule file {path}: {source}")]
    RuleFileToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid pattern for rule `{id}`: {source}")]
    RulePattern {
        id: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InspectError>;
