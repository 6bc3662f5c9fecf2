//! 运行配置与引擎选项
use std::path::{Path, PathBuf};

use crate::retriever::DEFAULT_DOWNLOAD_COMMAND;

/// 一次运行的配置（由命令行解析得到，此后只读）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// 待处理的包标识，保持命令行顺序
    pub targets: Vec<String>,
    /// 不加载内置规则
    pub disable_default_rules: bool,
    /// 自定义规则目录
    pub custom_rule_directory: Option<PathBuf>,
    /// 并发处理的目标数：None 表示自动（等于 CPU 核数）；Some(1) 走串行
    pub jobs: Option<usize>,
    /// 最大扫描文件大小（字节）；超过则跳过
    pub max_file_size: Option<u64>,
    /// 外部下载工具
    pub download_command: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            disable_default_rules: false,
            custom_rule_directory: None,
            jobs: Some(1),
            max_file_size: None,
            download_command: DEFAULT_DOWNLOAD_COMMAND.to_string(),
        }
    }
}

impl ScanConfig {
    /// 针对某个解包目录生成引擎选项
    pub fn analyze_options(&self, source_path: &Path) -> AnalyzeOptions {
        AnalyzeOptions {
            source_path: source_path.to_path_buf(),
            custom_rules_path: self.custom_rule_directory.clone(),
            ignore_default_rules: self.disable_default_rules,
            suppress_logging: true,
            max_file_size: self.max_file_size,
        }
    }

    /// 实际使用的并发数
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// 传给检视引擎的选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeOptions {
    pub source_path: PathBuf,
    pub custom_rules_path: Option<PathBuf>,
    pub ignore_default_rules: bool,
    /// 抑制引擎自身的逐文件日志
    pub suppress_logging: bool,
    pub max_file_size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_defaults_without_custom_directory() {
        let cfg = ScanConfig { disable_default_rules: true, ..ScanConfig::default() };
        let opts = cfg.analyze_options(Path::new("/tmp/src"));
        assert!(opts.ignore_default_rules);
        assert_eq!(opts.custom_rules_path, None);
        assert!(opts.suppress_logging);
        assert_eq!(opts.source_path, PathBuf::from("/tmp/src"));
    }

    #[test]
    fn custom_directory_passed_verbatim() {
        let cfg = ScanConfig {
            custom_rule_directory: Some(PathBuf::from("/rules")),
            ..ScanConfig::default()
        };
        let opts = cfg.analyze_options(Path::new("/x"));
        assert_eq!(opts.custom_rules_path.as_deref(), Some(Path::new("/rules")));
        assert!(!opts.ignore_default_rules);
    }

    #[test]
    fn jobs_never_zero() {
        let cfg = ScanConfig { jobs: Some(0), ..ScanConfig::default() };
        assert_eq!(cfg.effective_jobs(), 1);
        let auto = ScanConfig { jobs: None, ..ScanConfig::default() };
        assert!(auto.effective_jobs() >= 1);
    }
}
