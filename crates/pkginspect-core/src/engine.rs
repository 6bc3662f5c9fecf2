//! 检视引擎：契约与内置规则引擎实现
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rayon::prelude::*;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::detectors::DetectorSet;
use crate::findings::{sort_findings_stable, Finding, LineIndex};
use crate::options::AnalyzeOptions;
use crate::report::{MatchRecord, ScanReport};
use crate::rules::{default_rule_specs, load_rule_directory, load_rule_specs, RuleSpec};
use crate::Result;

/// 检视引擎契约：分析一个源码目录，返回 JSON 报告
///
/// `Ok(None)` 表示引擎没有产出任何输出，与“零命中的合法 JSON”不同，
/// 调用方应将其视为内部失败。
pub trait InspectionEngine: Send + Sync {
    fn analyze(&self, options: &AnalyzeOptions) -> Result<Option<String>>;
}

/// 二进制判定的抽样长度
const BINARY_SAMPLE: usize = 8192;

/// 基于 TOML 规则与 `regex::bytes` 的内置引擎
#[derive(Debug, Clone)]
pub struct RuleEngine {
    /// 片段在命中行前后各附带的上下文行数
    pub context_lines: usize,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self { context_lines: 1 }
    }
}

impl InspectionEngine for RuleEngine {
    fn analyze(&self, options: &AnalyzeOptions) -> Result<Option<String>> {
        let detectors = DetectorSet::from_specs(load_effective_rules(options)?);
        if detectors.is_empty() {
            // 没有任何可用规则：不产出报告
            warn!(path = %options.source_path.display(), "no rules loaded; nothing to match");
            return Ok(None);
        }

        let files = collect_files(&options.source_path)?;
        let per_file: Vec<Vec<MatchRecord>> = files
            .par_iter()
            .map(|path| self.scan_one(&options.source_path, path, &detectors, options))
            .collect();

        let report = ScanReport { matches: per_file.into_iter().flatten().collect() };
        debug!(
            path = %options.source_path.display(),
            matches = report.matches.len(),
            "analysis finished"
        );
        report.to_json().map(Some)
    }
}

impl RuleEngine {
    fn scan_one(
        &self,
        root: &Path,
        path: &Path,
        detectors: &DetectorSet,
        options: &AnalyzeOptions,
    ) -> Vec<MatchRecord> {
        if let Some(max) = options.max_file_size {
            if let Ok(md) = std::fs::metadata(path) {
                if md.len() > max {
                    return Vec::new();
                }
            }
        }
        let buf = match read_file(path) {
            Ok(b) => b,
            Err(e) => {
                if !options.suppress_logging {
                    warn!(path = %path.display(), error = %e, "cannot read file");
                }
                return Vec::new();
            }
        };
        let sample_len = buf.len().min(BINARY_SAMPLE);
        if is_probably_binary(&buf[..sample_len]) {
            return Vec::new();
        }

        let file_name = relative_name(root, path);
        let records = self.scan_buffer(&buf, path, &file_name, detectors);
        if !options.suppress_logging {
            debug!(file = %file_name, matches = records.len(), "scanned file");
        }
        records
    }

    /// 在单个文件缓冲区上运行所有适用规则
    /// - 同一规则在同一起始行只输出一次
    /// - 按起始偏移、规则序号排序
    fn scan_buffer(
        &self,
        buf: &[u8],
        path: &Path,
        file_name: &str,
        detectors: &DetectorSet,
    ) -> Vec<MatchRecord> {
        let mut findings: Vec<Finding> = Vec::new();
        for (rule_index, d) in detectors.for_file(path) {
            for m in d.regex.find_iter(buf) {
                if m.end() <= m.start() {
                    continue;
                }
                findings.push(Finding {
                    rule_index,
                    rule_name: d.name.clone(),
                    start_offset: m.start(),
                    end_offset: m.end(),
                });
            }
        }
        if findings.is_empty() {
            return Vec::new();
        }
        sort_findings_stable(&mut findings);

        let lines = LineIndex::new(buf);
        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        let mut out = Vec::new();
        for f in findings {
            let first = lines.line_of(f.start_offset);
            if !seen.insert((f.rule_index, first)) {
                continue;
            }
            // 结束偏移是开区间，取最后一个匹配字节所在行
            let last = lines.line_of(f.end_offset - 1);
            let from = first.saturating_sub(self.context_lines);
            let to = (last + self.context_lines).min(lines.line_count() - 1);
            let (s, e) = lines.span(from, to);
            out.push(MatchRecord {
                rule_name: f.rule_name,
                file_name: file_name.to_string(),
                excerpt: STANDARD.encode(&buf[s..e]),
            });
        }
        out
    }
}

/// 按选项组合内置规则与自定义规则
fn load_effective_rules(options: &AnalyzeOptions) -> Result<Vec<RuleSpec>> {
    let mut specs = Vec::new();
    if !options.ignore_default_rules {
        specs.extend(default_rule_specs()?);
    }
    if let Some(custom) = &options.custom_rules_path {
        if custom.is_file() {
            specs.extend(load_rule_specs(custom)?);
        } else {
            specs.extend(load_rule_directory(custom)?);
        }
    }
    Ok(specs)
}

/// 递归收集源码目录下的普通文件，按文件名排序确保输出顺序稳定
fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn read_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

/// 相对源码根目录的路径，统一使用 `/` 分隔
fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// 判定缓冲区是否“明显是二进制”
/// - 只要包含任何 NUL 字节即认为二进制；
/// - 否则可打印 ASCII 比例（含 tab/CR/LF）低于 25% 则认为二进制。
fn is_probably_binary(buf: &[u8]) -> bool {
    if buf.is_empty() {
        return false;
    }
    if buf.contains(&0) {
        return true;
    }
    let printable = buf
        .iter()
        .filter(|&&b| matches!(b, 0x09 | 0x0A | 0x0D) || (0x20..=0x7E).contains(&b))
        .count();
    (printable as f32 / buf.len() as f32) < 0.25
}
