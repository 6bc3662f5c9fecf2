//! 包检视核心库
//!
//! 设计要点：
//! - 单遍流水线：包标识 → 临时工作区内的解包目录 → 检视引擎 JSON 报告 → 文本块。
//! - 获取（retriever）与检视（engine）均通过 trait 隔离，便于替换与测试。
//! - 每个目标独占一个临时工作区，离开作用域即递归删除。
//! - 单个目标失败只记录告警，不中断整批；结果以 `TargetOutcome` 形式收集。

mod detectors;
mod engine;
mod error;
mod findings;
mod format;
mod options;
mod report;
mod retriever;
mod rules;
mod scan;
mod workspace;

pub use engine::{InspectionEngine, RuleEngine};
pub use error::{InspectError, Result};
pub use format::{excerpt_lines, format_match, format_report};
pub use options::{AnalyzeOptions, ScanConfig};
pub use report::{MatchRecord, ScanReport};
pub use retriever::{
    ArchiveRetriever, CommandRetriever, DefaultRetriever, DirectoryRetriever, PackageRetriever,
    DEFAULT_DOWNLOAD_COMMAND,
};
pub use scan::{
    scan_and_write, BatchReport, DirectoryOutcome, Orchestrator, TargetOutcome, TargetStatus,
};
pub use workspace::TempWorkspace;
