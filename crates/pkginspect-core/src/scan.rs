//! 扫描编排：逐目标获取 → 逐目录检视 → 格式化
use std::io::Write;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::engine::InspectionEngine;
use crate::format::format_report;
use crate::options::ScanConfig;
use crate::retriever::PackageRetriever;
use crate::workspace::TempWorkspace;
use crate::{InspectError, Result};

/// 单个解包目录的检视结果
#[derive(Debug)]
pub struct DirectoryOutcome {
    pub directory: PathBuf,
    /// 成功格式化的文本块（保持引擎顺序）
    pub blocks: Vec<String>,
    /// 引擎、报告或单条记录的错误；为空表示该目录完全成功
    pub errors: Vec<InspectError>,
}

impl DirectoryOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug)]
pub enum TargetStatus {
    /// 获取成功；各目录结果见列表（目录可能各自失败）
    Completed(Vec<DirectoryOutcome>),
    /// 获取阶段或工作区准备失败，未进行任何检视
    Failed(InspectError),
}

/// 单个目标的处理结果
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: String,
    pub status: TargetStatus,
}

impl TargetOutcome {
    /// 本目标全部成功格式化的文本块
    pub fn blocks(&self) -> impl Iterator<Item = &str> {
        let dirs: &[DirectoryOutcome] = match &self.status {
            TargetStatus::Completed(dirs) => dirs,
            TargetStatus::Failed(_) => &[],
        };
        dirs.iter().flat_map(|d| d.blocks.iter().map(String::as_str))
    }

    /// 获取成功且所有目录均检视成功
    pub fn is_success(&self) -> bool {
        match &self.status {
            TargetStatus::Completed(dirs) => dirs.iter().all(DirectoryOutcome::is_success),
            TargetStatus::Failed(_) => false,
        }
    }
}

/// 整批结果（按命令行顺序）
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<TargetOutcome>,
    pub blocks_written: usize,
}

impl BatchReport {
    pub fn failed_targets(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter(|o| !o.is_success()).map(|o| o.target.as_str())
    }
}

/// 编排器：持有获取器、引擎与只读配置
pub struct Orchestrator<R, E> {
    retriever: R,
    engine: E,
    config: ScanConfig,
    workspace_root: Option<PathBuf>,
}

impl<R: PackageRetriever, E: InspectionEngine> Orchestrator<R, E> {
    pub fn new(retriever: R, engine: E, config: ScanConfig) -> Self {
        Self { retriever, engine, config, workspace_root: None }
    }

    /// 在指定目录下创建临时工作区（默认系统临时目录）
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// 处理整批目标但不写出，便于测试直接断言结果集
    pub fn run(&self) -> BatchReport {
        let mut report = BatchReport::default();
        // 收集回调不会失败
        let _ = self.for_each_outcome(|outcome| {
            report.blocks_written += outcome.blocks().count();
            report.outcomes.push(outcome);
            Ok(())
        });
        report
    }

    /// 处理单个目标：创建工作区 → 获取 → 逐目录检视 → 删除工作区
    pub fn analyze_target(&self, target: &str) -> TargetOutcome {
        trace!(package = target, "analyze package");
        let workspace = match self.create_workspace() {
            Ok(w) => w,
            Err(e) => {
                warn!(package = target, error = %e, "error processing target");
                return TargetOutcome {
                    target: target.to_string(),
                    status: TargetStatus::Failed(e.into()),
                };
            }
        };

        let status = match self.retriever.download(target, workspace.path()) {
            Ok(dirs) if dirs.is_empty() => {
                warn!(package = target, "error downloading package");
                TargetStatus::Failed(InspectError::NoDirectories(target.to_string()))
            }
            Ok(dirs) => {
                TargetStatus::Completed(dirs.iter().map(|d| self.analyze_directory(d)).collect())
            }
            Err(e) => {
                warn!(package = target, error = %e, "error processing target");
                TargetStatus::Failed(e)
            }
        };

        // 无论检视结果如何，先删除工作区再处理下一个目标
        workspace.close();
        TargetOutcome { target: target.to_string(), status }
    }

    /// 检视单个目录并逐条格式化；失败只记录告警
    ///
    /// 某条记录无法格式化时跳过该条，同目录其余记录照常输出。
    pub fn analyze_directory(&self, directory: &Path) -> DirectoryOutcome {
        trace!(directory = %directory.display(), "analyze directory");
        let mut outcome = DirectoryOutcome {
            directory: directory.to_path_buf(),
            blocks: Vec::new(),
            errors: Vec::new(),
        };
        let options = self.config.analyze_options(directory);
        let records = self
            .engine
            .analyze(&options)
            .and_then(|json| {
                debug!(len = ?json.as_ref().map(String::len), "operation complete");
                json.ok_or(InspectError::NoEngineOutput)
            })
            .and_then(|json| format_report(&json));

        match records {
            Ok(records) => {
                for record in records {
                    match record {
                        Ok(block) => outcome.blocks.push(block),
                        Err(e) => {
                            warn!(
                                directory = %directory.display(),
                                error = %e,
                                "error formatting match"
                            );
                            outcome.errors.push(e);
                        }
                    }
                }
            }
            Err(e) => {
                warn!(directory = %directory.display(), error = %e, "error analyzing directory");
                outcome.errors.push(e);
            }
        }
        outcome
    }

    fn create_workspace(&self) -> std::io::Result<TempWorkspace> {
        match &self.workspace_root {
            Some(root) => TempWorkspace::create_in(root),
            None => TempWorkspace::create(),
        }
    }

    /// 按命令行顺序逐个产出目标结果
    /// - 串行：处理完一个目标立即产出
    /// - 并发：在 rayon 线程池中处理，收集后按原顺序产出
    fn for_each_outcome(&self, mut emit: impl FnMut(TargetOutcome) -> Result<()>) -> Result<()> {
        let jobs = self.config.effective_jobs().min(self.config.targets.len().max(1));
        if jobs > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => {
                    debug!(jobs, "processing targets concurrently");
                    let outcomes: Vec<TargetOutcome> = pool.install(|| {
                        self.config.targets.par_iter().map(|t| self.analyze_target(t)).collect()
                    });
                    for outcome in outcomes {
                        emit(outcome)?;
                    }
                    return Ok(());
                }
                Err(e) => warn!(error = %e, "cannot build thread pool; processing sequentially"),
            }
        }
        for target in &self.config.targets {
            emit(self.analyze_target(target))?;
        }
        Ok(())
    }
}

/// 处理整批目标并将文本块流式写入 `out`
pub fn scan_and_write<R, E>(
    orchestrator: &Orchestrator<R, E>,
    out: &mut dyn Write,
) -> Result<BatchReport>
where
    R: PackageRetriever,
    E: InspectionEngine,
{
    let mut report = BatchReport::default();
    orchestrator.for_each_outcome(|outcome| {
        for block in outcome.blocks() {
            out.write_all(block.as_bytes())?;
            report.blocks_written += 1;
        }
        out.flush()?;
        report.outcomes.push(outcome);
        Ok(())
    })?;

    info!(
        targets = report.outcomes.len(),
        failed = report.failed_targets().count(),
        blocks = report.blocks_written,
        "batch finished"
    );
    Ok(report)
}
