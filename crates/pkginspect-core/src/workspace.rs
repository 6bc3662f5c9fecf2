//! 临时工作区（作用域内独占，离开作用域即删除）
use std::path::Path;

use tempfile::TempDir;
use tracing::{trace, warn};

const WORKSPACE_PREFIX: &str = "pkginspect-";

/// 为单个目标创建的唯一命名临时目录
///
/// 名称唯一性由 `tempfile` 保证（冲突时自动换名重试）。目录在 `close` 或
/// `Drop` 时递归删除，任何退出路径（包括 panic 展开）都不会遗留。
#[derive(Debug)]
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    /// 在系统临时目录下创建工作区
    pub fn create() -> std::io::Result<Self> {
        Self::create_in(std::env::temp_dir())
    }

    /// 在指定父目录下创建工作区
    pub fn create_in(parent: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(WORKSPACE_PREFIX).tempdir_in(parent)?;
        trace!(path = %dir.path().display(), "creating workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// 显式删除并记录失败；删除失败不影响目标结果
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        trace!(path = %path.display(), "deleting workspace");
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "failed to delete workspace");
        }
    }
}
