//! 规则文件加载（TOML）
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{InspectError, Result};

/// 内置规则（随二进制分发）
const DEFAULT_RULES: &str = include_str!("../rules/default.toml");

/// 单条规则的配置（支持 pattern 或 regex 字段）
#[derive(Debug, Clone, Deserialize)]
struct RuleEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
    /// 仅对这些扩展名生效（不含点，忽略大小写）；为空表示所有文件
    #[serde(default)]
    pub file_extensions: Vec<String>,
}

/// 顶层规则文件结构
#[derive(Debug, Clone, Deserialize)]
struct RuleFile {
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

/// 归一化后的规则规格（内部使用）
#[derive(Debug, Clone)]
pub(crate) struct RuleSpec {
    pub id: String,
    pub name: Option<String>,
    pub pat: String,
    pub file_extensions: Vec<String>,
}

impl RuleSpec {
    /// 报告中展示的规则名：优先 name，缺省用 id
    pub(crate) fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub(crate) fn applies_to(&self, path: &Path) -> bool {
        if self.file_extensions.is_empty() {
            return true;
        }
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(e) => e,
            None => return false,
        };
        self.file_extensions.iter().any(|x| x.eq_ignore_ascii_case(ext))
    }
}

/// 解析 TOML 文本并归一化为 RuleSpec 列表
fn parse_rule_specs(txt: &str, path: &Path) -> Result<Vec<RuleSpec>> {
    let parsed: RuleFile = toml::from_str(txt).map_err(|source| InspectError::RuleFileToml {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = Vec::new();

    for e in parsed.rules {
        // 兼容两种字段名：pattern 或 regex
        let pat = match (e.pattern, e.regex) {
            (Some(p), _) => p,
            (None, Some(r)) => r,
            _ => continue,
        };
        let file_extensions = e
            .file_extensions
            .into_iter()
            .map(|x| x.trim_start_matches('.').to_string())
            .collect();
        out.push(RuleSpec { id: e.id, name: e.name, pat, file_extensions });
    }

    Ok(out)
}

/// 从单个 TOML 规则文件加载
pub(crate) fn load_rule_specs(path: &Path) -> Result<Vec<RuleSpec>> {
    let txt = std::fs::read_to_string(path).map_err(|source| InspectError::RuleFileIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rule_specs(&txt, path)
}

/// 内置规则
pub(crate) fn default_rule_specs() -> Result<Vec<RuleSpec>> {
    parse_rule_specs(DEFAULT_RULES, Path::new("<built-in>/default.toml"))
}

/// 递归加载目录下全部 `*.toml` 规则文件（按路径排序，结果顺序可复现）
pub(crate) fn load_rule_directory(dir: &Path) -> Result<Vec<RuleSpec>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let is_toml = entry.path().extension().is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if entry.file_type().is_file() && is_toml {
            files.push(entry.into_path());
        }
    }

    let mut out = Vec::new();
    for f in files {
        out.extend(load_rule_specs(&f)?);
    }
    Ok(out)
}
