//! 检测器集合（bytes 正则）
use std::path::Path;

use tracing::warn;

use crate::rules::RuleSpec;
use crate::InspectError;

/// 已编译的单条规则
pub(crate) struct Detector {
    pub(crate) name: String,
    pub(crate) spec: RuleSpec,
    pub(crate) regex: regex::bytes::Regex,
}

/// 字节级检测器集合（顺序与规则加载顺序一致）
pub(crate) struct DetectorSet {
    pub(crate) detectors: Vec<Detector>,
}

impl DetectorSet {
    /// 从规则条目构建检测器集合；无法编译的规则记录告警后跳过
    pub(crate) fn from_specs(specs: Vec<RuleSpec>) -> Self {
        let mut detectors = Vec::with_capacity(specs.len());
        for spec in specs {
            match regex::bytes::Regex::new(&spec.pat) {
                Ok(regex) => {
                    let name = spec.display_name().to_string();
                    detectors.push(Detector { name, spec, regex });
                }
                Err(source) => {
                    let err = InspectError::RulePattern { id: spec.id.clone(), source };
                    warn!(error = %err, "skipping rule");
                }
            }
        }
        Self { detectors }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// 适用于该文件的检测器（携带其在集合中的序号）
    pub(crate) fn for_file<'a>(
        &'a self,
        path: &'a Path,
    ) -> impl Iterator<Item = (usize, &'a Detector)> + 'a {
        self.detectors.iter().enumerate().filter(move |(_, d)| d.spec.applies_to(path))
    }
}
