//! 命中记录格式化为可读文本块
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::report::{MatchRecord, ScanReport};
use crate::Result;

/// 将报告中每条记录格式化为文本块，保持引擎输出顺序（不排序、不去重）
///
/// 报告本身无法解析时整体失败；单条记录失败只影响该条，其余记录照常输出。
pub fn format_report(json: &str) -> Result<Vec<Result<String>>> {
    let report = ScanReport::from_json(json)?;
    Ok(report.matches.iter().map(format_match).collect())
}

/// 格式化单条记录：
/// - 规则名行（以冒号结尾）、文件名行、`Excerpt:` 标题
/// - 片段逐行右裁剪、缩进两个空格，空白行不输出
/// - 末尾一个空行作为分隔
pub fn format_match(record: &MatchRecord) -> Result<String> {
    let raw = STANDARD.decode(record.excerpt.trim())?;
    let excerpt = String::from_utf8_lossy(&raw);

    let mut block = String::new();
    block.push_str(&record.rule_name);
    block.push_str(":\n");
    block.push_str(&record.file_name);
    block.push('\n');
    block.push_str("Excerpt:\n");
    for line in excerpt_lines(&excerpt) {
        block.push_str("  ");
        block.push_str(line);
        block.push('\n');
    }
    block.push('\n');
    Ok(block)
}

/// 按 CRLF / CR / LF 三种换行切分，返回右裁剪后的非空白行
pub fn excerpt_lines(text: &str) -> impl Iterator<Item = &str> {
    // 先按 LF 切分，CRLF 留下的行尾 CR 由 trim_end 去掉；行内的孤立 CR 再单独切分
    text.split('\n')
        .flat_map(|line| line.split('\r'))
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
}
