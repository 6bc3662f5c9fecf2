//! 命中项与排序（内部使用）

/// 单次命中的内部表示
#[derive(Debug, Clone)]
pub(crate) struct Finding {
    pub(crate) rule_index: usize,
    pub(crate) rule_name: String,
    pub(crate) start_offset: usize,
    pub(crate) end_offset: usize,
}

/// 对单文件命中进行稳定排序：起始偏移升序 → 规则序号升序
pub(crate) fn sort_findings_stable(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        a.start_offset.cmp(&b.start_offset).then(a.rule_index.cmp(&b.rule_index))
    });
}

/// 行起始偏移表，用于把字节偏移映射到行号
pub(crate) struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// CR、LF、CRLF 均视为换行
    pub(crate) fn new(buf: &[u8]) -> Self {
        let mut starts = vec![0];
        let mut i = 0;
        while i < buf.len() {
            match buf[i] {
                b'\r' if buf.get(i + 1) == Some(&b'\n') => {
                    starts.push(i + 2);
                    i += 2;
                    continue;
                }
                b'\r' | b'\n' => starts.push(i + 1),
                _ => {}
            }
            i += 1;
        }
        Self { starts, len: buf.len() }
    }

    /// 偏移所在的行号（从 0 开始）
    pub(crate) fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        }
    }

    /// 第 `first..=last` 行对应的字节区间（含行尾换行符）
    pub(crate) fn span(&self, first: usize, last: usize) -> (usize, usize) {
        let start = self.starts[first];
        let end = self.starts.get(last + 1).copied().unwrap_or(self.len);
        (start, end)
    }

    pub(crate) fn line_count(&self) -> usize {
        self.starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_by_offset_then_rule() {
        let f = |rule_index, start_offset| Finding {
            rule_index,
            rule_name: String::new(),
            start_offset,
            end_offset: start_offset + 1,
        };
        let mut v = vec![f(2, 10), f(1, 10), f(0, 30), f(3, 5)];
        sort_findings_stable(&mut v);
        let order: Vec<(usize, usize)> = v.iter().map(|x| (x.start_offset, x.rule_index)).collect();
        assert_eq!(order, vec![(5, 3), (10, 1), (10, 2), (30, 0)]);
    }

    #[test]
    fn line_index_handles_all_breaks() {
        let buf = b"a\r\nb\rc\nd";
        let idx = LineIndex::new(buf);
        assert_eq!(idx.line_count(), 4);
        assert_eq!(idx.line_of(0), 0);
        assert_eq!(idx.line_of(3), 1);
        assert_eq!(idx.line_of(5), 2);
        assert_eq!(idx.line_of(7), 3);
        assert_eq!(idx.span(1, 2), (3, 7));
        assert_eq!(idx.span(3, 3), (7, 8));
    }
}
