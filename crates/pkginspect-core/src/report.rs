//! 检视报告（引擎 JSON 输出的结构）
use serde::{Deserialize, Serialize};

/// 引擎报告顶层对象
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    #[serde(rename = "FormattedMatchList")]
    pub matches: Vec<MatchRecord>,
}

/// 单条命中记录；`excerpt` 为 base64 编码后的片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub rule_name: String,
    pub file_name: String,
    pub excerpt: String,
}

impl ScanReport {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_engine_field_names_and_ignores_extra_fields() {
        let json = r#"{
            "FormattedMatchList": [
                {
                    "ruleName": "Network: URL",
                    "fileName": "src/a.js",
                    "excerpt": "aGk=",
                    "severity": "Moderate"
                }
            ],
            "AppVersion": "1.0"
        }"#;
        let report = ScanReport::from_json(json).unwrap();
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].rule_name, "Network: URL");
        assert_eq!(report.matches[0].file_name, "src/a.js");
        assert_eq!(report.matches[0].excerpt, "aGk=");
    }

    #[test]
    fn missing_match_list_is_an_error() {
        assert!(ScanReport::from_json(r#"{"other": []}"#).is_err());
        assert!(ScanReport::from_json("not json").is_err());
    }

    #[test]
    fn serializes_with_engine_field_names() {
        let report = ScanReport {
            matches: vec![MatchRecord {
                rule_name: "r".into(),
                file_name: "f".into(),
                excerpt: "eA==".into(),
            }],
        };
        let json = report.to_json().unwrap();
        assert!(json.contains("\"FormattedMatchList\""));
        assert!(json.contains("\"ruleName\":\"r\""));
        assert!(json.contains("\"fileName\":\"f\""));
    }
}
