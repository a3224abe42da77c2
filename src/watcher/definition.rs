//! 分组定义解析
//!
//! 分组定义是一个配置键的值，每行一个条目名称

use crate::error::DefinitionError;
use std::collections::HashSet;

/// 解析后的分组定义（有序且去重的条目名称集合）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDefinition {
    names: Vec<String>,
}

impl GroupDefinition {
    /// 解析分组定义文本
    ///
    /// `\n`、`\r\n` 和单独的 `\r` 都视为换行。每行去掉首尾空白，空行忽略，
    /// 重复名称只保留第一次出现的位置。出现制表符、回车以外的控制字符时视为非文本内容。
    ///
    /// # 参数
    /// * `raw` - 分组定义键的原始值
    ///
    /// # 返回
    /// * `Result<Self, DefinitionError>` - 解析结果
    pub fn parse(raw: &str) -> Result<Self, DefinitionError> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for (index, line) in raw.lines().enumerate() {
            if line.chars().any(|c| c.is_control() && c != '\t' && c != '\r') {
                return Err(DefinitionError::NonText { line: index + 1 });
            }

            for name in line.split('\r').map(str::trim) {
                if name.is_empty() || !seen.insert(name) {
                    continue;
                }
                names.push(name.to_string());
            }
        }

        Ok(Self { names })
    }

    /// 条目名称（按定义顺序）
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 是否包含指定条目
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_skips_blank_lines() {
        let definition = GroupDefinition::parse("item1\n item2 \n\n   \r\nitem3\r\n").unwrap();
        assert_eq!(definition.names(), ["item1", "item2", "item3"]);
    }

    #[test]
    fn test_parse_lone_carriage_return_separates_names() {
        let definition = GroupDefinition::parse("item1\ritem2\r\ritem3").unwrap();
        assert_eq!(definition.names(), ["item1", "item2", "item3"]);
        assert!(!definition.contains("item1\ritem2"));
    }

    #[test]
    fn test_parse_deduplicates_in_order() {
        let definition = GroupDefinition::parse("b\na\nb\n a").unwrap();
        assert_eq!(definition.names(), ["b", "a"]);
        assert!(definition.contains("a"));
        assert!(!definition.contains("c"));
    }

    #[test]
    fn test_parse_empty() {
        assert!(GroupDefinition::parse("").unwrap().is_empty());
        assert!(GroupDefinition::parse("\n \n\t\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_control_characters() {
        let result = GroupDefinition::parse("item1\nit\u{0}em2");
        assert_eq!(result, Err(DefinitionError::NonText { line: 2 }));
    }
}
