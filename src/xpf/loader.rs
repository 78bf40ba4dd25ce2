//! XPF 规则加载
//!
//! 解析逗号分隔的规则表：第一条非空、非注释行为表头，其余为数据行

use unicode_normalization::UnicodeNormalization;

use crate::xpf::error::ConfigurationError;
use crate::xpf::types::{Column, Rule, RuleKind, RuleSet};

/// 注释行前缀
pub const COMMENT_PREFIX: char = '#';
/// 列分隔符
pub const DELIMITER: char = ',';

/// 解析后的表头：每一列对应的字段（未知列为 None）
#[derive(Debug, Clone)]
struct Header {
    columns: Vec<Option<Column>>,
    raw: Vec<String>,
}

impl Header {
    fn parse(line: &str) -> Result<Self, ConfigurationError> {
        let raw: Vec<String> = line.split(DELIMITER).map(|s| s.trim().to_string()).collect();
        let mut columns = Vec::with_capacity(raw.len());

        for name in &raw {
            let column = Column::from_header(name);
            match column {
                Some(col) if columns.contains(&Some(col)) => {
                    return Err(ConfigurationError::DuplicateColumn(name.clone()));
                }
                Some(_) => {}
                None => tracing::warn!("忽略未知规则列: {:?}", name),
            }
            columns.push(column);
        }

        if !columns.contains(&Some(Column::Type)) {
            return Err(ConfigurationError::MissingTypeColumn);
        }

        Ok(Self { columns, raw })
    }

    /// 数据行是否为表头的重复
    fn is_repeat(&self, cells: &[&str]) -> bool {
        cells.len() == self.raw.len() && cells.iter().zip(&self.raw).all(|(c, h)| c.trim() == h)
    }
}

fn is_skippable(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with(COMMENT_PREFIX)
}

/// 解析权重，非法或非有限值回退为 0.0
fn parse_weight(value: &str) -> f64 {
    let value = value.trim();
    if value.is_empty() {
        return 0.0;
    }
    match value.parse::<f64>() {
        Ok(w) if w.is_finite() => w,
        _ => {
            tracing::warn!("非法规则权重 {:?}，按 0.0 处理", value);
            0.0
        }
    }
}

/// 加载规则表
///
/// - 未知 `type` 的行被跳过（向前兼容）
/// - 列数少于表头的行被跳过
/// - 组内保持文件顺序
pub fn load_rules(content: &str) -> Result<RuleSet, ConfigurationError> {
    let content: String = content.nfc().collect();
    let mut lines = content.lines().filter(|l| !is_skippable(l));

    let header = match lines.next() {
        Some(line) => Header::parse(line)?,
        None => return Err(ConfigurationError::MissingHeader),
    };

    let mut set = RuleSet::default();
    let mut skipped = 0usize;

    for line in lines {
        let cells: Vec<&str> = line.split(DELIMITER).collect();

        if header.is_repeat(&cells) {
            continue;
        }
        if cells.len() < header.columns.len() {
            tracing::debug!("跳过列数不足的规则行: {:?}", line);
            skipped += 1;
            continue;
        }

        let mut kind = None;
        let mut rule = Rule::new(RuleKind::Substitution, "", "");

        for (column, cell) in header.columns.iter().zip(&cells) {
            match column {
                Some(Column::Type) => kind = RuleKind::from_tag(cell),
                Some(Column::From) => rule.from = (*cell).to_string(),
                Some(Column::To) => rule.to = (*cell).to_string(),
                Some(Column::Precede) => rule.precede = (*cell).to_string(),
                Some(Column::Follow) => rule.follow = (*cell).to_string(),
                Some(Column::Weight) => rule.weight = parse_weight(cell),
                None => {}
            }
        }

        match kind {
            Some(kind) => {
                rule.kind = kind;
                set.push(rule);
            }
            None => {
                tracing::debug!("跳过未知类型的规则行: {:?}", line);
                skipped += 1;
            }
        }
    }

    tracing::debug!("规则表解析完成: {} 条规则, 跳过 {} 行", set.len(), skipped);
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_basic_table() {
        let content = "\
# comment line
type,sfrom,sto,precede,follow,weight

class,V,aeiou,,,
sub,c,k,,a,1
sub,c,s,,e,2.5
word,the,ð ə,,,
";
        let set = load_rules(content).expect("load rules");
        assert_eq!(set.classes.len(), 1);
        assert_eq!(set.substitutions.len(), 2);
        assert_eq!(set.word_exceptions.len(), 1);
        assert_eq!(set.substitutions[0].follow, "a");
        assert_eq!(set.substitutions[1].weight, 2.5);
        assert_eq!(set.word_exceptions[0].to, "ð ə");
    }

    #[test]
    fn test_comments_and_blank_lines_between_rows() {
        let content =
            "type,sfrom,sto\nsub,a,b\n# mid comment\n\nsub,c,d\n  \t\n# another\nmatch,e,f\n";
        let set = load_rules(content).expect("load rules");
        assert_eq!(set.len(), 3);
        assert_eq!(set.substitutions[0].from, "a");
        assert_eq!(set.substitutions[1].from, "c");
        assert_eq!(set.exact_matches[0].to, "f");
    }

    #[test]
    fn test_header_any_order_and_subset() {
        let content = "sto,type,sfrom\nk,sub,c\nə,match,a\n";
        let set = load_rules(content).expect("load rules");
        assert_eq!(set.substitutions[0].from, "c");
        assert_eq!(set.substitutions[0].to, "k");
        assert_eq!(set.substitutions[0].precede, "");
        assert_eq!(set.substitutions[0].weight, 0.0);
        assert_eq!(set.exact_matches[0].to, "ə");
    }

    #[test]
    fn test_unknown_type_skipped() {
        let content = "type,sfrom,sto\nfuture,x,y\nsub,a,b\n";
        let set = load_rules(content).expect("load rules");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_short_rows_skipped() {
        let content = "type,sfrom,sto,weight\nsub,a\nsub,b,c,1\n";
        let set = load_rules(content).expect("load rules");
        assert_eq!(set.substitutions.len(), 1);
        assert_eq!(set.substitutions[0].from, "b");
    }

    #[test]
    fn test_malformed_weight_defaults_to_zero() {
        let content = "type,sfrom,sto,weight\nsub,a,b,heavy\nsub,c,d,NaN\n";
        let set = load_rules(content).expect("load rules");
        assert_eq!(set.substitutions[0].weight, 0.0);
        assert_eq!(set.substitutions[1].weight, 0.0);
    }

    #[test]
    fn test_repeated_header_row_skipped() {
        let content = "type,sfrom,sto\nsub,a,b\ntype,sfrom,sto\nsub,c,d\n";
        let set = load_rules(content).expect("load rules");
        assert_eq!(set.substitutions.len(), 2);
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            load_rules("# only comments\n\n").unwrap_err(),
            ConfigurationError::MissingHeader
        );
    }

    #[test]
    fn test_missing_type_column() {
        assert_eq!(
            load_rules("sfrom,sto\na,b\n").unwrap_err(),
            ConfigurationError::MissingTypeColumn
        );
    }

    #[test]
    fn test_duplicate_column() {
        assert!(matches!(
            load_rules("type,sfrom,sfrom\n").unwrap_err(),
            ConfigurationError::DuplicateColumn(_)
        ));
    }

    #[test]
    fn test_unknown_columns_ignored() {
        let content = "type,note,sfrom,sto\nsub,anything,a,b\n";
        let set = load_rules(content).expect("load rules");
        assert_eq!(set.substitutions[0].from, "a");
        assert_eq!(set.substitutions[0].to, "b");
    }

    #[test]
    fn test_crlf_lines() {
        let content = "type,sfrom,sto\r\nsub,a,b\r\n";
        let set = load_rules(content).expect("load rules");
        assert_eq!(set.substitutions[0].to, "b");
    }
}
