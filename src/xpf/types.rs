//! XPF 类型定义

/// 音素单元（转写输出的一个片段）
pub type PhonemeUnit = String;

/// 规则类型
///
/// 在加载阶段由 `type` 列一次性解析，热路径中不再比较字符串
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// 整词正则预处理（`pre`）
    Preprocess,
    /// 字符类定义（`class`）
    ClassDefinition,
    /// 单字符精确映射（`match`）
    ExactMatch,
    /// 带上下文与权重的替换（`sub`）
    Substitution,
    /// 整串后处理替换（`ipasub`）
    PostSubstitution,
    /// 整词例外（`word`）
    WordException,
}

impl RuleKind {
    /// 解析规则表中的类型标记
    ///
    /// 未知标记返回 None（向前兼容，调用方跳过该行）
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "pre" => Some(RuleKind::Preprocess),
            "class" => Some(RuleKind::ClassDefinition),
            "match" => Some(RuleKind::ExactMatch),
            "sub" => Some(RuleKind::Substitution),
            "ipasub" => Some(RuleKind::PostSubstitution),
            "word" => Some(RuleKind::WordException),
            _ => None,
        }
    }
}

/// 规则表列名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Type,
    From,
    To,
    Precede,
    Follow,
    Weight,
}

impl Column {
    /// 列名 → 字段的静态分派表
    pub fn from_header(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "type" => Some(Column::Type),
            "sfrom" => Some(Column::From),
            "sto" => Some(Column::To),
            "precede" => Some(Column::Precede),
            "follow" => Some(Column::Follow),
            "weight" => Some(Column::Weight),
            _ => None,
        }
    }
}

/// 单条规则
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub kind: RuleKind,
    /// 源模式（`sfrom`）
    pub from: String,
    /// 替换模板（`sto`）
    pub to: String,
    /// 前文上下文模式
    pub precede: String,
    /// 后文上下文模式
    pub follow: String,
    /// 冲突时的优先级（越大越优先）
    pub weight: f64,
}

impl Rule {
    pub fn new(kind: RuleKind, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            kind,
            from: from.into(),
            to: to.into(),
            precede: String::new(),
            follow: String::new(),
            weight: 0.0,
        }
    }

    pub fn with_context(mut self, precede: impl Into<String>, follow: impl Into<String>) -> Self {
        self.precede = precede.into();
        self.follow = follow.into();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// 按类型分组的规则集合（组内保持文件顺序）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    pub preprocess: Vec<Rule>,
    pub classes: Vec<Rule>,
    pub exact_matches: Vec<Rule>,
    pub substitutions: Vec<Rule>,
    pub post_substitutions: Vec<Rule>,
    pub word_exceptions: Vec<Rule>,
}

impl RuleSet {
    pub fn push(&mut self, rule: Rule) {
        let bucket = match rule.kind {
            RuleKind::Preprocess => &mut self.preprocess,
            RuleKind::ClassDefinition => &mut self.classes,
            RuleKind::ExactMatch => &mut self.exact_matches,
            RuleKind::Substitution => &mut self.substitutions,
            RuleKind::PostSubstitution => &mut self.post_substitutions,
            RuleKind::WordException => &mut self.word_exceptions,
        };
        bucket.push(rule);
    }

    pub fn len(&self) -> usize {
        self.preprocess.len()
            + self.classes.len()
            + self.exact_matches.len()
            + self.substitutions.len()
            + self.post_substitutions.len()
            + self.word_exceptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 单词转写结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcription {
    /// 有序音素单元
    pub units: Vec<PhonemeUnit>,
    /// 是否命中整词例外
    pub from_exception: bool,
}

impl Transcription {
    /// 拼接后的字符串形式
    pub fn joined(&self) -> String {
        self.units.concat()
    }

    /// 是否含有无法转写的位置
    pub fn is_degraded(&self, sentinel: &str) -> bool {
        self.units.iter().any(|u| u.contains(sentinel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_kind_tags() {
        let tags = [
            ("pre", RuleKind::Preprocess),
            ("class", RuleKind::ClassDefinition),
            ("match", RuleKind::ExactMatch),
            ("sub", RuleKind::Substitution),
            ("ipasub", RuleKind::PostSubstitution),
            ("word", RuleKind::WordException),
        ];
        for (tag, kind) in tags {
            assert_eq!(RuleKind::from_tag(tag), Some(kind));
        }
        assert_eq!(RuleKind::from_tag(" sub "), Some(RuleKind::Substitution));
        assert_eq!(RuleKind::from_tag("comment"), None);
        assert_eq!(RuleKind::from_tag(""), None);
    }

    #[test]
    fn test_column_header_case_insensitive() {
        assert_eq!(Column::from_header("SFrom"), Some(Column::From));
        assert_eq!(Column::from_header(" weight "), Some(Column::Weight));
        assert_eq!(Column::from_header("note"), None);
    }

    #[test]
    fn test_rule_set_groups_by_kind() {
        let mut set = RuleSet::default();
        set.push(Rule::new(RuleKind::Substitution, "a", "b"));
        set.push(Rule::new(RuleKind::ClassDefinition, "V", "aeiou"));
        set.push(Rule::new(RuleKind::Substitution, "c", "k"));

        assert_eq!(set.len(), 3);
        assert_eq!(set.classes.len(), 1);
        assert_eq!(set.substitutions[0].from, "a");
        assert_eq!(set.substitutions[1].from, "c");
    }

    #[test]
    fn test_transcription_degraded() {
        let t = Transcription {
            units: vec!["k".to_string(), "@".to_string()],
            from_exception: false,
        };
        assert_eq!(t.joined(), "k@");
        assert!(t.is_degraded("@"));
    }
}
