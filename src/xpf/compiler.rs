//! XPF 规则编译
//!
//! 将展开后的规则编译为正则匹配器。所有文本翻译（字符类、词边界、
//! 反向引用）都在这里一次完成，转写热路径只做匹配。

use std::borrow::Cow;

use fancy_regex::Regex;

use crate::xpf::classes::ClassTable;
use crate::xpf::error::ConfigurationError;
use crate::xpf::types::Rule;

/// 规则语法中的“词首”标记
const TOKEN_START_MARKER: &str = r"^\b";
/// 规则语法中的“词尾”标记
const TOKEN_END_MARKER: &str = r"\b$";
/// 词首：文本开头或空白之后
const TOKEN_START_PATTERN: &str = r"(?:^|(?<=\s))";
/// 词尾：文本结尾或空白之前
const TOKEN_END_PATTERN: &str = r"(?=\s|$)";

/// 编译后的替换规则
#[derive(Debug, Clone)]
pub struct SubRule {
    from: Regex,
    to: String,
    /// 锚定在前文末尾；空模式为 None（总是匹配）
    precede: Option<Regex>,
    /// 锚定在后文开头；空模式为 None（总是匹配）
    follow: Option<Regex>,
    weight: f64,
}

impl SubRule {
    /// 编译一条规则
    pub fn compile(rule: &Rule, classes: &ClassTable) -> Result<Self, ConfigurationError> {
        let from = translate_boundaries(&classes.expand(&rule.from)?);
        let to = classes.expand(&rule.to)?;
        let precede = translate_boundaries(&classes.expand(&rule.precede)?);
        let follow = translate_boundaries(&classes.expand(&rule.follow)?);

        let from = build_regex(&from)?;
        let to = translate_backreferences(&to, from.captures_len())?;

        let precede = if precede.is_empty() {
            None
        } else {
            Some(build_regex(&format!("(?:{})$", precede))?)
        };
        let follow = if follow.is_empty() {
            None
        } else {
            Some(build_regex(&format!("^(?:{})", follow))?)
        };

        Ok(Self {
            from,
            to,
            precede,
            follow,
            weight: rule.weight,
        })
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// 替换模板（已翻译为 `${n}` 语法）
    pub fn template(&self) -> &str {
        &self.to
    }

    /// 三个模式全部匹配时返回权重
    pub fn score(&self, unit: &str, preceding: &str, following: &str) -> Option<f64> {
        let matched = is_match(&self.from, unit)
            && self.precede.as_ref().map_or(true, |re| is_match(re, preceding))
            && self.follow.as_ref().map_or(true, |re| is_match(re, following));

        matched.then_some(self.weight)
    }

    /// 对输入执行全局替换，反向引用取自输入的捕获组
    pub fn apply<'t>(&self, input: &'t str) -> Cow<'t, str> {
        match self.from.try_replacen(input, 0, self.to.as_str()) {
            Ok(replaced) => replaced,
            Err(err) => {
                tracing::warn!("规则替换失败 {:?}: {}", self.from.as_str(), err);
                Cow::Borrowed(input)
            }
        }
    }
}

fn build_regex(pattern: &str) -> Result<Regex, ConfigurationError> {
    Regex::new(pattern).map_err(|err| ConfigurationError::InvalidPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}

/// 运行期匹配错误（如回溯上限）视为不匹配
fn is_match(re: &Regex, text: &str) -> bool {
    re.is_match(text).unwrap_or_else(|err| {
        tracing::warn!("规则匹配失败 {:?}: {}", re.as_str(), err);
        false
    })
}

/// 词边界标记 → 具体的断言模式
pub(crate) fn translate_boundaries(pattern: &str) -> String {
    pattern
        .replace(TOKEN_END_MARKER, TOKEN_END_PATTERN)
        .replace(TOKEN_START_MARKER, TOKEN_START_PATTERN)
}

/// 反向引用 `\1`..`\9` → `${1}`..`${9}`，字面 `$` 转义为 `$$`
///
/// `groups` 为模式的捕获组数量（含第 0 组）
pub(crate) fn translate_backreferences(
    template: &str,
    groups: usize,
) -> Result<String, ConfigurationError> {
    let mut out = String::with_capacity(template.len() + 4);
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d @ '1'..='9') => {
                    chars.next();
                    let group = d as usize - '0' as usize;
                    if group >= groups {
                        return Err(ConfigurationError::InvalidBackreference {
                            template: template.to_string(),
                            group,
                            available: groups.saturating_sub(1),
                        });
                    }
                    out.push_str(&format!("${{{}}}", group));
                }
                _ => out.push(ch),
            },
            _ => out.push(ch),
        }
    }

    Ok(out)
}
