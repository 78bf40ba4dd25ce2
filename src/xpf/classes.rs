//! XPF 字符类展开
//!
//! 将规则字段中的 `{Name}` 占位符替换为字符类的字面值，直到不动点

use std::collections::HashMap;

use crate::xpf::error::ConfigurationError;
use crate::xpf::types::Rule;

/// 字符类表（类名 → 展开值），仅在编译期使用
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    classes: HashMap<String, String>,
}

/// 字段中的一个占位符
struct Placeholder<'a> {
    start: usize,
    end: usize,
    name: &'a str,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由 class 规则构建，后定义者覆盖先定义者
    pub fn from_rules(rules: &[Rule]) -> Self {
        let mut table = Self::new();
        for rule in rules {
            table.insert(&rule.from, &rule.to);
        }
        table
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        if let Some(old) = self.classes.insert(name.to_string(), value.to_string()) {
            tracing::debug!("字符类 {} 被重新定义: {:?} -> {:?}", name, old, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.classes.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// 展开次数上限：最长引用链不超过类的个数
    fn max_passes(&self) -> usize {
        self.classes.len() + 1
    }

    /// 展开字段中的全部占位符
    ///
    /// 超过次数上限仍有占位符（未定义或循环引用）时返回配置错误
    pub fn expand(&self, field: &str) -> Result<String, ConfigurationError> {
        let mut current = field.to_string();

        for _ in 0..self.max_passes() {
            let placeholders = find_placeholders(&current);
            if placeholders.is_empty() {
                return Ok(current);
            }

            let mut next = String::with_capacity(current.len());
            let mut last_end = 0;
            let mut replaced = false;

            for ph in &placeholders {
                next.push_str(&current[last_end..ph.start]);
                match self.get(ph.name) {
                    Some(value) => {
                        next.push_str(value);
                        replaced = true;
                    }
                    None => next.push_str(&current[ph.start..ph.end]),
                }
                last_end = ph.end;
            }
            next.push_str(&current[last_end..]);

            // 本轮没有任何可替换项，再展开也不会变化
            if !replaced {
                break;
            }
            current = next;
        }

        let names: Vec<String> = find_placeholders(&current)
            .iter()
            .map(|ph| ph.name.to_string())
            .collect();
        if names.is_empty() {
            return Ok(current);
        }

        Err(ConfigurationError::UnresolvedClass {
            field: field.to_string(),
            names,
        })
    }
}

/// 查找 `{Name}` 占位符
///
/// 以数字或逗号开头的花括号是正则量词（`{2}`、`{2,3}`、`{,3}`），不视为占位符
fn find_placeholders(text: &str) -> Vec<Placeholder<'_>> {
    let mut found = Vec::new();
    let mut offset = 0;

    while let Some(open) = text[offset..].find('{') {
        let start = offset + open;
        let body_start = start + 1;

        let Some(close) = text[body_start..].find(['{', '}']) else {
            break;
        };
        let close = body_start + close;

        // 内部又出现 '{'，从它重新开始
        if text[close..].starts_with('{') {
            offset = close;
            continue;
        }

        let name = &text[body_start..close];
        let is_class_name = name
            .chars()
            .next()
            .is_some_and(|c| !c.is_ascii_digit() && c != ',');

        if is_class_name && !is_escaped(text, start) {
            found.push(Placeholder {
                start,
                end: close + 1,
                name,
            });
        }
        offset = close + 1;
    }

    found
}

/// `\{` 是字面花括号
fn is_escaped(text: &str, pos: usize) -> bool {
    let backslashes = text[..pos].chars().rev().take_while(|&c| c == '\\').count();
    backslashes % 2 == 1
}
