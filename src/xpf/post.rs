//! XPF 后处理
//!
//! 在拼接后的完整转写串上按权重降序执行全局替换（同权重保持声明顺序）

use std::cmp::Ordering;

use crate::xpf::compiler::SubRule;

/// 后处理规则链
#[derive(Debug, Clone, Default)]
pub struct PostProcessor {
    /// 已按权重降序排列
    rules: Vec<SubRule>,
}

impl PostProcessor {
    pub fn new(mut rules: Vec<SubRule>) -> Self {
        // sort_by 是稳定排序，同权重保持声明顺序（-0 与 0 视为同权重）
        rules.sort_by(|a, b| b.weight().partial_cmp(&a.weight()).unwrap_or(Ordering::Equal));
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply(&self, text: &str) -> String {
        apply_all(text, &self.rules)
    }
}

/// 依次折叠每条规则的全局替换
pub fn apply_all(text: &str, rules: &[SubRule]) -> String {
    rules
        .iter()
        .fold(text.to_string(), |acc, rule| rule.apply(&acc).into_owned())
}
