//! XPF (eXtensible Phonetic Framework) - 基于规则表的字形→音素转写
//!
//! 规则表一次编译为只读表，之后每次转写都是纯计算。
//!
//! ## 处理流程
//! 1. 整词例外查表（命中直接返回）
//! 2. 预处理正则替换 → 小写 → 去标点
//! 3. 逐字符：精确映射优先，否则按权重选择替换规则（上下文取原始字符）
//! 4. 以空格拼接各单元
//! 5. 后处理规则按权重降序全局替换
//! 6. 按空格切分为音素单元

mod classes;
mod compiler;
pub mod engine;
pub mod error;
mod loader;
mod post;
mod tokenizer;
pub mod types;

pub use classes::ClassTable;
pub use compiler::SubRule;
pub use engine::{XpfEngine, NO_TRANSLATE};
pub use error::{ConfigurationError, XpfError};
pub use loader::load_rules;
pub use post::{apply_all, PostProcessor};
pub use tokenizer::Tokenizer;
pub use types::{PhonemeUnit, Rule, RuleKind, RuleSet, Transcription};
