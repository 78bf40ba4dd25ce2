//! XPF 主引擎
//!
//! 组合例外表、预处理、逐字符规则匹配、后处理

use std::collections::HashMap;
use std::path::Path;

use unicode_normalization::UnicodeNormalization;

use crate::rule_source::{self, FetchOptions, RuleSource};
use crate::xpf::classes::ClassTable;
use crate::xpf::compiler::SubRule;
use crate::xpf::error::{ConfigurationError, Result};
use crate::xpf::loader::load_rules;
use crate::xpf::post::PostProcessor;
use crate::xpf::tokenizer::Tokenizer;
use crate::xpf::types::{PhonemeUnit, Rule, RuleSet, Transcription};

/// 无可用规则时输出的占位标记
pub const NO_TRANSLATE: &str = "@";
/// 中间转写串的单元分隔符
pub const UNIT_SEPARATOR: char = ' ';

pub const DEFAULT_PROVIDER_NAME: &str = "XpfTranscriptor";
/// 表示“适用于任意语言”的语言代码
pub const UNKNOWN_LANGUAGE: &str = "unknown";
pub const TRANSCRIPTION_TYPE: &str = "XPF";

/// XPF 转写引擎（构造后只读，可跨线程共享）
#[derive(Debug, Clone)]
pub struct XpfEngine {
    provider_name: String,
    language_code: String,
    /// 整词例外
    words: HashMap<String, Vec<PhonemeUnit>>,
    /// 预处理（文件顺序）
    pre: Vec<SubRule>,
    /// 单字符精确映射
    matches: HashMap<String, String>,
    /// 加权替换（声明顺序）
    subs: Vec<SubRule>,
    /// 后处理
    post: PostProcessor,
}

impl XpfEngine {
    /// 从规则表文本创建引擎
    pub fn new(rules_content: &str) -> Result<Self> {
        let rules = load_rules(rules_content)?;
        Ok(Self::from_rule_set(&rules)?)
    }

    /// 从本地规则文件创建引擎
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = rule_source::read_local(path.as_ref())?;
        Self::new(&content)
    }

    /// 从规则源（本地路径或远程地址）创建引擎
    pub async fn from_source(source: &RuleSource, options: &FetchOptions) -> Result<Self> {
        let content = rule_source::load(source, options).await?;
        Self::new(&content)
    }

    /// 编译已解析的规则集合
    pub fn from_rule_set(rules: &RuleSet) -> std::result::Result<Self, ConfigurationError> {
        let classes = ClassTable::from_rules(&rules.classes);

        let pre = compile_all(&rules.preprocess, &classes)?;
        let subs = compile_all(&rules.substitutions, &classes)?;
        let post = PostProcessor::new(compile_all(&rules.post_substitutions, &classes)?);

        let mut matches = HashMap::with_capacity(rules.exact_matches.len());
        for rule in &rules.exact_matches {
            matches.insert(rule.from.clone(), classes.expand(&rule.to)?);
        }

        let words = rules
            .word_exceptions
            .iter()
            .map(|rule| {
                let units = rule.to.split_whitespace().map(str::to_string).collect();
                (rule.from.clone(), units)
            })
            .collect();

        let engine = Self {
            provider_name: DEFAULT_PROVIDER_NAME.to_string(),
            language_code: UNKNOWN_LANGUAGE.to_string(),
            words,
            pre,
            matches,
            subs,
            post,
        };

        tracing::info!(
            "XPF 引擎已就绪: 字符类 {}, 例外词 {}, 预处理 {}, 精确映射 {}, 替换 {}, 后处理 {}",
            classes.len(),
            engine.words.len(),
            engine.pre.len(),
            engine.matches.len(),
            engine.subs.len(),
            engine.post.len()
        );

        Ok(engine)
    }

    /// 设置提供者名称与语言代码
    pub fn with_identity(mut self, provider_name: &str, language_code: &str) -> Self {
        self.provider_name = provider_name.to_string();
        self.language_code = language_code.to_string();
        self
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn language_code(&self) -> &str {
        &self.language_code
    }

    pub fn transcription_type(&self) -> &'static str {
        TRANSCRIPTION_TYPE
    }

    /// 语言代码相同（不区分大小写），或引擎未绑定语言
    pub fn supports_language(&self, language_code: &str) -> bool {
        self.language_code.eq_ignore_ascii_case(language_code)
            || self.language_code == UNKNOWN_LANGUAGE
    }

    /// 转写单个词，返回有序音素单元
    pub fn transcribe(&self, word: &str) -> Vec<PhonemeUnit> {
        self.transcribe_detailed(word).units
    }

    /// 转写单个词，返回拼接后的字符串
    pub fn transcribe_to_string(&self, word: &str) -> String {
        self.transcribe(word).concat()
    }

    /// 逐词独立转写，结果以单个空格连接
    pub fn transcribe_words<S: AsRef<str>>(&self, words: &[S]) -> String {
        words
            .iter()
            .map(|w| self.transcribe_to_string(w.as_ref()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 按空白切词后转写
    pub fn transcribe_text(&self, text: &str) -> String {
        self.transcribe_words(&Tokenizer::words(text))
    }

    /// 转写单个词
    ///
    /// 纯函数，不可失败（无规则的位置输出 [`NO_TRANSLATE`]）
    pub fn transcribe_detailed(&self, word: &str) -> Transcription {
        // 1. 整词例外（键已按 NFC 归一化）
        let key: String = word.nfc().collect();
        if let Some(saved) = self.words.get(&key) {
            return Transcription {
                units: saved.clone(),
                from_exception: true,
            };
        }

        // 2. 预处理 + 小写 + 去标点
        let source = self.preprocess(word);

        // 3. 逐字符匹配
        let units = self.transliterate(&source);

        // 4. 拼接 + 5. 后处理
        let joined = units.join(&UNIT_SEPARATOR.to_string());
        let processed = self.post.apply(&joined);

        // 6. 切分为音素单元
        Transcription {
            units: processed
                .split(UNIT_SEPARATOR)
                .filter(|u| !u.is_empty())
                .map(str::to_string)
                .collect(),
            from_exception: false,
        }
    }

    fn preprocess(&self, word: &str) -> String {
        let rewritten = self
            .pre
            .iter()
            .fold(word.to_string(), |acc, rule| rule.apply(&acc).into_owned());
        Tokenizer::clean(&rewritten)
    }

    /// 从左到右逐字符转写
    ///
    /// 上下文始终取自原始（未转换）字符
    fn transliterate(&self, source: &str) -> Vec<String> {
        let mut units = Vec::with_capacity(source.len());

        for (idx, ch) in source.char_indices() {
            let end = idx + ch.len_utf8();
            let letter = &source[idx..end];

            if let Some(mapped) = self.matches.get(letter) {
                units.push(mapped.clone());
                continue;
            }

            let preceding = &source[..idx];
            let following = &source[end..];

            match self.best_rule(letter, preceding, following) {
                Some(rule) => {
                    let out = rule.apply(letter);
                    if !out.is_empty() {
                        units.push(out.into_owned());
                    }
                }
                None => {
                    tracing::trace!("无可用规则: {:?} (位置 {})", letter, idx);
                    units.push(NO_TRANSLATE.to_string());
                }
            }
        }

        units
    }

    /// 权重最高的匹配规则；同权重取先声明者
    fn best_rule(&self, letter: &str, preceding: &str, following: &str) -> Option<&SubRule> {
        let mut best: Option<(f64, &SubRule)> = None;

        for rule in &self.subs {
            let Some(score) = rule.score(letter, preceding, following) else {
                continue;
            };
            match best {
                Some((top, _)) if score <= top => {}
                _ => best = Some((score, rule)),
            }
        }

        best.map(|(_, rule)| rule)
    }
}

fn compile_all(
    rules: &[Rule],
    classes: &ClassTable,
) -> std::result::Result<Vec<SubRule>, ConfigurationError> {
    rules.iter().map(|r| SubRule::compile(r, classes)).collect()
}
