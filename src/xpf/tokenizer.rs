//! XPF 分词器
//!
//! 将输入文本分割为：字母、空白、标点

use unicode_normalization::UnicodeNormalization;

/// 转写前去除的标点
const PUNCTUATION: &[char] = &[
    '?', '!', '.', ',', ';', ':', '-', '(', ')', '[', ']', '{', '}', '"', '\'', '`',
];

/// Token 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// 非空白、非标点字符序列
    Letters,
    /// 空白符序列
    Whitespace,
    /// 标点序列
    Punctuation,
}

/// Token
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub text: &'a str,
    pub token_type: TokenType,
}

/// 分词器
pub struct Tokenizer;

impl Tokenizer {
    /// 按字符类型将文本分割为 Token 序列
    pub fn tokenize(text: &str) -> Vec<Token<'_>> {
        let mut tokens = Vec::new();
        let mut current: Option<(TokenType, usize)> = None;

        for (idx, ch) in text.char_indices() {
            let char_type = Self::classify_char(ch);

            match current {
                Some((ct, _)) if ct == char_type => {}
                Some((ct, start)) => {
                    tokens.push(Token {
                        text: &text[start..idx],
                        token_type: ct,
                    });
                    current = Some((char_type, idx));
                }
                None => current = Some((char_type, idx)),
            }
        }

        if let Some((ct, start)) = current {
            tokens.push(Token {
                text: &text[start..],
                token_type: ct,
            });
        }

        tokens
    }

    /// 以空白切分出的单词（保留单词内的标点）
    pub fn words(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    /// 去除标点与首尾空白
    pub fn strip_punctuation(word: &str) -> String {
        Self::tokenize(word)
            .into_iter()
            .filter(|t| t.token_type != TokenType::Punctuation)
            .map(|t| t.text)
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// 转写前的清理：小写 + 去标点 + NFC 归一化
    pub fn clean(word: &str) -> String {
        let lowered = word.to_lowercase();
        Self::strip_punctuation(&lowered).nfc().collect()
    }

    fn classify_char(ch: char) -> TokenType {
        if ch.is_whitespace() {
            TokenType::Whitespace
        } else if PUNCTUATION.contains(&ch) {
            TokenType::Punctuation
        } else {
            TokenType::Letters
        }
    }
}
