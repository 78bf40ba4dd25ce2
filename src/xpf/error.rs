//! XPF 错误类型
//!
//! 所有错误只在引擎构造阶段产生，转写阶段不会失败

use thiserror::Error;

/// 规则表配置错误（构造期致命错误，不重试）
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// 规则源为空
    #[error("规则源为空")]
    EmptySource,

    /// 规则源超过大小上限
    #[error("规则源过大: {bytes} 字节 (上限 {limit})")]
    SourceTooLarge { bytes: usize, limit: usize },

    /// 找不到表头行
    #[error("规则表缺少表头")]
    MissingHeader,

    /// 表头缺少 `type` 列，无法分派任何规则
    #[error("规则表表头缺少 type 列")]
    MissingTypeColumn,

    /// 表头中同一列出现多次
    #[error("规则表表头重复列: {0}")]
    DuplicateColumn(String),

    /// 字符类占位符无法解析（未定义或循环引用）
    #[error("无法解析的字符类 {names:?}: {field}")]
    UnresolvedClass { field: String, names: Vec<String> },

    /// 正则编译失败
    #[error("非法模式 {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// 替换模板引用了不存在的捕获组
    #[error("非法反向引用 \\{group} (模式只有 {available} 个捕获组): {template}")]
    InvalidBackreference {
        template: String,
        group: usize,
        available: usize,
    },
}

/// 引擎构造错误
#[derive(Debug, Error)]
pub enum XpfError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// 读取或拉取规则源失败（由调用方决定是否重试）
    #[error("规则源初始化失败: {0}")]
    Initialization(String),
}

impl XpfError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, XpfError::Configuration(_))
    }

    pub fn is_initialization(&self) -> bool {
        matches!(self, XpfError::Initialization(_))
    }
}

impl From<std::io::Error> for XpfError {
    fn from(err: std::io::Error) -> Self {
        XpfError::Initialization(err.to_string())
    }
}

impl From<reqwest::Error> for XpfError {
    fn from(err: reqwest::Error) -> Self {
        XpfError::Initialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, XpfError>;
