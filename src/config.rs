// src/config.rs

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::rule_source::{FetchOptions, RuleCache, RuleSource};

// ============================================================================
// 单语言规则源
// ============================================================================

/// 单个语言的规则源配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageRules {
    /// 语言代码（如 "vi", "vi-VN"）
    pub code: String,
    /// 本地路径或远程地址
    pub source: String,
    /// 提供者显示名称
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
}

fn default_rules_base_url() -> String {
    "https://cohenpr-xpf.github.io/XPF/conv_resources/rules".to_string()
}

fn default_request_timeout_secs() -> u64 {
    crate::rule_source::REQUEST_TIMEOUT_SECS
}

fn default_cache_remote_rules() -> bool {
    true
}

// ============================================================================
// 应用配置
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// 显式配置的语言规则源
    #[serde(default)]
    pub languages: Vec<LanguageRules>,
    /// 未显式配置的语言：`<rules_base_url>/<主语言子标签>.rules`
    #[serde(default = "default_rules_base_url")]
    pub rules_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 是否缓存远程规则表
    #[serde(default = "default_cache_remote_rules")]
    pub cache_remote_rules: bool,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriberConfig {
    pub fn new() -> Self {
        Self {
            languages: Vec::new(),
            rules_base_url: default_rules_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            cache_remote_rules: default_cache_remote_rules(),
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法获取配置目录"))?;
        let app_dir = config_dir.join("XpfTranscriber");
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join("config.json"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from_path(&path)
    }

    /// 文件不存在时返回默认配置
    pub fn load_from_path(path: &Path) -> Result<Self> {
        tracing::info!("尝试从以下路径加载配置: {:?}", path);

        if !path.exists() {
            tracing::info!("配置文件不存在，使用默认配置");
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)?;
        let config: TranscriberConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("解析配置失败 {:?}: {}", path, e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tracing::info!("保存配置到: {:?}", path);

        // 先写临时文件，再原子替换
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content).map_err(|e| {
            tracing::error!("写入临时文件失败: {}", e);
            e
        })?;

        if path.exists() {
            std::fs::remove_file(path)?;
        }
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// 显式配置的语言条目（语言代码不区分大小写）
    pub fn language(&self, code: &str) -> Option<&LanguageRules> {
        self.languages
            .iter()
            .find(|l| l.code.eq_ignore_ascii_case(code))
    }

    /// 添加或替换语言规则源
    pub fn upsert_language(&mut self, rules: LanguageRules) {
        match self
            .languages
            .iter_mut()
            .find(|l| l.code.eq_ignore_ascii_case(&rules.code))
        {
            Some(existing) => *existing = rules,
            None => self.languages.push(rules),
        }
    }

    /// 解析语言的规则源
    ///
    /// 显式条目优先，否则按主语言子标签拼接默认地址
    pub fn source_for(&self, code: &str) -> Option<RuleSource> {
        if let Some(entry) = self.language(code) {
            return Some(RuleSource::parse(&entry.source));
        }

        let primary = primary_subtag(code)?;
        let base = self.rules_base_url.trim_end_matches('/');
        if base.is_empty() {
            return None;
        }
        Some(RuleSource::parse(&format!("{}/{}.rules", base, primary)))
    }

    pub fn provider_name_for(&self, code: &str) -> String {
        self.language(code)
            .and_then(|l| l.provider_name.clone())
            .unwrap_or_else(|| format!("{} XPF", code))
    }

    /// 远程拉取选项；缓存目录不可用时退化为不缓存
    pub fn fetch_options(&self) -> FetchOptions {
        let cache = if self.cache_remote_rules {
            match RuleCache::default_dir() {
                Ok(dir) => Some(RuleCache::new(dir)),
                Err(err) => {
                    tracing::warn!("获取规则缓存目录失败，禁用缓存: {}", err);
                    None
                }
            }
        } else {
            None
        };

        FetchOptions {
            cache,
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// "vi-VN" → "vi"
fn primary_subtag(code: &str) -> Option<String> {
    let primary = code.split(['-', '_']).next()?.trim();
    if primary.is_empty() || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(primary.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_file_missing() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let config = TranscriberConfig::load_from_path(&temp.path().join("config.json"))
            .expect("load config");
        assert_eq!(config, TranscriberConfig::new());
        assert!(config.cache_remote_rules);
    }

    #[test]
    fn test_partial_file_uses_field_defaults() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"request_timeout_secs": 3}"#).expect("write config");

        let config = TranscriberConfig::load_from_path(&path).expect("load config");
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.rules_base_url, default_rules_base_url());
        assert!(config.languages.is_empty());
    }

    #[test]
    fn test_invalid_file_is_error() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{ not json").expect("write config");
        assert!(TranscriberConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("config.json");

        let mut config = TranscriberConfig::new();
        config.upsert_language(LanguageRules {
            code: "en".to_string(),
            source: "/opt/rules/en.rules".to_string(),
            provider_name: Some("English XPF".to_string()),
        });
        config.save_to_path(&path).expect("save config");
        config.save_to_path(&path).expect("overwrite config");

        let loaded = TranscriberConfig::load_from_path(&path).expect("load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_source_for_explicit_and_default() {
        let mut config = TranscriberConfig::new();
        config.upsert_language(LanguageRules {
            code: "en".to_string(),
            source: "rules/en.rules".to_string(),
            provider_name: None,
        });

        assert_eq!(
            config.source_for("EN"),
            Some(RuleSource::Path(PathBuf::from("rules/en.rules")))
        );
        assert_eq!(
            config.source_for("vi-VN"),
            Some(RuleSource::Uri(
                "https://cohenpr-xpf.github.io/XPF/conv_resources/rules/vi.rules".to_string()
            ))
        );
        assert_eq!(config.source_for(""), None);
        assert_eq!(config.source_for("../x"), None);
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let mut config = TranscriberConfig::new();
        for source in ["a.rules", "b.rules"] {
            config.upsert_language(LanguageRules {
                code: "vi".to_string(),
                source: source.to_string(),
                provider_name: None,
            });
        }
        assert_eq!(config.languages.len(), 1);
        assert_eq!(config.languages[0].source, "b.rules");
        assert_eq!(config.provider_name_for("vi"), "vi XPF");
    }

    #[test]
    fn test_fetch_options_without_cache() {
        let mut config = TranscriberConfig::new();
        config.cache_remote_rules = false;
        config.request_timeout_secs = 7;

        let options = config.fetch_options();
        assert!(options.cache.is_none());
        assert_eq!(options.timeout, Duration::from_secs(7));
    }
}
