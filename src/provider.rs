// 转写提供者
//
// 离线 XPF 引擎与在线转写服务共用同一接口，调用方可以透明切换
// ProviderRegistry 按语言懒加载引擎，每个注册表实例独立持有自己的引擎

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::future::{self, BoxFuture, FutureExt};
use tokio::sync::OnceCell;

use crate::config::TranscriberConfig;
use crate::xpf::error::{Result, XpfError};
use crate::xpf::XpfEngine;

/// 转写提供者接口
pub trait TranscriptionProvider: Send + Sync {
    /// 提供者名称（如 "Vietnamese XPF"）
    fn provider_name(&self) -> &str;

    /// 服务的语言代码
    fn language_code(&self) -> &str;

    /// 转写类型（如 "IPA"、"XPF"）
    fn transcription_type(&self) -> &str;

    fn supports_language(&self, language_code: &str) -> bool;

    /// 单词转写
    fn get_transcription<'a>(&'a self, word: &'a str) -> BoxFuture<'a, Option<String>>;

    /// 多词转写，结果以空格连接
    fn get_transcription_words<'a>(&'a self, words: &'a [String]) -> BoxFuture<'a, Option<String>>;
}

impl TranscriptionProvider for XpfEngine {
    fn provider_name(&self) -> &str {
        XpfEngine::provider_name(self)
    }

    fn language_code(&self) -> &str {
        XpfEngine::language_code(self)
    }

    fn transcription_type(&self) -> &str {
        XpfEngine::transcription_type(self)
    }

    fn supports_language(&self, language_code: &str) -> bool {
        XpfEngine::supports_language(self, language_code)
    }

    fn get_transcription<'a>(&'a self, word: &'a str) -> BoxFuture<'a, Option<String>> {
        future::ready(Some(self.transcribe_to_string(word))).boxed()
    }

    fn get_transcription_words<'a>(&'a self, words: &'a [String]) -> BoxFuture<'a, Option<String>> {
        future::ready(Some(self.transcribe_words(words))).boxed()
    }
}

type EngineCell = Arc<OnceCell<Arc<XpfEngine>>>;

/// 按语言管理转写提供者
pub struct ProviderRegistry {
    config: TranscriberConfig,
    /// 外部注册的提供者（优先于 XPF）
    external: Vec<Arc<dyn TranscriptionProvider>>,
    /// 语言代码（小写）→ 懒加载的 XPF 引擎
    engines: Mutex<HashMap<String, EngineCell>>,
}

impl ProviderRegistry {
    pub fn new(config: TranscriberConfig) -> Self {
        Self {
            config,
            external: Vec::new(),
            engines: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TranscriberConfig {
        &self.config
    }

    /// 注册外部提供者（如在线 IPA 服务）
    pub fn register(&mut self, provider: Arc<dyn TranscriptionProvider>) {
        tracing::info!(
            "注册转写提供者: {} ({})",
            provider.provider_name(),
            provider.language_code()
        );
        self.external.push(provider);
    }

    /// 获取语言对应的提供者
    ///
    /// 首次请求时构造 XPF 引擎；构造失败不缓存，下次调用会重新尝试
    pub async fn provider_for(&self, language_code: &str) -> Result<Arc<dyn TranscriptionProvider>> {
        if let Some(provider) = self
            .external
            .iter()
            .find(|p| p.supports_language(language_code))
        {
            return Ok(Arc::clone(provider));
        }

        let engine: Arc<dyn TranscriptionProvider> = self.engine_for(language_code).await?;
        Ok(engine)
    }

    /// 获取（必要时构造）语言对应的 XPF 引擎
    pub async fn engine_for(&self, language_code: &str) -> Result<Arc<XpfEngine>> {
        let cell = self.cell_for(language_code)?;

        match cell.get_or_try_init(|| self.build_engine(language_code)).await {
            Ok(engine) => Ok(Arc::clone(engine)),
            Err(err) => {
                self.forget_cell(language_code, &cell);
                Err(err)
            }
        }
    }

    /// 是否已为该语言构造过引擎
    pub fn is_loaded(&self, language_code: &str) -> bool {
        let key = language_code.to_ascii_lowercase();
        self.engines
            .lock()
            .map(|engines| engines.get(&key).is_some_and(|cell| cell.initialized()))
            .unwrap_or(false)
    }

    fn cell_for(&self, language_code: &str) -> Result<EngineCell> {
        let key = language_code.to_ascii_lowercase();
        let mut engines = self
            .engines
            .lock()
            .map_err(|_| XpfError::Initialization("引擎表锁已损坏".to_string()))?;
        Ok(Arc::clone(engines.entry(key).or_default()))
    }

    /// 构造失败后移除空槽位，避免无效语言代码占用表项
    fn forget_cell(&self, language_code: &str, cell: &EngineCell) {
        let key = language_code.to_ascii_lowercase();
        if let Ok(mut engines) = self.engines.lock() {
            let stale = engines
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized());
            if stale {
                engines.remove(&key);
            }
        }
    }

    async fn build_engine(&self, language_code: &str) -> Result<Arc<XpfEngine>> {
        let source = self.config.source_for(language_code).ok_or_else(|| {
            XpfError::Initialization(format!("语言 {} 没有可用的规则源", language_code))
        })?;

        tracing::info!("为语言 {} 加载规则: {}", language_code, source);
        let options = self.config.fetch_options();
        let engine = XpfEngine::from_source(&source, &options)
            .await
            .map_err(|err| {
                tracing::error!("语言 {} 的规则加载失败: {}", language_code, err);
                err
            })?
            .with_identity(&self.config.provider_name_for(language_code), language_code);

        Ok(Arc::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LanguageRules;

    const RULES: &str = "type,sfrom,sto,follow\nsub,c,k,a\nsub,c,s,e\nmatch,a,a,\nmatch,e,e,\n";

    struct FixedProvider;

    impl TranscriptionProvider for FixedProvider {
        fn provider_name(&self) -> &str {
            "fixed"
        }
        fn language_code(&self) -> &str {
            "en-US"
        }
        fn transcription_type(&self) -> &str {
            "IPA"
        }
        fn supports_language(&self, language_code: &str) -> bool {
            language_code == "en-US"
        }
        fn get_transcription<'a>(&'a self, _word: &'a str) -> BoxFuture<'a, Option<String>> {
            future::ready(Some("fixed".to_string())).boxed()
        }
        fn get_transcription_words<'a>(
            &'a self,
            _words: &'a [String],
        ) -> BoxFuture<'a, Option<String>> {
            future::ready(None).boxed()
        }
    }

    fn config_with(code: &str, source: &str) -> TranscriberConfig {
        let mut config = TranscriberConfig::new();
        config.cache_remote_rules = false;
        config.upsert_language(LanguageRules {
            code: code.to_string(),
            source: source.to_string(),
            provider_name: Some("Test XPF".to_string()),
        });
        config
    }

    #[tokio::test]
    async fn test_engine_as_provider() {
        let engine = XpfEngine::new(RULES).expect("build engine");
        let provider: &dyn TranscriptionProvider = &engine;

        assert_eq!(provider.get_transcription("ca").await.as_deref(), Some("ka"));
        let words = vec!["ca".to_string(), "ce".to_string()];
        assert_eq!(
            provider.get_transcription_words(&words).await.as_deref(),
            Some("ka se")
        );
        assert_eq!(provider.transcription_type(), "XPF");
        assert!(provider.supports_language("anything"));
    }

    #[tokio::test]
    async fn test_registry_loads_once() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("xx.rules");
        std::fs::write(&path, RULES).expect("write rules");

        let registry = ProviderRegistry::new(config_with("xx", &path.to_string_lossy()));
        assert!(!registry.is_loaded("xx"));

        let first = registry.engine_for("xx").await.expect("load engine");
        let second = registry.engine_for("XX").await.expect("load engine");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.is_loaded("xx"));

        assert_eq!(first.provider_name(), "Test XPF");
        assert!(first.supports_language("xx"));
        assert!(!first.supports_language("yy"));
    }

    #[tokio::test]
    async fn test_registry_failure_is_not_cached() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("late.rules");

        let registry = ProviderRegistry::new(config_with("xx", &path.to_string_lossy()));
        let err = registry.engine_for("xx").await.unwrap_err();
        assert!(err.is_initialization());
        assert!(!registry.is_loaded("xx"));
        assert!(registry.engines.lock().expect("engine table").is_empty());

        std::fs::write(&path, RULES).expect("write rules");
        let engine = registry.engine_for("xx").await.expect("load engine");
        assert_eq!(engine.transcribe_to_string("ce"), "se");
    }

    #[tokio::test]
    async fn test_registry_configuration_error() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("bad.rules");
        std::fs::write(&path, "type,sfrom,sto\nsub,{Missing},x\n").expect("write rules");

        let registry = ProviderRegistry::new(config_with("xx", &path.to_string_lossy()));
        let err = registry.engine_for("xx").await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_unknown_languages_leave_no_entries() {
        let mut config = config_with("xx", "/nonexistent/xx.rules");
        config.rules_base_url = String::new();
        let registry = ProviderRegistry::new(config);
        for code in ["zz", "qq", "zz", "xx"] {
            assert!(registry.engine_for(code).await.is_err());
        }
        assert!(registry.engines.lock().expect("engine table").is_empty());
    }

    #[tokio::test]
    async fn test_external_provider_takes_precedence() {
        let mut registry = ProviderRegistry::new(TranscriberConfig::new());
        registry.register(Arc::new(FixedProvider));

        let provider = registry.provider_for("en-US").await.expect("provider");
        assert_eq!(provider.provider_name(), "fixed");
        assert_eq!(provider.get_transcription("x").await.as_deref(), Some("fixed"));
    }
}
