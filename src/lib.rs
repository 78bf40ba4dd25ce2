pub mod config;
pub mod provider;
pub mod rule_source;
pub mod xpf;

pub use config::{LanguageRules, TranscriberConfig};
pub use provider::{ProviderRegistry, TranscriptionProvider};
pub use rule_source::{FetchOptions, RuleCache, RuleSource};
pub use xpf::{ConfigurationError, XpfEngine, XpfError, NO_TRANSLATE};
