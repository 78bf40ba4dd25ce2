// 规则源读取
//
// 本地文件直接读取；远程规则表通过 HTTP 拉取，可选缓存到本地目录
// 拉取失败不重试，直接交给调用方

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::StreamExt;
use sha2::{Digest, Sha256};

use crate::xpf::error::{ConfigurationError, Result, XpfError};

pub const REQUEST_TIMEOUT_SECS: u64 = 15;
pub const MAX_RULES_BYTES: usize = 4 * 1024 * 1024;
pub const CACHE_EXTENSION: &str = "rules";

/// 规则源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// 本地文件
    Path(PathBuf),
    /// 远程地址
    Uri(String),
}

impl RuleSource {
    /// `http://` 或 `https://` 开头视为远程地址，其余视为本地路径
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let lower = value.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            RuleSource::Uri(value.to_string())
        } else {
            RuleSource::Path(PathBuf::from(value))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, RuleSource::Uri(_))
    }
}

impl std::fmt::Display for RuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleSource::Path(path) => write!(f, "{}", path.display()),
            RuleSource::Uri(uri) => f.write_str(uri),
        }
    }
}

/// 远程拉取选项
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// 为 None 时不读写缓存
    pub cache: Option<RuleCache>,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            cache: None,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

/// 远程规则缓存目录
#[derive(Debug, Clone)]
pub struct RuleCache {
    dir: PathBuf,
}

impl RuleCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 默认缓存目录：`<cache_dir>/XpfTranscriber/rules`
    pub fn default_dir() -> anyhow::Result<PathBuf> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("无法获取缓存目录"))?;
        Ok(cache_dir.join("XpfTranscriber").join("rules"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 缓存文件名为地址的 SHA-256
    pub fn path_for(&self, uri: &str) -> PathBuf {
        let digest = Sha256::digest(uri.as_bytes());
        let name: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        self.dir.join(format!("{}.{}", name, CACHE_EXTENSION))
    }

    /// 读取缓存；校验失败的缓存会被删除
    pub fn load(&self, uri: &str) -> Option<String> {
        let path = self.path_for(uri);
        let content = std::fs::read_to_string(&path).ok()?;

        match validate_rule_text(&content) {
            Ok(()) => Some(content),
            Err(err) => {
                tracing::warn!("规则缓存校验失败 ({}), 删除缓存: {:?}", err, path);
                if let Err(err) = std::fs::remove_file(&path) {
                    tracing::warn!("删除损坏缓存失败: {}", err);
                }
                None
            }
        }
    }

    pub fn save(&self, uri: &str, content: &str) -> Result<()> {
        validate_rule_text(content)?;
        save_atomic(&self.path_for(uri), content)
    }
}

/// 规则文本基本校验：非空且不超过大小上限
pub fn validate_rule_text(content: &str) -> std::result::Result<(), ConfigurationError> {
    if content.trim().is_empty() {
        return Err(ConfigurationError::EmptySource);
    }
    if content.len() > MAX_RULES_BYTES {
        return Err(ConfigurationError::SourceTooLarge {
            bytes: content.len(),
            limit: MAX_RULES_BYTES,
        });
    }
    Ok(())
}

pub fn read_local(path: &Path) -> Result<String> {
    tracing::info!("读取本地规则文件: {:?}", path);
    let content = std::fs::read_to_string(path).map_err(|err| {
        XpfError::Initialization(format!("读取规则文件失败 {}: {}", path.display(), err))
    })?;
    validate_rule_text(&content)?;
    Ok(content)
}

/// 读取规则源
///
/// 远程规则优先使用有效缓存；缓存写入失败只记录日志
pub async fn load(source: &RuleSource, options: &FetchOptions) -> Result<String> {
    let uri = match source {
        RuleSource::Path(path) => return read_local(path),
        RuleSource::Uri(uri) => uri,
    };

    if let Some(content) = options.cache.as_ref().and_then(|c| c.load(uri)) {
        tracing::info!("使用缓存规则: {}", uri);
        return Ok(content);
    }

    let content = fetch_remote(uri, options.timeout).await?;

    if let Some(cache) = &options.cache {
        if let Err(err) = cache.save(uri, &content) {
            tracing::warn!("写入规则缓存失败: {}", err);
        }
    }

    Ok(content)
}

/// 拉取远程规则表
pub async fn fetch_remote(uri: &str, timeout: Duration) -> Result<String> {
    let client = get_http_client()?;

    tracing::info!("拉取远程规则: {}", uri);
    let response = client.get(uri).timeout(timeout).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        tracing::warn!("远程规则拉取失败 {}: HTTP {}", uri, status);
        return Err(XpfError::Initialization(format!("HTTP {} ({})", status, uri)));
    }

    let text = read_response_text_with_limit(response).await?;
    validate_rule_text(&text)?;

    tracing::info!("远程规则拉取成功: {} ({} 字节)", uri, text.len());
    Ok(text)
}

/// 进程内共享的 HTTP 客户端（超时按请求设置）
fn get_http_client() -> Result<&'static reqwest::Client> {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    if let Some(client) = CLIENT.get() {
        return Ok(client);
    }

    let client = reqwest::Client::builder().build()?;
    let _ = CLIENT.set(client);
    CLIENT
        .get()
        .ok_or_else(|| XpfError::Initialization("HTTP 客户端初始化失败".to_string()))
}

pub(crate) fn validate_response_content_length(content_length: Option<u64>) -> Result<()> {
    if let Some(content_length) = content_length {
        if content_length > MAX_RULES_BYTES as u64 {
            return Err(XpfError::Initialization(format!(
                "规则内容过大: {} 字节",
                content_length
            )));
        }
    }
    Ok(())
}

pub(crate) fn append_chunk_with_limit(buffer: &mut Vec<u8>, chunk: &[u8]) -> Result<()> {
    if buffer.len().saturating_add(chunk.len()) > MAX_RULES_BYTES {
        return Err(XpfError::Initialization("规则内容过大".to_string()));
    }
    buffer.extend_from_slice(chunk);
    Ok(())
}

async fn read_response_text_with_limit(response: reqwest::Response) -> Result<String> {
    validate_response_content_length(response.content_length())?;

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        append_chunk_with_limit(&mut bytes, &chunk)?;
    }

    String::from_utf8(bytes)
        .map_err(|err| XpfError::Initialization(format!("规则内容编码不合法: {}", err)))
}

/// 先写临时文件再重命名
pub(crate) fn save_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let unique_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp_path = path.with_extension(format!("tmp.{}", unique_suffix));

    {
        let mut tmp_file = std::fs::File::create(&tmp_path)?;
        use std::io::Write;
        tmp_file.write_all(content.as_bytes())?;
        tmp_file.sync_all()?;
    }

    if let Err(err) = replace_file(&tmp_path, path) {
        if let Err(cleanup_err) = std::fs::remove_file(&tmp_path) {
            tracing::warn!("替换缓存失败后清理临时文件失败: {}", cleanup_err);
        }
        return Err(err);
    }

    Ok(())
}

fn replace_file(tmp_path: &Path, target_path: &Path) -> Result<()> {
    if target_path.exists() {
        std::fs::remove_file(target_path)?;
    }
    std::fs::rename(tmp_path, target_path)?;
    Ok(())
}
