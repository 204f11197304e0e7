//! # 可加载引用模块
//!
//! ## 设计思路
//!
//! 解码前需要一个“可加载引用”指向源文件字节，有两种获取方式：
//! - 对象 URL：在注册表中登记字节，得到可撤销的 `blob:` 句柄（同步、零复制）
//! - data URL：把文件异步读成 `data:<mime>;base64,...` 文本（兜底方案）
//!
//! 两种方式实现同一个 `ReferenceProvider` 接口，由 `LoaderStrategy::probe`
//! 在构造期按能力探测选定，流水线内部不再做条件分支。
//!
//! ## 实现思路
//!
//! - `ObjectUrlGuard` 持有登记项，`Drop` 时自动撤销，保证每次解码后都会释放。
//! - data URL 的 base64 编码放到阻塞线程执行，避免占用 async 运行时。

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::codec;
use super::source::FileHandle;
use super::CompressError;

const OBJECT_URL_PREFIX: &str = "blob:image-compress/";

/// 对象 URL 注册表：URL → 字节。
#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    entries: Mutex<HashMap<String, Bytes>>,
    next_id: AtomicU64,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记字节并返回作用域句柄，句柄释放时自动撤销。
    pub fn create(self: &Arc<Self>, data: Bytes) -> Result<ObjectUrlGuard, CompressError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{}{}", OBJECT_URL_PREFIX, id);

        self.entries
            .lock()
            .map_err(|_| CompressError::ResourceLimit("对象 URL 注册表锁已中毒".to_string()))?
            .insert(url.clone(), data);

        Ok(ObjectUrlGuard {
            url,
            registry: Arc::clone(self),
        })
    }

    /// 按 URL 取回字节，已撤销或不存在时返回 `None`。
    pub fn resolve(&self, url: &str) -> Result<Option<Bytes>, CompressError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| CompressError::ResourceLimit("对象 URL 注册表锁已中毒".to_string()))?;
        Ok(entries.get(url).cloned())
    }

    /// 撤销 URL，返回是否确实存在。
    pub fn revoke(&self, url: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
            .is_some()
    }

    /// 当前存活的对象 URL 数量。
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 对象 URL 的作用域句柄。
pub struct ObjectUrlGuard {
    url: String,
    registry: Arc<ObjectUrlRegistry>,
}

impl ObjectUrlGuard {
    pub fn url(&self) -> &str {
        &self.url
    }

    fn resolve(&self) -> Result<Bytes, CompressError> {
        self.registry
            .resolve(&self.url)?
            .ok_or_else(|| CompressError::DecodeFailure(format!("对象 URL 已失效：{}", self.url)))
    }
}

impl fmt::Debug for ObjectUrlGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectUrlGuard").field("url", &self.url).finish()
    }
}

impl Drop for ObjectUrlGuard {
    fn drop(&mut self) {
        if self.registry.revoke(&self.url) {
            log::debug!("🧹 已释放对象 URL：{}", self.url);
        }
    }
}

/// 解码器可加载的引用。
#[derive(Debug)]
pub enum LoadableReference {
    ObjectUrl(ObjectUrlGuard),
    DataUrl(String),
}

impl LoadableReference {
    /// 引用类型标识（用于日志）。
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ObjectUrl(_) => "object-url",
            Self::DataUrl(_) => "data-url",
        }
    }

    /// 取出解码所需的负载，data URL 文本被移出，不复制。
    pub(crate) fn take_payload(&mut self) -> Result<ReferencePayload, CompressError> {
        match self {
            Self::ObjectUrl(guard) => guard.resolve().map(ReferencePayload::Bytes),
            Self::DataUrl(text) => Ok(ReferencePayload::DataUrl(std::mem::take(text))),
        }
    }
}

/// 交给阻塞线程的解码负载。
#[derive(Debug)]
pub(crate) enum ReferencePayload {
    Bytes(Bytes),
    DataUrl(String),
}

impl ReferencePayload {
    /// data URL 在这里做 base64 解码，调用方应在阻塞线程中执行。
    pub(crate) fn into_bytes(self, max_bytes: u64) -> Result<Bytes, CompressError> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::DataUrl(text) => {
                let blob = codec::data_url_to_blob_with_limit(&text, max_bytes)?;
                Ok(blob.data().clone())
            }
        }
    }
}

/// 可加载引用的获取接口。
pub trait ReferenceProvider: Send + Sync {
    fn acquire(
        &self,
        file: &FileHandle,
    ) -> impl Future<Output = Result<LoadableReference, CompressError>> + Send;
}

/// 对象 URL 方式：同步登记，零复制。
#[derive(Debug, Clone)]
pub struct ObjectUrlProvider {
    registry: Arc<ObjectUrlRegistry>,
}

impl ObjectUrlProvider {
    pub fn new(registry: Arc<ObjectUrlRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ObjectUrlRegistry> {
        &self.registry
    }
}

impl ReferenceProvider for ObjectUrlProvider {
    fn acquire(
        &self,
        file: &FileHandle,
    ) -> impl Future<Output = Result<LoadableReference, CompressError>> + Send {
        let created = self.registry.create(file.data().clone());
        async move { created.map(LoadableReference::ObjectUrl) }
    }
}

/// data URL 方式：异步把文件读成文本编码。
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUrlReader;

impl ReferenceProvider for DataUrlReader {
    fn acquire(
        &self,
        file: &FileHandle,
    ) -> impl Future<Output = Result<LoadableReference, CompressError>> + Send {
        let media_type = file.media_type().to_string();
        let data = file.data().clone();

        async move {
            let text = tokio::task::spawn_blocking(move || codec::encode_data_url(&media_type, &data))
                .await
                .map_err(|e| CompressError::FileSystem(format!("读取文件任务异常：{}", e)))?;
            Ok(LoadableReference::DataUrl(text))
        }
    }
}

/// 构造期选定的引用获取策略。
#[derive(Debug, Clone)]
pub enum LoaderStrategy {
    ObjectUrl(ObjectUrlProvider),
    DataUrl(DataUrlReader),
}

impl LoaderStrategy {
    /// 能力探测：有对象 URL 注册表时优先使用，否则回退到 data URL。
    pub fn probe(registry: Option<Arc<ObjectUrlRegistry>>) -> Self {
        match registry {
            Some(registry) => Self::ObjectUrl(ObjectUrlProvider::new(registry)),
            None => Self::DataUrl(DataUrlReader),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ObjectUrl(_) => "object-url",
            Self::DataUrl(_) => "data-url",
        }
    }

    /// 对象 URL 注册表（仅对象 URL 策略持有）。
    pub fn registry(&self) -> Option<&Arc<ObjectUrlRegistry>> {
        match self {
            Self::ObjectUrl(provider) => Some(provider.registry()),
            Self::DataUrl(_) => None,
        }
    }
}

impl ReferenceProvider for LoaderStrategy {
    fn acquire(
        &self,
        file: &FileHandle,
    ) -> impl Future<Output = Result<LoadableReference, CompressError>> + Send {
        let strategy = self.clone();
        let file = file.clone();

        async move {
            match &strategy {
                Self::ObjectUrl(provider) => provider.acquire(&file).await,
                Self::DataUrl(reader) => reader.acquire(&file).await,
            }
        }
    }
}
