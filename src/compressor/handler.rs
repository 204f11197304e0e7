//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `Compressor` 只负责流程编排与配置管理。处理链路固定为：
//! 1. 读取配置快照，入口校验（声明类型、体积）
//! 2. 获取可加载引用（对象 URL / data URL）
//! 3. 解码（`Loading → Decoded | Failed`）
//! 4. 计算目标尺寸并绘制画布
//! 5. 重编码为 data URL，再还原为 blob 与文件
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<CompressConfig>>` 支持运行时替换。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 每次调用各自持有引用、解码图与画布，并发调用互不影响。
//! - 取消钩子在阶段之间检查，解码等待期间每 20ms 轮询一次；取消时立即释放引用。
//! - 记录 `acquire/decode/render/encode/total` 阶段耗时，便于性能诊断。

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::codec;
use super::encoder;
use super::loader::{LoaderStrategy, ObjectUrlRegistry, ReferenceProvider};
use super::media_type::is_supported_image;
use super::pipeline::{self, DecodeState};
use super::scaling::compute_target_dimensions;
use super::source::{CompressResult, FileHandle};
use super::{CompressConfig, CompressError};

/// 等待解码期间轮询取消钩子的间隔。
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 图片压缩器。
pub struct Compressor {
    config: Arc<RwLock<CompressConfig>>,
    strategy: LoaderStrategy,
}

impl Compressor {
    /// 根据初始配置创建压缩器，优先使用对象 URL 加载。
    ///
    /// # 示例
    /// ```rust
    /// use image_compress::compressor::{CompressConfig, Compressor};
    ///
    /// let compressor = Compressor::new(CompressConfig::default())?;
    /// assert_eq!(compressor.loader_name(), "object-url");
    /// # Ok::<(), image_compress::compressor::CompressError>(())
    /// ```
    pub fn new(config: CompressConfig) -> Result<Self, CompressError> {
        let registry = Arc::new(ObjectUrlRegistry::new());
        Self::with_strategy(config, LoaderStrategy::probe(Some(registry)))
    }

    /// 使用指定加载策略创建压缩器。
    pub fn with_strategy(config: CompressConfig, strategy: LoaderStrategy) -> Result<Self, CompressError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            strategy,
        })
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub fn config_snapshot(&self) -> Result<CompressConfig, CompressError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| CompressError::ResourceLimit("配置读取锁已中毒".to_string()))
    }

    /// 替换配置，校验失败时保持原配置不变。
    pub fn set_config(&self, config: CompressConfig) -> Result<(), CompressError> {
        config.validate()?;

        let mut current = self
            .config
            .write()
            .map_err(|_| CompressError::ResourceLimit("配置写入锁已中毒".to_string()))?;

        log::info!(
            "⚙️ 已更新压缩配置：max={}x{} quality={} render_mode={:?}",
            config.max_width,
            config.max_height,
            config.quality,
            config.render_mode
        );
        *current = config;

        Ok(())
    }

    /// 当前加载策略名称。
    pub fn loader_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// 尚未释放的对象 URL 数量（data URL 策略恒为 0）。
    pub fn active_object_urls(&self) -> usize {
        self.strategy.registry().map_or(0, |registry| registry.len())
    }

    /// 处理主入口：缩放并重新压缩图片。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use image_compress::compressor::{CompressConfig, Compressor, FileHandle};
    ///
    /// # async fn demo() -> Result<(), image_compress::compressor::CompressError> {
    /// let compressor = Compressor::new(CompressConfig::default())?;
    /// let file = FileHandle::from_path("/tmp/photo.jpg").await?;
    /// let result = compressor.compress(file).await?;
    /// println!("{} -> {}", result.file.size(), result.compress_file.size());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn compress(&self, file: FileHandle) -> Result<CompressResult, CompressError> {
        self.compress_with_hooks(file, || false).await
    }

    /// 带取消钩子的处理入口：阶段之间检查 `is_cancelled`，等待解码期间定时轮询。
    pub async fn compress_with_hooks<C>(
        &self,
        file: FileHandle,
        is_cancelled: C,
    ) -> Result<CompressResult, CompressError>
    where
        C: Fn() -> bool + Send + Sync,
    {
        let config = self.config_snapshot()?;
        let total_start = Instant::now();

        log::info!(
            "🖼️ 开始压缩图片 - 名称: {} 类型: {} 大小: {} 字节 加载方式: {}",
            file.name(),
            file.media_type(),
            file.size(),
            self.strategy.name()
        );

        Self::validate_source(&file, &config)?;
        Self::check_cancelled(&is_cancelled, "获取引用前")?;

        let acquire_start = Instant::now();
        let reference = self.strategy.acquire(&file).await?;
        let acquire_elapsed = acquire_start.elapsed();
        Self::check_cancelled(&is_cancelled, "解码前")?;

        let decode_start = Instant::now();
        let decode = DecodeState::new(reference).advance(&config);
        tokio::pin!(decode);
        let state = loop {
            tokio::select! {
                state = &mut decode => break state,
                _ = tokio::time::sleep(CANCEL_POLL_INTERVAL) => Self::check_cancelled(&is_cancelled, "解码中")?,
            }
        };
        let raster = state.into_result()?;
        let decode_elapsed = decode_start.elapsed();
        Self::check_cancelled(&is_cancelled, "解码后")?;

        let render_start = Instant::now();
        let target = compute_target_dimensions(
            (raster.width(), raster.height()),
            (config.max_width, config.max_height),
        );
        let surface = pipeline::render(&raster, target, &config);
        let render_elapsed = render_start.elapsed();

        let encode_start = Instant::now();
        let encoded = encoder::encode_surface(&surface, file.media_type(), config.quality)?;
        let compress_blob = codec::data_url_to_blob(&encoded)?;
        let compress_file = codec::blob_to_file(compress_blob.clone(), file.name(), file.media_type());
        let encode_elapsed = encode_start.elapsed();

        log::info!(
            "✅ 图片压缩完成 - {}x{} -> {}x{} {} -> {} 字节 acquire={}ms decode={}ms render={}ms encode={}ms total={}ms",
            raster.width(),
            raster.height(),
            target.width,
            target.height,
            file.size(),
            compress_file.size(),
            acquire_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            render_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(CompressResult {
            image: raster,
            file,
            compress_blob,
            compress_file,
        })
    }

    /// 入口校验：声明类型与源文件体积。
    fn validate_source(file: &FileHandle, config: &CompressConfig) -> Result<(), CompressError> {
        if config.reject_unsupported_media_type && !is_supported_image(file.media_type()) {
            return Err(CompressError::UnsupportedMediaType(format!(
                "{}（仅支持 image/jpeg、image/jpg、image/png）",
                if file.media_type().is_empty() { "<空>" } else { file.media_type() }
            )));
        }

        if file.size() as u64 > config.max_file_size {
            return Err(CompressError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                file.size() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }

    fn check_cancelled<C>(is_cancelled: &C, stage: &str) -> Result<(), CompressError>
    where
        C: Fn() -> bool,
    {
        if is_cancelled() {
            log::info!("⏹️ 压缩已取消 - 阶段: {}", stage);
            return Err(CompressError::Cancelled(format!("在{}取消", stage)));
        }
        Ok(())
    }
}

/// 使用默认配置压缩单个文件，每次调用创建独立的压缩器。
pub async fn compress(file: FileHandle) -> Result<CompressResult, CompressError> {
    Compressor::new(CompressConfig::default())?.compress(file).await
}
