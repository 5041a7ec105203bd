//! 日志系统模块
//!
//! 提供结构化日志配置和管理功能。检测记录以 `runner_vitals::telemetry`
//! 为目标输出，可以通过模块级别过滤单独控制。

use anyhow::Context;
use log::LevelFilter;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

/// 全局日志初始化状态
#[derive(Debug, Default)]
struct GlobalLoggingState {
    /// 是否已初始化
    initialized: bool,
    /// 初始化失败原因
    init_error: Option<String>,
    /// 当前配置
    current_config: Option<LogConfig>,
}

/// 全局日志状态管理器
static GLOBAL_LOGGING_STATE: OnceLock<Mutex<GlobalLoggingState>> = OnceLock::new();

/// 日志配置结构
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 日志文件路径（可选）
    pub file_path: Option<PathBuf>,
    /// 是否输出到控制台
    pub console: bool,
    /// 是否使用JSON格式
    pub json_format: bool,
    /// 模块级别日志控制
    pub module_levels: HashMap<String, LevelFilter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            file_path: None,
            console: true,
            json_format: false,
            module_levels: HashMap::new(),
        }
    }
}

impl LogConfig {
    /// 根据级别字符串创建配置，无法识别的级别回退到 info
    pub fn with_level(level: &str, json_format: bool) -> Self {
        Self {
            level: parse_level(level).unwrap_or(LevelFilter::Info),
            json_format,
            ..Default::default()
        }
    }
}

/// 解析日志级别字符串
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// 日志系统管理器
pub struct LoggingSystem {
    config: LogConfig,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 进程内只初始化一次，之后的调用直接返回；之前初始化失败时返回该错误。
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        Self::setup_logging_with_options(config, false)
    }

    /// 初始化日志系统（带选项）
    ///
    /// # 参数
    /// * `config` - 日志配置
    /// * `force_reinit` - 是否强制重新初始化（主要用于测试）
    pub fn setup_logging_with_options(
        config: LogConfig,
        force_reinit: bool,
    ) -> anyhow::Result<Self> {
        let state_mutex =
            GLOBAL_LOGGING_STATE.get_or_init(|| Mutex::new(GlobalLoggingState::default()));

        {
            let state = state_mutex.lock().unwrap_or_else(PoisonError::into_inner);
            if state.initialized && !force_reinit {
                if let Some(e) = &state.init_error {
                    anyhow::bail!("日志系统之前初始化失败: {}", e);
                }
                return Ok(Self { config });
            }
        }

        let init_result = Self::perform_initialization(&config);

        {
            let mut state = state_mutex.lock().unwrap_or_else(PoisonError::into_inner);
            state.initialized = true;
            state.current_config = Some(config.clone());
            state.init_error = init_result.as_ref().err().map(|e| e.to_string());
        }

        init_result?;
        Ok(Self { config })
    }

    /// 当前实例使用的配置
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    fn perform_initialization(config: &LogConfig) -> anyhow::Result<()> {
        Self::init_log_tracer()?;
        Self::init_tracing_subscriber(config)
    }

    /// 初始化 LogTracer（log crate 到 tracing 的桥接）
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        static LOG_TRACER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

        let result = LOG_TRACER_INIT.get_or_init(|| LogTracer::init().map_err(|e| e.to_string()));

        result
            .as_ref()
            .map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {}", e))?;
        Ok(())
    }

    fn build_filter(config: &LogConfig) -> anyhow::Result<EnvFilter> {
        let mut env_filter = EnvFilter::builder()
            .with_default_directive(level_to_string(config.level).parse::<Directive>()?)
            .from_env_lossy();

        for (module, level) in &config.module_levels {
            let directive: Directive = format!("{}={}", module, level_to_string(*level))
                .parse()
                .with_context(|| format!("无效的模块日志级别: {module}"))?;
            env_filter = env_filter.add_directive(directive);
        }
        Ok(env_filter)
    }

    /// 初始化 tracing subscriber
    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        let env_filter = Self::build_filter(config)?;

        let fmt_layer = if config.json_format {
            fmt::layer()
                .json()
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_target(true)
                .boxed()
        } else {
            fmt::layer()
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_ansi(true)
                .with_target(true)
                .boxed()
        };

        let result = match (&config.file_path, config.console) {
            (Some(file_path), false) => {
                let file = std::fs::File::create(file_path)
                    .with_context(|| format!("创建日志文件失败: {}", file_path.display()))?;
                let file_layer = fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_timer(fmt::time::ChronoUtc::rfc_3339());
                registry().with(env_filter).with(file_layer).try_init()
            }
            _ => registry().with(env_filter).with(fmt_layer).try_init(),
        };

        match result {
            Ok(()) => {
                tracing::info!("日志系统初始化完成");
                tracing::debug!("日志配置: {:?}", config);
                Ok(())
            }
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains("already been set")
                    || error_msg.contains("already initialized")
                {
                    tracing::debug!("日志系统已经初始化过了");
                    Ok(())
                } else {
                    Err(anyhow::anyhow!("tracing subscriber初始化失败: {}", error_msg))
                }
            }
        }
    }

    /// 检查日志系统是否已初始化
    pub fn is_initialized() -> bool {
        GLOBAL_LOGGING_STATE.get().is_some_and(|state_mutex| {
            state_mutex
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .initialized
        })
    }

    /// 获取当前日志配置（如果已初始化）
    pub fn current_config() -> Option<LogConfig> {
        GLOBAL_LOGGING_STATE.get().and_then(|state_mutex| {
            state_mutex
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .current_config
                .clone()
        })
    }

    /// 重置日志系统状态（主要用于测试）
    #[cfg(test)]
    pub fn reset_for_testing() {
        if let Some(state_mutex) = GLOBAL_LOGGING_STATE.get() {
            let mut state = state_mutex.lock().unwrap_or_else(PoisonError::into_inner);
            *state = GlobalLoggingState::default();
        }
    }
}

fn level_to_string(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}

/// 获取默认日志文件路径
pub fn get_default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("runner-vitals")
        .join("runner-vitals.log")
}
