//! 配置加载器实现
//!
//! 提供TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::env::EnvironmentProvider;
use crate::config::types::{validate_config, Config};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config>;

    /// 从字符串加载配置
    async fn load_from_string(&self, content: &str) -> Result<Config>;

    /// 验证配置
    fn validate(&self, config: &Config) -> Result<()>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换字符串中的 `${VAR_NAME}` 环境变量
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {}", e)))?;

        let mut result = content.to_string();

        for captures in env_var_regex.captures_iter(content) {
            let full_match = &captures[0];
            let var_name = &captures[1];

            match std::env::var(var_name) {
                Ok(value) => {
                    result = result.replace(full_match, &value);
                }
                Err(_) => {
                    return Err(ConfigError::EnvVarError {
                        var: var_name.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(result)
    }

    fn parse_toml(&self, content: &str) -> Result<Config> {
        let processed_content = self.substitute_env_vars(content)?;

        let config: Config = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)))?;

        Ok(config)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {}", e)))?;

        let config = self.parse_toml(&content)?;
        self.validate(&config)?;

        log::info!("成功加载配置文件: {}", path.display());
        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let config = self.parse_toml(content)?;
        self.validate(&config)?;

        log::debug!("成功解析配置字符串");
        Ok(config)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 加载完整配置：可选的配置文件，再叠加环境变量
///
/// 未显式指定路径且默认路径不存在时，从默认值开始，
/// 与只依赖环境变量的托管部署保持一致。
pub async fn load_config(
    path: Option<&Path>,
    env: &dyn EnvironmentProvider,
) -> Result<Config> {
    let loader = TomlConfigLoader::new(true);

    let mut config = match path {
        Some(path) => loader.load_from_file(path).await?,
        None => {
            let default_path = get_default_config_path();
            if default_path.exists() {
                loader.load_from_file(&default_path).await?
            } else {
                log::debug!("未找到配置文件，使用默认配置和环境变量");
                Config::default()
            }
        }
    };

    config.apply_env(env);
    loader.validate(&config)?;
    Ok(config)
}

/// 获取默认配置文件路径
///
/// 当前目录存在 `runner-vitals.toml` 时优先使用，否则为用户配置目录下的
/// `runner-vitals/config.toml`。
pub fn get_default_config_path() -> std::path::PathBuf {
    let local = std::path::Path::new("runner-vitals.toml");
    if local.exists() {
        return local.to_path_buf();
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join("runner-vitals").join("config.toml"))
        .unwrap_or_else(|| std::path::PathBuf::from("runner-vitals.toml"))
}
