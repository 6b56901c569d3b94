//! 配置加载器实现
//!
//! 提供TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, AppConfig};
use crate::error::LoadError;
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
    /// * `Result<AppConfig, LoadError>` - 加载的配置或错误
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<AppConfig, LoadError>;

    /// 从字符串加载配置
    async fn load_from_string(&self, content: &str) -> Result<AppConfig, LoadError>;

    /// 验证配置
    fn validate(&self, config: &AppConfig) -> Result<(), LoadError>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换字符串中的 `${VAR_NAME}` 环境变量
    fn substitute_env_vars(&self, content: &str) -> Result<String, LoadError> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| LoadError::ParseError(format!("正则表达式错误: {}", e)))?;

        let mut result = content.to_string();
        for captures in env_var_regex.captures_iter(content) {
            let full_match = &captures[0];
            let var_name = &captures[1];

            match std::env::var(var_name) {
                Ok(value) => {
                    result = result.replace(full_match, &value);
                }
                Err(_) => {
                    return Err(LoadError::EnvVarError {
                        var: var_name.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }

    /// 解析TOML配置内容
    fn parse_toml(&self, content: &str) -> Result<AppConfig, LoadError> {
        let processed = self.substitute_env_vars(content)?;
        let mut config: AppConfig = toml::from_str(&processed)
            .map_err(|e| LoadError::ParseError(format!("TOML解析错误: {}", e)))?;
        config.manager = config.manager.normalized();
        Ok(config)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<AppConfig, LoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(LoadError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LoadError::ParseError(format!("读取文件失败: {}", e)))?;

        let config = self.parse_toml(&content)?;
        self.validate(&config)?;

        tracing::info!("成功加载配置文件: {}", path.display());
        tracing::debug!("配置内容: {:?}", config);

        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<AppConfig, LoadError> {
        let config = self.parse_toml(content)?;
        self.validate(&config)?;
        tracing::debug!("成功解析配置字符串");
        Ok(config)
    }

    fn validate(&self, config: &AppConfig) -> Result<(), LoadError> {
        validate_config(config).map_err(LoadError::ValidationError)
    }
}

/// 获取默认配置文件路径
pub fn get_default_config_path() -> std::path::PathBuf {
    std::path::PathBuf::from("dbkv-config.toml")
}
