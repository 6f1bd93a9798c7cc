//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `GSEARCH__*` 覆盖（双下划线表示嵌套，如 `GSEARCH__SEARCH__TIMEOUT_SECS=5`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub discovery: DiscoverySection,
}

/// [search] 段：每轮截止时间
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    /// 单轮截止时间（秒），超时未返回的提供者记为未完成
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl SearchSection {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// [discovery] 段：数据目录覆盖（未设置时用 XDG_DATA_DIRS）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DiscoverySection {
    /// 每个目录下的 gnome-shell/search-providers 会被扫描
    pub data_dirs: Option<Vec<PathBuf>>,
}

/// 默认配置文件（相对工作目录，可缺省）
const DEFAULT_CONFIG_FILE: &str = "config/default.toml";

/// 加载配置，后加入的源覆盖先前的键
///
/// 依次叠加：`config/default.toml`（若存在）、`config_path`（若存在）、环境变量 `GSEARCH__*`。
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let files = std::iter::once(PathBuf::from(DEFAULT_CONFIG_FILE))
        .chain(config_path)
        .filter(|path| path.exists());

    let mut builder = config::Config::builder();
    for path in files {
        tracing::debug!(path = %path.display(), "Loading config file");
        builder = builder.add_source(config::File::from(path));
    }

    builder
        .add_source(
            config::Environment::with_prefix("GSEARCH")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
