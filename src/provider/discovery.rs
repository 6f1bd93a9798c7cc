//! 搜索提供者发现
//!
//! 约定：每个提供者在 `$XDG_DATA_DIRS/gnome-shell/search-providers/*.ini` 中有一个文件，
//! `[Shell Search Provider]` 段给出 DesktopID / BusName / ObjectPath。
//! 单个文件无效时记录警告并跳过，发现过程从不整体失败。

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::identity::ProviderIdentity;
use crate::core::DiscoveryError;

const DEFAULT_XDG_DATA_DIRS: &str = "/usr/local/share:/usr/share";
const PROVIDER_SUBDIR: &str = "gnome-shell/search-providers";
const SECTION: &str = "Shell Search Provider";

/// 待扫描的目录：配置覆盖优先，否则取 XDG_DATA_DIRS（未设置时用默认值）
pub fn search_provider_dirs(data_dirs: Option<&[PathBuf]>) -> Vec<PathBuf> {
    match data_dirs {
        Some(dirs) => dirs.iter().map(|d| d.join(PROVIDER_SUBDIR)).collect(),
        None => {
            let xdg = std::env::var("XDG_DATA_DIRS")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_XDG_DATA_DIRS.to_string());
            xdg.split(':')
                .filter(|p| !p.is_empty())
                .map(|p| Path::new(p).join(PROVIDER_SUBDIR))
                .collect()
        }
    }
}

/// 扫描目录，返回去重、排序后的提供者身份
pub fn discover(dirs: &[PathBuf]) -> Vec<ProviderIdentity> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut found = BTreeSet::new();

    for dir in dirs {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "Search provider directory missing, skipped");
            continue;
        }
        let files = match ini_files(dir) {
            Ok(files) => files,
            Err(err) => {
                tracing::warn!(error = %err, "Skipping search provider directory");
                continue;
            }
        };
        for path in files {
            if !seen.insert(path.clone()) {
                continue;
            }
            match parse_provider_file(&path) {
                Ok(identity) => {
                    tracing::debug!(provider = %identity, "Discovered search provider");
                    found.insert(identity);
                }
                Err(err) => tracing::warn!(error = %err, "Skipping invalid search provider"),
            }
        }
    }

    tracing::info!(count = found.len(), "Search provider discovery finished");
    found.into_iter().collect()
}

fn ini_files(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let pattern = format!(
        "{}/*.ini",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let paths = glob::glob(&pattern).map_err(|e| DiscoveryError::Pattern {
        dir: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "Cannot read search provider entry"),
        }
    }
    files.sort();
    Ok(files)
}

/// 解析单个提供者 ini 文件（段名与键名大小写不敏感）
pub fn parse_provider_file(path: &Path) -> Result<ProviderIdentity, DiscoveryError> {
    if !path.is_file() {
        return Err(DiscoveryError::Io {
            path: path.to_path_buf(),
            message: "not a regular file".to_string(),
        });
    }

    let parsed = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Ini))
        .build()
        .and_then(|c| c.try_deserialize::<HashMap<String, Value>>())
        .map_err(|source| DiscoveryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let section = parsed
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(SECTION))
        .and_then(|(_, value)| value.as_object())
        .ok_or_else(|| DiscoveryError::MissingSection {
            path: path.to_path_buf(),
        })?;

    let field = |key: &'static str| -> Result<String, DiscoveryError> {
        section
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .and_then(|(_, value)| value.as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| DiscoveryError::MissingKey {
                path: path.to_path_buf(),
                key,
            })
    };

    Ok(ProviderIdentity::new(
        field("DesktopID")?,
        field("BusName")?,
        field("ObjectPath")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn provider_dir(root: &Path) -> PathBuf {
        let dir = root.join(PROVIDER_SUBDIR);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    const CALCULATOR: &str = "[Shell Search Provider]\n\
        DesktopID=org.gnome.Calculator.desktop\n\
        BusName=org.gnome.Calculator.SearchProvider\n\
        ObjectPath=/org/gnome/Calculator/SearchProvider\n\
        Version=2\n";

    #[test]
    fn test_parse_valid_file() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "calc.ini", CALCULATOR);
        let identity = parse_provider_file(&tmp.path().join("calc.ini")).unwrap();
        assert_eq!(identity.desktop_id, "org.gnome.Calculator.desktop");
        assert_eq!(identity.bus_name, "org.gnome.Calculator.SearchProvider");
        assert_eq!(identity.object_path, "/org/gnome/Calculator/SearchProvider");
    }

    #[test]
    fn test_missing_key_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "broken.ini",
            "[Shell Search Provider]\nDesktopID=a.desktop\nBusName=org.example.A\n",
        );
        let err = parse_provider_file(&tmp.path().join("broken.ini")).unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingKey { key: "ObjectPath", .. }));
    }

    #[test]
    fn test_missing_section_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "other.ini", "[Something Else]\nDesktopID=a.desktop\n");
        let err = parse_provider_file(&tmp.path().join("other.ini")).unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingSection { .. }));
    }

    #[test]
    fn test_discover_skips_bad_entries_and_dedups() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let d1 = provider_dir(first.path());
        let d2 = provider_dir(second.path());

        write(&d1, "calc.ini", CALCULATOR);
        write(&d1, "broken.ini", "[Shell Search Provider]\nDesktopID=only.desktop\n");
        write(&d1, "notes.txt", "not an ini file");
        // 同一提供者在两个数据目录中各有一份
        write(&d2, "calc.ini", CALCULATOR);
        write(
            &d2,
            "files.ini",
            "[Shell Search Provider]\n\
             DesktopID=org.gnome.Nautilus.desktop\n\
             BusName=org.gnome.Nautilus\n\
             ObjectPath=/org/gnome/Nautilus/SearchProvider\n",
        );

        let missing = first.path().join("does-not-exist");
        let found = discover(&[d1, missing, d2]);
        let ids: Vec<_> = found.iter().map(|p| p.desktop_id.as_str()).collect();
        assert_eq!(ids, ["org.gnome.Calculator.desktop", "org.gnome.Nautilus.desktop"]);
    }

    #[test]
    fn test_configured_data_dirs_override_xdg() {
        let dirs = search_provider_dirs(Some(&[PathBuf::from("/opt/share")]));
        assert_eq!(dirs, vec![PathBuf::from("/opt/share/gnome-shell/search-providers")]);
    }

    /// 唯一修改 XDG_DATA_DIRS 的测试，所有情形放在一起顺序执行，结束时恢复原值
    #[test]
    fn test_xdg_data_dirs_fallback() {
        let saved = std::env::var_os("XDG_DATA_DIRS");
        let defaults = vec![
            PathBuf::from("/usr/local/share/gnome-shell/search-providers"),
            PathBuf::from("/usr/share/gnome-shell/search-providers"),
        ];

        std::env::remove_var("XDG_DATA_DIRS");
        let unset = search_provider_dirs(None);

        std::env::set_var("XDG_DATA_DIRS", "");
        let empty = search_provider_dirs(None);

        std::env::set_var("XDG_DATA_DIRS", "/a::/b");
        let custom = search_provider_dirs(None);

        match saved {
            Some(value) => std::env::set_var("XDG_DATA_DIRS", value),
            None => std::env::remove_var("XDG_DATA_DIRS"),
        }

        assert_eq!(unset, defaults);
        assert_eq!(empty, defaults);
        assert_eq!(
            custom,
            vec![
                PathBuf::from("/a/gnome-shell/search-providers"),
                PathBuf::from("/b/gnome-shell/search-providers"),
            ]
        );
    }
}
