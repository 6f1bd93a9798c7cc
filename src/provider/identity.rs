//! 搜索提供者身份：(DesktopID, BusName, ObjectPath) 三元组
//!
//! 两个 Endpoint 相等当且仅当身份相等；集合成员、HashMap 键均以此为准。

use std::fmt;

/// 提供者身份（不可变）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderIdentity {
    /// 应用标识，如 `org.gnome.Calculator.desktop`
    pub desktop_id: String,
    /// 总线地址，如 `org.gnome.Calculator.SearchProvider`
    pub bus_name: String,
    /// 对象路径，如 `/org/gnome/Calculator/SearchProvider`
    pub object_path: String,
}

impl ProviderIdentity {
    pub fn new(
        desktop_id: impl Into<String>,
        bus_name: impl Into<String>,
        object_path: impl Into<String>,
    ) -> Self {
        Self {
            desktop_id: desktop_id.into(),
            bus_name: bus_name.into(),
            object_path: object_path.into(),
        }
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}{})", self.desktop_id, self.bus_name, self.object_path)
    }
}
