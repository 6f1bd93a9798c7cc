//! D-Bus 后端：`org.gnome.Shell.SearchProvider2`
//!
//! 所有提供者共享同一个会话总线连接（zbus::Connection 克隆即共享），
//! 连接的生命周期由调用方管理。丢弃挂起中的调用 future 即放弃等待该回复。

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as Json;
use zbus::zvariant::{OwnedValue, Value};
use zbus::{Connection, Proxy};

use super::endpoint::{Endpoint, SearchEndpoint};
use super::identity::ProviderIdentity;
use super::meta::ResultMeta;
use super::registry::Registry;
use crate::core::{ClientError, EndpointError};

pub const SEARCH_PROVIDER_INTERFACE: &str = "org.gnome.Shell.SearchProvider2";

/// 属于「找不到 / 连不上」的总线错误名，其余视为提供者自身的错误
const TRANSPORT_ERROR_NAMES: &[&str] = &[
    "org.freedesktop.DBus.Error.ServiceUnknown",
    "org.freedesktop.DBus.Error.NameHasNoOwner",
    "org.freedesktop.DBus.Error.NoReply",
    "org.freedesktop.DBus.Error.Disconnected",
    "org.freedesktop.DBus.Error.NoServer",
    "org.freedesktop.DBus.Error.Timeout",
    "org.freedesktop.DBus.Error.TimedOut",
    "org.freedesktop.DBus.Error.UnknownObject",
    "org.freedesktop.DBus.Error.UnknownInterface",
    "org.freedesktop.DBus.Error.UnknownMethod",
];

/// 连接会话总线
pub async fn session_connection() -> Result<Connection, ClientError> {
    Connection::session()
        .await
        .map_err(|e| ClientError::Bus(e.to_string()))
}

/// 为每个身份创建代理并注册；无法创建的记录警告后跳过
pub async fn connect_registry(connection: &Connection, identities: Vec<ProviderIdentity>) -> Registry {
    let mut registry = Registry::new();
    for identity in identities {
        match DbusEndpoint::new(connection, identity.clone()).await {
            Ok(endpoint) => {
                registry.register(Endpoint::new(endpoint));
            }
            Err(err) => {
                tracing::warn!(provider = %identity, error = %err, "Cannot bind search provider")
            }
        }
    }
    registry
}

/// 单个提供者的 D-Bus 代理
pub struct DbusEndpoint {
    identity: ProviderIdentity,
    proxy: Proxy<'static>,
}

impl DbusEndpoint {
    pub async fn new(connection: &Connection, identity: ProviderIdentity) -> Result<Self, EndpointError> {
        let proxy = Proxy::new(
            connection,
            identity.bus_name.clone(),
            identity.object_path.clone(),
            SEARCH_PROVIDER_INTERFACE,
        )
        .await
        .map_err(map_error)?;
        Ok(Self { identity, proxy })
    }

    async fn call_ids<B>(&self, method: &'static str, body: &B) -> Result<Vec<String>, EndpointError>
    where
        B: serde::Serialize + zbus::zvariant::DynamicType + Sync,
    {
        self.proxy.call(method, body).await.map_err(map_error)
    }

    async fn call_unit<B>(&self, method: &'static str, body: &B) -> Result<(), EndpointError>
    where
        B: serde::Serialize + zbus::zvariant::DynamicType + Sync,
    {
        self.proxy
            .call_method(method, body)
            .await
            .map(|_| ())
            .map_err(map_error)
    }
}

#[async_trait]
impl SearchEndpoint for DbusEndpoint {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    async fn load(&self) -> Result<(), EndpointError> {
        self.call_unit("Load", &()).await
    }

    async fn query(&self, terms: &[String]) -> Result<Vec<String>, EndpointError> {
        self.call_ids("GetInitialResultSet", &(terms.to_vec(),)).await
    }

    async fn refine(
        &self,
        previous_ids: &[String],
        terms: &[String],
    ) -> Result<Vec<String>, EndpointError> {
        self.call_ids(
            "GetSubsearchResultSet",
            &(previous_ids.to_vec(), terms.to_vec()),
        )
        .await
    }

    async fn fetch_metadata(&self, ids: &[String]) -> Result<Vec<ResultMeta>, EndpointError> {
        let metas: Vec<HashMap<String, OwnedValue>> = self
            .proxy
            .call("GetResultMetas", &(ids.to_vec(),))
            .await
            .map_err(map_error)?;
        Ok(metas
            .iter()
            .map(|attrs| {
                ResultMeta::new(
                    attrs
                        .iter()
                        .map(|(key, value)| (key.clone(), to_json(value)))
                        .collect(),
                )
            })
            .collect())
    }

    async fn activate(
        &self,
        id: &str,
        terms: &[String],
        timestamp: u32,
    ) -> Result<(), EndpointError> {
        self.call_unit("ActivateResult", &(id, terms.to_vec(), timestamp))
            .await
    }

    async fn launch(&self, terms: &[String], timestamp: u32) -> Result<(), EndpointError> {
        self.call_unit("LaunchSearch", &(terms.to_vec(), timestamp))
            .await
    }
}

fn map_error(err: zbus::Error) -> EndpointError {
    match err {
        zbus::Error::MethodError(name, message, _) => {
            classify_method_error(name.as_str(), message.unwrap_or_default())
        }
        other => EndpointError::Transport(other.to_string()),
    }
}

/// 按错误名区分：总线层面的找不到 / 连不上归为 Transport
fn classify_method_error(name: &str, message: String) -> EndpointError {
    if TRANSPORT_ERROR_NAMES.contains(&name) {
        EndpointError::Transport(format!("{name}: {message}"))
    } else {
        EndpointError::Application {
            name: name.to_string(),
            message,
        }
    }
}

/// 变体值转为 JSON；字典等不常见类型退化为调试文本
fn to_json(value: &Value<'_>) -> Json {
    match value {
        Value::U8(v) => Json::from(*v),
        Value::Bool(v) => Json::from(*v),
        Value::I16(v) => Json::from(*v),
        Value::U16(v) => Json::from(*v),
        Value::I32(v) => Json::from(*v),
        Value::U32(v) => Json::from(*v),
        Value::I64(v) => Json::from(*v),
        Value::U64(v) => Json::from(*v),
        Value::F64(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
        Value::Str(s) => Json::String(s.to_string()),
        Value::Signature(s) => Json::String(s.to_string()),
        Value::ObjectPath(p) => Json::String(p.to_string()),
        Value::Value(inner) => to_json(inner),
        Value::Array(array) => Json::Array(array.iter().map(to_json).collect()),
        Value::Structure(fields) => Json::Array(fields.fields().iter().map(to_json).collect()),
        other => Json::String(format!("{other:?}")),
    }
}
