//! 提供者层：身份、调用接口与句柄、注册表、发现、元数据，以及 D-Bus / Mock 后端

#[cfg(feature = "dbus")]
pub mod dbus;
pub mod discovery;
pub mod endpoint;
pub mod identity;
pub mod meta;
pub mod mock;
pub mod registry;

#[cfg(feature = "dbus")]
pub use dbus::{connect_registry, session_connection, DbusEndpoint, SEARCH_PROVIDER_INTERFACE};
pub use discovery::{discover, parse_provider_file, search_provider_dirs};
pub use endpoint::{Endpoint, SearchEndpoint};
pub use identity::ProviderIdentity;
pub use meta::ResultMeta;
pub use mock::{MockCall, MockEndpoint, MockRecorder, MockReply};
pub use registry::Registry;
