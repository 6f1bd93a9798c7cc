//! 核心层：单轮分发 / 汇聚（coordinator）、跨轮会话状态（session）、结果类型与错误

pub mod coordinator;
pub mod error;
pub mod outcome;
pub mod session;

pub use coordinator::{route, Dispatch, QueryCoordinator, Round, RoundEnd};
pub use error::{ClientError, DiscoveryError, EndpointError};
pub use outcome::{ProviderResponse, QueryOutcome};
pub use session::{RoundRecord, SearchSession, SessionRound};
