use thiserror::Error;

/// Errors raised while binding services, dispatching calls or running scripts.
///
/// The variants fall into four groups:
///
/// - **Binding** (`MalformedServiceName`, `InvalidMethodName`, `DuplicateService`,
///   `DuplicateMethod`, `ReservedIdentifier`): fatal to worker construction.
/// - **Per call** (`Decode`, `Handler`, `Encode`): reject a single call's promise
///   and never affect other in-flight calls.
/// - **Per run** (`Script`, `Stalled`, `Timeout`): delivered on one run's handle.
/// - **Environment** (`Runtime`): the embedding could not be set up or torn down.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Malformed service name '{0}': expected '<package>.<Service>'")]
    MalformedServiceName(String),

    #[error("Invalid method name '{method}' in service '{service}'")]
    InvalidMethodName { service: String, method: String },

    #[error("Services '{first}' and '{second}' both bind to script identifier '{identifier}'")]
    DuplicateService {
        identifier: String,
        first: String,
        second: String,
    },

    #[error("Methods '{first}' and '{second}' of service '{service}' both bind to script identifier '{identifier}'")]
    DuplicateMethod {
        service: String,
        identifier: String,
        first: String,
        second: String,
    },

    #[error("Service identifier '{0}' would shadow an existing global")]
    ReservedIdentifier(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("{0}")]
    Handler(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Script result can no longer settle: no call is in flight and no job is queued")]
    Stalled,

    #[error("Script did not settle within {0}ms")]
    Timeout(u64),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl BridgeError {
    /// Builds the error a handler reports for a domain-level failure.
    pub fn handler(message: impl Into<String>) -> Self {
        BridgeError::Handler(message.into())
    }

    /// Returns `true` for errors raised while building the namespace.
    pub fn is_binding(&self) -> bool {
        matches!(
            self,
            BridgeError::MalformedServiceName(_)
                | BridgeError::InvalidMethodName { .. }
                | BridgeError::DuplicateService { .. }
                | BridgeError::DuplicateMethod { .. }
                | BridgeError::ReservedIdentifier(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
