pub mod call;
pub mod codec;
pub mod error;
pub mod service;


pub use call::{CallContext, CallId, Decoder};
pub use codec::{decode_message, encode_message, encode_reply};
pub use error::{BridgeError, Result};
pub use service::{
    method_identifier, service_identifier, BoundMethod, HandlerFuture, MethodDescription,
    MethodHandler, ServiceDescription, ServiceRef, SERVICE_NAME_SEPARATOR,
};
