//! Service descriptions and the explicit method registration table.
//!
//! A [`ServiceDescription`] is the static half of a service: its qualified
//! name and one handler per method, generic over the client type `C` the
//! handlers run against. Pairing a description with a concrete client
//! yields a [`ServiceRef`], which erases `C` by binding the client into each
//! method.
//!
//! # Example
//!
//! ```
//! use scriptrpc_common::{ServiceDescription, ServiceRef, CallContext, Result};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Deserialize)]
//! struct EchoRequest { text: String }
//!
//! #[derive(Serialize)]
//! struct EchoResponse { text: String }
//!
//! struct Echo;
//!
//! let description = ServiceDescription::<Echo>::new("demo.Echo")
//!     .method("Say", |_client: Arc<Echo>, _ctx: CallContext, req: EchoRequest| async move {
//!         Result::Ok(EchoResponse { text: req.text })
//!     });
//!
//! let service = ServiceRef::new(description, Arc::new(Echo));
//! assert_eq!(service.name(), "demo.Echo");
//! assert_eq!(service.methods().len(), 1);
//! ```

use futures::future::{BoxFuture, FutureExt};
use heck::ToLowerCamelCase;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::call::{CallContext, Decoder};
use super::codec::encode_message;
use super::error::{BridgeError, Result};

/// Separator between the package segments of a qualified service name.
pub const SERVICE_NAME_SEPARATOR: char = '.';

/// Future returned by a handler: the response message in structured form.
pub type HandlerFuture = BoxFuture<'static, Result<JsonValue>>;

/// Handler capability for one method of a service with client type `C`.
///
/// Receives the client, the call context and the decode capability, and
/// produces the response message or an error.
pub type MethodHandler<C> = Arc<dyn Fn(Arc<C>, CallContext, Decoder) -> HandlerFuture + Send + Sync>;

type ErasedHandler = Arc<dyn Fn(CallContext, Decoder) -> HandlerFuture + Send + Sync>;

/// One method entry of a [`ServiceDescription`].
pub struct MethodDescription<C> {
    name: String,
    handler: MethodHandler<C>,
}

impl<C> MethodDescription<C> {
    pub fn new(name: impl Into<String>, handler: MethodHandler<C>) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> &MethodHandler<C> {
        &self.handler
    }
}

impl<C> Clone for MethodDescription<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<C> fmt::Debug for MethodDescription<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescription")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Static description of a service: its qualified name and its methods in
/// declaration order.
pub struct ServiceDescription<C> {
    name: String,
    methods: Vec<MethodDescription<C>>,
}

impl<C> ServiceDescription<C>
where
    C: Send + Sync + 'static,
{
    /// Starts a description for the service `name` (e.g. `clock.Clock`).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Registers a typed method.
    ///
    /// The raw argument text is decoded into `Req` before `handler` runs and
    /// the returned `Resp` is encoded into its structured JSON form after.
    pub fn method<Req, Resp, F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + 'static,
        F: Fn(Arc<C>, CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.raw_method(name, move |client, ctx, decoder| {
            let handler = Arc::clone(&handler);
            async move {
                let request = decoder.decode::<Req>()?;
                let response = handler(client, ctx, request).await?;
                encode_message(&response)
            }
            .boxed()
        })
    }

    /// Registers a method whose handler drives the decode capability itself.
    pub fn raw_method<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Arc<C>, CallContext, Decoder) -> HandlerFuture + Send + Sync + 'static,
    {
        self.methods.push(MethodDescription::new(name, Arc::new(handler)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[MethodDescription<C>] {
        &self.methods
    }
}

impl<C> fmt::Debug for ServiceDescription<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescription")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .finish()
    }
}

/// A method with its client already bound in.
///
/// Cheap to clone; each clone shares the handler and the client.
#[derive(Clone)]
pub struct BoundMethod {
    service: Arc<str>,
    name: Arc<str>,
    invoke: ErasedHandler,
}

impl BoundMethod {
    /// Qualified name of the owning service.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the context for call `call_id` of this method.
    pub fn context(&self, call_id: super::call::CallId) -> CallContext {
        CallContext::new(call_id, Arc::clone(&self.service), Arc::clone(&self.name))
    }

    /// Invokes the handler against the bound client.
    pub fn invoke(&self, ctx: CallContext, decoder: Decoder) -> HandlerFuture {
        (self.invoke)(ctx, decoder)
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMethod")
            .field("service", &self.service)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A service description paired with the client its handlers run against.
#[derive(Clone, Debug)]
pub struct ServiceRef {
    name: Arc<str>,
    methods: Vec<BoundMethod>,
}

impl ServiceRef {
    pub fn new<C>(description: ServiceDescription<C>, client: Arc<C>) -> Self
    where
        C: Send + Sync + 'static,
    {
        let name: Arc<str> = Arc::from(description.name.as_str());
        let methods = description
            .methods
            .into_iter()
            .map(|method| {
                let client = Arc::clone(&client);
                let handler = method.handler;
                let invoke: ErasedHandler =
                    Arc::new(move |ctx, decoder| handler(Arc::clone(&client), ctx, decoder));
                BoundMethod {
                    service: Arc::clone(&name),
                    name: Arc::from(method.name.as_str()),
                    invoke,
                }
            })
            .collect();

        Self { name, methods }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[BoundMethod] {
        &self.methods
    }
}

/// Derives the script identifier of a qualified service name.
///
/// The name needs at least a package and a name segment; the last segment
/// is converted to lowerCamelCase (`pkg.TimeService` → `timeService`).
pub fn service_identifier(service_name: &str) -> Result<String> {
    let segments: Vec<&str> = service_name.split(SERVICE_NAME_SEPARATOR).collect();
    if segments.len() < 2 || segments.iter().any(|s| s.trim().is_empty()) {
        return Err(BridgeError::MalformedServiceName(service_name.to_string()));
    }

    segments
        .last()
        .and_then(|last| script_identifier(last))
        .ok_or_else(|| BridgeError::MalformedServiceName(service_name.to_string()))
}

/// Derives the script identifier of a method (`GetUser` → `getUser`).
pub fn method_identifier(service_name: &str, method_name: &str) -> Result<String> {
    script_identifier(method_name).ok_or_else(|| BridgeError::InvalidMethodName {
        service: service_name.to_string(),
        method: method_name.to_string(),
    })
}

fn script_identifier(name: &str) -> Option<String> {
    let identifier = name.to_lower_camel_case();
    let first = identifier.chars().next()?;
    if first.is_alphabetic() || first == '_' || first == '$' {
        Some(identifier)
    } else {
        None
    }
}
