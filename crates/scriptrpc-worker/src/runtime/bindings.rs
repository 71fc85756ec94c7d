//! Service bindings
//!
//! Turns service references into the script-visible namespace: one global
//! object per service, one native function per method.
//!
//! # JavaScript API
//!
//! A service `clock.Clock` with a method `Now` becomes
//!
//! ```text
//! clock.now(request) -> Promise<response>
//! ```
//!
//! where `request` is either a JSON string or any JSON-shaped value. The call
//! returns a pending promise immediately; the handler runs on a tokio task
//! and the promise settles once the worker applies its settlement.
//!
//! # Construction
//!
//! [`Namespace::build`] validates every identifier up front and is pure;
//! [`install_namespace`] then writes the validated table into a context.
//! Each installed function captures its own [`MethodBinding`] by value, so
//! no two methods share per-method state.

use boa_engine::{
    native_function::NativeFunction,
    object::{builtins::JsPromise, FunctionObjectBuilder, JsObject},
    property::Attribute,
    value::JsValue,
    Context, JsNativeError, JsResult, JsString,
};
use boa_gc::{Finalize, Trace};
use scriptrpc_common::{
    method_identifier, service_identifier, BoundMethod, BridgeError, Result, ServiceRef,
};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::runtime::calls::CallRegistry;
use crate::runtime::conversions::JsonStringify;

/// One service as exposed to scripts.
#[derive(Debug, Clone)]
pub struct ServiceBinding {
    source_name: String,
    methods: BTreeMap<String, BoundMethod>,
}

impl ServiceBinding {
    /// Qualified service name from the description, e.g. `clock.Clock`.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Methods keyed by script identifier.
    pub fn methods(&self) -> impl Iterator<Item = (&str, &BoundMethod)> {
        self.methods.iter().map(|(id, m)| (id.as_str(), m))
    }

    pub fn method(&self, identifier: &str) -> Option<&BoundMethod> {
        self.methods.get(identifier)
    }
}

/// The bound namespace: script service identifier → method identifier →
/// bound method.
///
/// Built once, immutable afterwards. Every `(service, method)` pair of the
/// input appears exactly once.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    services: BTreeMap<String, ServiceBinding>,
}

impl Namespace {
    /// Validates `refs` and builds the namespace table.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::MalformedServiceName`] if a service name has no
    ///   package segment
    /// - [`BridgeError::InvalidMethodName`] if a method name yields no
    ///   usable identifier
    /// - [`BridgeError::DuplicateService`] / [`BridgeError::DuplicateMethod`]
    ///   if two names normalize to the same identifier; `first` and `second`
    ///   follow input order
    pub fn build(refs: impl IntoIterator<Item = ServiceRef>) -> Result<Self> {
        let mut services: BTreeMap<String, ServiceBinding> = BTreeMap::new();

        for service in refs {
            let service_id = service_identifier(service.name())?;
            if let Some(existing) = services.get(&service_id) {
                return Err(BridgeError::DuplicateService {
                    identifier: service_id,
                    first: existing.source_name.clone(),
                    second: service.name().to_string(),
                });
            }

            let mut methods: BTreeMap<String, BoundMethod> = BTreeMap::new();
            for method in service.methods() {
                let method_id = method_identifier(service.name(), method.name())?;
                if let Some(existing) = methods.get(&method_id) {
                    return Err(BridgeError::DuplicateMethod {
                        service: service.name().to_string(),
                        identifier: method_id,
                        first: existing.name().to_string(),
                        second: method.name().to_string(),
                    });
                }
                methods.insert(method_id, method.clone());
            }

            services.insert(
                service_id,
                ServiceBinding {
                    source_name: service.name().to_string(),
                    methods,
                },
            );
        }

        Ok(Self { services })
    }

    /// Services keyed by script identifier.
    pub fn services(&self) -> impl Iterator<Item = (&str, &ServiceBinding)> {
        self.services.iter().map(|(id, s)| (id.as_str(), s))
    }

    pub fn service(&self, identifier: &str) -> Option<&ServiceBinding> {
        self.services.get(identifier)
    }

    /// Returns `true` if `service.method` is callable from scripts.
    pub fn contains(&self, service: &str, method: &str) -> bool {
        self.services
            .get(service)
            .is_some_and(|s| s.methods.contains_key(method))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Total number of bound methods across all services.
    pub fn method_count(&self) -> usize {
        self.services.values().map(|s| s.methods.len()).sum()
    }
}

/// Captures of one installed method function.
///
/// Only `stringify` holds a garbage-collected value; the other two are
/// skipped by the tracer.
#[derive(Trace, Finalize)]
struct MethodBinding {
    #[unsafe_ignore_trace]
    calls: Rc<CallRegistry>,
    #[unsafe_ignore_trace]
    method: BoundMethod,
    stringify: JsonStringify,
}

/// Install the namespace into the context's global object.
///
/// # Errors
///
/// Returns [`BridgeError::ReservedIdentifier`] if a service identifier is
/// already a global (`eval`, `escape`, ...), or [`BridgeError::Runtime`] if
/// the engine refuses a property write.
pub(crate) fn install_namespace(
    ctx: &mut Context,
    namespace: &Namespace,
    calls: &Rc<CallRegistry>,
    stringify: &JsonStringify,
) -> Result<()> {
    for (service_id, service) in namespace.services() {
        let key = JsString::from(service_id);
        let taken = ctx
            .global_object()
            .has_property(key.clone(), ctx)
            .map_err(|e| BridgeError::Runtime(e.to_string()))?;
        if taken {
            return Err(BridgeError::ReservedIdentifier(service_id.to_string()));
        }

        let service_object = JsObject::with_object_proto(ctx.intrinsics());
        for (method_id, method) in service.methods() {
            let binding = MethodBinding {
                calls: Rc::clone(calls),
                method: method.clone(),
                stringify: stringify.clone(),
            };
            let function = FunctionObjectBuilder::new(
                ctx.realm(),
                NativeFunction::from_copy_closure_with_captures(dispatch, binding),
            )
            .length(1)
            .build();

            service_object
                .set(JsString::from(method_id), function, false, ctx)
                .map_err(|e| BridgeError::Runtime(e.to_string()))?;
        }

        ctx.register_global_property(key, service_object, Attribute::all())
            .map_err(|e| BridgeError::Runtime(e.to_string()))?;

        tracing::debug!(
            service = service.source_name(),
            identifier = service_id,
            "Installed service binding"
        );
    }

    Ok(())
}

/// Body of every bound method function.
fn dispatch(
    _this: &JsValue,
    args: &[JsValue],
    binding: &MethodBinding,
    context: &mut Context,
) -> JsResult<JsValue> {
    let method = &binding.method;
    let argument = args.first().ok_or_else(|| {
        JsNativeError::typ().with_message(format!(
            "{}.{} expects one argument (use {{}} for an empty request)",
            method.service(),
            method.name()
        ))
    })?;

    let (promise, resolvers) = JsPromise::new_pending(context);

    match argument_text(argument, &binding.stringify, context) {
        Ok(raw) => {
            binding
                .calls
                .start(method, raw, resolvers.resolve, resolvers.reject);
        }
        Err(e) => {
            let reason = JsValue::new(JsString::from(e.to_string().as_str()));
            resolvers
                .reject
                .call(&JsValue::undefined(), &[reason], context)?;
        }
    }

    Ok(promise.into())
}

/// Raw request text for an argument: strings verbatim, anything else as JSON.
fn argument_text(
    argument: &JsValue,
    stringify: &JsonStringify,
    context: &mut Context,
) -> Result<String> {
    if let Some(text) = argument.as_string() {
        return Ok(text.to_std_string_escaped());
    }

    stringify
        .text(argument, context)
        .map_err(|e| BridgeError::Decode(e.to_string()))
}
