//! Hook handler types.
//!
//! Handlers are stored type-erased and recovered with the argument and result
//! types of the dispatch site. A mismatch is reported as an
//! [`HardhatError::InvariantViolation`].

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::context::HookContext;
use crate::{HardhatError, Result};

/// Boxed future returned by hook handlers.
pub type HookFuture<R> = Pin<Box<dyn Future<Output = Result<R>> + Send>>;

/// Handler taking part in a handler chain.
pub type ChainHandlerFn<A, R> =
    Arc<dyn Fn(Arc<HookContext>, A, Next<A, R>) -> HookFuture<R> + Send + Sync>;

/// Handler invoked by sequential (fan-out) dispatch.
pub type SequentialHandlerFn<A, R> = Arc<dyn Fn(Arc<HookContext>, A) -> HookFuture<R> + Send + Sync>;

/// Continuation to the rest of a handler chain.
///
/// Calling it is optional: not calling it short-circuits the chain. Calling
/// it more than once runs the remaining chain again; handlers doing so must
/// make sure the rest of the chain tolerates it.
pub struct Next<A, R> {
    inner: Arc<dyn Fn(A) -> HookFuture<R> + Send + Sync>,
}

impl<A, R> Clone for Next<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A, R> Next<A, R> {
    /// Wrap an async function as a continuation.
    pub fn new<F, Fut>(f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |args| Box::pin(f(args))),
        }
    }

    pub(crate) fn from_boxed(inner: Arc<dyn Fn(A) -> HookFuture<R> + Send + Sync>) -> Self {
        Self { inner }
    }

    /// Run the remainder of the chain.
    pub fn run(&self, args: A) -> HookFuture<R> {
        (self.inner)(args)
    }
}

impl<A, R> std::fmt::Debug for Next<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// Dispatch protocol a handler was registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookProtocol {
    Chain,
    Sequential,
}

impl std::fmt::Display for HookProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chain => write!(f, "chain"),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

#[derive(Clone)]
pub(crate) struct ErasedHandler {
    protocol: HookProtocol,
    signature: &'static str,
    handler: Arc<dyn Any + Send + Sync>,
}

impl ErasedHandler {
    fn new<T: Any + Send + Sync>(protocol: HookProtocol, signature: &'static str, handler: T) -> Self {
        Self {
            protocol,
            signature,
            handler: Arc::new(handler),
        }
    }

    fn mismatch(&self, protocol: HookProtocol, signature: &'static str, hook: &str) -> HardhatError {
        HardhatError::invariant(format!(
            "hook '{}' dispatched as {} with {}, but the handler is {} with {}",
            hook, protocol, signature, self.protocol, self.signature
        ))
    }

    pub(crate) fn chain<A: 'static, R: 'static>(&self, hook: &str) -> Result<ChainHandlerFn<A, R>> {
        let signature = std::any::type_name::<(A, R)>();
        if self.protocol != HookProtocol::Chain {
            return Err(self.mismatch(HookProtocol::Chain, signature, hook));
        }
        self.handler
            .downcast_ref::<ChainHandlerFn<A, R>>()
            .cloned()
            .ok_or_else(|| self.mismatch(HookProtocol::Chain, signature, hook))
    }

    pub(crate) fn sequential<A: 'static, R: 'static>(
        &self,
        hook: &str,
    ) -> Result<SequentialHandlerFn<A, R>> {
        let signature = std::any::type_name::<(A, R)>();
        if self.protocol != HookProtocol::Sequential {
            return Err(self.mismatch(HookProtocol::Sequential, signature, hook));
        }
        self.handler
            .downcast_ref::<SequentialHandlerFn<A, R>>()
            .cloned()
            .ok_or_else(|| self.mismatch(HookProtocol::Sequential, signature, hook))
    }
}

/// The handlers one plugin contributes to one hook category, by hook name.
#[derive(Clone, Default)]
pub struct HookHandlers {
    handlers: HashMap<String, ErasedHandler>,
}

impl HookHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for chain dispatch of `hook`.
    pub fn on_chain<A, R, F, Fut>(mut self, hook: impl Into<String>, handler: F) -> Self
    where
        A: Send + 'static,
        R: Send + 'static,
        F: Fn(Arc<HookContext>, A, Next<A, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let handler: ChainHandlerFn<A, R> =
            Arc::new(move |context, args, next| Box::pin(handler(context, args, next)));
        self.handlers.insert(
            hook.into(),
            ErasedHandler::new(HookProtocol::Chain, std::any::type_name::<(A, R)>(), handler),
        );
        self
    }

    /// Register a handler for sequential dispatch of `hook`.
    pub fn on_sequential<A, R, F, Fut>(mut self, hook: impl Into<String>, handler: F) -> Self
    where
        A: Send + 'static,
        R: Send + 'static,
        F: Fn(Arc<HookContext>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let handler: SequentialHandlerFn<A, R> =
            Arc::new(move |context, args| Box::pin(handler(context, args)));
        self.handlers.insert(
            hook.into(),
            ErasedHandler::new(
                HookProtocol::Sequential,
                std::any::type_name::<(A, R)>(),
                handler,
            ),
        );
        self
    }

    /// Names of the hooks with a handler, sorted.
    pub fn hook_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, hook: &str) -> bool {
        self.handlers.contains_key(hook)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn get(&self, hook: &str) -> Option<&ErasedHandler> {
        self.handlers.get(hook)
    }
}

impl std::fmt::Debug for HookHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookHandlers")
            .field("hooks", &self.hook_names())
            .finish()
    }
}
