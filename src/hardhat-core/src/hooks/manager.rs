//! Hook manager: lazy handler loading and the two dispatch protocols.
//!
//! Chain order is the order in which handlers wrap each other, outermost
//! first: dynamically registered handlers (latest registration first), then
//! plugin handlers in reverse resolution order. Sequential dispatch runs the
//! exact reverse of chain order.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;

use super::context::HookContext;
use super::types::{ErasedHandler, HookHandlers, Next};
use crate::loader::ModuleLoader;
use crate::plugin::PluginDescriptor;
use crate::resolver::ResolvedPluginList;
use crate::{HardhatError, Result};

/// Handle returned by [`HookManager::register_handlers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerRegistration(u64);

/// Dispatcher over the handlers of the resolved plugins.
pub struct HookManager {
    plugins: ResolvedPluginList,
    loader: Arc<dyn ModuleLoader>,
    context: OnceLock<Arc<HookContext>>,
    /// Loaded handler modules keyed by (plugin id, category).
    loaded: RwLock<HashMap<(String, String), Arc<HookHandlers>>>,
    /// Plugin handlers keyed by (category, hook), in chain order.
    plugin_chains: RwLock<HashMap<(String, String), Arc<[ErasedHandler]>>>,
    /// Dynamic registrations by category, in registration order.
    dynamic: RwLock<HashMap<String, Vec<(HandlerRegistration, HookHandlers)>>>,
    next_registration: AtomicU64,
}

impl HookManager {
    /// Create a manager over `plugins`. Nothing is loaded until dispatch.
    pub fn new(plugins: ResolvedPluginList, loader: Arc<dyn ModuleLoader>) -> Arc<Self> {
        Arc::new(Self {
            plugins,
            loader,
            context: OnceLock::new(),
            loaded: RwLock::new(HashMap::new()),
            plugin_chains: RwLock::new(HashMap::new()),
            dynamic: RwLock::new(HashMap::new()),
            next_registration: AtomicU64::new(1),
        })
    }

    /// Attach the context passed to every handler. Allowed once.
    pub fn set_context(self: &Arc<Self>, mut context: HookContext) -> Result<()> {
        context.bind(Arc::downgrade(self));
        self.context
            .set(Arc::new(context))
            .map_err(|_| HardhatError::invariant("hook context is already set"))
    }

    /// The attached context.
    pub fn context(&self) -> Result<Arc<HookContext>> {
        self.context
            .get()
            .cloned()
            .ok_or_else(|| HardhatError::invariant("hook dispatch before the context was set"))
    }

    pub fn plugins(&self) -> &ResolvedPluginList {
        &self.plugins
    }

    pub(crate) fn loader(&self) -> &Arc<dyn ModuleLoader> {
        &self.loader
    }

    /// Register handlers for `category` outside of any plugin.
    ///
    /// They wrap every handler registered before them.
    pub async fn register_handlers(
        &self,
        category: impl Into<String>,
        handlers: HookHandlers,
    ) -> HandlerRegistration {
        let category = category.into();
        let registration =
            HandlerRegistration(self.next_registration.fetch_add(1, Ordering::Relaxed));

        tracing::debug!(
            "Registering dynamic '{}' handlers for: {}",
            category,
            handlers.hook_names().join(", ")
        );
        self.dynamic
            .write()
            .await
            .entry(category)
            .or_default()
            .push((registration, handlers));
        registration
    }

    /// Remove a dynamic registration. Returns `false` if it was not found.
    pub async fn unregister_handlers(&self, category: &str, registration: HandlerRegistration) -> bool {
        let mut dynamic = self.dynamic.write().await;
        let Some(entries) = dynamic.get_mut(category) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|(id, _)| *id != registration);
        let removed = entries.len() != before;
        if entries.is_empty() {
            dynamic.remove(category);
        }
        removed
    }

    /// Check whether any handler exists for `category.hook`.
    ///
    /// Loads the category of every plugin declaring it.
    pub async fn has_handlers(&self, category: &str, hook: &str) -> Result<bool> {
        Ok(!self.handlers(category, hook).await?.is_empty())
    }

    /// Invoke every handler of `category.hook` once, in resolution order.
    ///
    /// The first error aborts the dispatch and is returned as is.
    pub async fn run_sequential_handlers<A, R>(
        &self,
        category: &str,
        hook: &str,
        args: A,
    ) -> Result<Vec<R>>
    where
        A: Clone + Send + 'static,
        R: Send + 'static,
    {
        let context = self.context()?;
        let handlers = self.handlers(category, hook).await?;
        let typed = handlers
            .iter()
            .rev()
            .map(|handler| handler.sequential::<A, R>(hook))
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(
            "Running {} sequential handlers for {}.{}",
            typed.len(),
            category,
            hook
        );

        let mut results = Vec::with_capacity(typed.len());
        for handler in typed {
            results.push(handler(context.clone(), args.clone()).await?);
        }
        Ok(results)
    }

    /// Run the handler chain of `category.hook` with `default` innermost.
    pub async fn run_handler_chain<A, R, D, Fut>(
        &self,
        category: &str,
        hook: &str,
        args: A,
        default: D,
    ) -> Result<R>
    where
        A: Send + 'static,
        R: Send + 'static,
        D: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let context = self.context()?;
        let handlers = self.handlers(category, hook).await?;
        let typed = handlers
            .iter()
            .map(|handler| handler.chain::<A, R>(hook))
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(
            "Running handler chain of {} handlers for {}.{}",
            typed.len(),
            category,
            hook
        );

        let mut next = Next::new(default);
        for handler in typed.into_iter().rev() {
            let context = context.clone();
            let inner = next;
            next = Next::from_boxed(Arc::new(move |args: A| {
                handler(context.clone(), args, inner.clone())
            }));
        }

        next.run(args).await
    }

    /// All handlers of `category.hook` in chain order.
    async fn handlers(&self, category: &str, hook: &str) -> Result<Vec<ErasedHandler>> {
        let mut handlers: Vec<ErasedHandler> = {
            let dynamic = self.dynamic.read().await;
            dynamic
                .get(category)
                .map(|entries| {
                    entries
                        .iter()
                        .rev()
                        .filter_map(|(_, handlers)| handlers.get(hook).cloned())
                        .collect()
                })
                .unwrap_or_default()
        };

        handlers.extend(self.plugin_chain(category, hook).await?.iter().cloned());
        Ok(handlers)
    }

    async fn plugin_chain(&self, category: &str, hook: &str) -> Result<Arc<[ErasedHandler]>> {
        let key = (category.to_string(), hook.to_string());
        if let Some(chain) = self.plugin_chains.read().await.get(&key) {
            return Ok(chain.clone());
        }

        let mut chain = Vec::new();
        for plugin in self.plugins.iter().rev() {
            let Some(handlers) = self.plugin_category(plugin, category).await? else {
                continue;
            };
            if let Some(handler) = handlers.get(hook) {
                chain.push(handler.clone());
            }
        }

        let chain: Arc<[ErasedHandler]> = Arc::from(chain);
        let mut chains = self.plugin_chains.write().await;
        Ok(chains.entry(key).or_insert(chain).clone())
    }

    async fn plugin_category(
        &self,
        plugin: &PluginDescriptor,
        category: &str,
    ) -> Result<Option<Arc<HookHandlers>>> {
        let Some(reference) = plugin.hook_handlers.get(category) else {
            return Ok(None);
        };

        let key = (plugin.id.clone(), category.to_string());
        if let Some(handlers) = self.loaded.read().await.get(&key) {
            return Ok(Some(handlers.clone()));
        }

        tracing::debug!("Loading '{}' hook handlers of plugin {}", category, plugin.id);
        let handlers = Arc::new(
            self.loader
                .load_hook_handlers(&plugin.id, category, reference)
                .await?,
        );

        let mut loaded = self.loaded.write().await;
        Ok(Some(loaded.entry(key).or_insert(handlers).clone()))
    }
}

impl std::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookManager")
            .field("plugins", &self.plugins.ids())
            .field("context_set", &self.context.get().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedConfig;
    use crate::global_options::GlobalOptions;
    use crate::hooks::NonInteractiveIo;
    use crate::loader::StaticModuleRegistry;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn context() -> HookContext {
        HookContext::new(
            Arc::new(ResolvedConfig::default()),
            Arc::new(GlobalOptions::default()),
            Arc::new(NonInteractiveIo),
        )
    }

    fn manager_with(
        plugins: Vec<PluginDescriptor>,
        loader: StaticModuleRegistry,
    ) -> Arc<HookManager> {
        let list = ResolvedPluginList::from_ordered(plugins.into_iter().map(Arc::new).collect());
        let manager = HookManager::new(list, Arc::new(loader));
        manager.set_context(context()).unwrap();
        manager
    }

    #[tokio::test]
    async fn test_dispatch_requires_context() {
        let manager = HookManager::new(ResolvedPluginList::empty(), Arc::new(StaticModuleRegistry::new()));

        let err = manager
            .run_sequential_handlers::<(), ()>("hre", "created", ())
            .await
            .unwrap_err();
        assert!(matches!(err, HardhatError::InvariantViolation(_)));

        let err = manager
            .run_handler_chain("config", "resolve", 1u32, |n| async move { Ok(n) })
            .await
            .unwrap_err();
        assert!(matches!(err, HardhatError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn test_context_set_once() {
        let manager = manager_with(vec![], StaticModuleRegistry::new());
        assert!(matches!(
            manager.set_context(context()),
            Err(HardhatError::InvariantViolation(_))
        ));

        let attached = manager.context().unwrap().hooks().unwrap();
        assert!(Arc::ptr_eq(&attached, &manager));
    }

    #[tokio::test]
    async fn test_handlers_load_once_per_category() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let loader = StaticModuleRegistry::new().with_hook_handlers("p", "./hre", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(HookHandlers::new()
                .on_sequential("created", |_ctx, _: ()| async move { Ok(1u32) })
                .on_sequential("closed", |_ctx, _: ()| async move { Ok(2u32) }))
        });
        let manager = manager_with(
            vec![PluginDescriptor::new("p").with_hook_handlers("hre", "./hre")],
            loader,
        );

        assert_eq!(loads.load(Ordering::SeqCst), 0);
        for _ in 0..3 {
            let results = manager
                .run_sequential_handlers::<(), u32>("hre", "created", ())
                .await
                .unwrap();
            assert_eq!(results, vec![1]);
        }
        manager
            .run_sequential_handlers::<(), u32>("hre", "closed", ())
            .await
            .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dynamic_handlers_wrap_plugin_handlers() {
        let loader = StaticModuleRegistry::new().with_hook_handlers("p", "./config", || {
            Ok(HookHandlers::new().on_chain(
                "resolve",
                |_ctx, mut trail: Vec<String>, next: Next<Vec<String>, Vec<String>>| async move {
                    trail.push("plugin".to_string());
                    next.run(trail).await
                },
            ))
        });
        let manager = manager_with(
            vec![PluginDescriptor::new("p").with_hook_handlers("config", "./config")],
            loader,
        );

        let dynamic = |label: &'static str| {
            HookHandlers::new().on_chain(
                "resolve",
                move |_ctx, mut trail: Vec<String>, next: Next<Vec<String>, Vec<String>>| async move {
                    trail.push(label.to_string());
                    next.run(trail).await
                },
            )
        };
        manager.register_handlers("config", dynamic("first")).await;
        let second = manager.register_handlers("config", dynamic("second")).await;

        let trail = manager
            .run_handler_chain("config", "resolve", Vec::<String>::new(), |trail| async move { Ok(trail) })
            .await
            .unwrap();
        assert_eq!(trail, vec!["second", "first", "plugin"]);

        assert!(manager.unregister_handlers("config", second).await);
        assert!(!manager.unregister_handlers("config", second).await);

        let trail = manager
            .run_handler_chain("config", "resolve", Vec::<String>::new(), |trail| async move { Ok(trail) })
            .await
            .unwrap();
        assert_eq!(trail, vec!["first", "plugin"]);
    }

    #[tokio::test]
    async fn test_sequential_is_reverse_of_chain_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let manager = manager_with(vec![], StaticModuleRegistry::new());

        for label in ["first", "second"] {
            let order = order.clone();
            manager
                .register_handlers(
                    "hre",
                    HookHandlers::new().on_sequential("created", move |_ctx, _: ()| {
                        let order = order.clone();
                        async move {
                            order.lock().unwrap().push(label);
                            Ok(())
                        }
                    }),
                )
                .await;
        }

        manager
            .run_sequential_handlers::<(), ()>("hre", "created", ())
            .await
            .unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_protocol_mismatch_is_reported() {
        let manager = manager_with(vec![], StaticModuleRegistry::new());
        manager
            .register_handlers(
                "hre",
                HookHandlers::new().on_sequential("created", |_ctx, _: ()| async move { Ok(()) }),
            )
            .await;

        let err = manager
            .run_handler_chain("hre", "created", (), |_| async move { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, HardhatError::InvariantViolation(_)));
        assert!(manager.has_handlers("hre", "created").await.unwrap());
        assert!(!manager.has_handlers("hre", "closed").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_handler_module() {
        let manager = manager_with(
            vec![PluginDescriptor::new("p").with_hook_handlers("hre", "./missing")],
            StaticModuleRegistry::new(),
        );

        let err = manager
            .run_sequential_handlers::<(), ()>("hre", "created", ())
            .await
            .unwrap_err();
        assert!(matches!(err, HardhatError::HandlerLoad { ref plugin, .. } if plugin == "p"));
    }
}
