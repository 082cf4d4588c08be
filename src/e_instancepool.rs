//! Lifecycle of in-process compiler instances.
//!
//! A [`CompilerHandle`] is an entry point resolved inside a [`LoadingContext`].
//! Building one is expensive (it mirrors loading javac's classes), so the
//! [`CompilerInstancePool`] hands them out according to a [`ReusePolicy`].

use crate::e_error::{CompilerError, EntryPointError, Result};
use crate::e_locate;
use crossbeam::queue::SegQueue;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fully-qualified name of javac's programmatic entry point.
pub const JAVAC_ENTRY_POINT: &str = "com.sun.tools.javac.Main";

/// When in-process compiler instances are recreated or shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReusePolicy {
    /// A fresh instance per invocation, dropped afterwards.
    AlwaysNew,
    /// Instances go back to a free list after use; any idle one serves any caller.
    #[default]
    ReuseCreated,
    /// One process-wide instance, built at most once and shared by every caller.
    ReuseSame,
}

/// The search path an entry point is resolved and run against.
///
/// This is passed explicitly to every invocation instead of being swapped into
/// ambient per-thread state, so nested invocations cannot clobber each other.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadingContext {
    search_path: Vec<PathBuf>,
    archive: Option<PathBuf>,
}

impl LoadingContext {
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        LoadingContext {
            search_path,
            archive: None,
        }
    }

    /// A context that sees the toolkit archive first and the caller's entries
    /// after it, with no parent/child delegation between the two.
    pub fn isolated(archive: &Path, caller: &LoadingContext) -> Result<Self> {
        let archive = std::path::absolute(archive).map_err(|e| CompilerError::LoadingContext {
            path: archive.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut search_path = Vec::with_capacity(caller.search_path.len() + 1);
        search_path.push(archive.clone());
        search_path.extend(caller.search_path.iter().cloned());
        Ok(LoadingContext {
            search_path,
            archive: Some(archive),
        })
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// The toolkit archive this context was built around, if any.
    pub fn archive(&self) -> Option<&Path> {
        self.archive.as_deref()
    }
}

/// The callable form of a compiler: `compile(argv, sink) -> exit code`.
pub trait CompilerEntryPoint: Send + Sync {
    fn compile(
        &self,
        args: &[String],
        sink: &mut dyn Write,
        context: &LoadingContext,
    ) -> std::result::Result<i32, EntryPointError>;
}

impl<F> CompilerEntryPoint for F
where
    F: Fn(&[String], &mut dyn Write, &LoadingContext) -> std::result::Result<i32, EntryPointError>
        + Send
        + Sync,
{
    fn compile(
        &self,
        args: &[String],
        sink: &mut dyn Write,
        context: &LoadingContext,
    ) -> std::result::Result<i32, EntryPointError> {
        self(args, sink, context)
    }
}

/// Looks entry points up by their fully-qualified symbol.
pub trait EntryPointProvider: Send + Sync {
    /// A new entry point instance for `symbol`, or `None` when the symbol is
    /// not visible from `context`.
    fn resolve(&self, symbol: &str, context: &LoadingContext) -> Option<Arc<dyn CompilerEntryPoint>>;

    /// Version of the runtime the entry points execute on, e.g. `"17"`.
    fn runtime_version(&self) -> String;
}

/// Where a registered entry point can be seen from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Visible from any context.
    Everywhere,
    /// Only visible from a context built around the toolkit archive.
    ToolsArchive,
}

type Factory = Arc<dyn Fn(&LoadingContext) -> Arc<dyn CompilerEntryPoint> + Send + Sync>;

/// An [`EntryPointProvider`] backed by factories registered at startup.
pub struct EntryPointRegistry {
    runtime_version: String,
    entries: HashMap<String, (Visibility, Factory)>,
}

impl EntryPointRegistry {
    pub fn new(runtime_version: impl Into<String>) -> Self {
        EntryPointRegistry {
            runtime_version: runtime_version.into(),
            entries: HashMap::new(),
        }
    }

    pub fn register<F, E>(&mut self, symbol: impl Into<String>, visibility: Visibility, factory: F)
    where
        F: Fn(&LoadingContext) -> E + Send + Sync + 'static,
        E: CompilerEntryPoint + 'static,
    {
        let factory: Factory =
            Arc::new(move |ctx: &LoadingContext| -> Arc<dyn CompilerEntryPoint> {
                Arc::new(factory(ctx))
            });
        self.entries.insert(symbol.into(), (visibility, factory));
    }
}

impl EntryPointProvider for EntryPointRegistry {
    fn resolve(&self, symbol: &str, context: &LoadingContext) -> Option<Arc<dyn CompilerEntryPoint>> {
        let (visibility, factory) = self.entries.get(symbol)?;
        match visibility {
            Visibility::ToolsArchive if context.archive().is_none() => None,
            _ => Some(factory(context)),
        }
    }

    fn runtime_version(&self) -> String {
        self.runtime_version.clone()
    }
}

struct HandleInner {
    id: usize,
    entry: Arc<dyn CompilerEntryPoint>,
    context: LoadingContext,
}

/// A loaded, invocable compiler instance. Cloning shares the same instance.
#[derive(Clone)]
pub struct CompilerHandle {
    inner: Arc<HandleInner>,
}

impl CompilerHandle {
    /// Sequence number assigned at construction; unique per pool.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn context(&self) -> &LoadingContext {
        &self.inner.context
    }

    pub fn same_instance(&self, other: &CompilerHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Runs the entry point against this handle's own loading context.
    pub fn compile(
        &self,
        args: &[String],
        sink: &mut dyn Write,
    ) -> std::result::Result<i32, EntryPointError> {
        self.inner.entry.compile(args, sink, &self.inner.context)
    }
}

impl fmt::Debug for CompilerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerHandle")
            .field("id", &self.inner.id)
            .field("context", &self.inner.context)
            .field("entry", &"dyn CompilerEntryPoint")
            .finish()
    }
}

/// Hands out [`CompilerHandle`]s under a [`ReusePolicy`]. Safe to share
/// between threads; construction is the only thing ever serialized.
pub struct CompilerInstancePool {
    provider: Arc<dyn EntryPointProvider>,
    symbol: String,
    base_context: LoadingContext,
    runtime_home: Option<PathBuf>,
    idle: SegQueue<CompilerHandle>,
    shared: OnceCell<CompilerHandle>,
    created: AtomicUsize,
}

impl fmt::Debug for CompilerInstancePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerInstancePool")
            .field("symbol", &self.symbol)
            .field("base_context", &self.base_context)
            .field("runtime_home", &self.runtime_home)
            .field("idle.len", &self.idle.len())
            .field("shared", &self.shared.get().map(|h| h.id()))
            .field("created", &self.created.load(Ordering::SeqCst))
            .finish()
    }
}

impl CompilerInstancePool {
    pub fn new(provider: Arc<dyn EntryPointProvider>) -> Self {
        CompilerInstancePool {
            provider,
            symbol: JAVAC_ENTRY_POINT.to_string(),
            base_context: LoadingContext::default(),
            runtime_home: None,
            idle: SegQueue::new(),
            shared: OnceCell::new(),
            created: AtomicUsize::new(0),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    /// Installation the toolkit archive is looked up next to. Defaults to `JAVA_HOME`.
    pub fn with_runtime_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.runtime_home = Some(home.into());
        self
    }

    /// The caller's own search path, visible to every handle.
    pub fn with_search_path(mut self, search_path: Vec<PathBuf>) -> Self {
        self.base_context = LoadingContext::new(search_path);
        self
    }

    pub fn runtime_version(&self) -> String {
        self.provider.runtime_version()
    }

    /// How many handles this pool has constructed so far.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Handles parked on the free list.
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn acquire(&self, policy: ReusePolicy) -> Result<CompilerHandle> {
        match policy {
            ReusePolicy::AlwaysNew => self.create_handle(),
            ReusePolicy::ReuseCreated => match self.idle.pop() {
                Some(handle) => {
                    log::trace!("reusing idle compiler handle #{}", handle.id());
                    Ok(handle)
                }
                None => self.create_handle(),
            },
            ReusePolicy::ReuseSame => self
                .shared
                .get_or_try_init(|| self.create_handle())
                .cloned(),
        }
    }

    pub fn release(&self, handle: CompilerHandle, policy: ReusePolicy) {
        if policy == ReusePolicy::ReuseCreated {
            self.idle.push(handle);
        }
    }

    /// Acquires a handle that is released back to the pool when the guard drops,
    /// including during unwinding.
    pub fn checkout(&self, policy: ReusePolicy) -> Result<PooledHandle<'_>> {
        let handle = self.acquire(policy)?;
        Ok(PooledHandle {
            pool: self,
            policy,
            handle,
        })
    }

    fn create_handle(&self) -> Result<CompilerHandle> {
        if let Some(entry) = self.provider.resolve(&self.symbol, &self.base_context) {
            return Ok(self.register(entry, self.base_context.clone()));
        }

        // Not reachable from the caller's own context: fall back to the
        // toolkit archive shipped next to the runtime.
        let home = match &self.runtime_home {
            Some(home) => home.clone(),
            None => e_locate::runtime_home().ok_or_else(|| {
                CompilerError::Environment(
                    "The environment variable JAVA_HOME is not correctly set.".to_string(),
                )
            })?,
        };
        let archive = e_locate::tools_archive(&home);
        if !archive.exists() {
            return Err(CompilerError::ToolsArchiveNotFound { path: archive });
        }

        let context = LoadingContext::isolated(&archive, &self.base_context)?;
        let entry = self
            .provider
            .resolve(&self.symbol, &context)
            .ok_or_else(|| CompilerError::EntryPointNotFound {
                symbol: self.symbol.clone(),
                location: archive.clone(),
            })?;
        Ok(self.register(entry, context))
    }

    fn register(&self, entry: Arc<dyn CompilerEntryPoint>, context: LoadingContext) -> CompilerHandle {
        let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!(
            "created compiler handle #{} for {} ({} search path entries)",
            id,
            self.symbol,
            context.search_path().len()
        );
        CompilerHandle {
            inner: Arc::new(HandleInner { id, entry, context }),
        }
    }
}

/// Scoped handle from [`CompilerInstancePool::checkout`].
pub struct PooledHandle<'a> {
    pool: &'a CompilerInstancePool,
    policy: ReusePolicy,
    handle: CompilerHandle,
}

impl Deref for PooledHandle<'_> {
    type Target = CompilerHandle;

    fn deref(&self) -> &CompilerHandle {
        &self.handle
    }
}

impl Drop for PooledHandle<'_> {
    fn drop(&mut self) {
        self.pool.release(self.handle.clone(), self.policy);
    }
}
