//! # Module registry
//!
//! The set of currently loaded modules, kept as an intrusive singly linked
//! list. The registry owns only the links: every [`ModuleRecord`] is storage
//! provided by the caller (the kernel core keeps them in heap memory) and must
//! stay put while it is linked.
//!
//! Insertion is at the head, so iteration yields the most recently added
//! module first. Names are unique within a registry.

use crate::dynload::LoadedModule;
use core::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use core::{fmt, ptr, ptr::NonNull};
use kernel_errors::{KernelError, Result};
use kernel_info::limits::MODULE_NAME_MAX;
use kernel_sync::SpinLock;
use log::{debug, info, warn};

/// A module name stored inline.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct ModuleName {
    bytes: [u8; MODULE_NAME_MAX],
    len: u8,
}

impl ModuleName {
    /// # Errors
    /// [`KernelError::BadArgs`] for an empty name,
    /// [`KernelError::Limits`] for one longer than [`MODULE_NAME_MAX`] bytes.
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(KernelError::BadArgs);
        }
        if name.len() > MODULE_NAME_MAX {
            warn!(
                "registry: module name of {} bytes exceeds {MODULE_NAME_MAX}",
                name.len()
            );
            return Err(KernelError::Limits);
        }
        let len = u8::try_from(name.len()).map_err(|_| KernelError::Limits)?;
        let mut bytes = [0; MODULE_NAME_MAX];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self { bytes, len })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        // Always a whole `&str` copied in `new`.
        core::str::from_utf8(&self.bytes[..usize::from(self.len)]).unwrap_or_default()
    }
}

impl fmt::Debug for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is known about a loaded module.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ModuleInfo {
    pub name: ModuleName,
    /// Name of the loader that accepted the image.
    pub loader: &'static str,
    pub module: LoadedModule,
}

/// A registry entry: module information plus the intrusive link.
///
/// The links are only written by the registry holding the record, under
/// whatever serializes that registry; readers elsewhere see relaxed loads.
pub struct ModuleRecord {
    info: ModuleInfo,
    next: AtomicPtr<ModuleRecord>,
    linked: AtomicBool,
}

impl ModuleRecord {
    /// # Errors
    /// As [`ModuleName::new`].
    pub fn new(name: &str, loader: &'static str, module: LoadedModule) -> Result<Self> {
        Ok(Self {
            info: ModuleInfo {
                name: ModuleName::new(name)?,
                loader,
                module,
            },
            next: AtomicPtr::new(ptr::null_mut()),
            linked: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub const fn info(&self) -> &ModuleInfo {
        &self.info
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.info.name.as_str()
    }

    #[must_use]
    pub const fn loader(&self) -> &'static str {
        self.info.loader
    }

    #[must_use]
    pub const fn module(&self) -> &LoadedModule {
        &self.info.module
    }

    /// Whether the record is currently part of a registry.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Relaxed)
    }

    fn next(&self) -> Option<NonNull<Self>> {
        NonNull::new(self.next.load(Ordering::Relaxed))
    }

    fn set_next(&self, next: Option<NonNull<Self>>) {
        let raw = next.map_or(ptr::null_mut(), NonNull::as_ptr);
        self.next.store(raw, Ordering::Relaxed);
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("info", &self.info)
            .field("linked", &self.is_linked())
            .finish_non_exhaustive()
    }
}

/// Intrusive list of [`ModuleRecord`]s borrowed for `'r`.
pub struct ModuleRegistry<'r> {
    head: Option<NonNull<ModuleRecord>>,
    len: usize,
    _records: core::marker::PhantomData<&'r ModuleRecord>,
}

// SAFETY: the list only holds `&'r ModuleRecord`s, which are Send + Sync.
unsafe impl Send for ModuleRegistry<'_> {}

impl Default for ModuleRegistry<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> ModuleRegistry<'r> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: None,
            len: 0,
            _records: core::marker::PhantomData,
        }
    }

    /// Links `record` at the head.
    ///
    /// # Errors
    /// [`KernelError::BadArgs`] if the record is already linked somewhere or
    /// a module of the same name is registered.
    pub fn add(&mut self, record: &'r ModuleRecord) -> Result<()> {
        if record.is_linked() {
            warn!("registry: {} is already linked", record.name());
            return Err(KernelError::BadArgs);
        }
        if self.contains(record.name()) {
            warn!("registry: duplicate module name {}", record.name());
            return Err(KernelError::BadArgs);
        }
        record.set_next(self.head);
        record.linked.store(true, Ordering::Relaxed);
        self.head = Some(NonNull::from(record));
        self.len += 1;
        debug!("registry: linked {} ({} modules)", record.name(), self.len);
        Ok(())
    }

    /// # Errors
    /// [`KernelError::NoSuch`] if no module is named `name`.
    pub fn find(&self, name: &str) -> Result<&'r ModuleRecord> {
        self.iter()
            .find(|r| r.name() == name)
            .ok_or(KernelError::NoSuch)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_ok()
    }

    /// Unlinks `record`, identified by address.
    ///
    /// # Errors
    /// [`KernelError::NoSuch`] if the record is not in this registry.
    pub fn remove(&mut self, record: &ModuleRecord) -> Result<()> {
        let target = NonNull::from(record);
        let mut prev: Option<&'r ModuleRecord> = None;
        let mut cursor = self.head;
        while let Some(node) = cursor {
            // SAFETY: linked records outlive 'r.
            let node_ref: &'r ModuleRecord = unsafe { node.as_ref() };
            if node == target {
                let next = node_ref.next();
                node_ref.set_next(None);
                match prev {
                    None => self.head = next,
                    Some(prev) => prev.set_next(next),
                }
                node_ref.linked.store(false, Ordering::Relaxed);
                self.len -= 1;
                debug!("registry: unlinked {} ({} modules)", node_ref.name(), self.len);
                return Ok(());
            }
            prev = Some(node_ref);
            cursor = node_ref.next();
        }
        Err(KernelError::NoSuch)
    }

    /// Unlinks the module called `name` and hands its record back.
    ///
    /// # Errors
    /// [`KernelError::NoSuch`] if no module is named `name`.
    pub fn remove_by_name(&mut self, name: &str) -> Result<&'r ModuleRecord> {
        let record = self.find(name)?;
        self.remove(record)?;
        Ok(record)
    }

    /// Most recently added first.
    pub fn iter(&self) -> impl Iterator<Item = &'r ModuleRecord> + '_ {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let node = cursor?;
            // SAFETY: linked records outlive 'r.
            let node: &'r ModuleRecord = unsafe { node.as_ref() };
            cursor = node.next();
            Some(node)
        })
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

static REGISTRY: SpinLock<ModuleRegistry<'static>> = SpinLock::new(ModuleRegistry::new());

/// Runs `f` with the kernel registry locked.
pub fn with_registry<R>(f: impl FnOnce(&mut ModuleRegistry<'static>) -> R) -> R {
    REGISTRY.with_lock(f)
}

pub fn add(record: &'static ModuleRecord) -> Result<()> {
    with_registry(|r| r.add(record))?;
    info!(
        "registry: {} loaded by {} (text {} +{:#x}, data {} +{:#x})",
        record.name(),
        record.loader(),
        record.module().text.start,
        record.module().text.len,
        record.module().data.start,
        record.module().data.len,
    );
    Ok(())
}

/// A snapshot of the named module's information.
pub fn find(name: &str) -> Result<ModuleInfo> {
    with_registry(|r| r.find(name).map(|rec| *rec.info()))
}

pub fn remove(record: &ModuleRecord) -> Result<()> {
    with_registry(|r| r.remove(record))
}

/// Unlinks the named module. The caller regains sole ownership of the record.
pub fn remove_by_name(name: &str) -> Result<&'static ModuleRecord> {
    let record = with_registry(|r| r.remove_by_name(name))?;
    info!("registry: {name} unregistered");
    Ok(record)
}

#[must_use]
pub fn count() -> usize {
    with_registry(|r| r.len())
}
