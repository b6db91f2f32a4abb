//! # Dynamic loader dispatch
//!
//! A fixed table of format handlers ("loaders"). A module image is offered
//! to each registered loader's [`probe`](ModuleLoader::probe) in
//! registration order and the first one that recognizes it performs the
//! load. Registration order is therefore a tie-break: when two loaders both
//! understand an image, the one registered first wins.
//!
//! A loader's [`load`](ModuleLoader::load) gets a [`LoadEnv`] with the module
//! memory windows and the kernel export table and reports what it placed in
//! a [`LoadedModule`]. Dispatch turns that into a
//! [`ModuleRecord`](crate::registry::ModuleRecord) for the registry.

use crate::exports::{self, ExportTable};
use crate::modmem::{self, ModuleMemory, VaRange};
use crate::registry::{ModuleName, ModuleRecord};
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_errors::{KernelError, Result};
use kernel_info::boot::BootModule;
use kernel_info::limits::MAX_LOADERS;
use kernel_memory_addresses::VirtualAddress;
use kernel_sync::SpinLock;
use log::{debug, info, warn};

/// The bytes of a candidate module and the name it will be registered as.
#[derive(Debug, Copy, Clone)]
pub struct ModuleImage<'a> {
    pub name: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> ModuleImage<'a> {
    #[must_use]
    pub const fn new(name: &'a str, bytes: &'a [u8]) -> Self {
        Self { name, bytes }
    }

    /// Views a boot-loaded blob through `mapper`. The image is named after
    /// the last component of the module's path.
    ///
    /// # Errors
    /// [`KernelError::BadArgs`] for a null address or an empty module,
    /// [`KernelError::Overflow`] if the size does not fit the address space.
    ///
    /// # Safety
    /// The module's frames must be mapped through `mapper`, stay mapped and
    /// unmodified for `'a`, and must not be handed out by the PMM.
    pub unsafe fn from_boot_module(module: &BootModule<'a>, mapper: &impl PhysMapper) -> Result<Self> {
        if module.addr.is_null() || module.size == 0 {
            return Err(KernelError::BadArgs);
        }
        let len = usize::try_from(module.size).map_err(|_| KernelError::Overflow)?;
        let start = mapper.phys_to_virt(module.addr);
        start.checked_add(module.size).ok_or(KernelError::Overflow)?;
        // SAFETY: mapped, immutable and live for 'a per the caller.
        let bytes = unsafe { core::slice::from_raw_parts(start.as_ptr::<u8>().cast_const(), len) };
        Ok(Self::new(module.file_name(), bytes))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Static description of a loader.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LoaderCaps {
    /// Unique name within a loader table.
    pub name: &'static str,
}

/// What a loader hands to the loaded module's environment.
pub struct LoadEnv<'e> {
    pub memory: &'e mut ModuleMemory,
    pub exports: &'e ExportTable<'e>,
}

/// Placement of a loaded module.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct LoadedModule {
    pub text: VaRange,
    pub data: VaRange,
    /// Address of the module's init routine, if it has one.
    pub entry: Option<VirtualAddress>,
    /// Number of kernel symbols the module imports.
    pub imports: usize,
}

/// A module format handler.
pub trait ModuleLoader: Sync {
    fn caps(&self) -> LoaderCaps;

    /// Whether this loader understands `image`. Must not modify any state.
    fn probe(&self, image: &ModuleImage<'_>) -> bool;

    /// Places `image` using the windows and exports in `env`.
    ///
    /// # Errors
    /// Loader specific; VA exhaustion surfaces as [`KernelError::TooMany`].
    fn load(&self, image: &ModuleImage<'_>, env: &mut LoadEnv<'_>) -> Result<LoadedModule>;
}

/// Registered loaders, densely packed in registration order.
pub struct LoaderTable<'l> {
    slots: [Option<&'l dyn ModuleLoader>; MAX_LOADERS],
    len: usize,
}

impl Default for LoaderTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'l> LoaderTable<'l> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [None; MAX_LOADERS],
            len: 0,
        }
    }

    /// Appends `loader` to the probe order.
    ///
    /// # Errors
    /// [`KernelError::BadArgs`] if the table is full, the loader's name is
    /// empty, or a loader with that name is already registered.
    pub fn register(&mut self, loader: &'l dyn ModuleLoader) -> Result<()> {
        let name = loader.caps().name;
        if name.is_empty() {
            return Err(KernelError::BadArgs);
        }
        if self.iter().any(|l| l.caps().name == name) {
            warn!("dynload: loader {name} is already registered");
            return Err(KernelError::BadArgs);
        }
        if self.len == MAX_LOADERS {
            warn!("dynload: loader table full ({MAX_LOADERS}), cannot register {name}");
            return Err(KernelError::BadArgs);
        }
        self.slots[self.len] = Some(loader);
        self.len += 1;
        Ok(())
    }

    /// Removes the named loader; those after it move up one place.
    ///
    /// # Errors
    /// [`KernelError::NoSuch`] if no loader has that name.
    pub fn unregister(&mut self, name: &str) -> Result<&'l dyn ModuleLoader> {
        let index = self
            .iter()
            .position(|l| l.caps().name == name)
            .ok_or(KernelError::NoSuch)?;
        let removed = self.slots[index].take().ok_or(KernelError::NoSuch)?;
        self.slots[index..self.len].rotate_left(1);
        self.len -= 1;
        Ok(removed)
    }

    /// The first loader, in registration order, whose probe accepts `image`.
    ///
    /// # Errors
    /// [`KernelError::NoSuch`] if none does.
    pub fn select(&self, image: &ModuleImage<'_>) -> Result<&'l dyn ModuleLoader> {
        let loader = self
            .iter()
            .find(|l| l.probe(image))
            .ok_or(KernelError::NoSuch)?;
        debug!("dynload: {} selected for {}", loader.caps().name, image.name);
        Ok(loader)
    }

    /// Selects a loader for `image`, runs it and describes the result.
    ///
    /// # Errors
    /// As [`ModuleName::new`] for the image name, [`select`](Self::select)
    /// and the loader's own [`load`](ModuleLoader::load).
    pub fn load(&self, image: &ModuleImage<'_>, env: &mut LoadEnv<'_>) -> Result<ModuleRecord> {
        ModuleName::new(image.name)?;
        let loader = self.select(image)?;
        dispatch(loader, image, env)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'l dyn ModuleLoader> + '_ {
        self.slots[..self.len].iter().flatten().copied()
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

fn dispatch(
    loader: &dyn ModuleLoader,
    image: &ModuleImage<'_>,
    env: &mut LoadEnv<'_>,
) -> Result<ModuleRecord> {
    let caps = loader.caps();
    let loaded = loader.load(image, env).inspect_err(|e| {
        warn!("dynload: {} failed to load {}: {e}", caps.name, image.name);
    })?;
    ModuleRecord::new(image.name, caps.name, loaded)
}

static LOADERS: SpinLock<LoaderTable<'static>> = SpinLock::new(LoaderTable::new());

pub fn register(loader: &'static dyn ModuleLoader) -> Result<()> {
    LOADERS.with_lock(|t| t.register(loader))?;
    info!("dynload: registered loader {}", loader.caps().name);
    Ok(())
}

pub fn unregister(name: &str) -> Result<()> {
    LOADERS.with_lock(|t| t.unregister(name))?;
    info!("dynload: unregistered loader {name}");
    Ok(())
}

pub fn select(image: &ModuleImage<'_>) -> Result<&'static dyn ModuleLoader> {
    LOADERS.with_lock(|t| t.select(image))
}

#[must_use]
pub fn loader_count() -> usize {
    LOADERS.with_lock(|t| t.len())
}

/// Loads `image` with the kernel's loaders, module windows and exports.
///
/// The loader table is unlocked before the chosen loader runs; the module
/// windows stay locked for the whole load.
///
/// # Errors
/// [`KernelError::NotInit`] if the module windows or the export table are
/// not set up, otherwise as [`LoaderTable::load`].
pub fn load(image: &ModuleImage<'_>) -> Result<ModuleRecord> {
    ModuleName::new(image.name)?;
    let exports = exports::table()?;
    let loader = select(image)?;
    modmem::with_module_memory(|memory| dispatch(loader, image, &mut LoadEnv { memory, exports }))?
}
