//! Lifecycle of the kernel-wide module windows, exports, loaders and
//! registry.
//!
//! The singletons are one-shot, so everything runs inside a single test.

use kernel_errors::{KernelError, Result};
use kernel_info::memory::{MODULE_DATA_BASE, MODULE_TEXT_BASE, PAGE_SIZE};
use kernel_modules::{
    ElfModuleLoader, ExportTable, KExport, LoadEnv, LoadedModule, LoaderCaps, ModuleImage,
    ModuleLoader, ModuleRecord, VaRange, dynload, exports, modmem, registry,
};

extern "C" fn kprint() {}

static EXPORTS: [KExport; 1] = [KExport::new("kprint", kprint as *const ())];

/// `FLAT` magic, then the text length as one byte; the rest is data.
struct FlatLoader;

impl ModuleLoader for FlatLoader {
    fn caps(&self) -> LoaderCaps {
        LoaderCaps { name: "flat" }
    }

    fn probe(&self, image: &ModuleImage<'_>) -> bool {
        image.bytes.len() > 5 && image.bytes.starts_with(b"FLAT")
    }

    fn load(&self, image: &ModuleImage<'_>, env: &mut LoadEnv<'_>) -> Result<LoadedModule> {
        env.exports.lookup("kprint")?;
        let text_len = u64::from(image.bytes[4]);
        let data_len = image.bytes.len() as u64 - 5;
        let text = env.memory.allocate_text(text_len)?;
        let data = env.memory.allocate_data(data_len)?;
        Ok(LoadedModule {
            text: VaRange::new(text, text_len),
            data: VaRange::new(data, data_len),
            entry: Some(text),
            imports: 1,
        })
    }
}

static FLAT: FlatLoader = FlatLoader;
static ELF: ElfModuleLoader = ElfModuleLoader;

fn flat(text: u8, data: usize) -> Vec<u8> {
    let mut bytes = b"FLAT".to_vec();
    bytes.push(text);
    bytes.resize(5 + data, 0);
    bytes
}

#[test]
fn modules_lifecycle() {
    let bytes = flat(16, 32);
    let image = ModuleImage::new("serial", &bytes);

    assert_eq!(modmem::allocate_text(1), Err(KernelError::NotInit));
    assert_eq!(modmem::remaining().unwrap_err(), KernelError::NotInit);
    assert_eq!(exports::lookup("kprint"), Err(KernelError::NotInit));
    assert_eq!(dynload::load(&image).unwrap_err(), KernelError::NotInit);

    modmem::init().unwrap();
    assert_eq!(modmem::init(), Err(KernelError::BadArgs));
    exports::init(ExportTable::new(&EXPORTS)).unwrap();
    assert_eq!(exports::init(ExportTable::new(&[])), Err(KernelError::BadArgs));
    assert_eq!(exports::table().unwrap().len(), 1);

    // No loaders yet.
    assert_eq!(dynload::load(&image).unwrap_err(), KernelError::NoSuch);

    dynload::register(&ELF).unwrap();
    dynload::register(&FLAT).unwrap();
    assert_eq!(dynload::register(&FLAT), Err(KernelError::BadArgs));
    assert_eq!(dynload::loader_count(), 2);
    assert_eq!(dynload::select(&image).unwrap().caps().name, "flat");

    let record: &'static ModuleRecord = Box::leak(Box::new(dynload::load(&image).unwrap()));
    assert_eq!(record.loader(), "flat");
    assert_eq!(record.module().text.start.as_u64(), MODULE_TEXT_BASE);
    assert_eq!(record.module().data.start.as_u64(), MODULE_DATA_BASE);
    registry::add(record).unwrap();
    assert_eq!(registry::add(record), Err(KernelError::BadArgs));

    let info = registry::find("serial").unwrap();
    assert_eq!(info.name.as_str(), "serial");
    assert_eq!(info.module.imports, 1);
    assert_eq!(registry::count(), 1);

    let remaining = modmem::remaining().unwrap();
    assert_eq!(remaining.text, modmem::with_module_memory(|m| m.text_window().size()).unwrap() - PAGE_SIZE);

    // Neither loader recognizes a ten byte blob.
    let junk = ModuleImage::new("junk", b"0123456789");
    assert_eq!(dynload::load(&junk).unwrap_err(), KernelError::NoSuch);

    let removed = registry::remove_by_name("serial").unwrap();
    assert!(core::ptr::eq(removed, record));
    assert_eq!(registry::find("serial").unwrap_err(), KernelError::NoSuch);
    assert_eq!(registry::count(), 0);

    // Address space is not handed back on unload.
    let reloaded = dynload::load(&image).unwrap();
    assert_eq!(reloaded.module().text.start.as_u64(), MODULE_TEXT_BASE + PAGE_SIZE);

    dynload::unregister("flat").unwrap();
    assert_eq!(dynload::unregister("flat"), Err(KernelError::NoSuch));
    assert_eq!(dynload::select(&image).err(), Some(KernelError::NoSuch));
}
