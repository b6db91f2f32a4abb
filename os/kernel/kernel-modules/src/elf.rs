//! # ELF relocatable module loader
//!
//! Built-in handler for 64-bit little-endian x86-64 relocatable objects
//! (`ET_REL`, the `.ko` style of module). Loading lays the allocatable
//! sections out into a text block (executable sections) and a data block
//! (everything else with `SHF_ALLOC`, `.bss` included), resolves every
//! undefined global symbol against the kernel export table and then
//! reserves both blocks in the module windows.
//!
//! Imports are resolved before any address space is reserved, so a module
//! with a missing import costs nothing. Copying section bytes and applying
//! relocations is left to the consumer of the reserved ranges.

use crate::dynload::{LoadEnv, LoadedModule, LoaderCaps, ModuleImage, ModuleLoader};
use crate::modmem::VaRange;
use bitfield_struct::bitfield;
use kernel_errors::{KernelError, Result};
use kernel_info::memory::MODULE_ALIGN;
use kernel_memory_addresses::align_up;
use log::{debug, info, warn};

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ElfError {
    #[error("image shorter than an ELF header")]
    TooShort,
    #[error("bad ELF magic")]
    BadMagic,
    #[error("not a 64-bit little-endian object")]
    BadClass,
    #[error("not a relocatable object")]
    BadType,
    #[error("not an x86-64 object")]
    BadMachine,
    #[error("malformed section header table")]
    BadSectionTable,
    #[error("section or symbol outside the image")]
    OutOfBounds,
    #[error("section alignment is not a power of two")]
    BadAlignment,
    #[error("malformed symbol table")]
    BadSymbolTable,
}

impl From<ElfError> for KernelError {
    fn from(_: ElfError) -> Self {
        Self::BadArgs
    }
}

const EHDR_SIZE: usize = 64;
const SHDR_SIZE: usize = 64;
const SYM_SIZE: usize = 24;

const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const EV_CURRENT: u32 = 1;
const ET_REL: u16 = 1;
const EM_X86_64: u16 = 62;

const SHT_SYMTAB: u32 = 2;
const SHT_NOBITS: u32 = 8;

const SHN_UNDEF: u16 = 0;
const SHN_LORESERVE: u16 = 0xff00;

const STB_GLOBAL: u8 = 1;

/// Symbol naming a module's init routine.
pub const MODULE_INIT_SYMBOL: &str = "module_init";

/// `Elf64_Shdr.sh_flags`.
#[bitfield(u64)]
pub struct ShFlags {
    #[bits(1)]
    pub write: bool, // SHF_WRITE = 1
    #[bits(1)]
    pub alloc: bool, // SHF_ALLOC = 2
    #[bits(1)]
    pub execinstr: bool, // SHF_EXECINSTR = 4
    #[bits(61)]
    __: u64,
}

/// `Elf64_Sym.st_info`: type in the low nibble, binding in the high one.
#[bitfield(u8)]
pub struct StInfo {
    #[bits(4)]
    pub typ: u8,
    #[bits(4)]
    pub bind: u8,
}

#[inline]
fn le16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}

#[inline]
fn le32(x: &[u8]) -> u32 {
    u32::from_le_bytes([x[0], x[1], x[2], x[3]])
}

#[inline]
fn le64(x: &[u8]) -> u64 {
    u64::from_le_bytes([x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7]])
}

fn range(bytes: &[u8], offset: u64, len: u64) -> core::result::Result<&[u8], ElfError> {
    let off = usize::try_from(offset).map_err(|_| ElfError::OutOfBounds)?;
    let len = usize::try_from(len).map_err(|_| ElfError::OutOfBounds)?;
    let end = off.checked_add(len).ok_or(ElfError::OutOfBounds)?;
    bytes.get(off..end).ok_or(ElfError::OutOfBounds)
}

#[derive(Copy, Clone, Debug)]
#[allow(clippy::struct_field_names)]
struct Sh64 {
    sh_type: u32,
    sh_flags: ShFlags,
    sh_offset: u64,
    sh_size: u64,
    sh_link: u32,
    sh_addralign: u64,
    sh_entsize: u64,
}

impl Sh64 {
    fn is_alloc(&self) -> bool {
        self.sh_flags.alloc()
    }

    fn is_text(&self) -> bool {
        self.sh_flags.alloc() && self.sh_flags.execinstr()
    }

    const fn align(&self) -> u64 {
        if self.sh_addralign == 0 { 1 } else { self.sh_addralign }
    }
}

#[derive(Copy, Clone, Debug)]
struct Sym64 {
    st_name: u32,
    st_info: StInfo,
    st_shndx: u16,
    st_value: u64,
}

/// Bounds-checked view of a relocatable object.
#[derive(Copy, Clone)]
struct RelView<'a> {
    bytes: &'a [u8],
    shoff: usize,
    shnum: usize,
}

/// Header checks shared by probing and loading.
fn rel_view(bytes: &[u8]) -> core::result::Result<RelView<'_>, ElfError> {
    if bytes.len() < EHDR_SIZE {
        return Err(ElfError::TooShort);
    }
    if &bytes[0..4] != b"\x7FELF" {
        return Err(ElfError::BadMagic);
    }
    if bytes[4] != ELFCLASS64 || bytes[5] != ELFDATA2LSB {
        return Err(ElfError::BadClass);
    }
    if le16(&bytes[16..18]) != ET_REL {
        return Err(ElfError::BadType);
    }
    if le16(&bytes[18..20]) != EM_X86_64 {
        return Err(ElfError::BadMachine);
    }
    if le32(&bytes[20..24]) != EV_CURRENT {
        return Err(ElfError::BadType);
    }

    let shoff = le64(&bytes[40..48]);
    let shentsize = le16(&bytes[58..60]);
    let shnum = le16(&bytes[60..62]);
    if usize::from(shentsize) != SHDR_SIZE || shnum == 0 {
        return Err(ElfError::BadSectionTable);
    }
    range(bytes, shoff, u64::from(shnum) * SHDR_SIZE as u64)?;
    Ok(RelView {
        bytes,
        shoff: usize::try_from(shoff).map_err(|_| ElfError::OutOfBounds)?,
        shnum: usize::from(shnum),
    })
}

impl<'a> RelView<'a> {
    fn section(&self, index: usize) -> core::result::Result<Sh64, ElfError> {
        if index >= self.shnum {
            return Err(ElfError::BadSectionTable);
        }
        let p = self.shoff + index * SHDR_SIZE;
        let s = &self.bytes[p..p + SHDR_SIZE]; // checked in rel_view
        Ok(Sh64 {
            sh_type: le32(&s[4..8]),
            sh_flags: ShFlags::from_bits(le64(&s[8..16])),
            sh_offset: le64(&s[24..32]),
            sh_size: le64(&s[32..40]),
            sh_link: le32(&s[40..44]),
            sh_addralign: le64(&s[48..56]),
            sh_entsize: le64(&s[56..64]),
        })
    }

    fn sections(&self) -> impl Iterator<Item = core::result::Result<Sh64, ElfError>> + '_ {
        (0..self.shnum).map(|i| self.section(i))
    }

    /// Sizes of the text and data blocks, and the offset of section
    /// `upto` (if given) within its block.
    fn layout(&self, upto: Option<usize>) -> core::result::Result<Layout, ElfError> {
        let mut layout = Layout::default();
        for (index, sh) in self.sections().enumerate() {
            let sh = sh?;
            if !sh.is_alloc() {
                continue;
            }
            if !sh.align().is_power_of_two() {
                return Err(ElfError::BadAlignment);
            }
            if sh.sh_type != SHT_NOBITS {
                range(self.bytes, sh.sh_offset, sh.sh_size)?;
            }
            let cursor = if sh.is_text() {
                &mut layout.text
            } else {
                &mut layout.data
            };
            let start = align_up(*cursor, sh.align()).ok_or(ElfError::OutOfBounds)?;
            if upto == Some(index) {
                layout.offset = Some(start);
            }
            *cursor = start.checked_add(sh.sh_size).ok_or(ElfError::OutOfBounds)?;
        }
        Ok(layout)
    }

    fn symbols(&self) -> core::result::Result<Option<Symbols<'a>>, ElfError> {
        let mut symtab = None;
        for sh in self.sections() {
            let sh = sh?;
            if sh.sh_type == SHT_SYMTAB {
                symtab = Some(sh);
                break;
            }
        }
        let Some(symtab) = symtab else {
            return Ok(None);
        };
        if symtab.sh_entsize != SYM_SIZE as u64 || !symtab.sh_size.is_multiple_of(SYM_SIZE as u64) {
            return Err(ElfError::BadSymbolTable);
        }
        let strtab = usize::try_from(symtab.sh_link)
            .ok()
            .filter(|&i| i != 0)
            .ok_or(ElfError::BadSymbolTable)
            .and_then(|i| self.section(i))
            .map_err(|_| ElfError::BadSymbolTable)?;
        Ok(Some(Symbols {
            table: range(self.bytes, symtab.sh_offset, symtab.sh_size)?,
            strings: range(self.bytes, strtab.sh_offset, strtab.sh_size)?,
        }))
    }
}

#[derive(Debug, Default, Copy, Clone)]
struct Layout {
    text: u64,
    data: u64,
    offset: Option<u64>,
}

struct Symbols<'a> {
    table: &'a [u8],
    strings: &'a [u8],
}

impl<'a> Symbols<'a> {
    /// Every symbol but the reserved null entry.
    fn iter(&self) -> impl Iterator<Item = Sym64> + '_ {
        self.table.chunks_exact(SYM_SIZE).skip(1).map(|s| Sym64 {
            st_name: le32(&s[0..4]),
            st_info: StInfo::from_bits(s[4]),
            st_shndx: le16(&s[6..8]),
            st_value: le64(&s[8..16]),
        })
    }

    fn name(&self, sym: &Sym64) -> core::result::Result<&'a [u8], ElfError> {
        let start = usize::try_from(sym.st_name).map_err(|_| ElfError::OutOfBounds)?;
        let tail = self.strings.get(start..).ok_or(ElfError::OutOfBounds)?;
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(ElfError::BadSymbolTable)?;
        Ok(&tail[..len])
    }
}

/// Loader for x86-64 `ET_REL` modules.
#[derive(Debug, Default, Copy, Clone)]
pub struct ElfModuleLoader;

impl ElfModuleLoader {
    pub const NAME: &'static str = "elf";

    /// Resolves the undefined globals of `image`. Weak imports may be
    /// missing. Returns the number of resolved imports.
    fn resolve_imports(
        image: &ModuleImage<'_>,
        symbols: &Symbols<'_>,
        env: &LoadEnv<'_>,
    ) -> Result<usize> {
        let mut resolved = 0;
        for sym in symbols.iter().filter(|s| s.st_shndx == SHN_UNDEF) {
            let name = symbols.name(&sym)?;
            if name.is_empty() {
                continue;
            }
            match (sym.st_info.bind(), env.exports.lookup_bytes(name)) {
                (_, Ok(addr)) => {
                    debug!(
                        "elf: {}: {} -> {addr}",
                        image.name,
                        core::str::from_utf8(name).unwrap_or("?")
                    );
                    resolved += 1;
                }
                (STB_GLOBAL, Err(KernelError::NoSuch)) => {
                    warn!(
                        "elf: {}: unresolved import {}",
                        image.name,
                        core::str::from_utf8(name).unwrap_or("?")
                    );
                    return Err(KernelError::NoSuch);
                }
                // weak and local references may stay unresolved
                (_, Err(KernelError::NoSuch)) => {}
                (_, Err(e)) => return Err(e),
            }
        }
        Ok(resolved)
    }

    /// Section index and value of the module's init symbol, if it is
    /// defined in an executable section.
    fn init_symbol(view: &RelView<'_>, symbols: &Symbols<'_>) -> Result<Option<(usize, u64)>> {
        for sym in symbols.iter() {
            if sym.st_shndx == SHN_UNDEF || sym.st_shndx >= SHN_LORESERVE {
                continue;
            }
            if symbols.name(&sym)? != MODULE_INIT_SYMBOL.as_bytes() {
                continue;
            }
            let index = usize::from(sym.st_shndx);
            if view.section(index).map_err(KernelError::from)?.is_text() {
                return Ok(Some((index, sym.st_value)));
            }
        }
        Ok(None)
    }
}

impl ModuleLoader for ElfModuleLoader {
    fn caps(&self) -> LoaderCaps {
        LoaderCaps { name: Self::NAME }
    }

    fn probe(&self, image: &ModuleImage<'_>) -> bool {
        rel_view(image.bytes).is_ok()
    }

    fn load(&self, image: &ModuleImage<'_>, env: &mut LoadEnv<'_>) -> Result<LoadedModule> {
        let view = rel_view(image.bytes)?;
        let layout = view.layout(None)?;
        let symbols = view.symbols()?;

        let (imports, init) = match &symbols {
            Some(symbols) => (
                Self::resolve_imports(image, symbols, env)?,
                Self::init_symbol(&view, symbols)?,
            ),
            None => (0, None),
        };

        let text_pages = align_up(layout.text, MODULE_ALIGN).ok_or(KernelError::Overflow)?;
        let data_pages = align_up(layout.data, MODULE_ALIGN).ok_or(KernelError::Overflow)?;
        let remaining = env.memory.remaining();
        if text_pages > remaining.text || data_pages > remaining.data {
            warn!(
                "elf: {}: needs {text_pages:#x} text / {data_pages:#x} data bytes, {:#x} / {:#x} left",
                image.name, remaining.text, remaining.data
            );
            return Err(KernelError::TooMany);
        }

        let text = if layout.text == 0 {
            VaRange::EMPTY
        } else {
            VaRange::new(env.memory.allocate_text(layout.text)?, layout.text)
        };
        let data = if layout.data == 0 {
            VaRange::EMPTY
        } else {
            VaRange::new(env.memory.allocate_data(layout.data)?, layout.data)
        };

        let entry = match init {
            Some((index, value)) => {
                let offset = view.layout(Some(index))?.offset.ok_or(KernelError::BadArgs)?;
                let entry = offset
                    .checked_add(value)
                    .and_then(|o| text.start.checked_add(o))
                    .ok_or(KernelError::BadArgs)?;
                text.contains(entry).then_some(entry)
            }
            None => None,
        };

        info!(
            "elf: {} placed: text {} +{:#x}, data {} +{:#x}, {imports} imports",
            image.name, text.start, text.len, data.start, data.len
        );
        Ok(LoadedModule {
            text,
            data,
            entry,
            imports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exports::{ExportTable, KExport};
    use crate::modmem::{ModuleMemory, ModuleWindow};
    use kernel_info::memory::{MODULE_DATA_BASE, MODULE_TEXT_BASE, PAGE_SIZE};
    use kernel_memory_addresses::VirtualAddress;

    const SHT_PROGBITS: u32 = 1;
    const STB_WEAK: u8 = 2;
    const SHT_STRTAB: u32 = 3;
    const TEXT: u64 = 0x2 | 0x4;
    const DATA: u64 = 0x1 | 0x2;

    struct Sec {
        ty: u32,
        flags: u64,
        size: u64,
        align: u64,
    }

    struct Sym {
        name: &'static str,
        bind: u8,
        shndx: u16,
        value: u64,
    }

    const fn sec(ty: u32, flags: u64, size: u64, align: u64) -> Sec {
        Sec { ty, flags, size, align }
    }

    const fn sym(name: &'static str, bind: u8, shndx: u16, value: u64) -> Sym {
        Sym { name, bind, shndx, value }
    }

    fn put16(v: &mut Vec<u8>, x: u16) {
        v.extend_from_slice(&x.to_le_bytes());
    }
    fn put32(v: &mut Vec<u8>, x: u32) {
        v.extend_from_slice(&x.to_le_bytes());
    }
    fn put64(v: &mut Vec<u8>, x: u64) {
        v.extend_from_slice(&x.to_le_bytes());
    }

    #[allow(clippy::too_many_arguments)]
    fn shdr(v: &mut Vec<u8>, ty: u32, flags: u64, off: u64, size: u64, link: u32, align: u64, entsize: u64) {
        put32(v, 0);
        put32(v, ty);
        put64(v, flags);
        put64(v, 0);
        put64(v, off);
        put64(v, size);
        put32(v, link);
        put32(v, 0);
        put64(v, align);
        put64(v, entsize);
    }

    /// Builds an x86-64 `ET_REL` with `secs` at indices 1.., followed by
    /// `.symtab` and `.strtab`.
    fn build(secs: &[Sec], syms: &[Sym]) -> Vec<u8> {
        let mut out = vec![0_u8; EHDR_SIZE];
        let mut offsets = Vec::new();
        for s in secs {
            offsets.push(out.len() as u64);
            if s.ty != SHT_NOBITS {
                out.resize(out.len() + s.size as usize, 0xcc);
            }
        }

        let mut strtab = vec![0_u8];
        let mut symtab = vec![0_u8; SYM_SIZE];
        for s in syms {
            put32(&mut symtab, strtab.len() as u32);
            strtab.extend_from_slice(s.name.as_bytes());
            strtab.push(0);
            symtab.push(StInfo::new().with_bind(s.bind).with_typ(2).into_bits());
            symtab.push(0);
            put16(&mut symtab, s.shndx);
            put64(&mut symtab, s.value);
            put64(&mut symtab, 0);
        }
        let symtab_off = out.len() as u64;
        out.extend_from_slice(&symtab);
        let strtab_off = out.len() as u64;
        out.extend_from_slice(&strtab);
        while out.len() % 8 != 0 {
            out.push(0);
        }

        let shoff = out.len() as u64;
        let strtab_index = secs.len() as u32 + 2;
        shdr(&mut out, 0, 0, 0, 0, 0, 0, 0);
        for (s, off) in secs.iter().zip(&offsets) {
            shdr(&mut out, s.ty, s.flags, *off, s.size, 0, s.align, 0);
        }
        shdr(&mut out, SHT_SYMTAB, 0, symtab_off, symtab.len() as u64, strtab_index, 8, SYM_SIZE as u64);
        shdr(&mut out, SHT_STRTAB, 0, strtab_off, strtab.len() as u64, 0, 1, 0);

        let mut eh = Vec::with_capacity(EHDR_SIZE);
        eh.extend_from_slice(b"\x7FELF");
        eh.extend_from_slice(&[ELFCLASS64, ELFDATA2LSB, 1, 0]);
        eh.extend_from_slice(&[0; 8]);
        put16(&mut eh, ET_REL);
        put16(&mut eh, EM_X86_64);
        put32(&mut eh, EV_CURRENT);
        put64(&mut eh, 0); // e_entry
        put64(&mut eh, 0); // e_phoff
        put64(&mut eh, shoff);
        put32(&mut eh, 0); // e_flags
        put16(&mut eh, EHDR_SIZE as u16);
        put16(&mut eh, 0); // e_phentsize
        put16(&mut eh, 0); // e_phnum
        put16(&mut eh, SHDR_SIZE as u16);
        put16(&mut eh, secs.len() as u16 + 3);
        put16(&mut eh, 0); // e_shstrndx
        out[..EHDR_SIZE].copy_from_slice(&eh);
        out
    }

    extern "C" fn kprint() {}
    extern "C" fn kmalloc() {}

    static EXPORTS: [KExport; 2] = [
        KExport::new("kprint", kprint as *const ()),
        KExport::new("kmalloc", kmalloc as *const ()),
    ];

    /// `.text`, `.text.init`, `.data`, `.bss`.
    fn sample(imports: &[Sym]) -> Vec<u8> {
        let secs = [
            sec(SHT_PROGBITS, TEXT, 0x30, 16),
            sec(SHT_PROGBITS, TEXT, 0x10, 16),
            sec(SHT_PROGBITS, DATA, 0x10, 8),
            sec(SHT_NOBITS, DATA, 0x2000, 32),
        ];
        let mut syms = vec![
            sym("helper", STB_GLOBAL, 1, 0x8),
            sym(MODULE_INIT_SYMBOL, STB_GLOBAL, 2, 0x4),
        ];
        syms.extend(imports.iter().map(|s| sym(s.name, s.bind, s.shndx, s.value)));
        build(&secs, &syms)
    }

    fn load(bytes: &[u8], memory: &mut ModuleMemory) -> Result<LoadedModule> {
        let exports = ExportTable::new(&EXPORTS);
        let mut env = LoadEnv {
            memory,
            exports: &exports,
        };
        ElfModuleLoader.load(&ModuleImage::new("sample.ko", bytes), &mut env)
    }

    #[test]
    fn probe_accepts_only_x86_64_relocatables() {
        let image = sample(&[]);
        let elf = ElfModuleLoader;
        assert!(elf.probe(&ModuleImage::new("m", &image)));
        assert!(!elf.probe(&ModuleImage::new("m", &[0x7f; 10])));
        assert!(!elf.probe(&ModuleImage::new("m", &image[..40])));

        let mut exec = image.clone();
        exec[16] = 2;
        assert!(!elf.probe(&ModuleImage::new("m", &exec)));

        let mut arm = image.clone();
        arm[18] = 183;
        assert!(!elf.probe(&ModuleImage::new("m", &arm)));

        let mut class32 = image.clone();
        class32[4] = 1;
        assert!(!elf.probe(&ModuleImage::new("m", &class32)));

        let mut big_endian = image;
        big_endian[5] = 2;
        assert!(!elf.probe(&ModuleImage::new("m", &big_endian)));
    }

    #[test]
    fn sections_are_laid_out_and_imports_resolved() {
        let image = sample(&[
            sym("kprint", STB_GLOBAL, 0, 0),
            sym("kmalloc", STB_GLOBAL, 0, 0),
            sym("optional_hook", STB_WEAK, 0, 0),
        ]);
        let mut memory = ModuleMemory::kernel_default();
        let module = load(&image, &mut memory).unwrap();

        assert_eq!(module.text, VaRange::new(VirtualAddress::new(MODULE_TEXT_BASE), 0x40));
        // .data at 0, .bss aligned up to 0x20
        assert_eq!(module.data, VaRange::new(VirtualAddress::new(MODULE_DATA_BASE), 0x2020));
        assert_eq!(module.entry, Some(VirtualAddress::new(MODULE_TEXT_BASE + 0x34)));
        assert_eq!(module.imports, 2);
        assert_eq!(memory.text_window().used(), PAGE_SIZE);
        assert_eq!(memory.data_window().used(), 3 * PAGE_SIZE);

        let again = load(&image, &mut memory).unwrap();
        assert_eq!(again.text.start.as_u64(), MODULE_TEXT_BASE + PAGE_SIZE);
    }

    #[test]
    fn unresolved_import_reserves_nothing() {
        let image = sample(&[sym("kprint", STB_GLOBAL, 0, 0), sym("kfree", STB_GLOBAL, 0, 0)]);
        let mut memory = ModuleMemory::kernel_default();
        assert_eq!(load(&image, &mut memory).unwrap_err(), KernelError::NoSuch);
        assert_eq!(memory.text_window().used(), 0);
        assert_eq!(memory.data_window().used(), 0);
    }

    #[test]
    fn module_without_init_has_no_entry() {
        let image = build(&[sec(SHT_PROGBITS, TEXT, 0x10, 16)], &[sym("helper", STB_GLOBAL, 1, 0)]);
        let mut memory = ModuleMemory::kernel_default();
        let module = load(&image, &mut memory).unwrap();
        assert_eq!(module.entry, None);
        assert!(module.data.is_empty());
        assert_eq!(memory.data_window().used(), 0);
    }

    #[test]
    fn exhausted_window_fails_before_reserving() {
        let text = ModuleWindow::new(MODULE_TEXT_BASE, PAGE_SIZE).unwrap();
        let data = ModuleWindow::new(MODULE_DATA_BASE, PAGE_SIZE).unwrap();
        let mut memory = ModuleMemory::new(text, data).unwrap();
        let image = sample(&[]);
        assert_eq!(load(&image, &mut memory).unwrap_err(), KernelError::TooMany);
        assert_eq!(memory.text_window().used(), 0);
    }

    #[test]
    fn malformed_images_are_bad_args() {
        let mut memory = ModuleMemory::kernel_default();
        let image = sample(&[]);

        let truncated = &image[..image.len() - 8];
        assert_eq!(load(truncated, &mut memory).unwrap_err(), KernelError::BadArgs);

        let odd_align = build(&[sec(SHT_PROGBITS, TEXT, 0x10, 12)], &[]);
        assert_eq!(load(&odd_align, &mut memory).unwrap_err(), KernelError::BadArgs);

        let oversized = build(&[sec(SHT_PROGBITS, DATA, 0x10, 8)], &[]);
        let mut broken = oversized.clone();
        let shoff = le64(&oversized[40..48]) as usize;
        // section 1 sh_size
        broken[shoff + SHDR_SIZE + 32..shoff + SHDR_SIZE + 40].copy_from_slice(&u64::MAX.to_le_bytes());
        assert_eq!(load(&broken, &mut memory).unwrap_err(), KernelError::BadArgs);

        assert_eq!(memory.text_window().used(), 0);
        assert_eq!(memory.data_window().used(), 0);
    }

    #[test]
    fn bit_views_match_elf_encoding() {
        let flags = ShFlags::from_bits(TEXT);
        assert!(flags.alloc() && flags.execinstr() && !flags.write());
        let info = StInfo::from_bits(0x12);
        assert_eq!((info.bind(), info.typ()), (STB_GLOBAL, 2));
    }
}
