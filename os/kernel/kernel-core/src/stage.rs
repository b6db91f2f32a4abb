use core::sync::atomic::{AtomicU8, Ordering};

/// How far kernel bring-up has progressed.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum InitStage {
    /// Nothing is initialized.
    Early = 0,
    /// PMM and heap are online.
    Memory = 1,
    /// Module windows, exports and loaders are online.
    Modules = 2,
}

impl InitStage {
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Early,
            1 => Self::Memory,
            _ => Self::Modules,
        }
    }
}

static STAGE: AtomicU8 = AtomicU8::new(InitStage::Early as u8);

#[must_use]
pub fn stage() -> InitStage {
    InitStage::from_u8(STAGE.load(Ordering::Acquire))
}

pub(crate) fn advance(to: InitStage) {
    STAGE.fetch_max(to as u8, Ordering::AcqRel);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        assert!(InitStage::Early < InitStage::Memory);
        assert!(InitStage::Memory < InitStage::Modules);
        for s in [InitStage::Early, InitStage::Memory, InitStage::Modules] {
            assert_eq!(InitStage::from_u8(s as u8), s);
        }
    }
}
