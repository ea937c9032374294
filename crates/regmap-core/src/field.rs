//! Field descriptors and behavior flags

use bitflags::bitflags;

use crate::bits::cdiv;

bitflags! {
    /// Per-field and per-device behavior flags.
    ///
    /// Device flags are OR-ed with field flags at the start of every field
    /// operation, so a flag set on the device applies to all of its fields.
    /// Field flags are fixed in the map tables; device flags may be turned on
    /// and off at runtime. Bit values are fixed for configuration stability.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        /// Reserved.
        const READONLY = 1 << 0;
        /// Reserved.
        const WRITEONLY = 1 << 1;
        /// Re-read the underlying registers on every field get.
        const VOLATILE = 1 << 2;
        /// Suppress all transport I/O; operate on the buffer only.
        /// Overrides `VOLATILE`.
        const NOCOMM = 1 << 3;
        /// Reserved.
        const ALIAS = 1 << 4;
        /// Field LSBs live in the highest-indexed register of the span.
        const DESCEND = 1 << 5;
        /// Write the most-significant chunk first.
        const MSR_FIRST = 1 << 6;
        /// Exempt from the virtual-device reset pass.
        const NORESET = 1 << 7;
    }
}

impl Default for Flags {
    fn default() -> Self {
        Flags::empty()
    }
}

/// A named, contiguous bit range within one or more registers.
///
/// `reg` is the index of the register holding the least-significant chunk of
/// the field; `offs` is the bit offset of the field LSB within that register.
/// Depending on its width and offset, a field may span several consecutive
/// registers (up to 64 bits in total).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name. Names starting with `_` mark reserved/padding entries.
    pub name: &'static str,
    /// Register holding the least-significant chunk.
    pub reg: usize,
    /// Bit offset of the field LSB within `reg`.
    pub offs: u8,
    /// Total field width in bits.
    pub width: u8,
    /// Field-level behavior flags.
    pub flags: Flags,
}

impl Field {
    /// Create a new field descriptor.
    pub const fn new(name: &'static str, reg: usize, offs: u8, width: u8, flags: Flags) -> Self {
        Self {
            name,
            reg,
            offs,
            width,
            flags,
        }
    }

    /// Number of registers the field occupies for a given register width.
    pub fn span(&self, reg_width: u8) -> usize {
        cdiv(self.offs as usize + self.width as usize, reg_width as usize)
    }

    /// Reserved (padding) entries start with an underscore. They are exempt
    /// from name uniqueness and invisible to the public name-based API.
    pub fn is_reserved(&self) -> bool {
        self.name.starts_with('_')
    }
}
