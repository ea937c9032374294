//! Field codec: packing 64-bit values into register chunks and back
//!
//! A field of width `w` at offset `o` occupies `ceil((o + w) / W)`
//! consecutive registers of width `W`. The portion living in one register is
//! a *chunk*; chunks are indexed from `n = 0` for the least-significant one,
//! which always lives in the field's base register. Ascending layout places
//! chunk `n` in register `reg + n`, descending layout in `reg - n`, so
//! DESCEND only changes which physical registers carry the higher-order
//! chunks. MSR_FIRST independently reverses the order in which chunks are
//! written to the transport.

use tracing::error;

use crate::bits::{fits, mask32, MAX_FIELD_WIDTH};
use crate::error::{RegmapError, Result};
use crate::field::{Field, Flags};
use crate::transport::Transport;

use crate::device::Device;

/// Number of bits of the field that live in the base register.
fn len0(f: &Field, reg_width: u8) -> usize {
    let offs = f.offs as usize;
    (offs + f.width as usize).min(reg_width as usize) - offs
}

/// Mask of the register bits occupied by chunk `n` of a field.
fn chunk_mask(f: &Field, n: usize, reg_width: u8) -> Result<u32> {
    let len0 = len0(f, reg_width);

    let (start, len) = if n == 0 {
        (f.offs as usize, len0)
    } else {
        let len = (f.width as usize - len0 - (n - 1) * reg_width as usize).min(reg_width as usize);
        (0, len)
    };

    mask32(start, len)
}

impl<T: Transport> Device<T> {
    /// Geometry checks shared by the codec and the map checker.
    pub(crate) fn check_field_geometry(&self, f: &Field) -> Result<()> {
        if f.width == 0 {
            error!(field = f.name, "zero-width field not allowed");
            return Err(RegmapError::ZeroWidthField(f.name));
        }

        if f.width as usize > MAX_FIELD_WIDTH {
            error!(field = f.name, width = f.width, "field too wide");
            return Err(RegmapError::FieldTooWide {
                name: f.name,
                width: f.width,
            });
        }

        if f.offs >= self.reg_width() {
            error!(field = f.name, offs = f.offs, "field offset outside the register");
            return Err(RegmapError::OffsetOutOfRange {
                name: f.name,
                offs: f.offs,
            });
        }

        if f.reg >= self.reg_num() {
            error!(field = f.name, reg = f.reg, "register outside the bounds of device");
            return Err(RegmapError::RegisterOutOfBounds {
                reg: f.reg,
                reg_num: self.reg_num(),
            });
        }

        let span = f.span(self.reg_width());

        if self.effective_flags(f).contains(Flags::DESCEND) {
            if f.reg + 1 < span {
                error!(field = f.name, span, "too many descending registers");
                return Err(RegmapError::DescendingUnderflow(f.name));
            }
        } else if f.reg + span > self.reg_num() {
            error!(field = f.name, span, "too many ascending registers");
            return Err(RegmapError::AscendingOverflow(f.name));
        }

        Ok(())
    }

    /// Register index carrying chunk `n` of a field.
    fn chunk_reg(&self, f: &Field, n: usize) -> Result<usize> {
        if self.effective_flags(f).contains(Flags::DESCEND) {
            if f.reg < n {
                error!(field = f.name, n, "descending chunk out of bounds");
                return Err(RegmapError::DescendingUnderflow(f.name));
            }
            Ok(f.reg - n)
        } else {
            Ok(f.reg + n)
        }
    }

    /// Fetch chunk `n` of a field, shifted to its position in the field
    /// value.
    fn get_chunk(&mut self, f: &Field, n: usize) -> Result<u64> {
        let reg = self.chunk_reg(f, n)?;
        let len0 = len0(f, self.reg_width());

        // position of the chunk within the 64-bit field value
        let pos = if n == 0 { 0 } else { len0 + (n - 1) * self.reg_width() as usize };
        if n != 0 && pos >= MAX_FIELD_WIDTH {
            error!(field = f.name, n, "chunk past the end of the field value");
            return Err(RegmapError::FieldTooWide {
                name: f.name,
                width: f.width,
            });
        }

        // volatile fields are re-read from the physical device
        // (unless NOCOMM is in effect for the field or the device)
        let flags = self.effective_flags(f);
        if !flags.contains(Flags::NOCOMM) && flags.contains(Flags::VOLATILE) {
            self.read(reg)?;
        }

        let chunk = u64::from(self.data_word(reg) & chunk_mask(f, n, self.reg_width())?);

        Ok(if n == 0 { chunk >> f.offs } else { chunk << pos })
    }

    /// Apply chunk `n` of `value` to the buffer and the transport.
    fn set_chunk(&mut self, f: &Field, n: usize, value: u64) -> Result<()> {
        let reg = self.chunk_reg(f, n)?;
        let len0 = len0(f, self.reg_width());

        // shift the relevant part of the value down to its register position
        let shifted = if n == 0 {
            value << f.offs
        } else {
            value >> (len0 + (n - 1) * self.reg_width() as usize)
        };

        let mask = chunk_mask(f, n, self.reg_width())?;
        let bits = (shifted & u64::from(mask)) as u32;

        let word = (self.data_word(reg) & !mask) | bits;
        self.set_data_word(reg, word);

        if !self.effective_flags(f).contains(Flags::NOCOMM) {
            if let Err(err) = self.transport_mut().write(reg, word) {
                error!(field = f.name, reg, "error writing to device");
                return Err(err);
            }
        }

        Ok(())
    }

    /// Assemble the value of a field from its chunks.
    pub(crate) fn get_field(&mut self, f: &Field) -> Result<u64> {
        self.check_field_geometry(f)?;

        let mut value = 0;
        for n in 0..f.span(self.reg_width()) {
            value |= self.get_chunk(f, n)?;
        }

        Ok(value)
    }

    /// Split a value into chunks and write them out.
    ///
    /// Chunks are written least-significant register first unless MSR_FIRST
    /// reverses the order. On a transport failure the buffer keeps the
    /// chunks already applied; there is no rollback, so a retry can continue
    /// where the bus gave up.
    pub(crate) fn set_field(&mut self, f: &Field, value: u64) -> Result<()> {
        self.check_field_geometry(f)?;

        if !fits(value, f.width) {
            error!(field = f.name, value, width = f.width, "value too large for field width");
            return Err(RegmapError::ValueOverflow { value, width: f.width });
        }

        let span = f.span(self.reg_width());
        let msr_first = self.effective_flags(f).contains(Flags::MSR_FIRST);

        for n in 0..span {
            let chunk = if msr_first { span - 1 - n } else { n };
            self.set_chunk(f, chunk, value)?;
        }

        Ok(())
    }
}
