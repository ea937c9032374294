//! Map consistency checking
//!
//! A map is proven well-formed by driving it through its own codec: fields
//! are set and read back in patterns that expose overlaps and partially
//! covered registers, without any geometric side model. The whole procedure
//! runs with transport I/O forced off, so real hardware is never touched.

use tracing::{debug, error};

use crate::bits::mask64;
use crate::error::{RegmapError, Result};
use crate::field::Flags;
use crate::map::FieldMap;
use crate::transport::Transport;

use crate::device::Device;

impl<T: Transport> Device<T> {
    /// Check the installed field map for consistency.
    ///
    /// Certifies that every field has valid geometry, that non-reserved
    /// names are unique, that no two fields share a register bit, and that
    /// every register is either fully covered by fields or not at all (gaps
    /// spanning whole registers are allowed).
    ///
    /// The device lock is held across the whole procedure and
    /// [`Flags::NOCOMM`] is forced for its duration, so the checks mutate
    /// only the buffer; the buffer is cleared again before returning. Call
    /// this once for each new or modified map: the behavior of field
    /// operations on a map that never passed the check is unspecified.
    pub fn check(&mut self) -> Result<()> {
        let map = match self.map() {
            Some(map) => map,
            None => {
                error!("no field map installed");
                return Err(RegmapError::NoActiveMap);
            }
        };

        self.lock()?;

        // disable writing to the physical device for the duration
        let saved = self.flags();
        self.set_flags(saved | Flags::NOCOMM);
        self.clear_buffer();

        let result = self.check_map(map);

        self.clear_buffer();
        self.set_flags(saved);

        let unlocked = self.unlock();
        result.and(unlocked)
    }

    fn check_map(&mut self, map: FieldMap) -> Result<()> {
        // phase 1: geometry and name uniqueness
        for (i, f) in map.iter().enumerate() {
            self.check_field_geometry(f)?;

            if f.is_reserved() {
                continue;
            }

            for other in &map.fields()[i + 1..] {
                if other.name == f.name {
                    error!(field = f.name, "detected duplicate field name");
                    return Err(RegmapError::DuplicateFieldName(f.name));
                }
            }
        }

        // phase 2: pairwise overlaps
        for i in 0..map.len() {
            self.check_overlaps(map, i)?;
        }

        self.clear_buffer();

        // phase 3: partial register coverage
        self.check_coverage(map)?;

        debug!(fields = map.len(), "field map certified");
        Ok(())
    }

    /// Check that no field overlaps the one at index `i`.
    ///
    /// Sets the field to all-ones and every other non-reserved field to
    /// zero; if anything shares bits with it, either the read-back or the
    /// subsequent all-zero sweep catches the disturbance.
    fn check_overlaps(&mut self, map: FieldMap, i: usize) -> Result<()> {
        let f = &map.fields()[i];
        let ones = mask64(0, f.width as usize)?;

        self.set_field(f, ones)?;

        for (j, other) in map.iter().enumerate() {
            if j != i && !other.is_reserved() {
                self.set_field(other, 0)?;
            }
        }

        if self.get_field(f)? != ones {
            error!(field = f.name, "cannot read original value back; overlap likely");
            return Err(RegmapError::FieldOverlap(f.name));
        }

        self.set_field(f, 0)?;

        for other in map.iter() {
            if self.get_field(other)? != 0 {
                error!(field = f.name, other = other.name, "registers failed to clear");
                return Err(RegmapError::FieldOverlap(f.name));
            }
        }

        Ok(())
    }

    /// Check that every register is either fully covered by fields or not
    /// covered at all.
    fn check_coverage(&mut self, map: FieldMap) -> Result<()> {
        for f in map.iter() {
            let ones = mask64(0, f.width as usize)?;
            self.set_field(f, ones)?;
        }

        for f in map.iter() {
            let ones = mask64(0, f.width as usize)?;
            if self.get_field(f)? != ones {
                error!(field = f.name, "field does not read back all-ones");
                return Err(RegmapError::FieldOverlap(f.name));
            }
        }

        let full = self.full_mask();
        for reg in 0..self.reg_num() {
            let word = self.data_word(reg);
            if word != 0 && word != full {
                error!(reg, word, "register partially covered by fields");
                return Err(RegmapError::PartialCoverage { reg });
            }
        }

        Ok(())
    }
}
