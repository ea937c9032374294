//! Device context, raw register I/O, and the name-based field API

use tracing::error;

use crate::bits::{mask32, MAX_REG_WIDTH};
use crate::error::{RegmapError, Result};
use crate::field::{Field, Flags};
use crate::map::FieldMap;
use crate::transport::{DeviceLock, Transport};

/// A physical device whose state is a fixed-width array of registers
/// partitioned into named bitfields.
///
/// The device owns a software image of the hardware registers (the buffer)
/// and a [`Transport`] that moves individual registers to and from the
/// hardware. Field-level operations ([`get`](Self::get), [`set`](Self::set))
/// address the device by field name; the codec takes care of packing,
/// unpacking, and multi-register spanning.
///
/// A freshly built device should be certified once with
/// [`check`](Self::check) before use; the behavior of field operations on a
/// map that does not pass the check is unspecified (though never memory
/// unsafe).
pub struct Device<T: Transport> {
    reg_width: u8,
    full_mask: u32,
    data: Vec<u32>,
    map: Option<FieldMap>,
    transport: T,
    flags: Flags,
    lock: Option<Box<dyn DeviceLock>>,
    lock_count: u8,
}

impl<T: Transport> Device<T> {
    /// Create a device with an installed field map.
    ///
    /// `reg_width` is the hardware register width in bits (1 to 32);
    /// `reg_num` is the number of addressable registers.
    ///
    /// # Errors
    ///
    /// Returns an error when `reg_width` is outside `[1, 32]`.
    pub fn new(reg_width: u8, reg_num: usize, map: FieldMap, transport: T) -> Result<Self> {
        let mut dev = Self::unmapped(reg_width, reg_num, transport)?;
        dev.map = Some(map);
        Ok(dev)
    }

    /// Create a device with no field map installed.
    ///
    /// Used by virtual devices, which install and swap maps at runtime.
    /// Field operations fail with [`RegmapError::NoActiveMap`] until a map
    /// is installed.
    pub fn unmapped(reg_width: u8, reg_num: usize, transport: T) -> Result<Self> {
        if reg_width == 0 || reg_width as usize > MAX_REG_WIDTH {
            error!(reg_width, "invalid register width");
            return Err(RegmapError::InvalidRegWidth(reg_width));
        }

        // reg_width was just validated, so the mask request cannot fail
        let full_mask = mask32(0, reg_width as usize)?;

        Ok(Self {
            reg_width,
            full_mask,
            data: vec![0; reg_num],
            map: None,
            transport,
            flags: Flags::empty(),
            lock: None,
            lock_count: 0,
        })
    }

    /// Attach a lock implementation guarding field-level operations.
    #[must_use]
    pub fn with_lock(mut self, lock: Box<dyn DeviceLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    // ============================================================================================
    // Accessors
    // ============================================================================================

    /// Hardware register width in bits.
    pub fn reg_width(&self) -> u8 {
        self.reg_width
    }

    /// Number of addressable registers.
    pub fn reg_num(&self) -> usize {
        self.data.len()
    }

    /// The software image of the hardware registers.
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// The currently installed field map, if any.
    pub fn map(&self) -> Option<FieldMap> {
        self.map
    }

    /// Install a field map, replacing any previous one.
    pub fn install_map(&mut self, map: FieldMap) {
        self.map = Some(map);
    }

    /// Remove the installed field map.
    pub fn clear_map(&mut self) {
        self.map = None;
    }

    /// Runtime device flags.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Replace the runtime device flags.
    ///
    /// Device flags are OR-ed with field flags for every field operation,
    /// so e.g. setting [`Flags::NOCOMM`] here suppresses transport I/O for
    /// the whole device.
    pub fn set_flags(&mut self, flags: Flags) {
        self.flags = flags;
    }

    /// Shared access to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Exclusive access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub(crate) fn effective_flags(&self, field: &Field) -> Flags {
        self.flags | field.flags
    }

    pub(crate) fn full_mask(&self) -> u32 {
        self.full_mask
    }

    pub(crate) fn data_word(&self, reg: usize) -> u32 {
        self.data[reg]
    }

    pub(crate) fn set_data_word(&mut self, reg: usize, value: u32) {
        self.data[reg] = value;
    }

    pub(crate) fn clear_buffer(&mut self) {
        self.data.fill(0);
    }

    // ============================================================================================
    // Locking
    // ============================================================================================

    pub(crate) fn lock(&mut self) -> Result<()> {
        if let Some(lock) = &self.lock {
            if lock.acquire().is_err() {
                error!("lock acquire failed");
                return Err(RegmapError::LockFailed);
            }
        }

        if self.lock_count != 0 {
            error!(lock_count = self.lock_count, "lock already held");
            return Err(RegmapError::AlreadyLocked(self.lock_count));
        }

        self.lock_count += 1;
        Ok(())
    }

    pub(crate) fn unlock(&mut self) -> Result<()> {
        if let Some(lock) = &self.lock {
            if lock.release().is_err() {
                error!("lock release failed");
                return Err(RegmapError::UnlockFailed);
            }
        }

        if self.lock_count != 1 {
            error!(lock_count = self.lock_count, "invalid lock count");
            return Err(RegmapError::InvalidLockCount(self.lock_count));
        }

        self.lock_count -= 1;
        Ok(())
    }

    // ============================================================================================
    // Raw register I/O
    // ============================================================================================
    //
    // These functions are not meant to be called with literal register
    // numbers, which would duplicate information already present in the
    // field map. They exist for programmatic use, such as writing default
    // values to all registers in a loop. Raw I/O does not take the device
    // lock; atomicity is provided at the field level.

    /// Read a register from the physical device and update the buffer.
    ///
    /// With the device-level [`Flags::NOCOMM`] set, the transport is not
    /// consulted and the buffered value is returned as-is.
    ///
    /// # Errors
    ///
    /// Fails when `reg` is out of bounds, the transport fails, or the
    /// transport returns a value with bits above the register width (the
    /// buffer is left unchanged in the latter cases).
    pub fn read(&mut self, reg: usize) -> Result<u32> {
        if reg >= self.data.len() {
            error!(reg, reg_num = self.data.len(), "register outside device bounds");
            return Err(RegmapError::RegisterOutOfBounds {
                reg,
                reg_num: self.data.len(),
            });
        }

        if !self.flags.contains(Flags::NOCOMM) {
            let value = self.transport.read(reg)?;
            if value & !self.full_mask != 0 {
                error!(reg, value, "read returned bits above the register width");
                return Err(RegmapError::ReadOverflow { reg, value });
            }

            self.data[reg] = value;
        }

        Ok(self.data[reg])
    }

    /// Write a register to the physical device and update the buffer.
    ///
    /// The transport write happens first; the buffer is only updated once it
    /// succeeds. With the device-level [`Flags::NOCOMM`] set, only the
    /// buffer is updated.
    ///
    /// # Errors
    ///
    /// Fails when `reg` is out of bounds, `value` has bits above the
    /// register width, or the transport fails.
    pub fn write(&mut self, reg: usize, value: u32) -> Result<()> {
        if reg >= self.data.len() {
            error!(reg, reg_num = self.data.len(), "register outside device bounds");
            return Err(RegmapError::RegisterOutOfBounds {
                reg,
                reg_num: self.data.len(),
            });
        }

        if value & !self.full_mask != 0 {
            error!(reg, value, "value too large for register width");
            return Err(RegmapError::ValueOverflow {
                value: u64::from(value),
                width: self.reg_width,
            });
        }

        if !self.flags.contains(Flags::NOCOMM) {
            self.transport.write(reg, value)?;
        }

        self.data[reg] = value;
        Ok(())
    }

    /// Bulk import of register data into the buffer.
    ///
    /// With `src` absent the buffer is cleared to zero; otherwise `reg_num`
    /// words are copied from it. The transport is never consulted: after the
    /// import all fields are assumed clean, i.e. up to date with the
    /// physical device. Takes the device lock for the duration.
    ///
    /// # Errors
    ///
    /// Fails when `src` holds fewer than `reg_num` words, or on a lock
    /// failure.
    pub fn bulk(&mut self, src: Option<&[u32]>) -> Result<()> {
        if self.data.is_empty() {
            // no registers to copy
            return Ok(());
        }

        self.lock()?;

        let result = match src {
            None => {
                self.data.fill(0);
                Ok(())
            }
            Some(words) if words.len() < self.data.len() => {
                error!(got = words.len(), need = self.data.len(), "bulk source too short");
                Err(RegmapError::BulkSourceTooShort {
                    got: words.len(),
                    need: self.data.len(),
                })
            }
            Some(words) => {
                let n = self.data.len();
                self.data.copy_from_slice(&words[..n]);
                Ok(())
            }
        };

        let unlocked = self.unlock();
        result.and(unlocked)
    }

    // ============================================================================================
    // Name-based field API
    // ============================================================================================

    fn lookup(&self, name: &str) -> Result<&'static Field> {
        let map = self.map.ok_or(RegmapError::NoActiveMap)?;
        map.find_public(name).ok_or_else(|| {
            error!(field = name, "cannot find field");
            RegmapError::FieldNotFound(name.to_string())
        })
    }

    /// Get the value of a named field from the device buffer.
    ///
    /// Fields carrying [`Flags::VOLATILE`] (on the field or the device) are
    /// re-read from the physical device first, register by register, unless
    /// [`Flags::NOCOMM`] suppresses the transport. Reserved (underscore)
    /// names are not exposed.
    pub fn get(&mut self, name: &str) -> Result<u64> {
        self.lock()?;
        let result = self.lookup(name).and_then(|f| self.get_field(f));
        let unlocked = self.unlock();
        let value = result?;
        unlocked?;
        Ok(value)
    }

    /// Set the value of a named field on the physical device.
    ///
    /// The buffer is updated chunk by chunk and each touched register is
    /// written through the transport (unless [`Flags::NOCOMM`] is in
    /// effect). Reserved (underscore) names are not exposed.
    ///
    /// # Errors
    ///
    /// Fails when the field is unknown, the value does not fit its width,
    /// or the transport fails; in the last case registers written before the
    /// failure stay written (no rollback).
    pub fn set(&mut self, name: &str, value: u64) -> Result<()> {
        self.lock()?;
        let result = self.lookup(name).and_then(|f| self.set_field(f, value));
        let unlocked = self.unlock();
        result.and(unlocked)
    }

    /// Width of a named field, or `None` if the map does not define it.
    ///
    /// Does not lock; also serves as a cheap presence probe.
    pub fn field_width(&self, name: &str) -> Option<u8> {
        let map = self.map?;
        map.find_public(name).map(|f| f.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemTransport, MutexLock};

    static MAP: &[Field] = &[
        Field::new("LO", 0, 0, 8, Flags::empty()),
        Field::new("HI", 0, 8, 8, Flags::empty()),
    ];

    fn device() -> Device<MemTransport> {
        Device::new(16, 4, FieldMap::new(MAP), MemTransport::new(4)).unwrap()
    }

    #[test]
    fn test_rejects_bad_reg_width() {
        assert!(matches!(
            Device::new(0, 4, FieldMap::new(MAP), MemTransport::new(4)),
            Err(RegmapError::InvalidRegWidth(0))
        ));
        assert!(matches!(
            Device::new(33, 4, FieldMap::new(MAP), MemTransport::new(4)),
            Err(RegmapError::InvalidRegWidth(33))
        ));
        assert!(Device::new(1, 4, FieldMap::new(MAP), MemTransport::new(4)).is_ok());
        assert!(Device::new(32, 4, FieldMap::new(MAP), MemTransport::new(4)).is_ok());
    }

    #[test]
    fn test_read_write_round_trip() {
        let mut dev = device();
        dev.write(1, 0xBEEF).unwrap();
        assert_eq!(dev.read(1).unwrap(), 0xBEEF);
        assert_eq!(dev.data()[1], 0xBEEF);
    }

    #[test]
    fn test_read_write_bounds() {
        let mut dev = device();
        assert!(matches!(
            dev.read(4),
            Err(RegmapError::RegisterOutOfBounds { reg: 4, reg_num: 4 })
        ));
        assert!(matches!(
            dev.write(7, 0),
            Err(RegmapError::RegisterOutOfBounds { reg: 7, reg_num: 4 })
        ));
    }

    #[test]
    fn test_write_rejects_wide_values() {
        let mut dev = device();
        assert!(matches!(dev.write(0, 0x1_0000), Err(RegmapError::ValueOverflow { .. })));
        // nothing reached the transport or the buffer
        assert!(dev.transport().writes().is_empty());
        assert_eq!(dev.data()[0], 0);
    }

    #[test]
    fn test_read_rejects_wide_values() {
        let mut dev = device();
        dev.transport_mut().force(2, 0xF_FFFF);
        assert!(matches!(
            dev.read(2),
            Err(RegmapError::ReadOverflow { reg: 2, value: 0xF_FFFF })
        ));
        // buffer keeps its previous content
        assert_eq!(dev.data()[2], 0);
    }

    #[test]
    fn test_nocomm_read_write_skip_transport() {
        let mut dev = device();
        dev.set_flags(Flags::NOCOMM);
        dev.write(0, 0x1234).unwrap();
        assert_eq!(dev.read(0).unwrap(), 0x1234);
        assert!(dev.transport().journal().is_empty());
    }

    #[test]
    fn test_bulk_copy_and_clear() {
        let mut dev = device();
        dev.bulk(Some(&[1, 2, 3, 4])).unwrap();
        assert_eq!(dev.data(), &[1, 2, 3, 4]);
        // no transport traffic
        assert!(dev.transport().journal().is_empty());

        dev.bulk(None).unwrap();
        assert_eq!(dev.data(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_bulk_rejects_short_source() {
        let mut dev = device();
        assert!(matches!(
            dev.bulk(Some(&[1, 2])),
            Err(RegmapError::BulkSourceTooShort { got: 2, need: 4 })
        ));
        // lock released on the failure path
        assert!(dev.bulk(None).is_ok());
    }

    #[test]
    fn test_get_set_release_lock_on_error() {
        let mut dev = device().with_lock(Box::new(MutexLock::new()));
        assert!(matches!(dev.set("NOPE", 1), Err(RegmapError::FieldNotFound(_))));
        assert!(matches!(dev.get("NOPE"), Err(RegmapError::FieldNotFound(_))));
        // the lock is free again
        dev.set("LO", 0xAB).unwrap();
        assert_eq!(dev.get("LO").unwrap(), 0xAB);
    }

    #[test]
    fn test_field_width_probe() {
        let dev = device();
        assert_eq!(dev.field_width("LO"), Some(8));
        assert_eq!(dev.field_width("HI"), Some(8));
        assert_eq!(dev.field_width("NOPE"), None);
    }

    #[test]
    fn test_unmapped_device_has_no_fields() {
        let mut dev = Device::unmapped(16, 4, MemTransport::new(4)).unwrap();
        assert!(matches!(dev.get("LO"), Err(RegmapError::NoActiveMap)));
        assert_eq!(dev.field_width("LO"), None);
        dev.install_map(FieldMap::new(MAP));
        assert_eq!(dev.field_width("LO"), Some(8));
    }
}
