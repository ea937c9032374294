//! Virtual devices: a large logical name space multiplexed onto one
//! reconfigurable physical device
//!
//! A virtual device remembers every field value it has been given in a
//! 64-bit shadow buffer, and keeps the underlying physical device configured
//! with whichever candidate map can hold the value being written. When a
//! requested field (or value width) is not available in the active map, the
//! device asks its [`MapLoader`] to reconfigure the hardware, then
//! re-materializes the remembered values into the newly loaded map.

use tracing::{debug, error};

use crate::bits::fits;
use crate::device::Device;
use crate::error::{RegmapError, Result};
use crate::field::{Field, Flags};
use crate::map::FieldMap;
use crate::transport::Transport;

/// Reconfigures the physical device to one of the candidate maps.
///
/// `id` is the 0-based index of the target map in the family handed to
/// [`VirtualDevice::new`]. The loader runs before the core switches its
/// active map; it is expected to leave the hardware in its reset state for
/// the new configuration.
///
/// Any `FnMut(usize) -> Result<()>` closure is a loader.
pub trait MapLoader {
    /// Load configuration `id` onto the hardware.
    fn load(&mut self, id: usize) -> Result<()>;
}

impl<F: FnMut(usize) -> Result<()>> MapLoader for F {
    fn load(&mut self, id: usize) -> Result<()> {
        self(id)
    }
}

/// A multi-map multiplexer over a physical [`Device`].
///
/// `names` defines the virtual name space; every value written through
/// [`adjust`](Self::adjust) is remembered in a parallel shadow buffer, so
/// [`obtain`](Self::obtain) answers without consulting the hardware even for
/// fields that the active map no longer carries. Names starting with `_`
/// are purely virtual: they never reach the physical device and may be used
/// as application-defined scratch slots.
pub struct VirtualDevice<T: Transport, L: MapLoader> {
    names: &'static [&'static str],
    values: Vec<u64>,
    maps: &'static [FieldMap],
    loader: L,
    active: Option<usize>,
    base: Device<T>,
}

impl<T: Transport, L: MapLoader> VirtualDevice<T, L> {
    /// Create a virtual device over `base`.
    ///
    /// `base` should be built with [`Device::unmapped`]: the active map is
    /// managed by the virtual device, which installs one lazily on the first
    /// [`adjust`](Self::adjust) of a non-virtual field. Call
    /// [`verify`](Self::verify) once before use.
    pub fn new(names: &'static [&'static str], maps: &'static [FieldMap], base: Device<T>, loader: L) -> Self {
        Self {
            names,
            values: vec![0; names.len()],
            maps,
            loader,
            active: None,
            base,
        }
    }

    /// Shared access to the underlying physical device.
    pub fn base(&self) -> &Device<T> {
        &self.base
    }

    /// Exclusive access to the underlying physical device.
    pub fn base_mut(&mut self) -> &mut Device<T> {
        &mut self.base
    }

    /// Index of the currently active map, if any.
    pub fn active_map(&self) -> Option<usize> {
        self.active
    }

    fn slot(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| *n == name)
    }

    /// Certify the virtual device.
    ///
    /// Runs [`Device::check`] for every candidate map and confirms that each
    /// non-virtual name appears in at least one of them. On success the
    /// active map is cleared, forcing lazy activation of map 0 on the first
    /// adjust.
    ///
    /// # Errors
    ///
    /// Fails when the name list or map family is empty, any map fails its
    /// consistency check, or some name is mapped nowhere.
    pub fn verify(&mut self) -> Result<()> {
        if self.names.is_empty() {
            error!("virtual device has no fields");
            return Err(RegmapError::EmptyFieldList);
        }

        if self.maps.is_empty() {
            error!("virtual device has no base maps");
            return Err(RegmapError::EmptyMapFamily);
        }

        for map in self.maps {
            self.base.install_map(*map);
            self.base.check()?;
        }

        // all fields must be present in at least one map (except virtual-only)
        for &name in self.names {
            if name.starts_with('_') {
                continue;
            }

            if !self.maps.iter().any(|m| m.find(name).is_some()) {
                error!(field = name, "virtual field not mapped");
                return Err(RegmapError::UnmappedField(name));
            }
        }

        // clear the map; it is initialized on the first adjust
        self.base.clear_map();
        self.active = None;

        Ok(())
    }

    /// Get the remembered value of a virtual field.
    ///
    /// Never consults the hardware; [`Flags::VOLATILE`] has no effect here.
    /// After a map reload, fields exempted from the reset pass (NORESET or
    /// purely virtual names) may diverge from what [`Device::get`] reads
    /// until they are adjusted again.
    pub fn obtain(&self, name: &str) -> Result<u64> {
        match self.slot(name) {
            Some(i) => Ok(self.values[i]),
            None => {
                error!(field = name, "virtual field not found");
                Err(RegmapError::VirtualFieldNotFound(name.to_string()))
            }
        }
    }

    /// Set the value of a virtual field, reconfiguring the device if needed.
    ///
    /// The shadow buffer is updated first. Purely virtual names stop there.
    /// For mapped fields, the value is applied through the active map when
    /// it fits; otherwise the first candidate map (in declaration order)
    /// that defines the field wide enough is loaded, the remembered values
    /// are re-materialized into it, and the triggering field is written
    /// last.
    ///
    /// # Errors
    ///
    /// Fails when the name is unknown, no candidate map can hold the value,
    /// the loader fails, or the physical write fails.
    pub fn adjust(&mut self, name: &str, value: u64) -> Result<()> {
        let slot = match self.slot(name) {
            Some(i) => i,
            None => {
                error!(field = name, "virtual field not found");
                return Err(RegmapError::VirtualFieldNotFound(name.to_string()));
            }
        };

        self.values[slot] = value;

        // purely virtual fields end here
        if name.starts_with('_') {
            return Ok(());
        }

        // install the default map, if missing (the first one, id = 0)
        let active = match self.active {
            Some(id) => id,
            None => {
                self.loader.load(0)?;
                self.base.install_map(self.maps[0]);
                self.active = Some(0);
                debug!(map = 0, "installed default device map");
                0
            }
        };

        // the active map serves the write in place when the value fits
        if let Some(f) = self.maps[active].find(name) {
            if fits(value, f.width) {
                return self.base.set_field(f, value);
            }
        }

        // otherwise take the first map with a wide enough definition
        let hit = self
            .maps
            .iter()
            .enumerate()
            .find_map(|(id, m)| m.find(name).filter(|f| fits(value, f.width)).map(|f| (id, f)));

        let (id, f) = match hit {
            Some(hit) => hit,
            None => {
                error!(field = name, value, "field not found in any map, or value too big");
                return Err(RegmapError::NoFittingMap {
                    name: name.to_string(),
                    value,
                });
            }
        };

        self.loader.load(id)?;
        self.base.install_map(self.maps[id]);
        self.active = Some(id);
        debug!(map = id, trigger = name, "reloaded device configuration");

        self.reset_fields(f)?;

        // the triggering field is written last
        self.base.set_field(f, value)
    }

    /// Re-materialize remembered values into the newly loaded map.
    ///
    /// The physical buffer is zeroed without hardware writes first: the load
    /// callback is assumed to have reset the device. The triggering field is
    /// excluded (its write follows the pass), as are NORESET and purely
    /// virtual fields. Values too wide for a field's current definition are
    /// skipped; they stay in the shadow buffer and come back when a wider
    /// map is later selected.
    fn reset_fields(&mut self, trigger: &Field) -> Result<()> {
        self.base.clear_buffer();

        let map = match self.base.map() {
            Some(map) => map,
            None => return Err(RegmapError::NoActiveMap),
        };

        for f in map.iter() {
            if std::ptr::eq(f, trigger) {
                continue;
            }

            if self.base.effective_flags(f).contains(Flags::NORESET) || f.is_reserved() {
                continue;
            }

            // fields absent from the virtual name list materialize as zero
            let value = self.slot(f.name).map(|i| self.values[i]).unwrap_or(0);

            if !fits(value, f.width) {
                continue;
            }

            self.base.set_field(f, value)?;
        }

        Ok(())
    }
}
