//! Field maps: ordered collections of field descriptors

use crate::field::Field;

/// An ordered set of field descriptors describing one physical configuration
/// of a device.
///
/// Maps are static tables: define the fields once and wrap the slice. Only
/// the fields the application needs have to be listed (even if the underlying
/// device has more), but every register touched by a listed field must be
/// fully covered; registers that appear in no field at all are gaps and are
/// allowed. [`Device::check`](crate::Device::check) proves these rules hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    fields: &'static [Field],
}

impl FieldMap {
    /// Wrap a field table.
    pub const fn new(fields: &'static [Field]) -> Self {
        Self { fields }
    }

    /// The underlying field table.
    pub const fn fields(&self) -> &'static [Field] {
        self.fields
    }

    /// Number of descriptors in the map, reserved entries included.
    pub const fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` when the map has no descriptors.
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Find a field by name. Linear scan; first match wins.
    pub fn find(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Like [`find`](Self::find), but reserved entries are invisible.
    pub fn find_public(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| !f.is_reserved() && f.name == name)
    }

    /// Iterate over all descriptors, reserved entries included.
    pub fn iter(&self) -> core::slice::Iter<'static, Field> {
        self.fields.iter()
    }
}
