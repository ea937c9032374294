//! Error types for register map operations

/// Result type for register map operations
pub type Result<T> = std::result::Result<T, RegmapError>;

/// Errors that can occur while driving a register map
#[derive(Debug, thiserror::Error)]
pub enum RegmapError {
    /// Register index outside the device
    #[error("register {reg} outside device bounds (reg_num = {reg_num})")]
    RegisterOutOfBounds { reg: usize, reg_num: usize },

    /// Register width outside [1, 32]
    #[error("invalid register width: {0} (must be in [1, 32])")]
    InvalidRegWidth(u8),

    /// Bulk import source shorter than the register buffer
    #[error("bulk source too short: {got} words, need {need}")]
    BulkSourceTooShort { got: usize, need: usize },

    /// Mask request outside the word
    #[error("invalid mask range: start {start}, len {len} on a {word}-bit word")]
    InvalidMaskRange { start: usize, len: usize, word: usize },

    /// Field descriptor with zero width
    #[error("field {0:?} has zero width")]
    ZeroWidthField(&'static str),

    /// Field descriptor wider than a field value
    #[error("field {name:?} too wide: {width} bits (max 64)")]
    FieldTooWide { name: &'static str, width: u8 },

    /// Field offset at or beyond the register width
    #[error("field {name:?} offset {offs} outside the register")]
    OffsetOutOfRange { name: &'static str, offs: u8 },

    /// Ascending span runs past the last register
    #[error("field {0:?} spans past the last register")]
    AscendingOverflow(&'static str),

    /// Descending span runs below register 0
    #[error("field {0:?} descends below register 0")]
    DescendingUnderflow(&'static str),

    /// Two non-reserved fields share a name
    #[error("duplicate field name {0:?}")]
    DuplicateFieldName(&'static str),

    /// Two fields share register bits
    #[error("field {0:?} overlaps another field")]
    FieldOverlap(&'static str),

    /// Register neither fully covered by fields nor fully free
    #[error("register {reg} partially covered by fields")]
    PartialCoverage { reg: usize },

    /// Transport returned a value with bits above the register width
    #[error("register {reg} read returned bits above the register width: {value:#x}")]
    ReadOverflow { reg: usize, value: u32 },

    /// Value has bits above the destination width
    #[error("value {value:#x} does not fit in {width} bits")]
    ValueOverflow { value: u64, width: u8 },

    /// Name lookup failed in the active map
    #[error("no field named {0:?} in the active map")]
    FieldNotFound(String),

    /// Field operation attempted with no map installed
    #[error("device has no active field map")]
    NoActiveMap,

    /// Lock acquisition refused by the lock implementation
    #[error("lock acquire failed")]
    LockFailed,

    /// Lock release refused by the lock implementation
    #[error("lock release failed")]
    UnlockFailed,

    /// Re-entrance guard tripped on acquire
    #[error("lock already held (lock_count = {0})")]
    AlreadyLocked(u8),

    /// Re-entrance guard tripped on release
    #[error("invalid lock count at release: {0}")]
    InvalidLockCount(u8),

    /// Failure reported by a transport implementation
    #[error("transport error: {0}")]
    Transport(String),

    /// Virtual device with an empty name list
    #[error("virtual field list is empty")]
    EmptyFieldList,

    /// Virtual device with no candidate maps
    #[error("virtual map family is empty")]
    EmptyMapFamily,

    /// Name absent from the virtual name list
    #[error("virtual field {0:?} not found")]
    VirtualFieldNotFound(String),

    /// Virtual name that no candidate map defines
    #[error("virtual field {0:?} is not present in any map")]
    UnmappedField(&'static str),

    /// No candidate map has the field at sufficient width
    #[error("no map can hold value {value:#x} for field {name:?}")]
    NoFittingMap { name: String, value: u64 },
}

impl RegmapError {
    /// Create a transport error from any displayable reason.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegmapError::RegisterOutOfBounds { reg: 7, reg_num: 4 };
        assert_eq!(err.to_string(), "register 7 outside device bounds (reg_num = 4)");

        let err = RegmapError::ValueOverflow { value: 0x1FF, width: 8 };
        assert_eq!(err.to_string(), "value 0x1ff does not fit in 8 bits");
    }

    #[test]
    fn test_transport_helper() {
        let err = RegmapError::transport("bus stuck");
        assert!(matches!(err, RegmapError::Transport(_)));
        assert_eq!(err.to_string(), "transport error: bus stuck");
    }
}
