use thiserror::Error;

/// Failures while packing a typed record into AIS payload bits.
///
/// The simulator reports these and skips the emission; they never abort a
/// running simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("value {value} does not fit in {width} unsigned bits")]
    ValueTooWide { value: u64, width: u32 },

    #[error("value {value} does not fit in {width} signed bits")]
    SignedValueTooWide { value: i64, width: u32 },

    #[error("field width {0} exceeds 64 bits")]
    WidthTooLarge(u32),

    #[error("{field} out of range: {reason}")]
    BadField { field: &'static str, reason: String },
}

impl EncodeError {
    pub fn bad_field(field: &'static str, reason: impl Into<String>) -> Self {
        EncodeError::BadField {
            field,
            reason: reason.into(),
        }
    }
}

/// Failures while parsing inbound NMEA text or de-armoring an AIS payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SentenceError {
    #[error("sentence is missing '$' or '!' framing")]
    Framing,

    #[error("sentence exceeds the 82 character limit")]
    TooLong,

    #[error("sentence is missing the '*' checksum delimiter")]
    MissingChecksum,

    #[error("checksum mismatch: computed {computed:02X}, sentence carries {carried:?}")]
    Checksum { computed: u8, carried: String },

    #[error("unsupported sentence type {0:?}")]
    UnsupportedType(String),

    #[error("field {index} ({name}): {reason}")]
    Field {
        index: usize,
        name: &'static str,
        reason: String,
    },

    #[error("invalid armor character {0:?} in AIS payload")]
    Armor(char),

    #[error("bit stream ended short of the requested field")]
    BitUnderrun,

    #[error("unsupported AIS message type {0}")]
    UnsupportedAisType(u8),
}

impl SentenceError {
    pub fn field(index: usize, name: &'static str, reason: impl Into<String>) -> Self {
        SentenceError::Field {
            index,
            name,
            reason: reason.into(),
        }
    }
}
