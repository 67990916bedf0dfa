//! # nmea-core
//!
//! NMEA 0183 sentence layer and ITU-R M.1371 AIS payload codec, shared by:
//! - `ais-simulator`: building GGA/RMC/AIVDM streams from simulated traffic
//! - test harnesses: parsing the stream back and checking it bit for bit
//!
//! The crate is pure data transformation — no I/O, no async. The pieces:
//! - [`bits`]: bit-vector builder/reader and the 6-bit payload armor
//! - [`ais`]: typed AIS message records with encode/decode per message type
//! - [`fragment`]: AIVDM multi-part splitting with group sequence IDs
//! - [`sentence`]: sentence framing, checksum, GGA/RMC/AIVDM build + parse
//! - [`fields`]: NMEA field formats (ddmm.mmmm, HHMMSS.sss, DDMMYY)

pub mod ais;
pub mod bits;
pub mod error;
pub mod fields;
pub mod fragment;
pub mod sentence;

pub use ais::AisMessage;
pub use bits::{BitBuffer, BitReader};
pub use error::{EncodeError, SentenceError};
pub use fragment::GroupIdAllocator;
pub use sentence::{AivdmSentence, Channel, GgaSentence, RmcSentence, TalkerId};
