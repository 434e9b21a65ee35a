//! Cell datatypes and the closed set of physical element types
//!
//! Every attribute and dimension carries a [`Datatype`] tag. The tag maps
//! onto a small set of physical element representations (1/2/4/8-byte
//! integers and 4/8-byte floats); raw cell bytes are always little-endian
//! sequences of those elements. [`PhysicalType`] is the closed set of Rust
//! primitives a caller can move across the boundary, and [`Scalar`] is the
//! tagged decoded form used for comparisons and domain arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Cell datatype tag
///
/// The discriminant table is stable and part of the wire contract;
/// conversion from a raw `u32` is total over `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Datatype {
    /// 32-bit signed integer
    Int32 = 0,
    /// 64-bit signed integer
    Int64 = 1,
    /// 32-bit float
    Float32 = 2,
    /// 64-bit float
    Float64 = 3,
    /// Signed character
    Char = 4,
    /// 8-bit signed integer
    Int8 = 5,
    /// 8-bit unsigned integer
    UInt8 = 6,
    /// 16-bit signed integer
    Int16 = 7,
    /// 16-bit unsigned integer
    UInt16 = 8,
    /// 32-bit unsigned integer
    UInt32 = 9,
    /// 64-bit unsigned integer
    UInt64 = 10,
    /// ASCII string
    StringAscii = 11,
    /// UTF-8 string
    StringUtf8 = 12,
    /// UTF-16 string
    StringUtf16 = 13,
    /// UTF-32 string
    StringUtf32 = 14,
    /// UCS-2 string
    StringUcs2 = 15,
    /// UCS-4 string
    StringUcs4 = 16,
    /// Untyped cells
    Any = 17,
    /// Datetime with year resolution, elapsed since the Unix epoch
    DateTimeYear = 18,
    /// Datetime with month resolution
    DateTimeMonth = 19,
    /// Datetime with week resolution
    DateTimeWeek = 20,
    /// Datetime with day resolution
    DateTimeDay = 21,
    /// Datetime with hour resolution
    DateTimeHour = 22,
    /// Datetime with minute resolution
    DateTimeMinute = 23,
    /// Datetime with second resolution
    DateTimeSecond = 24,
    /// Datetime with millisecond resolution
    DateTimeMillisecond = 25,
    /// Datetime with microsecond resolution
    DateTimeMicrosecond = 26,
    /// Datetime with nanosecond resolution
    DateTimeNanosecond = 27,
    /// Datetime with picosecond resolution
    DateTimePicosecond = 28,
    /// Datetime with femtosecond resolution
    DateTimeFemtosecond = 29,
    /// Datetime with attosecond resolution
    DateTimeAttosecond = 30,
    /// Time of day with hour resolution
    TimeHour = 31,
    /// Time of day with minute resolution
    TimeMinute = 32,
    /// Time of day with second resolution
    TimeSecond = 33,
    /// Time of day with millisecond resolution
    TimeMillisecond = 34,
    /// Time of day with microsecond resolution
    TimeMicrosecond = 35,
    /// Time of day with nanosecond resolution
    TimeNanosecond = 36,
    /// Time of day with picosecond resolution
    TimePicosecond = 37,
    /// Time of day with femtosecond resolution
    TimeFemtosecond = 38,
    /// Time of day with attosecond resolution
    TimeAttosecond = 39,
    /// Opaque bytes
    Blob = 40,
    /// Boolean stored as one byte
    Boolean = 41,
    /// Geometry in well-known binary
    GeometryWkb = 42,
    /// Geometry in well-known text
    GeometryWkt = 43,
}

/// All datatype variants in discriminant order
pub const DATATYPES: [Datatype; 44] = [
    Datatype::Int32,
    Datatype::Int64,
    Datatype::Float32,
    Datatype::Float64,
    Datatype::Char,
    Datatype::Int8,
    Datatype::UInt8,
    Datatype::Int16,
    Datatype::UInt16,
    Datatype::UInt32,
    Datatype::UInt64,
    Datatype::StringAscii,
    Datatype::StringUtf8,
    Datatype::StringUtf16,
    Datatype::StringUtf32,
    Datatype::StringUcs2,
    Datatype::StringUcs4,
    Datatype::Any,
    Datatype::DateTimeYear,
    Datatype::DateTimeMonth,
    Datatype::DateTimeWeek,
    Datatype::DateTimeDay,
    Datatype::DateTimeHour,
    Datatype::DateTimeMinute,
    Datatype::DateTimeSecond,
    Datatype::DateTimeMillisecond,
    Datatype::DateTimeMicrosecond,
    Datatype::DateTimeNanosecond,
    Datatype::DateTimePicosecond,
    Datatype::DateTimeFemtosecond,
    Datatype::DateTimeAttosecond,
    Datatype::TimeHour,
    Datatype::TimeMinute,
    Datatype::TimeSecond,
    Datatype::TimeMillisecond,
    Datatype::TimeMicrosecond,
    Datatype::TimeNanosecond,
    Datatype::TimePicosecond,
    Datatype::TimeFemtosecond,
    Datatype::TimeAttosecond,
    Datatype::Blob,
    Datatype::Boolean,
    Datatype::GeometryWkb,
    Datatype::GeometryWkt,
];

/// Physical element class behind a datatype tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalClass {
    /// Signed integer of the datatype's size
    SignedInt,
    /// Unsigned integer of the datatype's size
    UnsignedInt,
    /// IEEE float of the datatype's size
    Float,
}

impl Datatype {
    /// Element size in bytes
    pub fn size(&self) -> u64 {
        match self {
            Datatype::Char
            | Datatype::Int8
            | Datatype::UInt8
            | Datatype::StringAscii
            | Datatype::StringUtf8
            | Datatype::Any
            | Datatype::Blob
            | Datatype::Boolean
            | Datatype::GeometryWkb
            | Datatype::GeometryWkt => 1,
            Datatype::Int16 | Datatype::UInt16 | Datatype::StringUtf16 | Datatype::StringUcs2 => 2,
            Datatype::Int32
            | Datatype::UInt32
            | Datatype::Float32
            | Datatype::StringUtf32
            | Datatype::StringUcs4 => 4,
            _ => 8,
        }
    }

    /// Physical element class for raw byte decoding
    pub fn physical_class(&self) -> PhysicalClass {
        match self {
            Datatype::Float32 | Datatype::Float64 => PhysicalClass::Float,
            Datatype::Char | Datatype::Int8 | Datatype::Int16 | Datatype::Int32 => {
                PhysicalClass::SignedInt
            }
            Datatype::Int64 => PhysicalClass::SignedInt,
            d if d.is_datetime() || d.is_time() => PhysicalClass::SignedInt,
            _ => PhysicalClass::UnsignedInt,
        }
    }

    /// True for the signed/unsigned integer datatypes (not datetime/time)
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Datatype::Int8
                | Datatype::UInt8
                | Datatype::Int16
                | Datatype::UInt16
                | Datatype::Int32
                | Datatype::UInt32
                | Datatype::Int64
                | Datatype::UInt64
        )
    }

    /// True for the float datatypes
    pub fn is_real(&self) -> bool {
        matches!(self, Datatype::Float32 | Datatype::Float64)
    }

    /// True for every string datatype
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            Datatype::StringAscii
                | Datatype::StringUtf8
                | Datatype::StringUtf16
                | Datatype::StringUtf32
                | Datatype::StringUcs2
                | Datatype::StringUcs4
        )
    }

    /// True for the datetime family
    pub fn is_datetime(&self) -> bool {
        (Datatype::DateTimeYear as u32..=Datatype::DateTimeAttosecond as u32)
            .contains(&(*self as u32))
    }

    /// True for the time-of-day family
    pub fn is_time(&self) -> bool {
        (Datatype::TimeHour as u32..=Datatype::TimeAttosecond as u32).contains(&(*self as u32))
    }

    /// True for datatypes allowed on a dimension
    ///
    /// Dimensions admit the integral, datetime and time families, plus
    /// ASCII strings for variable-length sparse dimensions.
    pub fn is_allowed_on_dimension(&self) -> bool {
        self.is_integral()
            || self.is_datetime()
            || self.is_time()
            || self.is_real()
            || *self == Datatype::StringAscii
    }

    /// Fallible conversion from the raw discriminant
    pub fn from_u32(raw: u32) -> Option<Datatype> {
        DATATYPES.get(raw as usize).copied()
    }

    /// Canonical upper-case name, e.g. `STRING_ASCII`
    pub fn name(&self) -> &'static str {
        match self {
            Datatype::Int32 => "INT32",
            Datatype::Int64 => "INT64",
            Datatype::Float32 => "FLOAT32",
            Datatype::Float64 => "FLOAT64",
            Datatype::Char => "CHAR",
            Datatype::Int8 => "INT8",
            Datatype::UInt8 => "UINT8",
            Datatype::Int16 => "INT16",
            Datatype::UInt16 => "UINT16",
            Datatype::UInt32 => "UINT32",
            Datatype::UInt64 => "UINT64",
            Datatype::StringAscii => "STRING_ASCII",
            Datatype::StringUtf8 => "STRING_UTF8",
            Datatype::StringUtf16 => "STRING_UTF16",
            Datatype::StringUtf32 => "STRING_UTF32",
            Datatype::StringUcs2 => "STRING_UCS2",
            Datatype::StringUcs4 => "STRING_UCS4",
            Datatype::Any => "ANY",
            Datatype::DateTimeYear => "DATETIME_YEAR",
            Datatype::DateTimeMonth => "DATETIME_MONTH",
            Datatype::DateTimeWeek => "DATETIME_WEEK",
            Datatype::DateTimeDay => "DATETIME_DAY",
            Datatype::DateTimeHour => "DATETIME_HR",
            Datatype::DateTimeMinute => "DATETIME_MIN",
            Datatype::DateTimeSecond => "DATETIME_SEC",
            Datatype::DateTimeMillisecond => "DATETIME_MS",
            Datatype::DateTimeMicrosecond => "DATETIME_US",
            Datatype::DateTimeNanosecond => "DATETIME_NS",
            Datatype::DateTimePicosecond => "DATETIME_PS",
            Datatype::DateTimeFemtosecond => "DATETIME_FS",
            Datatype::DateTimeAttosecond => "DATETIME_AS",
            Datatype::TimeHour => "TIME_HR",
            Datatype::TimeMinute => "TIME_MIN",
            Datatype::TimeSecond => "TIME_SEC",
            Datatype::TimeMillisecond => "TIME_MS",
            Datatype::TimeMicrosecond => "TIME_US",
            Datatype::TimeNanosecond => "TIME_NS",
            Datatype::TimePicosecond => "TIME_PS",
            Datatype::TimeFemtosecond => "TIME_FS",
            Datatype::TimeAttosecond => "TIME_AS",
            Datatype::Blob => "BLOB",
            Datatype::Boolean => "BOOL",
            Datatype::GeometryWkb => "GEOM_WKB",
            Datatype::GeometryWkt => "GEOM_WKT",
        }
    }
}

impl From<Datatype> for u32 {
    fn from(dt: Datatype) -> u32 {
        dt as u32
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Datatype {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DATATYPES
            .iter()
            .find(|dt| dt.name() == s)
            .copied()
            .ok_or_else(|| Error::InvalidParameter(format!("unknown datatype '{s}'")))
    }
}

mod sealed {
    pub trait Sealed {}
}

/// The closed set of primitive element kinds that cross the boundary
///
/// Buffers, fill values and domain bounds are generic over this set; a
/// tagged [`Datatype`] travels alongside the raw bytes and the byte length
/// is validated against the element size for that kind. This replaces
/// per-datatype method families with a single generic operation.
pub trait PhysicalType:
    sealed::Sealed + Copy + Send + Sync + PartialEq + PartialOrd + fmt::Debug + 'static
{
    /// Canonical datatype for this primitive
    const DATATYPE: Datatype;

    /// Element size in bytes
    const SIZE: usize;

    /// Append this element's little-endian bytes
    fn write_le_bytes(&self, out: &mut Vec<u8>);

    /// Decode one element from little-endian bytes
    ///
    /// `bytes` must hold exactly `SIZE` bytes.
    fn from_le_bytes(bytes: &[u8]) -> Self;

    /// True when raw bytes tagged `datatype` may be viewed as this kind
    ///
    /// Same size, same physical class.
    fn is_compatible(datatype: Datatype) -> bool {
        datatype.size() as usize == Self::SIZE
            && datatype.physical_class() == Self::DATATYPE.physical_class()
    }
}

macro_rules! physical_type {
    ($ty:ty, $dt:expr, $size:expr) => {
        impl sealed::Sealed for $ty {}

        impl PhysicalType for $ty {
            const DATATYPE: Datatype = $dt;
            const SIZE: usize = $size;

            fn write_le_bytes(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn from_le_bytes(bytes: &[u8]) -> Self {
                let mut buf = [0u8; $size];
                buf.copy_from_slice(bytes);
                <$ty>::from_le_bytes(buf)
            }
        }
    };
}

physical_type!(i8, Datatype::Int8, 1);
physical_type!(u8, Datatype::UInt8, 1);
physical_type!(i16, Datatype::Int16, 2);
physical_type!(u16, Datatype::UInt16, 2);
physical_type!(i32, Datatype::Int32, 4);
physical_type!(u32, Datatype::UInt32, 4);
physical_type!(i64, Datatype::Int64, 8);
physical_type!(u64, Datatype::UInt64, 8);
physical_type!(f32, Datatype::Float32, 4);
physical_type!(f64, Datatype::Float64, 8);

/// Encode a slice of physical elements as little-endian bytes
pub fn to_le_bytes<T: PhysicalType>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::SIZE);
    for v in values {
        v.write_le_bytes(&mut out);
    }
    out
}

/// A single decoded element value
///
/// Used for range comparisons, domain arithmetic and condition
/// evaluation, where byte buffers need an ordered interpretation.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum Scalar {
    /// Signed integer, widened
    Int(i64),
    /// Unsigned integer, widened
    UInt(u64),
    /// Float, widened
    Float(f64),
}

impl Scalar {
    /// Decode one element of `datatype` from little-endian bytes
    ///
    /// Fails with [`Error::TypeMismatch`] when the byte length does not
    /// equal the datatype's element size.
    pub fn from_le_bytes(datatype: Datatype, bytes: &[u8]) -> Result<Scalar> {
        let size = datatype.size() as usize;
        if bytes.len() != size {
            return Err(Error::type_mismatch(
                datatype.name(),
                format!("{size} bytes"),
                format!("{} bytes", bytes.len()),
            ));
        }
        let mut wide = [0u8; 8];
        wide[..size].copy_from_slice(bytes);
        Ok(match datatype.physical_class() {
            PhysicalClass::Float => {
                if size == 4 {
                    Scalar::Float(f32::from_le_bytes(wide[..4].try_into().unwrap()) as f64)
                } else {
                    Scalar::Float(f64::from_le_bytes(wide))
                }
            }
            PhysicalClass::UnsignedInt => Scalar::UInt(u64::from_le_bytes(wide)),
            PhysicalClass::SignedInt => {
                // Sign-extend from the element size.
                let raw = u64::from_le_bytes(wide);
                let shift = (8 - size) * 8;
                Scalar::Int(((raw << shift) as i64) >> shift)
            }
        })
    }

    /// Widened signed value, for dense domain index arithmetic
    ///
    /// Floats are not addressable coordinates and return `None`.
    pub fn as_index(&self) -> Option<i128> {
        match self {
            Scalar::Int(v) => Some(*v as i128),
            Scalar::UInt(v) => Some(*v as i128),
            Scalar::Float(_) => None,
        }
    }

    /// Total-enough ordering for same-class scalars
    pub fn cmp_same_class(&self, other: &Scalar) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::UInt(a), Scalar::UInt(b)) => a.cmp(b),
            (Scalar::Float(a), Scalar::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            // Mixed classes only arise from caller error; order by class tag.
            (Scalar::Int(_), _) => Ordering::Less,
            (_, Scalar::Int(_)) => Ordering::Greater,
            (Scalar::UInt(_), _) => Ordering::Less,
            (_, Scalar::UInt(_)) => Ordering::Greater,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_discriminant_table_roundtrip() {
        for dt in DATATYPES {
            assert_eq!(Datatype::from_u32(dt as u32), Some(dt));
        }
        assert_eq!(Datatype::from_u32(44), None);
        assert_eq!(Datatype::from_u32(u32::MAX), None);
    }

    #[test]
    fn test_name_roundtrip() {
        for dt in DATATYPES {
            assert_eq!(dt.name().parse::<Datatype>().unwrap(), dt);
        }
        assert!("INT33".parse::<Datatype>().is_err());
    }

    #[test]
    fn test_sizes() {
        assert_eq!(Datatype::Int8.size(), 1);
        assert_eq!(Datatype::StringAscii.size(), 1);
        assert_eq!(Datatype::StringUcs2.size(), 2);
        assert_eq!(Datatype::Float32.size(), 4);
        assert_eq!(Datatype::DateTimeDay.size(), 8);
        assert_eq!(Datatype::TimeAttosecond.size(), 8);
        assert_eq!(Datatype::UInt64.size(), 8);
    }

    #[test]
    fn test_families() {
        assert!(Datatype::Int32.is_integral());
        assert!(!Datatype::Float32.is_integral());
        assert!(Datatype::DateTimeMillisecond.is_datetime());
        assert!(!Datatype::TimeSecond.is_datetime());
        assert!(Datatype::TimeSecond.is_time());
        assert!(Datatype::StringUcs4.is_string());
        assert!(Datatype::StringAscii.is_allowed_on_dimension());
        assert!(!Datatype::Blob.is_allowed_on_dimension());
    }

    #[test]
    fn test_physical_compat() {
        assert!(<u8 as PhysicalType>::is_compatible(Datatype::StringAscii));
        assert!(<u8 as PhysicalType>::is_compatible(Datatype::Boolean));
        assert!(!<i8 as PhysicalType>::is_compatible(Datatype::UInt8));
        assert!(<i64 as PhysicalType>::is_compatible(Datatype::DateTimeDay));
        assert!(!<f32 as PhysicalType>::is_compatible(Datatype::Int32));
        assert!(<u16 as PhysicalType>::is_compatible(Datatype::StringUcs2));
    }

    #[test]
    fn test_scalar_sign_extension() {
        let s = Scalar::from_le_bytes(Datatype::Int8, &[0xFF]).unwrap();
        assert_eq!(s, Scalar::Int(-1));
        let s = Scalar::from_le_bytes(Datatype::Int16, &(-300i16).to_le_bytes()).unwrap();
        assert_eq!(s, Scalar::Int(-300));
        let s = Scalar::from_le_bytes(Datatype::UInt8, &[0xFF]).unwrap();
        assert_eq!(s, Scalar::UInt(255));
    }

    #[test]
    fn test_scalar_length_mismatch() {
        let err = Scalar::from_le_bytes(Datatype::Int32, &[1, 2]).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    proptest! {
        #[test]
        fn prop_i32_scalar_roundtrip(v: i32) {
            let s = Scalar::from_le_bytes(Datatype::Int32, &v.to_le_bytes()).unwrap();
            prop_assert_eq!(s, Scalar::Int(v as i64));
        }

        #[test]
        fn prop_f64_scalar_roundtrip(v: f64) {
            prop_assume!(!v.is_nan());
            let s = Scalar::from_le_bytes(Datatype::Float64, &v.to_le_bytes()).unwrap();
            prop_assert_eq!(s, Scalar::Float(v));
        }
    }
}
