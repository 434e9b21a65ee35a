//! Shared enum families and the cell-value count
//!
//! Each family carries a stable `u32` discriminant table with a total,
//! exhaustively-matched conversion in both directions. A discriminant the
//! library itself produced is converted infallibly; values arriving from a
//! caller go through `from_u32`/`from_str`, and an unmatched case there is
//! an [`InvalidParameter`](crate::Error::InvalidParameter) since it
//! indicates library/client version skew.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

macro_rules! u32_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr => $str:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u32)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl $name {
            /// Fallible conversion from the raw discriminant
            pub fn from_u32(raw: u32) -> Option<Self> {
                match raw {
                    $( $value => Some($name::$variant), )+
                    _ => None,
                }
            }

            /// Canonical upper-case name
            pub fn name(&self) -> &'static str {
                match self {
                    $( $name::$variant => $str, )+
                }
            }
        }

        impl From<$name> for u32 {
            fn from(v: $name) -> u32 {
                v as u32
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::Error;

            fn from_str(s: &str) -> $crate::error::Result<Self> {
                match s {
                    $( $str => Ok($name::$variant), )+
                    _ => Err($crate::error::Error::InvalidParameter(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        s
                    ))),
                }
            }
        }
    };
}

pub(crate) use u32_enum;

u32_enum! {
    /// Storage layout of an array: every domain coordinate materialized
    /// (dense) or only written coordinates (sparse)
    ArrayType {
        /// Dense array
        Dense = 0 => "DENSE",
        /// Sparse array
        Sparse = 1 => "SPARSE",
    }
}

u32_enum! {
    /// Mode an array handle is opened in; doubles as the query type
    Mode {
        /// Read cells and metadata
        Read = 0 => "READ",
        /// Write new fragments and metadata
        Write = 1 => "WRITE",
        /// Write delete tombstones
        Delete = 2 => "DELETE",
        /// Update existing cells
        Update = 3 => "UPDATE",
        /// Write with exclusive ownership of the array
        ModifyExclusive = 4 => "MODIFY_EXCLUSIVE",
    }
}

impl Mode {
    /// True for the modes that may mutate array contents or metadata
    pub fn is_write(&self) -> bool {
        !matches!(self, Mode::Read)
    }
}

u32_enum! {
    /// Lifecycle state of a query
    QueryStatus {
        /// Built but no buffers bound yet
        Uninitialized = 0 => "UNINITIALIZED",
        /// Buffers bound, not yet submitted
        Initialized = 1 => "INITIALIZED",
        /// Submit in flight
        InProgress = 2 => "INPROGRESS",
        /// All results delivered
        Completed = 3 => "COMPLETED",
        /// Buffers filled but more results remain; resubmit to continue
        Incomplete = 4 => "INCOMPLETE",
        /// Submit failed
        Failed = 5 => "FAILED",
    }
}

u32_enum! {
    /// Cell ordering for tiles, cells within tiles, and query results
    Layout {
        /// Row-major with respect to the subarray
        RowMajor = 0 => "ROW_MAJOR",
        /// Column-major with respect to the subarray
        ColMajor = 1 => "COL_MAJOR",
        /// The array's global cell order
        GlobalOrder = 2 => "GLOBAL_ORDER",
        /// No guaranteed order; sparse only
        Unordered = 3 => "UNORDERED",
        /// Hilbert-curve cell order
        Hilbert = 4 => "HILBERT",
    }
}

impl Layout {
    /// True when usable as a schema cell order
    pub fn is_valid_cell_order(&self) -> bool {
        !matches!(self, Layout::GlobalOrder | Layout::Unordered)
    }

    /// True when usable as a schema tile order
    pub fn is_valid_tile_order(&self) -> bool {
        matches!(self, Layout::RowMajor | Layout::ColMajor)
    }

    /// True when usable as a query result/input layout
    pub fn is_valid_query_layout(&self) -> bool {
        !matches!(self, Layout::Hilbert)
    }
}

u32_enum! {
    /// At-rest encryption for array storage
    EncryptionType {
        /// No encryption
        NoEncryption = 0 => "NO_ENCRYPTION",
        /// AES-256-GCM with a 32-byte key
        Aes256Gcm = 1 => "AES_256_GCM",
    }
}

u32_enum! {
    /// Backing filesystem kinds a context can be asked about
    Filesystem {
        /// Hadoop distributed filesystem
        Hdfs = 0 => "HDFS",
        /// Amazon S3 object storage
        S3 = 1 => "S3",
        /// Azure blob storage
        Azure = 2 => "AZURE",
        /// Google Cloud Storage
        Gcs = 3 => "GCS",
        /// In-memory filesystem
        Mem = 4 => "MEM",
    }
}

/// Number of primitive values per logical cell
///
/// `Fixed(1)` is a scalar cell; `Var` is the variable-length sentinel
/// (`u32::MAX` on the wire) where an offsets buffer delimits cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellValNum {
    /// Exactly this many values per cell
    Fixed(u32),
    /// Variable number of values per cell
    Var,
}

/// Wire sentinel for [`CellValNum::Var`]
pub const CELL_VAL_NUM_VAR: u32 = u32::MAX;

impl CellValNum {
    /// Single-value cells
    pub fn single() -> Self {
        CellValNum::Fixed(1)
    }

    /// Convert from the wire representation
    pub fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            CELL_VAL_NUM_VAR => Ok(CellValNum::Var),
            0 => Err(Error::InvalidParameter(
                "cell value count must be at least 1".into(),
            )),
            n => Ok(CellValNum::Fixed(n)),
        }
    }

    /// Wire representation
    pub fn to_raw(&self) -> u32 {
        match self {
            CellValNum::Fixed(n) => *n,
            CellValNum::Var => CELL_VAL_NUM_VAR,
        }
    }

    /// Values per cell for fixed counts, `None` when variable
    pub fn fixed(&self) -> Option<u32> {
        match self {
            CellValNum::Fixed(n) => Some(*n),
            CellValNum::Var => None,
        }
    }

    /// True for the variable-length sentinel
    pub fn is_var(&self) -> bool {
        matches!(self, CellValNum::Var)
    }
}

impl Default for CellValNum {
    fn default() -> Self {
        CellValNum::single()
    }
}

impl fmt::Display for CellValNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValNum::Fixed(n) => write!(f, "{n}"),
            CellValNum::Var => f.write_str("VAR"),
        }
    }
}
