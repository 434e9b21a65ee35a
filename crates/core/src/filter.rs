//! Filter pipeline descriptors
//!
//! A filter list is an ordered chain of reversible transforms applied to
//! stored bytes: filters apply in list order on write and reverse order on
//! read. Per-filter options are type-keyed; the engine is the authority on
//! option/filter compatibility, but known pairs are validated here
//! defensively so misuse fails before a write is attempted.

use serde::{Deserialize, Serialize};

use crate::datatype::Datatype;
use crate::error::{Error, Result};
use crate::types::{u32_enum, CellValNum};

u32_enum! {
    /// Kind of a single filter in a pipeline
    ///
    /// Discriminants 11 and 17 are retired slots kept vacant for wire
    /// compatibility.
    FilterType {
        /// Pass-through
        None = 0 => "NONE",
        /// Gzip compression
        Gzip = 1 => "GZIP",
        /// Zstandard compression
        Zstd = 2 => "ZSTD",
        /// LZ4 compression
        Lz4 = 3 => "LZ4",
        /// Run-length encoding
        Rle = 4 => "RLE",
        /// Bzip2 compression
        Bzip2 = 5 => "BZIP2",
        /// Double-delta encoding for integral cells
        DoubleDelta = 6 => "DOUBLE_DELTA",
        /// Bit-width reduction for integral cells
        BitWidthReduction = 7 => "BIT_WIDTH_REDUCTION",
        /// Bit-level shuffle
        BitShuffle = 8 => "BITSHUFFLE",
        /// Byte-level shuffle
        ByteShuffle = 9 => "BYTESHUFFLE",
        /// Positive-delta encoding for integral cells
        PositiveDelta = 10 => "POSITIVE_DELTA",
        /// MD5 checksum
        ChecksumMd5 = 12 => "CHECKSUM_MD5",
        /// SHA-256 checksum
        ChecksumSha256 = 13 => "CHECKSUM_SHA256",
        /// Dictionary encoding for variable-length strings
        Dictionary = 14 => "DICTIONARY",
        /// Float scaling to reduced-width integers
        ScaleFloat = 15 => "SCALE_FLOAT",
        /// XOR encoding
        Xor = 16 => "XOR",
        /// WebP image compression
        WebP = 18 => "WEBP",
        /// Delta encoding
        Delta = 19 => "DELTA",
    }
}

impl FilterType {
    /// True for the general-purpose compressors
    pub fn is_compressor(&self) -> bool {
        matches!(
            self,
            FilterType::Gzip
                | FilterType::Zstd
                | FilterType::Lz4
                | FilterType::Rle
                | FilterType::Bzip2
        )
    }
}

u32_enum! {
    /// Input pixel format for the WebP filter
    WebPFormat {
        /// Unset
        None = 0 => "NONE",
        /// 8-bit RGB triplets
        Rgb = 1 => "RGB",
        /// 8-bit BGR triplets
        Bgr = 2 => "BGR",
        /// 8-bit RGBA quadruplets
        Rgba = 3 => "RGBA",
        /// 8-bit BGRA quadruplets
        Bgra = 4 => "BGRA",
    }
}

/// A type-keyed filter option
///
/// Passing an option a filter kind does not accept is a caller error;
/// [`FilterData::set_option`] rejects known-bad pairs up front.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FilterOption {
    /// Compressor level; -1 selects the codec default
    CompressionLevel(i32),
    /// Max window size for bit-width reduction
    BitWidthMaxWindow(u32),
    /// Max window size for positive-delta encoding
    PositiveDeltaMaxWindow(u32),
    /// Storage width of scaled floats, in bytes
    ScaleFloatByteWidth(u64),
    /// Scale factor applied before rounding
    ScaleFloatFactor(f64),
    /// Offset applied before scaling
    ScaleFloatOffset(f64),
    /// WebP quality in `[0.0, 100.0]`
    WebPQuality(f32),
    /// WebP input pixel format
    WebPInputFormat(WebPFormat),
    /// Lossless WebP mode
    WebPLossless(bool),
    /// Reinterpretation datatype for compressing filters
    CompressionReinterpretDatatype(Datatype),
}

impl FilterOption {
    /// Stable discriminant of the option key
    pub fn key(&self) -> u32 {
        match self {
            FilterOption::CompressionLevel(_) => 0,
            FilterOption::BitWidthMaxWindow(_) => 1,
            FilterOption::PositiveDeltaMaxWindow(_) => 2,
            FilterOption::ScaleFloatByteWidth(_) => 3,
            FilterOption::ScaleFloatFactor(_) => 4,
            FilterOption::ScaleFloatOffset(_) => 5,
            FilterOption::WebPQuality(_) => 6,
            FilterOption::WebPInputFormat(_) => 7,
            FilterOption::WebPLossless(_) => 8,
            FilterOption::CompressionReinterpretDatatype(_) => 9,
        }
    }

    /// True when `kind` accepts this option
    pub fn accepted_by(&self, kind: FilterType) -> bool {
        match self {
            FilterOption::CompressionLevel(_) => kind.is_compressor() || kind == FilterType::Delta,
            FilterOption::BitWidthMaxWindow(_) => kind == FilterType::BitWidthReduction,
            FilterOption::PositiveDeltaMaxWindow(_) => kind == FilterType::PositiveDelta,
            FilterOption::ScaleFloatByteWidth(_)
            | FilterOption::ScaleFloatFactor(_)
            | FilterOption::ScaleFloatOffset(_) => kind == FilterType::ScaleFloat,
            FilterOption::WebPQuality(_)
            | FilterOption::WebPInputFormat(_)
            | FilterOption::WebPLossless(_) => kind == FilterType::WebP,
            FilterOption::CompressionReinterpretDatatype(_) => {
                kind.is_compressor() || matches!(kind, FilterType::Delta | FilterType::DoubleDelta)
            }
        }
    }
}

/// One configured filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FilterData {
    kind: FilterType,
    options: Vec<FilterOption>,
}

impl Default for FilterType {
    fn default() -> Self {
        FilterType::None
    }
}

impl FilterData {
    /// New filter of `kind` with default options
    pub fn new(kind: FilterType) -> Self {
        FilterData {
            kind,
            options: Vec::new(),
        }
    }

    /// The filter kind
    pub fn kind(&self) -> FilterType {
        self.kind
    }

    /// Set a type-keyed option, replacing a previous value for the same key
    ///
    /// Fails with [`Error::InvalidParameter`] when the option is not
    /// accepted by this filter kind, or when the value is out of range.
    pub fn set_option(&mut self, option: FilterOption) -> Result<()> {
        if !option.accepted_by(self.kind) {
            return Err(Error::InvalidParameter(format!(
                "filter {} does not accept option {:?}",
                self.kind, option
            )));
        }
        if let FilterOption::WebPQuality(q) = option {
            if !(0.0..=100.0).contains(&q) {
                return Err(Error::InvalidParameter(format!(
                    "WebP quality {q} outside [0.0, 100.0]"
                )));
            }
        }
        if let FilterOption::ScaleFloatByteWidth(w) = option {
            if !matches!(w, 1 | 2 | 4 | 8) {
                return Err(Error::InvalidParameter(format!(
                    "scale-float byte width {w} not one of 1, 2, 4, 8"
                )));
            }
        }
        self.options.retain(|o| o.key() != option.key());
        self.options.push(option);
        Ok(())
    }

    /// Look up an option by key discriminant
    pub fn option(&self, key: u32) -> Option<&FilterOption> {
        self.options.iter().find(|o| o.key() == key)
    }

    /// All configured options, in set order
    pub fn options(&self) -> &[FilterOption] {
        &self.options
    }

    /// Validate this filter against the datatype and cell count of the
    /// field it is attached to
    pub fn check_against(&self, datatype: Datatype, cell_val_num: CellValNum) -> Result<()> {
        let ok = match self.kind {
            FilterType::DoubleDelta
            | FilterType::BitWidthReduction
            | FilterType::PositiveDelta
            | FilterType::Delta => {
                datatype.is_integral()
                    || datatype.is_datetime()
                    || datatype.is_time()
                    || datatype == Datatype::Boolean
                    || datatype == Datatype::Char
            }
            FilterType::ScaleFloat => datatype.is_real(),
            FilterType::WebP => datatype == Datatype::UInt8,
            _ => true,
        };
        if !ok {
            return Err(Error::Engine(format!(
                "filter {} is not applicable to datatype {}",
                self.kind, datatype
            )));
        }
        // RLE and dictionary over var-length strings depend on ordering
        // assumptions that only hold ahead of any other transform.
        let _ = cell_val_num;
        Ok(())
    }
}

/// Ordered filter pipeline for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FilterListData {
    filters: Vec<FilterData>,
    max_chunk_size: Option<u32>,
}

/// Default chunk size for filtered tiles, in bytes
pub const DEFAULT_MAX_CHUNK_SIZE: u32 = 65_536;

impl FilterListData {
    /// Empty pipeline
    pub fn new() -> Self {
        FilterListData::default()
    }

    /// Append a filter to the end of the pipeline
    pub fn add_filter(&mut self, filter: FilterData) {
        self.filters.push(filter);
    }

    /// Filters in application (write) order
    pub fn filters(&self) -> &[FilterData] {
        &self.filters
    }

    /// Number of filters in the pipeline
    pub fn nfilters(&self) -> u32 {
        self.filters.len() as u32
    }

    /// Effective max chunk size in bytes
    pub fn max_chunk_size(&self) -> u32 {
        self.max_chunk_size.unwrap_or(DEFAULT_MAX_CHUNK_SIZE)
    }

    /// Override the max chunk size
    pub fn set_max_chunk_size(&mut self, size: u32) -> Result<()> {
        if size == 0 {
            return Err(Error::InvalidParameter("max chunk size must be nonzero".into()));
        }
        self.max_chunk_size = Some(size);
        Ok(())
    }

    /// True when the pipeline contains any general-purpose compressor
    pub fn has_compression(&self) -> bool {
        self.filters.iter().any(|f| f.kind().is_compressor())
    }

    /// Validate the whole pipeline against the field it is attached to
    ///
    /// RLE and Dictionary over variable-length string fields must be the
    /// first filter in the pipeline.
    pub fn check_against(&self, datatype: Datatype, cell_val_num: CellValNum) -> Result<()> {
        for (idx, filter) in self.filters.iter().enumerate() {
            filter.check_against(datatype, cell_val_num)?;
            let ordering_sensitive =
                matches!(filter.kind(), FilterType::Rle | FilterType::Dictionary);
            if ordering_sensitive && datatype.is_string() && cell_val_num.is_var() && idx != 0 {
                return Err(Error::Engine(format!(
                    "filter {} over variable-length strings must be first in the pipeline",
                    filter.kind()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_type_table_gaps() {
        assert_eq!(FilterType::from_u32(11), None);
        assert_eq!(FilterType::from_u32(17), None);
        assert_eq!(FilterType::from_u32(18), Some(FilterType::WebP));
        assert_eq!(u32::from(FilterType::Delta), 19);
    }

    #[test]
    fn test_option_typing() {
        let mut f = FilterData::new(FilterType::Zstd);
        f.set_option(FilterOption::CompressionLevel(5)).unwrap();
        assert!(f.set_option(FilterOption::WebPQuality(50.0)).is_err());
        assert_eq!(f.option(0), Some(&FilterOption::CompressionLevel(5)));
    }

    #[test]
    fn test_option_replaces_same_key() {
        let mut f = FilterData::new(FilterType::Gzip);
        f.set_option(FilterOption::CompressionLevel(1)).unwrap();
        f.set_option(FilterOption::CompressionLevel(9)).unwrap();
        assert_eq!(f.options().len(), 1);
        assert_eq!(f.option(0), Some(&FilterOption::CompressionLevel(9)));
    }

    #[test]
    fn test_webp_quality_range() {
        let mut f = FilterData::new(FilterType::WebP);
        assert!(f.set_option(FilterOption::WebPQuality(101.0)).is_err());
        f.set_option(FilterOption::WebPQuality(85.5)).unwrap();
        f.set_option(FilterOption::WebPInputFormat(WebPFormat::Rgba)).unwrap();
    }

    #[test]
    fn test_datatype_compat() {
        let f = FilterData::new(FilterType::DoubleDelta);
        assert!(f.check_against(Datatype::Int32, CellValNum::single()).is_ok());
        assert!(f.check_against(Datatype::Float64, CellValNum::single()).is_err());

        let f = FilterData::new(FilterType::ScaleFloat);
        assert!(f.check_against(Datatype::Float32, CellValNum::single()).is_ok());
        assert!(f.check_against(Datatype::Int32, CellValNum::single()).is_err());

        let f = FilterData::new(FilterType::WebP);
        assert!(f.check_against(Datatype::UInt8, CellValNum::single()).is_ok());
        assert!(f.check_against(Datatype::UInt16, CellValNum::single()).is_err());
    }

    #[test]
    fn test_rle_must_lead_var_strings() {
        let mut list = FilterListData::new();
        list.add_filter(FilterData::new(FilterType::Zstd));
        list.add_filter(FilterData::new(FilterType::Rle));
        assert!(list
            .check_against(Datatype::StringAscii, CellValNum::Var)
            .is_err());
        // Fine on fixed-size fields in any position.
        assert!(list
            .check_against(Datatype::Int32, CellValNum::single())
            .is_ok());

        let mut list = FilterListData::new();
        list.add_filter(FilterData::new(FilterType::Rle));
        list.add_filter(FilterData::new(FilterType::Zstd));
        assert!(list
            .check_against(Datatype::StringAscii, CellValNum::Var)
            .is_ok());
    }

    #[test]
    fn test_chunk_size() {
        let mut list = FilterListData::new();
        assert_eq!(list.max_chunk_size(), DEFAULT_MAX_CHUNK_SIZE);
        list.set_max_chunk_size(1024).unwrap();
        assert_eq!(list.max_chunk_size(), 1024);
        assert!(list.set_max_chunk_size(0).is_err());
    }
}
