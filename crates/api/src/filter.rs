//! Filters and filter pipelines
//!
//! A [`Filter`] configures one transform; a [`FilterList`] is the
//! ordered pipeline attached to an attribute or dimension. Options are
//! type-keyed per filter kind and validated on set, so a wrong
//! option/kind pairing fails before it ever reaches a schema.

use tessera_core::{
    Datatype, Error, FilterData, FilterListData, FilterOption, FilterType, Result, WebPFormat,
};

/// One configured filter
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    data: FilterData,
}

impl Filter {
    /// New filter of `kind` with default options
    pub fn new(kind: FilterType) -> Filter {
        Filter {
            data: FilterData::new(kind),
        }
    }

    /// The filter kind
    pub fn filter_type(&self) -> FilterType {
        self.data.kind()
    }

    pub(crate) fn data(&self) -> &FilterData {
        &self.data
    }

    pub(crate) fn from_data(data: FilterData) -> Filter {
        Filter { data }
    }

    /// Set a compressor's level
    pub fn set_compression_level(mut self, level: i32) -> Result<Filter> {
        self.data.set_option(FilterOption::CompressionLevel(level))?;
        Ok(self)
    }

    /// Compressor level, when configured
    pub fn compression_level(&self) -> Option<i32> {
        match self.data.option(0) {
            Some(FilterOption::CompressionLevel(level)) => Some(*level),
            _ => None,
        }
    }

    /// Set the bit-width reduction window
    pub fn set_bit_width_max_window(mut self, window: u32) -> Result<Filter> {
        self.data.set_option(FilterOption::BitWidthMaxWindow(window))?;
        Ok(self)
    }

    /// Set the positive-delta window
    pub fn set_positive_delta_max_window(mut self, window: u32) -> Result<Filter> {
        self.data
            .set_option(FilterOption::PositiveDeltaMaxWindow(window))?;
        Ok(self)
    }

    /// Set the scaled-float storage width in bytes
    pub fn set_float_bytewidth(mut self, width: u64) -> Result<Filter> {
        self.data
            .set_option(FilterOption::ScaleFloatByteWidth(width))?;
        Ok(self)
    }

    /// Set the scaled-float factor
    pub fn set_float_factor(mut self, factor: f64) -> Result<Filter> {
        self.data.set_option(FilterOption::ScaleFloatFactor(factor))?;
        Ok(self)
    }

    /// Set the scaled-float offset
    pub fn set_float_offset(mut self, offset: f64) -> Result<Filter> {
        self.data.set_option(FilterOption::ScaleFloatOffset(offset))?;
        Ok(self)
    }

    /// Set the WebP quality in `[0.0, 100.0]`
    pub fn set_webp_quality(mut self, quality: f32) -> Result<Filter> {
        self.data.set_option(FilterOption::WebPQuality(quality))?;
        Ok(self)
    }

    /// Set the WebP input pixel format
    pub fn set_webp_input_format(mut self, format: WebPFormat) -> Result<Filter> {
        self.data.set_option(FilterOption::WebPInputFormat(format))?;
        Ok(self)
    }

    /// Toggle lossless WebP
    pub fn set_webp_lossless(mut self, lossless: bool) -> Result<Filter> {
        self.data.set_option(FilterOption::WebPLossless(lossless))?;
        Ok(self)
    }

    /// Set the compression reinterpretation datatype
    pub fn set_reinterpret_datatype(mut self, datatype: Datatype) -> Result<Filter> {
        self.data
            .set_option(FilterOption::CompressionReinterpretDatatype(datatype))?;
        Ok(self)
    }

    /// Look up a configured option by key discriminant
    pub fn option(&self, key: u32) -> Option<&FilterOption> {
        self.data.option(key)
    }
}

/// Ordered filter pipeline
///
/// Filters apply in list order on write and reverse order on read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterList {
    data: FilterListData,
}

impl FilterList {
    /// Empty pipeline
    pub fn new() -> FilterList {
        FilterList::default()
    }

    pub(crate) fn data(&self) -> &FilterListData {
        &self.data
    }

    pub(crate) fn from_data(data: FilterListData) -> FilterList {
        FilterList { data }
    }

    /// Append a filter to the end of the pipeline
    pub fn add_filter(mut self, filter: Filter) -> FilterList {
        self.data.add_filter(filter.data().clone());
        self
    }

    /// Number of filters
    pub fn nfilters(&self) -> u32 {
        self.data.nfilters()
    }

    /// Filter at `index`, in application order
    pub fn filter(&self, index: u32) -> Result<Filter> {
        self.data
            .filters()
            .get(index as usize)
            .cloned()
            .map(Filter::from_data)
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "filter index {index} out of bounds ({} filters)",
                    self.data.nfilters()
                ))
            })
    }

    /// Effective max chunk size in bytes
    pub fn max_chunk_size(&self) -> u32 {
        self.data.max_chunk_size()
    }

    /// Override the max chunk size
    pub fn set_max_chunk_size(mut self, size: u32) -> Result<FilterList> {
        self.data.set_max_chunk_size(size)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_setters() {
        let f = Filter::new(FilterType::Zstd)
            .set_compression_level(7)
            .unwrap();
        assert_eq!(f.compression_level(), Some(7));
        assert!(Filter::new(FilterType::Gzip).set_webp_quality(10.0).is_err());
    }

    #[test]
    fn test_pipeline_ordering() {
        let list = FilterList::new()
            .add_filter(Filter::new(FilterType::ByteShuffle))
            .add_filter(Filter::new(FilterType::Zstd));
        assert_eq!(list.nfilters(), 2);
        assert_eq!(list.filter(0).unwrap().filter_type(), FilterType::ByteShuffle);
        assert_eq!(list.filter(1).unwrap().filter_type(), FilterType::Zstd);
        assert!(list.filter(2).is_err());
    }
}
