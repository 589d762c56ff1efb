//! Data access port trait.

use chrono::{DateTime, Utc};

use crate::domain::error::AlphaginiError;
use crate::domain::ohlcv::BarSeries;

pub trait DataPort {
    /// Bars with `start <= ts < end`, sorted by timestamp. A `None` symbol
    /// means the source holds a single instrument.
    fn fetch_bars(
        &self,
        symbol: Option<&str>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<BarSeries, AlphaginiError>;

    /// Stable identity of the underlying source, mixed into result cache
    /// keys so runs against different sources never share an entry.
    fn source_id(&self) -> Option<String> {
        None
    }

    fn list_symbols(&self) -> Result<Vec<String>, AlphaginiError>;

    /// First timestamp, last timestamp and bar count, or `None` with no data.
    fn data_range(
        &self,
        symbol: Option<&str>,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, AlphaginiError>;
}
