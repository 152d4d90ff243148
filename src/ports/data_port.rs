//! Data access port trait.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDateTime;

pub trait DataPort {
    /// Bars whose close time lies in `[start, end]`, sorted by close time.
    /// An absent bound leaves that side open.
    fn fetch_bars(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, TraderError>;

    /// First and last close time plus bar count, or `None` for an empty source.
    fn data_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TraderError>;
}
