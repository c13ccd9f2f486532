//! Lazy candle source over the historical kline CSV.
//!
//! Expected header: `unix,date,symbol,open,high,low,close,vol_base,
//! vol_quote,tradecount`. Columns are read positionally, so the header text
//! itself is free-form (exchange exports name the volume columns after the
//! pair, e.g. `Volume ETH`).

use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::error::ExchangeError;
use crate::models::CandleTick;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A finite, non-restartable iterator of candles. Rows with `unix` below
/// the start offset are dropped silently; the first malformed row ends the
/// sequence with an error, already-yielded candles stay valid.
#[derive(Debug)]
pub struct CandleSource {
    reader: csv::Reader<File>,
    record: csv::StringRecord,
    offset: i64,
    done: bool,
}

impl CandleSource {
    pub fn open(path: &Path, offset: i64) -> Result<Self, ExchangeError> {
        let file = File::open(path).map_err(|e| {
            ExchangeError::Config(format!("open kline file {}: {e}", path.display()))
        })?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file);
        Ok(Self {
            reader,
            record: csv::StringRecord::new(),
            offset,
            done: false,
        })
    }
}

impl Iterator for CandleSource {
    type Item = Result<CandleTick, ExchangeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                Ok(true) => match parse_record(&self.record) {
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                    Ok(tick) if tick.unix < self.offset => continue,
                    Ok(tick) => return Some(Ok(tick)),
                },
            }
        }
    }
}

fn parse_record(rec: &csv::StringRecord) -> Result<CandleTick, ExchangeError> {
    let unix: i64 = field(rec, 0, "unix")?
        .parse()
        .map_err(|e| ExchangeError::Parse(format!("unix: {e}")))?;
    // The date column is redundant with unix but a garbled one still means
    // the row is corrupt.
    let date = field(rec, 1, "date")?;
    NaiveDateTime::parse_from_str(date, DATE_FORMAT)
        .map_err(|e| ExchangeError::Parse(format!("date {date:?}: {e}")))?;

    Ok(CandleTick {
        open: decimal_field(rec, 3, "open")?,
        high: decimal_field(rec, 4, "high")?,
        low: decimal_field(rec, 5, "low")?,
        close: decimal_field(rec, 6, "close")?,
        unix,
        symbol: field(rec, 2, "symbol")?.to_string(),
        base_volume: decimal_field(rec, 7, "vol_base")?,
        quote_volume: decimal_field(rec, 8, "vol_quote")?,
    })
}

fn field<'a>(rec: &'a csv::StringRecord, idx: usize, name: &str) -> Result<&'a str, ExchangeError> {
    rec.get(idx)
        .ok_or_else(|| ExchangeError::Parse(format!("missing column {name}")))
}

fn decimal_field(rec: &csv::StringRecord, idx: usize, name: &str) -> Result<Decimal, ExchangeError> {
    let raw = field(rec, idx, name)?;
    raw.parse::<Decimal>()
        .map_err(|e| ExchangeError::Parse(format!("{name} {raw:?}: {e}")))
}
