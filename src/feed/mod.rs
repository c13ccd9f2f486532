//! Historical kline input: lazy CSV source + per-session replay pacing.

pub mod replay;
pub mod source;

pub use replay::ReplayDriver;
pub use source::CandleSource;
