//! Per-session replay driver.
//!
//! Wraps a [`CandleSource`] in a task that paces emissions at the
//! configured delay. The first candle is emitted eagerly; each later one
//! waits out the delay after the previous emission. The channel holds a
//! single candle, so a slow consumer backpressures the replay rate rather
//! than letting the stream run ahead.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::feed::CandleSource;
use crate::models::CandleTick;

pub struct ReplayDriver {
    ticks: mpsc::Receiver<CandleTick>,
    cancel: CancellationToken,
}

impl ReplayDriver {
    pub fn spawn(source: CandleSource, delay: Duration) -> Self {
        let (tx, ticks) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        tokio::spawn(pump(source, delay, tx, cancel.clone()));
        Self { ticks, cancel }
    }

    /// Next candle; `None` once the source is exhausted or the driver was
    /// closed.
    pub async fn recv(&mut self) -> Option<CandleTick> {
        self.ticks.recv().await
    }

    /// Stops the pump task, which drops the source and releases the file
    /// handle. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ReplayDriver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn pump(
    mut source: CandleSource,
    delay: Duration,
    tx: mpsc::Sender<CandleTick>,
    cancel: CancellationToken,
) {
    let mut first = true;
    loop {
        if !first && !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        let tick = match source.next() {
            None => {
                debug!("kline source exhausted");
                break;
            }
            Some(Err(err)) => {
                error!(error = %err, "kline source failed, ending stream");
                break;
            }
            Some(Ok(tick)) => tick,
        };
        first = false;
        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = tx.send(tick) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn three_row_source() -> (tempfile::NamedTempFile, CandleSource) {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            "unix,date,symbol,open,high,low,close,vol_base,vol_quote,tradecount"
        )
        .unwrap();
        for (unix, minute) in [(1000, 0), (2000, 1), (3000, 2)] {
            writeln!(
                f,
                "{unix},2022-01-01 00:0{minute}:00,ETHUSDT,1,2,0.5,1.5,10,10,1"
            )
            .unwrap();
        }
        let source = CandleSource::open(f.path(), 0).unwrap();
        (f, source)
    }

    #[tokio::test]
    async fn delivers_all_ticks_then_closes() {
        let (_f, source) = three_row_source();
        let mut driver = ReplayDriver::spawn(source, Duration::from_millis(1));
        assert_eq!(driver.recv().await.unwrap().unix, 1000);
        assert_eq!(driver.recv().await.unwrap().unix, 2000);
        assert_eq!(driver.recv().await.unwrap().unix, 3000);
        assert!(driver.recv().await.is_none());
    }

    #[tokio::test]
    async fn close_ends_the_stream() {
        let (_f, source) = three_row_source();
        let mut driver = ReplayDriver::spawn(source, Duration::from_millis(200));
        assert!(driver.recv().await.is_some());
        driver.close();
        assert!(driver.recv().await.is_none());
    }

    #[tokio::test]
    async fn first_tick_is_eager() {
        let (_f, source) = three_row_source();
        // A delay far beyond the test budget: only the eager first tick can
        // arrive in time.
        let mut driver = ReplayDriver::spawn(source, Duration::from_secs(3600));
        let first = tokio::time::timeout(Duration::from_secs(2), driver.recv())
            .await
            .expect("first tick should not wait for the delay");
        assert_eq!(first.unwrap().unix, 1000);
    }
}
