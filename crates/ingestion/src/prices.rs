//! In-memory price feed.
//!
//! Holds a fully materialized candle series and hands it out one point at a
//! time. The feed can be rewound so the same data can drive several runs.

use kate_core::DataPoint;

/// Restartable, ordered sequence of candles.
#[derive(Debug, Clone, Default)]
pub struct PriceFeed {
    points: Vec<DataPoint>,
    cursor: usize,
}

impl PriceFeed {
    /// Create a feed positioned at the first candle.
    pub fn new(points: Vec<DataPoint>) -> Self {
        Self { points, cursor: 0 }
    }

    /// Are there candles left to read?
    pub fn has_more(&self) -> bool {
        self.cursor < self.points.len()
    }

    /// Take the next candle, `None` once the feed is exhausted.
    pub fn next_point(&mut self) -> Option<DataPoint> {
        let point = self.points.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(point)
    }

    /// Rewind to the first candle.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Total number of candles, consumed or not.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Is the feed empty?
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All candles in order.
    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }
}

impl Iterator for PriceFeed {
    type Item = DataPoint;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_point()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.points.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl From<Vec<DataPoint>> for PriceFeed {
    fn from(points: Vec<DataPoint>) -> Self {
        Self::new(points)
    }
}
