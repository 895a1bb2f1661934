//! Ingestion feed
//!
//! Turns a line-oriented text source into a stream of [`Event`]s. Each line
//! is a comma-separated record whose first field is the event timestamp in
//! decimal seconds; any further fields are ignored. Sequence numbers are
//! assigned 1, 2, … in record order.

use futures::stream::{self, Stream};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::error::FeedError;

/// UTF-8 byte order mark, written by some spreadsheet exports
const BOM: char = '\u{feff}';

/// A single timestamped feed record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// 1-based position in the feed
    pub sequence_number: u64,
    /// Seconds since the start of the feed
    pub timestamp: f64,
}

impl Event {
    #[must_use]
    pub const fn new(sequence_number: u64, timestamp: f64) -> Self {
        Self {
            sequence_number,
            timestamp,
        }
    }
}

/// Parse the timestamp out of one feed line
///
/// Returns `Ok(None)` for blank lines.
pub fn parse_record(line_no: u64, line: &str) -> Result<Option<f64>, FeedError> {
    let line = line.trim_start_matches(BOM).trim();
    if line.is_empty() {
        return Ok(None);
    }

    let field = line.split(',').next().map(str::trim).unwrap_or_default();
    if field.is_empty() {
        return Err(FeedError::MissingTimestamp { line: line_no });
    }

    let value: f64 = field.parse().map_err(|_| FeedError::InvalidTimestamp {
        line: line_no,
        value: field.to_string(),
    })?;

    if !value.is_finite() || value < 0.0 {
        return Err(FeedError::NegativeTimestamp {
            line: line_no,
            value,
        });
    }

    Ok(Some(value))
}

/// Line-by-line event reader over any async buffered source
#[derive(Debug)]
pub struct EventFeed<R> {
    lines: Lines<R>,
    line_no: u64,
    next_sequence: u64,
}

impl EventFeed<BufReader<File>> {
    /// Open a feed file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let file = File::open(path.as_ref()).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> EventFeed<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            next_sequence: 1,
        }
    }

    /// Read the next event, skipping blank lines
    ///
    /// Returns `Ok(None)` at end of input.
    pub async fn next_event(&mut self) -> Result<Option<Event>, FeedError> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            if let Some(timestamp) = parse_record(self.line_no, &line)? {
                let event = Event::new(self.next_sequence, timestamp);
                self.next_sequence += 1;
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Number of lines consumed so far
    #[must_use]
    pub const fn line_no(&self) -> u64 {
        self.line_no
    }

    /// Adapt into a stream that ends after the first error
    pub fn into_stream(self) -> impl Stream<Item = Result<Event, FeedError>> {
        stream::unfold(Some(self), |state| async move {
            let mut feed = state?;
            match feed.next_event().await {
                Ok(Some(event)) => Some((Ok(event), Some(feed))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

/// Build a feed stream from in-memory timestamps
///
/// Sequence numbers are assigned the same way as for a file feed.
pub fn from_timestamps<I>(timestamps: I) -> impl Stream<Item = Result<Event, FeedError>>
where
    I: IntoIterator<Item = f64>,
{
    stream::iter(
        timestamps
            .into_iter()
            .zip(1u64..)
            .map(|(timestamp, seq)| Ok(Event::new(seq, timestamp))),
    )
}
