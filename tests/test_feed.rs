//! Tests for reading event feeds from disk

use anyhow::Result;
use futures::StreamExt;
use std::io::Write;
use tempfile::NamedTempFile;
use tickstats::FeedError;
use tickstats::feed::{Event, EventFeed};

fn feed_file(content: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content)?;
    file.flush()?;
    Ok(file)
}

async fn collect(file: &NamedTempFile) -> Vec<Result<Event, FeedError>> {
    EventFeed::open(file.path())
        .await
        .unwrap()
        .into_stream()
        .collect()
        .await
}

#[tokio::test]
async fn test_reads_csv_with_extra_fields() -> Result<()> {
    let file = feed_file(b"0.000,alpha,1\n0.002,beta,2\n0.005,gamma,3\n")?;
    let events: Vec<Event> = collect(&file).await.into_iter().collect::<Result<_, _>>()?;

    assert_eq!(
        events,
        vec![
            Event::new(1, 0.0),
            Event::new(2, 0.002),
            Event::new(3, 0.005),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_strips_bom_and_skips_blank_lines() -> Result<()> {
    let file = feed_file("\u{feff}0.5\n\n   \n1.5\r\n".as_bytes())?;
    let events: Vec<Event> = collect(&file).await.into_iter().collect::<Result<_, _>>()?;

    assert_eq!(events, vec![Event::new(1, 0.5), Event::new(2, 1.5)]);
    Ok(())
}

#[tokio::test]
async fn test_invalid_timestamp_reports_file_line() -> Result<()> {
    let file = feed_file(b"0.1\n\nnot-a-number,x\n0.3\n")?;
    let results = collect(&file).await;

    assert_eq!(results.len(), 2, "stream must stop after the first error");
    assert!(results[0].is_ok());
    match &results[1] {
        Err(FeedError::InvalidTimestamp { line, value }) => {
            assert_eq!(*line, 3);
            assert_eq!(value, "not-a-number");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_missing_and_negative_timestamps() -> Result<()> {
    let file = feed_file(b",payload\n")?;
    let results = collect(&file).await;
    assert!(matches!(
        results[0],
        Err(FeedError::MissingTimestamp { line: 1 })
    ));

    let file = feed_file(b"0.0\n-0.5\n")?;
    let results = collect(&file).await;
    assert!(matches!(
        results[1],
        Err(FeedError::NegativeTimestamp { line: 2, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_empty_file_yields_no_events() -> Result<()> {
    let file = feed_file(b"")?;
    assert!(collect(&file).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_open_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = EventFeed::open(dir.path().join("absent.csv")).await;
    assert!(matches!(result, Err(FeedError::Io(_))));
}
