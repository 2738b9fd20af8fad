//! Two-stage ingestion pipeline.
//!
//! A producer task splits lines into raw records and a parser task turns
//! them into ticks. Both run in the background while the consumer reads the
//! tick channel. There is one parser task, so ticks leave in file order.

use std::io::SeekFrom;
use std::path::Path;

use lotbook_core::config::FileConfig;
use lotbook_core::{Error, Result, Tick};
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeek, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::record::{file_date, RecordParser};

/// Line number plus split fields.
type RawRecord = (u64, Vec<String>);

/// Counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Lines read, header included.
    pub lines: u64,
    /// Records handed to the parser.
    pub records: u64,
    /// Lines with too few fields.
    pub short: u64,
    /// Lines that are not valid UTF-8.
    pub undecodable: u64,
    /// Records the parser rejected.
    pub malformed: u64,
    /// Ticks delivered to the consumer.
    pub emitted: u64,
}

#[derive(Debug, Default)]
struct ProduceStats {
    lines: u64,
    records: u64,
    short: u64,
    undecodable: u64,
}

#[derive(Debug, Default)]
struct ParseStats {
    malformed: u64,
    emitted: u64,
}

/// Reads delimited tick files into a channel of ticks.
#[derive(Debug, Clone)]
pub struct IngestionWorker {
    parser: RecordParser,
    delimiter: char,
}

/// A running ingestion: the tick stream and the tasks feeding it.
#[derive(Debug)]
pub struct Ingestion {
    /// Closed once every record has been parsed.
    pub ticks: mpsc::Receiver<Tick>,
    pub tasks: IngestionTasks,
}

/// Handles of the producer and parser tasks.
#[derive(Debug)]
pub struct IngestionTasks {
    producer: JoinHandle<Result<ProduceStats>>,
    parser: JoinHandle<ParseStats>,
}

impl IngestionTasks {
    /// Wait for both tasks and collect their counters.
    ///
    /// Read errors in the producer surface here.
    pub async fn join(self) -> Result<IngestStats> {
        let produced = self
            .producer
            .await
            .map_err(|e| Error::other(format!("producer task failed: {e}")))??;
        let parsed = self
            .parser
            .await
            .map_err(|e| Error::other(format!("parser task failed: {e}")))?;

        let stats = IngestStats {
            lines: produced.lines,
            records: produced.records,
            short: produced.short,
            undecodable: produced.undecodable,
            malformed: parsed.malformed,
            emitted: parsed.emitted,
        };
        info!(
            lines = stats.lines,
            emitted = stats.emitted,
            short = stats.short,
            undecodable = stats.undecodable,
            malformed = stats.malformed,
            "ingestion finished"
        );
        Ok(stats)
    }
}

impl IngestionWorker {
    /// Create a worker splitting lines on `delimiter`.
    pub fn new(parser: RecordParser, delimiter: char) -> Self {
        Self { parser, delimiter }
    }

    /// Build a worker for the file described by `config`.
    ///
    /// The base date comes from the configured path's filename.
    pub fn from_config(config: &FileConfig) -> Result<Self> {
        Self::for_path(config, &config.path)
    }

    /// Build a worker for `path`, taking everything else from `config`.
    pub fn for_path(config: &FileConfig, path: impl AsRef<Path>) -> Result<Self> {
        let base_date = file_date(path, &config.date_format)?;
        let parser = RecordParser::new(config.columns, config.timestamp_unit, base_date);
        Ok(Self::new(parser, config.delimiter))
    }

    pub fn parser(&self) -> &RecordParser {
        &self.parser
    }

    /// Open `path` and start ingesting it.
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<Ingestion> {
        let file = File::open(path.as_ref()).await?;
        info!(path = %path.as_ref().display(), "opened tick file");
        self.start(BufReader::new(file)).await
    }

    /// Start ingesting `reader`.
    ///
    /// Lines are counted once so both channels can hold the whole file, then
    /// the reader is rewound and handed to the producer task. The first line
    /// is a header and is skipped.
    pub async fn start<R>(&self, mut reader: R) -> Result<Ingestion>
    where
        R: AsyncBufRead + AsyncSeek + Unpin + Send + 'static,
    {
        let line_count = count_lines(&mut reader).await?;
        reader.seek(SeekFrom::Start(0)).await?;

        let capacity = line_count.max(1);
        let (raw_tx, raw_rx) = mpsc::channel::<RawRecord>(capacity);
        let (tick_tx, tick_rx) = mpsc::channel::<Tick>(capacity);
        info!(lines = line_count, "ingestion started");

        let delimiter = self.delimiter;
        let min_fields = self.parser.min_fields();
        let producer = tokio::spawn(produce(reader, delimiter, min_fields, raw_tx));
        let parser = tokio::spawn(parse(self.parser.clone(), raw_rx, tick_tx));

        Ok(Ingestion {
            ticks: tick_rx,
            tasks: IngestionTasks { producer, parser },
        })
    }
}

async fn count_lines<R>(reader: &mut R) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut count = 0;
    let mut buf = Vec::new();
    while reader.read_until(b'\n', &mut buf).await? > 0 {
        count += 1;
        buf.clear();
    }
    Ok(count)
}

async fn produce<R>(
    mut reader: R,
    delimiter: char,
    min_fields: usize,
    raw_tx: mpsc::Sender<RawRecord>,
) -> Result<ProduceStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ProduceStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        stats.lines += 1;
        if stats.lines == 1 {
            continue;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim_end_matches(['\n', '\r']),
            Err(e) => {
                stats.undecodable += 1;
                warn!(line = stats.lines, error = %e, "skipping undecodable line");
                continue;
            }
        };

        let fields: Vec<String> = line.split(delimiter).map(str::to_string).collect();
        if fields.len() < min_fields {
            debug!(line = stats.lines, fields = fields.len(), min_fields, "short line skipped");
            stats.short += 1;
            continue;
        }

        stats.records += 1;
        if raw_tx.send((stats.lines, fields)).await.is_err() {
            debug!("parser gone, stopping producer");
            break;
        }
    }

    debug!(lines = stats.lines, records = stats.records, "done reading");
    Ok(stats)
}

async fn parse(
    parser: RecordParser,
    mut raw_rx: mpsc::Receiver<RawRecord>,
    tick_tx: mpsc::Sender<Tick>,
) -> ParseStats {
    let mut stats = ParseStats::default();

    while let Some((line, fields)) = raw_rx.recv().await {
        match parser.parse(line, &fields) {
            Ok(tick) => {
                if tick_tx.send(tick).await.is_err() {
                    debug!("tick consumer gone, stopping parser");
                    break;
                }
                stats.emitted += 1;
            }
            Err(e) => {
                stats.malformed += 1;
                warn!(line, error = %e, "skipping malformed record");
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lotbook_core::config::ColumnConfig;
    use lotbook_core::TimeUnit;
    use std::io::Cursor;

    const HEADER: &str = "time|ticker|bid|bid_size|ask|ask_size";

    fn make_worker() -> IngestionWorker {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        IngestionWorker::new(
            RecordParser::new(ColumnConfig::default(), TimeUnit::Millis, base),
            '|',
        )
    }

    fn make_input(lines: &[&str]) -> Cursor<Vec<u8>> {
        let mut text = String::from(HEADER);
        for line in lines {
            text.push('\n');
            text.push_str(line);
        }
        text.push('\n');
        Cursor::new(text.into_bytes())
    }

    async fn collect(mut ingestion: Ingestion) -> (Vec<Tick>, IngestStats) {
        let mut ticks = Vec::new();
        while let Some(tick) = ingestion.ticks.recv().await {
            ticks.push(tick);
        }
        let stats = ingestion.tasks.join().await.unwrap();
        (ticks, stats)
    }

    #[tokio::test]
    async fn test_ticks_keep_file_order() {
        let input = make_input(&[
            "1000|AAPL|189.50|300|189.60|200",
            "2000|MSFT|370.10|100|370.20|100",
            "3000|AAPL|189.55|300|189.65|200",
            "4000|GOOG|140.00|50|140.05|60",
            "5000|AAPL|189.60|300|189.70|200",
        ]);

        let ingestion = make_worker().start(input).await.unwrap();
        let (ticks, stats) = collect(ingestion).await;

        assert_eq!(ticks.len(), 5);
        for pair in ticks.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
        let symbols: Vec<&str> = ticks.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "AAPL", "GOOG", "AAPL"]);
        assert_eq!(
            stats,
            IngestStats {
                lines: 6,
                records: 5,
                short: 0,
                undecodable: 0,
                malformed: 0,
                emitted: 5,
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let input = make_input(&[
            "1000|AAPL|189.50|300|189.60|200",
            "2000|AAPL|oops|300|189.60|200",
            "3000|AAPL|189.55|300|189.65|200",
        ]);

        let ingestion = make_worker().start(input).await.unwrap();
        let (ticks, stats) = collect(ingestion).await;

        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].timestamp.timestamp_millis() % 10_000, 1000);
        assert_eq!(ticks[1].timestamp.timestamp_millis() % 10_000, 3000);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.emitted, 2);
    }

    #[tokio::test]
    async fn test_header_and_short_lines_skipped() {
        let input = make_input(&["", "1000|AAPL|189.50", "2000|AAPL|189.50|300|189.60|200"]);

        let ingestion = make_worker().start(input).await.unwrap();
        let (ticks, stats) = collect(ingestion).await;

        assert_eq!(ticks.len(), 1);
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.short, 2);
        assert_eq!(stats.records, 1);
    }

    #[tokio::test]
    async fn test_undecodable_line_is_skipped() {
        let mut bytes = format!("{HEADER}\n1000|AAPL|189.50|300|189.60|200\n").into_bytes();
        bytes.extend_from_slice(b"2000|AA\xffPL|189.50|300|189.60|200\n");
        bytes.extend_from_slice(b"3000|AAPL|189.55|300|189.65|200\n");

        let ingestion = make_worker().start(Cursor::new(bytes)).await.unwrap();
        let (ticks, stats) = collect(ingestion).await;

        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[1].timestamp.timestamp_millis() % 10_000, 3000);
        assert_eq!(stats.undecodable, 1);
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.records, 2);
    }

    #[tokio::test]
    async fn test_empty_input_closes_channel() {
        let ingestion = make_worker().start(Cursor::new(Vec::new())).await.unwrap();
        let (ticks, stats) = collect(ingestion).await;

        assert!(ticks.is_empty());
        assert_eq!(stats, IngestStats::default());
    }

    #[tokio::test]
    async fn test_crlf_lines() {
        let text = format!("{HEADER}\r\n1000|AAPL|189.50|300|189.60|200\r\n");
        let ingestion = make_worker().start(Cursor::new(text.into_bytes())).await.unwrap();
        let (ticks, _) = collect(ingestion).await;

        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].symbol, "AAPL");
    }

    #[test]
    fn test_worker_from_config() {
        let config = FileConfig {
            path: "feeds/top_of_book_20240315.psv".into(),
            ..FileConfig::default()
        };
        let worker = IngestionWorker::from_config(&config).unwrap();
        assert_eq!(
            worker.parser().base_date(),
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
        );
    }
}
