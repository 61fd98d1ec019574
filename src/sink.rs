//! Output sinks
//!
//! A [`DocumentSink`] receives documents page by page and owns the framing of
//! the output. [`JsonArraySink`] is the streaming encoder underneath the file
//! sink: it writes the opening bracket, each serialized document, the
//! separators and the closing bracket as separate steps. The bytes are
//! identical to serializing the whole collection in one go, however the
//! documents were split into pages.

use crate::config::OutputTarget;
use crate::error::{Result, SinkError};
use crate::types::Document;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Destination for fetched documents
///
/// A sink is owned by exactly one fetch. It is finished or aborted exactly once.
#[async_trait]
pub trait DocumentSink: Send {
    /// Append one page of documents
    async fn write_page(&mut self, documents: &[Document]) -> Result<()>;

    /// Close the output after the last page
    async fn finish(&mut self) -> Result<()>;

    /// Give up after a failed fetch
    ///
    /// Content that was already flushed stays where it is unless the sink
    /// stages its output (see [`FileSink::atomic`]).
    async fn abort(&mut self) -> Result<()> {
        Ok(())
    }

    /// Number of documents written so far
    fn records_written(&self) -> usize;
}

/// Streaming encoder producing a single JSON array
///
/// # Examples
///
/// ```
/// use collection_fetch::sink::{DocumentSink, JsonArraySink};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> collection_fetch::Result<()> {
/// let mut sink = JsonArraySink::new(Vec::new());
/// sink.write_page(&[json!({"id": 0}), json!({"id": 1})]).await?;
/// sink.write_page(&[json!({"id": 2})]).await?;
/// sink.finish().await?;
///
/// assert_eq!(sink.into_inner(), br#"[{"id":0},{"id":1},{"id":2}]"#);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct JsonArraySink<W> {
    writer: W,
    opened: bool,
    closed: bool,
    written: usize,
}

impl<W: AsyncWrite + Unpin + Send> JsonArraySink<W> {
    /// Wrap a writer; nothing is written until the first page or `finish`
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            opened: false,
            closed: false,
            written: 0,
        }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Serialize `documents` as the next run of array elements
    fn encode_elements(&self, documents: &[Document]) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if !self.opened {
            buf.push(b'[');
        }
        for (i, document) in documents.iter().enumerate() {
            if self.written + i > 0 {
                buf.push(b',');
            }
            serde_json::to_writer(&mut buf, document).map_err(SinkError::Encode)?;
        }
        Ok(buf)
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> DocumentSink for JsonArraySink<W> {
    async fn write_page(&mut self, documents: &[Document]) -> Result<()> {
        if self.closed {
            return Err(SinkError::Finished.into());
        }

        let buf = self.encode_elements(documents)?;
        self.writer.write_all(&buf).await.map_err(SinkError::Write)?;
        // Each page reaches the destination before the next one is requested.
        self.writer.flush().await.map_err(SinkError::Write)?;

        self.opened = true;
        self.written += documents.len();
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Err(SinkError::Finished.into());
        }

        let closing: &[u8] = if self.opened { b"]" } else { b"[]" };
        self.writer
            .write_all(closing)
            .await
            .map_err(SinkError::Write)?;
        self.writer.flush().await.map_err(SinkError::Write)?;

        self.opened = true;
        self.closed = true;
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        self.closed = true;
        self.writer.flush().await.map_err(SinkError::Write)?;
        Ok(())
    }

    fn records_written(&self) -> usize {
        self.written
    }
}

/// Sink writing one JSON array to a file
///
/// The file is created (or truncated) lazily on the first write, so a fetch
/// that fails on its very first page leaves an existing file untouched.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    staging: Option<PathBuf>,
    encoder: Option<JsonArraySink<BufWriter<File>>>,
    written: usize,
    closed: bool,
    /// Set once the output is in place at `path`
    committed: bool,
}

impl FileSink {
    /// Write directly to `path`
    ///
    /// If the fetch fails midway, `path` keeps a truncated, invalid array.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            staging: None,
            encoder: None,
            written: 0,
            closed: false,
            committed: false,
        }
    }

    /// Write to `<path>.part` and move it over `path` only when finished
    pub fn atomic(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let staging = staging_path(&path);
        Self {
            path,
            staging: Some(staging),
            encoder: None,
            written: 0,
            closed: false,
            committed: false,
        }
    }

    /// Final destination of the output
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File currently being written
    fn write_path(&self) -> &Path {
        self.staging.as_deref().unwrap_or(&self.path)
    }

    async fn encoder(&mut self) -> Result<&mut JsonArraySink<BufWriter<File>>> {
        if self.closed {
            return Err(SinkError::Finished.into());
        }
        if self.encoder.is_none() {
            let path = self.write_path().to_path_buf();
            let file = File::create(&path)
                .await
                .map_err(|source| SinkError::Open {
                    path: path.clone(),
                    source,
                })?;
            tracing::debug!(path = %path.display(), "opened output file");
            self.encoder = Some(JsonArraySink::new(BufWriter::new(file)));
        }
        self.encoder
            .as_mut()
            .ok_or_else(|| SinkError::Finished.into())
    }
}

#[async_trait]
impl DocumentSink for FileSink {
    async fn write_page(&mut self, documents: &[Document]) -> Result<()> {
        self.encoder().await?.write_page(documents).await?;
        self.written += documents.len();
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.encoder().await?.finish().await?;
        self.closed = true;

        if let Some(encoder) = self.encoder.take() {
            let file = encoder.into_inner().into_inner();
            file.sync_all().await.map_err(SinkError::Write)?;
        }

        if let Some(staging) = &self.staging {
            tokio::fs::rename(staging, &self.path)
                .await
                .map_err(|source| SinkError::Commit {
                    from: staging.clone(),
                    to: self.path.clone(),
                    source,
                })?;
        }

        self.committed = true;
        tracing::debug!(path = %self.path.display(), records = self.written, "output file complete");
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        // A failed finish still leaves the staging file to clean up.
        if self.committed {
            return Ok(());
        }
        self.closed = true;

        if let Some(mut encoder) = self.encoder.take() {
            encoder.abort().await?;
        }

        match &self.staging {
            Some(staging) => match tokio::fs::remove_file(staging).await {
                Ok(()) => {
                    tracing::debug!(path = %staging.display(), "removed partial output");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(SinkError::Write(e).into()),
            },
            None if self.written > 0 => {
                tracing::warn!(
                    path = %self.path.display(),
                    records = self.written,
                    "output file left incomplete"
                );
            }
            None => {}
        }
        Ok(())
    }

    fn records_written(&self) -> usize {
        self.written
    }
}

/// Sink printing every page as a JSON array on its own line
#[derive(Debug)]
pub struct ConsoleSink<W> {
    writer: W,
    written: usize,
}

impl ConsoleSink<tokio::io::Stdout> {
    /// Print to the process's standard output
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> ConsoleSink<W> {
    /// Print to `writer`
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> DocumentSink for ConsoleSink<W> {
    async fn write_page(&mut self, documents: &[Document]) -> Result<()> {
        let mut line = serde_json::to_vec(documents).map_err(SinkError::Encode)?;
        line.push(b'\n');
        self.writer.write_all(&line).await.map_err(SinkError::Write)?;
        self.writer.flush().await.map_err(SinkError::Write)?;
        self.written += documents.len();
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.writer.flush().await.map_err(SinkError::Write)?;
        Ok(())
    }

    fn records_written(&self) -> usize {
        self.written
    }
}

/// Build the sink for an output target
pub fn open_sink(target: &OutputTarget) -> Box<dyn DocumentSink> {
    match target {
        OutputTarget::Console => Box::new(ConsoleSink::stdout()),
        OutputTarget::File {
            path,
            atomic_write: false,
        } => Box::new(FileSink::new(path)),
        OutputTarget::File {
            path,
            atomic_write: true,
        } => Box::new(FileSink::atomic(path)),
    }
}

/// `<path>.part`, next to the destination so the final rename stays on one filesystem
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".part");
    path.with_file_name(name)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn docs(range: std::ops::Range<u64>) -> Vec<Document> {
        range.map(|id| json!({ "id": id, "name": format!("doc-{id}") })).collect()
    }

    async fn encode_pages(pages: &[Vec<Document>]) -> Vec<u8> {
        let mut sink = JsonArraySink::new(Vec::new());
        for page in pages {
            sink.write_page(page).await.unwrap();
        }
        sink.finish().await.unwrap();
        sink.into_inner()
    }

    #[tokio::test]
    async fn streamed_pages_match_one_shot_serialization() {
        let all = docs(0..7);
        let one_shot = serde_json::to_vec(&all).unwrap();

        let splits: Vec<Vec<Vec<Document>>> = vec![
            vec![all.clone()],
            vec![docs(0..2), docs(2..4), docs(4..6), docs(6..7)],
            vec![docs(0..1), docs(1..7)],
            vec![vec![], docs(0..3), vec![], docs(3..7), vec![]],
        ];

        for pages in splits {
            assert_eq!(encode_pages(&pages).await, one_shot);
        }
    }

    #[tokio::test]
    async fn no_pages_encode_as_empty_array() {
        assert_eq!(encode_pages(&[]).await, b"[]");
        assert_eq!(encode_pages(&[vec![]]).await, b"[]");
    }

    #[tokio::test]
    async fn unfinished_encoder_output_is_not_valid_json() {
        let mut sink = JsonArraySink::new(Vec::new());
        sink.write_page(&docs(0..2)).await.unwrap();

        let partial = sink.into_inner();

        assert!(partial.starts_with(b"["));
        assert!(serde_json::from_slice::<Value>(&partial).is_err());
    }

    #[tokio::test]
    async fn writes_after_finish_are_rejected() {
        let mut sink = JsonArraySink::new(Vec::new());
        sink.finish().await.unwrap();

        assert!(matches!(
            sink.write_page(&docs(0..1)).await,
            Err(Error::Sink(SinkError::Finished))
        ));
        assert!(matches!(
            sink.finish().await,
            Err(Error::Sink(SinkError::Finished))
        ));
    }

    #[tokio::test]
    async fn records_written_counts_documents() {
        let mut sink = JsonArraySink::new(Vec::new());
        sink.write_page(&docs(0..3)).await.unwrap();
        sink.write_page(&docs(3..5)).await.unwrap();
        assert_eq!(sink.records_written(), 5);
    }

    #[tokio::test]
    async fn file_sink_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("movies.json");
        std::fs::write(&path, "stale content that is much longer than the output").unwrap();

        let mut sink = FileSink::new(&path);
        sink.write_page(&docs(0..2)).await.unwrap();
        sink.write_page(&docs(2..3)).await.unwrap();
        sink.finish().await.unwrap();

        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, Value::Array(docs(0..3)));
        assert_eq!(sink.records_written(), 3);
    }

    #[tokio::test]
    async fn file_sink_is_not_created_before_first_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("untouched.json");

        let mut sink = FileSink::new(&path);
        sink.abort().await.unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn aborted_file_sink_leaves_truncated_array() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.json");

        let mut sink = FileSink::new(&path);
        sink.write_page(&docs(0..2)).await.unwrap();
        sink.abort().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with('['));
        assert!(!content.ends_with(']'));
        assert!(serde_json::from_str::<Value>(&content).is_err());
    }

    #[tokio::test]
    async fn atomic_sink_only_publishes_on_finish() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("movies.json");
        let staging = temp_dir.path().join("movies.json.part");

        let mut sink = FileSink::atomic(&path);
        sink.write_page(&docs(0..2)).await.unwrap();
        assert!(staging.exists());
        assert!(!path.exists(), "target must not appear before finish");

        sink.finish().await.unwrap();

        assert!(!staging.exists());
        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, Value::Array(docs(0..2)));
    }

    #[tokio::test]
    async fn aborted_atomic_sink_keeps_previous_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("movies.json");
        std::fs::write(&path, "[1,2,3]").unwrap();

        let mut sink = FileSink::atomic(&path);
        sink.write_page(&docs(0..2)).await.unwrap();
        sink.abort().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1,2,3]");
        assert!(!temp_dir.path().join("movies.json.part").exists());
    }

    #[tokio::test]
    async fn failed_commit_is_cleaned_up_by_abort() {
        let temp_dir = TempDir::new().unwrap();
        // A non-empty directory at the target makes the final rename fail
        let path = temp_dir.path().join("movies.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();
        let staging = temp_dir.path().join("movies.json.part");

        let mut sink = FileSink::atomic(&path);
        sink.write_page(&docs(0..2)).await.unwrap();
        let err = sink.finish().await.unwrap_err();
        assert!(matches!(err, Error::Sink(SinkError::Commit { .. })), "{err:?}");
        assert!(staging.exists());

        sink.abort().await.unwrap();

        assert!(!staging.exists(), "staging file must not outlive a failed commit");
        assert!(path.join("keep").exists());
    }

    #[tokio::test]
    async fn abort_after_successful_finish_keeps_output() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("movies.json");

        let mut sink = FileSink::atomic(&path);
        sink.write_page(&docs(0..2)).await.unwrap();
        sink.finish().await.unwrap();
        sink.abort().await.unwrap();

        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, Value::Array(docs(0..2)));
    }

    #[tokio::test]
    async fn file_sink_reports_open_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing-dir").join("out.json");

        let mut sink = FileSink::new(&path);
        let err = sink.write_page(&docs(0..1)).await.unwrap_err();

        match err {
            Error::Sink(SinkError::Open { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn console_sink_prints_one_array_per_page() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.write_page(&docs(0..2)).await.unwrap();
        sink.write_page(&[]).await.unwrap();
        sink.write_page(&docs(2..3)).await.unwrap();
        sink.finish().await.unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            serde_json::from_str::<Value>(lines[0]).unwrap(),
            Value::Array(docs(0..2))
        );
        assert_eq!(lines[1], "[]");
        assert_eq!(
            serde_json::from_str::<Value>(lines[2]).unwrap(),
            Value::Array(docs(2..3))
        );
    }

    #[test]
    fn staging_path_sits_next_to_target() {
        assert_eq!(
            staging_path(Path::new("/data/movies.json")),
            PathBuf::from("/data/movies.json.part")
        );
        assert_eq!(
            staging_path(Path::new("movies")),
            PathBuf::from("movies.part")
        );
    }
}
