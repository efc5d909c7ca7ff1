use async_trait::async_trait;
use std::str::FromStr;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::debug;

use super::document::IndexDocument;
use crate::domain::Address;
use crate::error::{ImporterError, Result};

/// Destination for addresses leaving the pipeline.
#[async_trait]
pub trait AddressSink: Send {
    async fn write(&mut self, address: &Address) -> Result<()>;

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// The address record as-is
    #[default]
    Address,
    /// Search index document; addresses without a guid are skipped
    Document,
}

impl FromStr for OutputFormat {
    type Err = ImporterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "address" => Ok(OutputFormat::Address),
            "document" => Ok(OutputFormat::Document),
            other => Err(ImporterError::Config(format!("Unknown output format: {}", other))),
        }
    }
}

/// Newline-delimited JSON over any async writer.
pub struct JsonLinesSink<W: AsyncWrite + Unpin + Send> {
    writer: BufWriter<W>,
    format: OutputFormat,
    line: Vec<u8>,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer: BufWriter::new(writer),
            format,
            line: Vec::with_capacity(256),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> AddressSink for JsonLinesSink<W> {
    async fn write(&mut self, address: &Address) -> Result<()> {
        self.line.clear();
        match self.format {
            OutputFormat::Address => serde_json::to_writer(&mut self.line, address)?,
            OutputFormat::Document => match IndexDocument::from_address(address) {
                Some(doc) => serde_json::to_writer(&mut self.line, &doc)?,
                None => {
                    debug!(street = %address.street, "Skipping document without guid");
                    return Ok(());
                }
            },
        }
        self.line.push(b'\n');
        self.writer.write_all(&self.line).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Collects everything written, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub addresses: Vec<Address>,
    pub flushed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AddressSink for MemorySink {
    async fn write(&mut self, address: &Address) -> Result<()> {
        self.addresses.push(address.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.flushed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deduped(street: &str, guid: &str) -> Address {
        let mut address = Address::new(street, 1.0, 2.0);
        address.house_number = Some("10".into());
        address.guid = Some(guid.into());
        address
    }

    #[tokio::test]
    async fn test_json_lines_address_format() {
        let mut sink = JsonLinesSink::new(Vec::new(), OutputFormat::Address);
        sink.write(&deduped("Main St", "g-1")).await.unwrap();
        sink.write(&deduped("Elm St", "g-2")).await.unwrap();
        sink.flush().await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Address = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.street, "Main St");
        assert_eq!(first.guid.as_deref(), Some("g-1"));
    }

    #[tokio::test]
    async fn test_document_format_skips_missing_guid() {
        let mut sink = JsonLinesSink::new(Vec::new(), OutputFormat::Document);
        sink.write(&Address::new("No Guid Rd", 1.0, 2.0)).await.unwrap();
        sink.write(&deduped("Main St", "g-1")).await.unwrap();
        sink.flush().await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let docs: Vec<IndexDocument> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "g-1");
        assert_eq!(docs[0].name, "10 Main St");
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("Document".parse::<OutputFormat>().unwrap(), OutputFormat::Document);
        assert!("parquet".parse::<OutputFormat>().is_err());
    }
}
