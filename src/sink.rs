//! Destinations for the CSV export.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::info;

/// Somewhere a rendered CSV export can be delivered.
#[async_trait]
pub trait CsvSink: Send + Sync {
    /// Delivers `csv` under `filename` and returns where it ended up.
    async fn deliver(&self, filename: &str, csv: &str) -> Result<String>;
}

/// Writes exports into a local directory, creating it if needed.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl CsvSink for FileSink {
    #[tracing::instrument(skip(self, csv), fields(dir = %self.dir.display()))]
    async fn deliver(&self, filename: &str, csv: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("cannot create {}", self.dir.display()))?;

        let path = self.dir.join(filename);
        tokio::fs::write(&path, csv)
            .await
            .with_context(|| format!("cannot write {}", path.display()))?;

        let location = path.display().to_string();
        info!(location = %location, bytes = csv.len(), "CSV export written");
        Ok(location)
    }
}

/// Uploads exports to `s3://<bucket>/exports/`, optionally gzip-compressed.
pub struct S3Sink {
    client: aws_sdk_s3::Client,
    bucket: String,
    gzip: bool,
}

impl S3Sink {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, gzip: bool) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            gzip,
        }
    }

    /// Loads AWS credentials and region from the environment.
    pub async fn from_env(bucket: impl Into<String>, gzip: bool) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket, gzip)
    }
}

/// Object key and body for an export, compressing when asked to.
fn prepare_upload(filename: &str, csv: &str, gzip: bool) -> Result<(String, Vec<u8>)> {
    if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(csv.as_bytes())?;
        let compressed = encoder.finish()?;
        Ok((format!("exports/{filename}.gz"), compressed))
    } else {
        Ok((format!("exports/{filename}"), csv.as_bytes().to_vec()))
    }
}

#[async_trait]
impl CsvSink for S3Sink {
    #[tracing::instrument(skip(self, csv), fields(bucket = %self.bucket, gzip = self.gzip))]
    async fn deliver(&self, filename: &str, csv: &str) -> Result<String> {
        let (key, body) = prepare_upload(filename, csv, self.gzip)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .send()
            .await?;

        let location = format!("s3://{}/{}", self.bucket, key);
        info!(location = %location, "CSV export uploaded");
        Ok(location)
    }
}
