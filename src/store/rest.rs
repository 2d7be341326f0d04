use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::header::HeaderValue;
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::error::TrackerError;
use crate::fetch::{ApiKey, BasicClient, HttpClient, json_request, send};
use crate::ingest::accept_values;
use crate::model::{NewRoll, NewUsage, RawUsageRecord, RollSpec, UsagePatch, UsageRecord};
use crate::store::RecordStore;

const USAGE_TABLE: &str = "roll_usage";
const ROLL_TABLE: &str = "packaging_rolls";

/// Usage rows are always read with the roll projection embedded.
const USAGE_SELECT: &str = "*,packaging_rolls(barcode,roll_name)";

/// Client for a PostgREST-style managed store (`/rest/v1/<table>`).
///
/// Timestamps without an offset are read in `zone`.
pub struct RestRecordStore<C, Tz = Utc> {
    client: C,
    base_url: String,
    zone: Tz,
}

impl RestRecordStore<ApiKey<ApiKey<BasicClient>>> {
    /// Connects with the store's `apikey` header plus a bearer token.
    pub fn connect(base_url: &str, api_key: &str, access_token: &str) -> Result<Self> {
        let client = ApiKey::new(
            ApiKey::bearer(BasicClient::new()?, access_token)?,
            "apikey",
            api_key,
        )?;
        Ok(Self::with_client(client, base_url))
    }
}

impl<C: HttpClient> RestRecordStore<C> {
    pub fn with_client(client: C, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            zone: Utc,
        }
    }
}

impl<C: HttpClient, Tz: TimeZone> RestRecordStore<C, Tz> {
    pub fn with_zone<Z: TimeZone>(self, zone: Z) -> RestRecordStore<C, Z> {
        RestRecordStore {
            client: self.client,
            base_url: self.base_url,
            zone,
        }
    }

    fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", self.base_url, table))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<Vec<T>> {
        let body = body.map(serde_json::to_vec).transpose()?;
        let returns_rows = method != Method::GET;

        let mut req = json_request(method, url.as_str(), body)?;
        if returns_rows {
            req.headers_mut()
                .insert("prefer", HeaderValue::from_static("return=representation"));
        }

        let bytes = send(&self.client, req).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        self.call(Method::GET, url, None::<&()>).await
    }
}

/// The store answers writes with the affected rows; none means no match.
fn single<T>(rows: Vec<T>, kind: &'static str, id: &str) -> Result<T> {
    rows.into_iter().next().ok_or_else(|| {
        TrackerError::NotFound {
            kind,
            id: id.to_string(),
        }
        .into()
    })
}

fn eq(id: &str) -> String {
    format!("eq.{id}")
}

#[async_trait]
impl<C: HttpClient, Tz: TimeZone + Send + Sync> RecordStore for RestRecordStore<C, Tz> {
    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    async fn list_usage(&self) -> Result<Vec<UsageRecord>> {
        let url = self.table_url(
            USAGE_TABLE,
            &[("select", USAGE_SELECT), ("order", "usage_date.desc")],
        )?;
        let rows: Vec<serde_json::Value> = self.get(url).await?;

        let ingested = accept_values(rows, &self.zone);
        if !ingested.rejected.is_empty() {
            warn!(
                rejected = ingested.rejected.len(),
                "Some usage rows were skipped"
            );
        }
        info!(records = ingested.records.len(), "Usage records fetched");
        Ok(ingested.records)
    }

    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    async fn list_rolls(&self) -> Result<Vec<RollSpec>> {
        let url = self.table_url(ROLL_TABLE, &[("select", "*"), ("order", "created_at.desc")])?;
        let rolls: Vec<RollSpec> = self.get(url).await?;
        info!(rolls = rolls.len(), "Roll catalog fetched");
        Ok(rolls)
    }

    #[tracing::instrument(skip(self, usage), fields(roll_id = %usage.roll_id))]
    async fn create_usage(&self, usage: &NewUsage) -> Result<UsageRecord> {
        let url = self.table_url(USAGE_TABLE, &[("select", USAGE_SELECT)])?;
        let rows: Vec<RawUsageRecord> = self.call(Method::POST, url, Some(usage)).await?;
        let raw = single(rows, "usage", "(new)")?;
        Ok(raw.into_record(&self.zone)?)
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update_usage(&self, id: &str, patch: &UsagePatch) -> Result<UsageRecord> {
        let filter = eq(id);
        let url = self.table_url(
            USAGE_TABLE,
            &[("id", filter.as_str()), ("select", USAGE_SELECT)],
        )?;
        let rows: Vec<RawUsageRecord> = self.call(Method::PATCH, url, Some(patch)).await?;
        Ok(single(rows, "usage", id)?.into_record(&self.zone)?)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_usage(&self, id: &str) -> Result<()> {
        let filter = eq(id);
        let url = self.table_url(USAGE_TABLE, &[("id", filter.as_str())])?;
        let rows: Vec<serde_json::Value> = self.call(Method::DELETE, url, None::<&()>).await?;
        single(rows, "usage", id)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, roll), fields(barcode = %roll.barcode))]
    async fn create_roll(&self, roll: &NewRoll) -> Result<RollSpec> {
        roll.validate()?;
        let url = self.table_url(ROLL_TABLE, &[("select", "*")])?;
        let rows: Vec<RollSpec> = self.call(Method::POST, url, Some(roll)).await?;
        single(rows, "roll", "(new)")
    }

    #[tracing::instrument(skip(self, roll))]
    async fn update_roll(&self, id: &str, roll: &NewRoll) -> Result<RollSpec> {
        roll.validate()?;
        let filter = eq(id);
        let url =
            self.table_url(ROLL_TABLE, &[("id", filter.as_str()), ("select", "*")])?;
        let rows: Vec<RollSpec> = self.call(Method::PATCH, url, Some(roll)).await?;
        single(rows, "roll", id)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_roll(&self, id: &str) -> Result<()> {
        let filter = eq(id);
        let url = self.table_url(ROLL_TABLE, &[("id", filter.as_str())])?;
        let rows: Vec<serde_json::Value> = self.call(Method::DELETE, url, None::<&()>).await?;
        single(rows, "roll", id)?;
        Ok(())
    }
}
