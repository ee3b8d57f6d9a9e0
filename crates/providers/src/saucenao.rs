//! SauceNAO reverse-image-search client and response model.

use crate::de::{lenient_f64, lenient_i64, lenient_u64};
use crate::http::{FilePart, HttpTransport};
use crate::{dump_raw, read_document, ImageUpload, PostId, ProviderError, SimilarityProvider};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const API_URL: &str = "https://saucenao.com/search.php";
pub const MAX_FETCH_ATTEMPTS: u32 = 3;
pub const RETRY_BACKOFF: Duration = Duration::from_secs(10);
pub const DEFAULT_NUM_RESULTS: u32 = 4;

const SERVICE: &str = "saucenao";
const OUTPUT_TYPE_JSON: &str = "2";

/// Database the search is restricted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchIndex {
    #[default]
    E621,
    Gelbooru,
}

impl SearchIndex {
    pub const fn id(self) -> i64 {
        match self {
            SearchIndex::E621 => 29,
            SearchIndex::Gelbooru => 25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SauceNaoConfig {
    pub api_key: String,
    pub index: SearchIndex,
    pub num_results: u32,
    /// Where to store each raw response body, if anywhere.
    pub raw_dump: Option<PathBuf>,
}

#[derive(Clone)]
pub struct SauceNaoClient {
    transport: Arc<dyn HttpTransport>,
    url: String,
    max_attempts: u32,
    backoff: Duration,
    raw_dump: Option<PathBuf>,
}

impl SauceNaoClient {
    pub fn new(cfg: SauceNaoConfig, transport: Arc<dyn HttpTransport>) -> Result<Self, ProviderError> {
        Self::with_endpoint(API_URL, cfg, transport)
    }

    pub fn with_endpoint(
        endpoint: &str,
        cfg: SauceNaoConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ProviderError> {
        let params = [
            ("api_key", cfg.api_key),
            ("db", cfg.index.id().to_string()),
            ("output_type", OUTPUT_TYPE_JSON.to_string()),
            ("testmode", "1".to_string()),
            ("numres", cfg.num_results.to_string()),
        ];
        let url = reqwest::Url::parse_with_params(endpoint, &params)
            .map_err(|e| ProviderError::RequestFailed(format!("invalid endpoint {}: {}", endpoint, e)))?;
        Ok(Self {
            transport,
            url: url.into(),
            max_attempts: MAX_FETCH_ATTEMPTS,
            backoff: RETRY_BACKOFF,
            raw_dump: cfg.raw_dump,
        })
    }

    pub fn with_retry_policy(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Posts the image until a 200 arrives. A 403 means the key is bad and is
    /// never retried; every other failure costs one attempt and one backoff.
    async fn fetch(&self, upload: &ImageUpload) -> Result<String, ProviderError> {
        let mut last_status = None;
        for attempt in 1..=self.max_attempts {
            let file = FilePart {
                field: "file",
                file_name: upload.file_name.clone(),
                bytes: upload.bytes.clone(),
            };
            match self.transport.post_file(&self.url, file).await {
                Ok(resp) if resp.status == 200 => return Ok(resp.body),
                Ok(resp) if resp.status == 403 => {
                    return Err(ProviderError::Auth { service: SERVICE })
                }
                Ok(resp) => {
                    last_status = Some(resp.status);
                    warn!(attempt, "saucenao answered with status {}", resp.status);
                }
                Err(e) => warn!(attempt, "saucenao request failed: {}", e),
            }
            if attempt < self.max_attempts {
                debug!("sleeping {:?} before retrying", self.backoff);
                tokio::time::sleep(self.backoff).await;
            }
        }
        Err(ProviderError::ExhaustedRetries {
            attempts: self.max_attempts,
            last_status,
        })
    }
}

#[async_trait::async_trait]
impl SimilarityProvider for SauceNaoClient {
    async fn search(&self, upload: ImageUpload) -> Result<SimilarityResponse, ProviderError> {
        let body = self.fetch(&upload).await?;
        dump_raw(self.raw_dump.as_deref(), &body).await;
        parse_response(&body)
    }
}

pub fn parse_response(text: &str) -> Result<SimilarityResponse, ProviderError> {
    serde_json::from_str(text).map_err(|source| ProviderError::Parse {
        what: "saucenao response",
        source,
    })
}

/// Loads a response previously stored with the raw-dump option.
pub fn load_response(path: &Path) -> Result<SimilarityResponse, ProviderError> {
    parse_response(&read_document(path)?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimilarityResponse {
    pub header: ResponseHeader,
    #[serde(default)]
    pub results: Vec<SimilarityResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseHeader {
    #[serde(deserialize_with = "lenient_i64")]
    pub user_id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub short_limit: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub long_limit: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub short_remaining: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub long_remaining: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub status: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub search_depth: i64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub minimum_similarity: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub results_returned: i64,
    #[serde(default)]
    pub index: BTreeMap<String, IndexStatus>,
}

/// Per-index status the service reports alongside the results.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexStatus {
    #[serde(deserialize_with = "lenient_i64")]
    pub status: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub results: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawResult")]
pub struct SimilarityResult {
    pub similarity: f64,
    pub index_id: i64,
    pub data: ResultData,
}

#[derive(Deserialize)]
struct RawResult {
    header: RawResultHeader,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct RawResultHeader {
    #[serde(deserialize_with = "lenient_f64")]
    similarity: f64,
    #[serde(deserialize_with = "lenient_i64")]
    index_id: i64,
}

impl From<RawResult> for SimilarityResult {
    fn from(raw: RawResult) -> Self {
        SimilarityResult {
            similarity: raw.header.similarity,
            index_id: raw.header.index_id,
            data: ResultData::from_index(raw.header.index_id, raw.data),
        }
    }
}

/// Source-specific payload of a result, keyed by the index it matched in.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultData {
    E621(E621Data),
    Gelbooru(GelbooruData),
    /// Any other index, or a known index whose payload lacks its id field.
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct E621Data {
    #[serde(deserialize_with = "lenient_u64")]
    pub e621_id: u64,
    #[serde(default)]
    pub ext_urls: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GelbooruData {
    #[serde(deserialize_with = "lenient_u64")]
    pub gelbooru_id: u64,
    #[serde(default)]
    pub ext_urls: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl ResultData {
    pub fn from_index(index_id: i64, data: Value) -> Self {
        let typed = match index_id {
            id if id == SearchIndex::E621.id() => {
                serde_json::from_value(data.clone()).map(ResultData::E621)
            }
            id if id == SearchIndex::Gelbooru.id() => {
                serde_json::from_value(data.clone()).map(ResultData::Gelbooru)
            }
            _ => return ResultData::Other(data),
        };
        typed.unwrap_or(ResultData::Other(data))
    }

    /// Post id on the metadata service. Only e621 matches carry one.
    pub fn post_id(&self) -> Option<PostId> {
        match self {
            ResultData::E621(d) => Some(PostId(d.e621_id)),
            ResultData::Gelbooru(_) | ResultData::Other(_) => None,
        }
    }
}
