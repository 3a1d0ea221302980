//! 검색 인덱스 어댑터.
//!
//! Elasticsearch 호환 엔드포인트에 kdata를 `_bulk` ndjson으로 upsert합니다.
//! 문서 id가 `{security_id}_{timestamp_ms}`로 고정되어 있어 같은 행을
//! 몇 번을 보내도 인덱스는 중복되지 않습니다. 호출자는 실패를 경고로만
//! 남기고 로컬 저장을 계속해야 합니다.

use std::time::Duration;

use recorder_core::{IndexConfig, KdataRow, Level, Security};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, StoreError};

/// 검색 인덱스 클라이언트.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    base_url: String,
    client: reqwest::Client,
    bulk_size: usize,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

impl SearchIndex {
    /// 설정에서 클라이언트 생성.
    ///
    /// 인덱스가 비활성화면 `Ok(None)`을 반환합니다.
    pub fn from_config(config: &IndexConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Index(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Some(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            bulk_size: config.bulk_size.max(1),
        }))
    }

    /// kdata 인덱스 이름 계약: `{type}_{exchange}_kdata_{level}`.
    pub fn kdata_index_name(security: &Security, level: Level) -> String {
        format!(
            "{}_{}_kdata_{}",
            security.security_type.as_str(),
            security.exchange,
            level.storage_name()
        )
    }

    /// kdata 행을 청크 단위로 bulk upsert.
    ///
    /// 반환값은 전송된 행 수. 한 청크라도 거부되면 에러를 반환하고,
    /// 재전송은 멱등이므로 다음 주기에 다시 시도하면 됩니다.
    pub async fn bulk_upsert_kdata(&self, index_name: &str, rows: &[KdataRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/_bulk", self.base_url);
        let mut indexed = 0usize;

        for chunk in rows.chunks(self.bulk_size) {
            let mut body = String::with_capacity(chunk.len() * 256);
            for row in chunk {
                let action = serde_json::json!({
                    "index": {
                        "_index": index_name,
                        "_id": format!("{}_{}", row.security_id, row.timestamp_ms),
                    }
                });
                body.push_str(&action.to_string());
                body.push('\n');
                body.push_str(&serde_json::to_string(row)?);
                body.push('\n');
            }

            let response = self
                .client
                .post(&url)
                .header("content-type", "application/x-ndjson")
                .body(body)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(StoreError::Index(format!(
                    "bulk request failed ({}): {}",
                    status, text
                )));
            }

            let parsed: BulkResponse = serde_json::from_str(&text)?;
            if parsed.errors {
                let failed = parsed
                    .items
                    .iter()
                    .filter(|item| item_failed(item))
                    .count();
                return Err(StoreError::Index(format!(
                    "{} of {} documents rejected",
                    failed,
                    chunk.len()
                )));
            }

            indexed += chunk.len();
            debug!(index = index_name, count = chunk.len(), "bulk upsert 완료");
        }

        Ok(indexed)
    }
}

fn item_failed(item: &serde_json::Value) -> bool {
    item.get("index")
        .and_then(|action| action.get("status"))
        .and_then(|status| status.as_u64())
        .map(|status| status >= 300)
        .unwrap_or(false)
}
