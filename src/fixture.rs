//! JSON fixture data source
//!
//! Serves rows from a JSON document, either a plain array of row objects
//! (answered for every URI) or an object keyed by URI:
//!
//! ```json
//! { "content://contacts": [ { "_id": 1, "display_name": "Ann", "starred": 1 } ] }
//! ```
//!
//! Rows are projected onto the requested columns. A `sortOrder` of the form
//! `column [ASC|DESC]` is honored; `selection` is not interpreted.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as Json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{BinderyError, Result};
use crate::loader::{DataSource, QueryRequest};
use crate::row::{RowCursor, VecCursor};

#[derive(Debug, Clone, Default)]
pub struct JsonFixture {
    /// Rows answered for any URI not listed in `by_uri`
    fallback: Option<Vec<Json>>,
    by_uri: BTreeMap<String, Vec<Json>>,
    latency: Option<Duration>,
}

impl JsonFixture {
    pub fn from_json(json: Json) -> Result<Self> {
        match json {
            Json::Array(rows) => Ok(Self {
                fallback: Some(rows),
                ..Default::default()
            }),
            Json::Object(entries) => {
                let mut by_uri = BTreeMap::new();
                for (uri, rows) in entries {
                    let Json::Array(rows) = rows else {
                        return Err(BinderyError::Query {
                            uri,
                            details: "fixture rows must be an array".into(),
                        });
                    };
                    by_uri.insert(uri, rows);
                }
                Ok(Self {
                    by_uri,
                    ..Default::default()
                })
            }
            _ => Err(BinderyError::Query {
                uri: String::new(),
                details: "fixture must be an array or an object keyed by URI".into(),
            }),
        }
    }

    pub fn parse(json: &str) -> Result<Self> {
        Self::from_json(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Delay every answer, to exercise cancellation
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn rows_for(&self, uri: &str) -> Option<&[Json]> {
        self.by_uri
            .get(uri)
            .or(self.fallback.as_ref())
            .map(Vec::as_slice)
    }
}

#[async_trait]
impl DataSource for JsonFixture {
    async fn query(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<Box<dyn RowCursor>> {
        if let Some(latency) = self.latency {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(BinderyError::Query {
                        uri: request.uri,
                        details: "cancelled".into(),
                    });
                }
                _ = tokio::time::sleep(latency) => {}
            }
        }

        let rows = self.rows_for(&request.uri).ok_or_else(|| BinderyError::Query {
            uri: request.uri.clone(),
            details: "no rows for this URI".into(),
        })?;

        let mut rows = rows.to_vec();
        if let Some(order) = request.sort_order.as_deref() {
            sort_rows(&mut rows, order);
        }
        debug!(uri = %request.uri, rows = rows.len(), "fixture query");

        let cursor = VecCursor::from_json_rows(&request.columns, &rows).map_err(|e| match e {
            BinderyError::Query { details, .. } => BinderyError::Query {
                uri: request.uri.clone(),
                details,
            },
            other => other,
        })?;
        Ok(Box::new(cursor))
    }
}

/// Sort by `column [ASC|DESC]`; unknown forms leave the order untouched
fn sort_rows(rows: &mut [Json], order: &str) {
    let mut parts = order.split_whitespace();
    let Some(column) = parts.next() else {
        return;
    };
    let descending = parts
        .next()
        .is_some_and(|dir| dir.eq_ignore_ascii_case("desc"));

    rows.sort_by(|a, b| {
        let ordering = compare(a.get(column), b.get(column));
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

fn compare(a: Option<&Json>, b: Option<&Json>) -> Ordering {
    match (a, b) {
        (Some(Json::Number(x)), Some(Json::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Json::String(x)), Some(Json::String(y))) => x.cmp(y),
        (None | Some(Json::Null), None | Some(Json::Null)) => Ordering::Equal,
        (None | Some(Json::Null), _) => Ordering::Less,
        (_, None | Some(Json::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
