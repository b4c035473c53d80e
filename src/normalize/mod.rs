//! Response normalization.
//!
//! Turns provider payloads into the canonical shapes in [`crate::models`].
//! Structural absences (a missing points array, a missing keyword, a point
//! without a date) are errors. Value-level absences (a missing or
//! non-numeric score) become 0.

use crate::error::{Result, TrendsError};
use crate::models::{
    CategoryNode, EndpointKind, KeywordSeries, QueryRanking, RealtimeTrend, RegionScore,
    RegionTable, RelatedQuery, RequestDescriptor, Suggestion, TimeSeriesPoint,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Canonical form of one provider response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Normalized {
    Timeline(Vec<KeywordSeries>),
    Regions(Vec<RegionTable>),
    RelatedQueries(Vec<QueryRanking>),
    TrendingSearches(Vec<String>),
    RealtimeTrends(Vec<RealtimeTrend>),
    Suggestions(Vec<Suggestion>),
    Categories(Vec<CategoryNode>),
}

/// Normalize the payload answering `descriptor`.
pub fn normalize(descriptor: &RequestDescriptor, payload: &Value) -> Result<Normalized> {
    let keywords = descriptor.keywords();

    let normalized = match descriptor.endpoint() {
        EndpointKind::InterestOverTime => Normalized::Timeline(normalize_timeline(payload, &keywords)?),
        EndpointKind::InterestByRegion => Normalized::Regions(normalize_regions(payload, &keywords)?),
        EndpointKind::RelatedQueries => {
            Normalized::RelatedQueries(normalize_related_queries(payload, &keywords)?)
        }
        EndpointKind::TrendingSearches => {
            Normalized::TrendingSearches(normalize_trending_searches(payload)?)
        }
        EndpointKind::RealtimeTrendingSearches => {
            Normalized::RealtimeTrends(normalize_realtime_trends(payload)?)
        }
        EndpointKind::Suggestions => Normalized::Suggestions(normalize_suggestions(payload)?),
        EndpointKind::Categories => Normalized::Categories(normalize_categories(payload)?),
    };

    Ok(normalized)
}

/// Split a timeline payload into one series per keyword.
///
/// When `keywords` is empty the keyword set is taken from the points
/// themselves (every field except `date` and `isPartial`).
pub fn normalize_timeline(payload: &Value, keywords: &[String]) -> Result<Vec<KeywordSeries>> {
    let endpoint = EndpointKind::InterestOverTime;
    let rows = required_array(payload, endpoint, "interest_over_time")?;

    let mut dated: Vec<(NaiveDateTime, &Map<String, Value>)> = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let field = format!("interest_over_time[{}]", i);
        let point = row
            .as_object()
            .ok_or_else(|| TrendsError::normalization(endpoint, &field, "expected an object"))?;
        let date = point.get("date").ok_or_else(|| {
            TrendsError::normalization(endpoint, format!("{}.date", field), "point has no date")
        })?;
        let timestamp = parse_timestamp(date).ok_or_else(|| {
            TrendsError::normalization(
                endpoint,
                format!("{}.date", field),
                format!("unrecognized date {}", date),
            )
        })?;
        dated.push((timestamp, point));
    }

    dated.sort_by_key(|(timestamp, _)| *timestamp);
    let before = dated.len();
    dated.dedup_by_key(|(timestamp, _)| *timestamp);
    if dated.len() != before {
        debug!("Dropped {} duplicate timeline dates", before - dated.len());
    }

    let keywords = if keywords.is_empty() {
        infer_timeline_keywords(rows)
    } else {
        keywords.to_vec()
    };

    let series = keywords
        .into_iter()
        .map(|keyword| {
            let points = dated
                .iter()
                .map(|(timestamp, point)| TimeSeriesPoint {
                    timestamp: *timestamp,
                    value: score(point.get(&keyword)),
                })
                .collect();
            KeywordSeries::new(keyword, points)
        })
        .collect();

    Ok(series)
}

fn infer_timeline_keywords(rows: &[Value]) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for point in rows.iter().filter_map(Value::as_object) {
        for key in point.keys() {
            if key != "date" && key != "isPartial" && !keywords.contains(key) {
                keywords.push(key.clone());
            }
        }
    }
    keywords
}

/// One region table per keyword from `{keyword: {region: score}}`.
pub fn normalize_regions(payload: &Value, keywords: &[String]) -> Result<Vec<RegionTable>> {
    let endpoint = EndpointKind::InterestByRegion;
    let root = payload
        .as_object()
        .ok_or_else(|| TrendsError::normalization(endpoint, "<root>", "expected an object keyed by keyword"))?;

    keyword_entries(root, keywords)
        .into_iter()
        .map(|keyword| -> Result<RegionTable> {
            let regions = root
                .get(&keyword)
                .ok_or_else(|| {
                    TrendsError::normalization(endpoint, &keyword, "keyword missing from response")
                })?
                .as_object()
                .ok_or_else(|| {
                    TrendsError::normalization(endpoint, &keyword, "expected an object keyed by region")
                })?;

            let scores = regions
                .iter()
                .map(|(code, value)| RegionScore {
                    region_code: code.clone(),
                    score: score(Some(value)),
                })
                .collect();

            Ok(RegionTable { keyword, scores })
        })
        .collect()
}

/// Rising and top queries per keyword from `{keyword: {rising, top}}`.
///
/// An explicit `null` list means the provider had no data and becomes an
/// empty list; a missing list is malformed.
pub fn normalize_related_queries(payload: &Value, keywords: &[String]) -> Result<Vec<QueryRanking>> {
    let endpoint = EndpointKind::RelatedQueries;
    let root = payload
        .as_object()
        .ok_or_else(|| TrendsError::normalization(endpoint, "<root>", "expected an object keyed by keyword"))?;

    keyword_entries(root, keywords)
        .into_iter()
        .map(|keyword| -> Result<QueryRanking> {
            let entry = root
                .get(&keyword)
                .ok_or_else(|| {
                    TrendsError::normalization(endpoint, &keyword, "keyword missing from response")
                })?
                .as_object()
                .ok_or_else(|| {
                    TrendsError::normalization(endpoint, &keyword, "expected an object with rising and top")
                })?;

            let rising = query_list(entry, &keyword, "rising")?;
            let top = query_list(entry, &keyword, "top")?;
            Ok(QueryRanking { keyword, rising, top })
        })
        .collect()
}

fn query_list(entry: &Map<String, Value>, keyword: &str, list: &str) -> Result<Vec<RelatedQuery>> {
    let endpoint = EndpointKind::RelatedQueries;
    let field = format!("{}.{}", keyword, list);

    let items = match entry.get(list) {
        None => {
            return Err(TrendsError::normalization(
                endpoint,
                field,
                format!("`{}` list is missing", list),
            ))
        }
        Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(TrendsError::normalization(endpoint, field, "expected an array")),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| -> Result<RelatedQuery> {
            let query = item.get("query").and_then(Value::as_str).ok_or_else(|| {
                TrendsError::normalization(
                    endpoint,
                    format!("{}[{}].query", field, i),
                    "entry has no query text",
                )
            })?;
            let value = item
                .get("value")
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
                .unwrap_or(0.0);
            Ok(RelatedQuery {
                query: query.to_string(),
                value,
            })
        })
        .collect()
}

/// Flat list of trending search strings.
pub fn normalize_trending_searches(payload: &Value) -> Result<Vec<String>> {
    let items = required_array(payload, EndpointKind::TrendingSearches, "trending_searches")?;

    let searches = items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            other => {
                debug!("Skipping non-text trending entry: {}", other);
                None
            }
        })
        .collect();

    Ok(searches)
}

pub fn normalize_realtime_trends(payload: &Value) -> Result<Vec<RealtimeTrend>> {
    typed_list(payload, EndpointKind::RealtimeTrendingSearches, "realtime_trending_searches")
}

pub fn normalize_suggestions(payload: &Value) -> Result<Vec<Suggestion>> {
    typed_list(payload, EndpointKind::Suggestions, "suggestions")
}

/// Build the category tree from the nested `categories` mapping.
///
/// A string value is a leaf named by that string. A mapping is an inner
/// node named by the last `/` segment of its key.
pub fn normalize_categories(payload: &Value) -> Result<Vec<CategoryNode>> {
    let endpoint = EndpointKind::Categories;
    let categories = payload
        .get("categories")
        .ok_or_else(|| TrendsError::normalization(endpoint, "categories", "field is missing"))?
        .as_object()
        .ok_or_else(|| TrendsError::normalization(endpoint, "categories", "expected a nested object"))?;

    Ok(category_nodes(categories))
}

fn category_nodes(map: &Map<String, Value>) -> Vec<CategoryNode> {
    map.iter().map(|(id, value)| category_node(id, value)).collect()
}

fn category_node(id: &str, value: &Value) -> CategoryNode {
    match value {
        Value::String(name) => CategoryNode::leaf(id, name.clone()),
        Value::Object(children) => CategoryNode {
            id: id.to_string(),
            name: last_segment(id).to_string(),
            children: category_nodes(children),
        },
        Value::Array(items) => CategoryNode {
            id: id.to_string(),
            name: last_segment(id).to_string(),
            children: items
                .iter()
                .enumerate()
                .map(|(i, item)| category_node(&i.to_string(), item))
                .collect(),
        },
        Value::Null => CategoryNode::leaf(id, last_segment(id)),
        other => CategoryNode::leaf(id, other.to_string()),
    }
}

fn last_segment(id: &str) -> &str {
    match id.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment,
        _ => id,
    }
}

/// Keys to read from a keyword-indexed payload: the requested keywords, or
/// every key present when none were requested.
fn keyword_entries(root: &Map<String, Value>, keywords: &[String]) -> Vec<String> {
    if keywords.is_empty() {
        root.keys().cloned().collect()
    } else {
        keywords.to_vec()
    }
}

fn required_array<'a>(payload: &'a Value, endpoint: EndpointKind, field: &str) -> Result<&'a Vec<Value>> {
    payload
        .get(field)
        .ok_or_else(|| TrendsError::normalization(endpoint, field, "field is missing"))?
        .as_array()
        .ok_or_else(|| TrendsError::normalization(endpoint, field, "expected an array"))
}

fn typed_list<T: DeserializeOwned>(payload: &Value, endpoint: EndpointKind, field: &str) -> Result<Vec<T>> {
    required_array(payload, endpoint, field)?
        .iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item.clone()).map_err(|e| {
                TrendsError::normalization(endpoint, format!("{}[{}]", field, i), e.to_string())
            })
        })
        .collect()
}

/// Interest value clamped to `[0, 100]`; absent or non-numeric is 0.
fn score(value: Option<&Value>) -> f64 {
    value
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 100.0))
        .unwrap_or(0.0)
}

fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn day(s: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_timeline_splits_per_keyword() {
        let payload = json!({
            "interest_over_time": [
                {"date": "2024-01-01", "AI": 10, "ML": 0},
                {"date": "2024-01-02", "AI": 20, "ML": 5}
            ]
        });

        let series = normalize_timeline(&payload, &keywords(&["AI", "ML"])).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].keyword, "AI");
        assert_eq!(
            series[0].points,
            vec![
                TimeSeriesPoint { timestamp: day("2024-01-01"), value: 10.0 },
                TimeSeriesPoint { timestamp: day("2024-01-02"), value: 20.0 },
            ]
        );
        assert_eq!(series[1].keyword, "ML");
        assert_eq!(
            series[1].points.iter().map(|p| p.value).collect::<Vec<_>>(),
            vec![0.0, 5.0]
        );
    }

    #[test]
    fn test_timeline_value_level_defaults_and_clamping() {
        let payload = json!({
            "interest_over_time": [
                {"date": "2024-01-01", "AI": 150, "ML": "n/a"},
                {"date": "2024-01-02", "AI": -4}
            ]
        });

        let series = normalize_timeline(&payload, &keywords(&["AI", "ML"])).unwrap();
        let ai: Vec<f64> = series[0].points.iter().map(|p| p.value).collect();
        let ml: Vec<f64> = series[1].points.iter().map(|p| p.value).collect();
        assert_eq!(ai, vec![100.0, 0.0]);
        assert_eq!(ml, vec![0.0, 0.0]);
    }

    #[test]
    fn test_timeline_sorts_and_drops_duplicate_dates() {
        let payload = json!({
            "interest_over_time": [
                {"date": "2024-01-03", "AI": 3},
                {"date": "2024-01-01", "AI": 1},
                {"date": "2024-01-03", "AI": 99}
            ]
        });

        let series = normalize_timeline(&payload, &keywords(&["AI"])).unwrap();
        let points = &series[0].points;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, day("2024-01-01"));
        assert_eq!(points[1].value, 3.0);
    }

    #[test]
    fn test_timeline_infers_keywords_when_none_requested() {
        let payload = json!({
            "interest_over_time": [
                {"date": "2024-01-01 10:00:00", "rust": 40, "isPartial": false},
                {"date": "2024-01-01 11:00:00", "rust": 42, "go": 7, "isPartial": true}
            ]
        });

        let series = normalize_timeline(&payload, &[]).unwrap();
        let names: Vec<&str> = series.iter().map(|s| s.keyword.as_str()).collect();
        assert_eq!(names, vec!["rust", "go"]);
        assert_eq!(series[1].points[0].value, 0.0);
    }

    #[test]
    fn test_timeline_accepts_epoch_millis_and_iso_dates() {
        let payload = json!({
            "interest_over_time": [
                {"date": 1704067200000_i64, "AI": 1},
                {"date": "2024-01-02T00:00:00.000", "AI": 2},
                {"date": "2024-01-03T00:00:00Z", "AI": 3}
            ]
        });

        let series = normalize_timeline(&payload, &keywords(&["AI"])).unwrap();
        let dates: Vec<NaiveDateTime> = series[0].points.iter().map(|p| p.timestamp).collect();
        assert_eq!(dates, vec![day("2024-01-01"), day("2024-01-02"), day("2024-01-03")]);
    }

    #[test]
    fn test_timeline_structural_errors() {
        let missing_array = normalize_timeline(&json!({"data": []}), &keywords(&["AI"])).unwrap_err();
        assert_eq!(missing_array.kind(), ErrorKind::Normalization);
        assert!(missing_array.to_string().contains("interest_over_time"));

        let missing_date = normalize_timeline(
            &json!({"interest_over_time": [{"AI": 3}]}),
            &keywords(&["AI"]),
        )
        .unwrap_err();
        assert!(matches!(
            missing_date,
            TrendsError::Normalization { ref field, .. } if field == "interest_over_time[0].date"
        ));

        let bad_date = normalize_timeline(
            &json!({"interest_over_time": [{"date": "yesterday", "AI": 3}]}),
            &keywords(&["AI"]),
        );
        assert!(bad_date.is_err());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let descriptor = RequestDescriptor::new(EndpointKind::InterestOverTime).with_keywords(["AI"]);
        let payload = json!({"interest_over_time": [{"date": "2024-01-01", "AI": 10}]});

        let first = normalize(&descriptor, &payload).unwrap();
        let second = normalize(&descriptor, &payload).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_regions_copy_scores_with_defaults() {
        let payload = json!({"AI": {"US": 80, "FR": 0, "IN": 55, "XX": null}});

        let tables = normalize_regions(&payload, &keywords(&["AI"])).unwrap();
        assert_eq!(tables.len(), 1);
        let scores: Vec<(&str, f64)> = tables[0]
            .scores
            .iter()
            .map(|s| (s.region_code.as_str(), s.score))
            .collect();
        assert_eq!(scores, vec![("US", 80.0), ("FR", 0.0), ("IN", 55.0), ("XX", 0.0)]);
    }

    #[test]
    fn test_regions_missing_keyword_is_error() {
        let payload = json!({"AI": {"US": 80}});
        let err = normalize_regions(&payload, &keywords(&["AI", "ML"])).unwrap_err();
        assert!(matches!(err, TrendsError::Normalization { ref field, .. } if field == "ML"));

        assert!(normalize_regions(&json!([1, 2]), &[]).is_err());
    }

    #[test]
    fn test_related_queries() {
        let payload = json!({
            "rust": {
                "rising": [{"query": "rust 2024", "value": 250}],
                "top": [{"query": "rust lang", "value": 100}, {"query": "rust game"}]
            }
        });

        let rankings = normalize_related_queries(&payload, &keywords(&["rust"])).unwrap();
        assert_eq!(rankings[0].rising[0].value, 250.0);
        assert_eq!(rankings[0].top.len(), 2);
        assert_eq!(rankings[0].top[1].value, 0.0);
    }

    #[test]
    fn test_related_queries_missing_list_is_error_but_null_is_empty() {
        let missing = json!({"rust": {"top": []}});
        let err = normalize_related_queries(&missing, &keywords(&["rust"])).unwrap_err();
        assert!(matches!(err, TrendsError::Normalization { ref field, .. } if field == "rust.rising"));

        let null = json!({"rust": {"rising": null, "top": null}});
        let rankings = normalize_related_queries(&null, &keywords(&["rust"])).unwrap();
        assert!(rankings[0].rising.is_empty());
        assert!(rankings[0].top.is_empty());
    }

    #[test]
    fn test_categories_tree() {
        let payload = json!({
            "categories": {
                "all/arts": {
                    "all/arts/music": "Music",
                    "all/arts/tv": {"all/arts/tv/shows": "TV Shows"}
                },
                "news": "News"
            }
        });

        let tree = normalize_categories(&payload).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, "all/arts");
        assert_eq!(tree[0].name, "arts");
        assert_eq!(tree[0].children[0], CategoryNode::leaf("all/arts/music", "Music"));
        assert_eq!(tree[0].children[1].name, "tv");
        assert_eq!(tree[0].children[1].children[0].name, "TV Shows");
        assert!(tree[1].is_leaf());
        assert_eq!(tree[1].name, "News");
    }

    #[test]
    fn test_categories_missing_field_is_error() {
        let err = normalize_categories(&json!({"items": {}})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Normalization);
    }

    #[test]
    fn test_trending_realtime_and_suggestions() {
        let trending = normalize_trending_searches(&json!({"trending_searches": ["eclipse", 2024, null]})).unwrap();
        assert_eq!(trending, vec!["eclipse", "2024"]);

        let realtime = normalize_realtime_trends(&json!({
            "realtime_trending_searches": [{
                "title": "Eclipse",
                "formattedTraffic": "200K+",
                "articles": [{"articleTitle": "Totality", "articleUrl": "https://example.com", "source": "Wire"}]
            }]
        }))
        .unwrap();
        assert_eq!(realtime[0].formatted_traffic, "200K+");
        assert_eq!(realtime[0].articles[0].article_title, "Totality");

        let suggestions = normalize_suggestions(&json!({
            "suggestions": [{"title": "Rust", "type": "Programming language", "mid": "/m/0dsbpg6"}]
        }))
        .unwrap();
        assert_eq!(suggestions[0].kind, "Programming language");

        assert!(normalize_suggestions(&json!({"suggestions": [{"type": "x"}]})).is_err());
        assert!(normalize_realtime_trends(&json!({})).is_err());
    }
}
