//! Data models for trend queries.
//!
//! This module contains the request side (endpoints, descriptors, query
//! parameters) and the canonical shapes every provider payload is
//! normalized into.

use crate::error::{Result, TrendsError};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Most keywords the provider accepts in one query.
pub const MAX_KEYWORDS: usize = 5;

/// Endpoint kinds exposed by the trends provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    InterestOverTime,
    InterestByRegion,
    RelatedQueries,
    TrendingSearches,
    RealtimeTrendingSearches,
    Suggestions,
    Categories,
}

impl EndpointKind {
    /// Path segment appended to the provider base URL.
    pub fn path(&self) -> &'static str {
        match self {
            EndpointKind::InterestOverTime => "interest_over_time",
            EndpointKind::InterestByRegion => "interest_by_region",
            EndpointKind::RelatedQueries => "related_queries",
            EndpointKind::TrendingSearches => "trending_searches",
            EndpointKind::RealtimeTrendingSearches => "realtime_trending_searches",
            EndpointKind::Suggestions => "suggestions",
            EndpointKind::Categories => "categories",
        }
    }

    fn required_params(&self) -> &'static [&'static str] {
        match self {
            EndpointKind::InterestOverTime
            | EndpointKind::InterestByRegion
            | EndpointKind::RelatedQueries => &["keywords"],
            EndpointKind::TrendingSearches => &["geo"],
            EndpointKind::Suggestions => &["keyword"],
            EndpointKind::RealtimeTrendingSearches | EndpointKind::Categories => &[],
        }
    }

    fn optional_params(&self) -> &'static [&'static str] {
        match self {
            EndpointKind::InterestOverTime => &["timeframe", "geo", "gprop"],
            EndpointKind::InterestByRegion => &["geo"],
            _ => &[],
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A query parameter value: one string or an ordered list sent as
/// repeated `name=` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

impl ParamValue {
    fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Single(v) => vec![v.as_str()],
            ParamValue::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    fn is_blank(&self) -> bool {
        self.values().iter().all(|v| v.trim().is_empty())
    }
}

/// Everything needed to issue one provider call.
///
/// Built once through the consuming builder methods and never mutated
/// afterwards; each issued request owns its own clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    endpoint: EndpointKind,
    params: BTreeMap<String, ParamValue>,
}

impl RequestDescriptor {
    pub fn new(endpoint: EndpointKind) -> Self {
        Self {
            endpoint,
            params: BTreeMap::new(),
        }
    }

    /// Set the repeatable `keywords` parameter. Entries are trimmed and
    /// blank entries dropped.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        self.params
            .insert("keywords".to_string(), ParamValue::Multi(keywords));
        self
    }

    /// Set a single-valued parameter.
    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params
            .insert(name.to_string(), ParamValue::Single(value.into()));
        self
    }

    pub fn endpoint(&self) -> EndpointKind {
        self.endpoint
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Keywords the request asks about, in request order.
    pub fn keywords(&self) -> Vec<String> {
        match self.params.get("keywords").or_else(|| self.params.get("keyword")) {
            Some(value) => value.values().into_iter().map(String::from).collect(),
            None => Vec::new(),
        }
    }

    /// Flatten into query pairs, one pair per list element.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .flat_map(|(name, value)| {
                value
                    .values()
                    .into_iter()
                    .map(move |v| (name.clone(), v.to_string()))
            })
            .collect()
    }

    /// Check the descriptor against its endpoint's parameter table.
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint;

        for name in endpoint.required_params() {
            match self.params.get(*name) {
                Some(value) if !value.is_blank() => {}
                _ => {
                    return Err(TrendsError::user_input(format!(
                        "{} requires a non-empty `{}` parameter",
                        endpoint, name
                    )))
                }
            }
        }

        for name in self.params.keys() {
            let known = endpoint.required_params().contains(&name.as_str())
                || endpoint.optional_params().contains(&name.as_str());
            if !known {
                return Err(TrendsError::user_input(format!(
                    "{} does not accept a `{}` parameter",
                    endpoint, name
                )));
            }
        }

        if let Some(ParamValue::Multi(keywords)) = self.params.get("keywords") {
            if keywords.len() > MAX_KEYWORDS {
                return Err(TrendsError::user_input(format!(
                    "At most {} keywords can be queried at once",
                    MAX_KEYWORDS
                )));
            }
            let mut seen = HashSet::new();
            for keyword in keywords {
                if !seen.insert(keyword.to_lowercase()) {
                    return Err(TrendsError::user_input(format!(
                        "Keyword `{}` is listed more than once",
                        keyword
                    )));
                }
            }
        }

        if let Some(ParamValue::Single(timeframe)) = self.params.get("timeframe") {
            timeframe.parse::<Timeframe>()?;
        }
        if let Some(ParamValue::Single(gprop)) = self.params.get("gprop") {
            gprop.parse::<SearchProperty>()?;
        }
        if endpoint != EndpointKind::TrendingSearches {
            if let Some(ParamValue::Single(geo)) = self.params.get("geo") {
                normalize_geo(geo)?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for RequestDescriptor {
    /// `endpoint?name=value&...`, unencoded; for logs and report headers.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint)?;
        for (i, (name, value)) in self.query_pairs().iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, name, value)?;
        }
        Ok(())
    }
}

/// Unit of a relative timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Hours,
    Days,
    Months,
    Years,
}

/// Time window of an interest query: `now N-H`, `now N-d`, `today N-m`,
/// `today N-y`, or `all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Recent { count: u32, unit: TimeUnit },
    All,
}

impl Timeframe {
    pub fn past_hours(count: u32) -> Self {
        Timeframe::Recent {
            count,
            unit: TimeUnit::Hours,
        }
    }

    pub fn past_days(count: u32) -> Self {
        Timeframe::Recent {
            count,
            unit: TimeUnit::Days,
        }
    }

    pub fn past_months(count: u32) -> Self {
        Timeframe::Recent {
            count,
            unit: TimeUnit::Months,
        }
    }

    pub fn past_years(count: u32) -> Self {
        Timeframe::Recent {
            count,
            unit: TimeUnit::Years,
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::past_months(12)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::All => write!(f, "all"),
            Timeframe::Recent { count, unit } => match unit {
                TimeUnit::Hours => write!(f, "now {}-H", count),
                TimeUnit::Days => write!(f, "now {}-d", count),
                TimeUnit::Months => write!(f, "today {}-m", count),
                TimeUnit::Years => write!(f, "today {}-y", count),
            },
        }
    }
}

impl FromStr for Timeframe {
    type Err = TrendsError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            TrendsError::user_input(format!(
                "Invalid timeframe `{}` (expected `now N-H`, `now N-d`, `today N-m`, `today N-y` or `all`)",
                s
            ))
        };

        let s = s.trim();
        if s == "all" {
            return Ok(Timeframe::All);
        }

        let (anchor, rest) = s.split_once(' ').ok_or_else(invalid)?;
        let (count, unit) = rest.split_once('-').ok_or_else(invalid)?;
        let count: u32 = count.parse().map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }

        let unit = match (anchor, unit) {
            ("now", "H") => TimeUnit::Hours,
            ("now", "d") => TimeUnit::Days,
            ("today", "m") => TimeUnit::Months,
            ("today", "y") => TimeUnit::Years,
            _ => return Err(invalid()),
        };

        Ok(Timeframe::Recent { count, unit })
    }
}

/// Search vertical of an interest query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum SearchProperty {
    #[default]
    Web,
    Images,
    News,
    Youtube,
}

impl SearchProperty {
    /// Value sent as the `gprop` parameter; web search is the empty string.
    pub fn as_param(&self) -> &'static str {
        match self {
            SearchProperty::Web => "",
            SearchProperty::Images => "images",
            SearchProperty::News => "news",
            SearchProperty::Youtube => "youtube",
        }
    }
}

impl FromStr for SearchProperty {
    type Err = TrendsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "web" => Ok(SearchProperty::Web),
            "images" => Ok(SearchProperty::Images),
            "news" => Ok(SearchProperty::News),
            "youtube" => Ok(SearchProperty::Youtube),
            other => Err(TrendsError::user_input(format!(
                "Unknown search property `{}` (expected images, news, youtube or empty)",
                other
            ))),
        }
    }
}

/// Validate and upper-case a geo code. Empty means worldwide.
pub fn normalize_geo(geo: &str) -> Result<String> {
    let geo = geo.trim();
    if geo.is_empty() {
        return Ok(String::new());
    }

    let (country, subdivision) = match geo.split_once('-') {
        Some((country, sub)) => (country, Some(sub)),
        None => (geo, None),
    };

    let country_ok = country.len() == 2 && country.chars().all(|c| c.is_ascii_alphabetic());
    let sub_ok = subdivision.map_or(true, |sub| {
        (1..=3).contains(&sub.len()) && sub.chars().all(|c| c.is_ascii_alphanumeric())
    });

    if country_ok && sub_ok {
        Ok(geo.to_uppercase())
    } else {
        Err(TrendsError::user_input(format!(
            "Invalid geo `{}` (expected an ISO country code like `US` or `US-CA`)",
            geo
        )))
    }
}

/// One observation of a keyword's search interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: NaiveDateTime,
    /// Relative interest in `[0, 100]`.
    pub value: f64,
}

/// Interest timeline of one keyword, ascending by timestamp with unique
/// timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSeries {
    pub keyword: String,
    pub points: Vec<TimeSeriesPoint>,
}

impl KeywordSeries {
    pub fn new(keyword: impl Into<String>, points: Vec<TimeSeriesPoint>) -> Self {
        Self {
            keyword: keyword.into(),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One keyword's values aligned to a [`ComparisonTable`]'s timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordColumn {
    pub keyword: String,
    pub values: Vec<f64>,
}

/// Several keyword series aligned on the union of their timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub timestamps: Vec<NaiveDateTime>,
    /// Columns in input order; every column has `timestamps.len()` values.
    pub series_by_keyword: Vec<KeywordColumn>,
}

impl ComparisonTable {
    /// Values for a keyword, if it is part of the table.
    pub fn values_for(&self, keyword: &str) -> Option<&[f64]> {
        self.series_by_keyword
            .iter()
            .find(|c| c.keyword == keyword)
            .map(|c| c.values.as_slice())
    }

    pub fn keywords(&self) -> Vec<&str> {
        self.series_by_keyword
            .iter()
            .map(|c| c.keyword.as_str())
            .collect()
    }
}

/// Interest score of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionScore {
    pub region_code: String,
    pub score: f64,
}

/// Region scores of one keyword, unique by region code, in payload order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTable {
    pub keyword: String,
    pub scores: Vec<RegionScore>,
}

/// One row of a multi-keyword region comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRow {
    pub region_code: String,
    /// Score per keyword, in the order the tables were given.
    pub scores: Vec<f64>,
    pub max_score: f64,
}

/// A related search query and its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedQuery {
    pub query: String,
    pub value: f64,
}

/// Rising and top related queries of one keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRanking {
    pub keyword: String,
    pub rising: Vec<RelatedQuery>,
    pub top: Vec<RelatedQuery>,
}

/// A node of the provider's category taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    pub fn leaf(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Keyword suggestion returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
}

/// A story in the realtime trending feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeTrend {
    pub title: String,
    #[serde(default)]
    pub articles: Vec<Article>,
    #[serde(default)]
    pub formatted_traffic: String,
}

/// News article attached to a realtime trend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub article_title: String,
    #[serde(default)]
    pub article_url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub time_ago: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ArticleImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleImage {
    #[serde(default)]
    pub news_url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub image_url: String,
}

/// Headline statistics of one keyword series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub current: f64,
    pub previous: f64,
    pub delta: f64,
    pub peak: f64,
}

/// Headline statistics of a keyword, as shown next to its timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordSummary {
    pub keyword: String,
    #[serde(flatten)]
    pub summary: SeriesSummary,
}

/// One derived view of a provider response, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    Interest {
        table: ComparisonTable,
        summaries: Vec<KeywordSummary>,
    },
    Regions {
        /// Ranked regions per keyword.
        rankings: Vec<RegionTable>,
        /// Side-by-side scores; empty for a single keyword.
        matrix: Vec<RegionRow>,
    },
    Related {
        rankings: Vec<QueryRanking>,
    },
    Trending {
        searches: Vec<String>,
    },
    Realtime {
        stories: Vec<RealtimeTrend>,
    },
    Suggestions {
        suggestions: Vec<Suggestion>,
    },
    Categories {
        tree: Vec<CategoryNode>,
        total: usize,
    },
}

/// Report metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub title: String,
    /// Requests the report was built from, as `endpoint?name=value`.
    pub requests: Vec<String>,
    pub base_url: String,
    pub generated_at: DateTime<Utc>,
}

/// Complete report rendered by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub views: Vec<View>,
}
