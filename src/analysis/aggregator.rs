//! Comparison tables, summary statistics, and rankings.
//!
//! Everything here is a pure function of its inputs so it can be driven
//! directly from tests and from any presentation layer.

use crate::error::{Result, TrendsError};
use crate::models::{
    CategoryNode, ComparisonTable, KeywordColumn, KeywordSeries, KeywordSummary, QueryRanking,
    RegionRow, RegionScore, RegionTable, RelatedQuery, SeriesSummary, View,
};
use crate::normalize::Normalized;
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Align several keyword series on the sorted union of their timestamps.
///
/// Dates a keyword has no point for are filled with 0.
pub fn build_comparison_table(series: &[KeywordSeries]) -> Result<ComparisonTable> {
    if series.is_empty() {
        return Err(TrendsError::alignment("no series to compare"));
    }

    let mut seen = HashSet::new();
    for s in series {
        if s.is_empty() {
            return Err(TrendsError::alignment(format!(
                "series `{}` has no points",
                s.keyword
            )));
        }
        if !seen.insert(s.keyword.as_str()) {
            return Err(TrendsError::alignment(format!(
                "keyword `{}` appears in more than one series",
                s.keyword
            )));
        }
    }

    let timestamps: Vec<NaiveDateTime> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.timestamp))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let series_by_keyword = series
        .iter()
        .map(|s| {
            let by_date: HashMap<NaiveDateTime, f64> =
                s.points.iter().map(|p| (p.timestamp, p.value)).collect();
            KeywordColumn {
                keyword: s.keyword.clone(),
                values: timestamps
                    .iter()
                    .map(|t| by_date.get(t).copied().unwrap_or(0.0))
                    .collect(),
            }
        })
        .collect();

    Ok(ComparisonTable {
        timestamps,
        series_by_keyword,
    })
}

/// Current value, change from the previous point, and peak of a series.
pub fn summarize(series: &KeywordSeries) -> SeriesSummary {
    let values: Vec<f64> = series.points.iter().map(|p| p.value).collect();
    let current = values.last().copied().unwrap_or(0.0);
    let previous = values
        .len()
        .checked_sub(2)
        .and_then(|i| values.get(i))
        .copied()
        .unwrap_or(0.0);
    let peak = values.iter().copied().reduce(f64::max);

    SeriesSummary {
        current,
        previous,
        delta: current - previous,
        peak: peak.unwrap_or(0.0),
    }
}

/// Regions with a positive score, highest first, region code ascending on
/// ties, optionally truncated to `limit`.
pub fn rank_regions(table: &RegionTable, limit: Option<usize>) -> Vec<RegionScore> {
    let mut ranked: Vec<RegionScore> = table
        .scores
        .iter()
        .filter(|s| s.score > 0.0)
        .cloned()
        .collect();

    ranked.sort_by(|a, b| by_score_then_region(a.score, &a.region_code, b.score, &b.region_code));

    if let Some(limit) = limit {
        ranked.truncate(limit);
    }
    ranked
}

/// Side-by-side region scores for several keywords.
///
/// One row per region seen in any table, scores in table order (0 where a
/// table lacks the region). Rows whose best score is 0 are dropped; the
/// rest are ordered like [`rank_regions`] using the row maximum.
pub fn region_matrix(tables: &[RegionTable]) -> Vec<RegionRow> {
    let mut regions: Vec<&str> = Vec::new();
    let mut known = HashSet::new();
    for table in tables {
        for s in &table.scores {
            if known.insert(s.region_code.as_str()) {
                regions.push(s.region_code.as_str());
            }
        }
    }

    let lookups: Vec<HashMap<&str, f64>> = tables
        .iter()
        .map(|t| {
            t.scores
                .iter()
                .map(|s| (s.region_code.as_str(), s.score))
                .collect()
        })
        .collect();

    let mut rows: Vec<RegionRow> = regions
        .into_iter()
        .map(|region| {
            let scores: Vec<f64> = lookups
                .iter()
                .map(|l| l.get(region).copied().unwrap_or(0.0))
                .collect();
            let max_score = scores.iter().copied().fold(0.0, f64::max);
            RegionRow {
                region_code: region.to_string(),
                scores,
                max_score,
            }
        })
        .filter(|row| row.max_score > 0.0)
        .collect();

    rows.sort_by(|a, b| by_score_then_region(a.max_score, &a.region_code, b.max_score, &b.region_code));
    rows
}

fn by_score_then_region(a_score: f64, a_region: &str, b_score: f64, b_region: &str) -> Ordering {
    b_score
        .total_cmp(&a_score)
        .then_with(|| a_region.cmp(b_region))
}

/// Rising and top queries, each stable-sorted by value descending.
pub fn rank_queries(ranking: &QueryRanking) -> QueryRanking {
    QueryRanking {
        keyword: ranking.keyword.clone(),
        rising: sorted_by_value(&ranking.rising),
        top: sorted_by_value(&ranking.top),
    }
}

fn sorted_by_value(queries: &[RelatedQuery]) -> Vec<RelatedQuery> {
    let mut sorted = queries.to_vec();
    sorted.sort_by(|a, b| b.value.total_cmp(&a.value));
    sorted
}

/// Depth-first listing of a category tree with each node's depth.
pub fn flatten_categories(nodes: &[CategoryNode]) -> Vec<(usize, &CategoryNode)> {
    fn walk<'a>(nodes: &'a [CategoryNode], depth: usize, out: &mut Vec<(usize, &'a CategoryNode)>) {
        for node in nodes {
            out.push((depth, node));
            walk(&node.children, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    walk(nodes, 0, &mut out);
    out
}

/// Subtree of categories whose name or id contains `needle`
/// (case-insensitive), keeping the ancestors of every match.
pub fn filter_categories(nodes: &[CategoryNode], needle: &str) -> Vec<CategoryNode> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return nodes.to_vec();
    }

    nodes
        .iter()
        .filter_map(|node| {
            let matches = node.name.to_lowercase().contains(&needle)
                || node.id.to_lowercase().contains(&needle);
            if matches {
                return Some(node.clone());
            }
            let children = filter_categories(&node.children, &needle);
            if children.is_empty() {
                None
            } else {
                Some(CategoryNode {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    children,
                })
            }
        })
        .collect()
}

/// Total number of nodes in a category forest.
pub fn count_categories(nodes: &[CategoryNode]) -> usize {
    nodes
        .iter()
        .map(|n| 1 + count_categories(&n.children))
        .sum()
}

/// Limits applied when turning a normalized response into a [`View`].
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    /// Regions kept per keyword ranking and in the region matrix.
    pub region_limit: Option<usize>,
    /// Realtime stories kept.
    pub story_limit: Option<usize>,
    /// Case-insensitive category name or id filter.
    pub category_filter: Option<String>,
}

/// Derive the view rendered for a normalized response.
pub fn derive_view(data: Normalized, options: &ViewOptions) -> Result<View> {
    let view = match data {
        Normalized::Timeline(series) => {
            let table = build_comparison_table(&series)?;
            let summaries = series
                .iter()
                .map(|s| KeywordSummary {
                    keyword: s.keyword.clone(),
                    summary: summarize(s),
                })
                .collect();
            View::Interest { table, summaries }
        }
        Normalized::Regions(tables) => {
            let rankings = tables
                .iter()
                .map(|t| RegionTable {
                    keyword: t.keyword.clone(),
                    scores: rank_regions(t, options.region_limit),
                })
                .collect();
            let mut matrix = if tables.len() > 1 {
                region_matrix(&tables)
            } else {
                Vec::new()
            };
            if let Some(limit) = options.region_limit {
                matrix.truncate(limit);
            }
            View::Regions { rankings, matrix }
        }
        Normalized::RelatedQueries(rankings) => View::Related {
            rankings: rankings.iter().map(rank_queries).collect(),
        },
        Normalized::TrendingSearches(searches) => View::Trending { searches },
        Normalized::RealtimeTrends(mut stories) => {
            if let Some(limit) = options.story_limit {
                stories.truncate(limit);
            }
            View::Realtime { stories }
        }
        Normalized::Suggestions(suggestions) => View::Suggestions { suggestions },
        Normalized::Categories(nodes) => {
            let tree = match options.category_filter.as_deref() {
                Some(needle) => filter_categories(&nodes, needle),
                None => nodes,
            };
            let total = count_categories(&tree);
            debug!("{} categories after filtering", total);
            View::Categories { tree, total }
        }
    };

    Ok(view)
}
