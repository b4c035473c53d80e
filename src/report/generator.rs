//! Markdown and JSON report generation.
//!
//! This module renders the derived views of one or more provider
//! responses for the terminal or a file.

use crate::analysis::flatten_categories;
use crate::models::{
    CategoryNode, ComparisonTable, KeywordSummary, QueryRanking, RealtimeTrend, RegionRow,
    RegionTable, RelatedQuery, Report, ReportMetadata, Suggestion, View,
};
use anyhow::Result;
use chrono::{NaiveDateTime, Timelike};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", report.metadata.title));
    output.push_str(&generate_metadata_section(&report.metadata));

    for view in &report.views {
        output.push_str(&generate_view_section(view));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Render a single view without report header or footer.
pub fn generate_view_section(view: &View) -> String {
    match view {
        View::Interest { table, summaries } => generate_interest_section(table, summaries),
        View::Regions { rankings, matrix } => generate_regions_section(rankings, matrix),
        View::Related { rankings } => generate_related_section(rankings),
        View::Trending { searches } => generate_trending_section(searches),
        View::Realtime { stories } => generate_realtime_section(stories),
        View::Suggestions { suggestions } => generate_suggestions_section(suggestions),
        View::Categories { tree, total } => generate_categories_section(tree, *total),
    }
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    for request in &metadata.requests {
        section.push_str(&format!("- **Request:** `{}`\n", request));
    }
    section.push_str(&format!("- **Source:** {}\n", metadata.base_url));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push('\n');

    section
}

fn generate_interest_section(table: &ComparisonTable, summaries: &[KeywordSummary]) -> String {
    let mut section = String::new();

    section.push_str("## Interest Over Time\n\n");

    if !summaries.is_empty() {
        section.push_str("### Summary\n\n");
        section.push_str("| Keyword | Current | Previous | Change | Peak |\n");
        section.push_str("|:---|:---:|:---:|:---:|:---:|\n");
        for s in summaries {
            section.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                s.keyword,
                format_value(s.summary.current),
                format_value(s.summary.previous),
                format_delta(s.summary.delta),
                format_value(s.summary.peak),
            ));
        }
        section.push('\n');
    }

    section.push_str("### Timeline\n\n");
    let keywords = table.keywords();
    section.push_str(&format!("| Date | {} |\n", keywords.join(" | ")));
    section.push_str(&format!("|:---|{}\n", ":---:|".repeat(keywords.len())));

    for (row, timestamp) in table.timestamps.iter().enumerate() {
        let values: Vec<String> = table
            .series_by_keyword
            .iter()
            .map(|column| format_value(column.values[row]))
            .collect();
        section.push_str(&format!(
            "| {} | {} |\n",
            format_timestamp(timestamp),
            values.join(" | ")
        ));
    }
    section.push('\n');

    section
}

fn generate_regions_section(rankings: &[RegionTable], matrix: &[RegionRow]) -> String {
    let mut section = String::new();

    section.push_str("## Interest by Region\n\n");

    for table in rankings {
        section.push_str(&format!("### {}\n\n", table.keyword));
        if table.scores.is_empty() {
            section.push_str("No regions with measurable interest.\n\n");
            continue;
        }
        section.push_str("| # | Region | Score |\n");
        section.push_str("|:---:|:---|:---:|\n");
        for (i, score) in table.scores.iter().enumerate() {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                i + 1,
                score.region_code,
                format_value(score.score)
            ));
        }
        section.push('\n');
    }

    if !matrix.is_empty() {
        let keywords: Vec<&str> = rankings.iter().map(|t| t.keyword.as_str()).collect();
        section.push_str("### Side by Side\n\n");
        section.push_str(&format!("| Region | {} | Max |\n", keywords.join(" | ")));
        section.push_str(&format!("|:---|{}:---:|\n", ":---:|".repeat(keywords.len())));
        for row in matrix {
            let scores: Vec<String> = row.scores.iter().map(|v| format_value(*v)).collect();
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                row.region_code,
                scores.join(" | "),
                format_value(row.max_score)
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_related_section(rankings: &[QueryRanking]) -> String {
    let mut section = String::new();

    section.push_str("## Related Queries\n\n");

    for ranking in rankings {
        section.push_str(&format!("### {}\n\n", ranking.keyword));
        section.push_str(&generate_query_list("Rising", &ranking.rising));
        section.push_str(&generate_query_list("Top", &ranking.top));
    }

    section
}

fn generate_query_list(heading: &str, queries: &[RelatedQuery]) -> String {
    let mut list = format!("#### {}\n\n", heading);

    if queries.is_empty() {
        list.push_str("*None*\n\n");
        return list;
    }

    for (i, query) in queries.iter().enumerate() {
        list.push_str(&format!(
            "{}. {} ({})\n",
            i + 1,
            query.query,
            format_value(query.value)
        ));
    }
    list.push('\n');

    list
}

fn generate_trending_section(searches: &[String]) -> String {
    let mut section = String::from("## Trending Searches\n\n");

    if searches.is_empty() {
        section.push_str("No trending searches.\n\n");
        return section;
    }

    for (i, search) in searches.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, search));
    }
    section.push('\n');

    section
}

fn generate_realtime_section(stories: &[RealtimeTrend]) -> String {
    let mut section = String::from("## Realtime Trends\n\n");

    if stories.is_empty() {
        section.push_str("No realtime stories.\n\n");
        return section;
    }

    for (i, story) in stories.iter().enumerate() {
        section.push_str(&format!("### {}. {}\n\n", i + 1, story.title));
        if !story.formatted_traffic.is_empty() {
            section.push_str(&format!("*Traffic: {}*\n\n", story.formatted_traffic));
        }
        for article in &story.articles {
            let title = if article.article_title.is_empty() {
                &article.title
            } else {
                &article.article_title
            };
            let link = if article.article_url.is_empty() {
                title.to_string()
            } else {
                format!("[{}]({})", title, article.article_url)
            };
            let mut line = format!("- {}", link);
            if !article.source.is_empty() {
                line.push_str(&format!(" - {}", article.source));
            }
            if !article.time_ago.is_empty() {
                line.push_str(&format!(", {}", article.time_ago));
            }
            section.push_str(&line);
            section.push('\n');
        }
        section.push('\n');
    }

    section
}

fn generate_suggestions_section(suggestions: &[Suggestion]) -> String {
    let mut section = String::from("## Suggestions\n\n");

    if suggestions.is_empty() {
        section.push_str("No suggestions.\n\n");
        return section;
    }

    section.push_str("| Title | Type |\n");
    section.push_str("|:---|:---|\n");
    for suggestion in suggestions {
        section.push_str(&format!("| {} | {} |\n", suggestion.title, suggestion.kind));
    }
    section.push('\n');

    section
}

fn generate_categories_section(tree: &[CategoryNode], total: usize) -> String {
    let mut section = String::from("## Categories\n\n");

    section.push_str(&format!("*{} categories*\n\n", total));
    for (depth, node) in flatten_categories(tree) {
        section.push_str(&format!("{}- {} (`{}`)\n", "  ".repeat(depth), node.name, node.id));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by trendscope v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Whole numbers without decimals, anything else with one.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

fn format_delta(delta: f64) -> String {
    if delta > 0.0 {
        format!("+{}", format_value(delta))
    } else {
        format_value(delta)
    }
}

fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    if timestamp.hour() == 0 && timestamp.minute() == 0 && timestamp.second() == 0 {
        timestamp.format("%Y-%m-%d").to_string()
    } else {
        timestamp.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, KeywordColumn, RegionScore, SeriesSummary};
    use chrono::{NaiveDate, Utc};

    fn create_test_report(views: Vec<View>) -> Report {
        Report {
            metadata: ReportMetadata {
                title: "Trends Report".to_string(),
                requests: vec!["interest_over_time?keywords=AI".to_string()],
                base_url: "http://localhost/api".to_string(),
                generated_at: Utc::now(),
            },
            views,
        }
    }

    fn interest_view() -> View {
        let day = |d| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        View::Interest {
            table: ComparisonTable {
                timestamps: vec![day(1), day(2)],
                series_by_keyword: vec![
                    KeywordColumn {
                        keyword: "AI".to_string(),
                        values: vec![10.0, 30.0],
                    },
                    KeywordColumn {
                        keyword: "ML".to_string(),
                        values: vec![0.0, 5.5],
                    },
                ],
            },
            summaries: vec![KeywordSummary {
                keyword: "AI".to_string(),
                summary: SeriesSummary {
                    current: 30.0,
                    previous: 10.0,
                    delta: 20.0,
                    peak: 30.0,
                },
            }],
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report(vec![interest_view()]);
        let markdown = generate_markdown_report(&report);

        assert!(markdown.starts_with("# Trends Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("`interest_over_time?keywords=AI`"));
        assert!(markdown.contains("| Date | AI | ML |"));
        assert!(markdown.contains("| 2024-01-02 | 30 | 5.5 |"));
        assert!(markdown.contains("| AI | 30 | 10 | +20 | 30 |"));
        assert!(markdown.contains("Report generated by trendscope"));
    }

    #[test]
    fn test_generate_regions_section() {
        let rankings = vec![
            RegionTable {
                keyword: "AI".to_string(),
                scores: vec![RegionScore {
                    region_code: "US".to_string(),
                    score: 100.0,
                }],
            },
            RegionTable {
                keyword: "ML".to_string(),
                scores: Vec::new(),
            },
        ];
        let matrix = vec![RegionRow {
            region_code: "US".to_string(),
            scores: vec![100.0, 0.0],
            max_score: 100.0,
        }];

        let section = generate_regions_section(&rankings, &matrix);
        assert!(section.contains("| 1 | US | 100 |"));
        assert!(section.contains("No regions with measurable interest."));
        assert!(section.contains("| Region | AI | ML | Max |"));
        assert!(section.contains("| US | 100 | 0 | 100 |"));
    }

    #[test]
    fn test_generate_related_section_handles_empty_lists() {
        let section = generate_related_section(&[QueryRanking {
            keyword: "AI".to_string(),
            rising: vec![RelatedQuery {
                query: "ai art".to_string(),
                value: 250.0,
            }],
            top: Vec::new(),
        }]);

        assert!(section.contains("#### Rising\n\n1. ai art (250)"));
        assert!(section.contains("#### Top\n\n*None*"));
    }

    #[test]
    fn test_generate_realtime_section() {
        let stories = vec![RealtimeTrend {
            title: "Storm".to_string(),
            formatted_traffic: "50K+".to_string(),
            articles: vec![Article {
                title: String::new(),
                article_title: "Storm hits coast".to_string(),
                article_url: "https://news.example/storm".to_string(),
                source: "Example News".to_string(),
                time_ago: "1h ago".to_string(),
                snippet: String::new(),
                image: None,
            }],
        }];

        let section = generate_realtime_section(&stories);
        assert!(section.contains("### 1. Storm"));
        assert!(section.contains("*Traffic: 50K+*"));
        assert!(section
            .contains("- [Storm hits coast](https://news.example/storm) - Example News, 1h ago"));
    }

    #[test]
    fn test_generate_categories_section_indents() {
        let tree = vec![CategoryNode {
            id: "arts".to_string(),
            name: "Arts".to_string(),
            children: vec![CategoryNode::leaf("arts/music", "music")],
        }];

        let section = generate_categories_section(&tree, 2);
        assert!(section.contains("*2 categories*"));
        assert!(section.contains("- Arts (`arts`)\n  - music (`arts/music`)\n"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report(vec![
            interest_view(),
            View::Trending {
                searches: vec!["storm".to_string()],
            },
        ]);
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"requests\""));
        assert!(json.contains("\"view\": \"interest\""));
        assert!(json.contains("\"view\": \"trending\""));
        assert!(json.contains("\"series_by_keyword\""));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(4.26), "4.3");
        assert_eq!(format_delta(3.0), "+3");
        assert_eq!(format_delta(-3.0), "-3");
        assert_eq!(format_delta(0.0), "0");
    }
}
