use slack_morphism::prelude::*;

use tribal_cache::CacheStats;
use tribal_context::manager::ContextStats;
use tribal_llm::FallbackStatus;
use tribal_mcp::client::ConnectivityStatus;

/// Everything the home-tab view needs, gathered by the dispatcher from
/// C1/C2/C3/C4 before rendering — kept a plain data bag so the rendering
/// itself stays a pure, testable function.
pub struct HomeViewData<'a> {
    pub mcp_status: &'a [ConnectivityStatus],
    pub llm_primary_model: &'a str,
    pub llm_fallback: FallbackStatus,
    pub context_stats: ContextStats,
    pub cache_stats: CacheStats,
    pub cache_enabled: bool,
}

/// Build the static informational home-tab view: MCP connectivity, LLM
/// configuration, thread-context store stats, cache stats.
pub fn build_home_view(data: &HomeViewData) -> SlackHomeView {
    let mut blocks = Vec::new();

    blocks.push(header_block("Tribal Bot Status"));
    blocks.push(SlackBlock::Divider(SlackDividerBlock::new()));

    blocks.push(section(&format!("*MCP Servers*\n{}", mcp_lines(data.mcp_status))));
    blocks.push(section(&format!(
        "*LLM*\nPrimary model: `{}`\nFallback: {}",
        data.llm_primary_model,
        fallback_line(&data.llm_fallback),
    )));
    blocks.push(section(&format!(
        "*Thread Contexts*\nTotal: {}\nNewest update: {}\nOldest update: {}",
        data.context_stats.total_contexts,
        data.context_stats.newest_update.as_deref().unwrap_or("\u{2014}"),
        data.context_stats.oldest_update.as_deref().unwrap_or("\u{2014}"),
    )));
    blocks.push(section(&format!(
        "*Query Cache* ({})\nEntries: {}\nTotal hits: {}\nAvg hit count: {:.2}",
        if data.cache_enabled { "enabled" } else { "disabled" },
        data.cache_stats.total_entries,
        data.cache_stats.total_hits,
        data.cache_stats.avg_hit_count,
    )));

    SlackHomeView::new(blocks)
}

fn mcp_lines(statuses: &[ConnectivityStatus]) -> String {
    if statuses.is_empty() {
        return "_no servers configured_".to_string();
    }
    statuses
        .iter()
        .map(|s| {
            let icon = if s.reachable { "\u{2705}" } else { "\u{274c}" };
            format!("{icon} `{}` — {} tools", s.server_id, s.tool_count)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn fallback_line(status: &FallbackStatus) -> String {
    match (status.enabled, status.configured) {
        (true, true) => "enabled and configured".to_string(),
        (true, false) => "enabled but not configured".to_string(),
        (false, _) => "disabled".to_string(),
    }
}

fn header_block(text: &str) -> SlackBlock {
    SlackBlock::Header(SlackHeaderBlock::new(SlackBlockPlainText::new(text.to_string())))
}

fn section(text: &str) -> SlackBlock {
    SlackBlock::Section(SlackSectionBlock::new().with_text(SlackBlockText::MarkDown(SlackBlockMarkDownText::new(text.to_string()))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> HomeViewData<'static> {
        HomeViewData {
            mcp_status: &[],
            llm_primary_model: "anthropic/claude-sonnet-4",
            llm_fallback: FallbackStatus { enabled: true, configured: true },
            context_stats: ContextStats { total_contexts: 3, newest_update: None, oldest_update: None },
            cache_stats: CacheStats { total_entries: 5, total_hits: 2, avg_hit_count: 0.4, oldest_entry: None, newest_entry: None },
            cache_enabled: true,
        }
    }

    #[test]
    fn builds_a_block_per_section() {
        let view = build_home_view(&data());
        assert_eq!(view.blocks.len(), 6);
    }

    #[test]
    fn reports_no_servers_configured_when_list_is_empty() {
        assert_eq!(mcp_lines(&[]), "_no servers configured_");
    }

    #[test]
    fn reports_reachable_and_unreachable_servers_distinctly() {
        let statuses = vec![
            ConnectivityStatus { server_id: "synth-mcp".to_string(), reachable: true, tool_count: 5 },
            ConnectivityStatus { server_id: "postgres-mcp".to_string(), reachable: false, tool_count: 0 },
        ];
        let text = mcp_lines(&statuses);
        assert!(text.contains("synth-mcp"));
        assert!(text.contains("postgres-mcp"));
        assert!(text.contains("0 tools"));
    }
}
