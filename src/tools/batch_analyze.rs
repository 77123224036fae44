use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::pipeline::{run_scrape, PipelineOptions, ScrapeOutcome, ScrapeTarget};
use crate::analytics::compare_price;
use crate::core::types::{ItemAnalysis, MenuAnalysisRequest, MenuAnalysisResponse};
use crate::AppState;

/// Analyze every menu item against the competition concurrently.
///
/// One pipeline per item, at most `max_concurrent` at a time, each bounded by
/// `item_timeout`. Dropping a timed-out pipeline cancels its capture and any
/// in-flight replay. A failed, timed-out or unmatched item gets
/// `analysis: null` and does not affect its siblings.
pub async fn analyze_menu(
    state: &Arc<AppState>,
    request: MenuAnalysisRequest,
    options: PipelineOptions,
    max_concurrent: usize,
    item_timeout: Duration,
) -> MenuAnalysisResponse {
    let start_time = Instant::now();
    let total_items = request.items.len();
    let location = request.location.unwrap_or_default();
    let lat = location.lat.as_ref().map(|v| v.as_param());
    let lng = location.lng.as_ref().map(|v| v.as_param());

    info!(
        "Starting menu analysis of {} items near {} (concurrency: {})",
        total_items,
        location.name.as_deref().unwrap_or("default location"),
        max_concurrent
    );

    let mut items: Vec<(usize, ItemAnalysis)> = stream::iter(request.items.into_iter().enumerate())
        .map(|(idx, item)| {
            let state = Arc::clone(state);
            let target = ScrapeTarget::resolve(
                &state.config,
                Some(&item.name),
                lat.as_deref(),
                lng.as_deref(),
            );
            async move {
                let item_start = Instant::now();
                let menu_price = item.price.as_ref().map_or(0.0, |p| p.as_f64());

                let (analysis, failure) =
                    match tokio::time::timeout(item_timeout, run_scrape(&state, &target, &options)).await {
                        Ok(Ok(ScrapeOutcome::Completed(report))) => (Some(report.analytics), None),
                        Ok(Ok(ScrapeOutcome::NoMatch)) => {
                            (None, Some("search API request not found".to_string()))
                        }
                        Ok(Err(e)) => {
                            warn!("Menu item '{}' failed: {}", item.name, e);
                            (None, Some(format!("{}: {}", e.kind(), e)))
                        }
                        Err(_) => {
                            warn!("Menu item '{}' timed out after {:?}", item.name, item_timeout);
                            (None, Some(format!("timed out after {}s", item_timeout.as_secs())))
                        }
                    };

                let comparison = analysis
                    .as_ref()
                    .map(|a| compare_price(menu_price, a.avg_price));

                (
                    idx,
                    ItemAnalysis {
                        item_name: item.name,
                        menu_price,
                        category: item.category,
                        analysis,
                        comparison,
                        failure,
                        duration_ms: item_start.elapsed().as_millis() as u64,
                    },
                )
            }
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    items.sort_by_key(|(idx, _)| *idx);
    let items: Vec<ItemAnalysis> = items.into_iter().map(|(_, item)| item).collect();

    let analyzed = items.iter().filter(|i| i.analysis.is_some()).count();
    let failed = items.len() - analyzed;

    info!(
        "Menu analysis completed: {}/{} analyzed, {} failed, {}ms total",
        analyzed,
        total_items,
        failed,
        start_time.elapsed().as_millis()
    );

    MenuAnalysisResponse {
        items,
        analyzed,
        failed,
        generated_at: chrono::Utc::now(),
    }
}
