//! Mock publisher page.
//!
//! Wires a host page with three ad slots to in-process ad frames and logs the
//! protocol exchange: readiness, payload delivery, impressions, clicks and the
//! resulting product-page navigations.
//!
//!   cargo run --bin mock-host
//!   cargo run --bin mock-host -- --config frame.yaml --catalog ads.yaml
//!
//! Without `--catalog`, a configured `inventory_endpoint` is queried over HTTP;
//! otherwise the built-in demo catalog is used.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use safeframe::local::{LocalFrame, LocalNavigator, LocalWindow};
use safeframe::types::Dimensions;
use safeframe::{
    CreativeFrame, CreativeOptions, CreativeView, EmbedContext, FrameConfig, GuestEnvironment,
    HostAdapter, HttpInventory, Inventory, SlotConfig, SlotEmbedding, SlotState, StaticInventory, Tracker,
};
use tracing_subscriber::EnvFilter;

const SLOTS: [(&str, &str, u32, u32); 3] = [
    ("slot-header", "header-leaderboard", 728, 90),
    ("slot-sidebar", "sidebar-rectangle", 300, 250),
    ("slot-inline", "inline-native", 300, 250),
];

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("safeframe=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = match parse_arg(&args, "--config") {
        Some(path) => FrameConfig::from_path(&path).with_context(|| format!("loading config {path}"))?,
        None => FrameConfig::default(),
    };
    let config = Arc::new(config);

    let inventory: Arc<dyn Inventory> = match parse_arg(&args, "--catalog") {
        Some(path) => Arc::new(StaticInventory::from_path(&path).with_context(|| format!("loading catalog {path}"))?),
        None => match HttpInventory::from_config(&config).context("building inventory client")? {
            Some(http) => {
                tracing::info!("Using inventory at {}", http.endpoint());
                Arc::new(http)
            }
            None => Arc::new(StaticInventory::demo()),
        },
    };

    let (page, page_inbox) = LocalWindow::open(config.host_origin.clone());
    let host = Arc::new(HostAdapter::new(&config));
    let listener = host.listen(page_inbox);
    let navigator = Arc::new(LocalNavigator::new());
    let tracker = Tracker::logging();

    let mut mounted = Vec::new();
    for (slot_id, slot_name, width, height) in SLOTS {
        let (ad_window, ad_inbox) = LocalWindow::open(config.host_origin.clone());
        let frame = Arc::new(LocalFrame::same_origin(width, height));
        frame.attach(ad_window.transport_from(&page));

        let creative = CreativeFrame::start(
            GuestEnvironment {
                window_id: ad_window.id(),
                parent: Some(page.transport_from(&ad_window)),
                referrer: Some(format!("{}/mock-host", config.host_origin)),
                location: format!("{}/ad-frame", config.host_origin),
                viewport: Dimensions::new(width, height),
                document: Dimensions::new(width, height),
            },
            ad_inbox,
            CreativeOptions { config: config.guest.clone(), tracker: Some(tracker.clone()) },
        );

        let embedding = SlotEmbedding::mount(
            SlotConfig::new(slot_id, slot_name, width, height),
            EmbedContext {
                host: Arc::clone(&host),
                inventory: Arc::clone(&inventory),
                frame,
                navigator: navigator.clone(),
                tracker: tracker.clone(),
                config: Arc::clone(&config),
            },
        )?;
        mounted.push((embedding, creative));
    }

    for (embedding, creative) in &mounted {
        let state = embedding.wait_for_state(|state| !state.is_loading()).await;
        match state {
            Some(SlotState::Rendered { ad_id }) => {
                tracing::info!("{} rendered {} (ready via {:?})", embedding.slot_id(), ad_id, embedding.ready_signal());
                creative.record_impression();
                if matches!(creative.view(), CreativeView::Showing { .. }) {
                    creative.expand();
                    creative.collapse();
                    creative.record_click();
                }
            }
            Some(other) => tracing::warn!("{} did not render: {:?}", embedding.slot_id(), other),
            None => tracing::warn!("{} was torn down", embedding.slot_id()),
        }
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    for url in navigator.history() {
        tracing::info!("Navigated to {}", url);
    }

    drop(mounted);
    listener.cancel();
    listener.join().await.context("host listener failed")?;
    tracing::info!("Mock host finished, {} slots left registered", host.registry().len());
    Ok(())
}

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
