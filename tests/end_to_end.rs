//! Host and guest talking over in-process windows.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use safeframe::frame::{Position, StackOrder};
use safeframe::local::{LocalFrame, LocalNavigator, LocalWindow};
use safeframe::tracking::RecordingPixelSink;
use safeframe::transport::Inbox;
use safeframe::{
    AdDescriptor, AdFormat, CreativeFrame, CreativeOptions, CreativeView, Delivery, EmbedContext,
    ExpandRequest, FrameConfig, FrameElement, FrameStyle, GuestAdapter, GuestEnvironment, HandlerPolicy,
    HostAdapter, HostListener, Inventory, Message, MessageKind, NavigationRequest, SafeFrameExt, Slot,
    SlotConfig, SlotEmbedding, SlotState, StaticInventory, Tracker,
};
use safeframe::types::Dimensions;

const ORIGIN: &str = "http://localhost:3000";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn leaderboard_banner() -> AdDescriptor {
    AdDescriptor {
        id: "banner-001".to_string(),
        slot: "header-leaderboard".to_string(),
        format: AdFormat::Banner,
        width: 728,
        height: 90,
        creative_url: Some("https://placehold.co/728x90/0066CC/FFFFFF?text=Banner+Ad".to_string()),
        markup: None,
        click_url: "https://example.com/banner-click".to_string(),
        headline: None,
        body: None,
        tracking_urls: vec![
            "https://example.com/impression?id=banner-001".to_string(),
            "https://example.com/click?id=banner-001".to_string(),
        ],
    }
}

/// A host page with one frame, plus the guest window behind it.
struct Page {
    host: Arc<HostAdapter>,
    _listener: HostListener,
    frame: Arc<LocalFrame>,
    navigator: Arc<LocalNavigator>,
    pixels: Arc<RecordingPixelSink>,
    guest_env: GuestEnvironment,
    guest_inbox: Option<Inbox>,
}

impl Page {
    fn open() -> Self {
        init_tracing();
        let (page, page_inbox) = LocalWindow::open(ORIGIN);
        let (ad_window, ad_inbox) = LocalWindow::open(ORIGIN);

        let host = Arc::new(HostAdapter::with_policy(HandlerPolicy::Propagate));
        let listener = host.listen(page_inbox);
        let frame = Arc::new(LocalFrame::same_origin(728, 90));
        frame.attach(ad_window.transport_from(&page));

        let guest_env = GuestEnvironment {
            window_id: ad_window.id(),
            parent: Some(page.transport_from(&ad_window)),
            referrer: Some(format!("{ORIGIN}/")),
            location: format!("{ORIGIN}/ad-frame"),
            viewport: Dimensions::new(728, 90),
            document: Dimensions::new(728, 90),
        };

        Self {
            host,
            _listener: listener,
            frame,
            navigator: Arc::new(LocalNavigator::new()),
            pixels: RecordingPixelSink::new(),
            guest_env,
            guest_inbox: Some(ad_inbox),
        }
    }

    fn mount(&self, inventory: Arc<dyn Inventory>) -> SlotEmbedding {
        SlotEmbedding::mount(
            SlotConfig::new("slot-header", "header-leaderboard", 728, 90),
            EmbedContext {
                host: Arc::clone(&self.host),
                inventory,
                frame: self.frame.clone(),
                navigator: self.navigator.clone(),
                tracker: Tracker::new(self.pixels.clone()),
                config: Arc::new(FrameConfig::default()),
            },
        )
        .unwrap()
    }

    /// Bare guest adapter listening on the frame's inbox.
    fn guest(&mut self) -> (GuestAdapter, SafeFrameExt, safeframe::guest::GuestListener) {
        let (guest, sf) = GuestAdapter::new(self.guest_env.clone());
        let listener = guest.listen(self.guest_inbox.take().unwrap());
        (guest, sf, listener)
    }

    fn creative(&mut self) -> CreativeFrame {
        CreativeFrame::start(
            self.guest_env.clone(),
            self.guest_inbox.take().unwrap(),
            CreativeOptions { tracker: None, ..Default::default() },
        )
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test(start_paused = true)]
async fn scenario_a_payload_reaches_guest_and_loading_clears() {
    let mut page = Page::open();
    let embedding = page.mount(Arc::new(StaticInventory::new(vec![leaderboard_banner()])));
    let (guest, _sf, _listener) = page.guest();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let replier = guest.downgrade();
    guest.on_message(Arc::new(move |message: &Message| -> safeframe::Result<()> {
        sink.lock().push(message.clone());
        if let (Some(ad), Some(guest)) = (message.ad_descriptor(), replier.upgrade()) {
            guest.send_to_host(&Message::new(MessageKind::CreativeReady).with_ad_id(ad.id));
        }
        Ok(())
    }));
    assert!(guest.announce_ready());

    let state = embedding.wait_for_state(|state| !state.is_loading()).await.unwrap();
    assert_eq!(state, SlotState::Rendered { ad_id: "banner-001".to_string() });

    let received = received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].kind, MessageKind::AdPayload);
    assert_eq!(received[0].ad_descriptor(), Some(leaderboard_banner()));
    assert!(page.host.registry().contains("slot-header"));
}

#[tokio::test(start_paused = true)]
async fn scenario_b_expand_then_collapse_restores_registered_size() {
    let mut page = Page::open();
    let embedding = page.mount(Arc::new(StaticInventory::new(vec![leaderboard_banner()])));
    let (guest, _sf, _listener) = page.guest();
    guest.announce_ready();
    assert!(eventually(|| page.host.registry().has_handler("slot-header")).await);

    guest.send_to_host(&Message::expand(ExpandRequest::resize(500, 400)).unwrap());
    assert!(eventually(|| page.frame.style().width == 500).await);
    let style = page.frame.style();
    assert_eq!((style.width, style.height), (500, 400));
    assert_eq!(style.stack, StackOrder::Raised(9999));
    assert_eq!(style.position, Position::Relative);

    guest.send_to_host(&Message::collapse());
    assert!(eventually(|| page.frame.style().stack == StackOrder::Auto).await);
    let registered = page.host.registry().get("slot-header").unwrap();
    assert_eq!(page.frame.style(), FrameStyle::resting(registered.width, registered.height));
    assert!(embedding.state().is_loading());
}

#[tokio::test(start_paused = true)]
async fn scenario_c_navigate_is_same_tab_product_page() {
    let mut page = Page::open();
    let _embedding = page.mount(Arc::new(StaticInventory::new(vec![leaderboard_banner()])));
    let (guest, _sf, _listener) = page.guest();
    guest.announce_ready();
    assert!(eventually(|| page.host.registry().has_handler("slot-header")).await);

    let request = NavigationRequest {
        ad_id: "ad-123".to_string(),
        click_url: "https://x".to_string(),
        product_id: "p1".to_string(),
        source: "banner-ad".to_string(),
    };
    guest.send_to_host(&Message::navigate(&request).unwrap());
    assert!(eventually(|| page.navigator.last().is_some()).await);

    let url = page.navigator.last().unwrap();
    assert_eq!(url.origin().ascii_serialization(), ORIGIN);
    assert_eq!(url.path(), "/product/p1");
    let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(query.contains(&("adId".to_string(), "ad-123".to_string())));
    assert!(query.contains(&("source".to_string(), "banner-ad".to_string())));
}

#[tokio::test(start_paused = true)]
async fn scenario_d_empty_inventory_never_registers() {
    let mut page = Page::open();
    let embedding = page.mount(Arc::new(StaticInventory::default()));
    let (guest, _sf, _listener) = page.guest();
    guest.announce_ready();

    let state = embedding.wait_for_state(SlotState::is_error).await.unwrap();
    assert_eq!(state, SlotState::Empty { reason: "No ads available for this slot".to_string() });

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(page.host.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn guest_messages_arrive_unchanged() {
    let mut page = Page::open();
    let (guest, _sf, _listener) = page.guest();

    let from_host = Arc::new(Mutex::new(Vec::new()));
    let guest_sink = Arc::clone(&from_host);
    guest.on_message(Arc::new(move |message: &Message| -> safeframe::Result<()> {
        guest_sink.lock().push(message.clone());
        Ok(())
    }));

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    page.host.register_slot(
        Slot::new("slot-header", "header-leaderboard", 728, 90).with_transport(page.frame.content_window().unwrap()),
    );
    page.host.on_message(
        "slot-header",
        Arc::new(move |message: &Message| -> safeframe::Result<()> {
            sink.lock().push(message.clone());
            Ok(())
        }),
    );

    // The guest learns its frame token from the payload before it sends anything.
    let payload = Message::ad_payload(&leaderboard_banner()).unwrap();
    assert_eq!(page.host.send_to_slot("slot-header", &payload), Delivery::Sent);
    assert!(eventually(|| from_host.lock().len() == 1).await);
    assert!(from_host.lock()[0].frame_id.is_some());

    let sent = vec![
        Message::new(MessageKind::Impression).with_ad_id("banner-001"),
        Message::expand(ExpandRequest::Push { push: true }).unwrap(),
        Message::new(MessageKind::Other("viewable".into())).with_ad_id("banner-001"),
    ];
    for message in &sent {
        assert!(guest.send_to_host(message));
    }

    assert!(eventually(|| received.lock().len() == sent.len()).await);
    assert_eq!(*received.lock(), sent);
}

#[tokio::test(start_paused = true)]
async fn creative_frame_drives_a_full_slot_lifecycle() {
    let mut page = Page::open();
    let embedding = page.mount(Arc::new(StaticInventory::demo()));
    let creative = page.creative();

    let state = embedding.wait_for_state(|state| !state.is_loading()).await.unwrap();
    assert_eq!(state, SlotState::Rendered { ad_id: "banner-001".to_string() });
    assert!(matches!(creative.view(), CreativeView::Showing { .. }));

    assert!(creative.record_impression());
    assert!(creative.record_click());
    assert!(eventually(|| page.navigator.last().is_some()).await);
    assert_eq!(page.navigator.last().unwrap().path(), "/product/product-banner-001");
    assert!(eventually(|| page.pixels.fired().len() == 1).await);
    assert_eq!(page.pixels.fired(), vec!["https://example.com/impression?id=banner-001"]);

    embedding.unmount();
    assert!(page.host.registry().is_empty());
    assert!(creative.close().await.is_ok());
}
