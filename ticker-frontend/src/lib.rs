//! Browser-side live ticker dashboard: a fixed ticker set, historical
//! backfill over HTTP, two push-event kinds over a websocket, and a line
//! chart that switches between single-series price and multi-series
//! percent-change views.
//!
//! Everything except the DOM/canvas/network wiring is target-independent
//! and unit-tested natively; the wiring lives behind `target_arch =
//! "wasm32"`.

pub mod chart;
pub mod surface;
pub mod view;

use chart::{Chart, Margins};
use market_feed::{DataSink, FeedStore, MarketEvent};
use surface::DrawSurface;
use ticker_core::DayResetPolicy;
use view::{SelectionSet, TickerSummary, ViewMode};

/// Startup configuration. The browser build overlays `TICKERBOARD_*` JS
/// globals on top of these defaults.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub tickers: Vec<String>,
    /// Series colors, paired with `tickers` by index.
    pub colors: Vec<String>,
    pub history_url: String,
    pub ws_url: String,
    pub width: f64,
    pub height: f64,
    pub reset_policy: DayResetPolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            tickers: ["AAPL", "GOOGL", "FB", "MSFT"].map(String::from).to_vec(),
            colors: ["#1f77b4", "#9467bd", "#ff7f02", "#8c564b"]
                .map(String::from)
                .to_vec(),
            history_url: "/market-history".to_string(),
            ws_url: "/market-events".to_string(),
            width: 750.0,
            height: 600.0,
            reset_policy: DayResetPolicy::Clear,
        }
    }
}

/// The whole dashboard state: feed store, checkbox selection, chart.
/// Constructed once at startup; reducer and renderer take it explicitly
/// instead of touching globals.
pub struct AppState {
    pub feed: FeedStore,
    pub selection: SelectionSet,
    pub chart: Chart,
}

impl AppState {
    pub fn new(config: &DashboardConfig) -> Self {
        let feed = FeedStore::new(config.tickers.iter().cloned(), config.reset_policy);
        let mut selection = SelectionSet::new();
        // First ticker starts checked.
        if let Some(first) = config.tickers.first() {
            selection.set(first, true);
        }
        let mut chart = Chart::new(config.width, config.height, Margins::default());
        chart.set_colors(
            config
                .tickers
                .iter()
                .cloned()
                .zip(config.colors.iter().cloned()),
        );
        chart.set_mode(ViewMode::from_selection(&selection));
        Self {
            feed,
            selection,
            chart,
        }
    }

    /// Feed one market event through the reducer. Events must arrive in
    /// occurrence order; ticks price off the previous tick.
    pub fn apply(&mut self, event: MarketEvent) {
        self.feed.on_event(event);
        self.chart.mark_data_dirty();
    }

    /// Checkbox callback. Returns whether the selection actually changed.
    pub fn toggle_ticker(&mut self, ticker: &str, checked: bool) -> bool {
        if !self.selection.set(ticker, checked) {
            return false;
        }
        self.chart
            .set_mode(ViewMode::from_selection(&self.selection));
        self.chart.mark_data_dirty();
        true
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        self.chart.set_pointer(x, y);
    }

    pub fn pointer_left(&mut self) {
        self.chart.clear_pointer();
    }

    pub fn render(&mut self, surface: &mut dyn DrawSurface) {
        self.chart.render(surface, self.feed.store());
    }

    pub fn summaries(&self) -> Vec<TickerSummary> {
        view::summaries(self.feed.store(), self.selection.as_slice())
    }
}

#[cfg(target_arch = "wasm32")]
pub use handle::DashboardHandle;

#[cfg(target_arch = "wasm32")]
mod handle {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use futures_util::StreamExt;
    use gloo_net::http::Request;
    use gloo_net::websocket::{futures::WebSocket, Message as WsMessage};
    use js_sys::{Function, Reflect};
    use serde::Serialize;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::spawn_local;
    use web_sys::{console, CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent};

    use crate::surface::CanvasSurface;
    use market_feed::{parse_history, PushMessage};

    #[derive(Debug, Serialize)]
    #[serde(tag = "type")]
    enum DashboardEvent<'a> {
        Summaries { summaries: &'a [TickerSummary] },
        FeedError { message: String },
    }

    struct EventSubscription {
        id: u32,
        callback: Function,
    }

    struct DashboardInner {
        state: AppState,
        surface: CanvasSurface,
        status: Option<web_sys::Element>,
        live: bool,
        next_event_id: u32,
        subscribers: Vec<EventSubscription>,
    }

    impl DashboardInner {
        fn redraw(&mut self) {
            if !self.state.chart.needs_render() {
                return;
            }
            self.state.render(&mut self.surface);
            let summaries = self.state.summaries();
            self.dispatch(&DashboardEvent::Summaries {
                summaries: &summaries,
            });
        }

        fn dispatch(&self, event: &DashboardEvent) {
            if self.subscribers.is_empty() {
                return;
            }
            if let Ok(json) = serde_json::to_string(event) {
                let val = JsValue::from_str(&json);
                for sub in &self.subscribers {
                    let _ = sub.callback.call1(&JsValue::NULL, &val);
                }
            }
        }

        fn show_status(&self, message: &str) {
            if let Some(el) = &self.status {
                el.set_text_content(Some(message));
            }
        }
    }

    fn read_global(key: &str) -> Option<String> {
        Reflect::get(&js_sys::global(), &JsValue::from_str(key))
            .ok()
            .and_then(|v| v.as_string())
    }

    fn config_from_globals() -> DashboardConfig {
        let mut config = DashboardConfig::default();
        if let Some(url) = read_global("TICKERBOARD_HISTORY_URL") {
            config.history_url = url;
        }
        if let Some(url) = read_global("TICKERBOARD_WS_URL") {
            config.ws_url = url;
        }
        if let Some(list) = read_global("TICKERBOARD_TICKERS") {
            let tickers: Vec<String> = list
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if !tickers.is_empty() {
                config.tickers = tickers;
            }
        }
        config
    }

    /// Turn a path-only websocket URL into an absolute one off the page
    /// origin.
    fn resolve_ws_url(url: &str) -> String {
        if url.starts_with("ws://") || url.starts_with("wss://") {
            return url.to_string();
        }
        if let Some(window) = web_sys::window() {
            let location = window.location();
            if let (Ok(protocol), Ok(host)) = (location.protocol(), location.host()) {
                let scheme = if protocol == "https:" { "wss" } else { "ws" };
                return format!("{scheme}://{host}{url}");
            }
        }
        url.to_string()
    }

    fn setup_pointer_events(inner_rc: &Rc<RefCell<DashboardInner>>) -> Result<(), JsValue> {
        let canvas = inner_rc.borrow().surface.canvas().clone();

        {
            let inner_rc = inner_rc.clone();
            let canvas_clone = canvas.clone();
            let closure =
                Closure::<dyn FnMut(MouseEvent)>::wrap(Box::new(move |event: MouseEvent| {
                    let rect = canvas_clone.get_bounding_client_rect();
                    let x = event.client_x() as f64 - rect.left();
                    let y = event.client_y() as f64 - rect.top();
                    let mut inner = inner_rc.borrow_mut();
                    inner.state.pointer_moved(x, y);
                    inner.redraw();
                }));
            canvas
                .add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        {
            let inner_rc = inner_rc.clone();
            let closure =
                Closure::<dyn FnMut(MouseEvent)>::wrap(Box::new(move |_event: MouseEvent| {
                    let mut inner = inner_rc.borrow_mut();
                    inner.state.pointer_left();
                    inner.redraw();
                }));
            canvas
                .add_event_listener_with_callback("mouseleave", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        Ok(())
    }

    fn init_feeds(inner_rc: Rc<RefCell<DashboardInner>>, history_url: String, ws_url: String) {
        spawn_local(async move {
            // Historical backfill gates the first render.
            let loaded = match Request::get(&history_url).send().await {
                Ok(resp) if resp.ok() => match resp.text().await {
                    Ok(body) => parse_history(&body).map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                },
                Ok(resp) => Err(format!("history request failed: HTTP {}", resp.status())),
                Err(e) => Err(e.to_string()),
            };

            {
                let mut inner = inner_rc.borrow_mut();
                if !inner.live {
                    return;
                }
                match loaded {
                    Ok(rows) => {
                        inner.state.apply(MarketEvent::History(rows));
                        inner.show_status("");
                        inner.redraw();
                    }
                    Err(message) => {
                        // Plain text in place of the chart, no retry. The
                        // socket below still comes up; ticks without a price
                        // basis are inert.
                        inner.show_status(&message);
                        inner.dispatch(&DashboardEvent::FeedError {
                            message: message.clone(),
                        });
                    }
                }
            }

            // Both push-event kinds arrive on one ordered stream and are
            // applied in arrival order.
            let ws_url = resolve_ws_url(&ws_url);
            match WebSocket::open(&ws_url) {
                Ok(mut ws) => {
                    while let Some(msg) = ws.next().await {
                        let text = match msg {
                            Ok(WsMessage::Text(text)) => text,
                            Ok(WsMessage::Bytes(_)) => continue,
                            Err(_) => break,
                        };
                        match serde_json::from_str::<PushMessage>(&text) {
                            Ok(push) => {
                                let mut inner = inner_rc.borrow_mut();
                                if !inner.live {
                                    break;
                                }
                                inner.state.apply(push.into());
                                inner.redraw();
                            }
                            Err(err) => {
                                console::warn_1(&JsValue::from_str(&format!(
                                    "dropping unreadable push message: {err}"
                                )));
                            }
                        }
                    }
                }
                Err(err) => {
                    console::warn_1(&JsValue::from_str(&format!(
                        "push connection failed: {err:?}"
                    )));
                }
            }
        });
    }

    /// Public dashboard handle for JS.
    #[wasm_bindgen]
    pub struct DashboardHandle {
        inner: Rc<RefCell<DashboardInner>>,
    }

    #[wasm_bindgen]
    impl DashboardHandle {
        /// `canvas_id` names the chart canvas; `status_id` optionally names
        /// an element that receives load-error text.
        #[wasm_bindgen(constructor)]
        pub fn new(canvas_id: &str, status_id: Option<String>) -> Result<DashboardHandle, JsValue> {
            console_error_panic_hook::set_once();

            let config = config_from_globals();

            let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
            let document = window
                .document()
                .ok_or_else(|| JsValue::from_str("no document"))?;
            let element = document
                .get_element_by_id(canvas_id)
                .ok_or_else(|| JsValue::from_str("canvas not found"))?;
            let canvas: HtmlCanvasElement = element
                .dyn_into()
                .map_err(|_| JsValue::from_str("element is not a canvas"))?;
            canvas.set_width(config.width as u32);
            canvas.set_height(config.height as u32);
            let ctx = canvas
                .get_context("2d")?
                .ok_or_else(|| JsValue::from_str("no 2d context"))?
                .dyn_into::<CanvasRenderingContext2d>()?;

            let status = status_id.and_then(|id| document.get_element_by_id(&id));

            let history_url = config.history_url.clone();
            let ws_url = config.ws_url.clone();

            let inner = Rc::new(RefCell::new(DashboardInner {
                state: AppState::new(&config),
                surface: CanvasSurface::new(canvas, ctx),
                status,
                live: true,
                next_event_id: 1,
                subscribers: Vec::new(),
            }));

            setup_pointer_events(&inner)?;
            init_feeds(inner.clone(), history_url, ws_url);

            Ok(DashboardHandle { inner })
        }

        /// Checkbox callback: toggle one ticker in or out of the selection.
        pub fn set_ticker_selected(&self, ticker: &str, checked: bool) {
            let mut inner = self.inner.borrow_mut();
            if inner.state.toggle_ticker(ticker, checked) {
                inner.redraw();
            }
        }

        /// The fixed ticker set, in display order.
        pub fn tickers(&self) -> Vec<String> {
            self.inner.borrow().state.feed.store().tickers().to_vec()
        }

        /// Current per-ticker summaries as a JSON array.
        pub fn summaries_json(&self) -> String {
            serde_json::to_string(&self.inner.borrow().state.summaries())
                .unwrap_or_else(|_| "[]".to_string())
        }

        /// Subscribe to dashboard events (summary refreshes, feed errors).
        pub fn on_event(&self, callback: Function) -> u32 {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_event_id;
            inner.next_event_id = inner.next_event_id.wrapping_add(1);
            inner.subscribers.push(EventSubscription { id, callback });
            id
        }

        pub fn off_event(&self, id: u32) {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|s| s.id != id);
        }

        /// Stop feeding and rendering; the handle cannot be restarted.
        pub fn destroy(&self) {
            self.inner.borrow_mut().live = false;
        }
    }
}
