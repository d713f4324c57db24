use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlElement, NodeList, Window};

pub mod booking;
pub mod config;
pub mod contact;
pub mod dom_loader;
pub mod nav;
pub mod particles;
pub mod preferences;
pub mod scroll;
pub mod sequencer;
pub mod timing;

use config::SiteConfig;
use dom_loader::DomPlatform;
use preferences::Preferences;
use sequencer::LoadingSequencer;

static DEBUG_LOGGING: AtomicBool = AtomicBool::new(false);

pub(crate) fn window() -> Window {
    web_sys::window().expect("missing window")
}

pub(crate) fn js_value_to_string(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

pub fn set_debug_logging(enabled: bool) {
    DEBUG_LOGGING.store(enabled, Ordering::Relaxed);
}

/// Records a lifecycle event on `<html data-last-event>` and echoes it to the
/// console in debug mode.
pub(crate) fn log_event(document: &Document, event: &str) {
    if let Some(el) = document.document_element() {
        let _ = el.set_attribute("data-last-event", event);
    }
    if DEBUG_LOGGING.load(Ordering::Relaxed) {
        web_sys::console::debug_1(&JsValue::from_str(&format!("[meisterco] {}", event)));
    }
}

pub(crate) fn warn(message: &str) {
    web_sys::console::warn_1(&JsValue::from_str(&format!("[meisterco] {}", message)));
}

pub(crate) fn set_page_status(document: &Document, status: &str) {
    if let Some(el) = document.document_element() {
        let _ = el.set_attribute("data-page-status", status);
    }
}

pub(crate) fn node_list_elements(list: NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

pub(crate) fn query_all(document: &Document, selector: &str) -> Vec<Element> {
    match document.query_selector_all(selector) {
        Ok(list) => node_list_elements(list),
        Err(err) => {
            warn(&format!(
                "bad selector {}: {}",
                selector,
                js_value_to_string(&err)
            ));
            Vec::new()
        }
    }
}

pub(crate) fn html_element_by_id(document: &Document, id: &str) -> Option<HtmlElement> {
    document
        .get_element_by_id(id)
        .and_then(|el| el.dyn_into::<HtmlElement>().ok())
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();

    if let Err(err) = start_impl() {
        if let Some(doc) = web_sys::window().and_then(|win| win.document()) {
            set_page_status(&doc, "error");
            // A broken behavior layer must never leave the splash screen up.
            dom_loader::force_visible(&doc);
        }

        web_sys::console::error_1(&err);
    }
}

fn start_impl() -> Result<(), JsValue> {
    let win = window();
    let document = win
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;

    let config = SiteConfig::from_location(&win.location());
    set_debug_logging(config.debug);
    set_page_status(&document, "loading");
    log_event(&document, "init");

    let mut prefs = Preferences::load(&win);
    prefs.record_visit();
    if let Err(reason) = prefs.save(&win) {
        warn(&format!("preferences not saved ({})", reason));
    }
    let reduced_motion = prefs.motion_reduced(&win);
    let particles_enabled = prefs.particles && !reduced_motion;
    let prefs = Rc::new(RefCell::new(prefs));

    let sequencer = LoadingSequencer::new(
        DomPlatform::new(win.clone(), document.clone()),
        config.sequencer_config(),
    );

    {
        let document = document.clone();
        sequencer.on_progress(move |progress| dom_loader::render_progress(&document, &progress));
    }
    {
        let win = win.clone();
        let document = document.clone();
        sequencer.on_ready(move || {
            if let Err(err) = dom_loader::reveal_page(&win, &document) {
                warn(&format!("reveal failed: {}", js_value_to_string(&err)));
                dom_loader::force_visible(&document);
            }
        });
    }

    scroll::install(&win, &document, reduced_motion, &sequencer)?;
    nav::install(&win, &document)?;
    booking::install(&win, &document, prefs)?;
    contact::install(&document);
    if particles_enabled {
        particles::install(&document, config.particle_count, &sequencer);
    }

    if config.loader_enabled {
        let total = sequencer.discover();
        log_event(&document, &format!("loader_start ({} resources)", total));
        sequencer.start();
    } else {
        log_event(&document, "loader_skipped");
        sequencer.complete_loading();
    }

    Ok(())
}

#[wasm_bindgen]
pub fn open_booking_modal(vehicle: Option<String>) -> Result<(), JsValue> {
    let document = window()
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;
    booking::open_modal(&document, vehicle.as_deref())
}

#[wasm_bindgen]
pub fn close_booking_modal() -> Result<(), JsValue> {
    let document = window()
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;
    booking::close_modal(&document)
}

#[wasm_bindgen]
pub fn call_dealership() -> Result<(), JsValue> {
    contact::call(&window())
}

#[wasm_bindgen]
pub fn get_directions() -> Result<(), JsValue> {
    contact::open_directions(&window())
}
