//! Browser side of the loading sequencer: resource discovery over the live
//! document, load/error listener wiring, `setTimeout` timers, and the splash
//! screen sink/hook.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Reflect;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    Document, Event, FontFaceSet, HtmlImageElement, HtmlLinkElement, Window,
};

use crate::sequencer::{LoadPlatform, Progress, ResourceDescriptor, Settle};
use crate::{html_element_by_id, js_value_to_string, log_event, query_all, set_page_status, warn};

pub const LOADER_ID: &str = "loader";
pub const LOADER_PROGRESS_ID: &str = "loader-progress";
pub const LOADER_STATUS_ID: &str = "loader-status";
pub const HERO_REVEAL_SELECTOR: &str = ".hero [data-reveal]";
pub const HERO_REVEAL_STAGGER_MS: i32 = 150;
pub const PAGE_READY_EVENT: &str = "pageready";

pub enum DomResource {
    /// Detached probe that re-requests the image's URL so load/error fire
    /// even when the page element finished before discovery.
    Image(HtmlImageElement),
    Stylesheet(HtmlLinkElement),
    Fonts(FontFaceSet),
}

pub struct DomPlatform {
    window: Window,
    document: Document,
}

impl DomPlatform {
    pub fn new(window: Window, document: Document) -> Self {
        Self { window, document }
    }
}

fn fonts_supported(document: &Document) -> bool {
    let doc_js: &JsValue = document.as_ref();
    Reflect::has(doc_js, &JsValue::from_str("fonts")).unwrap_or(false)
}

pub fn discover_resources(document: &Document) -> Vec<ResourceDescriptor<DomResource>> {
    let mut resources = Vec::new();

    let images = document.images();
    for i in 0..images.length() {
        let Some(el) = images.item(i) else {
            continue;
        };
        let has_src = el
            .get_attribute("src")
            .is_some_and(|src| !src.trim().is_empty());
        if !has_src {
            continue;
        }
        let Ok(img) = el.dyn_into::<HtmlImageElement>() else {
            continue;
        };
        let Ok(probe) = HtmlImageElement::new() else {
            continue;
        };
        resources.push(ResourceDescriptor::image(img.src(), DomResource::Image(probe)));
    }

    for el in query_all(document, "link[rel=\"stylesheet\"]") {
        let Ok(link) = el.dyn_into::<HtmlLinkElement>() else {
            continue;
        };
        let href = link.href();
        resources.push(ResourceDescriptor::stylesheet(href, DomResource::Stylesheet(link)));
    }

    if fonts_supported(document) {
        resources.push(ResourceDescriptor::fonts_signal(DomResource::Fonts(
            document.fonts(),
        )));
    }

    resources
}

fn attach_image(probe: &HtmlImageElement, src: Option<&str>, settle: Settle) {
    let Some(src) = src else {
        settle.settle();
        return;
    };

    let settle_load = settle.clone();
    let onload = Closure::wrap(Box::new(move || settle_load.settle()) as Box<dyn FnMut()>);
    probe.set_onload(Some(onload.as_ref().unchecked_ref()));
    onload.forget();

    let onerror = Closure::wrap(Box::new(move || settle.settle()) as Box<dyn FnMut()>);
    probe.set_onerror(Some(onerror.as_ref().unchecked_ref()));
    onerror.forget();

    probe.set_src(src);
}

fn attach_stylesheet(link: &HtmlLinkElement, settle: Settle) {
    if link.sheet().is_some() {
        settle.settle();
        return;
    }

    let on_settled = Closure::wrap(Box::new(move |_event: Event| settle.settle()) as Box<dyn FnMut(_)>);
    for event in ["load", "error"] {
        if let Err(err) =
            link.add_event_listener_with_callback(event, on_settled.as_ref().unchecked_ref())
        {
            warn(&format!(
                "stylesheet {} listener: {}",
                event,
                js_value_to_string(&err)
            ));
        }
    }
    on_settled.forget();
}

fn attach_fonts(fonts: &FontFaceSet, settle: Settle) {
    match fonts.ready() {
        Ok(ready) => spawn_local(async move {
            // Rejection still means the fonts are as ready as they will get.
            let _ = JsFuture::from(ready).await;
            settle.settle();
        }),
        Err(err) => warn(&format!("fonts.ready unavailable: {}", js_value_to_string(&err))),
    }
}

impl LoadPlatform for DomPlatform {
    type Handle = DomResource;

    fn discover(&self) -> Vec<ResourceDescriptor<DomResource>> {
        discover_resources(&self.document)
    }

    fn attach(&self, resource: &ResourceDescriptor<DomResource>, settle: Settle) {
        match resource.handle() {
            DomResource::Image(probe) => attach_image(probe, resource.locator(), settle),
            DomResource::Stylesheet(link) => attach_stylesheet(link, settle),
            DomResource::Fonts(fonts) => attach_fonts(fonts, settle),
        }
    }

    fn set_timeout(&self, delay_ms: u32, task: Box<dyn FnOnce()>) {
        let slot: Rc<RefCell<Option<Box<dyn FnOnce()>>>> = Rc::new(RefCell::new(Some(task)));
        let slot_cb = Rc::clone(&slot);
        let callback = Closure::once_into_js(move || {
            let task = slot_cb.borrow_mut().take();
            if let Some(task) = task {
                task();
            }
        });

        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        if self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
            .is_err()
        {
            warn("setTimeout failed; running task now");
            let task = slot.borrow_mut().take();
            if let Some(task) = task {
                task();
            }
        }
    }
}

pub fn render_progress(document: &Document, progress: &Progress) {
    let percent = progress.percent.clamp(0.0, 100.0);

    if let Some(bar) = html_element_by_id(document, LOADER_PROGRESS_ID) {
        let _ = bar.style().set_property("width", &format!("{:.0}%", percent));
        let _ = bar.set_attribute("aria-valuenow", &format!("{:.0}", percent));
    }
    if let Some(status) = document.get_element_by_id(LOADER_STATUS_ID) {
        status.set_text_content(Some(progress.status_message()));
    }

    log_event(
        document,
        &format!("loader_progress ({}/{})", progress.loaded, progress.total),
    );
}

/// Marks the page loaded and hides the splash screen without any entrance
/// effects.
pub fn force_visible(document: &Document) {
    if let Some(body) = document.body() {
        let _ = body.class_list().add_1("loaded");
    }
    if let Some(loader) = document.get_element_by_id(LOADER_ID) {
        let _ = loader.class_list().add_1("hidden");
        let _ = loader.set_attribute("aria-hidden", "true");
    }
}

pub fn reveal_page(window: &Window, document: &Document) -> Result<(), JsValue> {
    force_visible(document);
    set_page_status(document, "ready");

    for (index, el) in query_all(document, HERO_REVEAL_SELECTOR)
        .into_iter()
        .enumerate()
    {
        let delay = (index as i32).saturating_mul(HERO_REVEAL_STAGGER_MS);
        let target = el.clone();
        let reveal = Closure::once_into_js(move || {
            let _ = target.class_list().add_1("revealed");
        });
        if let Err(err) = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(reveal.unchecked_ref(), delay)
        {
            warn(&format!("hero reveal timer: {}", js_value_to_string(&err)));
            let _ = el.class_list().add_1("revealed");
        }
    }

    let event = Event::new(PAGE_READY_EVENT)?;
    window.dispatch_event(&event)?;
    log_event(document, "page_ready");

    Ok(())
}
