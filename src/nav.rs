use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Event, KeyboardEvent, Window};

use crate::timing::{Debouncer, RESIZE_DEBOUNCE_MS};
use crate::{log_event, query_all};

pub const NAV_TOGGLE_ID: &str = "nav-toggle";
pub const NAV_MENU_ID: &str = "nav-menu";
pub const MOBILE_BREAKPOINT_PX: f64 = 768.0;

pub fn is_desktop_width(width: f64) -> bool {
    width > MOBILE_BREAKPOINT_PX
}

pub fn menu_is_open(document: &Document) -> bool {
    document
        .get_element_by_id(NAV_MENU_ID)
        .is_some_and(|menu| menu.class_list().contains("open"))
}

pub fn set_menu_open(document: &Document, open: bool) {
    let Some(menu) = document.get_element_by_id(NAV_MENU_ID) else {
        return;
    };

    let _ = menu.class_list().toggle_with_force("open", open);
    if let Some(toggle) = document.get_element_by_id(NAV_TOGGLE_ID) {
        let _ = toggle.class_list().toggle_with_force("active", open);
        let _ = toggle.set_attribute("aria-expanded", if open { "true" } else { "false" });
    }
    if let Some(body) = document.body() {
        let _ = body.class_list().toggle_with_force("menu-open", open);
    }

    log_event(document, if open { "menu_open" } else { "menu_close" });
}

pub fn install(window: &Window, document: &Document) -> Result<(), JsValue> {
    let Some(toggle) = document.get_element_by_id(NAV_TOGGLE_ID) else {
        return Ok(());
    };

    let doc = document.clone();
    let on_toggle = Closure::wrap(Box::new(move |event: Event| {
        event.prevent_default();
        let open = !menu_is_open(&doc);
        set_menu_open(&doc, open);
    }) as Box<dyn FnMut(_)>);
    toggle.add_event_listener_with_callback("click", on_toggle.as_ref().unchecked_ref())?;
    on_toggle.forget();

    for link in query_all(document, &format!("#{} a", NAV_MENU_ID)) {
        let doc = document.clone();
        let on_link = Closure::wrap(Box::new(move |_event: Event| {
            if menu_is_open(&doc) {
                set_menu_open(&doc, false);
            }
        }) as Box<dyn FnMut(_)>);
        link.add_event_listener_with_callback("click", on_link.as_ref().unchecked_ref())?;
        on_link.forget();
    }

    let doc = document.clone();
    let on_keydown = Closure::wrap(Box::new(move |event: Event| {
        let Some(key) = event.dyn_ref::<KeyboardEvent>() else {
            return;
        };
        if key.key() == "Escape" && menu_is_open(&doc) {
            set_menu_open(&doc, false);
        }
    }) as Box<dyn FnMut(_)>);
    document.add_event_listener_with_callback("keydown", on_keydown.as_ref().unchecked_ref())?;
    on_keydown.forget();

    let settle = {
        let win = window.clone();
        let doc = document.clone();
        Debouncer::new(window, RESIZE_DEBOUNCE_MS, move || {
            let width = win
                .inner_width()
                .ok()
                .and_then(|w| w.as_f64())
                .unwrap_or(0.0);
            if is_desktop_width(width) && menu_is_open(&doc) {
                set_menu_open(&doc, false);
            }
        })
    };
    let on_resize = Closure::wrap(Box::new(move |_event: Event| settle.call()) as Box<dyn FnMut(_)>);
    window.add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())?;
    on_resize.forget();

    Ok(())
}
