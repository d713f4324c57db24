use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, Event, HtmlElement, Window};

use crate::dom_loader::DomPlatform;
use crate::sequencer::LoadingSequencer;
use crate::timing::{Debouncer, SCROLL_THROTTLE_MS, throttle};
use crate::{html_element_by_id, log_event, query_all};

pub const NAVBAR_ID: &str = "navbar";
pub const BACK_TO_TOP_ID: &str = "back-to-top";
pub const NAVBAR_SCROLLED_AT: f64 = 50.0;
pub const BACK_TO_TOP_AT: f64 = 300.0;
pub const PARALLAX_FACTOR: f64 = 0.4;
pub const REVEAL_VIEWPORT_RATIO: f64 = 0.85;
pub const SMOOTH_SCROLL_MS: f64 = 800.0;
const SCROLL_SETTLE_MS: i32 = 100;

pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

pub fn scroll_position_at(start: f64, target: f64, elapsed: f64, duration: f64) -> f64 {
    if duration <= 0.0 || elapsed >= duration {
        return target;
    }
    start + (target - start) * ease_in_out_cubic(elapsed / duration)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollState {
    pub navbar_scrolled: bool,
    pub back_to_top_visible: bool,
    pub parallax_offset: f64,
}

impl ScrollState {
    pub fn at(scroll_y: f64, reduced_motion: bool) -> Self {
        let scroll_y = scroll_y.max(0.0);
        Self {
            navbar_scrolled: scroll_y > NAVBAR_SCROLLED_AT,
            back_to_top_visible: scroll_y > BACK_TO_TOP_AT,
            parallax_offset: if reduced_motion {
                0.0
            } else {
                scroll_y * PARALLAX_FACTOR
            },
        }
    }
}

pub fn should_reveal(element_top: f64, viewport_height: f64) -> bool {
    element_top < viewport_height * REVEAL_VIEWPORT_RATIO
}

/// Last section whose top is at or above `probe_y`; `sections` must be in
/// document order.
pub fn active_section(sections: &[(String, f64)], probe_y: f64) -> Option<&str> {
    sections
        .iter()
        .take_while(|(_, top)| *top <= probe_y)
        .last()
        .map(|(id, _)| id.as_str())
}

fn set_class(el: &Element, class: &str, on: bool) {
    let _ = el.class_list().toggle_with_force(class, on);
}

fn navbar_height(document: &Document) -> f64 {
    html_element_by_id(document, NAVBAR_ID)
        .map(|nav| nav.offset_height() as f64)
        .unwrap_or(0.0)
}

fn viewport_height(window: &Window) -> f64 {
    window
        .inner_height()
        .ok()
        .and_then(|h| h.as_f64())
        .unwrap_or(0.0)
}

fn section_offsets(document: &Document) -> Vec<(String, f64)> {
    query_all(document, "section[id]")
        .into_iter()
        .filter_map(|el| {
            let id = el.id();
            let top = el.dyn_into::<HtmlElement>().ok()?.offset_top() as f64;
            Some((id, top))
        })
        .collect()
}

pub fn apply_scroll_effects(window: &Window, document: &Document, reduced_motion: bool) {
    let scroll_y = window.scroll_y().unwrap_or(0.0);
    let state = ScrollState::at(scroll_y, reduced_motion);
    let viewport = viewport_height(window);

    if let Some(navbar) = document.get_element_by_id(NAVBAR_ID) {
        set_class(&navbar, "scrolled", state.navbar_scrolled);
    }
    if let Some(back_to_top) = document.get_element_by_id(BACK_TO_TOP_ID) {
        set_class(&back_to_top, "visible", state.back_to_top_visible);
    }

    for bg in query_all(document, ".hero-bg") {
        let Ok(bg) = bg.dyn_into::<HtmlElement>() else {
            continue;
        };
        // Only while the hero is on screen.
        if scroll_y <= viewport {
            let _ = bg
                .style()
                .set_property("transform", &format!("translateY({:.1}px)", state.parallax_offset));
        }
    }

    for el in query_all(document, ".reveal:not(.revealed)") {
        if should_reveal(el.get_bounding_client_rect().top(), viewport) {
            let _ = el.class_list().add_1("revealed");
        }
    }

    let sections = section_offsets(document);
    let active = active_section(&sections, scroll_y + navbar_height(document) + 1.0);
    for link in query_all(document, ".nav-link") {
        let is_active = match (active, link.get_attribute("href")) {
            (Some(id), Some(href)) => href.strip_prefix('#') == Some(id),
            _ => false,
        };
        set_class(&link, "active", is_active);
    }
}

/// One `requestAnimationFrame` scroll animation per page. Starting a new
/// scroll cancels the frame loop still in flight.
#[derive(Clone)]
pub struct SmoothScroller {
    window: Window,
    reduced_motion: bool,
    frame: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>,
    request_id: Rc<Cell<Option<i32>>>,
}

impl SmoothScroller {
    pub fn new(window: &Window, reduced_motion: bool) -> Self {
        Self {
            window: window.clone(),
            reduced_motion,
            frame: Rc::new(RefCell::new(None)),
            request_id: Rc::new(Cell::new(None)),
        }
    }

    pub fn is_animating(&self) -> bool {
        self.request_id.get().is_some()
    }

    pub fn cancel(&self) {
        if let Some(id) = self.request_id.take() {
            let _ = self.window.cancel_animation_frame(id);
        }
    }

    pub fn scroll_to(&self, target_y: f64) {
        self.cancel();

        let start_y = self.window.scroll_y().unwrap_or(0.0);
        let target_y = target_y.max(0.0);
        if self.reduced_motion || (target_y - start_y).abs() < 1.0 {
            self.window.scroll_to_with_x_and_y(0.0, target_y);
            return;
        }

        let frame_cb = Rc::clone(&self.frame);
        let request_id = Rc::clone(&self.request_id);
        let win = self.window.clone();
        let mut started_at: Option<f64> = None;

        // Replacing the slot drops the previous loop's closure; its frame was
        // cancelled above so it never runs again.
        *self.frame.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
            let t0 = *started_at.get_or_insert(ts);
            let elapsed = ts - t0;
            win.scroll_to_with_x_and_y(
                0.0,
                scroll_position_at(start_y, target_y, elapsed, SMOOTH_SCROLL_MS),
            );

            if elapsed >= SMOOTH_SCROLL_MS {
                request_id.set(None);
                return;
            }
            if let Some(next) = frame_cb.borrow().as_ref() {
                request_id.set(win.request_animation_frame(next.as_ref().unchecked_ref()).ok());
            }
        }) as Box<dyn FnMut(f64)>));

        let first = self
            .frame
            .borrow()
            .as_ref()
            .map(|first| self.window.request_animation_frame(first.as_ref().unchecked_ref()));
        match first {
            Some(Ok(id)) => self.request_id.set(Some(id)),
            _ => self.window.scroll_to_with_x_and_y(0.0, target_y),
        }
    }
}

/// Document-space y of an in-page anchor target, offset by the navbar.
fn anchor_target_y(window: &Window, document: &Document, href: &str) -> Option<f64> {
    let id = href.strip_prefix('#')?;
    if id.is_empty() {
        return Some(0.0);
    }
    let target = document.get_element_by_id(id)?;
    let top = target.get_bounding_client_rect().top() + window.scroll_y().unwrap_or(0.0);
    Some(top - navbar_height(document))
}

fn install_anchor_links(
    window: &Window,
    document: &Document,
    reduced_motion: bool,
) -> Result<(), JsValue> {
    let scroller = SmoothScroller::new(window, reduced_motion);

    for link in query_all(document, "a[href^=\"#\"]") {
        let win = window.clone();
        let scroller = scroller.clone();
        let doc = document.clone();
        let href = link.get_attribute("href").unwrap_or_default();
        let on_click = Closure::wrap(Box::new(move |event: Event| {
            let Some(y) = anchor_target_y(&win, &doc, &href) else {
                return;
            };
            event.prevent_default();
            scroller.scroll_to(y);
            log_event(&doc, &format!("scroll_to {}", href));
        }) as Box<dyn FnMut(_)>);
        link.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
        on_click.forget();
    }

    if let Some(back_to_top) = document.get_element_by_id(BACK_TO_TOP_ID) {
        let on_click = Closure::wrap(Box::new(move |event: Event| {
            event.prevent_default();
            scroller.scroll_to(0.0);
        }) as Box<dyn FnMut(_)>);
        back_to_top.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
        on_click.forget();
    }

    Ok(())
}

pub fn install(
    window: &Window,
    document: &Document,
    reduced_motion: bool,
    sequencer: &LoadingSequencer<DomPlatform>,
) -> Result<(), JsValue> {
    install_anchor_links(window, document, reduced_motion)?;

    let settle = {
        let win = window.clone();
        let doc = document.clone();
        Debouncer::new(window, SCROLL_SETTLE_MS, move || {
            apply_scroll_effects(&win, &doc, reduced_motion)
        })
    };

    let on_scroll = {
        let win = window.clone();
        let doc = document.clone();
        throttle(window, SCROLL_THROTTLE_MS, move |_event: Event| {
            apply_scroll_effects(&win, &doc, reduced_motion);
            // Trailing pass so the final scroll position always lands.
            settle.call();
        })
    };
    window.add_event_listener_with_callback("scroll", on_scroll.as_ref().unchecked_ref())?;
    on_scroll.forget();

    let win = window.clone();
    let doc = document.clone();
    sequencer.on_ready(move || apply_scroll_effects(&win, &doc, reduced_motion));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easing_hits_endpoints_and_midpoint() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(0.5), 0.5);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert_eq!(ease_in_out_cubic(-3.0), 0.0);
        assert_eq!(ease_in_out_cubic(7.0), 1.0);
        assert!(ease_in_out_cubic(0.25) < 0.25);
        assert!(ease_in_out_cubic(0.75) > 0.75);
    }

    #[test]
    fn easing_is_monotonic() {
        let samples: Vec<f64> = (0..=100).map(|i| ease_in_out_cubic(i as f64 / 100.0)).collect();
        assert!(samples.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn scroll_position_lands_on_target() {
        assert_eq!(scroll_position_at(0.0, 1000.0, 0.0, 800.0), 0.0);
        assert_eq!(scroll_position_at(0.0, 1000.0, 400.0, 800.0), 500.0);
        assert_eq!(scroll_position_at(0.0, 1000.0, 800.0, 800.0), 1000.0);
        assert_eq!(scroll_position_at(0.0, 1000.0, 5000.0, 800.0), 1000.0);
        assert_eq!(scroll_position_at(600.0, 0.0, 10.0, 0.0), 0.0);
    }

    #[test]
    fn scroll_state_thresholds() {
        let top = ScrollState::at(0.0, false);
        assert!(!top.navbar_scrolled);
        assert!(!top.back_to_top_visible);

        let mid = ScrollState::at(120.0, false);
        assert!(mid.navbar_scrolled);
        assert!(!mid.back_to_top_visible);
        assert!((mid.parallax_offset - 48.0).abs() < 1e-9);

        let deep = ScrollState::at(301.0, true);
        assert!(deep.back_to_top_visible);
        assert_eq!(deep.parallax_offset, 0.0);
    }

    #[test]
    fn reveal_threshold_is_85_percent_of_viewport() {
        assert!(should_reveal(600.0, 800.0));
        assert!(!should_reveal(700.0, 800.0));
        assert!(should_reveal(-50.0, 800.0));
    }

    #[test]
    fn active_section_tracks_scroll_probe() {
        let sections = vec![
            ("home".to_string(), 0.0),
            ("inventory".to_string(), 900.0),
            ("contact".to_string(), 2400.0),
        ];
        assert_eq!(active_section(&sections, 1.0), Some("home"));
        assert_eq!(active_section(&sections, 900.0), Some("inventory"));
        assert_eq!(active_section(&sections, 2399.0), Some("inventory"));
        assert_eq!(active_section(&sections, 9999.0), Some("contact"));
        assert_eq!(active_section(&[], 10.0), None);
    }
}
