use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Event, Window};

pub const SCROLL_THROTTLE_MS: f64 = 16.0;
pub const RESIZE_DEBOUNCE_MS: i32 = 150;

/// Leading-edge throttle: lets a call through when at least `interval_ms`
/// passed since the last call it let through.
#[derive(Clone, Copy, Debug)]
pub struct ThrottleGate {
    interval_ms: f64,
    last: Option<f64>,
}

impl ThrottleGate {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms: interval_ms.max(0.0),
            last: None,
        }
    }

    pub fn allow(&mut self, now_ms: f64) -> bool {
        match self.last {
            Some(last) if now_ms - last < self.interval_ms => false,
            _ => {
                self.last = Some(now_ms);
                true
            }
        }
    }
}

pub fn now_ms(window: &Window) -> f64 {
    window
        .performance()
        .map(|perf| perf.now())
        .unwrap_or_else(js_sys::Date::now)
}

pub fn throttle(
    window: &Window,
    interval_ms: f64,
    mut f: impl FnMut(Event) + 'static,
) -> Closure<dyn FnMut(Event)> {
    let window = window.clone();
    let mut gate = ThrottleGate::new(interval_ms);
    Closure::wrap(Box::new(move |event: Event| {
        if gate.allow(now_ms(&window)) {
            f(event);
        }
    }) as Box<dyn FnMut(_)>)
}

/// Runs its callback once calls stop arriving for `delay_ms`.
#[derive(Clone)]
pub struct Debouncer {
    window: Window,
    delay_ms: i32,
    handle: Rc<Cell<Option<i32>>>,
    callback: Rc<Closure<dyn FnMut()>>,
    run: Rc<RefCell<Box<dyn FnMut()>>>,
}

impl Debouncer {
    pub fn new(window: &Window, delay_ms: i32, f: impl FnMut() + 'static) -> Self {
        let run: Rc<RefCell<Box<dyn FnMut()>>> = Rc::new(RefCell::new(Box::new(f)));
        let handle = Rc::new(Cell::new(None));

        let run_cb = Rc::clone(&run);
        let handle_cb = Rc::clone(&handle);
        let callback = Rc::new(Closure::wrap(Box::new(move || {
            handle_cb.set(None);
            (run_cb.borrow_mut())();
        }) as Box<dyn FnMut()>));

        Self {
            window: window.clone(),
            delay_ms,
            handle,
            callback,
            run,
        }
    }

    pub fn call(&self) {
        if let Some(id) = self.handle.take() {
            self.window.clear_timeout_with_handle(id);
        }

        match self.window.set_timeout_with_callback_and_timeout_and_arguments_0(
            self.callback.as_ref().as_ref().unchecked_ref(),
            self.delay_ms,
        ) {
            Ok(id) => self.handle.set(Some(id)),
            Err(_) => (self.run.borrow_mut())(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_always_passes() {
        let mut gate = ThrottleGate::new(100.0);
        assert!(gate.allow(12_345.0));
    }

    #[test]
    fn calls_inside_interval_are_dropped() {
        let mut gate = ThrottleGate::new(16.0);
        let passed: Vec<f64> = [0.0, 5.0, 15.9, 16.0, 20.0, 31.9, 32.0, 100.0]
            .into_iter()
            .filter(|t| gate.allow(*t))
            .collect();
        assert_eq!(passed, vec![0.0, 16.0, 32.0, 100.0]);
    }

    #[test]
    fn zero_interval_passes_everything() {
        let mut gate = ThrottleGate::new(0.0);
        assert!(gate.allow(1.0));
        assert!(gate.allow(1.0));
        assert!(gate.allow(1.0));
    }
}
