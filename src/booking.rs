//! Test-drive booking modal: open/close wiring, field collection, validation,
//! and the confirmation flow. Nothing leaves the browser; a valid booking is
//! serialized and logged.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, Event, HtmlElement, HtmlFormElement, HtmlInputElement, HtmlSelectElement,
    HtmlTextAreaElement, KeyboardEvent, Window,
};

use crate::preferences::Preferences;
use crate::{js_value_to_string, log_event, query_all, warn};

pub const MODAL_ID: &str = "booking-modal";
pub const FORM_ID: &str = "booking-form";
pub const SUCCESS_ID: &str = "booking-success";
pub const OPEN_TRIGGER_SELECTOR: &str = "[data-open-booking]";
pub const CLOSE_AFTER_SUCCESS_MS: i32 = 3000;
const OPENING_HOUR: u32 = 9;
const CLOSING_HOUR: u32 = 18;

/// Flat key/value record of the named form fields.
pub type Submission = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldError {
    Missing(&'static str),
    NameTooShort,
    InvalidEmail,
    InvalidPhone,
    InvalidDate,
    DateInPast,
    TimeOutsideHours,
    ConsentRequired,
}

impl FieldError {
    pub fn field(&self) -> &'static str {
        match self {
            FieldError::Missing(field) => *field,
            FieldError::NameTooShort => "name",
            FieldError::InvalidEmail => "email",
            FieldError::InvalidPhone => "phone",
            FieldError::InvalidDate | FieldError::DateInPast => "date",
            FieldError::TimeOutsideHours => "time",
            FieldError::ConsentRequired => "consent",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FieldError::Missing("vehicle") => "Please choose a vehicle.",
            FieldError::Missing(_) => "This field is required.",
            FieldError::NameTooShort => "Please enter your full name.",
            FieldError::InvalidEmail => "Please enter a valid email address.",
            FieldError::InvalidPhone => "Please enter a valid phone number.",
            FieldError::InvalidDate => "Please pick a date.",
            FieldError::DateInPast => "Please pick a date from today onward.",
            FieldError::TimeOutsideHours => "Test drives run from 09:00 to 18:00.",
            FieldError::ConsentRequired => "Please accept the privacy notice.",
        }
    }
}

fn field<'a>(submission: &'a Submission, name: &str) -> &'a str {
    submission.get(name).map(|v| v.trim()).unwrap_or("")
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

/// Digits of a phone number once separators and a single leading `+` are
/// removed; `None` if anything else is present.
pub fn phone_digits(phone: &str) -> Option<String> {
    let phone = phone.trim();
    let body = phone.strip_prefix('+').unwrap_or(phone);
    let mut digits = String::with_capacity(body.len());
    for c in body.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => return None,
        }
    }
    Some(digits)
}

fn all_digits(part: &str, len: usize) -> bool {
    part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
}

/// `YYYY-MM-DD` into `(year, month, day)` with a calendar-valid day.
pub fn parse_iso_date(date: &str) -> Option<(u32, u32, u32)> {
    let mut parts = date.trim().splitn(3, '-');
    let (y, m, d) = (parts.next()?, parts.next()?, parts.next()?);
    if !(all_digits(y, 4) && all_digits(m, 2) && all_digits(d, 2)) {
        return None;
    }
    let (year, month, day) = (y.parse::<u32>().ok()?, m.parse::<u32>().ok()?, d.parse::<u32>().ok()?);

    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let days_in_month = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => return None,
    };
    (1..=days_in_month)
        .contains(&day)
        .then_some((year, month, day))
}

/// `HH:MM` into minutes after midnight.
pub fn parse_time(time: &str) -> Option<u32> {
    let (h, m) = time.trim().split_once(':')?;
    if !(all_digits(h, 2) && all_digits(m, 2)) {
        return None;
    }
    let (hour, minute) = (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?);
    (hour < 24 && minute < 60).then_some(hour * 60 + minute)
}

pub fn validate(submission: &Submission, today: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let name = field(submission, "name");
    if name.is_empty() {
        errors.push(FieldError::Missing("name"));
    } else if name.chars().filter(|c| !c.is_whitespace()).count() < 2 {
        errors.push(FieldError::NameTooShort);
    }

    let email = field(submission, "email");
    if email.is_empty() {
        errors.push(FieldError::Missing("email"));
    } else if !is_valid_email(email) {
        errors.push(FieldError::InvalidEmail);
    }

    let phone = field(submission, "phone");
    if phone.is_empty() {
        errors.push(FieldError::Missing("phone"));
    } else if !phone_digits(phone).is_some_and(|d| (7..=15).contains(&d.len())) {
        errors.push(FieldError::InvalidPhone);
    }

    if field(submission, "vehicle").is_empty() {
        errors.push(FieldError::Missing("vehicle"));
    }

    let date = field(submission, "date");
    if date.is_empty() {
        errors.push(FieldError::Missing("date"));
    } else {
        match parse_iso_date(date) {
            None => errors.push(FieldError::InvalidDate),
            Some(picked) => {
                if parse_iso_date(today).is_some_and(|today| picked < today) {
                    errors.push(FieldError::DateInPast);
                }
            }
        }
    }

    let time = field(submission, "time");
    if !time.is_empty() {
        let in_hours = parse_time(time)
            .is_some_and(|m| (OPENING_HOUR * 60..=CLOSING_HOUR * 60).contains(&m));
        if !in_hours {
            errors.push(FieldError::TimeOutsideHours);
        }
    }

    if field(submission, "consent").is_empty() {
        errors.push(FieldError::ConsentRequired);
    }

    errors
}

pub fn confirmation_message(submission: &Submission) -> String {
    let name = field(submission, "name");
    let first_name = name.split_whitespace().next().unwrap_or(name);
    let mut message = format!(
        "Thank you, {}! Your test drive of the {} is requested for {}",
        first_name,
        field(submission, "vehicle"),
        field(submission, "date")
    );
    let time = field(submission, "time");
    if !time.is_empty() {
        message.push_str(" at ");
        message.push_str(time);
    }
    message.push_str(". We will confirm by email shortly.");
    message
}

pub fn today_iso() -> String {
    let now = js_sys::Date::new_0();
    format!(
        "{:04}-{:02}-{:02}",
        now.get_full_year(),
        now.get_month() + 1,
        now.get_date()
    )
}

fn control_name_value(el: &Element) -> Option<(String, String)> {
    let name = el.get_attribute("name").filter(|n| !n.is_empty())?;

    if let Some(input) = el.dyn_ref::<HtmlInputElement>() {
        let kind = input.type_();
        if (kind == "checkbox" || kind == "radio") && !input.checked() {
            return None;
        }
        return Some((name, input.value()));
    }
    if let Some(select) = el.dyn_ref::<HtmlSelectElement>() {
        return Some((name, select.value()));
    }
    if let Some(area) = el.dyn_ref::<HtmlTextAreaElement>() {
        return Some((name, area.value()));
    }
    None
}

pub fn collect_submission(form: &HtmlFormElement) -> Submission {
    let Ok(list) = form.query_selector_all("input[name], select[name], textarea[name]") else {
        return Submission::new();
    };

    crate::node_list_elements(list)
        .iter()
        .filter_map(control_name_value)
        .collect()
}

fn form_control(form: &HtmlFormElement, name: &str) -> Option<Element> {
    form.query_selector(&format!("[name=\"{}\"]", name))
        .ok()
        .flatten()
}

pub fn clear_errors(form: &HtmlFormElement) {
    if let Ok(list) = form.query_selector_all(".error") {
        for el in crate::node_list_elements(list) {
            let _ = el.class_list().remove_1("error");
            let _ = el.remove_attribute("aria-invalid");
        }
    }
    if let Ok(list) = form.query_selector_all("[data-error-for]") {
        for el in crate::node_list_elements(list) {
            el.set_text_content(None);
        }
    }
}

fn clear_field_error(form: &HtmlFormElement, name: &str) {
    if let Some(control) = form_control(form, name) {
        let _ = control.class_list().remove_1("error");
        let _ = control.remove_attribute("aria-invalid");
    }
    if let Ok(Some(slot)) = form.query_selector(&format!("[data-error-for=\"{}\"]", name)) {
        slot.set_text_content(None);
    }
}

pub fn show_errors(form: &HtmlFormElement, errors: &[FieldError]) {
    clear_errors(form);

    for error in errors {
        if let Some(control) = form_control(form, error.field()) {
            let _ = control.class_list().add_1("error");
            let _ = control.set_attribute("aria-invalid", "true");
        }
        if let Ok(Some(slot)) =
            form.query_selector(&format!("[data-error-for=\"{}\"]", error.field()))
        {
            slot.set_text_content(Some(error.message()));
        }
    }

    if let Some(first) = errors
        .first()
        .and_then(|error| form_control(form, error.field()))
        .and_then(|el| el.dyn_into::<HtmlElement>().ok())
    {
        let _ = first.focus();
    }
}

fn booking_form(document: &Document) -> Option<HtmlFormElement> {
    document
        .get_element_by_id(FORM_ID)
        .and_then(|el| el.dyn_into::<HtmlFormElement>().ok())
}

pub fn is_open(document: &Document) -> bool {
    document
        .get_element_by_id(MODAL_ID)
        .is_some_and(|modal| modal.class_list().contains("open"))
}

fn preselect_vehicle(form: &HtmlFormElement, vehicle: &str) {
    let Some(control) = form_control(form, "vehicle") else {
        return;
    };
    if let Some(select) = control.dyn_ref::<HtmlSelectElement>() {
        select.set_value(vehicle);
    } else if let Some(input) = control.dyn_ref::<HtmlInputElement>() {
        input.set_value(vehicle);
    }
}

pub fn open_modal(document: &Document, vehicle: Option<&str>) -> Result<(), JsValue> {
    let modal = document
        .get_element_by_id(MODAL_ID)
        .ok_or_else(|| JsValue::from_str("Missing booking modal"))?;

    modal.class_list().add_1("open")?;
    modal.set_attribute("aria-hidden", "false")?;
    if let Some(body) = document.body() {
        body.class_list().add_1("modal-open")?;
    }

    if let Some(form) = booking_form(document) {
        if let Some(vehicle) = vehicle.filter(|v| !v.trim().is_empty()) {
            preselect_vehicle(&form, vehicle);
        }
        if let Some(first) = form
            .query_selector("input, select, textarea")?
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
        {
            let _ = first.focus();
        }
    }

    log_event(document, "booking_open");
    Ok(())
}

pub fn close_modal(document: &Document) -> Result<(), JsValue> {
    let Some(modal) = document.get_element_by_id(MODAL_ID) else {
        return Ok(());
    };

    modal.class_list().remove_1("open")?;
    modal.set_attribute("aria-hidden", "true")?;
    if let Some(body) = document.body() {
        body.class_list().remove_1("modal-open")?;
    }
    if let Some(form) = booking_form(document) {
        clear_errors(&form);
    }

    log_event(document, "booking_close");
    Ok(())
}

fn handle_submit(
    window: &Window,
    document: &Document,
    form: &HtmlFormElement,
    prefs: &RefCell<Preferences>,
) -> Result<(), JsValue> {
    let submission = collect_submission(form);
    let errors = validate(&submission, &today_iso());
    if !errors.is_empty() {
        show_errors(form, &errors);
        log_event(document, &format!("booking_invalid ({})", errors.len()));
        return Ok(());
    }

    clear_errors(form);
    let record = serde_json::to_string(&submission)
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    web_sys::console::log_1(&JsValue::from_str(&format!("[meisterco] booking {}", record)));
    log_event(document, "booking_submitted");

    {
        let mut prefs = prefs.borrow_mut();
        prefs.remember_vehicle(field(&submission, "vehicle"));
        if let Err(reason) = prefs.save(window) {
            warn(&format!("preferences not saved ({})", reason));
        }
    }

    if let Some(success) = document.get_element_by_id(SUCCESS_ID) {
        success.set_text_content(Some(&confirmation_message(&submission)));
        success.remove_attribute("hidden")?;
    }
    form.reset();

    let doc = document.clone();
    let finish = Closure::once_into_js(move || {
        let _ = close_modal(&doc);
        if let Some(success) = doc.get_element_by_id(SUCCESS_ID) {
            let _ = success.set_attribute("hidden", "");
        }
    });
    window.set_timeout_with_callback_and_timeout_and_arguments_0(
        finish.unchecked_ref(),
        CLOSE_AFTER_SUCCESS_MS,
    )?;

    Ok(())
}

pub fn install(
    window: &Window,
    document: &Document,
    prefs: Rc<RefCell<Preferences>>,
) -> Result<(), JsValue> {
    for trigger in query_all(document, OPEN_TRIGGER_SELECTOR) {
        let doc = document.clone();
        let prefs = Rc::clone(&prefs);
        let vehicle = trigger
            .get_attribute("data-open-booking")
            .filter(|v| !v.is_empty());
        let on_open = Closure::wrap(Box::new(move |event: Event| {
            event.prevent_default();
            let vehicle = vehicle
                .clone()
                .or_else(|| prefs.borrow().last_vehicle.clone());
            if let Err(err) = open_modal(&doc, vehicle.as_deref()) {
                warn(&format!("booking open failed: {}", js_value_to_string(&err)));
            }
        }) as Box<dyn FnMut(_)>);
        trigger.add_event_listener_with_callback("click", on_open.as_ref().unchecked_ref())?;
        on_open.forget();
    }

    let Some(modal) = document.get_element_by_id(MODAL_ID) else {
        return Ok(());
    };

    for close in query_all(document, &format!("#{} .modal-close", MODAL_ID)) {
        let doc = document.clone();
        let on_close = Closure::wrap(Box::new(move |event: Event| {
            event.prevent_default();
            let _ = close_modal(&doc);
        }) as Box<dyn FnMut(_)>);
        close.add_event_listener_with_callback("click", on_close.as_ref().unchecked_ref())?;
        on_close.forget();
    }

    let doc = document.clone();
    let modal_target = modal.clone();
    let on_backdrop = Closure::wrap(Box::new(move |event: Event| {
        // Only clicks on the backdrop itself, not bubbled from the dialog.
        let on_backdrop = event
            .target()
            .and_then(|t| t.dyn_into::<Element>().ok())
            .is_some_and(|el| el == modal_target);
        if on_backdrop {
            let _ = close_modal(&doc);
        }
    }) as Box<dyn FnMut(_)>);
    modal.add_event_listener_with_callback("click", on_backdrop.as_ref().unchecked_ref())?;
    on_backdrop.forget();

    let doc = document.clone();
    let on_keydown = Closure::wrap(Box::new(move |event: Event| {
        let Some(key) = event.dyn_ref::<KeyboardEvent>() else {
            return;
        };
        if key.key() == "Escape" && is_open(&doc) {
            let _ = close_modal(&doc);
        }
    }) as Box<dyn FnMut(_)>);
    document.add_event_listener_with_callback("keydown", on_keydown.as_ref().unchecked_ref())?;
    on_keydown.forget();

    let Some(form) = booking_form(document) else {
        return Ok(());
    };

    let form_input = form.clone();
    let on_input = Closure::wrap(Box::new(move |event: Event| {
        let name = event
            .target()
            .and_then(|t| t.dyn_into::<Element>().ok())
            .and_then(|el| el.get_attribute("name"));
        if let Some(name) = name {
            clear_field_error(&form_input, &name);
        }
    }) as Box<dyn FnMut(_)>);
    form.add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref())?;
    form.add_event_listener_with_callback("change", on_input.as_ref().unchecked_ref())?;
    on_input.forget();

    let win = window.clone();
    let doc = document.clone();
    let form_submit = form.clone();
    let on_submit = Closure::wrap(Box::new(move |event: Event| {
        event.prevent_default();
        if let Err(err) = handle_submit(&win, &doc, &form_submit, &prefs) {
            warn(&format!("booking submit failed: {}", js_value_to_string(&err)));
        }
    }) as Box<dyn FnMut(_)>);
    form.add_event_listener_with_callback("submit", on_submit.as_ref().unchecked_ref())?;
    on_submit.forget();

    Ok(())
}
