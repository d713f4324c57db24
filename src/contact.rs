use qrcodegen::{QrCode, QrCodeEcc};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlImageElement, Window};

use crate::{js_value_to_string, log_event, warn};

pub const DEALERSHIP_PHONE: &str = "+4989123456";
pub const DIRECTIONS_URL: &str =
    "https://www.google.com/maps/dir/?api=1&destination=MeisterCo+Autohaus+Muenchen";
pub const DIRECTIONS_QR_ID: &str = "directions-qr";
const QR_BORDER_MODULES: i32 = 2;
const QR_MIN_PX: u32 = 96;
const QR_MAX_PX: u32 = 512;

pub fn tel_href(phone: &str) -> String {
    let digits: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    format!("tel:{}", digits)
}

pub fn call(window: &Window) -> Result<(), JsValue> {
    window.location().set_href(&tel_href(DEALERSHIP_PHONE))
}

pub fn open_directions(window: &Window) -> Result<(), JsValue> {
    window.open_with_url_and_target(DIRECTIONS_URL, "_blank")?;
    Ok(())
}

fn is_hex_colour(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Size and colours of the directions QR, taken from the `<img>` so the page
/// theme decides how it looks.
#[derive(Debug, Clone, PartialEq)]
pub struct QrStyle {
    pub size_px: u32,
    pub dark: String,
    pub light: String,
}

impl Default for QrStyle {
    fn default() -> Self {
        Self {
            size_px: 176,
            dark: "#111418".to_string(),
            light: "#ffffff".to_string(),
        }
    }
}

impl QrStyle {
    /// `width`, `data-qr-dark` and `data-qr-light`; anything unusable keeps
    /// the default.
    pub fn from_attributes(width: Option<&str>, dark: Option<&str>, light: Option<&str>) -> Self {
        let mut style = Self::default();
        if let Some(px) = width.and_then(|w| w.trim().parse::<u32>().ok()) {
            style.size_px = px.clamp(QR_MIN_PX, QR_MAX_PX);
        }
        if let Some(dark) = dark.map(str::trim).filter(|c| is_hex_colour(c)) {
            style.dark = dark.to_string();
        }
        if let Some(light) = light.map(str::trim).filter(|c| is_hex_colour(c)) {
            style.light = light.to_string();
        }
        style
    }

    fn from_image(img: &HtmlImageElement) -> Self {
        Self::from_attributes(
            img.get_attribute("width").as_deref(),
            img.get_attribute("data-qr-dark").as_deref(),
            img.get_attribute("data-qr-light").as_deref(),
        )
    }

    /// Identifies a rendered image so an unchanged QR is not drawn twice.
    pub fn cache_key(&self, payload: &str) -> String {
        format!("{}|{}|{}|{}", self.size_px, self.dark, self.light, payload)
    }
}

/// Pixel rectangle `(x, y, w, h)` of module `(x, y)`. Edges are snapped
/// outward so neighbouring modules leave no seams.
fn module_rect(qr_size: i32, x: i32, y: i32, size_px: u32) -> (f64, f64, f64, f64) {
    let module_px = size_px as f64 / (qr_size + QR_BORDER_MODULES * 2) as f64;
    let edge = |i: i32| (i + QR_BORDER_MODULES) as f64 * module_px;

    let (x0, y0) = (edge(x).floor(), edge(y).floor());
    let (x1, y1) = (edge(x + 1).ceil(), edge(y + 1).ceil());
    (x0, y0, (x1 - x0).max(1.0), (y1 - y0).max(1.0))
}

pub fn render_qr_data_url(
    document: &Document,
    payload: &str,
    style: &QrStyle,
) -> Result<String, JsValue> {
    let qr = QrCode::encode_text(payload, QrCodeEcc::Medium)
        .map_err(|_| JsValue::from_str("directions link too long for a QR code"))?;

    let canvas = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()?;
    canvas.set_width(style.size_px);
    canvas.set_height(style.size_px);

    let ctx = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("no 2d context for directions QR"))?
        .dyn_into::<CanvasRenderingContext2d>()?;
    ctx.set_image_smoothing_enabled(false);

    let side = style.size_px as f64;
    ctx.set_fill_style_str(&style.light);
    ctx.fill_rect(0.0, 0.0, side, side);

    ctx.set_fill_style_str(&style.dark);
    let n = qr.size();
    for (x, y) in (0..n).flat_map(|y| (0..n).map(move |x| (x, y))) {
        if qr.get_module(x, y) {
            let (rx, ry, rw, rh) = module_rect(n, x, y, style.size_px);
            ctx.fill_rect(rx, ry, rw, rh);
        }
    }

    canvas.to_data_url_with_type("image/png")
}

pub fn install(document: &Document) {
    let Some(img) = document
        .get_element_by_id(DIRECTIONS_QR_ID)
        .and_then(|el| el.dyn_into::<HtmlImageElement>().ok())
    else {
        return;
    };

    let style = QrStyle::from_image(&img);
    let key = style.cache_key(DIRECTIONS_URL);
    if img.get_attribute("data-qr-key").as_deref() == Some(key.as_str()) {
        return;
    }

    match render_qr_data_url(document, DIRECTIONS_URL, &style) {
        Ok(data_url) => {
            img.set_src(&data_url);
            let _ = img.set_attribute("data-qr-key", &key);
            log_event(document, &format!("directions_qr ({}px)", style.size_px));
        }
        Err(err) => warn(&format!("directions QR unavailable: {}", js_value_to_string(&err))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tel_href_strips_formatting() {
        assert_eq!(tel_href("+49 (89) 123-456"), "tel:+4989123456");
        assert_eq!(tel_href(DEALERSHIP_PHONE), "tel:+4989123456");
    }

    #[test]
    fn qr_modules_cover_the_canvas_without_gaps() {
        let qr = QrCode::encode_text(DIRECTIONS_URL, QrCodeEcc::Medium).unwrap();
        let n = qr.size();

        let size_px = QrStyle::default().size_px;
        let (x0, y0, w, h) = module_rect(n, 0, 0, size_px);
        assert!(x0 > 0.0 && y0 > 0.0);
        assert!(w >= 1.0 && h >= 1.0);

        for x in 0..n - 1 {
            let (a, _, aw, _) = module_rect(n, x, 0, size_px);
            let (b, _, _, _) = module_rect(n, x + 1, 0, size_px);
            assert!(a + aw >= b);
        }

        let (last_x, _, last_w, _) = module_rect(n, n - 1, n - 1, size_px);
        assert!(last_x + last_w <= size_px as f64);
    }

    #[test]
    fn qr_style_reads_theme_attributes() {
        assert_eq!(QrStyle::from_attributes(None, None, None), QrStyle::default());

        let themed = QrStyle::from_attributes(Some("240"), Some("#C0A062"), Some(" #000 "));
        assert_eq!(themed.size_px, 240);
        assert_eq!(themed.dark, "#C0A062");
        assert_eq!(themed.light, "#000");

        let clamped = QrStyle::from_attributes(Some("20"), Some("red"), Some("#12345g"));
        assert_eq!(clamped.size_px, QR_MIN_PX);
        assert_eq!(clamped.dark, QrStyle::default().dark);
        assert_eq!(clamped.light, QrStyle::default().light);
        assert_eq!(QrStyle::from_attributes(Some("4096"), None, None).size_px, QR_MAX_PX);
    }

    #[test]
    fn cache_key_changes_with_style() {
        let base = QrStyle::default();
        let bigger = QrStyle { size_px: 300, ..QrStyle::default() };
        assert_ne!(base.cache_key(DIRECTIONS_URL), bigger.cache_key(DIRECTIONS_URL));
        assert_eq!(base.cache_key(DIRECTIONS_URL), QrStyle::default().cache_key(DIRECTIONS_URL));
    }
}
