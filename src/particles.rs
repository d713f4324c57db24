use wasm_bindgen::prelude::*;
use web_sys::Document;

use crate::dom_loader::DomPlatform;
use crate::sequencer::LoadingSequencer;
use crate::{js_value_to_string, log_event, warn};

pub const CONTAINER_ID: &str = "hero-particles";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub left_pct: f64,
    pub top_pct: f64,
    pub size_px: f64,
    pub delay_s: f64,
    pub duration_s: f64,
    pub opacity: f64,
}

#[inline]
fn lerp(min: f64, max: f64, t: f64) -> f64 {
    min + (max - min) * t.clamp(0.0, 1.0)
}

impl Particle {
    /// Builds a particle from six uniform samples in `[0, 1)`.
    pub fn from_samples(mut sample: impl FnMut() -> f64) -> Self {
        Self {
            left_pct: lerp(0.0, 100.0, sample()),
            top_pct: lerp(0.0, 100.0, sample()),
            size_px: lerp(2.0, 6.0, sample()),
            delay_s: lerp(0.0, 20.0, sample()),
            duration_s: lerp(10.0, 30.0, sample()),
            opacity: lerp(0.2, 0.7, sample()),
        }
    }

    pub fn style(&self) -> String {
        format!(
            "left:{:.2}%;top:{:.2}%;width:{:.1}px;height:{:.1}px;\
             animation-delay:{:.2}s;animation-duration:{:.2}s;opacity:{:.2}",
            self.left_pct,
            self.top_pct,
            self.size_px,
            self.size_px,
            self.delay_s,
            self.duration_s,
            self.opacity
        )
    }
}

pub fn generate(count: u32, mut sample: impl FnMut() -> f64) -> Vec<Particle> {
    (0..count).map(|_| Particle::from_samples(&mut sample)).collect()
}

pub fn render(document: &Document, particles: &[Particle]) -> Result<usize, JsValue> {
    let Some(container) = document.get_element_by_id(CONTAINER_ID) else {
        return Ok(0);
    };

    container.set_inner_html("");
    for particle in particles {
        let el = document.create_element("div")?;
        el.set_class_name("particle");
        el.set_attribute("style", &particle.style())?;
        el.set_attribute("aria-hidden", "true")?;
        container.append_child(&el)?;
    }

    Ok(particles.len())
}

pub fn install(document: &Document, count: u32, sequencer: &LoadingSequencer<DomPlatform>) {
    let doc = document.clone();
    sequencer.on_ready(move || {
        let particles = generate(count, js_sys::Math::random);
        match render(&doc, &particles) {
            Ok(rendered) => log_event(&doc, &format!("particles ({})", rendered)),
            Err(err) => warn(&format!("particles failed: {}", js_value_to_string(&err))),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_map_into_ranges() {
        let low = Particle::from_samples(|| 0.0);
        assert_eq!(low.size_px, 2.0);
        assert_eq!(low.duration_s, 10.0);
        assert_eq!(low.opacity, 0.2);

        let high = Particle::from_samples(|| 1.0);
        assert_eq!(high.left_pct, 100.0);
        assert_eq!(high.size_px, 6.0);
        assert_eq!(high.delay_s, 20.0);
        assert_eq!(high.duration_s, 30.0);
    }

    #[test]
    fn generate_uses_six_samples_per_particle() {
        let mut calls = 0u32;
        let particles = generate(4, || {
            calls += 1;
            0.5
        });
        assert_eq!(particles.len(), 4);
        assert_eq!(calls, 24);
        assert!(generate(0, || 0.5).is_empty());
    }

    #[test]
    fn style_is_inline_css() {
        let style = Particle::from_samples(|| 0.5).style();
        assert!(style.starts_with("left:50.00%;top:50.00%;width:4.0px;height:4.0px;"));
        assert!(style.contains("animation-duration:20.00s"));
    }
}
