//! Resource-gated loading sequencer.
//!
//! Tracks a fixed set of page resources and opens a one-shot "ready" gate once
//! every resource has settled (followed by a short grace delay) or once the
//! fallback timeout elapses, whichever happens first. The platform side
//! (resource discovery, listener attachment, timers) sits behind
//! [`LoadPlatform`] so the gate logic runs the same in the browser and in
//! native unit tests.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

pub const FALLBACK_TIMEOUT_MS: u32 = 5000;
pub const GRACE_DELAY_MS: u32 = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Stylesheet,
    FontsSignal,
}

impl ResourceKind {
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Image => "image",
            ResourceKind::Stylesheet => "stylesheet",
            ResourceKind::FontsSignal => "fonts",
        }
    }
}

/// One trackable page asset, captured during discovery and never mutated.
pub struct ResourceDescriptor<H> {
    kind: ResourceKind,
    locator: Option<String>,
    handle: H,
}

impl<H> ResourceDescriptor<H> {
    pub fn image(locator: impl Into<String>, handle: H) -> Self {
        Self {
            kind: ResourceKind::Image,
            locator: Some(locator.into()),
            handle,
        }
    }

    pub fn stylesheet(locator: impl Into<String>, handle: H) -> Self {
        Self {
            kind: ResourceKind::Stylesheet,
            locator: Some(locator.into()),
            handle,
        }
    }

    pub fn fonts_signal(handle: H) -> Self {
        Self {
            kind: ResourceKind::FontsSignal,
            locator: None,
            handle,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Ready,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    pub loaded: usize,
    pub total: usize,
    pub percent: f64,
}

impl Progress {
    pub fn new(loaded: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            (loaded as f64 / total as f64 * 100.0).min(100.0)
        };
        Self {
            loaded,
            total,
            percent,
        }
    }

    pub fn status_message(&self) -> &'static str {
        status_message(self.percent)
    }
}

/// Milestone text shown under the loader bar for a given percentage.
pub fn status_message(percent: f64) -> &'static str {
    if percent >= 100.0 {
        "Welcome to MeisterCo"
    } else if percent >= 75.0 {
        "Final inspection..."
    } else if percent >= 50.0 {
        "Warming up the engines..."
    } else if percent >= 25.0 {
        "Polishing the chrome..."
    } else {
        "Preparing the showroom..."
    }
}

/// One-shot settlement notifier handed to the platform for each resource.
///
/// Clones share the same flag, so wiring a clone into both the success and the
/// failure listener still counts the resource once.
#[derive(Clone)]
pub struct Settle {
    fired: Rc<Cell<bool>>,
    notify: Rc<dyn Fn()>,
}

impl Settle {
    fn new(notify: impl Fn() + 'static) -> Self {
        Self {
            fired: Rc::new(Cell::new(false)),
            notify: Rc::new(notify),
        }
    }

    pub fn settle(&self) {
        if !self.fired.replace(true) {
            (self.notify)();
        }
    }

    pub fn is_settled(&self) -> bool {
        self.fired.get()
    }
}

pub trait LoadPlatform: 'static {
    type Handle: 'static;

    /// Snapshot of the trackable resources currently on the page.
    fn discover(&self) -> Vec<ResourceDescriptor<Self::Handle>>;

    /// Wire `settle` to the resource's completion. May settle synchronously.
    fn attach(&self, resource: &ResourceDescriptor<Self::Handle>, settle: Settle);

    fn set_timeout(&self, delay_ms: u32, task: Box<dyn FnOnce()>);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequencerConfig {
    pub fallback_timeout_ms: u32,
    pub grace_delay_ms: u32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            fallback_timeout_ms: FALLBACK_TIMEOUT_MS,
            grace_delay_ms: GRACE_DELAY_MS,
        }
    }
}

struct SequencerState {
    total: usize,
    loaded: usize,
    phase: Phase,
    discovered: bool,
    started: bool,
}

struct Inner<P: LoadPlatform> {
    platform: P,
    config: SequencerConfig,
    state: RefCell<SequencerState>,
    resources: RefCell<Vec<ResourceDescriptor<P::Handle>>>,
    progress_sink: RefCell<Option<Box<dyn FnMut(Progress)>>>,
    ready_hooks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// Shared handle to a sequencer; clones observe and drive the same gate.
pub struct LoadingSequencer<P: LoadPlatform> {
    inner: Rc<Inner<P>>,
}

impl<P: LoadPlatform> Clone for LoadingSequencer<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: LoadPlatform> LoadingSequencer<P> {
    pub fn new(platform: P, config: SequencerConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                platform,
                config,
                state: RefCell::new(SequencerState {
                    total: 0,
                    loaded: 0,
                    phase: Phase::Pending,
                    discovered: false,
                    started: false,
                }),
                resources: RefCell::new(Vec::new()),
                progress_sink: RefCell::new(None),
                ready_hooks: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> SequencerConfig {
        self.inner.config
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.borrow().phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase() == Phase::Ready
    }

    pub fn total(&self) -> usize {
        self.inner.state.borrow().total
    }

    pub fn loaded(&self) -> usize {
        self.inner.state.borrow().loaded
    }

    pub fn progress(&self) -> Progress {
        let st = self.inner.state.borrow();
        Progress::new(st.loaded, st.total)
    }

    pub fn on_progress(&self, sink: impl FnMut(Progress) + 'static) {
        *self.inner.progress_sink.borrow_mut() = Some(Box::new(sink));
    }

    /// Registers a hook for the ready transition. Runs immediately if the gate
    /// is already open.
    pub fn on_ready(&self, hook: impl FnOnce() + 'static) {
        if self.is_complete() {
            hook();
            return;
        }
        self.inner.ready_hooks.borrow_mut().push(Box::new(hook));
    }

    /// Scans the page once; later calls return the existing total.
    pub fn discover(&self) -> usize {
        if self.inner.state.borrow().discovered {
            return self.total();
        }

        let resources = self.inner.platform.discover();
        let total = resources.len();
        *self.inner.resources.borrow_mut() = resources;

        let mut st = self.inner.state.borrow_mut();
        st.discovered = true;
        st.total = total;
        total
    }

    pub fn start(&self) {
        {
            let mut st = self.inner.state.borrow_mut();
            if st.started {
                return;
            }
            st.started = true;
            if st.phase == Phase::Ready {
                return;
            }
        }

        if self.discover() == 0 {
            self.complete_loading();
            return;
        }

        // Stylesheets that are already parsed settle inside `attach`.
        let resources = std::mem::take(&mut *self.inner.resources.borrow_mut());
        for resource in &resources {
            let weak: Weak<Inner<P>> = Rc::downgrade(&self.inner);
            let settle = Settle::new(move || {
                if let Some(inner) = weak.upgrade() {
                    LoadingSequencer { inner }.on_resource_settled();
                }
            });
            self.inner.platform.attach(resource, settle);
        }
        if self.phase() == Phase::Pending {
            *self.inner.resources.borrow_mut() = resources;
        }

        let this = self.clone();
        self.inner.platform.set_timeout(
            self.inner.config.fallback_timeout_ms,
            Box::new(move || this.complete_loading()),
        );
    }

    fn on_resource_settled(&self) {
        let (progress, all_settled) = {
            let mut st = self.inner.state.borrow_mut();
            if st.loaded < st.total {
                st.loaded += 1;
            }
            if st.phase == Phase::Ready {
                return;
            }
            (Progress::new(st.loaded, st.total), st.loaded >= st.total)
        };

        self.report(progress);

        if all_settled {
            let this = self.clone();
            self.inner.platform.set_timeout(
                self.inner.config.grace_delay_ms,
                Box::new(move || this.complete_loading()),
            );
        }
    }

    fn report(&self, progress: Progress) {
        let sink = self.inner.progress_sink.borrow_mut().take();
        if let Some(mut sink) = sink {
            sink(progress);
            let mut slot = self.inner.progress_sink.borrow_mut();
            if slot.is_none() {
                *slot = Some(sink);
            }
        }
    }

    /// Opens the gate. Only the first call has any effect.
    pub fn complete_loading(&self) {
        {
            let mut st = self.inner.state.borrow_mut();
            if st.phase == Phase::Ready {
                return;
            }
            st.phase = Phase::Ready;
        }

        self.inner.resources.borrow_mut().clear();
        let hooks = std::mem::take(&mut *self.inner.ready_hooks.borrow_mut());
        for hook in hooks {
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Timer {
        due: u32,
        seq: u64,
        task: Box<dyn FnOnce()>,
    }

    #[derive(Default)]
    struct ManualClock {
        now: Cell<u32>,
        seq: Cell<u64>,
        timers: RefCell<Vec<Timer>>,
    }

    impl ManualClock {
        fn now(&self) -> u32 {
            self.now.get()
        }

        fn pending(&self) -> usize {
            self.timers.borrow().len()
        }

        fn schedule(&self, delay_ms: u32, task: Box<dyn FnOnce()>) {
            let seq = self.seq.get();
            self.seq.set(seq + 1);
            self.timers.borrow_mut().push(Timer {
                due: self.now.get() + delay_ms,
                seq,
                task,
            });
        }

        fn advance_to(&self, target: u32) {
            loop {
                let next = {
                    let mut timers = self.timers.borrow_mut();
                    let idx = timers
                        .iter()
                        .enumerate()
                        .filter(|(_, t)| t.due <= target)
                        .min_by_key(|(_, t)| (t.due, t.seq))
                        .map(|(i, _)| i);
                    idx.map(|i| timers.remove(i))
                };
                let Some(timer) = next else {
                    break;
                };
                self.now.set(timer.due);
                (timer.task)();
            }
            self.now.set(target.max(self.now.get()));
        }
    }

    #[derive(Clone, Copy)]
    enum Fake {
        Pending,
        Parsed,
    }

    #[derive(Clone, Default)]
    struct ManualPlatform {
        clock: Rc<ManualClock>,
        plan: Rc<RefCell<Vec<(ResourceKind, Fake)>>>,
        settles: Rc<RefCell<Vec<Settle>>>,
        discover_calls: Rc<Cell<u32>>,
    }

    impl ManualPlatform {
        fn with(plan: &[(ResourceKind, Fake)]) -> Self {
            let platform = Self::default();
            platform.plan.borrow_mut().extend_from_slice(plan);
            platform
        }

        fn settle(&self, index: usize) {
            let settle = self.settles.borrow()[index].clone();
            settle.settle();
        }
    }

    impl LoadPlatform for ManualPlatform {
        type Handle = Fake;

        fn discover(&self) -> Vec<ResourceDescriptor<Fake>> {
            self.discover_calls.set(self.discover_calls.get() + 1);
            self.plan
                .borrow()
                .iter()
                .enumerate()
                .map(|(i, (kind, fake))| match kind {
                    ResourceKind::Image => ResourceDescriptor::image(format!("/img/{i}.jpg"), *fake),
                    ResourceKind::Stylesheet => {
                        ResourceDescriptor::stylesheet(format!("/css/{i}.css"), *fake)
                    }
                    ResourceKind::FontsSignal => ResourceDescriptor::fonts_signal(*fake),
                })
                .collect()
        }

        fn attach(&self, resource: &ResourceDescriptor<Fake>, settle: Settle) {
            self.settles.borrow_mut().push(settle.clone());
            if let Fake::Parsed = resource.handle() {
                settle.settle();
            }
        }

        fn set_timeout(&self, delay_ms: u32, task: Box<dyn FnOnce()>) {
            self.clock.schedule(delay_ms, task);
        }
    }

    struct Harness {
        platform: ManualPlatform,
        sequencer: LoadingSequencer<ManualPlatform>,
        fired_at: Rc<RefCell<Vec<u32>>>,
        reports: Rc<RefCell<Vec<Progress>>>,
    }

    fn harness(plan: &[(ResourceKind, Fake)]) -> Harness {
        let platform = ManualPlatform::with(plan);
        let sequencer = LoadingSequencer::new(platform.clone(), SequencerConfig::default());

        let fired_at = Rc::new(RefCell::new(Vec::new()));
        let reports = Rc::new(RefCell::new(Vec::new()));
        {
            let fired_at = Rc::clone(&fired_at);
            let clock = Rc::clone(&platform.clock);
            sequencer.on_ready(move || fired_at.borrow_mut().push(clock.now()));
        }
        {
            let reports = Rc::clone(&reports);
            sequencer.on_progress(move |p| reports.borrow_mut().push(p));
        }

        Harness {
            platform,
            sequencer,
            fired_at,
            reports,
        }
    }

    fn percents(reports: &[Progress]) -> Vec<u32> {
        reports.iter().map(|p| p.percent.round() as u32).collect()
    }

    #[test]
    fn empty_page_opens_immediately() {
        let h = harness(&[]);
        h.sequencer.start();

        assert_eq!(*h.fired_at.borrow(), vec![0]);
        assert!(h.sequencer.is_complete());
        assert_eq!(h.platform.clock.pending(), 0);
        assert_eq!(h.sequencer.progress().percent, 100.0);
    }

    #[test]
    fn parsed_stylesheet_and_two_images_open_after_grace() {
        let h = harness(&[
            (ResourceKind::Image, Fake::Pending),
            (ResourceKind::Image, Fake::Pending),
            (ResourceKind::Stylesheet, Fake::Parsed),
        ]);
        h.sequencer.start();
        assert_eq!(h.sequencer.loaded(), 1);
        assert_eq!(percents(&h.reports.borrow()), vec![33]);

        h.platform.clock.advance_to(100);
        h.platform.settle(0);
        h.platform.clock.advance_to(200);
        h.platform.settle(1);
        assert_eq!(percents(&h.reports.borrow()), vec![33, 67, 100]);

        h.platform.clock.advance_to(699);
        assert!(h.fired_at.borrow().is_empty());
        h.platform.clock.advance_to(700);
        assert_eq!(*h.fired_at.borrow(), vec![700]);

        h.platform.clock.advance_to(10_000);
        assert_eq!(*h.fired_at.borrow(), vec![700]);
    }

    #[test]
    fn hung_image_falls_back_at_timeout() {
        let h = harness(&[
            (ResourceKind::Image, Fake::Pending),
            (ResourceKind::Image, Fake::Pending),
        ]);
        h.sequencer.start();

        h.platform.clock.advance_to(100);
        h.platform.settle(0);
        h.platform.clock.advance_to(4_999);
        assert!(h.fired_at.borrow().is_empty());
        assert_eq!(h.sequencer.phase(), Phase::Pending);

        h.platform.clock.advance_to(5_000);
        assert_eq!(*h.fired_at.borrow(), vec![5_000]);

        h.platform.clock.advance_to(7_000);
        h.platform.settle(1);
        h.platform.clock.advance_to(9_000);
        assert_eq!(*h.fired_at.borrow(), vec![5_000]);
        assert_eq!(h.sequencer.loaded(), 2);
        assert_eq!(percents(&h.reports.borrow()), vec![50]);
        assert_eq!(h.platform.clock.pending(), 0);
    }

    #[test]
    fn failed_image_still_counts_as_settled() {
        let h = harness(&[(ResourceKind::Image, Fake::Pending)]);
        h.sequencer.start();

        h.platform.clock.advance_to(10);
        // the error listener shares the same settle handle
        h.platform.settle(0);
        assert_eq!(h.sequencer.loaded(), 1);

        h.platform.clock.advance_to(510);
        assert_eq!(*h.fired_at.borrow(), vec![510]);
    }

    #[test]
    fn duplicate_notifications_count_once() {
        let h = harness(&[
            (ResourceKind::Image, Fake::Pending),
            (ResourceKind::FontsSignal, Fake::Pending),
        ]);
        h.sequencer.start();

        h.platform.settle(1);
        h.platform.settle(1);
        assert_eq!(h.sequencer.loaded(), 1);
        assert!(h.platform.settles.borrow()[1].is_settled());
        assert!(!h.platform.settles.borrow()[0].is_settled());
    }

    #[test]
    fn progress_is_monotonic_and_capped() {
        let plan: Vec<_> = (0..7).map(|_| (ResourceKind::Image, Fake::Pending)).collect();
        let h = harness(&plan);
        h.sequencer.start();

        for index in [3, 0, 6, 1, 5, 2, 4] {
            h.platform.settle(index);
            h.platform.settle(index);
        }

        let reports = h.reports.borrow();
        assert_eq!(reports.len(), 7);
        assert!(reports.windows(2).all(|w| w[0].percent <= w[1].percent));
        assert!(reports.iter().all(|p| p.percent <= 100.0));
        assert_eq!(reports.last().map(|p| p.percent), Some(100.0));
    }

    #[test]
    fn all_settled_before_fallback_does_not_fire_twice() {
        let h = harness(&[(ResourceKind::Stylesheet, Fake::Parsed)]);
        h.sequencer.start();

        // grace timer and fallback timer are both armed; the loser is harmless
        assert_eq!(h.platform.clock.pending(), 2);
        h.platform.clock.advance_to(6_000);
        assert_eq!(*h.fired_at.borrow(), vec![500]);
    }

    #[test]
    fn hooks_registered_after_ready_run_once_immediately() {
        let h = harness(&[]);
        h.sequencer.start();

        let late = Rc::new(Cell::new(0));
        let late_hook = Rc::clone(&late);
        h.sequencer.on_ready(move || late_hook.set(late_hook.get() + 1));
        assert_eq!(late.get(), 1);

        h.sequencer.complete_loading();
        assert_eq!(late.get(), 1);
        assert_eq!(h.fired_at.borrow().len(), 1);
    }

    #[test]
    fn discovery_and_start_are_one_shot() {
        let h = harness(&[(ResourceKind::Image, Fake::Pending)]);
        assert_eq!(h.sequencer.discover(), 1);
        h.platform
            .plan
            .borrow_mut()
            .push((ResourceKind::Image, Fake::Pending));

        h.sequencer.start();
        h.sequencer.start();
        assert_eq!(h.sequencer.total(), 1);
        assert_eq!(h.platform.discover_calls.get(), 1);
        assert_eq!(h.platform.settles.borrow().len(), 1);
        assert_eq!(h.platform.clock.pending(), 1);
    }

    #[test]
    fn forced_completion_skips_waiting() {
        let h = harness(&[(ResourceKind::Image, Fake::Pending)]);
        h.sequencer.complete_loading();
        assert_eq!(*h.fired_at.borrow(), vec![0]);

        h.sequencer.start();
        assert!(h.platform.settles.borrow().is_empty());
        assert_eq!(h.platform.clock.pending(), 0);
        assert_eq!(h.fired_at.borrow().len(), 1);
    }

    #[test]
    fn status_messages_follow_milestones() {
        assert_eq!(status_message(0.0), "Preparing the showroom...");
        assert_eq!(status_message(33.3), "Polishing the chrome...");
        assert_eq!(status_message(50.0), "Warming up the engines...");
        assert_eq!(status_message(99.9), "Final inspection...");
        assert_eq!(status_message(100.0), "Welcome to MeisterCo");
        assert_eq!(Progress::new(0, 0).status_message(), "Welcome to MeisterCo");
    }
}
