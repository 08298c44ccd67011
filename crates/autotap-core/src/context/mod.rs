//! Execution context: device, scope stack, engines and interrupt flag.
//!
//! A [`Context`] is the one object automation code carries around. It is
//! built once per run with [`Context::builder`] and shared by reference.
//! Scopes are entered with [`Context::manual_context`], which returns a
//! guard that pops the scope when dropped, so the stack stays balanced on
//! every exit path including `?` and panics.
//!
//! ```ignore
//! let ctx = Context::builder(device).ocr_engine(OcrLanguage::Japanese, engine).build()?;
//! let _scope = ctx.manual_context(ScreenshotMode::Manual);
//! ctx.screenshot()?;
//! if ctx.image().find(&ok_button)?.is_some() {
//!     ctx.device().click()?;
//! }
//! ```

mod interrupt;
mod scope;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, warn};

pub use interrupt::Interrupt;
pub use scope::{Scope, ScopeStack, ScreenshotMode};

use crate::config::Config;
use crate::device::{Device, DeviceHandle};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::recognition::{ColorRecognizer, ImageRecognizer, TextRecognizer};
use crate::vision::matcher::{CorrelationMatcher, TemplateMatcher};
use crate::vision::ocr::{OcrEngine, OcrLanguage, PredicateCache, TextSearch};
use crate::vision::TemplateSearch;

/// Builder for [`Context`].
pub struct ContextBuilder {
    device: Box<dyn Device>,
    matcher: Option<Arc<dyn TemplateMatcher>>,
    engines: HashMap<OcrLanguage, Arc<dyn OcrEngine>>,
    config: Config,
    interrupt: Option<Interrupt>,
}

impl ContextBuilder {
    /// Replace the default [`CorrelationMatcher`].
    #[must_use]
    pub fn matcher(mut self, matcher: Arc<dyn TemplateMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Register the OCR engine for `language`.
    #[must_use]
    pub fn ocr_engine(mut self, language: OcrLanguage, engine: Arc<dyn OcrEngine>) -> Self {
        self.engines.insert(language, engine);
        self
    }

    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Share an existing interrupt flag, e.g. [`Interrupt::global`].
    #[must_use]
    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn build(self) -> Result<Context> {
        self.config.validate()?;
        let matcher = self
            .matcher
            .unwrap_or_else(|| Arc::new(CorrelationMatcher));
        let engines = self
            .engines
            .into_iter()
            .map(|(lang, engine)| (lang, TextSearch::new(engine, self.config.ocr)))
            .collect();
        Ok(Context {
            device: DeviceHandle::new(self.device),
            scopes: Mutex::new(ScopeStack::new()),
            interrupt: self.interrupt.unwrap_or_default(),
            templates: TemplateSearch::new(matcher, self.config.matching.dedup),
            engines,
            predicates: PredicateCache::new(
                self.config.ocr.predicate_cache_capacity,
                self.config.ocr.fuzzy_ratio,
            ),
            config: self.config,
        })
    }
}

/// Shared state for one automation run.
pub struct Context {
    device: DeviceHandle,
    scopes: Mutex<ScopeStack>,
    interrupt: Interrupt,
    config: Config,
    templates: TemplateSearch,
    engines: HashMap<OcrLanguage, TextSearch>,
    predicates: PredicateCache,
}

impl Context {
    pub fn builder(device: impl Device + 'static) -> ContextBuilder {
        ContextBuilder {
            device: Box::new(device),
            matcher: None,
            engines: HashMap::new(),
            config: Config::default(),
            interrupt: None,
        }
    }

    #[must_use]
    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Memoized text predicates (`fuzz`, `regex`, `contains`, `equals`).
    #[must_use]
    pub fn predicates(&self) -> &PredicateCache {
        &self.predicates
    }

    pub fn check_interrupt(&self) -> Result<()> {
        self.interrupt.check()
    }

    /// Sleep, waking early with [`Error::Interrupted`] if the flag is set.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        self.interrupt.sleep(duration)
    }

    /// Enter a scope; it is popped when the guard drops.
    pub fn manual_context(&self, mode: ScreenshotMode) -> ScopeGuard<'_> {
        let depth = self.scopes.lock().push(mode);
        ScopeGuard { ctx: self, depth }
    }

    /// Push a scope without a guard. Pair with [`Context::pop_scope`].
    pub fn push_scope(&self, mode: ScreenshotMode) -> usize {
        self.scopes.lock().push(mode)
    }

    pub fn pop_scope(&self) -> Result<Scope> {
        self.scopes.lock().pop()
    }

    #[must_use]
    pub fn scope_depth(&self) -> usize {
        self.scopes.lock().depth()
    }

    pub fn current_mode(&self) -> Result<ScreenshotMode> {
        Ok(self.scopes.lock().current()?.mode())
    }

    /// The frame recognition should use right now, per the current mode.
    pub fn frame(&self) -> Result<Frame> {
        self.scopes.lock().read(|| self.device.capture())
    }

    /// Acquire a frame explicitly and make it the current scope's frame.
    ///
    /// A pending inherited frame is consumed instead of capturing.
    pub fn screenshot(&self) -> Result<Frame> {
        self.check_interrupt()?;
        let mut scopes = self.scopes.lock();
        let frame = match scopes.take_inherited()? {
            Some(frame) => frame,
            None => self.device.capture()?,
        };
        scopes.install(frame.clone())?;
        Ok(frame)
    }

    /// Install `frame` as the current scope's frame, or take a screenshot
    /// when `None`.
    pub fn use_frame(&self, frame: Option<Frame>) -> Result<Frame> {
        match frame {
            Some(frame) => {
                self.scopes.lock().install(frame.clone())?;
                Ok(frame)
            }
            None => self.screenshot(),
        }
    }

    /// Template recognition in the current scope.
    #[must_use]
    pub fn image(&self) -> ImageRecognizer<'_> {
        ImageRecognizer::new(self)
    }

    /// Text recognition with the default (Japanese) engine.
    #[must_use]
    pub fn ocr(&self) -> TextRecognizer<'_> {
        TextRecognizer::new(self, OcrLanguage::default())
    }

    #[must_use]
    pub fn ocr_lang(&self, language: OcrLanguage) -> TextRecognizer<'_> {
        TextRecognizer::new(self, language)
    }

    #[must_use]
    pub fn color(&self) -> ColorRecognizer<'_> {
        ColorRecognizer::new(self)
    }

    pub(crate) fn templates(&self) -> &TemplateSearch {
        &self.templates
    }

    pub(crate) fn text_search(&self, language: OcrLanguage) -> Result<&TextSearch> {
        self.engines
            .get(&language)
            .ok_or(Error::NoOcrEngine { language })
    }

    /// Poll `probe` until it yields a value or `timeout` elapses.
    ///
    /// Returns `Ok(None)` on timeout. Interruption is checked before every
    /// probe and during every sleep.
    pub fn wait_until<T>(
        &self,
        what: &str,
        timeout: Duration,
        interval: Duration,
        mut probe: impl FnMut() -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        if let Ok(mode) = self.current_mode() {
            if mode.is_manual() {
                warn!(
                    %mode,
                    what,
                    "waiting inside a {} scope; the frame will not change between polls",
                    mode
                );
            }
        }
        let start = Instant::now();
        loop {
            self.check_interrupt()?;
            if let Some(value) = probe()? {
                return Ok(Some(value));
            }
            if start.elapsed() >= timeout {
                return Ok(None);
            }
            self.sleep(interval)?;
        }
    }

    /// Like [`Context::wait_until`], failing with [`Error::Timeout`].
    pub fn expect_within<T>(
        &self,
        what: &str,
        timeout: Duration,
        interval: Duration,
        probe: impl FnMut() -> Result<Option<T>>,
    ) -> Result<T> {
        let start = Instant::now();
        self.wait_until(what, timeout, interval, probe)?
            .ok_or_else(|| Error::timeout(what, start.elapsed()))
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("scope_depth", &self.scope_depth())
            .field("languages", &self.engines.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Pops its scope on drop.
#[must_use = "the scope is popped as soon as the guard is dropped"]
pub struct ScopeGuard<'a> {
    ctx: &'a Context,
    depth: usize,
}

impl ScopeGuard<'_> {
    /// Stack depth including this scope.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        let mut scopes = self.ctx.scopes.lock();
        if scopes.depth() != self.depth {
            warn!(
                expected = self.depth,
                actual = scopes.depth(),
                "scope stack unbalanced when leaving scope"
            );
        }
        if let Err(err) = scopes.pop() {
            error!(error = %err, "failed to pop scope");
        }
    }
}
