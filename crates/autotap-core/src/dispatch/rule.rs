//! Rule building blocks: what to look for and what to do about it.

use std::fmt;

use crate::context::Context;
use crate::error::Result;
use crate::geometry::{Point, Rect};
use crate::vision::image::Located;
use crate::vision::ocr::{StringMatcher, TextPattern};
use crate::vision::template::Template;

use super::context::DispatcherContext;

/// Something a rule can look for on the current frame.
#[derive(Debug, Clone)]
pub enum Target {
    Template(Template),
    Text {
        pattern: TextPattern,
        rect: Option<Rect>,
    },
    /// Always present; locates the whole frame, so clicking it taps the
    /// screen center.
    Center,
}

impl Target {
    pub fn text(pattern: impl Into<TextPattern>) -> Self {
        Target::Text {
            pattern: pattern.into(),
            rect: None,
        }
    }

    /// Text searched only inside `rect`.
    pub fn text_in(pattern: impl Into<TextPattern>, rect: Rect) -> Self {
        Target::Text {
            pattern: pattern.into(),
            rect: Some(rect),
        }
    }

    /// Locate the target in the context's current frame.
    pub fn locate(&self, ctx: &Context) -> Result<Option<Rect>> {
        match self {
            Target::Template(template) => Ok(ctx.image().find(template)?.map(|hit| hit.rect())),
            Target::Text { pattern, rect } => {
                let reader = match rect {
                    Some(rect) => ctx.ocr().rect(*rect),
                    None => ctx.ocr(),
                };
                Ok(reader.find_pattern(pattern)?.map(|hit| hit.rect))
            }
            Target::Center => Ok(Some(ctx.frame()?.bounds())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Template(template) => write!(f, "template '{}'", template.name()),
            Target::Text {
                pattern,
                rect: Some(rect),
            } => write!(f, "text {} in {}", pattern, rect),
            Target::Text { pattern, rect: None } => write!(f, "text {}", pattern),
            Target::Center => write!(f, "center"),
        }
    }
}

impl From<Template> for Target {
    fn from(template: Template) -> Self {
        Target::Template(template)
    }
}

impl From<&Template> for Target {
    fn from(template: &Template) -> Self {
        Target::Template(template.clone())
    }
}

impl From<TextPattern> for Target {
    fn from(pattern: TextPattern) -> Self {
        Target::text(pattern)
    }
}

impl From<StringMatcher> for Target {
    fn from(matcher: StringMatcher) -> Self {
        Target::text(matcher)
    }
}

impl From<&str> for Target {
    fn from(text: &str) -> Self {
        Target::text(text)
    }
}

pub(crate) type PredicateFn<'a, T> =
    Box<dyn FnMut(&DispatcherContext<'_, T>) -> Result<Option<Rect>> + 'a>;
pub(crate) type ActionFn<'a, T> =
    Box<dyn FnMut(&mut DispatcherContext<'_, T>, Rect) -> Result<()> + 'a>;

/// A dispatcher that can run to completion as another rule's action.
pub(crate) trait NestedRun {
    fn name(&self) -> &str;
    fn run_nested(&mut self, ctx: &Context) -> Result<()>;
}

pub(crate) enum Predicate<'a, T> {
    Target(Target),
    Custom(PredicateFn<'a, T>),
}

impl<T> Predicate<'_, T> {
    pub(crate) fn evaluate(&mut self, dc: &DispatcherContext<'_, T>) -> Result<Option<Rect>> {
        match self {
            Predicate::Target(target) => target.locate(dc.context()),
            Predicate::Custom(predicate) => predicate(dc),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Predicate::Target(target) => target.to_string(),
            Predicate::Custom(_) => "custom predicate".to_string(),
        }
    }
}

pub(crate) enum Action<'a, T> {
    /// Click the center of the located rectangle.
    ClickMatch,
    ClickPoint(Point),
    Nested(Box<dyn NestedRun + 'a>),
    Custom(ActionFn<'a, T>),
    Nothing,
}

impl<T> Action<'_, T> {
    pub(crate) fn perform(&mut self, dc: &mut DispatcherContext<'_, T>, rect: Rect) -> Result<()> {
        match self {
            Action::ClickMatch => dc.click_rect(rect),
            Action::ClickPoint(point) => dc.click_at(*point),
            Action::Nested(sub) => {
                tracing::debug!(sub = sub.name(), "running nested dispatcher");
                sub.run_nested(dc.context())
            }
            Action::Custom(action) => action(dc, rect),
            Action::Nothing => Ok(()),
        }
    }
}

/// One `(predicate, action, finish)` entry.
pub(crate) struct Rule<'a, T> {
    pub(crate) predicate: Predicate<'a, T>,
    pub(crate) action: Action<'a, T>,
    pub(crate) finish: bool,
    pub(crate) result: Option<T>,
    pub(crate) log: Option<String>,
}

impl<'a, T> Rule<'a, T> {
    pub(crate) fn new(predicate: Predicate<'a, T>, action: Action<'a, T>) -> Self {
        Self {
            predicate,
            action,
            finish: false,
            result: None,
            log: None,
        }
    }
}
