//! Ordered chains of parameter constraints.

use std::fmt;

use vista_core::Size;

/// Viewport facts a limiter may depend on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LimitContext {
    pub size: Size,
    pub pixel_ratio: f64,
}

/// One constraint on view parameters.
///
/// `apply` must be idempotent: applying it to parameters it already
/// accepts returns them unchanged.
pub trait Limiter<P>: fmt::Debug {
    fn apply(&self, params: P, ctx: &LimitContext) -> P;
}

/// Limiters applied in sequence after every parameter or size change.
pub struct LimiterChain<P> {
    stages: Vec<Box<dyn Limiter<P>>>,
}

impl<P> LimiterChain<P> {
    /// A chain that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a limiter, builder style.
    #[must_use]
    pub fn with(mut self, limiter: impl Limiter<P> + 'static) -> Self {
        self.push(limiter);
        self
    }

    pub fn push(&mut self, limiter: impl Limiter<P> + 'static) {
        self.stages.push(Box::new(limiter));
    }

    /// Run every stage in order.
    pub fn apply(&self, params: P, ctx: &LimitContext) -> P {
        self.stages
            .iter()
            .fold(params, |params, stage| stage.apply(params, ctx))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Limiter<P>> {
        self.stages.iter().map(|stage| stage.as_ref())
    }
}

impl<P> Default for LimiterChain<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for LimiterChain<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stages.iter()).finish()
    }
}
