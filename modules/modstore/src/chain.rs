//! Decorator chains shared by middleware and transform-wraps.

use std::sync::Arc;

/// Wraps the next handler in a chain and returns the decorated handler.
pub trait Chain<H>: Send + Sync {
    fn wrap(&self, next: H) -> H;
}

impl<H, F> Chain<H> for F
where
    F: Fn(H) -> H + Send + Sync,
{
    fn wrap(&self, next: H) -> H {
        self(next)
    }
}

/// Fold `links` around `inner`, right to left.
///
/// `links[0]` ends up outermost: it runs first and sees the result of
/// everything after it.
pub fn compose<H>(links: &[Arc<dyn Chain<H>>], inner: H) -> H {
    links.iter().rev().fold(inner, |next, link| link.wrap(next))
}
