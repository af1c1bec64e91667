/// Watches a coupled analysis as it runs and may ask it to stop.
///
/// The Gauss-Seidel solver reports each completed pass over a cycle group
/// (`E`), and the run controller additionally reports each finished group.
/// Returning `Some(action)` hands the driver a control request (`A`), such
/// as stopping early once the residual is good enough; `None` lets the
/// analysis carry on.
///
/// Any `FnMut(&E) -> Option<A>` closure is an observer, and `()` is the
/// observer that never intervenes.
///
/// # Examples
///
/// ```
/// use mda_core::Observer;
///
/// // Stop once a pass residual drops under 1e-3.
/// let mut good_enough = |residual: &f64| (*residual < 1e-3).then_some("stop");
///
/// assert_eq!(good_enough.observe(&0.2), None);
/// assert_eq!(good_enough.observe(&5e-4), Some("stop"));
/// assert_eq!(Observer::<f64, &str>::observe(&mut (), &5e-4), None);
/// ```
pub trait Observer<E, A> {
    /// Sees one event and optionally returns a control action.
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}
