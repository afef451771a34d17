/// Run stamp used to invalidate asynchronous work started by a superseded run.
///
/// A controller owns the current value and advances it on every start, cancel
/// and reset. Work captures the value when it begins and may only commit if the
/// value is still current when it finishes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub const INITIAL: Generation = Generation(0);

    pub fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }

    pub fn advance(&mut self) -> Self {
        *self = self.next();
        *self
    }

    pub fn is_current(self, current: Generation) -> bool {
        self == current
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Generation;

    #[test]
    fn advance_is_monotonic() {
        let mut g = Generation::INITIAL;
        assert_eq!(g.advance(), Generation(1));
        assert_eq!(g.advance(), Generation(2));
        assert!(Generation(1) < g);
    }

    #[test]
    fn captured_stamp_goes_stale() {
        let mut current = Generation(4);
        let captured = current;
        assert!(captured.is_current(current));
        current.advance();
        assert!(!captured.is_current(current));
    }
}
