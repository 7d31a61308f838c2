use std::fmt;
use uuid::Uuid;

/// A compact, append-only chain of cause identifiers threaded through job
/// failures so the scheduler can persist a bounded provenance trail without
/// keeping full error backtraces (see spec section 7, "Propagation policy").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CauseChain(Vec<Uuid>);

impl CauseChain {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn root(id: Uuid) -> Self {
        Self(vec![id])
    }

    /// Appends a new cause, returning a fresh chain. The original is left
    /// untouched so a single failure can fan out into several derived jobs
    /// each with their own extended chain.
    pub fn extend(&self, id: Uuid) -> Self {
        let mut next = self.0.clone();
        next.push(id);
        Self(next)
    }

    pub fn head(&self) -> Option<Uuid> {
        self.0.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn ids(&self) -> &[Uuid] {
        &self.0
    }
}

impl fmt::Display for CauseChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "{}", rendered.join(">"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_does_not_mutate_original() {
        let root = CauseChain::root(Uuid::nil());
        let child_id = Uuid::new_v4();
        let child = root.extend(child_id);

        assert_eq!(root.depth(), 1);
        assert_eq!(child.depth(), 2);
        assert_eq!(child.head(), Some(child_id));
    }

    #[test]
    fn display_joins_with_arrows() {
        let a = Uuid::nil();
        let chain = CauseChain::root(a);
        assert_eq!(chain.to_string(), a.to_string());
    }
}
