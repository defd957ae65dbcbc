use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClauseKind {
    Match,
    With,
    Return,
    Unknown,
}

/// Identity of one query stage: its byte offset plus a kind tag. Ordered by
/// position, so `a < b` means `a` comes earlier in the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClauseId {
    pub position: usize,
    pub kind: ClauseKind,
}

impl ClauseId {
    pub fn new(position: usize, kind: ClauseKind) -> Self {
        ClauseId { position, kind }
    }

    /// Name of the stage's subquery before final naming, e.g. `match_12`.
    pub fn stage_name(&self) -> String {
        let prefix = match self.kind {
            ClauseKind::Match => "match",
            ClauseKind::With => "with",
            ClauseKind::Return => "return",
            ClauseKind::Unknown => "clause",
        };
        format!("{}_{}", prefix, self.position)
    }
}

impl fmt::Display for ClauseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stage_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_position() {
        let m = ClauseId::new(0, ClauseKind::Match);
        let w = ClauseId::new(25, ClauseKind::With);
        let r = ClauseId::new(40, ClauseKind::Return);
        assert!(m < w && w < r);
        assert_eq!(w.stage_name(), "with_25");
        assert_eq!(ClauseId::new(3, ClauseKind::Unknown).to_string(), "clause_3");
    }
}
