/// Result of a rewrite pass: whether the input was changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed<T> {
    Yes(T),
    No(T),
}

impl<T> Transformed<T> {
    pub fn get_plan(self) -> T {
        match self {
            Transformed::Yes(plan) | Transformed::No(plan) => plan,
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, Transformed::Yes(_))
    }

    pub fn from_changed(plan: T, changed: bool) -> Self {
        if changed {
            Transformed::Yes(plan)
        } else {
            Transformed::No(plan)
        }
    }
}
