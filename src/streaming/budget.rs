//! Resident-size accounting against a soft byte budget
//!
//! The budget is soft: the cache only evicts objects that are no longer
//! requested, so the resident total may stay above it when the visible set
//! alone is larger.

/// Running resident total compared to a byte budget
#[derive(Clone, Copy, Debug, Default)]
pub struct ByteBudget {
    /// Target resident size (bytes). 0 means unlimited.
    budget_bytes: usize,
    /// Bytes currently held by resident objects
    used_bytes: usize,
}

impl ByteBudget {
    /// Create a budget of `budget_bytes` (0 = unlimited)
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            budget_bytes,
            used_bytes: 0,
        }
    }

    /// Add resident bytes
    pub fn add(&mut self, bytes: usize) {
        self.used_bytes = self.used_bytes.saturating_add(bytes);
    }

    /// Remove resident bytes
    pub fn remove(&mut self, bytes: usize) {
        self.used_bytes = self.used_bytes.saturating_sub(bytes);
    }

    /// Account for an object whose size went from `before` to `after`
    pub fn adjust(&mut self, before: usize, after: usize) {
        if after >= before {
            self.add(after - before);
        } else {
            self.remove(before - after);
        }
    }

    /// Budget in bytes (0 = unlimited)
    pub fn limit(&self) -> usize {
        self.budget_bytes
    }

    pub fn set_limit(&mut self, budget_bytes: usize) {
        self.budget_bytes = budget_bytes;
    }

    /// Bytes currently resident
    pub fn used(&self) -> usize {
        self.used_bytes
    }

    /// Whether a limit is in force
    pub fn is_limited(&self) -> bool {
        self.budget_bytes > 0
    }

    /// True when limited and the resident total exceeds the limit
    pub fn is_over(&self) -> bool {
        self.is_limited() && self.used_bytes > self.budget_bytes
    }

    /// Resident total as a fraction of the budget (0.0 to 1.0+)
    ///
    /// Always 0.0 for an unlimited budget.
    pub fn pressure(&self) -> f32 {
        if self.budget_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f32 / self.budget_bytes as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_new() {
        let budget = ByteBudget::new(1024);
        assert_eq!(budget.used(), 0);
        assert_eq!(budget.limit(), 1024);
        assert!(!budget.is_over());
    }

    #[test]
    fn test_budget_adjust() {
        let mut budget = ByteBudget::new(1024);
        budget.adjust(0, 600);
        assert_eq!(budget.used(), 600);

        // Object shrank from 600 to 100
        budget.adjust(600, 100);
        assert_eq!(budget.used(), 100);

        budget.adjust(100, 100);
        assert_eq!(budget.used(), 100);
    }

    #[test]
    fn test_budget_saturating_ops() {
        let mut budget = ByteBudget::new(512);
        budget.remove(1000);
        assert_eq!(budget.used(), 0);

        budget.add(usize::MAX);
        budget.add(100);
        assert_eq!(budget.used(), usize::MAX);
    }

    #[test]
    fn test_budget_over_is_strict() {
        let mut budget = ByteBudget::new(100);
        budget.add(100);
        assert!(!budget.is_over());
        budget.add(1);
        assert!(budget.is_over());
        assert!(budget.pressure() > 1.0);
    }

    #[test]
    fn test_unlimited_budget_never_over() {
        let mut budget = ByteBudget::new(0);
        budget.add(1 << 40);
        assert!(!budget.is_limited());
        assert!(!budget.is_over());
        assert_eq!(budget.pressure(), 0.0);
    }
}
