//! Row predicates and the default predicate filter.
//!
//! A `Condition` is a conjunction of per-field comparisons plus an optional
//! offset/count window. Ordering comparisons are numeric when both sides
//! parse as `i64` and lexicographic otherwise. A field missing from a row
//! does not constrain that row. Removed rows never match unless the
//! condition opts in with [`Condition::include_removed`].

use std::cmp::Ordering;

use crate::entry::{EntryData, EntryRef, EntryStatus};

/// Comparison operator of a single constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// One `field <op> value` comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub field: String,
    pub op: CompareOp,
    pub value: String,
}

impl Constraint {
    fn matches(&self, actual: &str) -> bool {
        match self.op {
            CompareOp::Eq => actual == self.value,
            CompareOp::Ne => actual != self.value,
            CompareOp::Gt => compare_values(actual, &self.value) == Ordering::Greater,
            CompareOp::Ge => compare_values(actual, &self.value) != Ordering::Less,
            CompareOp::Lt => compare_values(actual, &self.value) == Ordering::Less,
            CompareOp::Le => compare_values(actual, &self.value) != Ordering::Greater,
        }
    }
}

fn compare_values(lhs: &str, rhs: &str) -> Ordering {
    match (lhs.parse::<i64>(), rhs.parse::<i64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        _ => lhs.cmp(rhs),
    }
}

/// Predicate over row field values.
///
/// `Condition::new()` places no constraint and matches every active row.
#[derive(Debug, Clone, Default)]
pub struct Condition {
    constraints: Vec<Constraint>,
    offset: usize,
    count: Option<usize>,
    include_removed: bool,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, field: impl Into<String>, op: CompareOp, value: impl Into<String>) -> Self {
        self.constraints.push(Constraint {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(field, CompareOp::Eq, value)
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(field, CompareOp::Ne, value)
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(field, CompareOp::Gt, value)
    }

    pub fn ge(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(field, CompareOp::Ge, value)
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(field, CompareOp::Lt, value)
    }

    pub fn le(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(field, CompareOp::Le, value)
    }

    /// Skip the first `offset` matches and return at most `count`.
    pub fn limit(mut self, offset: usize, count: usize) -> Self {
        self.offset = offset;
        self.count = Some(count);
        self
    }

    /// Let removed rows match (audit reads).
    pub fn include_removed(mut self) -> Self {
        self.include_removed = true;
        self
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn includes_removed(&self) -> bool {
        self.include_removed
    }

    /// Copy of this condition with the offset/count window dropped.
    pub fn without_window(&self) -> Self {
        Self {
            offset: 0,
            count: None,
            ..self.clone()
        }
    }

    /// Apply the offset/count window to rows that already matched.
    pub fn window<T>(&self, matched: impl IntoIterator<Item = T>) -> Vec<T> {
        let rows = matched.into_iter().skip(self.offset);
        match self.count {
            Some(count) => rows.take(count).collect(),
            None => rows.collect(),
        }
    }

    /// Whether a single row satisfies every constraint, ignoring the window.
    pub fn matches(&self, data: &EntryData) -> bool {
        if data.status == EntryStatus::Removed && !self.include_removed {
            return false;
        }
        self.constraints.iter().all(|c| match data.field(&c.field) {
            Some(actual) => c.matches(&actual),
            None => true,
        })
    }
}

/// Turns a row collection and a condition into matching row indices.
pub trait EntryFilter: Send + Sync {
    /// Indices of the rows in `entries` that satisfy `condition`, in order.
    fn matching(&self, entries: &[EntryRef], condition: &Condition) -> Vec<usize>;
}

/// Default [`EntryFilter`] evaluating [`Condition`] constraints directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionFilter;

impl EntryFilter for ConditionFilter {
    fn matching(&self, entries: &[EntryRef], condition: &Condition) -> Vec<usize> {
        condition.window(
            entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.with_data(|data| condition.matches(data)))
                .map(|(i, _)| i),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, ID_FIELD};
    use std::collections::BTreeMap;

    fn rows(values: &[&str]) -> Vec<EntryRef> {
        values
            .iter()
            .map(|v| Entry::with_fields([("balance", *v)]).into_ref())
            .collect()
    }

    #[test]
    fn test_empty_condition_matches_all_active() {
        let entries = rows(&["1", "2", "3"]);
        assert_eq!(ConditionFilter.matching(&entries, &Condition::new()), vec![0, 1, 2]);
    }

    #[test]
    fn test_eq_and_ne() {
        let entries = rows(&["1", "2", "1"]);
        let eq = Condition::new().eq("balance", "1");
        assert_eq!(ConditionFilter.matching(&entries, &eq), vec![0, 2]);
        let ne = Condition::new().ne("balance", "1");
        assert_eq!(ConditionFilter.matching(&entries, &ne), vec![1]);
    }

    #[test]
    fn test_ordering_is_numeric_when_both_parse() {
        let entries = rows(&["9", "10", "100"]);
        // Lexicographically "9" > "10", numerically it is not.
        let gt = Condition::new().gt("balance", "9");
        assert_eq!(ConditionFilter.matching(&entries, &gt), vec![1, 2]);
        let le = Condition::new().le("balance", "10");
        assert_eq!(ConditionFilter.matching(&entries, &le), vec![0, 1]);
    }

    #[test]
    fn test_ordering_falls_back_to_lexicographic() {
        let entries = rows(&["apple", "banana", "cherry"]);
        let ge = Condition::new().ge("balance", "banana");
        assert_eq!(ConditionFilter.matching(&entries, &ge), vec![1, 2]);
        let lt = Condition::new().lt("balance", "banana");
        assert_eq!(ConditionFilter.matching(&entries, &lt), vec![0]);
    }

    #[test]
    fn test_missing_field_does_not_constrain() {
        let entries = rows(&["5"]);
        let cond = Condition::new().eq("owner", "alice");
        assert_eq!(ConditionFilter.matching(&entries, &cond), vec![0]);
    }

    #[test]
    fn test_removed_rows_excluded_by_default() {
        let entries = rows(&["1", "2"]);
        entries[0].set_status(EntryStatus::Removed);

        assert_eq!(ConditionFilter.matching(&entries, &Condition::new()), vec![1]);
        let audit = Condition::new().include_removed();
        assert_eq!(ConditionFilter.matching(&entries, &audit), vec![0, 1]);
    }

    #[test]
    fn test_limit_window() {
        let entries = rows(&["1", "2", "3", "4", "5"]);
        let cond = Condition::new().gt("balance", "1").limit(1, 2);
        assert_eq!(ConditionFilter.matching(&entries, &cond), vec![2, 3]);
    }

    #[test]
    fn test_without_window_keeps_constraints() {
        let cond = Condition::new().eq("balance", "1").include_removed().limit(2, 1);
        let open = cond.without_window();
        assert!(open.includes_removed());
        assert_eq!(open.constraints(), cond.constraints());
        assert_eq!(cond.window(vec!['a', 'b', 'c', 'd']), vec!['c']);
        assert_eq!(open.window(vec!['a', 'b']), vec!['a', 'b']);
    }

    #[test]
    fn test_condition_on_identity_field() {
        let entries: Vec<EntryRef> = [3u64, 4]
            .iter()
            .map(|id| Entry::committed(*id, EntryStatus::Active, BTreeMap::new()).into_ref())
            .collect();
        let cond = Condition::new().eq(ID_FIELD, "4");
        assert_eq!(ConditionFilter.matching(&entries, &cond), vec![1]);
    }
}
