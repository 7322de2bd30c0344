// Query filtering over indexed fields

use crate::document::IndexValue;

/// Filter for querying documents
#[derive(Debug, Clone)]
pub struct Filter {
    /// Field name to filter on
    pub field: String,
    /// Comparison operator
    pub op: FilterOp,
    /// Value to compare against
    pub value: IndexValue,
}

impl Filter {
    pub fn new(field: &str, op: FilterOp, value: impl Into<IndexValue>) -> Self {
        Self {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &str, value: impl Into<IndexValue>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn gt(field: &str, value: impl Into<IndexValue>) -> Self {
        Self::new(field, FilterOp::Gt, value)
    }

    pub fn gte(field: &str, value: impl Into<IndexValue>) -> Self {
        Self::new(field, FilterOp::Gte, value)
    }

    pub fn lt(field: &str, value: impl Into<IndexValue>) -> Self {
        Self::new(field, FilterOp::Lt, value)
    }
}

/// Comparison operators for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,       // ==
    Ne,       // !=
    Gt,       // >
    Lt,       // <
    Gte,      // >=
    Lte,      // <=
    Contains, // substring, case-sensitive
}

impl FilterOp {
    /// SQL comparison operator; None for `Contains`, which is a substring test
    pub(crate) fn to_sql(self) -> Option<&'static str> {
        match self {
            FilterOp::Eq => Some("="),
            FilterOp::Ne => Some("!="),
            FilterOp::Gt => Some(">"),
            FilterOp::Lt => Some("<"),
            FilterOp::Gte => Some(">="),
            FilterOp::Lte => Some("<="),
            FilterOp::Contains => None,
        }
    }
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_sql().unwrap_or("contains"))
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_creation() {
        let filter = Filter::gt("caffeine_mg", 0.0);

        assert_eq!(filter.field, "caffeine_mg");
        assert_eq!(filter.op, FilterOp::Gt);
        assert_eq!(filter.value, IndexValue::Float(0.0));
    }

    #[test]
    fn test_range_filters() {
        let filters = [Filter::gte("caffeine_mg", 30.0), Filter::lt("caffeine_mg", 60.0)];
        let ops: Vec<Option<&str>> = filters.iter().map(|f| f.op.to_sql()).collect();
        assert_eq!(ops, [Some(">="), Some("<")]);
        assert_eq!(FilterOp::Contains.to_sql(), None);
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(Filter::eq("color", 2_i64).to_string(), "color = 2");
        assert_eq!(
            Filter::new("name", FilterOp::Contains, "Grey").to_string(),
            "name contains Grey"
        );
    }
}
