//! Strategy lookup by command name

use std::collections::HashMap;

use super::AggregationStrategy;

/// Aggregation strategy per command, filled at registration time
#[derive(Debug, Clone, Default)]
pub struct StrategyTable {
    strategies: HashMap<String, AggregationStrategy>,
}

impl StrategyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, command: impl Into<String>, strategy: AggregationStrategy) {
        self.strategies.insert(command.into(), strategy);
    }

    /// Strategy for `command`; unknown commands fall back to `First`
    pub fn get(&self, command: &str) -> AggregationStrategy {
        self.strategies.get(command).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl FromIterator<(String, AggregationStrategy)> for StrategyTable {
    fn from_iter<I: IntoIterator<Item = (String, AggregationStrategy)>>(iter: I) -> Self {
        Self {
            strategies: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_defaults_to_first() {
        let mut table = StrategyTable::new();
        table.insert("search_workspace", AggregationStrategy::Merge { field: "results" });

        assert_eq!(
            table.get("search_workspace"),
            AggregationStrategy::Merge { field: "results" }
        );
        assert_eq!(table.get("get_file_tree"), AggregationStrategy::First);
        assert_eq!(table.len(), 1);
    }
}
