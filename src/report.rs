use std::collections::BTreeMap;

use comfy_table::{Cell, Table};
use tokio::time::Instant;

use crate::error::FailureKind;
use crate::pool::Outcome;

/// Tally of outcomes for a finished batch.
#[derive(Debug, Default)]
pub struct Summary {
    pub succeeded: u64,
    pub failed: BTreeMap<FailureKind, u64>,
}

impl Summary {
    pub fn record<P>(&mut self, outcome: &Outcome<P>) {
        match outcome {
            Ok(_) => self.succeeded += 1,
            Err(err) => *self.failed.entry(err.kind()).or_default() += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.succeeded + self.failed.values().sum::<u64>()
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_header(vec!["Status", "Tasks"]);
        table.add_row(vec![Cell::new("Succeeded"), Cell::new(self.succeeded)]);
        for (kind, count) in &self.failed {
            table.add_row(vec![Cell::new(format!("{kind:?}")), Cell::new(count)]);
        }
        table.add_row(vec![Cell::new("Total"), Cell::new(self.total())]);
        table
    }
}

pub fn print_summary(summary: &Summary) {
    println!("{}", summary.table());
}

pub fn print_elapsed(now: Instant) {
    let elapsed = now.elapsed();
    println!("Elapsed time: {:?}", elapsed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use std::time::Duration;

    #[test]
    fn counts_by_kind() {
        let mut summary = Summary::default();
        summary.record::<()>(&Ok(()));
        summary.record::<()>(&Ok(()));
        summary.record::<()>(&Err(TaskError::Timeout(Duration::from_millis(50))));
        summary.record::<()>(&Err(TaskError::Cancelled));
        summary.record::<()>(&Err(TaskError::Timeout(Duration::from_secs(1))));

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed[&FailureKind::Timeout], 2);
        assert_eq!(summary.failed[&FailureKind::Cancelled], 1);
        assert_eq!(summary.total(), 5);

        let rendered = summary.table().to_string();
        assert!(rendered.contains("Succeeded"));
        assert!(rendered.contains("Timeout"));
        assert!(!rendered.contains("Transport"));
    }
}
