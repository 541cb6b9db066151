use std::collections::HashMap;

use crate::models::{Flow, Transaction};

pub struct CategoryTotal {
    pub name: String,
    pub total: f64,
}

/// Aggregate view of one month of cached transactions: money in, money
/// out, and where the outflow went by upstream category.
pub struct MonthSummary {
    pub count: usize,
    pub inflow: f64,
    pub outflow: f64,
    pub net: f64,
    pub spend_by_category: Vec<CategoryTotal>,
}

pub fn summarize(txs: &[Transaction]) -> MonthSummary {
    let mut inflow = 0.0;
    let mut outflow = 0.0;
    let mut buckets: HashMap<String, f64> = HashMap::new();

    for tx in txs {
        match tx.flow() {
            Flow::Credit => inflow += tx.amount.abs(),
            Flow::Debit => {
                let amount = tx.amount.abs();
                outflow += amount;
                *buckets.entry(tx.category_label().to_string()).or_insert(0.0) += amount;
            }
        }
    }

    let mut spend_by_category: Vec<CategoryTotal> = buckets
        .into_iter()
        .map(|(name, total)| CategoryTotal { name, total })
        .collect();
    spend_by_category.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    MonthSummary {
        count: txs.len(),
        inflow,
        outflow,
        net: inflow - outflow,
        spend_by_category,
    }
}
