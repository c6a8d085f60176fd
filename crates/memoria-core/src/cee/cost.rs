//! Cost estimation port. Pure arithmetic, no I/O.

#[derive(Debug, Clone, Copy)]
pub struct CostEstimate {
    pub tokens: u64,
    pub cost_usd: f64,
}

pub fn estimate(tokens: u64, cost_per_1m: f64) -> CostEstimate {
    CostEstimate {
        tokens,
        cost_usd: tokens as f64 / 1_000_000.0 * cost_per_1m,
    }
}

/// `(nodesPerDay*150 + queriesPerDay*30) * 30 / 1e6 * costPer1M`.
pub fn monthly_estimate(nodes_per_day: u64, queries_per_day: u64, cost_per_1m: f64) -> f64 {
    let daily_tokens = nodes_per_day * 150 + queries_per_day * 30;
    (daily_tokens as f64 * 30.0) / 1_000_000.0 * cost_per_1m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_scales_linearly() {
        let e = estimate(1_000_000, 0.02);
        assert!((e.cost_usd - 0.02).abs() < 1e-9);
    }

    #[test]
    fn monthly_estimate_matches_formula() {
        let got = monthly_estimate(100, 50, 0.02);
        let expected = (100.0 * 150.0 + 50.0 * 30.0) * 30.0 / 1_000_000.0 * 0.02;
        assert!((got - expected).abs() < 1e-9);
    }
}
