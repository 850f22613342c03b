//! Per-1k-token pricing table keyed by model name (§6 "LLM gateway external contract").

/// `(inputPer1k, outputPer1k)` in dollars. Unknown models fall back to the last entry.
const TABLE: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.00015, 0.0006),
    ("gpt-3.5-turbo", 0.0015, 0.002),
];

const FALLBACK: (f64, f64) = (0.001, 0.002);

fn rates_for(model: &str) -> (f64, f64) {
    TABLE
        .iter()
        .find(|(name, _, _)| *name == model)
        .map(|(_, input, output)| (*input, *output))
        .unwrap_or(FALLBACK)
}

/// Linear cost as a function of estimated input/output tokens (§4.3, §6).
pub fn estimate_cost(model: &str, tokens_in: u32, tokens_out: u32) -> f64 {
    let (input_rate, output_rate) = rates_for(model);
    (tokens_in as f64 / 1000.0) * input_rate + (tokens_out as f64 / 1000.0) * output_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_uses_its_own_rate() {
        let cost = estimate_cost("gpt-4o-mini", 1000, 1000);
        assert!((cost - (0.00015 + 0.0006)).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_uses_fallback_rate() {
        let cost = estimate_cost("some-future-model", 1000, 1000);
        assert!((cost - (0.001 + 0.002)).abs() < 1e-9);
    }
}
