//! Agent CLI availability probing, backing `GET /agents/availability`.

use teleclaude_core::types::AgentVariant;

/// All three variants in the order they should be reported.
pub const ALL_VARIANTS: [AgentVariant; 3] = [
    AgentVariant::Claude,
    AgentVariant::Gemini,
    AgentVariant::Codex,
];

/// Whether `variant`'s binary is on `PATH`.
pub fn is_available(variant: AgentVariant) -> bool {
    which::which(variant.binary_name()).is_ok()
}

/// Availability of every known variant, in `ALL_VARIANTS` order.
pub fn availability_report() -> Vec<(AgentVariant, bool)> {
    ALL_VARIANTS
        .iter()
        .map(|&v| (v, is_available(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_covers_every_variant_once() {
        let report = availability_report();
        assert_eq!(report.len(), ALL_VARIANTS.len());
        for variant in ALL_VARIANTS {
            assert!(report.iter().any(|(v, _)| *v == variant));
        }
    }
}
