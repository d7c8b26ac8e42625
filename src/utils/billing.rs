use crate::proxy::ProviderKind;

/// EUR per million tokens for one model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

const fn price(input_per_mtok: f64, output_per_mtok: f64) -> ModelPrice {
    ModelPrice {
        input_per_mtok,
        output_per_mtok,
    }
}

/// Static price list, keyed by (provider, model). Updated by hand when
/// vendors change pricing.
const PRICING_TABLE: &[(ProviderKind, &str, ModelPrice)] = &[
    (ProviderKind::Anthropic, "claude-3-5-sonnet-20241022", price(3.0, 15.0)),
    (ProviderKind::Anthropic, "claude-3-5-haiku-20241022", price(0.8, 4.0)),
    (ProviderKind::Anthropic, "claude-3-opus-20240229", price(15.0, 75.0)),
    (ProviderKind::OpenAi, "gpt-4o", price(2.5, 10.0)),
    (ProviderKind::OpenAi, "gpt-4o-mini", price(0.15, 0.6)),
    (ProviderKind::OpenAi, "gpt-4-turbo", price(10.0, 30.0)),
];

pub fn lookup_price(provider: ProviderKind, model: &str) -> Option<ModelPrice> {
    PRICING_TABLE
        .iter()
        .find(|(p, m, _)| *p == provider && *m == model)
        .map(|(_, _, price)| *price)
}

/// Estimated cost of one call in EUR. A model missing from the table costs
/// zero rather than failing the call; spend for such models is under-reported
/// until the table is updated.
pub fn estimate_cost_eur(
    provider: ProviderKind,
    model: &str,
    input_tokens: u32,
    output_tokens: u32,
) -> f64 {
    match lookup_price(provider, model) {
        Some(price) => {
            f64::from(input_tokens) * price.input_per_mtok / 1_000_000.0
                + f64::from(output_tokens) * price.output_per_mtok / 1_000_000.0
        }
        None => 0.0,
    }
}
