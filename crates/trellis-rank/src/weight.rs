use trellis_core::EdgeContext;

/// Propagation weight of a persisted edge: attribute base plus price
/// tier, scaled up for well-connected endpoints. Always positive for an
/// edge that met a similarity threshold.
pub fn synthesize_weight(ctx: &EdgeContext) -> f64 {
    let mut base = 0.0;
    if ctx.same_gender {
        base += 0.4;
    }
    if ctx.same_color {
        base += 0.3;
    }
    if ctx.same_brand {
        base += 0.3;
    }
    if ctx.price_diff < 200.0 {
        base += 0.2;
    } else if ctx.price_diff < 500.0 {
        base += 0.1;
    }

    let connectivity = f64::from(ctx.source_out_degree + ctx.target_in_degree) / 10.0;
    base * (1.0 + connectivity)
}
