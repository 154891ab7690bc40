//! Synthetic failure diagnostics
//!
//! A failed simulated bet gets a text artifact standing in for the capture a
//! real device would produce, embedding everything support would need to
//! reconstruct the slip.

use chrono::Utc;

#[derive(Debug, Clone)]
pub struct FailureContext<'a> {
    pub platform: &'a str,
    pub match_label: &'a str,
    pub market: &'a str,
    pub odds: &'a str,
    pub amount: f64,
    pub account_name: &'a str,
    pub error: &'a str,
}

pub fn render_failure_artifact(ctx: &FailureContext<'_>) -> String {
    format!(
        "=== BET SLIP CAPTURE ===\n\
         platform: {}\n\
         match:    {}\n\
         market:   {}\n\
         odds:     {}\n\
         stake:    {:.2}\n\
         account:  {}\n\
         status:   REJECTED - {}\n\
         captured: {}\n\
         ========================",
        ctx.platform,
        ctx.match_label,
        ctx.market,
        ctx.odds,
        ctx.amount,
        ctx.account_name,
        ctx.error,
        Utc::now().to_rfc3339(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_embeds_all_fields() {
        let artifact = render_failure_artifact(&FailureContext {
            platform: "betkings",
            match_label: "Riverton FC vs Harbor City",
            market: "Moneyline",
            odds: "+150",
            amount: 125.5,
            account_name: "Marcus R.",
            error: "Connection timeout",
        });

        assert!(artifact.contains("betkings"));
        assert!(artifact.contains("Riverton FC vs Harbor City"));
        assert!(artifact.contains("Moneyline"));
        assert!(artifact.contains("+150"));
        assert!(artifact.contains("125.50"));
        assert!(artifact.contains("Marcus R."));
        assert!(artifact.contains("REJECTED - Connection timeout"));
    }
}
