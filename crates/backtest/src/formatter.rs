#![allow(clippy::format_push_string)]

use yieldsense_core::Direction;

use crate::metrics::PerformanceSummary;

const RULE: &str = "═══════════════════════════════════════════════════════════════\n";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────\n";

pub struct SummaryFormatter;

impl SummaryFormatter {
    #[must_use]
    pub fn format(summary: &PerformanceSummary) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str(RULE);
        output.push_str("                    BACKTEST RESULTS                           \n");
        output.push_str(RULE);
        output.push('\n');

        // Trades
        output.push_str("Trade Statistics\n");
        output.push_str(THIN_RULE);
        output.push_str(&format!("Closed Trades:         {}\n", summary.total_trades));
        output.push_str(&format!(
            "Winning / Losing:      {} / {}\n",
            summary.winning_trades, summary.losing_trades
        ));
        output.push_str(&format!("Open Positions:        {}\n", summary.open_positions));

        if summary.total_trades > 0 {
            output.push_str(&format!(
                "Win Rate:              {:.2}%\n",
                summary.win_rate * 100.0
            ));
            output.push_str(&format!(
                "Avg Hold:              {:.1} hours\n",
                summary.avg_hold_hours
            ));
        } else {
            output.push_str("Win Rate:              N/A (no closed trades)\n");
        }
        output.push('\n');

        // Performance
        output.push_str("Performance\n");
        output.push_str(THIN_RULE);
        output.push_str(&format!("Total P&L:             {:.4}\n", summary.total_pnl));
        output.push_str(&format!(
            "Avg Return:            {:.4}%\n",
            summary.avg_return * 100.0
        ));
        output.push_str(&format!("Sharpe Ratio:          {:.4}\n", summary.sharpe_ratio));
        output.push_str(&format!("Max Drawdown:          {:.4}\n", summary.max_drawdown));
        output.push_str(&format!("Profit Factor:         {:.4}\n", summary.profit_factor));
        if let (Some(best), Some(worst)) = (summary.best_trade, summary.worst_trade) {
            output.push_str(&format!(
                "Best / Worst Trade:    {:.4}% / {:.4}%\n",
                best * 100.0,
                worst * 100.0
            ));
        }

        if !summary.by_direction.is_empty() {
            output.push('\n');
            output.push_str("By Direction\n");
            output.push_str(THIN_RULE);
            for breakdown in &summary.by_direction {
                let name = match breakdown.direction {
                    Direction::Long => "Long",
                    Direction::Short => "Short",
                    Direction::Flat => "Flat",
                };
                output.push_str(&format!(
                    "{:<6} trades={:<5} win={:>6.2}%  avg={:>8.4}%  pnl={:.4}\n",
                    name,
                    breakdown.trades,
                    breakdown.win_rate * 100.0,
                    breakdown.avg_return * 100.0,
                    breakdown.total_pnl
                ));
            }
        }

        output.push('\n');
        output.push_str(RULE);

        if summary.total_trades == 0 {
            output.push_str("\nNo trades closed during this replay.\n");
            output.push_str("    Consider a lower signal threshold or a shorter holding period.\n\n");
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_mentions_no_trades() {
        let text = SummaryFormatter::format(&PerformanceSummary::empty(2));
        assert!(text.contains("BACKTEST RESULTS"));
        assert!(text.contains("N/A (no closed trades)"));
        assert!(text.contains("Open Positions:        2"));
        assert!(!text.contains("By Direction"));
    }

    #[test]
    fn summary_prints_percentages() {
        let mut summary = PerformanceSummary::empty(0);
        summary.total_trades = 4;
        summary.winning_trades = 3;
        summary.losing_trades = 1;
        summary.win_rate = 0.75;
        summary.best_trade = Some(0.05);
        summary.worst_trade = Some(-0.01);

        let text = SummaryFormatter::format(&summary);
        assert!(text.contains("Win Rate:              75.00%"));
        assert!(text.contains("5.0000% / -1.0000%"));
        assert!(!text.contains("No trades closed"));
    }
}
