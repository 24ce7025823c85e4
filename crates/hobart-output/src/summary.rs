//! Text tables for backtest results and portfolios.

use crate::attribution::AttributionResult;
use hobart_backtest::{BacktestReport, PerformanceSummary};
use hobart_optimizer::Portfolio;

/// Renders a value as terminal and Markdown tables.
pub trait TextTable {
    /// Format as ASCII table for terminal display.
    fn to_ascii_table(&self) -> String;

    /// Format as Markdown table for documentation.
    fn to_markdown(&self) -> String;
}

fn performance_lines(summary: &PerformanceSummary) -> Vec<(&'static str, String)> {
    let mut lines = vec![
        ("Initial Capital", format!("{:.2}", summary.initial_capital)),
        ("Final Value", format!("{:.2}", summary.final_value)),
        ("Total Return", format!("{:.2}%", summary.total_return * 100.0)),
        (
            "Annualized Return",
            format!("{:.2}%", summary.annualized_return * 100.0),
        ),
        (
            "Annualized Volatility",
            format!("{:.2}%", summary.annualized_volatility * 100.0),
        ),
        ("Sharpe Ratio", format!("{:.3}", summary.sharpe_ratio)),
        ("Max Drawdown", format!("{:.2}%", summary.max_drawdown * 100.0)),
        ("Transaction Costs", format!("{:.2}", summary.total_costs)),
        ("Average Turnover", format!("{:.2}", summary.average_turnover)),
        ("Rebalances", summary.rebalances.to_string()),
        ("Failed Rebalances", summary.rebalance_errors.to_string()),
        ("Trading Days", summary.trading_days.to_string()),
    ];
    if let Some(benchmark) = &summary.benchmark {
        let percent = |v: Option<f64>| format!("{:.2}%", v.unwrap_or(0.0) * 100.0);
        let ratio = |v: Option<f64>| format!("{:.3}", v.unwrap_or(0.0));
        lines.extend([
            ("Benchmark", benchmark.clone()),
            ("Benchmark Return", percent(summary.benchmark_return)),
            ("Benchmark Volatility", percent(summary.benchmark_volatility)),
            ("Benchmark Sharpe", ratio(summary.benchmark_sharpe)),
            ("Tracking Error", percent(summary.tracking_error)),
            ("Information Ratio", ratio(summary.information_ratio)),
        ]);
    }
    lines
}

impl TextTable for PerformanceSummary {
    fn to_ascii_table(&self) -> String {
        let mut output = String::new();
        output.push_str("\nBacktest Performance\n");
        output.push_str(&"=".repeat(50));
        output.push('\n');
        for (label, value) in performance_lines(self) {
            output.push_str(&format!("  {label:<26}{value:>22}\n"));
        }
        output.push_str(&"=".repeat(50));
        output.push('\n');
        output
    }

    fn to_markdown(&self) -> String {
        let mut output = String::from("# Backtest Performance\n\n| Metric | Value |\n|--------|-------|\n");
        for (label, value) in performance_lines(self) {
            output.push_str(&format!("| {label} | {value} |\n"));
        }
        output
    }
}

impl TextTable for BacktestReport {
    fn to_ascii_table(&self) -> String {
        let mut output = self.summary.to_ascii_table();
        output.push_str(&format!("Outcome: {}\n", self.outcome));
        for error in self.rebalance_errors() {
            output.push_str(&format!("  {error}\n"));
        }
        output
    }

    fn to_markdown(&self) -> String {
        let mut output = self.summary.to_markdown();
        output.push_str(&format!("\n**Outcome:** {}\n", self.outcome));
        let errors: Vec<_> = self.rebalance_errors().collect();
        if !errors.is_empty() {
            output.push_str("\n## Failed Rebalances\n\n");
            for error in errors {
                output.push_str(&format!("- {}: {}\n", error.date, error.message));
            }
        }
        output
    }
}

impl TextTable for Portfolio {
    fn to_ascii_table(&self) -> String {
        let stats = &self.stats;
        let mut output = String::new();

        output.push_str("\nPortfolio\n");
        output.push_str(&"=".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "{:<10} {:>16} {:>10} {:>12} {:>12} {:>12}\n",
            "Symbol", "Position", "Weight", "Alpha", "Beta", "Idio Vol"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');
        for h in &self.holdings {
            output.push_str(&format!(
                "{:<10} {:>16.2} {:>9.2}% {:>12.4} {:>12.4} {:>11.2}%\n",
                h.symbol,
                h.position,
                h.weight * 100.0,
                h.alpha,
                h.beta,
                h.idio_vol * 100.0
            ));
        }
        output.push_str(&"-".repeat(80));
        output.push('\n');

        output.push_str(&format!("  GMV:                      {:.2}\n", stats.gmv));
        output.push_str(&format!(
            "  Expected Return:          {:.4}%\n",
            stats.expected_return * 100.0
        ));
        output.push_str(&format!(
            "  Total Volatility:         {:.4}%\n",
            stats.total_volatility * 100.0
        ));
        output.push_str(&format!(
            "  Factor Volatility:        {:.4}%\n",
            stats.factor_volatility * 100.0
        ));
        output.push_str(&format!(
            "  Idiosyncratic Volatility: {:.4}% ({:.1}% of variance)\n",
            stats.idio_volatility * 100.0,
            stats.pct_idio_variance * 100.0
        ));

        if !stats.net_exposures.is_empty() {
            output.push_str("\nNet Factor Exposures:\n");
            output.push_str(&"-".repeat(80));
            output.push('\n');
            for exposure in &stats.net_exposures {
                output.push_str(&format!(
                    "  {:<20} {:>16.2} {:>11.2}% of GMV\n",
                    exposure.factor,
                    exposure.net,
                    exposure.pct_gmv * 100.0
                ));
            }
        }
        output.push_str(&"=".repeat(80));
        output.push('\n');
        output
    }

    fn to_markdown(&self) -> String {
        let stats = &self.stats;
        let mut output = String::from("# Portfolio\n\n");
        output.push_str("| Symbol | Position | Weight | Alpha | Beta | Idio Vol |\n");
        output.push_str("|--------|----------|--------|-------|------|----------|\n");
        for h in &self.holdings {
            output.push_str(&format!(
                "| {} | {:.2} | {:.2}% | {:.4} | {:.4} | {:.2}% |\n",
                h.symbol,
                h.position,
                h.weight * 100.0,
                h.alpha,
                h.beta,
                h.idio_vol * 100.0
            ));
        }

        output.push_str("\n## Risk\n\n");
        output.push_str(&format!("- **GMV:** {:.2}\n", stats.gmv));
        output.push_str(&format!(
            "- **Expected Return:** {:.4}%\n",
            stats.expected_return * 100.0
        ));
        output.push_str(&format!(
            "- **Total Volatility:** {:.4}%\n",
            stats.total_volatility * 100.0
        ));
        output.push_str(&format!(
            "- **Idiosyncratic Variance Share:** {:.1}%\n",
            stats.pct_idio_variance * 100.0
        ));

        if !stats.net_exposures.is_empty() {
            output.push_str("\n| Factor | Net | % of GMV |\n|--------|-----|----------|\n");
            for exposure in &stats.net_exposures {
                output.push_str(&format!(
                    "| {} | {:.2} | {:.2}% |\n",
                    exposure.factor,
                    exposure.net,
                    exposure.pct_gmv * 100.0
                ));
            }
        }
        output
    }
}

impl TextTable for AttributionResult {
    fn to_ascii_table(&self) -> String {
        Self::to_ascii_table(self)
    }

    fn to_markdown(&self) -> String {
        Self::to_markdown(self)
    }
}
