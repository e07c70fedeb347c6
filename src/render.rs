use std::fmt::Write;

use crate::models::domain::Status;
use crate::models::dto::DashboardView;

const BAR_WIDTH: u64 = 40;

/// Plain-text chart and table for the terminal.
pub fn render(view: &DashboardView) -> String {
    let mut out = String::new();
    render_chart(view, &mut out);
    out.push('\n');
    render_table(view, &mut out);
    out
}

fn render_chart(view: &DashboardView, out: &mut String) {
    let _ = writeln!(out, "{}", view.chart.label);
    if view.chart.data.is_empty() {
        let _ = writeln!(out, "  (waiting for data)");
        return;
    }

    let peak = view.chart.data.iter().copied().max().unwrap_or(0).max(1);
    let label_width = view.chart.labels.iter().map(|l| l.len()).max().unwrap_or(0);
    for (label, total) in view.chart.labels.iter().zip(&view.chart.data) {
        let bar = (total.saturating_mul(BAR_WIDTH) / peak) as usize;
        let _ = writeln!(out, "  {:>width$} | {} {}", label, "#".repeat(bar), total, width = label_width);
    }
}

fn render_table(view: &DashboardView, out: &mut String) {
    let _ = writeln!(out, "Current Suspicious Domains");
    if let Some(message) = &view.empty_message {
        let _ = writeln!(out, "  {}", message);
        return;
    }

    let domain_width = view
        .rows
        .iter()
        .map(|r| r.domain.len())
        .max()
        .unwrap_or(0)
        .max("Domain".len());
    let _ = writeln!(out, "  {:<w$}  {:>11}  Status", "Domain", "Query Count", w = domain_width);
    for row in &view.rows {
        let marker = match row.status {
            Status::Suspicious => "!",
            Status::Normal => " ",
        };
        let _ = writeln!(
            out,
            "  {:<w$}  {:>11}  {}{}",
            row.domain,
            row.count,
            row.status,
            marker,
            w = domain_width
        );
    }
}
