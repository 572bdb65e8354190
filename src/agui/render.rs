//! Server-side HTML fragments for AGUI cards.
//!
//! The browser swaps the fragment into the chat panel as-is, so every piece
//! of payload text goes through `escape`. Progress label and bar appear only
//! when the event carried a progress value.

use std::fmt::Write;

use super::dispatcher::RenderState;
use super::widget::{
    ErrorCard, InventoryCheck, PaymentProcessor, PaymentSuccess, QuoteApproval, QuoteFetcher, Widget,
};

/// Render a state as a card fragment.
#[must_use]
pub fn render_html(state: &RenderState) -> String {
    let mut out = String::with_capacity(256);
    let _ = write!(
        out,
        r#"<div class="agui-card agui-{}" data-phase="{}">"#,
        css_ident(&state.component),
        state.phase.as_str()
    );

    if let Some(caption) = state.caption {
        let _ = write!(out, r#"<p class="agui-caption">{}</p>"#, escape(caption));
    }

    if let Some(progress) = state.progress {
        let pct = progress.get();
        let _ = write!(
            out,
            r#"<div class="agui-progress"><span class="agui-progress-label">{pct}%</span><div class="agui-progress-track"><div class="agui-progress-bar" style="width: {pct}%"></div></div></div>"#
        );
    }

    render_widget(&mut out, &state.widget);
    out.push_str("</div>");
    out
}

fn render_widget(out: &mut String, widget: &Widget) {
    match widget {
        Widget::ThinkingLoader(w) => message(out, w.message.as_deref()),
        Widget::InventoryCheck(w) => inventory(out, w),
        Widget::QuoteFetcher(w) => quotes(out, w),
        Widget::QuoteApprovalCard(w) => approval(out, w),
        Widget::PaymentProcessor(w) => payment(out, w),
        Widget::PaymentSuccess(w) => success(out, w),
        Widget::ErrorCard(w) => error(out, w),
        Widget::Fallback(w) => {
            let _ = write!(out, r#"<p class="agui-message">{}</p>"#, escape(&w.message));
        }
    }
}

fn message(out: &mut String, message: Option<&str>) {
    if let Some(text) = message {
        let _ = write!(out, r#"<p class="agui-message">{}</p>"#, escape(text));
    }
}

fn inventory(out: &mut String, w: &InventoryCheck) {
    message(out, w.message.as_deref());
    if w.items.is_empty() {
        return;
    }
    out.push_str(r#"<ul class="agui-inventory">"#);
    for item in &w.items {
        let class = if item.in_stock() { "in-stock" } else { "short" };
        let _ = write!(
            out,
            r#"<li class="{class}">{}: {}/{}</li>"#,
            escape(&item.name),
            item.available,
            item.requested
        );
    }
    out.push_str("</ul>");
}

fn quotes(out: &mut String, w: &QuoteFetcher) {
    message(out, w.message.as_deref());
    if w.vendors.is_empty() {
        return;
    }
    let _ = write!(
        out,
        r#"<p class="agui-quote-count">Quotes received: {} of {}</p><ul class="agui-vendors">"#,
        w.received,
        w.vendors.len()
    );
    for vendor in &w.vendors {
        let _ = write!(out, "<li>{}</li>", escape(vendor));
    }
    out.push_str("</ul>");
}

fn approval(out: &mut String, w: &QuoteApproval) {
    if let Some(vendor) = &w.vendor {
        let _ = write!(out, r#"<h3 class="agui-vendor">{}</h3>"#, escape(vendor));
    }
    message(out, w.message.as_deref());
    if !w.line_items.is_empty() {
        out.push_str(r#"<table class="agui-line-items"><tbody>"#);
        for line in &w.line_items {
            let _ = write!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&line.description),
                line.quantity,
                format_amount(line.unit_price, w.currency.as_deref())
            );
        }
        out.push_str("</tbody></table>");
    }
    if let Some(total) = w.total_amount {
        let _ = write!(
            out,
            r#"<p class="agui-total">Total: {}</p>"#,
            format_amount(total, w.currency.as_deref())
        );
    }
    let quote_id = w.quote_id.as_deref().map(escape).unwrap_or_default();
    let _ = write!(
        out,
        r#"<div class="agui-actions"><button data-action="approve" data-quote-id="{quote_id}">Approve</button><button data-action="reject" data-quote-id="{quote_id}">Reject</button></div>"#
    );
}

fn payment(out: &mut String, w: &PaymentProcessor) {
    message(out, w.message.as_deref());
    if let Some(amount) = w.amount {
        let to = w
            .vendor
            .as_deref()
            .map(|v| format!(" to {}", escape(v)))
            .unwrap_or_default();
        let _ = write!(
            out,
            r#"<p class="agui-payment">Paying {}{to}</p>"#,
            format_amount(amount, w.currency.as_deref())
        );
    }
}

fn success(out: &mut String, w: &PaymentSuccess) {
    out.push_str(r#"<h3 class="agui-success">Payment complete</h3>"#);
    message(out, w.message.as_deref());
    if let Some(amount) = w.amount {
        let _ = write!(
            out,
            r#"<p class="agui-amount">{}</p>"#,
            format_amount(amount, w.currency.as_deref())
        );
    }
    if let Some(tx) = &w.transaction_id {
        let _ = write!(out, r#"<p class="agui-transaction">Transaction {}</p>"#, escape(tx));
    }
}

fn error(out: &mut String, w: &ErrorCard) {
    let text = w.message.as_deref().unwrap_or("Something went wrong.");
    let _ = write!(out, r#"<p class="agui-error">{}</p>"#, escape(text));
    if let Some(code) = &w.code {
        let _ = write!(out, r#"<code class="agui-error-code">{}</code>"#, escape(code));
    }
    if w.retryable {
        out.push_str(r#"<button data-action="retry">Try again</button>"#);
    }
}

/// Two-decimal amount with an optional currency suffix.
#[must_use]
pub fn format_amount(amount: f64, currency: Option<&str>) -> String {
    match currency {
        Some(code) => format!("{amount:.2} {}", escape(code)),
        None => format!("{amount:.2}"),
    }
}

/// Escape text for HTML element content and quoted attributes.
#[must_use]
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reduce a component name to a safe CSS class suffix.
fn css_ident(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect()
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
