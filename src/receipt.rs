//! Printable receipts and invoices.
//!
//! Documents are rendered to standalone HTML and handed to the platform print
//! dialog through a temporary file. Thermal receipts use a fixed-width page;
//! invoices use A4.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ReceiptConfig;
use crate::error::PosError;
use crate::money::format_money;
use crate::orders::Order;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptItem {
    pub name: String,
    pub sku: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub serials: Vec<String>,
    pub warranty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalsLine {
    pub label: String,
    pub amount: Decimal,
    pub emphasize: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptDocument {
    pub invoice_no: String,
    pub created_at: String,
    pub store_name: Option<String>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    /// No customer account is attached to the order.
    pub walk_in: bool,
    pub items: Vec<ReceiptItem>,
    pub totals: Vec<TotalsLine>,
    pub payment_method: String,
    pub payment_status: String,
    pub paid_amount: Decimal,
    pub due_amount: Decimal,
    pub change_amount: Decimal,
    pub note: Option<String>,
}

fn total_line(label: &str, amount: Decimal) -> TotalsLine {
    TotalsLine {
        label: label.to_string(),
        amount,
        emphasize: false,
    }
}

impl ReceiptDocument {
    pub fn from_order(order: &Order) -> Self {
        let f = &order.financial;
        let mut totals = vec![total_line("Subtotal", f.subtotal), total_line("Tax", f.tax)];
        // Discount rows only when they apply.
        for (label, amount) in [
            ("Discount", f.discount),
            ("Membership discount", f.membership_discount),
            ("Points redeemed", f.points_discount),
            ("Balance used", f.balance_discount),
        ] {
            if !amount.is_zero() {
                totals.push(total_line(label, -amount));
            }
        }
        totals.push(TotalsLine {
            label: "Grand total".to_string(),
            amount: f.grand_total,
            emphasize: true,
        });

        Self {
            invoice_no: order.invoice_no.clone(),
            created_at: order.created_at_display(),
            store_name: order.store_name.clone(),
            customer_name: order.customer.name.clone(),
            customer_phone: order.customer.phone.clone(),
            walk_in: order.customer.is_walk_in(),
            items: order
                .items
                .iter()
                .map(|i| ReceiptItem {
                    name: i.name.clone(),
                    sku: i.sku.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                    total: i.subtotal,
                    serials: i.serials.clone(),
                    warranty: i.warranty.clone(),
                })
                .collect(),
            totals,
            payment_method: order.payment.method.clone(),
            payment_status: order.payment.status_label().to_string(),
            paid_amount: f.paid_amount,
            due_amount: f.due_amount,
            change_amount: f.change_amount,
            note: order.note.clone(),
        }
    }
}

fn esc(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn money(cfg: &ReceiptConfig, value: Decimal) -> String {
    let sign = if value.is_sign_negative() && !value.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{}{}", esc(&cfg.currency_symbol), format_money(value.abs()))
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

const AUTO_PRINT_SCRIPT: &str =
    "<script>window.addEventListener('load', function () { window.print(); });</script>";

fn html_shell(title: &str, style: &str, body: &str, auto_print: bool) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8"/>
<title>{}</title>
<style>
{}
</style>
</head>
<body>{}{}</body>
</html>"#,
        esc(title),
        style,
        body,
        if auto_print { AUTO_PRINT_SCRIPT } else { "" }
    )
}

fn receipt_style(cfg: &ReceiptConfig) -> String {
    let width = cfg.paper_width.css_width();
    format!(
        "@page {{ size: {width} auto; margin: 0 }}
body {{ width: {width}; font-family: ui-monospace, SFMono-Regular, Menlo, monospace; font-size: 10px; margin: 0; padding: 4px; color: #000; }}
.line {{ display: flex; justify-content: space-between; gap: 4px; }}
.section {{ margin-top: 6px; border-top: 1px dashed #000; padding-top: 4px; }}
.center {{ text-align: center; }}
.strong {{ font-weight: bold; }}
.muted {{ font-size: 9px; }}"
    )
}

fn line(label: &str, value: &str) -> String {
    format!("<div class=\"line\"><span>{label}</span><span>{value}</span></div>")
}

/// Thermal receipt.
pub fn render_receipt_html(doc: &ReceiptDocument, cfg: &ReceiptConfig) -> String {
    let store_name = present(doc.store_name.as_deref()).unwrap_or(&cfg.store_name);
    let mut body = format!("<div class=\"center strong\">{}</div>", esc(store_name));
    if let Some(address) = present(cfg.store_address.as_deref()) {
        body.push_str(&format!("<div class=\"center muted\">{}</div>", esc(address)));
    }
    if let Some(phone) = present(cfg.store_phone.as_deref()) {
        body.push_str(&format!("<div class=\"center muted\">Tel: {}</div>", esc(phone)));
    }

    body.push_str("<div class=\"section\">");
    body.push_str(&line("Invoice", &esc(&doc.invoice_no)));
    body.push_str(&line("Date", &esc(&doc.created_at)));
    body.push_str(&line("Customer", &esc(&doc.customer_name)));
    if let Some(phone) = present(doc.customer_phone.as_deref()) {
        body.push_str(&line("Phone", &esc(phone)));
    }
    body.push_str("</div>");

    body.push_str("<div class=\"section\">");
    for item in &doc.items {
        body.push_str(&format!("<div class=\"strong\">{}</div>", esc(&item.name)));
        body.push_str(&line(
            &format!("{} x {}", item.quantity, money(cfg, item.unit_price)),
            &money(cfg, item.total),
        ));
        if !item.serials.is_empty() {
            body.push_str(&format!(
                "<div class=\"muted\">SN: {}</div>",
                esc(&item.serials.join(", "))
            ));
        }
        if let Some(w) = present(item.warranty.as_deref()) {
            body.push_str(&format!("<div class=\"muted\">Warranty: {}</div>", esc(w)));
        }
    }
    body.push_str("</div>");

    body.push_str("<div class=\"section\">");
    for t in &doc.totals {
        let row = line(&esc(&t.label), &money(cfg, t.amount));
        if t.emphasize {
            body.push_str(&format!("<div class=\"strong\">{row}</div>"));
        } else {
            body.push_str(&row);
        }
    }
    body.push_str("</div>");

    body.push_str("<div class=\"section\">");
    body.push_str(&line("Payment", &esc(&doc.payment_method)));
    body.push_str(&line("Status", &esc(&doc.payment_status)));
    body.push_str(&line("Paid", &money(cfg, doc.paid_amount)));
    if !doc.due_amount.is_zero() {
        body.push_str(&line("Due", &money(cfg, doc.due_amount)));
    }
    if !doc.change_amount.is_zero() {
        body.push_str(&line("Change", &money(cfg, doc.change_amount)));
    }
    body.push_str("</div>");

    if let Some(note) = present(doc.note.as_deref()) {
        body.push_str(&format!("<div class=\"section muted\">{}</div>", esc(note)));
    }
    if let Some(footer) = present(cfg.footer_text.as_deref()) {
        body.push_str(&format!("<div class=\"section center\">{}</div>", esc(footer)));
    }

    html_shell(
        &format!("Receipt {}", doc.invoice_no),
        &receipt_style(cfg),
        &body,
        cfg.auto_print,
    )
}

const INVOICE_STYLE: &str = "@page { size: A4; margin: 16mm }
body { font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; font-size: 12px; color: #111; margin: 0; }
header { display: flex; justify-content: space-between; margin-bottom: 24px; }
h1 { font-size: 22px; margin: 0 0 4px 0; }
table { width: 100%; border-collapse: collapse; }
th, td { padding: 6px 8px; border-bottom: 1px solid #ddd; text-align: left; }
td.num, th.num { text-align: right; }
.totals { width: 40%; margin-left: auto; margin-top: 16px; }
.totals .strong td { font-weight: bold; border-top: 2px solid #111; }
.muted { color: #666; font-size: 11px; }";

/// A4 invoice with the same content as the receipt.
pub fn render_invoice_html(doc: &ReceiptDocument, cfg: &ReceiptConfig) -> String {
    let store_name = present(doc.store_name.as_deref()).unwrap_or(&cfg.store_name);
    let mut body = String::from("<header><div>");
    body.push_str(&format!("<h1>{}</h1>", esc(store_name)));
    for extra in [cfg.store_address.as_deref(), cfg.store_phone.as_deref()] {
        if let Some(v) = present(extra) {
            body.push_str(&format!("<div class=\"muted\">{}</div>", esc(v)));
        }
    }
    body.push_str("</div><div>");
    body.push_str(&format!(
        "<h1>Invoice</h1><div>No: {}</div><div>Date: {}</div>",
        esc(&doc.invoice_no),
        esc(&doc.created_at)
    ));
    body.push_str("</div></header>");

    body.push_str("<section><div class=\"muted\">Bill to</div>");
    body.push_str(&format!("<div>{}</div>", esc(&doc.customer_name)));
    if !doc.walk_in {
        if let Some(phone) = present(doc.customer_phone.as_deref()) {
            body.push_str(&format!("<div class=\"muted\">{}</div>", esc(phone)));
        }
    }
    body.push_str("</section>");

    body.push_str(
        "<table><thead><tr><th>#</th><th>Item</th><th class=\"num\">Qty</th>\
         <th class=\"num\">Unit price</th><th class=\"num\">Total</th></tr></thead><tbody>",
    );
    for (i, item) in doc.items.iter().enumerate() {
        let mut detail = esc(&item.name);
        if let Some(sku) = present(item.sku.as_deref()) {
            detail.push_str(&format!("<div class=\"muted\">SKU: {}</div>", esc(sku)));
        }
        if !item.serials.is_empty() {
            detail.push_str(&format!(
                "<div class=\"muted\">SN: {}</div>",
                esc(&item.serials.join(", "))
            ));
        }
        if let Some(w) = present(item.warranty.as_deref()) {
            detail.push_str(&format!("<div class=\"muted\">Warranty: {}</div>", esc(w)));
        }
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
            i + 1,
            detail,
            item.quantity,
            money(cfg, item.unit_price),
            money(cfg, item.total)
        ));
    }
    body.push_str("</tbody></table>");

    body.push_str("<table class=\"totals\"><tbody>");
    for t in &doc.totals {
        body.push_str(&format!(
            "<tr{}><td>{}</td><td class=\"num\">{}</td></tr>",
            if t.emphasize { " class=\"strong\"" } else { "" },
            esc(&t.label),
            money(cfg, t.amount)
        ));
    }
    for (label, amount) in [
        ("Paid", Some(doc.paid_amount)),
        ("Due", Some(doc.due_amount).filter(|d| !d.is_zero())),
        ("Change", Some(doc.change_amount).filter(|c| !c.is_zero())),
    ] {
        if let Some(amount) = amount {
            body.push_str(&format!(
                "<tr><td>{label}</td><td class=\"num\">{}</td></tr>",
                money(cfg, amount)
            ));
        }
    }
    body.push_str("</tbody></table>");
    body.push_str(&format!(
        "<p class=\"muted\">Payment: {} ({})</p>",
        esc(&doc.payment_method),
        esc(&doc.payment_status)
    ));
    if let Some(note) = present(doc.note.as_deref()) {
        body.push_str(&format!("<p>{}</p>", esc(note)));
    }
    if let Some(footer) = present(cfg.footer_text.as_deref()) {
        body.push_str(&format!("<p class=\"muted\">{}</p>", esc(footer)));
    }

    html_shell(
        &format!("Invoice {}", doc.invoice_no),
        INVOICE_STYLE,
        &body,
        cfg.auto_print,
    )
}

/// Write `html` to a uniquely named file in `dir` and return its path.
pub fn write_print_file(html: &str, dir: &Path) -> Result<PathBuf, PosError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| PosError::Config(format!("Cannot create print directory: {e}")))?;
    let path = dir.join(format!("print-{}.html", Uuid::new_v4()));
    std::fs::write(&path, html)
        .map_err(|e| PosError::Config(format!("Cannot write print file: {e}")))?;
    debug!(bytes = html.len(), "Print document written");
    info!(path = %path.display(), "Print file ready");
    Ok(path)
}
