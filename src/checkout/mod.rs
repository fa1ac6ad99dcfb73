//! POS checkout: cart, payment draft, totals and order submission.

pub mod calculator;
pub mod cart;
pub mod draft;
pub mod order_request;

pub use calculator::{compute_totals, line_tax, settle, CheckoutTotals, LineBreakdown, Settlement};
pub use cart::{Cart, CartLine, PriceMode};
pub use draft::{CustomerSelection, PaymentDraft, PaymentStatus};
pub use order_request::{prepare_order, CreateOrderRequest, OrderItemRequest, PreparedOrder};
