//! Order history: listing, lookup, creation and shape normalization.

pub mod filter;
pub mod normalize;
pub mod service;

pub use filter::OrderFilter;
pub use normalize::{
    normalize_order, Order, OrderCustomer, OrderFinancials, OrderLine, OrderPayment, OrderShape,
    PLACEHOLDER, WALK_IN_CUSTOMER,
};
pub use service::{parse_order_page, OrdersApi};
