//! Domain models.
//!
//! Row types derive `sqlx::FromRow` and `Serialize` so repositories can
//! return them directly and handlers can send them as JSON. Request bodies
//! live next to the handlers that accept them.

pub mod address;
pub mod catalog;
pub mod content;
pub mod coupon;
pub mod order;
pub mod payment;
pub mod review;
pub mod session;
pub mod user;

pub use address::{Address, AddressInput};
pub use catalog::{Category, Product, ProductView};
pub use content::{Offer, ShippingSettings, Testimonial};
pub use coupon::Coupon;
pub use order::{Order, OrderDetail, OrderItem, ShippingAddress};
pub use payment::PaymentLog;
pub use review::Review;
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
