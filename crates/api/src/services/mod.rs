//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Email/password accounts and Google sign-in
//! - `cart` - Priced carts, wishlists and guest merging
//! - `checkout` - Order placement
//! - `orders` - Order lifecycle and payment events
//! - `razorpay` - Payment gateway client and signature checks
//! - `email` - Transactional email via Resend
//! - `cloudinary` - Product image uploads
//! - `google` - Google ID token verification
//! - `cache` - Cached categories and shipping settings

pub mod auth;
pub mod cache;
pub mod cart;
pub mod checkout;
pub mod cloudinary;
pub mod email;
pub mod google;
pub mod orders;
pub mod razorpay;

pub use auth::{AuthError, AuthService};
pub use cache::CatalogCache;
pub use cart::{CartError, CartService, CartView};
pub use checkout::{CheckoutError, CheckoutService};
pub use cloudinary::{CloudinaryClient, CloudinaryError};
pub use email::{EmailError, EmailService};
pub use google::{GoogleClient, GoogleError};
pub use orders::{OrderError, OrderService};
pub use razorpay::{RazorpayClient, RazorpayError};
