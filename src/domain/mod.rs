//! Domain entities and their business rules.

pub mod address;
pub mod cart;
pub mod category;
pub mod events;
pub mod order;
pub mod product;
pub mod user;

pub use address::{Address, AddressError};
pub use cart::{Cart, CartError, CartItem};
pub use category::{Category, CategoryError};
pub use order::{Order, OrderError, OrderItem, OrderStatus, Payment, PaymentMethod, PaymentStatus, ShippingAddress};
pub use product::{Product, ProductError, ProductStatus};
pub use user::{Role, User, UserError};
