//! Application services.
//!
//! Each operation opens one unit of work, performs all of its reads and
//! writes through it, and finishes with a commit or a rollback. Events go
//! out only after the commit.

pub mod cart;
pub mod catalog;
pub mod orders;
pub mod users;

pub use cart::CartService;
pub use catalog::{CatalogService, ProductChanges, RegisterProduct};
pub use orders::{
    DeliveryOption, NewAddressRequest, OrderLineRequest, OrderService, OrderSummary,
    PlaceOrderRequest,
};
pub use users::UserService;
