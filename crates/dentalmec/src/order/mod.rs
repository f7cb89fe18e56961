//! Orders: statuses, references, estimated dates and the lifecycle.

pub mod lifecycle;
pub mod reference;
pub mod schedule;
pub mod service;
pub mod status;

pub use lifecycle::{CommentRecord, LifecycleManager, TransitionRecord};
pub use service::{CreatedOrder, OrderDetails, OrderPage, OrderService, OrderView};
pub use status::{OrderStatus, ProcessType};
