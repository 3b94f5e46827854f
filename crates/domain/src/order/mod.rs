//! Orders, line snapshots and the status state machine.

mod model;
mod number;
mod state;

pub use model::{Order, OrderLine, total_of};
pub use number::generate_order_number;
pub use state::OrderStatus;
