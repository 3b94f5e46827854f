use common::{UserId, WarehouseId};
use domain::{Order, OrderStatus};

/// Builder for filtering order listings.
///
/// Results are always ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Only orders created by this user.
    pub created_by: Option<UserId>,

    /// Only orders fulfilled from this warehouse.
    pub warehouse_id: Option<WarehouseId>,

    /// Only orders in this status.
    pub status: Option<OrderStatus>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,

    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for orders created by one user.
    pub fn for_creator(user_id: UserId) -> Self {
        Self {
            created_by: Some(user_id),
            ..Default::default()
        }
    }

    /// Filters by creator.
    pub fn created_by(mut self, user_id: UserId) -> Self {
        self.created_by = Some(user_id);
        self
    }

    /// Filters by warehouse.
    pub fn warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    /// Filters by status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Limits the number of orders returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many orders before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if `order` passes every filter that is set.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(user_id) = self.created_by
            && order.created_by != user_id
        {
            return false;
        }
        if let Some(warehouse_id) = self.warehouse_id
            && order.warehouse_id != warehouse_id
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status != status
        {
            return false;
        }
        true
    }
}
