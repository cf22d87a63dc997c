use std::cmp::Reverse;

use alloy::primitives::{Address, U256};
use rand::{Rng, seq::IndexedRandom};

use super::OrderId;
use crate::abi::genidex::GeniDex;

/// Returned by [`find_filled_slot`] when there is no slot to reuse,
/// makes the exchange append a new slot.
pub const NO_FILLED_SLOT: OrderId = 0;

/// Side of the order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side of the orders this side matches against.
    pub fn counter(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// Resting order, amounts are in canonical 18-decimal units.
///
/// Order with zero quantity is filled, its slot can be reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Order {
    id: OrderId,
    trader: Address,
    price: U256,
    quantity: U256,
}

impl Order {
    pub fn new(id: OrderId, trader: Address, price: U256, quantity: U256) -> Self {
        Self {
            id,
            trader,
            price,
            quantity,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn trader(&self) -> Address {
        self.trader
    }

    pub fn price(&self) -> U256 {
        self.price
    }

    pub fn quantity(&self) -> U256 {
        self.quantity
    }

    pub fn is_filled(&self) -> bool {
        self.quantity.is_zero()
    }
}

impl From<GeniDex::Order> for Order {
    fn from(order: GeniDex::Order) -> Self {
        Self::new(
            order.id.saturating_to(),
            order.trader,
            order.price,
            order.quantity,
        )
    }
}

/// Limit on the price of counter-orders a new order can match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PriceBound {
    #[default]
    Any,
    /// Buying, counter-orders priced above are not matched.
    AtMost(U256),
    /// Selling, counter-orders priced below are not matched.
    AtLeast(U256),
}

impl PriceBound {
    /// Bound of the limit order placed on `side` at `price`.
    pub fn limit(side: OrderSide, price: U256) -> Self {
        match side {
            OrderSide::Buy => PriceBound::AtMost(price),
            OrderSide::Sell => PriceBound::AtLeast(price),
        }
    }

    pub fn admits(&self, price: U256) -> bool {
        match self {
            PriceBound::Any => true,
            PriceBound::AtMost(limit) => price <= *limit,
            PriceBound::AtLeast(limit) => price >= *limit,
        }
    }
}

/// Sorts counter-orders the best first for the taker on `taker` side:
/// sell orders cheapest first, buy orders highest first.
///
/// Sorting is stable, orders at the same price keep their order.
pub fn sort_for_taker(orders: &mut [Order], taker: OrderSide) {
    match taker {
        OrderSide::Buy => orders.sort_by_key(|o| o.price),
        OrderSide::Sell => orders.sort_by_key(|o| Reverse(o.price)),
    }
}

/// Selects IDs of the counter-orders to match, in the given order.
///
/// `orders` must be sorted best first for the taker, see [`sort_for_taker`].
/// Filled orders are skipped, the selection stops at the first order crossing
/// the `bound` or as soon as the selected quantity covers `desired`. The last
/// selected order may overshoot the desired quantity, the exchange fills it
/// partially.
///
/// Empty selection is valid, the order then rests in the book unmatched.
pub fn select_matching_order_ids(
    orders: &[Order],
    bound: PriceBound,
    desired: U256,
) -> Vec<OrderId> {
    let mut selected = Vec::new();
    if desired.is_zero() {
        return selected;
    }
    let mut accumulated = U256::ZERO;
    for order in orders.iter().filter(|o| !o.is_filled()) {
        if !bound.admits(order.price) {
            break;
        }
        selected.push(order.id);
        accumulated = accumulated.saturating_add(order.quantity);
        if accumulated >= desired {
            break;
        }
    }
    selected
}

/// Picks a random filled slot for the new order to reuse,
/// [`NO_FILLED_SLOT`] if there is none.
pub fn find_filled_slot(orders: &[Order]) -> OrderId {
    find_filled_slot_with(orders, &mut rand::rng())
}

pub fn find_filled_slot_with<R: Rng + ?Sized>(orders: &[Order], rng: &mut R) -> OrderId {
    orders
        .iter()
        .filter(|o| o.is_filled())
        .collect::<Vec<_>>()
        .choose(rng)
        .map_or(NO_FILLED_SLOT, |o| o.id)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn order(id: OrderId, price: u64, quantity: u64) -> Order {
        Order::new(id, Address::ZERO, U256::from(price), U256::from(quantity))
    }

    fn q(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_select_minimal_prefix() {
        let sells = [order(1, 100, 5), order(2, 101, 5), order(3, 102, 5)];
        assert_eq!(select_matching_order_ids(&sells, PriceBound::Any, q(3)), vec![1]);
        assert_eq!(select_matching_order_ids(&sells, PriceBound::Any, q(5)), vec![1]);
        assert_eq!(select_matching_order_ids(&sells, PriceBound::Any, q(6)), vec![1, 2]);
        // Insufficient liquidity takes everything
        assert_eq!(
            select_matching_order_ids(&sells, PriceBound::Any, q(100)),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_select_skips_filled() {
        let sells = [order(1, 100, 0), order(2, 101, 5), order(3, 102, 0), order(4, 103, 5)];
        assert_eq!(
            select_matching_order_ids(&sells, PriceBound::Any, q(8)),
            vec![2, 4]
        );
    }

    #[test]
    fn test_select_stops_at_price_bound() {
        let sells = [order(1, 100, 5), order(2, 101, 5), order(3, 102, 5)];
        assert_eq!(
            select_matching_order_ids(&sells, PriceBound::AtMost(q(101)), q(100)),
            vec![1, 2]
        );
        assert!(select_matching_order_ids(&sells, PriceBound::AtMost(q(99)), q(1)).is_empty());

        let buys = [order(7, 102, 5), order(8, 101, 5), order(9, 100, 5)];
        assert_eq!(
            select_matching_order_ids(&buys, PriceBound::limit(OrderSide::Sell, q(101)), q(100)),
            vec![7, 8]
        );
    }

    #[test]
    fn test_select_nothing_desired() {
        let sells = [order(1, 100, 5)];
        assert!(select_matching_order_ids(&sells, PriceBound::Any, U256::ZERO).is_empty());
        assert!(select_matching_order_ids(&[], PriceBound::Any, q(1)).is_empty());
    }

    #[test]
    fn test_sort_for_taker() {
        let mut orders = [order(1, 101, 1), order(2, 100, 1), order(3, 101, 2), order(4, 99, 1)];
        sort_for_taker(&mut orders, OrderSide::Buy);
        assert_eq!(orders.map(|o| o.id()), [4, 2, 1, 3]);

        sort_for_taker(&mut orders, OrderSide::Sell);
        assert_eq!(orders.map(|o| o.id()), [1, 3, 2, 4]);
    }

    #[test]
    fn test_find_filled_slot() {
        let mut rng = StdRng::seed_from_u64(7);

        let none = [order(1, 100, 5), order(2, 100, 1)];
        assert_eq!(find_filled_slot_with(&none, &mut rng), NO_FILLED_SLOT);
        assert_eq!(find_filled_slot(&[]), NO_FILLED_SLOT);

        let one = [order(1, 100, 5), order(2, 0, 0), order(3, 100, 1)];
        for _ in 0..20 {
            assert_eq!(find_filled_slot_with(&one, &mut rng), 2);
        }

        let many = [order(1, 0, 0), order(2, 100, 1), order(3, 0, 0), order(4, 0, 0)];
        for _ in 0..50 {
            assert!([1, 3, 4].contains(&find_filled_slot(&many)));
        }
    }

    #[test]
    fn test_from_contract_order() {
        let order = Order::from(GeniDex::Order {
            id: U256::from(12),
            trader: Address::ZERO,
            price: U256::from(5),
            quantity: U256::ZERO,
        });
        assert_eq!(order.id(), 12);
        assert!(order.is_filled());
        assert_eq!(OrderSide::Buy.counter(), OrderSide::Sell);
    }
}
