//! High-level client of the exchange.

use std::sync::Arc;

use alloy::{
    dyn_abi::DynSolValue,
    json_abi::JsonAbi,
    primitives::{Address, U256, ruint::UintTryFrom},
    providers::Provider,
    rpc::types::TransactionReceipt,
};
use dashmap::DashMap;
use tracing::debug;

use crate::{
    abi::{self, genidex::GeniDex as Exchange, rewarder::GeniRewarder},
    error::DexError,
    gateway::{Gateway, Overrides, Signer, SubmittedTx, WriteCall},
    network::{self, NetworkConfig},
    types::{
        DecodedLog, Market, MarketId, Order, OrderId, OrderSide, PriceBound, TokenInfo,
        find_filled_slot, select_matching_order_ids, sort_for_taker,
    },
};

/// Limit order to place.
#[derive(Clone, Debug, Default)]
pub struct PlaceOrder {
    pub market_id: MarketId,
    /// Limit price, canonical units.
    pub price: U256,
    /// Quantity of the base token, canonical units.
    pub quantity: U256,
    pub referrer: Address,
    pub overrides: Overrides,
}

impl PlaceOrder {
    pub fn new(market_id: MarketId, price: U256, quantity: U256) -> Self {
        Self {
            market_id,
            price,
            quantity,
            ..Default::default()
        }
    }

    pub fn with_referrer(mut self, referrer: Address) -> Self {
        self.referrer = referrer;
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Counter-orders a new order matches and the slot it takes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct OrderPlan {
    pub matching: Vec<OrderId>,
    pub filled_slot: OrderId,
}

impl OrderPlan {
    pub(crate) fn new(
        side: OrderSide,
        order: &PlaceOrder,
        own: &[Order],
        mut counter: Vec<Order>,
    ) -> Self {
        sort_for_taker(&mut counter, side);
        Self {
            matching: select_matching_order_ids(
                &counter,
                PriceBound::limit(side, order.price),
                order.quantity,
            ),
            filled_slot: find_filled_slot(own),
        }
    }
}

fn uint<T>(value: T) -> DynSolValue
where
    U256: UintTryFrom<T>,
{
    DynSolValue::Uint(U256::from(value), 256)
}

/// Client of the exchange deployed on a particular network.
///
/// Cheap to clone, clones share the token metadata cache and the contract
/// deployment checks.
#[derive(Clone, derive_more::Debug)]
pub struct GeniDex<P> {
    network: NetworkConfig,
    gateway: Gateway<P>,
    rewarder: Option<Rewarder<P>>,
    #[debug(skip)]
    tokens: Arc<DashMap<Address, TokenInfo>>,
}

impl<P: Provider + Clone> GeniDex<P> {
    /// Connects to the exchange of the `network`, checking that the provider is
    /// connected to the network's chain.
    pub async fn connect(provider: P, network: &NetworkConfig) -> Result<Self, DexError> {
        Self::connect_with_abi(provider, network, abi::genidex_abi()).await
    }

    /// Same as [`GeniDex::connect`] with the exchange ABI supplied at runtime,
    /// e.g. of a newer contract version.
    pub async fn connect_with_abi(
        provider: P,
        network: &NetworkConfig,
        abi: JsonAbi,
    ) -> Result<Self, DexError> {
        let address = network.contract(network::GENIDEX)?;
        let gateway = Gateway::new(provider, address, network.chain_id(), abi);
        gateway.ensure_provider_network().await?;
        debug!(network = network.name(), %address, "Connected to exchange");

        let rewarder = network
            .contract_address(network::REWARDER)
            .map(|address| Rewarder {
                gateway: Gateway::new(
                    gateway.provider().clone(),
                    address,
                    network.chain_id(),
                    abi::rewarder_abi(),
                ),
            });
        Ok(Self {
            network: network.clone(),
            gateway,
            rewarder,
            tokens: Arc::new(DashMap::new()),
        })
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn gateway(&self) -> &Gateway<P> {
        &self.gateway
    }

    /// Rewarder of the network, fails if it is not deployed there.
    pub fn rewarder(&self) -> Result<&Rewarder<P>, DexError> {
        self.rewarder
            .as_ref()
            .ok_or_else(|| DexError::MissingContract {
                network: self.network.name().to_string(),
                contract: network::REWARDER.to_string(),
            })
    }

    pub async fn buy_orders(&self, market_id: MarketId) -> Result<Vec<Order>, DexError> {
        self.orders(market_id, OrderSide::Buy).await
    }

    pub async fn sell_orders(&self, market_id: MarketId) -> Result<Vec<Order>, DexError> {
        self.orders(market_id, OrderSide::Sell).await
    }

    /// Order list of the side, filled slots included, in the contract order.
    pub async fn orders(
        &self,
        market_id: MarketId,
        side: OrderSide,
    ) -> Result<Vec<Order>, DexError> {
        let market = U256::from(market_id);
        let orders = match side {
            OrderSide::Buy => {
                self.gateway
                    .read_typed(&Exchange::getBuyOrdersCall { marketId: market })
                    .await?
            }
            OrderSide::Sell => {
                self.gateway
                    .read_typed(&Exchange::getSellOrdersCall { marketId: market })
                    .await?
            }
        };
        Ok(orders.into_iter().map(Order::from).collect())
    }

    pub async fn market(&self, market_id: MarketId) -> Result<Market, DexError> {
        let market = self
            .gateway
            .read_typed(&Exchange::getMarketCall {
                marketId: U256::from(market_id),
            })
            .await?;
        Ok(market.into())
    }

    pub async fn markets(&self) -> Result<Vec<Market>, DexError> {
        let markets = self
            .gateway
            .read_typed(&Exchange::getAllMarketsCall {})
            .await?;
        Ok(markets.into_iter().map(Market::from).collect())
    }

    /// Token metadata, fetched once per token and cached for the client lifetime.
    pub async fn token_info(&self, token: Address) -> Result<TokenInfo, DexError> {
        if let Some(info) = self.tokens.get(&token) {
            return Ok(info.clone());
        }
        let info = TokenInfo::from(
            self.gateway
                .read_typed(&Exchange::getTokenInfoCall { token })
                .await?,
        );
        self.tokens.entry(token).or_insert_with(|| info.clone());
        Ok(info)
    }

    /// Exchange balance of the account, canonical units.
    pub async fn balance(&self, account: Address, token: Address) -> Result<U256, DexError> {
        self.gateway
            .read_typed(&Exchange::balanceOfCall { account, token })
            .await
    }

    /// Places buy limit order matching the sell orders priced at or below its price.
    pub async fn place_buy_order<S: Provider>(
        &self,
        signer: &Signer<S>,
        order: PlaceOrder,
    ) -> Result<SubmittedTx<P>, DexError> {
        self.place_order(signer, OrderSide::Buy, order).await
    }

    /// Places sell limit order matching the buy orders priced at or above its price.
    pub async fn place_sell_order<S: Provider>(
        &self,
        signer: &Signer<S>,
        order: PlaceOrder,
    ) -> Result<SubmittedTx<P>, DexError> {
        self.place_order(signer, OrderSide::Sell, order).await
    }

    async fn place_order<S: Provider>(
        &self,
        signer: &Signer<S>,
        side: OrderSide,
        order: PlaceOrder,
    ) -> Result<SubmittedTx<P>, DexError> {
        let (own, counter) = futures::try_join!(
            self.orders(order.market_id, side),
            self.orders(order.market_id, side.counter()),
        )?;
        let plan = OrderPlan::new(side, &order, &own, counter);
        debug!(
            market_id = order.market_id,
            ?side,
            matching = ?plan.matching,
            filled_slot = plan.filled_slot,
            "Placing order"
        );

        let method = match side {
            OrderSide::Buy => "placeBuyOrder",
            OrderSide::Sell => "placeSellOrder",
        };
        let args = vec![
            uint(order.market_id),
            uint(order.price),
            uint(order.quantity),
            uint(plan.filled_slot),
            DynSolValue::Array(plan.matching.into_iter().map(uint).collect()),
            DynSolValue::Address(order.referrer),
        ];
        self.gateway
            .write(WriteCall::new(signer, method, args).with_overrides(order.overrides))
            .await
    }

    pub async fn cancel_buy_order<S: Provider>(
        &self,
        signer: &Signer<S>,
        market_id: MarketId,
        order_id: OrderId,
    ) -> Result<SubmittedTx<P>, DexError> {
        self.gateway
            .write(WriteCall::new(
                signer,
                "cancelBuyOrder",
                vec![uint(market_id), uint(order_id)],
            ))
            .await
    }

    pub async fn cancel_sell_order<S: Provider>(
        &self,
        signer: &Signer<S>,
        market_id: MarketId,
        order_id: OrderId,
    ) -> Result<SubmittedTx<P>, DexError> {
        self.gateway
            .write(WriteCall::new(
                signer,
                "cancelSellOrder",
                vec![uint(market_id), uint(order_id)],
            ))
            .await
    }

    /// Deposits `amount` of the token in its own decimals.
    /// The exchange must be approved to spend the amount beforehand.
    pub async fn deposit_token<S: Provider>(
        &self,
        signer: &Signer<S>,
        token: Address,
        amount: U256,
    ) -> Result<SubmittedTx<P>, DexError> {
        let normalized = self.token_info(token).await?.to_canonical(amount);
        self.gateway
            .write(WriteCall::new(
                signer,
                "depositToken",
                vec![DynSolValue::Address(token), uint(normalized)],
            ))
            .await
    }

    /// Withdraws `amount` of the token in its own decimals.
    pub async fn withdraw_token<S: Provider>(
        &self,
        signer: &Signer<S>,
        token: Address,
        amount: U256,
    ) -> Result<SubmittedTx<P>, DexError> {
        let normalized = self.token_info(token).await?.to_canonical(amount);
        self.gateway
            .write(WriteCall::new(
                signer,
                "withdrawToken",
                vec![DynSolValue::Address(token), uint(normalized)],
            ))
            .await
    }

    /// Deposits `amount` of the native currency, in wei.
    pub async fn deposit_eth<S: Provider>(
        &self,
        signer: &Signer<S>,
        amount: U256,
    ) -> Result<SubmittedTx<P>, DexError> {
        self.gateway
            .write(
                WriteCall::new(signer, "depositEth", vec![])
                    .with_overrides(Overrides::default().with_value(amount)),
            )
            .await
    }

    /// Withdraws `amount` of the native currency, in wei.
    pub async fn withdraw_eth<S: Provider>(
        &self,
        signer: &Signer<S>,
        amount: U256,
    ) -> Result<SubmittedTx<P>, DexError> {
        self.gateway
            .write(WriteCall::new(signer, "withdrawEth", vec![uint(amount)]))
            .await
    }

    /// Decodes the exchange events of the receipt.
    pub fn decode_logs(&self, receipt: &TransactionReceipt) -> Vec<DecodedLog> {
        self.gateway.decode_logs(receipt)
    }
}

/// Client of the trading rewards contract.
#[derive(Clone, derive_more::Debug)]
pub struct Rewarder<P> {
    gateway: Gateway<P>,
}

impl<P: Provider + Clone> Rewarder<P> {
    pub fn gateway(&self) -> &Gateway<P> {
        &self.gateway
    }

    /// Rewards accrued by the `user` and not claimed yet.
    pub async fn pending_reward(&self, user: Address) -> Result<U256, DexError> {
        self.gateway
            .read_typed(&GeniRewarder::getPendingRewardCall { user })
            .await
    }

    pub async fn claim<S: Provider>(&self, signer: &Signer<S>) -> Result<SubmittedTx<P>, DexError> {
        self.gateway
            .write(WriteCall::new(signer, "claimReward", vec![]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::{U64, address},
        providers::{ProviderBuilder, mock::Asserter},
        sol_types::SolValue,
    };

    use super::*;

    const EXCHANGE: Address = address!("0x00000000000000000000000000000000000000e1");
    const TOKEN: Address = address!("0x00000000000000000000000000000000000000c0");

    fn testnet(rewarder: Option<Address>) -> NetworkConfig {
        NetworkConfig::new(
            "testnet",
            1337,
            [
                (network::GENIDEX, Some(EXCHANGE)),
                (network::REWARDER, rewarder),
            ],
        )
    }

    fn order(id: OrderId, price: u64, quantity: u64) -> Order {
        Order::new(id, Address::ZERO, U256::from(price), U256::from(quantity))
    }

    async fn client(
        asserter: &Asserter,
        network: &NetworkConfig,
    ) -> Result<GeniDex<impl Provider + Clone + use<>>, DexError> {
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_mocked_client(asserter.clone());
        GeniDex::connect(provider, network).await
    }

    #[tokio::test]
    async fn test_connect_checks_chain() {
        let asserter = Asserter::new();
        asserter.push_success(&U64::from(8453));
        assert!(matches!(
            client(&asserter, &testnet(None)).await,
            Err(DexError::ChainMismatch {
                expected: 1337,
                actual: 8453
            })
        ));

        let no_exchange = NetworkConfig::new("devnet", 1, [(network::GENIDEX, None::<Address>)]);
        assert!(matches!(
            client(&asserter, &no_exchange).await,
            Err(DexError::MissingContract { .. })
        ));
    }

    #[tokio::test]
    async fn test_token_info_is_cached() {
        let asserter = Asserter::new();
        asserter.push_success(&U64::from(1337));
        let dex = client(&asserter, &testnet(None)).await.unwrap();

        let info = Exchange::TokenInfo {
            tokenAddress: TOKEN,
            symbol: "USDC".to_string(),
            usdMarketID: U256::from(1),
            minOrderAmount: U256::from(10),
            decimals: 6,
            isUSD: true,
        };
        asserter.push_success(&alloy::primitives::Bytes::from(info.abi_encode()));

        let first = dex.token_info(TOKEN).await.unwrap();
        assert_eq!(first.symbol(), "USDC");
        assert_eq!(first.decimals(), 6);
        // Served from the cache, no response is queued
        assert_eq!(dex.token_info(TOKEN).await.unwrap(), first);
        assert_eq!(dex.clone().token_info(TOKEN).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_rewarder_requires_deployment() {
        let asserter = Asserter::new();
        asserter.push_success(&U64::from(1337));
        let dex = client(&asserter, &testnet(None)).await.unwrap();
        assert!(matches!(
            dex.rewarder(),
            Err(DexError::MissingContract { contract, .. }) if contract == network::REWARDER
        ));

        let rewarder = address!("0x00000000000000000000000000000000000000e2");
        asserter.push_success(&U64::from(1337));
        let dex = client(&asserter, &testnet(Some(rewarder))).await.unwrap();
        assert_eq!(dex.rewarder().unwrap().gateway().address(), rewarder);
    }

    #[tokio::test]
    async fn test_rewarder_deployment_checked_once() {
        let asserter = Asserter::new();
        asserter.push_success(&U64::from(1337));
        let network = testnet(Some(address!("0x00000000000000000000000000000000000000e2")));
        let dex = client(&asserter, &network).await.unwrap();

        asserter.push_success(&alloy::primitives::Bytes::from_static(&[0x60, 0x80]));
        dex.rewarder().unwrap().gateway().ensure_deployed().await.unwrap();
        // Only a single eth_getCode response was queued
        dex.rewarder().unwrap().gateway().ensure_deployed().await.unwrap();
        dex.clone().rewarder().unwrap().gateway().ensure_deployed().await.unwrap();
    }

    #[test]
    fn test_uint_argument() {
        assert_eq!(uint(7u64), DynSolValue::Uint(U256::from(7), 256));
        assert_eq!(uint(U256::MAX), DynSolValue::Uint(U256::MAX, 256));
    }

    #[test]
    fn test_order_plan() {
        let own = [order(1, 90, 3), order(2, 95, 0)];
        let sells = vec![order(4, 102, 5), order(5, 100, 5), order(6, 101, 0), order(7, 101, 5)];
        let plan = OrderPlan::new(
            OrderSide::Buy,
            &PlaceOrder::new(1, U256::from(101), U256::from(8)),
            &own,
            sells,
        );
        assert_eq!(
            plan,
            OrderPlan {
                matching: vec![5, 7],
                filled_slot: 2,
            }
        );

        let buys = vec![order(1, 99, 5), order(2, 100, 5)];
        let plan = OrderPlan::new(
            OrderSide::Sell,
            &PlaceOrder::new(1, U256::from(101), U256::from(8)),
            &[],
            buys,
        );
        assert!(plan.matching.is_empty());
        assert_eq!(plan.filled_slot, crate::types::NO_FILLED_SLOT);
    }
}
