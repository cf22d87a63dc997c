use alloy::json_abi::JsonAbi;

#[allow(clippy::too_many_arguments)]
pub mod genidex {
    alloy::sol!(
        #[derive(Debug)]
        #[sol(rpc, abi)]
        interface GeniDex {
            struct Order {
                uint256 id;
                address trader;
                uint256 price;
                uint256 quantity;
            }

            struct Market {
                uint256 id;
                string symbol;
                uint256 price;
                uint256 lastUpdatePrice;
                address baseAddress;
                address quoteAddress;
                address creator;
                bool isRewardable;
            }

            struct TokenInfo {
                address tokenAddress;
                string symbol;
                uint256 usdMarketID;
                uint256 minOrderAmount;
                uint8 decimals;
                bool isUSD;
            }

            error InvalidMarketId(uint256 marketId);
            error InvalidPrice(uint256 price);
            error InvalidQuantity(uint256 quantity);
            error OrderTooSmall(uint256 total, uint256 minOrderAmount);
            error InsufficientBalance(address token, uint256 available, uint256 required);
            error InvalidOrderIndex(uint256 orderIndex);
            error NotOrderOwner(uint256 orderIndex, address caller);
            error TokenNotListed(address token);
            error InsufficientValue(uint256 sent, uint256 required);

            event OnPlaceBuyOrder(
                uint256 indexed marketId,
                address indexed trader,
                uint256 orderIndex,
                uint256 price,
                uint256 quantity,
                uint256 remainingQuantity,
                uint256 lastPrice,
                address referrer
            );
            event OnPlaceSellOrder(
                uint256 indexed marketId,
                address indexed trader,
                uint256 orderIndex,
                uint256 price,
                uint256 quantity,
                uint256 remainingQuantity,
                uint256 lastPrice,
                address referrer
            );
            event OnCancelBuyOrder(uint256 indexed marketId, uint256 orderIndex);
            event OnCancelSellOrder(uint256 indexed marketId, uint256 orderIndex);
            event OnDeposit(address indexed user, address indexed token, uint256 amount);
            event OnWithdraw(address indexed user, address indexed token, uint256 amount);

            function placeBuyOrder(
                uint256 marketId,
                uint256 price,
                uint256 quantity,
                uint256 filledOrderId,
                uint256[] sellOrderIds,
                address referrer
            ) external payable;
            function placeSellOrder(
                uint256 marketId,
                uint256 price,
                uint256 quantity,
                uint256 filledOrderId,
                uint256[] buyOrderIds,
                address referrer
            ) external;
            function cancelBuyOrder(uint256 marketId, uint256 orderIndex) external;
            function cancelSellOrder(uint256 marketId, uint256 orderIndex) external;

            function getBuyOrders(uint256 marketId) external view returns (Order[] memory);
            function getSellOrders(uint256 marketId) external view returns (Order[] memory);
            function getMarket(uint256 marketId) external view returns (Market memory);
            function getAllMarkets() external view returns (Market[] memory);
            function getTokenInfo(address token) external view returns (TokenInfo memory);
            function balanceOf(address account, address token) external view returns (uint256);

            function depositToken(address token, uint256 normalizedAmount) external;
            function withdrawToken(address token, uint256 normalizedAmount) external;
            function depositEth() external payable;
            function withdrawEth(uint256 normalizedAmount) external;
        }
    );
}

pub mod rewarder {
    alloy::sol!(
        #[derive(Debug)]
        #[sol(rpc, abi)]
        interface GeniRewarder {
            error NothingToClaim(address user);

            event RewardClaimed(address indexed user, uint256 amount);

            function getPendingReward(address user) external view returns (uint256);
            function claimReward() external;
        }
    );
}

/// Standard ERC-20 errors (ERC-6093), bubbling up from inner token transfers.
pub mod erc20 {
    alloy::sol!(
        #[derive(Debug)]
        #[sol(abi)]
        interface IERC20Errors {
            error ERC20InsufficientBalance(address sender, uint256 balance, uint256 needed);
            error ERC20InvalidSender(address sender);
            error ERC20InvalidReceiver(address receiver);
            error ERC20InsufficientAllowance(address spender, uint256 allowance, uint256 needed);
            error ERC20InvalidApprover(address approver);
            error ERC20InvalidSpender(address spender);
        }
    );
}

/// Runtime ABI of the exchange contract.
pub fn genidex_abi() -> JsonAbi {
    genidex::GeniDex::abi::contract()
}

/// Runtime ABI of the rewarder contract.
pub fn rewarder_abi() -> JsonAbi {
    rewarder::GeniRewarder::abi::contract()
}

pub fn erc20_errors_abi() -> JsonAbi {
    erc20::IERC20Errors::abi::contract()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_abis() {
        let dex = genidex_abi();
        assert!(dex.function("placeBuyOrder").is_some());
        assert!(dex.function("getSellOrders").is_some());
        assert!(dex.error("InsufficientBalance").is_some());
        assert!(dex.event("OnPlaceSellOrder").is_some());

        let erc20 = erc20_errors_abi();
        assert_eq!(erc20.errors().count(), 6);
        assert_eq!(erc20.functions().count(), 0);

        assert!(rewarder_abi().function("claimReward").is_some());
    }
}
