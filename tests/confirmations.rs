use std::{sync::Arc, time::Duration};

use alloy::{
    dyn_abi::DynSolValue,
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxHash, U256, address, b256},
    rpc::types::TransactionRequest,
    sol_types::{SolCall, SolError},
};
use genidex_sdk::{
    DexError, WaitOptions, abi,
    abi::genidex::GeniDex,
    revert::{FailureKind, Invocation, RevertDecoder},
    testing::{MockChain, MockReceipt},
    tx::{self, TrackedTx, TxSummary},
};

const HASH: TxHash = b256!("0x5555555555555555555555555555555555555555555555555555555555555555");
const REPLACEMENT: TxHash =
    b256!("0x6666666666666666666666666666666666666666666666666666666666666666");
const EXCHANGE: Address = address!("0x00000000000000000000000000000000000000e1");
const TRADER: Address = address!("0x00000000000000000000000000000000000000aa");

fn decoder() -> RevertDecoder {
    RevertDecoder::new(Arc::new(abi::genidex_abi()))
}

fn cancel_call() -> (TransactionRequest, Invocation, Bytes) {
    let calldata: Bytes = GeniDex::cancelSellOrderCall {
        marketId: U256::from(2),
        orderIndex: U256::from(41),
    }
    .abi_encode()
    .into();
    let request = TransactionRequest::default()
        .with_from(TRADER)
        .with_to(EXCHANGE)
        .with_input(calldata.clone());
    let invocation = decoder().invocation_from_calldata(&calldata).unwrap();
    (request, invocation, calldata)
}

/// Receipt at the requested depth is returned on the very same poll.
#[tokio::test]
async fn test_confirmed_on_first_poll() {
    let chain = MockChain::new();
    chain.push_receipt(HASH, Some(MockReceipt::success(100)));
    chain.push_head(101);

    let receipt = tx::wait_for_confirms(
        &chain,
        &decoder(),
        TrackedTx::new(HASH),
        WaitOptions::default().with_confirmations(2),
    )
    .await
    .unwrap();
    assert_eq!(receipt.block_number, 100);
    assert_eq!(chain.receipt_polls(), 1);
    assert!(chain.replays().is_empty());
}

/// Pending transaction is polled until mined and buried deep enough.
#[tokio::test(start_paused = true)]
async fn test_pending_then_confirmed() {
    let chain = MockChain::new();
    chain.push_receipt(HASH, None);
    chain.push_receipt(HASH, None);
    chain.push_receipt(HASH, Some(MockReceipt::success(7)));
    chain.push_pending(HASH, Some(TxSummary::new(HASH, TRADER, 3)));
    chain.push_head(7);
    chain.push_head(8);

    let progress = Arc::new(std::sync::Mutex::new(vec![]));
    let reported = progress.clone();
    let receipt = tx::wait(
        &chain,
        &decoder(),
        HASH,
        WaitOptions::default()
            .with_confirmations(2)
            .on_progress(move |confirmed| reported.lock().unwrap().push(confirmed)),
    )
    .await
    .unwrap();

    assert_eq!(receipt, MockReceipt::success(7));
    assert_eq!(chain.receipt_polls(), 4);
    assert_eq!(*progress.lock().unwrap(), vec![1, 2]);
}

/// Reverted transaction is replayed at its block, the revert reason is decoded.
#[tokio::test]
async fn test_reverted_is_replayed_and_decoded() {
    let (request, invocation, _) = cancel_call();
    let chain = MockChain::new();
    chain.push_receipt(HASH, Some(MockReceipt::reverted(55)));
    chain.set_revert_data(
        GeniDex::NotOrderOwner {
            orderIndex: U256::from(41),
            caller: TRADER,
        }
        .abi_encode()
        .into(),
    );

    let err = tx::wait_for_confirms(
        &chain,
        &decoder(),
        TrackedTx::new(HASH).with_call(request.clone(), invocation),
        WaitOptions::default(),
    )
    .await
    .unwrap_err();

    let replays = chain.replays();
    assert_eq!(replays.len(), 1);
    assert_eq!(replays[0].0, request);
    assert_eq!(replays[0].1, Some(55));

    let DexError::Call(failure) = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(failure.kind, FailureKind::Execution);
    assert_eq!(failure.invocation.name, "cancelSellOrder");
    let revert = err.revert().unwrap();
    assert_eq!(revert.name, "NotOrderOwner");
    assert_eq!(
        revert.arg("orderIndex"),
        Some(&DynSolValue::Uint(U256::from(41), 256))
    );
    assert_eq!(
        err.to_string(),
        format!(
            "GeniDex Error:\ncancelSellOrder(marketId: 2, orderIndex: 41)\nNotOrderOwner(orderIndex: 41, caller: {TRADER})"
        )
    );
}

/// Transaction known only by its hash is fetched to be replayed and described.
#[tokio::test]
async fn test_reverted_hash_only() {
    let (_, _, calldata) = cancel_call();
    let chain = MockChain::new();
    chain.push_receipt(HASH, Some(MockReceipt::reverted(9)));
    chain.push_pending(
        HASH,
        Some(TxSummary::new(HASH, TRADER, 1).with_call(EXCHANGE, calldata.clone())),
    );
    chain.set_revert_data(GeniDex::InvalidMarketId { marketId: U256::from(2) }.abi_encode().into());

    let err = tx::wait(&chain, &decoder(), HASH, WaitOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.invocation().map(|i| i.name.as_str()), Some("cancelSellOrder"));
    assert_eq!(err.revert().map(|r| r.name.as_str()), Some("InvalidMarketId"));
    let replays = chain.replays();
    assert_eq!(replays[0].0.input.input(), Some(&calldata));
    assert_eq!(replays[0].1, Some(9));
}

/// Revert without recoverable data still fails, with the failure dumped as JSON.
#[tokio::test]
async fn test_reverted_without_data() {
    let (request, invocation, _) = cancel_call();
    let chain = MockChain::new();
    chain.push_receipt(HASH, Some(MockReceipt::reverted(9)));

    let err = tx::wait_for_confirms(
        &chain,
        &decoder(),
        TrackedTx::new(HASH).with_call(request, invocation),
        WaitOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(err.revert().is_none());
    let dump: serde_json::Value = serde_json::from_str(&err.to_string()).unwrap();
    assert_eq!(dump["kind"], "execution");
    assert_eq!(dump["invocation"]["args"]["orderIndex"], "41");
}

/// Pending transaction never mined times out.
#[tokio::test(start_paused = true)]
async fn test_timeout() {
    let chain = MockChain::new();
    chain.push_pending(HASH, Some(TxSummary::new(HASH, TRADER, 0)));

    let err = tx::wait(
        &chain,
        &decoder(),
        HASH,
        WaitOptions::default().with_timeout(Duration::from_secs(5)),
    )
    .await
    .unwrap_err();

    // Polls at 0, 1, 2.5, 4.75 and 5 seconds
    assert!(matches!(err, DexError::Timeout { hash, elapsed } if hash == HASH && elapsed >= Duration::from_secs(5)));
    assert_eq!(chain.receipt_polls(), 5);
}

/// Replaced transaction is reported as dropped, the replacement is found by nonce.
#[tokio::test(start_paused = true)]
async fn test_replaced_and_recovered() {
    let (request, invocation, calldata) = cancel_call();
    let chain = MockChain::new();
    chain.push_pending(HASH, Some(TxSummary::new(HASH, TRADER, 12)));
    chain.push_pending(HASH, None);
    chain.push_head(30);
    chain.add_block(
        29,
        vec![
            TxSummary::new(REPLACEMENT, TRADER, 12).with_call(EXCHANGE, calldata),
            TxSummary::new(HASH, Address::ZERO, 12),
        ],
    );
    chain.push_receipt(REPLACEMENT, Some(MockReceipt::success(29)));

    let err = tx::wait_for_confirms(
        &chain,
        &decoder(),
        TrackedTx::new(HASH).with_call(request, invocation),
        WaitOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(err.is_dropped());
    let DexError::Dropped(dropped) = err else {
        unreachable!()
    };
    assert_eq!(dropped.invocation.map(|i| i.name), Some("cancelSellOrder".to_string()));

    let replacement = tx::find_tx_by_nonce(&chain, dropped.from.unwrap(), dropped.nonce.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replacement.hash, REPLACEMENT);

    let receipt = tx::wait(&chain, &decoder(), replacement.hash, WaitOptions::default().with_confirmations(2))
        .await
        .unwrap();
    assert_eq!(receipt.block_number, 29);
}
