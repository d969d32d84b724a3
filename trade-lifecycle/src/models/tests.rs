use super::*;
use crate::error::LifecycleError;

#[test]
fn test_state_machine_allows_only_single_steps() {
    use TradeState::*;

    assert!(PreOpen.can_transition_to(Opening));
    assert!(Opening.can_transition_to(Open));
    assert!(Opening.can_transition_to(Error));
    assert!(Open.can_transition_to(Closing));
    assert!(Closing.can_transition_to(Closed));
    assert!(Closing.can_transition_to(Error));

    // No skipping, no going back, nothing out of a terminal state.
    assert!(!PreOpen.can_transition_to(Open));
    assert!(!Open.can_transition_to(Closed));
    assert!(!Open.can_transition_to(Opening));
    assert!(!PreOpen.can_transition_to(Error));
    assert!(!Open.can_transition_to(Error));
    for next in [PreOpen, Opening, Open, Closing, Closed, Error] {
        assert!(!Closed.can_transition_to(next), "CLOSED -> {}", next);
        assert!(!Error.can_transition_to(next), "ERROR -> {}", next);
    }
}

#[test]
fn test_trade_rejects_zero_and_non_finite_amounts() {
    for amount in [0.0, -0.0, f64::NAN, f64::INFINITY] {
        match Trade::new("BTCUSD", amount) {
            Err(LifecycleError::InvalidTrade(_)) => {}
            other => panic!("expected InvalidTrade for {}, got {:?}", amount, other),
        }
    }
    assert!(matches!(
        Trade::new("  ", 1.0),
        Err(LifecycleError::InvalidTrade(_))
    ));
}

#[test]
fn test_new_trade_is_pre_open_and_unsaved() {
    let trade = Trade::new("BTCUSD", -0.5).unwrap();
    assert_eq!(trade.state(), TradeState::PreOpen);
    assert_eq!(trade.id(), None);
    assert_eq!(trade.direction(), Side::Sell);
    assert!(trade.open_orders().is_empty());
    assert!(trade.close_orders().is_empty());
}

#[test]
fn test_invalid_transition_leaves_trade_untouched() {
    let mut trade = Trade::new("BTCUSD", 0.5).unwrap();
    let before = trade.clone();

    let err = trade.transition(TradeState::Closing).unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidStateTransition {
            from: TradeState::PreOpen,
            to: TradeState::Closing
        }
    ));
    assert_eq!(trade, before);
}

#[test]
fn test_trade_state_serializes_screaming_snake_case() {
    let json = serde_json::to_string(&TradeState::PreOpen).unwrap();
    assert_eq!(json, "\"PRE_OPEN\"");
    let state: TradeState = serde_json::from_str("\"CLOSING\"").unwrap();
    assert_eq!(state, TradeState::Closing);
}

#[test]
fn test_order_type_wire_names() {
    assert_eq!(OrderType::ExchangeMarket.to_string(), "EXCHANGE MARKET");
    assert_eq!(
        "EXCHANGE TRAILING STOP".parse::<OrderType>(),
        Ok(OrderType::ExchangeTrailingStop)
    );
    assert!("SOMETHING".parse::<OrderType>().is_err());

    let json = serde_json::to_string(&OrderType::StopLimit).unwrap();
    assert_eq!(json, "\"STOP LIMIT\"");
}

#[test]
fn test_client_ids_strictly_increase() {
    let ids: Vec<i64> = (0..1000).map(|_| next_client_id()).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_market_order_keeps_signed_amount() {
    let buy = Order::market("ETHUSD", 2.0, OrderType::ExchangeMarket);
    let sell = Order::market("ETHUSD", -2.0, OrderType::ExchangeMarket);
    assert_eq!(buy.amount(), 2.0);
    assert_eq!(sell.amount(), -2.0);
    assert_eq!(Side::from_amount(sell.amount()), Side::Sell);
    assert_eq!(buy.order_type(), OrderType::ExchangeMarket);
    assert_ne!(buy.client_id(), sell.client_id());
}

#[test]
fn test_exchange_order_state_from_status() {
    assert_eq!(
        ExchangeOrderState::parse("EXECUTED @ 107.6(-0.2)"),
        ExchangeOrderState::Executed
    );
    assert_eq!(
        ExchangeOrderState::parse("PARTIALLY FILLED @ 107.6(-0.1)"),
        ExchangeOrderState::PartiallyFilled
    );
    assert_eq!(ExchangeOrderState::parse("ACTIVE"), ExchangeOrderState::Active);
    assert_eq!(
        ExchangeOrderState::parse("CANCELED"),
        ExchangeOrderState::Canceled
    );
    assert_eq!(ExchangeOrderState::parse("???"), ExchangeOrderState::Unknown);
    assert!(ExchangeOrderState::Executed.is_final());
    assert!(!ExchangeOrderState::Active.is_final());
}
