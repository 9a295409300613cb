pub mod aggregator;
pub mod notifier;
pub mod supervisor;
pub mod wallet_alerts;
