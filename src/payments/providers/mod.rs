pub mod card_network;
pub mod mobile_money;

pub use card_network::CardNetworkProvider;
pub use mobile_money::MobileMoneyProvider;
