pub mod session;
pub mod sync;
pub mod types;

pub use session::WalletSession;
pub use types::*;

/// Number of decimal places for the BitcoinZ native token (BTCZ).
pub const BTCZ_TOKEN_DECIMALS: u32 = 8;
