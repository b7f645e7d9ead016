//! First-run demo data

use rust_decimal::Decimal;

use crate::domain::ids::{UserId, WalletId};
use crate::domain::result::Result;
use crate::ports::LedgerStore;

/// Credentials for one seeded account, for handing out at startup
#[derive(Debug, Clone)]
pub struct SeededUser {
    pub username: String,
    pub user_id: UserId,
    pub wallet_id: WalletId,
    pub token: String,
}

/// Accounts created on an empty database: (username, starting balance)
const DEMO_ACCOUNTS: [(&str, i64); 2] = [("alice", 100), ("bob", 50)];

/// Create the demo users with funded wallets and issue a token for each.
/// Does nothing if any user already exists, so restarting is safe.
pub fn seed_demo(store: &dyn LedgerStore) -> Result<Vec<SeededUser>> {
    if store.user_count()? > 0 {
        return Ok(Vec::new());
    }

    let mut seeded = Vec::with_capacity(DEMO_ACCOUNTS.len());
    for (username, balance) in DEMO_ACCOUNTS {
        let user = store.create_user(username)?;
        let wallet = store.create_wallet(user.id, Decimal::from(balance))?;
        let token = store.issue_token(user.id)?;
        seeded.push(SeededUser {
            username: user.username,
            user_id: user.id,
            wallet_id: wallet.id,
            token,
        });
    }
    Ok(seeded)
}
