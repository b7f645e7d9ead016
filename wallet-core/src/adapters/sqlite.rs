//! SQLite implementation of the storage port
//!
//! One embedded database file, one connection behind a mutex. All balance
//! writes go through [`SqliteStore::commit`], which wraps the version-guarded
//! updates and the ledger append in a single `BEGIN IMMEDIATE` transaction,
//! so a failure at any point rolls the whole mutation back.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;

use crate::domain::ids::{UserId, WalletId};
use crate::domain::result::{Error, Result};
use crate::domain::{NewTransaction, Transaction, TransactionKind, User, Wallet};
use crate::ports::{LedgerStore, WalletWrite};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    creation_date TEXT NOT NULL,
    update_date   TEXT NOT NULL,
    deletion_date TEXT
);

CREATE TABLE IF NOT EXISTS wallets (
    id            TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL REFERENCES users(id),
    balance       TEXT NOT NULL,
    version       INTEGER NOT NULL,
    creation_date TEXT NOT NULL,
    update_date   TEXT NOT NULL,
    deletion_date TEXT
);

CREATE INDEX IF NOT EXISTS idx_wallets_user ON wallets(user_id);

CREATE TABLE IF NOT EXISTS transactions (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_user_id     TEXT NOT NULL,
    sender_wallet_id   TEXT NOT NULL,
    receiver_user_id   TEXT NOT NULL,
    receiver_wallet_id TEXT NOT NULL,
    amount             TEXT NOT NULL,
    kind               TEXT NOT NULL,
    creation_date      TEXT NOT NULL,
    update_date        TEXT NOT NULL,
    deletion_date      TEXT
);

CREATE INDEX IF NOT EXISTS idx_transactions_sender
    ON transactions(sender_user_id, creation_date);

CREATE TABLE IF NOT EXISTS tokens (
    token         TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL REFERENCES users(id),
    creation_date TEXT NOT NULL
);
";

const WALLET_COLUMNS: &str = "id, user_id, balance, version, creation_date, update_date, deletion_date";

const TRANSACTION_COLUMNS: &str = "id, sender_user_id, sender_wallet_id, receiver_user_id, \
     receiver_wallet_id, amount, kind, creation_date, update_date, deletion_date";

/// SQLite-backed [`LedgerStore`]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and ensure the schema
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        // WAL keeps readers from blocking the writer on a file-backed db
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        Self::init(conn)
    }

    /// In-memory store, used by tests
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // === Commit internals ===

    /// The conditional update: writes the balance only while the stored
    /// version still equals the expected one, bumping the version with it.
    fn conditional_update(
        tx: &rusqlite::Transaction<'_>,
        write: &WalletWrite,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let affected = tx.execute(
            "UPDATE wallets
             SET balance = ?1, version = version + 1, update_date = ?2
             WHERE id = ?3 AND version = ?4 AND deletion_date IS NULL",
            params![
                write.new_balance.to_string(),
                now.to_rfc3339(),
                write.wallet_id.to_string(),
                write.expected_version
            ],
        )?;
        if affected == 1 {
            return Ok(());
        }
        // Zero rows: either the version moved under us or the wallet is gone
        let live: i64 = tx.query_row(
            "SELECT COUNT(*) FROM wallets WHERE id = ?1 AND deletion_date IS NULL",
            params![write.wallet_id.to_string()],
            |row| row.get(0),
        )?;
        if live > 0 {
            Err(Error::ConcurrencyConflict(write.wallet_id))
        } else {
            Err(Error::wallet_not_found(write.wallet_id.to_string()))
        }
    }

    /// The ledger append: inserts the record and reads back the assigned id
    fn append_record(
        tx: &rusqlite::Transaction<'_>,
        record: NewTransaction,
        now: DateTime<Utc>,
    ) -> Result<Transaction> {
        tx.execute(
            "INSERT INTO transactions
                 (sender_user_id, sender_wallet_id, receiver_user_id, receiver_wallet_id,
                  amount, kind, creation_date, update_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.sender_user_id.to_string(),
                record.sender_wallet_id.to_string(),
                record.receiver_user_id.to_string(),
                record.receiver_wallet_id.to_string(),
                record.amount.to_string(),
                record.kind.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339()
            ],
        )?;
        Ok(Transaction {
            id: tx.last_insert_rowid(),
            sender_user_id: record.sender_user_id,
            sender_wallet_id: record.sender_wallet_id,
            receiver_user_id: record.receiver_user_id,
            receiver_wallet_id: record.receiver_wallet_id,
            amount: record.amount,
            kind: record.kind,
            creation_date: now,
            update_date: now,
            deletion_date: None,
        })
    }
}

impl LedgerStore for SqliteStore {
    // === Wallets ===

    fn wallet_by_id(&self, wallet_id: WalletId) -> Result<Option<Wallet>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE id = ?1 AND deletion_date IS NULL"),
                params![wallet_id.to_string()],
                WalletRow::read,
            )
            .optional()?;
        row.map(WalletRow::into_wallet).transpose()
    }

    fn wallet_by_user(&self, user_id: UserId) -> Result<Wallet> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = ?1 AND deletion_date IS NULL"
        ))?;
        let rows = stmt
            .query_map(params![user_id.to_string()], WalletRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if rows.len() > 1 {
            return Err(Error::wallet_not_found(format!(
                "expected one active wallet for user {user_id}, found {}",
                rows.len()
            )));
        }
        match rows.into_iter().next() {
            Some(row) => row.into_wallet(),
            None => Err(Error::wallet_not_found(format!(
                "no active wallet for user {user_id}"
            ))),
        }
    }

    fn create_wallet(&self, user_id: UserId, initial_balance: Decimal) -> Result<Wallet> {
        if initial_balance < Decimal::ZERO {
            return Err(Error::invalid_amount(format!(
                "initial balance cannot be negative, got {initial_balance}"
            )));
        }
        let wallet = Wallet::new(user_id, initial_balance);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO wallets (id, user_id, balance, version, creation_date, update_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                wallet.id.to_string(),
                wallet.user_id.to_string(),
                wallet.balance.to_string(),
                wallet.version,
                wallet.creation_date.to_rfc3339(),
                wallet.update_date.to_rfc3339()
            ],
        )?;
        Ok(wallet)
    }

    // === Ledger ===

    fn commit(&self, writes: &[WalletWrite], record: NewTransaction) -> Result<Transaction> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();
        for write in writes {
            // An early return here drops `tx`, which rolls everything back
            Self::conditional_update(&tx, write, now)?;
        }
        let committed = Self::append_record(&tx, record, now)?;
        tx.commit()?;
        Ok(committed)
    }

    fn transactions_by_user(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE sender_user_id = ?1 AND deletion_date IS NULL
             ORDER BY creation_date DESC, id DESC"
        ))?;
        let rows = stmt
            .query_map(params![user_id.to_string()], TransactionRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    // === Users & tokens ===

    fn create_user(&self, username: &str) -> Result<User> {
        let user = User::new(username);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, username, creation_date, update_date)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id.to_string(),
                user.username,
                user.creation_date.to_rfc3339(),
                user.update_date.to_rfc3339()
            ],
        )?;
        Ok(user)
    }

    fn user_count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE deletion_date IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, username, creation_date, update_date, deletion_date
             FROM users WHERE id IN ({placeholders}) AND deletion_date IS NULL"
        ))?;
        let rows = stmt
            .query_map(
                params_from_iter(ids.iter().map(ToString::to_string)),
                UserRow::read,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    fn user_by_token(&self, token: &str) -> Result<Option<UserId>> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT user_id FROM tokens WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| parse_user_id(&s)).transpose()
    }

    fn issue_token(&self, user_id: UserId) -> Result<String> {
        let mut bytes = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO tokens (token, user_id, creation_date) VALUES (?1, ?2, ?3)",
            params![token, user_id.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(token)
    }
}

// === Row mapping ===

struct WalletRow {
    id: String,
    user_id: String,
    balance: String,
    version: i64,
    creation_date: String,
    update_date: String,
    deletion_date: Option<String>,
}

impl WalletRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            balance: row.get(2)?,
            version: row.get(3)?,
            creation_date: row.get(4)?,
            update_date: row.get(5)?,
            deletion_date: row.get(6)?,
        })
    }

    fn into_wallet(self) -> Result<Wallet> {
        Ok(Wallet {
            id: parse_wallet_id(&self.id)?,
            user_id: parse_user_id(&self.user_id)?,
            balance: parse_decimal(&self.balance)?,
            version: self.version,
            creation_date: parse_timestamp(&self.creation_date)?,
            update_date: parse_timestamp(&self.update_date)?,
            deletion_date: parse_timestamp_opt(self.deletion_date.as_deref())?,
        })
    }
}

struct TransactionRow {
    id: i64,
    sender_user_id: String,
    sender_wallet_id: String,
    receiver_user_id: String,
    receiver_wallet_id: String,
    amount: String,
    kind: String,
    creation_date: String,
    update_date: String,
    deletion_date: Option<String>,
}

impl TransactionRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sender_user_id: row.get(1)?,
            sender_wallet_id: row.get(2)?,
            receiver_user_id: row.get(3)?,
            receiver_wallet_id: row.get(4)?,
            amount: row.get(5)?,
            kind: row.get(6)?,
            creation_date: row.get(7)?,
            update_date: row.get(8)?,
            deletion_date: row.get(9)?,
        })
    }

    fn into_transaction(self) -> Result<Transaction> {
        Ok(Transaction {
            id: self.id,
            sender_user_id: parse_user_id(&self.sender_user_id)?,
            sender_wallet_id: parse_wallet_id(&self.sender_wallet_id)?,
            receiver_user_id: parse_user_id(&self.receiver_user_id)?,
            receiver_wallet_id: parse_wallet_id(&self.receiver_wallet_id)?,
            amount: parse_decimal(&self.amount)?,
            kind: parse_kind(&self.kind)?,
            creation_date: parse_timestamp(&self.creation_date)?,
            update_date: parse_timestamp(&self.update_date)?,
            deletion_date: parse_timestamp_opt(self.deletion_date.as_deref())?,
        })
    }
}

struct UserRow {
    id: String,
    username: String,
    creation_date: String,
    update_date: String,
    deletion_date: Option<String>,
}

impl UserRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            creation_date: row.get(2)?,
            update_date: row.get(3)?,
            deletion_date: row.get(4)?,
        })
    }

    fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_user_id(&self.id)?,
            username: self.username,
            creation_date: parse_timestamp(&self.creation_date)?,
            update_date: parse_timestamp(&self.update_date)?,
            deletion_date: parse_timestamp_opt(self.deletion_date.as_deref())?,
        })
    }
}

fn parse_wallet_id(raw: &str) -> Result<WalletId> {
    raw.parse()
        .map_err(|e| Error::persistence(format!("bad wallet id {raw}: {e}")))
}

fn parse_user_id(raw: &str) -> Result<UserId> {
    raw.parse()
        .map_err(|e| Error::persistence(format!("bad user id {raw}: {e}")))
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    raw.parse()
        .map_err(|e| Error::persistence(format!("bad decimal {raw}: {e}")))
}

fn parse_kind(raw: &str) -> Result<TransactionKind> {
    raw.parse().map_err(Error::persistence)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::persistence(format!("bad timestamp {raw}: {e}")))
}

fn parse_timestamp_opt(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(parse_timestamp).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn user_with_wallet(store: &SqliteStore, name: &str, balance: i64) -> (User, Wallet) {
        let user = store.create_user(name).unwrap();
        let wallet = store
            .create_wallet(user.id, Decimal::from(balance))
            .unwrap();
        (user, wallet)
    }

    #[test]
    fn test_create_and_fetch_wallet() {
        let store = store();
        let (user, wallet) = user_with_wallet(&store, "alice", 100);

        let by_id = store.wallet_by_id(wallet.id).unwrap().unwrap();
        assert_eq!(by_id.balance, Decimal::from(100));
        assert_eq!(by_id.version, 1);
        assert_eq!(by_id.user_id, user.id);

        let by_user = store.wallet_by_user(user.id).unwrap();
        assert_eq!(by_user.id, wallet.id);
    }

    #[test]
    fn test_missing_wallet_reads_as_none() {
        let store = store();
        assert!(store.wallet_by_id(WalletId::new()).unwrap().is_none());
    }

    #[test]
    fn test_create_wallet_rejects_negative_balance() {
        let store = store();
        let user = store.create_user("alice").unwrap();
        let err = store.create_wallet(user.id, Decimal::from(-5)).unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
    }

    #[test]
    fn test_wallet_by_user_requires_exactly_one_active_wallet() {
        let store = store();
        let user = store.create_user("alice").unwrap();

        let err = store.wallet_by_user(user.id).unwrap_err();
        assert!(err.to_string().contains("no active wallet"));

        store.create_wallet(user.id, Decimal::ZERO).unwrap();
        store.create_wallet(user.id, Decimal::ZERO).unwrap();
        let err = store.wallet_by_user(user.id).unwrap_err();
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_soft_deleted_wallet_is_invisible() {
        let store = store();
        let (user, wallet) = user_with_wallet(&store, "alice", 10);
        store
            .conn
            .lock()
            .execute(
                "UPDATE wallets SET deletion_date = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), wallet.id.to_string()],
            )
            .unwrap();

        assert!(store.wallet_by_id(wallet.id).unwrap().is_none());
        assert!(store.wallet_by_user(user.id).is_err());
    }

    #[test]
    fn test_commit_applies_write_and_appends_record() {
        let store = store();
        let (user, wallet) = user_with_wallet(&store, "alice", 100);

        let committed = store
            .commit(
                &[WalletWrite {
                    wallet_id: wallet.id,
                    expected_version: 1,
                    new_balance: Decimal::from(110),
                }],
                NewTransaction::self_referential(
                    TransactionKind::Deposit,
                    user.id,
                    wallet.id,
                    Decimal::from(10),
                ),
            )
            .unwrap();

        assert!(committed.id > 0);
        let after = store.wallet_by_id(wallet.id).unwrap().unwrap();
        assert_eq!(after.balance, Decimal::from(110));
        assert_eq!(after.version, 2);

        let history = store.transactions_by_user(user.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, committed.id);
        assert_eq!(history[0].kind, TransactionKind::Deposit);
        assert_eq!(history[0].amount, Decimal::from(10));
    }

    #[test]
    fn test_commit_with_stale_version_conflicts_and_writes_nothing() {
        let store = store();
        let (user, wallet) = user_with_wallet(&store, "alice", 100);

        let err = store
            .commit(
                &[WalletWrite {
                    wallet_id: wallet.id,
                    expected_version: 7,
                    new_balance: Decimal::from(999),
                }],
                NewTransaction::self_referential(
                    TransactionKind::Deposit,
                    user.id,
                    wallet.id,
                    Decimal::from(899),
                ),
            )
            .unwrap_err();

        assert!(matches!(err, Error::ConcurrencyConflict(id) if id == wallet.id));
        let after = store.wallet_by_id(wallet.id).unwrap().unwrap();
        assert_eq!(after.balance, Decimal::from(100));
        assert_eq!(after.version, 1);
        assert!(store.transactions_by_user(user.id).unwrap().is_empty());
    }

    #[test]
    fn test_commit_against_missing_wallet_is_not_found() {
        let store = store();
        let (user, wallet) = user_with_wallet(&store, "alice", 100);

        let err = store
            .commit(
                &[WalletWrite {
                    wallet_id: WalletId::new(),
                    expected_version: 1,
                    new_balance: Decimal::from(10),
                }],
                NewTransaction::self_referential(
                    TransactionKind::Deposit,
                    user.id,
                    wallet.id,
                    Decimal::from(10),
                ),
            )
            .unwrap_err();

        assert!(matches!(err, Error::WalletNotFound(_)));
    }

    #[test]
    fn test_pair_commit_rolls_back_first_write_when_second_conflicts() {
        let store = store();
        let (alice, alice_wallet) = user_with_wallet(&store, "alice", 100);
        let (bob, bob_wallet) = user_with_wallet(&store, "bob", 50);

        let err = store
            .commit(
                &[
                    WalletWrite {
                        wallet_id: alice_wallet.id,
                        expected_version: 1,
                        new_balance: Decimal::from(70),
                    },
                    WalletWrite {
                        wallet_id: bob_wallet.id,
                        expected_version: 9,
                        new_balance: Decimal::from(80),
                    },
                ],
                NewTransaction::transfer(
                    alice.id,
                    alice_wallet.id,
                    bob.id,
                    bob_wallet.id,
                    Decimal::from(30),
                ),
            )
            .unwrap_err();

        assert!(matches!(err, Error::ConcurrencyConflict(id) if id == bob_wallet.id));
        // The first write must not survive the aborted unit
        let alice_after = store.wallet_by_id(alice_wallet.id).unwrap().unwrap();
        assert_eq!(alice_after.balance, Decimal::from(100));
        assert_eq!(alice_after.version, 1);
        assert!(store.transactions_by_user(alice.id).unwrap().is_empty());
    }

    #[test]
    fn test_transactions_by_user_newest_first() {
        let store = store();
        let (user, wallet) = user_with_wallet(&store, "alice", 0);

        for (i, amount) in [5i64, 7, 9].into_iter().enumerate() {
            store
                .commit(
                    &[WalletWrite {
                        wallet_id: wallet.id,
                        expected_version: 1 + i as i64,
                        new_balance: Decimal::from(amount),
                    }],
                    NewTransaction::self_referential(
                        TransactionKind::Deposit,
                        user.id,
                        wallet.id,
                        Decimal::from(amount),
                    ),
                )
                .unwrap();
        }

        let history = store.transactions_by_user(user.id).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].id > history[1].id && history[1].id > history[2].id);
        assert_eq!(history[0].amount, Decimal::from(9));
    }

    #[test]
    fn test_token_issue_and_lookup() {
        let store = store();
        let user = store.create_user("alice").unwrap();

        let token = store.issue_token(user.id).unwrap();
        assert_eq!(store.user_by_token(&token).unwrap(), Some(user.id));
        assert_eq!(store.user_by_token("nope").unwrap(), None);
    }

    #[test]
    fn test_users_by_ids_returns_requested_subset() {
        let store = store();
        let alice = store.create_user("alice").unwrap();
        let _bob = store.create_user("bob").unwrap();

        assert!(store.users_by_ids(&[]).unwrap().is_empty());

        let found = store.users_by_ids(&[alice.id, UserId::new()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "alice");
    }

    #[test]
    fn test_duplicate_username_is_rejected() {
        let store = store();
        store.create_user("alice").unwrap();
        assert!(matches!(
            store.create_user("alice").unwrap_err(),
            Error::Persistence(_)
        ));
    }
}
