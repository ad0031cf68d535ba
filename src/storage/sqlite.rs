//! SQLite Persistent Storage for Accounts
//!
//! Durable account storage that survives service restarts. Uses connection
//! pooling via r2d2 for concurrent access. The read path walks a live cursor
//! over the accounts/addresses outer join, so stopping early never reads the
//! remaining rows.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use crate::app::aggregate::{stream_grouped, AccountRow};
use crate::app::context::Context;
use crate::app::stores::{ReadStore, StoreError, StoreResult, VisitResult, WriteStore};
use crate::domain::{Account, AccountAddresses, AccountName, AccountType, Address, UserName};

/// Path that selects a private in-memory database
pub const MEMORY_PATH: &str = ":memory:";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const STREAM_ACCOUNTS_SQL: &str = r#"
    SELECT a.id, a.name, aa.address
    FROM accounts a
    JOIN users u ON u.id = a.fk_users
    LEFT JOIN account_addresses aa ON aa.fk_accounts = a.id
    WHERE u.name = ?1
    ORDER BY a.name, a.id, aa.address
"#;

/// SQLite-backed account store with connection pooling
pub struct SqliteAccountStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAccountStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Connection(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|c| {
            c.busy_timeout(BUSY_TIMEOUT)?;
            c.execute_batch("PRAGMA foreign_keys = ON;")
        });
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    ///
    /// Every connection to `:memory:` is its own database, so the pool holds
    /// exactly one.
    pub fn in_memory() -> StoreResult<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Open `path`, or an in-memory database when it is `:memory:`
    pub fn open(path: &str, pool_size: u32) -> StoreResult<Self> {
        if path == MEMORY_PATH {
            Self::in_memory()
        } else {
            Self::new(path, pool_size)
        }
    }

    /// Get a connection from the pool
    fn conn(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    /// Run database migrations
    fn run_migrations(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fk_users INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                xpub TEXT NOT NULL,
                acc_type TEXT NOT NULL DEFAULT 'undefined',
                UNIQUE (fk_users, name)
            );

            CREATE TABLE IF NOT EXISTS account_addresses (
                fk_accounts INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                address TEXT NOT NULL,
                PRIMARY KEY (fk_accounts, address)
            );
            "#,
        )
        .map_err(db_error)?;

        Ok(())
    }

    fn create_user_and_account_sync(&self, account: &Account) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_error)?;

        tx.execute(
            "INSERT INTO users (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![account.user.as_str()],
        )
        .map_err(db_error)?;

        let user_id: i64 = tx
            .query_row(
                "SELECT id FROM users WHERE name = ?1",
                params![account.user.as_str()],
                |row| row.get(0),
            )
            .map_err(db_error)?;

        tx.execute(
            "INSERT INTO accounts (fk_users, name, xpub, acc_type) VALUES (?1, ?2, ?3, ?4)",
            params![
                user_id,
                account.name.as_str(),
                account.xpub.as_str(),
                account.account_type.as_str(),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                return StoreError::Duplicate(format!("{}/{}", account.user, account.name));
            }
            db_error(e)
        })?;

        // Dropping an uncommitted transaction rolls it back, user row included
        tx.commit().map_err(db_error)?;

        Ok(())
    }

    fn delete_account_sync(&self, user: &UserName, account: &AccountName) -> StoreResult<bool> {
        let conn = self.conn()?;

        let rows_affected = conn
            .execute(
                r#"
                DELETE FROM accounts
                WHERE name = ?2
                  AND fk_users = (SELECT id FROM users WHERE name = ?1)
                "#,
                params![user.as_str(), account.as_str()],
            )
            .map_err(db_error)?;

        Ok(rows_affected > 0)
    }

    fn stream_sync(
        &self,
        ctx: &Context,
        user: &UserName,
        visitor: &mut (dyn FnMut(AccountAddresses) -> VisitResult + Send),
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(STREAM_ACCOUNTS_SQL).map_err(db_error)?;

        let rows = stmt
            .query_map(params![user.as_str()], |row| {
                Ok(AccountRow {
                    account_id: row.get(0)?,
                    account: AccountName::new(row.get::<_, String>(1)?),
                    address: row.get::<_, Option<String>>(2)?.map(Address::new),
                })
            })
            .map_err(db_error)?
            .map(|row| row.map_err(db_error));

        stream_grouped(ctx, rows, visitor)
    }

    fn add_addresses_sync(
        &self,
        user: &UserName,
        account: &AccountName,
        addresses: &[Address],
    ) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_error)?;

        let account_id: Option<i64> = tx
            .query_row(
                r#"
                SELECT a.id FROM accounts a
                JOIN users u ON u.id = a.fk_users
                WHERE u.name = ?1 AND a.name = ?2
                "#,
                params![user.as_str(), account.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;

        let account_id =
            account_id.ok_or_else(|| StoreError::NotFound(format!("{}/{}", user, account)))?;

        let mut added = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO account_addresses (fk_accounts, address) VALUES (?1, ?2) \
                     ON CONFLICT DO NOTHING",
                )
                .map_err(db_error)?;
            for address in addresses.iter().filter(|a| !a.as_str().is_empty()) {
                added += stmt
                    .execute(params![account_id, address.as_str()])
                    .map_err(db_error)?;
            }
        }

        tx.commit().map_err(db_error)?;

        Ok(added)
    }

    fn account_sync(&self, user: &UserName, account: &AccountName) -> StoreResult<Option<Account>> {
        let conn = self.conn()?;

        let stored: Option<(String, String)> = conn
            .query_row(
                r#"
                SELECT a.xpub, a.acc_type FROM accounts a
                JOIN users u ON u.id = a.fk_users
                WHERE u.name = ?1 AND a.name = ?2
                "#,
                params![user.as_str(), account.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(db_error)?;

        stored
            .map(|(xpub, acc_type)| {
                let account_type = acc_type
                    .parse::<AccountType>()
                    .map_err(|e| StoreError::InvalidData(e.to_string()))?;
                Ok(Account::new(user.clone(), account.clone(), xpub, account_type))
            })
            .transpose()
    }

    /// Look up an account with its stored key and type
    pub async fn account(
        &self,
        ctx: &Context,
        user: &UserName,
        account: &AccountName,
    ) -> StoreResult<Option<Account>> {
        ctx.check()?;
        self.account_sync(user, account)
    }

    /// Attach addresses to an existing account
    ///
    /// Addresses already attached are skipped. Returns how many were new.
    pub async fn add_addresses(
        &self,
        ctx: &Context,
        user: &UserName,
        account: &AccountName,
        addresses: &[Address],
    ) -> StoreResult<usize> {
        ctx.check()?;
        self.add_addresses_sync(user, account, addresses)
    }

    /// Check the database answers
    pub async fn ping(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(db_error)?;
        Ok(())
    }
}

fn db_error(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// UNIQUE (2067) or PRIMARY KEY (1555) constraint failure
fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.extended_code == 1555 || err.extended_code == 2067
    )
}

#[async_trait]
impl WriteStore for SqliteAccountStore {
    async fn create_user_and_account(&self, ctx: &Context, account: &Account) -> StoreResult<()> {
        ctx.check()?;
        self.create_user_and_account_sync(account)
    }

    async fn delete_account(
        &self,
        ctx: &Context,
        user: &UserName,
        account: &AccountName,
    ) -> StoreResult<bool> {
        ctx.check()?;
        self.delete_account_sync(user, account)
    }
}

#[async_trait]
impl ReadStore for SqliteAccountStore {
    async fn stream_accounts_with_addresses(
        &self,
        ctx: &Context,
        user: &UserName,
        visitor: &mut (dyn FnMut(AccountAddresses) -> VisitResult + Send),
    ) -> StoreResult<()> {
        ctx.check()?;
        self.stream_sync(ctx, user, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::stores::Visit;
    use std::sync::Arc;

    fn account(user: &str, name: &str) -> Account {
        Account::new(user, name, format!("xpub-{name}"), AccountType::NativeSegwit)
    }

    async fn collect(store: &SqliteAccountStore, user: &str) -> Vec<AccountAddresses> {
        let mut seen = Vec::new();
        let mut visitor = |aa: AccountAddresses| -> VisitResult {
            seen.push(aa);
            Ok(Visit::Continue)
        };
        store
            .stream_accounts_with_addresses(&Context::background(), &user.into(), &mut visitor)
            .await
            .unwrap();
        seen
    }

    fn addrs(list: &[&str]) -> Vec<Address> {
        list.iter().copied().map(Address::from).collect()
    }

    #[tokio::test]
    async fn test_create_and_stream() {
        let store = SqliteAccountStore::in_memory().unwrap();
        let ctx = Context::background();

        store.create_user_and_account(&ctx, &account("alice", "savings")).await.unwrap();
        store.create_user_and_account(&ctx, &account("alice", "cold")).await.unwrap();

        let seen = collect(&store, "alice").await;
        let names: Vec<_> = seen.iter().map(|aa| aa.account.as_str()).collect();
        assert_eq!(names, vec!["cold", "savings"]);
        assert!(seen.iter().all(|aa| aa.addresses.is_empty()));
    }

    #[tokio::test]
    async fn test_duplicate_account() {
        let store = SqliteAccountStore::in_memory().unwrap();
        let ctx = Context::background();

        store.create_user_and_account(&ctx, &account("alice", "A1")).await.unwrap();
        let result = store.create_user_and_account(&ctx, &account("alice", "A1")).await;

        let err = result.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert!(store.is_duplicate_error(&err));
        assert_eq!(collect(&store, "alice").await.len(), 1);
    }

    fn count_users(store: &SqliteAccountStore) -> i64 {
        store
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap()
    }

    fn temp_db_path() -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("utxo-tracker-{}", uuid::Uuid::new_v4()))
            .join("accounts.db")
    }

    #[tokio::test]
    async fn test_second_account_reuses_user() {
        let store = SqliteAccountStore::in_memory().unwrap();
        let ctx = Context::background();

        store.create_user_and_account(&ctx, &account("alice", "A1")).await.unwrap();
        assert_eq!(count_users(&store), 1);

        store.create_user_and_account(&ctx, &account("alice", "A2")).await.unwrap();
        assert_eq!(count_users(&store), 1);

        // a rejected duplicate adds no user
        assert!(store.create_user_and_account(&ctx, &account("alice", "A2")).await.is_err());
        assert_eq!(count_users(&store), 1);
    }

    #[tokio::test]
    async fn test_delete_keeps_user() {
        let store = SqliteAccountStore::in_memory().unwrap();
        let ctx = Context::background();

        store.create_user_and_account(&ctx, &account("alice", "A1")).await.unwrap();
        store.delete_account(&ctx, &"alice".into(), &"A1".into()).await.unwrap();

        assert_eq!(count_users(&store), 1);
        assert!(collect(&store, "alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_keeps_original_attributes() {
        let store = SqliteAccountStore::in_memory().unwrap();
        let ctx = Context::background();

        store.create_user_and_account(&ctx, &account("alice", "A1")).await.unwrap();
        let other = Account::new("alice", "A1", "other-xpub", AccountType::Taproot);
        let err = store.create_user_and_account(&ctx, &other).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        let (xpub, acc_type): (String, String) = store
            .conn()
            .unwrap()
            .query_row("SELECT xpub, acc_type FROM accounts", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(xpub, "xpub-A1");
        assert_eq!(acc_type, "native-segwit");

        let stored = store
            .account(&ctx, &"alice".into(), &"A1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, account("alice", "A1"));
        assert!(store
            .account(&ctx, &"bob".into(), &"A1".into())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_creates_one_wins() {
        let path = temp_db_path();
        let store = Arc::new(SqliteAccountStore::new(&path, 8).unwrap());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .create_user_and_account(&Context::background(), &account("alice", "A1"))
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => ok += 1,
                Err(e) => assert!(matches!(e, StoreError::Duplicate(_)), "unexpected: {e}"),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(count_users(&store), 1);
        assert_eq!(collect(&store, "alice").await.len(), 1);

        drop(store);
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_unusable_directory_is_connection_error() {
        let blocker = std::env::temp_dir().join(format!("utxo-tracker-{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, b"not a directory").unwrap();

        let result = SqliteAccountStore::new(blocker.join("accounts.db"), 1);

        assert!(matches!(result, Err(StoreError::Connection(_))));
        std::fs::remove_file(blocker).ok();
    }

    #[tokio::test]
    async fn test_same_name_for_different_users() {
        let store = SqliteAccountStore::in_memory().unwrap();
        let ctx = Context::background();

        store.create_user_and_account(&ctx, &account("alice", "A1")).await.unwrap();
        store.create_user_and_account(&ctx, &account("bob", "A1")).await.unwrap();

        assert_eq!(collect(&store, "alice").await.len(), 1);
        assert_eq!(collect(&store, "bob").await.len(), 1);
    }

    #[tokio::test]
    async fn test_addresses_sorted_and_idempotent() {
        let store = SqliteAccountStore::in_memory().unwrap();
        let ctx = Context::background();
        let (user, name) = (UserName::from("alice"), AccountName::from("A1"));

        store.create_user_and_account(&ctx, &account("alice", "A1")).await.unwrap();
        let added = store
            .add_addresses(&ctx, &user, &name, &addrs(&["bc1q-b", "bc1q-a"]))
            .await
            .unwrap();
        assert_eq!(added, 2);

        let added = store
            .add_addresses(&ctx, &user, &name, &addrs(&["bc1q-a", "bc1q-c"]))
            .await
            .unwrap();
        assert_eq!(added, 1);

        let seen = collect(&store, "alice").await;
        assert_eq!(seen[0].addresses, addrs(&["bc1q-a", "bc1q-b", "bc1q-c"]));
    }

    #[tokio::test]
    async fn test_add_addresses_unknown_account() {
        let store = SqliteAccountStore::in_memory().unwrap();

        let err = store
            .add_addresses(&Context::background(), &"alice".into(), &"A1".into(), &addrs(&["x"]))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_addresses() {
        let store = SqliteAccountStore::in_memory().unwrap();
        let ctx = Context::background();
        let (user, name) = (UserName::from("alice"), AccountName::from("A1"));

        store.create_user_and_account(&ctx, &account("alice", "A1")).await.unwrap();
        store.add_addresses(&ctx, &user, &name, &addrs(&["addr1"])).await.unwrap();

        assert!(store.delete_account(&ctx, &user, &name).await.unwrap());
        assert!(!store.delete_account(&ctx, &user, &name).await.unwrap());
        assert!(collect(&store, "alice").await.is_empty());

        // re-creating starts with no addresses
        store.create_user_and_account(&ctx, &account("alice", "A1")).await.unwrap();
        let seen = collect(&store, "alice").await;
        assert!(seen[0].addresses.is_empty());
    }

    #[tokio::test]
    async fn test_delete_for_unknown_user() {
        let store = SqliteAccountStore::in_memory().unwrap();

        let deleted = store
            .delete_account(&Context::background(), &"nobody".into(), &"A1".into())
            .await
            .unwrap();

        assert!(!deleted);
    }

    #[tokio::test]
    async fn test_cancelled_context_rejects_work() {
        let store = SqliteAccountStore::in_memory().unwrap();
        let ctx = Context::background();
        ctx.cancel();

        let err = store
            .create_user_and_account(&ctx, &account("alice", "A1"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_ping() {
        let store = SqliteAccountStore::in_memory().unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = std::env::temp_dir().join(format!("utxo-tracker-{}", uuid::Uuid::new_v4()));
        let path = dir.join("accounts.db");

        {
            let store = SqliteAccountStore::new(&path, 2).unwrap();
            store
                .create_user_and_account(&Context::background(), &account("alice", "A1"))
                .await
                .unwrap();
        }

        let store = SqliteAccountStore::new(&path, 2).unwrap();
        assert_eq!(collect(&store, "alice").await.len(), 1);

        std::fs::remove_dir_all(dir).ok();
    }
}
