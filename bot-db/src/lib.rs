pub mod bans;
pub mod economy;
pub mod groups;
pub mod legacy;
pub mod settings;
pub mod users;

use std::{path::Path, time::Duration};

use blacksky_traits::ForwardRefToTracing;
use serde::{Serialize, de::DeserializeOwned};
use sled::{
    Db, Tree,
    transaction::{
        ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
        TransactionalTree,
    },
};

/// Everything the store can refuse or fail with.
///
/// The first group of variants are rule violations that should be shown to the
/// person who sent the command. `Storage` and `Codec` are real failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Insufficient funds! You need {needed} but only have {available}")]
    InsufficientFunds { needed: i64, available: i64 },
    #[error("You can do that again in {}", wait_time(.remaining))]
    OnCooldown { remaining: Duration },
    #[error("Please enter a valid amount greater than 0!")]
    InvalidAmount,
    #[error("There is no item called `{0}` in the shop")]
    UnknownItem(String),
    #[error("You need a {0} for that! Buy one from the shop.")]
    MissingItem(&'static str),
    #[error("You only have {owned} of {item}")]
    NotEnoughItems { item: String, owned: u32 },
    #[error("That amount is too large!")]
    Overflow,
    #[error("You can't target yourself!")]
    SelfTarget,
    #[error("{0}")]
    Rejected(String),
    #[error("could not import legacy store: {0}")]
    Legacy(String),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

impl StoreError {
    /// Whether the message is meant for the chat rather than the log.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            StoreError::Storage(_) | StoreError::Codec(_) | StoreError::Legacy(_)
        )
    }
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(error: TransactionError<StoreError>) -> Self {
        match error {
            TransactionError::Abort(error) => error,
            TransactionError::Storage(error) => StoreError::Storage(error),
        }
    }
}

fn wait_time(remaining: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(Duration::from_secs(remaining.as_secs().max(1)))
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Bincode-typed access to a tree keyed by UTF-8 ids (JIDs, setting names).
pub trait ReadWriteTree {
    fn typed_insert<V: Serialize>(&self, key: &str, value: &V) -> StoreResult<()>;

    fn typed_get<V: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<V>>;

    fn typed_get_or_default<V: DeserializeOwned + Default>(&self, key: &str) -> StoreResult<V> {
        Ok(self.typed_get(key)?.unwrap_or_default())
    }

    /// Read-modify-write of a single record inside a transaction.
    ///
    /// Nothing is written when `update` returns an error.
    fn typed_update<V, T, F>(&self, key: &str, update: F) -> StoreResult<T>
    where
        V: Serialize + DeserializeOwned + Default,
        F: Fn(&mut V) -> StoreResult<T>;

    /// Feeds `value` to the tree's merge operator and returns the merged record.
    fn typed_merge<M: Serialize, V: DeserializeOwned>(
        &self,
        key: &str,
        value: &M,
    ) -> StoreResult<Option<V>>;

    /// All decodable records. Undecodable rows are logged and skipped.
    fn typed_iter<V: DeserializeOwned>(&self) -> impl Iterator<Item = (String, V)>;
}

impl ReadWriteTree for Tree {
    fn typed_insert<V: Serialize>(&self, key: &str, value: &V) -> StoreResult<()> {
        self.insert(key.as_bytes(), bincode::serialize(value)?)?;
        Ok(())
    }

    fn typed_get<V: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<V>> {
        Ok(self
            .get(key.as_bytes())?
            .map(|value| bincode::deserialize::<V>(&value))
            .transpose()?)
    }

    fn typed_update<V, T, F>(&self, key: &str, update: F) -> StoreResult<T>
    where
        V: Serialize + DeserializeOwned + Default,
        F: Fn(&mut V) -> StoreResult<T>,
    {
        transact(self, |tx| {
            let mut value: V = read_in(tx, key)?.unwrap_or_default();
            let out = update(&mut value).map_err(ConflictableTransactionError::Abort)?;
            write_in(tx, key, &value)?;
            Ok(out)
        })
    }

    fn typed_merge<M: Serialize, V: DeserializeOwned>(
        &self,
        key: &str,
        value: &M,
    ) -> StoreResult<Option<V>> {
        Ok(self
            .merge(key.as_bytes(), bincode::serialize(value)?)?
            .map(|value| bincode::deserialize::<V>(&value))
            .transpose()?)
    }

    fn typed_iter<V: DeserializeOwned>(&self) -> impl Iterator<Item = (String, V)> {
        self.iter()
            .filter_map(|row| row.trace_err_ok())
            .filter_map(|(key, value)| {
                let key = String::from_utf8(key.to_vec()).trace_err_ok()?;
                let value = bincode::deserialize::<V>(&value).trace_err_ok()?;
                Some((key, value))
            })
    }
}

/// Runs `f` as a sled transaction, unwrapping the abort value back into a [`StoreError`].
pub(crate) fn transact<A>(
    tree: &Tree,
    f: impl Fn(&TransactionalTree) -> ConflictableTransactionResult<A, StoreError>,
) -> StoreResult<A> {
    tree.transaction(f).map_err(StoreError::from)
}

pub(crate) fn read_in<V: DeserializeOwned>(
    tx: &TransactionalTree,
    key: &str,
) -> ConflictableTransactionResult<Option<V>, StoreError> {
    tx.get(key.as_bytes())?
        .map(|bytes| bincode::deserialize::<V>(&bytes))
        .transpose()
        .map_err(|e| ConflictableTransactionError::Abort(StoreError::Codec(e)))
}

pub(crate) fn write_in<V: Serialize>(
    tx: &TransactionalTree,
    key: &str,
    value: &V,
) -> ConflictableTransactionResult<(), StoreError> {
    let bytes = bincode::serialize(value)
        .map_err(|e| ConflictableTransactionError::Abort(StoreError::Codec(e)))?;
    tx.insert(key.as_bytes(), bytes)?;
    Ok(())
}

pub(crate) fn abort<A>(error: StoreError) -> ConflictableTransactionResult<A, StoreError> {
    Err(ConflictableTransactionError::Abort(error))
}

/// Handle to the on-disk store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BotDb(Db);

impl BotDb {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        tracing::info!("opening store at {}", path.display());
        Ok(Self(sled::open(path)?))
    }

    /// A throwaway store that is deleted on drop.
    pub fn temporary() -> StoreResult<Self> {
        Ok(Self(sled::Config::new().temporary(true).open()?))
    }

    pub async fn flush(&self) -> StoreResult<usize> {
        Ok(self.0.flush_async().await?)
    }

    /// Builds a merge operator body: decode the old record (or take the default),
    /// apply `update`, encode again. On any codec failure the old bytes are kept.
    fn create_update_with_deserialization<V: DeserializeOwned + Serialize>(
        old_value: Option<&[u8]>,
        update_function: impl FnOnce(V) -> V,
        get_default_value: impl FnOnce() -> V,
    ) -> Option<Vec<u8>> {
        old_value
            .map_or_else(|| Ok(get_default_value()), bincode::deserialize::<V>)
            .trace_err_ok()
            .map(update_function)
            .map(|new_value| bincode::serialize::<V>(&new_value))
            .transpose()
            .trace_err_ok()
            .flatten()
            .or_else(|| old_value.map(|v| v.to_vec()))
    }

    fn open_tree(&self, name: impl AsRef<[u8]>) -> StoreResult<Tree> {
        Ok(self.0.open_tree(name)?)
    }
}
