//! RocksDB storage backend for the Tollgate node.

use anyhow::Result;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, DB};
use std::path::Path;
use tollgate_core::{Address, TokenAmount};
use tollgate_ledger::LedgerSnapshot;

/// Column family names for different data types.
const CF_LEDGER: &str = "ledger";
const CF_TOKEN: &str = "token";

const SNAPSHOT_KEY: &[u8] = b"snapshot";
const HOLDINGS_KEY: &[u8] = b"holdings";

/// RocksDB-backed storage for the Tollgate node.
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_LEDGER, Options::default()),
            ColumnFamilyDescriptor::new(CF_TOKEN, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self { db })
    }

    /// Open an existing database without write access.
    #[cfg(test)]
    pub(crate) fn open_read_only(path: &Path) -> Result<Self> {
        let db = DB::open_cf_for_read_only(&Options::default(), path, [CF_LEDGER, CF_TOKEN], false)?;
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", name))
    }

    /// Get a value from a column family.
    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self.db.get_cf(self.cf(cf_name)?, key)?;
        Ok(value)
    }

    /// Store the ledger snapshot and the internal token's holdings in one
    /// atomic write, so custody and balances are always restored together.
    pub fn put_state(
        &self,
        snapshot: &LedgerSnapshot,
        holdings: &[(Address, TokenAmount)],
    ) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_LEDGER)?, SNAPSHOT_KEY, serde_json::to_vec(snapshot)?);
        batch.put_cf(self.cf(CF_TOKEN)?, HOLDINGS_KEY, serde_json::to_vec(holdings)?);
        self.db.write(batch)?;
        Ok(())
    }

    /// Load the latest ledger snapshot, if one was ever stored.
    pub fn get_snapshot(&self) -> Result<Option<LedgerSnapshot>> {
        match self.get(CF_LEDGER, SNAPSHOT_KEY)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Load the internal token's holdings (empty if never stored).
    pub fn get_holdings(&self) -> Result<Vec<(Address, TokenAmount)>> {
        match self.get(CF_TOKEN, HOLDINGS_KEY)? {
            Some(data) => Ok(serde_json::from_slice(&data)?),
            None => Ok(Vec::new()),
        }
    }
}
