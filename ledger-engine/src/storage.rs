//! Storage layer using RocksDB
//!
//! Durable write-ahead log for the ledger. Nothing here validates business
//! rules; the writer actor only persists transitions the engine prepared.
//!
//! # Column Families
//!
//! - `entries` - Append-only entry log (key: index as big-endian u64)
//! - `balances` - Balance table (key: 20 account bytes, value: big-endian u128)

use crate::{
    error::{Error, Result},
    types::{AccountId, Amount, Entry, ACCOUNT_ID_LEN},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};
use std::collections::HashMap;

/// Column family names
const CF_ENTRIES: &str = "entries";
const CF_BALANCES: &str = "balances";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
    sync_writes: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            config.rocksdb.level0_file_num_compaction_trigger,
        );

        // Universal compaction for write-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_entries()),
            ColumnFamilyDescriptor::new(CF_BALANCES, Self::cf_options_balances()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened ledger storage");

        Ok(Self {
            db,
            sync_writes: config.persistence.sync_writes,
        })
    }

    // Column family options

    fn cf_options_entries() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_balances() -> Options {
        let mut opts = Options::default();
        // Read on every open, point lookups only
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Append an entry and the account's new balance in one atomic write
    pub fn append_entry(&self, entry: &Entry, new_balance: Amount) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        let entry_value = bincode::serialize(entry)?;
        batch.put_cf(cf_entries, entry.index.to_be_bytes(), &entry_value);

        let cf_balances = self.cf_handle(CF_BALANCES)?;
        batch.put_cf(
            cf_balances,
            entry.account.as_bytes(),
            new_balance.units().to_be_bytes(),
        );

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &write_opts)?;

        tracing::debug!(
            index = entry.index,
            account = %entry.account,
            is_credit = entry.is_credit,
            "Entry persisted"
        );

        Ok(())
    }

    /// All entries in index order
    pub fn load_entries(&self) -> Result<Vec<Entry>> {
        let cf = self.cf_handle(CF_ENTRIES)?;

        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            entries.push(bincode::deserialize(&value)?);
        }

        Ok(entries)
    }

    /// The stored balance table
    pub fn load_balances(&self) -> Result<HashMap<AccountId, Amount>> {
        let cf = self.cf_handle(CF_BALANCES)?;

        let mut balances = HashMap::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;

            let account: [u8; ACCOUNT_ID_LEN] = key.as_ref().try_into().map_err(|_| {
                Error::Storage(format!("Malformed balance key of {} bytes", key.len()))
            })?;
            let units: [u8; 16] = value.as_ref().try_into().map_err(|_| {
                Error::Storage(format!("Malformed balance value of {} bytes", value.len()))
            })?;

            balances.insert(
                AccountId::from_bytes(account),
                Amount::new(u128::from_be_bytes(units)),
            );
        }

        Ok(balances)
    }

    /// Number of stored entries (exact; walks the log)
    pub fn entry_count(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_ENTRIES)?;

        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }

        Ok(count)
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        self.flush()?;
        drop(self.db);
        tracing::info!("Ledger storage closed");
        Ok(())
    }
}
