use crate::buffer::pool::BufferPool;
use crate::catalog::Catalog;
use crate::error::Result;
use crate::exec::{self, ExecContext};
use crate::io::DiskManager;
use crate::optimizer;
use crate::plan::PlanNode;
use crate::table::tuple::Tuple;
use crate::trx::sys::TransactionManager;
use crate::trx::{IsolationLevel, Transaction};
use std::path::PathBuf;
use std::sync::Arc;

/// Builder-style engine configuration.
pub struct EngineConfig {
    file_path: PathBuf,
    pool_size: usize,
    replacer_k: usize,
}

impl Default for EngineConfig {
    #[inline]
    fn default() -> Self {
        EngineConfig {
            file_path: PathBuf::from("magpie.db"),
            pool_size: 64,
            replacer_k: 2,
        }
    }
}

impl EngineConfig {
    #[inline]
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = path.into();
        self
    }

    #[inline]
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    #[inline]
    pub fn replacer_k(mut self, replacer_k: usize) -> Self {
        self.replacer_k = replacer_k;
        self
    }

    pub fn build(self) -> Result<Engine> {
        let disk = Arc::new(DiskManager::new(&self.file_path)?);
        let pool = BufferPool::new(self.pool_size, self.replacer_k, Arc::clone(&disk));
        let catalog = Catalog::new(Arc::clone(&pool));
        let txn_mgr = TransactionManager::new(Arc::clone(&catalog));
        Ok(Engine {
            disk,
            pool,
            catalog,
            txn_mgr,
        })
    }
}

/// The assembled storage engine: disk manager, buffer pool, catalog and
/// transaction manager, constructed once and shared by reference.
pub struct Engine {
    pub disk: Arc<DiskManager>,
    pub pool: Arc<BufferPool>,
    pub catalog: Arc<Catalog>,
    pub txn_mgr: Arc<TransactionManager>,
}

impl Engine {
    #[inline]
    pub fn begin(&self, isolation: IsolationLevel) -> Arc<Transaction> {
        self.txn_mgr.begin(isolation)
    }

    #[inline]
    pub fn commit(&self, txn: &Arc<Transaction>) -> Result<bool> {
        self.txn_mgr.commit(txn)
    }

    #[inline]
    pub fn abort(&self, txn: &Arc<Transaction>) {
        self.txn_mgr.abort(txn)
    }

    #[inline]
    pub fn exec_ctx(&self, txn: &Arc<Transaction>) -> ExecContext {
        ExecContext {
            catalog: Arc::clone(&self.catalog),
            txn_mgr: Arc::clone(&self.txn_mgr),
            txn: Arc::clone(txn),
        }
    }

    /// Optimizes the plan and drives the executor tree to completion
    /// under `txn`.
    pub fn execute(&self, plan: PlanNode, txn: &Arc<Transaction>) -> Result<Vec<Tuple>> {
        let plan = optimizer::optimize(&self.catalog, plan);
        exec::execute(&self.exec_ctx(txn), &plan)
    }
}
