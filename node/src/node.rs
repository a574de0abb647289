//! The ledger node: one handle over storage, registration and verification.

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use authentimed_registry::{
    CodeGenerator, OsRandom, RegistrationError, RegistrationService, ValidatorApproval,
    ValidatorSet,
};
use authentimed_store::{AuditEntry, Product, ProductStore, StoreError};
use authentimed_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment};
use authentimed_types::{Clock, Factor, ProductId, RandomSource, StripCode, SystemClock};
use authentimed_verification::{
    Activation, AuditLog, ScanInput, VerificationEngine, VerificationError, VerificationResult,
};

use crate::config::NodeConfig;
use crate::deployment::{establish, DeploymentRecord};
use crate::metrics::NodeMetrics;
use crate::tracing_spans::{register_span, scan_span};
use crate::NodeError;

pub struct LedgerNode {
    config: NodeConfig,
    store: Arc<LmdbEnvironment>,
    deployment: DeploymentRecord,
    registration: RegistrationService<LmdbEnvironment>,
    engine: VerificationEngine<LmdbEnvironment>,
    audit: AuditLog<LmdbEnvironment>,
    generator: CodeGenerator<LmdbEnvironment>,
    metrics: Option<NodeMetrics>,
}

impl LedgerNode {
    /// Open the ledger with the system clock and OS randomness.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        Self::open_with(config, Arc::new(SystemClock), Arc::new(OsRandom))
    }

    /// Open the ledger with an injected clock and random source.
    pub fn open_with(
        config: NodeConfig,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        check_data_dir(&config.data_dir).map_err(|e| NodeError::Integrity(vec![e]))?;

        let store = Arc::new(LmdbEnvironment::open(
            &config.data_dir,
            config.map_size_bytes(),
        )?);
        let report = check_integrity(&store)?;
        if !report.is_healthy() {
            return Err(NodeError::Integrity(report.errors));
        }

        let configured = if config.validators.is_empty() {
            None
        } else {
            Some(ValidatorSet::from_strings(&config.validators, config.quorum)?)
        };
        let (validators, deployment) = establish(store.as_ref(), configured, clock.now())?;
        let validators = Arc::new(validators);

        let registration = RegistrationService::new(
            store.clone(),
            validators,
            clock.clone(),
            config.code_format,
        );
        let engine = VerificationEngine::new(store.clone(), clock, config.code_format)
            .with_lock_timeout(config.lock_timeout());
        let audit = AuditLog::new(store.clone());
        let generator = CodeGenerator::new(store.clone(), rng);

        let products = store.product_count()?;
        let metrics = if config.enable_metrics {
            let metrics = NodeMetrics::new()?;
            metrics.product_count.set(products as i64);
            Some(metrics)
        } else {
            None
        };

        tracing::info!(
            data_dir = %config.data_dir.display(),
            products,
            validators = deployment.validators.len(),
            quorum = deployment.quorum,
            code_format = config.code_format.as_str(),
            "ledger node opened"
        );

        Ok(Self {
            config,
            store,
            deployment,
            registration,
            engine,
            audit,
            generator,
            metrics,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn deployment(&self) -> &DeploymentRecord {
        &self.deployment
    }

    pub fn validators(&self) -> &ValidatorSet {
        self.registration.validators()
    }

    pub fn metrics(&self) -> Option<&NodeMetrics> {
        self.metrics.as_ref()
    }

    pub fn store(&self) -> &Arc<LmdbEnvironment> {
        &self.store
    }

    pub fn register(
        &self,
        product_id: &str,
        strip_code: &str,
        approvals: &[ValidatorApproval],
    ) -> Result<Product, RegistrationError> {
        let _span = register_span(product_id).entered();
        let result = self.registration.register(product_id, strip_code, approvals);
        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(_) => {
                    metrics.registrations.inc();
                    metrics.product_count.inc();
                }
                Err(e) => metrics
                    .registrations_rejected
                    .with_label_values(&[e.kind().as_str()])
                    .inc(),
            }
        }
        result
    }

    /// A fresh, unused code pair for a new package.
    pub fn generate_pair(&self) -> Result<(ProductId, StripCode), RegistrationError> {
        self.generator.generate_pair()
    }

    pub async fn verify(&self, input: ScanInput) -> Result<VerificationResult, VerificationError> {
        let span = scan_span(input.factor);
        let started = Instant::now();
        let result = self.engine.verify_scan(input).instrument(span).await;

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(r) => {
                    metrics.observe_verdict(r.verdict());
                    metrics
                        .scan_latency_ms
                        .observe(started.elapsed().as_secs_f64() * 1_000.0);
                }
                Err(VerificationError::LedgerBusy { .. }) => metrics.ledger_busy.inc(),
                Err(_) => {}
            }
        }
        result
    }

    pub fn status(&self, code: &str, factor: Factor) -> Result<VerificationResult, VerificationError> {
        self.engine.status(code, factor)
    }

    pub fn history(&self, product_id: &ProductId) -> Result<Vec<AuditEntry>, StoreError> {
        self.audit.history(product_id)
    }

    pub fn first_activation(&self, product_id: &ProductId) -> Result<Option<Activation>, StoreError> {
        self.audit.first_activation(product_id)
    }

    pub fn audit_entries(&self, from_seq: u64, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        self.audit.entries(from_seq, limit)
    }

    /// Flush the ledger to disk.
    pub fn sync(&self) -> Result<(), NodeError> {
        self.store.force_sync()?;
        Ok(())
    }
}
