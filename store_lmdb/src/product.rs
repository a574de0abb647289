//! LMDB implementation of ProductStore.

use authentimed_store::{Product, ProductStore, StoreError};
use authentimed_types::{CodeFormat, ProductId, StripCode};

use crate::environment::LmdbEnvironment;
use crate::error::decode;
use crate::LmdbError;

impl ProductStore for LmdbEnvironment {
    fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        match self
            .products_db
            .get(&rtxn, product_id.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(decode("product", bytes)?)),
            None => Ok(None),
        }
    }

    fn product_for_strip(&self, strip: &StripCode) -> Result<Option<ProductId>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let Some(bytes) = self
            .strip_index_db
            .get(&rtxn, strip.as_bytes())
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        let raw = std::str::from_utf8(bytes)
            .map_err(|e| LmdbError::Corruption(format!("strip index value: {e}")))?;
        // Stored ids were normalised on the way in, so the permissive parse
        // accepts every id regardless of the configured format.
        let id = ProductId::parse(raw, CodeFormat::Permissive)
            .map_err(|e| LmdbError::Corruption(format!("strip index value: {e}")))?;
        Ok(Some(id))
    }

    fn product_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        Ok(self.products_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
