//! Tunables shared by stock operations and sales.

use stockledger_domain::UNKNOWN_PRODUCT_NAME;

/// Default ledger note for sale entries
pub const DEFAULT_SALE_NOTE: &str = "POS Sale";

/// Presentation defaults applied by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSettings {
    /// Display name for balances whose product is missing from the catalog
    pub unknown_product_name: String,
    /// Ledger note written on sale entries when the sale has none
    pub default_sale_note: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            unknown_product_name: UNKNOWN_PRODUCT_NAME.to_string(),
            default_sale_note: DEFAULT_SALE_NOTE.to_string(),
        }
    }
}
