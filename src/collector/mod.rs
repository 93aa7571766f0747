mod core;
mod registry;

// Re-export public items
pub use self::core::RuleCollector;
pub use self::registry::CollectorSet;
