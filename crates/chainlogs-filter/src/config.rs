//! Event and filter configuration.

use chainlogs_core::BlockTag;
use serde::{Deserialize, Serialize};

/// Behaviour knobs shared by the filter manager, subscription engine and
/// contract event facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// `fromBlock` sent when the caller gives none
    #[serde(default = "default_block")]
    pub default_from_block: BlockTag,
    /// `toBlock` sent when the caller gives none
    #[serde(default = "default_block")]
    pub default_to_block: BlockTag,
    /// Replay matching past logs before live ones when a live request names
    /// a historical `fromBlock`
    #[serde(default = "bool_true")]
    pub catch_up_past_logs: bool,
    /// Send a fire-and-forget `eth_unsubscribe` when an open stream is dropped
    #[serde(default = "bool_true")]
    pub unsubscribe_on_drop: bool,
    /// History batches at least this large are decoded in parallel
    #[serde(default = "default_parallel_decode_threshold")]
    pub parallel_decode_threshold: usize,
}

fn default_block() -> BlockTag { BlockTag::Latest }
fn bool_true() -> bool { true }
fn default_parallel_decode_threshold() -> usize { 256 }

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            default_from_block: default_block(),
            default_to_block: default_block(),
            catch_up_past_logs: true,
            unsubscribe_on_drop: true,
            parallel_decode_threshold: default_parallel_decode_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg: EventsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, EventsConfig::default());
        assert_eq!(cfg.default_from_block, BlockTag::Latest);
        assert!(cfg.catch_up_past_logs);
    }

    #[test]
    fn overrides_are_honoured() {
        let cfg: EventsConfig = serde_json::from_str(
            r#"{"default_from_block":"earliest","unsubscribe_on_drop":false,"parallel_decode_threshold":8}"#,
        )
        .unwrap();
        assert_eq!(cfg.default_from_block, BlockTag::Earliest);
        assert_eq!(cfg.default_to_block, BlockTag::Latest);
        assert!(!cfg.unsubscribe_on_drop);
        assert_eq!(cfg.parallel_decode_threshold, 8);
    }
}
