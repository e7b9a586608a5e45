//! Position in the transport catalog.

use std::sync::Arc;
use tenvis_pulse_transport::{Capability, Connector, TransportCatalog};
use tracing::debug;

/// A transport chosen by [`Cursor::select`].
#[derive(Clone)]
pub struct Selection {
    /// Catalog index of the chosen transport.
    pub index: usize,
    /// Transport name.
    pub name: &'static str,
    /// Connector for the transport.
    pub connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("index", &self.index)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Index of the next catalog entry to try. Never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor(usize);

impl Cursor {
    /// A cursor at the start of the catalog.
    #[must_use]
    pub fn new() -> Self {
        Self(0)
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.0
    }

    /// Skip the current entry after it failed before opening.
    pub fn advance(&mut self) {
        self.0 += 1;
    }

    /// Pick the first usable transport at or after the cursor.
    ///
    /// Unusable entries are skipped and the cursor moves onto the selected
    /// entry. Returns `None` when nothing from the cursor onward is usable.
    pub fn select(&mut self, catalog: &TransportCatalog) -> Option<Selection> {
        for index in self.0..catalog.len() {
            let entry = catalog.get(index)?;
            match entry.probe() {
                Capability::Usable(connector) => {
                    self.0 = index;
                    return Some(Selection {
                        index,
                        name: entry.name(),
                        connector,
                    });
                }
                Capability::Unavailable => {
                    debug!(transport = entry.name(), "Transport unavailable, skipping");
                }
                Capability::Excluded { reason } => {
                    debug!(transport = entry.name(), reason = %reason, "Transport excluded, skipping");
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedConnector;
    use tenvis_pulse_transport::TransportEntry;

    fn catalog() -> TransportCatalog {
        TransportCatalog::new()
            .with_entry(TransportEntry::new("a", || Capability::Unavailable))
            .with_entry(TransportEntry::always(ScriptedConnector::new("b").into_connector()))
            .with_entry(TransportEntry::new("c", || Capability::Excluded {
                reason: "policy".into(),
            }))
            .with_entry(TransportEntry::always(ScriptedConnector::new("d").into_connector()))
    }

    #[test]
    fn test_select_skips_unusable_entries() {
        let catalog = catalog();
        let mut cursor = Cursor::new();

        let selection = cursor.select(&catalog).unwrap();
        assert_eq!(selection.name, "b");
        assert_eq!(cursor.position(), 1);

        // Selecting again from the same spot finds the same transport.
        assert_eq!(cursor.select(&catalog).unwrap().index, 1);
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_advance_moves_past_failed_entry() {
        let catalog = catalog();
        let mut cursor = Cursor::new();
        cursor.select(&catalog).unwrap();

        cursor.advance();
        let selection = cursor.select(&catalog).unwrap();
        assert_eq!(selection.name, "d");
        assert_eq!(cursor.position(), 3);

        cursor.advance();
        assert!(cursor.select(&catalog).is_none());
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn test_cursor_never_decreases() {
        let catalog = catalog();
        let mut cursor = Cursor::new();
        let mut last = cursor.position();

        for _ in 0..4 {
            let _ = cursor.select(&catalog);
            assert!(cursor.position() >= last);
            last = cursor.position();
            cursor.advance();
            assert!(cursor.position() > last);
            last = cursor.position();
        }
    }
}
