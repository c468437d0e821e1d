use crate::node::HotspotKindTag;

/// A single effective change to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TourEvent {
    NodeAdded { id: String },
    NodeUpdated { id: String },
    NodeRemoved { id: String },
    LinkUpserted { source: String, target: String },
    LinkMoved { source: String, target: String },
    LinkRemoved { source: String, target: String },
    HotspotAdded { node: String, hotspot: String },
    HotspotUpdated { node: String, hotspot: String },
    HotspotRemoved { node: String, hotspot: String },
    HotspotKindChanged {
        node: String,
        hotspot: String,
        from: HotspotKindTag,
        to: HotspotKindTag,
    },
}

/// Recorded change with the graph revision it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub revision: u64,
    pub event: TourEvent,
}

/// Append-only change log drained by observers (UI, persistence).
#[derive(Debug, Default)]
pub struct ChangeLog {
    revision: u64,
    records: Vec<ChangeRecord>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: TourEvent) {
        self.revision += 1;
        self.records.push(ChangeRecord {
            revision: self.revision,
            event,
        });
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn drain(&mut self) -> Vec<ChangeRecord> {
        std::mem::take(&mut self.records)
    }
}
