use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
pub struct ApyPoint {
    pub apy: f64,
    #[allow(dead_code)]
    pub recorded_at: i64,
}

/// In-process APY history used by trend annotation: one last-known point per
/// pool id. Lock-free map since readers and writers interleave per request.
#[derive(Default)]
pub struct HistoryStore {
    points: DashMap<String, ApyPoint>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn get(&self, pool_id: &str) -> Option<ApyPoint> {
        self.points.get(pool_id).map(|p| *p)
    }

    /// Record the latest APY and return the previous point, if one existed.
    pub fn put(&self, pool_id: &str, apy: f64, recorded_at: i64) -> Option<ApyPoint> {
        self.points
            .insert(pool_id.to_string(), ApyPoint { apy, recorded_at })
    }
}
