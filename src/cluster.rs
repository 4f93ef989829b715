use crate::{BacteriumId, ClusterId};
use log::debug;
use slotmap::SlotMap;
use std::collections::{BTreeSet, VecDeque};

/// Owns every cluster. A bacterium belongs to exactly one cluster once clustered; cluster
/// sizes are read from here, so removing a member updates the size seen by all clustermates.
#[derive(Debug, Default)]
pub struct ClusterRegistry {
    clusters: SlotMap<ClusterId, BTreeSet<BacteriumId>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn size_of(&self, cluster: ClusterId) -> usize {
        self.clusters.get(cluster).map_or(0, |members| members.len())
    }

    pub fn members(&self, cluster: ClusterId) -> Option<&BTreeSet<BacteriumId>> {
        self.clusters.get(cluster)
    }

    pub fn largest(&self) -> usize {
        self.clusters.values().map(|members| members.len()).max().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClusterId, &BTreeSet<BacteriumId>)> + '_ {
        self.clusters.iter()
    }

    /// Drops `bacterium` from `cluster`, deleting the cluster when it empties.
    /// Returns the remaining size.
    pub fn remove_member(&mut self, cluster: ClusterId, bacterium: BacteriumId) -> usize {
        let Some(members) = self.clusters.get_mut(cluster) else {
            return 0;
        };
        members.remove(&bacterium);
        let remaining = members.len();
        if remaining == 0 {
            self.clusters.remove(cluster);
        }
        remaining
    }

    pub fn clear(&mut self) {
        self.clusters.clear();
    }

    /// Builds the cluster containing `start` by traversing the proximity graph.
    ///
    /// `neighbours` lists the bacteria adjacent to a node; `current_cluster` reports the
    /// cluster a node already belongs to, whose members are merged into the traversal.
    /// Every cluster touched is replaced by a single new one. Returns the new cluster and
    /// its members; the caller must point each member at the returned id.
    pub fn calculate_cluster<N, C>(
        &mut self,
        start: BacteriumId,
        mut neighbours: N,
        mut current_cluster: C,
    ) -> (ClusterId, BTreeSet<BacteriumId>)
    where
        N: FnMut(BacteriumId) -> Vec<BacteriumId>,
        C: FnMut(BacteriumId) -> Option<ClusterId>,
    {
        let mut visited: BTreeSet<BacteriumId> = BTreeSet::new();
        let mut merged: BTreeSet<ClusterId> = BTreeSet::new();
        let mut queue: VecDeque<BacteriumId> = VecDeque::new();

        visited.insert(start);
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            let mut adjacent = neighbours(node);

            if let Some(cluster) = current_cluster(node) {
                if merged.insert(cluster) {
                    if let Some(members) = self.clusters.get(cluster) {
                        adjacent.extend(members.iter().copied());
                    }
                }
            }

            for next in adjacent {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        for cluster in &merged {
            self.clusters.remove(*cluster);
        }
        if merged.len() > 1 {
            debug!("Merged {} clusters into one of {} bacteria.", merged.len(), visited.len());
        }

        let id = self.clusters.insert(visited.clone());
        (id, visited)
    }
}
