//! Risk Assessment
//!
//! The risk assessor runs regardless of whether a deadlock currently
//! exists; its job is early warning. It counts "waiting chains" — paths
//! that follow each waiting process through the holders of the resource it
//! wants — measures per-resource contention, and folds both into a
//! bounded score with a textual strategy recommendation.
//!
//! The score is deliberately a blunt heuristic, not a probability: adding
//! waiting edges can only raise it, so a climbing score across ticks is
//! the signal to watch.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{AllocationStore, ProcessId};

/// Multiplier applied to the base score under high contention.
const HIGH_CONTENTION_MULTIPLIER: f64 = 1.5;

/// A resource whose combined holder + waiter count exceeds this is
/// considered highly contended.
const CONTENTION_THRESHOLD: usize = 3;

/// Overall contention level of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentionLevel {
    Moderate,
    High,
}

impl fmt::Display for ContentionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moderate => f.write_str("moderate"),
            Self::High => f.write_str("high"),
        }
    }
}

/// Recommended course of action for the current risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Score above 0.7: break contention proactively.
    Preemption,
    /// Score above 0.4: impose a total order on acquisitions.
    AllocationOrdering,
    /// Low risk: keep watching.
    Monitor,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preemption => f.write_str("Implement immediate resource preemption"),
            Self::AllocationOrdering => f.write_str("Apply resource allocation ordering"),
            Self::Monitor => f.write_str("Monitor resource usage patterns"),
        }
    }
}

/// Result of one risk assessment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    /// Heuristic risk in `[0, 1]`.
    pub score: f64,
    pub contention: ContentionLevel,
    pub strategy: Strategy,
    /// Number of waits-for-holder chains found.
    pub waiting_chains: usize,
    /// Human-readable summary lines.
    pub explanation: Vec<String>,
    pub prevention_tips: Vec<String>,
    /// Store version this report was computed at.
    pub at_version: u64,
}

/// Assess deadlock risk for the store's current state.
pub fn assess(store: &AllocationStore) -> RiskReport {
    let chains = count_waiting_chains(store);
    let contention = contention_level(store);

    let population = store.process_count() + store.resource_count();
    let score = if population == 0 {
        0.0
    } else {
        let multiplier = match contention {
            ContentionLevel::High => HIGH_CONTENTION_MULTIPLIER,
            ContentionLevel::Moderate => 1.0,
        };
        (chains as f64 / population as f64 * multiplier).clamp(0.0, 1.0)
    };

    let strategy = if score > 0.7 {
        Strategy::Preemption
    } else if score > 0.4 {
        Strategy::AllocationOrdering
    } else {
        Strategy::Monitor
    };

    debug!(score, chains, %contention, "risk assessed");

    RiskReport {
        score,
        contention,
        strategy,
        waiting_chains: chains,
        explanation: vec![
            format!(
                "Analysis based on {} processes and {} resources",
                store.process_count(),
                store.resource_count()
            ),
            format!("Detected {chains} resource dependency chains"),
            format!("System resource contention level: {contention}"),
        ],
        prevention_tips: prevention_tips(score, contention),
        at_version: store.version(),
    }
}

/// Count chains by following waits-for-holder edges from every waiting
/// process. A chain ends at a non-waiting process, at a resource with no
/// holder to follow, or when it closes back on the current path. The
/// visited set is per path: a process excluded from one branch may still
/// appear in chains started elsewhere.
fn count_waiting_chains(store: &AllocationStore) -> usize {
    let mut chains = 0;
    for process in store.processes() {
        if process.is_waiting() {
            let mut path = HashSet::new();
            chains += chains_from(store, process.id(), &mut path);
        }
    }
    chains
}

fn chains_from<'a>(
    store: &'a AllocationStore,
    process: &'a ProcessId,
    path: &mut HashSet<&'a ProcessId>,
) -> usize {
    path.insert(process);

    let record = store.process(process).expect("chain nodes come from the store");
    let count = match record.waiting_for().and_then(|r| store.resource(r)) {
        None => 1,
        Some(resource) if resource.allocated_to().is_empty() => 1,
        Some(resource) => resource
            .allocated_to()
            .iter()
            .map(|holder| {
                if path.contains(holder) {
                    1 // closed back on the current path
                } else {
                    chains_from(store, holder, path)
                }
            })
            .sum(),
    };

    path.remove(process);
    count
}

fn contention_level(store: &AllocationStore) -> ContentionLevel {
    let contended = store.resources().any(|r| {
        r.allocated_to().len() + r.waiting_queue().len() > CONTENTION_THRESHOLD
    });
    if contended {
        ContentionLevel::High
    } else {
        ContentionLevel::Moderate
    }
}

fn prevention_tips(score: f64, contention: ContentionLevel) -> Vec<String> {
    let mut tips = vec![
        "Monitor resource allocation patterns".to_string(),
        "Implement resource request timeouts".to_string(),
    ];
    if score > 0.5 {
        tips.push("Run deadlock detection on every tick".to_string());
        tips.push("Review resource allocation strategy".to_string());
    }
    if contention == ContentionLevel::High {
        tips.push("Spread load off highly contended resources".to_string());
        tips.push("Enable resource preemption".to_string());
    }
    tips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ResourceId, ResourceKind};

    fn pid(raw: &str) -> ProcessId {
        ProcessId::parse(raw).unwrap()
    }

    fn rid(raw: &str) -> ResourceId {
        ResourceId::parse(raw).unwrap()
    }

    fn store_with(processes: &[&str], resources: &[(&str, u32)]) -> AllocationStore {
        let mut store = AllocationStore::new();
        for p in processes {
            store.add_process(pid(p), format!("Process {}", &p[1..]), 1).unwrap();
        }
        for (r, instances) in resources {
            store
                .add_resource(rid(r), format!("Resource {}", &r[1..]), ResourceKind::Exclusive, *instances)
                .unwrap();
        }
        store
    }

    #[test]
    fn empty_store_scores_zero() {
        let report = assess(&AllocationStore::new());
        assert_eq!(report.score, 0.0);
        assert_eq!(report.waiting_chains, 0);
        assert_eq!(report.strategy, Strategy::Monitor);
    }

    #[test]
    fn idle_processes_score_zero() {
        let store = store_with(&["P1", "P2"], &[("R1", 1)]);
        let report = assess(&store);
        assert_eq!(report.score, 0.0);
        assert_eq!(report.contention, ContentionLevel::Moderate);
    }

    #[test]
    fn chains_follow_holders_and_close_on_cycles() {
        // Circular wait: three chains, one per waiting process.
        let mut store = store_with(&["P1", "P2", "P3"], &[("R1", 1), ("R2", 1), ("R3", 1)]);
        store.request(&pid("P1"), &rid("R2")).unwrap();
        store.request(&pid("P2"), &rid("R3")).unwrap();
        store.request(&pid("P3"), &rid("R1")).unwrap();
        store.request(&pid("P1"), &rid("R1")).unwrap();
        store.request(&pid("P2"), &rid("R2")).unwrap();
        store.request(&pid("P3"), &rid("R3")).unwrap();

        let report = assess(&store);
        assert_eq!(report.waiting_chains, 3);
        // 3 chains / 6 nodes = 0.5 -> allocation ordering.
        assert!((report.score - 0.5).abs() < f64::EPSILON);
        assert_eq!(report.strategy, Strategy::AllocationOrdering);
    }

    #[test]
    fn chain_ends_at_a_non_waiting_holder() {
        let mut store = store_with(&["P1", "P2"], &[("R1", 1)]);
        store.request(&pid("P1"), &rid("R1")).unwrap();
        store.request(&pid("P2"), &rid("R1")).unwrap();

        let report = assess(&store);
        assert_eq!(report.waiting_chains, 1);
    }

    #[test]
    fn crowded_resource_raises_contention() {
        let mut store = store_with(&["P1", "P2", "P3", "P4", "P5"], &[("R1", 2)]);
        for p in ["P1", "P2", "P3", "P4"] {
            store.request(&pid(p), &rid("R1")).unwrap();
        }
        // 2 holders + 2 waiters = 4 > 3.
        let report = assess(&store);
        assert_eq!(report.contention, ContentionLevel::High);
        assert!(report.prevention_tips.iter().any(|t| t.contains("preemption")));
    }

    #[test]
    fn adding_a_waiting_edge_never_lowers_the_score() {
        let mut store = store_with(&["P1", "P2", "P3"], &[("R1", 1), ("R2", 1)]);
        store.request(&pid("P1"), &rid("R1")).unwrap();
        store.request(&pid("P2"), &rid("R1")).unwrap();
        let before = assess(&store).score;

        store.request(&pid("P3"), &rid("R1")).unwrap();
        let after = assess(&store).score;
        assert!(after >= before);
    }

    #[test]
    fn strategy_text_matches_recommendation() {
        assert_eq!(
            Strategy::Preemption.to_string(),
            "Implement immediate resource preemption"
        );
        assert_eq!(Strategy::Monitor.to_string(), "Monitor resource usage patterns");
    }
}
