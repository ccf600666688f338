// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application services for the health memory bounded context

pub mod risk_scorer;
pub mod memory_evolution;
pub mod deterioration;
pub mod retrieval;
pub mod health_memory_service;

pub use risk_scorer::{RiskCategory, RiskScorer};
pub use memory_evolution::{EvolutionError, EvolutionOutcome, MemoryEvolutionEngine, WeightUpdate};
pub use deterioration::{AlertLevel, DashboardSignal, DeteriorationDetector, DeteriorationReport};
pub use retrieval::{CandidateSource, EvidenceBundle, RankedCandidate, RetrievalEngine, SubScores};
pub use health_memory_service::{HealthMemoryService, InteractionOutcome, ServiceError, UserTrend};
