/// Join-code generation, formatting, and unique allocation.
pub mod codes;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Quiz content retrieval from external sources.
pub mod quiz_service;
/// Pure answer-scoring rules.
pub mod scoring;
/// Session lifecycle and gameplay coordination.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervision and degraded-mode handling.
pub mod storage_supervisor;
