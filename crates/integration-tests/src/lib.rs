//! Internal crate: service-level test suites live under `tests/`.
