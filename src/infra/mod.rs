// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong to any one business
// layer:
//
//   checkpoint.rs  — Saving and loading model weights with
//                    Burn's CompactRecorder, plus the train
//                    config sidecar that lets inference rebuild
//                    the exact architecture.
//
//   label_store.rs — Identity label table persistence. The
//                    classifier head predicts dense indices;
//                    this file maps them back to names and
//                    guarantees training and inference agree.
//
//   metrics.rs     — Per-epoch metrics appended to a CSV file
//                    for later analysis and plotting.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Identity label table persistence
pub mod label_store;

/// Training metrics CSV logger
pub mod metrics;
