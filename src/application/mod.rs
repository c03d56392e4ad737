// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each
// (training, or answering an inference request).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - No direct file/tensor access (Layers 4 and 6)
//   - Only workflow coordination

// The training workflow
pub mod train_use_case;

// The inference workflows (age estimation, identity verification)
pub mod infer_use_case;
