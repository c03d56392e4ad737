// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// No other layer imports from burn directly — only this one
// (and the data layer's Dataset/Batcher glue).
//
// What's in this layer:
//
//   model/       — The model architecture:
//                  • residual and dense feature backbones
//                  • spatial-pyramid-pooling descriptor
//                  • channel + spatial attention split into
//                    identity and age components
//                  • embedding and age-estimation heads
//                  • the weight initialization policy
//
//   trainer.rs   — The training loop: forward pass, joint
//                  identity/age loss, backward pass, Adam step,
//                  validation metrics, checkpoint per epoch
//
//   inferencer.rs — The inference engine: loads a checkpoint,
//                  embeds faces, estimates ages, compares pairs

// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            He et al. (2016) Deep Residual Learning
//            Huang et al. (2017) Densely Connected Networks

/// Backbones, attention split, heads, weight init
pub mod model;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Inference engine — age estimation and identity verification
pub mod inferencer;
