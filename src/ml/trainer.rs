// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader and Adam.
//
// The joint loss ties the two heads together:
//
//   loss = CE(identity logits, identity)
//        + CE(age logits, age in years)
//        + CE(group logits, age bucket)
//
// Key Burn 0.20 points:
//   - Training uses MyBackend (Autodiff<Wgpu>) for gradients
//   - model.valid() returns the model on MyInnerBackend (Wgpu)
//   - The validation batcher must also use MyInnerBackend
//   - argmax(1) returns [batch, 1], so flatten before .equal()
//
// The loop is generic over AifrForward, so the same code trains
// either backbone variant; the preset is matched exactly once.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{anyhow, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::activation::softmax,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{FaceBatch, FaceBatcher},
    dataset::FaceDataset,
};
use crate::domain::face::AGE_CLASSES;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::{AifrForward, BackbonePreset};

type MyBackend      = burn::backend::Autodiff<burn::backend::Wgpu>;
type MyInnerBackend = burn::backend::Wgpu;

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: FaceDataset,
    val_dataset:   FaceDataset,
    ckpt_manager:  CheckpointManager,
    metrics:       MetricsLogger,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let model_cfg = cfg.model_config();

    // One dispatch on the preset; everything below is variant-agnostic.
    match model_cfg.validate()? {
        BackbonePreset::DenseNet => {
            let model = model_cfg.init_dense::<MyBackend>(&device)?;
            let model = warm_start(cfg, model, &ckpt_manager, &device)?;
            train_loop(cfg, model, train_dataset, val_dataset, ckpt_manager, metrics, device)
        }
        _ => {
            let model = model_cfg.init_ir::<MyBackend>(&device)?;
            let model = warm_start(cfg, model, &ckpt_manager, &device)?;
            train_loop(cfg, model, train_dataset, val_dataset, ckpt_manager, metrics, device)
        }
    }
}

/// Load weights from a previously saved checkpoint file when the
/// config asks for a warm start (e.g. a pre-trained dense extractor).
fn warm_start<M: Module<MyBackend>>(
    cfg:    &TrainConfig,
    model:  M,
    ckpt:   &CheckpointManager,
    device: &burn::backend::wgpu::WgpuDevice,
) -> Result<M> {
    match &cfg.warm_start {
        Some(path) => {
            tracing::info!("Warm-starting weights from '{}'", path);
            ckpt.load_weights_from(path, model, device)
        }
        None => Ok(model),
    }
}

fn train_loop<M>(
    cfg:           &TrainConfig,
    mut model:     M,
    train_dataset: FaceDataset,
    val_dataset:   FaceDataset,
    ckpt_manager:  CheckpointManager,
    metrics:       MetricsLogger,
    device:        burn::backend::wgpu::WgpuDevice,
) -> Result<()>
where
    M: AutodiffModule<MyBackend> + AifrForward<MyBackend> + core::fmt::Debug,
    M::InnerModule: AifrForward<MyInnerBackend>,
{
    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let optim_cfg = AdamConfig::new().with_epsilon(1e-8);
    let mut optim = optim_cfg.init();

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_batcher = FaceBatcher::<MyBackend>::new(device.clone(), cfg.input_size);
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(42)
        .num_workers(1)
        .build(train_dataset);

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let val_batcher = FaceBatcher::<MyInnerBackend>::new(device.clone(), cfg.input_size);
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let loss = joint_loss(&model, &batch)?;

            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        // model.valid() drops autodiff and disables dropout
        let model_valid = model.valid();

        let mut val_loss_sum  = 0.0f64;
        let mut val_batches   = 0usize;
        let mut age_abs_err   = 0.0f64;
        let mut correct_group = 0usize;
        let mut correct_id    = 0usize;
        let mut total_samples = 0usize;

        for batch in val_loader.iter() {
            let n = batch.ages.dims()[0];

            let (embedding, _identity, age_tensor) =
                model_valid.forward_with_age(batch.images.clone());
            let (age_logits, group_logits) = model_valid.estimate_age(age_tensor);
            let id_logits = model_valid
                .identity_logits(embedding)
                .ok_or_else(|| anyhow!("validation model has no identity head"))?;

            let ce = burn::nn::loss::CrossEntropyLossConfig::new()
                .init(&age_logits.device());

            let batch_loss = ce.forward(id_logits.clone(), batch.identities.clone())
                + ce.forward(age_logits.clone(), batch.ages.clone())
                + ce.forward(group_logits.clone(), batch.age_groups.clone());
            val_loss_sum += batch_loss.into_scalar().elem::<f64>();
            val_batches  += 1;

            // Expected-value age estimate (softmax expectation over the
            // 101 year classes), compared against the integer label
            let expected = expected_age(age_logits);
            let abs_err: f64 = (expected - batch.ages.clone().float())
                .abs()
                .sum()
                .into_scalar()
                .elem::<f64>();
            age_abs_err += abs_err;

            // argmax(1) returns shape [batch, 1] — flatten to [batch]
            let pred_group = group_logits.argmax(1).flatten::<1>(0, 1);
            let pred_id    = id_logits.argmax(1).flatten::<1>(0, 1);

            correct_group += pred_group
                .equal(batch.age_groups.clone())
                .int().sum().into_scalar().elem::<i64>() as usize;
            correct_id += pred_id
                .equal(batch.identities.clone())
                .int().sum().into_scalar().elem::<i64>() as usize;
            total_samples += n;
        }

        let avg_val_loss = if val_batches   > 0 { val_loss_sum / val_batches as f64 } else { f64::NAN };
        let age_mae      = if total_samples > 0 { age_abs_err / total_samples as f64 } else { f64::NAN };
        let group_acc    = if total_samples > 0 { correct_group as f64 / total_samples as f64 } else { 0.0 };
        let id_acc       = if total_samples > 0 { correct_id    as f64 / total_samples as f64 } else { 0.0 };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | age_mae={:.2} | group_acc={:.1}% | id_acc={:.1}%",
            epoch, cfg.epochs, avg_train_loss, avg_val_loss,
            age_mae, group_acc * 100.0, id_acc * 100.0,
        );

        metrics.log(&EpochMetrics::new(
            epoch, avg_train_loss, avg_val_loss, age_mae, group_acc, id_acc,
        ))?;

        ckpt_manager.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Training complete!");
    Ok(())
}

/// Forward pass + the three-term loss on the training backend.
fn joint_loss<M>(model: &M, batch: &FaceBatch<MyBackend>) -> Result<Tensor<MyBackend, 1>>
where
    M: AifrForward<MyBackend>,
{
    let (embedding, _identity, age_tensor) = model.forward_with_age(batch.images.clone());
    let (age_logits, group_logits) = model.estimate_age(age_tensor);
    let id_logits = model
        .identity_logits(embedding)
        .ok_or_else(|| anyhow!("model was built without an identity classification head"))?;

    let ce = burn::nn::loss::CrossEntropyLossConfig::new().init(&id_logits.device());

    Ok(ce.forward(id_logits, batch.identities.clone())
        + ce.forward(age_logits, batch.ages.clone())
        + ce.forward(group_logits, batch.age_groups.clone()))
}

/// Softmax expectation over the year classes: Σ k·p(k), k = 0..=100.
/// Shape (N, 101) logits -> shape (N) float ages.
pub fn expected_age<B: Backend>(age_logits: Tensor<B, 2>) -> Tensor<B, 1> {
    let [n, classes] = age_logits.dims();
    debug_assert_eq!(classes, AGE_CLASSES);

    let device = age_logits.device();
    let years = Tensor::<B, 1, Int>::arange(0..classes as i64, &device)
        .float()
        .reshape([1, classes]);

    (softmax(age_logits, 1) * years).sum_dim(1).reshape([n])
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn expected_age_of_a_peaked_distribution() {
        let device = Default::default();

        // Strongly peak the logits at year 30
        let mut logits = vec![0.0f32; AGE_CLASSES];
        logits[30] = 50.0;
        let t = Tensor::<TestBackend, 1>::from_floats(logits.as_slice(), &device)
            .reshape([1, AGE_CLASSES]);

        let age = expected_age(t).into_scalar().elem::<f32>();
        assert!((age - 30.0).abs() < 0.1, "expected ~30, got {age}");
    }

    #[test]
    fn expected_age_of_uniform_logits_is_mid_range() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 2>::zeros([1, AGE_CLASSES], &device);

        let age = expected_age(t).into_scalar().elem::<f32>();
        assert!((age - 50.0).abs() < 1e-3, "expected 50, got {age}");
    }
}
