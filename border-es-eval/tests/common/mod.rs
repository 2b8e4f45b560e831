use anyhow::Result;
use border_core::dummy::{DummyEnv, DummyEnvConfig, DummyPolicyLoader};
use border_es_eval::{EvaluatorConfig, ExperimentConfig, TrainingRun};
use std::{fs, path::Path, sync::Arc};

#[allow(dead_code)]
pub type Run = TrainingRun<DummyEnv, DummyPolicyLoader>;

pub fn config(env_config: DummyEnvConfig) -> Arc<ExperimentConfig<DummyEnvConfig>> {
    config_with_workers(env_config, 4)
}

/// With a single worker, rollouts of a checkpoint load its file in submission order.
pub fn config_with_workers(
    env_config: DummyEnvConfig,
    n_workers: usize,
) -> Arc<ExperimentConfig<DummyEnvConfig>> {
    Arc::new(
        ExperimentConfig::new(env_config)
            .evaluator(EvaluatorConfig::default().n_workers(n_workers)),
    )
}

/// Writes `snapshot_{generation}.h5` files emitting the given actions.
pub fn write_checkpoints(dir: &Path, checkpoints: &[(u64, Vec<f32>)]) -> Result<()> {
    for (generation, act) in checkpoints {
        DummyPolicyLoader::save(dir.join(format!("snapshot_{}.h5", generation)), act)?;
    }
    Ok(())
}

/// Writes a training log with one iteration per generation.
#[allow(dead_code)]
pub fn write_log(dir: &Path, generations: &[u64]) -> Result<()> {
    let mut text = "Generation,TimestepsSoFar,EvalGenRewardMean,TimeElapsed\n".to_string();
    for g in generations {
        text += &format!("{},{},{},{}\n", g, g * 1000, *g as f64 * 0.1, *g as f64 * 2.0);
    }
    fs::write(dir.join("log.csv"), text)?;
    Ok(())
}
