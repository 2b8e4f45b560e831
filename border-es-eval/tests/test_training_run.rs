mod common;
use anyhow::Result;
use border_core::dummy::{DummyEnvConfig, DummyPolicyLoader};
use border_es_eval::{table::MergedTable, EvaluateOptions, RunData};
use common::{config, config_with_workers, write_checkpoints, write_log, Run};
use std::sync::Arc;
use tempdir::TempDir;
use test_log::test;

fn load_run(dir: &TempDir, env_config: DummyEnvConfig) -> Result<Run> {
    Run::load(dir.path(), config(env_config), Arc::new(DummyPolicyLoader::default()))
}

#[test]
fn test_evaluation_table_shape() -> Result<()> {
    let dir = TempDir::new("run_shape")?;
    write_checkpoints(
        dir.path(),
        &[(30, vec![3.0]), (10, vec![1.0]), (20, vec![1.5, 0.5])],
    )?;
    let mut run = load_run(&dir, DummyEnvConfig::default().episode_len(5))?;

    let data = run.evaluate(&EvaluateOptions::default().repeat_count(4))?;
    assert!(matches!(data, Some(RunData::Evaluation(_))));

    let evaluation = run.evaluation().unwrap();
    let gens = evaluation
        .rows()
        .iter()
        .map(|r| r.generation.unwrap())
        .collect::<Vec<_>>();
    assert_eq!(gens, vec![10, 20, 30]);

    for (row, reward) in evaluation.rows().iter().zip([5.0, 10.0, 15.0].iter()) {
        assert_eq!(row.n_rollouts, 4);
        assert_eq!(row.rollouts, vec![(*reward, 5); 4]);
        assert_eq!(row.reward_mean, *reward);
        assert_eq!(row.reward_std, 0.0);
        assert_eq!(row.length_mean, 5.0);
    }
    Ok(())
}

#[test]
fn test_non_finite_action_aborts_evaluation() -> Result<()> {
    let dir = TempDir::new("run_non_finite")?;
    write_checkpoints(
        dir.path(),
        &[(1, vec![1.0]), (2, vec![f32::NAN]), (3, vec![1.0])],
    )?;
    let mut run = load_run(&dir, DummyEnvConfig::default())?;

    let data = run.evaluate(&EvaluateOptions::default().repeat_count(3))?;
    assert!(data.is_none());
    assert!(run.evaluation().is_none());
    assert!(run.data().is_none());
    Ok(())
}

#[test]
fn test_broken_environment_is_fatal() -> Result<()> {
    let dir = TempDir::new("run_broken_env")?;
    write_checkpoints(dir.path(), &[(1, vec![1.0])])?;
    let mut run = load_run(&dir, DummyEnvConfig::default().fail_on_build(true))?;

    assert!(run.evaluate(&EvaluateOptions::default()).is_err());
    Ok(())
}

#[test]
fn test_cached_evaluation_and_force() -> Result<()> {
    let dir = TempDir::new("run_cache")?;
    write_checkpoints(dir.path(), &[(1, vec![1.0]), (2, vec![2.0])])?;
    let mut run = load_run(&dir, DummyEnvConfig::default().reward_noise(1.0))?;
    let opts = EvaluateOptions::default().repeat_count(2);

    let first = run.evaluate(&opts)?.unwrap();
    let second = run.evaluate(&opts)?.unwrap();
    assert!(first.ptr_eq(&second));

    let third = run.evaluate(&opts.clone().force(true))?.unwrap();
    assert!(!first.ptr_eq(&third));
    assert!(third.ptr_eq(run.data().unwrap()));
    Ok(())
}

#[test]
fn test_merge_with_log() -> Result<()> {
    let dir = TempDir::new("run_merge")?;
    write_checkpoints(
        dir.path(),
        &[(10, vec![1.0]), (20, vec![2.0]), (30, vec![3.0])],
    )?;
    write_log(dir.path(), &[0, 10, 20, 40])?;
    let mut run = load_run(&dir, DummyEnvConfig::default().episode_len(2))?;

    // Falls back to the reward estimated during training
    let series = run.reward_over_timesteps().unwrap();
    assert_eq!(series.x, vec![0.0, 10000.0, 20000.0, 40000.0]);

    run.evaluate(&EvaluateOptions::default().repeat_count(2))?;
    let merged = run.merged().unwrap();
    let gens = merged
        .rows()
        .iter()
        .map(|r| r.log.generation)
        .collect::<Vec<_>>();
    assert_eq!(gens, vec![10, 20]);

    let series = run.reward_over_timesteps().unwrap();
    assert_eq!(series.x, vec![10000.0, 20000.0]);
    assert_eq!(series.y, vec![2.0, 4.0]);
    Ok(())
}

#[test]
fn test_stride() -> Result<()> {
    let dir = TempDir::new("run_stride")?;
    let checkpoints = (0..7).map(|g| (g, vec![1.0])).collect::<Vec<_>>();
    write_checkpoints(dir.path(), &checkpoints)?;
    let mut run = load_run(&dir, DummyEnvConfig::default())?;

    run.evaluate(&EvaluateOptions::default().repeat_count(1).stride(3))?;
    let gens = run
        .evaluation()
        .unwrap()
        .rows()
        .iter()
        .map(|r| r.generation.unwrap())
        .collect::<Vec<_>>();
    assert_eq!(gens, vec![0, 3, 6]);
    Ok(())
}

#[test]
fn test_unknown_generation_is_kept() -> Result<()> {
    let dir = TempDir::new("run_unknown_generation")?;
    DummyPolicyLoader::save(dir.path().join("snapshot_1.h5"), &[1.0])?;
    DummyPolicyLoader::save(dir.path().join("snapshot_final.h5"), &[2.0])?;
    let mut run = Run::new(
        dir.path(),
        config(DummyEnvConfig::default()),
        Arc::new(DummyPolicyLoader::default()),
    )
    .with_checkpoints(&["snapshot_1.h5", "snapshot_final.h5"]);

    run.evaluate(&EvaluateOptions::default().repeat_count(2))?;
    let gens = run
        .evaluation()
        .unwrap()
        .rows()
        .iter()
        .map(|r| r.generation)
        .collect::<Vec<_>>();
    assert_eq!(gens, vec![Some(1), None]);
    Ok(())
}

#[test]
fn test_persist_and_reload() -> Result<()> {
    let dir = TempDir::new("run_persist")?;
    write_checkpoints(dir.path(), &[(1, vec![1.0]), (2, vec![2.0])])?;
    write_log(dir.path(), &[1, 2])?;
    let mut run = load_run(&dir, DummyEnvConfig::default())?;
    run.evaluate(&EvaluateOptions::default().repeat_count(3).persist(true))?;

    let text = std::fs::read_to_string(dir.path().join("evaluation.csv"))?;
    assert_eq!(
        text.lines().next(),
        Some("Generation,Eval_per_Gen,Eval_Rew_Mean,Eval_Rew_Std,Eval_Len_Mean,Rew_0,Len_0,Rew_1,Len_1,Rew_2,Len_2")
    );
    assert_eq!(text.lines().count(), 3);

    let restored = load_run(&dir, DummyEnvConfig::default())?;
    assert_eq!(restored.evaluation(), run.evaluation());
    assert_eq!(restored.merged(), run.merged());
    Ok(())
}

#[test]
fn test_delete_checkpoints() -> Result<()> {
    let dir = TempDir::new("run_delete")?;
    write_checkpoints(
        dir.path(),
        &[(1, vec![1.0]), (2, vec![1.0]), (3, vec![1.0])],
    )?;
    let mut run = load_run(&dir, DummyEnvConfig::default())?;

    run.delete_checkpoint_files(true)?;
    assert_eq!(run.checkpoints().len(), 1);
    assert_eq!(run.checkpoints()[0].generation, Some(3));
    assert!(!dir.path().join("snapshot_1.h5").exists());
    assert!(dir.path().join("snapshot_3.h5").exists());

    run.evaluate(
        &EvaluateOptions::default()
            .repeat_count(1)
            .delete_checkpoints(true),
    )?;
    assert!(!run.has_checkpoints());
    assert!(!dir.path().join("snapshot_3.h5").exists());
    assert!(run.evaluation().is_some());
    Ok(())
}

#[test]
fn test_no_checkpoints() -> Result<()> {
    let dir = TempDir::new("run_no_checkpoints")?;
    write_log(dir.path(), &[1, 2])?;
    let mut run = load_run(&dir, DummyEnvConfig::default())?;

    assert!(run.evaluate(&EvaluateOptions::default())?.is_none());
    assert!(run.visualize(false)?.is_none());
    assert!(run.log().is_some());
    Ok(())
}

#[test]
fn test_visualize() -> Result<()> {
    let dir = TempDir::new("run_visualize")?;
    write_checkpoints(dir.path(), &[(1, vec![1.0]), (2, vec![2.0])])?;
    let mut run = load_run(&dir, DummyEnvConfig::default())?;

    let video = run.visualize(false)?.unwrap();
    assert!(video.exists());
    assert_eq!(video.extension().unwrap(), "mp4");
    assert_eq!(run.visualize(false)?, Some(video.clone()));

    let video = run.visualize(true)?.unwrap();
    assert!(video.exists());
    assert_eq!(run.video_file(), Some(video.as_path()));

    // A recorded video is picked up when the run is restored
    let restored = load_run(&dir, DummyEnvConfig::default())?;
    assert!(restored.video_file().is_some());
    Ok(())
}

#[test]
fn test_rollouts_in_submission_order() -> Result<()> {
    let dir = TempDir::new("run_rollout_order")?;
    let scripts = [(10, [1.0, 3.0]), (20, [2.0, 4.0]), (30, [5.0, 5.0])];
    for (generation, rewards) in scripts.iter() {
        let acts = rewards.iter().map(|r| vec![*r]).collect::<Vec<_>>();
        DummyPolicyLoader::save_script(dir.path().join(format!("snapshot_{}.h5", generation)), &acts)?;
    }
    let mut run = Run::load(
        dir.path(),
        config_with_workers(DummyEnvConfig::default().episode_len(1), 1),
        Arc::new(DummyPolicyLoader::default()),
    )?;

    run.evaluate(&EvaluateOptions::default().repeat_count(2))?;
    let rows = run.evaluation().unwrap().rows();
    let rollouts = rows.iter().map(|r| r.rollouts.clone()).collect::<Vec<_>>();
    assert_eq!(
        rollouts,
        vec![
            vec![(1.0, 1), (3.0, 1)],
            vec![(2.0, 1), (4.0, 1)],
            vec![(5.0, 1), (5.0, 1)],
        ]
    );
    let summary = rows
        .iter()
        .map(|r| (r.generation.unwrap(), r.reward_mean, r.reward_std))
        .collect::<Vec<_>>();
    assert_eq!(summary, vec![(10, 2.0, 1.0), (20, 3.0, 1.0), (30, 5.0, 0.0)]);
    Ok(())
}

#[test]
fn test_failure_after_completed_rollouts() -> Result<()> {
    let dir = TempDir::new("run_partial_failure")?;
    write_checkpoints(dir.path(), &[(1, vec![1.0]), (3, vec![1.0])])?;
    DummyPolicyLoader::save_script(
        dir.path().join("snapshot_2.h5"),
        &[vec![1.0], vec![f32::NAN], vec![1.0]],
    )?;

    for n_workers in [1, 4].iter() {
        let mut run = Run::load(
            dir.path(),
            config_with_workers(DummyEnvConfig::default(), *n_workers),
            Arc::new(DummyPolicyLoader::default()),
        )?;

        // The second rollout of generation 2 fails, the others complete
        let data = run.evaluate(&EvaluateOptions::default().repeat_count(3))?;
        assert!(data.is_none());
        assert!(run.evaluation().is_none());
        assert!(run.data().is_none());
    }
    Ok(())
}

#[test]
fn test_failed_persist_keeps_cache_consistent() -> Result<()> {
    let dir = TempDir::new("run_failed_persist")?;
    write_checkpoints(dir.path(), &[(1, vec![1.0]), (2, vec![2.0])])?;
    write_log(dir.path(), &[1, 2])?;
    let mut run = load_run(&dir, DummyEnvConfig::default().reward_noise(1.0))?;
    let opts = EvaluateOptions::default().repeat_count(2);
    let first = run.evaluate(&opts)?.unwrap();

    // A directory in place of the evaluation file makes persisting fail
    std::fs::create_dir(dir.path().join("evaluation.csv"))?;
    assert!(run
        .evaluate(&opts.clone().force(true).persist(true))
        .is_err());

    assert!(first.ptr_eq(run.data().unwrap()));
    assert_eq!(
        run.merged().unwrap(),
        &MergedTable::merge(run.log().unwrap(), run.evaluation().unwrap())
    );
    assert!(first.ptr_eq(&run.evaluate(&opts)?.unwrap()));
    Ok(())
}

#[test]
fn test_latest_checkpoint_has_highest_generation() -> Result<()> {
    let dir = TempDir::new("run_latest_checkpoint")?;
    write_checkpoints(dir.path(), &[(20, vec![1.0]), (100, vec![1.0])])?;
    DummyPolicyLoader::save(dir.path().join("snapshot_best.h5"), &[f32::NAN])?;
    let mut run = load_run(&dir, DummyEnvConfig::default())?;
    assert_eq!(run.checkpoints().last().unwrap().generation, None);

    let video = run.visualize(false)?;
    assert!(video.unwrap().exists());

    run.delete_checkpoint_files(true)?;
    let kept = run
        .checkpoints()
        .iter()
        .map(|c| c.generation)
        .collect::<Vec<_>>();
    assert_eq!(kept, vec![Some(100)]);
    assert!(!dir.path().join("snapshot_best.h5").exists());
    Ok(())
}
